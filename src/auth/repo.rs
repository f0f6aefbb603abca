use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;

/// Closed role set; stored as the `user_role` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Student,
    Organizer,
    Admin,
}

/// Operations gated by role rather than ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    CreateEvents,
    ManageAnyEvent,
}

impl Role {
    pub fn can(self, capability: Capability) -> bool {
        match (self, capability) {
            (Role::Admin, _) => true,
            (Role::Organizer, Capability::CreateEvents) => true,
            _ => false,
        }
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub full_name: String,
    pub department: Option<String>,
    pub student_id: Option<String>,
    pub phone: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub async fn find_by_username(db: &PgPool, username: &str) -> Result<Option<User>, ApiError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password_hash, role, full_name,
               department, student_id, phone, created_at
        FROM users
        WHERE username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, ApiError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password_hash, role, full_name,
               department, student_id, phone, created_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, ApiError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password_hash, role, full_name,
               department, student_id, phone, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

/// Loads the authenticated actor's row; the JWT may outlive the account.
pub async fn load_actor(db: &PgPool, id: Uuid) -> Result<User, ApiError> {
    find_by_id(db, id)
        .await?
        .ok_or(ApiError::Unauthorized("user no longer exists"))
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    db: &PgPool,
    username: &str,
    email: &str,
    password_hash: &str,
    role: Role,
    full_name: &str,
    department: Option<&str>,
    student_id: Option<&str>,
    phone: Option<&str>,
) -> Result<User, ApiError> {
    let result = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password_hash, role, full_name,
                           department, student_id, phone)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, username, email, password_hash, role, full_name,
                  department, student_id, phone, created_at
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .bind(full_name)
    .bind(department)
    .bind(student_id)
    .bind(phone)
    .fetch_one(db)
    .await;

    result.map_err(map_unique_violation)
}

pub async fn update_profile(
    db: &PgPool,
    id: Uuid,
    full_name: Option<&str>,
    email: Option<&str>,
    department: Option<&str>,
    phone: Option<&str>,
) -> Result<User, ApiError> {
    let result = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET full_name = COALESCE($2, full_name),
            email = COALESCE($3, email),
            department = COALESCE($4, department),
            phone = COALESCE($5, phone)
        WHERE id = $1
        RETURNING id, username, email, password_hash, role, full_name,
                  department, student_id, phone, created_at
        "#,
    )
    .bind(id)
    .bind(full_name)
    .bind(email)
    .bind(department)
    .bind(phone)
    .fetch_optional(db)
    .await;

    match result {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(ApiError::Unauthorized("user no longer exists")),
        Err(e) => Err(map_unique_violation(e)),
    }
}

/// A lost pre-check race still surfaces as the right conflict.
fn map_unique_violation(e: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(db_err) = &e {
        match db_err.constraint() {
            Some("users_username_key") => return ApiError::UsernameTaken,
            Some("users_email_key") => return ApiError::EmailTaken,
            _ => {}
        }
    }
    ApiError::Store(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_table() {
        assert!(Role::Admin.can(Capability::CreateEvents));
        assert!(Role::Admin.can(Capability::ManageAnyEvent));
        assert!(Role::Organizer.can(Capability::CreateEvents));
        assert!(!Role::Organizer.can(Capability::ManageAnyEvent));
        assert!(!Role::Student.can(Capability::CreateEvents));
        assert!(!Role::Student.can(Capability::ManageAnyEvent));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Role::Organizer).unwrap(),
            "\"organizer\""
        );
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn password_hash_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            username: "jdoe".into(),
            email: "jdoe@college.edu".into(),
            password_hash: "argon2-secret".into(),
            role: Role::Student,
            full_name: "John Doe".into(),
            department: None,
            student_id: None,
            phone: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2-secret"));
        assert!(!json.contains("password_hash"));
    }
}
