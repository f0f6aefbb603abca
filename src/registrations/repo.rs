use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;
use crate::events::repo::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "registration_status", rename_all = "lowercase")]
pub enum RegistrationStatus {
    Registered,
    Attended,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Registration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub status: RegistrationStatus,
    pub attendance_confirmed: bool,
    pub certificate_issued: bool,
    pub certificate_key: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub registered_at: OffsetDateTime,
}

/// Registration joined with a summary of its event, for the owner's listing.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RegistrationWithEvent {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub registration: Registration,
    pub event_title: String,
    pub event_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub event_start_date: OffsetDateTime,
    pub event_venue: Option<String>,
}

/// Registration joined with participant identity, for the organizer roster.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RegistrationWithUser {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub registration: Registration,
    pub participant_name: String,
    pub participant_email: String,
    pub participant_student_id: Option<String>,
}

/// Locks the active event row for the duration of the transaction, so
/// concurrent registration attempts on the same event serialize.
pub async fn lock_event(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
) -> Result<Option<Event>, ApiError> {
    let event = sqlx::query_as::<_, Event>(
        r#"
        SELECT id, title, description, event_type, start_date, end_date, venue,
               max_participants, registration_deadline, is_active, creator_id, created_at
        FROM events
        WHERE id = $1 AND is_active = TRUE
        FOR UPDATE
        "#,
    )
    .bind(event_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(event)
}

/// Live capacity count; must run under the event row lock.
pub async fn count_active_for_event(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
) -> Result<i64, ApiError> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM registrations
        WHERE event_id = $1 AND status <> 'cancelled'
        "#,
    )
    .bind(event_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(count)
}

pub async fn has_active_registration(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
    user_id: Uuid,
) -> Result<bool, ApiError> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM registrations
        WHERE event_id = $1 AND user_id = $2 AND status <> 'cancelled'
        "#,
    )
    .bind(event_id)
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(count > 0)
}

pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    event_id: Uuid,
) -> Result<Registration, ApiError> {
    let registration = sqlx::query_as::<_, Registration>(
        r#"
        INSERT INTO registrations (user_id, event_id)
        VALUES ($1, $2)
        RETURNING id, user_id, event_id, status, attendance_confirmed,
                  certificate_issued, certificate_key, registered_at
        "#,
    )
    .bind(user_id)
    .bind(event_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(registration)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<Registration>, ApiError> {
    let registration = sqlx::query_as::<_, Registration>(
        r#"
        SELECT id, user_id, event_id, status, attendance_confirmed,
               certificate_issued, certificate_key, registered_at
        FROM registrations
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(registration)
}

/// Repeating the call rewrites the same values; status and the flag cannot
/// disagree.
pub async fn mark_attended(db: &PgPool, id: Uuid) -> Result<Registration, ApiError> {
    let registration = sqlx::query_as::<_, Registration>(
        r#"
        UPDATE registrations
        SET attendance_confirmed = TRUE, status = 'attended'
        WHERE id = $1
        RETURNING id, user_id, event_id, status, attendance_confirmed,
                  certificate_issued, certificate_key, registered_at
        "#,
    )
    .bind(id)
    .fetch_one(db)
    .await?;
    Ok(registration)
}

/// Applied only after the artifact is durably written to storage.
pub async fn set_certificate(
    db: &PgPool,
    id: Uuid,
    certificate_key: &str,
) -> Result<Registration, ApiError> {
    let registration = sqlx::query_as::<_, Registration>(
        r#"
        UPDATE registrations
        SET certificate_issued = TRUE, certificate_key = $2
        WHERE id = $1
        RETURNING id, user_id, event_id, status, attendance_confirmed,
                  certificate_issued, certificate_key, registered_at
        "#,
    )
    .bind(id)
    .bind(certificate_key)
    .fetch_one(db)
    .await?;
    Ok(registration)
}

pub async fn list_for_user(
    db: &PgPool,
    user_id: Uuid,
) -> Result<Vec<RegistrationWithEvent>, ApiError> {
    let rows = sqlx::query_as::<_, RegistrationWithEvent>(
        r#"
        SELECT r.id, r.user_id, r.event_id, r.status, r.attendance_confirmed,
               r.certificate_issued, r.certificate_key, r.registered_at,
               e.title AS event_title, e.event_type, e.start_date AS event_start_date,
               e.venue AS event_venue
        FROM registrations r
        JOIN events e ON e.id = r.event_id
        WHERE r.user_id = $1
        ORDER BY e.start_date ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn list_for_event(
    db: &PgPool,
    event_id: Uuid,
) -> Result<Vec<RegistrationWithUser>, ApiError> {
    let rows = sqlx::query_as::<_, RegistrationWithUser>(
        r#"
        SELECT r.id, r.user_id, r.event_id, r.status, r.attendance_confirmed,
               r.certificate_issued, r.certificate_key, r.registered_at,
               u.full_name AS participant_name, u.email AS participant_email,
               u.student_id AS participant_student_id
        FROM registrations r
        JOIN users u ON u.id = r.user_id
        WHERE r.event_id = $1
        ORDER BY r.registered_at ASC
        "#,
    )
    .bind(event_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
