use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "notification_kind", rename_all = "snake_case")]
pub enum NotificationKind {
    Registration,
    Certificate,
    EventUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationKind,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Appends an unread notification. Durable persistence only, no delivery.
pub async fn create(
    db: &PgPool,
    user_id: Uuid,
    title: &str,
    message: &str,
    kind: NotificationKind,
) -> Result<Notification, ApiError> {
    let notification = sqlx::query_as::<_, Notification>(
        r#"
        INSERT INTO notifications (user_id, title, message, notification_type)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, title, message, notification_type, is_read, created_at
        "#,
    )
    .bind(user_id)
    .bind(title)
    .bind(message)
    .bind(kind)
    .fetch_one(db)
    .await?;
    Ok(notification)
}

pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> Result<Vec<Notification>, ApiError> {
    let rows = sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, user_id, title, message, notification_type, is_read, created_at
        FROM notifications
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<Notification>, ApiError> {
    let notification = sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, user_id, title, message, notification_type, is_read, created_at
        FROM notifications
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(notification)
}

/// Idempotent: marking an already-read notification is a no-op rewrite.
pub async fn mark_read(db: &PgPool, id: Uuid) -> Result<Notification, ApiError> {
    let notification = sqlx::query_as::<_, Notification>(
        r#"
        UPDATE notifications
        SET is_read = TRUE
        WHERE id = $1
        RETURNING id, user_id, title, message, notification_type, is_read, created_at
        "#,
    )
    .bind(id)
    .fetch_one(db)
    .await?;
    Ok(notification)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&NotificationKind::EventUpdate).unwrap(),
            "\"event_update\""
        );
        assert_eq!(
            serde_json::to_string(&NotificationKind::Registration).unwrap(),
            "\"registration\""
        );
    }
}
