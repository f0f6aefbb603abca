use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::{Capability, User};
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub event_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
    pub venue: Option<String>,
    pub max_participants: i32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub registration_deadline: Option<OffsetDateTime>,
    pub is_active: bool,
    pub creator_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Event {
    /// Events are mutated only by their creator or an admin.
    pub fn manageable_by(&self, actor: &User) -> bool {
        actor.role.can(Capability::ManageAnyEvent) || self.creator_id == actor.id
    }
}

/// Event plus the live count of non-cancelled registrations. The count is
/// computed, never stored, so it cannot drift from the registration rows.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventWithCount {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub event: Event,
    pub current_participants: i64,
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    db: &PgPool,
    title: &str,
    description: &str,
    event_type: &str,
    start_date: OffsetDateTime,
    end_date: OffsetDateTime,
    venue: Option<&str>,
    max_participants: i32,
    registration_deadline: Option<OffsetDateTime>,
    creator_id: Uuid,
) -> Result<Event, ApiError> {
    let event = sqlx::query_as::<_, Event>(
        r#"
        INSERT INTO events (title, description, event_type, start_date, end_date,
                            venue, max_participants, registration_deadline, creator_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, title, description, event_type, start_date, end_date, venue,
                  max_participants, registration_deadline, is_active, creator_id, created_at
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(event_type)
    .bind(start_date)
    .bind(end_date)
    .bind(venue)
    .bind(max_participants)
    .bind(registration_deadline)
    .bind(creator_id)
    .fetch_one(db)
    .await?;
    Ok(event)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<Event>, ApiError> {
    let event = sqlx::query_as::<_, Event>(
        r#"
        SELECT id, title, description, event_type, start_date, end_date, venue,
               max_participants, registration_deadline, is_active, creator_id, created_at
        FROM events
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(event)
}

pub async fn find_with_count(db: &PgPool, id: Uuid) -> Result<Option<EventWithCount>, ApiError> {
    let event = sqlx::query_as::<_, EventWithCount>(
        r#"
        SELECT e.id, e.title, e.description, e.event_type, e.start_date, e.end_date,
               e.venue, e.max_participants, e.registration_deadline, e.is_active,
               e.creator_id, e.created_at,
               (SELECT COUNT(*) FROM registrations r
                 WHERE r.event_id = e.id AND r.status <> 'cancelled') AS current_participants
        FROM events e
        WHERE e.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(event)
}

/// Active events ordered by start date, optionally filtered by type and a
/// title/description search term.
pub async fn list_active(
    db: &PgPool,
    event_type: Option<&str>,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<EventWithCount>, ApiError> {
    let rows = sqlx::query_as::<_, EventWithCount>(
        r#"
        SELECT e.id, e.title, e.description, e.event_type, e.start_date, e.end_date,
               e.venue, e.max_participants, e.registration_deadline, e.is_active,
               e.creator_id, e.created_at,
               (SELECT COUNT(*) FROM registrations r
                 WHERE r.event_id = e.id AND r.status <> 'cancelled') AS current_participants
        FROM events e
        WHERE e.is_active = TRUE
          AND ($1::text IS NULL OR e.event_type = $1)
          AND ($2::text IS NULL
               OR e.title ILIKE '%' || $2 || '%'
               OR e.description ILIKE '%' || $2 || '%')
        ORDER BY e.start_date ASC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(event_type)
    .bind(search)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn count_active(
    db: &PgPool,
    event_type: Option<&str>,
    search: Option<&str>,
) -> Result<i64, ApiError> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM events e
        WHERE e.is_active = TRUE
          AND ($1::text IS NULL OR e.event_type = $1)
          AND ($2::text IS NULL
               OR e.title ILIKE '%' || $2 || '%'
               OR e.description ILIKE '%' || $2 || '%')
        "#,
    )
    .bind(event_type)
    .bind(search)
    .fetch_one(db)
    .await?;
    Ok(total)
}

pub async fn upcoming(db: &PgPool, limit: i64) -> Result<Vec<EventWithCount>, ApiError> {
    let rows = sqlx::query_as::<_, EventWithCount>(
        r#"
        SELECT e.id, e.title, e.description, e.event_type, e.start_date, e.end_date,
               e.venue, e.max_participants, e.registration_deadline, e.is_active,
               e.creator_id, e.created_at,
               (SELECT COUNT(*) FROM registrations r
                 WHERE r.event_id = e.id AND r.status <> 'cancelled') AS current_participants
        FROM events e
        WHERE e.is_active = TRUE AND e.start_date >= now()
        ORDER BY e.start_date ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn featured(db: &PgPool, limit: i64) -> Result<Vec<EventWithCount>, ApiError> {
    let rows = sqlx::query_as::<_, EventWithCount>(
        r#"
        SELECT e.id, e.title, e.description, e.event_type, e.start_date, e.end_date,
               e.venue, e.max_participants, e.registration_deadline, e.is_active,
               e.creator_id, e.created_at,
               (SELECT COUNT(*) FROM registrations r
                 WHERE r.event_id = e.id AND r.status <> 'cancelled') AS current_participants
        FROM events e
        WHERE e.is_active = TRUE
        ORDER BY e.created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Latest events regardless of active flag, for the admin dashboard.
pub async fn recent(db: &PgPool, limit: i64) -> Result<Vec<Event>, ApiError> {
    let rows = sqlx::query_as::<_, Event>(
        r#"
        SELECT id, title, description, event_type, start_date, end_date, venue,
               max_participants, registration_deadline, is_active, creator_id, created_at
        FROM events
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn list_by_creator(db: &PgPool, creator_id: Uuid) -> Result<Vec<EventWithCount>, ApiError> {
    let rows = sqlx::query_as::<_, EventWithCount>(
        r#"
        SELECT e.id, e.title, e.description, e.event_type, e.start_date, e.end_date,
               e.venue, e.max_participants, e.registration_deadline, e.is_active,
               e.creator_id, e.created_at,
               (SELECT COUNT(*) FROM registrations r
                 WHERE r.event_id = e.id AND r.status <> 'cancelled') AS current_participants
        FROM events e
        WHERE e.creator_id = $1
        ORDER BY e.start_date ASC
        "#,
    )
    .bind(creator_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

#[allow(clippy::too_many_arguments)]
pub async fn update(
    db: &PgPool,
    id: Uuid,
    title: Option<&str>,
    description: Option<&str>,
    event_type: Option<&str>,
    start_date: Option<OffsetDateTime>,
    end_date: Option<OffsetDateTime>,
    venue: Option<&str>,
    max_participants: Option<i32>,
    registration_deadline: Option<OffsetDateTime>,
    is_active: Option<bool>,
) -> Result<Event, ApiError> {
    let event = sqlx::query_as::<_, Event>(
        r#"
        UPDATE events
        SET title = COALESCE($2, title),
            description = COALESCE($3, description),
            event_type = COALESCE($4, event_type),
            start_date = COALESCE($5, start_date),
            end_date = COALESCE($6, end_date),
            venue = COALESCE($7, venue),
            max_participants = COALESCE($8, max_participants),
            registration_deadline = COALESCE($9, registration_deadline),
            is_active = COALESCE($10, is_active)
        WHERE id = $1
        RETURNING id, title, description, event_type, start_date, end_date, venue,
                  max_participants, registration_deadline, is_active, creator_id, created_at
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(description)
    .bind(event_type)
    .bind(start_date)
    .bind(end_date)
    .bind(venue)
    .bind(max_participants)
    .bind(registration_deadline)
    .bind(is_active)
    .fetch_one(db)
    .await?;
    Ok(event)
}

/// Attendance and certificate counts for one event, in a single scan.
pub async fn stats_counts(db: &PgPool, event_id: Uuid) -> Result<(i64, i64, i64), ApiError> {
    let counts: (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE attendance_confirmed),
               COUNT(*) FILTER (WHERE certificate_issued)
        FROM registrations
        WHERE event_id = $1
        "#,
    )
    .bind(event_id)
    .fetch_one(db)
    .await?;
    Ok(counts)
}
