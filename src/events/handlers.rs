use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        jwt::AuthUser,
        repo::{load_actor, Capability},
    },
    error::ApiError,
    events::{
        dto::{
            CreateEventRequest, EventFilter, EventPage, EventStats, HomeResponse,
            UpdateEventRequest, EVENTS_PER_PAGE,
        },
        repo::{self, Event, EventWithCount},
    },
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events))
        .route("/events/home", get(home))
        .route("/events/:id", get(get_event))
        .route("/events/:id/stats", get(event_stats))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event))
        .route("/events/:id", axum::routing::put(update_event))
}

#[instrument(skip(state, payload))]
pub async fn create_event(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let actor = load_actor(&state.db, user_id).await?;
    if !actor.role.can(Capability::CreateEvents) {
        return Err(ApiError::Forbidden("only organizers can create events"));
    }

    validate_event_fields(
        &payload.title,
        &payload.description,
        &payload.event_type,
        payload.start_date,
        payload.end_date,
        payload.max_participants,
    )?;

    let event = repo::create(
        &state.db,
        payload.title.trim(),
        payload.description.trim(),
        payload.event_type.trim(),
        payload.start_date,
        payload.end_date,
        payload.venue.as_deref(),
        payload.max_participants,
        payload.registration_deadline,
        actor.id,
    )
    .await?;

    info!(event_id = %event.id, creator = %actor.id, title = %event.title, "event created");
    Ok((StatusCode::CREATED, Json(event)))
}

/// Public listing. A store failure here degrades to an empty page instead of
/// failing the whole request; write paths never do this.
#[instrument(skip(state))]
pub async fn list_events(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Result<Json<EventPage>, ApiError> {
    let page = filter.page.max(1);
    let offset = (page - 1) * EVENTS_PER_PAGE;
    let event_type = filter.event_type.as_deref().filter(|t| !t.is_empty());
    let search = filter.search.as_deref().filter(|s| !s.is_empty());

    let listed = repo::list_active(&state.db, event_type, search, EVENTS_PER_PAGE, offset).await;
    let events = match listed {
        Ok(events) => events,
        Err(e) => {
            warn!(error = %e, "event listing unavailable, serving empty page");
            return Ok(Json(EventPage::empty(page)));
        }
    };
    let total = match repo::count_active(&state.db, event_type, search).await {
        Ok(total) => total,
        Err(e) => {
            warn!(error = %e, "event count unavailable, serving empty page");
            return Ok(Json(EventPage::empty(page)));
        }
    };

    Ok(Json(EventPage::new(events, page, total)))
}

#[instrument(skip(state))]
pub async fn home(State(state): State<AppState>) -> Result<Json<HomeResponse>, ApiError> {
    let upcoming_events = repo::upcoming(&state.db, 6).await?;
    let featured_events = repo::featured(&state.db, 3).await?;
    Ok(Json(HomeResponse {
        upcoming_events,
        featured_events,
    }))
}

#[instrument(skip(state))]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventWithCount>, ApiError> {
    let event = repo::find_with_count(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("event"))?;
    Ok(Json(event))
}

#[instrument(skip(state, payload))]
pub async fn update_event(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEventRequest>,
) -> Result<Json<Event>, ApiError> {
    let actor = load_actor(&state.db, user_id).await?;
    let existing = repo::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("event"))?;
    if !existing.manageable_by(&actor) {
        return Err(ApiError::Forbidden("you can only manage your own events"));
    }

    validate_event_fields(
        payload.title.as_deref().unwrap_or(&existing.title),
        payload
            .description
            .as_deref()
            .unwrap_or(&existing.description),
        payload.event_type.as_deref().unwrap_or(&existing.event_type),
        payload.start_date.unwrap_or(existing.start_date),
        payload.end_date.unwrap_or(existing.end_date),
        payload.max_participants.unwrap_or(existing.max_participants),
    )?;

    let event = repo::update(
        &state.db,
        id,
        payload.title.as_deref(),
        payload.description.as_deref(),
        payload.event_type.as_deref(),
        payload.start_date,
        payload.end_date,
        payload.venue.as_deref(),
        payload.max_participants,
        payload.registration_deadline,
        payload.is_active,
    )
    .await?;

    info!(event_id = %event.id, actor = %actor.id, "event updated");
    Ok(Json(event))
}

#[instrument(skip(state))]
pub async fn event_stats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<EventStats>, ApiError> {
    let actor = load_actor(&state.db, user_id).await?;
    let event = repo::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("event"))?;
    if !event.manageable_by(&actor) {
        return Err(ApiError::Forbidden("you can only view stats for your own events"));
    }

    let (total, attended, certificates_issued) = repo::stats_counts(&state.db, id).await?;
    Ok(Json(EventStats::from_counts(
        total,
        attended,
        certificates_issued,
    )))
}

fn validate_event_fields(
    title: &str,
    description: &str,
    event_type: &str,
    start_date: time::OffsetDateTime,
    end_date: time::OffsetDateTime,
    max_participants: i32,
) -> Result<(), ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    if description.trim().is_empty() {
        return Err(ApiError::Validation("description is required".into()));
    }
    if event_type.trim().is_empty() {
        return Err(ApiError::Validation("event type is required".into()));
    }
    if end_date < start_date {
        return Err(ApiError::Validation("end date is before start date".into()));
    }
    if max_participants < 1 {
        return Err(ApiError::Validation(
            "max participants must be at least 1".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn event_validation_rejects_bad_fields() {
        let start = datetime!(2026-09-01 10:00 UTC);
        let end = datetime!(2026-09-01 12:00 UTC);

        assert!(validate_event_fields("Fest", "desc", "fest", start, end, 100).is_ok());
        assert!(validate_event_fields("", "desc", "fest", start, end, 100).is_err());
        assert!(validate_event_fields("Fest", "  ", "fest", start, end, 100).is_err());
        assert!(validate_event_fields("Fest", "desc", "", start, end, 100).is_err());
        assert!(validate_event_fields("Fest", "desc", "fest", end, start, 100).is_err());
        assert!(validate_event_fields("Fest", "desc", "fest", start, end, 0).is_err());
    }
}
