use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{jwt::AuthUser, repo::load_actor},
    error::ApiError,
    events::repo as events,
    registrations::{
        repo::{self, Registration, RegistrationWithEvent, RegistrationWithUser},
        services,
    },
    state::AppState,
};

pub fn registration_routes() -> Router<AppState> {
    Router::new()
        .route("/events/:id/register", post(register_for_event))
        .route("/events/:id/registrations", get(event_roster))
        .route("/me/registrations", get(my_registrations))
        .route("/registrations/:id/attendance", post(mark_attendance))
        .route(
            "/registrations/:id/certificate",
            post(issue_certificate).get(download_certificate),
        )
}

#[instrument(skip(state))]
pub async fn register_for_event(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Registration>), ApiError> {
    let actor = load_actor(&state.db, user_id).await?;
    let registration = services::register_for_event(&state, &actor, event_id).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

#[instrument(skip(state))]
pub async fn event_roster(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<RegistrationWithUser>>, ApiError> {
    let actor = load_actor(&state.db, user_id).await?;
    let event = events::find_by_id(&state.db, event_id)
        .await?
        .ok_or(ApiError::NotFound("event"))?;
    if !event.manageable_by(&actor) {
        return Err(ApiError::Forbidden("you can only manage your own events"));
    }

    let roster = repo::list_for_event(&state.db, event_id).await?;
    Ok(Json(roster))
}

#[instrument(skip(state))]
pub async fn my_registrations(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<RegistrationWithEvent>>, ApiError> {
    let registrations = repo::list_for_user(&state.db, user_id).await?;
    Ok(Json(registrations))
}

#[instrument(skip(state))]
pub async fn mark_attendance(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(registration_id): Path<Uuid>,
) -> Result<Json<Registration>, ApiError> {
    let actor = load_actor(&state.db, user_id).await?;
    let registration = services::mark_attendance(&state, &actor, registration_id).await?;
    Ok(Json(registration))
}

#[instrument(skip(state))]
pub async fn issue_certificate(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(registration_id): Path<Uuid>,
) -> Result<Json<Registration>, ApiError> {
    let actor = load_actor(&state.db, user_id).await?;
    let registration = services::issue_certificate(&state, &actor, registration_id).await?;
    Ok(Json(registration))
}

/// 302 to a presigned URL; the artifact itself never passes through the API.
#[instrument(skip(state))]
pub async fn download_certificate(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(registration_id): Path<Uuid>,
) -> Result<Redirect, ApiError> {
    let actor = load_actor(&state.db, user_id).await?;
    let url = services::certificate_download_url(&state, &actor, registration_id).await?;
    Ok(Redirect::temporary(&url))
}
