use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    error::ApiError,
    notifications::repo::{self, Notification},
    state::AppState,
};

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/:id/read", post(mark_notification_read))
}

#[instrument(skip(state))]
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let notifications = repo::list_by_user(&state.db, user_id).await?;
    Ok(Json(notifications))
}

#[instrument(skip(state))]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    let notification = repo::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("notification"))?;

    if notification.user_id != user_id {
        return Err(ApiError::Forbidden("not your notification"));
    }

    let updated = repo::mark_read(&state.db, id).await?;
    Ok(Json(updated))
}
