use axum::{extract::State, Json};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::instrument;

use crate::{
    auth::{
        jwt::AuthUser,
        repo::{load_actor, Role},
    },
    error::ApiError,
    events::repo::{self as events, Event, EventWithCount},
    registrations::repo::{self as registrations, RegistrationWithEvent},
    state::AppState,
};

/// Role-shaped dashboard payload; the tag tells the client which view it got.
#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum DashboardResponse {
    Admin {
        total_events: i64,
        total_users: i64,
        total_registrations: i64,
        recent_events: Vec<Event>,
    },
    Organizer {
        my_events: Vec<EventWithCount>,
        upcoming_events: Vec<EventWithCount>,
    },
    Student {
        my_registrations: Vec<RegistrationWithEvent>,
        upcoming_registered: Vec<RegistrationWithEvent>,
    },
}

#[instrument(skip(state))]
pub async fn dashboard(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<DashboardResponse>, ApiError> {
    let actor = load_actor(&state.db, user_id).await?;
    let now = OffsetDateTime::now_utc();

    let response = match actor.role {
        Role::Admin => {
            let total_events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
                .fetch_one(&state.db)
                .await?;
            let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(&state.db)
                .await?;
            let total_registrations: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM registrations")
                    .fetch_one(&state.db)
                    .await?;
            let recent_events = events::recent(&state.db, 5).await?;
            DashboardResponse::Admin {
                total_events,
                total_users,
                total_registrations,
                recent_events,
            }
        }
        Role::Organizer => {
            let my_events = events::list_by_creator(&state.db, actor.id).await?;
            let upcoming_events = my_events
                .iter()
                .filter(|e| e.event.start_date >= now)
                .cloned()
                .collect();
            DashboardResponse::Organizer {
                my_events,
                upcoming_events,
            }
        }
        Role::Student => {
            let my_registrations = registrations::list_for_user(&state.db, actor.id).await?;
            let upcoming_registered = my_registrations
                .iter()
                .filter(|r| r.event_start_date >= now)
                .cloned()
                .collect();
            DashboardResponse::Student {
                my_registrations,
                upcoming_registered,
            }
        }
    };

    Ok(Json(response))
}
