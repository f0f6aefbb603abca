use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::repo::{self as users, User},
    certificates::{artifact_key, certificate_number, format_long_date, CertificateData},
    error::ApiError,
    events::repo::{self as events, Event},
    notifications::repo::{self as notifications, NotificationKind},
    registrations::repo::{self, Registration},
    state::AppState,
};

/// Preconditions for a registration attempt, checked in order; the first
/// failure wins and the caller must leave no side effects behind it.
pub(crate) fn check_registration_open(
    event: &Event,
    now: OffsetDateTime,
    active_count: i64,
    already_registered: bool,
) -> Result<(), ApiError> {
    if let Some(deadline) = event.registration_deadline {
        if now > deadline {
            return Err(ApiError::DeadlinePassed);
        }
    }
    if active_count >= i64::from(event.max_participants) {
        return Err(ApiError::EventFull);
    }
    if already_registered {
        return Err(ApiError::AlreadyRegistered);
    }
    Ok(())
}

/// The capacity check and the insert run under a `FOR UPDATE` lock on the
/// event row, so two attempts racing for the last slot cannot both succeed.
pub async fn register_for_event(
    state: &AppState,
    actor: &User,
    event_id: Uuid,
) -> Result<Registration, ApiError> {
    let mut tx = state.db.begin().await?;

    let event = repo::lock_event(&mut tx, event_id)
        .await?
        .ok_or(ApiError::NotFound("event"))?;
    let active_count = repo::count_active_for_event(&mut tx, event_id).await?;
    let already = repo::has_active_registration(&mut tx, event_id, actor.id).await?;

    check_registration_open(&event, OffsetDateTime::now_utc(), active_count, already)?;

    let registration = repo::insert(&mut tx, actor.id, event_id).await?;
    tx.commit().await?;

    info!(
        registration_id = %registration.id,
        user_id = %actor.id,
        event_id = %event.id,
        "registration created"
    );

    // The registration is already committed; a failed inbox write must not
    // undo it.
    if let Err(e) = notifications::create(
        &state.db,
        actor.id,
        "Event Registration Confirmed",
        &format!("You have successfully registered for \"{}\"", event.title),
        NotificationKind::Registration,
    )
    .await
    {
        warn!(error = %e, user_id = %actor.id, "registration notification failed");
    }

    Ok(registration)
}

pub async fn mark_attendance(
    state: &AppState,
    actor: &User,
    registration_id: Uuid,
) -> Result<Registration, ApiError> {
    let registration = repo::find_by_id(&state.db, registration_id)
        .await?
        .ok_or(ApiError::NotFound("registration"))?;
    let event = events::find_by_id(&state.db, registration.event_id)
        .await?
        .ok_or(ApiError::NotFound("event"))?;

    if !event.manageable_by(actor) {
        return Err(ApiError::Forbidden("you can only manage your own events"));
    }

    let updated = repo::mark_attended(&state.db, registration_id).await?;
    info!(registration_id = %registration_id, actor = %actor.id, "attendance marked");
    Ok(updated)
}

pub async fn issue_certificate(
    state: &AppState,
    actor: &User,
    registration_id: Uuid,
) -> Result<Registration, ApiError> {
    let registration = repo::find_by_id(&state.db, registration_id)
        .await?
        .ok_or(ApiError::NotFound("registration"))?;
    let event = events::find_by_id(&state.db, registration.event_id)
        .await?
        .ok_or(ApiError::NotFound("event"))?;

    if !event.manageable_by(actor) {
        return Err(ApiError::Forbidden("you can only manage your own events"));
    }
    if !registration.attendance_confirmed {
        return Err(ApiError::AttendanceNotConfirmed);
    }
    if registration.certificate_issued {
        return Err(ApiError::CertificateAlreadyIssued);
    }

    let participant = users::find_by_id(&state.db, registration.user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let data = CertificateData {
        certificate_number: certificate_number(registration.id),
        participant_name: participant.full_name.clone(),
        event_title: event.title.clone(),
        event_type: event.event_type.clone(),
        event_date: format_long_date(event.start_date)?,
        event_venue: event.venue.clone().unwrap_or_else(|| "TBA".into()),
        issue_date: format_long_date(OffsetDateTime::now_utc())?,
    };

    // Render and upload outside any row lock; the row is only updated once
    // the artifact is durably stored, so a committed reference can never
    // point at a missing file.
    let rendered = state
        .renderer
        .render(&data)
        .map_err(|e| ApiError::CertificateGeneration(e.to_string()))?;
    let key = artifact_key(registration.id, rendered.extension);
    state
        .storage
        .put_object(&key, rendered.body, rendered.content_type)
        .await
        .map_err(|e| ApiError::CertificateGeneration(e.to_string()))?;

    let updated = repo::set_certificate(&state.db, registration_id, &key).await?;

    info!(
        registration_id = %registration_id,
        certificate_key = %key,
        format = state.renderer.format_name(),
        "certificate issued"
    );

    if let Err(e) = notifications::create(
        &state.db,
        registration.user_id,
        "Certificate Issued",
        &format!("Your certificate for \"{}\" has been issued!", event.title),
        NotificationKind::Certificate,
    )
    .await
    {
        warn!(error = %e, user_id = %registration.user_id, "certificate notification failed");
    }

    Ok(updated)
}

/// Presigned download URL for the requester's own certificate.
pub async fn certificate_download_url(
    state: &AppState,
    actor: &User,
    registration_id: Uuid,
) -> Result<String, ApiError> {
    const TTL_SECS: u64 = 10 * 60;

    let registration = repo::find_by_id(&state.db, registration_id)
        .await?
        .ok_or(ApiError::NotFound("registration"))?;

    if registration.user_id != actor.id {
        return Err(ApiError::Forbidden("not your registration"));
    }
    if !registration.certificate_issued {
        return Err(ApiError::NotYetIssued);
    }
    let key = registration.certificate_key.ok_or(ApiError::NotYetIssued)?;

    if !state.storage.exists(&key).await? {
        warn!(registration_id = %registration_id, key = %key, "certificate artifact missing");
        return Err(ApiError::ArtifactMissing);
    }

    Ok(state.storage.presign_get(&key, TTL_SECS).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn event(max_participants: i32, deadline: Option<OffsetDateTime>) -> Event {
        Event {
            id: Uuid::new_v4(),
            title: "Robotics Workshop".into(),
            description: "Hands-on robotics".into(),
            event_type: "workshop".into(),
            start_date: datetime!(2026-09-10 09:00 UTC),
            end_date: datetime!(2026-09-10 17:00 UTC),
            venue: Some("Lab 2".into()),
            max_participants,
            registration_deadline: deadline,
            is_active: true,
            creator_id: Uuid::new_v4(),
            created_at: datetime!(2026-08-01 00:00 UTC),
        }
    }

    const NOW: OffsetDateTime = datetime!(2026-09-01 12:00 UTC);

    #[test]
    fn open_event_accepts_registration() {
        let e = event(10, Some(datetime!(2026-09-05 00:00 UTC)));
        assert!(check_registration_open(&e, NOW, 3, false).is_ok());
    }

    #[test]
    fn missing_deadline_means_always_open() {
        let e = event(10, None);
        assert!(check_registration_open(&e, NOW, 0, false).is_ok());
    }

    #[test]
    fn deadline_passed_wins_over_everything() {
        let e = event(1, Some(datetime!(2026-08-31 00:00 UTC)));
        // Full AND duplicate, but the deadline check comes first.
        let err = check_registration_open(&e, NOW, 1, true).unwrap_err();
        assert!(matches!(err, ApiError::DeadlinePassed));
    }

    #[test]
    fn registration_on_the_deadline_is_allowed() {
        let e = event(10, Some(NOW));
        assert!(check_registration_open(&e, NOW, 0, false).is_ok());
    }

    #[test]
    fn full_event_rejects_before_duplicate_check() {
        let e = event(2, None);
        let err = check_registration_open(&e, NOW, 2, true).unwrap_err();
        assert!(matches!(err, ApiError::EventFull));
    }

    #[test]
    fn last_slot_accepts_then_next_is_full() {
        let e = event(1, None);
        assert!(check_registration_open(&e, NOW, 0, false).is_ok());
        let err = check_registration_open(&e, NOW, 1, false).unwrap_err();
        assert!(matches!(err, ApiError::EventFull));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let e = event(10, None);
        let err = check_registration_open(&e, NOW, 4, true).unwrap_err();
        assert!(matches!(err, ApiError::AlreadyRegistered));
    }
}
