use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::events::repo::EventWithCount;

pub const EVENTS_PER_PAGE: i64 = 9;

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: String,
    pub event_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
    #[serde(default)]
    pub venue: Option<String>,
    pub max_participants: i32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub registration_deadline: Option<OffsetDateTime>,
}

/// Partial update; absent fields keep their stored values.
#[derive(Debug, Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_type: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    pub venue: Option<String>,
    pub max_participants: Option<i32>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub registration_deadline: Option<OffsetDateTime>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct EventFilter {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub search: Option<String>,
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct EventPage {
    pub events: Vec<EventWithCount>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl EventPage {
    pub fn new(events: Vec<EventWithCount>, page: i64, total: i64) -> Self {
        Self {
            events,
            page,
            per_page: EVENTS_PER_PAGE,
            total,
            total_pages: (total + EVENTS_PER_PAGE - 1) / EVENTS_PER_PAGE,
        }
    }

    pub fn empty(page: i64) -> Self {
        Self::new(Vec::new(), page, 0)
    }
}

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub upcoming_events: Vec<EventWithCount>,
    pub featured_events: Vec<EventWithCount>,
}

#[derive(Debug, Serialize)]
pub struct EventStats {
    pub total_registrations: i64,
    pub attended: i64,
    pub certificates_issued: i64,
    pub attendance_rate: f64,
}

impl EventStats {
    pub fn from_counts(total: i64, attended: i64, certificates_issued: i64) -> Self {
        Self {
            total_registrations: total,
            attended,
            certificates_issued,
            attendance_rate: attendance_rate(attended, total),
        }
    }
}

/// Percentage of registrations with confirmed attendance; 0 when nobody
/// registered so an empty event never divides by zero.
pub fn attendance_rate(attended: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        attended as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attendance_rate_of_empty_event_is_zero() {
        assert_eq!(attendance_rate(0, 0), 0.0);
    }

    #[test]
    fn attendance_rate_is_a_percentage() {
        assert_eq!(attendance_rate(3, 4), 75.0);
        assert_eq!(attendance_rate(4, 4), 100.0);
        assert_eq!(attendance_rate(0, 7), 0.0);
    }

    #[test]
    fn page_math_rounds_up() {
        let page = EventPage::new(Vec::new(), 1, 10);
        assert_eq!(page.total_pages, 2);
        let page = EventPage::new(Vec::new(), 1, 9);
        assert_eq!(page.total_pages, 1);
        let page = EventPage::empty(3);
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.per_page, EVENTS_PER_PAGE);
    }
}
