use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Category, Event, EventSummary, Registration, UserSummary};

// -- JWT Claims --

/// JWT claims issued at login and checked by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub is_admin: bool,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub token: String,
}

// -- Events --

/// Body for creating an event. Every field is required; they are optional
/// here so a missing field is reported as a validation error rather than a
/// deserialization failure.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEventRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub category: Option<Category>,
    pub capacity: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub category: Option<Category>,
    pub capacity: Option<u32>,
}

/// Discovery query string. Dates accept RFC 3339 timestamps or plain
/// `YYYY-MM-DD` days. The browser client sends the date bounds in camelCase.
#[derive(Debug, Default, Deserialize)]
pub struct EventListQuery {
    pub search: Option<String>,
    pub category: Option<Category>,
    pub location: Option<String>,
    #[serde(alias = "startDate")]
    pub start_date: Option<String>,
    #[serde(alias = "endDate")]
    pub end_date: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventPage {
    pub events: Vec<Event>,
    pub total_pages: u32,
    pub current_page: u32,
    pub total_events: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: Event,
    pub organizer_info: Option<UserSummary>,
}

// -- Registrations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterForEventRequest {
    #[serde(rename = "eventId", alias = "event_id")]
    pub event_id: Uuid,
}

/// A registration as the owner sees it, with the event it points at.
/// `event` is `None` when the event row is gone.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationWithEvent {
    #[serde(flatten)]
    pub registration: Registration,
    pub event: Option<EventSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminRegistration {
    #[serde(flatten)]
    pub registration: Registration,
    pub user: Option<UserSummary>,
    pub event: Option<EventSummary>,
}

// -- Admin --

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: Category,
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Stats {
    pub total_events: u64,
    pub total_users: u64,
    pub total_registrations: u64,
    pub active_registrations: u64,
    pub cancelled_registrations: u64,
    pub category_stats: Vec<CategoryCount>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
