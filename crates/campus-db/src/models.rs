//! Database row types. These map directly to SQLite rows and stay distinct
//! from the campus-types models; the `TryFrom` impls below are the only
//! place where stored text is parsed back into typed values.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use campus_types::models::{
    Category, Event, EventSummary, Registration, RegistrationStatus, User, UserSummary,
};

/// Timestamps are stored as fixed-width RFC 3339 text so that string
/// comparison in SQL orders them chronologically.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_ts() -> String {
    format_ts(&Utc::now())
}

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("corrupt timestamp '{}'", raw))?;
    Ok(ts.with_timezone(&Utc))
}

fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("corrupt id '{}'", raw))
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub is_admin: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct EventRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub location: String,
    pub date: String,
    pub category: String,
    pub capacity: i64,
    pub available_seats: i64,
    pub organizer_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct RegistrationRow {
    pub id: String,
    pub user_id: String,
    pub event_id: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct UserSummaryRow {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct EventSummaryRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub location: String,
    pub date: String,
    pub category: String,
}

/// A registration joined with whatever still exists of its user and event.
#[derive(Debug, Clone)]
pub struct RegistrationDetailRow {
    pub registration: RegistrationRow,
    pub user: Option<UserSummaryRow>,
    pub event: Option<EventSummaryRow>,
}

/// Insert payload for a new event. `available_seats` is always initialised
/// from `capacity`.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub description: String,
    pub location: String,
    pub date: DateTime<Utc>,
    pub category: Category,
    pub capacity: u32,
    pub organizer_id: Uuid,
}

/// Partial update for an event. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub category: Option<Category>,
    pub capacity: Option<u32>,
}

/// Discovery filter. String filters match case-insensitive substrings; the
/// date bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub search: Option<String>,
    pub category: Option<Category>,
    pub location: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_id(&row.id)?,
            name: row.name,
            email: row.email,
            is_admin: row.is_admin,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

impl TryFrom<UserSummaryRow> for UserSummary {
    type Error = anyhow::Error;

    fn try_from(row: UserSummaryRow) -> Result<Self> {
        Ok(UserSummary {
            id: parse_id(&row.id)?,
            name: row.name,
            email: row.email,
        })
    }
}

impl TryFrom<EventSummaryRow> for EventSummary {
    type Error = anyhow::Error;

    fn try_from(row: EventSummaryRow) -> Result<Self> {
        Ok(EventSummary {
            id: parse_id(&row.id)?,
            name: row.name,
            description: row.description,
            location: row.location,
            date: parse_ts(&row.date)?,
            category: row.category.parse()?,
        })
    }
}

impl TryFrom<RegistrationRow> for Registration {
    type Error = anyhow::Error;

    fn try_from(row: RegistrationRow) -> Result<Self> {
        Ok(Registration {
            id: parse_id(&row.id)?,
            user_id: parse_id(&row.user_id)?,
            event_id: parse_id(&row.event_id)?,
            status: row.status.parse::<RegistrationStatus>()?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

impl EventRow {
    pub fn into_event(self, registered_users: Vec<Uuid>) -> Result<Event> {
        Ok(Event {
            id: parse_id(&self.id)?,
            name: self.name,
            description: self.description,
            location: self.location,
            date: parse_ts(&self.date)?,
            category: self.category.parse()?,
            capacity: u32::try_from(self.capacity).context("capacity out of range")?,
            available_seats: u32::try_from(self.available_seats)
                .context("available_seats out of range")?,
            organizer: parse_id(&self.organizer_id)?,
            registered_users,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_lexically() {
        let early = Utc.with_ymd_and_hms(2026, 3, 9, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 3, 23, 9, 0, 0).unwrap();
        assert!(format_ts(&early) < format_ts(&late));
        assert_eq!(parse_ts(&format_ts(&late)).unwrap(), late);
    }

    #[test]
    fn corrupt_registration_status_is_rejected() {
        let row = RegistrationRow {
            id: Uuid::new_v4().to_string(),
            user_id: Uuid::new_v4().to_string(),
            event_id: Uuid::new_v4().to_string(),
            status: "pending".into(),
            created_at: now_ts(),
            updated_at: now_ts(),
        };
        assert!(Registration::try_from(row).is_err());
    }
}
