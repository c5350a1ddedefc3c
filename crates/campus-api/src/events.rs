use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use campus_db::models::{EventFilter, NewEvent};
use campus_types::api::{Claims, CreateEventRequest, EventDetail, EventListQuery, EventPage};
use campus_types::models::UserSummary;

use crate::auth::AppState;
use crate::db_call;
use crate::error::ApiError;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

/// GET /api/events: public discovery with filters and pagination.
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    let filter = EventFilter {
        search: non_empty(query.search),
        category: query.category,
        location: non_empty(query.location),
        start_date: query
            .start_date
            .as_deref()
            .map(|raw| parse_date_bound(raw, false))
            .transpose()?,
        end_date: query
            .end_date
            .as_deref()
            .map(|raw| parse_date_bound(raw, true))
            .transpose()?,
    };
    let offset = u64::from(page - 1) * u64::from(limit);

    let (events, total) = db_call(&state, move |db| {
        let (rows, total) = db.list_events(&filter, limit, offset)?;
        Ok((db.hydrate_events(rows)?, total))
    })
    .await?;

    Ok(Json(EventPage {
        events,
        total_pages: u32::try_from(total.div_ceil(u64::from(limit))).unwrap_or(u32::MAX),
        current_page: page,
        total_events: total,
    }))
}

/// GET /api/events/{id}
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // A malformed id can't name an event; treat it the same as a missing one.
    let not_found = || ApiError::NotFound("Event not found".into());
    let id: Uuid = id.parse().map_err(|_| not_found())?;

    let detail = db_call(&state, move |db| {
        let Some((row, organizer)) = db.get_event_with_organizer(&id.to_string())? else {
            return Ok(None);
        };
        let event = db.hydrate_event(row)?;
        let organizer_info = organizer.map(UserSummary::try_from).transpose()?;
        Ok(Some(EventDetail {
            event,
            organizer_info,
        }))
    })
    .await?
    .ok_or_else(not_found)?;

    Ok(Json(detail))
}

/// POST /api/events and POST /api/admin/events. The caller becomes the
/// organizer.
pub async fn create_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let missing = || ApiError::BadRequest("Please add all fields".into());

    let new = NewEvent {
        name: non_empty(req.name).ok_or_else(missing)?,
        description: non_empty(req.description).ok_or_else(missing)?,
        location: non_empty(req.location).ok_or_else(missing)?,
        date: req.date.ok_or_else(missing)?,
        category: req.category.ok_or_else(missing)?,
        capacity: req.capacity.ok_or_else(missing)?,
        organizer_id: claims.sub,
    };

    let event = state.bookings.create_event(new).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accepts an RFC 3339 timestamp or a bare `YYYY-MM-DD`. A bare day used as
/// an upper bound covers the whole day.
fn parse_date_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{}'", raw)))?;
    let time = if end_of_day {
        day.and_hms_micro_opt(23, 59, 59, 999_999)
    } else {
        day.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc())
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid date '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_bounds_accept_days_and_timestamps() {
        assert_eq!(
            parse_date_bound("2026-03-23", false).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 23, 0, 0, 0).unwrap()
        );
        let end = parse_date_bound("2026-03-23", true).unwrap();
        assert!(end > Utc.with_ymd_and_hms(2026, 3, 23, 23, 59, 59).unwrap());
        assert_eq!(
            parse_date_bound("2026-03-23T09:00:00+05:30", false).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 23, 3, 30, 0).unwrap()
        );
        assert!(parse_date_bound("next tuesday", false).is_err());
    }

    #[test]
    fn blank_strings_count_as_missing() {
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some(" Tech Talk ".into())), Some("Tech Talk".into()));
    }
}
