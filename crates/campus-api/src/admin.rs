use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use campus_db::models::EventPatch;
use campus_types::api::{
    AdminRegistration, CategoryCount, EventDetail, MessageResponse, Stats, UpdateEventRequest,
};
use campus_types::models::{Category, User, UserSummary};

use crate::auth::AppState;
use crate::db_call;
use crate::error::ApiError;
use crate::events::non_empty;
use crate::registrations::to_admin_view;

/// GET /api/admin/stats
pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let row = db_call(&state, |db| db.stats()).await?;

    let count = |n: i64| u64::try_from(n).unwrap_or_default();
    let category_stats = row
        .category_counts
        .into_iter()
        .map(|(category, n)| -> Result<CategoryCount, ApiError> {
            Ok(CategoryCount {
                category: category.parse::<Category>().map_err(anyhow::Error::from)?,
                count: count(n),
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let total = count(row.total_registrations);
    let active = count(row.active_registrations);
    Ok(Json(Stats {
        total_events: count(row.total_events),
        total_users: count(row.total_users),
        total_registrations: total,
        active_registrations: active,
        cancelled_registrations: total.saturating_sub(active),
        category_stats,
    }))
}

/// GET /api/admin/events: every event with organizer, soonest first.
pub async fn list_events(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let events = db_call(&state, |db| {
        let rows = db.list_all_events()?;
        let (events, organizers): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        db.hydrate_events(events)?
            .into_iter()
            .zip(organizers)
            .map(|(event, organizer)| -> anyhow::Result<EventDetail> {
                Ok(EventDetail {
                    event,
                    organizer_info: organizer.map(UserSummary::try_from).transpose()?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()
    })
    .await?;

    Ok(Json(events))
}

/// PUT /api/admin/events/{id}: partial update. A capacity change rescales
/// the available seats.
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let event_id = parse_event_id(&id)?;

    let patch = EventPatch {
        name: non_empty(req.name),
        description: non_empty(req.description),
        location: non_empty(req.location),
        date: req.date,
        category: req.category,
        capacity: req.capacity,
    };

    let event = state.bookings.admin_update_event(event_id, patch).await?;
    Ok(Json(event))
}

/// DELETE /api/admin/events/{id}: removes the event and its registrations.
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let event_id = parse_event_id(&id)?;
    let removed = state.bookings.admin_delete_event(event_id).await?;
    info!(%event_id, removed, "Admin deleted event");
    Ok(Json(MessageResponse::new(
        "Event and related registrations deleted",
    )))
}

/// GET /api/admin/registrations
pub async fn list_registrations(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = db_call(&state, |db| db.list_all_registrations()).await?;
    let registrations: Vec<AdminRegistration> = rows.into_iter().filter_map(to_admin_view).collect();
    Ok(Json(registrations))
}

/// GET /api/admin/users
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let users = db_call(&state, |db| {
        db.list_users()?
            .into_iter()
            .map(User::try_from)
            .collect::<anyhow::Result<Vec<_>>>()
    })
    .await?;
    Ok(Json(users))
}

fn parse_event_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound("Event not found".into()))
}
