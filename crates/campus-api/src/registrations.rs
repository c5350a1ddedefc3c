use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;
use uuid::Uuid;

use campus_db::models::RegistrationDetailRow;
use campus_types::api::{
    AdminRegistration, Claims, MessageResponse, RegisterForEventRequest, RegistrationWithEvent,
};
use campus_types::models::{EventSummary, Registration, UserSummary};

use crate::auth::AppState;
use crate::db_call;
use crate::error::ApiError;

/// POST /api/registrations: book a seat for the caller.
pub async fn register(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RegisterForEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = state.bookings.register(claims.sub, req.event_id).await?;
    Ok((StatusCode::CREATED, Json(booking.registration)))
}

/// GET /api/registrations/user: the caller's registrations, newest first.
pub async fn list_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let rows = db_call(&state, move |db| db.get_registrations_for_user(&uid)).await?;

    let registrations: Vec<RegistrationWithEvent> = rows
        .into_iter()
        .filter_map(|row| {
            let (registration, _user, event) = convert_detail(row)?;
            Some(RegistrationWithEvent {
                registration,
                event,
            })
        })
        .collect();

    Ok(Json(registrations))
}

/// DELETE /api/registrations/{id}: cancel one of the caller's registrations.
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let registration_id: Uuid = id
        .parse()
        .map_err(|_| ApiError::NotFound("Registration not found".into()))?;

    state.bookings.cancel(registration_id, claims.sub).await?;
    Ok(Json(MessageResponse::new("Registration cancelled")))
}

pub(crate) fn to_admin_view(row: RegistrationDetailRow) -> Option<AdminRegistration> {
    let (registration, user, event) = convert_detail(row)?;
    Some(AdminRegistration {
        registration,
        user,
        event,
    })
}

/// Rows that fail to parse are logged and skipped rather than failing the
/// whole listing.
fn convert_detail(
    row: RegistrationDetailRow,
) -> Option<(Registration, Option<UserSummary>, Option<EventSummary>)> {
    let id = row.registration.id.clone();
    let parsed = (|| -> anyhow::Result<_> {
        Ok((
            Registration::try_from(row.registration)?,
            row.user.map(UserSummary::try_from).transpose()?,
            row.event.map(EventSummary::try_from).transpose()?,
        ))
    })();

    match parsed {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Corrupt registration '{}': {:#}", id, e);
            None
        }
    }
}
