use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use campus_types::api::Claims;

use crate::auth::AppState;
use crate::db_call;
use crate::error::ApiError;

/// Extract and validate the JWT from the Authorization header. The decoded
/// [`Claims`] are stored as a request extension for handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let unauthorized = || ApiError::Unauthorized("Not authorized, no token".into());

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(unauthorized)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized("Not authorized, token failed".into()))?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// Admin gate. Must run after [`require_auth`]. The admin flag is read from
/// the user record, not the token, so revoking it takes effect immediately.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| ApiError::Unauthorized("Not authorized, no token".into()))?;

    let id = claims.sub.to_string();
    let is_admin = db_call(&state, move |db| db.get_user_by_id(&id))
        .await?
        .is_some_and(|user| user.is_admin);

    if !is_admin {
        return Err(ApiError::Forbidden("Not authorized as an admin".into()));
    }
    Ok(next.run(req).await)
}
