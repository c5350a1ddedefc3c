use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;

use campus_booking::RegistrationService;
use campus_db::Database;
use campus_types::api::{AuthResponse, Claims, LoginRequest, RegisterUserRequest};
use campus_types::models::User;

use crate::db_call;
use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub bookings: RegistrationService,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

const MIN_PASSWORD_LEN: usize = 6;
const MAX_NAME_LEN: usize = 100;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    let email = normalize_email(&req.email);

    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::BadRequest("Please add a valid name".into()));
    }
    if !is_plausible_email(&email) {
        return Err(ApiError::BadRequest("Please add a valid email".into()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let lookup = email.clone();
    if db_call(&state, move |db| db.get_user_by_email(&lookup))
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let password_hash = hash_password(&req.password)?;

    let (n, e) = (name.clone(), email.clone());
    let row = db_call(&state, move |db| db.create_user(&n, &e, &password_hash, false))
        .await
        .map_err(duplicate_signup)?;
    let user = User::try_from(row)?;

    info!(user_id = %user.id, "User registered");
    let token = create_token(&state, &user)?;

    Ok((StatusCode::CREATED, Json(auth_response(user, token))))
}

/// A concurrent sign-up with the same address can pass the lookup and then
/// trip the unique index instead.
fn duplicate_signup(err: ApiError) -> ApiError {
    match err {
        ApiError::Internal(e) if campus_db::is_constraint_violation(&e) => {
            ApiError::Conflict("User already exists".into())
        }
        other => other,
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || ApiError::Unauthorized("Invalid credentials".into());

    let email = normalize_email(&req.email);
    let row = db_call(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or_else(invalid)?;

    let parsed_hash =
        PasswordHash::new(&row.password).map_err(|e| anyhow::anyhow!("stored hash: {}", e))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| invalid())?;

    let user = User::try_from(row)?;
    let token = create_token(&state, &user)?;

    Ok(Json(auth_response(user, token)))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let id = claims.sub.to_string();
    let row = db_call(&state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(User::try_from(row)?))
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn create_token(state: &AppStateInner, user: &User) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user.id,
        name: user.name.clone(),
        is_admin: user.is_admin,
        exp: (chrono::Utc::now() + state.token_ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )
    .map_err(anyhow::Error::from)?;

    Ok(token)
}

fn auth_response(user: User, token: String) -> AuthResponse {
    AuthResponse {
        user_id: user.id,
        name: user.name,
        email: user.email,
        is_admin: user.is_admin,
        token,
    }
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(' '),
        None => false,
    }
}
