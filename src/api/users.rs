use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    Extension, Json,
};
use outlay_core::{
    validation::{normalize_email, validate_password, ValidationError},
    NewUser, User, UserProfile,
};
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use super::{payload::JsonObject, AppState};
use crate::{
    auth::{clear_cookie, session_cookie, Caller},
    error::ApiError,
    password::{hash_password, verify_password},
};

#[derive(Serialize)]
pub struct UserResponse {
    success: bool,
    user: UserProfile,
}

#[derive(Serialize)]
pub struct MessageResponse {
    success: bool,
    message: &'static str,
}

impl MessageResponse {
    pub fn new(message: &'static str) -> Self {
        Self {
            success: true,
            message,
        }
    }
}

/// Non-empty string fields. Passwords are taken verbatim, so only
/// [`trimmed_field`] ignores surrounding whitespace.
fn text_field<'a>(body: &'a JsonObject, key: &str) -> Option<&'a str> {
    match body.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
        _ => None,
    }
}

fn trimmed_field<'a>(body: &'a JsonObject, key: &str) -> Option<&'a str> {
    text_field(body, key).filter(|s| !s.trim().is_empty())
}

fn session_headers(state: &AppState, user: &User) -> Result<HeaderMap, ApiError> {
    let token = state
        .tokens
        .issue(user.id, &user.email, OffsetDateTime::now_utc())?;
    let cookie = session_cookie(&token, state.tokens.ttl(), state.cookie_secure)
        .ok_or_else(|| ApiError::Internal("session token is not a valid header value".into()))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, cookie);
    Ok(headers)
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    body: Result<Json<JsonObject>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap, Json<UserResponse>), ApiError> {
    let Json(body) = body.map_err(|_| ApiError::InvalidBody)?;

    let (Some(email), Some(password), Some(name)) = (
        trimmed_field(&body, "email"),
        text_field(&body, "password"),
        trimmed_field(&body, "name"),
    ) else {
        return Err(ValidationError::MissingFields("Email, password, and name are required").into());
    };
    let email = normalize_email(email)?;
    validate_password(password)?;

    if state.storage.find_user_by_email(&email)?.is_some() {
        return Err(ApiError::EmailTaken);
    }

    let password = password.to_owned();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

    let user = state.storage.create_user(&NewUser {
        email,
        name: name.trim().to_owned(),
        password_hash,
    })?;
    tracing::info!(user_id = %user.id, "User registered");

    let headers = session_headers(&state, &user)?;
    Ok((
        StatusCode::CREATED,
        headers,
        Json(UserResponse {
            success: true,
            user: user.profile(),
        }),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Result<Json<JsonObject>, JsonRejection>,
) -> Result<(HeaderMap, Json<UserResponse>), ApiError> {
    let Json(body) = body.map_err(|_| ApiError::InvalidBody)?;

    let (Some(email), Some(password)) = (trimmed_field(&body, "email"), text_field(&body, "password"))
    else {
        return Err(ValidationError::MissingFields("Email and password are required").into());
    };
    let email = normalize_email(email)?;

    let Some(user) = state.storage.find_user_by_email(&email)? else {
        tracing::debug!("Login for unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    let password = password.to_owned();
    let stored_hash = user.password_hash.clone();
    let valid =
        tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash)).await?;
    if !valid {
        tracing::debug!(user_id = %user.id, "Login with wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let headers = session_headers(&state, &user)?;
    Ok((
        headers,
        Json(UserResponse {
            success: true,
            user: user.profile(),
        }),
    ))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.storage.get_user(caller.user_id)?;
    Ok(Json(UserResponse {
        success: true,
        user: user.profile(),
    }))
}

pub async fn logout(State(state): State<Arc<AppState>>) -> (HeaderMap, Json<MessageResponse>) {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = clear_cookie(state.cookie_secure) {
        headers.insert(header::SET_COOKIE, cookie);
    }
    (
        headers,
        Json(MessageResponse::new("Logged out successfully")),
    )
}
