use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use outlay_core::UserId;
use time::{Duration, OffsetDateTime};

use crate::{api::AppState, error::ApiError};

pub const SESSION_COOKIE: &str = "auth-token";

/// Authenticated caller identity, available to handlers via request extensions.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: UserId,
}

/// Bearer header first, then the session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(token: &str, max_age: Duration, secure: bool) -> Option<HeaderValue> {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token,
        max_age.whole_seconds()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

pub fn clear_cookie(secure: bool) -> Option<HeaderValue> {
    session_cookie("", Duration::ZERO, secure)
}

pub async fn require_auth<B>(
    State(state): State<Arc<AppState>>,
    mut req: Request<B>,
    next: Next<B>,
) -> Response {
    let Some(token) = extract_token(req.headers()) else {
        return ApiError::Unauthenticated.into_response();
    };

    match state.tokens.verify(&token, OffsetDateTime::now_utc()) {
        Ok(claims) => {
            tracing::debug!(user_id = %claims.user_id, "Authenticated request");
            req.extensions_mut().insert(Caller {
                user_id: claims.user_id,
            });
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "Rejected session token");
            ApiError::Unauthenticated.into_response()
        }
    }
}
