//! Session authentication.
//!
//! Vehicles and riders authenticate with a session cookie (`chair_session`,
//! `app_session`) or an `Authorization: Bearer` header. The resolved identity
//! is handed to handlers as a typed extractor. Internal routes are guarded by
//! an optional pre-shared key compared in constant time.

use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::models::{Chair, User};
use crate::AppState;

/// Header name for the internal API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Cookie carrying a vehicle's access token.
pub const CHAIR_SESSION_COOKIE: &str = "chair_session";

/// Cookie carrying a rider's access token.
pub const APP_SESSION_COOKIE: &str = "app_session";

/// Cookie carrying an owner's access token.
pub const OWNER_SESSION_COOKIE: &str = "owner_session";

/// Authenticated vehicle, resolved through the identity cache.
#[derive(Debug, Clone)]
pub struct ChairSession(pub Chair);

/// Authenticated rider.
#[derive(Debug, Clone)]
pub struct UserSession(pub User);

impl FromRequestParts<AppState> for ChairSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = session_token(&parts.headers, CHAIR_SESSION_COOKIE).ok_or_else(|| {
            AppError::Unauthorized(format!("{} cookie is required", CHAIR_SESSION_COOKIE))
        })?;

        let chair = state.identity.resolve(&state.repo, &token).await?;
        Ok(ChairSession(chair))
    }
}

impl FromRequestParts<AppState> for UserSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = session_token(&parts.headers, APP_SESSION_COOKIE).ok_or_else(|| {
            AppError::Unauthorized(format!("{} cookie is required", APP_SESSION_COOKIE))
        })?;

        let user = state
            .repo
            .find_user_by_token(&token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("invalid access token".to_string()))?;
        Ok(UserSession(user))
    }
}

/// Extract a session token from the named cookie, falling back to a bearer header.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty());

    from_cookie.or_else(|| bearer_token(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
}

/// `Set-Cookie` value for a session cookie.
pub fn session_cookie(name: &str, token: &str) -> String {
    format!("{}={}; Path=/; HttpOnly", name, token)
}

/// PSK authentication layer function that takes the expected PSK as a parameter.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // If no PSK is configured, allow all requests (dev mode)
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| bearer_token(request.headers()));

    match provided {
        Some(key) if constant_time_compare(&key, &expected) => next.run(request).await,
        Some(_) => AppError::Unauthorized("Invalid API key".to_string()).into_response(),
        None => AppError::Unauthorized("Missing API key".to_string()).into_response(),
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    // Constant-time comparison
    a_bytes.ct_eq(b_bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("test-key-123", "test-key-123"));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare("test-key-123", "test-key-124"));
    }

    #[test]
    fn test_constant_time_compare_different_lengths() {
        assert!(!constant_time_compare("short", "much-longer-key"));
    }

    #[test]
    fn test_session_token_from_cookie() {
        let map = headers(&[(
            header::COOKIE,
            "theme=dark; chair_session=abc123; app_session=zzz",
        )]);
        assert_eq!(
            session_token(&map, CHAIR_SESSION_COOKIE).as_deref(),
            Some("abc123")
        );
        assert_eq!(
            session_token(&map, APP_SESSION_COOKIE).as_deref(),
            Some("zzz")
        );
    }

    #[test]
    fn test_session_token_across_cookie_headers() {
        let map = headers(&[
            (header::COOKIE, "theme=dark"),
            (header::COOKIE, "chair_session=second"),
        ]);
        assert_eq!(
            session_token(&map, CHAIR_SESSION_COOKIE).as_deref(),
            Some("second")
        );
    }

    #[test]
    fn test_session_token_falls_back_to_bearer() {
        let map = headers(&[(header::AUTHORIZATION, "Bearer tok-1")]);
        assert_eq!(
            session_token(&map, CHAIR_SESSION_COOKIE).as_deref(),
            Some("tok-1")
        );
    }

    #[test]
    fn test_session_token_missing_or_empty() {
        assert!(session_token(&HeaderMap::new(), CHAIR_SESSION_COOKIE).is_none());

        let map = headers(&[(header::COOKIE, "chair_session=")]);
        assert!(session_token(&map, CHAIR_SESSION_COOKIE).is_none());

        let map = headers(&[(header::AUTHORIZATION, "Basic Zm9vOmJhcg==")]);
        assert!(session_token(&map, CHAIR_SESSION_COOKIE).is_none());
    }

    #[test]
    fn test_session_cookie_format() {
        assert_eq!(
            session_cookie(CHAIR_SESSION_COOKIE, "abc"),
            "chair_session=abc; Path=/; HttpOnly"
        );
    }
}
