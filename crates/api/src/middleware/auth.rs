//! Session extractors for Axum handlers.
//!
//! The session token is read from the `navlens_session` cookie, falling back
//! to an `Authorization: Bearer` header.

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use navlens_core::auth::SessionIdentity;
use navlens_core::error::CoreError;

use crate::auth::jwt::{validate_token, SESSION_COOKIE};
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated dashboard user. Rejects the request with 401 when no valid
/// session is present.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user_id: String,
}

/// A session if one is present and valid. Never rejects; editor endpoints
/// fall back to signature authorization without one.
#[derive(Debug, Clone)]
pub struct OptionalSession(pub Option<SessionIdentity>);

impl OptionalSession {
    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.0.as_ref()
    }
}

fn session_token(parts: &Parts) -> Option<String> {
    let from_cookie = parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
        });

    from_cookie.or_else(|| {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string)
    })
}

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(parts).ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized("Missing session".into()))
        })?;

        let claims = validate_token(&token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired session".into()))
        })?;

        Ok(SessionUser {
            user_id: claims.sub,
        })
    }
}

impl FromRequestParts<AppState> for OptionalSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity = session_token(parts)
            .and_then(|token| match validate_token(&token, &state.config.jwt) {
                Ok(claims) => Some(claims),
                Err(e) => {
                    tracing::debug!(error = %e, "Ignoring invalid session token");
                    None
                }
            })
            .map(|claims| SessionIdentity {
                user_id: claims.sub,
            });
        Ok(OptionalSession(identity))
    }
}
