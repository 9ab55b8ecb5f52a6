//! Caller identity
//!
//! Authentication happens in the proxy in front of the service, which passes
//! the signed-in user name in `X-Remote-User`. Requests without it never
//! reach a handler.

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tram_core::AppError;

use crate::error::HttpAppError;

pub const REMOTE_USER_HEADER: &str = "x-remote-user";

/// The user name the proxy vouched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser(pub String);

impl RemoteUser {
    pub fn name(&self) -> &str {
        &self.0
    }
}

fn remote_user_from_headers(parts: &Parts) -> Option<RemoteUser> {
    parts
        .headers
        .get(REMOTE_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| RemoteUser(name.to_string()))
}

/// Reject requests that did not come through the auth proxy.
pub async fn require_remote_user(request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    match remote_user_from_headers(&parts) {
        Some(user) => {
            parts.extensions.insert(user);
            next.run(Request::from_parts(parts, body)).await
        }
        None => HttpAppError(AppError::Unauthorized(
            "Authentication credentials were not provided".to_string(),
        ))
        .into_response(),
    }
}

impl<S> FromRequestParts<S> for RemoteUser
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<RemoteUser>() {
            return Ok(user.clone());
        }
        remote_user_from_headers(parts).ok_or_else(|| {
            HttpAppError(AppError::Unauthorized(
                "Authentication credentials were not provided".to_string(),
            ))
        })
    }
}
