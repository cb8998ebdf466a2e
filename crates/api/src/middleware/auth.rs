//! Gateway identity extraction.
//!
//! Authentication happens upstream; the gateway forwards the verified
//! identity as `x-user-id` / `x-user-name` headers. Add `AuthUser` as an
//! extractor parameter to require an identity on a route.
//!
//! ```ignore
//! async fn my_handler(user: AuthUser, ...) -> ... {
//!     // user.public_id and user.username are available here
//! }
//! ```

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};

const USER_ID_HEADER: &str = "x-user-id";
const USER_NAME_HEADER: &str = "x-user-name";

/// Authenticated user as forwarded by the trusted gateway.
pub struct AuthUser {
    pub public_id: String,
    pub username: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let public_id = header_value(parts, USER_ID_HEADER).ok_or(AuthError::MissingIdentity)?;
        let username = header_value(parts, USER_NAME_HEADER).ok_or(AuthError::MissingIdentity)?;

        Ok(AuthUser {
            public_id,
            username,
        })
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[derive(Debug)]
pub enum AuthError {
    MissingIdentity,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingIdentity => "Missing identity headers",
        };

        let body = serde_json::json!({ "error": message });

        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}
