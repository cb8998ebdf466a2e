//! Account registration endpoint.
//!
//! Registration is the only unauthenticated write and is protected twice: a
//! honeypot form field and a sliding-window rate limit per client address
//! (Redis-backed, with an in-process fallback when the store is down).

use axum::{
    Json, Router, debug_handler, extract::State, http::StatusCode, response::IntoResponse,
    routing::post,
};
use garde::Validate;
use waymark_shared::api::{RegisterPayload, RegisterResponse};

use crate::{error::AppError, middleware::ClientIp, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/register", post(register))
}

#[debug_handler]
async fn register(
    ClientIp(client_ip): ClientIp,
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<impl IntoResponse, AppError> {
    // Bots fill every field; real clients never see this one.
    if payload
        .website
        .as_deref()
        .is_some_and(|website| !website.trim().is_empty())
    {
        return Err(AppError::External(
            StatusCode::BAD_REQUEST,
            "Invalid registration request",
        ));
    }

    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if !state.stores.rate_limiter.try_acquire(&client_ip).await {
        tracing::info!(client_ip = %client_ip, "registration rate limited");
        return Err(AppError::External(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many registration attempts, try again later",
        ));
    }

    let Some(user) = state
        .repos
        .users
        .create(&payload.username, &payload.email)
        .await?
    else {
        return Err(AppError::External(
            StatusCode::CONFLICT,
            "Username or email already exists",
        ));
    };

    tracing::info!(user_id = %user.public_id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            public_id: user.public_id.to_string(),
            username: user.username,
        }),
    ))
}
