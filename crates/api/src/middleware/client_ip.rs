//! Client address resolution for rate limiting.
//!
//! Prefers the first hop of `x-forwarded-for`, falls back to the peer
//! address, and finally to the literal "unknown" - a request is never
//! rejected for lacking a resolvable identity.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Best-effort client identity for rate limiting.
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|first| !first.is_empty());

        if let Some(ip) = forwarded {
            return Ok(ClientIp(ip.to_string()));
        }

        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            return Ok(ClientIp(addr.ip().to_string()));
        }

        Ok(ClientIp("unknown".to_string()))
    }
}
