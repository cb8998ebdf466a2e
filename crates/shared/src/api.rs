//! Shared API request/response types.

use garde::Validate;
use serde::{Deserialize, Serialize};

/// Max title length, matches the column width.
const MAX_TITLE_LEN: usize = 120;
/// Generous limit for free-text descriptions.
const MAX_DESCRIPTION_LEN: usize = 4000;

/// Create a new map marker. The marker enters moderation as PENDING and only
/// shows up in public queries once approved.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateMarkerPayload {
    #[garde(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[garde(range(min = -180.0, max = 180.0))]
    pub lng: f64,
    /// Category token; legacy aliases are accepted and remapped server-side.
    #[garde(length(min = 1, max = 64))]
    pub category: String,
    #[garde(length(min = 1, max = MAX_TITLE_LEN))]
    pub title: String,
    #[garde(inner(length(max = MAX_DESCRIPTION_LEN)))]
    pub description: Option<String>,
    /// Defaults to true when omitted.
    #[garde(skip)]
    #[serde(default)]
    pub is_public: Option<bool>,
    /// Daily opening window ("HH:MM"). Both bounds or neither.
    #[garde(skip)]
    pub open_time_start: Option<String>,
    #[garde(skip)]
    pub open_time_end: Option<String>,
    /// URL of an already-uploaded marker image.
    #[garde(inner(length(max = 512)))]
    pub mark_image: Option<String>,
}

/// Partial marker edit. Omitted fields are left untouched; any accepted edit
/// sends the marker back to moderation.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateMarkerPayload {
    #[garde(inner(length(min = 1, max = 64)))]
    pub category: Option<String>,
    #[garde(inner(length(min = 1, max = MAX_TITLE_LEN)))]
    pub title: Option<String>,
    #[garde(inner(length(max = MAX_DESCRIPTION_LEN)))]
    pub description: Option<String>,
    #[garde(skip)]
    pub is_public: Option<bool>,
    #[garde(skip)]
    pub open_time_start: Option<String>,
    #[garde(skip)]
    pub open_time_end: Option<String>,
}

/// Register a new account. Identity beyond username/email (passwords,
/// sessions) is handled by the upstream gateway.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterPayload {
    #[garde(length(min = 3, max = 64), custom(valid_username))]
    pub username: String,
    #[garde(email)]
    pub email: String,
    /// Honeypot field: real clients never fill it.
    #[garde(skip)]
    #[serde(default)]
    pub website: Option<String>,
}

fn valid_username(value: &str, _context: &()) -> garde::Result {
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        Ok(())
    } else {
        Err(garde::Error::new(
            "username may only contain letters, digits, '.', '_' and '-'",
        ))
    }
}

/// Returned after successful registration.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub public_id: String,
    pub username: String,
}
