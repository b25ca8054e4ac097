//! Resolves which provider sent a delivery.
//!
//! Order: `?platform=` query parameter, then the first provider whose
//! signature header is present, then a User-Agent substring match.

use axum::http::{header::USER_AGENT, HeaderMap};

use crate::domain::webhook::{Platform, WebhookError};

/// Determines the platform without touching the body.
///
/// An explicit but unknown query value is rejected rather than falling
/// through to header detection.
pub fn detect_platform(query: Option<&str>, headers: &HeaderMap) -> Result<Platform, WebhookError> {
    if let Some(value) = query.map(str::trim).filter(|v| !v.is_empty()) {
        return value.parse();
    }

    if let Some(platform) = Platform::ALL
        .into_iter()
        .find(|p| headers.contains_key(p.signature_header()))
    {
        return Ok(platform);
    }

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    Platform::ALL
        .into_iter()
        .find(|p| user_agent.contains(p.user_agent_hint()))
        .ok_or(WebhookError::InvalidPlatform)
}

/// Value of the platform's signature header, if present and readable.
pub fn signature_for(platform: Platform, headers: &HeaderMap) -> Option<String> {
    headers
        .get(platform.signature_header())
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
