//! Audit logging for grant and token lifecycle events.
//!
//! Every event is emitted via `tracing::info!` with structured fields,
//! making the trail queryable by any log aggregator.
//!
//! # Events
//!
//! | Event | When |
//! |-------|------|
//! | `code.issued` | An authorization code is minted for a principal |
//! | `token.issued` | A code is exchanged for an access token and ID token |
//! | `grant.denied` | A code is unknown, expired, or already consumed (possible replay) |
//! | `request.invalid` | An authorize or token request fails validation |
//! | `userinfo.denied` | A userinfo request presents a bad access token |

use std::net::IpAddr;

use serde::Serialize;

use crate::directory::Principal;

/// Structured audit event emitted for every grant lifecycle transition.
#[derive(Debug, Serialize)]
pub struct AuditEvent {
    /// Event type string (e.g., `"code.issued"`).
    pub event: &'static str,
    /// Principal id associated with the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    /// Principal email associated with the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Client IP address (when available).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<IpAddr>,
    /// Human-readable reason for denial or error events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    /// Construct a `code.issued` event.
    #[must_use]
    pub fn code_issued(principal: &Principal, client_ip: Option<IpAddr>) -> Self {
        Self {
            event: "code.issued",
            principal_id: Some(principal.id.clone()),
            email: Some(principal.email.clone()),
            client_ip,
            reason: None,
        }
    }

    /// Construct a `token.issued` event.
    #[must_use]
    pub fn token_issued(principal: &Principal, client_ip: Option<IpAddr>) -> Self {
        Self {
            event: "token.issued",
            principal_id: Some(principal.id.clone()),
            email: Some(principal.email.clone()),
            client_ip,
            reason: None,
        }
    }

    /// Construct a `grant.denied` event (unknown, expired, or replayed code).
    #[must_use]
    pub fn grant_denied(reason: impl Into<String>, client_ip: Option<IpAddr>) -> Self {
        Self {
            event: "grant.denied",
            principal_id: None,
            email: None,
            client_ip,
            reason: Some(reason.into()),
        }
    }

    /// Construct a `request.invalid` event.
    #[must_use]
    pub fn request_invalid(reason: impl Into<String>, client_ip: Option<IpAddr>) -> Self {
        Self {
            event: "request.invalid",
            principal_id: None,
            email: None,
            client_ip,
            reason: Some(reason.into()),
        }
    }

    /// Construct a `userinfo.denied` event.
    #[must_use]
    pub fn userinfo_denied(client_ip: Option<IpAddr>) -> Self {
        Self {
            event: "userinfo.denied",
            principal_id: None,
            email: None,
            client_ip,
            reason: Some("invalid or expired access token".to_string()),
        }
    }
}

/// Emit an audit event via `tracing::info!` with structured fields.
///
/// The event is serialized as a JSON blob in the `audit` field:
///
/// ```text
/// INFO sso_bridge::idp::audit audit={"event":"code.issued","principal_id":...}
/// ```
pub fn emit(event: &AuditEvent) {
    match serde_json::to_string(event) {
        Ok(ref json) => tracing::info!(audit = %json, "idp audit"),
        Err(ref e) => tracing::warn!(error = %e, "Failed to serialize audit event"),
    }
}
