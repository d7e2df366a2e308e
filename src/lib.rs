//! SSO Bridge Library
//!
//! Minimal OIDC identity provider that fronts a hosting application's
//! existing login sessions, so an embedded third-party platform can use the
//! standard Authorization Code flow without a full IdP deployment.
//!
//! # Features
//!
//! - **Discovery**: OIDC discovery document and JWKS derived from one
//!   configured issuer URL
//! - **Authorize**: session-cookie authentication with login-redirect
//!   resume for unauthenticated browsers
//! - **Single-use codes**: atomic consume semantics, background sweeper
//! - **Token endpoint**: HS256-signed ID tokens plus access tokens in the
//!   hosting application's session format
//! - **Userinfo**: claims for any live session-format bearer token

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod idp;
pub mod keys;
pub mod server;
pub mod session;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
