//! HTTP endpoint handlers for the OIDC provider.
//!
//! Routes:
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `/.well-known/openid-configuration` | Discovery document |
//! | GET | `/oauth/jwks` | Verification key set |
//! | GET | `/oauth/authorize` | Authorize (browser, session cookie) |
//! | POST | `/oauth/token` | Code-for-token exchange (relying party backend) |
//! | GET | `/oauth/userinfo` | Claims for a bearer access token |
//! | GET | `/health` | Liveness probe |

use std::net::IpAddr;
use std::sync::Arc;

use axum::extract::{OriginalUri, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use subtle::ConstantTimeEq;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use url::Url;

use super::audit::{self, AuditEvent};
use super::error::OauthError;
use super::{DiscoveryDocument, IdentityProvider};

/// Session cookie name shared with the hosting application's login flow.
const SESSION_COOKIE: &str = "access_token";

/// Scope applied when the authorize request omits one.
const DEFAULT_SCOPE: &str = "openid profile email";

/// Query parameters of an authorize request.
///
/// Every field is optional so that missing parameters surface as our own
/// `invalid_request` body instead of the extractor's rejection.
#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    response_type: Option<String>,
    client_id: Option<String>,
    redirect_uri: Option<String>,
    scope: Option<String>,
    state: Option<String>,
    nonce: Option<String>,
}

/// Form body of a token exchange request.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    grant_type: Option<String>,
    code: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

/// Successful token exchange response (RFC 6749 §5.1 plus `id_token`).
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Bearer access token in the shared session format
    pub access_token: String,
    /// Always `"Bearer"`
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    /// Signed ID token
    pub id_token: String,
}

/// Claims returned by the userinfo endpoint.
///
/// The fixed presentation fields match what the relying party's account
/// model expects on every response.
#[derive(Debug, Serialize)]
pub struct UserinfoResponse {
    /// Stable principal id
    pub sub: String,
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
    /// Always `true`: principals come from trusted configuration
    pub email_verified: bool,
    /// Avatar URL (unused, always empty)
    pub picture: String,
    /// Profile URL (unused, always empty)
    pub profile: String,
    /// Preferred username shown by the relying party
    pub preferred_username: String,
    /// UI language hint
    pub interface_language: &'static str,
    /// UI theme hint
    pub interface_theme: &'static str,
}

impl UserinfoResponse {
    fn for_principal(principal: &crate::directory::Principal) -> Self {
        Self {
            sub: principal.id.clone(),
            name: principal.name.clone(),
            email: principal.email.clone(),
            email_verified: true,
            picture: String::new(),
            profile: String::new(),
            preferred_username: principal.name.clone(),
            interface_language: "en-US",
            interface_theme: "light",
        }
    }
}

/// Build the provider router with tracing and panic recovery layers.
pub fn create_router(idp: Arc<IdentityProvider>) -> Router {
    Router::new()
        .route("/.well-known/openid-configuration", get(discovery))
        .route("/oauth/jwks", get(jwks))
        .route("/oauth/authorize", get(authorize))
        .route("/oauth/token", post(token))
        .route("/oauth/userinfo", get(userinfo))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(idp)
}

async fn discovery(State(idp): State<Arc<IdentityProvider>>) -> Json<DiscoveryDocument> {
    Json(idp.discovery_document())
}

async fn jwks(State(idp): State<Arc<IdentityProvider>>) -> Json<Value> {
    Json(idp.jwks())
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Authorize endpoint.
///
/// Parameter validation happens before authentication so a misconfigured
/// relying party gets a diagnosable error instead of a login loop. An
/// unauthenticated browser is redirected to the login page with the full
/// original request URL in `redirect`, so the flow resumes transparently
/// after login.
async fn authorize(
    State(idp): State<Arc<IdentityProvider>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(params): Query<AuthorizeParams>,
) -> Result<Response, OauthError> {
    let client_ip = client_ip(&headers);

    let invalid = |reason: String| {
        audit::emit(&AuditEvent::request_invalid(reason.clone(), client_ip));
        OauthError::MalformedRequest(reason)
    };

    match params.response_type.as_deref() {
        Some("code") => {}
        Some(other) => return Err(invalid(format!("unsupported response_type: {other}"))),
        None => return Err(invalid("missing response_type".to_string())),
    }

    match params.client_id.as_deref() {
        Some(id) if id == idp.client_id => {}
        Some(id) => {
            audit::emit(&AuditEvent::request_invalid(
                format!("unknown client_id: {id}"),
                client_ip,
            ));
            return Err(OauthError::InvalidClient(format!(
                "unknown client_id: {id}"
            )));
        }
        None => return Err(invalid("missing client_id".to_string())),
    }

    let redirect_uri = match params.redirect_uri.as_deref() {
        Some(raw) => Url::parse(raw)
            .map_err(|e| invalid(format!("redirect_uri is not a valid URL: {e}")))?,
        None => return Err(invalid("missing redirect_uri".to_string())),
    };

    let Some(credential) = extract_credential(&headers) else {
        return Ok(login_redirect(&idp, &uri)?);
    };
    let Some(principal) = idp.session.resolve(&credential).await else {
        return Ok(login_redirect(&idp, &uri)?);
    };

    let scope: Vec<String> = params
        .scope
        .as_deref()
        .unwrap_or(DEFAULT_SCOPE)
        .split_whitespace()
        .map(ToString::to_string)
        .collect();

    let code = idp.store.put(&principal.id, scope, params.nonce).await;
    audit::emit(&AuditEvent::code_issued(&principal, client_ip));

    let mut location = redirect_uri;
    {
        let mut pairs = location.query_pairs_mut();
        pairs.append_pair("code", &code);
        if let Some(ref state) = params.state {
            pairs.append_pair("state", state);
        }
    }

    Ok(found(location.as_str()))
}

/// Token endpoint.
///
/// Consumes the code exactly once; any store outcome other than a live
/// grant denies the exchange.
async fn token(
    State(idp): State<Arc<IdentityProvider>>,
    headers: HeaderMap,
    Form(req): Form<TokenRequest>,
) -> Result<Response, OauthError> {
    let client_ip = client_ip(&headers);

    match req.grant_type.as_deref() {
        Some("authorization_code") => {}
        Some(other) => {
            audit::emit(&AuditEvent::request_invalid(
                format!("unsupported grant_type: {other}"),
                client_ip,
            ));
            return Err(OauthError::UnsupportedGrantType(format!(
                "unsupported grant_type: {other}"
            )));
        }
        None => {
            audit::emit(&AuditEvent::request_invalid(
                "missing grant_type".to_string(),
                client_ip,
            ));
            return Err(OauthError::MalformedRequest(
                "missing grant_type".to_string(),
            ));
        }
    }

    verify_client(&idp, req.client_id.as_deref(), req.client_secret.as_deref()).map_err(|e| {
        audit::emit(&AuditEvent::request_invalid(e.to_string(), client_ip));
        e
    })?;

    let Some(code) = req.code.as_deref() else {
        audit::emit(&AuditEvent::request_invalid(
            "missing code".to_string(),
            client_ip,
        ));
        return Err(OauthError::MalformedRequest("missing code".to_string()));
    };

    let Some(grant) = idp.store.consume(code).await else {
        warn!("Rejected authorization code (unknown, expired, or replayed)");
        audit::emit(&AuditEvent::grant_denied(
            "code unknown, expired, or already consumed",
            client_ip,
        ));
        return Err(OauthError::InvalidGrant(
            "code is invalid, expired, or already consumed".to_string(),
        ));
    };

    let Some(principal) = idp.directory.find_by_id(&grant.principal_id).await else {
        audit::emit(&AuditEvent::grant_denied(
            format!("principal not found: {}", grant.principal_id),
            client_ip,
        ));
        return Err(OauthError::PrincipalNotFound(grant.principal_id));
    };

    let access_token = idp
        .mint_access_token(&principal)
        .map_err(|e| OauthError::Internal(e.to_string()))?;
    let id_token = idp
        .mint_id_token(&principal, grant.nonce)
        .map_err(|e| OauthError::Internal(e.to_string()))?;

    audit::emit(&AuditEvent::token_issued(&principal, client_ip));

    let body = TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: idp.token_ttl.as_secs(),
        id_token,
    };

    // RFC 6749 §5.1: token responses must not be cached
    Ok((
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(body),
    )
        .into_response())
}

/// Userinfo endpoint. Answers for any live access token in the shared
/// session format, whether minted here or by the hosting application.
async fn userinfo(
    State(idp): State<Arc<IdentityProvider>>,
    headers: HeaderMap,
) -> Result<Json<UserinfoResponse>, OauthError> {
    let denied = || {
        audit::emit(&AuditEvent::userinfo_denied(client_ip(&headers)));
        OauthError::Unauthorized("invalid or expired access token".to_string())
    };

    let token = bearer_token(&headers).ok_or_else(denied)?;
    let principal = idp.session.resolve(token).await.ok_or_else(denied)?;

    Ok(Json(UserinfoResponse::for_principal(&principal)))
}

/// 302 redirect to the login page, carrying the original request URL.
fn login_redirect(idp: &IdentityProvider, original: &axum::http::Uri) -> Result<Response, OauthError> {
    let resume = format!("{}{original}", idp.browser_base);
    let mut login = Url::parse(&idp.login_url)
        .map_err(|e| OauthError::Internal(format!("login_url is not a valid URL: {e}")))?;
    login.query_pairs_mut().append_pair("redirect", &resume);
    Ok(found(login.as_str()))
}

/// Plain 302 Found. `axum::response::Redirect` emits 303 for `to`, which
/// some OAuth clients refuse to follow for the code callback.
fn found(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location.to_string())],
    )
        .into_response()
}

/// Validate relying-party credentials for the token endpoint.
fn verify_client(
    idp: &IdentityProvider,
    client_id: Option<&str>,
    client_secret: Option<&str>,
) -> Result<(), OauthError> {
    match client_id {
        Some(id) if id == idp.client_id => {}
        Some(id) => {
            return Err(OauthError::InvalidClient(format!(
                "unknown client_id: {id}"
            )));
        }
        None => {
            return Err(OauthError::InvalidClient(
                "missing client_id".to_string(),
            ));
        }
    }

    if let Some(ref expected) = idp.client_secret {
        let presented = client_secret.unwrap_or_default();
        let matches: bool = expected
            .as_bytes()
            .ct_eq(presented.as_bytes())
            .into();
        if !matches {
            return Err(OauthError::InvalidClient(
                "client secret mismatch".to_string(),
            ));
        }
    }

    Ok(())
}

/// Extract the session credential from the `access_token` cookie or a
/// bearer `Authorization` header. Cookie values may carry a `Bearer `
/// prefix left over from clients that store the raw header value.
fn extract_credential(headers: &HeaderMap) -> Option<String> {
    if let Some(cookies) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
        for pair in cookies.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            if parts.next() == Some(SESSION_COOKIE) {
                if let Some(value) = parts.next() {
                    let value = value.strip_prefix("Bearer ").unwrap_or(value);
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }
    }

    bearer_token(headers).map(ToString::to_string)
}

/// Extract a bearer token from the `Authorization` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|v| !v.is_empty())
}

/// Best-effort client IP from proxy headers, for the audit trail.
fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse() {
                return Some(ip);
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
