//! OIDC identity provider — Authorization Code flow for one relying party.
//!
//! The provider bridges the hosting application's existing login sessions to
//! a third-party platform that expects a standard OIDC issuer:
//!
//! 1. **Discovery**: `GET /.well-known/openid-configuration` and
//!    `GET /oauth/jwks` publish metadata and verification material.
//! 2. **Authorize**: `GET /oauth/authorize` resolves the browser's session
//!    credential, minting a single-use code — or redirects to the
//!    interactive login page, carrying the original request URL so the flow
//!    resumes after login.
//! 3. **Exchange**: `POST /oauth/token` consumes the code exactly once and
//!    returns an access token plus a signed ID token.
//! 4. **Userinfo**: `GET /oauth/userinfo` answers claim queries for the
//!    access token.
//!
//! # Architecture
//!
//! ```text
//! browser ──▶ /oauth/authorize ──▶ login redirect (external, resumes later)
//!                     │
//!                     └─▶ code ──▶ relying party ──▶ /oauth/token ──▶ tokens
//!                                                        │
//!                                 relying party backend ─┴─▶ /oauth/userinfo
//! ```
//!
//! The two halves of the login-then-resume pattern are independent request
//! lifecycles correlated only by the `redirect` query parameter; nothing
//! blocks server-side while the user logs in.

pub mod audit;
pub mod error;
pub mod handler;
pub mod store;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{Value, json};

use crate::Result;
use crate::config::Config;
use crate::directory::{ConfigDirectory, Principal, PrincipalDirectory};
use crate::keys::{IdTokenClaims, TokenSigner};
use crate::session::SessionVerifier;

pub use error::OauthError;
pub use store::{CodeStore, InMemoryCodeStore, PendingGrant};

/// OIDC discovery document (RFC 8414 / OIDC Discovery 1.0 subset).
#[derive(Debug, Serialize)]
pub struct DiscoveryDocument {
    /// Issuer URL, byte-identical to the `iss` claim of issued ID tokens
    pub issuer: String,
    /// Browser-facing authorization endpoint
    pub authorization_endpoint: String,
    /// Token endpoint
    pub token_endpoint: String,
    /// Userinfo endpoint
    pub userinfo_endpoint: String,
    /// JWKS endpoint
    pub jwks_uri: String,
    /// Only the Authorization Code flow is supported
    pub response_types_supported: Vec<&'static str>,
    /// Subject identifiers are stable public ids
    pub subject_types_supported: Vec<&'static str>,
    /// ID tokens are HS256-signed
    pub id_token_signing_alg_values_supported: Vec<&'static str>,
    /// Scopes the authorize endpoint accepts
    pub scopes_supported: Vec<&'static str>,
}

/// The identity provider — central coordinator for the code flow.
///
/// Holds the shared subsystems used by the HTTP handlers in [`handler`].
/// Everything except the code store is read-only shared state.
pub struct IdentityProvider {
    /// Issuer URL, the single source for discovery `issuer` and token `iss`
    pub issuer: String,
    /// Base URL reachable from the user's browser
    pub browser_base: String,
    /// Interactive login page for unauthenticated authorize requests
    pub login_url: String,
    /// Client id of the single registered relying party
    pub client_id: String,
    /// Optional client secret required at the token endpoint
    pub client_secret: Option<String>,
    /// Lifetime of issued access and ID tokens
    pub token_ttl: Duration,
    /// Pending-grant store (in-memory `DashMap` by default)
    pub store: Arc<dyn CodeStore>,
    /// Process signing key
    pub signer: Arc<TokenSigner>,
    /// Principal lookup
    pub directory: Arc<dyn PrincipalDirectory>,
    /// Session credential verifier/issuer
    pub session: SessionVerifier,
}

impl IdentityProvider {
    /// Assemble the provider from validated configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let signer = Arc::new(TokenSigner::new(&config.signing));
        let directory: Arc<dyn PrincipalDirectory> =
            Arc::new(ConfigDirectory::new(&config.principals));
        let session = SessionVerifier::new(Arc::clone(&signer), Arc::clone(&directory));
        let store: Arc<dyn CodeStore> = Arc::new(InMemoryCodeStore::new(config.oidc.code_ttl));

        Self {
            issuer: config.oidc.issuer.trim_end_matches('/').to_string(),
            browser_base: config.browser_base().trim_end_matches('/').to_string(),
            login_url: config.oidc.login_url.clone(),
            client_id: config.oidc.client_id.clone(),
            client_secret: config.oidc.client_secret.clone(),
            token_ttl: config.oidc.token_ttl,
            store,
            signer,
            directory,
            session,
        }
    }

    /// The discovery document, derived entirely from configuration.
    #[must_use]
    pub fn discovery_document(&self) -> DiscoveryDocument {
        DiscoveryDocument {
            issuer: self.issuer.clone(),
            authorization_endpoint: format!("{}/oauth/authorize", self.browser_base),
            token_endpoint: format!("{}/oauth/token", self.issuer),
            userinfo_endpoint: format!("{}/oauth/userinfo", self.issuer),
            jwks_uri: format!("{}/oauth/jwks", self.issuer),
            response_types_supported: vec!["code"],
            subject_types_supported: vec!["public"],
            id_token_signing_alg_values_supported: vec!["HS256"],
            scopes_supported: vec!["openid", "profile", "email"],
        }
    }

    /// The published key set for ID token verification.
    #[must_use]
    pub fn jwks(&self) -> Value {
        json!({ "keys": [self.signer.jwk()] })
    }

    /// Sign an ID token asserting `principal`, echoing `nonce` when present.
    pub fn mint_id_token(&self, principal: &Principal, nonce: Option<String>) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();

        let claims = IdTokenClaims {
            iss: self.issuer.clone(),
            sub: principal.id.clone(),
            aud: self.client_id.clone(),
            exp: now + self.token_ttl.as_secs(),
            iat: now,
            name: principal.name.clone(),
            email: principal.email.clone(),
            preferred_username: principal.name.clone(),
            nonce,
        };
        self.signer.sign(&claims)
    }

    /// Mint a bearer access token for `principal` in the shared session
    /// format, so the userinfo endpoint (and the hosting application)
    /// accept it.
    pub fn mint_access_token(&self, principal: &Principal) -> Result<String> {
        self.session.issue(principal, self.token_ttl)
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{Algorithm, Validation};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::{OidcConfig, PrincipalEntry, SigningConfig};

    fn test_config() -> Config {
        Config {
            oidc: OidcConfig {
                issuer: "http://localhost:8800".to_string(),
                login_url: "http://localhost:4070/auth/login".to_string(),
                client_id: "workflow-app".to_string(),
                ..OidcConfig::default()
            },
            signing: SigningConfig {
                secret: "0123456789abcdef0123456789abcdef".to_string(),
                key_id: "1".to_string(),
            },
            principals: vec![PrincipalEntry {
                id: "u-1".to_string(),
                email: "alice@example.com".to_string(),
                name: "Alice".to_string(),
            }],
            ..Config::default()
        }
    }

    #[test]
    fn discovery_endpoints_derive_from_the_issuer() {
        let idp = IdentityProvider::new(&test_config());
        let doc = idp.discovery_document();

        assert_eq!(doc.issuer, "http://localhost:8800");
        assert_eq!(
            doc.authorization_endpoint,
            "http://localhost:8800/oauth/authorize"
        );
        assert_eq!(doc.token_endpoint, "http://localhost:8800/oauth/token");
        assert_eq!(doc.jwks_uri, "http://localhost:8800/oauth/jwks");
        assert_eq!(doc.response_types_supported, vec!["code"]);
    }

    #[test]
    fn browser_base_only_affects_the_authorization_endpoint() {
        let mut config = test_config();
        config.oidc.browser_base_url = Some("http://public.example.com".to_string());
        let idp = IdentityProvider::new(&config);
        let doc = idp.discovery_document();

        assert_eq!(doc.issuer, "http://localhost:8800");
        assert_eq!(
            doc.authorization_endpoint,
            "http://public.example.com/oauth/authorize"
        );
        assert_eq!(doc.token_endpoint, "http://localhost:8800/oauth/token");
    }

    #[test]
    fn id_token_iss_is_byte_identical_to_discovery_issuer() {
        // The correctness-critical property: both values come from the same
        // configuration field, so they can never drift.
        let idp = IdentityProvider::new(&test_config());
        let principal = Principal {
            id: "u-1".to_string(),
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
        };

        let token = idp.mint_id_token(&principal, None).unwrap();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&["workflow-app"]);
        let decoded = jsonwebtoken::decode::<crate::keys::IdTokenClaims>(
            &token,
            idp.signer.decoding_key(),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.claims.iss, idp.discovery_document().issuer);
        assert_eq!(decoded.claims.aud, "workflow-app");
        assert_eq!(decoded.claims.sub, "u-1");
    }

    #[test]
    fn trailing_slash_on_issuer_is_normalized() {
        let mut config = test_config();
        config.oidc.issuer = "http://localhost:8800/".to_string();
        let idp = IdentityProvider::new(&config);

        assert_eq!(idp.discovery_document().issuer, "http://localhost:8800");
        assert_eq!(
            idp.discovery_document().jwks_uri,
            "http://localhost:8800/oauth/jwks"
        );
    }

    #[test]
    fn jwks_contains_exactly_one_key_with_the_configured_kid() {
        let idp = IdentityProvider::new(&test_config());
        let jwks = idp.jwks();

        let keys = jwks["keys"].as_array().unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0]["kid"], "1");
    }
}
