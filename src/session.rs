//! Session credential verification — opaque bearer credential to principal.
//!
//! Session credentials are HS256 JWTs issued by the hosting application's
//! login flow, with the principal's email in `sub`. This service shares the
//! signing secret, so it can both verify them (session cookie at authorize,
//! bearer token at userinfo) and issue tokens in the same format (access
//! tokens minted by the token endpoint).
//!
//! Verification is side-effect free and never panics: every malformed,
//! expired, or signature-mismatched credential resolves to `None`.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::directory::{Principal, PrincipalDirectory};
use crate::keys::TokenSigner;

/// Claim set of a session-format token.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Principal email
    pub sub: String,
    /// Issued-at (Unix epoch seconds)
    pub iat: u64,
    /// Expiry (Unix epoch seconds)
    pub exp: u64,
}

/// Resolves opaque bearer credentials to principals.
pub struct SessionVerifier {
    signer: Arc<TokenSigner>,
    directory: Arc<dyn PrincipalDirectory>,
    validation: Validation,
}

impl SessionVerifier {
    /// Create a verifier sharing the process signing key and directory.
    #[must_use]
    pub fn new(signer: Arc<TokenSigner>, directory: Arc<dyn PrincipalDirectory>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 60; // 60-second clock skew tolerance
        Self {
            signer,
            directory,
            validation,
        }
    }

    /// Resolve a bearer credential to a principal.
    ///
    /// Returns `None` for malformed, expired, or signature-mismatched
    /// credentials, for tokens without a subject, and for subjects no longer
    /// present in the directory.
    pub async fn resolve(&self, credential: &str) -> Option<Principal> {
        let data = match jsonwebtoken::decode::<SessionClaims>(
            credential,
            self.signer.decoding_key(),
            &self.validation,
        ) {
            Ok(data) => data,
            Err(e) => {
                debug!(error = %e, "Session credential rejected");
                return None;
            }
        };

        if data.claims.sub.is_empty() {
            debug!("Session credential has an empty subject");
            return None;
        }

        self.directory.find_by_email(&data.claims.sub).await
    }

    /// Issue a session-format token for a principal.
    pub fn issue(&self, principal: &Principal, ttl: Duration) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();

        let claims = SessionClaims {
            sub: principal.email.clone(),
            iat: now,
            exp: now + ttl.as_secs(),
        };
        self.signer.sign(&claims)
    }
}
