//! Token signing key — one process-wide symmetric key with a stable id.
//!
//! The same key material signs ID tokens, signs session-format access
//! tokens, and is published as verification material in the JWKS. Rotating
//! the key is a single configuration change; tokens already issued age out
//! within their configured lifetime.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::Result;
use crate::config::SigningConfig;

/// Claim set of an issued ID token.
///
/// `iss` must be byte-identical to the discovery document's `issuer` field;
/// both are read from the same configuration value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer URL
    pub iss: String,
    /// Subject (principal id)
    pub sub: String,
    /// Audience (client id of the relying party)
    pub aud: String,
    /// Expiry (Unix epoch seconds)
    pub exp: u64,
    /// Issued-at (Unix epoch seconds)
    pub iat: u64,
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
    /// Preferred username shown by the relying party
    pub preferred_username: String,
    /// Nonce echoed from the authorize request, when one was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// Process-wide HS256 signing key with a stable key identifier.
pub struct TokenSigner {
    kid: String,
    secret: Vec<u8>,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenSigner {
    /// Build the signer from configuration.
    #[must_use]
    pub fn new(config: &SigningConfig) -> Self {
        let secret = config.secret.as_bytes().to_vec();
        Self {
            kid: config.key_id.clone(),
            encoding: EncodingKey::from_secret(&secret),
            decoding: DecodingKey::from_secret(&secret),
            secret,
        }
    }

    /// The stable key identifier stamped into token headers and the JWKS.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.kid
    }

    /// Verification key for session-format tokens.
    #[must_use]
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }

    /// Sign a claim set with an HS256 header carrying the key id.
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String> {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(self.kid.clone());
        Ok(jsonwebtoken::encode(&header, claims, &self.encoding)?)
    }

    /// The public entry of the JWKS, keyed by the stable key id.
    ///
    /// The key is symmetric, so "public" material here is the shared secret
    /// itself; the JWKS endpoint is how the single registered relying party
    /// obtains it for HS256 verification.
    #[must_use]
    pub fn jwk(&self) -> Value {
        json!({
            "kty": "oct",
            "k": URL_SAFE_NO_PAD.encode(&self.secret),
            "alg": "HS256",
            "use": "sig",
            "kid": self.kid,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use jsonwebtoken::Validation;

    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new(&SigningConfig {
            secret: "0123456789abcdef0123456789abcdef".to_string(),
            key_id: "1".to_string(),
        })
    }

    fn claims() -> IdTokenClaims {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        IdTokenClaims {
            iss: "http://localhost:8800".to_string(),
            sub: "u-1".to_string(),
            aud: "workflow-app".to_string(),
            exp: now + 3600,
            iat: now,
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            preferred_username: "Alice".to_string(),
            nonce: None,
        }
    }

    #[test]
    fn signed_token_round_trips_with_the_same_secret() {
        // GIVEN: a signed ID token
        let signer = signer();
        let token = signer.sign(&claims()).unwrap();

        // WHEN: decoded with the same secret and expected audience
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&["workflow-app"]);
        let decoded =
            jsonwebtoken::decode::<IdTokenClaims>(&token, signer.decoding_key(), &validation)
                .unwrap();

        // THEN: the claims survive intact
        assert_eq!(decoded.claims.sub, "u-1");
        assert_eq!(decoded.claims.iss, "http://localhost:8800");
        assert_eq!(decoded.claims.email, "alice@example.com");
    }

    #[test]
    fn header_carries_the_configured_key_id() {
        let signer = signer();
        let token = signer.sign(&claims()).unwrap();

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("1"));
        assert_eq!(header.alg, Algorithm::HS256);
    }

    #[test]
    fn jwk_publishes_the_secret_in_base64url() {
        let signer = signer();
        let jwk = signer.jwk();

        assert_eq!(jwk["kty"], "oct");
        assert_eq!(jwk["alg"], "HS256");
        assert_eq!(jwk["kid"], "1");

        let decoded = URL_SAFE_NO_PAD
            .decode(jwk["k"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, b"0123456789abcdef0123456789abcdef");
    }

    #[test]
    fn nonce_is_omitted_from_claims_when_absent() {
        let mut c = claims();
        c.nonce = None;
        let json = serde_json::to_string(&c).unwrap();
        assert!(!json.contains("nonce"));

        c.nonce = Some("n-42".to_string());
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"nonce\":\"n-42\""));
    }
}
