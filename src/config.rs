//! Configuration management

use std::{path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Loaded in order, later files override earlier. Variables are set into
    /// the process environment for other services sharing the deployment.
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// OIDC provider configuration
    pub oidc: OidcConfig,
    /// Token signing key configuration
    pub signing: SigningConfig,
    /// Principals resolvable by the bridge
    pub principals: Vec<PrincipalEntry>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8800,
        }
    }
}

/// OIDC provider configuration.
///
/// `issuer` is the single source of truth for the `issuer` field of the
/// discovery document and the `iss` claim of every issued ID token. The two
/// must be byte-identical or the relying party rejects the tokens, so the
/// value is never duplicated elsewhere in the codebase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcConfig {
    /// Issuer base URL (e.g. `http://workflow-sso.internal:8800`)
    pub issuer: String,
    /// Base URL the user's browser can reach, used only for the
    /// authorization endpoint in the discovery document. Falls back to
    /// `issuer` when unset. Needed when the relying party's backend reaches
    /// this service over a different network than the browser does.
    pub browser_base_url: Option<String>,
    /// Interactive login page of the hosting application. Unauthenticated
    /// authorize requests are redirected here with a `redirect` parameter
    /// carrying the full original request URL.
    pub login_url: String,
    /// Client id of the single registered relying party
    pub client_id: String,
    /// Client secret of the relying party. When set, the token endpoint
    /// requires it on every exchange.
    pub client_secret: Option<String>,
    /// Authorization code lifetime
    #[serde(with = "humantime_serde")]
    pub code_ttl: Duration,
    /// Access token and ID token lifetime
    #[serde(with = "humantime_serde")]
    pub token_ttl: Duration,
    /// Interval between sweeps of expired pending grants
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            browser_base_url: None,
            login_url: String::new(),
            client_id: String::new(),
            client_secret: None,
            code_ttl: Duration::from_secs(10 * 60),
            token_ttl: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Signing key configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Symmetric HS256 secret, shared with the hosting application's
    /// session issuer. Must be at least 32 bytes.
    pub secret: String,
    /// Stable key identifier published in the JWKS and stamped into every
    /// issued token header
    pub key_id: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            key_id: "1".to_string(),
        }
    }
}

/// A principal known to the bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalEntry {
    /// Stable identifier (becomes the ID token `sub` claim)
    pub id: String,
    /// Email, the unique key the session credential references
    pub email: String,
    /// Display name
    pub name: String,
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        // Load from file if provided
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (SSO_BRIDGE_ prefix)
        figment = figment.merge(Env::prefixed("SSO_BRIDGE_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.load_env_files();
        config.validate()?;

        Ok(config)
    }

    /// Load environment files into the process environment.
    /// Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let path = Path::new(path_str);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {path_str}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {path_str}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {path_str}");
            }
        }
    }

    /// Validate the configuration.
    ///
    /// The relying party registration and signing material are deployment
    /// prerequisites: their absence is a fatal configuration error, never
    /// auto-provisioned.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.oidc.issuer)
            .map_err(|e| Error::Config(format!("oidc.issuer is not a valid URL: {e}")))?;

        if let Some(ref browser_base) = self.oidc.browser_base_url {
            Url::parse(browser_base).map_err(|e| {
                Error::Config(format!("oidc.browser_base_url is not a valid URL: {e}"))
            })?;
        }

        Url::parse(&self.oidc.login_url)
            .map_err(|e| Error::Config(format!("oidc.login_url is not a valid URL: {e}")))?;

        if self.oidc.client_id.is_empty() {
            return Err(Error::Config(
                "oidc.client_id is empty: no relying party is registered".to_string(),
            ));
        }

        if self.signing.secret.len() < 32 {
            return Err(Error::Config(
                "signing.secret must be at least 32 bytes".to_string(),
            ));
        }

        if self.signing.key_id.is_empty() {
            return Err(Error::Config("signing.key_id is empty".to_string()));
        }

        for (i, p) in self.principals.iter().enumerate() {
            if p.id.is_empty() || p.email.is_empty() {
                return Err(Error::Config(format!(
                    "principals[{i}] has an empty id or email"
                )));
            }
            if self.principals[..i].iter().any(|q| q.email == p.email) {
                return Err(Error::Config(format!(
                    "duplicate principal email: {}",
                    p.email
                )));
            }
            if self.principals[..i].iter().any(|q| q.id == p.id) {
                return Err(Error::Config(format!("duplicate principal id: {}", p.id)));
            }
        }

        Ok(())
    }

    /// The browser-facing base URL (falls back to the issuer)
    #[must_use]
    pub fn browser_base(&self) -> &str {
        self.oidc
            .browser_base_url
            .as_deref()
            .unwrap_or(&self.oidc.issuer)
    }
}
