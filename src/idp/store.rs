//! Code store — single-use authorization codes for pending grants.
//!
//! The [`CodeStore`] trait abstracts over storage backends. The only current
//! implementation is [`InMemoryCodeStore`], backed by a `DashMap` with lazy
//! eviction on consume plus a background sweeper.
//!
//! # Design
//!
//! `consume` is an atomic check-and-remove: under any number of concurrent
//! callers presenting the same code, exactly one receives the grant and all
//! others observe `None`. Anything uncertain — absent, already consumed,
//! expired — denies the exchange.
//!
//! The in-memory store is process-local: codes do not survive a restart and
//! are invisible to other instances. For a multi-instance deployment,
//! substitute a shared store (e.g. Redis with an atomic `GETDEL`) behind the
//! same trait; no endpoint handler changes are required.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use dashmap::DashMap;
use rand::RngExt;
use tracing::debug;

/// A pending authorization grant, keyed by its single-use code.
#[derive(Debug, Clone)]
pub struct PendingGrant {
    /// The single-use code (also the store key)
    pub code: String,
    /// Principal the code is bound to
    pub principal_id: String,
    /// Scope requested at authorization time
    pub scope: Vec<String>,
    /// Nonce from the authorize request, echoed into the ID token
    pub nonce: Option<String>,
    /// Created-at (Unix epoch seconds)
    pub created_at: u64,
    /// Expires-at (Unix epoch seconds)
    pub expires_at: u64,
}

impl PendingGrant {
    /// Returns `true` if the grant has passed its expiry time.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        now >= self.expires_at
    }
}

/// Trait abstracting the authorization-code storage backend.
///
/// Implementations must be `Send + Sync` because the store is shared across
/// request-handling tasks, and `consume` must be atomic: a code that has
/// been consumed or has expired never satisfies a second exchange.
#[async_trait::async_trait]
pub trait CodeStore: Send + Sync + 'static {
    /// Generate a fresh single-use code and register the pending grant.
    async fn put(&self, principal_id: &str, scope: Vec<String>, nonce: Option<String>) -> String;

    /// Atomically remove and return the grant for `code`.
    ///
    /// Returns `None` if the code is unknown, already consumed, or expired.
    async fn consume(&self, code: &str) -> Option<PendingGrant>;

    /// Remove all expired grants. Called periodically by the sweeper.
    async fn sweep_expired(&self) -> usize;
}

/// In-memory code store backed by a `DashMap`.
pub struct InMemoryCodeStore {
    codes: DashMap<String, PendingGrant>,
    ttl: Duration,
}

impl InMemoryCodeStore {
    /// Create an empty store issuing codes valid for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            codes: DashMap::new(),
            ttl,
        }
    }

    /// Generate a cryptographically random single-use code.
    ///
    /// Format: `ac_<43-char URL-safe base64>` (256 bits of entropy). The
    /// `ac_` prefix makes codes greppable in logs and detectable by secret
    /// scanners.
    #[must_use]
    pub fn generate_code() -> String {
        let random_bytes: [u8; 32] = rand::rng().random();
        format!("ac_{}", URL_SAFE_NO_PAD.encode(random_bytes))
    }

    /// Number of pending grants (expired entries included until swept).
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns `true` when no grants are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[async_trait::async_trait]
impl CodeStore for InMemoryCodeStore {
    async fn put(&self, principal_id: &str, scope: Vec<String>, nonce: Option<String>) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();

        let code = Self::generate_code();
        let grant = PendingGrant {
            code: code.clone(),
            principal_id: principal_id.to_string(),
            scope,
            nonce,
            created_at: now,
            expires_at: now + self.ttl.as_secs(),
        };

        self.codes.insert(code.clone(), grant);
        code
    }

    async fn consume(&self, code: &str) -> Option<PendingGrant> {
        // DashMap::remove is the atomic check-and-remove: exactly one of any
        // number of concurrent callers gets the entry.
        let (_, grant) = self.codes.remove(code)?;

        if grant.is_expired() {
            debug!(principal = %grant.principal_id, "Discarded expired authorization code");
            return None;
        }

        Some(grant)
    }

    async fn sweep_expired(&self) -> usize {
        let expired: Vec<String> = self
            .codes
            .iter()
            .filter(|e| e.value().is_expired())
            .map(|e| e.key().clone())
            .collect();

        let count = expired.len();
        for code in expired {
            self.codes.remove(&code);
        }
        count
    }
}

/// Spawn a background task that sweeps expired grants every `interval`.
///
/// The task exits when the `shutdown` receiver fires.
pub fn spawn_sweeper(
    store: Arc<dyn CodeStore>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let swept = store.sweep_expired().await;
                    if swept > 0 {
                        debug!(count = swept, "Swept expired authorization codes");
                    }
                }
                _ = shutdown.recv() => {
                    debug!("Code sweeper shutting down");
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_scope() -> Vec<String> {
        vec![
            "openid".to_string(),
            "profile".to_string(),
            "email".to_string(),
        ]
    }

    #[tokio::test]
    async fn put_then_consume_returns_the_grant() {
        // GIVEN: a store with one pending grant
        let store = InMemoryCodeStore::new(Duration::from_secs(600));
        let code = store.put("u-1", default_scope(), None).await;

        // WHEN: the code is consumed
        let grant = store.consume(&code).await.unwrap();

        // THEN: the grant matches what was stored
        assert_eq!(grant.principal_id, "u-1");
        assert_eq!(grant.scope, default_scope());
        assert!(grant.nonce.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn second_consume_of_the_same_code_fails() {
        let store = InMemoryCodeStore::new(Duration::from_secs(600));
        let code = store.put("u-1", default_scope(), None).await;

        assert!(store.consume(&code).await.is_some());
        assert!(store.consume(&code).await.is_none());
    }

    #[tokio::test]
    async fn unknown_code_consumes_to_none() {
        let store = InMemoryCodeStore::new(Duration::from_secs(600));
        assert!(store.consume("ac_nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn expired_code_consumes_to_none() {
        // GIVEN: a store issuing instantly-expired codes
        let store = InMemoryCodeStore::new(Duration::ZERO);
        let code = store.put("u-1", default_scope(), None).await;

        // THEN: the grant is never returned, even on first consume
        assert!(store.consume(&code).await.is_none());
    }

    #[tokio::test]
    async fn nonce_is_preserved_in_the_grant() {
        let store = InMemoryCodeStore::new(Duration::from_secs(600));
        let code = store
            .put("u-1", default_scope(), Some("n-42".to_string()))
            .await;

        let grant = store.consume(&code).await.unwrap();
        assert_eq!(grant.nonce.as_deref(), Some("n-42"));
    }

    #[tokio::test]
    async fn exactly_one_of_many_concurrent_consumers_wins() {
        // GIVEN: one code raced by many consumers
        let store: Arc<InMemoryCodeStore> =
            Arc::new(InMemoryCodeStore::new(Duration::from_secs(600)));
        let code = store.put("u-1", default_scope(), None).await;

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..32 {
            let store = Arc::clone(&store);
            let code = code.clone();
            tasks.spawn(async move { store.consume(&code).await.is_some() });
        }

        // WHEN: all consumers have finished
        let mut winners = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap() {
                winners += 1;
            }
        }

        // THEN: exactly one succeeded
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn consuming_one_code_leaves_others_intact() {
        let store = InMemoryCodeStore::new(Duration::from_secs(600));
        let first = store.put("u-1", default_scope(), None).await;
        let second = store.put("u-2", default_scope(), None).await;

        assert!(store.consume(&first).await.is_some());
        let grant = store.consume(&second).await.unwrap();
        assert_eq!(grant.principal_id, "u-2");
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_grants() {
        // GIVEN: one live and two instantly-expired grants
        let live = InMemoryCodeStore::new(Duration::from_secs(600));
        let code = live.put("u-1", default_scope(), None).await;

        let expired = InMemoryCodeStore::new(Duration::ZERO);
        expired.put("u-2", default_scope(), None).await;
        expired.put("u-3", default_scope(), None).await;

        // WHEN/THEN: sweeps reclaim exactly the expired entries
        assert_eq!(live.sweep_expired().await, 0);
        assert_eq!(expired.sweep_expired().await, 2);
        assert!(expired.is_empty());
        assert!(live.consume(&code).await.is_some());
    }

    #[test]
    fn generated_codes_have_prefix_and_entropy() {
        let code = InMemoryCodeStore::generate_code();
        assert!(code.starts_with("ac_"));
        // 32 bytes = 43 base64url chars
        assert_eq!(code.len(), 3 + 43);

        assert_ne!(
            InMemoryCodeStore::generate_code(),
            InMemoryCodeStore::generate_code()
        );
    }
}
