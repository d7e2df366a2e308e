//! Principal directory — read-only lookup of authenticated user entities.
//!
//! Principals are owned by the external user store of the hosting
//! application; this service only reads them. The [`PrincipalDirectory`]
//! trait keeps the lookup substitutable: the default
//! [`ConfigDirectory`] resolves from static configuration, and a remote
//! directory (the hosting application's user API or database) can be
//! dropped in without touching the endpoint handlers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::PrincipalEntry;

/// The authenticated user entity asserted by issued tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Stable identifier (the `sub` claim of issued ID tokens)
    pub id: String,
    /// Email address, unique across the directory
    pub email: String,
    /// Display name
    pub name: String,
}

/// Trait abstracting the principal lookup backend.
///
/// Implementations must be `Send + Sync` because the directory is shared
/// across request-handling tasks. Lookups are side-effect free.
#[async_trait::async_trait]
pub trait PrincipalDirectory: Send + Sync + 'static {
    /// Look up a principal by its stable identifier.
    async fn find_by_id(&self, id: &str) -> Option<Principal>;

    /// Look up a principal by email.
    async fn find_by_email(&self, email: &str) -> Option<Principal>;
}

/// Configuration-backed directory with O(1) lookups on both keys.
pub struct ConfigDirectory {
    by_id: HashMap<String, Principal>,
    by_email: HashMap<String, Principal>,
}

impl ConfigDirectory {
    /// Build the directory from configured principal entries.
    #[must_use]
    pub fn new(entries: &[PrincipalEntry]) -> Self {
        let mut by_id = HashMap::with_capacity(entries.len());
        let mut by_email = HashMap::with_capacity(entries.len());

        for entry in entries {
            let principal = Principal {
                id: entry.id.clone(),
                email: entry.email.clone(),
                name: entry.name.clone(),
            };
            by_id.insert(entry.id.clone(), principal.clone());
            by_email.insert(entry.email.clone(), principal);
        }

        Self { by_id, by_email }
    }

    /// Number of principals in the directory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns `true` when no principals are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[async_trait::async_trait]
impl PrincipalDirectory for ConfigDirectory {
    async fn find_by_id(&self, id: &str) -> Option<Principal> {
        self.by_id.get(id).cloned()
    }

    async fn find_by_email(&self, email: &str) -> Option<Principal> {
        self.by_email.get(email).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<PrincipalEntry> {
        vec![
            PrincipalEntry {
                id: "u-1".to_string(),
                email: "alice@example.com".to_string(),
                name: "Alice".to_string(),
            },
            PrincipalEntry {
                id: "u-2".to_string(),
                email: "bob@example.com".to_string(),
                name: "Bob".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn finds_principal_by_id_and_email() {
        // GIVEN: a directory with two principals
        let dir = ConfigDirectory::new(&entries());

        // WHEN/THEN: both lookup keys resolve to the same principal
        let by_id = dir.find_by_id("u-1").await.unwrap();
        let by_email = dir.find_by_email("alice@example.com").await.unwrap();
        assert_eq!(by_id.id, by_email.id);
        assert_eq!(by_id.name, "Alice");
    }

    #[tokio::test]
    async fn unknown_keys_resolve_to_none() {
        let dir = ConfigDirectory::new(&entries());

        assert!(dir.find_by_id("u-99").await.is_none());
        assert!(dir.find_by_email("mallory@example.com").await.is_none());
    }

    #[test]
    fn empty_directory_reports_empty() {
        let dir = ConfigDirectory::new(&[]);
        assert!(dir.is_empty());
        assert_eq!(dir.len(), 0);
    }
}
