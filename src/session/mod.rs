//! Token persistence for the relying party.
//!
//! One key holds the serialized `TokenSet`; it is overwritten or removed as a
//! whole. A second key holds the pending authorization (state and PKCE
//! verifier) between `/login` and `/callback`.

pub mod storage;

use crate::auth::token::TokenSet;
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, sync::Arc};
use thiserror::Error;
use tracing::{debug, warn};

pub use storage::{FileStorage, MemoryStorage, Storage};

const TOKENS_KEY: &str = "tokens";
const PENDING_KEY: &str = "pending_authorization";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session data is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("session storage lock poisoned")]
    Poisoned,
}

/// What the relying party remembers between redirecting to the
/// authorization server and handling the callback.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub state: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

impl fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAuthorization")
            .field("state", &self.state)
            .field("code_verifier", &"[redacted]")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStorage::new(path)))
    }

    /// Replace the stored token set.
    ///
    /// # Errors
    /// Returns `SessionError` if the storage cannot be written.
    pub fn save(&self, tokens: &TokenSet) -> Result<(), SessionError> {
        self.storage.set(TOKENS_KEY, serde_json::to_string(tokens)?)?;
        debug!("Token set stored");
        Ok(())
    }

    /// # Errors
    /// Returns `SessionError` if the storage cannot be read or holds garbage.
    pub fn load(&self) -> Result<Option<TokenSet>, SessionError> {
        self.storage
            .get(TOKENS_KEY)?
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(SessionError::from)
    }

    /// # Errors
    /// Returns `SessionError` if the storage cannot be written.
    pub fn clear(&self) -> Result<(), SessionError> {
        self.storage.remove(TOKENS_KEY)?;
        debug!("Token set cleared");
        Ok(())
    }

    /// True when a non-empty access token is stored. Unreadable storage
    /// counts as signed out.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// `Bearer <access_token>` when authenticated.
    #[must_use]
    pub fn authorization_header(&self) -> Option<String> {
        self.access_token().map(|token| format!("Bearer {token}"))
    }

    fn access_token(&self) -> Option<String> {
        match self.load() {
            Ok(tokens) => tokens
                .map(|tokens| tokens.access_token)
                .filter(|token| !token.is_empty()),
            Err(err) => {
                warn!("Failed to read session: {err}");
                None
            }
        }
    }

    /// # Errors
    /// Returns `SessionError` if the storage cannot be written.
    pub fn save_pending(&self, pending: &PendingAuthorization) -> Result<(), SessionError> {
        self.storage.set(PENDING_KEY, serde_json::to_string(pending)?)
    }

    /// Remove and return the pending authorization. It is gone afterwards
    /// whatever the caller does with it.
    ///
    /// # Errors
    /// Returns `SessionError` if the storage cannot be written or holds garbage.
    pub fn take_pending(&self) -> Result<Option<PendingAuthorization>, SessionError> {
        self.storage
            .remove(PENDING_KEY)?
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(SessionError::from)
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_clear() {
        let store = SessionStore::in_memory();
        assert!(!store.is_authenticated());
        assert_eq!(store.authorization_header(), None);

        store.save(&TokenSet::bearer("at-1")).unwrap();
        store.save(&TokenSet::bearer("at-2")).unwrap();
        assert_eq!(store.load().unwrap().map(|t| t.access_token).as_deref(), Some("at-2"));
        assert!(store.is_authenticated());
        assert_eq!(store.authorization_header().as_deref(), Some("Bearer at-2"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn empty_access_token_is_not_authenticated() {
        let store = SessionStore::in_memory();
        store.save(&TokenSet::bearer("")).unwrap();
        assert!(!store.is_authenticated());
    }

    #[test]
    fn pending_authorization_is_taken_once() {
        let store = SessionStore::in_memory();
        let pending = PendingAuthorization {
            state: "xyz".to_string(),
            code_verifier: "verifier".to_string(),
            redirect_uri: "http://localhost:3000/callback".to_string(),
        };
        store.save_pending(&pending).unwrap();

        assert_eq!(store.take_pending().unwrap(), Some(pending));
        assert_eq!(store.take_pending().unwrap(), None);
    }

    #[test]
    fn file_backed_store_persists_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dauth-session.json");

        SessionStore::file(&path).save(&TokenSet::bearer("at")).unwrap();
        assert!(SessionStore::file(&path).is_authenticated());

        SessionStore::file(&path).clear().unwrap();
        assert!(!SessionStore::file(&path).is_authenticated());
    }
}
