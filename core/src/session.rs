//! Explicit session state.
//!
//! The bearer token lives in a `Session` value the host owns and hands to
//! every `build_*` call that needs authentication. Persisting it between runs
//! is the job of a `TokenStore`; the core ships an in-memory store and hosts
//! provide durable ones.

use std::sync::Mutex;

use thiserror::Error;

use crate::types::TokenResponse;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("token store unavailable: {0}")]
    Unavailable(String),
}

/// Durable home of the single session token.
pub trait TokenStore {
    fn load(&self) -> Result<Option<String>, StoreError>;
    fn save(&self, token: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// Process-local store, mostly useful in tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        let guard = self
            .token
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, token: &str) -> Result<(), StoreError> {
        let mut guard = self
            .token
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self
            .token
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}

/// The caller's authentication state. Blank tokens count as absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.trim().is_empty() {
            return Self::anonymous();
        }
        Self { token: Some(token) }
    }

    pub fn restore(store: &dyn TokenStore) -> Result<Self, StoreError> {
        Ok(store.load()?.map(Self::with_token).unwrap_or_default())
    }

    /// Write the current token to `store`, or clear it when signed out.
    pub fn persist(&self, store: &dyn TokenStore) -> Result<(), StoreError> {
        match &self.token {
            Some(token) => store.save(token),
            None => store.clear(),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn sign_in(&mut self, response: &TokenResponse) {
        *self = Self::with_token(response.access_token.clone());
    }

    pub fn sign_out(&mut self) {
        self.token = None;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_token_is_anonymous() {
        assert!(!Session::with_token("").is_authenticated());
        assert!(!Session::with_token("   ").is_authenticated());
        assert!(Session::with_token("abc").is_authenticated());
    }

    #[test]
    fn sign_in_and_out() {
        let mut session = Session::anonymous();
        session.sign_in(&TokenResponse {
            access_token: "tok".to_string(),
            token_type: "bearer".to_string(),
        });
        assert_eq!(session.token(), Some("tok"));
        session.sign_out();
        assert_eq!(session.token(), None);
    }

    #[test]
    fn persist_and_restore_through_store() {
        let store = MemoryTokenStore::new();
        Session::with_token("tok").persist(&store).unwrap();
        assert_eq!(Session::restore(&store).unwrap().token(), Some("tok"));

        Session::anonymous().persist(&store).unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(!Session::restore(&store).unwrap().is_authenticated());
    }

    #[test]
    fn debug_output_hides_token() {
        let rendered = format!("{:?}", Session::with_token("secret-token"));
        assert!(!rendered.contains("secret-token"));
    }
}
