//! Persisted access/refresh token pair.
//!
//! The token store is the single source of truth for credentials: the HTTP
//! client reads it before every request and the realtime client reads it on
//! every (re)connect attempt. Nothing else holds a durable copy.

use std::sync::Arc;

use crate::secrets::{SecretStore, StorageError};

/// Fixed storage keys; part of the persisted-state contract.
pub const ACCESS_TOKEN_KEY: &str = "auth_access_token";
pub const REFRESH_TOKEN_KEY: &str = "auth_refresh_token";

/// A complete credential pair. Constructed only when both halves exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Raw read result; either half may be missing independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl StoredTokens {
    /// A partial pair is treated as no session by the session manager.
    pub fn as_pair(&self) -> Option<TokenPair> {
        match (&self.access_token, &self.refresh_token) {
            (Some(access), Some(refresh)) => Some(TokenPair {
                access_token: access.clone(),
                refresh_token: refresh.clone(),
            }),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Reads and writes the credential pair through the secret store.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn SecretStore>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Persist both tokens, overwriting any existing pair. No token format
    /// validation is performed.
    pub fn save_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), StorageError> {
        self.store.set_secret(ACCESS_TOKEN_KEY, access_token)?;
        self.store.set_secret(REFRESH_TOKEN_KEY, refresh_token)?;
        Ok(())
    }

    /// Read whatever is stored. Missing keys come back as `None`, never as
    /// an error.
    pub fn get_tokens(&self) -> Result<StoredTokens, StorageError> {
        Ok(StoredTokens {
            access_token: self.store.get_secret(ACCESS_TOKEN_KEY)?,
            refresh_token: self.store.get_secret(REFRESH_TOKEN_KEY)?,
        })
    }

    /// The current access token, if any.
    pub fn access_token(&self) -> Result<Option<String>, StorageError> {
        self.store.get_secret(ACCESS_TOKEN_KEY)
    }

    /// The complete pair, or `None` when either half is missing.
    pub fn token_pair(&self) -> Result<Option<TokenPair>, StorageError> {
        Ok(self.get_tokens()?.as_pair())
    }

    /// Remove both keys. Idempotent.
    pub fn clear_tokens(&self) -> Result<(), StorageError> {
        self.store.delete_secret(ACCESS_TOKEN_KEY)?;
        self.store.delete_secret(REFRESH_TOKEN_KEY)?;
        Ok(())
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}
