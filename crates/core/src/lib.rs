//! Shared domain models and credential storage for the Nestmate client.
//!
//! This crate is dependency-light by design: it holds the secret store
//! abstraction, the persisted token pair, the domain models exchanged with
//! the backend, and the retry helpers used by both the REST and realtime
//! layers.

pub mod models;
pub mod realtime;
pub mod retry;
pub mod secrets;
pub mod tokens;

pub use realtime::RealtimeHandle;
pub use secrets::{FileSecretStore, MemorySecretStore, SecretStore, StorageError};
pub use tokens::{StoredTokens, TokenPair, TokenStore};
