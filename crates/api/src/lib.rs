//! REST client, session management, and reference-data cache for the
//! Nestmate backend.

mod client;
mod error;
mod reference;
mod session;
mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use client::{ApiClient, DEFAULT_TIMEOUT_MS};
pub use error::{ApiError, Result};
pub use reference::{ReferenceDataCache, QUESTIONNAIRE_CACHE_KEY};
pub use session::{SessionManager, SessionState, VerifyFailurePolicy};
pub use types::*;
