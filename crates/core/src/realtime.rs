//! Seam between the session layer and the realtime channel.

use async_trait::async_trait;

/// Lifecycle surface the session manager drives on auth transitions.
///
/// The realtime crate implements this; the session layer only sees the
/// trait, so a realtime failure can stay best-effort without coupling the
/// two crates.
#[async_trait]
pub trait RealtimeHandle: Send + Sync {
    /// Open the realtime connection for the given user. Errors are returned
    /// as strings because the session layer only logs them; the typed error
    /// lives in the implementing crate.
    async fn connect(&self, user_id: i64) -> Result<(), String>;

    /// Close the realtime connection. Idempotent.
    async fn disconnect(&self);
}
