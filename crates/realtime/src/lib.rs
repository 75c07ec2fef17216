//! Realtime messaging client for the Nestmate backend.
//!
//! A single WebSocket connection per signed-in user carries chat and
//! presence events; handlers are registered per event kind and outlive
//! the connection itself.

pub mod client;
pub mod error;
pub mod events;
pub mod registry;

pub use client::{ConnectionState, RealtimeClient, RealtimeConfig};
pub use error::{RealtimeError, Result};
pub use events::InboundEvent;
pub use registry::{HandlerGuard, HandlerRegistry, DEFAULT_KIND};
