//! Domain models exchanged with the backend.
//!
//! Wire format is the backend's snake_case JSON, so the Rust field names
//! map directly with no rename attributes.

mod apartment;
mod chat;
mod reference;
mod user;

pub use apartment::*;
pub use chat::*;
pub use reference::*;
pub use user::*;
