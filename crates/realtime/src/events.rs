//! Typed inbound frames.
//!
//! Every frame is a JSON object with a `type` discriminator. Kinds the
//! client does not recognize are preserved as `Unknown` and routed to the
//! `default` handler list instead of being dropped.

use nestmate_core::models::{ChatMessage, ChatRoom};
use serde::Deserialize;
use serde_json::Value;

use crate::error::RealtimeError;

/// Wire names of the recognized frame kinds.
pub const KNOWN_KINDS: [&str; 6] = [
    "room_update",
    "read_receipt",
    "chat.message.notification",
    "chat.user.entered",
    "user_presence",
    "new_message",
];

/// An inbound realtime event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum InboundEvent {
    /// A room's metadata changed (participants, last message, unread count).
    #[serde(rename = "room_update")]
    RoomUpdate { room: ChatRoom },

    /// Messages were read by another participant.
    #[serde(rename = "read_receipt")]
    ReadReceipt {
        message_ids: Vec<i64>,
        reader_id: i64,
        room_id: i64,
    },

    /// Push-style notification about a message outside the open room.
    #[serde(rename = "chat.message.notification")]
    MessageNotification {
        chat_id: i64,
        sender_id: i64,
        message: ChatMessage,
    },

    /// A user opened the room.
    #[serde(rename = "chat.user.entered")]
    UserEntered { user_id: i64, room_id: i64 },

    /// Presence change for a user.
    #[serde(rename = "user_presence")]
    UserPresence {
        user_id: i64,
        is_online: bool,
        room_id: i64,
    },

    /// A new message in the currently relevant room.
    #[serde(rename = "new_message")]
    NewMessage { message: ChatMessage },

    /// Unrecognized kind, preserved verbatim for `default` handlers.
    #[serde(skip)]
    Unknown { kind: String, payload: Value },
}

impl InboundEvent {
    /// The wire discriminator for this event.
    pub fn kind(&self) -> &str {
        match self {
            Self::RoomUpdate { .. } => "room_update",
            Self::ReadReceipt { .. } => "read_receipt",
            Self::MessageNotification { .. } => "chat.message.notification",
            Self::UserEntered { .. } => "chat.user.entered",
            Self::UserPresence { .. } => "user_presence",
            Self::NewMessage { .. } => "new_message",
            Self::Unknown { kind, .. } => kind,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }
}

/// Parse a text frame.
///
/// Frames with an unrecognized `type` come back as `Unknown`; frames that
/// claim a known kind but have malformed fields are protocol errors, as is
/// anything that is not a JSON object with a string `type`.
pub fn parse_frame(text: &str) -> Result<InboundEvent, RealtimeError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| RealtimeError::protocol(format!("invalid JSON frame: {}", e)))?;

    let kind = value
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RealtimeError::protocol("frame missing string `type` field"))?
        .to_string();

    if !KNOWN_KINDS.contains(&kind.as_str()) {
        return Ok(InboundEvent::Unknown { kind, payload: value });
    }

    serde_json::from_value::<InboundEvent>(value)
        .map_err(|e| RealtimeError::protocol(format!("malformed `{}` frame: {}", kind, e)))
}
