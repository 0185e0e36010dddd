use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message observed by the WhatsApp client (inbound or created by us).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: Uuid,
    /// Platform message id, if the library reported one.
    pub remote_id: Option<String>,
    /// Phone number (user part of the sender JID).
    pub sender_id: String,
    /// Chat the message belongs to; replies go here.
    pub chat: String,
    /// Message text content.
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Whether this message was created by the linked account itself.
    #[serde(default)]
    pub from_me: bool,
}

impl InboundMessage {
    /// Build a text message from a sender in a chat, stamped now.
    pub fn text(sender_id: &str, chat: &str, text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote_id: None,
            sender_id: sender_id.to_string(),
            chat: chat.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
            from_me: false,
        }
    }
}

/// Acknowledgment returned by the library for a dispatched message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendAck {
    /// Library-assigned message id.
    pub message_id: String,
}
