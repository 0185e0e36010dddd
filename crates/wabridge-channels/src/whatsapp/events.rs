//! Translation of `whatsapp-rust` events into session events.

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wabridge_core::{message::InboundMessage, traits::ClientEvent};
use wacore::types::events::Event;

/// Map a library event onto the session's lifecycle vocabulary.
/// Events the session does not care about yield `None`.
pub(super) fn translate(event: Event) -> Option<ClientEvent> {
    match event {
        Event::PairingQrCode { code, .. } => {
            info!("WhatsApp QR code generated (scan to pair)");
            Some(ClientEvent::Qr(code))
        }
        Event::PairSuccess(_) => {
            info!("WhatsApp pairing successful");
            None
        }
        Event::Connected(_) => {
            info!("WhatsApp connected");
            Some(ClientEvent::Ready)
        }
        Event::Disconnected(_) => {
            warn!("WhatsApp disconnected");
            Some(ClientEvent::Error("whatsapp connection dropped".to_string()))
        }
        Event::LoggedOut(_) => {
            warn!("WhatsApp logged out, session invalidated");
            Some(ClientEvent::Error("whatsapp session logged out".to_string()))
        }
        Event::Message(msg, info) => {
            let Some(text) = message_text(&msg) else {
                debug!("skipping non-text whatsapp message {}", info.id);
                return None;
            };
            Some(ClientEvent::Message(InboundMessage {
                id: Uuid::new_v4(),
                remote_id: Some(info.id.clone()),
                sender_id: info.source.sender.user.clone(),
                chat: info.source.chat.to_string(),
                text,
                timestamp: Utc::now(),
                from_me: info.source.is_from_me,
            }))
        }
        _ => None,
    }
}

/// Extract the text body, unwrapping device-sent, ephemeral and view-once wrappers.
pub(super) fn message_text(msg: &waproto::whatsapp::Message) -> Option<String> {
    let inner = msg
        .device_sent_message
        .as_ref()
        .and_then(|d| d.message.as_deref())
        .or_else(|| {
            msg.ephemeral_message
                .as_ref()
                .and_then(|e| e.message.as_deref())
        })
        .or_else(|| {
            msg.view_once_message
                .as_ref()
                .and_then(|v| v.message.as_deref())
        })
        .unwrap_or(msg);

    inner
        .conversation
        .as_deref()
        .or_else(|| {
            inner
                .extended_text_message
                .as_ref()
                .and_then(|e| e.text.as_deref())
        })
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
