use crate::{
    error::WabridgeError,
    message::{InboundMessage, SendAck},
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Lifecycle event reported by a client handle.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A new login QR code is available (raw QR text).
    Qr(String),
    /// The session is authenticated and can send.
    Ready,
    /// A message was received or created on the linked account.
    Message(InboundMessage),
    /// The handle became unusable (connection drop, logout, crash).
    Error(String),
}

/// A client event tagged with the generation of the handle that produced it.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub generation: u64,
    pub event: ClientEvent,
}

/// Generation-scoped sender handed to a client at construction time.
///
/// Every event the client emits is tagged with the generation the sink was
/// created for, so the session can drop events from superseded handles.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::Sender<SessionEvent>,
}

impl EventSink {
    pub fn new(generation: u64, tx: mpsc::Sender<SessionEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Forward an event. Returns `false` once the session stopped listening.
    pub async fn emit(&self, event: ClientEvent) -> bool {
        self.tx
            .send(SessionEvent {
                generation: self.generation,
                event,
            })
            .await
            .is_ok()
    }
}

/// A live WhatsApp client handle, exclusively owned by the session manager.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Send a text message to a recipient id (`<phone>@c.us` or a chat JID).
    async fn send_text(&self, recipient: &str, text: &str) -> Result<SendAck, WabridgeError>;

    /// Tear the client down and release its resources. Must tolerate repeated calls.
    async fn destroy(&self) -> Result<(), WabridgeError>;
}

/// Builds client handles.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Construct a headless client, subscribe it to `events`, and issue its
    /// asynchronous connect. Returns without waiting for authentication.
    async fn connect(&self, events: EventSink) -> Result<Arc<dyn SessionClient>, WabridgeError>;
}

/// Renders raw QR text into a displayable payload (a data URI).
#[async_trait]
pub trait QrEncoder: Send + Sync {
    async fn encode(&self, qr: &str) -> Result<String, WabridgeError>;
}
