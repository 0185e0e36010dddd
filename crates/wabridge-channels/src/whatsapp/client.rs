//! The live client handle owned by the session manager.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::info;
use wabridge_core::{error::WabridgeError, message::SendAck, traits::SessionClient};
use wacore_binary::jid::Jid;
use whatsapp_rust::client::Client;

/// Legacy user server used by the `<phone>@c.us` addressing convention.
const LEGACY_USER_SERVER: &str = "c.us";
const USER_SERVER: &str = "s.whatsapp.net";

/// Parse a recipient id into a JID, mapping `@c.us` onto the
/// `@s.whatsapp.net` server the protocol expects.
pub fn recipient_jid(recipient: &str) -> Result<Jid, WabridgeError> {
    let normalized = match recipient.rsplit_once('@') {
        Some((user, LEGACY_USER_SERVER)) => format!("{user}@{USER_SERVER}"),
        Some(_) => recipient.to_string(),
        None => format!("{recipient}@{USER_SERVER}"),
    };
    normalized
        .parse()
        .map_err(|e| WabridgeError::Channel(format!("invalid whatsapp JID '{recipient}': {e}")))
}

/// The part of the library client a session handle drives.
#[async_trait]
pub trait BotConnection: Send + Sync {
    async fn send(
        &self,
        to: Jid,
        message: waproto::whatsapp::Message,
    ) -> Result<String, WabridgeError>;

    /// Stop the keepalive loop and close the transport.
    async fn disconnect(&self);

    fn is_connected(&self) -> bool;
}

#[async_trait]
impl BotConnection for Arc<Client> {
    async fn send(
        &self,
        to: Jid,
        message: waproto::whatsapp::Message,
    ) -> Result<String, WabridgeError> {
        self.send_message(to, message)
            .await
            .map_err(|e| WabridgeError::Channel(format!("whatsapp send failed: {e}")))
    }

    async fn disconnect(&self) {
        Client::disconnect(self).await;
    }

    fn is_connected(&self) -> bool {
        Client::is_connected(self.as_ref())
    }
}

/// A running `whatsapp-rust` bot.
pub struct WhatsAppWebClient {
    client: Arc<dyn BotConnection>,
    run: Mutex<Option<JoinHandle<()>>>,
    generation: u64,
}

impl WhatsAppWebClient {
    pub fn new(client: Arc<dyn BotConnection>, run: JoinHandle<()>, generation: u64) -> Self {
        Self {
            client,
            run: Mutex::new(Some(run)),
            generation,
        }
    }
}

#[async_trait]
impl SessionClient for WhatsAppWebClient {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<SendAck, WabridgeError> {
        let jid = recipient_jid(recipient)?;
        let msg = waproto::whatsapp::Message {
            conversation: Some(text.to_string()),
            ..Default::default()
        };
        let message_id = self.client.send(jid, msg).await?;
        Ok(SendAck { message_id })
    }

    async fn destroy(&self) -> Result<(), WabridgeError> {
        let run = self
            .run
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(run) = run else {
            return Ok(());
        };

        // Aborting the run task alone leaves the keepalive and read loops
        // holding the socket open.
        self.client.disconnect().await;
        run.abort();
        info!(
            generation = self.generation,
            connected = self.client.is_connected(),
            "WhatsApp bot stopped"
        );
        Ok(())
    }
}
