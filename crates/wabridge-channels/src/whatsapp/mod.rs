//! WhatsApp client built on `whatsapp-rust`.
//!
//! Uses the WhatsApp Web protocol (Noise handshake + Signal encryption).
//! Pairing is done by scanning a QR code, like WhatsApp Web.
//! The library's key store lives at `{data_dir}/whatsapp_session/whatsapp.db`.

mod client;
mod events;

#[cfg(test)]
mod tests;

pub use client::{recipient_jid, BotConnection, WhatsAppWebClient};

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use wabridge_core::{
    config::{shellexpand, WhatsAppConfig},
    error::WabridgeError,
    traits::{ClientFactory, EventSink, SessionClient},
};
use whatsapp_rust::bot::Bot;
use whatsapp_rust_sqlite_storage::SqliteStore;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

/// Builds one `whatsapp-rust` bot per session generation.
pub struct WhatsAppWebFactory {
    config: WhatsAppConfig,
    data_dir: String,
}

impl WhatsAppWebFactory {
    pub fn new(config: WhatsAppConfig, data_dir: &str) -> Self {
        Self {
            config,
            data_dir: data_dir.to_string(),
        }
    }

    /// Directory holding the library's key store.
    pub fn session_dir(&self) -> String {
        format!("{}/whatsapp_session", shellexpand(&self.data_dir))
    }

    /// Prepare the key store directory, wiping it first when fresh sessions
    /// are configured so the library always starts with a QR pairing.
    fn prepare_session_dir(&self) -> Result<String, WabridgeError> {
        let session_dir = self.session_dir();
        if self.config.fresh_session && Path::new(&session_dir).exists() {
            info!("deleting previous WhatsApp session at {session_dir}");
            std::fs::remove_dir_all(&session_dir)?;
        }
        std::fs::create_dir_all(&session_dir)?;
        Ok(format!("{session_dir}/whatsapp.db"))
    }
}

#[async_trait]
impl ClientFactory for WhatsAppWebFactory {
    async fn connect(&self, sink: EventSink) -> Result<Arc<dyn SessionClient>, WabridgeError> {
        let generation = sink.generation();
        let db_path = self.prepare_session_dir()?;

        info!(generation, "WhatsApp bot building (session: {db_path})...");

        let backend = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .map_err(|e| WabridgeError::Channel(format!("whatsapp store init failed: {e}")))?,
        );

        let mut bot = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .with_device_props(
                Some(self.config.device_name.clone()),
                None,
                Some(waproto::whatsapp::device_props::PlatformType::Desktop),
            )
            .on_event(move |event, _client| {
                let tx = sink.clone();
                async move {
                    if let Some(event) = events::translate(event) {
                        if !tx.emit(event).await {
                            tracing::debug!(
                                generation = tx.generation(),
                                "session stopped listening, dropping event"
                            );
                        }
                    }
                }
            })
            .build()
            .await
            .map_err(|e| WabridgeError::Channel(format!("whatsapp bot build failed: {e}")))?;

        let client = bot.client();
        let run = bot
            .run()
            .await
            .map_err(|e| WabridgeError::Channel(format!("whatsapp bot run failed: {e}")))?;

        info!(generation, "WhatsApp bot started");
        Ok(Arc::new(WhatsAppWebClient::new(Arc::new(client), run, generation)))
    }
}
