//! Session manager: serializes every mutation of the session record and
//! translates client events into state transitions.

use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};
use wabridge_core::{
    config::SessionConfig,
    error::SessionError,
    message::{InboundMessage, SendAck},
    traits::{ClientEvent, ClientFactory, EventSink, QrEncoder, SessionClient, SessionEvent},
};

use crate::state::{Session, SessionState, StatusSnapshot};

const PING: &str = "!ping";
const PONG: &str = "pong";

/// Result of [`SessionManager::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutcome {
    pub accepted: bool,
    pub message: String,
}

/// Result of [`SessionManager::close`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseOutcome {
    pub message: String,
}

/// Recipient id for a phone number, in the `<phone>@c.us` convention.
///
/// Ids that already carry a server part are passed through.
pub fn chat_id(phone: &str) -> String {
    let phone = phone.trim();
    if phone.contains('@') {
        phone.to_string()
    } else {
        format!("{}@c.us", phone.trim_start_matches('+'))
    }
}

struct Shared {
    factory: Arc<dyn ClientFactory>,
    encoder: Arc<dyn QrEncoder>,
    config: SessionConfig,
    session: Mutex<Session>,
    /// Serializes `initialize` calls. Never taken by `status` or `close`.
    lifecycle: tokio::sync::Mutex<()>,
}

/// Owner of the single WhatsApp session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<Shared>,
}

impl SessionManager {
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        encoder: Arc<dyn QrEncoder>,
        config: SessionConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                factory,
                encoder,
                config,
                session: Mutex::new(Session::default()),
                lifecycle: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Lock the session record. A poisoned lock still holds a consistent
    /// record because no transition panics midway.
    fn session(&self) -> MutexGuard<'_, Session> {
        self.shared
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a new session, tearing down any active one first.
    ///
    /// Returns as soon as the client's connect has been issued; progress is
    /// observed through [`status`](Self::status).
    pub async fn initialize(&self) -> InitOutcome {
        let _lifecycle = self.shared.lifecycle.lock().await;

        let (generation, previous, restarting) = {
            let mut s = self.session();
            let restarting = s.state.is_active();
            let previous = s.begin();
            let generation = s.generation;
            s.timer = self.spawn_timer(generation);
            (generation, previous, restarting)
        };

        if let Some(old) = previous {
            info!(generation, "tearing down previous whatsapp client");
            teardown(old).await;
        }

        info!(generation, "initializing whatsapp client");
        let (tx, rx) = mpsc::channel(self.shared.config.event_buffer.max(1));
        let client = match self
            .shared
            .factory
            .connect(EventSink::new(generation, tx))
            .await
        {
            Ok(client) => client,
            Err(e) => {
                let cause = e.to_string();
                error!(generation, "whatsapp client failed to start: {cause}");
                let _ = self.on_error(generation, &cause).await;
                return InitOutcome {
                    accepted: false,
                    message: SessionError::LibraryInit(cause).to_string(),
                };
            }
        };

        let installed = {
            let mut s = self.session();
            if s.ensure_current(generation).is_ok() && s.state == SessionState::Initializing {
                s.handle = Some(Arc::clone(&client));
                s.pump = Some(self.spawn_pump(rx));
                true
            } else {
                false
            }
        };

        if !installed {
            warn!(generation, "initialization superseded before the client was installed");
            teardown(client).await;
            return InitOutcome {
                accepted: false,
                message: "Initialization was superseded".to_string(),
            };
        }

        InitOutcome {
            accepted: true,
            message: if restarting {
                "Restarting WhatsApp client...".to_string()
            } else {
                "Initializing WhatsApp client...".to_string()
            },
        }
    }

    /// Tear down the active session, if any, and move to `Closed`.
    pub async fn close(&self) -> CloseOutcome {
        let (previous, generation) = {
            let mut s = self.session();
            let previous = s.reset();
            (previous, s.generation)
        };

        match previous {
            Some(client) => {
                info!(generation, "closing whatsapp session");
                teardown(client).await;
                CloseOutcome {
                    message: "WhatsApp session closed".to_string(),
                }
            }
            None => CloseOutcome {
                message: "No active WhatsApp session".to_string(),
            },
        }
    }

    /// Current snapshot. Never waits on the client library.
    pub fn status(&self) -> StatusSnapshot {
        self.session().snapshot()
    }

    /// Send one text message. No retry: a failed dispatch is returned as-is.
    pub async fn send_message(&self, phone: &str, message: &str) -> Result<SendAck, SessionError> {
        if phone.trim().is_empty() || message.trim().is_empty() {
            return Err(SessionError::Validation(
                "phone and message parameters are required".to_string(),
            ));
        }

        let client = {
            let s = self.session();
            match (s.state, s.handle.as_ref()) {
                (SessionState::Ready, Some(client)) => Arc::clone(client),
                _ => return Err(SessionError::NotReady),
            }
        };

        let recipient = chat_id(phone);
        let ack = client
            .send_text(&recipient, message)
            .await
            .map_err(|e| SessionError::SendFailed(e.to_string()))?;
        info!("message sent to {recipient} (id {})", ack.message_id);
        Ok(ack)
    }

    /// Route one client event to its handler.
    pub async fn dispatch(&self, event: SessionEvent) {
        let generation = event.generation;
        let result = match event.event {
            ClientEvent::Qr(qr) => self.on_qr_received(generation, &qr).await,
            ClientEvent::Ready => self.on_ready(generation),
            ClientEvent::Message(msg) => self.on_message_received(generation, msg).await,
            ClientEvent::Error(cause) => self.on_error(generation, &cause).await,
        };
        if let Err(e) = result {
            debug!("dropped event: {e}");
        }
    }

    pub async fn on_qr_received(&self, generation: u64, qr: &str) -> Result<(), SessionError> {
        self.session().ensure_current(generation)?;

        let payload = match self.shared.encoder.encode(qr).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(generation, "failed to render QR code: {e}");
                return Ok(());
            }
        };

        let mut s = self.session();
        s.ensure_current(generation)?;
        match s.state {
            SessionState::Initializing | SessionState::AwaitingScan => {
                s.state = SessionState::AwaitingScan;
                s.qr_payload = Some(payload);
                s.timed_out = false;
                s.cancel_timer();
                info!(generation, "QR code received, waiting for scan");
            }
            other => debug!(generation, "ignoring QR code in state {other}"),
        }
        Ok(())
    }

    pub fn on_ready(&self, generation: u64) -> Result<(), SessionError> {
        let mut s = self.session();
        s.ensure_current(generation)?;
        if s.handle.is_none() {
            warn!(generation, "ready event without a live client");
            return Ok(());
        }
        s.state = SessionState::Ready;
        s.qr_payload = None;
        s.timed_out = false;
        s.ready_since = Some(Utc::now());
        s.cancel_timer();
        info!(generation, "WhatsApp client is ready");
        Ok(())
    }

    pub async fn on_message_received(
        &self,
        generation: u64,
        message: InboundMessage,
    ) -> Result<(), SessionError> {
        let client = {
            let s = self.session();
            s.ensure_current(generation)?;
            s.handle.clone()
        };

        debug!(
            "message from {} in {}: {}",
            message.sender_id, message.chat, message.text
        );

        if !self.shared.config.auto_reply || message.text != PING {
            return Ok(());
        }
        let Some(client) = client else {
            warn!(generation, "cannot answer ping without a live client");
            return Ok(());
        };
        match client.send_text(&message.chat, PONG).await {
            Ok(ack) => info!("answered ping in {} (id {})", message.chat, ack.message_id),
            Err(e) => warn!("ping reply to {} failed: {e}", message.chat),
        }
        Ok(())
    }

    pub async fn on_error(&self, generation: u64, cause: &str) -> Result<(), SessionError> {
        let previous = {
            let mut s = self.session();
            s.ensure_current(generation)?;
            if matches!(s.state, SessionState::Idle | SessionState::Closed) {
                debug!(generation, "error after close ignored: {cause}");
                return Ok(());
            }
            s.state = SessionState::Error;
            s.last_error = Some(cause.to_string());
            s.qr_payload = None;
            s.timed_out = false;
            s.ready_since = None;
            s.cancel_timer();
            s.handle.take()
        };
        error!(generation, "whatsapp session failed: {cause}");
        if let Some(client) = previous {
            teardown(client).await;
        }
        Ok(())
    }

    /// Fired by the generation's timer when neither QR nor ready arrived in time.
    pub fn on_qr_timeout(&self, generation: u64) -> Result<(), SessionError> {
        let mut s = self.session();
        s.ensure_current(generation)?;
        s.timer = None;
        if s.state == SessionState::Initializing {
            s.timed_out = true;
            warn!(
                generation,
                "no QR code or ready event after {}s",
                self.shared.config.qr_timeout_secs
            );
        }
        Ok(())
    }

    fn spawn_timer(&self, generation: u64) -> Option<AbortHandle> {
        let timeout = self.shared.config.qr_timeout()?;
        let manager = self.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Err(e) = manager.on_qr_timeout(generation) {
                debug!("dropped timeout: {e}");
            }
        });
        Some(task.abort_handle())
    }

    fn spawn_pump(&self, mut rx: mpsc::Receiver<SessionEvent>) -> AbortHandle {
        let manager = self.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                manager.dispatch(event).await;
            }
            debug!("event stream closed");
        });
        task.abort_handle()
    }
}

async fn teardown(client: Arc<dyn SessionClient>) {
    if let Err(e) = client.destroy().await {
        warn!("whatsapp client teardown failed: {e}");
    }
}
