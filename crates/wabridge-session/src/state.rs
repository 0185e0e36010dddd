//! The session record and its snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::task::AbortHandle;
use wabridge_core::{error::SessionError, traits::SessionClient};

/// Reported as the QR code while a session is stuck in `Initializing`.
pub const QR_TIMEOUT_SENTINEL: &str = "timeout";

/// Lifecycle state of the single WhatsApp session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Initializing,
    /// A QR code is waiting to be scanned.
    AwaitingScan,
    Ready,
    Closed,
    Error,
}

impl SessionState {
    /// Whether a client handle is (or is about to be) live in this state.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Initializing | Self::AwaitingScan | Self::Ready)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::AwaitingScan => "awaiting_scan",
            Self::Ready => "ready",
            Self::Closed => "closed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the session, safe to hand to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub ready: bool,
    pub qr_code: Option<String>,
    pub state: SessionState,
    pub generation: u64,
    pub error: Option<String>,
    pub ready_since: Option<DateTime<Utc>>,
}

/// Mutable session record. Only touched under the manager's state lock.
#[derive(Default)]
pub(crate) struct Session {
    pub(crate) state: SessionState,
    pub(crate) qr_payload: Option<String>,
    pub(crate) handle: Option<Arc<dyn SessionClient>>,
    pub(crate) generation: u64,
    pub(crate) last_error: Option<String>,
    pub(crate) timed_out: bool,
    pub(crate) ready_since: Option<DateTime<Utc>>,
    pub(crate) timer: Option<AbortHandle>,
    pub(crate) pump: Option<AbortHandle>,
}

impl Session {
    /// Start a new generation in `Initializing`. Returns the superseded handle.
    pub(crate) fn begin(&mut self) -> Option<Arc<dyn SessionClient>> {
        let previous = self.supersede();
        self.state = SessionState::Initializing;
        previous
    }

    /// End the session. A session that was ever started lands in `Closed`;
    /// one that never was stays `Idle`. Returns the handle that must be torn down.
    pub(crate) fn reset(&mut self) -> Option<Arc<dyn SessionClient>> {
        let previous = self.supersede();
        if self.state != SessionState::Idle {
            self.state = SessionState::Closed;
        }
        previous
    }

    fn supersede(&mut self) -> Option<Arc<dyn SessionClient>> {
        self.generation += 1;
        self.cancel_timer();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.qr_payload = None;
        self.last_error = None;
        self.timed_out = false;
        self.ready_since = None;
        self.handle.take()
    }

    pub(crate) fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    pub(crate) fn ensure_current(&self, generation: u64) -> Result<(), SessionError> {
        if generation == self.generation {
            Ok(())
        } else {
            Err(SessionError::StaleEvent {
                event: generation,
                current: self.generation,
            })
        }
    }

    pub(crate) fn snapshot(&self) -> StatusSnapshot {
        let qr_code = match self.state {
            SessionState::AwaitingScan => self.qr_payload.clone(),
            SessionState::Initializing if self.timed_out => Some(QR_TIMEOUT_SENTINEL.to_string()),
            _ => None,
        };
        StatusSnapshot {
            ready: self.state == SessionState::Ready,
            qr_code,
            state: self.state,
            generation: self.generation,
            error: self.last_error.clone(),
            ready_since: self.ready_since,
        }
    }
}
