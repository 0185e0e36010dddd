//! # wabridge-session
//!
//! Owns the single WhatsApp client handle and drives it through
//! `Idle → Initializing → AwaitingScan → Ready` (or `Error`) until it is
//! `Closed`, discarding events from superseded handles by generation.

mod manager;
mod state;


pub use manager::{chat_id, CloseOutcome, InitOutcome, SessionManager};
pub use state::{SessionState, StatusSnapshot, QR_TIMEOUT_SENTINEL};
