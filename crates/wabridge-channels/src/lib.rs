//! # wabridge-channels
//!
//! The WhatsApp Web client behind the session manager, and the QR renderer.

pub mod qr;
pub mod whatsapp;
