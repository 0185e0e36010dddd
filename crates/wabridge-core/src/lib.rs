//! # wabridge-core
//!
//! Core types, traits, configuration, and error handling for the wabridge service.

pub mod config;
pub mod error;
pub mod message;
pub mod traits;
