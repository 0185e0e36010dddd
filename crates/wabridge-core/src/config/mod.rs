mod defaults;


use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::WabridgeError;
use defaults::*;

/// Top-level wabridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub wabridge: GeneralConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Bearer token for API authentication. Empty = no auth (for local-only use).
    #[serde(default)]
    pub api_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            api_key: String::new(),
        }
    }
}

/// Session lifecycle tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds to wait for the first QR or ready event before the status
    /// reports the `"timeout"` sentinel. `0` disables the timer.
    #[serde(default = "default_qr_timeout_secs")]
    pub qr_timeout_secs: u64,
    /// Answer `!ping` with `pong`.
    #[serde(default = "default_true")]
    pub auto_reply: bool,
    /// Capacity of the per-session event queue.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            qr_timeout_secs: default_qr_timeout_secs(),
            auto_reply: true,
            event_buffer: default_event_buffer(),
        }
    }
}

impl SessionConfig {
    /// The QR timeout as a duration, or `None` when disabled.
    pub fn qr_timeout(&self) -> Option<Duration> {
        (self.qr_timeout_secs > 0).then(|| Duration::from_secs(self.qr_timeout_secs))
    }
}

/// WhatsApp client settings.
///
/// The library keeps its key store at `{data_dir}/whatsapp_session/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Device name shown under "Linked devices" on the phone.
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// Wipe the library's key store before every connect, forcing a new QR pairing.
    #[serde(default = "default_true")]
    pub fresh_session: bool,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            fresh_session: true,
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. The `PORT`
/// environment variable overrides `api.port`.
pub fn load(path: &str) -> Result<Config, WabridgeError> {
    let path = Path::new(path);
    let mut config = if !path.exists() {
        Config::default()
    } else {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WabridgeError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| WabridgeError::Config(format!("failed to parse config: {}", e)))?
    };

    if let Ok(port) = std::env::var("PORT") {
        apply_port_override(&mut config, &port)?;
    }

    Ok(config)
}

fn apply_port_override(config: &mut Config, raw: &str) -> Result<(), WabridgeError> {
    config.api.port = raw
        .trim()
        .parse()
        .map_err(|_| WabridgeError::Config(format!("invalid PORT value '{raw}'")))?;
    Ok(())
}
