//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "wabridge".to_string()
}

pub fn default_data_dir() -> String {
    "~/.wabridge".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_api_port() -> u16 {
    3000
}

pub fn default_qr_timeout_secs() -> u64 {
    30
}

pub fn default_event_buffer() -> usize {
    64
}

pub fn default_device_name() -> String {
    "wabridge".to_string()
}
