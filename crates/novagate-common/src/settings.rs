use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("missing required setting: {0}")]
    MissingField(&'static str),
}

/// Process-wide settings, distinct from the routable `ConfigSnapshot`
/// (providers/aliases/keys) that `novagate-core::state` swaps atomically.
/// Merge order: CLI > ENV > persisted store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub dsn: String,
    pub max_attempts: usize,
    pub request_body_limit_bytes: usize,
    /// Redact request/response bodies in events and debug traces.
    pub event_redact_sensitive: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            dsn: "sqlite://novagate.db?mode=rwc".to_string(),
            max_attempts: 4,
            request_body_limit_bytes: 25 * 1024 * 1024,
            event_redact_sensitive: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dsn: Option<String>,
    pub max_attempts: Option<usize>,
    pub request_body_limit_bytes: Option<usize>,
    pub event_redact_sensitive: Option<bool>,
}

impl SettingsPatch {
    pub fn overlay(&mut self, other: SettingsPatch) {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field;
                }
            };
        }
        take!(host);
        take!(port);
        take!(dsn);
        take!(max_attempts);
        take!(request_body_limit_bytes);
        take!(event_redact_sensitive);
    }

    pub fn into_settings(self) -> Settings {
        let defaults = Settings::default();
        Settings {
            host: self.host.unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            dsn: self.dsn.unwrap_or(defaults.dsn),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            request_body_limit_bytes: self
                .request_body_limit_bytes
                .unwrap_or(defaults.request_body_limit_bytes),
            event_redact_sensitive: self
                .event_redact_sensitive
                .unwrap_or(defaults.event_redact_sensitive),
        }
    }
}
