use serde::{Deserialize, Serialize};

use crate::ConfigError;

pub const ENV_BOT_TOKEN: &str = "SHOPSAVVY_BOT_TOKEN";
pub const ENV_MODE: &str = "SHOPSAVVY_MODE";
pub const ENV_WEBHOOK_URL: &str = "SHOPSAVVY_WEBHOOK_URL";
pub const ENV_WEBHOOK_SECRET: &str = "SHOPSAVVY_WEBHOOK_SECRET";
pub const ENV_HOST: &str = "SHOPSAVVY_HOST";
pub const ENV_PORT: &str = "SHOPSAVVY_PORT";
pub const ENV_STATUS_PORT: &str = "SHOPSAVVY_STATUS_PORT";
pub const ENV_POLL_TIMEOUT_SECS: &str = "SHOPSAVVY_POLL_TIMEOUT_SECS";
pub const ENV_SESSION_IDLE_TTL_SECS: &str = "SHOPSAVVY_SESSION_IDLE_TTL_SECS";

/// How inbound events reach the process. Exactly one mode is active per
/// process lifetime; switching requires a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Telegram pushes updates to our HTTPS webhook.
    Push,
    /// We long-poll `getUpdates`.
    Pull,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Public base URL Telegram delivers to (push mode only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Shared secret echoed back by Telegram in
    /// `X-Telegram-Bot-Api-Secret-Token`; mismatches are rejected with 401.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenConfig {
    pub host: String,
    /// Webhook listener port (push mode).
    pub port: u16,
    /// Status/health listener port; always served.
    pub status_port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            status_port: default_status_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    pub bot_token: String,
    pub mode: DeliveryMode,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_session_idle_ttl_secs")]
    pub session_idle_ttl_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            secret: None,
        }
    }
}

impl BotConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Kept separate from
    /// [`Self::from_env`] so tests never mutate process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token = lookup(ENV_BOT_TOKEN).unwrap_or_default();
        let base_url = lookup(ENV_WEBHOOK_URL).filter(|url| !url.trim().is_empty());

        // Explicit mode wins; otherwise a configured webhook URL implies push.
        let mode = match lookup(ENV_MODE) {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "push" => DeliveryMode::Push,
                "pull" => DeliveryMode::Pull,
                _ => return Err(ConfigError::InvalidMode { value: raw }),
            },
            None if base_url.is_some() => DeliveryMode::Push,
            None => DeliveryMode::Pull,
        };

        let config = Self {
            bot_token,
            mode,
            webhook: WebhookConfig {
                base_url,
                secret: lookup(ENV_WEBHOOK_SECRET).filter(|secret| !secret.is_empty()),
            },
            listen: ListenConfig {
                host: lookup(ENV_HOST).unwrap_or_else(default_host),
                port: parse_or(&lookup, ENV_PORT, default_port())?,
                status_port: parse_or(&lookup, ENV_STATUS_PORT, default_status_port())?,
            },
            poll_timeout_secs: parse_or(&lookup, ENV_POLL_TIMEOUT_SECS, default_poll_timeout_secs())?,
            session_idle_ttl_secs: parse_or(
                &lookup,
                ENV_SESSION_IDLE_TTL_SECS,
                default_session_idle_ttl_secs(),
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::MissingBotToken);
        }

        if let Some(url) = self.webhook.base_url.as_deref() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidWebhookUrl {
                    url: url.to_owned(),
                });
            }
        }

        if self.mode == DeliveryMode::Push && self.webhook.base_url.is_none() {
            return Err(ConfigError::MissingWebhookUrl);
        }

        if self.poll_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "poll_timeout_secs",
            });
        }
        if self.session_idle_ttl_secs == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "session_idle_ttl_secs",
            });
        }

        Ok(())
    }

    /// Opaque webhook route. Embeds the bot token so the path is unguessable,
    /// the same trick the hosted original used.
    pub fn webhook_path(&self) -> String {
        format!("/webhook/{}", self.bot_token)
    }

    /// Full public webhook URL registered with Telegram (push mode).
    pub fn webhook_url(&self) -> Option<String> {
        self.webhook
            .base_url
            .as_deref()
            .map(|base| format!("{}{}", base.trim_end_matches('/'), self.webhook_path()))
    }
}

fn parse_or<T, F>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            var,
            value: raw,
            expected: "a non-negative integer",
        }),
        None => Ok(default),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    8443
}

fn default_status_port() -> u16 {
    5000
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_session_idle_ttl_secs() -> u64 {
    // One hour of inactivity before a session is swept.
    3_600
}
