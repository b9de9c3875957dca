use thiserror::Error;

use crate::{ChatState, EventKind};

/// Raised by the event normalizer when an inbound payload cannot be turned
/// into an [`crate::Event`]. The unit of work is logged and dropped; the
/// ingestion loop never crashes on it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("malformed payload: {reason}")]
    MalformedPayload { reason: String },
}

impl NormalizeError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid user identifier `{user_id}`")]
    InvalidUser { user_id: String },
}

/// The only dialog-level error. Never fatal: the engine leaves the session
/// unchanged and replies with generic guidance.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DialogError {
    #[error("no transition from state {state:?} for {kind} `{token}`")]
    UnknownTransition {
        state: ChatState,
        kind: EventKind,
        token: String,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("delivery to chat {chat_id} failed: {message}")]
    Delivery { chat_id: i64, message: String },
    #[error("telegram transport failed: {message}")]
    Transport { message: String },
}

/// Startup-time configuration failures. These are the only errors that halt
/// the process, and only before it begins serving.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("bot token is not configured; set SHOPSAVVY_BOT_TOKEN")]
    MissingBotToken,
    #[error("unknown delivery mode `{value}`; expected `push` or `pull`")]
    InvalidMode { value: String },
    #[error("push mode requires a webhook base URL; set SHOPSAVVY_WEBHOOK_URL")]
    MissingWebhookUrl,
    #[error("invalid webhook URL `{url}`; must start with http:// or https://")]
    InvalidWebhookUrl { url: String },
    #[error("invalid value `{value}` for {var}: expected {expected}")]
    InvalidValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
}
