use std::{fmt, time::SystemTime};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ChannelError;

/// Opaque platform-side user identity.
///
/// For Telegram this is the stringified numeric user id, but nothing in the
/// orchestrator depends on that shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three inbound shapes the normalizer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A `/command`, stored without the leading slash or bot-username suffix.
    Command,
    /// A free-text message.
    Text,
    /// An inline-keyboard callback token.
    Callback,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Command => "command",
            Self::Text => "text",
            Self::Callback => "callback",
        };
        f.write_str(name)
    }
}

/// A normalized inbound chat event. Immutable once built; consumed exactly
/// once by the orchestrator engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub user_id: UserId,
    /// Telegram chat the event arrived from; responses are routed back here.
    pub chat_id: i64,
    pub kind: EventKind,
    pub payload: String,
    pub received_at: SystemTime,
}

impl Event {
    pub fn new(user_id: impl Into<UserId>, chat_id: i64, kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            chat_id,
            kind,
            payload: payload.into(),
            received_at: SystemTime::now(),
        }
    }
}

/// A single inline-keyboard button: label shown to the user, opaque token
/// routed back as a callback event when pressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub token: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

/// An outbound message produced by the orchestrator and consumed by the
/// dispatch layer. Not retained after delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub user_id: UserId,
    pub chat_id: i64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    /// Marks the reply that closes a multi-step flow (e.g. search results).
    pub terminal: bool,
}

/// Outbound delivery boundary. Implemented by the Telegram adapter; the
/// orchestrator only ever sees this trait.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn deliver(&self, response: &Response) -> Result<(), ChannelError>;
}

/// Inbound hand-off boundary between ingestion and the orchestrator.
///
/// `dispatch` must return quickly (mailbox enqueue, not processing) so push
/// delivery can be acknowledged before the event is actually handled.
pub trait EventDispatcher: Send + Sync {
    fn dispatch(&self, event: Event);
}
