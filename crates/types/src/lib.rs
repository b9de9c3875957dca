mod catalog;
mod config;
mod error;
mod event;
mod session;
mod time;
mod tracing;

pub use catalog::{CATEGORIES, CatalogEntry, DEAL_TYPES, PLATFORMS, category, deal_type, platform};
pub use config::{BotConfig, DeliveryMode, ListenConfig, WebhookConfig};
pub use error::{ChannelError, ConfigError, DialogError, NormalizeError, SessionError};
pub use event::{Choice, Event, EventDispatcher, EventKind, Response, ResponseSink, UserId};
pub use session::{ChatState, Session};
pub use time::{format_iso8601, now_iso8601};
pub use tracing::init_tracing;
