//! Telegram channel plumbing: normalizes Bot API updates into internal
//! events, feeds them to the orchestrator through either delivery mode
//! (webhook push or long-poll pull), and renders responses back as messages
//! with inline keyboards.

pub mod normalize;
mod telegram;
mod webhook;

pub use telegram::{TelegramPoller, TelegramSink};
pub use webhook::{SECRET_TOKEN_HEADER, WebhookState, bind, router, serve};
