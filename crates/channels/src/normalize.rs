//! Event normalization: Bot API `Update` envelope → internal [`Event`].
//!
//! Anything without a sender identity or a recognizable kind becomes a
//! [`NormalizeError::MalformedPayload`]; callers log it and drop the unit of
//! work. The ingestion loop never crashes on bad input.

use frankenstein::types::{CallbackQuery, MaybeInaccessibleMessage, Message};
use frankenstein::updates::{Update, UpdateContent};
use types::{Event, EventKind, NormalizeError};

/// Decode a raw webhook body into an `Update`.
pub fn parse_update(body: &[u8]) -> Result<Update, NormalizeError> {
    serde_json::from_slice(body)
        .map_err(|error| NormalizeError::malformed(format!("undecodable update envelope: {error}")))
}

/// Normalize a decoded update into an internal event.
pub fn normalize(update: &Update) -> Result<Event, NormalizeError> {
    match &update.content {
        UpdateContent::Message(message) => normalize_message(message),
        UpdateContent::CallbackQuery(query) => normalize_callback(query),
        _ => Err(NormalizeError::malformed("unsupported update kind")),
    }
}

/// The callback-query id of an update, if it is one. Needed to ACK the
/// button press back to Telegram before the event is handed off.
pub fn callback_query_id(update: &Update) -> Option<&str> {
    match &update.content {
        UpdateContent::CallbackQuery(query) => Some(query.id.as_str()),
        _ => None,
    }
}

fn normalize_message(message: &Message) -> Result<Event, NormalizeError> {
    let from = message
        .from
        .as_ref()
        .ok_or_else(|| NormalizeError::malformed("message has no sender"))?;
    let text = message.text.as_deref().map(str::trim).unwrap_or("");
    if text.is_empty() {
        return Err(NormalizeError::malformed("message has no text"));
    }

    if let Some(stripped) = text.strip_prefix('/') {
        let command = canonical_command(stripped);
        if command.is_empty() {
            return Err(NormalizeError::malformed("empty command"));
        }
        Ok(Event::new(
            from.id.to_string(),
            message.chat.id,
            EventKind::Command,
            command,
        ))
    } else {
        Ok(Event::new(
            from.id.to_string(),
            message.chat.id,
            EventKind::Text,
            text,
        ))
    }
}

fn normalize_callback(query: &CallbackQuery) -> Result<Event, NormalizeError> {
    let token = query
        .data
        .as_deref()
        .map(str::trim)
        .filter(|data| !data.is_empty())
        .ok_or_else(|| NormalizeError::malformed("callback query has no data"))?;

    // Callbacks on old messages may lack an accessible chat; the sender's
    // private chat shares their user id, so fall back to that.
    let chat_id = callback_chat_id(query)
        .or_else(|| i64::try_from(query.from.id).ok())
        .ok_or_else(|| NormalizeError::malformed("callback query has no routable chat"))?;

    Ok(Event::new(
        query.from.id.to_string(),
        chat_id,
        EventKind::Callback,
        token,
    ))
}

fn callback_chat_id(query: &CallbackQuery) -> Option<i64> {
    match query.message.as_ref()? {
        MaybeInaccessibleMessage::Message(message) => Some(message.chat.id),
        MaybeInaccessibleMessage::InaccessibleMessage(message) => Some(message.chat.id),
    }
}

/// Canonicalize a command: first token, bot-username suffix stripped
/// (`/start@ShopSavvyBot more words` → `start`), lowercased.
fn canonical_command(stripped: &str) -> String {
    let first = stripped.split_whitespace().next().unwrap_or("");
    first
        .split('@')
        .next()
        .unwrap_or(first)
        .to_ascii_lowercase()
}
