use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use frankenstein::AsyncTelegramApi;
use frankenstein::client_reqwest::Bot;
use frankenstein::methods::{AnswerCallbackQueryParams, GetUpdatesParams, SendMessageParams};
use frankenstein::types::{
    AllowedUpdate, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, ReplyMarkup,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use types::{ChannelError, Choice, EventDispatcher, Response, ResponseSink};

use crate::normalize;

/// Buttons per inline-keyboard row.
const KEYBOARD_ROW_WIDTH: usize = 2;

// ---------------------------------------------------------------------------
// Outbound: Response → Telegram message
// ---------------------------------------------------------------------------

/// Renders orchestrator [`Response`]s as Telegram messages, choices as an
/// inline keyboard.
pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot: Bot::new(bot_token),
        }
    }

    pub fn with_bot(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ResponseSink for TelegramSink {
    async fn deliver(&self, response: &Response) -> Result<(), ChannelError> {
        let params = build_send_params(response);
        self.bot
            .send_message(&params)
            .await
            .map_err(|error| ChannelError::Delivery {
                chat_id: response.chat_id,
                message: error.to_string(),
            })?;
        Ok(())
    }
}

fn build_send_params(response: &Response) -> SendMessageParams {
    let builder = SendMessageParams::builder()
        .chat_id(ChatId::Integer(response.chat_id))
        .text(response.text.clone());
    match keyboard_markup(&response.choices) {
        Some(markup) => builder
            .reply_markup(ReplyMarkup::InlineKeyboardMarkup(markup))
            .build(),
        None => builder.build(),
    }
}

fn keyboard_markup(choices: &[Choice]) -> Option<InlineKeyboardMarkup> {
    if choices.is_empty() {
        return None;
    }
    let rows: Vec<Vec<InlineKeyboardButton>> = choices
        .chunks(KEYBOARD_ROW_WIDTH)
        .map(|row| {
            row.iter()
                .map(|choice| {
                    InlineKeyboardButton::builder()
                        .text(choice.label.clone())
                        .callback_data(choice.token.clone())
                        .build()
                })
                .collect()
        })
        .collect();
    Some(InlineKeyboardMarkup::builder().inline_keyboard(rows).build())
}

/// ACK a button press so the client clears its progress spinner. Failures
/// are logged and swallowed; the press is still processed.
pub(crate) async fn ack_callback(bot: &Bot, callback_query_id: &str) {
    let params = AnswerCallbackQueryParams::builder()
        .callback_query_id(callback_query_id.to_owned())
        .build();
    if let Err(error) = bot.answer_callback_query(&params).await {
        debug!(error = %error, "failed to ack callback query");
    }
}

// ---------------------------------------------------------------------------
// Inbound, pull mode: long-polling loop
// ---------------------------------------------------------------------------

/// Pull-mode event source: long-polls `getUpdates` and feeds normalized
/// events to the dispatcher.
///
/// Offset discipline: the offset advances past every received update before
/// the update is handed off, so an acknowledged update is never re-requested.
/// An update can be lost if the process dies between receipt and the next
/// poll: at-most-once across restarts, matching Telegram's cursor contract.
pub struct TelegramPoller {
    bot: Bot,
    dispatcher: Arc<dyn EventDispatcher>,
    poll_timeout_secs: u64,
}

impl TelegramPoller {
    pub fn new(bot: Bot, dispatcher: Arc<dyn EventDispatcher>, poll_timeout_secs: u64) -> Self {
        Self {
            bot,
            dispatcher,
            poll_timeout_secs,
        }
    }

    /// Run until `cancel` fires. Updates already received when cancellation
    /// hits are still dispatched before the loop exits.
    pub async fn run(self, cancel: CancellationToken) {
        info!("telegram poller started");
        let mut offset: Option<i64> = None;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let params = GetUpdatesParams {
                offset,
                limit: None,
                timeout: Some(self.poll_timeout_secs as u32),
                allowed_updates: Some(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery]),
            };

            let updates = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.bot.get_updates(&params) => {
                    match result {
                        Ok(response) => response.result,
                        Err(error) => {
                            if let Some(retry_secs) = extract_retry_after(&error) {
                                warn!(retry_after_secs = retry_secs, "telegram rate limited; backing off");
                                tokio::time::sleep(Duration::from_secs(retry_secs)).await;
                            } else {
                                warn!(error = %error, "get_updates failed; retrying in 5s");
                                tokio::time::sleep(Duration::from_secs(5)).await;
                            }
                            continue;
                        }
                    }
                }
            };

            for update in updates {
                // Advance past this update before hand-off; consumed updates
                // are never re-requested.
                offset = Some(next_offset(update.update_id));

                if let Some(id) = normalize::callback_query_id(&update) {
                    ack_callback(&self.bot, id).await;
                }

                match normalize::normalize(&update) {
                    Ok(event) => self.dispatcher.dispatch(event),
                    Err(error) => {
                        debug!(error = %error, update_id = update.update_id, "dropping malformed update");
                    }
                }
            }
        }

        info!("telegram poller stopped");
    }
}

fn next_offset(update_id: u32) -> i64 {
    i64::from(update_id) + 1
}

/// Extract `retry_after` seconds from a 429 error message.
fn extract_retry_after(error: &frankenstein::Error) -> Option<u64> {
    let message = error.to_string();
    if message.contains("retry after") || message.contains("Retry-After") {
        for word in message.split_whitespace() {
            if let Ok(seconds) = word.parse::<u64>() {
                return Some(seconds);
            }
        }
        Some(5)
    } else {
        None
    }
}
