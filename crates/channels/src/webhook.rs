use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use frankenstein::client_reqwest::Bot;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use types::EventDispatcher;

use crate::{normalize, telegram};

/// Header Telegram echoes back when a secret token was registered with
/// `setWebhook`.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Shared state for the push-mode webhook endpoint.
#[derive(Clone)]
pub struct WebhookState {
    dispatcher: Arc<dyn EventDispatcher>,
    secret: Option<String>,
    bot: Option<Bot>,
}

impl WebhookState {
    pub fn new(dispatcher: Arc<dyn EventDispatcher>, secret: Option<String>, bot: Option<Bot>) -> Self {
        Self {
            dispatcher,
            secret,
            bot,
        }
    }
}

/// Build the webhook router. `path` is the token-scoped update path so the
/// URL itself is unguessable.
pub fn router(path: &str, state: WebhookState) -> Router {
    Router::new().route(path, post(receive_update)).with_state(state)
}

/// Serve the webhook until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
}

/// Webhook entry point. Authentication is checked first; after that the body
/// is acknowledged with 200 no matter what it contains, so Telegram never
/// re-delivers an update the process has already accepted.
async fn receive_update(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(expected) = &state.secret {
        let presented = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if presented != Some(expected.as_str()) {
            warn!("webhook update rejected: secret token mismatch");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update = match normalize::parse_update(&body) {
        Ok(update) => update,
        Err(error) => {
            debug!(error = %error, "dropping unparseable webhook body");
            return StatusCode::OK;
        }
    };

    if let (Some(bot), Some(id)) = (&state.bot, normalize::callback_query_id(&update)) {
        let bot = bot.clone();
        let id = id.to_owned();
        tokio::spawn(async move {
            telegram::ack_callback(&bot, &id).await;
        });
    }

    match normalize::normalize(&update) {
        Ok(event) => state.dispatcher.dispatch(event),
        Err(error) => {
            debug!(error = %error, update_id = update.update_id, "dropping malformed update");
        }
    }

    StatusCode::OK
}

/// Bind a listener and log the bound address.
pub async fn bind(host: &str, port: u16) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind((host, port)).await?;
    info!(addr = %listener.local_addr()?, "webhook listener bound");
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use types::Event;

    use super::*;

    #[derive(Default)]
    struct RecordingDispatcher {
        events: Mutex<Vec<Event>>,
    }

    impl EventDispatcher for RecordingDispatcher {
        fn dispatch(&self, event: Event) {
            self.events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(event);
        }
    }

    async fn spawn_server(secret: Option<&str>) -> (String, Arc<RecordingDispatcher>) {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let state = WebhookState::new(dispatcher.clone(), secret.map(str::to_owned), None);
        let app = router("/webhook/test-token", state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/webhook/test-token"), dispatcher)
    }

    fn message_update() -> serde_json::Value {
        json!({
            "update_id": 7,
            "message": {
                "message_id": 1,
                "date": 1,
                "chat": {"id": 99, "type": "private"},
                "from": {"id": 42, "is_bot": false, "first_name": "Asha"},
                "text": "/start"
            }
        })
    }

    #[tokio::test]
    async fn valid_update_is_acknowledged_and_dispatched() {
        let (url, dispatcher) = spawn_server(None).await;
        let response = reqwest::Client::new()
            .post(&url)
            .json(&message_update())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let events = dispatcher.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].user_id.as_str(), "42");
        assert_eq!(events[0].payload, "start");
    }

    #[tokio::test]
    async fn secret_mismatch_is_rejected_before_processing() {
        let (url, dispatcher) = spawn_server(Some("s3cret")).await;
        let client = reqwest::Client::new();

        let missing = client.post(&url).json(&message_update()).send().await.unwrap();
        assert_eq!(missing.status(), 401);

        let wrong = client
            .post(&url)
            .header(SECRET_TOKEN_HEADER, "nope")
            .json(&message_update())
            .send()
            .await
            .unwrap();
        assert_eq!(wrong.status(), 401);
        assert!(dispatcher.events.lock().unwrap().is_empty());

        let right = client
            .post(&url)
            .header(SECRET_TOKEN_HEADER, "s3cret")
            .json(&message_update())
            .send()
            .await
            .unwrap();
        assert_eq!(right.status(), 200);
        assert_eq!(dispatcher.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_without_sender_is_dropped_but_acknowledged() {
        let (url, dispatcher) = spawn_server(None).await;
        let body = json!({
            "update_id": 8,
            "message": {
                "message_id": 2,
                "date": 1,
                "chat": {"id": 99, "type": "private"},
                "text": "hello"
            }
        });
        let response = reqwest::Client::new().post(&url).json(&body).send().await.unwrap();
        assert_eq!(response.status(), 200);
        assert!(dispatcher.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn garbage_body_is_acknowledged() {
        let (url, dispatcher) = spawn_server(None).await;
        let response = reqwest::Client::new()
            .post(&url)
            .body("not json at all")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert!(dispatcher.events.lock().unwrap().is_empty());
    }
}
