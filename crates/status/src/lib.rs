//! Operational HTTP surface: `/status` for runtime counters, `/health` for
//! liveness probes. Read-only; handlers never block on bot work.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use orchestrator::Counters;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use types::now_iso8601;

#[derive(Clone)]
pub struct StatusState {
    counters: Arc<Counters>,
}

impl StatusState {
    pub fn new(counters: Arc<Counters>) -> Self {
        Self { counters }
    }
}

pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn bind(host: &str, port: u16) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind((host, port)).await?;
    info!(addr = %listener.local_addr()?, "status listener bound");
    Ok(listener)
}

pub async fn serve(
    listener: TcpListener,
    app: Router,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
}

async fn status(State(state): State<StatusState>) -> Json<Value> {
    let snapshot = state.counters.snapshot();
    Json(json!({
        "status": "running",
        "uptime": snapshot.uptime_secs,
        "total_searches": snapshot.total_searches,
        "distinct_users": snapshot.distinct_users,
        "last_activity": snapshot.last_activity,
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": now_iso8601(),
    }))
}

#[cfg(test)]
mod tests {
    use types::UserId;

    use super::*;

    async fn spawn_server(counters: Arc<Counters>) -> String {
        let app = router(StatusState::new(counters));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn status_reflects_counters() {
        let counters = Arc::new(Counters::new());
        counters.record_user(&UserId::from("1"));
        counters.record_user(&UserId::from("2"));
        counters.record_search();

        let base = spawn_server(counters).await;
        let body: Value = reqwest::get(format!("{base}/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["status"], "running");
        assert_eq!(body["total_searches"], 1);
        assert_eq!(body["distinct_users"], 2);
        assert!(body["last_activity"].is_string());
        assert!(body["uptime"].is_u64());
        // The external key is `uptime`, not the field name.
        assert!(body.get("uptime_secs").is_none());
    }

    #[tokio::test]
    async fn fresh_process_reports_no_activity() {
        let base = spawn_server(Arc::new(Counters::new())).await;
        let body: Value = reqwest::get(format!("{base}/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["total_searches"], 0);
        assert_eq!(body["distinct_users"], 0);
        assert!(body["last_activity"].is_null());
    }

    #[tokio::test]
    async fn health_reports_healthy_with_timestamp() {
        let base = spawn_server(Arc::new(Counters::new())).await;
        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["status"], "healthy");
        let ts = body["timestamp"].as_str().unwrap();
        assert!(ts.ends_with('Z') && ts.contains('T'));
    }
}
