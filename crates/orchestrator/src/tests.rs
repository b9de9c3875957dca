use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use types::{ChannelError, ChatState, Event, EventKind, Response, ResponseSink, UserId};

use crate::{Counters, Engine, SessionStore};

/// In-memory sink recording every delivered response, in delivery order.
#[derive(Default)]
struct RecordingSink {
    delivered: Mutex<Vec<Response>>,
}

impl RecordingSink {
    async fn delivered(&self) -> Vec<Response> {
        self.delivered.lock().await.clone()
    }
}

#[async_trait]
impl ResponseSink for RecordingSink {
    async fn deliver(&self, response: &Response) -> Result<(), ChannelError> {
        self.delivered.lock().await.push(response.clone());
        Ok(())
    }
}

struct Harness {
    engine: Engine,
    store: Arc<SessionStore>,
    counters: Arc<Counters>,
    sink: Arc<RecordingSink>,
    cancel: CancellationToken,
}

impl Harness {
    fn new() -> Self {
        Self::with_worker_idle_ttl(Duration::from_secs(3_600))
    }

    fn with_worker_idle_ttl(worker_idle_ttl: Duration) -> Self {
        let store = Arc::new(SessionStore::new());
        let counters = Arc::new(Counters::new());
        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();
        let engine = Engine::new(
            Arc::clone(&store),
            Arc::clone(&counters),
            Arc::clone(&sink) as Arc<dyn ResponseSink>,
            cancel.clone(),
            worker_idle_ttl,
        );
        Self {
            engine,
            store,
            counters,
            sink,
            cancel,
        }
    }

    /// Stop accepting new events and wait for every worker to finish its
    /// mailbox. Makes test assertions deterministic.
    async fn settle(&self) {
        self.cancel.cancel();
        self.engine.drain().await;
    }
}

fn event(user: &str, kind: EventKind, payload: &str) -> Event {
    Event::new(user, 1000 + user.len() as i64, kind, payload)
}

#[tokio::test]
async fn start_command_creates_session_and_sends_menu() {
    let harness = Harness::new();
    harness.engine.dispatch(event("alice", EventKind::Command, "start"));
    harness.settle().await;

    let session = harness
        .store
        .get(&UserId::from("alice"))
        .await
        .expect("session should exist");
    assert_eq!(session.state, ChatState::Start);

    let delivered = harness.sink.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].text.contains("Welcome"));
    assert!(!delivered[0].choices.is_empty());
}

#[tokio::test]
async fn full_search_flow_updates_session_and_counters() {
    let harness = Harness::new();
    for (kind, payload) in [
        (EventKind::Command, "start"),
        (EventKind::Callback, "search_products"),
        (EventKind::Callback, "platform_flipkart"),
        (EventKind::Text, "shoes"),
    ] {
        harness.engine.dispatch(event("alice", kind, payload));
    }
    harness.settle().await;

    let session = harness
        .store
        .get(&UserId::from("alice"))
        .await
        .expect("session should exist");
    assert_eq!(session.state, ChatState::Start);
    assert_eq!(session.selected_platform.as_deref(), Some("flipkart"));
    assert_eq!(session.search_query.as_deref(), Some("shoes"));

    let snapshot = harness.counters.snapshot();
    assert_eq!(snapshot.total_searches, 1);
    assert_eq!(snapshot.distinct_users, 1);
    assert!(snapshot.last_activity.is_some());
}

#[tokio::test]
async fn unknown_callback_leaves_session_unchanged_and_guides_user() {
    let harness = Harness::new();
    harness.engine.dispatch(event("alice", EventKind::Command, "start"));
    harness
        .engine
        .dispatch(event("alice", EventKind::Callback, "category_electronics"));
    harness.settle().await;

    let session = harness
        .store
        .get(&UserId::from("alice"))
        .await
        .expect("session should exist");
    assert_eq!(session.state, ChatState::Start);
    assert!(session.selected_category.is_none());

    let delivered = harness.sink.delivered().await;
    assert_eq!(delivered.len(), 2);
    assert!(delivered[1].text.contains("didn't understand"));
}

#[tokio::test]
async fn cancel_clears_selections_from_mid_flow() {
    let harness = Harness::new();
    for (kind, payload) in [
        (EventKind::Callback, "search_products"),
        (EventKind::Callback, "platform_amazon"),
        (EventKind::Command, "cancel"),
    ] {
        harness.engine.dispatch(event("alice", kind, payload));
    }
    harness.settle().await;

    let session = harness
        .store
        .get(&UserId::from("alice"))
        .await
        .expect("session should exist");
    assert_eq!(session.state, ChatState::Start);
    assert!(session.selected_platform.is_none());
    assert!(session.search_query.is_none());
}

#[tokio::test]
async fn same_user_events_are_processed_in_arrival_order() {
    let harness = Harness::new();
    // The whole sequence only ends in ProductSearch if every step is applied
    // in order; any reordering derails at an UnknownTransition instead.
    for (kind, payload) in [
        (EventKind::Command, "start"),
        (EventKind::Callback, "search_products"),
        (EventKind::Callback, "platform_myntra"),
        (EventKind::Text, "kurta"),
        (EventKind::Callback, "browse_categories"),
        (EventKind::Callback, "category_fashion"),
        (EventKind::Callback, "dealtype_bogo"),
        (EventKind::Callback, "search_products"),
        (EventKind::Callback, "platform_all"),
    ] {
        harness.engine.dispatch(event("alice", kind, payload));
    }
    harness.settle().await;

    let session = harness
        .store
        .get(&UserId::from("alice"))
        .await
        .expect("session should exist");
    assert_eq!(session.state, ChatState::ProductSearch);
    assert_eq!(session.selected_platform.as_deref(), Some("all"));
    assert_eq!(session.selected_category.as_deref(), Some("fashion"));
    assert_eq!(harness.counters.snapshot().total_searches, 1);
}

#[tokio::test]
async fn distinct_users_are_isolated() {
    let harness = Harness::new();
    harness
        .engine
        .dispatch(event("alice", EventKind::Callback, "search_products"));
    harness
        .engine
        .dispatch(event("alice", EventKind::Callback, "platform_flipkart"));
    harness
        .engine
        .dispatch(event("bob", EventKind::Callback, "browse_categories"));
    harness
        .engine
        .dispatch(event("bob", EventKind::Callback, "category_books"));
    harness.settle().await;

    let alice = harness
        .store
        .get(&UserId::from("alice"))
        .await
        .expect("alice session should exist");
    let bob = harness
        .store
        .get(&UserId::from("bob"))
        .await
        .expect("bob session should exist");

    assert_eq!(alice.state, ChatState::ProductSearch);
    assert_eq!(alice.selected_platform.as_deref(), Some("flipkart"));
    assert!(alice.selected_category.is_none());

    assert_eq!(bob.state, ChatState::DealTypeSelection);
    assert_eq!(bob.selected_category.as_deref(), Some("books"));
    assert!(bob.selected_platform.is_none());

    assert_eq!(harness.counters.snapshot().distinct_users, 2);
}

#[tokio::test]
async fn replaying_a_sequence_from_fresh_sessions_is_deterministic() {
    let sequence = [
        (EventKind::Command, "start"),
        (EventKind::Callback, "deal_types"),
        (EventKind::Callback, "dealtype_clearance"),
        (EventKind::Callback, "price_alert"),
        (EventKind::Text, "headphones"),
    ];

    let mut finals = Vec::new();
    for _ in 0..2 {
        let harness = Harness::new();
        for (kind, payload) in sequence {
            harness.engine.dispatch(event("alice", kind, payload));
        }
        harness.settle().await;
        let session = harness
            .store
            .get(&UserId::from("alice"))
            .await
            .expect("session should exist");
        finals.push((
            session.state,
            session.selected_platform,
            session.selected_category,
            session.search_query,
        ));
    }
    assert_eq!(finals[0], finals[1]);
}

#[tokio::test]
async fn idle_workers_are_evicted_and_respawned_on_demand() {
    let harness = Harness::with_worker_idle_ttl(Duration::from_millis(50));
    harness.engine.dispatch(event("alice", EventKind::Command, "start"));

    // Wait out the idle TTL; the worker must deregister itself.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(harness.engine.worker_count(), 0);

    // A later event respawns a worker and still lands on the same session.
    harness
        .engine
        .dispatch(event("alice", EventKind::Callback, "search_products"));
    harness.settle().await;

    let session = harness
        .store
        .get(&UserId::from("alice"))
        .await
        .expect("session should exist");
    assert_eq!(session.state, ChatState::PlatformSelection);
    assert_eq!(harness.sink.delivered().await.len(), 2);
}

#[tokio::test]
async fn events_after_shutdown_are_dropped() {
    let harness = Harness::new();
    harness.settle().await;
    harness.engine.dispatch(event("late", EventKind::Command, "start"));
    // Nothing to wait on; the dispatch must have been a no-op.
    assert!(harness.store.get(&UserId::from("late")).await.is_none());
    assert_eq!(harness.counters.snapshot().distinct_users, 0);
}

#[tokio::test]
async fn store_rejects_blank_user_ids() {
    let store = SessionStore::new();
    let result = store.get_or_create(&UserId::from("   "), 7).await;
    assert!(result.is_err());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn store_get_or_create_refreshes_activity_and_chat() {
    let store = SessionStore::new();
    let first = store
        .get_or_create(&UserId::from("alice"), 7)
        .await
        .expect("create should succeed");
    let second = store
        .get_or_create(&UserId::from("alice"), 8)
        .await
        .expect("refresh should succeed");
    assert_eq!(store.len().await, 1);
    assert_eq!(second.chat_id, 8);
    assert!(second.last_active_at >= first.last_active_at);
}

#[tokio::test]
async fn sweep_evicts_only_idle_sessions() {
    let store = SessionStore::new();
    store
        .get_or_create(&UserId::from("fresh"), 1)
        .await
        .expect("create should succeed");

    let mut stale = store
        .get_or_create(&UserId::from("stale"), 2)
        .await
        .expect("create should succeed");
    stale.last_active_at = SystemTime::now() - Duration::from_secs(7_200);
    store.save(stale).await;

    let evicted = store.sweep_idle(Duration::from_secs(3_600)).await;
    assert_eq!(evicted, 1);
    assert!(store.get(&UserId::from("fresh")).await.is_some());
    assert!(store.get(&UserId::from("stale")).await.is_none());
}
