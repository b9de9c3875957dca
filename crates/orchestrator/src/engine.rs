use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, warn};
use types::{Event, EventDispatcher, ResponseSink, UserId};

use crate::{Counters, SessionStore, dialog};

/// The orchestrator engine: routes each event to a per-user mailbox worker.
///
/// A worker owns the concurrency contract: events for one user are processed
/// strictly in arrival order and never concurrently, while different users run
/// fully in parallel. Workers are created on demand, evict themselves after
/// `worker_idle_ttl` without traffic (a later event respawns one), and drain
/// their remaining mailbox on shutdown before exiting.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    store: Arc<SessionStore>,
    counters: Arc<Counters>,
    sink: Arc<dyn ResponseSink>,
    cancel: CancellationToken,
    worker_idle_ttl: Duration,
    workers: Mutex<HashMap<UserId, mpsc::UnboundedSender<Event>>>,
    tracker: TaskTracker,
}

impl Engine {
    pub fn new(
        store: Arc<SessionStore>,
        counters: Arc<Counters>,
        sink: Arc<dyn ResponseSink>,
        cancel: CancellationToken,
        worker_idle_ttl: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                counters,
                sink,
                cancel,
                worker_idle_ttl,
                workers: Mutex::new(HashMap::new()),
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Enqueue an event for its user's worker. Returns immediately; the
    /// actual transition runs on the worker task.
    pub fn dispatch(&self, event: Event) {
        self.inner.dispatch(event);
    }

    /// Wait for every worker to drain its mailbox and exit. Call after the
    /// cancellation token has fired.
    pub async fn drain(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }

    /// Number of live per-user workers.
    pub fn worker_count(&self) -> usize {
        self.inner
            .workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl EventDispatcher for Engine {
    fn dispatch(&self, event: Event) {
        self.inner.dispatch(event);
    }
}

impl EngineInner {
    fn dispatch(self: &Arc<Self>, event: Event) {
        if self.cancel.is_cancelled() {
            debug!(user_id = %event.user_id, "engine shutting down; dropping event");
            return;
        }

        let user_id = event.user_id.clone();
        let mut workers = self
            .workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut event = event;
        // A send can only fail against a sender whose worker already exited;
        // drop the stale entry and retry once against a fresh worker.
        for _ in 0..2 {
            let sender = workers
                .entry(user_id.clone())
                .or_insert_with(|| self.spawn_worker(user_id.clone()));
            match sender.send(event) {
                Ok(()) => return,
                Err(send_error) => {
                    event = send_error.0;
                    workers.remove(&user_id);
                }
            }
        }
        debug!(user_id = %user_id, "worker mailbox closed; dropping event");
    }

    fn spawn_worker(self: &Arc<Self>, user_id: UserId) -> mpsc::UnboundedSender<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tracker.spawn(run_worker(Arc::clone(self), user_id, rx));
        tx
    }

    /// Retire an idle worker: remove its sender so later events respawn a
    /// fresh one. Dispatch sends while holding the map lock, so checking the
    /// mailbox under the same lock guarantees a retired worker has no
    /// unprocessed event. Returns false (and keeps the worker) if an event
    /// slipped in.
    fn try_retire_worker(
        &self,
        user_id: &UserId,
        mailbox: &mpsc::UnboundedReceiver<Event>,
    ) -> bool {
        let mut workers = self
            .workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !mailbox.is_empty() {
            return false;
        }
        workers.remove(user_id);
        true
    }

    async fn handle_event(&self, event: Event) {
        let mut session = match self.store.get_or_create(&event.user_id, event.chat_id).await {
            Ok(session) => session,
            Err(error) => {
                warn!(error = %error, "dropping event for invalid user");
                return;
            }
        };
        self.counters.record_user(&event.user_id);

        match dialog::transition(session.state, &event) {
            Ok(outcome) => {
                session.state = outcome.next;
                for effect in outcome.effects {
                    match effect {
                        dialog::Effect::SetPlatform(id) => session.selected_platform = Some(id),
                        dialog::Effect::SetCategory(id) => session.selected_category = Some(id),
                        dialog::Effect::SetQuery(query) => session.search_query = Some(query),
                        dialog::Effect::ClearSelections => session.clear_selections(),
                        dialog::Effect::CountSearch => self.counters.record_search(),
                    }
                }
                self.store.save(session).await;

                for reply in &outcome.replies {
                    if let Err(error) = self.sink.deliver(reply).await {
                        warn!(error = %error, chat_id = reply.chat_id, "reply delivery failed");
                    }
                }
            }
            Err(error) => {
                // Session stays untouched; the user gets generic guidance.
                debug!(error = %error, user_id = %event.user_id, "unknown transition");
                let guidance = dialog::invalid_input(&event);
                if let Err(error) = self.sink.deliver(&guidance).await {
                    warn!(error = %error, chat_id = guidance.chat_id, "guidance delivery failed");
                }
            }
        }
    }
}

async fn run_worker(
    inner: Arc<EngineInner>,
    user_id: UserId,
    mut mailbox: mpsc::UnboundedReceiver<Event>,
) {
    debug!(user_id = %user_id, "session worker started");
    loop {
        tokio::select! {
            maybe_event = mailbox.recv() => {
                match maybe_event {
                    Some(event) => inner.handle_event(event).await,
                    None => break,
                }
            }
            _ = inner.cancel.cancelled() => {
                // Drain what was already enqueued, then exit.
                while let Ok(event) = mailbox.try_recv() {
                    inner.handle_event(event).await;
                }
                break;
            }
            _ = tokio::time::sleep(inner.worker_idle_ttl) => {
                if inner.try_retire_worker(&user_id, &mailbox) {
                    debug!(user_id = %user_id, "session worker idle; evicting");
                    break;
                }
            }
        }
    }
    debug!(user_id = %user_id, "session worker stopped");
}
