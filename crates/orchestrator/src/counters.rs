use std::{
    collections::HashSet,
    sync::{
        RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicU64, Ordering},
    },
    time::{Instant, SystemTime},
};

use serde::Serialize;
use types::{UserId, format_iso8601};

/// Process-wide activity counters. Initialized once at startup, mutated only
/// by the orchestrator engine, read by the status surface via
/// [`Counters::snapshot`]. No reset or retention policy; the distinct-user
/// set grows for the lifetime of the process.
pub struct Counters {
    started_at: Instant,
    total_searches: AtomicU64,
    distinct_users: RwLock<HashSet<UserId>>,
    last_activity: RwLock<Option<SystemTime>>,
}

impl Counters {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_searches: AtomicU64::new(0),
            distinct_users: RwLock::new(HashSet::new()),
            last_activity: RwLock::new(None),
        }
    }

    pub fn record_search(&self) {
        self.total_searches.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_user(&self, user_id: &UserId) {
        {
            let mut users = write_lock(&self.distinct_users);
            if !users.contains(user_id) {
                users.insert(user_id.clone());
            }
        }
        self.touch();
    }

    fn touch(&self) {
        *write_lock(&self.last_activity) = Some(SystemTime::now());
    }

    /// Point-in-time view for the status surface. Never blocks on the
    /// orchestrator path beyond the short internal locks.
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs(),
            total_searches: self.total_searches.load(Ordering::Relaxed),
            distinct_users: read_lock(&self.distinct_users).len(),
            last_activity: read_lock(&self.last_activity).map(format_iso8601),
        }
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    /// Seconds since process start; serialized as `uptime`.
    #[serde(rename = "uptime")]
    pub uptime_secs: u64,
    pub total_searches: u64,
    pub distinct_users: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
