use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Conversation states of the dialog state machine. `Start` is initial; no
/// state is terminal; `/start` and `/cancel` return here from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChatState {
    #[default]
    Start,
    PlatformSelection,
    ProductSearch,
    CategorySelection,
    DealTypeSelection,
    PriceAlertSetup,
    Feedback,
    AdminPanel,
}

/// Per-user conversation state retained across events within a process
/// lifetime. Created on first event, refreshed on every event, evicted only
/// by the idle sweeper. The engine worker for the owning user is the sole
/// mutator.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: UserId,
    /// Chat the user last talked from; outbound replies target this.
    pub chat_id: i64,
    pub state: ChatState,
    pub selected_platform: Option<String>,
    pub selected_category: Option<String>,
    pub search_query: Option<String>,
    pub created_at: SystemTime,
    pub last_active_at: SystemTime,
}

impl Session {
    pub fn new(user_id: UserId, chat_id: i64) -> Self {
        let now = SystemTime::now();
        Self {
            user_id,
            chat_id,
            state: ChatState::Start,
            selected_platform: None,
            selected_category: None,
            search_query: None,
            created_at: now,
            last_active_at: now,
        }
    }

    /// Drop accumulated selections, e.g. on `/cancel` or `/start`.
    pub fn clear_selections(&mut self) {
        self.selected_platform = None;
        self.selected_category = None;
        self.search_query = None;
    }
}
