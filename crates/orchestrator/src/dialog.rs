//! The dialog state machine.
//!
//! [`transition`] is a pure function of `(state, event.kind, event.payload)`:
//! it computes the next state, the session/counter effects to apply, and the
//! replies to send, but performs no mutation itself. Patterns are matched in
//! priority order (reset commands first, then global commands, then
//! state-scoped patterns) and the first match wins. Anything unmatched is an
//! [`DialogError::UnknownTransition`], which the engine turns into a guidance
//! reply without touching the session.

use types::{
    CATEGORIES, ChatState, Choice, DEAL_TYPES, DialogError, Event, EventKind, PLATFORMS, Response,
    category, deal_type, platform,
};

/// A session or counter mutation requested by a transition. Applied by the
/// engine under the per-user ordering guarantee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SetPlatform(String),
    SetCategory(String),
    SetQuery(String),
    ClearSelections,
    CountSearch,
}

/// The computed result of one transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub next: ChatState,
    pub effects: Vec<Effect>,
    pub replies: Vec<Response>,
}

pub fn transition(state: ChatState, event: &Event) -> Result<Outcome, DialogError> {
    // Reset and global commands outrank any state-scoped handling.
    if event.kind == EventKind::Command {
        return command_transition(state, event);
    }

    match (state, event.kind) {
        (ChatState::Start, EventKind::Callback) => start_menu_callback(event),
        (ChatState::PlatformSelection, EventKind::Callback) => platform_callback(event),
        (ChatState::ProductSearch, EventKind::Text) => product_search(event),
        (ChatState::CategorySelection, EventKind::Callback) => category_callback(event),
        (ChatState::DealTypeSelection, EventKind::Callback) => deal_type_callback(event),
        (ChatState::PriceAlertSetup, EventKind::Text) => price_alert(event),
        (ChatState::Feedback, EventKind::Text) => feedback(event),
        (ChatState::AdminPanel, EventKind::Callback) if event.payload == "admin_back" => {
            Ok(Outcome {
                next: ChatState::Start,
                effects: Vec::new(),
                replies: vec![main_menu(event)],
            })
        }
        _ => Err(unknown(state, event)),
    }
}

/// The guidance reply sent when an event matches no pattern. The session is
/// left untouched by the caller.
pub fn invalid_input(event: &Event) -> Response {
    reply(
        event,
        "🤔 I didn't understand that. Use the buttons below, or send /start to begin again.",
        main_menu_choices(),
        false,
    )
}

fn command_transition(state: ChatState, event: &Event) -> Result<Outcome, DialogError> {
    match event.payload.as_str() {
        "start" => Ok(Outcome {
            next: ChatState::Start,
            effects: vec![Effect::ClearSelections],
            replies: vec![reply(
                event,
                "👋 Welcome to ShopSavvy!\n\nI help you find the best deals across Indian \
                 e-commerce platforms. What would you like to do?",
                main_menu_choices(),
                false,
            )],
        }),
        "cancel" => Ok(Outcome {
            next: ChatState::Start,
            effects: vec![Effect::ClearSelections],
            replies: vec![reply(
                event,
                "❌ Cancelled. Send /start whenever you want to look for deals again.",
                Vec::new(),
                true,
            )],
        }),
        "help" => Ok(Outcome {
            // Help is informational; the conversation stays where it was.
            next: state,
            effects: Vec::new(),
            replies: vec![reply(
                event,
                "🤖 ShopSavvy Bot\n\n\
                 /start — show the main menu\n\
                 /deals — browse deal types\n\
                 /cancel — abandon the current flow\n\
                 /help — this message",
                Vec::new(),
                false,
            )],
        }),
        "deals" => Ok(Outcome {
            next: ChatState::DealTypeSelection,
            effects: Vec::new(),
            replies: vec![deal_type_menu(event)],
        }),
        "admin" => Ok(Outcome {
            next: ChatState::AdminPanel,
            effects: Vec::new(),
            replies: vec![reply(
                event,
                "🔧 Admin panel\n\nOperational counters are served on the status endpoint.",
                vec![Choice::new("⬅️ Back", "admin_back")],
                false,
            )],
        }),
        _ => Err(unknown(state, event)),
    }
}

fn start_menu_callback(event: &Event) -> Result<Outcome, DialogError> {
    match event.payload.as_str() {
        "search_products" => Ok(Outcome {
            next: ChatState::PlatformSelection,
            effects: Vec::new(),
            replies: vec![reply(
                event,
                "🛒 Which platform should I search?",
                PLATFORMS
                    .iter()
                    .map(|entry| Choice::new(entry.label, format!("platform_{}", entry.id)))
                    .collect(),
                false,
            )],
        }),
        "browse_categories" => Ok(Outcome {
            next: ChatState::CategorySelection,
            effects: Vec::new(),
            replies: vec![reply(
                event,
                "📂 Pick a category:",
                CATEGORIES
                    .iter()
                    .map(|entry| Choice::new(entry.label, format!("category_{}", entry.id)))
                    .collect(),
                false,
            )],
        }),
        "deal_types" => Ok(Outcome {
            next: ChatState::DealTypeSelection,
            effects: Vec::new(),
            replies: vec![deal_type_menu(event)],
        }),
        "price_alert" => Ok(Outcome {
            next: ChatState::PriceAlertSetup,
            effects: Vec::new(),
            replies: vec![reply(
                event,
                "⏰ Tell me the product you want a price alert for:",
                Vec::new(),
                false,
            )],
        }),
        "feedback" => Ok(Outcome {
            next: ChatState::Feedback,
            effects: Vec::new(),
            replies: vec![reply(
                event,
                "💬 I'm listening — send me your feedback as a message.",
                Vec::new(),
                false,
            )],
        }),
        _ => Err(unknown(ChatState::Start, event)),
    }
}

fn platform_callback(event: &Event) -> Result<Outcome, DialogError> {
    let id = event
        .payload
        .strip_prefix("platform_")
        .and_then(platform)
        .ok_or_else(|| unknown(ChatState::PlatformSelection, event))?;
    Ok(Outcome {
        next: ChatState::ProductSearch,
        effects: vec![Effect::SetPlatform(id.id.to_owned())],
        replies: vec![reply(
            event,
            &format!("{}\n\n🔍 What product are you looking for? Type a search query.", id.label),
            Vec::new(),
            false,
        )],
    })
}

fn product_search(event: &Event) -> Result<Outcome, DialogError> {
    let query = event.payload.trim();
    if query.is_empty() {
        return Err(unknown(ChatState::ProductSearch, event));
    }
    Ok(Outcome {
        next: ChatState::Start,
        effects: vec![
            Effect::SetQuery(query.to_owned()),
            Effect::CountSearch,
        ],
        replies: vec![reply(
            event,
            &format!(
                "🔎 Searching for “{query}”…\n\nLive price data is coming soon — for now here \
                 is where your results will appear. Anything else?"
            ),
            main_menu_choices(),
            true,
        )],
    })
}

fn category_callback(event: &Event) -> Result<Outcome, DialogError> {
    let entry = event
        .payload
        .strip_prefix("category_")
        .and_then(category)
        .ok_or_else(|| unknown(ChatState::CategorySelection, event))?;
    Ok(Outcome {
        next: ChatState::DealTypeSelection,
        effects: vec![Effect::SetCategory(entry.id.to_owned())],
        replies: vec![deal_type_menu(event)],
    })
}

fn deal_type_callback(event: &Event) -> Result<Outcome, DialogError> {
    let entry = event
        .payload
        .strip_prefix("dealtype_")
        .and_then(deal_type)
        .ok_or_else(|| unknown(ChatState::DealTypeSelection, event))?;
    Ok(Outcome {
        next: ChatState::Start,
        effects: Vec::new(),
        replies: vec![reply(
            event,
            &format!(
                "{}\n\nCurated deals of this kind are coming soon. Anything else?",
                entry.label
            ),
            main_menu_choices(),
            true,
        )],
    })
}

fn price_alert(event: &Event) -> Result<Outcome, DialogError> {
    let query = event.payload.trim();
    if query.is_empty() {
        return Err(unknown(ChatState::PriceAlertSetup, event));
    }
    Ok(Outcome {
        next: ChatState::Start,
        effects: Vec::new(),
        replies: vec![reply(
            event,
            &format!("✅ Noted! I'll watch prices for “{query}” once alerts go live."),
            main_menu_choices(),
            true,
        )],
    })
}

fn feedback(event: &Event) -> Result<Outcome, DialogError> {
    Ok(Outcome {
        next: ChatState::Start,
        effects: Vec::new(),
        replies: vec![reply(
            event,
            "🙏 Thanks for the feedback!",
            main_menu_choices(),
            true,
        )],
    })
}

fn deal_type_menu(event: &Event) -> Response {
    reply(
        event,
        "🔥 What kind of deal are you after?",
        DEAL_TYPES
            .iter()
            .map(|entry| Choice::new(entry.label, format!("dealtype_{}", entry.id)))
            .collect(),
        false,
    )
}

fn main_menu(event: &Event) -> Response {
    reply(event, "What would you like to do?", main_menu_choices(), false)
}

fn main_menu_choices() -> Vec<Choice> {
    vec![
        Choice::new("🔍 Search Products", "search_products"),
        Choice::new("📂 Browse Categories", "browse_categories"),
        Choice::new("🔥 Deal Types", "deal_types"),
        Choice::new("⏰ Price Alerts", "price_alert"),
        Choice::new("💬 Feedback", "feedback"),
    ]
}

fn reply(event: &Event, text: &str, choices: Vec<Choice>, terminal: bool) -> Response {
    Response {
        user_id: event.user_id.clone(),
        chat_id: event.chat_id,
        text: text.to_owned(),
        choices,
        terminal,
    }
}

fn unknown(state: ChatState, event: &Event) -> DialogError {
    DialogError::UnknownTransition {
        state,
        kind: event.kind,
        token: event.payload.clone(),
    }
}
