pub mod counters;
pub mod dialog;
mod engine;
mod session_store;

pub use counters::{Counters, CountersSnapshot};
pub use engine::Engine;
pub use session_store::SessionStore;

#[cfg(test)]
mod tests;
