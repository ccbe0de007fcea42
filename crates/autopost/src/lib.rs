//! Auto-posting: derives journal entries from business events.
//!
//! Event-to-account mappings are configuration, not code paths: each event
//! type carries an [`AutoPostingTemplate`] whose line rules say which side
//! to hit, how to pick the account (fixed code or category lookup), and how
//! to compute the amount (payload field, percentage, or remainder plug).
//! Templates that cannot balance are rejected when registered, never at
//! event time.

pub mod engine;
pub mod event;
pub mod template;

pub use engine::{AutoPostingEngine, ResolvedEntry};
pub use event::BusinessEvent;
pub use template::{
    AccountSelector, AmountRule, AutoPostError, AutoPostingTemplate, LineRule,
};
