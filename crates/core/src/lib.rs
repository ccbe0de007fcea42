//! `awqaf-core`: shared domain primitives for the endowment ledger.
//!
//! Pure types only: identifiers, money, and the marker traits the domain
//! crates build on. No IO, no persistence concerns.

pub mod entity;
pub mod id;
pub mod money;
pub mod value_object;

pub use entity::Entity;
pub use id::{AccountId, FiscalYearId, IdParseError, JournalEntryId};
pub use money::Money;
pub use value_object::ValueObject;
