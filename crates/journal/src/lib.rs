//! Journal entry model: the double-entry contract of the ledger.
//!
//! The central invariant lives here: an entry's debit lines and credit
//! lines must sum to the same amount before it may leave draft state, and a
//! posted entry is immutable history. Corrections are additive, via a
//! mirror-image reversal entry, never destructive.

pub mod draft;
pub mod entry;

pub use draft::{DraftLine, EntryDraft};
pub use entry::{EntryStatus, JournalEntry, JournalError, JournalLine, Side};
