//! Fiscal year model for the endowment ledger.
//!
//! A year accepts journal entries only while `Open`. Closing is a one-way
//! transition (`Open -> Closing -> Closed`); reopening a closed year is an
//! audited administrative override handled by the store. `is_active` and
//! `is_published` are flags orthogonal to the closing lifecycle: at most one
//! year is active for entry creation, and publication only controls external
//! report visibility.

pub mod year;

pub use year::{FiscalYear, FiscalYearError, YearState};
