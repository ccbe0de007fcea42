//! The journal entry store: durable-in-memory double-entry ledger.
//!
//! This crate ties the domain crates together: drafts are validated and
//! persisted atomically, business events post idempotently through the
//! auto-posting engine, fiscal years close with balance carry-forward, and
//! statements aggregate posted history. Every mutating operation runs under
//! one write lock, so readers never observe a partially-written entry.

pub mod audit;
pub mod error;
pub mod reports;
pub mod store;

pub use audit::{AuditAction, AuditRecord};
pub use error::LedgerError;
pub use reports::{
    AccountSummary, IncomeStatement, StatementLine, TrialBalance, TrialBalanceRow,
};
pub use store::{EntryInput, EventOutcome, Ledger, LineInput};
