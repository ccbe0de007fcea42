use chrono::NaiveDate;
use thiserror::Error;

use awqaf_accounts::RegistryError;
use awqaf_autopost::AutoPostError;
use awqaf_core::{FiscalYearId, JournalEntryId};
use awqaf_fiscal::FiscalYearError;
use awqaf_journal::JournalError;

/// Store-level failures, composing the domain crates' errors.
///
/// Everything here is deterministic and caller-correctable; variants carry
/// the line, account, or year at fault so callers can fix and retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error(transparent)]
    FiscalYear(#[from] FiscalYearError),

    #[error(transparent)]
    AutoPost(#[from] AutoPostError),

    #[error("no fiscal year with id {id}")]
    UnknownFiscalYear { id: FiscalYearId },

    #[error("no journal entry with id {id}")]
    UnknownEntry { id: JournalEntryId },

    #[error("fiscal year {name} is not active")]
    InactiveFiscalYear { name: String },

    #[error("no active fiscal year covers {date}")]
    NoActiveFiscalYear { date: NaiveDate },

    #[error("fiscal year {name} is already active")]
    ActiveYearExists { name: String },

    #[error("entry date {date} falls outside fiscal year {name}")]
    DateOutsideYear { date: NaiveDate, name: String },

    #[error("fiscal year {name} still has {count} draft entries")]
    OutstandingDrafts { name: String, count: usize },

    #[error("fiscal year {name} does not follow the year being closed")]
    NotNextYear { name: String },

    #[error("carry-forward account {code} must be an equity account")]
    CarryAccountNotEquity { code: String },

    #[error("posted entries are immutable; corrections go through reverse")]
    PostedEntryImmutable,
}
