use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use awqaf_core::{AccountId, Entity, FiscalYearId, JournalEntryId, Money, ValueObject};

use crate::draft::EntryDraft;

/// Which side of the ledger a line (or template rule) touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }
}

/// Posting lifecycle. `Draft -> Posted -> Reversed`, no skips, no way back.
///
/// A draft may be discarded without trace; a posted entry may not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Draft,
    Posted,
    Reversed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JournalError {
    #[error("journal entry has no lines")]
    EmptyLineSet,

    #[error("journal entry has a single line; it can never balance")]
    SingleLineEntry,

    #[error("line {line_number}: debit and credit are both set")]
    LineWithBothSides { line_number: u32 },

    #[error("line {line_number}: neither debit nor credit is set")]
    LineWithoutSide { line_number: u32 },

    #[error("line {line_number}: amounts must not be negative")]
    NegativeAmount { line_number: u32 },

    #[error("entry does not balance: debits {debit_total} != credits {credit_total}")]
    UnbalancedEntry {
        debit_total: Money,
        credit_total: Money,
    },

    #[error("entry is balanced but zero; nothing to record")]
    ZeroEntry,

    #[error("entry is not a draft")]
    NotDraft,

    #[error("entry is already posted")]
    AlreadyPosted,

    #[error("entry is not posted")]
    NotPosted,

    #[error("entry is already reversed")]
    AlreadyReversed,
}

/// One debit or credit against a leaf account.
///
/// Exactly one of `debit`/`credit` is nonzero; `line_number` is 1-based and
/// fixes display and tie-break order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub line_number: u32,
    pub account_id: AccountId,
    pub description: Option<String>,
    pub debit: Money,
    pub credit: Money,
}

impl JournalLine {
    pub(crate) fn validate(&self) -> Result<(), JournalError> {
        if self.debit.is_negative() || self.credit.is_negative() {
            return Err(JournalError::NegativeAmount {
                line_number: self.line_number,
            });
        }
        match (self.debit.is_zero(), self.credit.is_zero()) {
            (false, false) => Err(JournalError::LineWithBothSides {
                line_number: self.line_number,
            }),
            (true, true) => Err(JournalError::LineWithoutSide {
                line_number: self.line_number,
            }),
            _ => Ok(()),
        }
    }

    pub fn side(&self) -> Side {
        if self.debit.is_zero() {
            Side::Credit
        } else {
            Side::Debit
        }
    }

    /// Same account and order, debit and credit swapped.
    pub fn mirrored(&self) -> JournalLine {
        JournalLine {
            line_number: self.line_number,
            account_id: self.account_id,
            description: self.description.clone(),
            debit: self.credit,
            credit: self.debit,
        }
    }
}

impl ValueObject for JournalLine {}

/// A journal entry: header plus its ordered, validated line set.
///
/// Fields are private; once an entry leaves draft state nothing but its
/// status can change, and even that only along the posting lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    id: JournalEntryId,
    /// Human-readable sequence, unique and monotonic per fiscal year.
    entry_number: u64,
    entry_date: NaiveDate,
    description: String,
    fiscal_year_id: FiscalYearId,
    status: EntryStatus,
    /// Tag of the originating business event, e.g. `invoice_issued`.
    source_event: Option<String>,
    /// Set on reversal entries; points at the entry being undone.
    reversal_of: Option<JournalEntryId>,
    lines: Vec<JournalLine>,
}

impl JournalEntry {
    /// Materialize a validated draft into a stored entry. Only the store
    /// calls this; `entry_number` comes from its per-year counter.
    pub fn from_draft(
        draft: EntryDraft,
        entry_number: u64,
        fiscal_year_id: FiscalYearId,
        source_event: Option<String>,
        reversal_of: Option<JournalEntryId>,
    ) -> Self {
        let (entry_date, description, lines) = draft.into_parts();
        Self {
            id: JournalEntryId::new(),
            entry_number,
            entry_date,
            description,
            fiscal_year_id,
            status: EntryStatus::Draft,
            source_event,
            reversal_of,
            lines,
        }
    }

    pub fn entry_number(&self) -> u64 {
        self.entry_number
    }

    pub fn entry_date(&self) -> NaiveDate {
        self.entry_date
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn fiscal_year_id(&self) -> FiscalYearId {
        self.fiscal_year_id
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn source_event(&self) -> Option<&str> {
        self.source_event.as_deref()
    }

    pub fn reversal_of(&self) -> Option<JournalEntryId> {
        self.reversal_of
    }

    pub fn lines(&self) -> &[JournalLine] {
        &self.lines
    }

    pub fn debit_total(&self) -> Money {
        self.lines.iter().map(|l| l.debit).sum()
    }

    pub fn credit_total(&self) -> Money {
        self.lines.iter().map(|l| l.credit).sum()
    }

    pub fn is_draft(&self) -> bool {
        self.status == EntryStatus::Draft
    }

    /// `draft -> posted`. From then on account balances treat the entry as
    /// authoritative.
    pub fn post(&mut self) -> Result<(), JournalError> {
        match self.status {
            EntryStatus::Draft => {
                self.status = EntryStatus::Posted;
                Ok(())
            }
            EntryStatus::Posted => Err(JournalError::AlreadyPosted),
            EntryStatus::Reversed => Err(JournalError::NotDraft),
        }
    }

    /// `posted -> reversed`; the caller must have created the mirror entry.
    pub fn mark_reversed(&mut self) -> Result<(), JournalError> {
        match self.status {
            EntryStatus::Posted => {
                self.status = EntryStatus::Reversed;
                Ok(())
            }
            EntryStatus::Draft => Err(JournalError::NotPosted),
            EntryStatus::Reversed => Err(JournalError::AlreadyReversed),
        }
    }

    /// The mirror image of this entry's lines, for building its reversal.
    pub fn reversal_lines(&self) -> Vec<JournalLine> {
        self.lines.iter().map(JournalLine::mirrored).collect()
    }
}

impl Entity for JournalEntry {
    type Id = JournalEntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
