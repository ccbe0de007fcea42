use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use awqaf_core::{AccountId, Money};

use crate::entry::{JournalError, JournalLine};

/// An unnumbered line as authored, by a human form or by the auto-posting
/// engine. Account references are already resolved; string codes never
/// travel past the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftLine {
    pub account_id: AccountId,
    pub description: Option<String>,
    pub debit: Money,
    pub credit: Money,
}

impl DraftLine {
    pub fn debit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            description: None,
            debit: amount,
            credit: Money::ZERO,
        }
    }

    pub fn credit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            description: None,
            debit: Money::ZERO,
            credit: amount,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An immutable, already-balanced line set.
///
/// `build` is the only constructor: balance checking is a pure function
/// over the finished lines, not a running side effect of edits. Whatever
/// holds an `EntryDraft` holds a valid entry body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    entry_date: NaiveDate,
    description: String,
    lines: Vec<JournalLine>,
}

impl EntryDraft {
    pub fn build(
        entry_date: NaiveDate,
        description: impl Into<String>,
        lines: Vec<DraftLine>,
    ) -> Result<Self, JournalError> {
        if lines.is_empty() {
            return Err(JournalError::EmptyLineSet);
        }
        if lines.len() < 2 {
            return Err(JournalError::SingleLineEntry);
        }

        let mut lines: Vec<JournalLine> = lines
            .into_iter()
            .zip(1u32..)
            .map(|(line, line_number)| JournalLine {
                line_number,
                account_id: line.account_id,
                description: line.description,
                debit: line.debit,
                credit: line.credit,
            })
            .collect();

        for line in &lines {
            line.validate()?;
        }

        let debit_total: Money = lines.iter().map(|l| l.debit).sum();
        let credit_total: Money = lines.iter().map(|l| l.credit).sum();

        // One minor unit of slack for rounding accumulated across lines
        // entered as decimals or derived from percentage splits; amounts
        // themselves are already rounded.
        let residual = debit_total - credit_total;
        if residual.abs() > Money::TOLERANCE {
            return Err(JournalError::UnbalancedEntry {
                debit_total,
                credit_total,
            });
        }
        // Balanced-but-zero records nothing.
        if debit_total.is_zero() && credit_total.is_zero() {
            return Err(JournalError::ZeroEntry);
        }
        // A residual inside the tolerance is settled against an existing
        // line, so stored entries always balance exactly.
        if !residual.is_zero() {
            settle_residual(&mut lines, residual);
        }

        Ok(Self {
            entry_date,
            description: description.into(),
            lines,
        })
    }

    pub fn entry_date(&self) -> NaiveDate {
        self.entry_date
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn lines(&self) -> &[JournalLine] {
        &self.lines
    }

    pub(crate) fn into_parts(self) -> (NaiveDate, String, Vec<JournalLine>) {
        (self.entry_date, self.description, self.lines)
    }
}

/// Absorb a within-tolerance rounding residual: shrink the largest line of
/// the heavy side, or grow the largest line of the light side when the
/// heavy side cannot shrink without zeroing a line.
fn settle_residual(lines: &mut [JournalLine], residual: Money) {
    let amount = residual.abs();
    let debits_heavy = residual > Money::ZERO;

    let shrink = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| {
            if debits_heavy {
                l.debit > amount
            } else {
                l.credit > amount
            }
        })
        .max_by_key(|(_, l)| if debits_heavy { l.debit } else { l.credit })
        .map(|(i, _)| i);
    if let Some(i) = shrink {
        if debits_heavy {
            lines[i].debit -= amount;
        } else {
            lines[i].credit -= amount;
        }
        return;
    }

    let grow = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| {
            if debits_heavy {
                !l.credit.is_zero()
            } else {
                !l.debit.is_zero()
            }
        })
        .max_by_key(|(_, l)| if debits_heavy { l.credit } else { l.debit })
        .map(|(i, _)| i);
    if let Some(i) = grow {
        if debits_heavy {
            lines[i].credit += amount;
        } else {
            lines[i].debit += amount;
        }
    }
}
