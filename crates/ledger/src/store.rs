use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use awqaf_accounts::{Account, AccountKind, AccountRegistry};
use awqaf_autopost::{AutoPostingEngine, BusinessEvent};
use awqaf_core::{AccountId, Entity, FiscalYearId, JournalEntryId, Money};
use awqaf_fiscal::FiscalYear;
use awqaf_journal::{DraftLine, EntryDraft, EntryStatus, JournalEntry, JournalError};

use crate::audit::{AuditAction, AuditRecord};
use crate::error::LedgerError;

/// One authored line of the human entry path. Accounts arrive as chart
/// codes and are resolved exactly once, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub account_code: String,
    pub description: Option<String>,
    pub debit: Money,
    pub credit: Money,
}

impl LineInput {
    pub fn debit(account_code: &str, amount: Money) -> Self {
        Self {
            account_code: account_code.to_string(),
            description: None,
            debit: amount,
            credit: Money::ZERO,
        }
    }

    pub fn credit(account_code: &str, amount: Money) -> Self {
        Self {
            account_code: account_code.to_string(),
            description: None,
            debit: Money::ZERO,
            credit: amount,
        }
    }
}

/// The human-driven entry authoring contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInput {
    pub entry_date: NaiveDate,
    pub description: String,
    pub fiscal_year_id: FiscalYearId,
    pub lines: Vec<LineInput>,
}

/// Result of applying a business event: either a freshly posted entry or
/// the entry a previous delivery of the same event already produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Posted(JournalEntry),
    AlreadyApplied(JournalEntry),
}

impl EventOutcome {
    pub fn entry(&self) -> &JournalEntry {
        match self {
            EventOutcome::Posted(e) | EventOutcome::AlreadyApplied(e) => e,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, EventOutcome::AlreadyApplied(_))
    }
}

#[derive(Debug, Default)]
pub(crate) struct LedgerState {
    pub(crate) years: HashMap<FiscalYearId, FiscalYear>,
    pub(crate) entries: HashMap<JournalEntryId, JournalEntry>,
    entry_seq: HashMap<FiscalYearId, u64>,
    applied: HashMap<(String, String), JournalEntryId>,
    carry_entries: HashMap<FiscalYearId, JournalEntryId>,
    audit: Vec<AuditRecord>,
}

impl LedgerState {
    fn year(&self, id: FiscalYearId) -> Result<&FiscalYear, LedgerError> {
        self.years
            .get(&id)
            .ok_or(LedgerError::UnknownFiscalYear { id })
    }

    fn next_entry_number(&mut self, year_id: FiscalYearId) -> u64 {
        let seq = self.entry_seq.entry(year_id).or_insert(0);
        *seq += 1;
        *seq
    }
}

/// Lines of an entry count toward balances only once it is posted, and a
/// reversed pair (original plus its mirror) nets out of history entirely.
pub(crate) fn is_effective(entry: &JournalEntry) -> bool {
    entry.status() == EntryStatus::Posted && entry.reversal_of().is_none()
}

/// Source-event tag of the carry-forward entry a close posts.
const CARRY_SOURCE_EVENT: &str = "fiscal_year_close";

/// Gross posted debit/credit per account up to and including `as_of`.
///
/// Once the fiscal year containing `as_of` holds an effective carry-forward
/// entry, totals are scoped to that year: closed history speaks through the
/// carry entry and is never counted twice. Until the preceding year closes
/// (or while it sits reopened, its carry reversed), totals span all posted
/// history.
pub(crate) fn account_totals(
    state: &LedgerState,
    as_of: NaiveDate,
) -> HashMap<AccountId, (Money, Money)> {
    let from = state
        .years
        .values()
        .find(|y| y.contains(as_of))
        .filter(|year| {
            state.entries.values().any(|e| {
                is_effective(e)
                    && e.fiscal_year_id() == year.id
                    && e.source_event() == Some(CARRY_SOURCE_EVENT)
            })
        })
        .map(|y| y.start_date);
    account_totals_between(state, from, as_of)
}

/// Same, restricted to `from..=to` when a lower bound is given.
pub(crate) fn account_totals_between(
    state: &LedgerState,
    from: Option<NaiveDate>,
    to: NaiveDate,
) -> HashMap<AccountId, (Money, Money)> {
    let mut totals: HashMap<AccountId, (Money, Money)> = HashMap::new();
    for entry in state.entries.values().filter(|e| {
        is_effective(e)
            && e.entry_date() <= to
            && from.is_none_or(|from| from <= e.entry_date())
    }) {
        for line in entry.lines() {
            let slot = totals.entry(line.account_id).or_default();
            slot.0 += line.debit;
            slot.1 += line.credit;
        }
    }
    totals
}

/// The journal entry store.
///
/// Any number of feature flows append concurrently; each create+validate+
/// post sequence for one entry commits under a single write lock, so either
/// the balanced entry becomes visible as a whole or nothing does. Distinct
/// entries never block on each other beyond that lock.
#[derive(Debug)]
pub struct Ledger {
    registry: Arc<AccountRegistry>,
    pub(crate) state: RwLock<LedgerState>,
}

impl Ledger {
    pub fn new(registry: Arc<AccountRegistry>) -> Self {
        Self {
            registry,
            state: RwLock::new(LedgerState::default()),
        }
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Fiscal year administration
    // ------------------------------------------------------------------

    /// Register a fiscal year. Years start inactive; activation is a
    /// separate, constrained step.
    pub fn add_fiscal_year(&self, mut year: FiscalYear) -> FiscalYear {
        year.is_active = false;
        let mut state = self.write();
        state.years.insert(year.id, year.clone());
        tracing::info!(year = %year.name, start = %year.start_date, end = %year.end_date, "fiscal year added");
        year
    }

    /// At most one fiscal year may be active at a time; this is a storage
    /// constraint, not a convention.
    pub fn activate_fiscal_year(&self, id: FiscalYearId) -> Result<(), LedgerError> {
        let mut state = self.write();
        if let Some(active) = state.years.values().find(|y| y.is_active && y.id != id) {
            return Err(LedgerError::ActiveYearExists {
                name: active.name.clone(),
            });
        }
        let year = state
            .years
            .get_mut(&id)
            .ok_or(LedgerError::UnknownFiscalYear { id })?;
        year.accepts_entries()?;
        year.is_active = true;
        tracing::info!(year = %year.name, "fiscal year activated");
        Ok(())
    }

    pub fn deactivate_fiscal_year(&self, id: FiscalYearId) -> Result<(), LedgerError> {
        let mut state = self.write();
        let year = state
            .years
            .get_mut(&id)
            .ok_or(LedgerError::UnknownFiscalYear { id })?;
        year.is_active = false;
        Ok(())
    }

    pub fn fiscal_year(&self, id: FiscalYearId) -> Result<FiscalYear, LedgerError> {
        self.read().year(id).cloned()
    }

    pub fn active_fiscal_year(&self) -> Option<FiscalYear> {
        self.read().years.values().find(|y| y.is_active).cloned()
    }

    // ------------------------------------------------------------------
    // Entry lifecycle
    // ------------------------------------------------------------------

    /// Create a draft from authored input. Codes resolve through the chart
    /// once; the balance invariant is checked before anything is stored.
    pub fn create_draft(&self, input: EntryInput) -> Result<JournalEntry, LedgerError> {
        let mut lines = Vec::with_capacity(input.lines.len());
        for line in input.lines {
            let account = self.registry.resolve(&line.account_code)?;
            self.registry.assert_postable(account.id)?;
            lines.push(DraftLine {
                account_id: account.id,
                description: line.description,
                debit: line.debit,
                credit: line.credit,
            });
        }
        let draft = EntryDraft::build(input.entry_date, input.description, lines)?;

        let mut state = self.write();
        let entry = admit_draft(&mut state, draft, input.fiscal_year_id, None, None, true)?;
        tracing::info!(
            entry_number = entry.entry_number(),
            date = %entry.entry_date(),
            "journal draft created"
        );
        Ok(entry)
    }

    /// `draft -> posted`: the entry becomes authoritative, immutable history.
    pub fn post(&self, id: JournalEntryId) -> Result<JournalEntry, LedgerError> {
        let mut state = self.write();
        let entry = post_locked(&mut state, id)?;
        tracing::info!(entry_number = entry.entry_number(), "journal entry posted");
        Ok(entry)
    }

    /// Drafts may be discarded without trace; posted entries never.
    pub fn discard_draft(&self, id: JournalEntryId) -> Result<(), LedgerError> {
        let mut state = self.write();
        let entry = state
            .entries
            .get(&id)
            .ok_or(LedgerError::UnknownEntry { id })?;
        if !entry.is_draft() {
            return Err(LedgerError::PostedEntryImmutable);
        }
        state.entries.remove(&id);
        Ok(())
    }

    /// The only sanctioned undo of a posted entry: create and post its
    /// mirror image, link the two, and mark the original reversed.
    pub fn reverse(&self, id: JournalEntryId, reason: &str) -> Result<JournalEntry, LedgerError> {
        let mut state = self.write();
        let reversal = reverse_locked(&mut state, id, reason)?;
        tracing::info!(
            entry_number = reversal.entry_number(),
            reversal_of = %id,
            "journal entry reversed"
        );
        Ok(reversal)
    }

    pub fn entry(&self, id: JournalEntryId) -> Result<JournalEntry, LedgerError> {
        self.read()
            .entries
            .get(&id)
            .cloned()
            .ok_or(LedgerError::UnknownEntry { id })
    }

    /// Entries of a year in entry-number order.
    pub fn entries_for_year(&self, year_id: FiscalYearId) -> Vec<JournalEntry> {
        let mut entries: Vec<JournalEntry> = self
            .read()
            .entries
            .values()
            .filter(|e| e.fiscal_year_id() == year_id)
            .cloned()
            .collect();
        entries.sort_by_key(JournalEntry::entry_number);
        entries
    }

    // ------------------------------------------------------------------
    // Auto-posting
    // ------------------------------------------------------------------

    /// Apply a business event: resolve it through its template, then create
    /// and post the entry atomically. Replays of the same
    /// `(event_type, idempotency_key)` return the original entry; racing
    /// replays resolve to exactly one winner.
    pub fn apply_event(
        &self,
        engine: &AutoPostingEngine,
        event: &BusinessEvent,
    ) -> Result<EventOutcome, LedgerError> {
        let key = (event.event_type.clone(), event.idempotency_key.clone());

        {
            let state = self.read();
            if let Some(entry) = state.applied.get(&key).and_then(|id| state.entries.get(id)) {
                return Ok(EventOutcome::AlreadyApplied(entry.clone()));
            }
        }

        let resolved = engine.resolve(event, &self.registry)?;

        let mut state = self.write();
        // A concurrent delivery may have won between the check above and
        // taking the write lock.
        if let Some(entry) = state.applied.get(&key).and_then(|id| state.entries.get(id)) {
            return Ok(EventOutcome::AlreadyApplied(entry.clone()));
        }

        let year = state
            .years
            .values()
            .find(|y| y.is_active)
            .cloned()
            .ok_or(LedgerError::NoActiveFiscalYear {
                date: event.occurred_at,
            })?;

        let draft = EntryDraft::build(event.occurred_at, resolved.description, resolved.lines)?;
        let entry = admit_draft(
            &mut state,
            draft,
            year.id,
            Some(resolved.source_event),
            None,
            true,
        )?;
        let posted = post_locked(&mut state, *entry.id())?;
        state.applied.insert(key, *posted.id());
        tracing::info!(
            event_type = %event.event_type,
            idempotency_key = %event.idempotency_key,
            entry_number = posted.entry_number(),
            "business event posted"
        );
        Ok(EventOutcome::Posted(posted))
    }

    // ------------------------------------------------------------------
    // Balances
    // ------------------------------------------------------------------

    /// Net balance of an account over posted history up to `as_of`,
    /// signed by the account's normal side. Once the year containing
    /// `as_of` has received its carry-forward entry, only that year's
    /// activity counts; before then prior open years show through.
    pub fn get_balance(
        &self,
        account_id: AccountId,
        as_of: NaiveDate,
    ) -> Result<Money, LedgerError> {
        let account = self.registry.get(account_id)?;
        let state = self.read();
        let (debit, credit) = account_totals(&state, as_of)
            .get(&account_id)
            .copied()
            .unwrap_or((Money::ZERO, Money::ZERO));
        Ok(if account.kind.is_debit_normal() {
            debit - credit
        } else {
            credit - debit
        })
    }

    // ------------------------------------------------------------------
    // Fiscal year closing
    // ------------------------------------------------------------------

    /// Close a fiscal year: no outstanding drafts, closing balances at
    /// `end_date`, and a carry-forward entry opening the balance-sheet
    /// accounts in the next year (revenue and expense reset; their net
    /// lands on the equity carry account as the plug). Runs entirely under
    /// the write lock, so no entry can slip into the year mid-close.
    ///
    /// Returns the carry-forward entry, or `None` when every closing
    /// balance was zero.
    pub fn close_fiscal_year(
        &self,
        year_id: FiscalYearId,
        next_year_id: FiscalYearId,
        carry_account_code: &str,
    ) -> Result<Option<JournalEntry>, LedgerError> {
        let carry = self.registry.resolve(carry_account_code)?;
        if carry.kind != AccountKind::Equity {
            return Err(LedgerError::CarryAccountNotEquity {
                code: carry.code.clone(),
            });
        }
        self.registry.assert_postable(carry.id)?;
        let leaves = self.registry.leaf_accounts();

        let mut state = self.write();
        let mut year = state.year(year_id)?.clone();
        year.begin_close()?;
        state.years.insert(year_id, year.clone());

        match close_locked(&mut state, &year, next_year_id, &carry, &leaves) {
            Ok(carry_entry) => {
                year.complete_close()?;
                state.years.insert(year_id, year.clone());
                let carry_id = carry_entry.as_ref().map(|e| *e.id());
                if let Some(id) = carry_id {
                    state.carry_entries.insert(year_id, id);
                }
                state.audit.push(AuditRecord::now(AuditAction::YearClosed {
                    year_id,
                    year: year.name.clone(),
                    carry_entry: carry_id,
                }));
                tracing::info!(year = %year.name, carried = carry_id.is_some(), "fiscal year closed");
                Ok(carry_entry)
            }
            Err(e) => {
                year.abort_close()?;
                state.years.insert(year_id, year);
                Err(e)
            }
        }
    }

    /// Administrative override, recorded in the audit log: reverses the
    /// year's carry-forward entry (so a later re-close cannot double-carry)
    /// and reopens the year for posting.
    pub fn reopen_fiscal_year(
        &self,
        year_id: FiscalYearId,
        actor: &str,
        reason: &str,
    ) -> Result<(), LedgerError> {
        let mut state = self.write();
        let mut year = state.year(year_id)?.clone();
        // Validates the year is actually closed before anything mutates.
        year.reopen()?;

        let carry_reversal = match state.carry_entries.get(&year_id).copied() {
            Some(carry_id) => Some(*reverse_locked(
                &mut state,
                carry_id,
                &format!("Carry-forward withdrawn: {reason}"),
            )?
            .id()),
            None => None,
        };
        state.carry_entries.remove(&year_id);

        state.years.insert(year_id, year.clone());
        state.audit.push(AuditRecord::now(AuditAction::YearReopened {
            year_id,
            year: year.name.clone(),
            actor: actor.to_string(),
            reason: reason.to_string(),
            carry_reversal,
        }));
        tracing::warn!(year = %year.name, actor, reason, "closed fiscal year reopened");
        Ok(())
    }

    /// Orthogonal visibility flag for external reporting.
    pub fn publish_fiscal_year(&self, year_id: FiscalYearId) -> Result<(), LedgerError> {
        let mut state = self.write();
        let mut year = state.year(year_id)?.clone();
        year.publish()?;
        state.years.insert(year_id, year.clone());
        state.audit.push(AuditRecord::now(AuditAction::YearPublished {
            year_id,
            year: year.name.clone(),
        }));
        tracing::info!(year = %year.name, "fiscal year published");
        Ok(())
    }

    pub fn audit_log(&self) -> Vec<AuditRecord> {
        self.read().audit.clone()
    }
}

/// Validate year constraints, allocate the entry number, and store a new
/// draft. Callers hold the write lock.
fn admit_draft(
    state: &mut LedgerState,
    draft: EntryDraft,
    fiscal_year_id: FiscalYearId,
    source_event: Option<String>,
    reversal_of: Option<JournalEntryId>,
    require_active: bool,
) -> Result<JournalEntry, LedgerError> {
    let year = state.year(fiscal_year_id)?;
    year.accepts_entries()?;
    if require_active && !year.is_active {
        return Err(LedgerError::InactiveFiscalYear {
            name: year.name.clone(),
        });
    }
    if !year.contains(draft.entry_date()) {
        return Err(LedgerError::DateOutsideYear {
            date: draft.entry_date(),
            name: year.name.clone(),
        });
    }

    let number = state.next_entry_number(fiscal_year_id);
    let entry = JournalEntry::from_draft(draft, number, fiscal_year_id, source_event, reversal_of);
    state.entries.insert(*entry.id(), entry.clone());
    Ok(entry)
}

fn post_locked(state: &mut LedgerState, id: JournalEntryId) -> Result<JournalEntry, LedgerError> {
    let entry = state
        .entries
        .get_mut(&id)
        .ok_or(LedgerError::UnknownEntry { id })?;
    entry.post()?;
    Ok(entry.clone())
}

fn reverse_locked(
    state: &mut LedgerState,
    id: JournalEntryId,
    reason: &str,
) -> Result<JournalEntry, LedgerError> {
    let original = state
        .entries
        .get(&id)
        .cloned()
        .ok_or(LedgerError::UnknownEntry { id })?;
    match original.status() {
        EntryStatus::Posted => {}
        EntryStatus::Draft => return Err(JournalError::NotPosted.into()),
        EntryStatus::Reversed => return Err(JournalError::AlreadyReversed.into()),
    }

    let lines: Vec<DraftLine> = original
        .reversal_lines()
        .into_iter()
        .map(|line| DraftLine {
            account_id: line.account_id,
            description: line.description,
            debit: line.debit,
            credit: line.credit,
        })
        .collect();
    let description = format!(
        "Reversal of entry {}: {}",
        original.entry_number(),
        reason
    );
    // Same date, same year: reversing into a closed period fails here,
    // which is what forces the audited reopen path.
    let draft = EntryDraft::build(original.entry_date(), description, lines)?;
    let entry = admit_draft(
        state,
        draft,
        original.fiscal_year_id(),
        None,
        Some(id),
        false,
    )?;
    let posted = post_locked(state, *entry.id())?;

    let original = state
        .entries
        .get_mut(&id)
        .ok_or(LedgerError::UnknownEntry { id })?;
    original.mark_reversed()?;
    Ok(posted)
}

/// The body of a close, run while the year sits in `Closing`; any error
/// aborts back to `Open` with no state change.
fn close_locked(
    state: &mut LedgerState,
    year: &FiscalYear,
    next_year_id: FiscalYearId,
    carry: &Account,
    leaves: &[Account],
) -> Result<Option<JournalEntry>, LedgerError> {
    let drafts = state
        .entries
        .values()
        .filter(|e| e.is_draft() && e.fiscal_year_id() == year.id)
        .count();
    if drafts > 0 {
        return Err(LedgerError::OutstandingDrafts {
            name: year.name.clone(),
            count: drafts,
        });
    }

    if next_year_id == year.id {
        return Err(LedgerError::NotNextYear {
            name: year.name.clone(),
        });
    }
    let next = state.year(next_year_id)?.clone();
    next.accepts_entries()?;
    if next.start_date <= year.end_date {
        return Err(LedgerError::NotNextYear {
            name: next.name.clone(),
        });
    }

    let totals = account_totals(state, year.end_date);
    let mut lines = Vec::new();
    let mut debit_total = Money::ZERO;
    let mut credit_total = Money::ZERO;
    for account in leaves.iter().filter(|a| a.kind.is_balance_sheet()) {
        let Some((debit, credit)) = totals.get(&account.id).copied() else {
            continue;
        };
        // Debit-positive net; the side of the opening line follows the
        // sign, not the account kind, so contra balances carry correctly.
        let net = debit - credit;
        if net.is_zero() {
            continue;
        }
        if net.is_negative() {
            credit_total += net.abs();
            lines.push(DraftLine::credit(account.id, net.abs()));
        } else {
            debit_total += net;
            lines.push(DraftLine::debit(account.id, net));
        }
    }

    // The residual is the period's accumulated net income; it lands on the
    // designated equity carry account.
    let residual = debit_total - credit_total;
    if residual > Money::ZERO {
        lines.push(
            DraftLine::credit(carry.id, residual).with_description("Net result carried forward"),
        );
    } else if residual < Money::ZERO {
        lines.push(
            DraftLine::debit(carry.id, residual.abs())
                .with_description("Net result carried forward"),
        );
    }

    if lines.is_empty() {
        return Ok(None);
    }

    let draft = EntryDraft::build(
        next.start_date,
        format!("Opening balances carried forward from {}", year.name),
        lines,
    )?;
    let entry = admit_draft(
        state,
        draft,
        next_year_id,
        Some(CARRY_SOURCE_EVENT.to_string()),
        None,
        false,
    )?;
    let posted = post_locked(state, *entry.id())?;
    Ok(Some(posted))
}
