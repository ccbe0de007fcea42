//! End-to-end flows: chart setup, auto-posted business events, statements,
//! and the fiscal-year lifecycle, driven through the public surface only.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;

use awqaf_accounts::{AccountKind, AccountRegistry, NewAccount};
use awqaf_autopost::{
    AccountSelector, AmountRule, AutoPostingEngine, AutoPostingTemplate, BusinessEvent, LineRule,
};
use awqaf_core::{Entity, Money};
use awqaf_fiscal::FiscalYear;
use awqaf_journal::Side;
use awqaf_ledger::{AuditAction, EntryInput, Ledger, LedgerError, LineInput};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Chart of accounts of a small waqf: properties, rent, distributions.
fn chart() -> Arc<AccountRegistry> {
    let registry = AccountRegistry::new();
    for (code, name, kind) in [
        ("1", "Assets", AccountKind::Asset),
        ("2", "Liabilities", AccountKind::Liability),
        ("3", "Equity", AccountKind::Equity),
        ("4", "Revenue", AccountKind::Revenue),
        ("5", "Expenses", AccountKind::Expense),
    ] {
        registry.insert(NewAccount::header(code, name, kind)).unwrap();
    }
    let parent = |code: &str| registry.resolve(code).unwrap().id;
    for (code, name, kind, p) in [
        ("1.1", "Cash", AccountKind::Asset, "1"),
        ("1.2", "Bank", AccountKind::Asset, "1"),
        ("1.3", "Tenant Receivable", AccountKind::Asset, "1"),
        ("2.1", "Distribution Payable", AccountKind::Liability, "2"),
        ("2.2", "VAT Payable", AccountKind::Liability, "2"),
        ("3.1", "Waqf Capital", AccountKind::Equity, "3"),
        ("3.2", "Retained Surplus", AccountKind::Equity, "3"),
        ("4.1", "Rent Revenue", AccountKind::Revenue, "4"),
        ("4.2", "Contribution Revenue", AccountKind::Revenue, "4"),
        ("5.1", "Maintenance Expense", AccountKind::Expense, "5"),
        ("5.2", "Utilities Expense", AccountKind::Expense, "5"),
    ] {
        registry
            .insert(NewAccount::leaf(code, name, kind).under(parent(p)))
            .unwrap();
    }
    Arc::new(registry)
}

fn engine() -> AutoPostingEngine {
    let engine = AutoPostingEngine::new();
    engine
        .register_template(AutoPostingTemplate::new(
            "payment_received",
            "Rent payment received",
            vec![
                LineRule::new(
                    Side::Debit,
                    AccountSelector::Code("1.2".into()),
                    AmountRule::Field("amount".into()),
                ),
                LineRule::new(
                    Side::Credit,
                    AccountSelector::Code("1.3".into()),
                    AmountRule::Field("amount".into()),
                ),
            ],
        ))
        .unwrap();
    engine
        .register_template(AutoPostingTemplate::new(
            "invoice_issued",
            "Invoice issued",
            vec![
                LineRule::new(
                    Side::Debit,
                    AccountSelector::Code("1.3".into()),
                    AmountRule::Field("amount".into()),
                ),
                LineRule::new(
                    Side::Credit,
                    AccountSelector::Code("4.1".into()),
                    AmountRule::Percent {
                        field: "amount".into(),
                        basis_points: 8_696, // net of 15% VAT, tax-inclusive
                    },
                ),
                LineRule::new(
                    Side::Credit,
                    AccountSelector::Code("2.2".into()),
                    AmountRule::Remainder,
                )
                .with_description("VAT portion"),
            ],
        ))
        .unwrap();
    engine
        .register_template(AutoPostingTemplate::new(
            "invoice_paid",
            "Invoice settled",
            vec![
                LineRule::new(
                    Side::Debit,
                    AccountSelector::Code("1.2".into()),
                    AmountRule::Field("amount".into()),
                ),
                LineRule::new(
                    Side::Credit,
                    AccountSelector::Code("1.3".into()),
                    AmountRule::Field("amount".into()),
                ),
            ],
        ))
        .unwrap();
    engine
        .register_template(AutoPostingTemplate::new(
            "expense_recorded",
            "Expense recorded",
            vec![
                LineRule::new(
                    Side::Debit,
                    AccountSelector::Category {
                        field: "category".into(),
                        accounts: BTreeMap::from([
                            ("maintenance".to_string(), "5.1".to_string()),
                            ("utilities".to_string(), "5.2".to_string()),
                        ]),
                    },
                    AmountRule::Field("amount".into()),
                ),
                LineRule::new(
                    Side::Credit,
                    AccountSelector::Code("1.1".into()),
                    AmountRule::Field("amount".into()),
                ),
            ],
        ))
        .unwrap();
    engine
        .register_template(AutoPostingTemplate::new(
            "distribution_executed",
            "Beneficiary distribution executed",
            vec![
                LineRule::new(
                    Side::Debit,
                    AccountSelector::Code("2.1".into()),
                    AmountRule::Field("amount".into()),
                ),
                LineRule::new(
                    Side::Credit,
                    AccountSelector::Code("1.2".into()),
                    AmountRule::Field("amount".into()),
                ),
            ],
        ))
        .unwrap();
    engine
}

struct World {
    ledger: Ledger,
    engine: AutoPostingEngine,
    year: FiscalYear,
    next_year: FiscalYear,
}

fn world() -> World {
    awqaf_observability::init();
    let ledger = Ledger::new(chart());
    let year = ledger.add_fiscal_year(
        FiscalYear::new("2024-2025", date(2024, 7, 1), date(2025, 6, 30)).unwrap(),
    );
    let next_year = ledger.add_fiscal_year(
        FiscalYear::new("2025-2026", date(2025, 7, 1), date(2026, 6, 30)).unwrap(),
    );
    ledger.activate_fiscal_year(year.id).unwrap();
    World {
        ledger,
        engine: engine(),
        year,
        next_year,
    }
}

fn balance(w: &World, code: &str, as_of: NaiveDate) -> Money {
    let id = w.ledger.registry().resolve(code).unwrap().id;
    w.ledger.get_balance(id, as_of).unwrap()
}

#[test]
fn rent_with_vat_posts_and_moves_cash() -> Result<()> {
    let w = world();
    let entry = w.ledger.create_draft(EntryInput {
        entry_date: date(2025, 1, 10),
        description: "January rent, unit 4".to_string(),
        fiscal_year_id: w.year.id,
        lines: vec![
            LineInput::debit("1.1", Money::from_minor(100_000)),
            LineInput::credit("4.1", Money::from_minor(85_000)),
            LineInput::credit("2.2", Money::from_minor(15_000)),
        ],
    })?;
    w.ledger.post(*entry.id())?;

    assert_eq!(
        balance(&w, "1.1", date(2025, 1, 10)),
        Money::from_minor(100_000)
    );

    let tb = w.ledger.trial_balance(date(2025, 6, 30));
    assert_eq!(tb.debit_total, tb.credit_total);
    assert_eq!(tb.debit_total, Money::from_minor(100_000));
    Ok(())
}

#[test]
fn unbalanced_authoring_is_rejected_with_no_state() {
    let w = world();
    let err = w
        .ledger
        .create_draft(EntryInput {
            entry_date: date(2025, 1, 10),
            description: "Short rent".to_string(),
            fiscal_year_id: w.year.id,
            lines: vec![
                LineInput::debit("1.1", Money::from_minor(100_000)),
                LineInput::credit("4.1", Money::from_minor(80_000)),
            ],
        })
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Journal(awqaf_journal::JournalError::UnbalancedEntry { .. })
    ));
    assert!(w.ledger.entries_for_year(w.year.id).is_empty());
}

#[test]
fn replayed_event_posts_exactly_once() -> Result<()> {
    let w = world();
    let event = BusinessEvent::new("invoice_paid", "INV-1", date(2025, 2, 1))
        .with_field("invoice_id", "INV-1")
        .with_field("amount", 11_500.0);

    let first = w.ledger.apply_event(&w.engine, &event)?;
    let second = w.ledger.apply_event(&w.engine, &event)?;

    assert!(!first.is_replay());
    assert!(second.is_replay());
    assert_eq!(first.entry().id(), second.entry().id());
    assert_eq!(w.ledger.entries_for_year(w.year.id).len(), 1);
    assert_eq!(
        balance(&w, "1.2", date(2025, 6, 30)),
        Money::from_minor(1_150_000)
    );
    Ok(())
}

#[test]
fn racing_replays_resolve_to_one_winner() {
    let w = Arc::new(world());
    let event = BusinessEvent::new("payment_received", "PAY-42", date(2025, 3, 5))
        .with_field("amount", 2_500.0);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let w = Arc::clone(&w);
            let event = event.clone();
            std::thread::spawn(move || w.ledger.apply_event(&w.engine, &event).unwrap())
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = outcomes.iter().filter(|o| !o.is_replay()).count();
    assert_eq!(winners, 1);
    let ids: std::collections::HashSet<_> =
        outcomes.iter().map(|o| *o.entry().id()).collect();
    assert_eq!(ids.len(), 1);
    assert_eq!(w.ledger.entries_for_year(w.year.id).len(), 1);
}

#[test]
fn full_cycle_events_statements_and_close() -> Result<()> {
    let w = world();

    // Issue a tax-inclusive invoice, collect it, pay an expense, distribute.
    let issued = w.ledger.apply_event(
        &w.engine,
        &BusinessEvent::new("invoice_issued", "INV-9", date(2024, 9, 1))
            .with_field("amount", 11_500.0),
    )?;
    assert_eq!(
        issued.entry().debit_total(),
        issued.entry().credit_total()
    );

    w.ledger.apply_event(
        &w.engine,
        &BusinessEvent::new("invoice_paid", "INV-9", date(2024, 9, 20))
            .with_field("amount", 11_500.0),
    )?;
    w.ledger.apply_event(
        &w.engine,
        &BusinessEvent::new("expense_recorded", "EXP-7", date(2024, 10, 3))
            .with_field("category", "maintenance")
            .with_field("amount", 1_000.0),
    )?;

    // Cash funds the distribution payable first, then it is executed.
    let accrual = w.ledger.create_draft(EntryInput {
        entry_date: date(2025, 2, 1),
        description: "Approve beneficiary distribution".to_string(),
        fiscal_year_id: w.year.id,
        lines: vec![
            LineInput::debit("3.1", Money::from_minor(200_000)),
            LineInput::credit("2.1", Money::from_minor(200_000)),
        ],
    })?;
    w.ledger.post(*accrual.id())?;
    w.ledger.apply_event(
        &w.engine,
        &BusinessEvent::new("distribution_executed", "DIST-1", date(2025, 2, 15))
            .with_field("amount", 2_000.0),
    )?;

    // Statements over the year.
    let tb = w.ledger.trial_balance(date(2025, 6, 30));
    assert_eq!(tb.debit_total, tb.credit_total);

    let is = w
        .ledger
        .income_statement(date(2024, 7, 1), date(2025, 6, 30));
    assert_eq!(is.total_revenue, Money::from_minor(1_000_040)); // 86.96% of 11500.00
    assert_eq!(is.total_expense, Money::from_minor(100_000));
    assert_eq!(is.net_income, is.total_revenue - is.total_expense);
    assert_eq!(is.revenue.len(), 1);
    assert_eq!(is.expenses.len(), 1);

    // Header roll-up covers its leaves.
    let rolled = w.ledger.rolled_trial_balance(date(2025, 6, 30));
    let assets = rolled.iter().find(|r| r.account.code == "1").unwrap();
    let leaf_debits: Money = rolled
        .iter()
        .filter(|r| r.account.code.starts_with("1."))
        .map(|r| r.debit_total)
        .sum();
    assert_eq!(assets.debit_total, leaf_debits);

    // Close the year into the next one.
    let carry = w
        .ledger
        .close_fiscal_year(w.year.id, w.next_year.id, "3.2")?
        .expect("nonzero balances must carry");
    assert_eq!(carry.entry_date(), date(2025, 7, 1));
    assert_eq!(carry.fiscal_year_id(), w.next_year.id);
    assert_eq!(carry.debit_total(), carry.credit_total());
    assert_eq!(carry.source_event(), Some("fiscal_year_close"));

    assert!(w.ledger.fiscal_year(w.year.id)?.is_closed());
    assert!(!w.ledger.fiscal_year(w.year.id)?.is_active);

    // Revenue and expense reset in the new year; balance sheet carries.
    w.ledger.activate_fiscal_year(w.next_year.id)?;
    let next_is = w
        .ledger
        .income_statement(date(2025, 7, 1), date(2026, 6, 30));
    assert_eq!(next_is.net_income, Money::ZERO);

    // The carry entry re-states the balance-sheet accounts in the new
    // year; balances are unchanged across the boundary, counted once.
    let bank_before_close = balance(&w, "1.2", date(2025, 6, 30));
    let bank_after_open = balance(&w, "1.2", date(2025, 7, 1));
    assert_eq!(bank_after_open, bank_before_close);

    // The carried surplus equals the closed year's net income.
    let surplus = balance(&w, "3.2", date(2025, 7, 1));
    assert_eq!(surplus, is.net_income);

    // Publication is orthogonal and only valid once closed.
    w.ledger.publish_fiscal_year(w.year.id)?;
    assert!(w.ledger.fiscal_year(w.year.id)?.is_published);
    Ok(())
}

#[test]
fn close_with_outstanding_draft_changes_nothing() -> Result<()> {
    let w = world();
    let posted = w.ledger.create_draft(EntryInput {
        entry_date: date(2025, 1, 10),
        description: "Rent".to_string(),
        fiscal_year_id: w.year.id,
        lines: vec![
            LineInput::debit("1.1", Money::from_minor(10_000)),
            LineInput::credit("4.1", Money::from_minor(10_000)),
        ],
    })?;
    w.ledger.post(*posted.id())?;

    let draft = w.ledger.create_draft(EntryInput {
        entry_date: date(2025, 3, 1),
        description: "Pending correction".to_string(),
        fiscal_year_id: w.year.id,
        lines: vec![
            LineInput::debit("5.1", Money::from_minor(500)),
            LineInput::credit("1.1", Money::from_minor(500)),
        ],
    })?;

    let err = w
        .ledger
        .close_fiscal_year(w.year.id, w.next_year.id, "3.2")
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::OutstandingDrafts {
            name: "2024-2025".into(),
            count: 1
        }
    );

    // No state change: the year still accepts entries and nothing was
    // carried into the next year.
    assert!(!w.ledger.fiscal_year(w.year.id)?.is_closed());
    assert!(w.ledger.entries_for_year(w.next_year.id).is_empty());

    // Resolve the draft, then closing succeeds.
    w.ledger.post(*draft.id())?;
    w.ledger
        .close_fiscal_year(w.year.id, w.next_year.id, "3.2")?;
    Ok(())
}

#[test]
fn reopen_is_audited_and_withdraws_the_carry() -> Result<()> {
    let w = world();
    let entry = w.ledger.create_draft(EntryInput {
        entry_date: date(2025, 1, 10),
        description: "Rent".to_string(),
        fiscal_year_id: w.year.id,
        lines: vec![
            LineInput::debit("1.2", Money::from_minor(30_000)),
            LineInput::credit("4.1", Money::from_minor(30_000)),
        ],
    })?;
    w.ledger.post(*entry.id())?;

    let carry = w
        .ledger
        .close_fiscal_year(w.year.id, w.next_year.id, "3.2")?
        .unwrap();

    w.ledger
        .reopen_fiscal_year(w.year.id, "auditor", "misposted rent found")?;
    assert!(!w.ledger.fiscal_year(w.year.id)?.is_closed());

    // The carry entry is reversed; the reopened year's activity shows
    // through again until it is closed anew.
    assert_eq!(balance(&w, "1.2", date(2025, 7, 2)), Money::from_minor(30_000));
    assert_eq!(
        w.ledger.entry(*carry.id())?.status(),
        awqaf_journal::EntryStatus::Reversed
    );

    let audit = w.ledger.audit_log();
    assert!(audit.iter().any(|r| matches!(
        &r.action,
        AuditAction::YearReopened { actor, reason, carry_reversal: Some(_), .. }
            if actor == "auditor" && reason == "misposted rent found"
    )));

    // Re-close after corrections: one live carry entry again, no
    // double-carry.
    w.ledger
        .close_fiscal_year(w.year.id, w.next_year.id, "3.2")?;
    assert_eq!(balance(&w, "1.2", date(2025, 7, 2)), Money::from_minor(30_000));
    Ok(())
}

#[test]
fn percentage_rounding_still_posts_exact_balance() -> Result<()> {
    let w = world();
    w.engine
        .register_template(AutoPostingTemplate::new(
            "donation_allocated",
            "Donation allocated across funds",
            vec![
                LineRule::new(
                    Side::Debit,
                    AccountSelector::Code("1.1".into()),
                    AmountRule::Field("amount".into()),
                ),
                LineRule::new(
                    Side::Credit,
                    AccountSelector::Code("4.1".into()),
                    AmountRule::Percent {
                        field: "amount".into(),
                        basis_points: 8_500,
                    },
                ),
                LineRule::new(
                    Side::Credit,
                    AccountSelector::Code("4.2".into()),
                    AmountRule::Percent {
                        field: "amount".into(),
                        basis_points: 1_500,
                    },
                ),
            ],
        ))
        .unwrap();

    // 0.10 splits into 0.09 and 0.02 before settlement, one minor unit
    // over on the credit side.
    let outcome = w.ledger.apply_event(
        &w.engine,
        &BusinessEvent::new("donation_allocated", "DON-1", date(2024, 8, 1))
            .with_field("amount", 0.10),
    )?;
    let entry = outcome.entry();
    assert_eq!(entry.debit_total(), entry.credit_total());
    assert_eq!(entry.debit_total(), Money::from_minor(10));

    let tb = w.ledger.trial_balance(date(2025, 6, 30));
    assert_eq!(tb.debit_total, tb.credit_total);
    Ok(())
}

proptest::proptest! {
    #![proptest_config(proptest::prelude::ProptestConfig::with_cases(32))]

    /// Any sequence of posted entries, with an arbitrary one reversed,
    /// keeps the trial balance grand totals equal.
    #[test]
    fn trial_balance_never_leaves_balance(
        amounts in proptest::collection::vec(1i64..1_000_000, 1..8),
        reverse_at in 0usize..8,
    ) {
        let w = world();
        let mut posted = Vec::new();
        for (i, amount) in amounts.iter().enumerate() {
            let (dr, cr) = if i % 2 == 0 { ("1.1", "4.1") } else { ("5.1", "1.2") };
            let entry = w.ledger.create_draft(EntryInput {
                entry_date: date(2024, 8, 1),
                description: format!("entry {i}"),
                fiscal_year_id: w.year.id,
                lines: vec![
                    LineInput::debit(dr, Money::from_minor(*amount)),
                    LineInput::credit(cr, Money::from_minor(*amount)),
                ],
            }).unwrap();
            posted.push(w.ledger.post(*entry.id()).unwrap());
        }
        if let Some(entry) = posted.get(reverse_at) {
            w.ledger.reverse(*entry.id(), "property check").unwrap();
        }

        let tb = w.ledger.trial_balance(date(2025, 6, 30));
        proptest::prop_assert_eq!(tb.debit_total, tb.credit_total);
    }
}

#[test]
fn events_outside_the_active_year_are_rejected() {
    let w = world();
    let event = BusinessEvent::new("payment_received", "PAY-77", date(2026, 1, 1))
        .with_field("amount", 100.0);
    assert!(matches!(
        w.ledger.apply_event(&w.engine, &event).unwrap_err(),
        LedgerError::DateOutsideYear { .. }
    ));
}
