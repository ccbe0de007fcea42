//! Statement aggregation: pure reads over posted history.
//!
//! Nothing here mutates state; each report takes one consistent snapshot
//! of the store. Callers that need memoization can key a cache on the date
//! range plus the last posted entry they have seen.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use awqaf_accounts::{Account, AccountKind};
use awqaf_core::{AccountId, Money};

use crate::store::{account_totals, account_totals_between, Ledger};

/// Account identification as it appears on statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: AccountId,
    pub code: String,
    pub name: String,
    pub kind: AccountKind,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            code: account.code.clone(),
            name: account.name.clone(),
            kind: account.kind,
        }
    }
}

/// Gross debit and credit activity of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account: AccountSummary,
    pub debit_total: Money,
    pub credit_total: Money,
}

/// Trial balance as of a date. `debit_total == credit_total` always; the
/// equality doubles as a continuous correctness check on the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub as_of: NaiveDate,
    pub rows: Vec<TrialBalanceRow>,
    pub debit_total: Money,
    pub credit_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLine {
    pub account: AccountSummary,
    pub amount: Money,
}

/// Income statement over a period, revenue and expense only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub revenue: Vec<StatementLine>,
    pub expenses: Vec<StatementLine>,
    pub total_revenue: Money,
    pub total_expense: Money,
    pub net_income: Money,
}

impl Ledger {
    /// Per-leaf-account posted debit and credit totals up to `as_of`,
    /// code-sorted, with grand totals.
    pub fn trial_balance(&self, as_of: NaiveDate) -> TrialBalance {
        let leaves = self.registry().leaf_accounts();
        let totals = {
            let state = self.read();
            account_totals(&state, as_of)
        };

        let mut debit_total = Money::ZERO;
        let mut credit_total = Money::ZERO;
        let rows = leaves
            .iter()
            .map(|account| {
                let (debit, credit) = totals
                    .get(&account.id)
                    .copied()
                    .unwrap_or((Money::ZERO, Money::ZERO));
                debit_total += debit;
                credit_total += credit;
                TrialBalanceRow {
                    account: account.into(),
                    debit_total: debit,
                    credit_total: credit,
                }
            })
            .collect();

        tracing::debug!(%as_of, "trial balance computed");
        TrialBalance {
            as_of,
            rows,
            debit_total,
            credit_total,
        }
    }

    /// Trial balance including header accounts, each header carrying the
    /// roll-up of its descendant leaves.
    pub fn rolled_trial_balance(&self, as_of: NaiveDate) -> Vec<TrialBalanceRow> {
        let accounts = self.registry().all_accounts();
        let totals = {
            let state = self.read();
            account_totals(&state, as_of)
        };

        accounts
            .iter()
            .map(|account| {
                let (debit, credit) = self.rollup(account, &totals);
                TrialBalanceRow {
                    account: account.into(),
                    debit_total: debit,
                    credit_total: credit,
                }
            })
            .collect()
    }

    fn rollup(
        &self,
        account: &Account,
        totals: &HashMap<AccountId, (Money, Money)>,
    ) -> (Money, Money) {
        if !account.is_header {
            return totals
                .get(&account.id)
                .copied()
                .unwrap_or((Money::ZERO, Money::ZERO));
        }
        self.registry()
            .children_of(account.id)
            .iter()
            .map(|child| self.rollup(child, totals))
            .fold((Money::ZERO, Money::ZERO), |(d, c), (cd, cc)| {
                (d + cd, c + cc)
            })
    }

    /// Revenue and expense activity over `date_from..=date_to`. Accounts
    /// with no activity in the period are omitted.
    pub fn income_statement(&self, date_from: NaiveDate, date_to: NaiveDate) -> IncomeStatement {
        let leaves = self.registry().leaf_accounts();
        let totals = {
            let state = self.read();
            account_totals_between(&state, Some(date_from), date_to)
        };

        let mut revenue = Vec::new();
        let mut expenses = Vec::new();
        let mut total_revenue = Money::ZERO;
        let mut total_expense = Money::ZERO;
        for account in &leaves {
            let (debit, credit) = totals
                .get(&account.id)
                .copied()
                .unwrap_or((Money::ZERO, Money::ZERO));
            match account.kind {
                AccountKind::Revenue => {
                    let amount = credit - debit;
                    if !amount.is_zero() {
                        total_revenue += amount;
                        revenue.push(StatementLine {
                            account: account.into(),
                            amount,
                        });
                    }
                }
                AccountKind::Expense => {
                    let amount = debit - credit;
                    if !amount.is_zero() {
                        total_expense += amount;
                        expenses.push(StatementLine {
                            account: account.into(),
                            amount,
                        });
                    }
                }
                _ => {}
            }
        }

        tracing::debug!(%date_from, %date_to, "income statement computed");
        IncomeStatement {
            date_from,
            date_to,
            revenue,
            expenses,
            total_revenue,
            total_expense,
            net_income: total_revenue - total_expense,
        }
    }
}
