use serde::{Deserialize, Serialize};

use awqaf_core::{AccountId, Entity};

/// High-level account kind (determines the normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountKind {
    /// Whether the account normally carries a debit balance.
    pub fn is_debit_normal(self) -> bool {
        matches!(self, AccountKind::Asset | AccountKind::Expense)
    }

    /// Balance-sheet kinds survive fiscal-year closing; revenue and expense
    /// reset to zero each period.
    pub fn is_balance_sheet(self) -> bool {
        matches!(
            self,
            AccountKind::Asset | AccountKind::Liability | AccountKind::Equity
        )
    }
}

/// A node in the chart of accounts.
///
/// Once referenced by a posted journal line an account is never deleted,
/// only deactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Dot-separated numeric segments encoding the tree path, e.g. `"1.1.1"`.
    pub code: String,
    pub name: String,
    pub kind: AccountKind,
    /// Header accounts aggregate children and are not postable.
    pub is_header: bool,
    pub is_active: bool,
    pub parent_id: Option<AccountId>,
}

impl Account {
    /// Numeric sort key over the code's segments; callers must only invoke
    /// this on validated codes.
    pub fn code_sort_key(&self) -> Vec<u64> {
        code_sort_key(&self.code)
    }
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Input for registering an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub code: String,
    pub name: String,
    pub kind: AccountKind,
    pub is_header: bool,
    pub parent_id: Option<AccountId>,
}

impl NewAccount {
    pub fn header(code: &str, name: &str, kind: AccountKind) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            kind,
            is_header: true,
            parent_id: None,
        }
    }

    pub fn leaf(code: &str, name: &str, kind: AccountKind) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            kind,
            is_header: false,
            parent_id: None,
        }
    }

    pub fn under(mut self, parent_id: AccountId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Validate a chart code: one or more dot-separated segments of digits.
pub(crate) fn validate_code(code: &str) -> bool {
    !code.is_empty()
        && code
            .split('.')
            .all(|seg| !seg.is_empty() && seg.len() <= 9 && seg.bytes().all(|b| b.is_ascii_digit()))
}

pub(crate) fn code_sort_key(code: &str) -> Vec<u64> {
    code.split('.')
        .map(|seg| seg.parse().unwrap_or(u64::MAX))
        .collect()
}
