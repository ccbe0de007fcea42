use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use awqaf_core::AccountId;

use crate::account::{validate_code, Account, NewAccount};

/// Chart-of-accounts lookup failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no account with code {code}")]
    UnknownCode { code: String },

    #[error("no account with id {id}")]
    UnknownAccount { id: AccountId },

    #[error("account code {code} is already registered")]
    DuplicateCode { code: String },

    #[error("invalid account code {code}: expected dot-separated numeric segments")]
    InvalidCode { code: String },

    #[error("parent account {parent_id} does not exist")]
    UnknownParent { parent_id: AccountId },

    #[error("parent account {code} is a leaf; only header accounts may have children")]
    ParentNotHeader { code: String },

    #[error("account {code} is not nested under its parent {parent_code}")]
    CodeNotUnderParent { code: String, parent_code: String },

    #[error("account {code} is a header account and cannot be posted to")]
    HeaderAccountNotPostable { code: String },

    #[error("account {code} is inactive")]
    InactiveAccount { code: String },
}

#[derive(Debug, Default)]
struct RegistryState {
    by_id: HashMap<AccountId, Account>,
    by_code: HashMap<String, AccountId>,
}

/// In-memory chart of accounts.
///
/// Append-mostly: accounts are registered at setup, occasionally
/// deactivated, never removed. Reads far outnumber writes, hence the
/// `RwLock`.
#[derive(Debug, Default)]
pub struct AccountRegistry {
    state: RwLock<RegistryState>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an account, validating code shape, uniqueness, and parent
    /// linkage.
    pub fn insert(&self, new: NewAccount) -> Result<Account, RegistryError> {
        if !validate_code(&new.code) {
            return Err(RegistryError::InvalidCode { code: new.code });
        }

        let mut state = self.write();
        if state.by_code.contains_key(&new.code) {
            return Err(RegistryError::DuplicateCode { code: new.code });
        }
        if let Some(parent_id) = new.parent_id {
            let parent = state
                .by_id
                .get(&parent_id)
                .ok_or(RegistryError::UnknownParent { parent_id })?;
            if !parent.is_header {
                return Err(RegistryError::ParentNotHeader {
                    code: parent.code.clone(),
                });
            }
            if !new.code.starts_with(&format!("{}.", parent.code)) {
                return Err(RegistryError::CodeNotUnderParent {
                    code: new.code,
                    parent_code: parent.code.clone(),
                });
            }
        }

        let account = Account {
            id: AccountId::new(),
            code: new.code,
            name: new.name,
            kind: new.kind,
            is_header: new.is_header,
            is_active: true,
            parent_id: new.parent_id,
        };
        tracing::debug!(code = %account.code, kind = ?account.kind, "account registered");
        state.by_code.insert(account.code.clone(), account.id);
        state.by_id.insert(account.id, account.clone());
        Ok(account)
    }

    /// Resolve an account by its chart code.
    pub fn resolve(&self, code: &str) -> Result<Account, RegistryError> {
        let state = self.read();
        state
            .by_code
            .get(code)
            .and_then(|id| state.by_id.get(id))
            .cloned()
            .ok_or_else(|| RegistryError::UnknownCode {
                code: code.to_string(),
            })
    }

    pub fn get(&self, id: AccountId) -> Result<Account, RegistryError> {
        self.read()
            .by_id
            .get(&id)
            .cloned()
            .ok_or(RegistryError::UnknownAccount { id })
    }

    /// Direct children of an account, code-sorted. Used for header roll-up.
    pub fn children_of(&self, id: AccountId) -> Vec<Account> {
        let mut children: Vec<Account> = self
            .read()
            .by_id
            .values()
            .filter(|a| a.parent_id == Some(id))
            .cloned()
            .collect();
        children.sort_by_key(Account::code_sort_key);
        children
    }

    /// All postable accounts, code-sorted. The universe for statements.
    pub fn leaf_accounts(&self) -> Vec<Account> {
        let mut leaves: Vec<Account> = self
            .read()
            .by_id
            .values()
            .filter(|a| !a.is_header)
            .cloned()
            .collect();
        leaves.sort_by_key(Account::code_sort_key);
        leaves
    }

    /// All accounts, code-sorted.
    pub fn all_accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.read().by_id.values().cloned().collect();
        accounts.sort_by_key(Account::code_sort_key);
        accounts
    }

    /// Only active leaf accounts may appear on journal lines.
    pub fn assert_postable(&self, id: AccountId) -> Result<(), RegistryError> {
        let state = self.read();
        let account = state
            .by_id
            .get(&id)
            .ok_or(RegistryError::UnknownAccount { id })?;
        if account.is_header {
            return Err(RegistryError::HeaderAccountNotPostable {
                code: account.code.clone(),
            });
        }
        if !account.is_active {
            return Err(RegistryError::InactiveAccount {
                code: account.code.clone(),
            });
        }
        Ok(())
    }

    /// Deactivate instead of delete: posted history keeps referencing the
    /// account.
    pub fn deactivate(&self, id: AccountId) -> Result<(), RegistryError> {
        self.set_active(id, false)
    }

    pub fn reactivate(&self, id: AccountId) -> Result<(), RegistryError> {
        self.set_active(id, true)
    }

    fn set_active(&self, id: AccountId, active: bool) -> Result<(), RegistryError> {
        let mut state = self.write();
        let account = state
            .by_id
            .get_mut(&id)
            .ok_or(RegistryError::UnknownAccount { id })?;
        account.is_active = active;
        tracing::info!(code = %account.code, active, "account activation changed");
        Ok(())
    }
}
