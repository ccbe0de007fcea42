//! Chart of accounts for the endowment ledger.
//!
//! Accounts form a tree encoded in dot-separated codes (`"1.2.1"`). Header
//! accounts aggregate their children and never carry postings; only active
//! leaf accounts may appear on journal lines.

pub mod account;
pub mod registry;

pub use account::{Account, AccountKind, NewAccount};
pub use registry::{AccountRegistry, RegistryError};
