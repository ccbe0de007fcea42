//! Strongly-typed identifiers used across the ledger domain.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Failure to parse a typed identifier from its string form.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {source}")]
pub struct IdParseError {
    kind: &'static str,
    source: uuid::Error,
}

/// Identifier of a chart-of-accounts entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

/// Identifier of a journal entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JournalEntryId(Uuid);

/// Identifier of a fiscal year.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FiscalYearId(Uuid);

macro_rules! impl_uuid_id {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a fresh identifier.
            ///
            /// Uses UUIDv7 so identifiers sort by creation time. Tests that
            /// need determinism should construct ids from fixed UUIDs.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s).map_err(|source| IdParseError {
                    kind: $name,
                    source,
                })?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_id!(AccountId, "AccountId");
impl_uuid_id!(JournalEntryId, "JournalEntryId");
impl_uuid_id!(FiscalYearId, "FiscalYearId");
