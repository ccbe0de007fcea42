use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use awqaf_core::{FiscalYearId, JournalEntryId};

/// Administrative events worth a permanent trail, chiefly the fiscal-year
/// lifecycle overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum AuditAction {
    YearClosed {
        year_id: FiscalYearId,
        year: String,
        carry_entry: Option<JournalEntryId>,
    },
    YearReopened {
        year_id: FiscalYearId,
        year: String,
        actor: String,
        reason: String,
        carry_reversal: Option<JournalEntryId>,
    },
    YearPublished {
        year_id: FiscalYearId,
        year: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub action: AuditAction,
}

impl AuditRecord {
    pub fn now(action: AuditAction) -> Self {
        Self {
            at: Utc::now(),
            action,
        }
    }
}
