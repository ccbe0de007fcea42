use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use awqaf_core::{Entity, FiscalYearId};

/// Closing lifecycle of a fiscal year.
///
/// `Closing` exists so a close in progress excludes new entries for the
/// year before it commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YearState {
    Open,
    Closing,
    Closed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FiscalYearError {
    #[error("fiscal year bounds are invalid: {start} must precede {end}")]
    InvalidBounds { start: NaiveDate, end: NaiveDate },

    #[error("fiscal year {name} is closed")]
    Closed { name: String },

    #[error("fiscal year {name} is being closed")]
    CloseInProgress { name: String },

    #[error("fiscal year {name} is not closed")]
    NotClosed { name: String },

    #[error("fiscal year {name} is not mid-close")]
    NotClosing { name: String },
}

/// A posting period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalYear {
    pub id: FiscalYearId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub state: YearState,
    /// At most one year is active; enforced by the store, not here.
    pub is_active: bool,
    /// External-reporting visibility; orthogonal to the posting lifecycle.
    pub is_published: bool,
}

impl FiscalYear {
    pub fn new(
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, FiscalYearError> {
        if start_date >= end_date {
            return Err(FiscalYearError::InvalidBounds {
                start: start_date,
                end: end_date,
            });
        }
        Ok(Self {
            id: FiscalYearId::new(),
            name: name.into(),
            start_date,
            end_date,
            state: YearState::Open,
            is_active: false,
            is_published: false,
        })
    }

    /// Inclusive on both bounds.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Entries may only be created while the year is fully open.
    pub fn accepts_entries(&self) -> Result<(), FiscalYearError> {
        match self.state {
            YearState::Open => Ok(()),
            YearState::Closing => Err(FiscalYearError::CloseInProgress {
                name: self.name.clone(),
            }),
            YearState::Closed => Err(FiscalYearError::Closed {
                name: self.name.clone(),
            }),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == YearState::Closed
    }

    pub fn begin_close(&mut self) -> Result<(), FiscalYearError> {
        self.accepts_entries()?;
        self.state = YearState::Closing;
        Ok(())
    }

    /// Roll back an aborted close.
    pub fn abort_close(&mut self) -> Result<(), FiscalYearError> {
        if self.state != YearState::Closing {
            return Err(FiscalYearError::NotClosing {
                name: self.name.clone(),
            });
        }
        self.state = YearState::Open;
        Ok(())
    }

    /// Terminal for entry creation; also retires the year from active duty.
    pub fn complete_close(&mut self) -> Result<(), FiscalYearError> {
        if self.state != YearState::Closing {
            return Err(FiscalYearError::NotClosing {
                name: self.name.clone(),
            });
        }
        self.state = YearState::Closed;
        self.is_active = false;
        Ok(())
    }

    /// Publication requires a closed year.
    pub fn publish(&mut self) -> Result<(), FiscalYearError> {
        if self.state != YearState::Closed {
            return Err(FiscalYearError::NotClosed {
                name: self.name.clone(),
            });
        }
        self.is_published = true;
        Ok(())
    }

    /// Administrative override; the store records the audit trail.
    pub fn reopen(&mut self) -> Result<(), FiscalYearError> {
        if self.state != YearState::Closed {
            return Err(FiscalYearError::NotClosed {
                name: self.name.clone(),
            });
        }
        self.state = YearState::Open;
        self.is_published = false;
        Ok(())
    }
}

impl Entity for FiscalYear {
    type Id = FiscalYearId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
