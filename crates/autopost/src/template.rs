use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use awqaf_journal::Side;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AutoPostError {
    #[error("no auto-posting template registered for event type {event_type}")]
    NoTemplate { event_type: String },

    #[error("template for {event_type} cannot balance: {reason}")]
    UnbalanceableTemplate { event_type: String, reason: String },

    #[error("event payload is missing required field {field}")]
    MissingRequiredField { field: String },

    #[error("cannot resolve account for line {line}: {detail}")]
    UnresolvableAccount { line: usize, detail: String },

    #[error("invalid amount for line {line}: {detail}")]
    InvalidAmount { line: usize, detail: String },
}

/// How a line rule picks its account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountSelector {
    /// A fixed chart code, e.g. the cash account.
    Code(String),
    /// Look up a category value in the payload and map it to a chart code,
    /// e.g. expense category -> expense account.
    Category {
        field: String,
        accounts: BTreeMap<String, String>,
    },
}

/// How a line rule computes its amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountRule {
    /// A decimal payload field, taken whole.
    Field(String),
    /// A fraction of a payload field, in basis points (1500 = 15%).
    Percent { field: String, basis_points: u32 },
    /// Whatever is needed to balance the other side. At most one per
    /// template; a zero remainder drops the line, a negative one is an
    /// error.
    Remainder,
}

/// One rule of a template: side, account selection, amount computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRule {
    pub side: Side,
    pub account: AccountSelector,
    pub amount: AmountRule,
    pub description: Option<String>,
}

impl LineRule {
    pub fn new(side: Side, account: AccountSelector, amount: AmountRule) -> Self {
        Self {
            side,
            account,
            amount,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Event-type-to-entry mapping, as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoPostingTemplate {
    pub event_type: String,
    pub description: String,
    pub lines: Vec<LineRule>,
}

impl AutoPostingTemplate {
    pub fn new(
        event_type: impl Into<String>,
        description: impl Into<String>,
        lines: Vec<LineRule>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            description: description.into(),
            lines,
        }
    }

    /// Payload fields every event of this type must carry.
    pub fn required_fields(&self) -> BTreeSet<&str> {
        let mut fields = BTreeSet::new();
        for rule in &self.lines {
            match &rule.amount {
                AmountRule::Field(field) | AmountRule::Percent { field, .. } => {
                    fields.insert(field.as_str());
                }
                AmountRule::Remainder => {}
            }
            if let AccountSelector::Category { field, .. } = &rule.account {
                fields.insert(field.as_str());
            }
        }
        fields
    }

    /// Static balance check, run at registration time.
    ///
    /// Without a remainder rule, the signed per-field basis-point
    /// coefficients (debit positive, credit negative) must all cancel, so
    /// the template balances for every conforming payload. A single
    /// remainder plug balances by construction.
    pub fn validate(&self) -> Result<(), AutoPostError> {
        let fail = |reason: &str| AutoPostError::UnbalanceableTemplate {
            event_type: self.event_type.clone(),
            reason: reason.to_string(),
        };

        if self.lines.len() < 2 {
            return Err(fail("a journal entry needs at least two lines"));
        }

        let mut remainders = 0usize;
        let mut coefficients: BTreeMap<&str, i64> = BTreeMap::new();
        for rule in &self.lines {
            let sign: i64 = match rule.side {
                Side::Debit => 1,
                Side::Credit => -1,
            };
            match &rule.amount {
                AmountRule::Field(field) => {
                    *coefficients.entry(field.as_str()).or_default() += sign * 10_000;
                }
                AmountRule::Percent {
                    field,
                    basis_points,
                } => {
                    if *basis_points == 0 || *basis_points > 10_000 {
                        return Err(fail("percentage must be between 1 and 10000 basis points"));
                    }
                    *coefficients.entry(field.as_str()).or_default() +=
                        sign * *basis_points as i64;
                }
                AmountRule::Remainder => remainders += 1,
            }
        }

        match remainders {
            0 => {
                if coefficients.values().any(|&c| c != 0) {
                    return Err(fail(
                        "debit and credit coefficients do not cancel and no remainder plug exists",
                    ));
                }
                Ok(())
            }
            1 => Ok(()),
            _ => Err(fail("more than one remainder rule")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debit_field(code: &str, field: &str) -> LineRule {
        LineRule::new(
            Side::Debit,
            AccountSelector::Code(code.into()),
            AmountRule::Field(field.into()),
        )
    }

    fn credit_field(code: &str, field: &str) -> LineRule {
        LineRule::new(
            Side::Credit,
            AccountSelector::Code(code.into()),
            AmountRule::Field(field.into()),
        )
    }

    #[test]
    fn whole_field_transfer_is_balanceable() {
        let template = AutoPostingTemplate::new(
            "invoice_paid",
            "Invoice settled",
            vec![debit_field("1.1", "amount"), credit_field("1.3", "amount")],
        );
        template.validate().unwrap();
        assert_eq!(
            template.required_fields().into_iter().collect::<Vec<_>>(),
            vec!["amount"]
        );
    }

    #[test]
    fn percent_split_must_cancel() {
        let balanced = AutoPostingTemplate::new(
            "invoice_issued",
            "Invoice issued",
            vec![
                debit_field("1.3", "amount"),
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
                    AccountSelector::Code("2.2".into()),
                    AmountRule::Percent {
                        field: "amount".into(),
                        basis_points: 1_500,
                    },
                ),
            ],
        );
        balanced.validate().unwrap();

        let short = AutoPostingTemplate::new(
            "invoice_issued",
            "Invoice issued",
            vec![
                debit_field("1.3", "amount"),
                LineRule::new(
                    Side::Credit,
                    AccountSelector::Code("4.1".into()),
                    AmountRule::Percent {
                        field: "amount".into(),
                        basis_points: 8_500,
                    },
                ),
            ],
        );
        assert!(matches!(
            short.validate().unwrap_err(),
            AutoPostError::UnbalanceableTemplate { .. }
        ));
    }

    #[test]
    fn remainder_plugs_any_residual_but_only_once() {
        let with_plug = AutoPostingTemplate::new(
            "invoice_issued",
            "Invoice issued",
            vec![
                debit_field("1.3", "gross"),
                credit_field("4.1", "net"),
                LineRule::new(
                    Side::Credit,
                    AccountSelector::Code("2.2".into()),
                    AmountRule::Remainder,
                ),
            ],
        );
        with_plug.validate().unwrap();

        let two_plugs = AutoPostingTemplate::new(
            "broken",
            "Two plugs",
            vec![
                debit_field("1.1", "amount"),
                LineRule::new(
                    Side::Credit,
                    AccountSelector::Code("4.1".into()),
                    AmountRule::Remainder,
                ),
                LineRule::new(
                    Side::Credit,
                    AccountSelector::Code("4.2".into()),
                    AmountRule::Remainder,
                ),
            ],
        );
        assert!(matches!(
            two_plugs.validate().unwrap_err(),
            AutoPostError::UnbalanceableTemplate { .. }
        ));
    }

    #[test]
    fn degenerate_templates_are_rejected() {
        let one_line = AutoPostingTemplate::new(
            "broken",
            "One line",
            vec![debit_field("1.1", "amount")],
        );
        assert!(one_line.validate().is_err());

        let bad_percent = AutoPostingTemplate::new(
            "broken",
            "Over 100%",
            vec![
                debit_field("1.1", "amount"),
                LineRule::new(
                    Side::Credit,
                    AccountSelector::Code("4.1".into()),
                    AmountRule::Percent {
                        field: "amount".into(),
                        basis_points: 10_001,
                    },
                ),
            ],
        );
        assert!(bad_percent.validate().is_err());
    }

    #[test]
    fn category_lookup_contributes_required_field() {
        let template = AutoPostingTemplate::new(
            "expense_recorded",
            "Expense",
            vec![
                LineRule::new(
                    Side::Debit,
                    AccountSelector::Category {
                        field: "category".into(),
                        accounts: BTreeMap::from([
                            ("maintenance".into(), "5.1".into()),
                            ("utilities".into(), "5.2".into()),
                        ]),
                    },
                    AmountRule::Field("amount".into()),
                ),
                credit_field("1.1", "amount"),
            ],
        );
        template.validate().unwrap();
        let fields: Vec<&str> = template.required_fields().into_iter().collect();
        assert_eq!(fields, vec!["amount", "category"]);
    }
}
