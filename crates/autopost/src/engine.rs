use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde_json::Value;

use awqaf_accounts::AccountRegistry;
use awqaf_core::Money;
use awqaf_journal::{DraftLine, Side};

use crate::event::BusinessEvent;
use crate::template::{AccountSelector, AmountRule, AutoPostError, AutoPostingTemplate};

/// The lines an event resolved to, ready for the store's draft pipeline.
///
/// Accounts are resolved ids by now; resolution happens exactly once, here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub source_event: String,
    pub description: String,
    pub lines: Vec<DraftLine>,
}

/// Registry of auto-posting templates, keyed by event type.
#[derive(Debug, Default)]
pub struct AutoPostingEngine {
    templates: RwLock<HashMap<String, AutoPostingTemplate>>,
}

impl AutoPostingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts a template only if it statically balances; a bad mapping
    /// fails here, during setup, not against live events.
    pub fn register_template(&self, template: AutoPostingTemplate) -> Result<(), AutoPostError> {
        template.validate()?;
        tracing::info!(event_type = %template.event_type, "auto-posting template registered");
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(template.event_type.clone(), template);
        Ok(())
    }

    pub fn template(&self, event_type: &str) -> Option<AutoPostingTemplate> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .cloned()
    }

    /// Resolve an event against its template and the chart of accounts.
    ///
    /// All-or-nothing: if any line's account or amount cannot be resolved,
    /// the whole entry is rejected and nothing is produced.
    pub fn resolve(
        &self,
        event: &BusinessEvent,
        registry: &AccountRegistry,
    ) -> Result<ResolvedEntry, AutoPostError> {
        let template = self
            .template(&event.event_type)
            .ok_or_else(|| AutoPostError::NoTemplate {
                event_type: event.event_type.clone(),
            })?;

        for field in template.required_fields() {
            if !event.payload.contains_key(field) {
                return Err(AutoPostError::MissingRequiredField {
                    field: field.to_string(),
                });
            }
        }

        // First pass: fix every account and every non-remainder amount.
        let mut resolved: Vec<(usize, Side, awqaf_core::AccountId, Option<Money>, Option<String>)> =
            Vec::with_capacity(template.lines.len());
        let mut debit_total = Money::ZERO;
        let mut credit_total = Money::ZERO;
        let mut remainder_at: Option<usize> = None;

        for (index, rule) in template.lines.iter().enumerate() {
            let line = index + 1;
            let code = match &rule.account {
                AccountSelector::Code(code) => code.clone(),
                AccountSelector::Category { field, accounts } => {
                    let category = event.payload.get(field).and_then(Value::as_str).ok_or(
                        AutoPostError::UnresolvableAccount {
                            line,
                            detail: format!("category field {field} is not a string"),
                        },
                    )?;
                    accounts
                        .get(category)
                        .cloned()
                        .ok_or_else(|| AutoPostError::UnresolvableAccount {
                            line,
                            detail: format!("no account mapped for category {category}"),
                        })?
                }
            };

            let account = registry
                .resolve(&code)
                .map_err(|e| AutoPostError::UnresolvableAccount {
                    line,
                    detail: e.to_string(),
                })?;
            registry
                .assert_postable(account.id)
                .map_err(|e| AutoPostError::UnresolvableAccount {
                    line,
                    detail: e.to_string(),
                })?;

            let amount = match &rule.amount {
                AmountRule::Field(field) => Some(number_field(event, field, line)?),
                AmountRule::Percent {
                    field,
                    basis_points,
                } => Some(number_field(event, field, line)?.basis_points(*basis_points)),
                AmountRule::Remainder => {
                    remainder_at = Some(resolved.len());
                    None
                }
            };
            if let Some(amount) = amount {
                match rule.side {
                    Side::Debit => debit_total += amount,
                    Side::Credit => credit_total += amount,
                }
            }
            resolved.push((line, rule.side, account.id, amount, rule.description.clone()));
        }

        // Second pass: plug the remainder, then emit lines in rule order.
        if let Some(at) = remainder_at {
            let (line, side, _, amount, _) = &mut resolved[at];
            let residual = match side {
                Side::Debit => credit_total - debit_total,
                Side::Credit => debit_total - credit_total,
            };
            if residual.is_negative() {
                return Err(AutoPostError::InvalidAmount {
                    line: *line,
                    detail: format!("remainder resolves to {residual}"),
                });
            }
            *amount = Some(residual);
        }

        let lines: Vec<DraftLine> = resolved
            .into_iter()
            .filter_map(|(_, side, account_id, amount, description)| {
                let amount = amount?;
                // A zero plug (e.g. VAT on an exempt invoice) drops the line.
                if amount.is_zero() {
                    return None;
                }
                let line = match side {
                    Side::Debit => DraftLine::debit(account_id, amount),
                    Side::Credit => DraftLine::credit(account_id, amount),
                };
                Some(match description {
                    Some(d) => line.with_description(d),
                    None => line,
                })
            })
            .collect();

        tracing::debug!(
            event_type = %event.event_type,
            idempotency_key = %event.idempotency_key,
            lines = lines.len(),
            "business event resolved to journal lines"
        );

        Ok(ResolvedEntry {
            source_event: event.event_type.clone(),
            description: template.description.clone(),
            lines,
        })
    }
}

fn number_field(event: &BusinessEvent, field: &str, line: usize) -> Result<Money, AutoPostError> {
    let value = event
        .payload
        .get(field)
        .ok_or_else(|| AutoPostError::MissingRequiredField {
            field: field.to_string(),
        })?;
    let number = value.as_f64().ok_or_else(|| AutoPostError::InvalidAmount {
        line,
        detail: format!("field {field} is not a number"),
    })?;
    let amount = Money::from_major(number);
    if amount.is_negative() {
        return Err(AutoPostError::InvalidAmount {
            line,
            detail: format!("field {field} is negative"),
        });
    }
    Ok(amount)
}
