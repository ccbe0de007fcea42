use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A business event submitted by a feature flow (payment recording,
/// invoicing, distributions), to be turned into a journal entry.
///
/// `idempotency_key` is caller-supplied; the store guarantees a retried
/// `(event_type, idempotency_key)` pair never posts twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessEvent {
    pub event_type: String,
    pub payload: Map<String, Value>,
    pub idempotency_key: String,
    pub occurred_at: NaiveDate,
}

impl BusinessEvent {
    pub fn new(
        event_type: impl Into<String>,
        idempotency_key: impl Into<String>,
        occurred_at: NaiveDate,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            payload: Map::new(),
            idempotency_key: idempotency_key.into(),
            occurred_at,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }
}
