use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::errors::ForecastError;

/// A ticket as seen by the forecasting engine.
///
/// The ticket store owns the full document; only the identifier and the
/// creation timestamp are read here. Any other field in the incoming JSON is
/// ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TicketRecord {
    /// Opaque identifier (`id` or the document store's `_id`)
    #[serde(alias = "_id", default)]
    #[schema(value_type = Object)]
    pub id: Value,
    /// Raw creation timestamp, exactly as stored
    #[serde(
        rename = "createdAt",
        alias = "created_at",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<String>, example = "2025-01-03T10:15:00Z")]
    pub created_at: Option<Value>,
}

impl TicketRecord {
    pub fn new(id: impl Into<Value>, created_at: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            created_at: Some(created_at.into()),
        }
    }

    /// A record without a creation timestamp.
    pub fn untimed(id: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            created_at: None,
        }
    }
}

/// Keys under which ticket listings wrap their records.
const ENVELOPE_KEYS: [&str; 2] = ["data", "tickets"];

/// Decodes a raw ticket batch.
///
/// The batch must be a JSON array of records, or an object carrying that
/// array under `data` or `tickets`. Elements that are not objects cannot be
/// tickets and are skipped.
pub fn decode_ticket_batch(batch: Value) -> Result<Vec<TicketRecord>, ForecastError> {
    let items = match batch {
        Value::Array(items) => items,
        Value::Object(mut map) => ENVELOPE_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| {
                ForecastError::MalformedBatch(
                    "expected an array of tickets or an object with a `data` array".to_string(),
                )
            })?,
        other => {
            return Err(ForecastError::MalformedBatch(format!(
                "expected an array of tickets, got {}",
                json_kind(&other)
            )))
        }
    };

    let total = items.len();
    let records: Vec<TicketRecord> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(record_from_object(map)),
            _ => None,
        })
        .collect();

    if records.len() < total {
        tracing::debug!(
            skipped = total - records.len(),
            "skipped non-object entries in ticket batch"
        );
    }

    Ok(records)
}

/// Field spellings accepted for the same ticket attribute, canonical first.
const ID_KEYS: [&str; 2] = ["id", "_id"];
const CREATED_AT_KEYS: [&str; 2] = ["createdAt", "created_at"];

/// Reads one ticket object. When a field is spelled both ways the canonical
/// key wins, and a null under one key falls through to the other.
fn record_from_object(map: Map<String, Value>) -> TicketRecord {
    let pick = |keys: [&str; 2]| {
        keys.iter()
            .find_map(|key| map.get(*key).filter(|value| !value.is_null()))
            .cloned()
    };
    TicketRecord {
        id: pick(ID_KEYS).unwrap_or(Value::Null),
        created_at: pick(CREATED_AT_KEYS),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn decodes_plain_array_and_ignores_extra_fields() {
        let batch = json!([
            {"id": 1, "createdAt": "2025-01-01T08:00:00Z", "subject": "printer", "client": {"name": "ACME"}},
            {"_id": "65a1", "createdAt": "2025-01-02"},
        ]);

        let records = decode_ticket_batch(batch).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, json!(1));
        assert_eq!(records[0].created_at, Some(json!("2025-01-01T08:00:00Z")));
        assert_eq!(records[1].id, json!("65a1"));
    }

    #[test]
    fn decodes_enveloped_batches() {
        let data = json!({"success": true, "data": [{"id": 1, "createdAt": "2025-01-01"}]});
        assert_eq!(decode_ticket_batch(data).unwrap().len(), 1);

        let tickets = json!({"tickets": [{"id": 1}, {"id": 2}]});
        assert_eq!(decode_ticket_batch(tickets).unwrap().len(), 2);
    }

    #[test]
    fn missing_timestamp_is_kept_as_absent() {
        let records = decode_ticket_batch(json!([{"id": 7}, {"id": 8, "createdAt": null}])).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.created_at.is_none()));
    }

    #[test]
    fn skips_non_object_entries() {
        let records = decode_ticket_batch(json!([1, "x", null, {"id": 1}])).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn keeps_objects_with_both_spellings_of_a_field() {
        let batch = json!([
            {"id": 1, "createdAt": "2025-01-02", "created_at": "2024-12-31"},
            {"id": 2, "_id": "65a1", "createdAt": "2025-01-03"},
        ]);

        let records = decode_ticket_batch(batch).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, json!(1));
        assert_eq!(records[0].created_at, Some(json!("2025-01-02")));
        assert_eq!(records[1].id, json!(2));
        assert_eq!(records[1].created_at, Some(json!("2025-01-03")));
    }

    #[test]
    fn rejects_non_collection_batches() {
        assert_matches!(
            decode_ticket_batch(json!("tickets")),
            Err(ForecastError::MalformedBatch(_))
        );
        assert_matches!(
            decode_ticket_batch(json!({"data": "nope"})),
            Err(ForecastError::MalformedBatch(_))
        );
        assert_matches!(decode_ticket_batch(Value::Null), Err(ForecastError::MalformedBatch(_)));
    }
}
