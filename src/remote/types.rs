//! Remote record addressing and total decoding of heterogeneous payloads.

use serde::Deserialize;
use serde_json::{Map, Value};

/// The 4-tuple address of an activity response record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseAddress {
  pub project_id: String,
  pub phase_id: String,
  pub step_id: String,
  pub activity_id: String,
}

impl ResponseAddress {
  pub fn new(project_id: &str, phase_id: &str, step_id: &str, activity_id: &str) -> Self {
    Self {
      project_id: project_id.to_string(),
      phase_id: phase_id.to_string(),
      step_id: step_id.to_string(),
      activity_id: activity_id.to_string(),
    }
  }
}

/// Raw row shape returned by the table store.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseRow {
  pub response: Value,
  #[serde(default)]
  pub updated_at: Option<String>,
}

/// The known shapes a stored `response` column can take.
///
/// The remote store has carried several schema generations, so rows are
/// heterogeneous. Decoding is total: anything not recognized lands in
/// [`ResponsePayload::Unrecognized`] instead of erroring, and the caller
/// decides whether that counts as empty.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
  /// Current shape: an object of named fields, one per logical response key.
  Fields(Map<String, Value>),
  /// Legacy shape: the entity list stored bare, without a wrapping object.
  BareList(Vec<Value>),
  /// Legacy shape: a single bare string.
  BareText(String),
  /// Anything else, kept verbatim.
  Unrecognized(Value),
}

impl ResponsePayload {
  /// Decode a stored value. Never fails.
  pub fn decode(value: Value) -> Self {
    match value {
      Value::Object(map) => Self::Fields(map),
      Value::Array(items) => Self::BareList(items),
      Value::String(text) => Self::BareText(text),
      other => Self::Unrecognized(other),
    }
  }

  /// Extract the value for a logical field.
  ///
  /// Field-keyed rows look the key up; bare legacy rows are the value for
  /// whatever single field they predate, so they are returned as-is.
  pub fn field(&self, key: &str) -> Option<Value> {
    match self {
      Self::Fields(map) => map.get(key).cloned(),
      Self::BareList(items) => Some(Value::Array(items.clone())),
      Self::BareText(text) => Some(Value::String(text.clone())),
      Self::Unrecognized(_) => None,
    }
  }

  /// Whether this payload carries any usable data.
  pub fn is_empty(&self) -> bool {
    match self {
      Self::Fields(map) => map.is_empty(),
      Self::BareList(items) => items.is_empty(),
      Self::BareText(text) => text.trim().is_empty(),
      Self::Unrecognized(value) => value.is_null(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn decode_is_total_over_all_shapes() {
    assert!(matches!(
      ResponsePayload::decode(json!({"storyQuestion": "q"})),
      ResponsePayload::Fields(_)
    ));
    assert!(matches!(
      ResponsePayload::decode(json!([1, 2])),
      ResponsePayload::BareList(_)
    ));
    assert!(matches!(
      ResponsePayload::decode(json!("just text")),
      ResponsePayload::BareText(_)
    ));
    assert!(matches!(
      ResponsePayload::decode(json!(42)),
      ResponsePayload::Unrecognized(_)
    ));
    assert!(matches!(
      ResponsePayload::decode(Value::Null),
      ResponsePayload::Unrecognized(Value::Null)
    ));
  }

  #[test]
  fn field_lookup_spans_schema_generations() {
    let current = ResponsePayload::decode(json!({"sliderQuestions": [{"id": 1}]}));
    assert_eq!(current.field("sliderQuestions"), Some(json!([{"id": 1}])));
    assert_eq!(current.field("other"), None);

    // A legacy row is the field value itself
    let legacy = ResponsePayload::decode(json!([{"id": 1}]));
    assert_eq!(legacy.field("sliderQuestions"), Some(json!([{"id": 1}])));
  }

  #[test]
  fn emptiness() {
    assert!(ResponsePayload::decode(json!({})).is_empty());
    assert!(ResponsePayload::decode(json!([])).is_empty());
    assert!(ResponsePayload::decode(json!("  ")).is_empty());
    assert!(ResponsePayload::decode(Value::Null).is_empty());
    assert!(!ResponsePayload::decode(json!({"k": 1})).is_empty());
    assert!(!ResponsePayload::decode(json!(42)).is_empty());
  }
}
