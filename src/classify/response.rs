//! Parsing the classifier's answer into per-position labels.
//!
//! Models are asked for `{"1": "amor", "2": "ira"}` but do not always comply.
//! Accepted shapes:
//!
//! - an object keyed by 1-based position: `{"1": "amor"}`
//! - an array of labels, positional: `["amor", "ira"]`
//! - an array of objects: `[{"position": 1, "label": "amor"}]` (`id` / `index`
//!   and `emotion` are accepted as field names too)
//! - any of the above wrapped in a single-key object: `{"emotions": [...]}`
//!
//! Surrounding prose and Markdown code fences are ignored.

use serde_json::{Map, Value};

use super::PositionLabel;
use crate::error::ClassifierError;

const POSITION_KEYS: &[&str] = &["position", "id", "index"];
const LABEL_KEYS: &[&str] = &["label", "emotion"];

/// Every JSON value that starts at a `{` or `[` in `content`, in order.
///
/// Each candidate is read up to the end of its own value, so text after it
/// (even text with brackets) does not matter.
fn embedded_values(content: &str) -> impl Iterator<Item = serde_json::Result<Value>> + '_ {
    content.match_indices(['{', '[']).filter_map(|(start, _)| {
        serde_json::Deserializer::from_str(&content[start..])
            .into_iter::<Value>()
            .next()
    })
}

fn as_position(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| object.get(*k))
}

fn from_object(object: &Map<String, Value>) -> Option<Vec<PositionLabel>> {
    let labels: Vec<PositionLabel> = object
        .iter()
        .filter_map(|(key, value)| {
            let position = key.trim().parse().ok()?;
            Some(PositionLabel::new(position, value.as_str()?))
        })
        .collect();
    if !labels.is_empty() {
        return Some(labels);
    }

    // {"emotions": {...}} / {"results": [...]}
    match object.values().collect::<Vec<_>>().as_slice() {
        [inner @ (Value::Object(_) | Value::Array(_))] => from_value(inner),
        _ => None,
    }
}

fn from_array(items: &[Value]) -> Option<Vec<PositionLabel>> {
    let labels: Vec<PositionLabel> = items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| match item {
            Value::String(label) => Some(PositionLabel::new(idx + 1, label.as_str())),
            Value::Object(object) => {
                let position = field(object, POSITION_KEYS).and_then(as_position)?;
                let label = field(object, LABEL_KEYS)?.as_str()?;
                Some(PositionLabel::new(position, label))
            }
            _ => None,
        })
        .collect();
    (!labels.is_empty() || items.is_empty()).then_some(labels)
}

fn from_value(value: &Value) -> Option<Vec<PositionLabel>> {
    match value {
        Value::Object(object) => from_object(object),
        Value::Array(items) => from_array(items),
        _ => None,
    }
}

/// Parses a model answer for a batch of `batch_len` items.
///
/// Positions outside `1..=batch_len` are dropped; when a position appears
/// more than once the first entry wins. Labels are returned as given; checking
/// them against the vocabulary is the engine's job.
///
/// # Errors
///
/// Returns [`ClassifierError::MalformedResponse`] when no JSON value of a
/// known shape can be found.
///
/// # Example
///
/// ```
/// use chatmood::classify::{PositionLabel, parse_labels};
///
/// let content = "```json\n{\"2\": \"ira\", \"1\": \"amor\"}\n```";
/// let labels = parse_labels(content, 2)?;
/// assert_eq!(labels, vec![PositionLabel::new(1, "amor"), PositionLabel::new(2, "ira")]);
/// # Ok::<(), chatmood::error::ClassifierError>(())
/// ```
pub fn parse_labels(
    content: &str,
    batch_len: usize,
) -> Result<Vec<PositionLabel>, ClassifierError> {
    let mut first_error = None;
    let mut parsed_any = false;
    let mut labels = None;
    for candidate in embedded_values(content) {
        match candidate {
            Ok(value) => {
                labels = from_value(&value);
                if labels.is_some() {
                    break;
                }
                parsed_any = true;
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    let Some(labels) = labels else {
        let reason = match first_error {
            _ if parsed_any => "unexpected JSON shape".to_string(),
            Some(e) => e.to_string(),
            None => "no JSON found in response".to_string(),
        };
        return Err(ClassifierError::malformed(format!("{reason}: {}", preview(content))));
    };

    let mut seen = vec![false; batch_len];
    let mut result: Vec<PositionLabel> = labels
        .into_iter()
        .filter(|pl| {
            let Some(slot) = pl.position.checked_sub(1).and_then(|i| seen.get_mut(i)) else {
                return false;
            };
            !std::mem::replace(slot, true)
        })
        .collect();
    result.sort_by_key(|pl| pl.position);
    Ok(result)
}

fn preview(content: &str) -> String {
    const MAX: usize = 120;
    match content.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content.to_string(),
    }
}
