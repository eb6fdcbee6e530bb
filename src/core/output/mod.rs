//! Output format writers.
//!
//! Every writer emits the same fixed columns, in this order:
//!
//! | Column | Content |
//! |--------|---------|
//! | `timestamp` | `YYYY-MM-DD HH:MM:SS`, exporter local time |
//! | `sender` | normalized display sender |
//! | `message` | original body |
//! | `source_type` | `WhatsApp` or `Telegram` |
//! | `emojis` | extracted emoji (space-separated in CSV, array in JSON) |
//! | `clean_text` | text sent to the classifier |
//! | `emotion` | vocabulary label or the unknown sentinel |
//! | `token_count` | tokens in `clean_text` |
//!
//! - [`write_csv`] / [`to_csv`] - CSV with semicolon delimiter - requires `csv-output` feature
//! - [`write_json`] / [`to_json`] - JSON array - requires `json-output` feature
//! - [`write_jsonl`] / [`to_jsonl`] - JSON Lines - requires `json-output` feature
//!
//! Output depends only on the records: no run timestamps, no map iteration.

#[cfg(feature = "csv-output")]
mod csv_writer;
#[cfg(feature = "json-output")]
mod json_writer;
#[cfg(feature = "json-output")]
mod jsonl_writer;

#[cfg(feature = "csv-output")]
pub use csv_writer::{to_csv, write_csv};
#[cfg(feature = "json-output")]
pub use json_writer::{to_json, write_json};
#[cfg(feature = "json-output")]
pub use jsonl_writer::{to_jsonl, write_jsonl};

use serde::Serialize;

use crate::message::EnrichedMessage;

/// Column names in output order.
pub const COLUMNS: [&str; 8] = [
    "timestamp",
    "sender",
    "message",
    "source_type",
    "emojis",
    "clean_text",
    "emotion",
    "token_count",
];

/// Timestamp layout used by every writer.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One output row, borrowing from an [`EnrichedMessage`].
///
/// Field order is the column order.
#[derive(Debug, Serialize)]
pub struct OutputRecord<'a> {
    pub timestamp: String,
    pub sender: &'a str,
    pub message: &'a str,
    pub source_type: &'static str,
    pub emojis: &'a [String],
    pub clean_text: &'a str,
    pub emotion: &'a str,
    pub token_count: usize,
}

impl<'a> From<&'a EnrichedMessage> for OutputRecord<'a> {
    fn from(record: &'a EnrichedMessage) -> Self {
        Self {
            timestamp: record.message.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            sender: &record.message.sender,
            message: &record.message.body,
            source_type: record.message.source_type.label(),
            emojis: &record.emojis,
            clean_text: &record.clean_text,
            emotion: &record.emotion,
            token_count: record.token_count,
        }
    }
}
