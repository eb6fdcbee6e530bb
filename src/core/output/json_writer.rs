//! JSON output writer.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::OutputRecord;
use crate::error::ChatmoodError;
use crate::message::EnrichedMessage;

/// Writes records to a JSON file as an array.
///
/// # Format
/// ```json
/// [
///   {"timestamp": "2022-01-03 08:30:00", "sender": "Ana", "message": "Hola", ...}
/// ]
/// ```
pub fn write_json(
    records: &[EnrichedMessage],
    output_path: impl AsRef<Path>,
) -> Result<(), ChatmoodError> {
    let json = to_json(records)?;
    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

/// Converts records to a pretty-printed JSON array.
pub fn to_json(records: &[EnrichedMessage]) -> Result<String, ChatmoodError> {
    let rows: Vec<OutputRecord<'_>> = records.iter().map(OutputRecord::from).collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}
