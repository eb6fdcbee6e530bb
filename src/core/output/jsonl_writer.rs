//! JSON Lines (JSONL) output writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::OutputRecord;
use crate::error::ChatmoodError;
use crate::message::EnrichedMessage;

/// Writes records to JSONL, one JSON object per line.
pub fn write_jsonl(
    records: &[EnrichedMessage],
    output_path: impl AsRef<Path>,
) -> Result<(), ChatmoodError> {
    let file = File::create(output_path)?;
    let mut writer = BufWriter::new(file);

    for record in records {
        serde_json::to_writer(&mut writer, &OutputRecord::from(record))?;
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

/// Converts records to a JSONL string, same format as [`write_jsonl`].
pub fn to_jsonl(records: &[EnrichedMessage]) -> Result<String, ChatmoodError> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(&OutputRecord::from(record))?);
        out.push('\n');
    }
    Ok(out)
}
