//! CSV output writer.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::{COLUMNS, OutputRecord};
use crate::error::ChatmoodError;
use crate::message::EnrichedMessage;

fn write_records<W: Write>(records: &[EnrichedMessage], sink: W) -> Result<W, ChatmoodError> {
    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_writer(sink);

    writer.write_record(COLUMNS)?;
    for record in records {
        let row = OutputRecord::from(record);
        let token_count = row.token_count.to_string();
        let emojis = row.emojis.join(" ");
        writer.write_record([
            row.timestamp.as_str(),
            row.sender,
            row.message,
            row.source_type,
            emojis.as_str(),
            row.clean_text,
            row.emotion,
            token_count.as_str(),
        ])?;
    }

    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| ChatmoodError::Io(e.into_error()))
}

/// Writes records to CSV with semicolon delimiter.
///
/// # Format
/// - Delimiter: `;`
/// - Header: the fixed column names
/// - Emoji joined with single spaces
/// - Encoding: UTF-8
pub fn write_csv(
    records: &[EnrichedMessage],
    output_path: impl AsRef<Path>,
) -> Result<(), ChatmoodError> {
    let file = File::create(output_path)?;
    write_records(records, file)?;
    Ok(())
}

/// Converts records to a CSV string, same format as [`write_csv`].
pub fn to_csv(records: &[EnrichedMessage]) -> Result<String, ChatmoodError> {
    let bytes = write_records(records, Vec::new())?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::output::test_support::record;
    use crate::message::SourceType;
    use tempfile::NamedTempFile;

    #[test]
    fn test_to_csv_header_and_row() {
        let records = vec![record(SourceType::WhatsAppText, "Ana", "Hola 😀😀", "alegría")];
        let csv = to_csv(&records).unwrap();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next().unwrap(),
            "timestamp;sender;message;source_type;emojis;clean_text;emotion;token_count"
        );
        assert_eq!(
            lines.next().unwrap(),
            "2022-01-03 08:30:05;Ana;Hola 😀😀;WhatsApp;😀 😀;hola 😀😀;alegría;2"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_csv_quotes_delimiters_and_newlines() {
        let records = vec![record(SourceType::TelegramHtml, "Luis", "uno; dos\ntres", "ira")];
        let csv = to_csv(&records).unwrap();
        assert!(csv.contains("\"uno; dos\ntres\""));
        assert!(csv.contains(";Telegram;"));
    }

    #[test]
    fn test_write_csv_file() {
        let records = vec![
            record(SourceType::WhatsAppText, "Ana", "uno", "amor"),
            record(SourceType::TelegramHtml, "Luis", "dos", "ira"),
        ];
        let temp_file = NamedTempFile::new().unwrap();
        write_csv(&records, temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(content, to_csv(&records).unwrap());
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_empty_has_header_only() {
        let csv = to_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
