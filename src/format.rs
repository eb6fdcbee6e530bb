//! Output format selection.
//!
//! [`OutputFormat`] picks one of the writers in [`crate::core::output`],
//! either explicitly or from the output file's extension.
//!
//! # Example
//!
//! ```rust
//! use chatmood::format::OutputFormat;
//!
//! let format = OutputFormat::from_path("processed/data_messages.jsonl").unwrap();
//! assert_eq!(format, OutputFormat::Jsonl);
//! ```

use serde::{Deserialize, Serialize};

use std::path::Path;

use crate::error::ChatmoodError;
use crate::message::EnrichedMessage;

/// Output table format.
///
/// - [`Csv`](OutputFormat::Csv) - semicolon-delimited table, the default
/// - [`Json`](OutputFormat::Json) - pretty-printed array of records
/// - [`Jsonl`](OutputFormat::Jsonl) - one record per line
///
/// # Example
///
/// ```rust
/// use chatmood::format::OutputFormat;
/// use std::str::FromStr;
///
/// let format = OutputFormat::from_str("jsonl").unwrap();
/// assert_eq!(format, OutputFormat::Jsonl);
/// assert_eq!(format.extension(), "jsonl");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum OutputFormat {
    /// CSV with semicolon delimiter
    #[default]
    Csv,

    /// JSON array of records
    Json,

    /// JSON Lines, also known as NDJSON
    Jsonl,
}

impl OutputFormat {
    /// Returns the file extension for this format (without dot).
    ///
    /// # Example
    ///
    /// ```rust
    /// use chatmood::format::OutputFormat;
    ///
    /// assert_eq!(OutputFormat::Csv.extension(), "csv");
    /// assert_eq!(OutputFormat::Json.extension(), "json");
    /// assert_eq!(OutputFormat::Jsonl.extension(), "jsonl");
    /// ```
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Jsonl => "jsonl",
        }
    }

    /// Returns all supported format names.
    pub fn all_names() -> &'static [&'static str] {
        &["csv", "json", "jsonl", "ndjson"]
    }

    /// Returns all available formats.
    pub fn all() -> &'static [OutputFormat] {
        &[OutputFormat::Csv, OutputFormat::Json, OutputFormat::Jsonl]
    }

    /// Detects format from a file path based on extension.
    ///
    /// # Example
    ///
    /// ```rust
    /// use chatmood::format::OutputFormat;
    ///
    /// let format = OutputFormat::from_path("output.jsonl").unwrap();
    /// assert_eq!(format, OutputFormat::Jsonl);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ChatmoodError::InvalidFormat`] for a missing or unknown extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ChatmoodError> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "ndjson" => Ok(OutputFormat::Jsonl),
            _ => Err(ChatmoodError::invalid_format(
                "output",
                format!("Unknown file extension: '.{ext}'. Expected one of: csv, json, jsonl"),
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Csv => write!(f, "CSV"),
            OutputFormat::Json => write!(f, "JSON"),
            OutputFormat::Jsonl => write!(f, "JSONL"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "ndjson" => Ok(OutputFormat::Jsonl),
            _ => Err(format!(
                "Unknown format: '{}'. Expected one of: {}",
                s,
                OutputFormat::all_names().join(", ")
            )),
        }
    }
}

fn feature_error(format: OutputFormat) -> ChatmoodError {
    let feature = match format {
        OutputFormat::Csv => "csv-output",
        OutputFormat::Json | OutputFormat::Jsonl => "json-output",
    };
    ChatmoodError::invalid_format(
        "output",
        format!("Output format {format:?} requires the '{feature}' feature to be enabled"),
    )
}

/// Writes records to a file in the specified format.
///
/// Missing parent directories are created first.
///
/// # Example
///
/// ```rust,no_run
/// # #[cfg(all(feature = "csv-output", feature = "json-output"))]
/// # fn example(records: &[chatmood::message::EnrichedMessage]) -> chatmood::Result<()> {
/// use chatmood::format::{OutputFormat, write_to_format};
///
/// write_to_format(records, "data/processed/data_messages.csv", OutputFormat::Csv)?;
/// write_to_format(records, "data/processed/data_messages.jsonl", OutputFormat::Jsonl)?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if:
/// - The required feature for the format is not enabled
/// - The directory or file cannot be written
#[allow(unused_variables)]
pub fn write_to_format(
    records: &[EnrichedMessage],
    path: impl AsRef<Path>,
    format: OutputFormat,
) -> Result<(), ChatmoodError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    match format {
        #[cfg(feature = "csv-output")]
        OutputFormat::Csv => crate::core::output::write_csv(records, path),
        #[cfg(feature = "json-output")]
        OutputFormat::Json => crate::core::output::write_json(records, path),
        #[cfg(feature = "json-output")]
        OutputFormat::Jsonl => crate::core::output::write_jsonl(records, path),
        #[allow(unreachable_patterns)]
        _ => Err(feature_error(format)),
    }
}

/// Converts records to a string in the specified format.
///
/// # Errors
///
/// Returns an error if the required feature is not enabled or serialization fails.
#[allow(unused_variables)]
pub fn to_format_string(
    records: &[EnrichedMessage],
    format: OutputFormat,
) -> Result<String, ChatmoodError> {
    match format {
        #[cfg(feature = "csv-output")]
        OutputFormat::Csv => crate::core::output::to_csv(records),
        #[cfg(feature = "json-output")]
        OutputFormat::Json => crate::core::output::to_json(records),
        #[cfg(feature = "json-output")]
        OutputFormat::Jsonl => crate::core::output::to_jsonl(records),
        #[allow(unreachable_patterns)]
        _ => Err(feature_error(format)),
    }
}
