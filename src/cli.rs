//! Command-line interface definition using clap.
//!
//! This module defines:
//! - [`Args`] - CLI argument structure (for use with clap)
//! - [`OutputFormat`] - Output format options
//!
//! Flags override a subset of the environment [`Settings`]; everything else
//! comes from `.env` and the process environment.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::core::filter::FilterConfig;
use crate::error::{ChatmoodError, ConfigError};
use crate::pipeline::InputSources;

/// Tag WhatsApp and Telegram chat exports with emotions and write one
/// analysis-ready table.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatmood")]
#[command(version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    chatmood
    chatmood --data-dir ./data -o data/processed/messages.jsonl
    chatmood --whatsapp-dir exports/wa --telegram-dir exports/tg --after 2024-01-01
    chatmood --batch-size 20 --concurrency 2 -v

Required environment (or .env): OPENAI_API_KEY, VALID_EMOTIONS")]
pub struct Args {
    /// Data directory (inputs under raw/, default output under processed/)
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// WhatsApp .txt exports [default: <data-dir>/raw/WhatsApp]
    #[arg(long, value_name = "DIR")]
    pub whatsapp_dir: Option<PathBuf>,

    /// Telegram .html exports [default: <data-dir>/raw/Telegram]
    #[arg(long, value_name = "DIR")]
    pub telegram_dir: Option<PathBuf>,

    /// Path to output file [default: <data-dir>/processed/data_messages.csv]
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format [default: from the output extension, else csv]
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Maximum records per classifier request
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Classifier requests in flight at once
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Drop records with fewer clean tokens (0 keeps everything)
    #[arg(long, value_name = "N")]
    pub min_tokens: Option<usize>,

    /// Keep messages on or after this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub after: Option<String>,

    /// Keep messages on or before this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub before: Option<String>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Applies the setting overrides given on the command line.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero batch size or concurrency.
    pub fn apply(&self, mut settings: Settings) -> Result<Settings, ConfigError> {
        if let Some(dir) = &self.data_dir {
            settings = settings.with_data_dir(dir);
        }
        if let Some(size) = self.batch_size {
            settings = settings.with_max_batch_size(size)?;
        }
        if let Some(concurrency) = self.concurrency {
            settings = settings.with_concurrency(concurrency)?;
        }
        if let Some(min_tokens) = self.min_tokens {
            settings = settings.with_min_tokens(min_tokens);
        }
        Ok(settings)
    }

    /// Input directories, defaulting to the data directory layout.
    pub fn input_sources(&self, settings: &Settings) -> InputSources {
        let mut sources = InputSources::from_settings(settings);
        if let Some(dir) = &self.whatsapp_dir {
            sources = sources.with_whatsapp_dir(dir);
        }
        if let Some(dir) = &self.telegram_dir {
            sources = sources.with_telegram_dir(dir);
        }
        sources
    }

    /// Date and token filters.
    ///
    /// # Errors
    ///
    /// Returns [`ChatmoodError::InvalidDate`] for a malformed `--after` or
    /// `--before`.
    pub fn filters(&self, settings: &Settings) -> Result<FilterConfig, ChatmoodError> {
        let mut filters = FilterConfig::new().with_min_tokens(settings.min_tokens);
        if let Some(after) = &self.after {
            filters = filters.with_date_from(after)?;
        }
        if let Some(before) = &self.before {
            filters = filters.with_date_to(before)?;
        }
        Ok(filters)
    }

    /// Output path and format.
    ///
    /// An explicit `--format` wins; otherwise the format comes from the
    /// output extension. Without `--output` the default file gets the
    /// extension of the chosen format.
    ///
    /// # Errors
    ///
    /// Returns [`ChatmoodError::InvalidFormat`] when `--output` has an
    /// unknown extension and no `--format` is given.
    pub fn output_target(
        &self,
        settings: &Settings,
    ) -> Result<(PathBuf, crate::format::OutputFormat), ChatmoodError> {
        match (&self.output, self.format) {
            (Some(path), Some(format)) => Ok((path.clone(), format.into())),
            (Some(path), None) => Ok((path.clone(), crate::format::OutputFormat::from_path(path)?)),
            (None, format) => {
                let format = format.unwrap_or_default();
                Ok((
                    settings.default_output().with_extension(format.extension()),
                    format.into(),
                ))
            }
        }
    }
}

/// Output format options.
///
/// - [`Csv`](OutputFormat::Csv) - semicolon-delimited table
/// - [`Json`](OutputFormat::Json) - array of records
/// - [`Jsonl`](OutputFormat::Jsonl) - one record per line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
    #[value(alias = "ndjson")]
    Jsonl,
}

impl OutputFormat {
    /// Returns the file extension for this format (without dot).
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Jsonl => "jsonl",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::format::OutputFormat::from(*self))
    }
}

// Conversion to library format type
impl From<OutputFormat> for crate::format::OutputFormat {
    fn from(format: OutputFormat) -> crate::format::OutputFormat {
        match format {
            OutputFormat::Csv => crate::format::OutputFormat::Csv,
            OutputFormat::Json => crate::format::OutputFormat::Json,
            OutputFormat::Jsonl => crate::format::OutputFormat::Jsonl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;
    use envconfig::Envconfig;
    use std::collections::HashMap;
    use std::path::Path;

    fn settings() -> Settings {
        let env = HashMap::from([
            ("OPENAI_API_KEY".to_string(), "sk-test".to_string()),
            ("VALID_EMOTIONS".to_string(), r#"["amor"]"#.to_string()),
        ]);
        Settings::from_env_config(EnvConfig::init_from_hashmap(&env).unwrap()).unwrap()
    }

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("chatmood").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = args(&[]);
        let settings = args.apply(settings()).unwrap();

        let (path, format) = args.output_target(&settings).unwrap();
        assert_eq!(path, Path::new("data/processed/data_messages.csv"));
        assert_eq!(format, crate::format::OutputFormat::Csv);

        let sources = args.input_sources(&settings);
        assert_eq!(sources.whatsapp_dir, Path::new("data/raw/WhatsApp"));
        assert!(!args.filters(&settings).unwrap().has_date_filter());
    }

    #[test]
    fn test_overrides() {
        let args = args(&[
            "--data-dir",
            "/tmp/d",
            "--telegram-dir",
            "/exports/tg",
            "--batch-size",
            "10",
            "--concurrency",
            "2",
            "--min-tokens",
            "0",
            "-v",
        ]);
        let settings = args.apply(settings()).unwrap();

        assert_eq!(settings.batch.max_batch_size, 10);
        assert_eq!(settings.batch.concurrency, 2);
        assert_eq!(settings.min_tokens, 0);
        assert!(args.verbose);

        let sources = args.input_sources(&settings);
        assert_eq!(sources.whatsapp_dir, Path::new("/tmp/d/raw/WhatsApp"));
        assert_eq!(sources.telegram_dir, Path::new("/exports/tg"));
    }

    #[test]
    fn test_zero_batch_size_is_config_error() {
        let err = args(&["--batch-size", "0"]).apply(settings()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "MAX_BATCH_SIZE", .. }));
    }

    #[test]
    fn test_output_format_resolution() {
        let settings = settings();

        let (path, format) = args(&["-f", "jsonl"]).output_target(&settings).unwrap();
        assert_eq!(path, Path::new("data/processed/data_messages.jsonl"));
        assert_eq!(format, crate::format::OutputFormat::Jsonl);

        let (_, format) = args(&["-o", "out.json"]).output_target(&settings).unwrap();
        assert_eq!(format, crate::format::OutputFormat::Json);

        let (path, format) = args(&["-o", "out.txt", "-f", "csv"])
            .output_target(&settings)
            .unwrap();
        assert_eq!(path, Path::new("out.txt"));
        assert_eq!(format, crate::format::OutputFormat::Csv);

        assert!(args(&["-o", "out.txt"]).output_target(&settings).is_err());
    }

    #[test]
    fn test_date_filters() {
        let settings = settings();
        let filters = args(&["--after", "2024-01-01", "--before", "2024-02-01"])
            .filters(&settings)
            .unwrap();
        assert!(filters.has_date_filter());
        assert_eq!(filters.min_tokens, 2);

        let err = args(&["--after", "01/01/2024"]).filters(&settings).unwrap_err();
        assert!(err.is_invalid_date());
    }

    #[test]
    fn test_format_display_and_alias() {
        assert_eq!(OutputFormat::Jsonl.to_string(), "JSONL");
        assert_eq!(args(&["-f", "ndjson"]).format, Some(OutputFormat::Jsonl));
    }
}
