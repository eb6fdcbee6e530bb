//! Run orchestration: discover, read, parse, enrich, filter, classify.
//!
//! [`Pipeline::run`] processes every input file independently. A file that
//! cannot be read or parsed becomes a [`PipelineWarning`] and the run goes
//! on with the next one. Only configuration problems are fatal, and those are
//! caught before a `Pipeline` exists.
//!
//! Output order is stable: WhatsApp files before Telegram files, files by
//! name inside each directory, then in-file order. Classification never
//! reorders records.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chatmood::classify::{Classifier, OpenAiClassifier};
//! use chatmood::config::Settings;
//! use chatmood::pipeline::{InputSources, Pipeline};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Arc::new(Settings::from_env()?);
//! let classifier: Arc<dyn Classifier> = Arc::new(OpenAiClassifier::new(
//!     settings.classifier.clone(),
//!     Arc::new(settings.vocabulary.clone()),
//! ));
//!
//! let pipeline = Pipeline::new(settings.clone(), classifier);
//! let output = pipeline
//!     .run(&InputSources::from_settings(&settings), &CancellationToken::new())
//!     .await;
//! println!("{}", output.summary);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::classify::{BatchEngine, BatchReport, Classifier};
use crate::config::Settings;
use crate::core::filter::{FilterConfig, apply_filters};
use crate::enrich::{BasicCleaner, TextCleaner, enrich};
use crate::error::ChatmoodError;
use crate::message::{EnrichedMessage, Message, SourceType};
use crate::parser::create_parser;

/// Input directories, one per source type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSources {
    pub whatsapp_dir: PathBuf,
    pub telegram_dir: PathBuf,
}

impl InputSources {
    /// `<data_dir>/raw/WhatsApp` and `<data_dir>/raw/Telegram`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            whatsapp_dir: settings.raw_dir(SourceType::WhatsAppText),
            telegram_dir: settings.raw_dir(SourceType::TelegramHtml),
        }
    }

    #[must_use]
    pub fn with_whatsapp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.whatsapp_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_telegram_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.telegram_dir = dir.into();
        self
    }

    /// Directory holding exports of `source`.
    pub fn dir(&self, source: SourceType) -> &Path {
        match source {
            SourceType::WhatsAppText => &self.whatsapp_dir,
            SourceType::TelegramHtml => &self.telegram_dir,
        }
    }
}

/// A non-fatal problem met during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PipelineWarning {
    /// An input directory does not exist.
    MissingDirectory { source: SourceType, path: PathBuf },
    /// A file (or directory listing) could not be read.
    FileRead { path: PathBuf, reason: String },
    /// A file was read but is not a valid export; it was skipped.
    FileParse { path: PathBuf, reason: String },
    /// One malformed unit inside an otherwise valid file.
    Parse {
        path: PathBuf,
        unit: usize,
        reason: String,
    },
}

impl PipelineWarning {
    /// Returns `true` if the warning caused a whole file to be skipped.
    pub fn skips_file(&self) -> bool {
        matches!(
            self,
            PipelineWarning::FileRead { .. } | PipelineWarning::FileParse { .. }
        )
    }
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::MissingDirectory { source, path } => {
                write!(f, "{source} input directory not found: {}", path.display())
            }
            PipelineWarning::FileRead { path, reason } => {
                write!(f, "cannot read {}: {reason}", path.display())
            }
            PipelineWarning::FileParse { path, reason } => {
                write!(f, "skipped {}: {reason}", path.display())
            }
            PipelineWarning::Parse { path, unit, reason } => {
                write!(f, "{} (unit {unit}): {reason}", path.display())
            }
        }
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub parse_warnings: usize,
    pub system_messages_skipped: usize,
    /// Records removed by the date and token filters.
    pub records_filtered: usize,
    pub records_emitted: usize,
    pub batches_total: usize,
    /// Batches that exhausted their attempts and got the sentinel.
    pub batches_failed: usize,
    pub batches_abandoned: usize,
    pub records_classified: usize,
    pub records_with_sentinel: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run summary")?;
        writeln!(
            f,
            "  Files:     {} processed, {} skipped",
            self.files_processed, self.files_skipped
        )?;
        writeln!(
            f,
            "  Parsing:   {} warnings, {} system messages skipped",
            self.parse_warnings, self.system_messages_skipped
        )?;
        writeln!(
            f,
            "  Records:   {} emitted, {} filtered out",
            self.records_emitted, self.records_filtered
        )?;
        writeln!(
            f,
            "  Batches:   {} total, {} failed, {} abandoned",
            self.batches_total, self.batches_failed, self.batches_abandoned
        )?;
        write!(
            f,
            "  Emotions:  {} classified, {} with sentinel",
            self.records_classified, self.records_with_sentinel
        )
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    /// Final table, in output order.
    pub records: Vec<EnrichedMessage>,
    pub warnings: Vec<PipelineWarning>,
    pub reports: Vec<BatchReport>,
    pub summary: RunSummary,
}

/// Parsed messages of every input file, before enrichment.
#[derive(Debug, Default)]
struct Loaded {
    messages: Vec<Message>,
    warnings: Vec<PipelineWarning>,
    summary: RunSummary,
}

impl Loaded {
    fn warn(&mut self, warning: PipelineWarning) {
        tracing::warn!("{warning}");
        match &warning {
            PipelineWarning::Parse { .. } => self.summary.parse_warnings += 1,
            w if w.skips_file() => self.summary.files_skipped += 1,
            _ => {}
        }
        self.warnings.push(warning);
    }
}

/// Sequences the whole run over immutable [`Settings`].
pub struct Pipeline {
    settings: Arc<Settings>,
    classifier: Arc<dyn Classifier>,
    cleaner: Arc<dyn TextCleaner>,
    filters: FilterConfig,
}

impl Pipeline {
    /// Creates a pipeline with the default cleaner for the configured
    /// language and the configured token filter.
    pub fn new(settings: Arc<Settings>, classifier: Arc<dyn Classifier>) -> Self {
        let cleaner =
            BasicCleaner::for_language(&settings.classifier.language, &settings.custom_stopwords);
        let filters = FilterConfig::new().with_min_tokens(settings.min_tokens);
        Self {
            settings,
            classifier,
            cleaner: Arc::new(cleaner),
            filters,
        }
    }

    /// Replaces the text cleaner.
    #[must_use]
    pub fn with_cleaner(mut self, cleaner: Arc<dyn TextCleaner>) -> Self {
        self.cleaner = cleaner;
        self
    }

    /// Replaces the record filters, including the token threshold.
    #[must_use]
    pub fn with_filters(mut self, filters: FilterConfig) -> Self {
        self.filters = filters;
        self
    }

    /// Returns the active filters.
    pub fn filters(&self) -> &FilterConfig {
        &self.filters
    }

    /// Runs the pipeline over every file in `sources`.
    ///
    /// Never fails: unreadable or invalid files become warnings, failed or
    /// cancelled batches get the sentinel label.
    pub async fn run(&self, sources: &InputSources, cancel: &CancellationToken) -> PipelineOutput {
        let loaded = self.load(sources).await;
        let mut output = self.process(loaded.messages, cancel).await;
        output.warnings = loaded.warnings;

        let counts = std::mem::take(&mut output.summary);
        output.summary = RunSummary {
            records_filtered: counts.records_filtered,
            records_emitted: counts.records_emitted,
            batches_total: counts.batches_total,
            batches_failed: counts.batches_failed,
            batches_abandoned: counts.batches_abandoned,
            records_classified: counts.records_classified,
            records_with_sentinel: counts.records_with_sentinel,
            ..loaded.summary
        };

        tracing::info!(
            records = output.summary.records_emitted,
            warnings = output.warnings.len(),
            "Pipeline finished"
        );
        output
    }

    /// Enriches, filters and classifies already parsed messages, keeping
    /// their order.
    ///
    /// Only the record and batch counts of the summary are filled in.
    pub async fn process(
        &self,
        messages: Vec<Message>,
        cancel: &CancellationToken,
    ) -> PipelineOutput {
        let enriched: Vec<EnrichedMessage> = messages
            .into_iter()
            .map(|message| {
                let senders = self.settings.senders(message.source_type);
                enrich(message, senders, self.cleaner.as_ref())
            })
            .collect();

        let before = enriched.len();
        let records = apply_filters(enriched, &self.filters);
        let records_filtered = before - records.len();
        if records_filtered > 0 {
            tracing::info!(
                removed = records_filtered,
                min_tokens = self.filters.min_tokens,
                "Filtered records before classification"
            );
        }

        let engine = BatchEngine::new(
            self.classifier.clone(),
            Arc::new(self.settings.vocabulary.clone()),
            self.settings.batch.clone(),
        );
        let texts: Vec<String> = records.iter().map(|r| r.clean_text.clone()).collect();
        let outcome = engine.classify_all(&texts, cancel).await;

        let summary = RunSummary {
            records_filtered,
            records_emitted: records.len(),
            batches_total: outcome.reports.len(),
            batches_failed: outcome.failed_batches(),
            batches_abandoned: outcome.abandoned_batches(),
            records_classified: outcome.classified_records(),
            records_with_sentinel: outcome.sentinel_records(),
            ..RunSummary::default()
        };

        let records = records
            .into_iter()
            .zip(outcome.labels)
            .map(|(record, label)| record.with_emotion(label))
            .collect();

        PipelineOutput {
            records,
            warnings: Vec::new(),
            reports: outcome.reports,
            summary,
        }
    }

    async fn load(&self, sources: &InputSources) -> Loaded {
        let mut loaded = Loaded::default();

        for &source in SourceType::all() {
            let dir = sources.dir(source);
            let files = match discover(dir, source.extension()).await {
                Ok(files) => files,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    loaded.warn(PipelineWarning::MissingDirectory {
                        source,
                        path: dir.to_path_buf(),
                    });
                    continue;
                }
                Err(e) => {
                    loaded.warn(PipelineWarning::FileRead {
                        path: dir.to_path_buf(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            tracing::info!(
                %source,
                dir = %dir.display(),
                files = files.len(),
                "Discovered input files"
            );

            for path in files {
                self.load_file(source, &path, &mut loaded).await;
            }
        }

        loaded
    }

    async fn load_file(&self, source: SourceType, path: &Path, loaded: &mut Loaded) {
        let content = match read_input(path, self.settings.file_read_timeout).await {
            Ok(content) => content,
            Err(e) => {
                loaded.warn(PipelineWarning::FileRead {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
                return;
            }
        };

        let outcome = match create_parser(source).and_then(|parser| parser.parse_str(&content)) {
            Ok(outcome) => outcome,
            Err(e) => {
                loaded.warn(PipelineWarning::FileParse {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
                return;
            }
        };

        tracing::info!(
            path = %path.display(),
            messages = outcome.messages.len(),
            warnings = outcome.warnings.len(),
            "Parsed file"
        );
        loaded.summary.files_processed += 1;
        loaded.summary.system_messages_skipped += outcome.skipped_system;
        for warning in outcome.warnings {
            loaded.warn(PipelineWarning::Parse {
                path: path.to_path_buf(),
                unit: warning.unit,
                reason: warning.reason,
            });
        }
        loaded.messages.extend(
            outcome
                .messages
                .into_iter()
                .map(|message| message.with_source_file(path)),
        );
    }
}

/// Files in `dir` with `extension` (case-insensitive), sorted by name.
async fn discover(dir: &Path, extension: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        let is_file = tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file());
        if matches_ext && is_file {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

async fn read_input(path: &Path, timeout: Duration) -> Result<String, ChatmoodError> {
    match tokio::time::timeout(timeout, tokio::fs::read_to_string(path)).await {
        Ok(content) => Ok(content?),
        Err(_) => Err(ChatmoodError::file_timeout(path, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{BatchItem, PositionLabel};
    use crate::config::EnvConfig;
    use crate::error::ClassifierError;
    use async_trait::async_trait;
    use envconfig::Envconfig;
    use std::collections::HashMap;

    /// Labels every item "alegría".
    struct Happy;

    #[async_trait]
    impl Classifier for Happy {
        async fn classify(
            &self,
            items: &[BatchItem],
        ) -> Result<Vec<PositionLabel>, ClassifierError> {
            Ok(items
                .iter()
                .map(|item| PositionLabel::new(item.position, "alegría"))
                .collect())
        }
    }

    fn settings(data_dir: &Path) -> Arc<Settings> {
        let env = HashMap::from([
            ("OPENAI_API_KEY".to_string(), "sk-test".to_string()),
            ("VALID_EMOTIONS".to_string(), r#"["alegría", "tristeza"]"#.to_string()),
            ("WHATSAPP_SENDER_MAPPING".to_string(), r#"{"Ana López": "Ana"}"#.to_string()),
            ("TELEGRAM_SENDER_MAPPING".to_string(), r#"{"Luis": "Luis M."}"#.to_string()),
            ("MIN_TOKENS".to_string(), "1".to_string()),
        ]);
        let env = EnvConfig::init_from_hashmap(&env).unwrap();
        Arc::new(Settings::from_env_config(env).unwrap().with_data_dir(data_dir))
    }

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(name), content).unwrap();
    }

    const CHAT: &str = "03/01/2022, 08:30 - Ana López: Buenos días alegría\n\
                        03/01/2022, 08:31 - Pedro: Hola 😀\n";

    const TELEGRAM: &str = r#"<html><body><div class="history">
        <div class="message default clearfix" id="message1"><div class="body">
            <div class="pull_right date details" title="04.01.2022 10:00:00 UTC-05:00">10:00</div>
            <div class="from_name">Luis</div>
            <div class="text">Mensaje desde Telegram</div>
        </div></div>
    </div></body></html>"#;

    #[test]
    fn test_input_sources_from_settings() {
        let settings = settings(Path::new("/srv/data"));
        let sources = InputSources::from_settings(&settings);
        assert_eq!(sources.whatsapp_dir, PathBuf::from("/srv/data/raw/WhatsApp"));
        assert_eq!(sources.dir(SourceType::TelegramHtml), Path::new("/srv/data/raw/Telegram"));
    }

    #[test]
    fn test_warning_display() {
        let warning = PipelineWarning::Parse {
            path: PathBuf::from("chat.txt"),
            unit: 4,
            reason: "bad timestamp".into(),
        };
        assert_eq!(warning.to_string(), "chat.txt (unit 4): bad timestamp");
        assert!(!warning.skips_file());
    }

    #[tokio::test]
    async fn test_run_mixed_sources() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        write(&settings.raw_dir(SourceType::WhatsAppText), "chat.txt", CHAT);
        write(&settings.raw_dir(SourceType::TelegramHtml), "messages.html", TELEGRAM);

        let pipeline = Pipeline::new(settings.clone(), Arc::new(Happy));
        let output = pipeline
            .run(&InputSources::from_settings(&settings), &CancellationToken::new())
            .await;

        let senders: Vec<&str> = output.records.iter().map(|r| r.message.sender.as_str()).collect();
        assert_eq!(senders, vec!["Ana", "Otro", "Luis M."]);
        assert_eq!(output.records[1].emojis, vec!["😀"]);
        assert_eq!(output.records[2].message.source_type, SourceType::TelegramHtml);
        assert!(output.records.iter().all(|r| r.emotion == "alegría"));
        assert!(output.records[0].message.source_file.as_ref().unwrap().ends_with("chat.txt"));

        assert!(output.warnings.is_empty());
        assert_eq!(output.summary.files_processed, 2);
        assert_eq!(output.summary.records_emitted, 3);
        assert_eq!(output.summary.batches_total, 1);
        assert_eq!(output.summary.records_classified, 3);
    }

    #[tokio::test]
    async fn test_missing_directories_are_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());

        let output = Pipeline::new(settings.clone(), Arc::new(Happy))
            .run(&InputSources::from_settings(&settings), &CancellationToken::new())
            .await;

        assert!(output.records.is_empty());
        assert_eq!(output.warnings.len(), 2);
        assert!(matches!(
            output.warnings[0],
            PipelineWarning::MissingDirectory {
                source: SourceType::WhatsAppText,
                ..
            }
        ));
        assert_eq!(output.summary.files_skipped, 0);
    }

    #[tokio::test]
    async fn test_unreadable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let wa = settings.raw_dir(SourceType::WhatsAppText);
        write(&wa, "a.txt", CHAT);
        std::fs::write(wa.join("b.txt"), [0xff, 0xfe, 0x00, 0x9f]).unwrap();

        let sources =
            InputSources::from_settings(&settings).with_telegram_dir(dir.path().join("none"));
        let output = Pipeline::new(settings.clone(), Arc::new(Happy))
            .run(&sources, &CancellationToken::new())
            .await;

        assert_eq!(output.records.len(), 2);
        assert_eq!(output.summary.files_processed, 1);
        assert_eq!(output.summary.files_skipped, 1);
        assert!(matches!(
            &output.warnings[0],
            PipelineWarning::FileRead { path, .. } if path.ends_with("b.txt")
        ));
    }

    #[tokio::test]
    async fn test_token_filter_runs_before_classification() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let ts = chrono::NaiveDate::from_ymd_opt(2022, 1, 3)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let messages = vec![
            Message::new(SourceType::WhatsAppText, 0, ts, "Ana López", "ok"),
            Message::new(SourceType::WhatsAppText, 1, ts, "Ana López", "qué día tan bonito"),
        ];

        let pipeline = Pipeline::new(settings, Arc::new(Happy))
            .with_filters(FilterConfig::new().with_min_tokens(2));
        let output = pipeline.process(messages, &CancellationToken::new()).await;

        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].message.body, "qué día tan bonito");
        assert_eq!(output.summary.records_filtered, 1);
    }

    #[tokio::test]
    async fn test_cancelled_run_uses_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        write(&settings.raw_dir(SourceType::WhatsAppText), "chat.txt", CHAT);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let output = Pipeline::new(settings.clone(), Arc::new(Happy))
            .run(&InputSources::from_settings(&settings), &cancel)
            .await;

        assert_eq!(output.records.len(), 2);
        assert!(output.records.iter().all(|r| r.emotion == "Neutro"));
        assert_eq!(output.summary.batches_abandoned, 1);
        assert_eq!(output.summary.records_with_sentinel, 2);
    }
}
