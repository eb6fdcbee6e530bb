//! Configuration types.
//!
//! # Parser Configurations
//!
//! - [`WhatsAppConfig`] - WhatsApp TXT export settings
//! - [`TelegramConfig`] - Telegram HTML export settings
//!
//! # Run Settings
//!
//! [`EnvConfig`] reads the process environment (after loading `.env`);
//! [`Settings::from_env_config`] validates it into the immutable [`Settings`]
//! every pipeline component receives. Nothing reads the environment after
//! that.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `OPENAI_API_KEY` | required |
//! | `OPENAI_API_BASE` | `https://api.openai.com/v1` |
//! | `OPENAI_API_MODEL` | `gpt-3.5-turbo` |
//! | `LANGUAGE` | `es` |
//! | `WHATSAPP_SENDER_MAPPING` / `TELEGRAM_SENDER_MAPPING` | `{}` |
//! | `SENDER_FALLBACK` | `Otro` |
//! | `CUSTOM_STOPWORDS` | `[]` |
//! | `VALID_EMOTIONS` | required, JSON array |
//! | `UNKNOWN_EMOTION_LABEL` | `Neutro` |
//! | `MAX_BATCH_SIZE` | `30` |
//! | `MAX_ATTEMPTS` | `3` |
//! | `INITIAL_BACKOFF_MS` / `MAX_BACKOFF_MS` | `750` / `5000` |
//! | `REQUEST_TIMEOUT_SECS` | `60` |
//! | `FILE_READ_TIMEOUT_SECS` | `30` |
//! | `CLASSIFIER_CONCURRENCY` | `4` |
//! | `MAX_RESPONSE_TOKENS` | `300` |
//! | `MIN_TOKENS` | `2` |
//! | `DATA_DIR` | `data` |
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use chatmood::config::{EnvConfig, Settings};
//! use envconfig::Envconfig;
//!
//! let env = HashMap::from([
//!     ("OPENAI_API_KEY".to_string(), "sk-test".to_string()),
//!     ("VALID_EMOTIONS".to_string(), r#"["amor", "ira"]"#.to_string()),
//! ]);
//! let settings = Settings::from_env_config(EnvConfig::init_from_hashmap(&env)?)?;
//! assert_eq!(settings.batch.max_batch_size, 30);
//! assert_eq!(settings.vocabulary.unknown(), "Neutro");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::PathBuf;
use std::time::Duration;

use envconfig::Envconfig;
use serde::{Deserialize, Serialize};

use crate::classify::{BatchConfig, ClassifierSettings, EmotionVocabulary};
use crate::enrich::SenderMap;
use crate::error::ConfigError;
use crate::message::SourceType;

/// Configuration for WhatsApp export parsing.
///
/// WhatsApp exports are TXT files with various locale-specific date formats.
/// The parser auto-detects the format by analyzing the first 20 lines.
///
/// # Example
///
/// ```rust
/// use chatmood::config::WhatsAppConfig;
///
/// let config = WhatsAppConfig::new()
///     .with_skip_system_messages(false);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Skip notices such as the encryption banner or deleted messages (default: true)
    pub skip_system_messages: bool,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            skip_system_messages: true,
        }
    }
}

impl WhatsAppConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to skip system messages.
    #[must_use]
    pub fn with_skip_system_messages(mut self, skip: bool) -> Self {
        self.skip_system_messages = skip;
        self
    }
}

/// Configuration for Telegram HTML export parsing.
///
/// # Example
///
/// ```rust
/// use chatmood::config::TelegramConfig;
///
/// let config = TelegramConfig::new().with_unknown_sender("Desconocido");
/// assert_eq!(config.unknown_sender, "Desconocido");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Sender for joined messages with no preceding sender (default: "Unknown")
    pub unknown_sender: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            unknown_sender: "Unknown".to_string(),
        }
    }
}

impl TelegramConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender used when none can be determined.
    #[must_use]
    pub fn with_unknown_sender(mut self, sender: impl Into<String>) -> Self {
        self.unknown_sender = sender.into();
        self
    }
}

/// Raw environment values, before validation.
#[derive(Envconfig, Clone)]
pub struct EnvConfig {
    #[envconfig(from = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    #[envconfig(from = "OPENAI_API_BASE", default = "https://api.openai.com/v1")]
    pub openai_api_base: String,

    #[envconfig(from = "OPENAI_API_MODEL", default = "gpt-3.5-turbo")]
    pub openai_api_model: String,

    #[envconfig(from = "LANGUAGE", default = "es")]
    pub language: String,

    #[envconfig(from = "WHATSAPP_SENDER_MAPPING", default = "{}")]
    pub whatsapp_sender_mapping: String,

    #[envconfig(from = "TELEGRAM_SENDER_MAPPING", default = "{}")]
    pub telegram_sender_mapping: String,

    #[envconfig(from = "SENDER_FALLBACK", default = "Otro")]
    pub sender_fallback: String,

    #[envconfig(from = "CUSTOM_STOPWORDS", default = "[]")]
    pub custom_stopwords: String,

    #[envconfig(from = "VALID_EMOTIONS")]
    pub valid_emotions: Option<String>,

    #[envconfig(from = "UNKNOWN_EMOTION_LABEL", default = "Neutro")]
    pub unknown_emotion_label: String,

    #[envconfig(from = "MAX_BATCH_SIZE", default = "30")]
    pub max_batch_size: usize,

    #[envconfig(from = "MAX_ATTEMPTS", default = "3")]
    pub max_attempts: u32,

    #[envconfig(from = "INITIAL_BACKOFF_MS", default = "750")]
    pub initial_backoff_ms: u64,

    #[envconfig(from = "MAX_BACKOFF_MS", default = "5000")]
    pub max_backoff_ms: u64,

    #[envconfig(from = "REQUEST_TIMEOUT_SECS", default = "60")]
    pub request_timeout_secs: u64,

    #[envconfig(from = "FILE_READ_TIMEOUT_SECS", default = "30")]
    pub file_read_timeout_secs: u64,

    #[envconfig(from = "CLASSIFIER_CONCURRENCY", default = "4")]
    pub classifier_concurrency: usize,

    #[envconfig(from = "MAX_RESPONSE_TOKENS", default = "300")]
    pub max_response_tokens: u32,

    #[envconfig(from = "MIN_TOKENS", default = "2")]
    pub min_tokens: usize,

    #[envconfig(from = "DATA_DIR", default = "data")]
    pub data_dir: String,
}

/// Validated, immutable run settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub classifier: ClassifierSettings,
    pub whatsapp_senders: SenderMap,
    pub telegram_senders: SenderMap,
    pub custom_stopwords: Vec<String>,
    pub vocabulary: EmotionVocabulary,
    pub batch: BatchConfig,
    pub file_read_timeout: Duration,
    /// Records with fewer clean tokens are not classified; 0 keeps everything.
    pub min_tokens: usize,
    pub data_dir: PathBuf,
}

impl Settings {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_env_config(EnvConfig::init_from_env()?)
    }

    /// Validates raw environment values.
    pub fn from_env_config(env: EnvConfig) -> Result<Self, ConfigError> {
        let api_key = env
            .openai_api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;

        let emotions_json = env
            .valid_emotions
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("VALID_EMOTIONS"))?;
        let emotions = parse_string_list("VALID_EMOTIONS", &emotions_json)?;
        let vocabulary = EmotionVocabulary::new(emotions, env.unknown_emotion_label)?;

        let custom_stopwords = parse_string_list("CUSTOM_STOPWORDS", &env.custom_stopwords)?;

        let whatsapp_senders = SenderMap::from_json(
            "WHATSAPP_SENDER_MAPPING",
            &env.whatsapp_sender_mapping,
            env.sender_fallback.clone(),
        )?;
        let telegram_senders = SenderMap::from_json(
            "TELEGRAM_SENDER_MAPPING",
            &env.telegram_sender_mapping,
            env.sender_fallback,
        )?;

        require_positive("MAX_BATCH_SIZE", env.max_batch_size)?;
        require_positive("MAX_ATTEMPTS", env.max_attempts as usize)?;
        require_positive("CLASSIFIER_CONCURRENCY", env.classifier_concurrency)?;
        require_positive("REQUEST_TIMEOUT_SECS", env.request_timeout_secs as usize)?;
        require_positive("FILE_READ_TIMEOUT_SECS", env.file_read_timeout_secs as usize)?;

        let batch = BatchConfig::new()
            .with_max_batch_size(env.max_batch_size)
            .with_max_attempts(env.max_attempts)
            .with_backoff(
                Duration::from_millis(env.initial_backoff_ms),
                Duration::from_millis(env.max_backoff_ms),
            )
            .with_request_timeout(Duration::from_secs(env.request_timeout_secs))
            .with_concurrency(env.classifier_concurrency);

        Ok(Self {
            classifier: ClassifierSettings {
                api_key,
                api_base: env.openai_api_base,
                model: env.openai_api_model,
                language: env.language,
                max_response_tokens: env.max_response_tokens,
            },
            whatsapp_senders,
            telegram_senders,
            custom_stopwords,
            vocabulary,
            batch,
            file_read_timeout: Duration::from_secs(env.file_read_timeout_secs),
            min_tokens: env.min_tokens,
            data_dir: PathBuf::from(env.data_dir),
        })
    }

    /// Returns the sender table for records of `source`.
    pub fn senders(&self, source: SourceType) -> &SenderMap {
        match source {
            SourceType::WhatsAppText => &self.whatsapp_senders,
            SourceType::TelegramHtml => &self.telegram_senders,
        }
    }

    /// Overrides the maximum batch size.
    pub fn with_max_batch_size(mut self, size: usize) -> Result<Self, ConfigError> {
        require_positive("MAX_BATCH_SIZE", size)?;
        self.batch = self.batch.with_max_batch_size(size);
        Ok(self)
    }

    /// Overrides the number of concurrent classifier requests.
    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self, ConfigError> {
        require_positive("CLASSIFIER_CONCURRENCY", concurrency)?;
        self.batch = self.batch.with_concurrency(concurrency);
        Ok(self)
    }

    /// Overrides the minimum token count.
    #[must_use]
    pub fn with_min_tokens(mut self, min_tokens: usize) -> Self {
        self.min_tokens = min_tokens;
        self
    }

    /// Overrides the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Default input directory for `source`: `<data_dir>/raw/<WhatsApp|Telegram>`.
    pub fn raw_dir(&self, source: SourceType) -> PathBuf {
        self.data_dir.join("raw").join(source.raw_dir_name())
    }

    /// Default output file: `<data_dir>/processed/data_messages.csv`.
    pub fn default_output(&self) -> PathBuf {
        self.data_dir.join("processed").join("data_messages.csv")
    }
}

fn parse_string_list(name: &'static str, json: &str) -> Result<Vec<String>, ConfigError> {
    serde_json::from_str(json)
        .map_err(|e| ConfigError::invalid(name, format!("expected a JSON array of strings: {e}")))
}

fn require_positive(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(name, "must be at least 1"));
    }
    Ok(())
}
