//! Emotion classification.
//!
//! - [`Classifier`] - the external service contract (one request per batch)
//! - [`EmotionVocabulary`] - closed label set plus the unknown sentinel
//! - [`BatchEngine`] - partition, classify with retries, merge by record index
//! - [`OpenAiClassifier`] - OpenAI-compatible chat completions client
//! - [`parse_labels`] - tolerant parsing of the model's JSON answer

mod batch;
mod openai;
mod response;

pub use batch::{
    BatchConfig, BatchEngine, BatchReport, BatchState, ClassificationOutcome, partition,
};
pub use openai::{ClassifierSettings, OpenAiClassifier};
pub use response::parse_labels;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, ConfigError};

/// One text in a classification request, tagged with its 1-based position
/// inside the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub position: usize,
    pub text: String,
}

/// A label the classifier returned for one batch position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionLabel {
    pub position: usize,
    pub label: String,
}

impl PositionLabel {
    pub fn new(position: usize, label: impl Into<String>) -> Self {
        Self {
            position,
            label: label.into(),
        }
    }
}

/// An emotion classification service.
///
/// Implementations send one request per call and may return labels in any
/// order, with positions missing or labels outside the vocabulary; the
/// [`BatchEngine`] reconciles all of that. An `Err` means the whole batch
/// failed.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, items: &[BatchItem]) -> Result<Vec<PositionLabel>, ClassifierError>;
}

/// The closed set of valid emotion labels.
///
/// Matching is case-insensitive and ignores surrounding whitespace; resolved
/// labels always come back in their configured spelling.
///
/// # Example
///
/// ```
/// use chatmood::classify::EmotionVocabulary;
///
/// let vocab = EmotionVocabulary::new(["Alegría", "Tristeza"], "Neutro")?;
/// assert_eq!(vocab.resolve(" alegría "), Some("Alegría"));
/// assert_eq!(vocab.resolve_or_unknown("sarcasmo"), "Neutro");
/// # Ok::<(), chatmood::error::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionVocabulary {
    labels: Vec<String>,
    unknown: String,
}

impl EmotionVocabulary {
    /// Creates a vocabulary. Duplicate labels (ignoring case) keep the first
    /// spelling.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if no non-blank label is given or the
    /// sentinel is blank.
    pub fn new<I, S>(labels: I, unknown: impl Into<String>) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for label in labels {
            let label = label.as_ref().trim();
            if label.is_empty() || unique.iter().any(|l| l.to_lowercase() == label.to_lowercase()) {
                continue;
            }
            unique.push(label.to_string());
        }

        if unique.is_empty() {
            return Err(ConfigError::invalid(
                "VALID_EMOTIONS",
                "the emotion vocabulary is empty",
            ));
        }

        let unknown = unknown.into().trim().to_string();
        if unknown.is_empty() {
            return Err(ConfigError::invalid(
                "UNKNOWN_EMOTION_LABEL",
                "the unknown label must not be blank",
            ));
        }

        Ok(Self {
            labels: unique,
            unknown,
        })
    }

    /// Returns the canonical spelling of `label`, if it is in the vocabulary.
    pub fn resolve(&self, label: &str) -> Option<&str> {
        let wanted = label.trim().to_lowercase();
        self.labels
            .iter()
            .find(|l| l.to_lowercase() == wanted)
            .map(String::as_str)
    }

    /// Returns the canonical spelling of `label`, or the unknown sentinel.
    pub fn resolve_or_unknown(&self, label: &str) -> &str {
        self.resolve(label).unwrap_or(&self.unknown)
    }

    /// Returns the valid labels in configured order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Returns the unknown-label sentinel.
    pub fn unknown(&self) -> &str {
        &self.unknown
    }
}
