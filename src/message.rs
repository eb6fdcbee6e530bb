//! Canonical record types shared by every stage of the pipeline.
//!
//! Both export formats are parsed into [`Message`]. After sender
//! normalization, emoji extraction, cleaning and classification a message
//! becomes an [`EnrichedMessage`], which is what the output writers see.
//!
//! # Examples
//!
//! ```
//! use chatmood::message::{Message, SourceType};
//! use chrono::NaiveDate;
//!
//! let ts = NaiveDate::from_ymd_opt(2022, 1, 3)
//!     .unwrap()
//!     .and_hms_opt(8, 30, 0)
//!     .unwrap();
//!
//! let msg = Message::new(SourceType::WhatsAppText, 0, ts, "Ana", "Hola 👋");
//! assert_eq!(msg.raw_sender(), "Ana");
//! // Until normalization runs, the display sender is the raw one.
//! assert_eq!(msg.sender(), "Ana");
//! assert!(!msg.is_attachment());
//! ```

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Which export format a record came from.
///
/// Kept as a column in the output so mixed-origin rows stay distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceType {
    /// Line-oriented WhatsApp `.txt` export.
    #[serde(rename = "WhatsApp")]
    WhatsAppText,

    /// Telegram Desktop `.html` export.
    #[serde(rename = "Telegram")]
    TelegramHtml,
}

impl SourceType {
    /// Returns the file extension of exports from this source.
    pub fn extension(&self) -> &'static str {
        match self {
            SourceType::WhatsAppText => "txt",
            SourceType::TelegramHtml => "html",
        }
    }

    /// Returns the label written to the `source_type` output column.
    pub fn label(&self) -> &'static str {
        match self {
            SourceType::WhatsAppText => "WhatsApp",
            SourceType::TelegramHtml => "Telegram",
        }
    }

    /// Returns the directory name used under `<data_dir>/raw/`.
    pub fn raw_dir_name(&self) -> &'static str {
        self.label()
    }

    /// Returns all supported sources in processing order.
    pub fn all() -> &'static [SourceType] {
        &[SourceType::WhatsAppText, SourceType::TelegramHtml]
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whatsapp" | "wa" | "txt" => Ok(SourceType::WhatsAppText),
            "telegram" | "tg" | "html" => Ok(SourceType::TelegramHtml),
            _ => Err(format!(
                "Unknown source: '{}'. Expected one of: whatsapp, telegram",
                s
            )),
        }
    }
}

/// A chat message in the canonical schema.
///
/// `seq` is the message's emission order inside its source file. Together
/// with `source_file` it identifies the record no matter how later stages
/// batch or reorder work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// 0-based emission order within the source file.
    pub seq: usize,

    /// File the message was parsed from, if it came from a file.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub source_file: Option<PathBuf>,

    /// When the message was sent, in the exporter's local time.
    ///
    /// WhatsApp exports carry minute precision (sometimes seconds), Telegram
    /// HTML exports always carry seconds.
    pub timestamp: NaiveDateTime,

    /// Sender exactly as it appears in the export.
    pub raw_sender: String,

    /// Display sender after normalization.
    pub sender: String,

    /// Export format the message came from.
    pub source_type: SourceType,

    /// Original text. May be a placeholder or empty for attachments.
    pub body: String,

    /// `true` when the message is a media/file attachment.
    pub attachment: bool,
}

impl Message {
    /// Creates a text message. The display sender starts out as the raw one.
    pub fn new(
        source_type: SourceType,
        seq: usize,
        timestamp: NaiveDateTime,
        raw_sender: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let raw_sender = raw_sender.into();
        Self {
            seq,
            source_file: None,
            timestamp,
            sender: raw_sender.clone(),
            raw_sender,
            source_type,
            body: body.into(),
            attachment: false,
        }
    }

    /// Builder method to mark the message as an attachment.
    #[must_use]
    pub fn with_attachment(mut self, attachment: bool) -> Self {
        self.attachment = attachment;
        self
    }

    /// Builder method to record the source file.
    #[must_use]
    pub fn with_source_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_file = Some(path.into());
        self
    }

    /// Returns the raw sender.
    pub fn raw_sender(&self) -> &str {
        &self.raw_sender
    }

    /// Returns the display sender.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Returns the message body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns `true` for attachment records.
    pub fn is_attachment(&self) -> bool {
        self.attachment
    }

    /// Returns `true` if the body is empty or whitespace-only.
    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }
}

/// A [`Message`] plus everything the pipeline derives from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedMessage {
    /// The canonical record.
    #[serde(flatten)]
    pub message: Message,

    /// Emoji found in the body, in order, duplicates kept.
    pub emojis: Vec<String>,

    /// Normalized text used for classification.
    pub clean_text: String,

    /// Emotion label from the closed vocabulary, or the unknown sentinel.
    pub emotion: String,

    /// Number of whitespace-separated tokens in `clean_text`.
    pub token_count: usize,
}

impl EnrichedMessage {
    /// Wraps a message with its derived fields. The emotion starts empty and
    /// is filled in by the classification stage.
    pub fn new(message: Message, emojis: Vec<String>, clean_text: String) -> Self {
        let token_count = clean_text.split_whitespace().count();
        Self {
            message,
            emojis,
            clean_text,
            emotion: String::new(),
            token_count,
        }
    }

    /// Builder method to set the emotion label.
    #[must_use]
    pub fn with_emotion(mut self, emotion: impl Into<String>) -> Self {
        self.emotion = emotion.into();
        self
    }

    /// Returns the emoji joined with single spaces, as written to CSV.
    pub fn emojis_joined(&self) -> String {
        self.emojis.join(" ")
    }
}
