//! # Chatmood
//!
//! A Rust library for turning WhatsApp and Telegram chat exports into one
//! analysis-ready table, with emoji, cleaned text and an emotion label per
//! message.
//!
//! ## Overview
//!
//! Chatmood reads:
//! - **WhatsApp** - `.txt` exports (US, EU and Latin American layouts)
//! - **Telegram** - `.html` exports from Telegram Desktop
//!
//! Every message is parsed into the same [`Message`] schema, its sender is
//! mapped to a display name, emoji are extracted, the body is cleaned, and
//! the cleaned text is classified in batches by an LLM endpoint. The result
//! is written as CSV, JSON or JSONL.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chatmood::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let settings = Arc::new(Settings::from_env()?);
//! let classifier = Arc::new(OpenAiClassifier::new(
//!     settings.classifier.clone(),
//!     Arc::new(settings.vocabulary.clone()),
//! ));
//!
//! let output = Pipeline::new(settings.clone(), classifier)
//!     .run(&InputSources::from_settings(&settings), &CancellationToken::new())
//!     .await;
//!
//! write_to_format(&output.records, settings.default_output(), OutputFormat::Csv)?;
//! println!("{}", output.summary);
//! # Ok(())
//! # }
//! ```
//!
//! ## Parsing a Single Export
//!
//! ```rust
//! use chatmood::parser::create_parser;
//! use chatmood::message::SourceType;
//!
//! let parser = create_parser(SourceType::WhatsAppText)?;
//! let outcome = parser.parse_str("03/01/2022, 08:30 - Ana: Hola 😀\n")?;
//! assert_eq!(outcome.messages[0].sender(), "Ana");
//! # Ok::<(), chatmood::ChatmoodError>(())
//! ```
//!
//! ## Module Structure
//!
//! - [`parser`] - [`Parser`](parser::Parser) trait, [`create_parser`](parser::create_parser)
//! - [`parsers`] - [`WhatsAppParser`](parsers::WhatsAppParser), [`TelegramParser`](parsers::TelegramParser)
//! - [`enrich`] - sender normalization, emoji extraction, text cleaning
//! - [`classify`] - [`Classifier`](classify::Classifier) trait, batch engine, OpenAI client
//! - [`pipeline`] - [`Pipeline`](pipeline::Pipeline), [`RunSummary`](pipeline::RunSummary)
//! - [`config`] - [`Settings`](config::Settings) from the environment
//! - [`core`] - record filters and output writers
//! - [`format`] - [`OutputFormat`](format::OutputFormat) selection
//! - [`error`] - [`ChatmoodError`], [`Result`]
//! - [`prelude`] - Convenient re-exports

pub mod classify;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod core;
pub mod enrich;
pub mod error;
pub mod format;
pub mod message;
pub mod parser;
pub mod parsers;
pub mod pipeline;

// Re-export the main types at the crate root for convenience
pub use error::{ChatmoodError, Result};
pub use message::{EnrichedMessage, Message, SourceType};

/// Convenient re-exports for common usage.
///
/// ```rust
/// use chatmood::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{EnrichedMessage, Message, SourceType};

    pub use crate::error::{ChatmoodError, ClassifierError, ConfigError, Result};

    pub use crate::parser::{ParseOutcome, ParseWarning, Parser, create_parser};
    #[cfg(feature = "telegram")]
    pub use crate::parsers::TelegramParser;
    #[cfg(feature = "whatsapp")]
    pub use crate::parsers::WhatsAppParser;

    pub use crate::config::{Settings, TelegramConfig, WhatsAppConfig};

    pub use crate::enrich::{BasicCleaner, SenderMap, TextCleaner, extract_emojis};

    pub use crate::classify::{
        BatchConfig, BatchEngine, Classifier, EmotionVocabulary, OpenAiClassifier,
    };

    pub use crate::core::filter::{FilterConfig, apply_filters};

    pub use crate::format::{OutputFormat, to_format_string, write_to_format};

    pub use crate::pipeline::{InputSources, Pipeline, PipelineOutput, PipelineWarning, RunSummary};
}
