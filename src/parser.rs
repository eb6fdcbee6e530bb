//! Unified parser trait for chat exports.
//!
//! Each export format implements [`Parser`]. A parser turns the content of
//! one file into a [`ParseOutcome`]: the well-formed messages in file order,
//! plus a [`ParseWarning`] for every unit it had to drop. Dropping a unit
//! never aborts the file and never folds its text into a neighbour.
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "whatsapp")]
//! # fn main() -> chatmood::Result<()> {
//! use chatmood::message::SourceType;
//! use chatmood::parser::create_parser;
//!
//! let parser = create_parser(SourceType::WhatsAppText)?;
//! let outcome = parser.parse_str("15/01/2024, 10:30 - Ana: Hola\n")?;
//! assert_eq!(outcome.messages.len(), 1);
//! assert!(outcome.warnings.is_empty());
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "whatsapp"))]
//! # fn main() {}
//! ```

use std::fmt;

use crate::Message;
use crate::error::ChatmoodError;
use crate::message::SourceType;

/// A message unit that was recognized but could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// 1-based line number (text exports) or message node number (HTML exports).
    pub unit: usize,
    /// Why the unit was dropped.
    pub reason: String,
}

impl ParseWarning {
    /// Creates a new warning.
    pub fn new(unit: usize, reason: impl Into<String>) -> Self {
        Self {
            unit,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit {}: {}", self.unit, self.reason)
    }
}

/// Result of parsing one file.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    /// Well-formed messages in file order, `seq` numbered from 0.
    pub messages: Vec<Message>,
    /// Units that were dropped.
    pub warnings: Vec<ParseWarning>,
    /// Service/system notices that were skipped on purpose.
    pub skipped_system: usize,
}

impl ParseOutcome {
    /// Pushes a message, assigning the next emission sequence number.
    pub fn push(&mut self, mut message: Message) {
        message.seq = self.messages.len();
        self.messages.push(message);
    }

    /// Records a dropped unit.
    pub fn warn(&mut self, unit: usize, reason: impl Into<String>) {
        let warning = ParseWarning::new(unit, reason);
        tracing::debug!(unit = warning.unit, reason = %warning.reason, "Dropping malformed unit");
        self.warnings.push(warning);
    }

    /// Returns the number of parsed messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if no message was parsed.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Trait implemented by every export format parser.
///
/// Parsers must implement:
/// - [`name`](Parser::name) - Parser identifier
/// - [`source_type`](Parser::source_type) - Format this parser handles
/// - [`parse_str`](Parser::parse_str) - Parse from a string
///
/// Parsers never touch the filesystem; the pipeline reads each file (with a
/// timeout) and hands the content over.
pub trait Parser: Send + Sync {
    /// Returns the human-readable name of this parser.
    fn name(&self) -> &'static str;

    /// Returns the source type tagged on every message this parser emits.
    fn source_type(&self) -> SourceType;

    /// Parses export content from a string.
    ///
    /// # Errors
    ///
    /// Returns [`ChatmoodError::InvalidFormat`] when the content as a whole is
    /// not an export of this format. Individual bad units are warnings, not
    /// errors.
    fn parse_str(&self, content: &str) -> Result<ParseOutcome, ChatmoodError>;
}

/// Creates a parser for the specified source type.
///
/// # Errors
///
/// Returns [`ChatmoodError::InvalidFormat`] if the parser feature for
/// `source` is disabled in this build.
pub fn create_parser(source: SourceType) -> Result<Box<dyn Parser>, ChatmoodError> {
    match source {
        #[cfg(feature = "whatsapp")]
        SourceType::WhatsAppText => Ok(Box::new(crate::parsers::WhatsAppParser::new())),
        #[cfg(feature = "telegram")]
        SourceType::TelegramHtml => Ok(Box::new(crate::parsers::TelegramParser::new())),
        #[allow(unreachable_patterns)]
        other => Err(ChatmoodError::invalid_format(
            "input",
            format!("the {other} parser is not enabled in this build"),
        )),
    }
}
