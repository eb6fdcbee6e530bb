//! Text normalization for classification.
//!
//! [`TextCleaner`] is the seam: the pipeline only needs `text -> clean_text`.
//! [`BasicCleaner`] is the default, a rule-based cleaner for Spanish and
//! English chats.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::emoji::is_emoji_component;

static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+|www\.\S+").unwrap());
static MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@\w+").unwrap());
static PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\+\d{1,3}[- ]?\d{6,14}").unwrap());
static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b").unwrap());
static TIME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{1,2}:\d{2}\b").unwrap());

const SPANISH_STOPWORDS: &[&str] = &[
    "a", "al", "algo", "ante", "antes", "como", "con", "contra", "cual", "cuando", "de", "del",
    "desde", "donde", "durante", "e", "el", "él", "ella", "ellas", "ellos", "en", "entre", "era",
    "es", "esa", "ese", "eso", "esta", "este", "esto", "fue", "ha", "han", "hasta", "hay", "la",
    "las", "le", "les", "lo", "los", "me", "mi", "mis", "muy", "nos", "o", "para", "pero", "por",
    "porque", "que", "se", "si", "sin", "sobre", "su", "sus", "también", "te", "ti", "tu", "tus",
    "un", "una", "uno", "unos", "unas", "y", "ya", "yo",
];

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "he", "her", "his",
    "i", "in", "is", "it", "its", "me", "my", "of", "on", "or", "our", "she", "so", "that", "the",
    "their", "them", "they", "this", "to", "was", "we", "were", "with", "you", "your",
];

/// Turns a message body into the text sent to the classifier.
pub trait TextCleaner: Send + Sync {
    /// Returns the cleaned text; empty when nothing meaningful is left.
    fn clean(&self, text: &str) -> String;
}

/// Rule-based cleaner.
///
/// Steps, in order: lowercase and flatten newlines; strip URLs, emoji,
/// mentions, phone numbers, dates and clock times; punctuation to spaces;
/// collapse runs of 3+ identical characters; drop stopwords and numeric
/// tokens.
///
/// # Example
///
/// ```
/// use chatmood::enrich::{BasicCleaner, TextCleaner};
///
/// let cleaner = BasicCleaner::for_language("es", &[]);
/// assert_eq!(
///     cleaner.clean("¡¡Holaaaa!! Nos vemos a las 5:30 en https://maps.app 😀"),
///     "hola vemos"
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct BasicCleaner {
    stopwords: HashSet<String>,
}

impl BasicCleaner {
    /// Creates a cleaner with exactly these stopwords (lowercased).
    pub fn new<I, S>(stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            stopwords: stopwords
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    /// Creates a cleaner with the built-in list for `language` (`es` or `en`)
    /// plus `custom` stopwords. Unknown languages get only the custom list.
    pub fn for_language(language: &str, custom: &[String]) -> Self {
        let builtin: &[&str] = match language.to_lowercase().as_str() {
            "es" | "spa" | "spanish" => SPANISH_STOPWORDS,
            "en" | "eng" | "english" => ENGLISH_STOPWORDS,
            other => {
                tracing::warn!(language = other, "No built-in stopword list for language");
                &[]
            }
        };
        Self::new(
            builtin
                .iter()
                .copied()
                .chain(custom.iter().map(String::as_str)),
        )
    }

    /// Returns `true` if `word` is a stopword.
    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }
}

/// Collapses every run of 3 or more identical characters to one.
fn collapse_repeats(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let mut run = 1;
        while chars.peek() == Some(&c) {
            chars.next();
            run += 1;
        }
        let keep = if run >= 3 { 1 } else { run };
        out.extend(std::iter::repeat_n(c, keep));
    }
    out
}

impl TextCleaner for BasicCleaner {
    fn clean(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }

        let text = text.to_lowercase().replace(['\n', '\r'], " ");
        let text = URL.replace_all(&text, "");
        let text: String = text.chars().filter(|c| !is_emoji_component(*c)).collect();
        let text = MENTION.replace_all(&text, "");
        let text = PHONE.replace_all(&text, "");
        let text = DATE.replace_all(&text, "");
        let text = TIME.replace_all(&text, "");

        let text: String = text
            .chars()
            .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
            .collect();
        let text = collapse_repeats(&text);

        text.split_whitespace()
            .filter(|token| !self.is_stopword(token))
            .filter(|token| !token.chars().all(|c| c.is_numeric()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
