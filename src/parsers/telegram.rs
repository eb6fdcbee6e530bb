//! Telegram Desktop HTML export parser.
//!
//! Telegram Desktop writes chats as `messages.html` pages:
//!
//! ```html
//! <div class="history">
//!   <div class="message service" id="message-1">...</div>
//!   <div class="message default clearfix" id="message2">
//!     <div class="body">
//!       <div class="pull_right date details" title="03.01.2022 08:30:00 UTC-05:00">08:30</div>
//!       <div class="from_name">Ana</div>
//!       <div class="text">Hola<br>mundo</div>
//!     </div>
//!   </div>
//!   <div class="message default clearfix joined" id="message3">...</div>
//! </div>
//! ```
//!
//! `joined` messages omit `from_name` and belong to the previous sender.
//! Forwarded messages nest a `div.forwarded.body` with its own `from_name`
//! (the original author plus a date span); that one is not the sender.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use scraper::{ElementRef, Html, Node, Selector};

use crate::Message;
use crate::config::TelegramConfig;
use crate::error::ChatmoodError;
use crate::message::SourceType;
use crate::parser::{ParseOutcome, Parser};

static HISTORY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.history").unwrap());
static MESSAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.message").unwrap());
static DATE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.date").unwrap());
static TEXT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.text").unwrap());
static MEDIA: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.media_wrap").unwrap());

/// Layout of the `title` attribute before the ` UTC±hh:mm` suffix.
const TITLE_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Parser for Telegram Desktop HTML exports.
///
/// # Example
///
/// ```rust
/// use chatmood::parser::Parser;
/// use chatmood::parsers::TelegramParser;
///
/// let html = r#"<div class="history">
///   <div class="message default clearfix" id="message1"><div class="body">
///     <div class="pull_right date details" title="03.01.2022 08:30:00 UTC-05:00">08:30</div>
///     <div class="from_name">Ana</div>
///     <div class="text">Hola</div>
///   </div></div>
/// </div>"#;
///
/// let outcome = TelegramParser::new().parse_str(html)?;
/// assert_eq!(outcome.messages[0].raw_sender, "Ana");
/// # Ok::<(), chatmood::ChatmoodError>(())
/// ```
pub struct TelegramParser {
    config: TelegramConfig,
}

impl TelegramParser {
    /// Creates a new parser with default configuration.
    pub fn new() -> Self {
        Self {
            config: TelegramConfig::default(),
        }
    }

    /// Creates a parser with custom configuration.
    pub fn with_config(config: TelegramConfig) -> Self {
        Self { config }
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }
}

impl Default for TelegramParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses the `title` of a date node, e.g. `03.01.2022 08:30:00 UTC-05:00`.
///
/// The offset is dropped; timestamps stay in the exporter's local time.
fn parse_title_date(title: &str) -> Option<NaiveDateTime> {
    let local = title.split(" UTC").next()?.trim();
    NaiveDateTime::parse_from_str(local, TITLE_FORMAT).ok()
}

/// Text of an element with `<br>` and block boundaries turned into newlines.
///
/// Lines are trimmed and blank lines dropped.
fn element_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => raw.push_str(text),
            Node::Element(e) if matches!(e.name(), "br" | "div" | "p") => raw.push('\n'),
            _ => {}
        }
    }

    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

fn has_class(element: &ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

/// The sender of a message node: the `from_name` directly under its own
/// `div.body`, text nodes only.
fn sender_of(node: ElementRef<'_>) -> Option<String> {
    let body = child_elements(node).find(|e| has_class(e, "body"))?;
    let from_name = child_elements(body).find(|e| has_class(e, "from_name"))?;

    let mut name = String::new();
    for child in from_name.children() {
        if let Some(text) = child.value().as_text() {
            name.push_str(text);
        }
    }
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

impl TelegramParser {
    fn parse_content(&self, content: &str) -> Result<ParseOutcome, ChatmoodError> {
        if content.trim().is_empty() {
            return Ok(ParseOutcome::default());
        }
        let document = Html::parse_document(content);

        let has_history = document.select(&HISTORY).next().is_some();
        let nodes: Vec<ElementRef<'_>> = document.select(&MESSAGE).collect();
        if !has_history && nodes.is_empty() {
            return Err(ChatmoodError::invalid_format(
                "Telegram",
                "no message history found. \
                 Make sure the file is a Telegram Desktop HTML export.",
            ));
        }

        let mut outcome = ParseOutcome::default();
        let mut last_sender: Option<String> = None;

        for (idx, node) in nodes.into_iter().enumerate() {
            let unit = idx + 1;
            let classes: Vec<&str> = node.value().classes().collect();

            if classes.contains(&"service") {
                outcome.skipped_system += 1;
                continue;
            }

            // A sender seen here applies to the following joined messages
            // even if this node itself turns out to be malformed.
            let own_sender = sender_of(node);
            if let Some(name) = &own_sender {
                last_sender = Some(name.clone());
            }

            let sender = match (own_sender, classes.contains(&"joined")) {
                (Some(name), _) => name,
                (None, true) => last_sender
                    .clone()
                    .unwrap_or_else(|| self.config.unknown_sender.clone()),
                (None, false) => self.config.unknown_sender.clone(),
            };

            let Some(title) = node
                .select(&DATE)
                .next()
                .and_then(|d| d.value().attr("title"))
            else {
                outcome.warn(unit, "message without a date");
                continue;
            };
            let Some(timestamp) = parse_title_date(title) else {
                outcome.warn(unit, format!("unparseable date '{title}'"));
                continue;
            };

            let media = node.select(&MEDIA).next();
            let attachment = media.is_some();
            let body = node
                .select(&TEXT)
                .next()
                .map(element_text)
                .filter(|text| !text.is_empty())
                .or_else(|| media.map(element_text))
                .unwrap_or_default();

            if body.is_empty() && !attachment {
                outcome.warn(unit, "message without text or media");
                continue;
            }

            outcome.push(
                Message::new(SourceType::TelegramHtml, 0, timestamp, sender, body)
                    .with_attachment(attachment),
            );
        }

        Ok(outcome)
    }
}

impl Parser for TelegramParser {
    fn name(&self) -> &'static str {
        "Telegram"
    }

    fn source_type(&self) -> SourceType {
        SourceType::TelegramHtml
    }

    fn parse_str(&self, content: &str) -> Result<ParseOutcome, ChatmoodError> {
        self.parse_content(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn message(id: u32, extra_class: &str, inner: &str) -> String {
        format!(
            r#"<div class="message default clearfix{extra_class}" id="message{id}"><div class="body">{inner}</div></div>"#
        )
    }

    fn date(title: &str) -> String {
        format!(r#"<div class="pull_right date details" title="{title}">08:30</div>"#)
    }

    fn page(messages: &[String]) -> String {
        format!(
            r#"<html><body><div class="page_body chat_page"><div class="history">{}</div></div></body></html>"#,
            messages.concat()
        )
    }

    fn parse(html: &str) -> ParseOutcome {
        TelegramParser::new().parse_str(html).unwrap()
    }

    #[test]
    fn test_parser_name() {
        let parser = TelegramParser::new();
        assert_eq!(Parser::name(&parser), "Telegram");
        assert_eq!(parser.source_type(), SourceType::TelegramHtml);
    }

    #[test]
    fn test_parse_title_date() {
        let ts = parse_title_date("03.01.2022 20:15:42 UTC-05:00").unwrap();
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (20, 15, 42));
        assert!(parse_title_date("03.01.2022 20:15:42").is_some());
        assert!(parse_title_date("yesterday").is_none());
    }

    #[test]
    fn test_basic_messages() {
        let html = page(&[
            r#"<div class="message service" id="message-1"><div class="body details">3 January 2022</div></div>"#.to_string(),
            message(
                2,
                "",
                &format!(
                    r#"{}<div class="from_name">Ana</div><div class="text">Hola<br>¿cómo estás?</div>"#,
                    date("03.01.2022 08:30:00 UTC-05:00")
                ),
            ),
            message(
                3,
                "",
                &format!(
                    r#"{}<div class="from_name"> Luis </div><div class="text">Bien &amp; tú</div>"#,
                    date("03.01.2022 08:31:00 UTC-05:00")
                ),
            ),
        ]);
        let outcome = parse(&html);

        assert_eq!(outcome.skipped_system, 1);
        assert_eq!(outcome.messages.len(), 2);
        assert_eq!(outcome.messages[0].raw_sender, "Ana");
        assert_eq!(outcome.messages[0].body, "Hola\n¿cómo estás?");
        assert_eq!(outcome.messages[1].raw_sender, "Luis");
        assert_eq!(outcome.messages[1].body, "Bien & tú");
        assert_eq!(outcome.messages[1].seq, 1);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_joined_inherits_sender() {
        let html = page(&[
            message(
                1,
                "",
                &format!(
                    r#"{}<div class="from_name">Ana</div><div class="text">uno</div>"#,
                    date("03.01.2022 08:30:00 UTC-05:00")
                ),
            ),
            message(
                2,
                " joined",
                &format!(
                    r#"{}<div class="text">dos</div>"#,
                    date("03.01.2022 08:30:10 UTC-05:00")
                ),
            ),
        ]);
        let outcome = parse(&html);
        assert_eq!(outcome.messages.len(), 2);
        assert_eq!(outcome.messages[1].raw_sender, "Ana");
    }

    #[test]
    fn test_forwarded_author_is_not_the_sender() {
        let forwarded = |text: &str| {
            format!(
                r#"<div class="forwarded body"><div class="from_name">Pedro<span class="date details" title="01.01.2022 10:00:00"> 01.01.2022 10:00:00</span></div><div class="text">{text}</div></div>"#
            )
        };
        let html = page(&[
            message(
                1,
                "",
                &format!(
                    r#"{}<div class="from_name">Ana</div>{}"#,
                    date("03.01.2022 08:30:00 UTC-05:00"),
                    forwarded("mira esto")
                ),
            ),
            message(
                2,
                " joined",
                &format!("{}{}", date("03.01.2022 08:30:10 UTC-05:00"), forwarded("y esto")),
            ),
            message(
                3,
                " joined",
                &format!(
                    r#"{}<div class="text">qué opinas</div>"#,
                    date("03.01.2022 08:30:20 UTC-05:00")
                ),
            ),
        ]);
        let outcome = parse(&html);

        let senders: Vec<&str> = outcome.messages.iter().map(|m| m.raw_sender.as_str()).collect();
        assert_eq!(senders, vec!["Ana", "Ana", "Ana"]);
        assert_eq!(outcome.messages[0].body, "mira esto");
        assert_eq!(outcome.messages[0].timestamp.minute(), 30);
    }

    #[test]
    fn test_joined_without_predecessor_is_unknown() {
        let html = page(&[message(
            1,
            " joined",
            &format!(
                r#"{}<div class="text">huérfano</div>"#,
                date("03.01.2022 08:30:10 UTC-05:00")
            ),
        )]);
        let outcome = parse(&html);
        assert_eq!(outcome.messages[0].raw_sender, "Unknown");

        let parser = TelegramParser::with_config(TelegramConfig::new().with_unknown_sender("?"));
        let outcome = parser.parse_str(&html).unwrap();
        assert_eq!(outcome.messages[0].raw_sender, "?");
    }

    #[test]
    fn test_bad_date_is_warning_and_keeps_sender() {
        let html = page(&[
            message(
                1,
                "",
                &format!(
                    r#"{}<div class="from_name">Ana</div><div class="text">uno</div>"#,
                    date("not a date")
                ),
            ),
            message(
                2,
                " joined",
                &format!(
                    r#"{}<div class="text">dos</div>"#,
                    date("03.01.2022 08:30:10 UTC-05:00")
                ),
            ),
        ]);
        let outcome = parse(&html);
        assert_eq!(outcome.messages.len(), 1);
        assert_eq!(outcome.messages[0].raw_sender, "Ana");
        assert_eq!(outcome.messages[0].body, "dos");
        assert_eq!(outcome.messages[0].seq, 0);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].unit, 1);
    }

    #[test]
    fn test_media_is_attachment() {
        let html = page(&[message(
            1,
            "",
            &format!(
                r#"{}<div class="from_name">Ana</div><div class="media_wrap clearfix"><a class="photo_wrap" href="photos/p.jpg"></a></div>"#,
                date("03.01.2022 08:30:00 UTC-05:00")
            ),
        )]);
        let outcome = parse(&html);
        assert_eq!(outcome.messages.len(), 1);
        assert!(outcome.messages[0].attachment);
        assert!(outcome.messages[0].body.is_empty());
    }

    #[test]
    fn test_document_media_keeps_description() {
        let html = page(&[message(
            1,
            "",
            &format!(
                r#"{}<div class="from_name">Ana</div><div class="media_wrap clearfix"><div class="media clearfix pull_left media_file"><div class="body"><div class="title bold">informe.pdf</div><div class="status details">1.2 MB</div></div></div></div>"#,
                date("03.01.2022 08:30:00 UTC-05:00")
            ),
        )]);
        let outcome = parse(&html);
        assert!(outcome.messages[0].attachment);
        assert_eq!(outcome.messages[0].body, "informe.pdf\n1.2 MB");
    }

    #[test]
    fn test_empty_message_is_warning() {
        let html = page(&[message(
            1,
            "",
            &format!(
                r#"{}<div class="from_name">Ana</div>"#,
                date("03.01.2022 08:30:00 UTC-05:00")
            ),
        )]);
        let outcome = parse(&html);
        assert!(outcome.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_not_an_export() {
        let err = TelegramParser::new()
            .parse_str("<html><body><p>hello</p></body></html>")
            .unwrap_err();
        assert!(err.is_invalid_format());
    }

    #[test]
    fn test_empty_history() {
        let outcome = parse(&page(&[]));
        assert!(outcome.is_empty());
        assert!(outcome.warnings.is_empty());
        assert!(parse("  \n").is_empty());
    }
}
