//! `WhatsApp` TXT export parser.
//!
//! `WhatsApp` exports vary by locale and platform. This parser auto-detects
//! the header layout by analyzing the first 20 non-empty lines of the file,
//! and the day/month order by looking at every header in the file.
//!
//! Supported layouts:
//! - Bracketed (iOS): `[1/15/24, 10:30:45 AM] Sender: Message`,
//!   `[15.01.24, 10:30:45] Sender: Message`
//! - Dashed (Android): `15/01/2024, 10:30 - Sender: Message`,
//!   `26.10.2025, 20:40 - Sender: Message`,
//!   `3/1/2022, 8:30 a. m. - Sender: Message`
//!
//! A header without `": "` after the dash/bracket is a group event (member
//! added, subject changed, ...) and is skipped. Lines that match no header
//! continue the previous message.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Captures, Regex};

use crate::Message;
use crate::config::WhatsAppConfig;
use crate::error::ChatmoodError;
use crate::message::SourceType;
use crate::parser::{ParseOutcome, Parser};

/// Time part shared by every layout: `10:30`, `10:30:45`, `10:30 PM`,
/// `8:30 a. m.` (with a regular or narrow no-break space).
const TIME: &str = r"\d{1,2}:\d{2}(?::\d{2})?(?:\s?[aApP]\.?\s?[mM]\.?)?";

const DATE: &str = r"\d{1,2}[./]\d{1,2}[./]\d{2,4}";

static BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\[({DATE}),?\s({TIME})\]\s(.*)$")).unwrap()
});

static DASHED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^({DATE}),?\s({TIME})\s-\s(.*)$")).unwrap());

/// Characters WhatsApp sprinkles at the start of lines (BOM, LRM, RLM).
const INVISIBLE_PREFIX: &[char] = &['\u{feff}', '\u{200e}', '\u{200f}'];

/// Number of non-empty lines inspected for layout detection.
const DETECTION_SAMPLE: usize = 20;

/// Parser for WhatsApp TXT exports.
///
/// # Example
///
/// ```rust
/// use chatmood::parser::Parser;
/// use chatmood::parsers::WhatsAppParser;
///
/// let parser = WhatsAppParser::new();
/// let outcome = parser.parse_str(
///     "3/1/2022, 8:30 a. m. - Ana: Buenos días\n3/1/2022, 8:31 a. m. - Luis: Hola!",
/// )?;
/// assert_eq!(outcome.messages.len(), 2);
/// assert_eq!(outcome.messages[1].raw_sender, "Luis");
/// # Ok::<(), chatmood::ChatmoodError>(())
/// ```
pub struct WhatsAppParser {
    config: WhatsAppConfig,
}

impl WhatsAppParser {
    /// Creates a new parser with default configuration.
    pub fn new() -> Self {
        Self {
            config: WhatsAppConfig::default(),
        }
    }

    /// Creates a parser with custom configuration.
    pub fn with_config(config: WhatsAppConfig) -> Self {
        Self { config }
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &WhatsAppConfig {
        &self.config
    }
}

impl Default for WhatsAppParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Header shapes found in the wild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderLayout {
    /// `[date, time] rest` (iOS)
    Bracketed,
    /// `date, time - rest` (Android)
    Dashed,
}

impl HeaderLayout {
    fn regex(self) -> &'static Regex {
        match self {
            HeaderLayout::Bracketed => &BRACKETED,
            HeaderLayout::Dashed => &DASHED,
        }
    }
}

/// Whether `1/2/2024` means 1 February or January 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateOrder {
    DayFirst,
    MonthFirst,
}

/// Auto-detect the header layout by scoring sample lines.
fn detect_layout(lines: &[&str]) -> Option<HeaderLayout> {
    let layouts = [HeaderLayout::Bracketed, HeaderLayout::Dashed];
    let mut scores = [0usize; 2];

    for line in lines {
        for (i, layout) in layouts.iter().enumerate() {
            if layout.regex().is_match(line) {
                scores[i] += 1;
            }
        }
    }

    let max_score = *scores.iter().max()?;
    if max_score == 0 {
        return None;
    }

    let winner_idx = scores.iter().position(|&s| s == max_score)?;
    Some(layouts[winner_idx])
}

/// Decide the day/month order from the headers of the whole file.
///
/// A first component above 12 settles it as day-first, a second component
/// above 12 as month-first. Files where every date is ambiguous fall back to
/// month-first only for the US iOS shape (slashes, brackets, AM/PM).
fn detect_date_order(headers: &[(&str, &str)], layout: HeaderLayout) -> DateOrder {
    for (date, _) in headers {
        let mut parts = date.split(['/', '.']).map(|p| p.parse::<u32>().unwrap_or(0));
        let first = parts.next().unwrap_or(0);
        let second = parts.next().unwrap_or(0);
        if first > 12 {
            return DateOrder::DayFirst;
        }
        if second > 12 {
            return DateOrder::MonthFirst;
        }
    }

    let us_like = headers.first().is_some_and(|(date, time)| {
        date.contains('/') && layout == HeaderLayout::Bracketed && has_meridiem(time)
    });
    if us_like {
        DateOrder::MonthFirst
    } else {
        DateOrder::DayFirst
    }
}

fn has_meridiem(time: &str) -> bool {
    time.chars().any(|c| matches!(c, 'a' | 'A' | 'p' | 'P'))
}

/// Parse a header timestamp. `a. m.` / `p. m.` / `AM` / `PM` are all accepted.
fn parse_timestamp(date_str: &str, time_str: &str, order: DateOrder) -> Option<NaiveDateTime> {
    let date_norm = date_str.replace('.', "/");
    let year_len = date_norm.rsplit('/').next().map_or(0, str::len);
    let date_format = match (order, year_len) {
        (DateOrder::DayFirst, 4) => "%d/%m/%Y",
        (DateOrder::DayFirst, _) => "%d/%m/%y",
        (DateOrder::MonthFirst, 4) => "%m/%d/%Y",
        (DateOrder::MonthFirst, _) => "%m/%d/%y",
    };
    let date = NaiveDate::parse_from_str(&date_norm, date_format).ok()?;

    let time_norm: String = time_str
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect::<String>()
        .to_uppercase();
    let time_formats: &[&str] = if has_meridiem(&time_norm) {
        &["%I:%M:%S%p", "%I:%M%p"]
    } else {
        &["%H:%M:%S", "%H:%M"]
    };
    let time = time_formats
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(&time_norm, f).ok())?;

    Some(NaiveDateTime::new(date, time))
}

/// Full-body notices WhatsApp writes on behalf of a participant.
const SYSTEM_NOTICES: &[&str] = &[
    "messages and calls are end-to-end encrypted",
    "los mensajes y las llamadas están cifrados de extremo a extremo",
    "this message was deleted",
    "you deleted this message",
    "se eliminó este mensaje",
    "eliminaste este mensaje",
    "waiting for this message",
    "esperando el mensaje",
];

/// Check if a body is a notice rather than something the sender wrote.
fn is_system_notice(body: &str) -> bool {
    let lower = body.trim().to_lowercase();
    SYSTEM_NOTICES.iter().any(|notice| lower.starts_with(notice))
}

const ATTACHMENT_EXACT: &[&str] = &[
    "<media omitted>",
    "<multimedia omitido>",
    "<media omitido>",
    "image omitted",
    "video omitted",
    "audio omitted",
    "sticker omitted",
    "gif omitted",
    "document omitted",
    "imagen omitida",
    "video omitido",
    "audio omitido",
    "sticker omitido",
    "gif omitido",
    "documento omitido",
];

/// Check if a body is an attachment placeholder.
fn is_attachment_placeholder(body: &str) -> bool {
    let lower = body
        .trim()
        .trim_start_matches(INVISIBLE_PREFIX)
        .to_lowercase();
    ATTACHMENT_EXACT.contains(&lower.as_str())
        || lower.starts_with("<attached:")
        || lower.starts_with("<adjunto:")
        || lower.ends_with("(file attached)")
        || lower.ends_with("(archivo adjunto)")
}

/// What the lines following a header belong to.
enum Current {
    /// Nothing yet (before the first header).
    Nothing,
    /// The message at this index of the outcome.
    Message(usize),
    /// A unit that was dropped or skipped; its lines go with it.
    Discarded,
}

impl WhatsAppParser {
    /// Parses content from a string (internal implementation).
    fn parse_content(&self, content: &str) -> Result<ParseOutcome, ChatmoodError> {
        let lines: Vec<&str> = content
            .lines()
            .map(|l| l.trim_start_matches(INVISIBLE_PREFIX))
            .collect();

        let sample: Vec<&str> = lines
            .iter()
            .copied()
            .filter(|l| !l.trim().is_empty())
            .take(DETECTION_SAMPLE)
            .collect();
        if sample.is_empty() {
            return Ok(ParseOutcome::default());
        }

        // Step 1: Auto-detect layout from the sample
        let layout = detect_layout(&sample).ok_or_else(|| {
            ChatmoodError::invalid_format(
                "WhatsApp",
                "Could not detect WhatsApp export format. \
                 Make sure the file is a valid WhatsApp chat export.",
            )
        })?;
        let regex = layout.regex();

        // Step 2: Day/month order from every header in the file
        let headers: Vec<(&str, &str)> = lines
            .iter()
            .filter_map(|l| regex.captures(l))
            .map(|caps| (group(&caps, 1), group(&caps, 2)))
            .collect();
        let order = detect_date_order(&headers, layout);
        tracing::debug!(?layout, ?order, headers = headers.len(), "Detected WhatsApp layout");

        // Step 3: Parse all lines
        let mut outcome = ParseOutcome::default();
        let mut current = Current::Nothing;

        for (idx, line) in lines.iter().enumerate() {
            let line_no = idx + 1;

            let Some(caps) = regex.captures(line) else {
                match current {
                    Current::Message(i) => {
                        let body = &mut outcome.messages[i].body;
                        body.push('\n');
                        body.push_str(line);
                    }
                    Current::Discarded => {}
                    Current::Nothing if line.trim().is_empty() => {}
                    Current::Nothing => {
                        outcome.warn(line_no, "text before the first message header");
                        current = Current::Discarded;
                    }
                }
                continue;
            };

            if let Current::Message(i) = current {
                trim_trailing_blank_lines(&mut outcome.messages[i].body);
            }
            current = Current::Discarded;

            let date_str = group(&caps, 1);
            let time_str = group(&caps, 2);
            let rest = group(&caps, 3);

            let Some(timestamp) = parse_timestamp(date_str, time_str, order) else {
                outcome.warn(
                    line_no,
                    format!("unparseable timestamp '{date_str}, {time_str}'"),
                );
                continue;
            };

            // "Sender: body"; a header without it is a group event
            let Some((sender, body)) = rest.split_once(": ") else {
                outcome.skipped_system += 1;
                continue;
            };
            let sender = sender.trim();

            if sender.is_empty() {
                outcome.warn(line_no, "empty sender");
                continue;
            }

            if self.config.skip_system_messages && is_system_notice(body) {
                outcome.skipped_system += 1;
                continue;
            }

            let message = Message::new(SourceType::WhatsAppText, 0, timestamp, sender, body)
                .with_attachment(is_attachment_placeholder(body));
            outcome.push(message);
            current = Current::Message(outcome.messages.len() - 1);
        }

        if let Current::Message(i) = current {
            trim_trailing_blank_lines(&mut outcome.messages[i].body);
        }

        Ok(outcome)
    }
}

/// Drops blank lines at the end of a multi-line body; inner blank lines stay.
fn trim_trailing_blank_lines(body: &mut String) {
    while let Some(pos) = body.rfind('\n') {
        if !body[pos + 1..].trim().is_empty() {
            break;
        }
        body.truncate(pos);
    }
}

fn group<'a>(caps: &Captures<'a>, i: usize) -> &'a str {
    caps.get(i).map_or("", |m| m.as_str())
}

impl Parser for WhatsAppParser {
    fn name(&self) -> &'static str {
        "WhatsApp"
    }

    fn source_type(&self) -> SourceType {
        SourceType::WhatsAppText
    }

    fn parse_str(&self, content: &str) -> Result<ParseOutcome, ChatmoodError> {
        self.parse_content(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn parse(content: &str) -> ParseOutcome {
        WhatsAppParser::new().parse_str(content).unwrap()
    }

    #[test]
    fn test_parser_name() {
        let parser = WhatsAppParser::new();
        assert_eq!(Parser::name(&parser), "WhatsApp");
        assert_eq!(parser.source_type(), SourceType::WhatsAppText);
    }

    #[test]
    fn test_detect_layout_bracketed() {
        let lines = vec![
            "[1/15/24, 10:30:45 AM] Alice: Hello",
            "[1/15/24, 10:31:00 AM] Bob: Hi there",
        ];
        assert_eq!(detect_layout(&lines), Some(HeaderLayout::Bracketed));

        let lines = vec!["[15.01.24, 10:30:45] Alice: Hello"];
        assert_eq!(detect_layout(&lines), Some(HeaderLayout::Bracketed));
    }

    #[test]
    fn test_detect_layout_dashed() {
        let lines = vec![
            "26.10.2025, 20:40 - Alice: Hello",
            "15/01/2024, 10:31 - Bob: Hi there",
            "3/1/2022, 8:30 a. m. - Ana: Hola",
        ];
        assert_eq!(detect_layout(&lines), Some(HeaderLayout::Dashed));
    }

    #[test]
    fn test_detect_layout_none() {
        assert_eq!(detect_layout(&["hello", "world"]), None);
    }

    #[test]
    fn test_date_order() {
        let headers = [("3/1/2022", "8:30 a. m."), ("13/1/2022", "9:00 p. m.")];
        assert_eq!(
            detect_date_order(&headers, HeaderLayout::Dashed),
            DateOrder::DayFirst
        );

        let headers = [("1/15/24", "10:30 AM")];
        assert_eq!(
            detect_date_order(&headers, HeaderLayout::Dashed),
            DateOrder::MonthFirst
        );

        let headers = [("1/2/24", "10:30:45 AM")];
        assert_eq!(
            detect_date_order(&headers, HeaderLayout::Bracketed),
            DateOrder::MonthFirst
        );

        let headers = [("1/2/2024", "10:30")];
        assert_eq!(
            detect_date_order(&headers, HeaderLayout::Dashed),
            DateOrder::DayFirst
        );
    }

    #[test]
    fn test_parse_timestamp_spanish_meridiem() {
        let ts = parse_timestamp("3/1/2022", "8:30 a. m.", DateOrder::DayFirst).unwrap();
        assert_eq!((ts.day(), ts.month(), ts.year()), (3, 1, 2022));
        assert_eq!((ts.hour(), ts.minute()), (8, 30));

        let ts = parse_timestamp("3/1/2022", "10:57 p. m.", DateOrder::DayFirst).unwrap();
        assert_eq!(ts.hour(), 22);

        let ts = parse_timestamp("3/1/2022", "12:05\u{202f}a.\u{a0}m.", DateOrder::DayFirst)
            .unwrap();
        assert_eq!(ts.hour(), 0);
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert!(parse_timestamp("1/15/24", "10:30:45 AM", DateOrder::MonthFirst).is_some());
        assert!(parse_timestamp("15.01.24", "10:30:45", DateOrder::DayFirst).is_some());
        assert!(parse_timestamp("26.10.2025", "20:40", DateOrder::DayFirst).is_some());
        assert!(parse_timestamp("31/02/2024", "20:40", DateOrder::DayFirst).is_none());
        assert!(parse_timestamp("01/01/2024", "25:40", DateOrder::DayFirst).is_none());
    }

    #[test]
    fn test_multiline_body() {
        let outcome = parse(
            "15/01/2024, 10:30 - Ana: first line\nsecond line\n\nthird line\n15/01/2024, 10:31 - Luis: ok",
        );
        assert_eq!(outcome.messages.len(), 2);
        assert_eq!(outcome.messages[0].body, "first line\nsecond line\n\nthird line");
        assert_eq!(outcome.messages[1].body, "ok");
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_trailing_blank_lines_trimmed() {
        let outcome = parse(
            "15/01/2024, 10:30 - Ana: uno\n\ndos\n\n  \n15/01/2024, 10:31 - Luis: tres\n\n",
        );
        assert_eq!(outcome.messages[0].body, "uno\n\ndos");
        assert_eq!(outcome.messages[1].body, "tres");

        let mut body = String::from("solo\n \n");
        trim_trailing_blank_lines(&mut body);
        assert_eq!(body, "solo");
    }

    #[test]
    fn test_group_event_skipped() {
        let outcome = parse(
            "15/01/2024, 10:30 - Ana created group \"Familia\"\n15/01/2024, 10:31 - Luis: hola",
        );
        assert_eq!(outcome.messages.len(), 1);
        assert_eq!(outcome.skipped_system, 1);
        assert_eq!(outcome.messages[0].seq, 0);
    }

    #[test]
    fn test_system_notice_skipped() {
        let outcome = parse(
            "15/01/2024, 10:30 - Ana: Se eliminó este mensaje.\n15/01/2024, 10:31 - Luis: hola",
        );
        assert_eq!(outcome.messages.len(), 1);
        assert_eq!(outcome.skipped_system, 1);

        let keep =
            WhatsAppParser::with_config(WhatsAppConfig::new().with_skip_system_messages(false));
        let outcome = keep
            .parse_str("15/01/2024, 10:30 - Ana: Se eliminó este mensaje.")
            .unwrap();
        assert_eq!(outcome.messages.len(), 1);
    }

    #[test]
    fn test_ordinary_words_are_not_notices() {
        assert!(!is_system_notice("I left my keys at home"));
        assert!(!is_system_notice("added sugar"));
        assert!(is_system_notice("Messages and calls are end-to-end encrypted. No one..."));
    }

    #[test]
    fn test_malformed_header_drops_its_continuation() {
        let outcome = parse(
            "15/01/2024, 10:30 - Ana: hola\n31/02/2024, 10:31 - Luis: broken\nstill broken\n15/01/2024, 10:32 - Ana: adios",
        );
        assert_eq!(outcome.messages.len(), 2);
        assert_eq!(outcome.messages[0].body, "hola");
        assert_eq!(outcome.messages[1].body, "adios");
        assert_eq!(outcome.messages[1].seq, 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].unit, 2);
    }

    #[test]
    fn test_orphan_lines_warned_once() {
        let outcome = parse("intro line\nmore intro\n15/01/2024, 10:30 - Ana: hola");
        assert_eq!(outcome.messages.len(), 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].unit, 1);
    }

    #[test]
    fn test_attachment_placeholder() {
        let outcome = parse(
            "[1/15/24, 10:35:00 AM] Alice: \u{200e}image omitted\n[1/15/24, 10:36:00 AM] Bob: <attached: 00000012-PHOTO.jpg>\n[1/15/24, 10:37:00 AM] Bob: nice",
        );
        assert_eq!(outcome.messages.len(), 3);
        assert!(outcome.messages[0].attachment);
        assert!(outcome.messages[1].attachment);
        assert!(!outcome.messages[2].attachment);
        assert_eq!(outcome.messages[1].body, "<attached: 00000012-PHOTO.jpg>");
    }

    #[test]
    fn test_spanish_android_export() {
        let outcome = parse(
            "3/1/2022, 8:30 a. m. - Ana: Buenos días ☀️\n3/1/2022, 8:31 a. m. - Luis: <Multimedia omitido>\n13/1/2022, 10:57 p. m. - Ana: Te extraño 😢",
        );
        assert_eq!(outcome.messages.len(), 3);
        assert!(outcome.messages[1].attachment);
        let last = &outcome.messages[2];
        assert_eq!(last.timestamp.day(), 13);
        assert_eq!(last.timestamp.hour(), 22);
        assert_eq!(last.source_type, SourceType::WhatsAppText);
    }

    #[test]
    fn test_invalid_file() {
        let err = WhatsAppParser::new()
            .parse_str("this is not\na whatsapp export")
            .unwrap_err();
        assert!(err.is_invalid_format());
    }

    #[test]
    fn test_empty_file() {
        let outcome = parse("");
        assert!(outcome.is_empty());
        let outcome = parse("\n\n  \n");
        assert!(outcome.is_empty());
    }
}
