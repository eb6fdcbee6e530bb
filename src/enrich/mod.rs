//! Per-record enrichment: sender normalization, emoji extraction and text
//! cleaning.
//!
//! All three are pure and run before classification.

mod clean;
mod emoji;
mod sender;

pub use clean::{BasicCleaner, TextCleaner};
pub use emoji::{extract_emojis, is_emoji_component, is_pictographic};
pub use sender::{SenderMap, normalize};

use crate::message::{EnrichedMessage, Message};

/// Normalizes the sender, extracts emoji and cleans the body of `message`.
///
/// The body itself is left untouched.
pub fn enrich(
    mut message: Message,
    senders: &SenderMap,
    cleaner: &dyn TextCleaner,
) -> EnrichedMessage {
    message.sender = senders.normalize(&message.raw_sender).to_string();
    let emojis = extract_emojis(&message.body);
    let clean_text = cleaner.clean(&message.body);
    EnrichedMessage::new(message, emojis, clean_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SourceType;
    use chrono::NaiveDate;

    #[test]
    fn test_enrich() {
        let ts = NaiveDate::from_ymd_opt(2022, 1, 3)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        let message = Message::new(
            SourceType::WhatsAppText,
            0,
            ts,
            "Juan P.",
            "Te extraño mucho 😢😢",
        );
        let senders = SenderMap::new("Otro").with_entry("Juan P.", "Juan");
        let cleaner = BasicCleaner::for_language("es", &[]);

        let enriched = enrich(message, &senders, &cleaner);
        assert_eq!(enriched.message.sender, "Juan");
        assert_eq!(enriched.message.raw_sender, "Juan P.");
        assert_eq!(enriched.message.body, "Te extraño mucho 😢😢");
        assert_eq!(enriched.emojis, vec!["😢", "😢"]);
        assert_eq!(enriched.clean_text, "extraño mucho");
        assert_eq!(enriched.token_count, 2);
    }
}
