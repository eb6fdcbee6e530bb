//! Emoji extraction.
//!
//! An emoji is a pictographic base codepoint together with whatever modifies
//! it: variation selectors, skin tones, tag sequences, and further
//! pictographs joined with ZWJ. Two regional indicators form a flag, and a
//! keycap (`1️⃣`) keeps its digit.

const ZWJ: char = '\u{200D}';
const KEYCAP: char = '\u{20E3}';

/// Returns `true` for codepoints that start an emoji.
pub fn is_pictographic(c: char) -> bool {
    matches!(c as u32,
        0x1F000..=0x1F02F
        | 0x1F0A0..=0x1F0FF
        | 0x1F300..=0x1F5FF
        | 0x1F600..=0x1F64F
        | 0x1F680..=0x1F6FF
        | 0x1F900..=0x1F9FF
        | 0x1FA70..=0x1FAFF
        | 0x2600..=0x26FF
        | 0x2700..=0x27BF
        | 0x231A..=0x231B
        | 0x23E9..=0x23F3
        | 0x23F8..=0x23FA
        | 0x2B1B..=0x2B1C
        | 0x2B50
        | 0x2B55
        | 0x3030
        | 0x303D
        | 0x3297
        | 0x3299
    )
}

fn is_regional_indicator(c: char) -> bool {
    matches!(c as u32, 0x1F1E6..=0x1F1FF)
}

/// Codepoints that only ever modify the preceding emoji.
fn is_modifier(c: char) -> bool {
    matches!(c as u32,
        0xFE0E..=0xFE0F      // text / emoji presentation
        | 0x1F3FB..=0x1F3FF  // skin tones
        | 0xE0020..=0xE007F  // tag sequences (subdivision flags)
    )
}

/// Returns `true` for any codepoint that is part of an emoji sequence.
pub fn is_emoji_component(c: char) -> bool {
    is_pictographic(c) || is_regional_indicator(c) || is_modifier(c) || c == ZWJ || c == KEYCAP
}

/// Length of a keycap sequence (`#`, `*` or a digit, optional VS16, U+20E3).
fn keycap_len(chars: &[char]) -> Option<usize> {
    let base = *chars.first()?;
    if !(base.is_ascii_digit() || base == '#' || base == '*') {
        return None;
    }
    match chars.get(1..3) {
        Some(['\u{FE0F}', KEYCAP]) => Some(3),
        _ if chars.get(1) == Some(&KEYCAP) => Some(2),
        _ => None,
    }
}

/// Extracts every emoji from `text`, in order, duplicates kept.
///
/// # Example
///
/// ```
/// use chatmood::enrich::extract_emojis;
///
/// assert_eq!(extract_emojis("jajaja 😂😂 te quiero ❤️"), vec!["😂", "😂", "❤️"]);
/// assert_eq!(extract_emojis("👨‍👩‍👧 en 🇨🇴"), vec!["👨‍👩‍👧", "🇨🇴"]);
/// assert!(extract_emojis("sin emojis").is_empty());
/// ```
pub fn extract_emojis(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut emojis = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(len) = keycap_len(&chars[i..]) {
            emojis.push(chars[i..i + len].iter().collect());
            i += len;
            continue;
        }

        if is_regional_indicator(c) {
            let len = if chars.get(i + 1).copied().is_some_and(is_regional_indicator) {
                2
            } else {
                1
            };
            emojis.push(chars[i..i + len].iter().collect());
            i += len;
            continue;
        }

        if !is_pictographic(c) {
            i += 1;
            continue;
        }

        let start = i;
        i += 1;
        loop {
            while chars.get(i).copied().is_some_and(is_modifier) {
                i += 1;
            }
            if chars.get(i) == Some(&ZWJ)
                && chars.get(i + 1).copied().is_some_and(is_pictographic)
            {
                i += 2;
                continue;
            }
            break;
        }
        emojis.push(chars[start..i].iter().collect());
    }

    emojis
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple() {
        assert_eq!(extract_emojis("hola 😀 mundo 🎉"), vec!["😀", "🎉"]);
    }

    #[test]
    fn test_duplicates_kept() {
        assert_eq!(extract_emojis("😂😂😂"), vec!["😂", "😂", "😂"]);
    }

    #[test]
    fn test_none() {
        assert!(extract_emojis("").is_empty());
        assert!(extract_emojis("¿Qué tal? ñandú 123 #hashtag").is_empty());
    }

    #[test]
    fn test_modifiers_attach() {
        assert_eq!(extract_emojis("👍🏽 ok"), vec!["👍🏽"]);
        assert_eq!(extract_emojis("❤️"), vec!["❤️"]);
        assert_eq!(extract_emojis("☀️☀️"), vec!["☀️", "☀️"]);
    }

    #[test]
    fn test_zwj_sequence() {
        assert_eq!(extract_emojis("👩‍💻"), vec!["👩‍💻"]);
        assert_eq!(extract_emojis("🏳️‍🌈!"), vec!["🏳️‍🌈"]);
    }

    #[test]
    fn test_dangling_zwj_not_joined() {
        assert_eq!(extract_emojis("😀\u{200D}a😀"), vec!["😀", "😀"]);
    }

    #[test]
    fn test_flags() {
        assert_eq!(extract_emojis("🇪🇸🇲🇽"), vec!["🇪🇸", "🇲🇽"]);
        assert_eq!(extract_emojis("🇪"), vec!["🇪"]);
    }

    #[test]
    fn test_keycap() {
        assert_eq!(extract_emojis("paso 1️⃣ y 2⃣"), vec!["1️⃣", "2⃣"]);
        assert!(extract_emojis("paso 1 y 2").is_empty());
    }

    #[test]
    fn test_body_untouched() {
        let body = String::from("hola 😀");
        let _ = extract_emojis(&body);
        assert_eq!(body, "hola 😀");
    }
}
