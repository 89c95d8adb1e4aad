//! Filter for recognizer output that is not real speech.
//!
//! Speech recognizers emit bracketed annotations for silence and music and
//! hallucinate stock phrases on quiet input. Such chunks never reach the
//! buffer.

use std::sync::LazyLock;

use regex::Regex;

static ANNOTATION: LazyLock<Regex> = LazyLock::new(|| pattern(r"^(\[.*\]|\(.*\))$"));
static HALLUCINATION: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"^(thanks for watching|thank you|subscribe)"));
static PUNCTUATION_ONLY: LazyLock<Regex> = LazyLock::new(|| pattern(r"^[\W_]+$"));
static WORD: LazyLock<Regex> = LazyLock::new(|| pattern(r"\b[a-zA-Z]{2,}\b"));

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("static noise pattern")
}

/// Minimum length of a meaningful chunk, in characters.
const MIN_CHARS: usize = 3;

/// Whether `text` should be dropped before ingestion.
pub fn is_noise(text: &str) -> bool {
    let t = text.trim().to_lowercase();
    if t.chars().count() < MIN_CHARS {
        return true;
    }
    if ANNOTATION.is_match(&t) || HALLUCINATION.is_match(&t) || PUNCTUATION_ONLY.is_match(&t) {
        return true;
    }
    !WORD.is_match(&t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_empty_are_noise() {
        assert!(is_noise(""));
        assert!(is_noise("   "));
        assert!(is_noise("ok"));
    }

    #[test]
    fn annotations_are_noise() {
        assert!(is_noise("[Music]"));
        assert!(is_noise("(silence)"));
        assert!(is_noise("  [BLANK_AUDIO]  "));
    }

    #[test]
    fn stock_phrases_are_noise() {
        assert!(is_noise("Thanks for watching!"));
        assert!(is_noise("Thank you."));
        assert!(is_noise("Subscribe to the channel"));
    }

    #[test]
    fn punctuation_and_digits_are_noise() {
        assert!(is_noise("..."));
        assert!(is_noise("?!?"));
        assert!(is_noise("1 2 3 4"));
    }

    #[test]
    fn lecture_speech_passes() {
        assert!(!is_noise("Photosynthesis converts light into chemical energy"));
        assert!(!is_noise("so x equals 4"));
        assert!(!is_noise("Look at this graph"));
    }
}
