//! Request preprocessing: normalize, expand, extract hard numbers.
//!
//! Deterministic and infallible. No external calls.

use crate::normalizer::{expand_abbreviations, normalize};
use crate::numbers::extract_numbers;
use midigent_core::ExtractedNumbers;

/// Result of preprocessing one request
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessed {
    pub original: String,
    /// Normalized and abbreviation-expanded text
    pub normalized: String,
    pub numbers: ExtractedNumbers,
}

impl Preprocessed {
    /// Text sent to the provider: the normalized request, followed by the
    /// hard numbers when any were found.
    pub fn enriched_prompt(&self) -> String {
        if self.numbers.has_values() {
            format!(
                "{}\n\n[Extracted parameters: {}]",
                self.normalized,
                self.numbers.summary()
            )
        } else {
            self.normalized.clone()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

pub fn preprocess(text: &str) -> Preprocessed {
    let normalized = expand_abbreviations(&normalize(text));
    let numbers = extract_numbers(&normalized);

    Preprocessed {
        original: text.to_string(),
        normalized,
        numbers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_lofi() {
        let pre = preprocess("  120 BPM   lofi beat ");
        assert_eq!(pre.normalized, "120 beats per minute lo-fi beat");
        assert_eq!(pre.numbers.tempo_bpm, Some(120));
        assert_eq!(pre.original, "  120 BPM   lofi beat ");
    }

    #[test]
    fn test_abbreviated_units_are_counted() {
        let pre = preprocess("dnb for 2 mins");
        assert_eq!(pre.numbers.duration_seconds, Some(120));
    }

    #[test]
    fn test_enriched_prompt() {
        let pre = preprocess("jazz at 90, 32 bars");
        assert_eq!(
            pre.enriched_prompt(),
            "jazz at 90, 32 bars\n\n[Extracted parameters: Tempo: 90 BPM (explicitly stated); Length: 32 bars]"
        );
    }

    #[test]
    fn test_enriched_prompt_without_numbers() {
        let pre = preprocess("dreamy ambient");
        assert_eq!(pre.enriched_prompt(), "dreamy ambient");
    }

    #[test]
    fn test_empty_request() {
        let pre = preprocess("");
        assert!(pre.is_empty());
        assert!(!pre.numbers.has_values());
    }
}
