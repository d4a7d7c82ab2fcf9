//! Text normalization for intent extraction.
//!
//! Prepares raw request text before any matching:
//! - Unicode NFC, typographic punctuation folded to ASCII
//! - Control characters dropped, whitespace collapsed
//! - Music abbreviations expanded ("bpm", "lofi", "dnb", "synth", ...)
//!
//! Case is preserved; matchers lowercase on their own.

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();

    /// Abbreviation patterns, applied in order, case-insensitive
    static ref ABBREVIATIONS: Vec<(Regex, &'static str)> = {
        let table: &[(&str, &str)] = &[
            (r"\bbpm\b", "beats per minute"),
            (r"\blofi\b", "lo-fi"),
            (r"\blo fi\b", "lo-fi"),
            (r"\brnb\b", "r&b"),
            (r"\bedm\b", "electronic dance music"),
            (r"\bdnb\b", "drum and bass"),
            (r"\bd&b\b", "drum and bass"),
            (r"\bsfx\b", "sound effects"),
            (r"\bsynth\b", "synthesizer"),
            (r"\bsynths\b", "synthesizers"),
            (r"\bsax\b", "saxophone"),
            (r"\bkeys\b", "keyboard"),
            (r"\bacoustic gtr\b", "acoustic guitar"),
            (r"\belec gtr\b", "electric guitar"),
            (r"\bgtr\b", "guitar"),
            (r"\bmins?\b", "minutes"),
            (r"\bsecs?\b", "seconds"),
            (r"\bkpop\b", "k-pop"),
            (r"\bjpop\b", "j-pop"),
            (r"\bbossa\b", "bossa nova"),
            (r"\bvox\b", "vocals"),
            (r"\bstrgs\b", "strings"),
            (r"\bhh\b", "hi-hat"),
            (r"\bperc\b", "percussion"),
        ];
        table
            .iter()
            .map(|(pattern, replacement)| {
                (Regex::new(&format!("(?i){}", pattern)).unwrap(), *replacement)
            })
            .collect()
    };

    static ref BOSSA_NOVA_TWICE: Regex = Regex::new(r"(?i)\bbossa nova nova\b").unwrap();
}

/// Folds encoding noise: NFC, ASCII quotes and dashes, no control
/// characters, single spaces, trimmed.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfc()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201B}' | '\u{2032}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201F}' | '\u{2033}' => '"',
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}' => '-',
            '\u{00A0}' | '\u{2007}' | '\u{202F}' => ' ',
            c => c,
        })
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();

    WHITESPACE.replace_all(&folded, " ").trim().to_string()
}

/// Expands known music abbreviations
pub fn expand_abbreviations(text: &str) -> String {
    let mut result = text.to_string();
    for (pattern, replacement) in ABBREVIATIONS.iter() {
        if pattern.is_match(&result) {
            result = pattern.replace_all(&result, *replacement).into_owned();
        }
    }
    // "bossa nova" written out in full must not become "bossa nova nova"
    BOSSA_NOVA_TWICE.replace_all(&result, "bossa nova").into_owned()
}

/// Normalize, then expand
pub fn normalize_and_expand(text: &str) -> String {
    expand_abbreviations(&normalize(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_collapse() {
        assert_eq!(normalize("  chill \t\n beat  "), "chill beat");
    }

    #[test]
    fn test_typographic_punctuation() {
        assert_eq!(normalize("“dreamy” synth—pop"), "\"dreamy\" synth-pop");
    }

    #[test]
    fn test_control_characters_dropped() {
        assert_eq!(normalize("lo\u{0007}fi\u{0000}"), "lofi");
    }

    #[test]
    fn test_nfc() {
        // e + combining acute becomes a single code point
        assert_eq!(normalize("cafe\u{0301}"), "caf\u{00E9}");
    }

    #[test]
    fn test_expand_bpm_and_genres() {
        assert_eq!(
            expand_abbreviations("120 BPM lofi beat"),
            "120 beats per minute lo-fi beat"
        );
        assert_eq!(expand_abbreviations("fast dnb"), "fast drum and bass");
        assert_eq!(expand_abbreviations("smooth RnB"), "smooth r&b");
        assert_eq!(expand_abbreviations("edm drop"), "electronic dance music drop");
    }

    #[test]
    fn test_expand_instruments() {
        assert_eq!(
            expand_abbreviations("synth, sax and keys"),
            "synthesizer, saxophone and keyboard"
        );
        assert_eq!(expand_abbreviations("elec gtr solo"), "electric guitar solo");
    }

    #[test]
    fn test_expand_time_units_leaves_words_alone() {
        assert_eq!(expand_abbreviations("3 min of minimal"), "3 minutes of minimal");
        assert_eq!(expand_abbreviations("A minor, 30 secs"), "A minor, 30 seconds");
    }

    #[test]
    fn test_bossa_not_doubled() {
        assert_eq!(expand_abbreviations("bossa nova groove"), "bossa nova groove");
        assert_eq!(expand_abbreviations("bossa groove"), "bossa nova groove");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize_and_expand(""), "");
        assert_eq!(normalize_and_expand("   "), "");
    }
}
