//! Hard-number extraction.
//!
//! Pulls literal values out of request text with fixed patterns:
//! - Tempo: "120 bpm", "120 beats per minute", "tempo 90", "at 140"
//! - Duration: "1:30", "2m30s", "3 minutes", "2 minutes 30 seconds", "45 seconds"
//! - Length: "32 bars", "16 measures"
//! - Counts: "5 tracks", "4-instrument", "8 channels"
//! - Time signature: "3/4", "6/8"
//!
//! Values outside their plausible range are ignored rather than clamped.

use lazy_static::lazy_static;
use midigent_core::{ExtractedNumbers, Tempo, TimeSignature};
use regex::Regex;

lazy_static! {
    static ref TEMPO_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"\b(\d{2,3})\s*(?:bpm|beats?\s*per\s*min(?:ute)?)").unwrap(),
        Regex::new(r"\b(?:tempo|at)\s+(\d{2,3})\b").unwrap(),
    ];

    static ref MM_SS: Regex = Regex::new(r"\b(\d{1,2}):(\d{2})\b").unwrap();
    static ref M_S: Regex = Regex::new(r"\b(\d{1,2})\s*m\s*(\d{1,2})\s*s\b").unwrap();
    static ref MINUTES_SECONDS: Regex = Regex::new(
        r"\b(\d{1,3})\s*(?:minutes?|mins?)\s*(?:and\s+)?(\d{1,2})\s*(?:seconds?|secs?)\b"
    ).unwrap();
    static ref MINUTES: Regex = Regex::new(r"\b(\d{1,3})\s*(?:minutes?|mins?)\b").unwrap();
    static ref SECONDS: Regex = Regex::new(r"\b(\d{1,4})\s*(?:seconds?|secs?)\b").unwrap();

    /// Looser minute phrasings: "5 minutes length", "of 3 minutes"
    static ref MINUTE_PHRASES: Vec<Regex> = vec![
        Regex::new(r"\b(\d{1,3})\s*(?:minutes?|mins?)\s*(?:length|long)\b").unwrap(),
        Regex::new(r"\b(?:of|about|around|approximately)\s+(\d{1,3})\s*(?:minutes?|mins?)").unwrap(),
    ];

    static ref BARS: Regex = Regex::new(r"\b(\d{1,3})\s*(?:bars?|measures?)\b").unwrap();
    static ref TRACKS: Regex = Regex::new(r"\b(\d{1,2})\s*[-\s]?(?:tracks?|instruments?)\b").unwrap();
    static ref CHANNELS: Regex = Regex::new(r"\b(\d{1,2})\s*[-\s]?channels?\b").unwrap();
    static ref TIME_SIGNATURE: Regex = Regex::new(r"\b(\d{1,2}/\d{1,2})\b").unwrap();
}

/// Extract every hard number from `text`. Never fails.
pub fn extract_numbers(text: &str) -> ExtractedNumbers {
    let lower = text.to_lowercase();

    ExtractedNumbers {
        tempo_bpm: extract_tempo(&lower),
        duration_seconds: extract_duration(&lower),
        bars: first_number(&BARS, &lower).filter(|bars| *bars > 0),
        track_count: first_number(&TRACKS, &lower)
            .filter(|n| (1..=16).contains(n))
            .map(|n| n as u8),
        channel_count: first_number(&CHANNELS, &lower)
            .filter(|n| (1..=16).contains(n))
            .map(|n| n as u8),
        time_signature: TIME_SIGNATURE
            .captures_iter(&lower)
            .filter_map(|cap| cap.get(1))
            .find_map(|m| TimeSignature::parse(m.as_str())),
    }
}

fn extract_tempo(lower: &str) -> Option<u16> {
    // The first pattern that matches decides, even when its value is
    // implausible.
    for pattern in TEMPO_PATTERNS.iter() {
        if let Some(value) = first_number(pattern, lower) {
            let range = Tempo::MIN_BPM as u32..=Tempo::MAX_BPM as u32;
            return range.contains(&value).then_some(value as u16);
        }
    }
    None
}

fn extract_duration(lower: &str) -> Option<u32> {
    if let Some(cap) = MM_SS.captures(lower) {
        let minutes = parse_group(&cap, 1)?;
        let seconds = parse_group(&cap, 2)?;
        return Some(minutes * 60 + seconds);
    }
    if let Some(cap) = M_S.captures(lower) {
        let minutes = parse_group(&cap, 1)?;
        let seconds = parse_group(&cap, 2)?;
        return Some(minutes * 60 + seconds);
    }
    if let Some(cap) = MINUTES_SECONDS.captures(lower) {
        let minutes = parse_group(&cap, 1)?;
        let seconds = parse_group(&cap, 2)?;
        return Some(minutes * 60 + seconds);
    }
    if let Some(minutes) = first_number(&MINUTES, lower) {
        return Some(minutes * 60);
    }
    if let Some(seconds) = first_number(&SECONDS, lower) {
        return Some(seconds);
    }
    MINUTE_PHRASES
        .iter()
        .find_map(|pattern| first_number(pattern, lower))
        .map(|minutes| minutes * 60)
}

fn first_number(pattern: &Regex, text: &str) -> Option<u32> {
    let cap = pattern.captures(text)?;
    parse_group(&cap, 1)
}

fn parse_group(cap: &regex::Captures, index: usize) -> Option<u32> {
    cap.get(index)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_variants() {
        assert_eq!(extract_numbers("120 BPM lofi").tempo_bpm, Some(120));
        assert_eq!(extract_numbers("90 beats per minute").tempo_bpm, Some(90));
        assert_eq!(extract_numbers("tempo 140 please").tempo_bpm, Some(140));
        assert_eq!(extract_numbers("play it at 100").tempo_bpm, Some(100));
    }

    #[test]
    fn test_tempo_out_of_range_is_ignored() {
        assert_eq!(extract_numbers("999 bpm").tempo_bpm, None);
        assert_eq!(extract_numbers("20 bpm").tempo_bpm, None);
    }

    #[test]
    fn test_tempo_needs_word_boundary() {
        assert_eq!(extract_numbers("track1120 bpm").tempo_bpm, None);
    }

    #[test]
    fn test_duration_formats() {
        assert_eq!(extract_numbers("a 1:30 intro").duration_seconds, Some(90));
        assert_eq!(extract_numbers("2m30s loop").duration_seconds, Some(150));
        assert_eq!(extract_numbers("3 minutes of jazz").duration_seconds, Some(180));
        assert_eq!(
            extract_numbers("2 minutes and 15 seconds").duration_seconds,
            Some(135)
        );
        assert_eq!(extract_numbers("45 seconds jingle").duration_seconds, Some(45));
        assert_eq!(extract_numbers("a 5min sketch").duration_seconds, Some(300));
    }

    #[test]
    fn test_bars_and_counts() {
        let numbers = extract_numbers("32 bars, 5 tracks over 8-channel mixer");
        assert_eq!(numbers.bars, Some(32));
        assert_eq!(numbers.track_count, Some(5));
        assert_eq!(numbers.channel_count, Some(8));
    }

    #[test]
    fn test_counts_out_of_range() {
        let numbers = extract_numbers("40 tracks and 0 channels");
        assert_eq!(numbers.track_count, None);
        assert_eq!(numbers.channel_count, None);
    }

    #[test]
    fn test_time_signature() {
        assert_eq!(
            extract_numbers("waltz in 3/4").time_signature,
            Some(TimeSignature { numerator: 3, denominator: 4 })
        );
        assert_eq!(extract_numbers("open 24/7").time_signature, None);
    }

    #[test]
    fn test_nothing_found() {
        let numbers = extract_numbers("something dreamy");
        assert!(!numbers.has_values());
    }
}
