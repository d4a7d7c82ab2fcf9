//! Dimension analyzers
//!
//! Each analyzer inspects one aspect of the generated material and returns
//! a score plus the issues it found. Every score is clamped to a
//! per-dimension floor, except technical validity with no tracks, which
//! scores 0.

use midigent_core::{
    Complexity, Issue, IssueCategory, ParameterSet, QualityHistory, Severity, Track, TrackKind,
    TrackPlan, Vocabulary, BEATS_PER_BAR,
};
use std::collections::HashSet;

use crate::profile::QualityProfile;

/// Everything the analyzers look at
#[derive(Debug, Clone, Copy)]
pub struct Material<'a> {
    pub parameters: &'a ParameterSet,
    pub plan: &'a TrackPlan,
    pub tracks: &'a [Track],
    /// Whether the genre is expected to carry a beat
    pub rhythmic_genre: bool,
}

impl Material<'_> {
    /// Bars spanned by the longest track
    pub fn produced_bars(&self) -> f64 {
        let beats = self
            .tracks
            .iter()
            .map(Track::length_beats)
            .fold(0.0, f64::max);
        beats / BEATS_PER_BAR
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionResult {
    pub score: f32,
    pub issues: Vec<Issue>,
}

fn issue(
    category: IssueCategory,
    severity: Severity,
    description: impl Into<String>,
    suggestion: impl Into<String>,
    track_index: Option<usize>,
) -> Issue {
    Issue {
        category,
        severity,
        description: description.into(),
        suggestion: suggestion.into(),
        track_index,
    }
}

fn count(issues: &[Issue], severity: Severity) -> f32 {
    issues.iter().filter(|i| i.severity == severity).count() as f32
}

// =============================================================================
// Technical validity
// =============================================================================

pub fn technical(material: &Material, profile: &QualityProfile) -> DimensionResult {
    let tracks = material.tracks;
    if tracks.is_empty() {
        return DimensionResult {
            score: 0.0,
            issues: vec![issue(
                IssueCategory::Technical,
                Severity::Critical,
                "No tracks were generated",
                "Regenerate the full arrangement",
                None,
            )],
        };
    }

    let mut issues = Vec::new();

    for (index, track) in tracks.iter().enumerate() {
        if track.notes.is_empty() {
            issues.push(issue(
                IssueCategory::Technical,
                Severity::High,
                format!("Track '{}' has no notes", track.name),
                "Regenerate the track with more energy",
                Some(index),
            ));
        }
    }

    let total_notes: usize = tracks.iter().map(|t| t.notes.len()).sum();
    let average = total_notes as f32 / tracks.len() as f32;
    if average < profile.min_notes_per_track {
        issues.push(issue(
            IssueCategory::Density,
            Severity::Medium,
            format!("Sparse arrangement ({:.1} notes per track)", average),
            "Raise note density",
            None,
        ));
    } else if average > profile.max_notes_per_track {
        issues.push(issue(
            IssueCategory::Density,
            Severity::Medium,
            format!("Cluttered arrangement ({:.1} notes per track)", average),
            "Thin out busy parts",
            None,
        ));
    }

    let pitched: Vec<u8> = tracks
        .iter()
        .filter(|t| t.kind != TrackKind::Drums)
        .flat_map(|t| t.notes.iter().map(|n| n.pitch))
        .collect();
    if let (Some(low), Some(high)) = (pitched.iter().min(), pitched.iter().max()) {
        let span = high - low;
        if span < profile.min_pitch_span {
            issues.push(issue(
                IssueCategory::Technical,
                Severity::Medium,
                format!("Narrow pitch range ({} semitones)", span),
                "Spread parts across more registers",
                None,
            ));
        }
    }

    let score = 1.0
        - 0.3 * count(&issues, Severity::Critical)
        - 0.15 * count(&issues, Severity::High)
        - 0.05 * count(&issues, Severity::Medium);

    DimensionResult {
        score: score.clamp(0.3, 1.0),
        issues,
    }
}

// =============================================================================
// Structural coherence
// =============================================================================

/// Tracks an arrangement of this complexity should have
pub fn expected_tracks(complexity: Complexity) -> usize {
    match complexity {
        Complexity::Simple => 2,
        Complexity::Moderate => 3,
        Complexity::Rich => 4,
        Complexity::VeryComplex => 5,
    }
}

pub fn coherence(material: &Material) -> DimensionResult {
    let tracks = material.tracks;
    let mut issues = Vec::new();

    let kinds: HashSet<TrackKind> = tracks.iter().map(|t| t.kind).collect();
    if kinds.len() < 2 {
        issues.push(issue(
            IssueCategory::Arrangement,
            Severity::Medium,
            "Arrangement uses a single kind of part",
            "Add contrasting parts such as bass or harmony",
            None,
        ));
    }

    let complexity = material.parameters.production.complexity;
    let expected = expected_tracks(complexity);
    if tracks.len() < expected {
        issues.push(issue(
            IssueCategory::Arrangement,
            Severity::Low,
            format!(
                "{} tracks for {} complexity, {} expected",
                tracks.len(),
                complexity.as_str(),
                expected
            ),
            "Add supporting parts",
            None,
        ));
    }

    if material.rhythmic_genre && !kinds.contains(&TrackKind::Drums) {
        issues.push(issue(
            IssueCategory::Arrangement,
            Severity::Medium,
            format!("No drums in {}", material.parameters.genre.primary),
            "Add a rhythm section",
            None,
        ));
    }

    let score = 0.9 - 0.15 * issues.len() as f32;
    DimensionResult {
        score: score.clamp(0.3, 1.0),
        issues,
    }
}

// =============================================================================
// Creative variety
// =============================================================================

pub fn creativity(
    material: &Material,
    fingerprint: &str,
    history: &QualityHistory,
) -> DimensionResult {
    let mut issues = Vec::new();

    if history.contains_fingerprint(fingerprint) {
        issues.push(issue(
            IssueCategory::Repetition,
            Severity::High,
            "Output is identical to an earlier pass",
            "Regenerate with a fresh variation seed",
            None,
        ));
    }

    let sequences: Vec<Vec<u8>> = material
        .tracks
        .iter()
        .map(|t| t.notes.iter().map(|n| n.pitch).collect())
        .collect();
    for (index, sequence) in sequences.iter().enumerate() {
        if sequence.is_empty() || material.tracks[index].kind == TrackKind::Drums {
            continue;
        }
        if let Some(original) = sequences[..index].iter().position(|s| s == sequence) {
            issues.push(issue(
                IssueCategory::Repetition,
                Severity::Medium,
                format!(
                    "Track '{}' repeats the pitches of '{}'",
                    material.tracks[index].name, material.tracks[original].name
                ),
                "Vary the duplicated part",
                Some(index),
            ));
        }
    }

    let score = 0.9 - 0.2 * issues.len() as f32;
    DimensionResult {
        score: score.clamp(0.4, 1.0),
        issues,
    }
}

// =============================================================================
// Intent congruence
// =============================================================================

pub fn intent(material: &Material, profile: &QualityProfile) -> DimensionResult {
    let parameters = material.parameters;
    let mut issues = Vec::new();

    let requested = parameters.duration.bars.max(1) as f64;
    let produced = material.produced_bars();
    let mismatch = ((produced - requested).abs() / requested).min(1.0) as f32;
    if mismatch > profile.bar_tolerance {
        issues.push(issue(
            IssueCategory::Duration,
            Severity::High,
            format!("{:.1} bars produced, {} requested", produced, parameters.duration.bars),
            "Regenerate at the requested length",
            None,
        ));
    }

    for requested in &parameters.instruments {
        if !material.tracks.iter().any(|t| t.instrument == requested.name) {
            issues.push(issue(
                IssueCategory::Instrumentation,
                Severity::Medium,
                format!("Requested {} is missing", requested.name),
                format!("Add a {} part", requested.name),
                None,
            ));
        }
    }

    if material.plan.genre != parameters.genre.primary {
        issues.push(issue(
            IssueCategory::Genre,
            Severity::Medium,
            format!(
                "Planned as {} but {} was requested",
                material.plan.genre, parameters.genre.primary
            ),
            "Re-plan for the requested genre",
            None,
        ));
    }

    let score = 0.9 - 0.3 * mismatch - 0.1 * issues.len() as f32;
    DimensionResult {
        score: score.clamp(0.4, 1.0),
        issues,
    }
}
