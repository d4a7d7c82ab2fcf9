//! Composition material: plans, note events, tracks and artifact handles.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data_model::{InstrumentRole, Vocabulary};

/// General MIDI percussion channel (zero-based)
pub const DRUM_CHANNEL: u8 = 9;

/// Maximum tracks an arrangement may hold
pub const MAX_TRACKS: usize = 16;

/// Quarter-note beats in one bar of the duration model (bars = seconds·bpm/240)
pub const BEATS_PER_BAR: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    /// Start position in beats
    pub start: f64,
    /// Length in beats
    pub duration: f64,
    pub velocity: u8,
    pub channel: u8,
}

impl Note {
    pub fn new(pitch: i32, start: f64, duration: f64, velocity: i32, channel: u8) -> Self {
        Self {
            pitch: pitch.clamp(0, 127) as u8,
            start,
            duration,
            velocity: velocity.clamp(1, 127) as u8,
            channel: channel.min(15),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Lead,
    CounterMelody,
    Harmony,
    Bass,
    Drums,
    Arpeggio,
    Pad,
    Fx,
}

impl Vocabulary for TrackKind {
    const ALL: &'static [Self] = &[
        Self::Lead,
        Self::CounterMelody,
        Self::Harmony,
        Self::Bass,
        Self::Drums,
        Self::Arpeggio,
        Self::Pad,
        Self::Fx,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::CounterMelody => "counter_melody",
            Self::Harmony => "harmony",
            Self::Bass => "bass",
            Self::Drums => "drums",
            Self::Arpeggio => "arpeggio",
            Self::Pad => "pad",
            Self::Fx => "fx",
        }
    }
}

impl TrackKind {
    /// Track kind that realizes a requested instrument role
    pub fn for_role(role: InstrumentRole) -> Self {
        match role {
            InstrumentRole::Melody | InstrumentRole::Lead => Self::Lead,
            InstrumentRole::Harmony => Self::Harmony,
            InstrumentRole::Bass => Self::Bass,
            InstrumentRole::Rhythm => Self::Drums,
            InstrumentRole::Pad => Self::Pad,
            InstrumentRole::Arpeggio => Self::Arpeggio,
            InstrumentRole::Fx => Self::Fx,
        }
    }

    pub fn is_melodic(self) -> bool {
        matches!(self, Self::Lead | Self::CounterMelody | Self::Arpeggio)
    }

    pub fn is_harmonic(self) -> bool {
        matches!(self, Self::Harmony | Self::Pad | Self::Arpeggio)
    }
}

/// One planned track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSpec {
    pub kind: TrackKind,
    pub instrument: String,
    pub role: InstrumentRole,
    pub priority: u8,
    pub channel: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackPlan {
    pub genre: String,
    pub tracks: Vec<TrackSpec>,
}

impl TrackPlan {
    pub fn has_kind(&self, kind: TrackKind) -> bool {
        self.tracks.iter().any(|t| t.kind == kind)
    }
}

/// A generated track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub kind: TrackKind,
    pub instrument: String,
    /// General MIDI program number
    pub program: u8,
    pub channel: u8,
    pub notes: Vec<Note>,
}

impl Track {
    /// Last sounding beat of the track
    pub fn length_beats(&self) -> f64 {
        self.notes.iter().map(Note::end).fold(0.0, f64::max)
    }

    pub fn pitch_range(&self) -> Option<(u8, u8)> {
        let min = self.notes.iter().map(|n| n.pitch).min()?;
        let max = self.notes.iter().map(|n| n.pitch).max()?;
        Some((min, max))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TheoryNoteLevel {
    Info,
    Warning,
}

/// One observation made while validating a plan against the genre
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TheoryNote {
    pub level: TheoryNoteLevel,
    pub check: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TheoryReport {
    pub notes: Vec<TheoryNote>,
}

impl TheoryReport {
    pub fn warnings(&self) -> usize {
        self.notes
            .iter()
            .filter(|n| n.level == TheoryNoteLevel::Warning)
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.warnings() == 0
    }
}

/// Opaque reference to a serialized composition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHandle {
    /// "blake3:<hex>" of the serialized bytes
    pub id: String,
    pub mime: String,
    pub byte_len: usize,
    pub location: Option<PathBuf>,
}
