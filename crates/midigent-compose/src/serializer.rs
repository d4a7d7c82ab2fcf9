//! Artifact serialization
//!
//! Tracks are written as a Standard MIDI File, format 1: a conductor track
//! with tempo and meter, then one track per generated part.

use midigent_core::{ArtifactHandle, TimeSignature, Track, DRUM_CHANNEL};
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const TICKS_PER_QUARTER: u16 = 480;

pub const MIDI_MIME: &str = "audio/midi";

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("SERIALIZE/EMPTY: no tracks to write")]
    Empty,
    #[error("SERIALIZE/IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("SERIALIZE/INVALID: {0}")]
    Invalid(String),
}

pub trait ArtifactSerializer: Send + Sync {
    fn serialize(
        &self,
        tracks: &[Track],
        tempo: u16,
        time_signature: TimeSignature,
    ) -> Result<ArtifactHandle, SerializeError>;
}

/// Writes SMF bytes, optionally into a directory as `<blake3>.mid`
#[derive(Debug, Clone, Default)]
pub struct MidiSerializer {
    output_dir: Option<PathBuf>,
}

impl MidiSerializer {
    /// Hashes the file without writing it anywhere
    pub fn in_memory() -> Self {
        Self { output_dir: None }
    }

    pub fn to_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: Some(dir.into()),
        }
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Encoded file contents
    pub fn encode(
        &self,
        tracks: &[Track],
        tempo: u16,
        time_signature: TimeSignature,
    ) -> Result<Vec<u8>, SerializeError> {
        if tracks.is_empty() {
            return Err(SerializeError::Empty);
        }
        if tempo == 0 {
            return Err(SerializeError::Invalid("tempo must be positive".to_string()));
        }
        let denominator = time_signature.denominator;
        if denominator == 0 || !denominator.is_power_of_two() {
            return Err(SerializeError::Invalid(format!(
                "time signature denominator {} is not a power of two",
                denominator
            )));
        }

        let mut smf = Smf::new(Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
        ));
        smf.tracks.push(conductor(tempo, time_signature));
        for track in tracks {
            smf.tracks.push(part(track));
        }

        let mut bytes = Vec::new();
        smf.write_std(&mut bytes)?;
        Ok(bytes)
    }
}

impl ArtifactSerializer for MidiSerializer {
    fn serialize(
        &self,
        tracks: &[Track],
        tempo: u16,
        time_signature: TimeSignature,
    ) -> Result<ArtifactHandle, SerializeError> {
        let bytes = self.encode(tracks, tempo, time_signature)?;
        let hash = blake3::hash(&bytes).to_hex();

        let location = match &self.output_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let path = dir.join(format!("{}.mid", hash));
                std::fs::write(&path, &bytes)?;
                Some(path)
            }
            None => None,
        };
        debug!(bytes = bytes.len(), tracks = tracks.len(), ?location, "midi serialized");

        Ok(ArtifactHandle {
            id: format!("blake3:{}", hash),
            mime: MIDI_MIME.to_string(),
            byte_len: bytes.len(),
            location,
        })
    }
}

fn ticks(beats: f64) -> u32 {
    (beats.max(0.0) * TICKS_PER_QUARTER as f64).round() as u32
}

fn conductor(tempo: u16, time_signature: TimeSignature) -> Vec<TrackEvent<'static>> {
    let micros_per_quarter = 60_000_000 / tempo as u32;
    vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros_per_quarter))),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(
                time_signature.numerator,
                time_signature.denominator.trailing_zeros() as u8,
                24,
                8,
            )),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ]
}

fn part(track: &Track) -> Vec<TrackEvent<'_>> {
    let channel = u4::new(track.channel.min(15));
    let mut events = vec![TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(track.name.as_bytes())),
    }];
    if track.channel != DRUM_CHANNEL {
        events.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(track.program.min(127)),
                },
            },
        });
    }

    // (tick, note-offs first, message)
    let mut timeline: Vec<(u32, u8, MidiMessage)> = Vec::with_capacity(track.notes.len() * 2);
    for note in &track.notes {
        let on = ticks(note.start);
        let off = ticks(note.end()).max(on + 1);
        let key = u7::new(note.pitch.min(127));
        timeline.push((on, 1, MidiMessage::NoteOn { key, vel: u7::new(note.velocity.clamp(1, 127)) }));
        timeline.push((off, 0, MidiMessage::NoteOff { key, vel: u7::new(0) }));
    }
    timeline.sort_by_key(|(tick, order, _)| (*tick, *order));

    let mut last = 0u32;
    for (tick, _, message) in timeline {
        events.push(TrackEvent {
            delta: u28::new(tick - last),
            kind: TrackEventKind::Midi { channel, message },
        });
        last = tick;
    }
    events.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    events
}
