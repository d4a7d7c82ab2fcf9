//! Intent draft: a ParameterSet whose key root and length may still be
//! unknown.
//!
//! Both the provider path and the keyword fallback produce a draft. The
//! engine then applies hard numbers, enriches from the genre registry and
//! seals the draft into a complete [`ParameterSet`].

use midigent_core::{
    canonical_root, Action, Duration, Dynamics, Energy, ExtractedNumbers, Genre,
    InstrumentRequest, InstrumentRole, Key, Mood, ParameterSet, Production, Reference, Scale,
    Structure, Tempo, TempoSource, TimeSignature, TrackRequest,
};
use tracing::{info, warn};

use crate::registry::GenreRegistry;

/// Fields below this confidence are refilled from the genre registry
pub const CONFIDENCE_FLOOR: f32 = 0.5;

const EXPLICIT_TEMPO_CONFIDENCE: f32 = 0.95;
const EXPLICIT_LENGTH_CONFIDENCE: f32 = 0.9;
const EXPLICIT_COUNT_CONFIDENCE: f32 = 0.95;

#[derive(Debug, Clone, PartialEq)]
pub struct IntentDraft {
    pub action: Action,
    pub genre: Genre,
    pub mood: Mood,
    pub energy: Energy,
    pub tempo: Tempo,
    pub key_root: Option<String>,
    pub scale: Scale,
    pub key_confidence: f32,
    pub time_signature: TimeSignature,
    pub bars: Option<u32>,
    pub seconds: Option<u32>,
    pub duration_confidence: f32,
    pub tracks: TrackRequest,
    pub instruments: Vec<InstrumentRequest>,
    pub dynamics: Dynamics,
    pub structure: Structure,
    pub production: Production,
    pub reference: Option<Reference>,
    pub overall_confidence: f32,
    pub reasoning: String,
}

impl Default for IntentDraft {
    fn default() -> Self {
        Self {
            action: Action::New,
            genre: Genre::default(),
            mood: Mood::default(),
            energy: Energy::default(),
            tempo: Tempo::default(),
            key_root: None,
            scale: Scale::Major,
            key_confidence: 0.5,
            time_signature: TimeSignature::default(),
            bars: None,
            seconds: None,
            duration_confidence: 0.5,
            tracks: TrackRequest {
                track_count: None,
                channel_count: None,
                confidence: 0.5,
            },
            instruments: Vec::new(),
            dynamics: Dynamics::default(),
            structure: Structure {
                has_intro: true,
                has_verse: true,
                has_chorus: true,
                has_bridge: false,
                has_outro: true,
                form_hint: None,
            },
            production: Production::default(),
            reference: None,
            overall_confidence: 0.7,
            reasoning: String::new(),
        }
    }
}

impl IntentDraft {
    /// Start a draft from a previous request's parameters
    pub fn from_prior(prior: &ParameterSet) -> Self {
        Self {
            action: prior.action,
            genre: prior.genre.clone(),
            mood: prior.mood.clone(),
            energy: prior.energy.clone(),
            tempo: prior.tempo.clone(),
            key_root: Some(prior.key.root.clone()),
            scale: prior.key.scale,
            key_confidence: prior.key.confidence,
            time_signature: prior.time_signature,
            bars: Some(prior.duration.bars),
            seconds: Some(prior.duration.seconds),
            duration_confidence: prior.duration.confidence,
            tracks: prior.tracks.clone(),
            instruments: prior.instruments.clone(),
            dynamics: prior.dynamics.clone(),
            structure: prior.structure.clone(),
            production: prior.production.clone(),
            reference: prior.reference.clone(),
            overall_confidence: prior.overall_confidence,
            reasoning: prior.reasoning.clone(),
        }
    }

    /// Overwrite fields with values the user stated literally.
    ///
    /// Returns one note per override.
    pub fn apply_numbers(&mut self, numbers: &ExtractedNumbers) -> Vec<String> {
        let mut notes = Vec::new();

        if let Some(bpm) = numbers.tempo_bpm {
            if self.tempo.bpm != bpm {
                notes.push(format!("tempo {} -> {} (stated)", self.tempo.bpm, bpm));
            }
            self.tempo.bpm = bpm;
            self.tempo.source = TempoSource::Explicit;
            self.tempo.confidence = self.tempo.confidence.max(EXPLICIT_TEMPO_CONFIDENCE);
        }

        match (numbers.bars, numbers.duration_seconds) {
            (Some(bars), None) => {
                notes.push(format!("length set to {} bars (stated)", bars));
                self.bars = Some(bars);
                // A stated bar count must not be recomputed from an
                // inferred time.
                self.seconds = None;
                self.duration_confidence = self.duration_confidence.max(EXPLICIT_LENGTH_CONFIDENCE);
            }
            (bars, Some(seconds)) => {
                notes.push(format!("length set to {} seconds (stated)", seconds));
                self.seconds = Some(seconds);
                self.bars = bars;
                self.duration_confidence = self.duration_confidence.max(EXPLICIT_LENGTH_CONFIDENCE);
            }
            (None, None) => {}
        }

        if let Some(count) = numbers.track_count {
            notes.push(format!("track count {} (stated)", count));
            self.tracks.track_count = Some(count);
            self.tracks.confidence = self.tracks.confidence.max(EXPLICIT_COUNT_CONFIDENCE);
        }
        if let Some(count) = numbers.channel_count {
            notes.push(format!("channel count {} (stated)", count));
            self.tracks.channel_count = Some(count);
            self.tracks.confidence = self.tracks.confidence.max(EXPLICIT_COUNT_CONFIDENCE);
        }
        if let Some(channels) = self.tracks.channel_count {
            if self.tracks.track_count.map_or(true, |tracks| channels > tracks) {
                info!(channels, "track count raised to channel count");
                self.tracks.track_count = Some(channels);
            }
        }

        if let Some(signature) = numbers.time_signature {
            if self.time_signature != signature {
                notes.push(format!("time signature {} (stated)", signature));
            }
            self.time_signature = signature;
        }

        notes
    }

    /// Fill empty or low-confidence fields from the genre registry.
    ///
    /// Returns one note per filled field.
    pub fn enrich(&mut self, registry: &GenreRegistry) -> Vec<String> {
        let mut notes = Vec::new();
        let profile = registry.resolve(&self.genre.primary);

        if self.tempo.source == TempoSource::Default && !profile.tempo_in_band(self.tempo.bpm) {
            let bpm = profile.tempo_center();
            notes.push(format!("tempo {} from {} band", bpm, profile.id));
            self.tempo.bpm = bpm;
        }

        if self.energy.confidence < CONFIDENCE_FLOOR {
            notes.push(format!("energy {} from {}", profile.energy, profile.id));
            self.energy.level = profile.energy;
            self.energy.confidence = CONFIDENCE_FLOOR;
        }

        if self.key_root.is_none() {
            notes.push(format!("key root {} from {}", profile.key_root, profile.id));
            self.key_root = Some(profile.key_root.clone());
            if self.key_confidence < CONFIDENCE_FLOOR {
                self.scale = profile.scale;
            }
        }

        let requested = self.tracks.track_count.map(usize::from);
        let current = self.instruments.len();
        if current == 0 || requested.map_or(false, |wanted| current < wanted) {
            let palette = registry.palette(&profile.id);
            let target = match (current, requested) {
                (0, Some(wanted)) => wanted.min(palette.len()),
                (0, None) => palette.len(),
                (_, Some(wanted)) => wanted,
                (_, None) => current,
            };
            for candidate in palette {
                if self.instruments.len() >= target {
                    break;
                }
                if self.instruments.iter().any(|i| i.name == candidate.name) {
                    continue;
                }
                if !candidate.role.is_shareable()
                    && self.instruments.iter().any(|i| i.role == candidate.role)
                {
                    continue;
                }
                self.instruments.push(candidate.clone());
            }
            notes.push(format!(
                "instruments {} -> {} from {} palette",
                current,
                self.instruments.len(),
                profile.id
            ));
        }

        for note in &notes {
            info!(genre = %profile.id, "enriched: {}", note);
        }
        notes
    }

    /// Close every remaining gap and enforce the ParameterSet invariants
    pub fn seal(self, registry: &GenreRegistry) -> ParameterSet {
        let profile = registry.resolve(&self.genre.primary);

        let bpm = self.tempo.bpm.clamp(Tempo::MIN_BPM, Tempo::MAX_BPM);
        let tempo = Tempo {
            bpm,
            source: self.tempo.source,
            confidence: unit(self.tempo.confidence),
        };

        let (bars, seconds) = match (self.bars.filter(|b| *b > 0), self.seconds) {
            (_, Some(seconds)) => {
                let seconds = seconds.clamp(Duration::MIN_SECONDS, Duration::MAX_SECONDS);
                (Duration::bars_for(seconds, bpm), seconds)
            }
            (Some(bars), None) => fit_bars(bars, bpm),
            (None, None) => fit_bars(Duration::DEFAULT_BARS, bpm),
        };

        let root = self
            .key_root
            .as_deref()
            .and_then(canonical_root)
            .unwrap_or_else(|| profile.key_root.clone());

        let mut instruments = dedupe_roles(self.instruments);
        if instruments.is_empty() {
            warn!(genre = %profile.id, "no instruments at seal, using palette");
            instruments = dedupe_roles(registry.palette(&profile.id).to_vec());
        }
        for instrument in &mut instruments {
            instrument.priority = instrument.priority.clamp(1, 10);
        }

        let count = |c: Option<u8>| c.map(|n| n.clamp(1, midigent_core::MAX_TRACKS as u8));

        ParameterSet {
            action: self.action,
            genre: Genre {
                primary: profile.id.clone(),
                secondary: self.genre.secondary,
                confidence: unit(self.genre.confidence),
            },
            mood: Mood {
                primary: if self.mood.primary.trim().is_empty() {
                    Mood::default().primary
                } else {
                    self.mood.primary
                },
                secondary: self.mood.secondary,
                valence: if self.mood.valence.is_nan() {
                    0.0
                } else {
                    self.mood.valence.clamp(-1.0, 1.0)
                },
                confidence: unit(self.mood.confidence),
            },
            energy: Energy {
                level: self.energy.level,
                confidence: unit(self.energy.confidence),
            },
            tempo,
            key: Key {
                root,
                scale: self.scale,
                confidence: unit(self.key_confidence),
            },
            time_signature: self.time_signature,
            duration: Duration {
                bars,
                seconds,
                confidence: unit(self.duration_confidence),
            },
            tracks: TrackRequest {
                track_count: count(self.tracks.track_count),
                channel_count: count(self.tracks.channel_count),
                confidence: unit(self.tracks.confidence),
            },
            instruments,
            dynamics: self.dynamics,
            structure: self.structure,
            production: self.production,
            reference: self.reference,
            overall_confidence: unit(self.overall_confidence),
            reasoning: self.reasoning,
        }
    }
}

/// Keep the first claimant of each non-shareable role
/// Bars and seconds for a stated bar count, with the seconds kept inside
/// [`Duration::MIN_SECONDS`, `Duration::MAX_SECONDS`]
fn fit_bars(bars: u32, bpm: u16) -> (u32, u32) {
    let seconds = Duration::seconds_for(bars, bpm);
    let clamped = seconds.clamp(Duration::MIN_SECONDS, Duration::MAX_SECONDS);
    if clamped == seconds {
        return (bars, seconds);
    }
    let fitted = Duration::bars_for(clamped, bpm);
    warn!(bars, bpm, fitted, "bar count out of duration range, refitted");
    (fitted, clamped)
}

pub fn dedupe_roles(instruments: Vec<InstrumentRequest>) -> Vec<InstrumentRequest> {
    let mut claimed: Vec<InstrumentRole> = Vec::new();
    instruments
        .into_iter()
        .filter(|instrument| {
            if instrument.role.is_shareable() {
                return true;
            }
            if claimed.contains(&instrument.role) {
                return false;
            }
            claimed.push(instrument.role);
            true
        })
        .collect()
}

fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::registry;
    use midigent_core::EnergyLevel;

    fn instrument(name: &str, role: InstrumentRole) -> InstrumentRequest {
        InstrumentRequest {
            name: name.to_string(),
            role,
            priority: 7,
        }
    }

    #[test]
    fn test_default_draft_seals_soundly() {
        let params = IntentDraft::default().seal(registry());
        assert!(params.invariant_violations().is_empty(), "{:?}", params.invariant_violations());
        assert_eq!(params.duration.bars, Duration::DEFAULT_BARS);
        assert_eq!(params.genre.primary, "pop");
    }

    #[test]
    fn test_tempo_override() {
        let mut draft = IntentDraft::default();
        draft.tempo.bpm = 85;
        draft.tempo.confidence = 0.6;
        draft.apply_numbers(&ExtractedNumbers {
            tempo_bpm: Some(120),
            ..Default::default()
        });
        assert_eq!(draft.tempo.bpm, 120);
        assert_eq!(draft.tempo.source, TempoSource::Explicit);
        assert!(draft.tempo.confidence >= 0.95);
    }

    #[test]
    fn test_stated_bars_survive_inferred_seconds() {
        let mut draft = IntentDraft::default();
        draft.seconds = Some(60);
        draft.apply_numbers(&ExtractedNumbers {
            bars: Some(32),
            ..Default::default()
        });
        let params = draft.seal(registry());
        assert_eq!(params.duration.bars, 32);
        assert!(params.duration.confidence >= 0.9);
        assert!(params.duration.is_coherent(params.tempo.bpm));
    }

    #[test]
    fn test_seconds_win_over_bars() {
        let mut draft = IntentDraft::default();
        draft.tempo.bpm = 120;
        draft.apply_numbers(&ExtractedNumbers {
            bars: Some(8),
            duration_seconds: Some(60),
            ..Default::default()
        });
        let params = draft.seal(registry());
        assert_eq!(params.duration.seconds, 60);
        assert_eq!(params.duration.bars, 30);
    }

    #[test]
    fn test_stated_bars_are_refitted_into_duration_range() {
        let mut short = IntentDraft::default();
        short.apply_numbers(&ExtractedNumbers {
            tempo_bpm: Some(300),
            bars: Some(1),
            ..Default::default()
        });
        let params = short.seal(registry());
        assert_eq!(params.duration.seconds, Duration::MIN_SECONDS);
        assert_eq!(params.duration.bars, 6);
        assert!(params.invariant_violations().is_empty(), "{:?}", params.invariant_violations());

        let mut long = IntentDraft::default();
        long.apply_numbers(&ExtractedNumbers {
            tempo_bpm: Some(30),
            bars: Some(999),
            ..Default::default()
        });
        let params = long.seal(registry());
        assert_eq!(params.duration.seconds, Duration::MAX_SECONDS);
        assert_eq!(params.duration.bars, 450);
        assert!(params.invariant_violations().is_empty(), "{:?}", params.invariant_violations());
    }

    #[test]
    fn test_channels_raise_tracks() {
        let mut draft = IntentDraft::default();
        draft.apply_numbers(&ExtractedNumbers {
            track_count: Some(3),
            channel_count: Some(6),
            ..Default::default()
        });
        assert_eq!(draft.tracks.track_count, Some(6));
        assert!(draft.tracks.confidence >= 0.9);
    }

    #[test]
    fn test_enrich_fills_key_and_palette() {
        let mut draft = IntentDraft::default();
        draft.genre.primary = "lofi".to_string();
        draft.key_confidence = 0.3;
        draft.energy.confidence = 0.2;
        draft.enrich(registry());
        assert_eq!(draft.key_root.as_deref(), Some("D"));
        assert_eq!(draft.scale, Scale::Minor);
        assert_eq!(draft.energy.level, EnergyLevel::Low);
        assert!(!draft.instruments.is_empty());
    }

    #[test]
    fn test_enrich_pads_to_requested_tracks_without_role_conflicts() {
        let mut draft = IntentDraft::default();
        draft.genre.primary = "rock".to_string();
        draft.instruments = vec![instrument("electric_guitar", InstrumentRole::Melody)];
        draft.tracks.track_count = Some(4);
        draft.enrich(registry());
        let melodies = draft
            .instruments
            .iter()
            .filter(|i| i.role == InstrumentRole::Melody)
            .count();
        assert_eq!(melodies, 1);
        assert!(draft.instruments.len() > 1);
        assert!(draft.instruments.len() <= 4);
    }

    #[test]
    fn test_seal_dedupes_and_canonicalizes() {
        let mut draft = IntentDraft::default();
        draft.key_root = Some("f#".to_string());
        draft.instruments = vec![
            instrument("piano", InstrumentRole::Melody),
            instrument("flute", InstrumentRole::Melody),
            instrument("strings", InstrumentRole::Pad),
            instrument("choir", InstrumentRole::Pad),
        ];
        let params = draft.seal(registry());
        assert_eq!(params.key.root, "F#");
        assert_eq!(params.instruments.len(), 3);
        assert!(params.invariant_violations().is_empty());
    }

    #[test]
    fn test_seal_clamps_wild_values() {
        let mut draft = IntentDraft::default();
        draft.genre.primary = "not-a-genre".to_string();
        draft.genre.confidence = 7.0;
        draft.mood.valence = f32::NAN;
        draft.overall_confidence = -1.0;
        draft.seconds = Some(1);
        let params = draft.seal(registry());
        assert_eq!(params.genre.primary, "pop");
        assert_eq!(params.genre.confidence, 1.0);
        assert_eq!(params.mood.valence, 0.0);
        assert_eq!(params.overall_confidence, 0.0);
        assert_eq!(params.duration.seconds, Duration::MIN_SECONDS);
        assert!(params.invariant_violations().is_empty());
    }
}
