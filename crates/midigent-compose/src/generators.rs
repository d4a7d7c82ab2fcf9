//! Track generators
//!
//! A [`TrackGenerator`] turns one planned track into note events. The
//! heuristic generator picks a strategy per track kind, steered by genre,
//! energy and style tags. All randomness comes from the caller's `StdRng`,
//! so a seed fully determines the output.

use midigent_core::{
    EnergyLevel, Note, ParameterSet, Track, TrackKind, TrackSpec, Vocabulary, BEATS_PER_BAR,
    DRUM_CHANNEL,
};
use rand::rngs::StdRng;
use rand::Rng;

use crate::theory::{degree_pitch, drum, gm_program, progression};

/// Everything a generator needs to know about the piece
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// MIDI pitch of the key root
    pub root: i32,
    /// Semitone offsets of the scale
    pub scale: Vec<u8>,
    pub bars: u32,
    pub energy: EnergyLevel,
    /// Registry genre id, e.g. "electronic.techno"
    pub genre: String,
    /// Lowercase production descriptors and moods
    pub tags: Vec<String>,
    /// Shifts deterministic patterns between refinement passes
    pub variation: u32,
    /// Voice melodic and harmony tracks as block chords
    pub as_chords: bool,
}

impl GenerationParams {
    pub fn from_parameters(parameters: &ParameterSet) -> Self {
        let mut tags: Vec<String> = parameters
            .production
            .descriptors
            .iter()
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        tags.push(parameters.mood.primary.to_lowercase());
        if let Some(secondary) = &parameters.mood.secondary {
            tags.push(secondary.to_lowercase());
        }

        Self {
            root: parameters.key.root_pitch() as i32,
            scale: parameters.key.scale.intervals().to_vec(),
            bars: parameters.duration.bars.max(1),
            energy: parameters.energy.level,
            genre: parameters.genre.primary.clone(),
            tags,
            variation: 0,
            as_chords: false,
        }
    }

    pub fn total_beats(&self) -> f64 {
        self.bars as f64 * BEATS_PER_BAR
    }

    /// First segment of the genre id
    pub fn root_genre(&self) -> &str {
        self.genre.split('.').next().unwrap_or(&self.genre)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    fn is_energetic(&self) -> bool {
        self.energy >= EnergyLevel::High
    }

    /// Chord under a bar, rotated by the variation
    fn chord_at(&self, bar: u32) -> &'static [i32] {
        let progression = progression(&self.genre);
        progression[((bar + self.variation) as usize) % progression.len()]
    }
}

pub trait TrackGenerator: Send + Sync {
    fn generate(&self, spec: &TrackSpec, params: &GenerationParams, rng: &mut StdRng)
        -> Vec<Note>;
}

/// Generates a full track: notes plus name, program and channel
pub fn realize(
    generator: &dyn TrackGenerator,
    spec: &TrackSpec,
    params: &GenerationParams,
    rng: &mut StdRng,
) -> Track {
    Track {
        name: format!("{} ({})", spec.kind.as_str(), spec.instrument),
        kind: spec.kind,
        instrument: spec.instrument.clone(),
        program: gm_program(&spec.instrument),
        channel: spec.channel,
        notes: generator.generate(spec, params, rng),
    }
}

/// Stretches or cuts a track to exactly `total_beats`.
///
/// A short track repeats its material in whole-bar phrases until the
/// length is reached. Notes past the end are dropped or shortened.
pub fn fit_to_length(track: &mut Track, total_beats: f64) {
    let length = track.length_beats();
    if track.notes.is_empty() || total_beats <= 0.0 {
        return;
    }

    if length < total_beats {
        let period = ((length / BEATS_PER_BAR).ceil() * BEATS_PER_BAR).max(BEATS_PER_BAR);
        let phrase = track.notes.clone();
        let mut offset = period;
        while offset < total_beats {
            track.notes.extend(phrase.iter().map(|note| Note {
                start: note.start + offset,
                ..note.clone()
            }));
            offset += period;
        }
    }

    track.notes.retain(|note| note.start < total_beats);
    for note in &mut track.notes {
        if note.end() > total_beats {
            note.duration = total_beats - note.start;
        }
    }
}

// ============================================================================
// MELODY STYLES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MelodyStyle {
    /// Sparse long tones
    Minimal,
    /// Rising, falling and arched phrases
    Flowing,
    /// Short repeated cells
    Rhythmic,
    /// Wide leaps and uneven durations
    Chaotic,
    /// Scale runs
    Structured,
    /// Stepwise walk with pitch-dependent durations
    Organic,
}

impl MelodyStyle {
    pub fn select(params: &GenerationParams) -> Self {
        let root = params.root_genre();
        if params.has_tag("ambient") || root == "ambient" || params.has_tag("peaceful") {
            return Self::Minimal;
        }
        if params.has_tag("chaotic") || root == "metal" || params.has_tag("industrial") {
            return Self::Chaotic;
        }
        if params.has_tag("rhythmic") || root == "electronic" || params.genre == "rnb.funk" {
            return Self::Rhythmic;
        }
        if root == "jazz" || root == "classical" {
            return Self::Organic;
        }
        if params.is_energetic() && root != "lofi" {
            return Self::Flowing;
        }
        if params.has_tag("structured") {
            return Self::Structured;
        }
        Self::Organic
    }
}

#[derive(Debug, Clone, Copy)]
enum Contour {
    Ascending,
    Descending,
    Arch,
}

// ============================================================================
// HEURISTIC GENERATOR
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicGenerator;

impl TrackGenerator for HeuristicGenerator {
    fn generate(
        &self,
        spec: &TrackSpec,
        params: &GenerationParams,
        rng: &mut StdRng,
    ) -> Vec<Note> {
        let channel = if spec.kind == TrackKind::Drums {
            DRUM_CHANNEL
        } else {
            spec.channel
        };
        let chordal = params.as_chords
            && matches!(
                spec.kind,
                TrackKind::Lead | TrackKind::CounterMelody | TrackKind::Harmony
            );

        let notes = if chordal {
            chords(params, channel)
        } else {
            match spec.kind {
                TrackKind::Lead => melody(MelodyStyle::select(params), params, channel, rng),
                TrackKind::CounterMelody => counter_melody(params, channel, rng),
                TrackKind::Harmony => chords(params, channel),
                TrackKind::Arpeggio => arpeggio(params, channel, rng),
                TrackKind::Bass => bass(params, channel, rng),
                TrackKind::Pad => pad(params, channel, rng),
                TrackKind::Fx => fx(params, channel, rng),
                TrackKind::Drums => drums(params, rng),
            }
        };
        fit(notes, params.total_beats())
    }
}

fn pick<T: Copy>(rng: &mut StdRng, options: &[T]) -> T {
    options[rng.gen_range(0..options.len())]
}

/// Drops notes past the end, trims overhangs and orders by onset
fn fit(mut notes: Vec<Note>, total_beats: f64) -> Vec<Note> {
    notes.retain(|n| n.start >= 0.0 && n.start < total_beats && n.duration > 0.0);
    for note in &mut notes {
        if note.end() > total_beats {
            note.duration = total_beats - note.start;
        }
    }
    notes.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.pitch.cmp(&b.pitch)));
    notes
}

// ============================================================================
// MELODY
// ============================================================================

fn melody(style: MelodyStyle, params: &GenerationParams, channel: u8, rng: &mut StdRng) -> Vec<Note> {
    let total = params.total_beats();
    let scale = &params.scale;
    let root = params.root;
    let random_degree = |rng: &mut StdRng| rng.gen_range(0..scale.len().max(1)) as i32;
    let mut notes = Vec::new();
    let mut beat = 0.0;

    match style {
        MelodyStyle::Minimal => {
            while beat < total {
                if rng.gen_bool(0.2) {
                    let pitch = degree_pitch(root, scale, random_degree(rng));
                    let duration = pick(rng, &[2.0, 4.0, 8.0]);
                    notes.push(Note::new(pitch, beat, duration, rng.gen_range(40..=60), channel));
                }
                beat += 2.0;
            }
            if notes.is_empty() {
                notes.push(Note::new(root, 0.0, 4.0, 50, channel));
            }
        }
        MelodyStyle::Flowing => {
            while beat < total {
                let contour = pick(rng, &[Contour::Ascending, Contour::Descending, Contour::Arch]);
                let length = pick(rng, &[4.0, 8.0]);
                notes.extend(phrase(root, scale, contour, beat, length, channel));
                beat += length;
            }
        }
        MelodyStyle::Rhythmic => {
            const CELLS: [&[f64]; 3] = [&[0.5, 0.5, 1.0], &[1.0, 1.0, 2.0], &[0.25, 0.25, 0.25, 0.25]];
            while beat < total {
                for &duration in pick(rng, &CELLS) {
                    let pitch = degree_pitch(root, scale, random_degree(rng)) + pick(rng, &[-12, 0, 12]);
                    notes.push(Note::new(pitch, beat, duration, rng.gen_range(65..=100), channel));
                    beat += duration;
                }
            }
        }
        MelodyStyle::Chaotic => {
            while beat < total {
                let pitch =
                    degree_pitch(root, scale, random_degree(rng)) + pick(rng, &[-24, -12, 0, 12, 24]);
                let duration = pick(rng, &[0.125, 0.25, 0.5, 2.0, 3.0]);
                notes.push(Note::new(pitch, beat, duration, rng.gen_range(30..=110), channel));
                beat += duration;
            }
        }
        MelodyStyle::Structured => {
            let mut ascending = true;
            while beat < total {
                for step in 0..8 {
                    let degree = if ascending { step } else { 7 - step };
                    notes.push(Note::new(degree_pitch(root, scale, degree), beat, 1.0, 75, channel));
                    beat += 1.0;
                }
                ascending = !ascending;
            }
        }
        MelodyStyle::Organic => {
            let top = scale.len() as i32 * 2;
            let mut degree = 0;
            while beat < total {
                degree = (degree + rng.gen_range(-2..=2)).clamp(0, top);
                let pitch = degree_pitch(root, scale, degree);
                let duration = if pitch < root + 3 {
                    pick(rng, &[1.0, 1.5, 2.0])
                } else if pitch > root + 12 {
                    pick(rng, &[0.25, 0.5, 0.75])
                } else {
                    pick(rng, &[0.5, 1.0, 1.5])
                };
                notes.push(Note::new(pitch, beat, duration, rng.gen_range(60..=90), channel));
                beat += duration;
            }
        }
    }
    notes
}

/// Half-beat phrase following a contour over one octave of the scale
fn phrase(root: i32, scale: &[u8], contour: Contour, start: f64, length: f64, channel: u8) -> Vec<Note> {
    let count = ((length / 0.5) as i32).max(1);
    let top = scale.len().saturating_sub(1) as i32;
    let half = (count / 2).max(1);
    let duration = length / count as f64;

    (0..count)
        .map(|i| {
            let degree = match contour {
                Contour::Ascending => i * top / count,
                Contour::Descending => top - i * top / count,
                Contour::Arch if i < half => i * top / half,
                Contour::Arch => (top - (i - half) * top / half).max(0),
            };
            Note::new(
                degree_pitch(root, scale, degree),
                start + i as f64 * duration,
                duration,
                75,
                channel,
            )
        })
        .collect()
}

fn counter_melody(params: &GenerationParams, channel: u8, rng: &mut StdRng) -> Vec<Note> {
    let total = params.total_beats();
    let mut notes = Vec::new();
    let mut beat = 0.0;
    while beat < total {
        if rng.gen_bool(0.4) {
            let degree = rng.gen_range(2..5);
            let pitch = degree_pitch(params.root, &params.scale, degree) + pick(rng, &[-12, 0]);
            let duration = pick(rng, &[1.0, 1.5, 2.0]);
            notes.push(Note::new(pitch, beat, duration, rng.gen_range(55..=75), channel));
        }
        beat += 1.0;
    }
    notes
}

// ============================================================================
// HARMONY
// ============================================================================

/// One block chord per bar, an octave below the root
fn chords(params: &GenerationParams, channel: u8) -> Vec<Note> {
    let mut notes = Vec::new();
    for bar in 0..params.bars {
        let start = bar as f64 * BEATS_PER_BAR;
        for interval in params.chord_at(bar) {
            notes.push(Note::new(params.root + interval - 12, start, BEATS_PER_BAR - 0.5, 70, channel));
        }
    }
    notes
}

fn arpeggio(params: &GenerationParams, channel: u8, rng: &mut StdRng) -> Vec<Note> {
    let step = match params.energy {
        EnergyLevel::VeryLow | EnergyLevel::Low => 1.0,
        EnergyLevel::Medium => 0.5,
        EnergyLevel::High | EnergyLevel::VeryHigh => 0.25,
    };
    let mut notes = Vec::new();
    for bar in 0..params.bars {
        let bar_start = bar as f64 * BEATS_PER_BAR;
        let bar_end = bar_start + BEATS_PER_BAR;
        let chord = params.chord_at(bar);
        let mut at = bar_start;
        'bar: loop {
            for interval in chord {
                if at >= bar_end {
                    break 'bar;
                }
                notes.push(Note::new(params.root + interval, at, step * 0.8, rng.gen_range(60..=80), channel));
                at += step;
            }
        }
    }
    notes
}

fn pad(params: &GenerationParams, channel: u8, rng: &mut StdRng) -> Vec<Note> {
    let total = params.total_beats();
    let scale = &params.scale;
    let root = params.root;
    let sustained = |degrees: &[i32], shift: i32, rng: &mut StdRng, velocity: (i32, i32)| -> Vec<Note> {
        degrees
            .iter()
            .map(|&d| {
                Note::new(
                    degree_pitch(root, scale, d) + shift,
                    0.0,
                    total - 0.5,
                    rng.gen_range(velocity.0..=velocity.1),
                    channel,
                )
            })
            .collect()
    };

    if params.has_tag("minimal") {
        return vec![Note::new(root, 0.0, total - 0.5, 35, channel)];
    }
    if params.has_tag("dark") || params.has_tag("melancholic") {
        return sustained(&[0, 2, 4], -12, rng, (30, 50));
    }
    if params.has_tag("bright") || params.has_tag("happy") {
        return sustained(&[0, 2, 4, 7], 0, rng, (40, 60));
    }

    // Evolving blocks rotating through I, iii, V and back
    const ROTATION: [[i32; 3]; 4] = [[0, 2, 4], [2, 4, 6], [4, 6, 8], [0, 2, 4]];
    let bars_per_block = (params.bars / (params.bars / 8).max(2)).max(4);
    let block = bars_per_block as f64 * BEATS_PER_BAR;
    let mut notes = Vec::new();
    let mut index = params.variation as usize;
    let mut start = 0.0;
    while start < total {
        let duration = (block - 0.5).min(total - start - 0.5).max(0.5);
        for &degree in &ROTATION[index % ROTATION.len()] {
            let pitch = degree_pitch(root, scale, degree) - 12;
            notes.push(Note::new(pitch, start, duration, rng.gen_range(38..=58), channel));
        }
        index += 1;
        start += block;
    }
    notes
}

fn fx(params: &GenerationParams, channel: u8, rng: &mut StdRng) -> Vec<Note> {
    let total = params.total_beats();
    let mut notes = Vec::new();
    let mut beat = 0.0;
    while beat < total {
        if rng.gen_bool(0.15) {
            let pitch = params.root + pick(rng, &[0, 7, 12, 19, 24]);
            let duration = pick(rng, &[2.0, 4.0, 8.0]);
            notes.push(Note::new(pitch, beat, duration, rng.gen_range(30..=50), channel));
        }
        beat += pick(rng, &[2.0, 4.0]);
    }
    // Texture tracks still mark their presence once
    if notes.is_empty() {
        notes.push(Note::new(params.root + 12, 0.0, 4.0, 40, channel));
    }
    notes
}

// ============================================================================
// BASS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BassStyle {
    Funky,
    Sustained,
    Walking,
    Power,
    Synth,
    Standard,
}

impl BassStyle {
    fn select(params: &GenerationParams) -> Self {
        let root = params.root_genre();
        if params.has_tag("funky") || params.genre == "rnb.funk" {
            Self::Funky
        } else if root == "ambient" || params.has_tag("peaceful") {
            Self::Sustained
        } else if root == "jazz" {
            Self::Walking
        } else if root == "rock" || root == "metal" {
            Self::Power
        } else if root == "electronic" {
            Self::Synth
        } else {
            Self::Standard
        }
    }
}

fn bass(params: &GenerationParams, channel: u8, rng: &mut StdRng) -> Vec<Note> {
    let style = BassStyle::select(params);
    let energetic = params.is_energetic();
    let mut notes = Vec::new();

    for bar in 0..params.bars {
        let start = bar as f64 * BEATS_PER_BAR;
        let chord = params.chord_at(bar);
        let low = params.root + chord[0] - 24;

        match style {
            BassStyle::Funky => {
                for t in [0.0, 0.5, 1.5, 2.0, 2.5, 3.0, 3.5] {
                    let velocity = if t % 1.0 == 0.0 { 100 } else { 70 };
                    notes.push(Note::new(low, start + t, 0.4, velocity, channel));
                }
            }
            BassStyle::Sustained => {
                notes.push(Note::new(low, start, BEATS_PER_BAR - 0.5, 55, channel));
            }
            BassStyle::Walking => {
                for beat in 0..4 {
                    let tone = chord[beat % chord.len()];
                    notes.push(Note::new(params.root + tone - 24, start + beat as f64, 0.9, 75, channel));
                }
            }
            BassStyle::Power => {
                let count = if energetic { 8 } else { 4 };
                for i in 0..count {
                    let velocity = if i % 2 == 0 { 105 } else { 75 };
                    notes.push(Note::new(low, start + i as f64 * 0.5, 0.4, velocity, channel));
                }
            }
            BassStyle::Synth if energetic => {
                for i in 0..8 {
                    let pitch = if (i / 2) % 2 == 0 { low } else { low + 12 };
                    notes.push(Note::new(pitch, start + i as f64 * 0.5, 0.4, rng.gen_range(80..=100), channel));
                }
            }
            BassStyle::Synth => {
                notes.push(Note::new(low, start, BEATS_PER_BAR - 0.5, 75, channel));
            }
            BassStyle::Standard => {
                for beat in 0..4 {
                    notes.push(Note::new(low, start + beat as f64, 0.9, 80, channel));
                }
            }
        }
    }
    notes
}

// ============================================================================
// DRUMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrumPattern {
    Minimal,
    Swing,
    HipHop,
    FourOnFloor,
    Progressive,
    Epic,
    Standard,
}

impl DrumPattern {
    pub fn select(params: &GenerationParams) -> Self {
        let root = params.root_genre();
        if params.has_tag("minimal") || root == "ambient" {
            Self::Minimal
        } else if params.has_tag("jazzy") || root == "jazz" {
            Self::Swing
        } else if params.has_tag("hip hop") || root == "hiphop" || root == "lofi" {
            Self::HipHop
        } else if root == "electronic" {
            Self::FourOnFloor
        } else if params.has_tag("progressive") || root == "metal" || params.genre == "rock.progressive" {
            Self::Progressive
        } else if params.has_tag("uplifting") || params.has_tag("epic") || params.genre == "cinematic.epic" {
            Self::Epic
        } else {
            Self::Standard
        }
    }
}

fn drums(params: &GenerationParams, rng: &mut StdRng) -> Vec<Note> {
    let pattern = DrumPattern::select(params);
    let energetic = params.is_energetic();
    let mut notes = Vec::new();
    let mut hit = |key: u8, at: f64, duration: f64, velocity: i32| {
        notes.push(Note::new(key as i32, at, duration, velocity, DRUM_CHANNEL));
    };

    for bar in 0..params.bars {
        let s = bar as f64 * BEATS_PER_BAR;
        match pattern {
            DrumPattern::Minimal => {
                hit(drum::KICK, s, 0.5, 100);
                hit(drum::KICK, s + 2.0, 0.5, 100);
            }
            DrumPattern::Swing => {
                hit(drum::KICK, s, 0.5, 90);
                hit(drum::KICK, s + 2.5, 0.5, 80);
                hit(drum::SNARE, s + 1.5, 0.5, 85);
                for t in [0.0, 2.0 / 3.0, 4.0 / 3.0, 2.0, 8.0 / 3.0, 10.0 / 3.0] {
                    hit(drum::RIDE, s + t, 0.2, 70);
                }
            }
            DrumPattern::HipHop => {
                hit(drum::KICK, s, 0.5, 105);
                hit(drum::KICK, s + 2.5, 0.5, 95);
                hit(drum::SNARE, s + 1.5, 0.5, 95);
                hit(drum::SNARE, s + 3.5, 0.5, 85);
                for t in 0..4 {
                    hit(drum::CLOSED_HAT, s + t as f64, 0.25, 50);
                }
            }
            DrumPattern::FourOnFloor => {
                for t in 0..4 {
                    hit(drum::KICK, s + t as f64, 0.5, 105);
                }
                hit(drum::CLAP, s + 1.0, 0.5, 90);
                hit(drum::CLAP, s + 3.0, 0.5, 90);
                let step = if energetic { 0.25 } else { 0.5 };
                let mut t = 0.0;
                while t < BEATS_PER_BAR {
                    let key = if t % 1.0 == 0.5 { drum::OPEN_HAT } else { drum::CLOSED_HAT };
                    hit(key, s + t, 0.2, if t % 1.0 == 0.0 { 70 } else { 55 });
                    t += step;
                }
            }
            DrumPattern::Progressive => {
                let kicks: &[f64] = if energetic {
                    &[0.0, 0.75, 1.5, 2.25, 3.0, 3.75]
                } else {
                    &[0.0, 1.5, 2.5, 3.5]
                };
                for &t in kicks {
                    hit(drum::KICK, s + t, 0.35, 100);
                }
                for t in [1.0, 1.75, 3.0, 3.25] {
                    hit(drum::SNARE, s + t, 0.4, 90);
                }
                for i in 0..8 {
                    let t = i as f64 * 0.5;
                    let key = if i % 2 == 1 { drum::OPEN_HAT } else { drum::CLOSED_HAT };
                    hit(key, s + t, 0.2, rng.gen_range(60..=80));
                }
            }
            DrumPattern::Epic => {
                hit(drum::KICK, s, 0.6, 110);
                hit(drum::KICK, s + 2.0, 0.6, 105);
                hit(drum::KICK, s + 3.5, 0.5, 95);
                hit(drum::SNARE, s + 1.0, 0.5, 100);
                hit(drum::SNARE, s + 3.0, 0.5, 95);
                if bar % 4 == 3 {
                    for (i, tom) in [drum::HIGH_TOM, drum::MID_TOM, drum::MID_TOM, drum::LOW_TOM]
                        .into_iter()
                        .enumerate()
                    {
                        hit(tom, s + 3.0 + i as f64 * 0.25, 0.2, 85);
                    }
                }
            }
            DrumPattern::Standard => {
                hit(drum::KICK, s, 0.5, 100);
                hit(drum::KICK, s + 2.0, 0.5, 100);
                hit(drum::SNARE, s + 1.0, 0.5, 90);
                hit(drum::SNARE, s + 3.0, 0.5, 90);
                for i in 0..8 {
                    let velocity = if i % 2 == 0 { 75 } else { 60 };
                    hit(drum::CLOSED_HAT, s + i as f64 * 0.5, 0.25, velocity);
                }
            }
        }

        // Section marker every four bars, fills shift with the variation
        if bar % 4 == 0 && pattern != DrumPattern::Minimal {
            hit(drum::CRASH, s, 2.0, 85);
        }
        if params.variation % 2 == 1 && bar % 2 == 1 {
            hit(drum::OPEN_HAT, s + 3.5, 0.25, 70);
        }
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use midigent_core::InstrumentRole;
    use rand::SeedableRng;

    fn params(genre: &str, energy: EnergyLevel) -> GenerationParams {
        GenerationParams {
            root: 60,
            scale: vec![0, 2, 4, 5, 7, 9, 11],
            bars: 8,
            energy,
            genre: genre.to_string(),
            tags: Vec::new(),
            variation: 0,
            as_chords: false,
        }
    }

    fn spec(kind: TrackKind, channel: u8) -> TrackSpec {
        TrackSpec {
            kind,
            instrument: "piano".to_string(),
            role: InstrumentRole::Melody,
            priority: 1,
            channel,
        }
    }

    fn generate(kind: TrackKind, p: &GenerationParams, seed: u64) -> Vec<Note> {
        let mut rng = StdRng::seed_from_u64(seed);
        HeuristicGenerator.generate(&spec(kind, 2), p, &mut rng)
    }

    #[test]
    fn test_style_selection() {
        assert_eq!(MelodyStyle::select(&params("ambient", EnergyLevel::Low)), MelodyStyle::Minimal);
        assert_eq!(MelodyStyle::select(&params("metal.doom", EnergyLevel::High)), MelodyStyle::Chaotic);
        assert_eq!(
            MelodyStyle::select(&params("electronic.techno", EnergyLevel::High)),
            MelodyStyle::Rhythmic
        );
        assert_eq!(MelodyStyle::select(&params("jazz", EnergyLevel::High)), MelodyStyle::Organic);
        assert_eq!(MelodyStyle::select(&params("pop", EnergyLevel::High)), MelodyStyle::Flowing);
        assert_eq!(MelodyStyle::select(&params("lofi", EnergyLevel::High)), MelodyStyle::Organic);

        let mut structured = params("folk", EnergyLevel::Medium);
        structured.tags.push("structured".to_string());
        assert_eq!(MelodyStyle::select(&structured), MelodyStyle::Structured);
    }

    #[test]
    fn test_every_kind_fits_the_requested_length() {
        let p = params("pop", EnergyLevel::Medium);
        for &kind in TrackKind::ALL {
            let notes = generate(kind, &p, 7);
            assert!(!notes.is_empty(), "{:?} produced nothing", kind);
            for note in &notes {
                assert!(note.start >= 0.0 && note.end() <= p.total_beats() + 1e-9, "{:?}", kind);
            }
            assert!(notes.windows(2).all(|w| w[0].start <= w[1].start));
        }
    }

    #[test]
    fn test_drums_use_percussion_channel() {
        for genre in ["pop", "electronic.house", "jazz", "lofi", "metal", "cinematic.epic", "ambient"] {
            let notes = generate(TrackKind::Drums, &params(genre, EnergyLevel::High), 1);
            assert!(notes.iter().all(|n| n.channel == DRUM_CHANNEL), "{}", genre);
            assert!(notes.iter().any(|n| n.pitch == drum::KICK), "{}", genre);
        }
    }

    #[test]
    fn test_four_on_floor_with_sixteenth_hats() {
        let notes = generate(TrackKind::Drums, &params("electronic.techno", EnergyLevel::High), 1);
        let first_bar: Vec<_> = notes.iter().filter(|n| n.start < 4.0).collect();
        let kicks = first_bar.iter().filter(|n| n.pitch == drum::KICK).count();
        let hats = first_bar
            .iter()
            .filter(|n| n.pitch == drum::CLOSED_HAT || n.pitch == drum::OPEN_HAT)
            .count();
        assert_eq!(kicks, 4);
        assert_eq!(hats, 16);
    }

    #[test]
    fn test_same_seed_same_notes() {
        let p = params("pop", EnergyLevel::Medium);
        assert_eq!(generate(TrackKind::Lead, &p, 42), generate(TrackKind::Lead, &p, 42));
        assert_ne!(generate(TrackKind::Lead, &p, 42), generate(TrackKind::Lead, &p, 43));
    }

    #[test]
    fn test_as_chords_voices_lead_as_blocks() {
        let mut p = params("pop", EnergyLevel::Medium);
        p.as_chords = true;
        let notes = generate(TrackKind::Lead, &p, 3);
        // Three-note triads, one per bar
        assert_eq!(notes.len(), 3 * p.bars as usize);
        assert!(notes.iter().all(|n| n.start % 4.0 == 0.0));
    }

    #[test]
    fn test_variation_rotates_harmony() {
        let p = params("pop", EnergyLevel::Medium);
        let mut shifted = p.clone();
        shifted.variation = 1;
        assert_ne!(generate(TrackKind::Harmony, &p, 0), generate(TrackKind::Harmony, &shifted, 0));
    }

    #[test]
    fn test_walking_bass_moves_through_chord_tones() {
        let notes = generate(TrackKind::Bass, &params("jazz", EnergyLevel::Medium), 0);
        let first_bar: Vec<u8> = notes.iter().take(4).map(|n| n.pitch).collect();
        assert_eq!(first_bar, vec![36, 40, 43, 47]);
    }

    #[test]
    fn test_realize_sets_program_and_channel() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut s = spec(TrackKind::Pad, 4);
        s.instrument = "synth_pad".to_string();
        let track = realize(&HeuristicGenerator, &s, &params("ambient", EnergyLevel::Low), &mut rng);
        assert_eq!(track.program, 88);
        assert_eq!(track.channel, 4);
        assert_eq!(track.kind, TrackKind::Pad);
        assert!(track.notes.iter().all(|n| n.channel == 4));
    }

    #[test]
    fn test_fit_to_length_repeats_short_phrases_and_cuts_long_ones() {
        let mut track = Track {
            name: "lead (piano)".to_string(),
            kind: TrackKind::Lead,
            instrument: "piano".to_string(),
            program: 0,
            channel: 0,
            notes: (0..6).map(|beat| Note::new(60, beat as f64, 1.0, 80, 0)).collect(),
        };
        fit_to_length(&mut track, 32.0);
        assert_eq!(track.length_beats(), 30.0);
        assert_eq!(track.notes.len(), 24);
        assert_eq!(track.notes[6].start, 8.0);

        track.notes.push(Note::new(64, 30.0, 6.0, 80, 0));
        fit_to_length(&mut track, 16.0);
        assert_eq!(track.length_beats(), 14.0);
        assert!(track.notes.iter().all(|n| n.end() <= 16.0));

        let mut held = track.clone();
        held.notes = vec![Note::new(48, 2.0, 20.0, 80, 0)];
        fit_to_length(&mut held, 8.0);
        assert_eq!(held.notes[0].duration, 6.0);
    }

    #[test]
    fn test_from_parameters() {
        let mut parameters = ParameterSet::default();
        parameters.key.root = "A".to_string();
        parameters.production.descriptors = vec!["Dark".to_string()];
        let p = GenerationParams::from_parameters(&parameters);
        assert_eq!(p.root, 69);
        assert!(p.has_tag("dark"));
        assert_eq!(p.bars, parameters.duration.bars);
    }
}
