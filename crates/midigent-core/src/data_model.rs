//! Data Model: ParameterSet, ExtractedNumbers, ExtractionReport
//!
//! The ParameterSet is the typed, validated intent produced once per request
//! by the intent engine. Every field is populated; downstream stages never
//! have to deal with "unknown".
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// VOCABULARIES
// ============================================================================

/// A closed set of string literals shared with the understanding provider.
pub trait Vocabulary: Sized + Copy + 'static {
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;

    fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str().eq_ignore_ascii_case(value))
    }

    fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|v| v.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Vocabulary for EnergyLevel {
    const ALL: &'static [Self] = &[
        Self::VeryLow,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::VeryHigh,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }
}

impl EnergyLevel {
    /// One step up, saturating at very_high
    pub fn raised(self) -> Self {
        match self {
            Self::VeryLow => Self::Low,
            Self::Low => Self::Medium,
            Self::Medium => Self::High,
            Self::High | Self::VeryHigh => Self::VeryHigh,
        }
    }

    pub fn is_low(self) -> bool {
        matches!(self, Self::VeryLow | Self::Low)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempoSource {
    Explicit,
    Inferred,
    Default,
}

impl Vocabulary for TempoSource {
    const ALL: &'static [Self] = &[Self::Explicit, Self::Inferred, Self::Default];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Inferred => "inferred",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentRole {
    Melody,
    Harmony,
    Bass,
    Rhythm,
    Pad,
    Lead,
    Arpeggio,
    Fx,
}

impl Vocabulary for InstrumentRole {
    const ALL: &'static [Self] = &[
        Self::Melody,
        Self::Harmony,
        Self::Bass,
        Self::Rhythm,
        Self::Pad,
        Self::Lead,
        Self::Arpeggio,
        Self::Fx,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Melody => "melody",
            Self::Harmony => "harmony",
            Self::Bass => "bass",
            Self::Rhythm => "rhythm",
            Self::Pad => "pad",
            Self::Lead => "lead",
            Self::Arpeggio => "arpeggio",
            Self::Fx => "fx",
        }
    }
}

impl InstrumentRole {
    /// Several instruments may share harmony and pad duties; every other
    /// role has at most one claimant.
    pub fn is_shareable(self) -> bool {
        matches!(self, Self::Harmony | Self::Pad)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Minimal,
    Gentle,
    Moderate,
    Strong,
    Powerful,
}

impl Vocabulary for Intensity {
    const ALL: &'static [Self] = &[
        Self::Minimal,
        Self::Gentle,
        Self::Moderate,
        Self::Strong,
        Self::Powerful,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Gentle => "gentle",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
            Self::Powerful => "powerful",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicsArc {
    Flat,
    Build,
    Decay,
    Wave,
    Dynamic,
}

impl Vocabulary for DynamicsArc {
    const ALL: &'static [Self] = &[Self::Flat, Self::Build, Self::Decay, Self::Wave, Self::Dynamic];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Build => "build",
            Self::Decay => "decay",
            Self::Wave => "wave",
            Self::Dynamic => "dynamic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Rich,
    VeryComplex,
}

impl Vocabulary for Complexity {
    const ALL: &'static [Self] = &[Self::Simple, Self::Moderate, Self::Rich, Self::VeryComplex];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Rich => "rich",
            Self::VeryComplex => "very_complex",
        }
    }
}

impl Complexity {
    /// Track count an arrangement of this complexity is expected to reach
    pub fn expected_tracks(self) -> usize {
        match self {
            Self::Simple => 2,
            Self::Moderate => 3,
            Self::Rich => 4,
            Self::VeryComplex => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    New,
    Extend,
    Modify,
    Analyze,
}

impl Vocabulary for Action {
    const ALL: &'static [Self] = &[Self::New, Self::Extend, Self::Modify, Self::Analyze];

    fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Extend => "extend",
            Self::Modify => "modify",
            Self::Analyze => "analyze",
        }
    }
}

/// Supported scales. Anything else coming from the provider is coerced to
/// one of these before a ParameterSet is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Major,
    Minor,
    Dorian,
    Mixolydian,
    PentatonicMajor,
    PentatonicMinor,
    Blues,
    HarmonicMinor,
    Phrygian,
    Lydian,
    Locrian,
    MelodicMinor,
    PhrygianDominant,
    LydianDominant,
    WholeTone,
    DiminishedWholeHalf,
    DiminishedHalfWhole,
    Chromatic,
    HungarianMinor,
    DoubleHarmonic,
    Hijaz,
    MaqamBayati,
    RagaBhairav,
    RagaYaman,
    JapaneseIn,
    JapaneseYo,
    ChinesePentatonic,
    BalinesePelog,
    EthiopianTizita,
    KlezmerFreygish,
}

impl Vocabulary for Scale {
    const ALL: &'static [Self] = &[
        Self::Major,
        Self::Minor,
        Self::Dorian,
        Self::Mixolydian,
        Self::PentatonicMajor,
        Self::PentatonicMinor,
        Self::Blues,
        Self::HarmonicMinor,
        Self::Phrygian,
        Self::Lydian,
        Self::Locrian,
        Self::MelodicMinor,
        Self::PhrygianDominant,
        Self::LydianDominant,
        Self::WholeTone,
        Self::DiminishedWholeHalf,
        Self::DiminishedHalfWhole,
        Self::Chromatic,
        Self::HungarianMinor,
        Self::DoubleHarmonic,
        Self::Hijaz,
        Self::MaqamBayati,
        Self::RagaBhairav,
        Self::RagaYaman,
        Self::JapaneseIn,
        Self::JapaneseYo,
        Self::ChinesePentatonic,
        Self::BalinesePelog,
        Self::EthiopianTizita,
        Self::KlezmerFreygish,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Dorian => "dorian",
            Self::Mixolydian => "mixolydian",
            Self::PentatonicMajor => "pentatonic_major",
            Self::PentatonicMinor => "pentatonic_minor",
            Self::Blues => "blues",
            Self::HarmonicMinor => "harmonic_minor",
            Self::Phrygian => "phrygian",
            Self::Lydian => "lydian",
            Self::Locrian => "locrian",
            Self::MelodicMinor => "melodic_minor",
            Self::PhrygianDominant => "phrygian_dominant",
            Self::LydianDominant => "lydian_dominant",
            Self::WholeTone => "whole_tone",
            Self::DiminishedWholeHalf => "diminished_whole_half",
            Self::DiminishedHalfWhole => "diminished_half_whole",
            Self::Chromatic => "chromatic",
            Self::HungarianMinor => "hungarian_minor",
            Self::DoubleHarmonic => "double_harmonic",
            Self::Hijaz => "hijaz",
            Self::MaqamBayati => "maqam_bayati",
            Self::RagaBhairav => "raga_bhairav",
            Self::RagaYaman => "raga_yaman",
            Self::JapaneseIn => "japanese_in",
            Self::JapaneseYo => "japanese_yo",
            Self::ChinesePentatonic => "chinese_pentatonic",
            Self::BalinesePelog => "balinese_pelog",
            Self::EthiopianTizita => "ethiopian_tizita",
            Self::KlezmerFreygish => "klezmer_freygish",
        }
    }
}

impl Scale {
    /// Semitone offsets from the root
    pub fn intervals(self) -> &'static [u8] {
        match self {
            Self::Major => &[0, 2, 4, 5, 7, 9, 11],
            Self::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Self::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Self::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Self::PentatonicMajor => &[0, 2, 4, 7, 9],
            Self::PentatonicMinor => &[0, 3, 5, 7, 10],
            Self::Blues => &[0, 3, 5, 6, 7, 10],
            Self::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Self::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Self::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Self::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            Self::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],
            Self::PhrygianDominant => &[0, 1, 4, 5, 7, 8, 10],
            Self::LydianDominant => &[0, 2, 4, 6, 7, 9, 10],
            Self::WholeTone => &[0, 2, 4, 6, 8, 10],
            Self::DiminishedWholeHalf => &[0, 2, 3, 5, 6, 8, 9, 11],
            Self::DiminishedHalfWhole => &[0, 1, 3, 4, 6, 7, 9, 10],
            Self::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            Self::HungarianMinor => &[0, 2, 3, 6, 7, 8, 11],
            Self::DoubleHarmonic => &[0, 1, 4, 5, 7, 8, 11],
            Self::Hijaz => &[0, 1, 4, 5, 7, 8, 10],
            Self::MaqamBayati => &[0, 2, 3, 5, 7, 8, 10],
            Self::RagaBhairav => &[0, 1, 4, 5, 7, 8, 11],
            Self::RagaYaman => &[0, 2, 4, 6, 7, 9, 11],
            Self::JapaneseIn => &[0, 1, 5, 7, 8],
            Self::JapaneseYo => &[0, 2, 5, 7, 9],
            Self::ChinesePentatonic => &[0, 2, 4, 7, 9],
            Self::BalinesePelog => &[0, 1, 3, 7, 8],
            Self::EthiopianTizita => &[0, 2, 4, 7, 9],
            Self::KlezmerFreygish => &[0, 1, 4, 5, 7, 8, 10],
        }
    }

    /// Whether the third above the root is minor
    pub fn is_minor(self) -> bool {
        self.intervals().contains(&3) && !self.intervals().contains(&4)
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for EnergyLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PITCH NAMES
// ============================================================================

const PITCH_CLASSES: &[(&str, u8)] = &[
    ("C", 0),
    ("C#", 1),
    ("Db", 1),
    ("D", 2),
    ("D#", 3),
    ("Eb", 3),
    ("E", 4),
    ("F", 5),
    ("F#", 6),
    ("Gb", 6),
    ("G", 7),
    ("G#", 8),
    ("Ab", 8),
    ("A", 9),
    ("A#", 10),
    ("Bb", 10),
    ("B", 11),
];

/// Canonical spelling of a key root ("c#" -> "C#", "bb" -> "Bb"), or None
/// when the text is not one of the twelve pitch names.
pub fn canonical_root(root: &str) -> Option<String> {
    let root = root.trim();
    let mut chars = root.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let accidental: String = chars.collect();
    let candidate = format!("{}{}", letter, accidental.replace('♯', "#").replace('♭', "b"));
    PITCH_CLASSES
        .iter()
        .find(|(name, _)| *name == candidate)
        .map(|(name, _)| name.to_string())
}

/// Pitch class 0..=11 of a canonical root
pub fn pitch_class(root: &str) -> Option<u8> {
    PITCH_CLASSES
        .iter()
        .find(|(name, _)| *name == root)
        .map(|(_, pc)| *pc)
}

// ============================================================================
// PARAMETER SET
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    /// Registry id, e.g. "lofi" or "electronic.house"
    pub primary: String,
    pub secondary: Option<String>,
    pub confidence: f32,
}

impl Default for Genre {
    fn default() -> Self {
        Self {
            primary: "pop".to_string(),
            secondary: None,
            confidence: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mood {
    pub primary: String,
    pub secondary: Option<String>,
    /// -1.0 (dark) ..= 1.0 (bright)
    pub valence: f32,
    pub confidence: f32,
}

impl Default for Mood {
    fn default() -> Self {
        Self {
            primary: "neutral".to_string(),
            secondary: None,
            valence: 0.0,
            confidence: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Energy {
    pub level: EnergyLevel,
    pub confidence: f32,
}

impl Default for Energy {
    fn default() -> Self {
        Self {
            level: EnergyLevel::Medium,
            confidence: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    /// 30..=300
    pub bpm: u16,
    pub source: TempoSource,
    pub confidence: f32,
}

impl Tempo {
    pub const MIN_BPM: u16 = 30;
    pub const MAX_BPM: u16 = 300;
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            bpm: 120,
            source: TempoSource::Default,
            confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    pub root: String,
    pub scale: Scale,
    pub confidence: f32,
}

impl Key {
    /// MIDI note number of the root in the octave starting at middle C
    pub fn root_pitch(&self) -> u8 {
        60 + pitch_class(&self.root).unwrap_or(0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.root, self.scale)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Duration {
    pub bars: u32,
    pub seconds: u32,
    pub confidence: f32,
}

impl Duration {
    pub const MIN_SECONDS: u32 = 5;
    pub const MAX_SECONDS: u32 = 3600;
    pub const DEFAULT_BARS: u32 = 16;

    /// Bars of 4/4 that fit in `seconds` at `bpm`, at least one
    pub fn bars_for(seconds: u32, bpm: u16) -> u32 {
        let bars = (seconds as f64 * bpm as f64 / 240.0).round() as u32;
        bars.max(1)
    }

    /// Seconds taken by `bars` of 4/4 at `bpm`
    pub fn seconds_for(bars: u32, bpm: u16) -> u32 {
        let bpm = bpm.max(1) as f64;
        (bars as f64 * 240.0 / bpm).round() as u32
    }

    /// Whether bars and seconds agree within one bar at this tempo
    pub fn is_coherent(&self, bpm: u16) -> bool {
        let expected = (self.seconds as f64 * bpm as f64 / 240.0).round() as i64;
        (self.bars as i64 - expected).abs() <= 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackRequest {
    pub track_count: Option<u8>,
    pub channel_count: Option<u8>,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRequest {
    pub name: String,
    pub role: InstrumentRole,
    /// 1..=10, higher is more important
    pub priority: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dynamics {
    pub intensity: Intensity,
    pub arc: DynamicsArc,
}

impl Default for Dynamics {
    fn default() -> Self {
        Self {
            intensity: Intensity::Moderate,
            arc: DynamicsArc::Flat,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub has_intro: bool,
    pub has_verse: bool,
    pub has_chorus: bool,
    pub has_bridge: bool,
    pub has_outro: bool,
    pub form_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Production {
    pub descriptors: Vec<String>,
    pub complexity: Complexity,
}

impl Default for Production {
    fn default() -> Self {
        Self {
            descriptors: Vec::new(),
            complexity: Complexity::Moderate,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub artist: Option<String>,
    pub song: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    /// Accepts "N/M" with a power-of-two denominator up to 32
    pub fn parse(text: &str) -> Option<Self> {
        let (num, den) = text.trim().split_once('/')?;
        let numerator: u8 = num.trim().parse().ok()?;
        let denominator: u8 = den.trim().parse().ok()?;
        if !(1..=32).contains(&numerator) {
            return None;
        }
        if !matches!(denominator, 1 | 2 | 4 | 8 | 16 | 32) {
            return None;
        }
        Some(Self {
            numerator,
            denominator,
        })
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// The validated intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub action: Action,
    pub genre: Genre,
    pub mood: Mood,
    pub energy: Energy,
    pub tempo: Tempo,
    pub key: Key,
    pub time_signature: TimeSignature,
    pub duration: Duration,
    pub tracks: TrackRequest,
    pub instruments: Vec<InstrumentRequest>,
    pub dynamics: Dynamics,
    pub structure: Structure,
    pub production: Production,
    pub reference: Option<Reference>,
    pub overall_confidence: f32,
    pub reasoning: String,
}

impl Default for ParameterSet {
    /// A plain pop sketch: C major, 120 BPM, 16 bars, the pop palette.
    fn default() -> Self {
        let instrument = |name: &str, role, priority| InstrumentRequest {
            name: name.to_string(),
            role,
            priority,
        };
        Self {
            action: Action::New,
            genre: Genre::default(),
            mood: Mood::default(),
            energy: Energy::default(),
            tempo: Tempo::default(),
            key: Key {
                root: "C".to_string(),
                scale: Scale::Major,
                confidence: 0.5,
            },
            time_signature: TimeSignature::default(),
            duration: Duration {
                bars: Duration::DEFAULT_BARS,
                seconds: Duration::seconds_for(Duration::DEFAULT_BARS, 120),
                confidence: 0.5,
            },
            tracks: TrackRequest::default(),
            instruments: vec![
                instrument("electric_guitar", InstrumentRole::Melody, 8),
                instrument("piano", InstrumentRole::Harmony, 7),
                instrument("electric_bass", InstrumentRole::Bass, 8),
                instrument("drums", InstrumentRole::Rhythm, 9),
            ],
            dynamics: Dynamics::default(),
            structure: Structure::default(),
            production: Production::default(),
            reference: None,
            overall_confidence: 0.5,
            reasoning: String::new(),
        }
    }
}

impl ParameterSet {
    /// Every confidence value with the field it belongs to
    pub fn confidences(&self) -> Vec<(&'static str, f32)> {
        vec![
            ("genre", self.genre.confidence),
            ("mood", self.mood.confidence),
            ("energy", self.energy.confidence),
            ("tempo", self.tempo.confidence),
            ("key", self.key.confidence),
            ("duration", self.duration.confidence),
            ("tracks", self.tracks.confidence),
            ("overall", self.overall_confidence),
        ]
    }

    /// Describes every broken invariant; empty when the set is sound.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for (field, confidence) in self.confidences() {
            if !(0.0..=1.0).contains(&confidence) || confidence.is_nan() {
                violations.push(format!("{} confidence {} outside [0,1]", field, confidence));
            }
        }
        if !(-1.0..=1.0).contains(&self.mood.valence) {
            violations.push(format!("valence {} outside [-1,1]", self.mood.valence));
        }
        if !(Tempo::MIN_BPM..=Tempo::MAX_BPM).contains(&self.tempo.bpm) {
            violations.push(format!("bpm {} outside [30,300]", self.tempo.bpm));
        }
        if self.duration.bars == 0 {
            violations.push("duration has zero bars".to_string());
        }
        if !(Duration::MIN_SECONDS..=Duration::MAX_SECONDS).contains(&self.duration.seconds) {
            violations.push(format!(
                "duration {}s outside [{},{}]",
                self.duration.seconds,
                Duration::MIN_SECONDS,
                Duration::MAX_SECONDS
            ));
        }
        if !self.duration.is_coherent(self.tempo.bpm) {
            violations.push(format!(
                "{} bars incoherent with {}s at {} bpm",
                self.duration.bars, self.duration.seconds, self.tempo.bpm
            ));
        }
        if canonical_root(&self.key.root).is_none() {
            violations.push(format!("key root '{}' is not a pitch name", self.key.root));
        }
        if self.genre.primary.is_empty() {
            violations.push("genre is empty".to_string());
        }
        if self.instruments.is_empty() {
            violations.push("no instruments".to_string());
        }

        let mut claimed = Vec::new();
        for instrument in &self.instruments {
            if !(1..=10).contains(&instrument.priority) {
                violations.push(format!(
                    "{} priority {} outside [1,10]",
                    instrument.name, instrument.priority
                ));
            }
            if instrument.role.is_shareable() {
                continue;
            }
            if claimed.contains(&instrument.role) {
                violations.push(format!("role {} claimed twice", instrument.role.as_str()));
            }
            claimed.push(instrument.role);
        }

        violations
    }

    /// Instruments ordered by descending priority
    pub fn instruments_by_priority(&self) -> Vec<&InstrumentRequest> {
        let mut sorted: Vec<&InstrumentRequest> = self.instruments.iter().collect();
        sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
        sorted
    }
}

// ============================================================================
// PREPROCESSOR OUTPUT
// ============================================================================

/// Literal values found deterministically in the request text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedNumbers {
    pub tempo_bpm: Option<u16>,
    pub duration_seconds: Option<u32>,
    pub bars: Option<u32>,
    pub track_count: Option<u8>,
    pub channel_count: Option<u8>,
    pub time_signature: Option<TimeSignature>,
}

impl ExtractedNumbers {
    pub fn has_values(&self) -> bool {
        self.tempo_bpm.is_some()
            || self.duration_seconds.is_some()
            || self.bars.is_some()
            || self.track_count.is_some()
            || self.channel_count.is_some()
            || self.time_signature.is_some()
    }

    /// Human-readable summary embedded into the extraction prompt
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(bpm) = self.tempo_bpm {
            parts.push(format!("Tempo: {} BPM (explicitly stated)", bpm));
        }
        if let Some(seconds) = self.duration_seconds {
            parts.push(format!("Duration: {} seconds", seconds));
        }
        if let Some(bars) = self.bars {
            parts.push(format!("Length: {} bars", bars));
        }
        if let Some(tracks) = self.track_count {
            parts.push(format!("Tracks: {}", tracks));
        }
        if let Some(channels) = self.channel_count {
            parts.push(format!("Channels: {}", channels));
        }
        if let Some(ts) = self.time_signature {
            parts.push(format!("Time signature: {}", ts));
        }
        parts.join("; ")
    }
}

// ============================================================================
// EXTRACTION REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionOrigin {
    Provider { name: String },
    Fallback,
}

impl fmt::Display for ExtractionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Provider { name } => write!(f, "provider:{}", name),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// How a ParameterSet came to be
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub origin: ExtractionOrigin,
    /// Outbound provider calls made (0..=2)
    pub attempts: u8,
    pub failures: Vec<String>,
    pub corrections: Vec<String>,
    pub numbers: ExtractedNumbers,
    pub normalized_text: String,
}
