//! Validation of provider output.
//!
//! The provider answers with free text that should contain one JSON object.
//! Validation isolates that object, walks it field by field and sorts every
//! problem into one of two buckets:
//! - hard violations (wrong JSON types, numbers out of range, literals
//!   outside a closed vocabulary) fail the attempt, all listed together;
//! - recoverable ones (unknown genre or scale, bad key root, duplicate
//!   roles, incoherent length, ...) are corrected and reported.

use midigent_core::{
    canonical_root, Action, Complexity, Duration, DynamicsArc, EnergyLevel, Genre,
    InstrumentRequest, InstrumentRole, Intensity, Mood, Reference, Scale, TempoSource,
    TimeSignature, Vocabulary,
};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::draft::IntentDraft;
use crate::registry::{resolve_scale, GenreRegistry, FALLBACK_GENRE};

type Object = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("VALIDATION/JSON: {0}")]
    NotJson(String),
    #[error("VALIDATION/SCHEMA: {}", .0.join("; "))]
    Schema(Vec<String>),
}

/// A draft that passed validation, with the corrections applied to it
#[derive(Debug, Clone)]
pub struct Validated {
    pub draft: IntentDraft,
    pub corrections: Vec<String>,
}

/// Strip Markdown fences and return the first balanced `{...}` object
pub fn isolate_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in raw[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse and validate one provider answer
pub fn validate(raw: &str, registry: &GenreRegistry) -> Result<Validated, ValidationError> {
    let json = isolate_json(raw)
        .ok_or_else(|| ValidationError::NotJson("no JSON object in response".to_string()))?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| ValidationError::NotJson(e.to_string()))?;
    let root = value
        .as_object()
        .ok_or_else(|| ValidationError::NotJson("top level is not an object".to_string()))?;

    let mut checker = Checker::default();
    let (mut draft, deferred) = read_draft(root, &mut checker);
    if !checker.violations.is_empty() {
        return Err(ValidationError::Schema(checker.violations));
    }

    let corrections = correct(&mut draft, deferred, registry);
    for correction in &corrections {
        warn!("corrected provider output: {}", correction);
    }
    Ok(Validated { draft, corrections })
}

// ============================================================================
// READING
// ============================================================================

/// Free-text fields resolved during correction rather than reading
#[derive(Default)]
struct Deferred {
    scale: Option<String>,
    time_signature: Option<String>,
}

fn read_draft(root: &Object, c: &mut Checker) -> (IntentDraft, Deferred) {
    let mut draft = IntentDraft::default();
    let mut deferred = Deferred::default();

    if let Some(action) = c.literal::<Action>(Some(root), "action") {
        draft.action = action;
    }
    if let Some(reasoning) = c.string(Some(root), "reasoning") {
        draft.reasoning = reasoning;
    }
    if let Some(confidence) = c.confidence(Some(root), "overall_confidence") {
        draft.overall_confidence = confidence;
    }

    let genre = c.object(root, "genre");
    draft.genre = Genre {
        primary: c.string(genre, "genre.primary").unwrap_or_else(|| FALLBACK_GENRE.to_string()),
        secondary: c.string(genre, "genre.secondary"),
        confidence: c.confidence(genre, "genre.confidence").unwrap_or(0.8),
    };

    let mood = c.object(root, "mood");
    let defaults = Mood::default();
    draft.mood = Mood {
        primary: c.string(mood, "mood.primary").unwrap_or(defaults.primary),
        secondary: c.string(mood, "mood.secondary"),
        valence: c.number(mood, "mood.valence", -1.0, 1.0).unwrap_or(0.0) as f32,
        confidence: c.confidence(mood, "mood.confidence").unwrap_or(defaults.confidence),
    };

    let energy = c.object(root, "energy");
    if let Some(level) = c.literal::<EnergyLevel>(energy, "energy.level") {
        draft.energy.level = level;
    }
    if let Some(confidence) = c.confidence(energy, "energy.confidence") {
        draft.energy.confidence = confidence;
    }

    let tempo = c.object(root, "tempo");
    if let Some(bpm) = c.integer(tempo, "tempo.bpm", 30, 300) {
        draft.tempo.bpm = bpm as u16;
    }
    if let Some(source) = c.string(tempo, "tempo.source") {
        match parse_tempo_source(&source) {
            Some(source) => draft.tempo.source = source,
            None => c.violation(format!(
                "tempo.source: '{}' is not one of explicit, inferred, genre_default",
                source
            )),
        }
    }
    if let Some(confidence) = c.confidence(tempo, "tempo.confidence") {
        draft.tempo.confidence = confidence;
    }

    let key = c.object(root, "key");
    draft.key_root = c.string(key, "key.root");
    deferred.scale = c.string(key, "key.scale");
    if let Some(confidence) = c.confidence(key, "key.confidence") {
        draft.key_confidence = confidence;
    }

    deferred.time_signature = c.string(Some(root), "time_signature");

    let duration = c.object(root, "duration");
    draft.bars = c.integer(duration, "duration.bars", 1, 512).map(|b| b as u32);
    draft.seconds = c
        .integer(
            duration,
            "duration.seconds",
            Duration::MIN_SECONDS as i64,
            Duration::MAX_SECONDS as i64,
        )
        .map(|s| s as u32);
    if let Some(confidence) = c.confidence(duration, "duration.confidence") {
        draft.duration_confidence = confidence;
    }

    let tracks = c
        .object(root, "track_channel")
        .or_else(|| c.object(root, "tracks"));
    draft.tracks.track_count = c.integer(tracks, "track_channel.track_count", 1, 16).map(|n| n as u8);
    draft.tracks.channel_count = c
        .integer(tracks, "track_channel.channel_count", 1, 16)
        .map(|n| n as u8);
    if let Some(confidence) = c.confidence(tracks, "track_channel.confidence") {
        draft.tracks.confidence = confidence;
    }

    draft.instruments = read_instruments(root, c);

    let dynamics = c.object(root, "dynamics");
    if let Some(intensity) = c.literal::<Intensity>(dynamics, "dynamics.intensity") {
        draft.dynamics.intensity = intensity;
    }
    if let Some(arc) = c.literal::<DynamicsArc>(dynamics, "dynamics.arc") {
        draft.dynamics.arc = arc;
    }

    let structure = c.object(root, "structure");
    let flags = [
        ("structure.has_intro", &mut draft.structure.has_intro),
        ("structure.has_verse", &mut draft.structure.has_verse),
        ("structure.has_chorus", &mut draft.structure.has_chorus),
        ("structure.has_bridge", &mut draft.structure.has_bridge),
        ("structure.has_outro", &mut draft.structure.has_outro),
    ];
    for (path, flag) in flags {
        if let Some(value) = c.boolean(structure, path) {
            *flag = value;
        }
    }
    draft.structure.form_hint = c.string(structure, "structure.form_hint");

    let production = c.object(root, "production");
    draft.production.descriptors = c.string_list(production, "production.descriptors");
    if let Some(complexity) = c.literal::<Complexity>(production, "production.complexity") {
        draft.production.complexity = complexity;
    }

    let reference = c.object(root, "reference");
    if reference.is_some() {
        let parsed = Reference {
            artist: c.string(reference, "reference.artist"),
            song: c.string(reference, "reference.song"),
            description: c.string(reference, "reference.description"),
        };
        if parsed.artist.is_some() || parsed.song.is_some() || parsed.description.is_some() {
            draft.reference = Some(parsed);
        }
    }

    (draft, deferred)
}

fn read_instruments(root: &Object, c: &mut Checker) -> Vec<InstrumentRequest> {
    let items = match root.get("instruments") {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            c.violation(format!("instruments: expected array, got {}", kind(other)));
            return Vec::new();
        }
    };

    let mut instruments = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Some(object) = item.as_object() else {
            c.violation(format!("instruments[{}]: expected object, got {}", index, kind(item)));
            continue;
        };
        let name_path = format!("instruments[{}].name", index);
        let role_path = format!("instruments[{}].role", index);
        let priority_path = format!("instruments[{}].priority", index);

        let name = c.string(Some(object), &name_path);
        let role = c
            .literal::<InstrumentRole>(Some(object), &role_path)
            .unwrap_or(InstrumentRole::Harmony);
        let priority = c.integer(Some(object), &priority_path, 1, 10).unwrap_or(5) as u8;

        match name {
            Some(name) if !name.trim().is_empty() => instruments.push(InstrumentRequest {
                name: instrument_name(&name),
                role,
                priority,
            }),
            _ => c.violation(format!("{}: required", name_path)),
        }
    }
    instruments
}

// ============================================================================
// CORRECTIONS
// ============================================================================

fn correct(draft: &mut IntentDraft, deferred: Deferred, registry: &GenreRegistry) -> Vec<String> {
    let mut corrections = Vec::new();

    let requested = draft.genre.primary.clone();
    let resolved = match registry.lookup(&requested) {
        Some(profile) => profile.id.clone(),
        None => FALLBACK_GENRE.to_string(),
    };
    if resolved != requested {
        corrections.push(format!("genre '{}' -> '{}'", requested, resolved));
        draft.genre.primary = resolved;
    }
    if let Some(secondary) = draft.genre.secondary.take() {
        match registry.lookup(&secondary) {
            Some(profile) => draft.genre.secondary = Some(profile.id.clone()),
            None => corrections.push(format!("secondary genre '{}' dropped", secondary)),
        }
    }

    if let Some(raw) = deferred.scale {
        match resolve_scale(&raw) {
            Some(scale) => {
                if scale.as_str() != raw {
                    corrections.push(format!("scale '{}' -> '{}'", raw, scale));
                }
                draft.scale = scale;
            }
            None => {
                corrections.push(format!("scale '{}' unsupported, using major", raw));
                draft.scale = Scale::Major;
            }
        }
    }

    if let Some(raw) = deferred.time_signature {
        match TimeSignature::parse(&raw) {
            Some(signature) => draft.time_signature = signature,
            None => corrections.push(format!("time signature '{}' dropped", raw)),
        }
    }

    if let Some(root) = draft.key_root.take() {
        match canonical_root(&root) {
            Some(canonical) => draft.key_root = Some(canonical),
            None => corrections.push(format!("key root '{}' dropped", root)),
        }
    }

    if draft.tempo.source != TempoSource::Explicit {
        let profile = registry.resolve(&draft.genre.primary);
        if !profile.tempo_in_band(draft.tempo.bpm) {
            let clamped = profile.clamp_tempo(draft.tempo.bpm);
            corrections.push(format!(
                "tempo {} outside {} band {}-{}, clamped to {}",
                draft.tempo.bpm, profile.id, profile.tempo_min, profile.tempo_max, clamped
            ));
            draft.tempo.bpm = clamped;
        }
    }

    let mut claimed: Vec<InstrumentRole> = Vec::new();
    draft.instruments.retain(|instrument| {
        if instrument.role.is_shareable() {
            return true;
        }
        if claimed.contains(&instrument.role) {
            corrections.push(format!(
                "duplicate role {} on '{}' dropped",
                instrument.role.as_str(),
                instrument.name
            ));
            return false;
        }
        claimed.push(instrument.role);
        true
    });

    if draft.energy.level.is_low() && draft.dynamics.intensity == Intensity::Powerful {
        corrections.push(format!(
            "powerful dynamics conflict with {} energy, set to moderate",
            draft.energy.level
        ));
        draft.dynamics.intensity = Intensity::Moderate;
    }

    if let (Some(bars), Some(seconds)) = (draft.bars, draft.seconds) {
        let recomputed = Duration::bars_for(seconds, draft.tempo.bpm);
        if (bars as i64 - recomputed as i64).abs() > 1 {
            corrections.push(format!(
                "{} bars disagree with {}s at {} bpm, recomputed to {}",
                bars, seconds, draft.tempo.bpm, recomputed
            ));
            draft.bars = Some(recomputed);
        }
    }

    corrections
}

fn parse_tempo_source(value: &str) -> Option<TempoSource> {
    match value.trim().to_lowercase().as_str() {
        "genre_default" | "default" => Some(TempoSource::Default),
        other => TempoSource::parse(other),
    }
}

fn instrument_name(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '-'], "_")
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// CHECKER
// ============================================================================

/// Collects violations while reading typed values out of JSON objects.
/// Absent and null fields read as None without a violation.
#[derive(Default)]
struct Checker {
    violations: Vec<String>,
}

impl Checker {
    fn violation(&mut self, message: String) {
        self.violations.push(message);
    }

    fn field<'v>(obj: Option<&'v Object>, path: &str) -> Option<&'v Value> {
        let key = path.rsplit(['.', ']']).next().unwrap_or(path);
        match obj?.get(key)? {
            Value::Null => None,
            value => Some(value),
        }
    }

    fn object<'v>(&mut self, root: &'v Object, key: &str) -> Option<&'v Object> {
        match root.get(key)? {
            Value::Null => None,
            Value::Object(object) => Some(object),
            other => {
                self.violation(format!("{}: expected object, got {}", key, kind(other)));
                None
            }
        }
    }

    fn string(&mut self, obj: Option<&Object>, path: &str) -> Option<String> {
        match Self::field(obj, path)? {
            Value::String(s) => {
                let s = s.trim();
                (!s.is_empty() && s != "null").then(|| s.to_string())
            }
            other => {
                self.violation(format!("{}: expected string, got {}", path, kind(other)));
                None
            }
        }
    }

    fn number(&mut self, obj: Option<&Object>, path: &str, min: f64, max: f64) -> Option<f64> {
        let value = Self::field(obj, path)?;
        let Some(number) = value.as_f64() else {
            self.violation(format!("{}: expected number, got {}", path, kind(value)));
            return None;
        };
        if !(min..=max).contains(&number) {
            self.violation(format!("{}: {} outside [{}, {}]", path, number, min, max));
            return None;
        }
        Some(number)
    }

    fn confidence(&mut self, obj: Option<&Object>, path: &str) -> Option<f32> {
        self.number(obj, path, 0.0, 1.0).map(|n| n as f32)
    }

    fn integer(&mut self, obj: Option<&Object>, path: &str, min: i64, max: i64) -> Option<i64> {
        let value = Self::field(obj, path)?;
        let integer = value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64));
        let Some(integer) = integer else {
            self.violation(format!("{}: expected integer, got {}", path, kind(value)));
            return None;
        };
        if !(min..=max).contains(&integer) {
            self.violation(format!("{}: {} outside [{}, {}]", path, integer, min, max));
            return None;
        }
        Some(integer)
    }

    fn boolean(&mut self, obj: Option<&Object>, path: &str) -> Option<bool> {
        match Self::field(obj, path)? {
            Value::Bool(b) => Some(*b),
            other => {
                self.violation(format!("{}: expected boolean, got {}", path, kind(other)));
                None
            }
        }
    }

    fn literal<V: Vocabulary>(&mut self, obj: Option<&Object>, path: &str) -> Option<V> {
        let text = self.string(obj, path)?;
        match V::parse(&text) {
            Some(value) => Some(value),
            None => {
                self.violation(format!(
                    "{}: '{}' is not one of {}",
                    path,
                    text,
                    V::names().join(", ")
                ));
                None
            }
        }
    }

    fn string_list(&mut self, obj: Option<&Object>, path: &str) -> Vec<String> {
        match Self::field(obj, path) {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    Value::String(_) | Value::Null => None,
                    other => {
                        self.violation(format!("{}: expected strings, got {}", path, kind(other)));
                        None
                    }
                })
                .collect(),
            Some(other) => {
                self.violation(format!("{}: expected array, got {}", path, kind(other)));
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::registry;

    const LOFI: &str = r#"{
        "reasoning": "lofi beat",
        "action": "new",
        "genre": {"primary": "lofi", "secondary": null, "confidence": 0.95},
        "mood": {"primary": "chill", "valence": 0.2, "confidence": 0.8},
        "energy": {"level": "low", "confidence": 0.9},
        "tempo": {"bpm": 82, "source": "genre_default", "confidence": 0.7},
        "key": {"root": "D", "scale": "minor", "confidence": 0.5},
        "duration": {"bars": 32, "seconds": null, "confidence": 0.5},
        "instruments": [
            {"name": "piano", "role": "harmony", "priority": 8},
            {"name": "Electric Bass", "role": "bass", "priority": 7},
            {"name": "drums", "role": "rhythm", "priority": 9}
        ],
        "dynamics": {"intensity": "gentle", "arc": "flat"},
        "production": {"descriptors": ["vinyl"], "complexity": "simple"},
        "reference": null,
        "overall_confidence": 0.85
    }"#;

    #[test]
    fn test_isolate_json_strips_fences_and_prose() {
        let raw = "Sure!\n```json\n{\"a\": {\"b\": \"}\"}}\n```\ntrailing {x}";
        assert_eq!(isolate_json(raw), Some("{\"a\": {\"b\": \"}\"}}"));
        assert_eq!(isolate_json("no object here"), None);
        assert_eq!(isolate_json("{\"open\": 1"), None);
    }

    #[test]
    fn test_valid_lofi_answer() {
        let validated = validate(LOFI, registry()).unwrap();
        let draft = validated.draft;
        assert_eq!(draft.genre.primary, "lofi");
        assert_eq!(draft.energy.level, EnergyLevel::Low);
        assert_eq!(draft.tempo.bpm, 82);
        assert_eq!(draft.tempo.source, TempoSource::Default);
        assert_eq!(draft.key_root.as_deref(), Some("D"));
        assert_eq!(draft.scale, Scale::Minor);
        assert_eq!(draft.bars, Some(32));
        assert_eq!(draft.instruments[1].name, "electric_bass");
        assert!(validated.corrections.is_empty(), "{:?}", validated.corrections);
    }

    #[test]
    fn test_not_json() {
        assert!(matches!(
            validate("I cannot help with that.", registry()),
            Err(ValidationError::NotJson(_))
        ));
        assert!(matches!(
            validate("{\"genre\": }", registry()),
            Err(ValidationError::NotJson(_))
        ));
    }

    #[test]
    fn test_every_hard_violation_is_listed() {
        let raw = r#"{
            "energy": {"level": "loud"},
            "tempo": {"bpm": 999},
            "mood": {"primary": 3},
            "instruments": [{"name": "piano", "role": "singer"}]
        }"#;
        match validate(raw, registry()) {
            Err(ValidationError::Schema(violations)) => {
                assert_eq!(violations.len(), 4, "{:?}", violations);
                assert!(violations.iter().any(|v| v.starts_with("energy.level")));
                assert!(violations.iter().any(|v| v.starts_with("tempo.bpm")));
                assert!(violations.iter().any(|v| v.starts_with("mood.primary")));
                assert!(violations.iter().any(|v| v.starts_with("instruments[0].role")));
            }
            other => panic!("expected schema violations, got {:?}", other),
        }
    }

    #[test]
    fn test_recoverable_problems_are_corrected() {
        let raw = r#"{
            "genre": {"primary": "Lo-Fi"},
            "energy": {"level": "very_low"},
            "tempo": {"bpm": 140, "source": "inferred"},
            "key": {"root": "H", "scale": "aeolian"},
            "duration": {"bars": 100, "seconds": 60},
            "instruments": [
                {"name": "piano", "role": "melody", "priority": 8},
                {"name": "flute", "role": "melody", "priority": 6},
                {"name": "strings", "role": "pad", "priority": 5},
                {"name": "choir", "role": "pad", "priority": 4}
            ],
            "dynamics": {"intensity": "powerful", "arc": "build"}
        }"#;
        let validated = validate(raw, registry()).unwrap();
        let draft = &validated.draft;
        assert_eq!(draft.genre.primary, "lofi");
        assert_eq!(draft.tempo.bpm, 90);
        assert_eq!(draft.key_root, None);
        assert_eq!(draft.scale, Scale::Minor);
        assert_eq!(draft.instruments.len(), 3);
        assert_eq!(draft.dynamics.intensity, Intensity::Moderate);
        assert_eq!(draft.bars, Some(Duration::bars_for(60, 90)));
        assert!(validated.corrections.len() >= 6, "{:?}", validated.corrections);
    }

    #[test]
    fn test_unknown_genre_and_scale_fall_back() {
        let raw = r#"{"genre": {"primary": "space polka"}, "key": {"scale": "martian"}}"#;
        let validated = validate(raw, registry()).unwrap();
        assert_eq!(validated.draft.genre.primary, "pop");
        assert_eq!(validated.draft.scale, Scale::Major);
    }

    #[test]
    fn test_explicit_tempo_is_not_clamped() {
        let raw = r#"{"genre": {"primary": "lofi"}, "tempo": {"bpm": 150, "source": "explicit"}}"#;
        let validated = validate(raw, registry()).unwrap();
        assert_eq!(validated.draft.tempo.bpm, 150);
    }

    #[test]
    fn test_empty_object_gives_defaults() {
        let validated = validate("{}", registry()).unwrap();
        assert_eq!(validated.draft.genre.primary, "pop");
        assert!(validated.draft.instruments.is_empty());
    }
}
