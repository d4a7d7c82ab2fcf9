//! Genre registry.
//!
//! Loaded from `data/genres.yaml` (embedded at compile time) and compiled
//! into lookup maps. Ids are dotted paths: `lofi`, `electronic.house`.
//! Lookups try the id, then aliases, then the leaf of a dotted id.

use lazy_static::lazy_static;
use midigent_core::{EnergyLevel, InstrumentRequest, InstrumentRole, Scale, Vocabulary};
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

const GENRES_YAML: &str = include_str!("../data/genres.yaml");

/// Genre every failed lookup resolves to
pub const FALLBACK_GENRE: &str = "pop";

/// Genre roots whose palettes carry no beat
const BEATLESS_ROOTS: &[&str] = &["ambient", "classical", "cinematic"];

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("REGISTRY/PARSE: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("REGISTRY/INVALID: {0}")]
    Invalid(String),
}

// ============================================================================
// FILE FORMAT
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GenreFile {
    pub version: String,
    pub genres: Vec<GenreEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenreEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub tempo: (u16, u16),
    pub key: String,
    pub scale: String,
    pub energy: EnergyLevel,
    pub tracks: u8,
    #[serde(default)]
    pub instruments: Vec<(String, InstrumentRole, u8)>,
}

// ============================================================================
// COMPILED REGISTRY
// ============================================================================

/// One compiled genre
#[derive(Debug, Clone)]
pub struct GenreProfile {
    pub id: String,
    pub name: String,
    pub aliases: Vec<String>,
    pub tempo_min: u16,
    pub tempo_max: u16,
    pub key_root: String,
    pub scale: Scale,
    pub energy: EnergyLevel,
    pub tracks: u8,
    pub instruments: Vec<InstrumentRequest>,
}

impl GenreProfile {
    /// First path segment: "electronic" for "electronic.house"
    pub fn root(&self) -> &str {
        root_of(&self.id)
    }

    pub fn parent(&self) -> Option<&str> {
        self.id.rsplit_once('.').map(|(parent, _)| parent)
    }

    pub fn tempo_center(&self) -> u16 {
        (self.tempo_min + self.tempo_max) / 2
    }

    pub fn clamp_tempo(&self, bpm: u16) -> u16 {
        bpm.clamp(self.tempo_min, self.tempo_max)
    }

    pub fn tempo_in_band(&self, bpm: u16) -> bool {
        (self.tempo_min..=self.tempo_max).contains(&bpm)
    }

    /// Whether the arrangement is expected to carry drums
    pub fn is_rhythmic(&self) -> bool {
        !BEATLESS_ROOTS.contains(&self.root())
    }
}

#[derive(Debug, Clone)]
pub struct GenreRegistry {
    genres: Vec<GenreProfile>,
    by_id: HashMap<String, usize>,
    by_alias: HashMap<String, usize>,
    by_leaf: HashMap<String, usize>,
}

impl GenreRegistry {
    /// The registry shipped with the crate
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_yaml(GENRES_YAML)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, RegistryError> {
        let file: GenreFile = serde_yaml::from_str(yaml)?;

        let mut genres = Vec::with_capacity(file.genres.len());
        let mut by_id = HashMap::new();
        let mut by_alias = HashMap::new();
        let mut by_leaf = HashMap::new();

        for entry in file.genres {
            let profile = compile_entry(entry)?;
            let index = genres.len();

            if by_id.insert(profile.id.clone(), index).is_some() {
                return Err(RegistryError::Invalid(format!(
                    "duplicate genre id '{}'",
                    profile.id
                )));
            }
            for alias in &profile.aliases {
                by_alias.entry(lookup_key(alias)).or_insert(index);
            }
            by_alias.entry(lookup_key(&profile.name)).or_insert(index);
            if let Some((_, leaf)) = profile.id.rsplit_once('.') {
                by_leaf.entry(leaf.to_string()).or_insert(index);
            }
            genres.push(profile);
        }

        if !by_id.contains_key(FALLBACK_GENRE) {
            return Err(RegistryError::Invalid(format!(
                "registry has no '{}' genre",
                FALLBACK_GENRE
            )));
        }

        Ok(Self {
            genres,
            by_id,
            by_alias,
            by_leaf,
        })
    }

    pub fn get(&self, id: &str) -> Option<&GenreProfile> {
        self.by_id.get(id).map(|&index| &self.genres[index])
    }

    /// Id, then alias, then leaf name. Case, spaces and hyphens are
    /// ignored.
    pub fn lookup(&self, name: &str) -> Option<&GenreProfile> {
        let key = lookup_key(name);
        if key.is_empty() {
            return None;
        }
        let index = self
            .by_id
            .get(&key)
            .or_else(|| self.by_alias.get(&key))
            .or_else(|| self.by_leaf.get(&key))?;
        Some(&self.genres[*index])
    }

    /// Like [`lookup`](Self::lookup) but never misses
    pub fn resolve(&self, name: &str) -> &GenreProfile {
        self.lookup(name).unwrap_or_else(|| self.fallback())
    }

    pub fn fallback(&self) -> &GenreProfile {
        &self.genres[self.by_id[FALLBACK_GENRE]]
    }

    /// Instrument palette of a genre, inherited from the closest ancestor
    /// that has one.
    pub fn palette(&self, id: &str) -> &[InstrumentRequest] {
        let mut current = id;
        loop {
            if let Some(profile) = self.get(current) {
                if !profile.instruments.is_empty() {
                    return &profile.instruments;
                }
            }
            match current.rsplit_once('.') {
                Some((parent, _)) => current = parent,
                None => return &self.fallback().instruments,
            }
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.genres.iter().map(|g| g.id.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GenreProfile> {
        self.genres.iter()
    }

    pub fn len(&self) -> usize {
        self.genres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
    }
}

lazy_static! {
    static ref BUILTIN: GenreRegistry =
        GenreRegistry::builtin().expect("embedded genre registry is valid");
}

/// Shared instance of the built-in registry
pub fn registry() -> &'static GenreRegistry {
    &BUILTIN
}

fn compile_entry(entry: GenreEntry) -> Result<GenreProfile, RegistryError> {
    let (tempo_min, tempo_max) = entry.tempo;
    if tempo_min > tempo_max {
        return Err(RegistryError::Invalid(format!(
            "{}: tempo band {}..{} is inverted",
            entry.id, tempo_min, tempo_max
        )));
    }
    let scale = resolve_scale(&entry.scale).ok_or_else(|| {
        RegistryError::Invalid(format!("{}: unknown scale '{}'", entry.id, entry.scale))
    })?;
    let key_root = midigent_core::canonical_root(&entry.key).ok_or_else(|| {
        RegistryError::Invalid(format!("{}: bad key root '{}'", entry.id, entry.key))
    })?;

    Ok(GenreProfile {
        id: entry.id,
        name: entry.name,
        aliases: entry.aliases,
        tempo_min,
        tempo_max,
        key_root,
        scale,
        energy: entry.energy,
        tracks: entry.tracks,
        instruments: entry
            .instruments
            .into_iter()
            .map(|(name, role, priority)| InstrumentRequest {
                name,
                role,
                priority: priority.clamp(1, 10),
            })
            .collect(),
    })
}

// ============================================================================
// SCALES
// ============================================================================

const SCALE_ALIASES: &[(&str, Scale)] = &[
    ("natural_minor", Scale::Minor),
    ("aeolian", Scale::Minor),
    ("ionian", Scale::Major),
    ("arabic", Scale::DoubleHarmonic),
    ("byzantine", Scale::DoubleHarmonic),
    ("persian", Scale::DoubleHarmonic),
    ("spanish", Scale::PhrygianDominant),
    ("flamenco", Scale::PhrygianDominant),
    ("gypsy", Scale::HungarianMinor),
    ("romani", Scale::HungarianMinor),
    ("japanese", Scale::JapaneseIn),
    ("egyptian", Scale::Phrygian),
    ("chinese", Scale::ChinesePentatonic),
    ("indian", Scale::RagaBhairav),
    ("freygish", Scale::KlezmerFreygish),
    ("pentatonic", Scale::PentatonicMajor),
    ("whole_tone_scale", Scale::WholeTone),
];

/// Direct name, alias, then normalized form
pub fn resolve_scale(name: &str) -> Option<Scale> {
    if let Some(scale) = Scale::parse(name) {
        return Some(scale);
    }
    let alias = |key: &str| {
        SCALE_ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, scale)| *scale)
    };
    if let Some(scale) = alias(name.trim()) {
        return Some(scale);
    }
    let normalized = lookup_key(name);
    let normalized = normalized.trim_end_matches("_scale");
    Scale::parse(normalized).or_else(|| alias(normalized))
}

// ============================================================================
// HELPERS
// ============================================================================

fn lookup_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(['-', ' '], "_")
}

fn root_of(id: &str) -> &str {
    id.split('.').next().unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_loads() {
        let registry = GenreRegistry::builtin().unwrap();
        assert!(registry.len() > 100);
        assert!(registry.get("pop").is_some());
        assert!(registry.get("lofi").is_some());
    }

    #[test]
    fn test_lookup_by_alias_and_leaf() {
        let registry = registry();
        assert_eq!(registry.lookup("lo-fi").unwrap().id, "lofi");
        assert_eq!(registry.lookup("Lofi Beats").unwrap().id, "lofi");
        assert_eq!(registry.lookup("house").unwrap().id, "electronic.house");
        assert_eq!(registry.lookup("synth-pop").unwrap().id, "pop.synth_pop");
        assert!(registry.lookup("polka-step-noise").is_none());
    }

    #[test]
    fn test_resolve_falls_back_to_pop() {
        assert_eq!(registry().resolve("zzz").id, "pop");
        assert_eq!(registry().resolve("").id, "pop");
    }

    #[test]
    fn test_lofi_profile() {
        let lofi = registry().get("lofi").unwrap();
        assert_eq!((lofi.tempo_min, lofi.tempo_max), (70, 90));
        assert_eq!(lofi.energy, EnergyLevel::Low);
        assert_eq!(lofi.key_root, "D");
        assert_eq!(lofi.scale, Scale::Minor);
        assert!(lofi.is_rhythmic());
        assert_eq!(lofi.clamp_tempo(140), 90);
    }

    #[test]
    fn test_beatless_roots() {
        assert!(!registry().get("ambient").unwrap().is_rhythmic());
        assert!(registry().get("rock").unwrap().is_rhythmic());
    }

    #[test]
    fn test_palette_is_never_empty() {
        let registry = registry();
        for id in registry.ids() {
            assert!(!registry.palette(id).is_empty(), "{} has no palette", id);
        }
        assert!(!registry.palette("nonexistent.genre").is_empty());
    }

    #[test]
    fn test_resolve_scale() {
        assert_eq!(resolve_scale("dorian"), Some(Scale::Dorian));
        assert_eq!(resolve_scale("aeolian"), Some(Scale::Minor));
        assert_eq!(resolve_scale("Harmonic Minor"), Some(Scale::HarmonicMinor));
        assert_eq!(resolve_scale("phrygian-dominant"), Some(Scale::PhrygianDominant));
        assert_eq!(resolve_scale("Spanish scale"), Some(Scale::PhrygianDominant));
        assert_eq!(resolve_scale("martian"), None);
    }

    #[test]
    fn test_rejects_registry_without_pop() {
        let yaml = r#"
version: "1.0"
genres:
  - id: jazz
    name: Jazz
    tempo: [90, 140]
    key: F
    scale: major
    energy: medium
    tracks: 4
"#;
        assert!(matches!(
            GenreRegistry::from_yaml(yaml),
            Err(RegistryError::Invalid(_))
        ));
    }
}
