//! Deterministic keyword extractor.
//!
//! Used when no provider is reachable or both provider attempts fail.
//! Produces a complete, low-confidence draft from keyword tables:
//! situational context, genre, mood, energy, key and instruments.

use lazy_static::lazy_static;
use midigent_core::{
    EnergyLevel, ExtractedNumbers, InstrumentRequest, InstrumentRole, Scale, TempoSource,
};
use regex::Regex;

use crate::draft::IntentDraft;
use crate::registry::{resolve_scale, GenreRegistry};

pub const FALLBACK_CONFIDENCE: f32 = 0.4;

const FALLBACK_REASONING: &str = "keyword fallback, no provider answer";

/// (stems, genre, mood, energy) for requests that name a situation
/// rather than a style
const CONTEXT_RULES: &[(&[&str], &str, &str, EnergyLevel)] = &[
    (&["study", "homework", "reading", "focus", "concentrat"], "lofi", "calm", EnergyLevel::Low),
    (&["workout", "exercise", "gym", "running", "training"], "electronic", "energetic", EnergyLevel::High),
    (&["sleep", "bedtime", "lullaby", "rest"], "ambient", "peaceful", EnergyLevel::VeryLow),
    (&["meditat", "yoga", "mindful", "zen", "breathing"], "ambient", "calm", EnergyLevel::Low),
    (&["party", "dance", "club", "rave"], "electronic", "energetic", EnergyLevel::High),
    (&["wedding", "ceremony"], "classical", "romantic", EnergyLevel::Medium),
    (&["horror", "scary", "creepy", "spooky", "halloween"], "cinematic", "dark", EnergyLevel::Medium),
    (&["film", "movie", "trailer", "scene", "score"], "cinematic", "epic", EnergyLevel::High),
    (&["game", "gaming", "video game", "boss fight"], "cinematic.video_game", "intense", EnergyLevel::High),
    (&["coffee", "cafe", "morning", "brunch"], "jazz", "warm", EnergyLevel::Medium),
    (&["driving", "road trip", "highway"], "rock", "energetic", EnergyLevel::High),
    (&["sunset", "beach", "ocean", "waves"], "ambient", "peaceful", EnergyLevel::Low),
    (&["rain", "storm", "thunder"], "ambient", "melancholic", EnergyLevel::Low),
    (&["night", "midnight", "nocturnal"], "lofi", "contemplative", EnergyLevel::Low),
    (&["bollywood", "hindi", "desi"], "asian.bollywood", "lively", EnergyLevel::High),
    (&["anime"], "pop.jpop", "energetic", EnergyLevel::High),
    (&["korean"], "pop.kpop", "energetic", EnergyLevel::High),
    (&["caribbean", "island", "tropical"], "latin.calypso", "happy", EnergyLevel::Medium),
    (&["african", "afro"], "african.afrobeat", "energetic", EnergyLevel::High),
    (&["arabic", "middle east"], "asian.maqam", "mystical", EnergyLevel::Medium),
    (&["indian"], "asian.hindustani", "contemplative", EnergyLevel::Medium),
    (&["japanese", "zen garden"], "asian.japanese_traditional", "peaceful", EnergyLevel::Low),
    (&["chinese"], "asian.chinese_traditional", "peaceful", EnergyLevel::Low),
    (&["spanish"], "folk.flamenco", "passionate", EnergyLevel::High),
    (&["argentine"], "latin.tango", "passionate", EnergyLevel::Medium),
    (&["jamaican"], "latin.reggae", "chill", EnergyLevel::Medium),
    (&["brazilian", "carnival"], "latin.samba", "energetic", EnergyLevel::High),
];

/// Genre keywords, most specific first
const GENRE_KEYWORDS: &[(&str, &str)] = &[
    ("drum and bass", "electronic.drum_and_bass"),
    ("deep house", "electronic.deep_house"),
    ("future bass", "electronic.future_bass"),
    ("dark ambient", "cinematic.dark_ambient"),
    ("neo soul", "blues.neo_soul"),
    ("bossa nova", "jazz.bossa_nova"),
    ("smooth jazz", "jazz.smooth"),
    ("gypsy jazz", "jazz.gypsy"),
    ("latin jazz", "jazz.latin"),
    ("ethio jazz", "jazz.ethio"),
    ("ethiopian jazz", "jazz.ethio"),
    ("post rock", "rock.post_rock"),
    ("post-rock", "rock.post_rock"),
    ("lo-fi hip hop", "hiphop.lofi_hiphop"),
    ("lo-fi hip-hop", "hiphop.lofi_hiphop"),
    ("city pop", "pop.city_pop"),
    ("dream pop", "pop.dream_pop"),
    ("synth pop", "pop.synth_pop"),
    ("synthpop", "pop.synth_pop"),
    ("k-pop", "pop.kpop"),
    ("j-pop", "pop.jpop"),
    ("classic rock", "rock.classic"),
    ("prog rock", "rock.progressive"),
    ("surf rock", "rock.surf"),
    ("heavy metal", "metal.heavy"),
    ("symphonic metal", "metal.symphonic"),
    ("doom metal", "metal.doom"),
    ("power metal", "metal.power"),
    ("desert blues", "african.desert_blues"),
    ("boom bap", "hiphop.boom_bap"),
    ("hip hop", "hiphop"),
    ("hip-hop", "hiphop"),
    ("electronic dance music", "electronic"),
    ("lo-fi", "lofi"),
    ("ambient", "ambient"),
    ("cinematic", "cinematic"),
    ("classical", "classical"),
    ("orchestral", "classical"),
    ("swing", "jazz.swing"),
    ("bebop", "jazz.bebop"),
    ("jazz", "jazz"),
    ("techno", "electronic.techno"),
    ("trance", "electronic.trance"),
    ("dubstep", "electronic.dubstep"),
    ("house", "electronic.house"),
    ("synthwave", "electronic.synthwave"),
    ("vaporwave", "electronic.vaporwave"),
    ("downtempo", "electronic.downtempo"),
    ("garage", "electronic.uk_garage"),
    ("idm", "electronic.idm"),
    ("electronic", "electronic"),
    ("funk", "rnb.funk"),
    ("funky", "rnb.funk"),
    ("disco", "rnb.disco"),
    ("r&b", "rnb"),
    ("soul", "blues.soul"),
    ("gospel", "blues.gospel"),
    ("motown", "blues.motown"),
    ("blues", "blues"),
    ("punk", "rock.punk"),
    ("grunge", "rock.grunge"),
    ("shoegaze", "rock.shoegaze"),
    ("rock", "rock"),
    ("djent", "metal.djent"),
    ("metal", "metal"),
    ("trap", "hiphop.trap"),
    ("drill", "hiphop.drill"),
    ("phonk", "hiphop.phonk"),
    ("rap", "hiphop"),
    ("country", "folk.country"),
    ("bluegrass", "folk.bluegrass"),
    ("celtic", "folk.celtic"),
    ("irish", "folk.celtic"),
    ("klezmer", "folk.klezmer"),
    ("fado", "folk.fado"),
    ("flamenco", "folk.flamenco"),
    ("balkan", "folk.balkan"),
    ("nordic", "folk.nordic"),
    ("folk", "folk"),
    ("salsa", "latin.salsa"),
    ("reggaeton", "latin.reggaeton"),
    ("samba", "latin.samba"),
    ("cumbia", "latin.cumbia"),
    ("reggae", "latin.reggae"),
    ("tango", "latin.tango"),
    ("ska", "latin.ska"),
    ("dancehall", "latin.dancehall"),
    ("bachata", "latin.bachata"),
    ("merengue", "latin.merengue"),
    ("calypso", "latin.calypso"),
    ("latin", "latin"),
    ("afrobeats", "african.afrobeat"),
    ("afrobeat", "african.afrobeat"),
    ("amapiano", "african.amapiano"),
    ("highlife", "african.highlife"),
    ("soukous", "african.soukous"),
    ("gnawa", "african.gnawa"),
    ("bollywood", "asian.bollywood"),
    ("raga", "asian.hindustani"),
    ("gamelan", "asian.gamelan"),
    ("maqam", "asian.maqam"),
    ("qawwali", "asian.qawwali"),
    ("koto", "asian.japanese_traditional"),
    ("guzheng", "asian.chinese_traditional"),
    ("pop", "pop"),
];

/// (stem, mood, valence)
const MOOD_KEYWORDS: &[(&str, &str, f32)] = &[
    ("happy", "happy", 0.7),
    ("joyful", "happy", 0.8),
    ("upbeat", "upbeat", 0.6),
    ("sad", "sad", -0.6),
    ("melanchol", "melancholic", -0.5),
    ("sorrow", "sad", -0.7),
    ("dark", "dark", -0.6),
    ("gloomy", "dark", -0.6),
    ("brooding", "dark", -0.5),
    ("calm", "calm", 0.3),
    ("peaceful", "peaceful", 0.4),
    ("serene", "calm", 0.4),
    ("epic", "epic", 0.4),
    ("grand", "epic", 0.4),
    ("majestic", "epic", 0.5),
    ("energetic", "energetic", 0.5),
    ("intense", "intense", 0.0),
    ("aggressive", "aggressive", -0.3),
    ("dreamy", "dreamy", 0.2),
    ("ethereal", "ethereal", 0.1),
    ("atmospheric", "ethereal", 0.1),
    ("mysterious", "mysterious", -0.2),
    ("eerie", "mysterious", -0.4),
    ("romantic", "romantic", 0.5),
    ("tender", "romantic", 0.4),
    ("chill", "chill", 0.3),
    ("relax", "relaxing", 0.3),
];

const HIGH_ENERGY: &[&str] = &["intense", "energetic", "powerful", "hard", "aggressive", "heavy", "fast"];
const LOW_ENERGY: &[&str] = &["chill", "calm", "peaceful", "ambient", "gentle", "soft", "slow", "quiet"];

/// (keyword, instrument, role). Scanned longest keyword first.
const INSTRUMENT_KEYWORDS: &[(&str, &str, InstrumentRole)] = &[
    ("piano", "piano", InstrumentRole::Harmony),
    ("keyboard", "piano", InstrumentRole::Harmony),
    ("electric piano", "electric_piano", InstrumentRole::Harmony),
    ("rhodes", "electric_piano", InstrumentRole::Harmony),
    ("organ", "organ", InstrumentRole::Harmony),
    ("harpsichord", "harpsichord", InstrumentRole::Melody),
    ("guitar", "acoustic_guitar", InstrumentRole::Melody),
    ("electric guitar", "electric_guitar", InstrumentRole::Melody),
    ("acoustic guitar", "acoustic_guitar", InstrumentRole::Melody),
    ("bass", "electric_bass", InstrumentRole::Bass),
    ("synthesizer bass", "synth_bass", InstrumentRole::Bass),
    ("drums", "drums", InstrumentRole::Rhythm),
    ("percussion", "drums", InstrumentRole::Rhythm),
    ("strings", "strings", InstrumentRole::Harmony),
    ("violin", "violin", InstrumentRole::Melody),
    ("viola", "viola", InstrumentRole::Harmony),
    ("cello", "cello", InstrumentRole::Harmony),
    ("harp", "harp", InstrumentRole::Melody),
    ("trumpet", "trumpet", InstrumentRole::Lead),
    ("trombone", "trombone", InstrumentRole::Harmony),
    ("french horn", "french_horn", InstrumentRole::Harmony),
    ("horn", "french_horn", InstrumentRole::Harmony),
    ("brass", "brass", InstrumentRole::Harmony),
    ("saxophone", "saxophone", InstrumentRole::Lead),
    ("flute", "flute", InstrumentRole::Melody),
    ("clarinet", "clarinet", InstrumentRole::Melody),
    ("oboe", "oboe", InstrumentRole::Melody),
    ("synthesizer", "synth_pad", InstrumentRole::Pad),
    ("pad", "synth_pad", InstrumentRole::Pad),
    ("synthesizer lead", "synth_lead", InstrumentRole::Lead),
    ("arpeggio", "synth_arp", InstrumentRole::Arpeggio),
    ("choir", "choir", InstrumentRole::Pad),
    ("vocals", "choir", InstrumentRole::Pad),
    ("bells", "bells", InstrumentRole::Melody),
    ("glockenspiel", "glockenspiel", InstrumentRole::Melody),
    ("vibraphone", "vibraphone", InstrumentRole::Melody),
    ("marimba", "marimba", InstrumentRole::Melody),
    ("xylophone", "xylophone", InstrumentRole::Melody),
    ("chimes", "bells", InstrumentRole::Fx),
    ("sitar", "sitar", InstrumentRole::Melody),
    ("koto", "koto", InstrumentRole::Melody),
    ("timpani", "timpani", InstrumentRole::Rhythm),
    ("atmosphere", "fx_atmosphere", InstrumentRole::Fx),
    ("texture", "fx_atmosphere", InstrumentRole::Fx),
    ("sound effects", "fx_atmosphere", InstrumentRole::Fx),
];

const FALLBACK_PRIORITY: u8 = 7;

lazy_static! {
    static ref CONTEXT_PATTERNS: Vec<(Regex, usize)> = CONTEXT_RULES
        .iter()
        .enumerate()
        .flat_map(|(index, (stems, ..))| stems.iter().map(move |stem| (prefix(stem), index)))
        .collect();

    static ref GENRE_PATTERNS: Vec<(Regex, &'static str)> = GENRE_KEYWORDS
        .iter()
        .map(|(keyword, genre)| (whole(keyword), *genre))
        .collect();

    static ref MOOD_PATTERNS: Vec<(Regex, &'static str, f32)> = MOOD_KEYWORDS
        .iter()
        .map(|(stem, mood, valence)| (prefix(stem), *mood, *valence))
        .collect();

    static ref HIGH_ENERGY_PATTERNS: Vec<Regex> = HIGH_ENERGY.iter().map(|w| whole(w)).collect();
    static ref LOW_ENERGY_PATTERNS: Vec<Regex> = LOW_ENERGY.iter().map(|w| whole(w)).collect();

    static ref INSTRUMENT_PATTERNS: Vec<(Regex, &'static str, InstrumentRole)> = {
        let mut table: Vec<_> = INSTRUMENT_KEYWORDS.to_vec();
        table.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        table
            .into_iter()
            .map(|(keyword, name, role)| (whole(keyword), name, role))
            .collect()
    };

    /// "C minor", "F# dorian", "Bb major"
    static ref KEY_WITH_MODE: Regex = Regex::new(
        r"\b([A-G])(#|b|♯|♭)?\s*-?\s*(?i:(major|minor|maj|min|dorian|mixolydian|phrygian|lydian|blues))\b"
    ).unwrap();
    /// "a minor", "eb major"
    static ref LOWER_KEY_WITH_MODE: Regex =
        Regex::new(r"(?i)\b([a-g])(#|b)?\s+(major|minor)\b").unwrap();
    /// "key of G", "in the key of e"
    static ref KEY_OF: Regex = Regex::new(r"(?i)\bkey\s+of\s+([a-g])(#|b)?\b").unwrap();
    /// "in D"
    static ref IN_KEY: Regex = Regex::new(r"\bin\s+([A-G])(#|b)?\b").unwrap();
}

fn prefix(stem: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{}", regex::escape(stem))).unwrap()
}

fn whole(keyword: &str) -> Regex {
    Regex::new(&format!(r"(?i)(?:^|[^\w]){}(?:$|[^\w])", regex::escape(keyword))).unwrap()
}

/// Build a complete low-confidence draft from keywords.
///
/// `text` is the normalized, abbreviation-expanded request.
pub fn keyword_draft(
    text: &str,
    numbers: &ExtractedNumbers,
    registry: &GenreRegistry,
) -> IntentDraft {
    let context = CONTEXT_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, index)| &CONTEXT_RULES[*index]);

    let genre = GENRE_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, genre)| *genre)
        .or(context.map(|(_, genre, ..)| *genre))
        .unwrap_or("pop");
    let profile = registry.resolve(genre);

    let mut draft = IntentDraft {
        reasoning: FALLBACK_REASONING.to_string(),
        overall_confidence: FALLBACK_CONFIDENCE,
        ..IntentDraft::default()
    };
    draft.genre.primary = profile.id.clone();
    draft.genre.confidence = 0.5;

    match MOOD_PATTERNS.iter().find(|(pattern, ..)| pattern.is_match(text)) {
        Some((_, mood, valence)) => {
            draft.mood.primary = mood.to_string();
            draft.mood.valence = *valence;
        }
        None => {
            if let Some((_, _, mood, _)) = context {
                draft.mood.primary = mood.to_string();
            }
        }
    }
    draft.mood.confidence = 0.4;

    draft.energy.level = if HIGH_ENERGY_PATTERNS.iter().any(|p| p.is_match(text)) {
        EnergyLevel::High
    } else if LOW_ENERGY_PATTERNS.iter().any(|p| p.is_match(text)) {
        EnergyLevel::Low
    } else if let Some((.., energy)) = context {
        *energy
    } else {
        profile.energy
    };
    draft.energy.confidence = 0.5;

    match numbers.tempo_bpm {
        Some(bpm) => {
            draft.tempo.bpm = bpm;
            draft.tempo.source = TempoSource::Explicit;
            draft.tempo.confidence = 0.9;
        }
        None => {
            draft.tempo.bpm = profile.tempo_center();
            draft.tempo.source = TempoSource::Default;
            draft.tempo.confidence = 0.4;
        }
    }

    match detect_key(text) {
        Some((root, scale)) => {
            draft.key_root = Some(root);
            draft.scale = scale.unwrap_or(profile.scale);
            draft.key_confidence = 0.8;
        }
        None => {
            draft.scale = profile.scale;
            draft.key_confidence = 0.3;
        }
    }

    draft.bars = numbers.bars;
    draft.seconds = numbers.duration_seconds;
    draft.duration_confidence = 0.4;

    draft.instruments = detect_instruments(text);

    if numbers.track_count.is_some() || numbers.channel_count.is_some() {
        draft.tracks.track_count = numbers.track_count;
        draft.tracks.channel_count = numbers.channel_count;
        draft.tracks.confidence = 0.95;
    }
    if let Some(signature) = numbers.time_signature {
        draft.time_signature = signature;
    }

    draft
}

/// Whether the text names a genre or a situation the keyword tables know
pub fn mentions_style(text: &str) -> bool {
    GENRE_PATTERNS.iter().any(|(pattern, _)| pattern.is_match(text))
        || CONTEXT_PATTERNS.iter().any(|(pattern, _)| pattern.is_match(text))
}

/// Root and, when named, scale
fn detect_key(text: &str) -> Option<(String, Option<Scale>)> {
    for pattern in [&*KEY_WITH_MODE, &*LOWER_KEY_WITH_MODE] {
        if let Some(cap) = pattern.captures(text) {
            let root = spell_root(cap.get(1)?.as_str(), cap.get(2).map(|m| m.as_str()))?;
            let scale = cap.get(3).and_then(|m| match m.as_str().to_lowercase().as_str() {
                "maj" => Some(Scale::Major),
                "min" => Some(Scale::Minor),
                other => resolve_scale(other),
            });
            return Some((root, scale));
        }
    }
    for pattern in [&*KEY_OF, &*IN_KEY] {
        if let Some(cap) = pattern.captures(text) {
            let root = spell_root(cap.get(1)?.as_str(), cap.get(2).map(|m| m.as_str()))?;
            return Some((root, None));
        }
    }
    None
}

fn spell_root(letter: &str, accidental: Option<&str>) -> Option<String> {
    let accidental = match accidental {
        Some("#") | Some("♯") => "#",
        Some("b") | Some("♭") => "b",
        _ => "",
    };
    midigent_core::canonical_root(&format!("{}{}", letter.to_uppercase(), accidental))
}

fn detect_instruments(text: &str) -> Vec<InstrumentRequest> {
    let mut instruments: Vec<InstrumentRequest> = Vec::new();
    let mut consumed = text.to_string();

    for (pattern, name, role) in INSTRUMENT_PATTERNS.iter() {
        if !pattern.is_match(&consumed) {
            continue;
        }
        // Blank the match so "electric guitar" does not also count as "guitar"
        consumed = pattern.replace_all(&consumed, " | ").into_owned();
        if instruments.iter().any(|i| i.name == *name) {
            continue;
        }
        if !role.is_shareable() && instruments.iter().any(|i| i.role == *role) {
            continue;
        }
        instruments.push(InstrumentRequest {
            name: name.to_string(),
            role: *role,
            priority: FALLBACK_PRIORITY,
        });
    }
    instruments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessor::preprocess;
    use crate::registry::registry;

    fn draft(text: &str) -> IntentDraft {
        let pre = preprocess(text);
        keyword_draft(&pre.normalized, &pre.numbers, registry())
    }

    #[test]
    fn test_lofi_request() {
        let d = draft("120 BPM lofi beat");
        assert_eq!(d.genre.primary, "lofi");
        assert_eq!(d.tempo.bpm, 120);
        assert_eq!(d.tempo.source, TempoSource::Explicit);
        assert_eq!(d.energy.level, EnergyLevel::Low);
        assert_eq!(d.overall_confidence, FALLBACK_CONFIDENCE);
    }

    #[test]
    fn test_context_rules() {
        let d = draft("something to listen to while studying");
        assert_eq!(d.genre.primary, "lofi");
        assert_eq!(d.mood.primary, "calm");
        assert_eq!(d.energy.level, EnergyLevel::Low);

        let d = draft("music for my gym session");
        assert_eq!(d.genre.primary, "electronic");
        assert_eq!(d.energy.level, EnergyLevel::High);
    }

    #[test]
    fn test_context_stems_need_word_start() {
        // "interesting" contains "rest", "training" contains "rain"
        let d = draft("an interesting jazz tune");
        assert_eq!(d.genre.primary, "jazz");
        assert_eq!(d.mood.primary, "neutral");
    }

    #[test]
    fn test_specific_genres_win() {
        assert_eq!(draft("a deep house groove").genre.primary, "electronic.deep_house");
        assert_eq!(draft("kpop banger").genre.primary, "pop.kpop");
        assert_eq!(draft("dnb roller").genre.primary, "electronic.drum_and_bass");
        assert_eq!(draft("a trap beat").genre.primary, "hiphop.trap");
    }

    #[test]
    fn test_key_detection() {
        let d = draft("sad piano in C minor");
        assert_eq!(d.key_root.as_deref(), Some("C"));
        assert_eq!(d.scale, Scale::Minor);
        assert_eq!(d.key_confidence, 0.8);

        let d = draft("a minor waltz");
        assert_eq!(d.key_root.as_deref(), Some("A"));

        let d = draft("A chill tune in Bb");
        assert_eq!(d.key_root.as_deref(), Some("Bb"));

        let d = draft("a chill tune");
        assert_eq!(d.key_root, None);
        assert_eq!(d.key_confidence, 0.3);
    }

    #[test]
    fn test_instruments_longest_first() {
        let d = draft("electric guitar and sax over drums");
        let names: Vec<&str> = d.instruments.iter().map(|i| i.name.as_str()).collect();
        assert!(names.contains(&"electric_guitar"));
        assert!(names.contains(&"saxophone"));
        assert!(names.contains(&"drums"));
        assert!(!names.contains(&"acoustic_guitar"));
    }

    #[test]
    fn test_garbage_still_complete() {
        let d = draft("%%%$$ ??? 0000");
        assert_eq!(d.genre.primary, "pop");
        let params = d.seal(registry());
        assert!(params.invariant_violations().is_empty());
    }

    #[test]
    fn test_mentions_style() {
        assert!(mentions_style("a bossa nova for the evening"));
        assert!(mentions_style("music for my workout"));
        assert!(!mentions_style("make it longer"));
    }

    #[test]
    fn test_every_genre_target_exists() {
        let registry = registry();
        for (keyword, genre) in GENRE_KEYWORDS {
            assert!(registry.get(genre).is_some(), "{} -> {}", keyword, genre);
        }
        for (stems, genre, ..) in CONTEXT_RULES {
            assert!(registry.get(genre).is_some(), "{:?} -> {}", stems, genre);
        }
    }
}
