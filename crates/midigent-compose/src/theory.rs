//! Theory tables: chord progressions, General MIDI programs, drum map and
//! scale-degree arithmetic.

/// General MIDI percussion keys used by the drum patterns
pub mod drum {
    pub const KICK: u8 = 36;
    pub const SNARE: u8 = 38;
    pub const CLAP: u8 = 39;
    pub const CLOSED_HAT: u8 = 42;
    pub const OPEN_HAT: u8 = 46;
    pub const LOW_TOM: u8 = 45;
    pub const MID_TOM: u8 = 47;
    pub const HIGH_TOM: u8 = 50;
    pub const CRASH: u8 = 49;
    pub const RIDE: u8 = 51;
}

// ============================================================================
// CHORD PROGRESSIONS
// ============================================================================

type Progression = &'static [&'static [i32]];

const TONIC_ONLY: Progression = &[&[0, 4, 7]];

/// Four-chord loops per root genre, as semitone offsets from the key root
const PROGRESSIONS: &[(&str, Progression)] = &[
    ("pop", &[&[0, 4, 7], &[5, 9, 12], &[7, 11, 14], &[5, 9, 12]]),
    ("rock", &[&[0, 4, 7], &[7, 11, 14], &[5, 9, 12], &[0, 4, 7]]),
    ("jazz", &[&[0, 4, 7, 11], &[5, 9, 12, 16], &[2, 5, 9, 12], &[7, 11, 14, 17]]),
    ("lofi", &[&[0, 4, 7, 11], &[2, 5, 9], &[5, 9, 12], &[7, 11, 14]]),
    ("electronic", &[&[0, 4, 7], &[0, 4, 7], &[5, 9, 12], &[7, 11, 14]]),
    ("classical", &[&[0, 4, 7], &[5, 9, 12], &[4, 7, 11], &[0, 4, 7]]),
    ("ambient", &[&[0, 4, 7, 11], &[0, 4, 7, 11], &[5, 9, 12, 16], &[5, 9, 12, 16]]),
    ("cinematic", &[&[0, 3, 7], &[5, 8, 12], &[7, 10, 14], &[3, 7, 10]]),
    ("rnb", &[&[0, 4, 7, 11], &[2, 5, 9, 12], &[5, 9, 12, 16], &[7, 11, 14, 17]]),
    ("hiphop", &[&[0, 3, 7], &[5, 8, 12], &[7, 10, 14], &[0, 3, 7]]),
    ("metal", &[&[0, 7], &[5, 12], &[3, 10], &[0, 7]]),
    ("blues", &[&[0, 4, 7, 10], &[5, 9, 12, 15], &[0, 4, 7, 10], &[7, 11, 14]]),
    ("folk", &[&[0, 4, 7], &[5, 9, 12], &[7, 11, 14], &[0, 4, 7]]),
    ("latin", &[&[0, 4, 7], &[5, 9, 12], &[7, 11, 14], &[0, 4, 7]]),
    ("african", &[&[0, 4, 7], &[5, 9, 12], &[7, 11, 14], &[0, 4, 7]]),
    ("asian", &[&[0, 4, 7], &[0, 4, 7], &[5, 9, 12], &[0, 4, 7]]),
];

/// Progression for a genre id: exact match, then the root genre, then pop.
pub fn progression(genre: &str) -> Progression {
    let root = genre.split('.').next().unwrap_or(genre);
    [genre, root, "pop"]
        .iter()
        .find_map(|name| {
            PROGRESSIONS
                .iter()
                .find(|(id, _)| id == name)
                .map(|(_, p)| *p)
        })
        .unwrap_or(TONIC_ONLY)
}

// ============================================================================
// GENERAL MIDI PROGRAMS
// ============================================================================

const GM_PROGRAMS: &[(&str, u8)] = &[
    // keys
    ("piano", 0),
    ("bright_piano", 1),
    ("electric_piano", 4),
    ("rhodes", 4),
    ("harpsichord", 6),
    ("clavinet", 7),
    ("celesta", 8),
    ("glockenspiel", 9),
    ("music_box", 10),
    ("vibraphone", 11),
    ("marimba", 12),
    ("xylophone", 13),
    ("bells", 14),
    ("santur", 15),
    ("organ", 19),
    ("harmonium", 20),
    ("accordion", 21),
    ("bandoneon", 21),
    ("harmonica", 22),
    // guitars and plucked
    ("guitar", 24),
    ("acoustic_guitar", 25),
    ("steel_guitar", 25),
    ("oud", 25),
    ("tar", 25),
    ("mandolin", 25),
    ("electric_guitar", 27),
    ("distortion_guitar", 30),
    // bass
    ("bass", 32),
    ("electric_bass", 33),
    ("fretless_bass", 35),
    ("slap_bass", 36),
    ("synth_bass", 38),
    ("wobble_bass", 87),
    // strings
    ("violin", 40),
    ("viola", 41),
    ("cello", 42),
    ("contrabass", 43),
    ("harp", 46),
    ("timpani", 47),
    ("strings", 48),
    ("synth_strings", 50),
    // voices
    ("choir", 52),
    ("voice_oohs", 53),
    // brass and winds
    ("trumpet", 56),
    ("trombone", 57),
    ("tuba", 58),
    ("french_horn", 60),
    ("brass", 61),
    ("saxophone", 64),
    ("oboe", 68),
    ("clarinet", 71),
    ("flute", 73),
    ("dizi", 73),
    ("tin_whistle", 74),
    ("ney", 75),
    ("shakuhachi", 77),
    // synths
    ("synth_lead", 80),
    ("synth_arp", 81),
    ("synth_pad", 88),
    ("fx_atmosphere", 99),
    // world
    ("sitar", 104),
    ("banjo", 105),
    ("koto", 107),
    ("guzheng", 107),
    ("gayageum", 107),
    ("kalimba", 108),
    ("fiddle", 110),
    ("nyckelharpa", 110),
    ("hardingfele", 110),
    ("steel_drum", 114),
];

/// General MIDI program for an instrument name, piano when unknown
pub fn gm_program(instrument: &str) -> u8 {
    GM_PROGRAMS
        .iter()
        .find(|(name, _)| *name == instrument)
        .map(|(_, program)| *program)
        .unwrap_or(0)
}

// ============================================================================
// SCALE DEGREES
// ============================================================================

/// Pitch of a scale degree relative to `root`. Degrees wrap into higher or
/// lower octaves: with a seven-note scale, degree 7 is the octave and -1 the
/// leading tone below.
pub fn degree_pitch(root: i32, scale: &[u8], degree: i32) -> i32 {
    if scale.is_empty() {
        return root;
    }
    let len = scale.len() as i32;
    let octave = degree.div_euclid(len);
    let step = degree.rem_euclid(len) as usize;
    root + 12 * octave + scale[step] as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAJOR: &[u8] = &[0, 2, 4, 5, 7, 9, 11];

    #[test]
    fn test_progression_lookup_falls_back() {
        assert_eq!(progression("jazz")[0], &[0, 4, 7, 11]);
        assert_eq!(progression("jazz.bossa_nova"), progression("jazz"));
        assert_eq!(progression("metal.doom")[0], &[0, 7]);
        assert_eq!(progression("polka"), progression("pop"));
    }

    #[test]
    fn test_gm_program() {
        assert_eq!(gm_program("piano"), 0);
        assert_eq!(gm_program("synth_pad"), 88);
        assert_eq!(gm_program("electric_bass"), 33);
        assert_eq!(gm_program("theremin"), 0);
    }

    #[test]
    fn test_degree_pitch_wraps_octaves() {
        assert_eq!(degree_pitch(60, MAJOR, 0), 60);
        assert_eq!(degree_pitch(60, MAJOR, 4), 67);
        assert_eq!(degree_pitch(60, MAJOR, 7), 72);
        assert_eq!(degree_pitch(60, MAJOR, -1), 59);
        assert_eq!(degree_pitch(60, &[], 3), 60);
    }
}
