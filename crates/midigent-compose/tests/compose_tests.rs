//! Generate full arrangements and write them out as MIDI.

use midigent_compose::{
    realize, ArtifactSerializer, GenerationParams, HeuristicGenerator, MidiSerializer,
};
use midigent_core::{
    EnergyLevel, InstrumentRole, ParameterSet, TimeSignature, Track, TrackKind, TrackSpec,
    DRUM_CHANNEL,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn spec(kind: TrackKind, instrument: &str, channel: u8) -> TrackSpec {
    TrackSpec {
        kind,
        instrument: instrument.to_string(),
        role: InstrumentRole::Melody,
        priority: 1,
        channel,
    }
}

fn arrangement() -> Vec<TrackSpec> {
    vec![
        spec(TrackKind::Lead, "piano", 0),
        spec(TrackKind::CounterMelody, "flute", 1),
        spec(TrackKind::Harmony, "electric_piano", 2),
        spec(TrackKind::Bass, "electric_bass", 3),
        spec(TrackKind::Drums, "drums", DRUM_CHANNEL),
        spec(TrackKind::Arpeggio, "synth_arp", 4),
        spec(TrackKind::Pad, "synth_pad", 5),
        spec(TrackKind::Fx, "fx_atmosphere", 6),
    ]
}

fn compose(genre: &str, energy: EnergyLevel, bars: u32, seed: u64) -> Vec<Track> {
    let mut parameters = ParameterSet::default();
    parameters.genre.primary = genre.to_string();
    parameters.energy.level = energy;
    parameters.duration.bars = bars;

    let params = GenerationParams::from_parameters(&parameters);
    let mut rng = StdRng::seed_from_u64(seed);
    arrangement()
        .iter()
        .map(|s| realize(&HeuristicGenerator, s, &params, &mut rng))
        .collect()
}

#[test]
fn test_arrangements_cover_the_requested_bars() {
    let genres = [
        ("lofi", EnergyLevel::Low),
        ("electronic.techno", EnergyLevel::VeryHigh),
        ("jazz.bebop", EnergyLevel::High),
        ("metal.djent", EnergyLevel::High),
        ("ambient", EnergyLevel::VeryLow),
        ("classical.baroque", EnergyLevel::Medium),
        ("folk.celtic", EnergyLevel::Medium),
    ];
    for (genre, energy) in genres {
        let tracks = compose(genre, energy, 12, 11);
        let longest = tracks.iter().map(Track::length_beats).fold(0.0, f64::max);
        assert!(longest <= 48.0 + 1e-9, "{} overruns: {}", genre, longest);
        assert!(longest >= 40.0, "{} too short: {}", genre, longest);
        assert!(tracks.iter().all(|t| !t.notes.is_empty()), "{} has an empty track", genre);
    }
}

#[test]
fn test_same_seed_same_file() {
    let serializer = MidiSerializer::in_memory();
    let a = serializer
        .serialize(&compose("pop", EnergyLevel::Medium, 8, 5), 110, TimeSignature::default())
        .unwrap();
    let b = serializer
        .serialize(&compose("pop", EnergyLevel::Medium, 8, 5), 110, TimeSignature::default())
        .unwrap();
    let c = serializer
        .serialize(&compose("pop", EnergyLevel::Medium, 8, 6), 110, TimeSignature::default())
        .unwrap();
    assert_eq!(a.id, b.id);
    assert_ne!(a.id, c.id);
}

#[test]
fn test_file_has_one_track_per_part() {
    let tracks = compose("rock", EnergyLevel::High, 4, 1);
    let bytes = MidiSerializer::in_memory()
        .encode(&tracks, 140, TimeSignature::default())
        .unwrap();
    let smf = midly::Smf::parse(&bytes).unwrap();
    assert_eq!(smf.tracks.len(), tracks.len() + 1);
}
