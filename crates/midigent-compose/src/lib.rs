//! midigent compose: turns a track plan into notes, notes into a MIDI
//! artifact, and a finished run into a Markdown summary.
//!
//! # Example
//!
//! ```ignore
//! use midigent_compose::{realize, GenerationParams, HeuristicGenerator, MidiSerializer, ArtifactSerializer};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let params = GenerationParams::from_parameters(&parameter_set);
//! let mut rng = StdRng::seed_from_u64(7);
//! let tracks: Vec<_> = plan
//!     .tracks
//!     .iter()
//!     .map(|spec| realize(&HeuristicGenerator, spec, &params, &mut rng))
//!     .collect();
//! let handle = MidiSerializer::in_memory().serialize(&tracks, 120, Default::default())?;
//! ```

pub mod generators;
pub mod renderer;
pub mod serializer;
pub mod templates;
pub mod theory;

pub use generators::{
    fit_to_length, realize, DrumPattern, GenerationParams, HeuristicGenerator, MelodyStyle,
    TrackGenerator,
};
pub use renderer::{RenderError, SummaryFacts, SummaryRenderer, TrackFacts};
pub use serializer::{ArtifactSerializer, MidiSerializer, SerializeError, MIDI_MIME, TICKS_PER_QUARTER};
pub use templates::{Template, TemplatesFile};
pub use theory::{degree_pitch, gm_program, progression};
