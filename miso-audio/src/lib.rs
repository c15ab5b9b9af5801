//! Audio engine for Miso - playback controller, equalizer and output graph
//!
//! - PlaybackController: one noise at a time, clip loads off-thread
//! - EqualizerChain: ten-band biquad equalizer for the custom noise
//! - AudioGraph: what the output callback renders

mod controller;
mod equalizer;
mod graph;
mod source;

pub use controller::{PlaybackController, PlaybackEvent, PlayerState};
pub use equalizer::{band_frequency, BandKind, EqStage, EqualizerChain, BAND_Q, BASE_FREQUENCY_HZ};
pub use graph::{AudioGraph, Route, SharedGraph};
pub use source::LoopingSource;

pub use miso_library::{NoiseType, MAX_DB, MIN_DB, NUM_BANDS};
