//! Noise type identifiers

use std::fmt;

use crate::format::ClipFormat;

/// A selectable noise colour.
///
/// Ordinals are stable and match the order of the front end's buttons:
/// `Silence` is 0 and `Custom` is last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NoiseType {
    #[default]
    Silence,
    White,
    Grey,
    Red,
    Pink,
    Green,
    Blue,
    Purple,
    /// Plays `CUSTOM_BASE` through the user equalizer
    Custom,
}

impl NoiseType {
    /// Every noise type in ordinal order
    pub const ALL: [NoiseType; 9] = [
        NoiseType::Silence,
        NoiseType::White,
        NoiseType::Grey,
        NoiseType::Red,
        NoiseType::Pink,
        NoiseType::Green,
        NoiseType::Blue,
        NoiseType::Purple,
        NoiseType::Custom,
    ];

    /// The noise played underneath the custom equalizer
    pub const CUSTOM_BASE: NoiseType = NoiseType::White;

    /// Ordinal used by the front end
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Look up a noise type by ordinal
    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        Self::ALL.get(ordinal).copied()
    }

    /// Lowercase name, also the base file name of the clip
    pub fn name(self) -> &'static str {
        match self {
            NoiseType::Silence => "silence",
            NoiseType::White => "white",
            NoiseType::Grey => "grey",
            NoiseType::Red => "red",
            NoiseType::Pink => "pink",
            NoiseType::Green => "green",
            NoiseType::Blue => "blue",
            NoiseType::Purple => "purple",
            NoiseType::Custom => "custom",
        }
    }

    pub fn is_silence(self) -> bool {
        self == NoiseType::Silence
    }

    pub fn is_custom(self) -> bool {
        self == NoiseType::Custom
    }

    /// The noise whose clip is actually played for this selection.
    ///
    /// `None` for silence.
    pub fn playback_base(self) -> Option<NoiseType> {
        match self {
            NoiseType::Silence => None,
            NoiseType::Custom => Some(Self::CUSTOM_BASE),
            other => Some(other),
        }
    }

    /// Relative clip path (`clips/{name}.{ext}`) for the playback base
    pub fn clip_path(self, format: ClipFormat) -> Option<String> {
        self.playback_base()
            .map(|base| format!("clips/{}.{}", base.name(), format.extension()))
    }

    /// Noise types that have a clip of their own
    pub fn clip_types() -> impl Iterator<Item = NoiseType> {
        Self::ALL
            .into_iter()
            .filter(|n| !n.is_silence() && !n.is_custom())
    }
}

impl fmt::Display for NoiseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
