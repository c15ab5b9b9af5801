//! Clip formats and one-time format negotiation

use std::fmt;

use symphonia::core::codecs::{CodecType, CODEC_TYPE_MP3, CODEC_TYPE_VORBIS};
use thiserror::Error;

/// Supported clip formats in order of preference
pub const CLIP_FORMATS: [ClipFormat; 2] = [ClipFormat::Ogg, ClipFormat::Mp3];

/// No clip format can be played
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("None of the clip formats ({0}) can be decoded")]
    Unsupported(String),
}

/// Encoded clip format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipFormat {
    /// Ogg Vorbis
    Ogg,
    Mp3,
}

impl ClipFormat {
    /// File extension used in clip paths
    pub fn extension(self) -> &'static str {
        match self {
            ClipFormat::Ogg => "ogg",
            ClipFormat::Mp3 => "mp3",
        }
    }

    fn codec(self) -> CodecType {
        match self {
            ClipFormat::Ogg => CODEC_TYPE_VORBIS,
            ClipFormat::Mp3 => CODEC_TYPE_MP3,
        }
    }

    /// Whether the linked symphonia build can decode this format
    pub fn is_decodable(self) -> bool {
        symphonia::default::get_codecs()
            .get_codec(self.codec())
            .is_some()
    }

    /// Pick the first format in `CLIP_FORMATS` accepted by `probe`
    pub fn negotiate<P>(probe: P) -> Result<Self, FormatError>
    where
        P: Fn(ClipFormat) -> bool,
    {
        CLIP_FORMATS
            .iter()
            .copied()
            .find(|f| probe(*f))
            .ok_or_else(|| {
                let names: Vec<_> = CLIP_FORMATS.iter().map(|f| f.extension()).collect();
                FormatError::Unsupported(names.join(", "))
            })
    }

    /// Negotiate against the codecs compiled into symphonia
    pub fn detect() -> Result<Self, FormatError> {
        Self::negotiate(ClipFormat::is_decodable)
    }
}

impl fmt::Display for ClipFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
