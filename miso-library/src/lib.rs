//! Clip library for Miso - noise types, clip fetching, decoding, caching
//! and persisted equalizer settings.

mod cache;
mod config;
mod fetch;
mod format;
mod loader;
mod noise;
mod offline;
mod settings;
mod worker;

pub use cache::ClipCache;
pub use config::Config;
pub use fetch::{ClipFetcher, DirFetcher, HttpFetcher};
pub use format::{ClipFormat, FormatError, CLIP_FORMATS};
pub use loader::{ClipBuffer, ClipDecoder, ClipError};
pub use noise::NoiseType;
pub use offline::{OfflineFetcher, OfflineStore, StoreError, CACHE_PREFIX, CACHE_VERSION};
pub use settings::{
    band_key, clamp_gain, BandSettings, FileSettings, MemorySettings, MAX_DB, MIN_DB, NUM_BANDS,
};
pub use worker::{ClipLoader, LoadOutcome, LoadRequest};
