//! In-memory cache of decoded clips
//!
//! Each noise type is fetched and decoded at most once; afterwards the same
//! `Arc<ClipBuffer>` is handed out for the life of the cache.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::fetch::ClipFetcher;
use crate::format::ClipFormat;
use crate::loader::{ClipBuffer, ClipDecoder, ClipError};
use crate::noise::NoiseType;

/// Lazily-populated map from noise type to decoded clip
pub struct ClipCache {
    fetcher: Box<dyn ClipFetcher>,
    decoder: ClipDecoder,
    format: ClipFormat,
    buffers: HashMap<NoiseType, Arc<ClipBuffer>>,
}

impl ClipCache {
    /// Create an empty cache. `sample_rate` is the rate clips are decoded to.
    pub fn new(fetcher: Box<dyn ClipFetcher>, format: ClipFormat, sample_rate: u32) -> Self {
        Self {
            fetcher,
            decoder: ClipDecoder::new(sample_rate),
            format,
            buffers: HashMap::new(),
        }
    }

    /// Get the decoded clip for `noise`, loading it on first use.
    ///
    /// `Custom` shares the entry of its base noise. The cache is only
    /// modified when the load succeeds.
    pub fn request_buffer(&mut self, noise: NoiseType) -> Result<Arc<ClipBuffer>, ClipError> {
        let base = noise.playback_base().ok_or(ClipError::NoClip(noise))?;

        if let Some(buffer) = self.buffers.get(&base) {
            debug!(noise = %base, "clip cache hit");
            return Ok(Arc::clone(buffer));
        }

        let path = base
            .clip_path(self.format)
            .ok_or(ClipError::NoClip(noise))?;

        let bytes = self.fetcher.fetch(&path).map_err(|e| {
            warn!(%path, error = %e, "clip fetch failed");
            e
        })?;
        let buffer = self
            .decoder
            .decode(bytes, self.format.extension())
            .map_err(|e| {
                warn!(%path, error = %e, "clip decode failed");
                e
            })?;

        info!(
            noise = %base,
            frames = buffer.frames(),
            secs = buffer.duration_secs(),
            "clip loaded"
        );

        let buffer = Arc::new(buffer);
        self.buffers.insert(base, Arc::clone(&buffer));
        Ok(buffer)
    }

    /// Cached clip, if already loaded
    pub fn get(&self, noise: NoiseType) -> Option<Arc<ClipBuffer>> {
        noise
            .playback_base()
            .and_then(|base| self.buffers.get(&base).cloned())
    }

    /// Forget a cached clip so the next request loads it again
    pub fn invalidate(&mut self, noise: NoiseType) -> bool {
        noise
            .playback_base()
            .map(|base| self.buffers.remove(&base).is_some())
            .unwrap_or(false)
    }

    /// Number of cached clips
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::loader::tests::wav_bytes;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory fetcher that counts every fetch
    pub(crate) struct MapFetcher {
        pub clips: HashMap<String, Vec<u8>>,
        pub fetches: Arc<AtomicUsize>,
    }

    impl MapFetcher {
        pub fn with_clips(paths: &[&str]) -> Self {
            let clips = paths
                .iter()
                .map(|p| (p.to_string(), wav_bytes(2, 44100, 441)))
                .collect();
            Self {
                clips,
                fetches: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl ClipFetcher for MapFetcher {
        fn fetch(&self, path: &str) -> Result<Vec<u8>, ClipError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.clips
                .get(path)
                .cloned()
                .ok_or_else(|| ClipError::Network(format!("{path}: unreachable")))
        }
    }

    fn cache_with(paths: &[&str]) -> (ClipCache, Arc<AtomicUsize>) {
        let fetcher = MapFetcher::with_clips(paths);
        let fetches = Arc::clone(&fetcher.fetches);
        (
            ClipCache::new(Box::new(fetcher), ClipFormat::Ogg, 44100),
            fetches,
        )
    }

    #[test]
    fn test_second_request_is_served_from_memory() {
        let (mut cache, fetches) = cache_with(&["clips/red.ogg"]);

        let first = cache.request_buffer(NoiseType::Red).unwrap();
        let second = cache.request_buffer(NoiseType::Red).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_custom_shares_white_entry() {
        let (mut cache, fetches) = cache_with(&["clips/white.ogg"]);

        let white = cache.request_buffer(NoiseType::White).unwrap();
        let custom = cache.request_buffer(NoiseType::Custom).unwrap();

        assert!(Arc::ptr_eq(&white, &custom));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_leaves_cache_untouched() {
        let (mut cache, fetches) = cache_with(&[]);

        let err = cache.request_buffer(NoiseType::Blue).unwrap_err();
        assert!(matches!(err, ClipError::Network(_)));
        assert!(cache.is_empty());

        // Not cached, so the next request tries again
        let _ = cache.request_buffer(NoiseType::Blue);
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_undecodable_payload() {
        let mut fetcher = MapFetcher::with_clips(&[]);
        fetcher
            .clips
            .insert("clips/grey.ogg".to_string(), vec![0u8; 64]);
        let mut cache = ClipCache::new(Box::new(fetcher), ClipFormat::Ogg, 44100);

        let err = cache.request_buffer(NoiseType::Grey).unwrap_err();
        assert!(matches!(err, ClipError::Decode(_)));
        assert!(cache.get(NoiseType::Grey).is_none());
    }

    #[test]
    fn test_silence_has_no_clip() {
        let (mut cache, fetches) = cache_with(&[]);
        let err = cache.request_buffer(NoiseType::Silence).unwrap_err();
        assert_eq!(err, ClipError::NoClip(NoiseType::Silence));
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let (mut cache, fetches) = cache_with(&["clips/pink.ogg"]);

        cache.request_buffer(NoiseType::Pink).unwrap();
        assert!(cache.invalidate(NoiseType::Pink));
        assert!(!cache.invalidate(NoiseType::Pink));
        cache.request_buffer(NoiseType::Pink).unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }
}
