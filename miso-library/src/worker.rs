//! Background clip loading
//!
//! Fetching and decoding a clip can take seconds, so the cache lives on its
//! own thread. Requests are served in order. A request that a newer one has
//! superseded before the thread reaches it is skipped; every other request
//! produces exactly one outcome.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error};

use crate::cache::ClipCache;
use crate::loader::{ClipBuffer, ClipError};
use crate::noise::NoiseType;

/// Ask the loader for a clip
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest {
    /// Token of the selection that issued the request
    pub generation: u64,
    pub noise: NoiseType,
}

/// Result of one `LoadRequest`
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub generation: u64,
    pub noise: NoiseType,
    pub result: Result<Arc<ClipBuffer>, ClipError>,
}

/// Handle to the loader thread
///
/// Dropping the handle does not wait for the thread: a fetch in flight
/// finishes on its own and everything still queued is skipped.
pub struct ClipLoader {
    request_tx: Option<Sender<LoadRequest>>,
    outcome_rx: Receiver<LoadOutcome>,
    /// Newest generation requested so far
    latest: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
}

impl ClipLoader {
    /// Move `cache` onto a new loader thread
    pub fn spawn(mut cache: ClipCache) -> Self {
        let (request_tx, request_rx) = unbounded::<LoadRequest>();
        let (outcome_tx, outcome_rx) = unbounded::<LoadOutcome>();
        let latest = Arc::new(AtomicU64::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker_latest = latest.clone();
        let worker_shutdown = shutdown.clone();
        thread::spawn(move || {
            for request in request_rx.iter() {
                if worker_shutdown.load(Ordering::Relaxed) {
                    break;
                }
                let latest = worker_latest.load(Ordering::Acquire);
                if request.generation < latest {
                    debug!(
                        noise = %request.noise,
                        stale = request.generation,
                        latest,
                        "skipping superseded clip load"
                    );
                    continue;
                }

                let result = cache.request_buffer(request.noise);
                let outcome = LoadOutcome {
                    generation: request.generation,
                    noise: request.noise,
                    result,
                };
                if outcome_tx.send(outcome).is_err() {
                    break;
                }
            }
            debug!("clip loader stopped");
        });

        Self {
            request_tx: Some(request_tx),
            outcome_rx,
            latest,
            shutdown,
        }
    }

    /// Queue a load. Fails only when the loader thread is gone.
    pub fn request(&self, generation: u64, noise: NoiseType) -> Result<(), ClipError> {
        let sender = self
            .request_tx
            .as_ref()
            .ok_or_else(|| ClipError::Network("clip loader stopped".to_string()))?;

        self.latest.fetch_max(generation, Ordering::AcqRel);
        sender
            .send(LoadRequest { generation, noise })
            .map_err(|_| {
                error!("clip loader thread is gone");
                ClipError::Network("clip loader stopped".to_string())
            })
    }

    /// Next finished load, without blocking
    pub fn try_recv(&self) -> Option<LoadOutcome> {
        self.outcome_rx.try_recv().ok()
    }

    /// Next finished load, waiting up to `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<LoadOutcome> {
        match self.outcome_rx.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for ClipLoader {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.request_tx.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::MapFetcher;
    use crate::fetch::ClipFetcher;
    use crate::format::ClipFormat;
    use crate::loader::tests::wav_bytes;
    use std::time::Instant;

    const WAIT: Duration = Duration::from_secs(5);

    /// Announces each fetch, then blocks until the test lets it through
    struct GatedFetcher {
        started: Sender<String>,
        release: Receiver<()>,
    }

    impl ClipFetcher for GatedFetcher {
        fn fetch(&self, path: &str) -> Result<Vec<u8>, ClipError> {
            let _ = self.started.send(path.to_string());
            // A dropped sender opens the gate for good
            let _ = self.release.recv();
            Ok(wav_bytes(2, 44100, 256))
        }
    }

    fn gated_loader() -> (ClipLoader, Receiver<String>, Sender<()>) {
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        let fetcher = GatedFetcher {
            started: started_tx,
            release: release_rx,
        };
        let loader = ClipLoader::spawn(ClipCache::new(Box::new(fetcher), ClipFormat::Ogg, 44100));
        (loader, started_rx, release_tx)
    }

    /// Sleeps through every fetch
    struct SlowFetcher(Duration);

    impl ClipFetcher for SlowFetcher {
        fn fetch(&self, _path: &str) -> Result<Vec<u8>, ClipError> {
            thread::sleep(self.0);
            Err(ClipError::Network("timed out".to_string()))
        }
    }

    fn loader_with(paths: &[&str]) -> ClipLoader {
        let fetcher = MapFetcher::with_clips(paths);
        ClipLoader::spawn(ClipCache::new(Box::new(fetcher), ClipFormat::Ogg, 44100))
    }

    #[test]
    fn test_outcomes_arrive_in_request_order() {
        let loader = loader_with(&["clips/red.ogg", "clips/white.ogg"]);

        loader.request(1, NoiseType::Red).unwrap();
        loader.request(1, NoiseType::White).unwrap();

        let first = loader.recv_timeout(WAIT).unwrap();
        let second = loader.recv_timeout(WAIT).unwrap();

        assert_eq!((first.generation, first.noise), (1, NoiseType::Red));
        assert_eq!((second.generation, second.noise), (1, NoiseType::White));
        assert!(first.result.is_ok());
        assert!(second.result.is_ok());
    }

    #[test]
    fn test_failure_is_reported_as_outcome() {
        let loader = loader_with(&[]);
        loader.request(7, NoiseType::Green).unwrap();

        let outcome = loader.recv_timeout(WAIT).unwrap();
        assert_eq!(outcome.generation, 7);
        assert!(matches!(outcome.result, Err(ClipError::Network(_))));
    }

    #[test]
    fn test_cached_buffer_is_shared_between_requests() {
        let loader = loader_with(&["clips/blue.ogg"]);
        loader.request(1, NoiseType::Blue).unwrap();
        loader.request(1, NoiseType::Blue).unwrap();

        let a = loader.recv_timeout(WAIT).unwrap().result.unwrap();
        let b = loader.recv_timeout(WAIT).unwrap().result.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_try_recv_empty() {
        let loader = loader_with(&[]);
        assert!(loader.try_recv().is_none());
    }

    #[test]
    fn test_superseded_requests_are_skipped() {
        let (loader, started, release) = gated_loader();

        loader.request(1, NoiseType::Red).unwrap();
        assert_eq!(started.recv_timeout(WAIT).unwrap(), "clips/red.ogg");

        // Queued behind the Red fetch, and already stale when reached
        loader.request(2, NoiseType::Green).unwrap();
        loader.request(3, NoiseType::Blue).unwrap();
        drop(release);

        let first = loader.recv_timeout(WAIT).unwrap();
        let second = loader.recv_timeout(WAIT).unwrap();
        assert_eq!((first.generation, first.noise), (1, NoiseType::Red));
        assert_eq!((second.generation, second.noise), (3, NoiseType::Blue));
        assert!(second.result.is_ok());

        let fetched: Vec<String> = started.try_iter().collect();
        assert_eq!(fetched, vec!["clips/blue.ogg".to_string()]);
    }

    #[test]
    fn test_drop_does_not_wait_for_queued_loads() {
        let fetcher = SlowFetcher(Duration::from_millis(500));
        let loader = ClipLoader::spawn(ClipCache::new(Box::new(fetcher), ClipFormat::Ogg, 44100));
        loader.request(1, NoiseType::Red).unwrap();
        loader.request(1, NoiseType::Pink).unwrap();
        loader.request(1, NoiseType::Grey).unwrap();

        let start = Instant::now();
        drop(loader);
        assert!(start.elapsed() < Duration::from_millis(250));
    }
}
