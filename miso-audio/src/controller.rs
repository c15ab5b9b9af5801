//! Playback controller - the single owner of the audio graph
//!
//! Every `select` tears the current session down completely before starting
//! the next one. Clip loads run on the loader thread and come back through
//! `poll`/`wait_for_load`; each carries the generation of the `select` that
//! asked for it, and anything older than the latest selection is dropped
//! without touching the graph.

use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use miso_library::{
    clamp_gain, BandSettings, ClipError, ClipLoader, LoadOutcome, NoiseType, MIN_DB, NUM_BANDS,
};
use tracing::{debug, error, info, warn};

use crate::graph::{Route, SharedGraph};
use crate::source::LoopingSource;

/// Notifications for the front end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// A clip could not be loaded; the player is back to silence
    NetworkError,
    /// The custom equalizer is active; show its panel
    EqualizerOpened,
    /// The custom equalizer is gone; hide its panel
    EqualizerClosed,
    /// Sound is playing for this selection
    Started(NoiseType),
    /// Silence was selected
    Stopped,
}

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Idle,
    /// Waiting for the clip of the selection
    Loading(NoiseType),
    Playing(NoiseType),
}

impl PlayerState {
    /// Selection currently in effect, `None` when idle
    pub fn active(&self) -> Option<NoiseType> {
        match self {
            PlayerState::Idle => None,
            PlayerState::Loading(noise) | PlayerState::Playing(noise) => Some(*noise),
        }
    }
}

/// Top-level playback state machine
pub struct PlaybackController {
    graph: SharedGraph,
    loader: ClipLoader,
    settings: Box<dyn BandSettings>,
    event_tx: Sender<PlaybackEvent>,
    state: PlayerState,
    /// Bumped on every `select`; loads from older selections are stale
    generation: u64,
}

impl PlaybackController {
    /// Create the notification channel
    pub fn create_channel() -> (Sender<PlaybackEvent>, Receiver<PlaybackEvent>) {
        unbounded()
    }

    pub fn new(
        graph: SharedGraph,
        loader: ClipLoader,
        settings: Box<dyn BandSettings>,
        event_tx: Sender<PlaybackEvent>,
    ) -> Self {
        Self {
            graph,
            loader,
            settings,
            event_tx,
            state: PlayerState::Idle,
            generation: 0,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    pub fn is_equalizer_open(&self) -> bool {
        self.graph.lock().chain().is_some()
    }

    /// Switch to `noise`, stopping whatever is playing first
    pub fn select(&mut self, noise: NoiseType) {
        self.generation += 1;
        self.teardown();

        let Some(base) = noise.playback_base() else {
            info!("silence selected");
            self.emit(PlaybackEvent::Stopped);
            return;
        };

        if noise.is_custom() {
            let gains = self.settings.gains();
            self.graph.lock().build_chain(&gains);
            self.emit(PlaybackEvent::EqualizerOpened);
        }

        info!(%noise, %base, generation = self.generation, "loading noise");
        self.state = PlayerState::Loading(noise);

        if let Err(e) = self.loader.request(self.generation, base) {
            self.fail_load(noise, &e);
        }
    }

    /// Apply every finished load without blocking. Returns how many arrived.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Some(outcome) = self.loader.try_recv() {
            self.complete_load(outcome);
            handled += 1;
        }
        handled
    }

    /// Block until the pending load settles or `timeout` passes.
    ///
    /// Returns `true` when no load is pending anymore.
    pub fn wait_for_load(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        while matches!(self.state, PlayerState::Loading(_)) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.loader.recv_timeout(remaining) {
                Some(outcome) => self.complete_load(outcome),
                None => return false,
            }
        }
        true
    }

    /// Store a band gain and apply it live when the equalizer is built.
    ///
    /// Returns the clamped value that was stored.
    pub fn set_band_gain(&mut self, band: usize, gain_db: f32) -> f32 {
        let gain_db = clamp_gain(gain_db);
        if band >= NUM_BANDS {
            warn!(band, "ignoring gain for unknown band");
            return gain_db;
        }

        self.settings.set(band, gain_db);
        if let Some(chain) = self.graph.lock().chain_mut() {
            chain.set_band_gain(band, gain_db);
        }
        debug!(band, gain_db, "band gain set");
        gain_db
    }

    /// Stored gain of every band
    pub fn band_gains(&self) -> [f32; NUM_BANDS] {
        self.settings.gains()
    }

    /// Rewrite every band with `f(current_gain, band)` while the equalizer
    /// is built. Returns `false` when there is no equalizer.
    pub fn reshape_bands<F>(&mut self, f: F) -> bool
    where
        F: Fn(f32, usize) -> f32,
    {
        if !self.is_equalizer_open() {
            return false;
        }
        let current = self.band_gains();
        for (band, gain) in current.iter().enumerate() {
            self.set_band_gain(band, f(*gain, band));
        }
        true
    }

    /// Set every band to 0 dB, leaving the base noise unchanged
    pub fn flatten_equalizer(&mut self) -> bool {
        self.reshape_bands(|_, _| 0.0)
    }

    /// Set every band to the minimum gain
    pub fn mute_equalizer(&mut self) -> bool {
        self.reshape_bands(|_, _| MIN_DB)
    }

    fn complete_load(&mut self, outcome: LoadOutcome) {
        if outcome.generation != self.generation {
            debug!(
                noise = %outcome.noise,
                stale = outcome.generation,
                current = self.generation,
                "discarding superseded clip load"
            );
            return;
        }

        let PlayerState::Loading(noise) = self.state else {
            debug!(noise = %outcome.noise, "no load pending, ignoring outcome");
            return;
        };

        match outcome.result {
            Ok(buffer) => {
                let mut source = LoopingSource::new(noise, buffer);
                source.set_looping(true);

                let mut graph = self.graph.lock();
                let route = if graph.chain().is_some() {
                    Route::Equalizer
                } else {
                    Route::Output
                };
                source.start();
                graph.connect_source(source, route);
                drop(graph);

                info!(%noise, ?route, "playing");
                self.state = PlayerState::Playing(noise);
                self.emit(PlaybackEvent::Started(noise));
            }
            Err(e) => self.fail_load(noise, &e),
        }
    }

    fn fail_load(&mut self, noise: NoiseType, e: &ClipError) {
        error!(%noise, error = %e, "could not load noise");
        self.teardown();
        self.emit(PlaybackEvent::NetworkError);
    }

    /// Stop and disconnect the source and destroy the chain
    fn teardown(&mut self) {
        let (source, had_chain) = {
            let mut graph = self.graph.lock();
            (graph.disconnect_source(), graph.destroy_chain())
        };

        if let Some(source) = source {
            debug!(noise = %source.noise(), "source stopped");
        }
        if had_chain {
            self.emit(PlaybackEvent::EqualizerClosed);
        }
        self.state = PlayerState::Idle;
    }

    fn emit(&self, event: PlaybackEvent) {
        // Nobody listening is fine
        let _ = self.event_tx.send(event);
    }
}
