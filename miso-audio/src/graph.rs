//! Audio output graph
//!
//! The graph is the only thing the output callback touches: it renders
//! whatever source is connected, through the equalizer chain when routed
//! there. Nodes are created and destroyed only by the playback controller.

use std::sync::Arc;

use miso_library::NUM_BANDS;
use parking_lot::Mutex;

use crate::equalizer::EqualizerChain;
use crate::source::LoopingSource;

/// Graph shared between the controller and the output callback
pub type SharedGraph = Arc<Mutex<AudioGraph>>;

/// Where a connected source sends its signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    /// Straight to the output
    #[default]
    Output,
    /// Into the tail of the equalizer chain
    Equalizer,
}

/// Single-source output graph
#[derive(Debug)]
pub struct AudioGraph {
    sample_rate: u32,
    source: Option<LoopingSource>,
    route: Route,
    chain: Option<EqualizerChain>,
}

impl AudioGraph {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            source: None,
            route: Route::Output,
            chain: None,
        }
    }

    /// Create a graph ready to share with an output callback
    pub fn shared(sample_rate: u32) -> SharedGraph {
        Arc::new(Mutex::new(Self::new(sample_rate)))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn source(&self) -> Option<&LoopingSource> {
        self.source.as_ref()
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn chain(&self) -> Option<&EqualizerChain> {
        self.chain.as_ref()
    }

    /// Number of connected sources producing sound (0 or 1)
    pub fn producing_sources(&self) -> usize {
        self.source.iter().filter(|s| s.is_started()).count()
    }

    pub(crate) fn chain_mut(&mut self) -> Option<&mut EqualizerChain> {
        self.chain.as_mut()
    }

    /// Replace any chain with a new one
    pub(crate) fn build_chain(&mut self, gains: &[f32; NUM_BANDS]) {
        self.chain = Some(EqualizerChain::build(self.sample_rate, gains));
    }

    /// Drop the chain. Returns whether one existed.
    pub(crate) fn destroy_chain(&mut self) -> bool {
        if self.route == Route::Equalizer {
            self.route = Route::Output;
        }
        self.chain.take().is_some()
    }

    /// Connect a source, stopping any previous one
    pub(crate) fn connect_source(&mut self, source: LoopingSource, route: Route) {
        if let Some(mut previous) = self.source.take() {
            previous.stop();
        }
        self.route = route;
        self.source = Some(source);
    }

    /// Stop and disconnect the current source
    pub(crate) fn disconnect_source(&mut self) -> Option<LoopingSource> {
        self.route = Route::Output;
        self.source.take().map(|mut source| {
            source.stop();
            source
        })
    }

    /// Render stereo interleaved output
    pub fn process(&mut self, output: &mut [f32]) {
        match self.source.as_mut() {
            Some(source) => source.process(output),
            None => {
                output.fill(0.0);
                return;
            }
        }

        if self.route == Route::Equalizer {
            if let Some(chain) = self.chain.as_mut() {
                chain.process(output);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miso_library::{ClipBuffer, NoiseType, MIN_DB};

    fn started_source() -> LoopingSource {
        let buffer = Arc::new(ClipBuffer::new(vec![0.5; 2048], 48000));
        let mut source = LoopingSource::new(NoiseType::White, buffer);
        source.set_looping(true);
        source.start();
        source
    }

    #[test]
    fn test_empty_graph_renders_silence() {
        let mut graph = AudioGraph::new(48000);
        let mut out = vec![1.0; 16];
        graph.process(&mut out);
        assert_eq!(out, vec![0.0; 16]);
        assert_eq!(graph.producing_sources(), 0);
    }

    #[test]
    fn test_connect_replaces_previous_source() {
        let mut graph = AudioGraph::new(48000);
        graph.connect_source(started_source(), Route::Output);
        graph.connect_source(started_source(), Route::Output);
        assert_eq!(graph.producing_sources(), 1);

        let source = graph.disconnect_source().unwrap();
        assert!(!source.is_started());
        assert_eq!(graph.producing_sources(), 0);
    }

    #[test]
    fn test_equalizer_route_applies_chain() {
        let mut graph = AudioGraph::new(48000);
        graph.build_chain(&[MIN_DB; NUM_BANDS]);
        graph.connect_source(started_source(), Route::Equalizer);

        let mut out = vec![0.0; 2048];
        graph.process(&mut out);

        // DC through a -48 dB low shelf ends up far below the input level
        let last = out[out.len() - 2].abs();
        assert!(last < 0.05, "got {}", last);
    }

    #[test]
    fn test_destroy_chain_reroutes_to_output() {
        let mut graph = AudioGraph::new(48000);
        graph.build_chain(&[0.0; NUM_BANDS]);
        graph.connect_source(started_source(), Route::Equalizer);

        assert!(graph.destroy_chain());
        assert!(!graph.destroy_chain());
        assert_eq!(graph.route(), Route::Output);
        assert!(graph.chain().is_none());
    }
}
