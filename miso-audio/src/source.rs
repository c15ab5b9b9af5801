//! Looping clip playback

use std::sync::Arc;

use miso_library::{ClipBuffer, NoiseType};

/// Plays one decoded clip, optionally looping forever
#[derive(Debug)]
pub struct LoopingSource {
    noise: NoiseType,
    buffer: Arc<ClipBuffer>,
    /// Current frame
    position: usize,
    looping: bool,
    started: bool,
}

impl LoopingSource {
    /// Bind a new, stopped source to a clip
    pub fn new(noise: NoiseType, buffer: Arc<ClipBuffer>) -> Self {
        Self {
            noise,
            buffer,
            position: 0,
            looping: false,
            started: false,
        }
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn start(&mut self) {
        self.started = true;
    }

    pub fn stop(&mut self) {
        self.started = false;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Selection this source was created for
    pub fn noise(&self) -> NoiseType {
        self.noise
    }

    /// Current frame position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Fill stereo interleaved `output`. Silence once stopped or finished.
    pub fn process(&mut self, output: &mut [f32]) {
        let samples = self.buffer.samples();
        let frames = self.buffer.frames();

        for frame in output.chunks_mut(2) {
            if !self.started || frames == 0 {
                frame.fill(0.0);
                continue;
            }

            if self.position >= frames {
                if self.looping {
                    self.position = 0;
                } else {
                    self.started = false;
                    frame.fill(0.0);
                    continue;
                }
            }

            let idx = self.position * 2;
            frame[0] = samples[idx];
            if let Some(right) = frame.get_mut(1) {
                *right = samples[idx + 1];
            }
            self.position += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> Arc<ClipBuffer> {
        let samples = (0..frames).flat_map(|i| [i as f32, -(i as f32)]).collect();
        Arc::new(ClipBuffer::new(samples, 48000))
    }

    #[test]
    fn test_unstarted_source_is_silent() {
        let mut source = LoopingSource::new(NoiseType::White, ramp(4));
        let mut out = vec![1.0; 8];
        source.process(&mut out);
        assert_eq!(out, vec![0.0; 8]);
    }

    #[test]
    fn test_loop_wraps_around() {
        let mut source = LoopingSource::new(NoiseType::White, ramp(3));
        source.set_looping(true);
        source.start();

        let mut out = vec![0.0; 10];
        source.process(&mut out);

        assert_eq!(
            out,
            vec![0.0, -0.0, 1.0, -1.0, 2.0, -2.0, 0.0, -0.0, 1.0, -1.0]
        );
        assert!(source.is_started());
    }

    #[test]
    fn test_one_shot_stops_at_end() {
        let mut source = LoopingSource::new(NoiseType::Red, ramp(2));
        source.start();

        let mut out = vec![9.0; 8];
        source.process(&mut out);

        assert_eq!(out, vec![0.0, -0.0, 1.0, -1.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(!source.is_started());
    }
}
