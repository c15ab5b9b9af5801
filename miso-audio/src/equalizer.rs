//! Graphic equalizer for the custom noise mode
//!
//! A chain of `NUM_BANDS` biquad stages using RBJ Audio EQ Cookbook
//! formulas. Band 0 is a low shelf, the last band a high shelf and the
//! rest are peaking filters. Centre frequencies double per band from
//! 31.25 Hz; frequency and Q never change after construction.
//!
//! Signal enters at the tail (highest band) and leaves from the head
//! (band 0) towards the output.

use std::f32::consts::{PI, SQRT_2};

use miso_library::{clamp_gain, NUM_BANDS};
use tracing::{debug, warn};

/// Centre frequency of band 0
pub const BASE_FREQUENCY_HZ: f32 = 31.25;
/// Quality factor shared by every band
pub const BAND_Q: f32 = SQRT_2;

/// Gain changes glide over roughly this long
const GAIN_SMOOTH_SECS: f32 = 0.005;
/// Frames between coefficient updates while a gain is gliding
const SMOOTH_BLOCK_FRAMES: usize = 32;

/// Centre frequency of a band
pub fn band_frequency(index: usize) -> f32 {
    BASE_FREQUENCY_HZ * 2f32.powi(index as i32)
}

/// Filter shape of a band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandKind {
    LowShelf,
    Peaking,
    HighShelf,
}

impl BandKind {
    /// Shape used at `index` in a chain of `NUM_BANDS`
    pub fn for_index(index: usize) -> Self {
        if index == 0 {
            BandKind::LowShelf
        } else if index == NUM_BANDS - 1 {
            BandKind::HighShelf
        } else {
            BandKind::Peaking
        }
    }
}

/// Biquad filter coefficients
#[derive(Debug, Clone, Copy)]
struct BiquadCoeffs {
    a0: f32,
    a1: f32,
    a2: f32,
    b1: f32,
    b2: f32,
}

impl BiquadCoeffs {
    const UNITY: Self = Self {
        a0: 1.0,
        a1: 0.0,
        a2: 0.0,
        b1: 0.0,
        b2: 0.0,
    };

    fn design(kind: BandKind, freq: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        if gain_db.abs() < 0.01 {
            return Self::UNITY;
        }

        // Keep the centre below Nyquist for low output rates
        let freq = freq.min(sample_rate * 0.49);
        let a = 10.0f32.powf(gain_db / 40.0);
        let omega = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();

        match kind {
            BandKind::LowShelf => {
                let alpha = sin_omega / 2.0 * SQRT_2; // Slope = 1
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                let a0 = (a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha;

                Self {
                    a0: (a * ((a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha)) / a0,
                    a1: (2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega)) / a0,
                    a2: (a * ((a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha)) / a0,
                    b1: (-2.0 * ((a - 1.0) + (a + 1.0) * cos_omega)) / a0,
                    b2: ((a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha) / a0,
                }
            }
            BandKind::HighShelf => {
                let alpha = sin_omega / 2.0 * SQRT_2;
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                let a0 = (a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha;

                Self {
                    a0: (a * ((a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha)) / a0,
                    a1: (-2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega)) / a0,
                    a2: (a * ((a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha)) / a0,
                    b1: (2.0 * ((a - 1.0) - (a + 1.0) * cos_omega)) / a0,
                    b2: ((a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha) / a0,
                }
            }
            BandKind::Peaking => {
                let alpha = sin_omega / (2.0 * q);
                let a0 = 1.0 + alpha / a;

                Self {
                    a0: (1.0 + alpha * a) / a0,
                    a1: (-2.0 * cos_omega) / a0,
                    a2: (1.0 - alpha * a) / a0,
                    b1: (-2.0 * cos_omega) / a0,
                    b2: (1.0 - alpha / a) / a0,
                }
            }
        }
    }
}

/// Biquad filter state for a single channel
#[derive(Debug, Default, Clone)]
struct BiquadState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input: f32, coeffs: &BiquadCoeffs) -> f32 {
        let output = coeffs.a0 * input + coeffs.a1 * self.x1 + coeffs.a2 * self.x2
            - coeffs.b1 * self.y1
            - coeffs.b2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// One equalizer band and its stereo filter
#[derive(Debug, Clone)]
pub struct EqStage {
    index: usize,
    kind: BandKind,
    frequency_hz: f32,
    q: f32,
    /// Target gain
    gain_db: f32,
    /// Gain the coefficients currently reflect
    gain_smooth: f32,
    smooth_coeff: f32,
    sample_rate: f32,
    coeffs: BiquadCoeffs,
    state_l: BiquadState,
    state_r: BiquadState,
}

impl EqStage {
    fn new(index: usize, gain_db: f32, sample_rate: f32) -> Self {
        let gain_db = clamp_gain(gain_db);
        let block = SMOOTH_BLOCK_FRAMES as f32;
        let mut stage = Self {
            index,
            kind: BandKind::for_index(index),
            frequency_hz: band_frequency(index),
            q: BAND_Q,
            gain_db,
            // Built chains start at their gains without a glide
            gain_smooth: gain_db,
            smooth_coeff: 1.0 - (-block / (sample_rate * GAIN_SMOOTH_SECS)).exp(),
            sample_rate,
            coeffs: BiquadCoeffs::UNITY,
            state_l: BiquadState::default(),
            state_r: BiquadState::default(),
        };
        stage.update_coefficients();
        stage
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> BandKind {
        self.kind
    }

    pub fn frequency_hz(&self) -> f32 {
        self.frequency_hz
    }

    pub fn q(&self) -> f32 {
        self.q
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    /// Set the target gain (clamped); the filter glides towards it
    fn set_gain(&mut self, gain_db: f32) {
        self.gain_db = clamp_gain(gain_db);
    }

    fn update_coefficients(&mut self) {
        self.coeffs = BiquadCoeffs::design(
            self.kind,
            self.frequency_hz,
            self.gain_smooth,
            self.q,
            self.sample_rate,
        );
    }

    /// Move the applied gain one step towards the target
    fn smooth_and_update(&mut self) {
        if self.gain_smooth == self.gain_db {
            return;
        }
        if (self.gain_smooth - self.gain_db).abs() > 0.001 {
            self.gain_smooth += (self.gain_db - self.gain_smooth) * self.smooth_coeff;
        } else {
            self.gain_smooth = self.gain_db;
        }
        self.update_coefficients();
    }

    /// Filter stereo interleaved samples in place
    fn process(&mut self, samples: &mut [f32]) {
        for block in samples.chunks_mut(SMOOTH_BLOCK_FRAMES * 2) {
            self.smooth_and_update();
            for frame in block.chunks_exact_mut(2) {
                frame[0] = self.state_l.process(frame[0], &self.coeffs);
                frame[1] = self.state_r.process(frame[1], &self.coeffs);
            }
        }
    }
}

/// Ordered chain of equalizer stages
#[derive(Debug, Clone)]
pub struct EqualizerChain {
    /// Index 0 is the head (feeds the output), last is the tail (entry)
    stages: Vec<EqStage>,
}

impl EqualizerChain {
    /// Build a chain with the given starting gains
    pub fn build(sample_rate: u32, initial_gains: &[f32; NUM_BANDS]) -> Self {
        let stages = initial_gains
            .iter()
            .enumerate()
            .map(|(index, &gain)| EqStage::new(index, gain, sample_rate as f32))
            .collect();
        debug!(?initial_gains, "equalizer chain built");
        Self { stages }
    }

    /// Stage feeding the output (band 0)
    pub fn head(&self) -> &EqStage {
        &self.stages[0]
    }

    /// Stage receiving the source signal (last band)
    pub fn tail(&self) -> &EqStage {
        &self.stages[self.stages.len() - 1]
    }

    pub fn stages(&self) -> &[EqStage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Current gain of a band
    pub fn gain(&self, band: usize) -> Option<f32> {
        self.stages.get(band).map(EqStage::gain_db)
    }

    /// Current gains of every band
    pub fn gains(&self) -> [f32; NUM_BANDS] {
        std::array::from_fn(|band| self.gain(band).unwrap_or(0.0))
    }

    /// Apply a gain live. Returns the clamped value, or `None` for a bad band.
    pub fn set_band_gain(&mut self, band: usize, gain_db: f32) -> Option<f32> {
        match self.stages.get_mut(band) {
            Some(stage) => {
                stage.set_gain(gain_db);
                Some(stage.gain_db())
            }
            None => {
                warn!(band, "no such equalizer band");
                None
            }
        }
    }

    /// Run stereo samples from the tail through to the head
    pub fn process(&mut self, samples: &mut [f32]) {
        for stage in self.stages.iter_mut().rev() {
            stage.process(samples);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miso_library::{MAX_DB, MIN_DB};

    fn flat() -> [f32; NUM_BANDS] {
        [0.0; NUM_BANDS]
    }

    /// RMS of the left channel after the chain settles
    fn sine_rms(chain: &mut EqualizerChain, freq: f32, sample_rate: f32) -> f32 {
        let frames = sample_rate as usize;
        let mut samples: Vec<f32> = (0..frames)
            .flat_map(|i| {
                let s = (2.0 * PI * freq * i as f32 / sample_rate).sin() * 0.5;
                [s, s]
            })
            .collect();
        chain.process(&mut samples);

        let tail = &samples[samples.len() / 2..];
        let sum: f32 = tail.chunks_exact(2).map(|f| f[0] * f[0]).sum();
        (sum / (tail.len() / 2) as f32).sqrt()
    }

    #[test]
    fn test_band_layout() {
        let chain = EqualizerChain::build(48000, &flat());
        assert_eq!(chain.len(), NUM_BANDS);

        assert_eq!(chain.head().index(), 0);
        assert_eq!(chain.head().kind(), BandKind::LowShelf);
        assert_eq!(chain.tail().index(), NUM_BANDS - 1);
        assert_eq!(chain.tail().kind(), BandKind::HighShelf);

        for stage in &chain.stages()[1..NUM_BANDS - 1] {
            assert_eq!(stage.kind(), BandKind::Peaking);
        }
        for (i, stage) in chain.stages().iter().enumerate() {
            assert_eq!(stage.frequency_hz(), 31.25 * 2f32.powi(i as i32));
            assert_eq!(stage.q(), SQRT_2);
        }
        assert_eq!(chain.tail().frequency_hz(), 16000.0);
    }

    #[test]
    fn test_initial_gains_are_clamped() {
        let mut gains = flat();
        gains[0] = -1000.0;
        gains[1] = 10.0;
        gains[2] = -6.0;
        let chain = EqualizerChain::build(48000, &gains);

        assert_eq!(chain.gain(0), Some(MIN_DB));
        assert_eq!(chain.gain(1), Some(MAX_DB));
        assert_eq!(chain.gain(2), Some(-6.0));
    }

    #[test]
    fn test_set_band_gain() {
        let mut chain = EqualizerChain::build(48000, &flat());
        assert_eq!(chain.set_band_gain(4, -12.0), Some(-12.0));
        assert_eq!(chain.set_band_gain(4, -99.0), Some(MIN_DB));
        assert_eq!(chain.set_band_gain(NUM_BANDS, -3.0), None);
        assert_eq!(chain.gain(4), Some(MIN_DB));
    }

    #[test]
    fn test_live_gain_change_glides() {
        let mut chain = EqualizerChain::build(48000, &flat());
        chain.set_band_gain(5, -24.0);

        let mut block = vec![0.0; SMOOTH_BLOCK_FRAMES * 2];
        chain.process(&mut block);
        let applied = chain.stages()[5].gain_smooth;
        assert!(applied < 0.0 && applied > -24.0, "applied {}", applied);

        // 200 ms is far past the glide time
        let mut settle = vec![0.0; 9600 * 2];
        chain.process(&mut settle);
        assert_eq!(chain.stages()[5].gain_smooth, -24.0);
    }

    #[test]
    fn test_built_gains_apply_without_glide() {
        let mut gains = flat();
        gains[3] = -12.0;
        let chain = EqualizerChain::build(48000, &gains);
        assert_eq!(chain.stages()[3].gain_smooth, -12.0);
    }

    #[test]
    fn test_flat_chain_is_transparent() {
        let mut chain = EqualizerChain::build(48000, &flat());
        let mut samples = vec![0.5, -0.5, 0.25, -0.25, 0.1, 0.1];
        let original = samples.clone();
        chain.process(&mut samples);
        assert_eq!(samples, original);
    }

    #[test]
    fn test_peaking_cut_attenuates_its_band() {
        let sample_rate = 48000.0;
        let mut gains = flat();
        gains[5] = -24.0; // 1 kHz
        let mut cut = EqualizerChain::build(48000, &gains);
        let mut reference = EqualizerChain::build(48000, &flat());

        let cut_rms = sine_rms(&mut cut, 1000.0, sample_rate);
        let ref_rms = sine_rms(&mut reference, 1000.0, sample_rate);

        assert!(cut_rms < ref_rms * 0.2, "cut {} vs ref {}", cut_rms, ref_rms);
    }

    #[test]
    fn test_muted_chain_stays_stable() {
        let mut chain = EqualizerChain::build(44100, &[MIN_DB; NUM_BANDS]);
        let rms = sine_rms(&mut chain, 440.0, 44100.0);
        assert!(rms.is_finite());
        assert!(rms < 0.05);
    }
}
