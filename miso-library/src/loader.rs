//! Clip decoding

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::debug;

use crate::noise::NoiseType;

/// Errors that can occur while obtaining a clip
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClipError {
    /// Fetch failed or returned a non-success response
    #[error("Network error: {0}")]
    Network(String),
    /// Payload is not decodable audio
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("{0} has no audio clip")]
    NoClip(NoiseType),
}

/// Decoded clip samples, ready for looping playback
#[derive(Debug)]
pub struct ClipBuffer {
    /// Interleaved stereo samples (f32, normalized to -1.0 to 1.0)
    samples: Vec<f32>,
    sample_rate: u32,
}

impl ClipBuffer {
    /// Wrap interleaved stereo samples
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Clip decoder using Symphonia, resampling to the output rate
pub struct ClipDecoder {
    target_sample_rate: u32,
}

impl ClipDecoder {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    /// Decode a whole encoded clip into stereo samples at the target rate
    pub fn decode(&self, bytes: Vec<u8>, extension: &str) -> Result<ClipBuffer, ClipError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(extension);

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| ClipError::Decode(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| ClipError::Decode("no audio track".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let source_sample_rate = codec_params.sample_rate.unwrap_or(44100);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| ClipError::Decode(e.to_string()))?;

        let mut samples: Vec<f32> = Vec::new();
        let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(_) => break,
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(_) => continue,
            };

            let spec = *decoded.spec();
            channels = spec.channels.count();
            let duration = decoded.capacity() as u64;

            let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(sample_buf.samples());
        }

        if samples.is_empty() || channels == 0 {
            return Err(ClipError::Decode("clip contains no samples".to_string()));
        }

        let stereo = to_stereo(&samples, channels);

        let stereo = if source_sample_rate != self.target_sample_rate {
            debug!(
                from = source_sample_rate,
                to = self.target_sample_rate,
                "resampling clip"
            );
            self.resample(&stereo, source_sample_rate)?
        } else {
            stereo
        };

        Ok(ClipBuffer::new(stereo, self.target_sample_rate))
    }

    /// Resample interleaved stereo audio to the target sample rate
    fn resample(&self, samples: &[f32], source_rate: u32) -> Result<Vec<f32>, ClipError> {
        use rubato::{FftFixedInOut, Resampler};

        const CHANNELS: usize = 2;
        let frames = samples.len() / CHANNELS;

        let mut resampler = FftFixedInOut::<f32>::new(
            source_rate as usize,
            self.target_sample_rate as usize,
            1024,
            CHANNELS,
        )
        .map_err(|e| ClipError::Decode(e.to_string()))?;

        let deinterleaved: Vec<Vec<f32>> = (0..CHANNELS)
            .map(|ch| (0..frames).map(|f| samples[f * CHANNELS + ch]).collect())
            .collect();

        // The resampler lags its input by `delay` frames; drop that lead-in
        // and keep feeding silence until the last real frame has come out
        let delay = resampler.output_delay();
        let wanted = (frames as u64 * self.target_sample_rate as u64)
            .div_ceil(source_rate as u64) as usize;
        let chunk_size = resampler.input_frames_next();
        let mut output: Vec<Vec<f32>> = vec![Vec::new(); CHANNELS];

        let mut pos = 0;
        while output[0].len() < delay + wanted {
            let chunk: Vec<Vec<f32>> = deinterleaved
                .iter()
                .map(|ch| {
                    let end = (pos + chunk_size).min(frames);
                    let mut v = ch[pos.min(end)..end].to_vec();
                    v.resize(chunk_size, 0.0);
                    v
                })
                .collect();
            let input_refs: Vec<&[f32]> = chunk.iter().map(|v| v.as_slice()).collect();

            let resampled = resampler
                .process(&input_refs, None)
                .map_err(|e| ClipError::Decode(e.to_string()))?;

            for (ch, data) in resampled.into_iter().enumerate() {
                output[ch].extend(data);
            }

            pos += chunk_size;
        }

        for channel in &mut output {
            channel.drain(..delay);
            channel.truncate(wanted);
        }

        let output_frames = output[0].len();
        let mut interleaved = Vec::with_capacity(output_frames * CHANNELS);
        for frame_idx in 0..output_frames {
            for channel in &output {
                interleaved.push(channel[frame_idx]);
            }
        }

        Ok(interleaved)
    }
}

/// Fold interleaved audio with any channel count into stereo
fn to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        2 => samples.to_vec(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        n => samples
            .chunks_exact(n)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}
