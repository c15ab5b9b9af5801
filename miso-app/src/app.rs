//! Front-end state

use miso_audio::{NoiseType, PlaybackEvent, NUM_BANDS};

/// Shown when a clip cannot be loaded
pub const NETWORK_ERROR_MESSAGE: &str =
    "A network problem kept the sound from playing. Check your connection and try again.";

/// Message type for colored status messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageType {
    #[default]
    Info,
    Error,
}

/// Everything the screen shows
#[derive(Debug, Default)]
pub struct AppState {
    /// Highlighted noise button
    pub selected: NoiseType,
    /// Whether sound is actually coming out
    pub playing: bool,
    pub eq_open: bool,
    pub focused_band: usize,
    pub gains: [f32; NUM_BANDS],
    pub message: Option<String>,
    pub message_type: MessageType,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(gains: [f32; NUM_BANDS]) -> Self {
        Self {
            gains,
            ..Default::default()
        }
    }

    /// A button was pressed
    pub fn select(&mut self, noise: NoiseType) {
        self.selected = noise;
        self.playing = false;
        if noise.is_silence() {
            self.clear_message();
        } else {
            self.set_message(format!("Loading {noise}..."));
        }
    }

    pub fn focus_band(&mut self, delta: i32) {
        let band = self.focused_band as i32 + delta;
        self.focused_band = band.clamp(0, NUM_BANDS as i32 - 1) as usize;
    }

    /// React to a notification from the controller
    pub fn handle_playback_event(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::NetworkError => {
                self.selected = NoiseType::Silence;
                self.playing = false;
                self.set_error(NETWORK_ERROR_MESSAGE);
            }
            PlaybackEvent::EqualizerOpened => self.eq_open = true,
            PlaybackEvent::EqualizerClosed => self.eq_open = false,
            PlaybackEvent::Started(noise) => {
                self.playing = true;
                self.set_message(format!("Playing {noise} noise"));
            }
            PlaybackEvent::Stopped => {
                self.playing = false;
            }
        }
    }

    pub fn clear_message(&mut self) {
        self.message = None;
        self.message_type = MessageType::Info;
    }

    pub fn set_message(&mut self, msg: impl Into<String>) {
        self.message = Some(msg.into());
        self.message_type = MessageType::Info;
    }

    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.message = Some(msg.into());
        self.message_type = MessageType::Error;
    }
}

/// Band gain readout, e.g. `+0 dB`, `-12 dB`
pub fn format_band_value(db: f32) -> String {
    // Fold -0 into +0
    let db = db + 0.0;
    let sign = if db >= 0.0 { "+" } else { "" };
    format!("{sign}{db} dB")
}
