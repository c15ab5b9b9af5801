//! Keyboard handling

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use miso_audio::NoiseType;

/// Gain change per arrow key press, in dB
pub const GAIN_STEP_DB: f32 = 1.0;

/// Commands produced from key presses
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Select(NoiseType),
    /// Move band focus by this many bands
    FocusBand(i32),
    /// Change the focused band's gain by this many dB
    AdjustBand(f32),
    FlattenEqualizer,
    MuteEqualizer,
    Quit,
}

/// Map a key press to a command
pub fn handle_key(key: KeyEvent) -> Option<Command> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Command::Quit);
    }

    match key.code {
        KeyCode::Char(c @ '0'..='9') => c
            .to_digit(10)
            .and_then(|d| NoiseType::from_ordinal(d as usize))
            .map(Command::Select),
        KeyCode::Char(' ') => Some(Command::Select(NoiseType::Silence)),
        KeyCode::Char('h') | KeyCode::Left => Some(Command::FocusBand(-1)),
        KeyCode::Char('l') | KeyCode::Right => Some(Command::FocusBand(1)),
        KeyCode::Char('k') | KeyCode::Up => Some(Command::AdjustBand(GAIN_STEP_DB)),
        KeyCode::Char('j') | KeyCode::Down => Some(Command::AdjustBand(-GAIN_STEP_DB)),
        KeyCode::Char('w') => Some(Command::FlattenEqualizer),
        KeyCode::Char('s') => Some(Command::MuteEqualizer),
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}
