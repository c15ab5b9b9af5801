//! Screen layout and colors

use miso_audio::{band_frequency, NoiseType, NUM_BANDS};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{format_band_value, AppState, MessageType};

/// Colors for the UI
#[derive(Debug, Clone)]
pub struct Theme {
    pub fg: Color,
    pub fg_dim: Color,
    pub bg: Color,
    /// Selected noise and focused band
    pub highlight: Color,
    pub accent: Color,
    pub danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: Color::Rgb(220, 214, 196),
            fg_dim: Color::Rgb(120, 116, 104),
            bg: Color::Reset,
            highlight: Color::Rgb(232, 160, 64),
            accent: Color::Rgb(120, 190, 150),
            danger: Color::Rgb(230, 90, 80),
        }
    }
}

impl Theme {
    pub fn normal(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    pub fn dim(&self) -> Style {
        Style::default().fg(self.fg_dim).bg(self.bg)
    }

    pub fn highlight(&self) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(self.highlight)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border(&self) -> Style {
        Style::default().fg(self.fg_dim)
    }

    pub fn title(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub fn message(&self, message_type: MessageType) -> Style {
        match message_type {
            MessageType::Info => self.normal(),
            MessageType::Error => Style::default().fg(self.danger).add_modifier(Modifier::BOLD),
        }
    }
}

pub fn render(frame: &mut Frame, app: &AppState, theme: &Theme) {
    let area = frame.area();
    frame.render_widget(Block::default().style(theme.normal()), area);

    let eq_height = if app.eq_open { 6 } else { 0 };
    let chunks = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Length(eq_height),
        Constraint::Min(0),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .split(area);

    let title = Line::from(Span::styled(" MISO ", theme.title()));
    frame.render_widget(Paragraph::new(title).centered(), chunks[0]);

    render_noise_row(frame, chunks[1], app, theme);
    if app.eq_open {
        render_equalizer(frame, chunks[2], app, theme);
    }

    if let Some(message) = &app.message {
        let line = Line::from(Span::styled(message.as_str(), theme.message(app.message_type)));
        frame.render_widget(Paragraph::new(line), chunks[4]);
    }

    let help = "0-8 noise  space silence  ←/→ band  ↑/↓ gain  w flatten  s mute  q quit";
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(help, theme.dim()))),
        chunks[5],
    );
}

fn render_noise_row(frame: &mut Frame, area: Rect, app: &AppState, theme: &Theme) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border())
        .title(Span::styled(" Noise ", theme.dim()));

    let mut spans = Vec::with_capacity(NoiseType::ALL.len() * 2);
    for noise in NoiseType::ALL {
        let label = format!(" {} {} ", noise.ordinal(), noise);
        let style = if noise == app.selected {
            theme.highlight()
        } else {
            theme.normal()
        };
        spans.push(Span::styled(label, style));
        spans.push(Span::raw(" "));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_equalizer(frame: &mut Frame, area: Rect, app: &AppState, theme: &Theme) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border())
        .title(Span::styled(" Equalizer ", theme.dim()));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let columns = Layout::horizontal([Constraint::Ratio(1, NUM_BANDS as u32); NUM_BANDS]).split(inner);
    for (band, column) in columns.iter().enumerate() {
        let style = if band == app.focused_band {
            theme.highlight()
        } else {
            theme.normal()
        };
        let lines = vec![
            Line::from(Span::styled(frequency_label(band_frequency(band)), theme.dim())),
            Line::from(Span::styled(format_band_value(app.gains[band]), style)),
        ];
        frame.render_widget(Paragraph::new(lines).centered(), *column);
    }
}

/// Band caption, e.g. `31.25 Hz`, `2 kHz`
fn frequency_label(hz: f32) -> String {
    if hz >= 1000.0 {
        format!("{} kHz", hz / 1000.0)
    } else {
        format!("{hz} Hz")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_label() {
        assert_eq!(frequency_label(31.25), "31.25 Hz");
        assert_eq!(frequency_label(500.0), "500 Hz");
        assert_eq!(frequency_label(16000.0), "16 kHz");
    }
}
