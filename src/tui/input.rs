use ratatui::prelude::*;
use ratatui::widgets::*;

use crate::config::themes::Theme;
use crate::tui::app::{App, Focus};

const PROMPT: &str = "> ";

pub fn render(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let focused = app.focus == Focus::Input;
    let accent: Color = theme.accent.into();
    let border = if focused { accent } else { theme.border.into() };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border));

    let placeholder = if app.is_streaming {
        "Waiting for the assistant... (Esc to cancel)"
    } else {
        "Tell the assistant what you did or need to do, / for commands"
    };

    let (display_text, text_style) = if app.input_text.is_empty() {
        (placeholder, Style::default().fg(theme.dim_text.into()))
    } else {
        (app.input_text.as_str(), Style::default().fg(theme.text.into()))
    };

    let line = Line::from(vec![
        Span::styled(PROMPT, Style::default().fg(accent).bold()),
        Span::styled(display_text, text_style),
    ]);
    frame.render_widget(Paragraph::new(line).block(block), area);

    // Position cursor (count chars up to byte offset for display column)
    if focused && !app.is_streaming {
        let char_pos = app.input_text[..app.input_cursor].chars().count();
        let cursor_x = area.x + 1 + PROMPT.len() as u16 + char_pos as u16;
        frame.set_cursor_position(Position::new(cursor_x, area.y + 1));
    }
}
