use ratatui::prelude::*;
use ratatui::widgets::*;

use crate::config::themes::Theme;
use crate::tui::app::{App, Focus};

pub fn render(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let dim = Style::default().fg(theme.dim_text.into());

    let left_text = format!(" todo-chat | {}", app.config.model);

    let token_str = if app.total_tokens > 0 {
        format!(
            "\u{2191}{} \u{2193}{} \u{3a3}{}",
            format_tokens(app.prompt_tokens),
            format_tokens(app.completion_tokens),
            format_tokens(app.total_tokens),
        )
    } else {
        "0".to_string()
    };
    let right_text = format!("Tokens: {} | {} ", token_str, key_hints(app.focus));

    let total_width = area.width as usize;
    let padding =
        total_width.saturating_sub(left_text.chars().count() + right_text.chars().count());

    let line = Line::from(vec![
        Span::styled(left_text, dim),
        Span::styled(" ".repeat(padding), dim),
        Span::styled(right_text, dim),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}

fn key_hints(focus: Focus) -> &'static str {
    match focus {
        Focus::Input => "Tab: todos | \u{2191}\u{2193}: scroll | /help",
        Focus::Todos => "Tab: chat | Space: toggle | d: remove",
    }
}

fn format_tokens(tokens: u64) -> String {
    if tokens >= 1_000_000 {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    } else if tokens >= 1_000 {
        format!("{:.1}k", tokens as f64 / 1_000.0)
    } else {
        format!("{}", tokens)
    }
}
