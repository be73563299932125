use ratatui::prelude::*;
use ratatui::widgets::*;

use crate::config::themes::Theme;
use crate::todo::Todo;

pub struct TodoListView<'a> {
    pub todos: &'a [Todo],
    pub selected: usize,
    pub focused: bool,
    /// Most recently changed item, drawn in the accent color.
    pub highlight: Option<&'a str>,
}

pub fn render(frame: &mut Frame, area: Rect, view: &TodoListView, theme: &Theme) {
    let accent: Color = theme.accent.into();
    let text_color: Color = theme.text.into();
    let dim: Color = theme.dim_text.into();
    let success: Color = theme.success.into();

    let completed = view.todos.iter().filter(|t| t.done).count();
    let border = if view.focused { theme.accent } else { theme.border };
    let block = Block::default()
        .title(format!(" Todos ({}/{}) ", completed, view.todos.len()))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border.into()))
        .style(Style::default().bg(theme.surface.into()));

    if view.todos.is_empty() {
        let empty = Paragraph::new(" Nothing to do. Ask the assistant or use /add.")
            .style(Style::default().fg(dim).italic())
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let max_content_width = area.width.saturating_sub(8) as usize; // borders + marker + checkbox

    let items: Vec<ListItem> = view
        .todos
        .iter()
        .map(|todo| {
            let (icon_color, content_style) = if todo.done {
                (success, Style::default().fg(dim).crossed_out())
            } else if view.highlight == Some(todo.id.as_str()) {
                (accent, Style::default().fg(accent))
            } else {
                (dim, Style::default().fg(text_color))
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", checkbox(todo.done)), Style::default().fg(icon_color)),
                Span::styled(truncate(&todo.content, max_content_width), content_style),
            ]))
        })
        .collect();

    let highlight_style = if view.focused {
        Style::default().bg(theme.border.into()).bold()
    } else {
        Style::default()
    };
    let list = List::new(items)
        .block(block)
        .highlight_style(highlight_style)
        .highlight_symbol(if view.focused { "\u{25b8} " } else { "  " });

    let mut state = ListState::default().with_selected(Some(view.selected));
    frame.render_stateful_widget(list, area, &mut state);
}

fn checkbox(done: bool) -> &'static str {
    if done {
        "[\u{2713}]"
    } else {
        "[ ]"
    }
}

/// Shorten to `max` characters, ending with an ellipsis when cut.
fn truncate(content: &str, max: usize) -> String {
    if content.chars().count() <= max {
        return content.to_string();
    }
    let kept: String = content.chars().take(max.saturating_sub(1)).collect();
    format!("{}\u{2026}", kept)
}
