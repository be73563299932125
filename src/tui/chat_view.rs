use ratatui::prelude::*;
use ratatui::text::{Line as TuiLine, Span};
use ratatui::widgets::*;

use crate::config::themes::Theme;
use crate::tui::app::{App, DisplayMessage, Focus, MessageRole, ToolStatus};

/// Render the transcript with bottom-anchored scrolling.
pub fn render(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let border = if app.focus == Focus::Input {
        theme.accent
    } else {
        theme.border
    };
    let block = Block::default()
        .title(" Chat ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border.into()))
        .style(Style::default().bg(theme.bg.into()));

    let inner = block.inner(area);
    let visible_height = inner.height as usize;

    let all_lines = render_all_messages(&app.messages, theme, inner.width);

    let total = all_lines.len();
    let max_scroll = total.saturating_sub(visible_height);
    let clamped_offset = (app.scroll_offset as usize).min(max_scroll);

    let end = total.saturating_sub(clamped_offset);
    let start = end.saturating_sub(visible_height);

    let paragraph = Paragraph::new(all_lines[start..end].to_vec())
        .block(block)
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, area);
}

/// Resolved tool results stay out of the transcript, as do empty assistant
/// turns that only carried tool calls.
pub fn is_visible(msg: &DisplayMessage) -> bool {
    match msg.role {
        MessageRole::Tool => msg.tool_status == Some(ToolStatus::Pending),
        MessageRole::Assistant => msg.is_streaming || !msg.content.trim().is_empty(),
        _ => true,
    }
}

fn render_all_messages<'a>(
    messages: &[DisplayMessage],
    theme: &Theme,
    width: u16,
) -> Vec<TuiLine<'a>> {
    let mut lines: Vec<TuiLine<'a>> = Vec::new();

    for msg in messages.iter().filter(|m| is_visible(m)) {
        lines.extend(render_message(msg, theme, width));
        lines.push(TuiLine::from(""));
    }

    if lines.is_empty() {
        lines.extend(render_welcome(theme));
    }

    lines
}

fn render_welcome<'a>(theme: &Theme) -> Vec<TuiLine<'a>> {
    let accent: Color = theme.accent.into();
    let dim: Color = theme.dim_text.into();

    let hint = |text: &'static str| TuiLine::from(Span::styled(text, Style::default().fg(dim)));

    vec![
        TuiLine::from(""),
        TuiLine::from(Span::styled(
            "  Tell me what you need to get done.",
            Style::default().fg(accent).bold(),
        )),
        TuiLine::from(""),
        hint("  Try \"remind me to walk the dog\" or \"I bought the milk\"."),
        TuiLine::from(""),
        hint("    Tab       switch to the todo list"),
        hint("    Space     toggle the selected todo"),
        hint("    d         remove the selected todo"),
        hint("    /add      add a todo without asking the model"),
        hint("    Esc       cancel a response"),
        hint("    Ctrl+C    quit"),
    ]
}

fn render_message<'a>(msg: &DisplayMessage, theme: &Theme, width: u16) -> Vec<TuiLine<'a>> {
    match msg.role {
        MessageRole::User => labelled(msg, "  > You", theme.accent.into(), theme.text.into(), width),
        MessageRole::Assistant => render_assistant_message(msg, theme, width),
        MessageRole::Tool => vec![render_pending_tool(msg, theme)],
        MessageRole::System => {
            labelled(msg, "  i System", theme.accent.into(), theme.dim_text.into(), width)
        }
        MessageRole::Error => render_error(msg, theme, width),
    }
}

fn labelled<'a>(
    msg: &DisplayMessage,
    label: &'static str,
    label_color: Color,
    text_color: Color,
    width: u16,
) -> Vec<TuiLine<'a>> {
    let mut lines = vec![TuiLine::from(Span::styled(
        label,
        Style::default().fg(label_color).bold(),
    ))];
    lines.extend(indented(&msg.content, text_color, width));
    lines
}

fn render_assistant_message<'a>(
    msg: &DisplayMessage,
    theme: &Theme,
    width: u16,
) -> Vec<TuiLine<'a>> {
    let color: Color = theme.assistant.into();
    let dim: Color = theme.dim_text.into();

    let suffix = if msg.is_streaming { " \u{2026}" } else { "" };
    let mut lines = vec![TuiLine::from(Span::styled(
        format!("  \u{25c6} Assistant{}", suffix),
        Style::default().fg(color).bold(),
    ))];

    if msg.is_streaming && msg.content.is_empty() {
        lines.push(TuiLine::from(vec![
            Span::raw("    "),
            Span::styled("thinking\u{2026}", Style::default().fg(dim).italic()),
        ]));
        return lines;
    }

    lines.extend(indented(&msg.content, theme.text.into(), width));
    lines
}

fn render_pending_tool<'a>(msg: &DisplayMessage, theme: &Theme) -> TuiLine<'a> {
    let name = msg.tool_name.clone().unwrap_or_default();
    TuiLine::from(vec![
        Span::styled("  \u{2699} ", Style::default().fg(Color::from(theme.warning))),
        Span::styled(
            format!("calling {}\u{2026}", name),
            Style::default().fg(Color::from(theme.dim_text)).italic(),
        ),
    ])
}

fn render_error<'a>(msg: &DisplayMessage, theme: &Theme, width: u16) -> Vec<TuiLine<'a>> {
    let error: Color = theme.error.into();
    let content_width = width.saturating_sub(4) as usize;
    wrap_text_simple(&format!("Error: {}", msg.content), content_width)
        .into_iter()
        .map(|w| {
            TuiLine::from(vec![
                Span::raw("  "),
                Span::styled(w, Style::default().fg(error)),
            ])
        })
        .collect()
}

fn indented<'a>(content: &str, color: Color, width: u16) -> Vec<TuiLine<'a>> {
    let content_width = width.saturating_sub(4) as usize;
    content
        .lines()
        .flat_map(|line| wrap_text_simple(line, content_width))
        .map(|w| {
            TuiLine::from(vec![
                Span::raw("    "),
                Span::styled(w, Style::default().fg(color)),
            ])
        })
        .collect()
}

/// Simple word-wrapping (no markdown parsing).
pub fn wrap_text_simple(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.chars().count() + 1 + word.chars().count() > max_width {
            lines.push(current_line);
            current_line = word.to_string();
        } else {
            current_line.push(' ');
            current_line.push_str(word);
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::themes::get_theme;

    fn msg(role: MessageRole, content: &str) -> DisplayMessage {
        DisplayMessage {
            role,
            content: content.to_string(),
            is_streaming: false,
            tool_call_id: None,
            tool_name: None,
            tool_status: None,
        }
    }

    fn tool(status: ToolStatus) -> DisplayMessage {
        DisplayMessage {
            tool_call_id: Some("c1".into()),
            tool_name: Some("todo".into()),
            tool_status: Some(status),
            ..msg(MessageRole::Tool, "")
        }
    }

    fn text_of(lines: &[TuiLine]) -> String {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn resolved_tool_results_are_hidden() {
        assert!(is_visible(&tool(ToolStatus::Pending)));
        assert!(!is_visible(&tool(ToolStatus::Done)));
        assert!(!is_visible(&tool(ToolStatus::Error)));
    }

    #[test]
    fn empty_assistant_turn_is_hidden_once_finished() {
        let mut m = msg(MessageRole::Assistant, "");
        assert!(!is_visible(&m));
        m.is_streaming = true;
        assert!(is_visible(&m));
        assert!(is_visible(&msg(MessageRole::Assistant, "Done!")));
        assert!(is_visible(&msg(MessageRole::User, "")));
    }

    #[test]
    fn pending_tool_shows_calling_line() {
        let theme = get_theme("tokyo-night");
        let lines = render_all_messages(&[tool(ToolStatus::Pending)], theme, 80);
        assert!(text_of(&lines).contains("calling todo"));

        let lines = render_all_messages(
            &[msg(MessageRole::User, "hi"), tool(ToolStatus::Done)],
            theme,
            80,
        );
        let text = text_of(&lines);
        assert!(text.contains("hi"));
        assert!(!text.contains("calling todo"));
    }

    #[test]
    fn errors_are_prefixed() {
        let theme = get_theme("tokyo-night");
        let lines = render_all_messages(&[msg(MessageRole::Error, "HTTP 500")], theme, 80);
        assert!(text_of(&lines).contains("Error: HTTP 500"));
    }

    #[test]
    fn empty_transcript_shows_welcome() {
        let theme = get_theme("tokyo-night");
        let lines = render_all_messages(&[tool(ToolStatus::Done)], theme, 80);
        assert!(text_of(&lines).contains("Tell me what you need"));
    }

    #[test]
    fn wrap_breaks_on_words() {
        assert_eq!(
            wrap_text_simple("walk the dog today", 8),
            vec!["walk the", "dog", "today"]
        );
        assert_eq!(wrap_text_simple("", 10), vec![""]);
    }
}
