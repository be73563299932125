use ratatui::prelude::*;

use crate::config::themes::get_theme;
use crate::tui::app::{App, Focus};
use crate::tui::chat_view;
use crate::tui::input;
use crate::tui::status_bar;
use crate::tui::todo_list::{self, TodoListView};

/// Main draw function that renders the entire layout.
pub fn draw(frame: &mut Frame, app: &App) {
    let theme = get_theme(app.theme_name());

    // Layout: Body(flex) | Input(3) | StatusBar(1)
    let [body_area, input_area, status_area] = Layout::vertical([
        Constraint::Min(5),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    // Body: Chat | Todos
    let [chat_area, todos_area] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
            .areas(body_area);

    chat_view::render(frame, chat_area, app, theme);

    let highlight = app.highlighted_id();
    let view = TodoListView {
        todos: app.store.todos(),
        selected: app.selected,
        focused: app.focus == Focus::Todos,
        highlight: highlight.as_deref(),
    };
    todo_list::render(frame, todos_area, &view, theme);

    input::render(frame, input_area, app, theme);
    status_bar::render(frame, status_area, app, theme);
}
