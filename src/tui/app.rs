use anyhow::Result;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind,
};
use ratatui::prelude::*;
use serde_json::Value;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::config::settings::{config_file, save_config_to, AppConfig, API_KEY_ENV_VARS};
use crate::core::api::ChatClient;
use crate::core::chat::{ChatEngine, ChatEvent};
use crate::core::commands::{handle_command, CommandResult};
use crate::todo::{Todo, TodoChange, TodoStore};
use crate::tools;
use crate::tui::layout as tui_layout;

// ── Display message types ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DisplayMessage {
    pub role: MessageRole,
    pub content: String,
    pub is_streaming: bool,
    pub tool_call_id: Option<String>,
    pub tool_name: Option<String>,
    pub tool_status: Option<ToolStatus>,
}

impl DisplayMessage {
    fn text(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            is_streaming: false,
            tool_call_id: None,
            tool_name: None,
            tool_status: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
    System,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolStatus {
    Pending,
    Done,
    Error,
}

/// Which pane receives key presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Input,
    Todos,
}

// ── Application state ───────────────────────────────────────────────────

pub struct App {
    pub config: AppConfig,
    pub store: TodoStore,
    pub messages: Vec<DisplayMessage>,
    pub input_text: String,
    pub input_cursor: usize,
    pub scroll_offset: u16,
    pub focus: Focus,
    pub selected: usize,
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub is_streaming: bool,
    pub should_quit: bool,

    // Internal
    api_key: String,
    config_path: PathBuf,
    last_change: Rc<RefCell<Option<TodoChange>>>,
    todos_rx: watch::Receiver<Vec<Todo>>,
    engine: Option<ChatEngine>,
    chat_event_rx: Option<mpsc::UnboundedReceiver<ChatEvent>>,
    engine_return_rx: Option<oneshot::Receiver<ChatEngine>>,
    cancel_token: CancellationToken,
}

impl App {
    /// `api_key` is the resolved key; it is never written to the config file.
    pub fn new(config: AppConfig, api_key: String, mut store: TodoStore) -> Self {
        // Conversation task reads the latest list from here.
        let (todos_tx, todos_rx) = watch::channel(store.snapshot());
        store.subscribe(move |_, todos| {
            todos_tx.send_replace(todos.to_vec());
        });

        let last_change = Rc::new(RefCell::new(None));
        let recorder = last_change.clone();
        store.subscribe(move |change, _| {
            *recorder.borrow_mut() = Some(change.clone());
        });

        let mut app = Self {
            config,
            store,
            messages: Vec::new(),
            input_text: String::new(),
            input_cursor: 0,
            scroll_offset: 0,
            focus: Focus::Input,
            selected: 0,
            total_tokens: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            is_streaming: false,
            should_quit: false,
            api_key,
            config_path: config_file(),
            last_change,
            todos_rx,
            engine: None,
            chat_event_rx: None,
            engine_return_rx: None,
            cancel_token: CancellationToken::new(),
        };
        app.init_engine();
        app
    }

    fn init_engine(&mut self) {
        if self.api_key.is_empty() {
            tracing::warn!("no API key configured; chat is disabled");
            return;
        }
        let client = ChatClient::new(&self.api_key, &self.config.base_url);
        self.engine = Some(ChatEngine::new(
            client,
            &self.config.model,
            self.config.max_steps,
            self.todos_rx.clone(),
        ));
        tracing::info!(model = %self.config.model, base_url = %self.config.base_url, "chat engine ready");
    }

    pub fn theme_name(&self) -> &str {
        &self.config.theme
    }

    /// Id of the most recently changed todo, if it still exists.
    pub fn highlighted_id(&self) -> Option<String> {
        self.last_change
            .borrow()
            .as_ref()
            .map(|c| c.id().to_string())
            .filter(|id| self.store.get(id).is_some())
    }

    /// Handle a terminal event (key, mouse, resize).
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            _ => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        // Only handle key press events, ignore Release/Repeat
        if key.kind != KeyEventKind::Press {
            return;
        }

        // Global: Ctrl+C cancels a turn, otherwise quits
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            if self.is_streaming {
                self.cancel_streaming();
            } else {
                self.should_quit = true;
            }
            return;
        }

        if key.code == KeyCode::Esc {
            if self.is_streaming {
                self.cancel_streaming();
            } else {
                self.focus = Focus::Input;
            }
            return;
        }

        if key.code == KeyCode::Tab || key.code == KeyCode::BackTab {
            self.focus = match self.focus {
                Focus::Input => Focus::Todos,
                Focus::Todos => Focus::Input,
            };
            self.clamp_selection();
            return;
        }

        match self.focus {
            Focus::Todos => self.handle_todos_key(key),
            Focus::Input => self.handle_input_key(key),
        }
    }

    fn handle_todos_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.store.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_selected(),
            KeyCode::Char('d') | KeyCode::Delete => self.remove_selected(),
            _ => {}
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        // Scrolling
        match key.code {
            KeyCode::Up if self.input_text.is_empty() => {
                self.scroll_up(5);
                return;
            }
            KeyCode::Down if self.input_text.is_empty() => {
                self.scroll_down(5);
                return;
            }
            _ => {}
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('u') => self.scroll_up(20),
                KeyCode::Char('d') => self.scroll_down(20),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Enter => {
                if !self.is_streaming {
                    self.submit_input();
                }
            }
            KeyCode::Char(c) => {
                self.input_text.insert(self.input_cursor, c);
                self.input_cursor += c.len_utf8();
            }
            KeyCode::Backspace => {
                if self.input_cursor > 0 {
                    let prev = self.input_text[..self.input_cursor]
                        .char_indices()
                        .next_back()
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                    self.input_text.remove(prev);
                    self.input_cursor = prev;
                }
            }
            KeyCode::Delete => {
                if self.input_cursor < self.input_text.len() {
                    self.input_text.remove(self.input_cursor);
                }
            }
            KeyCode::Left => {
                self.input_cursor = self.input_text[..self.input_cursor]
                    .char_indices()
                    .next_back()
                    .map(|(i, _)| i)
                    .unwrap_or(0);
            }
            KeyCode::Right => {
                if self.input_cursor < self.input_text.len() {
                    self.input_cursor = self.input_text[self.input_cursor..]
                        .char_indices()
                        .nth(1)
                        .map(|(i, _)| self.input_cursor + i)
                        .unwrap_or(self.input_text.len());
                }
            }
            KeyCode::Home => self.input_cursor = 0,
            KeyCode::End => self.input_cursor = self.input_text.len(),
            _ => {}
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.scroll_up(5),
            MouseEventKind::ScrollDown => self.scroll_down(5),
            _ => {}
        }
    }

    fn scroll_up(&mut self, lines: u16) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
    }

    fn scroll_down(&mut self, lines: u16) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    // ── Todo list actions ───────────────────────────────────────────────

    fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.store.len().saturating_sub(1));
    }

    fn selected_id(&self) -> Option<String> {
        self.store.todos().get(self.selected).map(|t| t.id.clone())
    }

    pub fn toggle_selected(&mut self) {
        if let Some(id) = self.selected_id() {
            self.store.toggle(&id);
        }
    }

    pub fn remove_selected(&mut self) {
        if let Some(id) = self.selected_id() {
            self.store.remove(&id);
            self.clamp_selection();
        }
    }

    // ── Conversation ────────────────────────────────────────────────────

    fn cancel_streaming(&mut self) {
        tracing::info!("turn cancelled by user");
        self.cancel_token.cancel();
        self.is_streaming = false;
        self.cancel_token = CancellationToken::new();
        self.finish_streaming_messages();
    }

    fn submit_input(&mut self) {
        let text = self.input_text.trim().to_string();
        if text.is_empty() {
            return;
        }
        self.input_text.clear();
        self.input_cursor = 0;

        if text.starts_with('/') {
            let result = handle_command(&text);
            self.apply_command_result(result);
            return;
        }

        if self.engine.is_none() && self.engine_return_rx.is_some() {
            // Cancelled turn still unwinding; keep the text for a retry.
            self.input_text = text;
            self.input_cursor = self.input_text.len();
            return;
        }

        self.messages
            .push(DisplayMessage::text(MessageRole::User, text.clone()));
        self.scroll_offset = 0;

        if self.engine.is_none() {
            self.messages.push(DisplayMessage::text(
                MessageRole::System,
                missing_key_message(),
            ));
            return;
        }

        self.start_streaming(text);
    }

    fn start_streaming(&mut self, user_input: String) {
        let Some(mut engine) = self.engine.take() else {
            return;
        };

        self.is_streaming = true;
        self.cancel_token = CancellationToken::new();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.chat_event_rx = Some(event_rx);

        // Spawn the conversation task and return the engine via oneshot
        let (engine_tx, engine_rx) = oneshot::channel();
        self.engine_return_rx = Some(engine_rx);

        engine.set_cancel_token(self.cancel_token.clone());
        tokio::spawn(async move {
            if let Err(e) = engine.send_message(&user_input, event_tx).await {
                tracing::error!(error = %e, "conversation task failed");
            }
            let _ = engine_tx.send(engine);
        });
    }

    /// Drain the command queue and other events from the conversation task.
    /// Tool calls are applied to the store here, on the thread that owns it.
    pub fn poll_chat_events(&mut self) {
        if self.chat_event_rx.is_some() {
            let mut events = Vec::new();
            let mut disconnected = false;

            if let Some(rx) = &mut self.chat_event_rx {
                loop {
                    match rx.try_recv() {
                        Ok(event) => events.push(event),
                        Err(mpsc::error::TryRecvError::Empty) => break,
                        Err(mpsc::error::TryRecvError::Disconnected) => {
                            disconnected = true;
                            break;
                        }
                    }
                }
            }

            for event in events {
                self.process_chat_event(event);
            }

            if disconnected {
                self.is_streaming = false;
                self.chat_event_rx = None;
                self.finish_streaming_messages();
            }
        }

        // Recover the engine once the task hands it back.
        if self.engine.is_none() {
            if let Some(mut rx) = self.engine_return_rx.take() {
                match rx.try_recv() {
                    Ok(engine) => self.engine = Some(engine),
                    Err(oneshot::error::TryRecvError::Empty) => {
                        self.engine_return_rx = Some(rx);
                    }
                    Err(oneshot::error::TryRecvError::Closed) => {
                        tracing::error!("conversation task dropped the engine");
                    }
                }
            }
        }
    }

    fn streaming_assistant(&mut self) -> Option<&mut DisplayMessage> {
        self.messages
            .iter_mut()
            .rev()
            .find(|m| m.role == MessageRole::Assistant && m.is_streaming)
    }

    fn finish_streaming_messages(&mut self) {
        for msg in &mut self.messages {
            msg.is_streaming = false;
            if msg.tool_status == Some(ToolStatus::Pending) {
                msg.tool_status = Some(ToolStatus::Error);
            }
        }
    }

    pub(crate) fn process_chat_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::StreamStart => {
                if self.streaming_assistant().is_none() {
                    let mut msg = DisplayMessage::text(MessageRole::Assistant, "");
                    msg.is_streaming = true;
                    self.messages.push(msg);
                }
            }
            ChatEvent::ContentChunk(text) => {
                if let Some(msg) = self.streaming_assistant() {
                    msg.content.push_str(&text);
                }
                // Auto-scroll only if the user is already at the bottom
                if self.scroll_offset <= 1 {
                    self.scroll_offset = 0;
                }
            }
            ChatEvent::StreamEnd(final_msg) => {
                if let Some(msg) = self.streaming_assistant() {
                    msg.content = final_msg.content;
                    msg.is_streaming = false;
                }
            }
            ChatEvent::ToolCall {
                call_id,
                name,
                arguments,
                reply,
            } => {
                let mut msg = DisplayMessage::text(MessageRole::Tool, "");
                msg.tool_call_id = Some(call_id.clone());
                msg.tool_name = Some(name.clone());

                // The engine already answered "Cancelled by user"; the store must not move.
                if reply.is_closed() {
                    tracing::debug!(%call_id, "skipping tool call from a cancelled turn");
                    msg.content = "Cancelled by user".to_string();
                    msg.tool_status = Some(ToolStatus::Error);
                    self.messages.push(msg);
                    return;
                }

                msg.tool_status = Some(ToolStatus::Pending);
                self.messages.push(msg);

                let result = self.apply_tool_call(&name, &arguments);
                if !reply.send(result) {
                    tracing::debug!(%call_id, "tool result arrived after the turn ended");
                }
            }
            ChatEvent::ToolExecutionDone {
                call_id, result, ..
            } => {
                if let Some(msg) = self
                    .messages
                    .iter_mut()
                    .rev()
                    .find(|m| m.tool_call_id.as_deref() == Some(call_id.as_str()))
                {
                    msg.tool_status = Some(if result.starts_with("Error:") {
                        ToolStatus::Error
                    } else {
                        ToolStatus::Done
                    });
                    msg.content = result;
                }
            }
            ChatEvent::StepLimitReached(steps) => {
                self.messages.push(DisplayMessage::text(
                    MessageRole::System,
                    format!("Stopped after {} model calls for this message.", steps),
                ));
            }
            ChatEvent::Error(text) => {
                self.finish_streaming_messages();
                self.messages
                    .push(DisplayMessage::text(MessageRole::Error, text));
            }
            ChatEvent::TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens,
            } => {
                self.prompt_tokens += prompt_tokens;
                self.completion_tokens += completion_tokens;
                self.total_tokens += total_tokens;
            }
        }
    }

    /// Run a model-issued tool call against the store and return the tool message text.
    pub fn apply_tool_call(&mut self, name: &str, arguments: &Value) -> String {
        let result = match tools::dispatch(&mut self.store, name, arguments) {
            Some(output) => output.to_message(),
            None => {
                tracing::warn!(tool = name, "model called an unknown tool");
                format!("Error: Unknown tool \"{}\"", name)
            }
        };
        self.clamp_selection();
        result
    }

    fn apply_command_result(&mut self, result: CommandResult) {
        match result {
            CommandResult::Message(msg) => {
                self.messages
                    .push(DisplayMessage::text(MessageRole::System, msg));
            }
            CommandResult::Add(content) => {
                self.store.add(content);
                self.selected = self.store.len().saturating_sub(1);
            }
            CommandResult::Clear => {
                if self.is_streaming {
                    self.messages.push(DisplayMessage::text(
                        MessageRole::System,
                        "Wait for the current response to finish (or press Esc) before clearing.",
                    ));
                    return;
                }
                self.messages.clear();
                self.scroll_offset = 0;
                self.total_tokens = 0;
                self.prompt_tokens = 0;
                self.completion_tokens = 0;
                if let Some(engine) = &mut self.engine {
                    engine.clear();
                }
            }
            CommandResult::Exit => {
                self.should_quit = true;
            }
            CommandResult::SetModel(model) => {
                self.config.model = model.clone();
                if let Some(engine) = &mut self.engine {
                    engine.set_model(&model);
                }
                self.persist_config();
                self.messages.push(DisplayMessage::text(
                    MessageRole::System,
                    format!("Model changed to {}", model),
                ));
            }
            CommandResult::SetTheme(theme) => {
                self.config.theme = theme.clone();
                self.persist_config();
                self.messages.push(DisplayMessage::text(
                    MessageRole::System,
                    format!("Theme changed to {}", theme),
                ));
            }
            CommandResult::None => {}
        }
    }

    fn persist_config(&self) {
        if let Err(e) = save_config_to(&self.config, &self.config_path) {
            tracing::warn!(error = %e, "could not save config");
        }
    }
}

fn missing_key_message() -> String {
    format!(
        "No API key configured. Set \"apiKey\" in {}, pass --api-key, or export {}.",
        config_file().display(),
        API_KEY_ENV_VARS.join(" or ")
    )
}

/// The main run loop.
pub async fn run(config: AppConfig, api_key: String, store: TodoStore) -> Result<()> {
    crossterm::terminal::enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture,
    )?;

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config, api_key, store);
    let result = event_loop(&mut terminal, &mut app).await;

    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::event::DisableMouseCapture,
    )?;
    terminal.show_cursor()?;

    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|frame| {
            tui_layout::draw(frame, app);
        })?;

        if app.should_quit {
            break;
        }

        app.poll_chat_events();

        if crossterm::event::poll(Duration::from_millis(16))? {
            let event = event::read()?;
            app.handle_event(event);
        }
    }
    Ok(())
}
