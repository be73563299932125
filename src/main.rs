mod config;
mod core;
mod todo;
mod tools;
mod tui;

use clap::Parser;
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::todo::TodoStore;

#[derive(Parser, Debug)]
#[command(name = "todo-chat", version, about = "Manage a todo list by chatting with an LLM")]
struct Args {
    /// Override the model to use
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Override the OpenAI-compatible endpoint base URL
    #[arg(long)]
    base_url: Option<String>,

    /// API key (otherwise config file, then GEMINI_API_KEY / OPENAI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Override the theme
    #[arg(long)]
    theme: Option<String>,

    /// Model calls allowed per message
    #[arg(long)]
    max_steps: Option<u32>,

    /// Start with an empty list instead of the sample todos
    #[arg(long)]
    empty: bool,

    /// Log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Logs go to a file since the terminal belongs to the UI.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("TODO_CHAT_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    let dir = config::settings::config_dir();
    if fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("todo-chat.log"))
    else {
        return;
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = config::settings::load_config();

    // Apply CLI overrides
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(theme) = args.theme {
        config.theme = theme;
    }
    if let Some(max_steps) = args.max_steps {
        config.max_steps = max_steps.max(1);
    }
    let api_key = config.resolve_api_key(args.api_key.as_deref());

    let store = if args.empty {
        TodoStore::new()
    } else {
        TodoStore::with_samples()
    };

    tracing::info!(
        model = %config.model,
        max_steps = config.max_steps,
        todos = store.len(),
        "starting"
    );

    tui::app::run(config, api_key, store).await
}
