use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::themes::DEFAULT_THEME;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Model calls allowed per user turn, counting tool round trips.
pub const DEFAULT_MAX_STEPS: u32 = 3;

/// Checked in order when no key is configured.
pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "OPENAI_API_KEY"];

pub const KNOWN_MODELS: &[(&str, &str)] = &[
    ("gemini-1.5-flash", "Fast, default"),
    ("gemini-1.5-pro", "Larger context, slower"),
    ("gemini-2.0-flash", "Newer fast model"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_theme() -> String {
    DEFAULT_THEME.to_string()
}

fn default_max_steps() -> u32 {
    DEFAULT_MAX_STEPS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            theme: DEFAULT_THEME.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl AppConfig {
    /// Key to authenticate with: the explicit override, then the file, then the
    /// environment. Kept out of the config so it is never written back.
    pub fn resolve_api_key(&self, explicit: Option<&str>) -> String {
        self.resolve_api_key_from(explicit, |name| std::env::var(name).ok())
    }

    fn resolve_api_key_from<F: Fn(&str) -> Option<String>>(
        &self,
        explicit: Option<&str>,
        lookup: F,
    ) -> String {
        if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
            return key.to_string();
        }
        if !self.api_key.trim().is_empty() {
            return self.api_key.trim().to_string();
        }
        API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
            .unwrap_or_default()
    }
}

/// Returns the path to ~/.todo-chat/
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".todo-chat")
}

/// Returns the path to ~/.todo-chat/config.json
pub fn config_file() -> PathBuf {
    config_dir().join("config.json")
}

pub fn load_config() -> AppConfig {
    load_config_from(&config_file())
}

/// Read the config at `path`, writing defaults if it does not exist yet.
/// An unreadable or malformed file falls back to defaults.
pub fn load_config_from(path: &Path) -> AppConfig {
    if !path.exists() {
        let config = AppConfig::default();
        if let Err(e) = save_config_to(&config, path) {
            tracing::warn!(path = %path.display(), error = %e, "could not write default config");
        }
        return config;
    }

    let mut config = match fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<AppConfig>(&raw) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                AppConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable config, using defaults");
            AppConfig::default()
        }
    };

    if config.max_steps == 0 {
        config.max_steps = DEFAULT_MAX_STEPS;
    }
    config
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)?;
    Ok(())
}
