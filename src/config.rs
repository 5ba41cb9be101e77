//! Configuration loading and validation.
//!
//! Loads configuration from `./config.toml` (or `$DOPPEL_CONFIG_PATH`, or
//! the path given on the command line). Environment variables override file
//! values; file values override defaults. A `.env` file is read by the binary
//! before loading, so secrets can live there.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::bound::{DEFAULT_TRUNCATION_MARKER, TELEGRAM_MAX_MESSAGE_CHARS};
use crate::persona::{
    PersonaSettings, DEFAULT_HISTORY_LIMIT, DEFAULT_PROMPT_CHAR_BUDGET, DEFAULT_USER_PROMPT,
};
use crate::prompt::{PromptTemplate, DEFAULT_SEPARATOR, DEFAULT_SYSTEM_TEMPLATE};
use crate::providers::openai::OPENAI_CHAT_COMPLETIONS_URL;

/// Env var naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "DOPPEL_CONFIG_PATH";

// ── Top-level config ────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Telegram bot settings.
    pub telegram: TelegramConfig,
    /// SQLite database settings.
    pub database: DatabaseConfig,
    /// Text-generation endpoint settings.
    pub llm: LlmConfig,
    /// Prompt assembly and reply bounding.
    pub persona: PersonaConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// An `explicit` path must exist. Otherwise `$DOPPEL_CONFIG_PATH` or
    /// `./config.toml` is used, and a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting configuration is invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// Load using a custom env resolver (for testing).
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`].
    pub fn load_with(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = env(CONFIG_PATH_ENV)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("config.toml"));
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    tracing::info!(path = %path.display(), "no config file found, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_overrides(env);
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file.
    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        tracing::info!(path = %path.display(), "loading config from file");
        Self::from_toml(&contents)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    /// Parse a TOML string into config (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var` in tests).
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("DOPPEL_TELEGRAM_TOKEN") {
            self.telegram.bot_token = Some(v);
        }

        if let Some(v) = env("DOPPEL_DATABASE_PATH") {
            self.database.path = Some(PathBuf::from(v));
        }

        if let Some(v) = env("DOPPEL_LLM_API_URL") {
            self.llm.api_url = v;
        }
        if let Some(v) = env("DOPPEL_LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = env("DOPPEL_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = env("DOPPEL_LLM_TIMEOUT_SECS") {
            match v.parse() {
                Ok(n) => self.llm.timeout_secs = n,
                Err(_) => tracing::warn!(
                    var = "DOPPEL_LLM_TIMEOUT_SECS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }

        if let Some(v) = env("DOPPEL_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(v));
        }
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.persona.settings()?;
        if self.persona.history_limit == 0 {
            anyhow::bail!("persona.history_limit must be greater than zero");
        }
        if self.persona.prompt_char_budget == 0 {
            anyhow::bail!("persona.prompt_char_budget must be greater than zero");
        }
        if self.persona.truncation_marker.chars().count() >= self.persona.max_message_chars {
            anyhow::bail!(
                "persona.truncation_marker must be shorter than persona.max_message_chars ({})",
                self.persona.max_message_chars
            );
        }
        if self.llm.model.trim().is_empty() {
            anyhow::bail!("llm.model must not be empty");
        }
        Ok(())
    }
}

// ── Telegram ────────────────────────────────────────────────────

/// Telegram bot settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token. Usually supplied through `DOPPEL_TELEGRAM_TOKEN`.
    pub bot_token: Option<String>,
}

// ── Database ────────────────────────────────────────────────────

/// SQLite database settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file. Defaults to `~/.doppel/doppel.db`.
    pub path: Option<PathBuf>,
    /// Connection pool size.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// The configured database path, or the default under [`data_dir`].
    ///
    /// # Errors
    ///
    /// Returns an error if no path is configured and the home directory
    /// cannot be determined.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("doppel.db")),
        }
    }
}

// ── LLM ─────────────────────────────────────────────────────────

/// Text-generation endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions URL.
    pub api_url: String,
    /// Bearer key; omitted from requests when unset.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: OPENAI_CHAT_COMPLETIONS_URL.to_owned(),
            api_key: None,
            model: "gpt-4o-mini".to_owned(),
            timeout_secs: 30,
        }
    }
}

impl LlmConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Persona ─────────────────────────────────────────────────────

/// Prompt assembly and reply bounding settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// Maximum history records fetched per request.
    pub history_limit: usize,
    /// Character budget for the history section.
    pub prompt_char_budget: usize,
    /// Separator appended after each record.
    pub separator: String,
    /// System prompt template; must contain `{history}` exactly once.
    pub system_template: String,
    /// User-turn instruction.
    pub user_prompt: String,
    /// Transport ceiling for replies, in characters.
    pub max_message_chars: usize,
    /// Marker appended to cut replies.
    pub truncation_marker: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            prompt_char_budget: DEFAULT_PROMPT_CHAR_BUDGET,
            separator: DEFAULT_SEPARATOR.to_owned(),
            system_template: DEFAULT_SYSTEM_TEMPLATE.to_owned(),
            user_prompt: DEFAULT_USER_PROMPT.to_owned(),
            max_message_chars: TELEGRAM_MAX_MESSAGE_CHARS,
            truncation_marker: DEFAULT_TRUNCATION_MARKER.to_owned(),
        }
    }
}

impl PersonaConfig {
    /// Convert into runtime [`PersonaSettings`].
    ///
    /// # Errors
    ///
    /// Returns an error if the system template is invalid.
    pub fn settings(&self) -> Result<PersonaSettings> {
        let template = PromptTemplate::new(&self.system_template)
            .context("invalid persona.system_template")?;
        Ok(PersonaSettings {
            history_limit: self.history_limit,
            prompt_char_budget: self.prompt_char_budget,
            separator: self.separator.clone(),
            template,
            user_prompt: self.user_prompt.clone(),
            max_message_chars: self.max_message_chars,
            truncation_marker: self.truncation_marker.clone(),
        })
    }
}

// ── Logging ─────────────────────────────────────────────────────

/// Log output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for JSON file logs. Console only when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            dir: None,
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────

/// Resolve the default data directory (`~/.doppel/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn data_dir() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".doppel"))
}
