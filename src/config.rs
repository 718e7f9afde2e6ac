use crate::error::{config_error, env_error, AppResult};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Default chat model
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4-0125-preview";
/// Default OpenAI-compatible API base
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Default Google Calendar API base
pub const DEFAULT_GOOGLE_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
/// Default Redis URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
/// Maximum number of provider calls in flight per batch round
pub const DEFAULT_BATCH_CHUNK_SIZE: usize = 10;
/// Number of most recent messages sent to the model
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
/// Optional override file
pub const CONFIG_FILE: &str = "config/assistant.toml";

/// Main configuration structure for the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API key for the language model provider
    pub openai_api_key: String,
    /// Chat model name
    pub openai_model: String,
    /// Base URL of the chat-completions API
    pub openai_base_url: String,
    /// Google Calendar ID events are written to
    pub google_calendar_id: String,
    /// Base URL of the Google Calendar API
    pub google_api_base_url: String,
    /// Redis connection URL for chat history
    pub redis_url: String,
    /// IANA timezone used for new events and the model's date context
    pub timezone: String,
    /// Secret used to verify session tokens
    pub jwt_secret: String,
    /// HTTP port
    pub port: u16,
    /// Batch chunk size
    pub batch_chunk_size: usize,
    /// Rolling history window
    pub history_limit: usize,
}

/// Values that may be overridden from `config/assistant.toml`
#[derive(Debug, Default, Deserialize)]
struct FileOverrides {
    openai_model: Option<String>,
    openai_base_url: Option<String>,
    google_calendar_id: Option<String>,
    google_api_base_url: Option<String>,
    redis_url: Option<String>,
    timezone: Option<String>,
    port: Option<u16>,
    batch_chunk_size: Option<usize>,
    history_limit: Option<usize>,
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let openai_api_key =
            env::var("OPENAI_API_KEY").map_err(|_| env_error("OPENAI_API_KEY"))?;
        let jwt_secret = env::var("JWT_SECRET").map_err(|_| env_error("JWT_SECRET"))?;

        let port = match env::var("PORT") {
            Ok(p) => p
                .parse::<u16>()
                .map_err(|_| config_error("Invalid PORT format"))?,
            Err(_) => 3000,
        };
        let batch_chunk_size = match env::var("BATCH_CHUNK_SIZE") {
            Ok(v) => v
                .parse::<usize>()
                .map_err(|_| config_error("Invalid BATCH_CHUNK_SIZE format"))?,
            Err(_) => DEFAULT_BATCH_CHUNK_SIZE,
        };
        let history_limit = match env::var("HISTORY_LIMIT") {
            Ok(v) => v
                .parse::<usize>()
                .map_err(|_| config_error("Invalid HISTORY_LIMIT format"))?,
            Err(_) => DEFAULT_HISTORY_LIMIT,
        };

        let mut config = Config {
            openai_api_key,
            openai_model: env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string()),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string()),
            google_calendar_id: env::var("GOOGLE_CALENDAR_ID")
                .unwrap_or_else(|_| "primary".to_string()),
            google_api_base_url: env::var("GOOGLE_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_GOOGLE_API_BASE_URL.to_string()),
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            timezone: env::var("TIMEZONE").unwrap_or_else(|_| String::from("UTC")),
            jwt_secret,
            port,
            batch_chunk_size,
            history_limit,
        };

        if Path::new(CONFIG_FILE).exists() {
            let content = fs::read_to_string(CONFIG_FILE)?;
            config.apply_overrides(&content)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Merge TOML overrides on top of the current values
    pub fn apply_overrides(&mut self, toml_str: &str) -> AppResult<()> {
        let overrides: FileOverrides = toml::from_str(toml_str)?;

        if let Some(v) = overrides.openai_model {
            self.openai_model = v;
        }
        if let Some(v) = overrides.openai_base_url {
            self.openai_base_url = v;
        }
        if let Some(v) = overrides.google_calendar_id {
            self.google_calendar_id = v;
        }
        if let Some(v) = overrides.google_api_base_url {
            self.google_api_base_url = v;
        }
        if let Some(v) = overrides.redis_url {
            self.redis_url = v;
        }
        if let Some(v) = overrides.timezone {
            self.timezone = v;
        }
        if let Some(v) = overrides.port {
            self.port = v;
        }
        if let Some(v) = overrides.batch_chunk_size {
            self.batch_chunk_size = v;
        }
        if let Some(v) = overrides.history_limit {
            self.history_limit = v;
        }

        Ok(())
    }

    /// Check values that cannot be expressed in the types
    pub fn validate(&self) -> AppResult<()> {
        self.tz()?;
        if self.batch_chunk_size == 0 {
            return Err(config_error("BATCH_CHUNK_SIZE must be at least 1"));
        }
        Ok(())
    }

    /// Parsed timezone
    pub fn tz(&self) -> AppResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| config_error(&format!("Unknown timezone: {}", self.timezone)))
    }
}
