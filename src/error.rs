use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Validation error: {0}")]
    #[diagnostic(code(calendar_assistant::validation))]
    Validation(String),

    #[error("Authentication error: {0}")]
    #[diagnostic(code(calendar_assistant::auth))]
    Auth(String),

    #[error("Calendar provider error: {0}")]
    #[diagnostic(code(calendar_assistant::provider))]
    Provider(String),

    #[error("Language model error: {0}")]
    #[diagnostic(code(calendar_assistant::model))]
    Model(String),

    #[error("Not found: {0}")]
    #[diagnostic(code(calendar_assistant::not_found))]
    NotFound(String),

    #[error("Store error: {0}")]
    #[diagnostic(code(calendar_assistant::store))]
    Store(String),

    #[error("Environment error: {0}")]
    #[diagnostic(code(calendar_assistant::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(calendar_assistant::config))]
    Config(String),

    #[error(transparent)]
    #[diagnostic(code(calendar_assistant::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(calendar_assistant::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(calendar_assistant::other))]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type AppResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create validation errors
pub fn validation_error(message: &str) -> Error {
    Error::Validation(message.to_string())
}

/// Helper to create authentication errors
pub fn auth_error(message: &str) -> Error {
    Error::Auth(message.to_string())
}

/// Helper to create calendar provider errors
pub fn provider_error(message: &str) -> Error {
    Error::Provider(message.to_string())
}

/// Helper to create language model errors
pub fn model_error(message: &str) -> Error {
    Error::Model(message.to_string())
}

/// Helper to create not-found errors
pub fn not_found_error(message: &str) -> Error {
    Error::NotFound(message.to_string())
}

/// Helper to create store errors
pub fn store_error(message: &str) -> Error {
    Error::Store(message.to_string())
}

/// Helper to create other errors
pub fn other_error(message: &str) -> Error {
    Error::Other(message.to_string())
}

impl Error {
    /// The bare message without the category prefix, used where the error
    /// text is shown to an end user or a model.
    pub fn detail(&self) -> String {
        match self {
            Error::Validation(m)
            | Error::Auth(m)
            | Error::Provider(m)
            | Error::Model(m)
            | Error::NotFound(m)
            | Error::Store(m)
            | Error::Environment(m)
            | Error::Config(m)
            | Error::Serialization(m)
            | Error::Other(m) => m.clone(),
            Error::Io(e) => e.to_string(),
        }
    }
}
