use thiserror::Error;

/// Errors raised while loading or validating bridge configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid state configuration: {0}")]
    InvalidState(String),

    #[error("unknown translator: {0}")]
    UnknownTranslator(String),

    #[error("invalid options for translator '{id}': {message}")]
    InvalidTranslatorOptions { id: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}
