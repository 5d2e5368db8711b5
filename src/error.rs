//! Error types for the job tracker.

use crate::pipeline::schema::Violation;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Classification error: {0}")]
    Classify(#[from] ClassifyError),
}

/// Configuration-related errors. Always fatal for the current invocation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} returned an error: {message}")]
    ProviderError { provider: String, message: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} returned no text")]
    EmptyResponse { provider: String },
}

/// Email retrieval errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("Mail request failed: {0}")]
    RequestFailed(String),

    #[error("Mail service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid mail response: {0}")]
    InvalidResponse(String),
}

/// Failures turning an email into a validated decision.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Classifier call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("No JSON object in classifier output: {0}")]
    Extraction(String),

    #[error("Decision failed validation ({} violation(s))", .0.len())]
    Invalid(Vec<Violation>),
}

/// Result type alias for the tracker.
pub type Result<T> = std::result::Result<T, Error>;
