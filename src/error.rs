//! Error types for the onboarding service.

use uuid::Uuid;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Onboarding error: {0}")]
    Onboarding(#[from] OnboardingError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
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

/// Errors raised by the onboarding rules: registration, step advance and
/// the admin assignment editor.
///
/// All of them are recoverable. The operation that raised one has left the
/// session and the assignment store exactly as they were.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("{0}")]
    Validation(String),

    #[error("Step {step} is incomplete: missing {}", missing.join(", "))]
    IncompleteStep { step: u8, missing: Vec<String> },

    #[error("Page {0} is not configurable; components can only be placed on page 2 or 3")]
    InvalidPage(i64),

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Unknown component type: {0}")]
    UnknownComponent(String),

    #[error("Component {0} is active more than once")]
    DuplicateComponent(String),

    #[error("Session is on step {current}, cannot advance step {requested}")]
    StepMismatch { current: u8, requested: u8 },

    #[error("Cannot {action} while on step {step}")]
    InvalidTransition { action: String, step: u8 },

    #[error("Session {0} not found")]
    SessionNotFound(Uuid),

    #[error("Session {0} is busy with another request")]
    SessionBusy(Uuid),

    #[error("Failed to save: {0}")]
    Persistence(#[from] DatabaseError),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
