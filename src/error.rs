//! Error types for the SMS responder.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Pipeline-level errors. These escape the per-action error handling and
/// fail the whole inbound request.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Consent tracking failed: {0}")]
    ConsentTracking(#[source] DatabaseError),

    #[error("Sender lookup failed: {0}")]
    SenderLookup(#[source] DatabaseError),
}

/// Errors returned by a single SMS action.
///
/// `Reported` is a message the action chose to surface; everything else is
/// recorded on the outcome as an exception.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("{0}")]
    Reported(String),

    #[error("Invalid settings for action {action}: {reason}")]
    InvalidSettings { action: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
