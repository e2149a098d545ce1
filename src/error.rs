//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout Tabulum.
//! All errors are structured and map to stable error codes for JSON output
//! and to a process exit status for the CLI.
//!
//! # Error Categories
//! - `EntityNotFound`: the identifier names no known type (user-facing, exit 1)
//! - `NotAnEntity`: the identifier names a type that is not a registered entity (user-facing, exit 1)
//! - `MetadataContract`: a metadata provider could not honour its contract (fatal)
//! - `ConnectionFailed`: database connection errors (fatal)
//! - `QueryFailed`: query execution errors (fatal)
//! - `InvalidInput`: malformed options such as an unusable date pattern (fatal)
//! - `ConfigError`: configuration file or entity registry errors (fatal)

use thiserror::Error;

/// Main error type for Tabulum operations
#[derive(Error, Debug)]
pub enum TabulumError {
    /// The identifier does not resolve to any known type
    #[error("Entity class \"{0}\" does not exist.")]
    EntityNotFound(String),

    /// The identifier resolves but is not a recognized entity
    #[error("Entity class \"{0}\" is not a recognized entity.")]
    NotAnEntity(String),

    /// Metadata provider broke its contract (missing value accessor, unhydrated field, ...)
    #[error("Metadata contract violation: {0}")]
    MetadataContract(String),

    /// Database connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Invalid input or unusable option value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error (file not found, invalid JSON, bad entity definition)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl TabulumError {
    /// Convert error to error code string for JSON output
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::EntityNotFound(_) => "ENTITY_NOT_FOUND",
            Self::NotAnEntity(_) => "NOT_AN_ENTITY",
            Self::MetadataContract(_) => "METADATA_CONTRACT",
            Self::ConnectionFailed(_) => "CONNECTION_FAILED",
            Self::QueryFailed(_) => "QUERY_FAILED",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Whether this is one of the two validation failures reported to the user
    /// with a clean exit status.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::EntityNotFound(_) | Self::NotAnEntity(_))
    }

    /// Process exit status for this error: 1 for validation failures, 2 for
    /// everything that aborts the run.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        if self.is_validation() {
            1
        } else {
            2
        }
    }

    /// Get human-readable error message
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Create an entity-not-found error
    pub fn entity_not_found(name: impl Into<String>) -> Self {
        Self::EntityNotFound(name.into())
    }

    /// Create a not-an-entity error
    pub fn not_an_entity(name: impl Into<String>) -> Self {
        Self::NotAnEntity(name.into())
    }

    /// Create a metadata contract error
    pub fn metadata_contract(message: impl Into<String>) -> Self {
        Self::MetadataContract(message.into())
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Create a query failed error
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}

/// Result type alias for Tabulum operations
pub type Result<T> = std::result::Result<T, TabulumError>;
