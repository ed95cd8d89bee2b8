//! Error types for the context engine

use crate::summarization::model::ModelError;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ContextError>;

/// Context engine errors
#[derive(Debug, Error)]
pub enum ContextError {
    /// An operation ran before `initialize_context`
    #[error("Context not initialized")]
    NotInitialized,

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Branch is active: {0}")]
    BranchActive(String),

    #[error("Branch limit reached: {0}")]
    BranchLimit(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ContextError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            ContextError::NotInitialized => "NOT_INITIALIZED",
            ContextError::BranchNotFound(_) => "BRANCH_NOT_FOUND",
            ContextError::BranchActive(_) => "BRANCH_ACTIVE",
            ContextError::BranchLimit(_) => "BRANCH_LIMIT",
            ContextError::Persistence(_) => "PERSISTENCE_ERROR",
            ContextError::Model(_) => "MODEL_ERROR",
            ContextError::Configuration(_) => "CONFIGURATION_ERROR",
            ContextError::Serialization(_) => "SERIALIZATION_ERROR",
            ContextError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for ContextError {
    fn from(err: serde_json::Error) -> Self {
        ContextError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for ContextError {
    fn from(err: config::ConfigError) -> Self {
        ContextError::Configuration(err.to_string())
    }
}
