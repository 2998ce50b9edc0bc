//! Error types for the rolerag domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Errors fall into two request-level classes:
//! - client input problems, reported back to the caller verbatim
//! - collaborator or data failures, reported as a generic internal error
//!
//! Feature-degrading conditions (an empty FAQ tier, a section without a
//! link) are not errors at all; they are logged and the affected context
//! block is omitted.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all rolerag operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Caller mistakes ---
    #[error("Invalid request: {0}")]
    ClientInput(String),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Knowledge cache errors ---
    #[error("Knowledge error: {0}")]
    Knowledge(#[from] KnowledgeError),

    // --- Directory errors ---
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ClientInput(_))
    }

    /// The message that may be shown to the caller.
    ///
    /// Client errors are echoed; everything else collapses to a generic
    /// message so collaborator details never leak.
    pub fn public_message(&self) -> String {
        match self {
            Self::ClientInput(msg) => msg.clone(),
            _ => "Internal error while processing the request".into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {source_name}: {reason}")]
    Parse { source_name: String, reason: String },

    #[error("Invalid record {index} in {source_name}: {reason}")]
    InvalidRecord {
        source_name: String,
        index: usize,
        reason: String,
    },

    #[error("Vector dimension mismatch in {source_name}: record {index} has {found}, expected {expected}")]
    DimensionMismatch {
        source_name: String,
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("Invalid section hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Invalid directory data: {0}")]
    InvalidData(String),
}
