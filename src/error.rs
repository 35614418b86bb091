//! Error types for PlugScout
//!
//! This module defines all error types used throughout the discovery
//! pipeline. Uses `thiserror` for ergonomic error handling with automatic
//! `Display` and `Error` trait implementations.
//!
//! Only fatal conditions travel through [`ScoutError`]. A missing root, an
//! unreadable manifest and similar recoverable conditions are logged where
//! they occur and never reach the caller.

use std::path::PathBuf;

use thiserror::Error;

/// The primary error type for PlugScout operations.
#[derive(Error, Debug)]
pub enum ScoutError {
    /// Configuration-related errors (unreadable config, bad source entry)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A manifest path that does not carry the `.json` extension
    #[error("Invalid plugin.json filepath was provided: {}", .0.display())]
    InvalidManifestPath(PathBuf),

    /// A manifest file that exists but could not be parsed
    #[error("Failed to parse manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A parsed manifest whose identity fields are unusable
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// Traversal failure on an existing root that is not a missing or
    /// permission condition
    #[error("Walk reported an error for {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file outside a plugin view (or outside a frozen snapshot)
    #[error("File not found in plugin view: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Security violations (path traversal attempts out of a plugin directory)
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// A duplicate selector answered with an index outside its candidates
    #[error("Duplicate selector returned index {index} for plugin '{id}' with {candidates} candidates")]
    InvalidSelection {
        id: String,
        index: usize,
        candidates: usize,
    },

    /// A background discovery task panicked or was cancelled
    #[error("Discovery task failed: {0}")]
    Task(String),
}

/// A specialized `Result` type for PlugScout operations.
pub type Result<T> = std::result::Result<T, ScoutError>;
