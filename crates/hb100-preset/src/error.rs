//! Error types for preset operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while decoding, encoding or storing presets.
#[derive(Debug, Error)]
pub enum PresetError {
    /// Null/range/shape violation at an API boundary.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// PHB text is not parseable JSON.
    #[error("invalid JSON: {0}")]
    JsonInvalid(#[from] serde_json::Error),

    /// JSON structure or binary layout violates the preset format.
    #[error("malformed preset: {0}")]
    MalformedPreset(String),

    /// An effect selector absent from the catalogue.
    #[error("unknown effect {selector} in section {section}")]
    UnknownEffect {
        /// Section whose table was consulted.
        section: &'static str,
        /// The selector that failed to resolve.
        selector: u16,
    },

    /// No preset matches the given slot or name.
    #[error("no such preset: {0}")]
    NotFound(String),

    /// Failed to read a file.
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file.
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl PresetError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PresetError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PresetError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Completion code reported to command originators for this error.
    pub fn completion_code(&self) -> u16 {
        match self {
            PresetError::NotFound(_) => 404,
            PresetError::ReadFile { .. } | PresetError::WriteFile { .. } => 500,
            _ => 400,
        }
    }
}
