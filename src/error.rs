// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Error types for file reading, writing and project application.
//!
//! Validation problems (out-of-range points, inconsistent timestamps,
//! metadata mismatches) are never errors: they are collected as warnings
//! through [`crate::diagnostics::Diagnostics`]. The variants here are the
//! failures that abort an operation.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a read, write or project application.
#[derive(Debug, Error)]
pub enum Error {
    /// Structural violation of the CSV track-file contract
    #[error("Format error on line {line}: {message}")]
    Format { line: usize, message: String },

    /// Filesystem failure, propagated unchanged
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed JSON project document
    #[error("Invalid JSON project file: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed YAML project document
    #[error("Invalid YAML project file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File extension not handled by the project serializer
    #[error("Unsupported file extension: {0:?}")]
    UnsupportedExtension(PathBuf),

    /// Data stored in meters without a usable scale factor
    #[error("Data is stored in meters but no valid scale factor is recorded")]
    MissingScale,

    /// Project document without its metadata section
    #[error("Project is missing its metadata section")]
    MissingMetadata,
}

impl Error {
    /// Build a format error for the given 1-based line number.
    pub fn format(line: usize, message: impl Into<String>) -> Self {
        Self::Format {
            line,
            message: message.into(),
        }
    }
}
