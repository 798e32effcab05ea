// acsm-downloader - ACSM fulfillment front end
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Error types for acsm-downloader
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are grouped by where they surface in a run:
//!
//! - **Usage**: bad flag combinations, empty path arguments, missing ACSM path
//! - **Credentials**: device/activation/device-key files the locator could not find
//! - **Engine**: anything the DRM engine reports while opening the processor,
//!   fulfilling, downloading or exporting the private key
//! - **File**: local filesystem work (copy, directory creation, loan token output)
//!
//! Usage and credential errors end the process with status -1, everything
//! else with status 1. See [`DownloaderError::exit_code`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our DownloaderError type
pub type Result<T> = std::result::Result<T, DownloaderError>;

/// Exit status for argument, validation and credential lookup failures
pub const EXIT_USAGE: i32 = -1;

/// Exit status for failures raised while processing
pub const EXIT_FAILURE: i32 = 1;

/// Main error type for acsm-downloader
#[derive(Error, Debug)]
pub enum DownloaderError {
    // ===== Usage Errors =====

    /// Invalid command line (bad flag, bad combination, empty value)
    #[error("Invalid usage: {0}")]
    Usage(String),

    /// ACSM request file does not exist
    #[error("Error : {} doesn't exists", .0.display())]
    AcsmNotFound(PathBuf),

    // ===== Credential Errors =====

    /// One or more credential files were not found in any search location
    #[error("Missing credential files: {}", display_paths(.0))]
    MissingCredentials(Vec<PathBuf>),

    // ===== Engine Errors =====

    /// The DRM engine reported a failure
    #[error("{message}")]
    Engine {
        /// Engine specific error code, if one was reported
        code: Option<i64>,
        message: String,
    },

    /// The engine executable could not be started
    #[error("DRM engine not found: {}", .0.display())]
    EngineNotFound(PathBuf),

    /// The engine answered with something we could not interpret
    #[error("Invalid engine response: {0}")]
    InvalidEngineResponse(String),

    // ===== File Errors =====

    /// Client side file error (open, write, rename)
    #[error("{0}")]
    FileIo(String),

    /// Loan token document could not be rendered
    #[error("XML error: {0}")]
    Xml(String),

    // ===== External Library Errors =====

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// Helper methods for creating common errors
impl DownloaderError {
    /// Create a Usage error with a message
    pub fn usage<S: Into<String>>(message: S) -> Self {
        DownloaderError::Usage(message.into())
    }

    /// Create a FileIo error with a message
    pub fn file_io<S: Into<String>>(message: S) -> Self {
        DownloaderError::FileIo(message.into())
    }

    /// Create an Engine error
    pub fn engine<S: Into<String>>(message: S, code: Option<i64>) -> Self {
        DownloaderError::Engine {
            message: message.into(),
            code,
        }
    }

    /// Check if error comes from argument parsing or validation
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            DownloaderError::Usage(_) | DownloaderError::AcsmNotFound(_)
        )
    }

    /// Check if error is related to local file/disk operations
    pub fn is_file_error(&self) -> bool {
        matches!(
            self,
            DownloaderError::FileIo(_) | DownloaderError::Xml(_) | DownloaderError::IoError(_)
        )
    }

    /// Check if error was raised by the DRM engine
    pub fn is_engine_error(&self) -> bool {
        matches!(
            self,
            DownloaderError::Engine { .. }
                | DownloaderError::EngineNotFound(_)
                | DownloaderError::InvalidEngineResponse(_)
                | DownloaderError::SerdeJsonError(_)
        )
    }

    /// Process exit status for this error
    ///
    /// Usage and credential errors happen before any work is done and map to
    /// -1. Everything raised once processing started maps to 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            DownloaderError::Usage(_)
            | DownloaderError::AcsmNotFound(_)
            | DownloaderError::MissingCredentials(_) => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }
}
