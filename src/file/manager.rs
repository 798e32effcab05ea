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


//! File operations
//!
//! # Key Operations
//! - File existence checks
//! - Recursive directory creation (owner only permissions)
//! - Buffered file copy
//! - Rename and whole-file writes with client file errors

use crate::error::{DownloaderError, Result};
use std::fs::{self, DirBuilder, File};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use tracing::debug;

/// Copy chunk size
const COPY_BUFFER_SIZE: usize = 4096;

/// Check if a file or directory exists (stat succeeds)
pub fn file_exists(path: &Path) -> bool {
    fs::metadata(path).is_ok()
}

/// Create `dir` and every missing parent, shallow to deep
///
/// Components that already exist are left untouched. New components are
/// created with mode 0700 on Unix.
pub fn mkpath(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }

    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    debug!(path = %dir.display(), "creating directory");
    builder.create(dir).map_err(|e| {
        DownloaderError::FileIo(format!(
            "Failed to create directory {}: {}",
            dir.display(),
            e
        ))
    })
}

/// Copy `source` into `destination` in fixed size chunks
///
/// The destination is created or truncated. Every chunk is written out in
/// full before the next read.
pub fn file_copy(source: &Path, destination: &Path) -> Result<()> {
    let mut input = File::open(source)
        .map_err(|_| DownloaderError::FileIo(format!("Unable to open {}", source.display())))?;
    let mut output = File::create(destination).map_err(|_| {
        DownloaderError::FileIo(format!("Unable to open {}", destination.display()))
    })?;

    let mut buffer = [0u8; COPY_BUFFER_SIZE];
    loop {
        let read = match input.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(DownloaderError::FileIo(format!(
                    "Error reading {}: {}",
                    source.display(),
                    e
                )))
            }
        };

        output.write_all(&buffer[..read]).map_err(|_| {
            DownloaderError::FileIo(format!("Error writing {}", destination.display()))
        })?;
    }

    output.flush().map_err(|_| {
        DownloaderError::FileIo(format!("Error writing {}", destination.display()))
    })
}

/// Rename a file, reporting failures as client file errors
pub fn rename_file(source: &Path, destination: &Path) -> Result<()> {
    fs::rename(source, destination).map_err(|e| {
        DownloaderError::FileIo(format!(
            "Rename failed: {} -> {}: {}",
            source.display(),
            destination.display(),
            e
        ))
    })
}

/// Write `contents` to `path`, replacing any previous file
pub fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents)
        .map_err(|e| DownloaderError::FileIo(format!("Unable to write {}: {}", path.display(), e)))
}
