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


//! Credential file lookup
//!
//! # Search order
//! 1. `$ADEPT_DIR` (when set and non empty)
//! 2. The engine default adept directory
//! 3. The current directory
//! 4. `.adept`, `./adobe-digital-editions`, `./.adobe-digital-editions`
//!
//! The first candidate that exists wins.

use crate::config::CredentialFiles;
use crate::error::{DownloaderError, Result};
use crate::file::manager::file_exists;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Environment variable searched first
pub const ADEPT_DIR_ENV: &str = "ADEPT_DIR";

/// Directories left behind by other ADEPT clients, relative to the current directory
pub const LEGACY_DIRS: [&str; 3] = [".adept", "./adobe-digital-editions", "./.adobe-digital-editions"];

#[derive(Debug, Clone)]
pub struct FileLocator {
    search_dirs: Vec<PathBuf>,
}

impl FileLocator {
    /// Locator using `$ADEPT_DIR` from the process environment
    pub fn from_env(default_dir: &Path) -> Self {
        Self::new(std::env::var_os(ADEPT_DIR_ENV), default_dir)
    }

    /// Locator for an explicit `ADEPT_DIR` value
    pub fn new(adept_dir: Option<OsString>, default_dir: &Path) -> Self {
        let mut search_dirs = Vec::with_capacity(LEGACY_DIRS.len() + 3);

        if let Some(dir) = adept_dir.filter(|d| !d.is_empty()) {
            search_dirs.push(PathBuf::from(dir));
        }
        search_dirs.push(default_dir.to_path_buf());
        // Empty path: the name as given, relative to the current directory
        search_dirs.push(PathBuf::new());
        search_dirs.extend(LEGACY_DIRS.iter().map(PathBuf::from));

        Self { search_dirs }
    }

    /// Locator searching exactly `dirs`, in order
    pub fn with_dirs(dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs: dirs }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// First existing candidate for `name`
    pub fn locate(&self, name: &Path) -> Option<PathBuf> {
        self.search_dirs.iter().find_map(|dir| {
            let candidate = dir.join(name);
            trace!(candidate = %candidate.display(), "looking for file");
            file_exists(&candidate).then_some(candidate)
        })
    }

    /// Locate all three credential files
    ///
    /// Every missing file is reported on stdout before the error is returned,
    /// so a user sees all of them at once.
    pub fn resolve(&self, files: &CredentialFiles) -> Result<CredentialFiles> {
        let mut missing = Vec::new();
        let mut lookup = |name: &Path| {
            let found = self.locate(name);
            match &found {
                Some(path) => {
                    debug!(file = %name.display(), path = %path.display(), "credential file located");
                }
                None => {
                    println!(
                        "Error : {} doesn't exists, did you activate your device ?",
                        name.display()
                    );
                    missing.push(name.to_path_buf());
                }
            }
            found
        };

        let device_file = lookup(&files.device_file);
        let activation_file = lookup(&files.activation_file);
        let device_key_file = lookup(&files.device_key_file);

        match (device_file, activation_file, device_key_file) {
            (Some(device_file), Some(activation_file), Some(device_key_file)) => {
                Ok(CredentialFiles {
                    device_file,
                    activation_file,
                    device_key_file,
                })
            }
            _ => Err(DownloaderError::MissingCredentials(missing)),
        }
    }
}
