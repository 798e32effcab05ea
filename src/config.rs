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


//! Run configuration
//!
//! A [`Config`] is built once from the command line and handed by reference
//! to everything that needs it. Nothing in the crate mutates it afterwards.

use std::path::{Path, PathBuf};

/// Default device file name
pub const DEVICE_FILE: &str = "device.xml";

/// Default activation file name
pub const ACTIVATION_FILE: &str = "activation.xml";

/// Default device key file name
pub const DEVICE_KEY_FILE: &str = "devicesalt";

/// The three credential files the engine needs to open a processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialFiles {
    pub device_file: PathBuf,
    pub activation_file: PathBuf,
    pub device_key_file: PathBuf,
}

impl CredentialFiles {
    /// Credential files inside an adept directory
    pub fn in_directory(dir: &Path) -> Self {
        Self {
            device_file: dir.join(DEVICE_FILE),
            activation_file: dir.join(ACTIVATION_FILE),
            device_key_file: dir.join(DEVICE_KEY_FILE),
        }
    }

    /// Iterate over (device, activation, device key) in that order
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        [
            self.device_file.as_path(),
            self.activation_file.as_path(),
            self.device_key_file.as_path(),
        ]
        .into_iter()
    }
}

impl Default for CredentialFiles {
    fn default() -> Self {
        Self {
            device_file: PathBuf::from(DEVICE_FILE),
            activation_file: PathBuf::from(ACTIVATION_FILE),
            device_key_file: PathBuf::from(DEVICE_KEY_FILE),
        }
    }
}

/// What a run does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Fulfill an ACSM request and download the resulting item
    Fulfill { acsm_file: PathBuf },
    /// Export the user private license key in DER format
    ExportPrivateKey,
}

/// Immutable configuration of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Credential file names before location
    pub credentials: CredentialFiles,
    pub mode: Mode,
    /// Directory prefix for produced files
    pub output_dir: Option<PathBuf>,
    /// Explicit output file name, never renamed
    pub output_file: Option<PathBuf>,
    /// Try to resume a previously interrupted download
    pub resume: bool,
    /// Notify the server during fulfillment
    pub notify: bool,
    /// Number of `-v` flags
    pub verbosity: u8,
    /// Engine executable override
    pub engine: Option<PathBuf>,
}

impl Config {
    pub fn acsm_file(&self) -> Option<&Path> {
        match &self.mode {
            Mode::Fulfill { acsm_file } => Some(acsm_file),
            Mode::ExportPrivateKey => None,
        }
    }

    pub fn is_export(&self) -> bool {
        self.mode == Mode::ExportPrivateKey
    }
}
