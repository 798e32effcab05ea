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


//! acsm-downloader
//!
//! Fulfills ACSM (Adobe Content Server Message) requests into EPUB/PDF files
//! and exports private license keys, by driving an external DRM engine.
//! The crate owns argument handling, credential lookup, output naming and
//! loan token records; the engine owns the protocol and the cryptography.

pub mod cli;
pub mod config;
pub mod download;
pub mod engine;
pub mod error;
pub mod file;
pub mod logging;

pub use config::{Config, CredentialFiles, Mode};
pub use error::{DownloaderError, Result};
