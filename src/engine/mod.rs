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


//! DRM engine capabilities
//!
//! The ADEPT protocol, license server exchanges and decryption all live in
//! the engine. This crate only sees it through these traits:
//!
//! - [`DrmEngine`] - version, default adept directory, opening a processor
//! - [`DrmProcessor`] - fulfill, download, private key export
//! - [`FulfillmentItem`] - metadata and optional [`LoanToken`] of a fulfilled item
//!
//! [`bridge`] provides the implementation used by the binary.

pub mod bridge;

pub use bridge::EngineBridge;

use crate::config::CredentialFiles;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Kind of asset a download produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ItemType {
    Pdf,
    Epub,
}

impl ItemType {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ItemType::Pdf => "pdf",
            ItemType::Epub => "epub",
        }
    }
}

/// Loan information returned with a fulfilled item
///
/// Read only string map. Absent keys read as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanToken(BTreeMap<String, String>);

impl LoanToken {
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or_default()
    }

    pub fn id(&self) -> &str {
        self.get("id")
    }

    pub fn operator_url(&self) -> &str {
        self.get("operatorURL")
    }

    pub fn validity(&self) -> &str {
        self.get("validity")
    }
}

impl<K, V> FromIterator<(K, V)> for LoanToken
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One asset requested by an ACSM file
pub trait FulfillmentItem {
    /// Metadata value, empty when the engine has none for `key`
    fn metadata(&self, key: &str) -> String;

    fn loan_token(&self) -> Option<&LoanToken>;

    fn title(&self) -> String {
        self.metadata("title")
    }
}

/// Processor opened on one set of credential files
pub trait DrmProcessor {
    type Item: FulfillmentItem;

    /// Account user name from the activation record
    fn username(&self) -> &str;

    /// Run the fulfillment exchange for an ACSM file
    fn fulfill(&mut self, acsm_file: &Path, notify: bool) -> Result<Self::Item>;

    /// Download a fulfilled item to `path`
    fn download(&mut self, item: &Self::Item, path: &Path, resume: bool) -> Result<ItemType>;

    /// Write the user private license key to `path` (DER)
    fn export_private_license_key(&mut self, path: &Path) -> Result<()>;
}

/// Entry point into a DRM engine
pub trait DrmEngine {
    type Processor: DrmProcessor;

    /// Engine version string
    fn version(&self) -> Result<String>;

    /// Directory the engine keeps its own activation files in
    fn default_adept_dir(&self) -> PathBuf {
        crate::file::default_adept_dir()
    }

    /// Open a processor; fails if the engine rejects the credential files
    fn open(&self, credentials: &CredentialFiles) -> Result<Self::Processor>;
}
