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


//! Fulfillment and key export orchestration
//!
//! # Flow
//! 1. Locate the credential files (all misses reported together)
//! 2. Check the ACSM file exists (fulfillment only)
//! 3. Open an engine processor
//! 4. Either export the private key, or fulfill + download + rename
//!    (a failed rename only leaves the file without its extension)
//! 5. Record the loan token, if the item has one
//!
//! Nothing is retried here; a failing step ends the run.

use crate::config::{Config, CredentialFiles, Mode};
use crate::download::loan::LoanTokenWriter;
use crate::engine::{DrmEngine, DrmProcessor, FulfillmentItem, ItemType};
use crate::error::{DownloaderError, Result};
use crate::file::locator::FileLocator;
use crate::file::manager::{file_exists, mkpath, rename_file};
use crate::file::paths::OutputName;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What a successful run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Private license key written to this path
    KeyExported(PathBuf),
    /// Item downloaded, with its loan record when the item is a loan
    Downloaded {
        path: PathBuf,
        item_type: ItemType,
        loan_token: Option<PathBuf>,
    },
}

/// Runs one operation against an opened processor
pub struct AcsmDownloader<'a, P: DrmProcessor> {
    processor: &'a mut P,
    config: &'a Config,
    credentials: &'a CredentialFiles,
}

impl<'a, P: DrmProcessor> AcsmDownloader<'a, P> {
    /// `credentials` must be the located files the processor was opened with
    pub fn new(processor: &'a mut P, config: &'a Config, credentials: &'a CredentialFiles) -> Self {
        Self {
            processor,
            config,
            credentials,
        }
    }

    pub fn run(&mut self) -> Result<Outcome> {
        let config = self.config;
        match &config.mode {
            Mode::ExportPrivateKey => self.export_private_key(),
            Mode::Fulfill { acsm_file } => self.fulfill(acsm_file),
        }
    }

    /// Output directory, created when missing
    fn output_dir(&self) -> Result<Option<&'a Path>> {
        let config = self.config;
        let Some(dir) = config.output_dir.as_deref() else {
            return Ok(None);
        };
        if !file_exists(dir) {
            mkpath(dir)?;
        }
        Ok(Some(dir))
    }

    fn export_private_key(&mut self) -> Result<Outcome> {
        let name = OutputName::for_private_key(
            self.config.output_file.as_deref(),
            self.processor.username(),
        )
        .in_dir(self.output_dir()?);

        info!(path = %name.path().display(), "exporting private license key");
        self.processor.export_private_license_key(name.path())?;

        Ok(Outcome::KeyExported(name.path().to_path_buf()))
    }

    fn fulfill(&mut self, acsm_file: &Path) -> Result<Outcome> {
        info!(acsm = %acsm_file.display(), notify = self.config.notify, "fulfilling");
        let item = self.processor.fulfill(acsm_file, self.config.notify)?;

        let name = OutputName::for_item(self.config.output_file.as_deref(), &item.title())
            .in_dir(self.output_dir()?);

        info!(path = %name.path().display(), resume = self.config.resume, "downloading");
        let item_type = self
            .processor
            .download(&item, name.path(), self.config.resume)?;

        let mut path = name.final_path(item_type);
        if name.is_derived() {
            debug!(from = %name.path().display(), to = %path.display(), "adding extension");
            if let Err(err) = rename_file(name.path(), &path) {
                warn!(error = %err, "keeping downloaded file without extension");
                path = name.path().to_path_buf();
            }
        }

        let loan_token = LoanTokenWriter::new(&self.credentials.device_file).write(&item)?;

        Ok(Outcome::Downloaded {
            path,
            item_type,
            loan_token,
        })
    }
}

/// Locate credentials, open the engine and run the configured operation
pub fn process<E: DrmEngine>(engine: &E, locator: &FileLocator, config: &Config) -> Result<Outcome> {
    let credentials = locator.resolve(&config.credentials)?;

    if let Some(acsm_file) = config.acsm_file() {
        if !file_exists(acsm_file) {
            return Err(DownloaderError::AcsmNotFound(acsm_file.to_path_buf()));
        }
    }

    let mut processor = engine.open(&credentials)?;
    AcsmDownloader::new(&mut processor, config, &credentials).run()
}
