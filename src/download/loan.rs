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


//! Loan token records
//!
//! A fulfilled loan is recorded next to the device file as
//! `<device dir>/Loans/<first 16 hex chars of SHA1(id)>.xml`:
//!
//! ```xml
//! <?xml version="1.0"?>
//! <loanToken>
//!   <id>...</id>
//!   <operatorURL>...</operatorURL>
//!   <validity>...</validity>
//!   <name>...</name>
//! </loanToken>
//! ```
//!
//! Two ids sharing the same hash prefix map to the same file; the later
//! record replaces the earlier one.

use crate::engine::{FulfillmentItem, LoanToken};
use crate::error::{DownloaderError, Result};
use crate::file::manager::{mkpath, write_file};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Number of hex characters of SHA1(id) used as file name
pub const ID_HASH_SIZE: usize = 16;

/// Directory holding loan records, relative to the device file directory
pub const LOANS_DIR: &str = "Loans";

/// File name of the record for a loan id
pub fn loan_file_name(id: &str) -> String {
    let digest = hex::encode(Sha1::digest(id.as_bytes()));
    format!("{}.xml", &digest[..ID_HASH_SIZE])
}

fn xml_error<E: std::fmt::Display>(err: E) -> DownloaderError {
    DownloaderError::Xml(err.to_string())
}

/// Render the loan record document
pub fn render_loan_token(token: &LoanToken, name: &str) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", None, None)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Start(BytesStart::new("loanToken")))
        .map_err(xml_error)?;

    let fields = [
        ("id", token.id()),
        ("operatorURL", token.operator_url()),
        ("validity", token.validity()),
        ("name", name),
    ];
    for (tag, value) in fields {
        writer
            .write_event(Event::Start(BytesStart::new(tag)))
            .map_err(xml_error)?;
        writer
            .write_event(Event::Text(BytesText::new(value)))
            .map_err(xml_error)?;
        writer
            .write_event(Event::End(BytesEnd::new(tag)))
            .map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("loanToken")))
        .map_err(xml_error)?;

    let mut xml = String::from_utf8(writer.into_inner()).map_err(xml_error)?;
    xml.push('\n');
    Ok(xml)
}

/// Writes loan records for the device a run used
#[derive(Debug, Clone)]
pub struct LoanTokenWriter {
    loans_dir: PathBuf,
}

impl LoanTokenWriter {
    /// Records go to `Loans/` beside `device_file`
    pub fn new(device_file: &Path) -> Self {
        let device_dir = match device_file.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self {
            loans_dir: device_dir.join(LOANS_DIR),
        }
    }

    pub fn loans_dir(&self) -> &Path {
        &self.loans_dir
    }

    /// Record the item loan token, if it has one
    ///
    /// Returns the record path, or `None` when the item is not a loan.
    pub fn write<I: FulfillmentItem>(&self, item: &I) -> Result<Option<PathBuf>> {
        let Some(token) = item.loan_token() else {
            debug!("no loan token");
            return Ok(None);
        };

        let xml = render_loan_token(token, &item.title())?;

        mkpath(&self.loans_dir)?;
        let path = self.loans_dir.join(loan_file_name(token.id()));
        write_file(&path, xml.as_bytes())?;

        debug!(path = %path.display(), "loan token written");
        Ok(Some(path))
    }
}
