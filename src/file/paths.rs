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


//! Output path generation
//!
//! # Naming rules
//! - An explicit `--output-file` is used as given and never renamed
//! - Otherwise a downloaded item is named after its `title` metadata, with
//!   `/` replaced by `_`, or `output` when the title is empty. The
//!   extension (`.epub`/`.pdf`) is appended once the item type is known
//! - An exported key defaults to `Adobe_PrivateLicenseKey--<username>.der`
//! - `--output-dir` is prepended in every case

use crate::engine::ItemType;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Name used when an item has no title
pub const FALLBACK_FILENAME: &str = "output";

/// Prefix of the default private key file name
pub const PRIVATE_KEY_PREFIX: &str = "Adobe_PrivateLicenseKey--";

/// Default adept directory of the engine
///
/// `$HOME/.config/adept`, then `/home/$USER/.config/adept`, then `./.adept`.
pub fn default_adept_dir() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME").filter(|h| !h.is_empty()) {
        let mut path = PathBuf::from(home);
        path.push(".config");
        path.push("adept");
        return path;
    }

    if let Some(user) = std::env::var_os("USER").filter(|u| !u.is_empty()) {
        let mut path = PathBuf::from("/home");
        path.push(user);
        path.push(".config");
        path.push("adept");
        return path;
    }

    PathBuf::from("./.adept")
}

/// File name derived from an item title
pub fn title_to_filename(title: &str) -> String {
    if title.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        title.replace('/', "_")
    }
}

/// Append `.ext` to the full file name (unlike `set_extension`, existing
/// dots in the name are kept)
pub fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// `dir/path` with any root or drive prefix of `path` dropped
fn under_dir(dir: &Path, path: &Path) -> PathBuf {
    let relative: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::Prefix(_) | Component::RootDir))
        .collect();
    dir.join(relative)
}

/// Output file name, remembering whether the user chose it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputName {
    /// Given with `--output-file`
    Explicit(PathBuf),
    /// Computed from item metadata or the user name
    Derived(PathBuf),
}

impl OutputName {
    /// Name for a downloaded item, before its extension is known
    pub fn for_item(output_file: Option<&Path>, title: &str) -> Self {
        match output_file {
            Some(file) => OutputName::Explicit(file.to_path_buf()),
            None => OutputName::Derived(PathBuf::from(title_to_filename(title))),
        }
    }

    /// Name for an exported private license key
    pub fn for_private_key(output_file: Option<&Path>, username: &str) -> Self {
        match output_file {
            Some(file) => OutputName::Explicit(file.to_path_buf()),
            None => OutputName::Derived(PathBuf::from(format!(
                "{PRIVATE_KEY_PREFIX}{username}.der"
            ))),
        }
    }

    /// Prefix with the output directory, if any
    ///
    /// The file always lands under `dir`, even when it was given as an
    /// absolute path.
    pub fn in_dir(self, dir: Option<&Path>) -> Self {
        let Some(dir) = dir else {
            return self;
        };
        match self {
            OutputName::Explicit(path) => OutputName::Explicit(under_dir(dir, &path)),
            OutputName::Derived(path) => OutputName::Derived(under_dir(dir, &path)),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            OutputName::Explicit(path) | OutputName::Derived(path) => path,
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, OutputName::Derived(_))
    }

    /// Where the file must end up once the item type is known
    pub fn final_path(&self, item_type: ItemType) -> PathBuf {
        match self {
            OutputName::Explicit(path) => path.clone(),
            OutputName::Derived(path) => append_extension(path, item_type.extension()),
        }
    }
}
