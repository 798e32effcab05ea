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


//! Command line parsing
//!
//! clap handles the flag grammar; [`Config::try_from`] applies the rules clap
//! cannot express (ACSM path vs `--export-private-key`, non empty paths).
//! Help and version are plain flags so that every usage problem goes through
//! the same path: usage text on stdout and exit status -1.

use crate::config::{Config, CredentialFiles, Mode};
use crate::error::{DownloaderError, Result};
use clap::error::{ContextKind, ContextValue};
use clap::{ArgAction, CommandFactory, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

const ENVIRONMENT_HELP: &str = "\
Environment:
Device file, activation file and device key file are optionals. If not set, they are looked into :

  * $ADEPT_DIR environment variable
  * /home/<user>/.config/adept
  * Current directory
  * .adept
  * adobe-digital-editions directory
  * .adobe-digital-editions directory";

#[derive(Parser, Debug)]
#[command(name = "acsmdownloader")]
#[command(about = "acsmdownloader download EPUB file from ACSM request file", long_about = None)]
#[command(disable_help_flag = true, disable_version_flag = true)]
#[command(next_help_heading = "Global Options", after_help = ENVIRONMENT_HELP)]
pub struct Cli {
    /// .adept directory that must contains device.xml, activation.xml and devicesalt
    #[arg(short = 'D', long = "adept-directory", value_name = "DIR", help_heading = "ADEPT Options")]
    pub adept_directory: Option<PathBuf>,

    /// device.xml file from eReader
    #[arg(short = 'd', long, value_name = "FILE", help_heading = "ADEPT Options")]
    pub device_file: Option<PathBuf>,

    /// activation.xml file from eReader
    #[arg(short = 'a', long, value_name = "FILE", help_heading = "ADEPT Options")]
    pub activation_file: Option<PathBuf>,

    /// private device key file (eg devicesalt/devkey.bin) from eReader
    #[arg(short = 'k', long, value_name = "FILE", help_heading = "ADEPT Options")]
    pub device_key_file: Option<PathBuf>,

    /// Optional output directory were to put result (default ./)
    #[arg(short = 'O', long, value_name = "DIR")]
    pub output_dir: Option<OsString>,

    /// Optional output filename (default <title.(epub|pdf|der)>)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output_file: Option<OsString>,

    /// Backward compatibility: ACSM request file for epub download
    #[arg(short = 'f', long, value_name = "FILE")]
    pub acsm_file: Option<PathBuf>,

    /// Export private key in DER format
    #[arg(short = 'e', long)]
    pub export_private_key: bool,

    /// Try to resume download (in case of previous failure)
    #[arg(short = 'r', long)]
    pub resume: bool,

    /// Don't notify server, even if requested
    #[arg(short = 'N', long)]
    pub no_notify: bool,

    /// Increase verbosity, can be set multiple times
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Display libgourou version
    #[arg(short = 'V', long)]
    pub version: bool,

    /// This help
    #[arg(short = 'h', long)]
    pub help: bool,

    /// DRM engine executable (default: gourou-engine from PATH)
    #[arg(long, env = "ADEPT_ENGINE", value_name = "PATH")]
    pub engine: Option<PathBuf>,

    /// ACSM request file
    #[arg(value_name = "file.acsm")]
    pub acsm: Option<PathBuf>,
}

/// What the command line asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Print usage and exit successfully
    Help,
    /// Print the engine version and exit
    Version {
        engine: Option<PathBuf>,
        verbosity: u8,
    },
    /// Perform one fulfillment or key export
    Run(Config),
}

/// Parse a full argument vector (program name first)
pub fn parse_args<I, T>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let cli = match Cli::try_parse_from(args.iter().cloned()) {
        Ok(cli) => cli,
        Err(err) => {
            return flags_before_error(&args, &err)
                .ok_or_else(|| DownloaderError::usage(err.kind().to_string()))
        }
    };

    invocation(cli)
}

fn invocation(cli: Cli) -> Result<Invocation> {
    if cli.help {
        return Ok(Invocation::Help);
    }
    if cli.version {
        return Ok(Invocation::Version {
            engine: cli.engine,
            verbosity: cli.verbose,
        });
    }

    Config::try_from(cli).map(Invocation::Run)
}

/// `-h` or `-V` placed before an offending argument still takes effect,
/// since option scanning stops at the first of them.
fn flags_before_error(args: &[OsString], err: &clap::Error) -> Option<Invocation> {
    let Some(ContextValue::String(offending)) = err.get(ContextKind::InvalidArg) else {
        return None;
    };
    let index = args
        .iter()
        .skip(1)
        .position(|arg| arg.to_string_lossy() == offending.as_str())?
        + 1;

    let cli = Cli::try_parse_from(args[..index].iter().cloned()).ok()?;
    if cli.help || cli.version {
        invocation(cli).ok()
    } else {
        None
    }
}

/// Rendered usage text
pub fn usage() -> String {
    Cli::command().render_help().to_string()
}

fn non_empty(value: Option<OsString>, flag: &str) -> Result<Option<PathBuf>> {
    match value {
        Some(v) if v.is_empty() => Err(DownloaderError::usage(format!("{flag} must not be empty"))),
        Some(v) => Ok(Some(PathBuf::from(v))),
        None => Ok(None),
    }
}

impl TryFrom<Cli> for Config {
    type Error = DownloaderError;

    fn try_from(cli: Cli) -> Result<Self> {
        let mut credentials = cli
            .adept_directory
            .as_deref()
            .map(CredentialFiles::in_directory)
            .unwrap_or_default();
        if let Some(device_file) = cli.device_file {
            credentials.device_file = device_file;
        }
        if let Some(activation_file) = cli.activation_file {
            credentials.activation_file = activation_file;
        }
        if let Some(device_key_file) = cli.device_key_file {
            credentials.device_key_file = device_key_file;
        }

        // The positional argument wins over the legacy -f flag
        let acsm_file = cli.acsm.or(cli.acsm_file);

        if acsm_file.is_none() && !cli.export_private_key {
            return Err(DownloaderError::usage(
                "an ACSM file or --export-private-key is required",
            ));
        }

        let output_dir = non_empty(cli.output_dir, "--output-dir")?;
        let output_file = non_empty(cli.output_file, "--output-file")?;

        let mode = match (acsm_file, cli.export_private_key) {
            (Some(_), true) => {
                return Err(DownloaderError::usage(
                    "--export-private-key cannot be used with an ACSM file",
                ))
            }
            (Some(acsm_file), false) => Mode::Fulfill { acsm_file },
            (None, _) => Mode::ExportPrivateKey,
        };

        Ok(Config {
            credentials,
            mode,
            output_dir,
            output_file,
            resume: cli.resume,
            notify: !cli.no_notify,
            verbosity: cli.verbose,
            engine: cli.engine,
        })
    }
}
