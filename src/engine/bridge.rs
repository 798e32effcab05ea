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


//! External engine process bridge
//!
//! Drives a DRM engine executable, one child process per operation:
//!
//! ```text
//! <engine> --log-level <n> version
//! <engine> --log-level <n> open       <credentials>
//! <engine> --log-level <n> fulfill    <credentials> --acsm <file> [--no-notify]
//! <engine> --log-level <n> download   <credentials> --output <file> [--resume]   (item JSON on stdin)
//! <engine> --log-level <n> export-key <credentials> --output <file>
//! ```
//!
//! where `<credentials>` is
//! `--device-file <f> --activation-file <f> --device-key-file <f>`.
//!
//! Every call answers with one JSON document on stdout. A failing call exits
//! non zero and may print `{"error": {"code": <n>, "message": "..."}}`.
//! The engine's stderr is passed through untouched.

use crate::config::CredentialFiles;
use crate::engine::{DrmEngine, DrmProcessor, FulfillmentItem, ItemType, LoanToken};
use crate::error::{DownloaderError, Result};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, Command, Output, Stdio};
use std::thread;
use tracing::{debug, warn};

/// Engine executable looked up in PATH when none is configured
pub const DEFAULT_ENGINE: &str = "gourou-engine";

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

#[derive(Debug, Deserialize)]
struct OpenResponse {
    username: String,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    #[serde(rename = "type")]
    item_type: ItemType,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

/// Fulfilled item as described by the engine
///
/// `state` is engine private and handed back verbatim on download.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeItem {
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub loan_token: Option<LoanToken>,
    #[serde(default)]
    pub state: serde_json::Value,
}

impl FulfillmentItem for BridgeItem {
    fn metadata(&self, key: &str) -> String {
        self.metadata.get(key).cloned().unwrap_or_default()
    }

    fn loan_token(&self) -> Option<&LoanToken> {
        self.loan_token.as_ref()
    }
}

/// Engine reached through an executable
#[derive(Debug, Clone)]
pub struct EngineBridge {
    program: PathBuf,
    log_level: u8,
}

impl EngineBridge {
    pub fn new(program: Option<PathBuf>, log_level: u8) -> Self {
        Self {
            program: program.unwrap_or_else(|| PathBuf::from(DEFAULT_ENGINE)),
            log_level,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn call<T: DeserializeOwned>(
        &self,
        subcommand: &str,
        args: &[OsString],
        stdin: Option<&[u8]>,
    ) -> Result<T> {
        let mut command = Command::new(&self.program);
        command
            .arg("--log-level")
            .arg(self.log_level.to_string())
            .arg(subcommand)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        debug!(engine = %self.program.display(), subcommand, "calling engine");

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                DownloaderError::EngineNotFound(self.program.clone())
            } else {
                DownloaderError::IoError(e)
            }
        })?;

        // stdin is fed from its own thread while stdout is drained here
        let output = thread::scope(|scope| -> Result<Output> {
            let feeder = match (stdin, child.stdin.take()) {
                (Some(input), Some(pipe)) => Some(scope.spawn(move || feed_stdin(pipe, input))),
                _ => None,
            };

            let output = child.wait_with_output()?;
            if let Some(feeder) = feeder {
                feeder.join().map_err(|_| {
                    DownloaderError::IoError(std::io::Error::other(format!(
                        "{subcommand}: stdin writer panicked"
                    )))
                })??;
            }
            Ok(output)
        })?;

        if !output.status.success() {
            return Err(engine_failure(subcommand, &output));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            DownloaderError::InvalidEngineResponse(format!("{subcommand}: {e}"))
        })
    }
}

/// An engine that exits without reading reports through its status
fn feed_stdin(mut pipe: ChildStdin, input: &[u8]) -> std::io::Result<()> {
    match pipe.write_all(input) {
        Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
        _ => Ok(()),
    }
}

fn engine_failure(subcommand: &str, output: &Output) -> DownloaderError {
    match serde_json::from_slice::<ErrorResponse>(&output.stdout) {
        Ok(response) => DownloaderError::engine(response.error.message, response.error.code),
        Err(_) => {
            warn!(subcommand, status = %output.status, "engine failed without an error report");
            DownloaderError::engine(
                format!("DRM engine {subcommand} failed ({})", output.status),
                output.status.code().map(i64::from),
            )
        }
    }
}

fn credential_args(credentials: &CredentialFiles) -> Vec<OsString> {
    vec![
        "--device-file".into(),
        credentials.device_file.clone().into_os_string(),
        "--activation-file".into(),
        credentials.activation_file.clone().into_os_string(),
        "--device-key-file".into(),
        credentials.device_key_file.clone().into_os_string(),
    ]
}

impl DrmEngine for EngineBridge {
    type Processor = BridgeProcessor;

    fn version(&self) -> Result<String> {
        let response: VersionResponse = self.call("version", &[], None)?;
        Ok(response.version)
    }

    fn open(&self, credentials: &CredentialFiles) -> Result<BridgeProcessor> {
        let credential_args = credential_args(credentials);
        let response: OpenResponse = self.call("open", &credential_args, None)?;
        debug!(username = %response.username, "processor opened");

        Ok(BridgeProcessor {
            bridge: self.clone(),
            credential_args,
            username: response.username,
        })
    }
}

/// Processor bound to one set of credential files
#[derive(Debug)]
pub struct BridgeProcessor {
    bridge: EngineBridge,
    credential_args: Vec<OsString>,
    username: String,
}

impl BridgeProcessor {
    fn args_with(&self, extra: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
        self.credential_args.iter().cloned().chain(extra).collect()
    }
}

impl DrmProcessor for BridgeProcessor {
    type Item = BridgeItem;

    fn username(&self) -> &str {
        &self.username
    }

    fn fulfill(&mut self, acsm_file: &Path, notify: bool) -> Result<BridgeItem> {
        let mut extra: Vec<OsString> = vec!["--acsm".into(), acsm_file.as_os_str().to_owned()];
        if !notify {
            extra.push("--no-notify".into());
        }
        self.bridge.call("fulfill", &self.args_with(extra), None)
    }

    fn download(&mut self, item: &BridgeItem, path: &Path, resume: bool) -> Result<ItemType> {
        let mut extra: Vec<OsString> = vec!["--output".into(), path.as_os_str().to_owned()];
        if resume {
            extra.push("--resume".into());
        }
        let input = serde_json::to_vec(item)?;
        let response: DownloadResponse =
            self.bridge
                .call("download", &self.args_with(extra), Some(&input))?;
        Ok(response.item_type)
    }

    fn export_private_license_key(&mut self, path: &Path) -> Result<()> {
        let extra: Vec<OsString> = vec!["--output".into(), path.as_os_str().to_owned()];
        let _: IgnoredAny = self.bridge.call("export-key", &self.args_with(extra), None)?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Writing a script while another test forks can leave it busy (ETXTBSY)
    static SPAWN_LOCK: Mutex<()> = Mutex::new(());

    const FAKE_ENGINE: &str = r#"#!/bin/sh
[ "$1" = "--log-level" ] || exit 9
shift 2
cmd="$1"; shift
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift ;;
    --acsm) acsm="$2"; shift ;;
    --no-notify) nonotify=1 ;;
    --resume) resume=1 ;;
  esac
  shift
done
case "$cmd" in
  version) echo '{"version": "0.8.7"}' ;;
  open) echo '{"username": "reader@example.com"}' ;;
  fulfill)
    if [ -n "$nonotify" ]; then title="quiet"; else title="My Book/Vol.1"; fi
    echo "{\"metadata\": {\"title\": \"$title\"}, \"loan_token\": {\"id\": \"abc123\"}, \"state\": {\"acsm\": \"$acsm\"}}" ;;
  download)
    cat > "$out"
    if [ -n "$resume" ]; then echo '{"type": "PDF"}'; else echo '{"type": "EPUB"}'; fi ;;
  export-key) printf 'DER' > "$out"; echo '{}' ;;
  *) exit 3 ;;
esac
"#;

    fn write_engine(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("engine.sh");
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn credentials(dir: &Path) -> CredentialFiles {
        CredentialFiles::in_directory(dir)
    }

    #[test]
    fn test_version_and_open() {
        let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = TempDir::new().unwrap();
        let bridge = EngineBridge::new(Some(write_engine(temp_dir.path(), FAKE_ENGINE)), 2);

        assert_eq!(bridge.version().unwrap(), "0.8.7");
        let processor = bridge.open(&credentials(temp_dir.path())).unwrap();
        assert_eq!(processor.username(), "reader@example.com");
    }

    #[test]
    fn test_fulfill_and_download() {
        let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = TempDir::new().unwrap();
        let bridge = EngineBridge::new(Some(write_engine(temp_dir.path(), FAKE_ENGINE)), 0);
        let mut processor = bridge.open(&credentials(temp_dir.path())).unwrap();

        let item = processor.fulfill(Path::new("book.acsm"), true).unwrap();
        assert_eq!(item.title(), "My Book/Vol.1");
        assert_eq!(item.metadata("author"), "");
        assert_eq!(item.loan_token().map(LoanToken::id), Some("abc123"));

        let quiet = processor.fulfill(Path::new("book.acsm"), false).unwrap();
        assert_eq!(quiet.title(), "quiet");

        let out = temp_dir.path().join("download");
        assert_eq!(processor.download(&item, &out, false).unwrap(), ItemType::Epub);
        assert_eq!(processor.download(&item, &out, true).unwrap(), ItemType::Pdf);

        // The engine receives the item it produced
        let echoed: BridgeItem = serde_json::from_slice(&fs::read(&out).unwrap()).unwrap();
        assert_eq!(echoed, item);
        assert_eq!(echoed.state["acsm"], "book.acsm");
    }

    #[test]
    fn test_large_payload_while_engine_writes_first() {
        let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = TempDir::new().unwrap();
        // Fills the stdout pipe before reading anything from stdin
        let engine = write_engine(
            temp_dir.path(),
            r#"#!/bin/sh
for last; do out="$last"; done
head -c 262144 /dev/zero | tr '\0' ' '
cat > "$out"
echo '{"type": "PDF"}'
"#,
        );
        let bridge = EngineBridge::new(Some(engine), 0);
        let mut processor = BridgeProcessor {
            bridge,
            credential_args: credential_args(&credentials(temp_dir.path())),
            username: String::new(),
        };

        let mut item = BridgeItem::default();
        item.metadata.insert("title".to_string(), "x".repeat(262_144));
        let out = temp_dir.path().join("download");

        assert_eq!(processor.download(&item, &out, false).unwrap(), ItemType::Pdf);
        let echoed: BridgeItem = serde_json::from_slice(&fs::read(&out).unwrap()).unwrap();
        assert_eq!(echoed, item);
    }

    #[test]
    fn test_export_key() {
        let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = TempDir::new().unwrap();
        let bridge = EngineBridge::new(Some(write_engine(temp_dir.path(), FAKE_ENGINE)), 0);
        let mut processor = bridge.open(&credentials(temp_dir.path())).unwrap();

        let key = temp_dir.path().join("key.der");
        processor.export_private_license_key(&key).unwrap();
        assert_eq!(fs::read(&key).unwrap(), b"DER");
    }

    #[test]
    fn test_engine_error_report() {
        let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = TempDir::new().unwrap();
        let engine = write_engine(
            temp_dir.path(),
            "#!/bin/sh\necho '{\"error\": {\"code\": 4352, \"message\": \"Invalid activation file\"}}'\nexit 1\n",
        );
        let bridge = EngineBridge::new(Some(engine), 0);

        match bridge.open(&credentials(temp_dir.path())) {
            Err(DownloaderError::Engine { code, message }) => {
                assert_eq!(code, Some(4352));
                assert_eq!(message, "Invalid activation file");
            }
            other => panic!("expected engine error, got {other:?}"),
        }
    }

    #[test]
    fn test_engine_failure_without_report() {
        let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = TempDir::new().unwrap();
        let engine = write_engine(temp_dir.path(), "#!/bin/sh\nexit 7\n");
        let bridge = EngineBridge::new(Some(engine), 0);

        let err = bridge.version().unwrap_err();
        assert!(err.is_engine_error());
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_invalid_response() {
        let _guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = TempDir::new().unwrap();
        let engine = write_engine(temp_dir.path(), "#!/bin/sh\necho 'not json'\n");
        let bridge = EngineBridge::new(Some(engine), 0);

        assert!(matches!(
            bridge.version(),
            Err(DownloaderError::InvalidEngineResponse(_))
        ));
    }

    #[test]
    fn test_missing_engine() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("no-such-engine");
        let bridge = EngineBridge::new(Some(missing.clone()), 0);

        match bridge.version() {
            Err(DownloaderError::EngineNotFound(path)) => assert_eq!(path, missing),
            other => panic!("expected missing engine, got {other:?}"),
        }
    }

    #[test]
    fn test_default_program() {
        let bridge = EngineBridge::new(None, 0);
        assert_eq!(bridge.program(), Path::new(DEFAULT_ENGINE));
    }
}
