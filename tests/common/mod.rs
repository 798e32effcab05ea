use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::TempDir;

// Scripts written while another test forks can be busy (ETXTBSY) at exec time
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

/// Engine that answers every call like a working ADEPT setup
pub const FAKE_ENGINE: &str = r#"#!/bin/sh
shift 2
cmd="$1"; shift
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift ;;
  esac
  shift
done
case "$cmd" in
  version) echo '{"version": "0.8.7"}' ;;
  open) echo '{"username": "reader@example.com"}' ;;
  fulfill) echo '{"metadata": {"title": "My Book/Vol.1"}, "loan_token": {"id": "abc123", "operatorURL": "https://op.example.com", "validity": "2026-12-01"}, "state": {}}' ;;
  download) cat > "$out"; echo '{"type": "EPUB"}' ;;
  export-key) printf 'DER' > "$out"; echo '{}' ;;
  *) exit 3 ;;
esac
"#;

/// Engine that rejects the credential files
pub const FAILING_ENGINE: &str = r#"#!/bin/sh
echo '{"error": {"code": 4352, "message": "Invalid activation file"}}'
exit 1
"#;

pub struct TestEnv {
    _tmp: TempDir,
    _guard: MutexGuard<'static, ()>,
    pub root: PathBuf,
    pub adept: PathBuf,
    engine: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_engine(FAKE_ENGINE)
    }

    pub fn with_engine(script: &str) -> Self {
        let guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().to_path_buf();

        let adept = root.join("adept");
        fs::create_dir_all(&adept).expect("create adept dir");
        fs::create_dir_all(root.join("home")).expect("create isolated home");

        let engine = root.join("engine.sh");
        write_script(&engine, script);

        Self {
            _tmp: tmp,
            _guard: guard,
            root,
            adept,
            engine,
        }
    }

    /// Create device.xml, activation.xml and devicesalt
    pub fn activate(&self) -> &Self {
        for name in ["device.xml", "activation.xml", "devicesalt"] {
            fs::write(self.adept.join(name), b"<adept/>").expect("write credential");
        }
        self
    }

    pub fn acsm(&self) -> PathBuf {
        let path = self.root.join("book.acsm");
        fs::write(&path, b"<fulfillmentToken/>").expect("write acsm");
        path
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("acsmdownloader");
        cmd.current_dir(&self.root)
            .env("HOME", self.root.join("home"))
            .env("ADEPT_DIR", &self.adept)
            .env("ADEPT_ENGINE", &self.engine)
            .env_remove("RUST_LOG");
        cmd
    }
}

#[cfg(unix)]
fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    fs::write(path, body).expect("write engine script");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod engine script");
}

#[cfg(not(unix))]
fn write_script(path: &Path, body: &str) {
    fs::write(path, body).expect("write engine script");
}
