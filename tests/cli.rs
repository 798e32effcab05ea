mod common;

use common::{TestEnv, FAILING_ENGINE};
use predicates::str::contains;
use std::fs;

#[test]
fn help_exits_zero() {
    TestEnv::new()
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("--adept-directory"))
        .stdout(contains("$ADEPT_DIR"));
}

#[test]
fn missing_acsm_and_export_prints_usage() {
    TestEnv::new()
        .cmd()
        .assert()
        .code(255)
        .stdout(contains("Usage"));
}

#[test]
fn export_with_acsm_is_rejected() {
    let env = TestEnv::new();
    env.activate();
    env.cmd()
        .args(["-e", "book.acsm"])
        .assert()
        .code(255)
        .stdout(contains("Usage"));
}

#[test]
fn empty_output_dir_is_rejected() {
    TestEnv::new()
        .cmd()
        .args(["-O", "", "book.acsm"])
        .assert()
        .code(255)
        .stdout(contains("Usage"));
}

#[test]
fn unknown_flag_is_rejected() {
    TestEnv::new()
        .cmd()
        .args(["--bogus", "book.acsm"])
        .assert()
        .code(255)
        .stdout(contains("Usage"));
}

#[test]
fn help_before_unknown_flag_exits_zero() {
    TestEnv::new()
        .cmd()
        .args(["-h", "--bogus"])
        .assert()
        .success()
        .stdout(contains("--adept-directory"));
}

#[test]
fn missing_credentials_are_all_reported() {
    let env = TestEnv::new();
    env.acsm();
    env.cmd()
        .arg("book.acsm")
        .assert()
        .code(255)
        .stdout(contains("Error : device.xml doesn't exists, did you activate your device ?"))
        .stdout(contains("Error : activation.xml doesn't exists"))
        .stdout(contains("Error : devicesalt doesn't exists"));
}

#[test]
fn missing_acsm_file() {
    let env = TestEnv::new();
    env.activate();
    env.cmd()
        .arg("nothing.acsm")
        .assert()
        .code(255)
        .stdout(contains("Error : nothing.acsm doesn't exists"));
}

#[cfg(unix)]
#[test]
fn version_comes_from_engine() {
    TestEnv::new()
        .cmd()
        .arg("-V")
        .assert()
        .success()
        .stdout(contains("Current libgourou version : 0.8.7"));
}

#[cfg(unix)]
#[test]
fn fulfill_downloads_and_records_loan() {
    let env = TestEnv::new();
    env.activate();
    env.acsm();

    env.cmd()
        .args(["-O", "books", "book.acsm"])
        .assert()
        .success()
        .stdout(contains("Created books/My Book_Vol.1.epub"))
        .stdout(contains("Loan token serialized into"));

    assert!(env.root.join("books").join("My Book_Vol.1.epub").exists());
    assert!(!env.root.join("books").join("My Book_Vol.1").exists());

    let record = env.adept.join("Loans").join("6367c48dd193d56e.xml");
    let xml = fs::read_to_string(record).expect("loan record");
    assert!(xml.contains("<id>abc123</id>"));
    assert!(xml.contains("<operatorURL>https://op.example.com</operatorURL>"));
    assert!(xml.contains("<validity>2026-12-01</validity>"));
    assert!(xml.contains("<name>My Book/Vol.1</name>"));
}

#[cfg(unix)]
#[test]
fn explicit_output_file_is_kept() {
    let env = TestEnv::new();
    env.activate();
    env.acsm();

    env.cmd()
        .args(["-o", "mine", "-f", "book.acsm"])
        .assert()
        .success()
        .stdout(contains("Created mine"));

    assert!(env.root.join("mine").exists());
    assert!(!env.root.join("mine.epub").exists());
}

#[cfg(unix)]
#[test]
fn export_private_key() {
    let env = TestEnv::new();
    env.activate();

    env.cmd()
        .args(["-e", "-O", "keys"])
        .assert()
        .success()
        .stdout(contains(
            "Private license key exported to keys/Adobe_PrivateLicenseKey--reader@example.com.der",
        ));

    let key = env
        .root
        .join("keys")
        .join("Adobe_PrivateLicenseKey--reader@example.com.der");
    assert_eq!(fs::read(key).expect("exported key"), b"DER");
    assert!(!env.adept.join("Loans").exists());
}

#[cfg(unix)]
#[test]
fn engine_failure_exits_one() {
    let env = TestEnv::with_engine(FAILING_ENGINE);
    env.activate();
    env.acsm();

    env.cmd()
        .arg("book.acsm")
        .assert()
        .code(1)
        .stdout(contains("Invalid activation file"));
}
