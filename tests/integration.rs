//! Integration tests for the allowsync binary.
//!
//! Tests touching real kernel sets require root privileges and are marked
//! with #[ignore]. Run with: `sudo cargo test --release -- --ignored`

use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

/// Helper to get the path to the compiled binary
fn get_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_allowsync"))
}

/// Check if running as root
fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Run allowsync command and return output
fn run_allowsync(args: &[&str]) -> std::process::Output {
    Command::new(get_binary_path())
        .args(args)
        .env_remove("ALLOWSYNC_API_URL")
        .env_remove("ALLOWSYNC_NAS_NAME")
        .output()
        .expect("Failed to execute allowsync")
}

#[test]
fn test_version_command() {
    let output = run_allowsync(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("allowsync"));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_command() {
    let output = run_allowsync(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("--config"));
    assert!(stdout.contains("--quiet"));
}

#[test]
fn test_invalid_command() {
    let output = run_allowsync(&["invalid-command-xyz"]);
    assert!(!output.status.success());
}

#[test]
fn test_quiet_and_verbose_rejected_together() {
    let output = run_allowsync(&["-q", "-v", "version"]);
    assert!(!output.status.success());
}

#[test]
fn test_run_without_root_is_total_failure() {
    if is_root() {
        eprintln!("Skipping test_run_without_root_is_total_failure: running as root");
        return;
    }

    let output = run_allowsync(&["run", "--config", "/nonexistent/allowsync.yaml"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stderr.contains("root") || stdout.contains("root"),
        "expected a privilege error, got stdout={} stderr={}",
        stdout,
        stderr
    );
}

#[test]
#[ignore] // Requires root
fn test_run_missing_config_is_total_failure() {
    if !is_root() {
        eprintln!("Skipping test_run_missing_config_is_total_failure: requires root");
        return;
    }

    let output = run_allowsync(&["--config", "/nonexistent/allowsync.yaml"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
#[ignore] // Requires root
fn test_run_invalid_config_is_total_failure() {
    if !is_root() {
        eprintln!("Skipping test_run_invalid_config_is_total_failure: requires root");
        return;
    }

    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "api:\n  url: \"ftp://nope\"\ntables: []").unwrap();

    let output = run_allowsync(&["run", "--config", config.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
#[ignore] // Requires root
fn test_run_unreachable_api_is_total_failure() {
    if !is_root() {
        eprintln!("Skipping test_run_unreachable_api_is_total_failure: requires root");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    let yaml = format!(
        "api:\n  url: \"https://127.0.0.1:9/allowlist\"\n  timeout_secs: 1\n\
         state_dir: \"{}\"\nlock_file: \"{}\"\ntables:\n  - name: allowsync_it\n",
        dir.path().join("state").display(),
        dir.path().join("allowsync.lock").display()
    );
    std::fs::write(&config_path, yaml).unwrap();

    let output = run_allowsync(&["-q", "run", "--config", config_path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    // Nothing fetched, nothing persisted
    assert!(!dir.path().join("state/allowsync_it.ipset").exists());
}
