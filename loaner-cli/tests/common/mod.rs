//! Common test utilities for CLI integration tests.
//!
//! Provides an isolated data directory per test and helpers that run the
//! `loaner` binary for the common setup steps.

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Environment variables that would leak host settings into a test run.
const ISOLATED_VARS: &[&str] = &[
    "LOANER_DATA_DIR",
    "LOANER_LOG_MODE",
    "LOANER_OUTPUT_FORMAT",
    "LOANER_BUSY_TIMEOUT_MS",
    "LOANER_HIGH_MIN_RAM_GB",
    "LOANER_WORKER_THREADS",
];

/// Test environment with an isolated data directory.
pub struct TestEnv {
    /// Temporary directory (kept alive for the duration of the test)
    #[allow(dead_code)]
    temp_dir: TempDir,
    /// Path to the loaner data directory (not created until `init`)
    pub data_dir: PathBuf,
}

#[allow(dead_code)]
impl TestEnv {
    /// Create a new test environment without initializing it.
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let data_dir = temp_dir.path().join("loaner-data");
        Self { temp_dir, data_dir }
    }

    /// Create a new test environment and run `loaner init` in it.
    pub fn initialized() -> Self {
        let env = Self::new();
        env.command().arg("init").assert().success();
        env
    }

    /// A bare `loaner` command with host settings removed.
    pub fn command_bare(&self) -> Command {
        let mut cmd = Command::cargo_bin("loaner").expect("Failed to find loaner binary");
        for var in ISOLATED_VARS {
            cmd.env_remove(var);
        }
        cmd
    }

    /// A `loaner` command pointed at this environment's data directory.
    pub fn command(&self) -> Command {
        let mut cmd = self.command_bare();
        cmd.arg("--data-dir").arg(&self.data_dir);
        cmd
    }

    /// Path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("loaner.db")
    }

    /// Temporary directory root.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Run a command that must succeed and return its trimmed stdout.
    pub fn run(&self, args: &[&str]) -> String {
        let output = self
            .command()
            .args(args)
            .output()
            .expect("Failed to run loaner");
        assert!(
            output.status.success(),
            "loaner {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout)
            .expect("Invalid UTF-8 in output")
            .trim()
            .to_string()
    }

    /// Register a device with an explicit tier and return its id.
    pub fn add_device(&self, tier: &str) -> i64 {
        let out = self.run(&[
            "device",
            "add",
            "--brand",
            "Dell",
            "--model",
            "Latitude",
            "--capacity-gb",
            "512",
            "--ram-gb",
            "16",
            "--tier",
            tier,
        ]);
        parse_id(&out)
    }

    /// Register a requester and return its id.
    pub fn add_requester(&self, name: &str, tier: &str) -> i64 {
        let out = self.run(&["requester", "add", "--name", name, "--tier", tier]);
        parse_id(&out)
    }

    /// Loan `device` to `requester` and return the reservation id.
    pub fn reserve(&self, device: i64, requester: i64) -> i64 {
        let out = self.run(&[
            "reserve",
            "--device",
            &device.to_string(),
            "--requester",
            &requester.to_string(),
        ]);
        parse_id(&out)
    }

    /// `list` output as JSON.
    pub fn list_json(&self, extra: &[&str]) -> serde_json::Value {
        let mut args = vec!["list", "--format", "json"];
        args.extend_from_slice(extra);
        serde_json::from_str(&self.run(&args)).expect("list output is not JSON")
    }

    /// `queue list` output as JSON.
    pub fn queue_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.run(&["queue", "list", "--format", "json"]))
            .expect("queue output is not JSON")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an id printed alone on stdout.
pub fn parse_id(output: &str) -> i64 {
    output
        .trim()
        .parse()
        .unwrap_or_else(|_| panic!("Output is not an id: {output:?}"))
}
