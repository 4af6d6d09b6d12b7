use assert_cmd::{Command, cargo::cargo_bin_cmd};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Output;
use tempfile::TempDir;

/// A temporary directory holding both the files under test and, in a
/// subdirectory of its own, the baseline record.
pub struct Workspace {
    temp: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Workspace {
            temp: TempDir::new().unwrap(),
        }
    }

    /// Canonical root, matching how tracked paths are printed.
    pub fn root(&self) -> PathBuf {
        self.temp.path().canonicalize().unwrap()
    }

    pub fn baseline(&self) -> PathBuf {
        self.temp.path().join("state").join("baseline.toml")
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.root().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn cmd(&self) -> Command {
        integriward_cmd(&self.baseline())
    }
}

pub fn integriward_cmd(baseline: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("integriward");
    cmd.env_remove("RUST_LOG")
        .env_remove("INTEGRIWARD_BASELINE")
        .arg("--baseline")
        .arg(baseline);
    cmd
}

// Each integration test file is compiled as its own crate, and not all of them
// scan.
#[allow(dead_code)]
pub fn scan_output(workspace: &Workspace, args: &[&str]) -> Output {
    let mut cmd = workspace.cmd();
    cmd.arg("scan").args(args);
    cmd.output().expect("failed to run `integriward scan`")
}

#[allow(dead_code)]
pub fn extract_fingerprint(stdout: &[u8]) -> String {
    let output = std::str::from_utf8(stdout).expect("scan stdout should be UTF-8");
    output
        .lines()
        .find_map(|line| line.strip_prefix("Fingerprint: "))
        .expect("fingerprint not found in output")
        .to_string()
}
