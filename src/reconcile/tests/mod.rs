use super::*;
use crate::baseline_file::EntryStatus;
use crate::tracking::{add_directory_tree, add_path};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn open_store(temp: &TempDir) -> BaselineStore {
    let (store, _) = BaselineStore::open(&temp.path().join("state/baseline.toml")).unwrap();
    store
}

/// Write `content` to `name` under the temp dir and start tracking it.
fn track_file(store: &BaselineStore, temp: &TempDir, name: &str, content: &str) -> TrackedPath {
    let file = temp.path().join(name);
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&file, content).unwrap();
    add_path(store, &file).unwrap().path
}

fn tracked_path(path: &Path) -> TrackedPath {
    TrackedPath::normalize(path).unwrap()
}

mod accept_tests;
