use crate::baseline_file::BaselineEntry;
use crate::fingerprint::{ReadError, fingerprint_file};
use crate::paths::{PathError, TrackedPath};
use crate::store::{BaselineStore, StoreError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("Path error: {0}")]
    Path(#[from] PathError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Read error: {0}")]
    Read(#[from] ReadError),
    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Refusing to track the baseline record itself: {0}")]
    RecordItself(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedFile {
    pub path: TrackedPath,
    /// `None` if the file could not be read when it was captured.
    pub sha256: Option<String>,
    /// False if the path already had an entry, which has been re-captured.
    pub newly_tracked: bool,
}

/// Fingerprint `path` and store it as its baseline.
///
/// A path that is already tracked gets its current content as the new
/// baseline. A file that exists but cannot be read is still tracked, without
/// a digest, so the next scan reports it as changed.
pub fn add_path(store: &BaselineStore, path: &Path) -> Result<AddedFile, TrackingError> {
    let tracked = TrackedPath::normalize(path)?;

    if record_path(store).as_ref() == Some(&tracked) {
        return Err(TrackingError::RecordItself(path.to_path_buf()));
    }

    let metadata =
        std::fs::metadata(tracked.as_path()).map_err(|e| ReadError::from_io(path, e))?;
    if !metadata.is_file() {
        return Err(TrackingError::NotAFile(path.to_path_buf()));
    }

    let _pending = store.track_pending([tracked.clone()]);
    let sha256 = capture(&tracked);

    let newly_tracked = store.mutate(|baseline| {
        let newly_tracked = match baseline.get(&tracked) {
            Some(existing) if existing.sha256 == sha256 => return Ok(false),
            Some(_) => false,
            None => true,
        };
        baseline.insert(tracked.clone(), BaselineEntry::added(sha256.clone()));
        Ok::<_, TrackingError>(newly_tracked)
    })?;

    if newly_tracked {
        info!("Tracking {}", tracked);
    } else {
        debug!("Re-captured {}", tracked);
    }

    Ok(AddedFile {
        path: tracked,
        sha256,
        newly_tracked,
    })
}

/// Track every regular file below `root` that is not tracked yet.
///
/// Symlinks are not followed and are never tracked themselves. Entries that
/// cannot be listed are logged and skipped. Returns the number of files that
/// became tracked; all of them are written to the record at once.
pub fn add_directory_tree(store: &BaselineStore, root: &Path) -> Result<usize, TrackingError> {
    let metadata = std::fs::metadata(root).map_err(|e| ReadError::from_io(root, e))?;
    if !metadata.is_dir() {
        return Err(TrackingError::NotADirectory(root.to_path_buf()));
    }

    let record = record_path(store);
    let mut candidates = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let tracked = match TrackedPath::normalize(entry.path()) {
            Ok(tracked) => tracked,
            Err(e) => {
                warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };

        if record.as_ref() == Some(&tracked) || store.is_tracked(&tracked) {
            continue;
        }

        candidates.push(tracked);
    }

    let _pending = store.track_pending(candidates.iter().cloned());

    let captured: Vec<(TrackedPath, Option<String>)> = candidates
        .into_iter()
        .map(|path| {
            let sha256 = capture(&path);
            (path, sha256)
        })
        .collect();

    let added = store.mutate(|baseline| {
        let mut added = 0;
        for (path, sha256) in captured {
            // Something else may have added it while we were hashing.
            if !baseline.contains_key(&path) {
                baseline.insert(path, BaselineEntry::added(sha256));
                added += 1;
            }
        }
        Ok::<_, TrackingError>(added)
    })?;

    info!("Tracking {} new file(s) under {}", added, root.display());

    Ok(added)
}

fn capture(path: &TrackedPath) -> Option<String> {
    match fingerprint_file(path.as_path()) {
        Ok(fingerprint) => {
            debug!("Captured {} ({} bytes)", path, fingerprint.size);
            Some(fingerprint.sha256)
        }
        Err(e) => {
            warn!("Tracking {} without a digest: {}", path, e);
            None
        }
    }
}

fn record_path(store: &BaselineStore) -> Option<TrackedPath> {
    TrackedPath::normalize(store.path()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline_file::EntryStatus;
    use std::fs;
    use tempfile::TempDir;

    fn open_store(temp: &TempDir) -> BaselineStore {
        let (store, _) = BaselineStore::open(&temp.path().join("state/baseline.toml")).unwrap();
        store
    }

    #[test]
    fn test_add_path_records_digest() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let file = temp.path().join("a.txt");
        fs::write(&file, "Hello, world!").unwrap();

        let added = add_path(&store, &file).unwrap();

        assert!(added.newly_tracked);
        assert_eq!(
            added.sha256.as_deref(),
            Some("315f5bdb76d078c43b8ac0064e4a0164612b1fce77c869345bfc94c75894edd3")
        );
        let entry = store.entry(&added.path).unwrap();
        assert_eq!(entry.sha256, added.sha256);
        assert_eq!(entry.status, EntryStatus::Added);
        assert!(!store.is_tracked(&TrackedPath::normalize(&temp.path().join("b.txt")).unwrap()));
    }

    #[test]
    fn test_add_path_twice_recaptures() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let file = temp.path().join("a.txt");
        fs::write(&file, "v1").unwrap();
        let first = add_path(&store, &file).unwrap();

        let again = add_path(&store, &file).unwrap();
        assert!(!again.newly_tracked);
        assert_eq!(again.sha256, first.sha256);

        fs::write(&file, "v2").unwrap();
        let recaptured = add_path(&store, &file).unwrap();
        assert!(!recaptured.newly_tracked);
        assert_ne!(recaptured.sha256, first.sha256);
        assert_eq!(store.entry(&first.path).unwrap().sha256, recaptured.sha256);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_add_path_rejects_directory() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let result = add_path(&store, temp.path());

        assert!(matches!(result, Err(TrackingError::NotAFile(_))));
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_add_path_missing_file() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let result = add_path(&store, &temp.path().join("missing.txt"));

        assert!(matches!(
            result,
            Err(TrackingError::Read(ReadError::NotFound(_)))
        ));
        assert!(store.tracked().is_empty());
    }

    #[test]
    fn test_add_path_rejects_record() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let result = add_path(&store, store.path());

        assert!(matches!(result, Err(TrackingError::RecordItself(_))));
    }

    #[test]
    #[cfg(unix)]
    fn test_add_path_unreadable_file_has_no_digest() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let file = temp.path().join("locked.bin");
        fs::write(&file, "secret").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores file modes.
        if fs::File::open(&file).is_ok() {
            return;
        }

        let added = add_path(&store, &file).unwrap();

        assert!(added.newly_tracked);
        assert_eq!(added.sha256, None);
        assert_eq!(store.entry(&added.path).unwrap().sha256, None);
    }

    #[test]
    fn test_add_directory_tree_counts_new_files() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let root = temp.path().join("tree");
        fs::create_dir_all(root.join("nested/deeper")).unwrap();
        fs::write(root.join("one.txt"), "1").unwrap();
        fs::write(root.join("nested/two.txt"), "2").unwrap();
        fs::write(root.join("nested/deeper/three.txt"), "3").unwrap();

        assert_eq!(add_directory_tree(&store, &root).unwrap(), 3);

        // Already tracked files are skipped.
        fs::write(root.join("four.txt"), "4").unwrap();
        assert_eq!(add_directory_tree(&store, &root).unwrap(), 1);
        assert_eq!(add_directory_tree(&store, &root).unwrap(), 0);
        assert_eq!(store.snapshot().len(), 4);
    }

    #[test]
    fn test_add_directory_tree_skips_record() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        fs::write(temp.path().join("a.txt"), "a").unwrap();

        let added = add_directory_tree(&store, temp.path()).unwrap();

        assert_eq!(added, 1);
        let record = TrackedPath::normalize(store.path()).unwrap();
        assert!(!store.is_tracked(&record));
    }

    #[test]
    fn test_add_directory_tree_rejects_file() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let file = temp.path().join("a.txt");
        fs::write(&file, "a").unwrap();

        let result = add_directory_tree(&store, &file);

        assert!(matches!(result, Err(TrackingError::NotADirectory(_))));
    }

    #[test]
    #[cfg(unix)]
    fn test_add_directory_tree_ignores_symlinks() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let root = temp.path().join("tree");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("real.txt"), "real").unwrap();
        std::os::unix::fs::symlink(root.join("real.txt"), root.join("link.txt")).unwrap();

        assert_eq!(add_directory_tree(&store, &root).unwrap(), 1);
        let tracked: Vec<String> = store.tracked().iter().map(|p| p.to_string()).collect();
        assert_eq!(tracked.len(), 1);
        assert!(tracked[0].ends_with("real.txt"));
    }
}
