//! The baseline store: sole owner of the durable baseline record.
//!
//! All writes go through [`BaselineStore::mutate`], which serializes writers,
//! computes the complete new map in private, persists it atomically and only
//! then publishes it. Readers ([`BaselineStore::snapshot`] and friends) see
//! either the state before or after a mutation, never a mix.

use crate::baseline_file::{Baseline, BaselineEntry, BaselineFile, RecordError};
use crate::paths::TrackedPath;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const RECORD_FILENAME: &str = "baseline.toml";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Baseline record error: {0}")]
    Record(#[from] RecordError),
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to preserve unreadable baseline {path}: {source}")]
    Preserve {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not determine a per-user data directory")]
    NoDataDir,
}

/// How [`load`] obtained the baseline.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The record existed and was read.
    Loaded,
    /// There was no record; an empty one was created.
    Created,
    /// The record could not be interpreted. It was copied to `backup` and an
    /// empty baseline is used instead. Callers should warn the user.
    Recovered { error: RecordError, backup: PathBuf },
}

pub struct Loaded {
    pub baseline: Baseline,
    pub outcome: LoadOutcome,
}

/// Default location of the record in the per-user application data directory.
pub fn default_record_path() -> Result<PathBuf, StoreError> {
    let dirs =
        directories::ProjectDirs::from("", "", "integriward").ok_or(StoreError::NoDataDir)?;
    Ok(dirs.data_dir().join(RECORD_FILENAME))
}

/// Read the record at `path`.
///
/// A missing record is created empty. An unreadable record is never
/// overwritten before a copy of it has been preserved next to it.
pub fn load(path: &Path) -> Result<Loaded, StoreError> {
    match BaselineFile::load(path) {
        Ok(file) => {
            debug!(
                "Loaded {} baseline entries from {}",
                file.entries.len(),
                path.display()
            );
            Ok(Loaded {
                baseline: file.entries,
                outcome: LoadOutcome::Loaded,
            })
        }
        Err(RecordError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            BaselineFile::new(Baseline::new()).save(path)?;
            info!("Created empty baseline at {}", path.display());
            Ok(Loaded {
                baseline: Baseline::new(),
                outcome: LoadOutcome::Created,
            })
        }
        Err(e) if e.is_format_error() => {
            let backup = preserve_unreadable(path)?;
            debug!("Copied unreadable baseline to {}", backup.display());
            Ok(Loaded {
                baseline: Baseline::new(),
                outcome: LoadOutcome::Recovered { error: e, backup },
            })
        }
        Err(e) => Err(e.into()),
    }
}

fn preserve_unreadable(path: &Path) -> Result<PathBuf, StoreError> {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| RECORD_FILENAME.into());
    name.push(format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%.fZ")));
    let backup = path.with_file_name(name);

    std::fs::copy(path, &backup).map_err(|source| StoreError::Preserve {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(backup)
}

pub struct BaselineStore {
    path: PathBuf,
    published: RwLock<Baseline>,
    writer: Mutex<()>,
    pending: Mutex<BTreeSet<TrackedPath>>,
}

impl BaselineStore {
    pub fn open(path: &Path) -> Result<(Self, LoadOutcome), StoreError> {
        let loaded = load(path)?;
        let store = BaselineStore {
            path: path.to_path_buf(),
            published: RwLock::new(loaded.baseline),
            writer: Mutex::new(()),
            pending: Mutex::new(BTreeSet::new()),
        };
        Ok((store, loaded.outcome))
    }

    /// Location of the durable record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `f` to the baseline and persist the result.
    ///
    /// `f` works on a private copy. Nothing is published if `f` fails or the
    /// record cannot be written, so the in-memory state stays the last state
    /// that was successfully persisted. A map that `f` leaves unchanged is
    /// not rewritten.
    pub fn mutate<T, E>(&self, f: impl FnOnce(&mut Baseline) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let _writer = self.writer.lock();

        let mut next = self.published.read().clone();
        let value = f(&mut next)?;

        if *self.published.read() == next {
            debug!("Baseline unchanged, skipping write");
            return Ok(value);
        }

        let file = BaselineFile::new(next);
        file.save(&self.path).map_err(|e| E::from(StoreError::from(e)))?;
        debug!(
            "Wrote {} baseline entries to {}",
            file.entries.len(),
            self.path.display()
        );
        *self.published.write() = file.entries;

        Ok(value)
    }

    /// Copy of the current baseline.
    pub fn snapshot(&self) -> Baseline {
        self.published.read().clone()
    }

    pub fn entry(&self, path: &TrackedPath) -> Option<BaselineEntry> {
        self.published.read().get(path).cloned()
    }

    /// Baseline entries in path order.
    pub fn list(&self) -> Vec<(TrackedPath, BaselineEntry)> {
        self.published
            .read()
            .iter()
            .map(|(path, entry)| (path.clone(), entry.clone()))
            .collect()
    }

    pub fn is_tracked(&self, path: &TrackedPath) -> bool {
        self.published.read().contains_key(path) || self.pending.lock().contains(path)
    }

    /// Baseline keys plus paths whose first capture is still in flight.
    pub fn tracked(&self) -> BTreeSet<TrackedPath> {
        let mut tracked: BTreeSet<TrackedPath> = self.published.read().keys().cloned().collect();
        tracked.extend(self.pending.lock().iter().cloned());
        tracked
    }

    /// Mark `paths` as tracked until the returned guard is dropped.
    pub fn track_pending(&self, paths: impl IntoIterator<Item = TrackedPath>) -> PendingGuard<'_> {
        let paths: Vec<TrackedPath> = paths.into_iter().collect();
        self.pending.lock().extend(paths.iter().cloned());
        PendingGuard { store: self, paths }
    }
}

pub struct PendingGuard<'a> {
    store: &'a BaselineStore,
    paths: Vec<TrackedPath>,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.store.pending.lock();
        for path in &self.paths {
            pending.remove(path);
        }
    }
}
