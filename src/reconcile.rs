use crate::baseline_file::{Baseline, BaselineEntry};
use crate::fingerprint::{ReadError, fingerprint_file};
use crate::paths::TrackedPath;
use crate::store::{BaselineStore, StoreError};
use base64::Engine;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use std::io::ErrorKind;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Read error: {0}")]
    Read(#[from] ReadError),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Digest mismatch for {path}: expected {expected}, got {actual}")]
    DigestMismatch {
        path: TrackedPath,
        expected: String,
        actual: String,
    },
    #[error("Fingerprint mismatch: expected {expected}, got {actual}")]
    FingerprintMismatch { expected: String, actual: String },
}

/// Verdict of a scan for one tracked path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Unchanged,
    Changed,
    Removed,
    /// The file exists but could not be read. Not the same as removed.
    Unknown,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Classification::Unchanged => "unchanged",
            Classification::Changed => "changed",
            Classification::Removed => "removed",
            Classification::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableFile {
    pub path: TrackedPath,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub unchanged: Vec<TrackedPath>,
    pub changed: Vec<TrackedPath>,
    pub removed: Vec<TrackedPath>,
    pub unknown: Vec<UnreadableFile>,
    /// Identifies the set of differences found by this scan.
    ///
    /// Base64-encoded SHA-256 over every path that is not unchanged and its
    /// classification. Passing it back to [`accept_scanned`] guarantees that
    /// what gets accepted is what was shown.
    pub fingerprint: String,
}

impl ScanResult {
    #[cfg(test)]
    pub fn classification_of(&self, path: &TrackedPath) -> Option<Classification> {
        if self.changed.contains(path) {
            Some(Classification::Changed)
        } else if self.removed.contains(path) {
            Some(Classification::Removed)
        } else if self.unknown.iter().any(|u| &u.path == path) {
            Some(Classification::Unknown)
        } else if self.unchanged.contains(path) {
            Some(Classification::Unchanged)
        } else {
            None
        }
    }

    pub fn has_differences(&self) -> bool {
        !(self.changed.is_empty() && self.removed.is_empty() && self.unknown.is_empty())
    }
}

/// Classify every tracked path against its baseline entry.
///
/// For each path `P` with baseline digest `D`:
///
/// * `Removed` - `P` does not exist or is no longer a regular file
/// * `Unchanged` - the current digest of `P` equals `D`
/// * `Changed` - the current digest differs from `D`, or `D` was never captured
/// * `Unknown` - `P` exists but could not be fingerprinted
///
/// Read failures never abort the scan. Tracked paths without an entry (an add
/// still in flight) are skipped. Every bucket is sorted by path.
pub fn classify(tracked: &BTreeSet<TrackedPath>, baseline: &Baseline) -> ScanResult {
    let mut unchanged = Vec::new();
    let mut changed = Vec::new();
    let mut removed = Vec::new();
    let mut unknown = Vec::new();

    for path in tracked {
        let Some(entry) = baseline.get(path) else {
            continue;
        };

        match observe(path, entry) {
            Ok(Observed::Unchanged) => unchanged.push(path.clone()),
            Ok(Observed::Changed) => changed.push(path.clone()),
            Ok(Observed::Removed) => removed.push(path.clone()),
            Err(e) => {
                warn!("Could not read {}: {}", path, e);
                unknown.push(UnreadableFile {
                    path: path.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    unchanged.sort();
    changed.sort();
    removed.sort();
    unknown.sort_by(|a, b| a.path.cmp(&b.path));

    let fingerprint = compute_fingerprint(&changed, &removed, &unknown);

    ScanResult {
        unchanged,
        changed,
        removed,
        unknown,
        fingerprint,
    }
}

enum Observed {
    Unchanged,
    Changed,
    Removed,
}

fn observe(path: &TrackedPath, entry: &BaselineEntry) -> Result<Observed, ReadError> {
    match std::fs::metadata(path.as_path()) {
        Ok(metadata) if !metadata.is_file() => return Ok(Observed::Removed),
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Observed::Removed),
        Err(e) => return Err(ReadError::from_io(path.as_path(), e)),
    }

    match fingerprint_file(path.as_path()) {
        Ok(current) if entry.sha256.as_deref() == Some(current.sha256.as_str()) => {
            Ok(Observed::Unchanged)
        }
        Ok(_) => Ok(Observed::Changed),
        // Vanished between the existence check and opening it.
        Err(ReadError::NotFound(_)) => Ok(Observed::Removed),
        Err(e) => Err(e),
    }
}

/// Classify the store's tracked set against its current baseline.
pub fn scan(store: &BaselineStore) -> ScanResult {
    classify(&store.tracked(), &store.snapshot())
}

fn compute_fingerprint(
    changed: &[TrackedPath],
    removed: &[TrackedPath],
    unknown: &[UnreadableFile],
) -> String {
    let mut differences: Vec<(&TrackedPath, &str)> = changed
        .iter()
        .map(|p| (p, "M"))
        .chain(removed.iter().map(|p| (p, "R")))
        .chain(unknown.iter().map(|u| (&u.path, "?")))
        .collect();
    differences.sort();

    let mut hasher = Sha256::new();
    for (path, code) in differences {
        hash_field(&mut hasher, path.as_str().as_bytes());
        hash_field(&mut hasher, code.as_bytes());
    }

    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Length-prefixed, so paths containing separators cannot collide.
fn hash_field(hasher: &mut Sha256, bytes: &[u8]) {
    let len = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
    hasher.update(len.to_be_bytes());
    hasher.update(bytes);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The entry now holds the freshly computed digest.
    Updated,
    /// The entry was deleted and the path is no longer tracked.
    Removed,
    /// The entry was moved to a new path.
    Renamed,
    /// The baseline already reflected the accepted state.
    NoOp,
}

/// Fold one classification decision into the baseline.
///
/// * `Changed`: recomputes the digest of `path` while holding the store's
///   writer lock, rather than trusting the scan that produced the
///   classification, and stores it. If `expected_digest` is given and differs
///   from the recomputed digest, the file changed again since it was
///   inspected and nothing is written.
/// * `Removed`: deletes the entry, which also drops `path` from the tracked
///   set. Accepting a removal for a path that is not tracked is a no-op.
/// * `Unchanged`: nothing to do.
/// * `Unknown`: rejected; there is no observed state to accept.
///
/// Accepting a state the baseline already has is a no-op.
pub fn accept(
    store: &BaselineStore,
    classification: Classification,
    path: &TrackedPath,
    expected_digest: Option<&str>,
) -> Result<AcceptOutcome, ReconcileError> {
    match classification {
        Classification::Unchanged => Ok(AcceptOutcome::NoOp),
        Classification::Unknown => Err(ReconcileError::InvalidOperation(format!(
            "cannot accept unknown state of {path}"
        ))),
        Classification::Removed => {
            let outcome = store.mutate(|baseline| {
                Ok::<_, ReconcileError>(match baseline.remove(path) {
                    Some(_) => AcceptOutcome::Removed,
                    None => AcceptOutcome::NoOp,
                })
            })?;
            if outcome == AcceptOutcome::Removed {
                info!("Removed {} from the baseline", path);
            }
            Ok(outcome)
        }
        Classification::Changed => {
            let outcome = store.mutate(|baseline| -> Result<_, ReconcileError> {
                let Some(entry) = baseline.get_mut(path) else {
                    return Err(not_tracked(path));
                };

                // Hashed under the writer lock, so a concurrent accept of the
                // same path can never commit an older digest after this one.
                let fresh = fingerprint_file(path.as_path())?.sha256;
                if let Some(expected) = expected_digest
                    && expected != fresh
                {
                    return Err(ReconcileError::DigestMismatch {
                        path: path.clone(),
                        expected: expected.to_string(),
                        actual: fresh,
                    });
                }

                if entry.sha256.as_deref() == Some(fresh.as_str()) {
                    return Ok(AcceptOutcome::NoOp);
                }
                *entry = BaselineEntry::accepted(fresh);
                Ok(AcceptOutcome::Updated)
            })?;
            if outcome == AcceptOutcome::Updated {
                info!("Accepted new content of {}", path);
            }
            Ok(outcome)
        }
    }
}

/// Move the entry of `from` to `to`, keeping its digest.
///
/// Renames are never detected; this only applies one the caller knows about.
/// Repeating a rename that already happened is a no-op.
pub fn rename(
    store: &BaselineStore,
    from: &TrackedPath,
    to: &TrackedPath,
) -> Result<AcceptOutcome, ReconcileError> {
    let outcome = store.mutate(|baseline| {
        if from == to {
            return if baseline.contains_key(from) {
                Ok(AcceptOutcome::NoOp)
            } else {
                Err(not_tracked(from))
            };
        }

        match (baseline.contains_key(from), baseline.contains_key(to)) {
            (false, true) => Ok(AcceptOutcome::NoOp),
            (false, false) => Err(not_tracked(from)),
            (true, true) => Err(ReconcileError::InvalidOperation(format!(
                "{to} is already tracked"
            ))),
            (true, false) => {
                if let Some(entry) = baseline.remove(from) {
                    baseline.insert(to.clone(), entry.renamed());
                }
                Ok(AcceptOutcome::Renamed)
            }
        }
    })?;

    if outcome == AcceptOutcome::Renamed {
        info!("Renamed {} to {}", from, to);
    }
    Ok(outcome)
}

/// Which paths of a scan [`accept_scanned`] should accept.
#[derive(Debug, Clone)]
pub enum Selection {
    /// Every changed and removed path.
    All,
    Paths(Vec<TrackedPath>),
}

impl Selection {
    fn includes(&self, path: &TrackedPath) -> bool {
        match self {
            Selection::All => true,
            Selection::Paths(paths) => paths.contains(path),
        }
    }
}

#[derive(Debug, Default)]
pub struct AcceptSummary {
    pub updated: Vec<TrackedPath>,
    pub removed: Vec<TrackedPath>,
    /// Selected paths whose state could not be determined.
    pub skipped: Vec<TrackedPath>,
}

/// Scan, then accept the classification of every selected path in a single
/// baseline write.
///
/// If `expected_fingerprint` is given it must match the fingerprint of the
/// fresh scan, otherwise nothing is accepted. Changed files are fingerprinted
/// again under the writer lock before their digest is stored; files that
/// cannot be read at that point are skipped like files the scan classified as
/// unknown.
pub fn accept_scanned(
    store: &BaselineStore,
    selection: &Selection,
    expected_fingerprint: Option<&str>,
) -> Result<AcceptSummary, ReconcileError> {
    if let Selection::Paths(paths) = selection
        && let Some(untracked) = paths.iter().find(|p| !store.is_tracked(p))
    {
        return Err(not_tracked(untracked));
    }

    let scanned = scan(store);

    // Compared against the fresh scan: that is the state about to be accepted.
    if let Some(expected) = expected_fingerprint
        && scanned.fingerprint != expected
    {
        return Err(ReconcileError::FingerprintMismatch {
            expected: expected.to_string(),
            actual: scanned.fingerprint,
        });
    }

    let mut summary = AcceptSummary::default();

    let changed: Vec<TrackedPath> = scanned
        .changed
        .iter()
        .filter(|p| selection.includes(p))
        .cloned()
        .collect();

    let removals: Vec<TrackedPath> = scanned
        .removed
        .iter()
        .filter(|p| selection.includes(p))
        .cloned()
        .collect();

    for unreadable in scanned.unknown.iter().filter(|u| selection.includes(&u.path)) {
        warn!("Skipping {}: {}", unreadable.path, unreadable.reason);
        summary.skipped.push(unreadable.path.clone());
    }

    store.mutate(|baseline| {
        // Digests are recomputed under the writer lock, as in `accept`.
        for path in &changed {
            let Some(entry) = baseline.get_mut(path) else {
                continue;
            };
            match fingerprint_file(path.as_path()) {
                Ok(current) if entry.sha256.as_deref() == Some(current.sha256.as_str()) => {}
                Ok(current) => {
                    *entry = BaselineEntry::accepted(current.sha256);
                    summary.updated.push(path.clone());
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path, e);
                    summary.skipped.push(path.clone());
                }
            }
        }
        for path in &removals {
            if baseline.remove(path).is_some() {
                summary.removed.push(path.clone());
            }
        }
        Ok::<_, ReconcileError>(())
    })?;

    summary.skipped.sort();

    Ok(summary)
}

fn not_tracked(path: &TrackedPath) -> ReconcileError {
    ReconcileError::InvalidOperation(format!("{path} is not tracked"))
}

#[cfg(test)]
mod tests;
