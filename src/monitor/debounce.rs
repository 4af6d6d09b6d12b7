//! Per-path coalescing of event bursts.
//!
//! The debouncer owns no clock and no thread: callers pass `now` in, which
//! keeps every decision here testable without sleeping.

use super::events::TransitionKind;
use crate::paths::TrackedPath;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

/// Where a watched directory is in settling its tracked paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirState {
    /// Nothing pending.
    Idle,
    /// Events arrived and the quiet window is still open.
    EventPending,
    /// The quiet window has passed; transitions are ready to be delivered.
    Settling,
}

#[derive(Debug)]
struct Pending {
    kind: TransitionKind,
    deadline: Instant,
}

#[derive(Debug)]
pub struct Debouncer {
    quiet_window: Duration,
    pending: BTreeMap<TrackedPath, Pending>,
}

impl Debouncer {
    pub fn new(quiet_window: Duration) -> Self {
        Debouncer {
            quiet_window,
            pending: BTreeMap::new(),
        }
    }

    /// Record an event for `path`, restarting its quiet window.
    pub fn push(&mut self, path: TrackedPath, kind: TransitionKind, now: Instant) {
        let deadline = now + self.quiet_window;
        self.pending
            .entry(path)
            .and_modify(|pending| {
                pending.kind = coalesce(pending.kind, kind);
                pending.deadline = deadline;
            })
            .or_insert(Pending { kind, deadline });
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest instant at which some path settles.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Remove and return every path whose quiet window has passed, in path
    /// order.
    pub fn take_settled(&mut self, now: Instant) -> Vec<(TrackedPath, TransitionKind)> {
        let settled: Vec<TrackedPath> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();

        settled
            .into_iter()
            .filter_map(|path| {
                let pending = self.pending.remove(&path)?;
                let kind = correct_for_existence(&path, pending.kind);
                Some((path, kind))
            })
            .collect()
    }

    /// Remove and return everything, settled or not.
    pub fn drain(&mut self) -> Vec<(TrackedPath, TransitionKind)> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(path, pending)| {
                let kind = correct_for_existence(&path, pending.kind);
                (path, kind)
            })
            .collect()
    }

    /// State of `dir`, derived from the paths pending in it.
    ///
    /// Observational only: delivery is driven per path by
    /// [`Debouncer::take_settled`]. The monitor uses it to log when a
    /// directory becomes busy and when it is quiet again.
    pub fn directory_state(&self, dir: &Path, now: Instant) -> DirState {
        let mut state = DirState::Idle;
        for (path, pending) in &self.pending {
            if path.parent() != Some(dir) {
                continue;
            }
            if pending.deadline <= now {
                return DirState::Settling;
            }
            state = DirState::EventPending;
        }
        state
    }
}

/// Fold a later event into the kind already pending for a path.
fn coalesce(earlier: TransitionKind, later: TransitionKind) -> TransitionKind {
    use TransitionKind::*;

    match (earlier, later) {
        // Replaced by a new file, e.g. an editor's write-then-rename.
        (Deleted, Created) => Modified,
        // Still new, just with different content.
        (Created, Modified) => Created,
        (Modified, Created) => Modified,
        (_, later) => later,
    }
}

/// Backends report kinds that do not match the final state (a deletion
/// while the file is still there, or a modification of a file that is
/// gone). The filesystem has the last word.
fn correct_for_existence(path: &TrackedPath, kind: TransitionKind) -> TransitionKind {
    let exists = path.as_path().is_file();
    match kind {
        TransitionKind::Deleted if exists => TransitionKind::Modified,
        TransitionKind::Created | TransitionKind::Modified if !exists => TransitionKind::Deleted,
        kind => kind,
    }
}
