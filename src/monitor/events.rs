//! Directory change events, independent of the notification backend.

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirEventKind {
    Created,
    Modified,
    Deleted,
    Moved { to: PathBuf },
}

/// A raw change reported for an entry of a watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEvent {
    pub kind: DirEventKind,
    pub path: PathBuf,
}

impl DirEvent {
    pub fn new(kind: DirEventKind, path: impl Into<PathBuf>) -> Self {
        DirEvent {
            kind,
            path: path.into(),
        }
    }

    /// Split into per-path transitions.
    ///
    /// A move carries no identity across paths: it is a deletion of the old
    /// path followed by a creation of the new one.
    pub fn transitions(self) -> Vec<(PathBuf, TransitionKind)> {
        match self.kind {
            DirEventKind::Created => vec![(self.path, TransitionKind::Created)],
            DirEventKind::Modified => vec![(self.path, TransitionKind::Modified)],
            DirEventKind::Deleted => vec![(self.path, TransitionKind::Deleted)],
            DirEventKind::Moved { to } => vec![
                (self.path, TransitionKind::Deleted),
                (to, TransitionKind::Created),
            ],
        }
    }
}

/// A settled, logical change of one tracked path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Created,
    Modified,
    Deleted,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransitionKind::Created => "created",
            TransitionKind::Modified => "modified",
            TransitionKind::Deleted => "deleted",
        })
    }
}

/// Translate a notify event into directory events.
///
/// Access and metadata-only events carry no content change and are dropped.
/// Backends that report the two halves of a rename separately yield a
/// deletion for the source and a creation for the destination.
pub fn from_notify(event: notify::Event) -> Vec<DirEvent> {
    let notify::Event { kind, paths, .. } = event;

    let kind = match kind {
        EventKind::Create(_) => DirEventKind::Created,
        EventKind::Remove(_) => DirEventKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = paths.into_iter();
            return match (paths.next(), paths.next()) {
                (Some(from), Some(to)) => {
                    vec![DirEvent::new(DirEventKind::Moved { to }, from)]
                }
                (Some(only), None) => vec![DirEvent::new(DirEventKind::Modified, only)],
                _ => Vec::new(),
            };
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => DirEventKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => DirEventKind::Created,
        // Direction unknown; settling checks whether the path still exists.
        EventKind::Modify(ModifyKind::Name(_)) => DirEventKind::Modified,
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => DirEventKind::Modified,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };

    paths
        .into_iter()
        .map(|path| DirEvent::new(kind.clone(), path))
        .collect()
}
