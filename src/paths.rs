//! Canonical form of tracked paths.
//!
//! Every key in the baseline and every member of the tracked set is a
//! [`TrackedPath`]: absolute, UTF-8, with `.` and `..` resolved. The existing
//! part of a path is canonicalized through the filesystem (so symlinked
//! directories and platform aliases collapse to one key) while the part that
//! does not exist, e.g. a file that was deleted, is resolved lexically.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("IO error resolving {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8(PathBuf),
    #[error("Path is not absolute and normalized: {0}")]
    NotNormalized(String),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackedPath(String);

impl TrackedPath {
    /// Normalize `path` into its tracked form.
    ///
    /// Relative paths are resolved against the current working directory.
    pub fn normalize(path: &Path) -> Result<Self, PathError> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            let cwd = std::env::current_dir().map_err(|source| PathError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            cwd.join(path)
        };

        let resolved = resolve(&absolute)?;
        let as_str = resolved
            .to_str()
            .ok_or_else(|| PathError::NonUtf8(resolved.clone()))?
            .to_string();

        Ok(TrackedPath(as_str))
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory that has to be watched to observe events for this path.
    pub fn parent(&self) -> Option<&Path> {
        self.as_path().parent()
    }
}

/// Canonicalize the longest existing ancestor of `absolute` and append the rest
/// lexically.
fn resolve(absolute: &Path) -> Result<PathBuf, PathError> {
    let mut last_err = None;

    for ancestor in absolute.ancestors() {
        match ancestor.canonicalize() {
            Ok(canonical) => {
                // ancestors() only yields prefixes of `absolute`.
                let rest = absolute.strip_prefix(ancestor).unwrap_or(Path::new(""));
                return Ok(push_lexically(canonical, rest));
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(PathError::Io {
        path: absolute.to_path_buf(),
        source: last_err.unwrap_or_else(|| std::io::Error::other("path has no root")),
    })
}

fn push_lexically(mut base: PathBuf, rest: &Path) -> PathBuf {
    for component in rest.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                base.pop();
            }
            Component::Normal(name) => base.push(name),
            Component::RootDir | Component::Prefix(_) => {}
        }
    }
    base
}

fn is_normalized(path: &Path) -> bool {
    if !path.is_absolute() {
        return false;
    }
    if path
        .components()
        .any(|c| matches!(c, Component::CurDir | Component::ParentDir))
    {
        return false;
    }
    // Rebuilding from components drops doubled and trailing separators.
    let rebuilt: PathBuf = path.components().collect();
    rebuilt.as_os_str() == path.as_os_str()
}

impl TryFrom<String> for TrackedPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_normalized(Path::new(&value)) {
            Ok(TrackedPath(value))
        } else {
            Err(PathError::NotNormalized(value))
        }
    }
}

impl From<TrackedPath> for String {
    fn from(value: TrackedPath) -> Self {
        value.0
    }
}

impl AsRef<Path> for TrackedPath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl fmt::Display for TrackedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
