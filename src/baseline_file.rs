use crate::fingerprint::is_valid_digest;
use crate::paths::TrackedPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Unsupported baseline file version: {0}")]
    UnsupportedVersion(u32),
    #[error("Invalid sha256 for {path}: {digest}")]
    InvalidDigest { path: TrackedPath, digest: String },
}

impl RecordError {
    /// The record exists but its content cannot be interpreted.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            RecordError::TomlParse(_) | RecordError::InvalidDigest { .. }
        )
    }

    fn from_io(path: &Path, e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            RecordError::PermissionDenied(path.to_path_buf())
        } else {
            RecordError::Io(e)
        }
    }
}

/// The last transition folded into an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Captured when the path was first added.
    Added,
    /// Updated by accepting a Changed classification.
    Accepted,
    /// Moved to this path by an explicit rename.
    Renamed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaselineEntry {
    /// Hex encoded. Absent when the file could not be read at capture time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub status: EntryStatus,
    pub recorded_at: DateTime<Utc>,
}

impl BaselineEntry {
    pub fn added(sha256: Option<String>) -> Self {
        BaselineEntry {
            sha256,
            status: EntryStatus::Added,
            recorded_at: Utc::now(),
        }
    }

    pub fn accepted(sha256: String) -> Self {
        BaselineEntry {
            sha256: Some(sha256),
            status: EntryStatus::Accepted,
            recorded_at: Utc::now(),
        }
    }

    pub fn renamed(self) -> Self {
        BaselineEntry {
            status: EntryStatus::Renamed,
            recorded_at: Utc::now(),
            ..self
        }
    }
}

/// Expected digest of every tracked path, ordered by path.
pub type Baseline = BTreeMap<TrackedPath, BaselineEntry>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Metadata {
    version: u32,
}

/// Helper struct to extract only the metadata section from a TOML file,
/// ignoring all other content. Used to check version before parsing the full file.
/// Note: We explicitly do NOT use deny_unknown_fields here, as this struct's
/// purpose is to ignore everything except metadata.
#[derive(Debug, Deserialize)]
struct MetadataOnly {
    metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaselineFile {
    metadata: Metadata,
    #[serde(default)]
    pub entries: Baseline,
}

impl BaselineFile {
    const SUPPORTED_VERSION: u32 = 1;

    pub fn new(entries: Baseline) -> Self {
        BaselineFile {
            metadata: Metadata {
                version: Self::SUPPORTED_VERSION,
            },
            entries,
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, RecordError> {
        // Check the version on its own first, so that a file written by a
        // newer version is reported as such instead of as garbage.
        let metadata_only: MetadataOnly = toml::from_str(content)?;

        if metadata_only.metadata.version != Self::SUPPORTED_VERSION {
            return Err(RecordError::UnsupportedVersion(
                metadata_only.metadata.version,
            ));
        }

        let baseline_file: BaselineFile = toml::from_str(content)?;

        for (path, entry) in &baseline_file.entries {
            if let Some(digest) = &entry.sha256
                && !is_valid_digest(digest)
            {
                return Err(RecordError::InvalidDigest {
                    path: path.clone(),
                    digest: digest.clone(),
                });
            }
        }

        Ok(baseline_file)
    }

    pub fn to_toml(&self) -> Result<String, RecordError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, RecordError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| RecordError::from_io(path, e))?;

        Self::from_toml(&content)
    }

    /// Save the record atomically.
    ///
    /// Writes to a temporary file, fsyncs it, then atomically renames it into
    /// place. A crash at any point leaves either the old or the new record.
    pub fn save(&self, path: &Path) -> Result<(), RecordError> {
        use std::io::Write;

        let content = self.to_toml()?;

        let parent = path.parent().unwrap_or(Path::new("."));

        let mut temp_file = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| RecordError::from_io(parent, e))?;

        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| RecordError::from_io(path, e))?;

        temp_file.as_file().sync_all().map_err(RecordError::Io)?;

        temp_file
            .persist(path)
            .map_err(|e| RecordError::from_io(path, e.error))?;

        Ok(())
    }
}
