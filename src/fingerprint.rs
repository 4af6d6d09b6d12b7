use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Size of the buffer files are streamed through.
const CHUNK_SIZE: usize = 8192;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("File modified during fingerprinting: {0}")]
    ConcurrentModification(PathBuf),
}

impl ReadError {
    pub(crate) fn from_io(path: &Path, e: std::io::Error) -> Self {
        match e.kind() {
            ErrorKind::NotFound => ReadError::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => ReadError::PermissionDenied(path.to_path_buf()),
            _ => ReadError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        }
    }
}

pub struct FileFingerprint {
    /// Hex encoded.
    pub sha256: String,
    /// File size in bytes.
    pub size: u64,
}

/// Computes the SHA-256 digest of a file's content.
///
/// # Behavior
/// - Records the file's modification time before reading
/// - Reads the file in fixed-size chunks so memory use does not depend on
///   the file size
/// - Verifies the modification time hasn't changed after reading
///
/// # Errors
/// Any failure is a [`ReadError`]. Callers treat it as "state unknown", which
/// is distinct from the file having been removed.
/// - `ReadError::NotFound`: the file vanished before it could be opened
/// - `ReadError::PermissionDenied`: insufficient permissions to read the file
/// - `ReadError::Io`: any other I/O failure, including a read failing partway
/// - `ReadError::ConcurrentModification`: the file was detected as being
///   modified while hashing. The absence of this error is *not* a guarantee
///   that the file was *not* modified.
pub fn fingerprint_file(path: &Path) -> Result<FileFingerprint, ReadError> {
    debug!("Fingerprinting {}", path.display());

    let metadata_before = std::fs::metadata(path).map_err(|e| ReadError::from_io(path, e))?;
    let mtime_before = metadata_before
        .modified()
        .map_err(|e| ReadError::from_io(path, e))?;

    let mut file = File::open(path).map_err(|e| ReadError::from_io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let bytes_read = match file.read(&mut buffer) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ReadError::from_io(path, e)),
        };
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let metadata_after = std::fs::metadata(path).map_err(|e| ReadError::from_io(path, e))?;
    let mtime_after = metadata_after
        .modified()
        .map_err(|e| ReadError::from_io(path, e))?;

    if mtime_before != mtime_after {
        return Err(ReadError::ConcurrentModification(path.to_path_buf()));
    }

    let sha256 = format!("{:x}", hasher.finalize());

    debug!("Fingerprint of {} is {}", path.display(), sha256);

    Ok(FileFingerprint {
        sha256,
        size: metadata_after.len(),
    })
}

/// Whether `value` has the shape of a digest produced by [`fingerprint_file`].
pub fn is_valid_digest(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
