//! Persisted reference table snapshot format.
//!
//! A snapshot is a fixed `bincode` header followed by a `bincode` encoded
//! [`ReferenceTable`]. The header is decoded on its own so that files from an
//! incompatible release are rejected before their payload is touched.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use bincode::{deserialize_from, serialize_into};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::reference::{ReferenceTable, ReferenceTableError};

/// File identifier for context snapshots.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"WPCT";

/// Supported version of the snapshot format.
pub const SNAPSHOT_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct SnapshotHeader {
    magic: [u8; 4],
    version: u16,
}

/// Error emitted when loading a context snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot could not be read from disk.
    #[error("failed to read context snapshot from {path}: {source}")]
    Io {
        /// Snapshot location.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The header or payload could not be decoded.
    #[error("failed to decode context snapshot from {path}: {source}")]
    Decode {
        /// Snapshot location.
        path: PathBuf,
        /// Decoder error returned by `bincode`.
        #[source]
        source: bincode::Error,
    },
    /// The file did not start with [`SNAPSHOT_MAGIC`].
    #[error("invalid context snapshot magic: expected {expected:?}, found {found:?}")]
    InvalidMagic {
        /// Expected identifier.
        expected: [u8; 4],
        /// Identifier read from the file.
        found: [u8; 4],
    },
    /// The header names a format version this build cannot read.
    #[error("unsupported context snapshot version {found}; supported version is {supported}")]
    UnsupportedVersion {
        /// Version present in the header.
        found: u16,
        /// Version supported by this build.
        supported: u16,
    },
    /// The decoded table holds invalid entries.
    #[error("context snapshot {path} holds an invalid table: {source}")]
    InvalidTable {
        /// Snapshot location.
        path: PathBuf,
        /// Validation failure.
        #[source]
        source: ReferenceTableError,
    },
}

/// Error emitted when writing a context snapshot.
#[derive(Debug, Error)]
pub enum SnapshotWriteError {
    /// Writing bytes to disk failed.
    #[error("failed to write context snapshot to {path}: {source}")]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The table could not be encoded.
    #[error("failed to encode context snapshot for {path}: {source}")]
    Encode {
        /// Destination path.
        path: PathBuf,
        /// Encoder failure from `bincode`.
        #[source]
        source: bincode::Error,
    },
}

/// Persist `table` as a context snapshot, truncating any existing file.
///
/// # Errors
/// Returns [`SnapshotWriteError`] when the file cannot be created, encoded or
/// flushed.
pub fn write_context_snapshot(
    path: &Path,
    table: &ReferenceTable,
) -> Result<(), SnapshotWriteError> {
    let io_error = |source| SnapshotWriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    let encode_error = |source| SnapshotWriteError::Encode {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    let header = SnapshotHeader {
        magic: SNAPSHOT_MAGIC,
        version: SNAPSHOT_VERSION,
    };
    serialize_into(&mut writer, &header).map_err(encode_error)?;
    serialize_into(&mut writer, table).map_err(encode_error)?;
    writer.flush().map_err(io_error)?;
    writer
        .into_inner()
        .map_err(|err| io_error(err.into_error()))?
        .sync_all()
        .map_err(io_error)
}

/// Load and validate a reference table from a context snapshot.
///
/// # Errors
/// Returns [`SnapshotError`] for unreadable files, foreign or outdated
/// headers, undecodable payloads and tables failing
/// [`ReferenceTable::validate`].
pub fn load_context_snapshot(path: &Path) -> Result<ReferenceTable, SnapshotError> {
    let file = File::open(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let decode_error = |source| SnapshotError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let header: SnapshotHeader = deserialize_from(&mut reader).map_err(decode_error)?;
    if header.magic != SNAPSHOT_MAGIC {
        return Err(SnapshotError::InvalidMagic {
            expected: SNAPSHOT_MAGIC,
            found: header.magic,
        });
    }
    if header.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: header.version,
            supported: SNAPSHOT_VERSION,
        });
    }

    let table: ReferenceTable = deserialize_from(&mut reader).map_err(decode_error)?;
    table
        .validate()
        .map_err(|source| SnapshotError::InvalidTable {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(table)
}
