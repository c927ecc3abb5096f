//! Error types emitted by the Waypost CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;
use waypost_core::ReferenceTableError;
use waypost_core::context::{SnapshotError, SnapshotWriteError};
use waypost_scorer::{ConfigError, ModelError};

use crate::telemetry::TelemetryError;

/// Errors emitted by the Waypost CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// Installing the log subscriber failed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name.
        field: &'static str,
        /// Environment variable name.
        env: &'static str,
    },
    /// A referenced input path does not exist.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        /// Flag naming the path.
        field: &'static str,
        /// Path supplied.
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        /// Flag naming the path.
        field: &'static str,
        /// Path supplied.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Flag naming the path.
        field: &'static str,
        /// Path supplied.
        path: Utf8PathBuf,
        /// Source error from std I/O.
        #[source]
        source: std::io::Error,
    },
    /// Scorer settings are out of range.
    #[error("invalid scorer settings: {0}")]
    ScorerSettings(#[from] ConfigError),
    /// The model artefact failed to load.
    #[error(transparent)]
    LoadModel(#[from] ModelError),
    /// Reading an input file failed.
    #[error("failed to read {path:?}: {source}")]
    ReadInput {
        /// Input path.
        path: Utf8PathBuf,
        /// Source error from std I/O.
        #[source]
        source: std::io::Error,
    },
    /// The records file is not valid JSON records.
    #[error("failed to parse records JSON at {path:?}: {source}")]
    ParseRecords {
        /// Records path.
        path: Utf8PathBuf,
        /// Source error from `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// The reference table is not valid JSON.
    #[error("failed to parse reference table JSON at {path:?}: {source}")]
    ParseReferenceTable {
        /// Table path.
        path: Utf8PathBuf,
        /// Source error from `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// The reference table holds unusable values.
    #[error("reference table {path:?} failed validation: {source}")]
    InvalidReferenceTable {
        /// Table path.
        path: Utf8PathBuf,
        /// Validation failure.
        #[source]
        source: ReferenceTableError,
    },
    /// Loading a context snapshot failed.
    #[error(transparent)]
    LoadContext(#[from] SnapshotError),
    /// Writing a context snapshot failed.
    #[error(transparent)]
    WriteContext(#[from] SnapshotWriteError),
    /// Serialising command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
