//! Build-context command implementation for the Waypost CLI.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use waypost_core::ReferenceTable;
use waypost_core::context::write_context_snapshot;

use crate::input::{emit_json, read_input, require_file};
use crate::{ARG_OUTPUT, ARG_TABLE, CliError, ENV_BUILD_CONTEXT_TABLE};

/// Snapshot path used when `--output` is not given.
pub(crate) const DEFAULT_SNAPSHOT: &str = "context.wpct";

/// CLI arguments for the `build-context` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "build-context",
    long_about = "Validate a JSON reference table of regions and known \
                 records and persist it as a binary context snapshot for \
                 the score command.",
    about = "Build a context snapshot"
)]
#[ortho_config(prefix = "WAYPOST")]
pub(crate) struct BuildContextArgs {
    /// Path to the JSON reference table.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) table: Option<Utf8PathBuf>,
    /// Snapshot destination.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
}

/// Resolved `build-context` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BuildContextConfig {
    /// JSON table to read.
    pub(crate) table: Utf8PathBuf,
    /// Snapshot to write.
    pub(crate) output: Utf8PathBuf,
}

impl TryFrom<BuildContextArgs> for BuildContextConfig {
    type Error = CliError;

    fn try_from(args: BuildContextArgs) -> Result<Self, Self::Error> {
        let table = args.table.ok_or(CliError::MissingArgument {
            field: ARG_TABLE,
            env: ENV_BUILD_CONTEXT_TABLE,
        })?;
        let output = args
            .output
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_SNAPSHOT));
        Ok(Self { table, output })
    }
}

/// Summary printed after a snapshot is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ContextSummary {
    /// Snapshot written.
    pub(crate) output: Utf8PathBuf,
    /// Regions persisted.
    pub(crate) regions: usize,
    /// Known records persisted.
    pub(crate) records: usize,
}

pub(crate) fn run_build_context(args: BuildContextArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_build_context_with(args, &mut stdout)
}

pub(crate) fn run_build_context_with(
    args: BuildContextArgs,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = BuildContextConfig::try_from(merged)?;
    let summary = build_context(&config)?;
    emit_json(&summary, None, writer)
}

pub(crate) fn build_context(config: &BuildContextConfig) -> Result<ContextSummary, CliError> {
    require_file(&config.table, ARG_TABLE)?;
    let table = parse_reference_table(&config.table)?;
    waypost_fs::ensure_parent_dir(&config.output).map_err(CliError::WriteOutput)?;
    write_context_snapshot(config.output.as_std_path(), &table)?;
    info!(
        "wrote {} regions and {} records to {}",
        table.regions.len(),
        table.records.len(),
        config.output
    );
    Ok(ContextSummary {
        output: config.output.clone(),
        regions: table.regions.len(),
        records: table.records.len(),
    })
}

/// Reads and validates a JSON reference table.
pub(crate) fn parse_reference_table(path: &Utf8Path) -> Result<ReferenceTable, CliError> {
    let text = read_input(path)?;
    let table: ReferenceTable =
        serde_json::from_str(&text).map_err(|source| CliError::ParseReferenceTable {
            path: path.to_path_buf(),
            source,
        })?;
    table
        .validate()
        .map_err(|source| CliError::InvalidReferenceTable {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(table)
}
