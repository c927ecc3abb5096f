//! Command-line interface for scoring Waypost records.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod context;
mod error;
mod input;
mod model_info;
mod score;
mod telemetry;

pub use error::CliError;
pub use telemetry::TelemetryError;

use context::{BuildContextArgs, run_build_context};
use model_info::{ModelInfoArgs, run_model_info};
use score::{ScoreArgs, run_score};

pub(crate) const ARG_RECORDS: &str = "records";
pub(crate) const ARG_MODEL: &str = "model";
pub(crate) const ARG_CONTEXT: &str = "context";
pub(crate) const ARG_OUTPUT: &str = "output";
pub(crate) const ARG_TABLE: &str = "table";
pub(crate) const ARG_TOP: &str = "top";
pub(crate) const ARG_NEARBY_RADIUS: &str = "nearby-radius-km";
pub(crate) const ARG_REGION_FALLBACK: &str = "region-fallback-km";
pub(crate) const ARG_CACHE_CAPACITY: &str = "cache-capacity";
pub(crate) const ENV_SCORE_RECORDS: &str = "WAYPOST_CMDS_SCORE_RECORDS";
pub(crate) const ENV_SCORE_MODEL: &str = "WAYPOST_CMDS_SCORE_MODEL";
pub(crate) const ENV_MODEL_INFO_MODEL: &str = "WAYPOST_CMDS_MODEL_INFO_MODEL";
pub(crate) const ENV_BUILD_CONTEXT_TABLE: &str = "WAYPOST_CMDS_BUILD_CONTEXT_TABLE";

/// Run the Waypost CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments, configuration, inputs or output
/// fail.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    telemetry::init(&cli.log_level)?;
    match cli.command {
        Command::Score(args) => run_score(args),
        Command::ModelInfo(args) => run_model_info(args),
        Command::BuildContext(args) => run_build_context(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "waypost",
    about = "Score point-of-interest records for data quality",
    version
)]
struct Cli {
    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, global = true, value_name = "filter", default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Score a JSON file of records against a model artefact.
    Score(ScoreArgs),
    /// Describe a model artefact.
    ModelInfo(ModelInfoArgs),
    /// Convert a JSON reference table into a context snapshot.
    BuildContext(BuildContextArgs),
}

#[cfg(test)]
mod tests;
