//! Model-info command implementation for the Waypost CLI.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use waypost_scorer::{FeatureImportance, ModelArtifact, ModelMetadata};

use crate::input::{emit_json, require_file};
use crate::{ARG_MODEL, ARG_TOP, CliError, ENV_MODEL_INFO_MODEL};

/// Number of top features reported by default.
pub(crate) const DEFAULT_TOP_FEATURES: usize = 5;

/// CLI arguments for the `model-info` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "model-info",
    about = "Describe a model artefact: version, features, metrics and the \
             most important features"
)]
#[ortho_config(prefix = "WAYPOST")]
pub(crate) struct ModelInfoArgs {
    /// Path to the model artefact (JSON).
    #[arg(long = ARG_MODEL, value_name = "path")]
    #[serde(default)]
    pub(crate) model: Option<Utf8PathBuf>,
    /// How many of the most important features to list.
    #[arg(long = ARG_TOP, value_name = "n")]
    #[serde(default)]
    pub(crate) top: Option<usize>,
}

/// Output document of the `model-info` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ModelReport {
    /// Full model description.
    #[serde(flatten)]
    pub(crate) metadata: ModelMetadata,
    /// Most important features, highest first.
    pub(crate) top_features: Vec<FeatureImportance>,
}

pub(crate) fn run_model_info(args: ModelInfoArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_model_info_with(args, &mut stdout)
}

pub(crate) fn run_model_info_with(
    args: ModelInfoArgs,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let report = describe_model(merged)?;
    emit_json(&report, None, writer)
}

pub(crate) fn describe_model(args: ModelInfoArgs) -> Result<ModelReport, CliError> {
    let path = args.model.ok_or(CliError::MissingArgument {
        field: ARG_MODEL,
        env: ENV_MODEL_INFO_MODEL,
    })?;
    require_file(&path, ARG_MODEL)?;
    let metadata = ModelArtifact::load(&path)?.metadata();
    let top_features = metadata.top_features(args.top.unwrap_or(DEFAULT_TOP_FEATURES));
    Ok(ModelReport {
        metadata,
        top_features,
    })
}
