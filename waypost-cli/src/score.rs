//! Score command implementation for the Waypost CLI.

use std::io::Write;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::{info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use waypost_core::context::load_context_snapshot;
use waypost_core::{PoiRecord, ReferenceTable, SpatialContextProvider, UNKNOWN_RECORD_ID};
use waypost_scorer::{
    BatchEntry, CacheStats, ModelArtifact, ScorerConfig, ScoringContext, ScoringService,
};

use crate::context::parse_reference_table;
use crate::input::{emit_json, read_input, require_file};
use crate::{
    ARG_CACHE_CAPACITY, ARG_CONTEXT, ARG_MODEL, ARG_NEARBY_RADIUS, ARG_OUTPUT, ARG_RECORDS,
    ARG_REGION_FALLBACK, CliError, ENV_SCORE_MODEL, ENV_SCORE_RECORDS,
};

/// CLI arguments for the `score` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "score",
    long_about = "Score POI records against a model artefact. Records are a \
                 JSON array (or a single JSON object). An optional reference \
                 context, either a JSON table or a snapshot written by \
                 build-context, supplies regional indicators and density.",
    about = "Score POI records"
)]
#[ortho_config(prefix = "WAYPOST")]
pub(crate) struct ScoreArgs {
    /// Path to a JSON file of records.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) records: Option<Utf8PathBuf>,
    /// Path to the model artefact (JSON).
    #[arg(long = ARG_MODEL, value_name = "path")]
    #[serde(default)]
    pub(crate) model: Option<Utf8PathBuf>,
    /// Reference context: a JSON table or a `.wpct` snapshot.
    #[arg(long = ARG_CONTEXT, value_name = "path")]
    #[serde(default)]
    pub(crate) context: Option<Utf8PathBuf>,
    /// Write results here instead of stdout.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Radius for counting nearby records.
    #[arg(long = ARG_NEARBY_RADIUS, value_name = "km")]
    #[serde(default)]
    pub(crate) nearby_radius_km: Option<f64>,
    /// Radius searched for the nearest region.
    #[arg(long = ARG_REGION_FALLBACK, value_name = "km")]
    #[serde(default)]
    pub(crate) region_fallback_km: Option<f64>,
    /// Maximum cached results; 0 disables the cache.
    #[arg(long = ARG_CACHE_CAPACITY, value_name = "count")]
    #[serde(default)]
    pub(crate) cache_capacity: Option<u64>,
    /// Reject records without coordinates.
    #[arg(long)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) require_coordinates: bool,
    /// Include feature vectors in the output.
    #[arg(long)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) echo_features: bool,
}

impl ScoreArgs {
    pub(crate) fn into_config(self) -> Result<ScoreConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ScoreConfig::try_from(merged)
    }
}

/// Resolved `score` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScoreConfig {
    /// Records to score.
    pub(crate) records: Utf8PathBuf,
    /// Model artefact.
    pub(crate) model: Utf8PathBuf,
    /// Optional reference context.
    pub(crate) context: Option<Utf8PathBuf>,
    /// Optional output file.
    pub(crate) output: Option<Utf8PathBuf>,
    /// Scoring pipeline settings.
    pub(crate) scorer: ScorerConfig,
}

impl ScoreConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_file(&self.records, ARG_RECORDS)?;
        require_file(&self.model, ARG_MODEL)?;
        if let Some(context) = &self.context {
            require_file(context, ARG_CONTEXT)?;
        }
        Ok(())
    }
}

impl TryFrom<ScoreArgs> for ScoreConfig {
    type Error = CliError;

    fn try_from(args: ScoreArgs) -> Result<Self, Self::Error> {
        let records = args.records.ok_or(CliError::MissingArgument {
            field: ARG_RECORDS,
            env: ENV_SCORE_RECORDS,
        })?;
        let model = args.model.ok_or(CliError::MissingArgument {
            field: ARG_MODEL,
            env: ENV_SCORE_MODEL,
        })?;
        let defaults = ScorerConfig::default();
        let scorer = ScorerConfig {
            nearby_radius_km: args.nearby_radius_km.unwrap_or(defaults.nearby_radius_km),
            region_fallback_km: args.region_fallback_km.unwrap_or(defaults.region_fallback_km),
            cache_capacity: args.cache_capacity.unwrap_or(defaults.cache_capacity),
            require_coordinates: args.require_coordinates,
            echo_features: args.echo_features,
            ..defaults
        };
        scorer.validate()?;
        Ok(Self {
            records,
            model,
            context: args.context,
            output: args.output,
            scorer,
        })
    }
}

/// Output document of the `score` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ScoreReport {
    /// Version of the model used.
    pub(crate) model_version: String,
    /// Records scored successfully.
    pub(crate) scored: usize,
    /// Records rejected.
    pub(crate) failed: usize,
    /// One entry per input record, in input order.
    pub(crate) results: Vec<BatchEntry>,
    /// Cache counters after the run.
    pub(crate) cache: CacheStats,
}

/// A records document element that could not be read as a record.
#[derive(Debug)]
pub(crate) struct RejectedRecord {
    /// The element's `id` string, or [`UNKNOWN_RECORD_ID`].
    pub(crate) record_id: String,
    /// Why deserialisation failed.
    pub(crate) error: serde_json::Error,
}

/// One element of a records document, in input order.
pub(crate) type LoadedRecord = Result<PoiRecord, RejectedRecord>;

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_score_with(args, &mut stdout)
}

pub(crate) fn run_score_with(args: ScoreArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    let report = execute_score(&config)?;
    emit_json(&report, config.output.as_deref(), writer)
}

pub(crate) fn execute_score(config: &ScoreConfig) -> Result<ScoreReport, CliError> {
    let model = ModelArtifact::load(&config.model)?;
    let mut scoring = ScoringContext::for_trained(model).with_config(config.scorer.clone());
    if let Some(path) = &config.context {
        let provider = SpatialContextProvider::from_table(load_reference(path)?);
        scoring = scoring.with_provider(Arc::new(provider));
    }
    let service = ScoringService::new(scoring);
    let records = load_records(&config.records)?;
    let results = score_loaded(&service, records);
    let scored = results.iter().filter(|entry| entry.is_scored()).count();
    let failed = results.len().saturating_sub(scored);
    info!(
        "scored {scored} of {} records with model {}",
        results.len(),
        service.model_info().model_version
    );
    Ok(ScoreReport {
        model_version: service.model_info().model_version.clone(),
        scored,
        failed,
        results,
        cache: service.cache_stats(),
    })
}

/// Scores the readable records and slots rejected ones back in at their
/// input position.
pub(crate) fn score_loaded(service: &ScoringService, loaded: Vec<LoadedRecord>) -> Vec<BatchEntry> {
    let mut slots: Vec<Option<BatchEntry>> = Vec::with_capacity(loaded.len());
    let mut positions = Vec::new();
    let mut records = Vec::new();
    for (index, element) in loaded.into_iter().enumerate() {
        match element {
            Ok(record) => {
                positions.push(index);
                records.push(record);
                slots.push(None);
            }
            Err(rejected) => slots.push(Some(BatchEntry::Failed {
                index,
                record_id: rejected.record_id,
                error: rejected.error.to_string(),
            })),
        }
    }
    for (position, entry) in positions.into_iter().zip(service.score_batch(&records)) {
        if let Some(slot) = slots.get_mut(position) {
            *slot = Some(at_position(entry, position));
        }
    }
    slots.into_iter().flatten().collect()
}

fn at_position(entry: BatchEntry, position: usize) -> BatchEntry {
    match entry {
        BatchEntry::Failed {
            record_id, error, ..
        } => BatchEntry::Failed {
            index: position,
            record_id,
            error,
        },
        scored @ BatchEntry::Scored(_) => scored,
    }
}

/// Loads records from a JSON array or a single JSON object.
///
/// Each element is deserialised on its own, so a mistyped record is
/// returned as a [`RejectedRecord`] instead of failing the document.
pub(crate) fn load_records(path: &Utf8Path) -> Result<Vec<LoadedRecord>, CliError> {
    let text = read_input(path)?;
    let parse_error = |source| CliError::ParseRecords {
        path: path.to_path_buf(),
        source,
    };
    let elements = match serde_json::from_str::<Value>(&text).map_err(parse_error)? {
        Value::Array(elements) => elements,
        single @ Value::Object(_) => vec![single],
        _ => {
            return Err(parse_error(serde::de::Error::custom(
                "expected a JSON array of records or a single record object",
            )));
        }
    };
    Ok(elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| read_record(index, element))
        .collect())
}

fn read_record(index: usize, element: Value) -> LoadedRecord {
    let record_id = element
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .unwrap_or(UNKNOWN_RECORD_ID)
        .to_owned();
    serde_json::from_value(element).map_err(|error| {
        warn!("record {index} ({record_id}) could not be read: {error}");
        RejectedRecord { record_id, error }
    })
}

fn load_reference(path: &Utf8Path) -> Result<ReferenceTable, CliError> {
    if path.extension() == Some("json") {
        parse_reference_table(path)
    } else {
        Ok(load_context_snapshot(path.as_std_path())?)
    }
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ScoreConfig, CliError> {
    let merged = ScoreArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ScoreConfig::try_from(merged)
}
