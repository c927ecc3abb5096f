//! Layered configuration and end-to-end tests for the score command.

use super::helpers::{MODEL_VERSION, Workspace, output_json};
use super::*;
use crate::context::{BuildContextConfig, build_context};
use crate::score::{
    ScoreArgs, ScoreConfig, config_from_layers_for_test, execute_score, run_score_with,
};
use ortho_config::MergeComposer;
use rstest::rstest;
use serde_json::json;
use waypost_core::FeatureName;
use waypost_scorer::{BatchEntry, QualityLevel, ScoreResponse, ScorerConfig};

fn scored(entry: Option<&BatchEntry>) -> &ScoreResponse {
    match entry {
        Some(BatchEntry::Scored(response)) => response,
        other => panic!("expected a scored entry, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_reject_wrongly_typed_values() {
    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "cache_capacity": "plenty" }));

    let err = config_from_layers_for_test(composer.layers())
        .expect_err("invalid config layer should map to CliError::Configuration");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_honour_precedence() {
    let workspace = Workspace::new();
    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({
            "records": workspace.path("from-file.json").as_str(),
            "model": workspace.path("file-model.json").as_str(),
            "nearby_radius_km": 25.0,
            "echo_features": true,
        }),
        None,
    );
    composer.push_environment(json!({
        "model": workspace.path("env-model.json").as_str(),
        "cache_capacity": 64,
    }));
    composer.push_cli(json!({
        "records": workspace.path("from-cli.json").as_str(),
    }));

    let config =
        config_from_layers_for_test(composer.layers()).expect("merged config should build");
    assert_eq!(config.records, workspace.path("from-cli.json"));
    assert_eq!(config.model, workspace.path("env-model.json"));
    assert_eq!(config.scorer.cache_capacity, 64);
    assert!(config.scorer.echo_features);
    assert!((config.scorer.nearby_radius_km - 25.0).abs() < f64::EPSILON);
}

#[rstest]
fn merge_layers_validate_scorer_settings() {
    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({
            "records": "records.json",
            "model": "model.json",
            "region_fallback_km": 0.0,
        }),
        None,
    );
    let err = config_from_layers_for_test(composer.layers()).expect_err("zero radius rejected");
    match err {
        CliError::ScorerSettings(_) => {}
        other => panic!("expected ScorerSettings, found {other:?}"),
    }
}

#[rstest]
fn execute_score_reports_each_record_in_order() {
    let workspace = Workspace::new();
    let config = ScoreConfig {
        records: workspace.records(),
        model: workspace.model(),
        context: Some(workspace.table()),
        output: None,
        scorer: ScorerConfig::default(),
    };

    let report = execute_score(&config).expect("score run should succeed");
    assert_eq!(report.model_version, MODEL_VERSION);
    assert_eq!(report.scored, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.results.len(), 3);

    let refuge = scored(report.results.first());
    assert_eq!(refuge.record_id, "poi_001");
    assert!((refuge.score - 40.0).abs() < 1e-9);
    assert_eq!(refuge.quality_level, QualityLevel::Medium);
    assert!(refuge.features.is_none());
    assert!(!refuge.recommendations.is_empty());

    match report.results.get(1) {
        Some(BatchEntry::Failed {
            index,
            record_id,
            error,
        }) => {
            assert_eq!(*index, 1);
            assert_eq!(record_id, "poi_bad");
            assert!(error.contains("longitude"), "unexpected error: {error}");
        }
        other => panic!("expected a failed entry, found {other:?}"),
    }

    let summit = scored(report.results.get(2));
    assert_eq!(summit.record_id, "poi_002");
    assert!((summit.score - 60.0).abs() < 1e-9);
    assert_eq!(summit.quality_level, QualityLevel::Good);
}

#[rstest]
fn unreadable_and_invalid_records_keep_their_input_index() {
    let workspace = Workspace::new();
    let records = workspace.write_json(
        "mixed.json",
        &json!([
            { "id": "poi_typo", "latitude": "north" },
            { "id": "poi_001", "name": "Refuge", "latitude": 45.85, "longitude": 6.83 },
            { "id": "poi_bad", "latitude": 45.9 },
            { "id": "poi_002", "num_images": 2.0 },
        ]),
    );
    let config = ScoreConfig {
        records,
        model: workspace.model(),
        context: None,
        output: None,
        scorer: ScorerConfig::default(),
    };

    let report = execute_score(&config).expect("score run should succeed");
    assert_eq!((report.scored, report.failed), (2, 2));
    let failures: Vec<(usize, &str)> = report
        .results
        .iter()
        .filter_map(|entry| match entry {
            BatchEntry::Failed {
                index, record_id, ..
            } => Some((*index, record_id.as_str())),
            BatchEntry::Scored(_) => None,
        })
        .collect();
    assert_eq!(failures, vec![(0, "poi_typo"), (2, "poi_bad")]);
    assert_eq!(scored(report.results.get(1)).record_id, "poi_001");
    assert_eq!(scored(report.results.get(3)).record_id, "poi_002");
}

#[rstest]
fn snapshots_feed_spatial_context_into_scoring() {
    let workspace = Workspace::new();
    let snapshot = workspace.path("context/alps.wpct");
    let summary = build_context(&BuildContextConfig {
        table: workspace.table(),
        output: snapshot.clone(),
    })
    .expect("snapshot should be written");
    assert_eq!(summary.regions, 1);
    assert_eq!(summary.records, 2);

    let config = ScoreConfig {
        records: workspace.records(),
        model: workspace.model(),
        context: Some(snapshot),
        output: None,
        scorer: ScorerConfig {
            echo_features: true,
            ..ScorerConfig::default()
        },
    };
    let report = execute_score(&config).expect("score run should succeed");
    let refuge = scored(report.results.first());
    let features = refuge.features.as_ref().expect("features are echoed");
    assert!((features.get(FeatureName::MedianSalary) - 2450.0).abs() < 1e-9);
    assert!((features.get(FeatureName::Population) - 8600.0).abs() < 1e-9);
    assert!((features.get(FeatureName::NearbyCount) - 1.0).abs() < 1e-9);
}

#[rstest]
fn run_score_writes_reports_to_the_output_file() {
    let workspace = Workspace::new();
    let output = workspace.path("out/report.json");
    let args = ScoreArgs {
        records: Some(workspace.records()),
        model: Some(workspace.model()),
        output: Some(output.clone()),
        ..ScoreArgs::default()
    };
    let mut stdout = Vec::new();
    run_score_with(args, &mut stdout).expect("score command should succeed");
    assert!(stdout.is_empty());

    let written = waypost_fs::read_to_string(&output).expect("report written");
    let report = output_json(written.as_bytes());
    assert_eq!(report["scored"], json!(2));
    assert_eq!(report["results"][1]["status"], json!("failed"));
    assert_eq!(report["results"][0]["status"], json!("scored"));
}
