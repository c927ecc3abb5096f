//! Test helpers writing model artefacts, records and reference tables.

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Value, json};
use tempfile::TempDir;
use waypost_core::{FEATURE_COUNT, FeatureCategory, FeatureName};

/// Version written into generated model artefacts.
pub(super) const MODEL_VERSION: &str = "cli-test-v1";

/// Temporary directory holding the inputs of one test.
#[derive(Debug)]
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    /// Linear model: 20 + 10 per completeness flag, so name + GPS scores 40.
    pub(super) fn model(&self) -> Utf8PathBuf {
        let coefficients: Vec<f64> = FeatureName::ALL
            .iter()
            .map(|name| {
                if name.category() == FeatureCategory::Completeness {
                    10.0
                } else {
                    0.0
                }
            })
            .collect();
        let importances: Vec<f64> = (0..FEATURE_COUNT)
            .map(|index| if index == 2 { 0.5 } else { 0.03 })
            .collect();
        let artefact = json!({
            "model_version": MODEL_VERSION,
            "feature_names": FeatureName::ALL.iter().map(|name| name.as_str()).collect::<Vec<_>>(),
            "model": { "type": "linear", "intercept": 20.0, "coefficients": coefficients },
            "metrics": { "r2": 0.91, "mae": 4.2 },
            "feature_importances": importances,
        });
        self.write_json("model.json", &artefact)
    }

    /// Two valid records and one with a latitude but no longitude.
    pub(super) fn records(&self) -> Utf8PathBuf {
        let records = json!([
            {
                "id": "poi_001",
                "name": "Refuge du Lac Blanc",
                "latitude": 45.85,
                "longitude": 6.83,
            },
            { "id": "poi_bad", "name": "Half located", "latitude": 45.9 },
            {
                "id": "poi_002",
                "name": "Aiguille du Midi",
                "description": "Cable car summit station.",
                "latitude": 45.8785,
                "longitude": 6.8874,
                "images": ["midi.jpg"],
            },
        ]);
        self.write_json("records.json", &records)
    }

    /// Two valid records around one whose image count is not a number.
    pub(super) fn mistyped_records(&self) -> Utf8PathBuf {
        let records = json!([
            {
                "id": "poi_001",
                "name": "Refuge du Lac Blanc",
                "latitude": 45.85,
                "longitude": 6.83,
            },
            { "id": "poi_typo", "name": "Chalet", "num_images": "many" },
            { "id": "poi_002", "name": "Aiguille du Midi", "num_images": 3.0 },
        ]);
        self.write_json("records.json", &records)
    }

    pub(super) fn table(&self) -> Utf8PathBuf {
        let table = json!({
            "regions": [
                { "region_id": "74056", "centroid_lat": 45.923, "centroid_lon": 6.869,
                  "median_salary": 2450.0, "population": 8600.0 },
            ],
            "records": [
                { "id": "poi_001", "latitude": 45.85, "longitude": 6.83 },
                { "id": "poi_002", "latitude": 45.8785, "longitude": 6.8874 },
            ],
        });
        self.write_json("table.json", &table)
    }

    pub(super) fn write_json(&self, name: &str, value: &Value) -> Utf8PathBuf {
        let path = self.path(name);
        write_utf8(&path, value.to_string().as_bytes());
        path
    }
}

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    waypost_fs::write_file(path, contents).expect("write test input");
}

/// Parse captured command output.
pub(super) fn output_json(buffer: &[u8]) -> Value {
    serde_json::from_slice(buffer).expect("command output is JSON")
}
