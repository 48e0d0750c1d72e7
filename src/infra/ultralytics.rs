// ============================================================
// Layer 6 — YOLOv5 (Ultralytics) Integration
// ============================================================
// Helpers for driving the external YOLOv5 training script:
//
//   1. render the dataset config it reads (data/kili.yaml)
//   2. build the `python train.py ...` command line
//   3. read the final validation objectness loss back from the
//      results.csv the script writes under <output>/exp/
//
// The script itself is opaque; only these three touch points
// are modelled.

use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    process::Command,
};

pub const DATASET_CONFIG_FILE: &str = "kili.yaml";
pub const RESULTS_CSV: &str         = "results.csv";
pub const LOSS_COLUMN: &str         = "val/obj_loss";

/// Dataset config consumed by YOLOv5's `--data` flag.
#[derive(Debug, Clone, Serialize)]
pub struct YoloDatasetConfig {
    pub path:           String,
    pub train:          String,
    pub val:            String,
    pub nc:             usize,
    pub names:          Vec<String>,
    pub kili_api_key:   String,
    pub project_id:     String,
    pub label_types:    Vec<String>,
    pub max_assets:     Option<usize>,
}

impl YoloDatasetConfig {
    pub fn new(
        data_path:   &Path,
        class_names: Vec<String>,
        api_key:     &str,
        project_id:  &str,
        label_types: Vec<String>,
        max_assets:  Option<usize>,
    ) -> Self {
        Self {
            path:         data_path.display().to_string(),
            train:        "images/train".into(),
            val:          "images/val".into(),
            nc:           class_names.len(),
            names:        class_names,
            kili_api_key: api_key.into(),
            project_id:   project_id.into(),
            label_types,
            max_assets,
        }
    }

    pub fn render(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Cannot render YOLOv5 dataset config")
    }

    /// Render into `<yolov5_dir>/data/kili.yaml` and return that path.
    pub fn write_into(&self, yolov5_dir: &Path) -> Result<PathBuf> {
        let data_dir = yolov5_dir.join("data");
        fs::create_dir_all(&data_dir)?;
        let path = data_dir.join(DATASET_CONFIG_FILE);
        fs::write(&path, self.render()?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        Ok(path)
    }
}

/// `python train.py --data kili.yaml --project <output> --<k> <v> ...`,
/// run from the YOLOv5 checkout.
pub fn train_command(
    python:     &str,
    yolov5_dir: &Path,
    output_dir: &Path,
    extra_args: &BTreeMap<String, String>,
) -> Command {
    let mut cmd = Command::new(python);
    cmd.current_dir(yolov5_dir)
        .arg("train.py")
        .arg("--data")
        .arg(DATASET_CONFIG_FILE)
        .arg("--project")
        .arg(output_dir);
    for (key, value) in extra_args {
        cmd.arg(format!("--{key}")).arg(value);
    }
    cmd
}

/// Last row's `val/obj_loss` from `<output_dir>/exp/results.csv`.
///
/// YOLOv5 pads header names with spaces, so columns are matched
/// after trimming.
pub fn read_final_obj_loss(output_dir: &Path) -> Result<f64> {
    let path = output_dir.join("exp").join(RESULTS_CSV);
    let csv  = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read YOLOv5 results '{}'", path.display()))?;
    parse_last_column(&csv, LOSS_COLUMN)
        .with_context(|| format!("Invalid YOLOv5 results '{}'", path.display()))
}

fn parse_last_column(csv: &str, column: &str) -> Result<f64> {
    let mut lines = csv.lines().filter(|l| !l.trim().is_empty());
    let header    = lines.next().context("results file is empty")?;
    let idx = header
        .split(',')
        .position(|h| h.trim() == column)
        .with_context(|| format!("column '{column}' not found"))?;

    let last = lines.last().context("results file has no data rows")?;
    let cell = last
        .split(',')
        .nth(idx)
        .with_context(|| format!("last row has no '{column}' cell"))?;
    cell.trim()
        .parse::<f64>()
        .with_context(|| format!("'{}' is not a number", cell.trim()))
}
