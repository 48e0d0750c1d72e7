// ============================================================
// Layer 2 — DetectionUseCase
// ============================================================
// Trains an object-detection model with the external YOLOv5
// script and reports its final validation objectness loss.
//
//   Step 1: Optionally clear the cached dataset     (data/)
//   Step 2: Create the run directory                (model/<fw>/<time>/)
//   Step 3: Render the dataset config               (yolov5/data/kili.yaml)
//   Step 4: Run `python train.py ...`               (subprocess)
//   Step 5: Copy the config into the run directory
//   Step 6: Read exp/results.csv, return val/obj_loss
//
// A crashed training script is logged and the run continues to
// step 6, which fails if no results were written.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::PathBuf,
};

use crate::domain::PipelineError;
use crate::infra::{
    paths::{ArtifactPaths, JobIdentity},
    ultralytics::{read_final_obj_loss, train_command, YoloDatasetConfig, DATASET_CONFIG_FILE},
};

/// Run directory names, e.g. `2024-03-01 14:05:09`.
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRequest {
    pub root_dir:            PathBuf,
    pub job:                 JobIdentity,
    pub model_framework:     String,
    /// Checkout of the YOLOv5 repository (contains train.py)
    pub yolov5_dir:          PathBuf,
    pub python:              String,
    pub class_names:         Vec<String>,
    #[serde(skip_serializing, default)]
    pub api_key:             String,
    pub label_types:         Vec<String>,
    pub max_assets:          Option<usize>,
    /// Passed through as `--<key> <value>`
    pub train_args:          BTreeMap<String, String>,
    pub clear_dataset_cache: bool,
}

pub struct DetectionUseCase {
    request: DetectionRequest,
}

impl DetectionUseCase {
    pub fn new(request: DetectionRequest) -> Self {
        Self { request }
    }

    /// Run one training and return the final `val/obj_loss`.
    pub fn execute(&self) -> Result<f64> {
        let req   = &self.request;
        let paths = ArtifactPaths::new(&req.root_dir, req.job.clone());

        // ── Step 1: Dataset cache ─────────────────────────────────────────────
        let data_dir = paths.data_dir();
        if req.clear_dataset_cache && data_dir.is_dir() {
            tracing::info!("Clearing dataset cache '{}'", data_dir.display());
            fs::remove_dir_all(&data_dir)
                .with_context(|| format!("Cannot clear '{}'", data_dir.display()))?;
        }

        // ── Step 2: Run directory ─────────────────────────────────────────────
        let timestamp  = chrono::Local::now().format(RUN_TIMESTAMP_FORMAT).to_string();
        let output_dir = paths.resolve_framework_run_dir(&req.model_framework, &timestamp)?;

        // ── Step 3: Dataset config ────────────────────────────────────────────
        let config_path = YoloDatasetConfig::new(
            &data_dir,
            req.class_names.clone(),
            &req.api_key,
            &req.job.project_id,
            req.label_types.clone(),
            req.max_assets,
        )
        .write_into(&req.yolov5_dir)?;
        tracing::debug!("Wrote dataset config '{}'", config_path.display());

        // ── Step 4: Train ─────────────────────────────────────────────────────
        tracing::info!("Starting YOLOv5 training into '{}'", output_dir.display());
        let mut cmd = train_command(&req.python, &req.yolov5_dir, &output_dir, &req.train_args);
        tracing::debug!("Running {:?}", cmd);
        if let Err(e) = run_to_completion(&mut cmd) {
            tracing::warn!("YOLOv5 training crashed: {e}");
        }

        // ── Step 5: Keep the config with the run ──────────────────────────────
        fs::copy(&config_path, output_dir.join(DATASET_CONFIG_FILE))
            .with_context(|| format!("Cannot copy '{}'", config_path.display()))?;

        // ── Step 6: Final loss ────────────────────────────────────────────────
        let loss = read_final_obj_loss(&output_dir)?;
        tracing::info!("YOLOv5 final val/obj_loss = {:.5}", loss);
        Ok(loss)
    }
}

fn run_to_completion(cmd: &mut std::process::Command) -> Result<(), PipelineError> {
    let status = cmd.status().map_err(|e| PipelineError::ExternalTrainingFailure {
        stage:   "yolov5".into(),
        message: format!("cannot start: {e}"),
    })?;
    if !status.success() {
        return Err(PipelineError::ExternalTrainingFailure {
            stage:   "yolov5".into(),
            message: format!("exited with {status}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn request(root: &Path, yolov5: &Path, python: &str) -> DetectionRequest {
        DetectionRequest {
            root_dir:            root.to_path_buf(),
            job:                 JobIdentity::new("proj", "OBJECT_DETECTION_JOB", "ultralytics"),
            model_framework:     "pytorch".into(),
            yolov5_dir:          yolov5.to_path_buf(),
            python:              python.into(),
            class_names:         vec!["car".into(), "person".into()],
            api_key:             "secret".into(),
            label_types:         vec!["DEFAULT".into()],
            max_assets:          None,
            train_args:          BTreeMap::new(),
            clear_dataset_cache: true,
        }
    }

    /// `sh train.py ...` runs a script that writes a results file.
    #[cfg(unix)]
    #[test]
    fn test_training_run_reads_final_loss() {
        let root   = tempfile::tempdir().unwrap();
        let yolov5 = tempfile::tempdir().unwrap();
        fs::write(
            yolov5.path().join("train.py"),
            "out=\"$4\"\nmkdir -p \"$out/exp\"\nprintf 'epoch,   val/obj_loss\\n0,0.5\\n1,0.125\\n' > \"$out/exp/results.csv\"\n",
        )
        .unwrap();

        let req   = request(root.path(), yolov5.path(), "sh");
        let paths = ArtifactPaths::new(root.path(), req.job.clone());
        fs::create_dir_all(paths.data_dir().join("stale")).unwrap();

        let loss = DetectionUseCase::new(req).execute().unwrap();
        assert!((loss - 0.125).abs() < 1e-12);
        assert!(!paths.data_dir().exists());

        let yaml = fs::read_to_string(yolov5.path().join("data/kili.yaml")).unwrap();
        assert!(yaml.contains("nc: 2"));

        let runs: Vec<_> = fs::read_dir(paths.model_repository_dir().join("model/pytorch"))
            .unwrap()
            .collect();
        assert_eq!(runs.len(), 1);
        let run = runs[0].as_ref().unwrap().path();
        assert!(run.join(DATASET_CONFIG_FILE).is_file());
    }

    #[test]
    fn test_crashed_training_fails_when_no_results() {
        let root   = tempfile::tempdir().unwrap();
        let yolov5 = tempfile::tempdir().unwrap();
        let req    = request(root.path(), yolov5.path(), "definitely-not-a-python-binary");

        let err = DetectionUseCase::new(req).execute().unwrap_err();
        assert!(format!("{err:#}").contains("results"));
    }
}
