// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `classify` and `detect`, and all
// their configurable flags.
//
// Every artifact lives under --root (or $LABEL_SWEEP_HOME,
// falling back to <platform cache dir>/label-sweep).
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::{collections::BTreeMap, path::PathBuf};

use crate::application::{
    detection_use_case::DetectionRequest,
    label_errors_use_case::PipelineRequest,
};
use crate::cleaning::ranker::RankingCriterion;
use crate::infra::paths::JobIdentity;
use crate::ml::trainer::TrainerSettings;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Image classification: train, predict, or rank likely label errors
    Classify(ClassifyArgs),

    /// Object detection: train a YOLOv5 model
    Detect(DetectArgs),
}

/// Root directory for all cached data and models.
pub fn default_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("label-sweep")
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum CriterionArg {
    NormalizedMargin,
    SelfConfidence,
}

impl From<CriterionArg> for RankingCriterion {
    fn from(c: CriterionArg) -> Self {
        match c {
            CriterionArg::NormalizedMargin => RankingCriterion::NormalizedMargin,
            CriterionArg::SelfConfidence   => RankingCriterion::SelfConfidence,
        }
    }
}

/// All arguments for the `classify` command.
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Root directory for data, models and probability files
    #[arg(long, env = "LABEL_SWEEP_HOME")]
    pub root: Option<PathBuf>,

    #[arg(long)]
    pub project_id: String,

    #[arg(long, default_value = "CLASSIFICATION_JOB")]
    pub job_name: String,

    #[arg(long, default_value = "burn-cnn")]
    pub model_repository: String,

    /// File name of the persisted model (train-only / predict-only)
    #[arg(long, default_value = "image_classifier")]
    pub model_name: String,

    /// JSON manifest of assets to import before loading the dataset
    #[arg(long)]
    pub assets: Option<PathBuf>,

    // ── Mode (exactly one) ───────────────────────────────────────────────────
    /// Train once on an 80/20 split and save the model
    #[arg(long)]
    pub only_train: bool,

    /// Load the saved model and predict every example
    #[arg(long)]
    pub only_predict: bool,

    /// Number of cross-validation folds used to rank label errors
    #[arg(long)]
    pub cv_folds: Option<usize>,

    // ── Pipeline options ─────────────────────────────────────────────────────
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Seed for fold assignment and the train/validation split
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, value_enum, default_value_t = CriterionArg::NormalizedMargin)]
    pub criterion: CriterionArg,

    /// Skip folds whose probabilities are already on disk for this partition
    #[arg(long)]
    pub reuse_cached_folds: bool,

    /// Print at most this many suspicious assets (all by default)
    #[arg(long)]
    pub top: Option<usize>,

    // ── Trainer tuning ───────────────────────────────────────────────────────
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Images are resized to image_size × image_size
    #[arg(long, default_value_t = 64)]
    pub image_size: usize,

    #[arg(long, default_value_t = 16)]
    pub base_filters: usize,

    #[arg(long, default_value_t = 0.2)]
    pub dropout: f64,

    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,
}

impl ClassifyArgs {
    pub fn resolved_root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(default_root)
    }

    pub fn job(&self) -> JobIdentity {
        JobIdentity::new(&self.project_id, &self.job_name, &self.model_repository)
    }
}

/// The application layer never sees clap types.
impl From<&ClassifyArgs> for PipelineRequest {
    fn from(a: &ClassifyArgs) -> Self {
        PipelineRequest {
            root_dir:           a.resolved_root(),
            job:                a.job(),
            model_name:         a.model_name.clone(),
            epochs:             a.epochs,
            cv_folds:           a.cv_folds,
            seed:               a.seed,
            only_train:         a.only_train,
            only_predict:       a.only_predict,
            criterion:          a.criterion.into(),
            reuse_cached_folds: a.reuse_cached_folds,
            assets:             a.assets.clone(),
        }
    }
}

impl From<&ClassifyArgs> for TrainerSettings {
    fn from(a: &ClassifyArgs) -> Self {
        TrainerSettings {
            batch_size:    a.batch_size,
            learning_rate: a.lr,
            image_size:    a.image_size,
            base_filters:  a.base_filters,
            dropout:       a.dropout,
            num_workers:   a.num_workers,
            shuffle_seed:  a.seed,
        }
    }
}

/// All arguments for the `detect` command.
#[derive(Args, Debug)]
pub struct DetectArgs {
    #[arg(long, env = "LABEL_SWEEP_HOME")]
    pub root: Option<PathBuf>,

    #[arg(long)]
    pub project_id: String,

    #[arg(long, default_value = "OBJECT_DETECTION_JOB")]
    pub job_name: String,

    #[arg(long, default_value = "ultralytics")]
    pub model_repository: String,

    #[arg(long, default_value = "pytorch")]
    pub model_framework: String,

    /// Checkout of the YOLOv5 repository (contains train.py)
    #[arg(long, default_value = "utils/ultralytics/yolov5")]
    pub yolov5_dir: PathBuf,

    #[arg(long, default_value = "python")]
    pub python: String,

    /// Class names, in label order
    #[arg(long = "class", required = true)]
    pub classes: Vec<String>,

    /// Forwarded to the dataset config for asset download
    #[arg(long, env = "KILI_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,

    #[arg(long = "label-type", default_values = ["DEFAULT", "REVIEW"])]
    pub label_types: Vec<String>,

    #[arg(long)]
    pub max_assets: Option<usize>,

    /// Extra train.py argument as KEY=VALUE (repeatable), e.g. --train-arg epochs=50
    #[arg(long = "train-arg", value_parser = parse_key_value)]
    pub train_args: Vec<(String, String)>,

    /// Delete the cached dataset before training
    #[arg(long)]
    pub clear_dataset_cache: bool,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

impl From<DetectArgs> for DetectionRequest {
    fn from(a: DetectArgs) -> Self {
        DetectionRequest {
            root_dir:            a.root.unwrap_or_else(default_root),
            job:                 JobIdentity::new(a.project_id, a.job_name, a.model_repository),
            model_framework:     a.model_framework,
            yolov5_dir:          a.yolov5_dir,
            python:              a.python,
            class_names:         a.classes,
            api_key:             a.api_key,
            label_types:         a.label_types,
            max_assets:          a.max_assets,
            train_args:          a.train_args.into_iter().collect::<BTreeMap<_, _>>(),
            clear_dataset_cache: a.clear_dataset_cache,
        }
    }
}
