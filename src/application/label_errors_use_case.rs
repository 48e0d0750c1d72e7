// ============================================================
// Layer 2 — LabelErrorUseCase
// ============================================================
// Drives the label-error pipeline in one of three modes:
//
//   Train-only      seeded 80/20 split → train → persist model
//   Predict-only    load persisted model → predict every example
//   Cross-validate  for each fold k (in order):
//                     train on fold.train (validated on held-out)
//                     predict fold.held_out
//                     write model_fold_<k>__probs.npy + sidecar
//                   then combine folds → rank → identifiers
//
// Exactly one mode must be selected; the check happens before
// anything touches disk.
//
// A fold whose trainer or predictor fails is logged and skipped
// (ExternalTrainingFailure); later folds still run. Aggregation
// then reports the first skipped fold as missing. Any other
// error stops the run.
//
// Predict-only persists nothing.
//
// Reference: Northcutt et al. (2021) Confident Learning

use anyhow::{Context, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::cleaning::{
    aggregator::{combine_folds, top1_accuracy},
    ranker::{identifiers_for, rank_label_issues, RankingCriterion},
};
use crate::data::{
    loader::AssetManifest,
    splitter::{fold_fingerprint, split_train_val, stratified_k_fold},
};
use crate::domain::{
    example::LabeledDataset,
    fold::Fold,
    traits::{DatasetProvider, DatasetSplit, Predictor, TrainJob, Trainer},
    PipelineError,
};
use crate::infra::{
    artifacts::{FoldArtifactMeta, FoldArtifactStore},
    metrics::{FoldMetrics, MetricsLogger},
    paths::{ArtifactPaths, JobIdentity},
};

/// Fraction of examples used for training in train-only mode.
pub const TRAIN_FRACTION: f64 = 0.8;

// ─── Pipeline Request ─────────────────────────────────────────────────────────
// Saved as JSON next to the artifacts of every train-only and
// cross-validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub root_dir:           PathBuf,
    pub job:                JobIdentity,
    pub model_name:         String,
    pub epochs:             usize,
    pub cv_folds:           Option<usize>,
    pub seed:               u64,
    pub only_train:         bool,
    pub only_predict:       bool,
    pub criterion:          RankingCriterion,
    /// Skip folds whose artifact already matches the current partition
    pub reuse_cached_folds: bool,
    /// Optional asset manifest imported into the data directory first
    pub assets:             Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    TrainOnly,
    PredictOnly,
    CrossValidate { folds: usize },
}

impl PipelineRequest {
    pub fn paths(&self) -> ArtifactPaths {
        ArtifactPaths::new(&self.root_dir, self.job.clone())
    }

    /// The single selected mode, or `AmbiguousModeSelection`.
    pub fn mode(&self) -> Result<PipelineMode, PipelineError> {
        let cv = self.cv_folds.filter(|&k| k > 0);
        let selected = [self.only_train, self.only_predict, cv.is_some()]
            .iter()
            .filter(|&&s| s)
            .count();

        match (selected, cv) {
            (1, Some(folds))              => Ok(PipelineMode::CrossValidate { folds }),
            (1, None) if self.only_train  => Ok(PipelineMode::TrainOnly),
            (1, None)                     => Ok(PipelineMode::PredictOnly),
            _ => Err(PipelineError::AmbiguousModeSelection { selected }),
        }
    }
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Trained { val_loss: f64, model_path: PathBuf },
    Predicted(Array2<f32>),
    /// Example identifiers, most likely mislabelled first
    Ranked(Vec<String>),
}

// ─── LabelErrorUseCase ────────────────────────────────────────────────────────
pub struct LabelErrorUseCase<D, T, P> {
    provider:  D,
    trainer:   T,
    predictor: P,
}

impl<D, T, P> LabelErrorUseCase<D, T, P>
where
    D: DatasetProvider,
    T: Trainer,
    P: Predictor<Model = T::Model>,
{
    pub fn new(provider: D, trainer: T, predictor: P) -> Self {
        Self { provider, trainer, predictor }
    }

    pub fn execute(&self, req: &PipelineRequest) -> Result<PipelineOutcome> {
        let mode  = req.mode()?;
        let paths = req.paths();

        // ── Step 1: Import assets ─────────────────────────────────────────────
        // Predict-only leaves the artifact tree untouched
        if let Some(manifest) = &req.assets {
            if mode == PipelineMode::PredictOnly {
                tracing::warn!("Ignoring asset manifest '{}' in predict-only mode", manifest.display());
            } else {
                AssetManifest::load(manifest)?.materialize(&paths.resolve_data_dir()?)?;
            }
        }

        // ── Step 2: Load dataset ──────────────────────────────────────────────
        let dataset = self.provider.load()?;
        let found   = dataset.distinct_labels();
        if found < 2 {
            return Err(PipelineError::InsufficientClasses { found }.into());
        }
        tracing::info!(
            "Loaded {} examples in {} classes ({:?})",
            dataset.len(),
            dataset.num_classes(),
            mode,
        );

        match mode {
            PipelineMode::TrainOnly => {
                record_request(req, &paths)?;
                self.train_only(req, &paths, &dataset)
            }
            PipelineMode::PredictOnly => self.predict_only(req, &paths, &dataset),
            PipelineMode::CrossValidate { folds } => {
                record_request(req, &paths)?;
                self.cross_validate(req, &paths, &dataset, folds)
            }
        }
    }

    fn train_only(
        &self,
        req:     &PipelineRequest,
        paths:   &ArtifactPaths,
        dataset: &LabeledDataset,
    ) -> Result<PipelineOutcome> {
        let (train, validation) = split_train_val(dataset.examples.clone(), TRAIN_FRACTION, req.seed);
        let split = DatasetSplit { train, validation };

        let trained = self
            .trainer
            .train(&TrainJob {
                epochs:      req.epochs,
                model_name:  &req.model_name,
                class_names: &dataset.class_names,
                split:       &split,
            })
            .map_err(|e| PipelineError::training_failure("train-only", &e))?;

        let model_path = paths.resolve_model_path(&req.model_name)?;
        self.trainer.persist(&trained.model, &model_path)?;

        tracing::info!("Training finished: val_loss={:.4}", trained.loss);
        Ok(PipelineOutcome::Trained { val_loss: trained.loss, model_path })
    }

    fn predict_only(
        &self,
        req:     &PipelineRequest,
        paths:   &ArtifactPaths,
        dataset: &LabeledDataset,
    ) -> Result<PipelineOutcome> {
        let model = self.predictor.load(&paths.model_path(&req.model_name))?;
        let probs = self.predictor.predict(&model, &dataset.examples)?;
        tracing::info!(
            "Predicted {:?}; top-1 accuracy against given labels {:.3}",
            probs.dim(),
            top1_accuracy(probs.view(), &dataset.labels()),
        );
        Ok(PipelineOutcome::Predicted(probs))
    }

    fn cross_validate(
        &self,
        req:     &PipelineRequest,
        paths:   &ArtifactPaths,
        dataset: &LabeledDataset,
        k:       usize,
    ) -> Result<PipelineOutcome> {
        let labels      = dataset.labels();
        let num_classes = dataset.num_classes();
        let folds       = stratified_k_fold(&labels, k, req.seed)?;
        let fingerprint = fold_fingerprint(&labels, k, req.seed);
        let store       = FoldArtifactStore::new(paths);
        let metrics     = MetricsLogger::new(paths.fold_metrics_path())?;

        let mut skipped: Vec<(usize, String)> = Vec::new();
        for fold in &folds {
            if req.reuse_cached_folds && store.is_cached(fold, &fingerprint, num_classes) {
                tracing::info!("Fold {}/{}: reusing cached probabilities", fold.number + 1, k);
                continue;
            }

            match self.run_fold(req, &store, &metrics, dataset, fold, k, &fingerprint) {
                Ok(()) => {}
                Err(e) if is_training_failure(&e) => {
                    tracing::warn!("Fold {}/{} skipped: {:#}", fold.number + 1, k, e);
                    skipped.push((fold.number, format!("{e:#}")));
                }
                Err(e) => return Err(e),
            }
        }

        // ── Aggregate ─────────────────────────────────────────────────────────
        // A skipped fold may still have a file from an earlier run with the
        // same partition; it must not stand in for this run's result.
        if let Some((fold, reason)) = skipped.into_iter().next() {
            return Err(PipelineError::MissingOrMalformedFoldArtifact {
                fold,
                path:   paths.fold_probs_path(fold),
                reason: format!("not produced by this run ({reason})"),
            }
            .into());
        }
        combine_folds(&labels, &folds, paths, num_classes, &fingerprint)?;
        let pyx    = store.read_final()?;
        let ranked = rank_label_issues(&labels, pyx.view(), req.criterion)?;
        let ids    = identifiers_for(&dataset.examples, &ranked);

        tracing::info!(
            "Ranked {} examples; most suspicious: {:?}",
            ids.len(),
            ids.iter().take(5).collect::<Vec<_>>(),
        );
        Ok(PipelineOutcome::Ranked(ids))
    }

    #[allow(clippy::too_many_arguments)]
    fn run_fold(
        &self,
        req:         &PipelineRequest,
        store:       &FoldArtifactStore<'_>,
        metrics:     &MetricsLogger,
        dataset:     &LabeledDataset,
        fold:        &Fold,
        k:           usize,
        fingerprint: &str,
    ) -> Result<()> {
        tracing::info!(
            "Fold {}/{}: {} train, {} held out",
            fold.number + 1,
            k,
            fold.train.len(),
            fold.holdout_len(),
        );

        let held_out = dataset.subset(&fold.held_out);
        let split    = DatasetSplit {
            train:      dataset.subset(&fold.train),
            validation: held_out.clone(),
        };

        let trained = self
            .trainer
            .train(&TrainJob {
                epochs:      req.epochs,
                model_name:  &req.model_name,
                class_names: &dataset.class_names,
                split:       &split,
            })
            .map_err(|e| PipelineError::training_failure(format!("fold {}", fold.number), &e))?;

        let stage = format!("fold {}", fold.number);
        let probs = self
            .predictor
            .predict(&trained.model, &held_out)
            .map_err(|e| PipelineError::training_failure(stage.as_str(), &e))?;
        if probs.nrows() != held_out.len() {
            let mismatch = PipelineError::ShapeMismatch { rows: probs.nrows(), labels: held_out.len() };
            return Err(PipelineError::training_failure(stage, &mismatch.into()).into());
        }

        let meta = FoldArtifactMeta {
            fold:        fold.number,
            num_folds:   k,
            seed:        req.seed,
            rows:        probs.nrows(),
            classes:     probs.ncols(),
            fingerprint: fingerprint.to_string(),
        };
        store.write_fold(&meta, &probs)?;

        let held_labels: Vec<usize> = held_out.iter().map(|e| e.label).collect();
        metrics.log(&FoldMetrics::new(
            fold.number,
            fold.train.len(),
            fold.holdout_len(),
            trained.loss,
            top1_accuracy(probs.view(), &held_labels),
        ))?;
        Ok(())
    }
}

/// Save the request as JSON next to the artifacts it produces.
fn record_request(req: &PipelineRequest, paths: &ArtifactPaths) -> Result<()> {
    let request_path = ArtifactPaths::ensure_parent(paths.request_path())?;
    fs::write(&request_path, serde_json::to_string_pretty(req)?)
        .with_context(|| format!("Cannot write '{}'", request_path.display()))?;
    Ok(())
}

fn is_training_failure(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::ExternalTrainingFailure { .. })
    )
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{example::Example, traits::TrainedModel};
    use std::{cell::RefCell, collections::HashSet, path::Path};

    // ── Fakes ─────────────────────────────────────────────────────────────────
    struct FakeProvider(LabeledDataset);

    impl DatasetProvider for FakeProvider {
        fn load(&self) -> Result<LabeledDataset> {
            Ok(self.0.clone())
        }
    }

    /// The "model" is the set of example ids to contradict: everything
    /// else is predicted as its own label with probability 0.9.
    #[derive(Clone, Default)]
    struct FakeModel {
        flip: HashSet<String>,
    }

    #[derive(Default)]
    struct FakeTrainer {
        flip:       HashSet<String>,
        fail_folds: HashSet<usize>,
        calls:      RefCell<usize>,
    }

    impl Trainer for FakeTrainer {
        type Model = FakeModel;

        fn train(&self, job: &TrainJob<'_>) -> Result<TrainedModel<FakeModel>> {
            let call = *self.calls.borrow();
            *self.calls.borrow_mut() += 1;
            if self.fail_folds.contains(&call) {
                anyhow::bail!("trainer crashed");
            }
            assert!(!job.split.train.is_empty());
            Ok(TrainedModel { model: FakeModel { flip: self.flip.clone() }, loss: 0.25 })
        }

        fn persist(&self, _model: &FakeModel, path: &Path) -> Result<()> {
            fs::write(path, "fake")?;
            Ok(())
        }
    }

    struct FakePredictor {
        classes:    usize,
        fail_calls: HashSet<usize>,
        calls:      RefCell<usize>,
    }

    impl FakePredictor {
        fn failing_on(calls: &[usize]) -> Self {
            Self {
                classes:    2,
                fail_calls: calls.iter().copied().collect(),
                calls:      RefCell::new(0),
            }
        }
    }

    impl Predictor for FakePredictor {
        type Model = FakeModel;

        fn load(&self, path: &Path) -> Result<FakeModel> {
            anyhow::ensure!(path.is_file(), "no model at '{}'", path.display());
            Ok(FakeModel::default())
        }

        fn predict(&self, model: &FakeModel, examples: &[Example]) -> Result<Array2<f32>> {
            let call = *self.calls.borrow();
            *self.calls.borrow_mut() += 1;
            if self.fail_calls.contains(&call) {
                anyhow::bail!("predictor crashed");
            }
            let mut probs = Array2::<f32>::from_elem((examples.len(), self.classes), 0.1 / (self.classes - 1) as f32);
            for (row, ex) in examples.iter().enumerate() {
                let predicted = if model.flip.contains(&ex.id) {
                    (ex.label + 1) % self.classes
                } else {
                    ex.label
                };
                probs[[row, predicted]] = 0.9;
            }
            Ok(probs)
        }
    }

    fn dataset(labels: &[usize]) -> LabeledDataset {
        let examples = labels
            .iter()
            .enumerate()
            .map(|(i, &l)| Example::from_path(format!("data/c{l}/img_{i:02}.jpg"), l, i))
            .collect();
        LabeledDataset::new(examples, vec!["cat".into(), "dog".into()])
    }

    fn request(root: &Path) -> PipelineRequest {
        PipelineRequest {
            root_dir:           root.to_path_buf(),
            job:                JobIdentity::new("proj", "CLASSIFICATION_JOB", "pytorchvision"),
            model_name:         "efficientnet_b0".into(),
            epochs:             1,
            cv_folds:           None,
            seed:               42,
            only_train:         false,
            only_predict:       false,
            criterion:          RankingCriterion::NormalizedMargin,
            reuse_cached_folds: false,
            assets:             None,
        }
    }

    fn use_case(
        labels:  &[usize],
        trainer: FakeTrainer,
    ) -> LabelErrorUseCase<FakeProvider, FakeTrainer, FakePredictor> {
        LabelErrorUseCase::new(FakeProvider(dataset(labels)), trainer, FakePredictor::failing_on(&[]))
    }

    const TEN_LABELS: [usize; 10] = [0, 1, 0, 1, 0, 1, 0, 1, 0, 1];

    // ── Tests ─────────────────────────────────────────────────────────────────
    #[test]
    fn test_mode_selection_requires_exactly_one() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path());
        assert!(matches!(req.mode(), Err(PipelineError::AmbiguousModeSelection { selected: 0 })));

        req.cv_folds = Some(0);
        assert!(req.mode().is_err());

        req.only_train = true;
        assert_eq!(req.mode().unwrap(), PipelineMode::TrainOnly);

        req.cv_folds = Some(5);
        assert!(matches!(req.mode(), Err(PipelineError::AmbiguousModeSelection { selected: 2 })));

        req.only_train = false;
        assert_eq!(req.mode().unwrap(), PipelineMode::CrossValidate { folds: 5 });
    }

    #[test]
    fn test_ambiguous_mode_does_no_work() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path());
        req.only_train   = true;
        req.only_predict = true;

        let uc  = use_case(&TEN_LABELS, FakeTrainer::default());
        let err = uc.execute(&req).unwrap_err();
        assert!(err.downcast_ref::<PipelineError>().is_some());
        assert_eq!(*uc.trainer.calls.borrow(), 0);
        assert!(!dir.path().join("proj").exists());
    }

    #[test]
    fn test_single_class_is_rejected_before_training() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path());
        req.cv_folds = Some(2);

        let uc  = use_case(&[1, 1, 1, 1], FakeTrainer::default());
        let err = uc.execute(&req).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InsufficientClasses { found: 1 })
        ));
        assert_eq!(*uc.trainer.calls.borrow(), 0);
    }

    #[test]
    fn test_cross_validation_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path());
        req.cv_folds = Some(5);

        // img_03 is "mislabelled": every model disagrees with its label
        let trainer = FakeTrainer {
            flip: ["img_03".to_string()].into_iter().collect(),
            ..FakeTrainer::default()
        };
        let uc = use_case(&TEN_LABELS, trainer);

        let ids = match uc.execute(&req).unwrap() {
            PipelineOutcome::Ranked(ids) => ids,
            other => panic!("unexpected outcome {other:?}"),
        };
        assert_eq!(*uc.trainer.calls.borrow(), 5);

        // Every fold held out exactly 2 examples
        let paths = req.paths();
        let store = FoldArtifactStore::new(&paths);
        for k in 0..5 {
            let probs = ndarray_npy::read_npy::<_, Array2<f32>>(paths.fold_probs_path(k)).unwrap();
            assert_eq!(probs.nrows(), 2);
        }
        assert_eq!(store.read_final().unwrap().dim(), (10, 2));

        // Ranking is a permutation with the flipped example first
        assert_eq!(ids.len(), 10);
        assert_eq!(ids[0], "img_03");
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), 10);

        assert!(paths.request_path().is_file());
        let csv = fs::read_to_string(paths.fold_metrics_path()).unwrap();
        assert_eq!(csv.lines().count(), 6);
    }

    #[test]
    fn test_failed_fold_surfaces_at_aggregation() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path());
        req.cv_folds = Some(5);

        let trainer = FakeTrainer {
            fail_folds: [2].into_iter().collect(),
            ..FakeTrainer::default()
        };
        let uc  = use_case(&TEN_LABELS, trainer);
        let err = uc.execute(&req).unwrap_err();

        // The remaining folds still ran
        assert_eq!(*uc.trainer.calls.borrow(), 5);
        let typed = err.downcast_ref::<PipelineError>().unwrap();
        assert_eq!(typed.fold(), Some(2));
        assert!(!req.paths().final_probs_path().exists());
    }

    #[test]
    fn test_cached_folds_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path());
        req.cv_folds = Some(5);

        let uc = use_case(&TEN_LABELS, FakeTrainer::default());
        uc.execute(&req).unwrap();
        assert_eq!(*uc.trainer.calls.borrow(), 5);

        req.reuse_cached_folds = true;
        uc.execute(&req).unwrap();
        assert_eq!(*uc.trainer.calls.borrow(), 5);
    }

    #[test]
    fn test_train_then_predict() {
        let dir = tempfile::tempdir().unwrap();
        let uc  = use_case(&TEN_LABELS, FakeTrainer::default());

        let mut req = request(dir.path());
        req.only_predict = true;
        assert!(uc.execute(&req).is_err(), "nothing persisted yet");

        req.only_predict = false;
        req.only_train   = true;
        match uc.execute(&req).unwrap() {
            PipelineOutcome::Trained { val_loss, model_path } => {
                assert_eq!(val_loss, 0.25);
                assert_eq!(model_path, req.paths().model_path("efficientnet_b0"));
                assert!(model_path.is_file());
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        req.only_train   = false;
        req.only_predict = true;
        match uc.execute(&req).unwrap() {
            PipelineOutcome::Predicted(probs) => assert_eq!(probs.dim(), (10, 2)),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_failed_prediction_skips_fold_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path());
        req.cv_folds = Some(5);

        let uc = LabelErrorUseCase::new(
            FakeProvider(dataset(&TEN_LABELS)),
            FakeTrainer::default(),
            FakePredictor::failing_on(&[1]),
        );
        let err = uc.execute(&req).unwrap_err();

        // Every fold still trained and predicted
        assert_eq!(*uc.trainer.calls.borrow(), 5);
        assert_eq!(*uc.predictor.calls.borrow(), 5);
        assert_eq!(err.downcast_ref::<PipelineError>().unwrap().fold(), Some(1));
        assert!(!req.paths().fold_probs_path(1).exists());
        assert!(req.paths().fold_probs_path(4).exists());
        assert!(!req.paths().final_probs_path().exists());
    }

    #[test]
    fn test_earlier_artifact_does_not_fill_a_failed_fold() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path());
        req.cv_folds = Some(5);

        use_case(&TEN_LABELS, FakeTrainer::default()).execute(&req).unwrap();
        assert!(req.paths().fold_probs_path(2).exists());

        let trainer = FakeTrainer {
            fail_folds: [2].into_iter().collect(),
            ..FakeTrainer::default()
        };
        let err = use_case(&TEN_LABELS, trainer).execute(&req).unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::MissingOrMalformedFoldArtifact { fold, reason, .. }) => {
                assert_eq!(*fold, 2);
                assert!(reason.contains("not produced by this run"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_predict_only_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let uc  = use_case(&TEN_LABELS, FakeTrainer::default());

        let mut req = request(dir.path());
        req.only_train = true;
        uc.execute(&req).unwrap();

        let paths = req.paths();
        fs::remove_file(paths.request_path()).unwrap();
        fn listing(dir: &Path) -> Vec<PathBuf> {
            let mut entries: Vec<PathBuf> = fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
            entries.sort();
            entries
        }
        let before = listing(&paths.model_dir());

        req.only_train   = false;
        req.only_predict = true;
        req.assets       = Some(dir.path().join("manifest.json"));
        uc.execute(&req).unwrap();

        assert_eq!(listing(&paths.model_dir()), before);
        assert!(!paths.request_path().exists());
        assert!(!paths.data_dir().exists());
    }
}
