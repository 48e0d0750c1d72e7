// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `classify` — train-only, predict-only, or cross-validate
//                   and print likely mislabelled assets
//   2. `detect`   — train a YOLOv5 detector, print its final loss
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{ClassifyArgs, Commands, DetectArgs};

use crate::application::label_errors_use_case::PipelineOutcome;
use crate::domain::error::PipelineError;

#[derive(Parser, Debug)]
#[command(
    name = "label-sweep",
    version,
    about = "Train image models and rank likely label errors with cross-validation."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the matching use case; this layer never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Classify(args) => run_classify(args),
            Commands::Detect(args)   => run_detect(args),
        }
    }
}

fn run_classify(args: ClassifyArgs) -> Result<()> {
    use crate::application::label_errors_use_case::{LabelErrorUseCase, PipelineRequest};
    use crate::data::loader::ImageFolderLoader;
    use crate::ml::{predictor::BurnPredictor, trainer::{BurnTrainer, TrainerSettings}};

    let request  = PipelineRequest::from(&args);
    let settings = TrainerSettings::from(&args);
    tracing::info!("Artifacts under '{}'", request.paths().model_repository_dir().display());

    let use_case = LabelErrorUseCase::new(
        ImageFolderLoader::new(request.paths().data_dir()),
        BurnTrainer::wgpu(settings.clone()),
        BurnPredictor::wgpu(settings.batch_size),
    );

    let outcome = use_case.execute(&request).map_err(|e| {
        if let Some(fold) = rerun_hint_fold(&e) {
            tracing::warn!("Fold {fold} has no usable probabilities; rerun with --reuse-cached-folds to retrain only the missing folds");
        }
        e
    })?;

    match outcome {
        PipelineOutcome::Trained { val_loss, model_path } => {
            println!("Training complete. val_loss={val_loss:.4}");
            println!("Model saved to {}", model_path.display());
        }
        PipelineOutcome::Predicted(probs) => {
            println!("Predicted probabilities for {} assets ({} classes)", probs.nrows(), probs.ncols());
            for (i, row) in probs.rows().into_iter().enumerate() {
                println!("{i}\t{row}");
            }
        }
        PipelineOutcome::Ranked(ids) => {
            let shown = args.top.unwrap_or(ids.len()).min(ids.len());
            println!("Assets ranked by likelihood of a wrong label ({shown} of {}):", ids.len());
            for (rank, id) in ids.iter().take(shown).enumerate() {
                println!("{:>4}. {id}", rank + 1);
            }
        }
    }
    Ok(())
}

/// Fold to retry when a run stopped on a missing or malformed artifact.
fn rerun_hint_fold(err: &anyhow::Error) -> Option<usize> {
    err.downcast_ref::<PipelineError>().and_then(PipelineError::fold)
}

fn run_detect(args: DetectArgs) -> Result<()> {
    use crate::application::detection_use_case::DetectionUseCase;

    let loss = DetectionUseCase::new(args.into()).execute()?;
    println!("Training complete. val/obj_loss={loss:.5}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_rerun_hint_names_missing_fold() {
        let missing: anyhow::Error = PipelineError::MissingOrMalformedFoldArtifact {
            fold:   2,
            path:   PathBuf::from("model_fold_2__probs.npy"),
            reason: "not found".into(),
        }
        .into();
        assert_eq!(rerun_hint_fold(&missing), Some(2));

        let other: anyhow::Error = PipelineError::InsufficientClasses { found: 1 }.into();
        assert_eq!(rerun_hint_fold(&other), None);
        assert_eq!(rerun_hint_fold(&anyhow::anyhow!("io")), None);
    }
}
