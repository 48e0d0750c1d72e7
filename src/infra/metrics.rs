// ============================================================
// Layer 6 — Fold Metrics Logger
// ============================================================
// Appends one CSV row per completed cross-validation fold.
//
// Output file: <model_dir>/fold_metrics.csv
//
// Example CSV output:
//   fold,train_size,holdout_size,val_loss,holdout_acc
//   0,8,2,0.693100,0.500000
//   1,8,2,0.512400,1.000000

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

/// One row of metrics for a single fold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldMetrics {
    pub fold: usize,

    pub train_size: usize,

    pub holdout_size: usize,

    /// Final validation loss reported by the trainer
    pub val_loss: f64,

    /// Top-1 accuracy of the held-out predictions, in [0.0, 1.0]
    pub holdout_acc: f64,
}

impl FoldMetrics {
    pub fn new(
        fold:         usize,
        train_size:   usize,
        holdout_size: usize,
        val_loss:     f64,
        holdout_acc:  f64,
    ) -> Self {
        Self { fold, train_size, holdout_size, val_loss, holdout_acc }
    }
}

/// Logs fold metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(csv_path: impl Into<PathBuf>) -> Result<Self> {
        let csv_path = csv_path.into();
        if let Some(dir) = csv_path.parent() {
            fs::create_dir_all(dir)?;
        }

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "fold,train_size,holdout_size,val_loss,holdout_acc")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one fold's metrics as a new row.
    pub fn log(&self, m: &FoldMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{},{},{:.6},{:.6}",
            m.fold,
            m.train_size,
            m.holdout_size,
            m.val_loss,
            m.holdout_acc,
        )?;

        tracing::debug!(
            "Logged fold {} metrics: val_loss={:.4}, holdout_acc={:.4}",
            m.fold,
            m.val_loss,
            m.holdout_acc,
        );

        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_written_once_and_rows_appended() {
        let dir    = tempfile::tempdir().unwrap();
        let path   = dir.path().join("nested/fold_metrics.csv");
        let logger = MetricsLogger::new(&path).unwrap();
        logger.log(&FoldMetrics::new(0, 8, 2, 0.5, 1.0)).unwrap();

        // Re-opening must not duplicate the header
        let logger = MetricsLogger::new(&path).unwrap();
        logger.log(&FoldMetrics::new(1, 8, 2, 0.25, 0.5)).unwrap();

        let csv   = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "fold,train_size,holdout_size,val_loss,holdout_acc");
        assert_eq!(lines[1], "0,8,2,0.500000,1.000000");
        assert_eq!(lines[2], "1,8,2,0.250000,0.500000");
    }
}
