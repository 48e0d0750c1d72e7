// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns shared by the use cases:
//
//   paths.rs       — Artifact Path Resolver. The only code that
//                    builds on-disk locations; pure computation
//                    plus explicit directory creation.
//
//   artifacts.rs   — .npy probability matrices per fold and the
//                    assembled matrix, with fingerprint sidecars.
//
//   checkpoint.rs  — Saving and loading classifier weights with
//                    Burn's CompactRecorder, plus the architecture
//                    config as JSON.
//
//   metrics.rs     — Per-fold metrics appended to a CSV file.
//
//   ultralytics.rs — Dataset config, command line and results
//                    parsing for the external YOLOv5 script.
//
// Reference: Burn Book §5 (Checkpointing)

/// On-disk layout of every artifact
pub mod paths;

/// Per-fold and final probability matrices
pub mod artifacts;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Fold metrics CSV logger
pub mod metrics;

/// YOLOv5 training script integration
pub mod ultralytics;
