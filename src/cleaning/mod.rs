// ============================================================
// Label Cleaning
// ============================================================
// Turns per-fold held-out predictions into a ranking of
// probably-mislabelled examples.
//
//   aggregator.rs — reassembles the per-fold probability files
//                   into one N×C matrix in dataset order
//
//   ranker.rs     — scores every example from its label and its
//                   probability row and orders them, most
//                   suspicious first
//
// Reference: Northcutt et al. (2021) Confident Learning

/// Fold reassembly into the full probability matrix
pub mod aggregator;

/// Normalized-margin and self-confidence ranking
pub mod ranker;
