// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn model code lives here. The application layer only
// sees the Trainer and Predictor traits from Layer 3.
//
//   model.rs     — Small CNN image classifier
//                  • 3 conv blocks (conv 3×3, ReLU, max-pool)
//                  • global average pooling
//                  • dropout + linear classification head
//
//   trainer.rs   — Training loop (Adam, cross-entropy) with a
//                  validation pass per epoch
//
//   predictor.rs — Loads a checkpoint and returns softmax
//                  probabilities in input order
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// CNN classifier architecture
pub mod model;

/// Training loop behind the Trainer trait
pub mod trainer;

/// Probability prediction behind the Predictor trait
pub mod predictor;
