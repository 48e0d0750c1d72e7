// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing the label-error
// pipeline. No burn types, no file I/O.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

// A labelled image and the ordered dataset it belongs to
pub mod example;

// One cross-validation partition
pub mod fold;

// Typed failure conditions of the pipeline
pub mod error;

// Dataset, trainer and predictor contracts
pub mod traits;

pub use error::PipelineError;
