// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to accomplish one
// goal per use case.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Paths come from infra::paths only
//
// Reference: Clean Architecture pattern

// Cross-validated label-error detection (plus train-only / predict-only)
pub mod label_errors_use_case;

// YOLOv5 object-detection training
pub mod detection_use_case;
