// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from an image folder on disk to tensor batches:
//
//   data/<class>/<asset>.jpg
//       │
//       ▼
//   ImageFolderLoader   → ordered Examples + class names
//       │
//       ▼
//   splitter            → stratified folds / train-val split
//       │
//       ▼
//   ImageDataset        → implements Burn's Dataset trait
//       │
//       ▼
//   ImageBatcher        → decodes and stacks images into tensors
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Enumerates class-per-directory image folders and imports asset manifests
pub mod loader;

/// Implements Burn's Dataset trait for image items
pub mod dataset;

/// Implements Burn's Batcher trait to create image tensor batches
pub mod batcher;

/// Seeded stratified k-fold and train/validation splits
pub mod splitter;
