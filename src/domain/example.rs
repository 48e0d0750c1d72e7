// ============================================================
// Layer 3 — Example and LabeledDataset Domain Types
// ============================================================
// An Example is one labelled image. Its `position` is its index
// in the dataset's fixed enumeration order; every fold, every
// probability row and every ranking refers back to it.
//
// The identifier is the backing file name without its extension:
//   data/cat/asset_0042.jpg  →  "asset_0042"

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    /// Stable identifier derived from the file name
    pub id: String,

    /// Backing image file
    pub path: PathBuf,

    /// Integer class label (index into the class-name list)
    pub label: usize,

    /// Position in the full ordered example list
    pub position: usize,
}

impl Example {
    /// Build an example from its backing file.
    pub fn from_path(path: impl Into<PathBuf>, label: usize, position: usize) -> Self {
        let path = path.into();
        Self {
            id: identifier_for(&path),
            path,
            label,
            position,
        }
    }
}

/// Strip directories and any extension suffix from a file name.
pub fn identifier_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The full, ordered dataset plus its class-name list.
#[derive(Debug, Clone, Default)]
pub struct LabeledDataset {
    pub examples:    Vec<Example>,
    pub class_names: Vec<String>,
}

impl LabeledDataset {
    pub fn new(examples: Vec<Example>, class_names: Vec<String>) -> Self {
        Self { examples, class_names }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Labels in position order.
    pub fn labels(&self) -> Vec<usize> {
        self.examples.iter().map(|e| e.label).collect()
    }

    /// Number of distinct labels that actually occur.
    pub fn distinct_labels(&self) -> usize {
        let mut seen: Vec<usize> = self.labels();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }

    /// Clone the examples at the given positions, in the order given.
    pub fn subset(&self, positions: &[usize]) -> Vec<Example> {
        positions
            .iter()
            .filter_map(|&p| self.examples.get(p).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_strips_extension() {
        let ex = Example::from_path("data/cat/asset_0042.jpg", 1, 7);
        assert_eq!(ex.id, "asset_0042");
        assert_eq!(ex.position, 7);
    }

    #[test]
    fn test_identifier_only_strips_last_suffix() {
        assert_eq!(identifier_for(Path::new("x/photo.v2.png")), "photo.v2");
        assert_eq!(identifier_for(Path::new("x/no_extension")), "no_extension");
    }

    #[test]
    fn test_subset_and_distinct_labels() {
        let ds = LabeledDataset::new(
            vec![
                Example::from_path("a.png", 0, 0),
                Example::from_path("b.png", 1, 1),
                Example::from_path("c.png", 1, 2),
            ],
            vec!["cat".into(), "dog".into()],
        );
        let sub = ds.subset(&[2, 0]);
        assert_eq!(sub[0].id, "c");
        assert_eq!(sub[1].id, "a");
        assert_eq!(ds.distinct_labels(), 2);
        assert_eq!(ds.labels(), vec![0, 1, 1]);
    }
}
