use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::example::Example;

/// One image to feed the classifier: the file and its target class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageItem {
    pub path:  PathBuf,
    pub label: usize,
}

impl From<&Example> for ImageItem {
    fn from(example: &Example) -> Self {
        Self {
            path:  example.path.clone(),
            label: example.label,
        }
    }
}

pub struct ImageDataset {
    items: Vec<ImageItem>,
}

impl ImageDataset {
    pub fn from_examples(examples: &[Example]) -> Self {
        Self { items: examples.iter().map(ImageItem::from).collect() }
    }
}

impl Dataset<ImageItem> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
