// ============================================================
// Layer 4 — Image Folder Loader
// ============================================================
// Enumerates a class-per-directory image dataset:
//
//   data/
//     cat/
//       asset_01.jpg
//       asset_02.png
//     dog/
//       asset_03.jpg
//
// Class names are the sorted sub-directory names; label i is the
// i-th class. Files are sorted inside each class, so the example
// order is the same on every call against the same directory.
// Fold membership is recomputed from that order, so it must never
// depend on read_dir ordering.
//
// Also imports an asset manifest (JSON list of labelled image
// files) into that layout before loading.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use crate::domain::example::{Example, LabeledDataset};
use crate::domain::traits::DatasetProvider;

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

/// Loads a class-per-directory image dataset.
/// Implements the DatasetProvider trait from Layer 3.
pub struct ImageFolderLoader {
    dir: PathBuf,
}

impl ImageFolderLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DatasetProvider for ImageFolderLoader {
    fn load(&self) -> Result<LabeledDataset> {
        if !self.dir.is_dir() {
            anyhow::bail!(
                "Dataset directory '{}' does not exist. Import assets first.",
                self.dir.display()
            );
        }

        let mut class_names = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read directory '{}'", self.dir.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                class_names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        class_names.sort();

        let mut examples = Vec::new();
        for (label, class_name) in class_names.iter().enumerate() {
            let mut files: Vec<PathBuf> = fs::read_dir(self.dir.join(class_name))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            files.sort();

            tracing::debug!("Class '{}' (label {}): {} images", class_name, label, files.len());

            for path in files {
                let position = examples.len();
                examples.push(Example::from_path(path, label, position));
            }
        }

        tracing::info!(
            "Loaded {} examples across {} classes from '{}'",
            examples.len(),
            class_names.len(),
            self.dir.display()
        );
        Ok(LabeledDataset::new(examples, class_names))
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

// ─── Asset Manifest ───────────────────────────────────────────────────────────
/// One labelled asset to import.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetEntry {
    /// Identifier the asset is exported under (becomes the file stem)
    pub external_id: String,
    pub class_name:  String,
    /// Source image on local disk
    pub path:        PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetManifest {
    pub assets: Vec<AssetEntry>,
}

impl AssetManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read asset manifest '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid asset manifest '{}'", path.display()))
    }

    /// Copy every asset into `data_dir/<class_name>/<external_id>.<ext>`.
    /// Files already present are kept as-is. Returns the number copied.
    pub fn materialize(&self, data_dir: &Path) -> Result<usize> {
        let mut copied = 0;
        for asset in &self.assets {
            let class_name  = plain_component(&asset.class_name, "class_name")?;
            let external_id = plain_component(&asset.external_id, "external_id")?;
            let class_dir   = data_dir.join(class_name);
            fs::create_dir_all(&class_dir)
                .with_context(|| format!("Cannot create '{}'", class_dir.display()))?;

            let ext = asset
                .path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("jpg");
            let dest = class_dir.join(format!("{external_id}.{ext}"));
            if dest.exists() {
                continue;
            }
            fs::copy(&asset.path, &dest).with_context(|| {
                format!("Cannot copy '{}' to '{}'", asset.path.display(), dest.display())
            })?;
            copied += 1;
        }
        tracing::info!(
            "Imported {} new assets ({} listed) into '{}'",
            copied,
            self.assets.len(),
            data_dir.display()
        );
        Ok(copied)
    }
}

/// A manifest value used as a single path component: no separators,
/// no `.`/`..`, not absolute.
fn plain_component<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !value.contains(['/', '\\']) => Ok(value),
        _ => anyhow::bail!("Invalid {field} '{value}' in asset manifest: must be a plain name"),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_enumeration_is_sorted_and_stable() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("dog/b.png"));
        touch(&dir.path().join("dog/a.jpg"));
        touch(&dir.path().join("cat/z.jpg"));
        touch(&dir.path().join("cat/notes.txt"));

        let loader = ImageFolderLoader::new(dir.path());
        let ds     = loader.load().unwrap();

        assert_eq!(ds.class_names, vec!["cat", "dog"]);
        let ids: Vec<&str> = ds.examples.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "b"]);
        assert_eq!(ds.labels(), vec![0, 1, 1]);
        assert_eq!(ds.examples[2].position, 2);

        // A second call yields the same order
        assert_eq!(loader.load().unwrap().examples, ds.examples);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir    = tempfile::tempdir().unwrap();
        let loader = ImageFolderLoader::new(dir.path().join("absent"));
        assert!(loader.load().is_err());
    }

    #[test]
    fn test_manifest_materializes_class_layout() {
        let src  = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        touch(&src.path().join("raw1.png"));
        touch(&src.path().join("raw2.jpg"));

        let manifest = AssetManifest {
            assets: vec![
                AssetEntry {
                    external_id: "asset-1".into(),
                    class_name:  "cat".into(),
                    path:        src.path().join("raw1.png"),
                },
                AssetEntry {
                    external_id: "asset-2".into(),
                    class_name:  "dog".into(),
                    path:        src.path().join("raw2.jpg"),
                },
            ],
        };

        assert_eq!(manifest.materialize(data.path()).unwrap(), 2);
        assert!(data.path().join("cat/asset-1.png").exists());
        assert!(data.path().join("dog/asset-2.jpg").exists());

        // Re-importing keeps the existing files
        assert_eq!(manifest.materialize(data.path()).unwrap(), 0);

        let ds = ImageFolderLoader::new(data.path()).load().unwrap();
        assert_eq!(ds.examples[0].id, "asset-1");
        assert_eq!(ds.examples[1].id, "asset-2");
    }

    #[test]
    fn test_manifest_rejects_paths_outside_data_dir() {
        let src  = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        touch(&src.path().join("raw.png"));

        for (class_name, external_id) in [
            ("../escape", "a"),
            ("cat", "../../b"),
            ("/abs", "c"),
            ("cat", "sub/d"),
            ("..", "e"),
            ("", "f"),
        ] {
            let manifest = AssetManifest {
                assets: vec![AssetEntry {
                    external_id: external_id.into(),
                    class_name:  class_name.into(),
                    path:        src.path().join("raw.png"),
                }],
            };
            assert!(
                manifest.materialize(data.path()).is_err(),
                "accepted class '{class_name}' id '{external_id}'"
            );
        }
        assert_eq!(fs::read_dir(data.path()).unwrap().count(), 0);
    }
}
