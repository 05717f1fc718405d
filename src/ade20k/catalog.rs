/// Catalog construction: subset selection, class filtering and per-image metadata
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use log::{debug, info};
use ndarray::Axis;
use serde::{Deserialize, Serialize};

use crate::ade20k::index::IndexRecord;
use crate::ade20k::sizes::ImageSizeTable;
use crate::config::{TRAIN_PATH_MARKER, VAL_PATH_MARKER};
use crate::error::{Ade20kError, Result};
use crate::settings::LoaderSettings;

/// One of the two dataset partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subset {
    Train,
    Val,
}

impl Subset {
    /// Substring an image's relative path must contain to belong to this subset
    pub fn path_marker(self) -> &'static str {
        match self {
            Subset::Train => TRAIN_PATH_MARKER,
            Subset::Val => VAL_PATH_MARKER,
        }
    }

    pub fn contains(self, relative_path: &str) -> bool {
        relative_path.contains(self.path_marker())
    }
}

impl FromStr for Subset {
    type Err = Ade20kError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Subset::Train),
            "val" => Ok(Subset::Val),
            other => Err(Ade20kError::UnknownSubset(other.to_string())),
        }
    }
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subset::Train => write!(f, "train"),
            Subset::Val => write!(f, "val"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub source: String,
    pub id: usize,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Position of the image within the subset, stable for one load
    pub id: usize,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Classes present in the image, ascending
    pub class_ids: Vec<usize>,
}

/// Immutable result of loading the index: selected classes and images
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub subset: Option<Subset>,
    pub classes: Vec<ClassInfo>,
    /// Ascending by id
    pub images: Vec<ImageInfo>,
}

impl Catalog {
    pub fn image(&self, id: usize) -> Option<&ImageInfo> {
        self.images
            .binary_search_by_key(&id, |info| info.id)
            .ok()
            .map(|pos| &self.images[pos])
    }

    pub fn class(&self, id: usize) -> Option<&ClassInfo> {
        self.classes.iter().find(|c| c.id == id)
    }

    pub fn class_ids(&self) -> Vec<usize> {
        self.classes.iter().map(|c| c.id).collect()
    }
}

/// Reads dataset files according to a [`LoaderSettings`]
#[derive(Debug, Clone, Default)]
pub struct Loader {
    settings: LoaderSettings,
}

impl Loader {
    pub fn new(settings: LoaderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    pub fn load(&self, dataset_dir: &Path, subset: Subset, class_ids: Option<&[usize]>) -> Result<Catalog> {
        let index_path = dataset_dir.join(&self.settings.index_file);
        let sizes_path = dataset_dir.join(&self.settings.image_sizes_file);
        debug!("Index file: {}, size table: {}", index_path.display(), sizes_path.display());

        let index = IndexRecord::load(&index_path)?;
        let sizes = ImageSizeTable::load(&sizes_path)?;
        build_catalog(&index, &sizes, dataset_dir, subset, class_ids, &self.settings.source_name)
    }
}

/// Load the catalog for `subset` ("train" or "val") with default settings.
/// An empty or absent `class_ids` selects every class present in the subset.
pub fn load_ade20k(dataset_dir: &Path, subset: &str, class_ids: Option<&[usize]>) -> Result<Catalog> {
    let subset = subset.parse::<Subset>()?;
    Loader::default().load(dataset_dir, subset, class_ids)
}

/// Pure catalog construction over an already-parsed index and size table
pub fn build_catalog(
    index: &IndexRecord,
    sizes: &ImageSizeTable,
    dataset_dir: &Path,
    subset: Subset,
    class_ids: Option<&[usize]>,
    source_name: &str,
) -> Result<Catalog> {
    let retained: Vec<usize> = (0..index.num_images())
        .filter(|&i| subset.contains(&index.relative_path(i)))
        .collect();
    let presence = index.presence().select(Axis(1), &retained);

    let class_ids: Vec<usize> = match class_ids {
        Some(ids) if !ids.is_empty() => {
            if let Some(&bad) = ids.iter().find(|&&id| id >= index.num_classes()) {
                return Err(Ade20kError::UnknownClass {
                    class_id: bad,
                    num_classes: index.num_classes(),
                });
            }
            // Each class is registered once, in first-seen order
            let mut seen = HashSet::new();
            ids.iter().copied().filter(|&id| seen.insert(id)).collect()
        }
        // Every class with at least one instance in the subset
        _ => presence
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(_, row)| row.iter().any(|&count| count > 0))
            .map(|(class_id, _)| class_id)
            .collect(),
    };

    let image_ids: BTreeSet<usize> = class_ids
        .iter()
        .flat_map(|&class_id| {
            presence
                .row(class_id)
                .iter()
                .enumerate()
                .filter(|(_, &count)| count > 0)
                .map(|(image_id, _)| image_id)
                .collect::<Vec<_>>()
        })
        .collect();

    let classes = class_ids
        .iter()
        .map(|&id| ClassInfo {
            source: source_name.to_string(),
            id,
            name: index.object_name(id).unwrap_or_default().to_string(),
        })
        .collect();

    let images = image_ids
        .into_iter()
        .map(|image_id| {
            let source_index = retained[image_id];
            let (width, height) = sizes.get(&index.relative_path(source_index))?;
            let class_ids = presence
                .column(image_id)
                .iter()
                .enumerate()
                .filter(|(_, &count)| count > 0)
                .map(|(class_id, _)| class_id)
                .collect();
            Ok(ImageInfo {
                id: image_id,
                path: index.absolute_path(dataset_dir, source_index),
                width,
                height,
                class_ids,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        "Catalog for subset '{}': {} of {} images in subset, {} classes",
        subset,
        images.len(),
        retained.len(),
        class_ids.len()
    );

    Ok(Catalog {
        subset: Some(subset),
        classes,
        images,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use ndarray::array;

    /// Five images: 0, 1, 3 training, 2, 4 validation. Four classes.
    fn sample() -> (IndexRecord, ImageSizeTable) {
        let folders = vec![
            "ADE/images/training/a".to_string(),
            "ADE/images/training/b".to_string(),
            "ADE/images/validation/a".to_string(),
            "ADE/images/training/c".to_string(),
            "ADE/images/validation/b".to_string(),
        ];
        let filenames: Vec<String> = (0..5).map(|i| format!("img_{i}.jpg")).collect();
        let presence = array![
            [1, 0, 1, 0, 0], // wall
            [0, 2, 0, 1, 0], // floor
            [0, 0, 0, 0, 5], // sky (validation only)
            [0, 0, 0, 0, 0], // never present
        ];
        let names = vec!["wall".into(), "floor".into(), "sky".into(), "unused".into()];
        let index = IndexRecord::new(filenames, folders, presence, names).unwrap();

        let sizes = (0..5)
            .map(|i| (index.relative_path(i), (100 + i as u32, 50 + i as u32)))
            .collect::<HashMap<_, _>>();
        (index, ImageSizeTable::new(sizes))
    }

    fn build(subset: Subset, class_ids: Option<&[usize]>) -> Result<Catalog> {
        let (index, sizes) = sample();
        build_catalog(&index, &sizes, Path::new("/data/ade"), subset, class_ids, "ade20k")
    }

    #[test]
    fn test_subset_parsing() {
        assert_eq!("train".parse::<Subset>().unwrap(), Subset::Train);
        assert_eq!("val".parse::<Subset>().unwrap(), Subset::Val);
        for bad in ["test", "Train", "", "training"] {
            assert!(matches!(bad.parse::<Subset>(), Err(Ade20kError::UnknownSubset(_))));
        }
    }

    #[test]
    fn test_train_subset_derives_classes() {
        let catalog = build(Subset::Train, None).unwrap();
        assert_eq!(catalog.class_ids(), vec![0, 1]);
        // Subset positions: 0 -> img_0, 1 -> img_1, 2 -> img_3
        let ids: Vec<usize> = catalog.images.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(catalog
            .images
            .iter()
            .all(|i| i.path.to_string_lossy().contains("training")));

        let third = catalog.image(2).unwrap();
        assert_eq!(third.path, PathBuf::from("/data/ade/images/training/c/img_3.jpg"));
        assert_eq!((third.width, third.height), (103, 53));
        assert_eq!(third.class_ids, vec![1]);
    }

    #[test]
    fn test_duplicate_class_ids_register_once() {
        let catalog = build(Subset::Train, Some(&[1, 0, 1, 0])).unwrap();
        assert_eq!(catalog.class_ids(), vec![1, 0]);
        assert_eq!(catalog.classes.len(), 2);
        let ids: Vec<usize> = catalog.images.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_val_subset() {
        let catalog = build(Subset::Val, None).unwrap();
        assert_eq!(catalog.class_ids(), vec![0, 2]);
        assert_eq!(catalog.images.len(), 2);
        assert_eq!(catalog.image(1).unwrap().class_ids, vec![2]);
        assert_eq!(catalog.subset, Some(Subset::Val));
    }

    #[test]
    fn test_single_class_selects_only_its_images() {
        let catalog = build(Subset::Train, Some(&[1])).unwrap();
        assert_eq!(catalog.classes.len(), 1);
        assert_eq!(catalog.classes[0].name, "floor");
        assert_eq!(catalog.classes[0].source, "ade20k");
        let ids: Vec<usize> = catalog.images.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_given_class_order_is_kept_and_images_are_union() {
        let catalog = build(Subset::Train, Some(&[1, 0])).unwrap();
        assert_eq!(catalog.class_ids(), vec![1, 0]);
        let ids: Vec<usize> = catalog.images.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_class_ids_behaves_like_none() {
        assert_eq!(build(Subset::Train, Some(&[])).unwrap(), build(Subset::Train, None).unwrap());
    }

    #[test]
    fn test_class_absent_from_subset_yields_no_images() {
        let catalog = build(Subset::Train, Some(&[3])).unwrap();
        assert_eq!(catalog.classes.len(), 1);
        assert!(catalog.images.is_empty());
    }

    #[test]
    fn test_unknown_class_is_error() {
        let err = build(Subset::Train, Some(&[0, 9])).unwrap_err();
        assert!(matches!(err, Ade20kError::UnknownClass { class_id: 9, num_classes: 4 }));
    }

    #[test]
    fn test_missing_size_fails_fast() {
        let (index, _) = sample();
        let err = build_catalog(
            &index,
            &ImageSizeTable::default(),
            Path::new("/data"),
            Subset::Train,
            None,
            "ade20k",
        )
        .unwrap_err();
        assert!(matches!(err, Ade20kError::MissingImageSize(_)));
    }

    #[test]
    fn test_loader_reads_mat_index_and_pickle_sizes() {
        use crate::ade20k::index::tests::sample_index_mat;
        use crate::mat::testutil::MatWriter;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("index_ade20k.mat"),
            sample_index_mat(&MatWriter::little()),
        )
        .unwrap();
        let sizes: HashMap<String, (u32, u32)> = [
            "ADE20K_2016_07_26/images/training/a/abbey/ADE_train_1.jpg",
            "ADE20K_2016_07_26/images/training/b/bathroom/ADE_train_2.jpg",
        ]
        .iter()
        .map(|p| (p.to_string(), (256, 256)))
        .collect();
        let pickle = serde_pickle::to_vec(&sizes, serde_pickle::SerOptions::new()).unwrap();
        std::fs::write(dir.path().join("image_sizes.pkl"), pickle).unwrap();

        let catalog = Loader::default().load(dir.path(), Subset::Train, None).unwrap();
        assert_eq!(catalog.class_ids(), vec![0, 1]);
        assert_eq!(catalog.classes[1].name, "floor");
        assert_eq!(catalog.images.len(), 2);
        assert_eq!(
            catalog.images[1].path,
            dir.path().join("images/training/b/bathroom/ADE_train_2.jpg")
        );
        assert_eq!(catalog.images[1].class_ids, vec![1]);
    }

    #[test]
    fn test_unknown_subset_string() {
        let err = load_ade20k(Path::new("/nonexistent"), "test", None).unwrap_err();
        assert!(matches!(err, Ade20kError::UnknownSubset(s) if s == "test"));
    }
}
