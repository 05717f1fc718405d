/// Dataset adapter: resolves catalog images and produces their instance masks
use std::path::{Path, PathBuf};
use log::{debug, warn};
use rayon::prelude::*;

use crate::ade20k::catalog::{Catalog, ImageInfo, Loader, Subset};
use crate::ade20k::masks::InstanceMasks;
use crate::ade20k::segmentation::{decode, segmentation_path, SegmentationMaps};
use crate::error::{Ade20kError, Result};
use crate::settings::LoaderSettings;

/// The surface a training loop uses to pull per-image masks
pub trait InstanceDataset {
    fn image_info(&self, image_id: usize) -> Option<&ImageInfo>;

    fn load_mask(&self, image_id: usize) -> Result<InstanceMasks>;

    /// Returned for images without any instance
    fn fallback_mask(&self, _image_id: usize) -> InstanceMasks {
        InstanceMasks::empty()
    }
}

pub struct Ade20kDataset {
    catalog: Catalog,
    settings: LoaderSettings,
}

impl Ade20kDataset {
    pub fn new(catalog: Catalog, settings: LoaderSettings) -> Self {
        Self { catalog, settings }
    }

    /// Load the catalog from `dataset_dir` and wrap it
    pub fn load(
        dataset_dir: &Path,
        subset: Subset,
        class_ids: Option<&[usize]>,
        settings: LoaderSettings,
    ) -> Result<Self> {
        let loader = Loader::new(settings);
        let catalog = loader.load(dataset_dir, subset, class_ids)?;
        Ok(Self::new(catalog, loader.settings().clone()))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn image_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.catalog.images.iter().map(|info| info.id)
    }

    pub fn class_name(&self, class_id: usize) -> Option<&str> {
        self.catalog.class(class_id).map(|c| c.name.as_str())
    }

    pub fn segmentation_path(&self, info: &ImageInfo) -> PathBuf {
        segmentation_path(&info.path, &self.settings.segmentation_suffix)
    }

    /// Decode the masks of a catalog entry
    pub fn load_mask_for(&self, info: &ImageInfo) -> Result<InstanceMasks> {
        let seg_path = self.segmentation_path(info);
        let maps = decode(&seg_path)?;
        if maps.width() != info.width as usize || maps.height() != info.height as usize {
            warn!(
                "Segmentation {} is {}x{}, index says {}x{}",
                seg_path.display(),
                maps.width(),
                maps.height(),
                info.width,
                info.height
            );
        }
        Ok(self.masks_from_maps(info.id, &maps))
    }

    /// Split decoded maps into instance masks, or the fallback when there are none
    pub fn masks_from_maps(&self, image_id: usize, maps: &SegmentationMaps) -> InstanceMasks {
        match InstanceMasks::from_maps(maps) {
            Some(masks) => {
                debug!("Image {}: {} instance(s)", image_id, masks.len());
                masks
            }
            None => {
                debug!("Image {}: no instances, using fallback mask", image_id);
                self.fallback_mask(image_id)
            }
        }
    }

    /// Decode several images in parallel; results keep the order of `image_ids`
    pub fn load_masks(&self, image_ids: &[usize]) -> Vec<(usize, Result<InstanceMasks>)> {
        image_ids
            .par_iter()
            .map(|&id| (id, self.load_mask(id)))
            .collect()
    }
}

impl InstanceDataset for Ade20kDataset {
    fn image_info(&self, image_id: usize) -> Option<&ImageInfo> {
        self.catalog.image(image_id)
    }

    fn load_mask(&self, image_id: usize) -> Result<InstanceMasks> {
        let info = self
            .image_info(image_id)
            .ok_or(Ade20kError::UnknownImage(image_id))?;
        self.load_mask_for(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ade20k::catalog::ClassInfo;
    use image::{Rgb, RgbImage};

    fn catalog_with(dir: &Path, sizes: &[(u32, u32)]) -> Catalog {
        Catalog {
            subset: Some(Subset::Train),
            classes: vec![ClassInfo {
                source: "ade20k".into(),
                id: 5,
                name: "tree".into(),
            }],
            images: sizes
                .iter()
                .enumerate()
                .map(|(id, &(width, height))| ImageInfo {
                    id: id * 10,
                    path: dir.join(format!("img_{id}.jpg")),
                    width,
                    height,
                    class_ids: vec![5],
                })
                .collect(),
        }
    }

    fn write_seg(path: &Path, width: u32, height: u32, px: [u8; 3]) {
        RgbImage::from_pixel(width, height, Rgb(px)).save(path).unwrap();
    }

    #[test]
    fn test_load_mask_single_instance() {
        let dir = tempfile::tempdir().unwrap();
        // R = 0, G = 5 -> class 5
        write_seg(&dir.path().join("img_0_seg.png"), 3, 2, [0, 5, 40]);
        let dataset = Ade20kDataset::new(catalog_with(dir.path(), &[(3, 2)]), LoaderSettings::default());

        let masks = dataset.load_mask(0).unwrap();
        assert_eq!(masks.class_ids, vec![5]);
        assert_eq!(masks.masks.shape(), &[2, 3, 1]);
        assert!(masks.masks.iter().all(|&m| m));
        assert_eq!(dataset.class_name(5), Some("tree"));
    }

    #[test]
    fn test_unknown_image_id() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Ade20kDataset::new(catalog_with(dir.path(), &[(1, 1)]), LoaderSettings::default());
        assert!(matches!(dataset.load_mask(3), Err(Ade20kError::UnknownImage(3))));
        assert!(dataset.image_info(0).is_some());
    }

    #[test]
    fn test_missing_segmentation_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Ade20kDataset::new(catalog_with(dir.path(), &[(1, 1)]), LoaderSettings::default());
        assert!(matches!(dataset.load_mask(0), Err(Ade20kError::Image { .. })));
    }

    #[test]
    fn test_load_masks_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        write_seg(&dir.path().join("img_0_seg.png"), 2, 2, [0, 1, 0]);
        write_seg(&dir.path().join("img_1_seg.png"), 2, 2, [0, 2, 0]);
        let dataset = Ade20kDataset::new(
            catalog_with(dir.path(), &[(2, 2), (2, 2)]),
            LoaderSettings::default(),
        );

        let results = dataset.load_masks(&[10, 0, 99]);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, 10);
        assert_eq!(results[0].1.as_ref().unwrap().class_ids, vec![2]);
        assert_eq!(results[1].1.as_ref().unwrap().class_ids, vec![1]);
        assert!(results[2].1.is_err());
    }

    #[test]
    fn test_degenerate_map_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Ade20kDataset::new(catalog_with(dir.path(), &[(1, 1)]), LoaderSettings::default());
        let maps = SegmentationMaps {
            class_map: ndarray::Array2::zeros((0, 0)),
            instance_map: ndarray::Array2::zeros((0, 0)),
        };
        let masks = dataset.masks_from_maps(0, &maps);
        assert!(masks.is_empty());
        assert_eq!(masks.masks.shape(), &[0, 0, 0]);
        assert!(masks.class_ids.is_empty());
    }

    #[test]
    fn test_masks_from_maps_with_instances() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Ade20kDataset::new(catalog_with(dir.path(), &[(2, 1)]), LoaderSettings::default());
        let maps = SegmentationMaps {
            class_map: ndarray::array![[7, 9]],
            instance_map: ndarray::array![[0, 1]],
        };
        let masks = dataset.masks_from_maps(0, &maps);
        assert_eq!(masks.class_ids, vec![7, 9]);
        assert_eq!(masks.masks.shape(), &[1, 2, 2]);
    }
}
