//! ADE20K scene-parsing annotations as instance-segmentation training data.
//!
//! [`load_ade20k`] reads the dataset index and image size table into an
//! immutable [`Catalog`]; [`Ade20kDataset::load_mask`] decodes an image's
//! `_seg.png` into stacked boolean instance masks with one class id each.
pub mod ade20k;
pub mod build_info;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod mat;
pub mod settings;

pub use ade20k::{
    load_ade20k, Ade20kDataset, Catalog, ClassInfo, ImageInfo, InstanceDataset, InstanceMasks,
    Loader, SegmentationMaps, Subset,
};
pub use error::{Ade20kError, IndexError, Result};
pub use settings::LoaderSettings;
