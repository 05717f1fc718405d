/// ADE20K dataset adapter
///
/// This module handles loading the ADE20K index into an image/class catalog
/// and decoding per-image segmentation PNGs into instance masks.
pub mod catalog;
pub mod dataset;
pub mod index;
pub mod masks;
pub mod segmentation;
pub mod sizes;

pub use catalog::{build_catalog, load_ade20k, Catalog, ClassInfo, ImageInfo, Loader, Subset};
pub use dataset::{Ade20kDataset, InstanceDataset};
pub use index::IndexRecord;
pub use masks::InstanceMasks;
pub use segmentation::{decode, segmentation_path, SegmentationMaps};
pub use sizes::ImageSizeTable;
