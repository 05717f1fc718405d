/// Decoder for ADE20K `_seg.png` segmentation images
///
/// The object class of a pixel is packed into the red and green channels
/// (`R/10*256 + G` on 8-bit values) and the object instance into the blue
/// channel. Channels are read as normalized values in [0, 1]; the class
/// formula `R*255*256/10 + G*255` is truncated toward zero.
/// IMPORTANT: truncation must match the real-valued formula exactly, so it is
/// evaluated in integer arithmetic on the raw channel values.
use std::path::{Path, PathBuf};
use image::{DynamicImage, ImageBuffer, Rgb};
use log::debug;
use ndarray::Array2;

use crate::error::{Ade20kError, Result};

/// Full-scale value of a 16-bit channel
const CHANNEL_MAX: u64 = u16::MAX as u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMaps {
    /// Per-pixel object class, `[height, width]`
    pub class_map: Array2<u32>,
    /// Per-pixel dense rank of the blue channel value, `[height, width]`
    pub instance_map: Array2<u32>,
}

impl SegmentationMaps {
    pub fn height(&self) -> usize {
        self.class_map.nrows()
    }

    pub fn width(&self) -> usize {
        self.class_map.ncols()
    }
}

/// Segmentation image path for an image: its extension replaced by `suffix`.
/// `images/a/ADE_train_1.jpg` with `_seg.png` gives `images/a/ADE_train_1_seg.png`.
pub fn segmentation_path(image_path: &Path, suffix: &str) -> PathBuf {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    image_path.with_file_name(format!("{stem}{suffix}"))
}

/// Open and decode a segmentation PNG
pub fn decode(path: &Path) -> Result<SegmentationMaps> {
    let img = image::open(path).map_err(|source| Ade20kError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let maps = decode_image(&img);
    debug!(
        "Decoded {}: {}x{}",
        path.display(),
        maps.width(),
        maps.height()
    );
    Ok(maps)
}

/// Decode an in-memory image. 8-bit images are widened to 16 bits (v * 257),
/// which keeps the normalized channel values unchanged.
pub fn decode_image(img: &DynamicImage) -> SegmentationMaps {
    decode_rgb16(&img.to_rgb16())
}

pub fn decode_rgb16(rgb: &ImageBuffer<Rgb<u16>, Vec<u16>>) -> SegmentationMaps {
    let (width, height) = rgb.dimensions();
    let shape = (height as usize, width as usize);

    let class_map = Array2::from_shape_fn(shape, |(y, x)| {
        let Rgb([r, g, _]) = *rgb.get_pixel(x as u32, y as u32);
        class_value(r, g)
    });

    let mut blues: Vec<u16> = rgb.pixels().map(|p| p.0[2]).collect();
    blues.sort_unstable();
    blues.dedup();

    let instance_map = Array2::from_shape_fn(shape, |(y, x)| {
        let b = rgb.get_pixel(x as u32, y as u32).0[2];
        // Present by construction
        blues.binary_search(&b).unwrap_or_default() as u32
    });

    SegmentationMaps { class_map, instance_map }
}

/// trunc(R*255*256/10 + G*255) with R = r/65535, G = g/65535
fn class_value(r: u16, g: u16) -> u32 {
    let numerator = r as u64 * 255 * 256 + g as u64 * 255 * 10;
    (numerator / (10 * CHANNEL_MAX)) as u32
}
