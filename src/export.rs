/// Writes decoded instance masks to disk for inspection
///
/// Each mask becomes a grayscale PNG (255 inside the instance, 0 outside)
/// and `instances.json` summarizes them.
use std::fs;
use std::path::{Path, PathBuf};
use image::{GrayImage, Luma};
use log::info;
use serde::Serialize;

use crate::ade20k::InstanceMasks;
use crate::error::{Ade20kError, Result};

pub const SUMMARY_FILE_NAME: &str = "instances.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceSummary {
    pub index: usize,
    pub class_id: i32,
    pub class_name: Option<String>,
    pub area: usize,
    pub file: String,
}

/// Per-instance summaries, in mask order
pub fn summarize<F>(masks: &InstanceMasks, class_name: F) -> Vec<InstanceSummary>
where
    F: Fn(i32) -> Option<String>,
{
    masks
        .class_ids
        .iter()
        .enumerate()
        .map(|(index, &class_id)| InstanceSummary {
            index,
            class_id,
            class_name: class_name(class_id),
            area: masks.area(index),
            file: format!("instance_{index:03}.png"),
        })
        .collect()
}

/// Write every mask plus the JSON summary into `out_dir`; returns the summary path
pub fn export_instances<F>(masks: &InstanceMasks, class_name: F, out_dir: &Path) -> Result<PathBuf>
where
    F: Fn(i32) -> Option<String>,
{
    fs::create_dir_all(out_dir).map_err(|e| Ade20kError::io(out_dir, e))?;

    let summaries = summarize(masks, class_name);
    for summary in &summaries {
        let mask = masks.mask(summary.index);
        let (height, width) = mask.dim();
        let img = GrayImage::from_fn(width as u32, height as u32, |x, y| {
            Luma([if mask[[y as usize, x as usize]] { 255 } else { 0 }])
        });
        let path = out_dir.join(&summary.file);
        img.save(&path).map_err(|source| Ade20kError::Image { path, source })?;
    }

    let summary_path = out_dir.join(SUMMARY_FILE_NAME);
    let json = serde_json::to_string_pretty(&summaries)
        .map_err(|e| Ade20kError::io(&summary_path, e.into()))?;
    fs::write(&summary_path, json).map_err(|e| Ade20kError::io(&summary_path, e))?;

    info!("Exported {} mask(s) to {}", summaries.len(), out_dir.display());
    Ok(summary_path)
}
