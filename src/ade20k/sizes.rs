/// Image size side table
///
/// Maps an image's index-relative path (`folder/filename`) to its
/// `(width, height)`. Shipped as a Python pickle of a dict; a JSON object
/// with the same shape is accepted too.
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use log::info;

use crate::error::{Ade20kError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSizeTable {
    sizes: HashMap<String, (u32, u32)>,
}

impl ImageSizeTable {
    pub fn new(sizes: HashMap<String, (u32, u32)>) -> Self {
        Self { sizes }
    }

    /// Load a size table, choosing the decoder by extension (.json, otherwise pickle)
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Ade20kError::io(path, e))?;
        let reader = BufReader::new(file);
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let sizes: HashMap<String, (u32, u32)> = if is_json {
            serde_json::from_reader(reader)
                .map_err(|e| Ade20kError::SizeTable(format!("{}: {}", path.display(), e)))?
        } else {
            serde_pickle::from_reader(reader, serde_pickle::DeOptions::new().decode_strings())
                .map_err(|e| Ade20kError::SizeTable(format!("{}: {}", path.display(), e)))?
        };
        info!("Loaded {} image sizes from {}", sizes.len(), path.display());
        Ok(Self { sizes })
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// `(width, height)` of an image; a missing entry is an error
    pub fn get(&self, relative_path: &str) -> Result<(u32, u32)> {
        self.sizes
            .get(relative_path)
            .copied()
            .ok_or_else(|| Ade20kError::MissingImageSize(relative_path.to_string()))
    }
}
