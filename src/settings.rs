use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, info};

use crate::config::{
    APP_NAME, DEFAULT_IMAGE_SIZES_FILE, DEFAULT_INDEX_FILE, DEFAULT_SEGMENTATION_SUFFIX,
    DEFAULT_SOURCE_NAME, SETTINGS_FILE_NAME,
};
use crate::error::{Ade20kError, Result};

/// Dataset layout settings, loadable from a YAML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderSettings {
    /// Index file name inside the dataset directory (.mat or .json)
    #[serde(default = "default_index_file")]
    pub index_file: String,

    /// Image size table inside the dataset directory (.pkl or .json)
    #[serde(default = "default_image_sizes_file")]
    pub image_sizes_file: String,

    /// Replaces an image's extension to locate its segmentation PNG
    #[serde(default = "default_segmentation_suffix")]
    pub segmentation_suffix: String,

    /// Source tag recorded on every class entry
    #[serde(default = "default_source_name")]
    pub source_name: String,
}

fn default_index_file() -> String {
    DEFAULT_INDEX_FILE.to_string()
}

fn default_image_sizes_file() -> String {
    DEFAULT_IMAGE_SIZES_FILE.to_string()
}

fn default_segmentation_suffix() -> String {
    DEFAULT_SEGMENTATION_SUFFIX.to_string()
}

fn default_source_name() -> String {
    DEFAULT_SOURCE_NAME.to_string()
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            index_file: default_index_file(),
            image_sizes_file: default_image_sizes_file(),
            segmentation_suffix: default_segmentation_suffix(),
            source_name: default_source_name(),
        }
    }
}

impl LoaderSettings {
    /// Get the path to the settings file
    /// On macOS: ~/Library/Application Support/ade20k-masks/settings.yaml
    /// On Linux: ~/.config/ade20k-masks/settings.yaml
    /// On Windows: C:\Users\<user>\AppData\Roaming\ade20k-masks\settings.yaml
    pub fn settings_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."));

        config_dir.join(APP_NAME).join(SETTINGS_FILE_NAME)
    }

    /// Load settings from a YAML file.
    /// If custom_path is provided, uses that path; otherwise uses the default settings path.
    /// A missing file yields the defaults; an unreadable or malformed one is an error.
    pub fn load(custom_path: Option<&Path>) -> Result<Self> {
        let path = match custom_path {
            Some(p) => {
                info!("Using custom settings path: {}", p.display());
                p.to_path_buf()
            }
            None => Self::settings_path(),
        };

        if !path.exists() {
            info!("Settings file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(|e| Ade20kError::io(&path, e))?;
        let settings = Self::from_yaml(&contents)
            .map_err(|e| Ade20kError::Settings(format!("{}: {}", path.display(), e)))?;
        info!("Loaded settings from {:?}", path);
        debug!(
            "Settings: index_file={}, image_sizes_file={}, segmentation_suffix={}",
            settings.index_file, settings.image_sizes_file, settings.segmentation_suffix
        );
        Ok(settings)
    }

    pub fn from_yaml(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not a mapping
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
    }
}
