// Default values for configuration
// These serve as fallback values when the settings file omits a key
pub const DEFAULT_INDEX_FILE: &str = "index_ade20k.mat";
pub const DEFAULT_IMAGE_SIZES_FILE: &str = "image_sizes.pkl";
pub const DEFAULT_SEGMENTATION_SUFFIX: &str = "_seg.png";
pub const DEFAULT_SOURCE_NAME: &str = "ade20k";

pub const APP_NAME: &str = "ade20k-masks";
pub const SETTINGS_FILE_NAME: &str = "settings.yaml";

// Substrings that select a subset from an image's relative path
pub const TRAIN_PATH_MARKER: &str = "training";
pub const VAL_PATH_MARKER: &str = "validation";
