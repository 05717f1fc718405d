/// ADE20K dataset index
///
/// The index ships as `index_ade20k.mat`, a MATLAB struct named `index`
/// holding parallel per-image arrays (`filename`, `folder`), a class × image
/// `objectPresence` matrix, and per-class `objectnames`. A JSON rendition of
/// the same four fields is accepted too.
use std::path::{Path, PathBuf};
use log::{debug, info};
use ndarray::{Array2, ShapeBuilder};
use serde::Deserialize;

use crate::error::{Ade20kError, IndexError, Result};
use crate::mat::{read_mat_file, MatFile, MatValue};

const FIELD_FILENAME: &str = "filename";
const FIELD_FOLDER: &str = "folder";
const FIELD_PRESENCE: &str = "objectPresence";
const FIELD_OBJECT_NAMES: &str = "objectnames";

#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    filenames: Vec<String>,
    folders: Vec<String>,
    /// Rows are classes, columns are images; non-zero means present
    presence: Array2<u32>,
    object_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JsonIndex {
    filename: Vec<String>,
    folder: Vec<String>,
    /// One row per class, one entry per image
    #[serde(rename = "objectPresence")]
    object_presence: Vec<Vec<u32>>,
    objectnames: Vec<String>,
}

impl IndexRecord {
    pub fn new(
        filenames: Vec<String>,
        folders: Vec<String>,
        presence: Array2<u32>,
        object_names: Vec<String>,
    ) -> std::result::Result<Self, IndexError> {
        if filenames.len() != folders.len() {
            return Err(IndexError::Malformed(format!(
                "{} filenames but {} folders",
                filenames.len(),
                folders.len()
            )));
        }
        if presence.ncols() != filenames.len() {
            return Err(IndexError::Malformed(format!(
                "presence matrix has {} columns for {} images",
                presence.ncols(),
                filenames.len()
            )));
        }
        if presence.nrows() != object_names.len() {
            return Err(IndexError::Malformed(format!(
                "presence matrix has {} rows for {} object names",
                presence.nrows(),
                object_names.len()
            )));
        }
        Ok(Self { filenames, folders, presence, object_names })
    }

    /// Load an index file, choosing the decoder by extension (.json, otherwise MAT)
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading dataset index: {}", path.display());
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let record = if is_json {
            let content = std::fs::read_to_string(path).map_err(|e| Ade20kError::io(path, e))?;
            Self::from_json_str(&content)?
        } else {
            Self::from_mat(&read_mat_file(path)?)?
        };
        info!(
            "Index parsed: {} images, {} classes",
            record.num_images(),
            record.num_classes()
        );
        Ok(record)
    }

    pub fn from_json_str(content: &str) -> std::result::Result<Self, IndexError> {
        let raw: JsonIndex = serde_json::from_str(content)?;
        let images = raw.filename.len();
        let classes = raw.object_presence.len();
        let mut flat = Vec::with_capacity(images * classes);
        for (class_id, row) in raw.object_presence.iter().enumerate() {
            if row.len() != images {
                return Err(IndexError::Malformed(format!(
                    "presence row {} has {} entries for {} images",
                    class_id,
                    row.len(),
                    images
                )));
            }
            flat.extend_from_slice(row);
        }
        let presence = Array2::from_shape_vec((classes, images), flat)
            .map_err(|e| IndexError::Malformed(e.to_string()))?;
        Self::new(raw.filename, raw.folder, presence, raw.objectnames)
    }

    /// Extract the index from a decoded MAT file.
    /// Accepts the top-level `index` variable, or the first struct variable.
    pub fn from_mat(file: &MatFile) -> std::result::Result<Self, IndexError> {
        let index = file
            .get("index")
            .or_else(|| file.variables.iter().map(|(_, v)| v).find(|v| v.as_struct().is_some()))
            .and_then(MatValue::as_struct)
            .ok_or(IndexError::MissingField("index"))?;
        if index.is_empty() {
            return Err(IndexError::Malformed("index struct has no elements".to_string()));
        }

        let field = |name: &'static str| index.field(0, name).ok_or(IndexError::MissingField(name));

        let filenames = string_cells(field(FIELD_FILENAME)?, FIELD_FILENAME)?;
        let folders = string_cells(field(FIELD_FOLDER)?, FIELD_FOLDER)?;
        let object_names = string_cells(field(FIELD_OBJECT_NAMES)?, FIELD_OBJECT_NAMES)?;

        let presence = field(FIELD_PRESENCE)?
            .as_numeric()
            .ok_or(IndexError::FieldType {
                field: FIELD_PRESENCE,
                expected: "numeric matrix",
            })?;
        let (rows, cols) = match presence.dims.as_slice() {
            [rows, cols] => (*rows, *cols),
            dims => {
                return Err(IndexError::Malformed(format!(
                    "{} must be 2-dimensional, got {:?}",
                    FIELD_PRESENCE, dims
                )))
            }
        };
        // MATLAB stores column-major; negative or fractional counts saturate
        let counts: Vec<u32> = presence.data.iter().map(|&v| v as u32).collect();
        let presence = Array2::from_shape_vec((rows, cols).f(), counts)
            .map_err(|e| IndexError::Malformed(e.to_string()))?;
        debug!("Presence matrix: {} classes x {} images", rows, cols);

        Self::new(filenames, folders, presence, object_names)
    }

    pub fn num_images(&self) -> usize {
        self.filenames.len()
    }

    pub fn num_classes(&self) -> usize {
        self.object_names.len()
    }

    pub fn presence(&self) -> &Array2<u32> {
        &self.presence
    }

    pub fn object_name(&self, class_id: usize) -> Option<&str> {
        self.object_names.get(class_id).map(String::as_str)
    }

    /// `folder/filename`, the key used by the image size table
    pub fn relative_path(&self, image: usize) -> String {
        format!("{}/{}", self.folders[image], self.filenames[image])
    }

    /// The relative path resolved under `dataset_dir`, dropping its leading
    /// archive folder (e.g. `ADE20K_2016_07_26/`).
    pub fn absolute_path(&self, dataset_dir: &Path, image: usize) -> PathBuf {
        let relative = self.relative_path(image);
        let trimmed = match relative.split_once('/') {
            Some((_, rest)) if !rest.is_empty() => rest,
            _ => relative.as_str(),
        };
        trimmed
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(dataset_dir.to_path_buf(), |path, part| path.join(part))
    }
}

fn string_cells(value: &MatValue, field: &'static str) -> std::result::Result<Vec<String>, IndexError> {
    let cells = value.as_cell().ok_or(IndexError::FieldType {
        field,
        expected: "cell array of strings",
    })?;
    cells
        .cells
        .iter()
        .map(|cell| {
            cell.as_str().map(str::to_string).ok_or(IndexError::FieldType {
                field,
                expected: "cell array of strings",
            })
        })
        .collect()
}
