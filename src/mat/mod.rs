/// MATLAB Level 5 MAT-file reader
///
/// Decodes the subset of the MAT format needed for dataset index files:
/// numeric and logical arrays, char arrays, cell arrays and structs.
/// Both byte orders and zlib-compressed elements are supported.
/// MAT 7.3 files are HDF5 containers and are rejected.
/// Format reference: https://www.mathworks.com/help/pdf_doc/matlab/matfile_format.pdf
use std::path::{Path, PathBuf};
use log::debug;
use thiserror::Error;

mod reader;
#[cfg(test)]
pub(crate) mod testutil;

#[derive(Error, Debug)]
pub enum MatError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a Level 5 MAT file: {0}")]
    BadHeader(String),

    #[error("unsupported MAT version 0x{0:04x} (MAT 7.3 files are HDF5 and cannot be read)")]
    UnsupportedVersion(u16),

    #[error("unsupported array class {0}")]
    UnsupportedClass(u8),

    #[error("unexpected data type {ty} in {context}")]
    UnexpectedType { ty: u32, context: &'static str },

    #[error("truncated data: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        needed: usize,
        offset: usize,
        available: usize,
    },

    #[error("array dimensions {dims:?} do not fit in {available} remaining bytes")]
    BadDimensions { dims: Vec<usize>, available: usize },

    #[error("failed to inflate compressed element: {0}")]
    Decompress(#[source] std::io::Error),
}

/// MATLAB array classes (mxCLASS ids)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatClass {
    Double,
    Single,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
}

impl MatClass {
    pub(crate) fn from_id(id: u8) -> Option<Self> {
        Some(match id {
            6 => MatClass::Double,
            7 => MatClass::Single,
            8 => MatClass::Int8,
            9 => MatClass::UInt8,
            10 => MatClass::Int16,
            11 => MatClass::UInt16,
            12 => MatClass::Int32,
            13 => MatClass::UInt32,
            14 => MatClass::Int64,
            15 => MatClass::UInt64,
            _ => return None,
        })
    }
}

/// A decoded MATLAB value. Element data is kept in MATLAB's column-major order.
#[derive(Debug, Clone, PartialEq)]
pub enum MatValue {
    Numeric(NumericArray),
    Char(CharArray),
    Cell(CellArray),
    Struct(StructArray),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    pub class: MatClass,
    pub dims: Vec<usize>,
    pub logical: bool,
    /// Real part, widened to f64
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharArray {
    pub dims: Vec<usize>,
    /// Rows joined with '\n'
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellArray {
    pub dims: Vec<usize>,
    pub cells: Vec<MatValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructArray {
    pub dims: Vec<usize>,
    pub field_names: Vec<String>,
    /// One entry per struct element, each holding one value per field
    pub elements: Vec<Vec<MatValue>>,
}

impl StructArray {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Value of field `name` in struct element `index`
    pub fn field(&self, index: usize, name: &str) -> Option<&MatValue> {
        let position = self.field_names.iter().position(|f| f == name)?;
        self.elements.get(index)?.get(position)
    }
}

impl MatValue {
    pub(crate) fn empty() -> Self {
        MatValue::Numeric(NumericArray {
            class: MatClass::Double,
            dims: vec![0, 0],
            logical: false,
            data: Vec::new(),
        })
    }

    pub fn dims(&self) -> &[usize] {
        match self {
            MatValue::Numeric(a) => &a.dims,
            MatValue::Char(a) => &a.dims,
            MatValue::Cell(a) => &a.dims,
            MatValue::Struct(a) => &a.dims,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MatValue::Char(a) => Some(&a.text),
            _ => None,
        }
    }

    pub fn as_numeric(&self) -> Option<&NumericArray> {
        match self {
            MatValue::Numeric(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_cell(&self) -> Option<&CellArray> {
        match self {
            MatValue::Cell(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructArray> {
        match self {
            MatValue::Struct(a) => Some(a),
            _ => None,
        }
    }
}

/// All top-level variables of a MAT file, in file order
#[derive(Debug, Clone, Default)]
pub struct MatFile {
    pub variables: Vec<(String, MatValue)>,
}

impl MatFile {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MatError> {
        reader::parse_file(bytes)
    }

    pub fn get(&self, name: &str) -> Option<&MatValue> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// Read and decode a MAT file from disk
pub fn read_mat_file(path: &Path) -> Result<MatFile, MatError> {
    let bytes = std::fs::read(path).map_err(|source| MatError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file = MatFile::from_bytes(&bytes)?;
    debug!(
        "Read MAT file {}: {} variable(s)",
        path.display(),
        file.variables.len()
    );
    Ok(file)
}
