/// Element-level decoding for Level 5 MAT files
///
/// Every data element starts with an 8-byte tag (type, byte count) and is
/// padded to an 8-byte boundary. "Small" elements of up to 4 bytes pack the
/// tag and data into a single 8-byte word. Compressed elements wrap one zlib
/// stream holding a complete element and are not padded.
use std::io::Read;
use flate2::read::ZlibDecoder;

use super::{CellArray, CharArray, MatClass, MatError, MatFile, MatValue, NumericArray, StructArray};

const HEADER_LEN: usize = 128;

const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;
const MI_UTF8: u32 = 16;
const MI_UTF16: u32 = 17;
const MI_UTF32: u32 = 18;

const MX_CELL: u8 = 1;
const MX_STRUCT: u8 = 2;
const MX_CHAR: u8 = 4;

const FLAG_LOGICAL: u32 = 0x0200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8], endian: Endian) -> Self {
        Self { buf, pos: 0, endian }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], MatError> {
        if n > self.remaining() {
            return Err(MatError::Truncated {
                needed: n,
                offset: self.pos,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, MatError> {
        let bytes = self.take(4)?;
        Ok(read_u32(bytes, self.endian))
    }

    /// Skip padding; a missing pad after the final element is tolerated.
    fn align8(&mut self) {
        let padded = (self.pos + 7) & !7;
        self.pos = padded.min(self.buf.len());
    }

    /// Read one data element, returning its type and payload
    fn element(&mut self) -> Result<(u32, &'a [u8]), MatError> {
        let first = self.u32()?;
        if first >> 16 != 0 {
            let ty = first & 0xffff;
            let len = (first >> 16) as usize;
            let word = self.take(4)?;
            if len > 4 {
                return Err(MatError::UnexpectedType { ty, context: "small data element" });
            }
            return Ok((ty, &word[..len]));
        }
        let ty = first;
        let len = self.u32()? as usize;
        let data = self.take(len)?;
        if ty != MI_COMPRESSED {
            self.align8();
        }
        Ok((ty, data))
    }
}

fn read_u16(b: &[u8], endian: Endian) -> u16 {
    let arr = [b[0], b[1]];
    match endian {
        Endian::Little => u16::from_le_bytes(arr),
        Endian::Big => u16::from_be_bytes(arr),
    }
}

fn read_u32(b: &[u8], endian: Endian) -> u32 {
    let arr = [b[0], b[1], b[2], b[3]];
    match endian {
        Endian::Little => u32::from_le_bytes(arr),
        Endian::Big => u32::from_be_bytes(arr),
    }
}

fn read_u64(b: &[u8], endian: Endian) -> u64 {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&b[..8]);
    match endian {
        Endian::Little => u64::from_le_bytes(arr),
        Endian::Big => u64::from_be_bytes(arr),
    }
}

pub(super) fn parse_file(bytes: &[u8]) -> Result<MatFile, MatError> {
    if bytes.len() < HEADER_LEN {
        return Err(MatError::BadHeader(format!(
            "file is {} bytes, shorter than the 128-byte header",
            bytes.len()
        )));
    }
    let header = &bytes[..HEADER_LEN];
    if !header.starts_with(b"MATLAB") {
        return Err(MatError::BadHeader("missing 'MATLAB' header text".to_string()));
    }

    let endian = match &header[126..128] {
        b"IM" => Endian::Little,
        b"MI" => Endian::Big,
        other => {
            return Err(MatError::BadHeader(format!(
                "invalid endian indicator {:?}",
                String::from_utf8_lossy(other)
            )))
        }
    };
    let version = read_u16(&header[124..126], endian);
    if version != 0x0100 {
        return Err(MatError::UnsupportedVersion(version));
    }

    let mut cursor = Cursor::new(&bytes[HEADER_LEN..], endian);
    let mut file = MatFile::default();
    while cursor.remaining() >= 8 {
        let (ty, data) = cursor.element()?;
        match ty {
            MI_MATRIX => file.variables.push(parse_matrix(data, endian)?),
            MI_COMPRESSED => {
                let inflated = inflate(data)?;
                let mut inner = Cursor::new(&inflated, endian);
                let (inner_ty, inner_data) = inner.element()?;
                if inner_ty == MI_MATRIX {
                    file.variables.push(parse_matrix(inner_data, endian)?);
                }
            }
            // Anything else at top level (e.g. subsystem data) carries no variables
            _ => {}
        }
    }
    Ok(file)
}

fn inflate(data: &[u8]) -> Result<Vec<u8>, MatError> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(MatError::Decompress)?;
    Ok(out)
}

/// Parse the payload of an miMATRIX element into (name, value)
fn parse_matrix(data: &[u8], endian: Endian) -> Result<(String, MatValue), MatError> {
    // Empty cell entries are written as zero-length matrices
    if data.is_empty() {
        return Ok((String::new(), MatValue::empty()));
    }
    let mut cursor = Cursor::new(data, endian);

    let (ty, flags) = cursor.element()?;
    if ty != MI_UINT32 || flags.len() < 4 {
        return Err(MatError::UnexpectedType { ty, context: "array flags" });
    }
    let flags = read_u32(flags, endian);
    let class_id = (flags & 0xff) as u8;

    let (ty, dims_data) = cursor.element()?;
    if ty != MI_INT32 {
        return Err(MatError::UnexpectedType { ty, context: "dimensions" });
    }
    let dims: Vec<usize> = dims_data
        .chunks_exact(4)
        .map(|c| read_u32(c, endian) as i32)
        .map(|d| d.max(0) as usize)
        .collect();

    let (ty, name_data) = cursor.element()?;
    if ty != MI_INT8 && ty != MI_UINT8 {
        return Err(MatError::UnexpectedType { ty, context: "array name" });
    }
    let name = String::from_utf8_lossy(name_data).into_owned();

    let value = match class_id {
        MX_CELL => {
            let count = element_count(&dims, 1, cursor.remaining())?;
            let mut cells = Vec::with_capacity(count);
            for _ in 0..count {
                cells.push(read_nested(&mut cursor, endian)?);
            }
            MatValue::Cell(CellArray { dims, cells })
        }
        MX_STRUCT => {
            let (ty, len_data) = cursor.element()?;
            if ty != MI_INT32 || len_data.len() < 4 {
                return Err(MatError::UnexpectedType { ty, context: "field name length" });
            }
            let name_len = read_u32(len_data, endian) as usize;
            let (ty, names_data) = cursor.element()?;
            if ty != MI_INT8 && ty != MI_UINT8 {
                return Err(MatError::UnexpectedType { ty, context: "field names" });
            }
            let field_names: Vec<String> = if name_len == 0 {
                Vec::new()
            } else {
                names_data
                    .chunks(name_len)
                    .map(|chunk| {
                        let end = chunk.iter().position(|&b| b == 0).unwrap_or(chunk.len());
                        String::from_utf8_lossy(&chunk[..end]).into_owned()
                    })
                    .collect()
            };
            // Zero-field structs carry no per-element data
            let count = if field_names.is_empty() {
                element_count(&dims, 0, data.len())?
            } else {
                element_count(&dims, field_names.len(), cursor.remaining())?
            };
            let mut elements = Vec::with_capacity(count);
            for _ in 0..count {
                let mut values = Vec::with_capacity(field_names.len());
                for _ in 0..field_names.len() {
                    values.push(read_nested(&mut cursor, endian)?);
                }
                elements.push(values);
            }
            MatValue::Struct(StructArray { dims, field_names, elements })
        }
        MX_CHAR => {
            let chars = if cursor.remaining() >= 8 {
                let (ty, char_data) = cursor.element()?;
                decode_chars(ty, char_data, endian)?
            } else {
                Vec::new()
            };
            MatValue::Char(CharArray {
                text: arrange_char_rows(&dims, chars),
                dims,
            })
        }
        id => {
            let class = MatClass::from_id(id).ok_or(MatError::UnsupportedClass(id))?;
            let data = if cursor.remaining() >= 8 {
                let (ty, real) = cursor.element()?;
                decode_numbers(ty, real, endian)?
            } else {
                Vec::new()
            };
            // Imaginary part of complex arrays is left unread
            MatValue::Numeric(NumericArray {
                class,
                dims,
                logical: flags & FLAG_LOGICAL != 0,
                data,
            })
        }
    };
    Ok((name, value))
}

/// Number of elements declared by `dims`, checked against the bytes left.
/// Each nested value needs at least one 8-byte tag, `per_element` per element.
fn element_count(dims: &[usize], per_element: usize, available: usize) -> Result<usize, MatError> {
    let bad = || MatError::BadDimensions { dims: dims.to_vec(), available };
    let count = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(bad)?;
    let limit = if per_element == 0 { available } else { available / 8 };
    match count.checked_mul(per_element.max(1)) {
        Some(tags) if tags <= limit => Ok(count),
        _ => Err(bad()),
    }
}

fn read_nested(cursor: &mut Cursor<'_>, endian: Endian) -> Result<MatValue, MatError> {
    let (ty, data) = cursor.element()?;
    if ty != MI_MATRIX {
        return Err(MatError::UnexpectedType { ty, context: "nested array" });
    }
    Ok(parse_matrix(data, endian)?.1)
}

fn decode_numbers(ty: u32, data: &[u8], endian: Endian) -> Result<Vec<f64>, MatError> {
    let values = match ty {
        MI_INT8 => data.iter().map(|&b| b as i8 as f64).collect(),
        MI_UINT8 => data.iter().map(|&b| b as f64).collect(),
        MI_INT16 => data.chunks_exact(2).map(|c| read_u16(c, endian) as i16 as f64).collect(),
        MI_UINT16 => data.chunks_exact(2).map(|c| read_u16(c, endian) as f64).collect(),
        MI_INT32 => data.chunks_exact(4).map(|c| read_u32(c, endian) as i32 as f64).collect(),
        MI_UINT32 => data.chunks_exact(4).map(|c| read_u32(c, endian) as f64).collect(),
        MI_SINGLE => data
            .chunks_exact(4)
            .map(|c| f32::from_bits(read_u32(c, endian)) as f64)
            .collect(),
        MI_DOUBLE => data
            .chunks_exact(8)
            .map(|c| f64::from_bits(read_u64(c, endian)))
            .collect(),
        MI_INT64 => data.chunks_exact(8).map(|c| read_u64(c, endian) as i64 as f64).collect(),
        MI_UINT64 => data.chunks_exact(8).map(|c| read_u64(c, endian) as f64).collect(),
        ty => return Err(MatError::UnexpectedType { ty, context: "numeric data" }),
    };
    Ok(values)
}

fn decode_chars(ty: u32, data: &[u8], endian: Endian) -> Result<Vec<char>, MatError> {
    let chars = match ty {
        MI_UTF8 => String::from_utf8_lossy(data).chars().collect(),
        MI_INT8 | MI_UINT8 => data.iter().map(|&b| b as char).collect(),
        MI_UTF16 | MI_UINT16 | MI_INT16 => {
            let units = data.chunks_exact(2).map(|c| read_u16(c, endian));
            char::decode_utf16(units)
                .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
        MI_UTF32 | MI_UINT32 | MI_INT32 => data
            .chunks_exact(4)
            .map(|c| char::from_u32(read_u32(c, endian)).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect(),
        ty => return Err(MatError::UnexpectedType { ty, context: "char data" }),
    };
    Ok(chars)
}

/// Char data is column-major; rebuild the rows and join them with newlines.
fn arrange_char_rows(dims: &[usize], chars: Vec<char>) -> String {
    let rows = dims.first().copied().unwrap_or(0);
    if rows <= 1 || chars.len() % rows != 0 {
        return chars.into_iter().collect();
    }
    let cols = chars.len() / rows;
    (0..rows)
        .map(|r| (0..cols).map(|c| chars[r + rows * c]).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
