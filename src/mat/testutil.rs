//! Minimal Level 5 MAT encoder used to build fixtures for reader and index tests.
use std::io::Write;
use flate2::write::ZlibEncoder;
use flate2::Compression;

pub(crate) struct MatWriter {
    big_endian: bool,
}

impl MatWriter {
    pub(crate) fn little() -> Self {
        Self { big_endian: false }
    }

    pub(crate) fn big() -> Self {
        Self { big_endian: true }
    }

    fn u16(&self, v: u16) -> [u8; 2] {
        if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() }
    }

    fn u32(&self, v: u32) -> [u8; 4] {
        if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() }
    }

    fn f64(&self, v: f64) -> [u8; 8] {
        if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() }
    }

    pub(crate) fn element(&self, ty: u32, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() + 16);
        out.extend_from_slice(&self.u32(ty));
        out.extend_from_slice(&self.u32(data.len() as u32));
        out.extend_from_slice(data);
        while out.len() % 8 != 0 {
            out.push(0);
        }
        out
    }

    pub(crate) fn small_element(&self, ty: u32, data: &[u8]) -> Vec<u8> {
        assert!(data.len() <= 4);
        let mut out = Vec::with_capacity(8);
        out.extend_from_slice(&self.u32(((data.len() as u32) << 16) | ty));
        out.extend_from_slice(data);
        out.resize(8, 0);
        out
    }

    pub(crate) fn matrix(&self, class: u8, flags: u32, dims: &[usize], name: &str, body: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        let mut flag_bytes = Vec::new();
        flag_bytes.extend_from_slice(&self.u32(class as u32 | flags));
        flag_bytes.extend_from_slice(&self.u32(0));
        data.extend(self.element(6, &flag_bytes));
        let dim_bytes: Vec<u8> = dims.iter().flat_map(|&d| self.u32(d as u32)).collect();
        data.extend(self.element(5, &dim_bytes));
        data.extend(self.element(1, name.as_bytes()));
        data.extend_from_slice(body);
        self.element(14, &data)
    }

    pub(crate) fn empty_matrix(&self) -> Vec<u8> {
        self.element(14, &[])
    }

    pub(crate) fn char_array(&self, name: &str, text: &str) -> Vec<u8> {
        let units: Vec<u16> = text.encode_utf16().collect();
        self.char_matrix_units(name, 1, &units)
    }

    /// `column_major` holds the characters in MATLAB storage order
    pub(crate) fn char_matrix(&self, name: &str, rows: usize, column_major: &str) -> Vec<u8> {
        let units: Vec<u16> = column_major.encode_utf16().collect();
        self.char_matrix_units(name, rows, &units)
    }

    fn char_matrix_units(&self, name: &str, rows: usize, units: &[u16]) -> Vec<u8> {
        let cols = if rows == 0 { 0 } else { units.len() / rows };
        let bytes: Vec<u8> = units.iter().flat_map(|&u| self.u16(u)).collect();
        self.matrix(4, 0, &[rows, cols], name, &self.element(4, &bytes))
    }

    pub(crate) fn double_array(&self, name: &str, rows: usize, cols: usize, column_major: &[f64]) -> Vec<u8> {
        let bytes: Vec<u8> = column_major.iter().flat_map(|&v| self.f64(v)).collect();
        self.matrix(6, 0, &[rows, cols], name, &self.element(9, &bytes))
    }

    pub(crate) fn logical_array(&self, name: &str, rows: usize, cols: usize, column_major: &[u8]) -> Vec<u8> {
        self.matrix(9, 0x0200, &[rows, cols], name, &self.element(2, column_major))
    }

    pub(crate) fn cell_row(&self, name: &str, cells: Vec<Vec<u8>>) -> Vec<u8> {
        let n = cells.len();
        let body: Vec<u8> = cells.into_iter().flatten().collect();
        self.matrix(1, 0, &[1, n], name, &body)
    }

    pub(crate) fn struct_scalar(&self, name: &str, fields: &[(&str, Vec<u8>)]) -> Vec<u8> {
        const NAME_LEN: usize = 32;
        let mut body = self.small_element(5, &self.u32(NAME_LEN as u32));
        let mut names = Vec::new();
        for (field, _) in fields {
            let mut padded = field.as_bytes().to_vec();
            padded.resize(NAME_LEN, 0);
            names.extend(padded);
        }
        body.extend(self.element(1, &names));
        for (_, value) in fields {
            body.extend_from_slice(value);
        }
        self.matrix(2, 0, &[1, 1], name, &body)
    }

    /// Wrap a complete element in an miCOMPRESSED element
    pub(crate) fn compressed(&self, element: Vec<u8>) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&element).unwrap();
        let data = encoder.finish().unwrap();
        let mut out = Vec::new();
        out.extend_from_slice(&self.u32(15));
        out.extend_from_slice(&self.u32(data.len() as u32));
        out.extend(data);
        out
    }

    pub(crate) fn file(&self, variables: &[Vec<u8>]) -> Vec<u8> {
        let mut header = b"MATLAB 5.0 MAT-file, written by ade20k-masks tests".to_vec();
        header.resize(116, b' ');
        header.extend_from_slice(&[0u8; 8]);
        header.extend_from_slice(&self.u16(0x0100));
        header.extend_from_slice(if self.big_endian { b"MI" } else { b"IM" });
        for var in variables {
            header.extend_from_slice(var);
        }
        header
    }
}
