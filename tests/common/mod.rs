//! Builds small synthetic SAS7BDAT files, byte by byte, for the
//! integration tests. Only little-endian fixtures are produced; both the
//! 32-bit and the 64-bit layouts are supported.

const MAGIC: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC2, 0xEA, 0x81, 0x60,
    0xB3, 0x14, 0x11, 0xCF, 0xBD, 0x92, 0x08, 0x00, 0x09, 0xC7, 0x31, 0x8C, 0x18, 0x1F, 0x10, 0x11,
];

pub const PAGE_META: u16 = 0;
pub const PAGE_DATA: u16 = 256;
pub const PAGE_MIX: u16 = 512;
pub const PAGE_AMD: u16 = 1024;

#[derive(Clone)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub offset: u64,
    pub length: u64,
    /// 1 = number, 2 = string.
    pub type_code: u8,
    pub format: Option<&'static str>,
}

impl ColumnSpec {
    pub fn number(name: &'static str, offset: u64, length: u64) -> Self {
        Self {
            name,
            offset,
            length,
            type_code: 1,
            format: None,
        }
    }

    pub fn text(name: &'static str, offset: u64, length: u64) -> Self {
        Self {
            name,
            offset,
            length,
            type_code: 2,
            format: None,
        }
    }

    pub fn with_format(mut self, format: &'static str) -> Self {
        self.format = Some(format);
        self
    }
}

pub struct FixtureBuilder {
    pub u64_mode: bool,
    pub page_length: usize,
    pub row_length: u64,
    pub row_count: u64,
    pub mix_page_row_count: u64,
    pub columns: Vec<ColumnSpec>,
    /// Literal embedded in the first text blob, e.g. b"SASYZCRL".
    pub compression_literal: Option<&'static [u8]>,
}

impl FixtureBuilder {
    pub fn new_32(columns: Vec<ColumnSpec>, row_length: u64, row_count: u64) -> Self {
        Self {
            u64_mode: false,
            page_length: 4096,
            row_length,
            row_count,
            mix_page_row_count: 100,
            columns,
            compression_literal: None,
        }
    }

    pub fn new_64(columns: Vec<ColumnSpec>, row_length: u64, row_count: u64) -> Self {
        Self {
            u64_mode: true,
            ..Self::new_32(columns, row_length, row_count)
        }
    }

    fn l(&self) -> usize {
        if self.u64_mode { 8 } else { 4 }
    }

    fn bit_offset(&self) -> usize {
        if self.u64_mode { 32 } else { 16 }
    }

    fn pointer_length(&self) -> usize {
        if self.u64_mode { 24 } else { 12 }
    }

    fn header_length(&self) -> usize {
        if self.u64_mode { 8192 } else { 1024 }
    }

    /// File header: magic, alignment probes, geometry, release fields.
    pub fn header(&self, page_count: u64) -> Vec<u8> {
        let mut bytes = vec![0u8; self.header_length()];
        bytes[..32].copy_from_slice(&MAGIC);
        let align1 = if self.u64_mode {
            bytes[32] = b'3';
            bytes[35] = b'3';
            4
        } else {
            0
        };
        bytes[37] = 0x01; // little-endian
        bytes[39] = b'1'; // unix
        bytes[92..96].copy_from_slice(b"TEST");
        bytes[156..160].copy_from_slice(b"DATA");
        let header_length = u32::try_from(self.header_length()).unwrap();
        let page_length = u32::try_from(self.page_length).unwrap();
        bytes[196 + align1..200 + align1].copy_from_slice(&header_length.to_le_bytes());
        bytes[200 + align1..204 + align1].copy_from_slice(&page_length.to_le_bytes());
        if self.u64_mode {
            bytes[208..216].copy_from_slice(&page_count.to_le_bytes());
        } else {
            let count = u32::try_from(page_count).unwrap();
            bytes[204..208].copy_from_slice(&count.to_le_bytes());
        }
        let total = align1 + if self.u64_mode { 4 } else { 0 };
        bytes[216 + total..224 + total].copy_from_slice(b"9.0401M1");
        bytes
    }

    fn put_int(bytes: &mut [u8], at: usize, value: u64, width: usize) {
        bytes[at..at + width].copy_from_slice(&value.to_le_bytes()[..width]);
    }

    /// The text pool blob plus the (offset, length) of each name and
    /// format within it. The blob keeps its two length-prefix bytes.
    #[allow(clippy::type_complexity)]
    fn text_pool(&self) -> (Vec<u8>, Vec<(u16, u16)>, Vec<Option<(u16, u16)>>) {
        let mut blob = vec![0u8; 8]; // length prefix + padding
        if let Some(literal) = self.compression_literal {
            blob.extend_from_slice(literal);
        }
        let mut name_refs = Vec::new();
        let mut format_refs = Vec::new();
        for column in &self.columns {
            let offset = u16::try_from(blob.len()).unwrap();
            blob.extend_from_slice(column.name.as_bytes());
            name_refs.push((offset, u16::try_from(column.name.len()).unwrap()));
            format_refs.push(column.format.map(|format| {
                let offset = u16::try_from(blob.len()).unwrap();
                blob.extend_from_slice(format.as_bytes());
                (offset, u16::try_from(format.len()).unwrap())
            }));
        }
        let size = u16::try_from(blob.len()).unwrap();
        blob[..2].copy_from_slice(&size.to_le_bytes());
        (blob, name_refs, format_refs)
    }

    fn row_size_subheader(&self) -> Vec<u8> {
        let l = self.l();
        let (lcs_at, lcp_at, len) = if self.u64_mode {
            (682, 706, 708)
        } else {
            (354, 378, 380)
        };
        let mut bytes = vec![0u8; len];
        if self.u64_mode {
            bytes[..4].copy_from_slice(&[0x00, 0x00, 0x00, 0x00]);
            bytes[4..8].copy_from_slice(&[0xF7, 0xF7, 0xF7, 0xF7]);
        } else {
            bytes[..4].copy_from_slice(&[0xF7, 0xF7, 0xF7, 0xF7]);
        }
        Self::put_int(&mut bytes, 5 * l, self.row_length, l);
        Self::put_int(&mut bytes, 6 * l, self.row_count, l);
        Self::put_int(&mut bytes, 9 * l, self.columns.len() as u64, l); // col_count_p1
        Self::put_int(&mut bytes, 10 * l, 0, l); // col_count_p2
        Self::put_int(&mut bytes, 15 * l, self.mix_page_row_count, l);
        Self::put_int(&mut bytes, lcs_at, 0, 2);
        Self::put_int(&mut bytes, lcp_at, 0, 2);
        bytes
    }

    fn column_size_subheader(&self) -> Vec<u8> {
        let l = self.l();
        let mut bytes = vec![0u8; 2 * l];
        if self.u64_mode {
            bytes[..4].copy_from_slice(&[0x00, 0x00, 0x00, 0x00]);
            bytes[4..8].copy_from_slice(&[0xF6, 0xF6, 0xF6, 0xF6]);
        } else {
            bytes[..4].copy_from_slice(&[0xF6, 0xF6, 0xF6, 0xF6]);
        }
        Self::put_int(&mut bytes, l, self.columns.len() as u64, l);
        bytes
    }

    fn column_text_subheader(&self, blob: &[u8]) -> Vec<u8> {
        let l = self.l();
        let mut bytes = vec![0u8; l];
        bytes[..l].copy_from_slice(&signature_bytes(0xFFFF_FFFD, self.u64_mode));
        bytes.extend_from_slice(blob);
        bytes
    }

    fn column_name_subheader(&self, name_refs: &[(u16, u16)]) -> Vec<u8> {
        let l = self.l();
        let mut bytes = vec![0u8; l + 8];
        bytes[..l].copy_from_slice(&signature_bytes(0xFFFF_FFFF, self.u64_mode));
        for (offset, length) in name_refs {
            bytes.extend_from_slice(&0u16.to_le_bytes()); // text blob index
            bytes.extend_from_slice(&offset.to_le_bytes());
            bytes.extend_from_slice(&length.to_le_bytes());
            bytes.extend_from_slice(&0u16.to_le_bytes());
        }
        bytes.extend_from_slice(&vec![0u8; l + 4]); // trailer
        bytes
    }

    fn column_attributes_subheader(&self) -> Vec<u8> {
        let l = self.l();
        let mut bytes = vec![0u8; l + 8];
        bytes[..l].copy_from_slice(&signature_bytes(0xFFFF_FFFC, self.u64_mode));
        for column in &self.columns {
            let start = bytes.len();
            bytes.resize(start + l + 8, 0);
            Self::put_int(&mut bytes, start, column.offset, l);
            Self::put_int(&mut bytes, start + l, column.length, 4);
            bytes[start + l + 4] = column.type_code;
        }
        bytes.extend_from_slice(&vec![0u8; l + 4]); // trailer
        bytes
    }

    fn format_subheader(&self, format_ref: Option<(u16, u16)>) -> Vec<u8> {
        let l = self.l();
        let mut bytes = vec![0u8; 3 * l + 12];
        bytes[..l].copy_from_slice(&signature_bytes(0xFFFF_FBFE, self.u64_mode));
        if let Some((offset, length)) = format_ref {
            bytes[3 * l + 2..3 * l + 4].copy_from_slice(&offset.to_le_bytes());
            bytes[3 * l + 4..3 * l + 6].copy_from_slice(&length.to_le_bytes());
        }
        bytes
    }

    fn schema_subheaders(&self) -> Vec<Vec<u8>> {
        let (blob, name_refs, format_refs) = self.text_pool();
        let mut subheaders = vec![
            self.row_size_subheader(),
            self.column_size_subheader(),
            self.column_text_subheader(&blob),
            self.column_name_subheader(&name_refs),
            self.column_attributes_subheader(),
        ];
        for format_ref in format_refs {
            subheaders.push(self.format_subheader(format_ref));
        }
        subheaders
    }

    fn page_shell(&self, page_type: u16, block_count: u16, subheader_count: u16) -> Vec<u8> {
        let mut page = vec![0u8; self.page_length];
        let bit = self.bit_offset();
        page[bit..bit + 2].copy_from_slice(&page_type.to_le_bytes());
        page[bit + 2..bit + 4].copy_from_slice(&block_count.to_le_bytes());
        page[bit + 4..bit + 6].copy_from_slice(&subheader_count.to_le_bytes());
        page
    }

    fn write_pointer(
        &self,
        page: &mut [u8],
        index: usize,
        offset: usize,
        length: usize,
        compression: u8,
        type_code: u8,
    ) {
        let l = self.l();
        let at = self.bit_offset() + 8 + index * self.pointer_length();
        Self::put_int(page, at, offset as u64, l);
        Self::put_int(page, at + l, length as u64, l);
        page[at + 2 * l] = compression;
        page[at + 2 * l + 1] = type_code;
    }

    /// A META page carrying the full schema, plus optional data subheaders
    /// (one compressed row each).
    pub fn meta_page(&self, data_subheaders: &[Vec<u8>]) -> Vec<u8> {
        let subheaders = self.schema_subheaders();
        let total = subheaders.len() + data_subheaders.len();
        let mut page = self.page_shell(PAGE_META, 0, u16::try_from(total).unwrap());

        // Bodies pack from the page tail, pointers from the front.
        let mut tail = self.page_length;
        for (index, body) in subheaders.iter().chain(data_subheaders).enumerate() {
            tail -= body.len();
            page[tail..tail + body.len()].copy_from_slice(body);
            let compression = if index >= subheaders.len() { 4 } else { 0 };
            let type_code = if index >= subheaders.len() { 1 } else { 0 };
            self.write_pointer(&mut page, index, tail, body.len(), compression, type_code);
        }
        page
    }

    /// A page of the given type carrying only data subheaders, no schema.
    pub fn data_pointer_page(&self, page_type: u16, data_subheaders: &[Vec<u8>]) -> Vec<u8> {
        let mut page =
            self.page_shell(page_type, 0, u16::try_from(data_subheaders.len()).unwrap());
        let mut tail = self.page_length;
        for (index, body) in data_subheaders.iter().enumerate() {
            tail -= body.len();
            page[tail..tail + body.len()].copy_from_slice(body);
            self.write_pointer(&mut page, index, tail, body.len(), 4, 1);
        }
        page
    }

    /// A DATA page with rows packed after the header words.
    pub fn data_page(&self, rows: &[Vec<u8>]) -> Vec<u8> {
        let mut page = self.page_shell(PAGE_DATA, u16::try_from(rows.len()).unwrap(), 0);
        let mut at = self.bit_offset() + 8;
        for row in rows {
            assert_eq!(row.len() as u64, self.row_length);
            page[at..at + row.len()].copy_from_slice(row);
            at += row.len();
        }
        page
    }

    /// A MIX page carrying the schema subheaders and packed rows. When
    /// `shifted` the rows sit behind the 8-byte alignment correction.
    pub fn mix_page(&self, rows: &[Vec<u8>], shifted: bool) -> Vec<u8> {
        let subheaders = self.schema_subheaders();
        let count = subheaders.len();
        let mut page = self.page_shell(PAGE_MIX, 0, u16::try_from(count).unwrap());

        let mut tail = self.page_length;
        for (index, body) in subheaders.iter().enumerate() {
            tail -= body.len();
            page[tail..tail + body.len()].copy_from_slice(body);
            self.write_pointer(&mut page, index, tail, body.len(), 0, 0);
        }

        let pointer_area = count * self.pointer_length();
        let base = self.bit_offset() + 8 + pointer_area;
        let shift = if shifted {
            (self.bit_offset() + 8 + pointer_area) % 8
        } else {
            0
        };
        let mut at = base + shift;
        for row in rows {
            assert_eq!(row.len() as u64, self.row_length);
            assert!(at + row.len() <= tail, "rows collide with subheaders");
            page[at..at + row.len()].copy_from_slice(row);
            at += row.len();
        }
        page
    }

    /// Assembles header plus pages into a complete file.
    pub fn file(&self, pages: &[Vec<u8>]) -> Vec<u8> {
        let mut bytes = self.header(pages.len() as u64);
        for page in pages {
            assert_eq!(page.len(), self.page_length);
            bytes.extend_from_slice(page);
        }
        bytes
    }
}

/// Little-endian on-disk signature: the 64-bit forms prepend 0x00000000 to
/// the F6/F7 families and sign-extend the 0xFFFF.... families with 0xFF.
fn signature_bytes(low_word: u32, u64_mode: bool) -> Vec<u8> {
    if !u64_mode {
        return low_word.to_le_bytes().to_vec();
    }
    let mut bytes = Vec::with_capacity(8);
    match low_word {
        0xF7F7_F7F7 | 0xF6F6_F6F6 => {
            bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
            bytes.extend_from_slice(&low_word.to_le_bytes());
        }
        _ => {
            bytes.extend_from_slice(&low_word.to_le_bytes());
            bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
        }
    }
    bytes
}

/// Encodes a numeric cell as a little-endian double of `width` bytes.
pub fn double_cell(value: f64, width: usize) -> Vec<u8> {
    f64::to_le_bytes(value)[..width].to_vec()
}

/// Encodes a text cell padded with spaces to `width` bytes.
pub fn text_cell(value: &str, width: usize) -> Vec<u8> {
    let mut bytes = value.as_bytes().to_vec();
    assert!(bytes.len() <= width);
    bytes.resize(width, b' ');
    bytes
}
