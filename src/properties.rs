use time::OffsetDateTime;

/// Byte order of all multi-byte fields in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Platform marker recorded in the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
    Unknown,
}

/// Row compression scheme declared by the first column-text subheader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    /// `SASYZCRL`, the byte-oriented run-length scheme decoded by this crate.
    Rle,
    /// `SASYZCR2`, Ross Data Compression. Recognized but not decoded.
    Rdc,
}

impl Compression {
    #[must_use]
    pub const fn is_compressed(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Number,
    Text,
}

/// File-level properties collected from the header and the metadata
/// subheaders. Frozen before the first data row is emitted.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    /// True when the file uses the 64-bit layout: integer fields and
    /// subheader pointers widen to 8 bytes.
    pub uses_u64: bool,
    pub endianness: Endianness,
    pub platform: Platform,

    // Geometry from the header.
    pub header_length: u32,
    pub page_length: u32,
    pub page_count: u64,

    // Table shape from the RowSize and ColumnSize subheaders.
    pub row_length: u64,
    pub row_count: u64,
    pub column_count: usize,
    pub col_count_p1: u64,
    pub col_count_p2: u64,
    pub mix_page_row_count: u64,

    /// Lengths of the creator and creator-proc strings in the text pool.
    pub lcs: u16,
    pub lcp: u16,

    pub compression: Compression,

    // Informational fields.
    pub name: String,
    pub file_type: String,
    pub date_created: Option<OffsetDateTime>,
    pub date_modified: Option<OffsetDateTime>,
    pub sas_release: String,
    pub server_type: String,
    pub os_type: String,
    pub os_name: String,
    pub creator: String,
    pub creator_proc: String,
}

impl Default for Endianness {
    fn default() -> Self {
        Self::Little
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::Unknown
    }
}

impl Default for Compression {
    fn default() -> Self {
        Self::None
    }
}

/// One column of the dataset schema.
///
/// Columns are appended in file order while the metadata pages are walked:
/// names arrive from ColumnName subheaders, offsets/lengths/types from
/// ColumnAttributes, and the column itself materializes when the matching
/// FormatAndLabel subheader is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub index: usize,
    pub name: String,
    pub label: String,
    /// Format directive text, e.g. `"DATE"` or `"DATETIME"`. Empty when the
    /// column carries no format.
    pub format: String,
    pub kind: ColumnType,
    /// Width of the column's slice within a row, in bytes.
    pub length: u64,
}
