use std::borrow::Cow;
use std::io;

/// Result type used across the SAS7BDAT stream reader.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the reader.
///
/// Structural failures abort the whole parse; row-level failures abort the
/// current read but leave the metadata already collected available for
/// inspection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O failure while reading from the underlying byte source.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The file is shorter than the fixed header prefix.
    #[error("file header too short: {actual} bytes, need at least {needed}")]
    HeaderTooShort { actual: usize, needed: usize },

    /// The first 32 bytes do not match the SAS7BDAT magic number.
    #[error("not a SAS7BDAT file: magic number mismatch")]
    BadMagic,

    /// A read from the byte source returned fewer bytes than requested.
    #[error("short read at offset {offset}: wanted {wanted} bytes, got {got}")]
    ShortRead {
        offset: u64,
        wanted: usize,
        got: usize,
    },

    /// A page could not be read in full.
    #[error("incomplete page {page}: wanted {wanted} bytes, got {got}")]
    IncompleteRead {
        page: u64,
        wanted: usize,
        got: usize,
    },

    /// A second row-size subheader was found; exactly one is allowed.
    #[error("duplicate row size subheader")]
    DuplicateRowSize,

    /// A second column-size subheader was found; exactly one is allowed.
    #[error("duplicate column size subheader")]
    DuplicateColumnSize,

    /// A row-size field (`col_count_p1`, `col_count_p2`,
    /// `mix_page_row_count`, ...) was assigned more than once.
    #[error("duplicate {field} value in row size subheader")]
    DuplicateRowSizeField { field: &'static str },

    /// The RLE stream contained a control byte outside the ten families.
    #[error("unknown RLE control byte 0x{byte:02X} at compressed offset {position}")]
    UnknownControlByte { byte: u8, position: usize },

    /// A decompressed row did not come out at the declared row length.
    #[error("decompressed row length mismatch: expected {expected} bytes, produced {actual}")]
    DecompressedLengthMismatch { expected: usize, actual: usize },

    /// A page type outside the known set was fetched during row iteration.
    #[error("unknown page type 0x{page_type:04X} on page {page}")]
    UnknownPageType { page_type: u16, page: u64 },

    /// The dataset uses a compression scheme this reader does not decode.
    #[error("unsupported compression method {method}")]
    UnsupportedCompression { method: &'static str },

    /// Text could not be converted with the configured encoding.
    #[error("encoding conversion with {encoding} failed: {details}")]
    Encoding {
        encoding: Cow<'static, str>,
        details: Cow<'static, str>,
    },

    /// The file is structurally inconsistent in a way the variants above do
    /// not name (pointer past page bounds, missing schema, ...).
    #[error("malformed SAS7BDAT file: {details}")]
    Malformed { details: Cow<'static, str> },
}

impl Error {
    pub(crate) fn malformed(details: impl Into<Cow<'static, str>>) -> Self {
        Self::Malformed {
            details: details.into(),
        }
    }
}
