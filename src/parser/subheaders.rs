//! Subheader identification and the handlers that populate schema state.

use encoding_rs::Encoding;
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::options::ParseOptions;
use crate::parser::byteorder::{read_u16, read_u32, read_u64, read_uint};
use crate::parser::encoding::decode_metadata_text;
use crate::parser::header::Layout;
use crate::parser::page::SUBHEADER_POINTERS_OFFSET;
use crate::properties::{Column, ColumnType, Compression, Properties};

/// Pointer compression codes.
pub const COMPRESSION_NONE: i8 = 0;
pub const COMPRESSION_TRUNCATED: i8 = 1;
pub const COMPRESSION_RLE: i8 = 4;

/// Pointer type code marking row data.
pub const POINTER_TYPE_DATA: i8 = 1;

const RLE_LITERAL: &[u8] = b"SASYZCRL";
const RDC_LITERAL: &[u8] = b"SASYZCR2";

/// One entry of a page's subheader pointer array.
#[derive(Debug, Clone, Copy)]
pub struct SubheaderPointer {
    pub offset: usize,
    pub length: usize,
    pub compression: i8,
    pub type_code: i8,
}

impl SubheaderPointer {
    /// True for empty or truncated slots, which carry nothing.
    #[must_use]
    pub const fn is_skippable(&self) -> bool {
        self.length == 0 || self.compression == COMPRESSION_TRUNCATED
    }

    /// Classifies a pointer that matched no signature as row data: only
    /// compressed datasets pack rows behind pointers, flagged with type 1
    /// and a plain or RLE compression code.
    #[must_use]
    pub const fn is_data(&self, compression: Compression) -> bool {
        compression.is_compressed()
            && (self.compression == COMPRESSION_NONE || self.compression == COMPRESSION_RLE)
            && self.type_code == POINTER_TYPE_DATA
    }
}

/// Reads pointer `index` from the page's pointer array.
pub fn parse_pointer(page: &[u8], layout: Layout, index: usize) -> Result<SubheaderPointer> {
    let int_len = layout.int_len();
    let start = layout.page_bit_offset()
        + SUBHEADER_POINTERS_OFFSET
        + index * layout.pointer_length();
    let end = start + layout.pointer_length();
    let Some(pointer) = page.get(start..end) else {
        return Err(Error::malformed("subheader pointer exceeds page bounds"));
    };

    let offset = usize::try_from(read_uint(layout.endianness, &pointer[..int_len], int_len))
        .map_err(|_| Error::malformed("subheader offset exceeds platform pointer width"))?;
    let length = usize::try_from(read_uint(
        layout.endianness,
        &pointer[int_len..2 * int_len],
        int_len,
    ))
    .map_err(|_| Error::malformed("subheader length exceeds platform pointer width"))?;

    Ok(SubheaderPointer {
        offset,
        length,
        compression: pointer[2 * int_len] as i8,
        type_code: pointer[2 * int_len + 1] as i8,
    })
}

/// The nine subheader families keyed by magic signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubheaderKind {
    RowSize,
    ColumnSize,
    SubheaderCounts,
    ColumnText,
    ColumnName,
    ColumnAttributes,
    FormatAndLabel,
    ColumnList,
}

/// Signature table: (32-bit value, 64-bit value, kind). Reading the
/// signature with the file's own endianness canonicalizes the little- and
/// big-endian byte orders onto the same value, so one table covers both.
static SIGNATURE_TABLE: &[(u64, u64, SubheaderKind)] = &[
    (0xF7F7_F7F7, 0xF7F7_F7F7_0000_0000, SubheaderKind::RowSize),
    (0xF6F6_F6F6, 0xF6F6_F6F6_0000_0000, SubheaderKind::ColumnSize),
    (
        0xFFFF_FC00,
        0xFFFF_FFFF_FFFF_FC00,
        SubheaderKind::SubheaderCounts,
    ),
    (0xFFFF_FFFD, 0xFFFF_FFFF_FFFF_FFFD, SubheaderKind::ColumnText),
    (0xFFFF_FFFF, 0xFFFF_FFFF_FFFF_FFFF, SubheaderKind::ColumnName),
    (
        0xFFFF_FFFC,
        0xFFFF_FFFF_FFFF_FFFC,
        SubheaderKind::ColumnAttributes,
    ),
    (
        0xFFFF_FBFE,
        0xFFFF_FFFF_FFFF_FBFE,
        SubheaderKind::FormatAndLabel,
    ),
    (0xFFFF_FFFE, 0xFFFF_FFFF_FFFF_FFFE, SubheaderKind::ColumnList),
];

/// Reads the signature at the pointer target: 4 bytes in 32-bit files,
/// 8 in 64-bit files, widened to a canonical `u64`.
#[must_use]
pub fn read_signature(page: &[u8], offset: usize, layout: Layout) -> u64 {
    if layout.uses_u64 {
        read_u64(layout.endianness, &page[offset..])
    } else {
        u64::from(read_u32(layout.endianness, &page[offset..]))
    }
}

/// Maps a canonical signature value to its handler kind.
#[must_use]
pub fn identify(signature: u64, uses_u64: bool) -> Option<SubheaderKind> {
    SIGNATURE_TABLE
        .iter()
        .find(|(sig32, sig64, _)| signature == if uses_u64 { *sig64 } else { *sig32 })
        .map(|(_, _, kind)| *kind)
}

/// Mutable schema state accumulated while the metadata pages are walked.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    /// Text pool blobs appended by ColumnText subheaders.
    pub text_blobs: Vec<Vec<u8>>,
    pub column_names: Vec<String>,
    pub column_data_offsets: Vec<u64>,
    pub column_data_lengths: Vec<u64>,
    pub column_types: Vec<ColumnType>,
    pub columns: Vec<Column>,

    row_size_seen: bool,
    column_size_seen: bool,
    row_length: Option<u64>,
    row_count: Option<u64>,
    mix_page_row_count: Option<u64>,
    col_count_p1: Option<u64>,
    col_count_p2: Option<u64>,
    lcs: Option<u16>,
    lcp: Option<u16>,
    column_count: Option<usize>,
}

impl SchemaBuilder {
    /// True once every schema-bearing subheader the file promises has been
    /// processed; the metadata scan stops here.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let Some(count) = self.column_count else {
            return false;
        };
        self.row_size_seen
            && self.column_size_seen
            && self.columns.len() >= count
            && self.column_types.len() >= count
    }

    /// Processes the RowSize subheader: table shape plus the text-pool
    /// string lengths.
    pub fn handle_row_size(&mut self, bytes: &[u8], layout: Layout) -> Result<()> {
        if self.row_size_seen {
            return Err(Error::DuplicateRowSize);
        }
        let l = layout.int_len();
        let (lcs_offset, lcp_offset) = if layout.uses_u64 { (682, 706) } else { (354, 378) };
        if bytes.len() < lcp_offset + 2 {
            return Err(Error::malformed("row size subheader too short"));
        }
        let endian = layout.endianness;

        self.row_length = Some(read_uint(endian, &bytes[5 * l..], l));
        self.row_count = Some(read_uint(endian, &bytes[6 * l..], l));
        set_once(
            &mut self.col_count_p1,
            read_uint(endian, &bytes[9 * l..], l),
            "col_count_p1",
        )?;
        set_once(
            &mut self.col_count_p2,
            read_uint(endian, &bytes[10 * l..], l),
            "col_count_p2",
        )?;
        set_once(
            &mut self.mix_page_row_count,
            read_uint(endian, &bytes[15 * l..], l),
            "mix_page_row_count",
        )?;
        self.lcs = Some(read_u16(endian, &bytes[lcs_offset..]));
        self.lcp = Some(read_u16(endian, &bytes[lcp_offset..]));
        self.row_size_seen = true;
        Ok(())
    }

    /// Processes the ColumnSize subheader and checks the split column
    /// counts against it.
    pub fn handle_column_size(
        &mut self,
        bytes: &[u8],
        layout: Layout,
        options: &ParseOptions,
    ) -> Result<()> {
        if self.column_size_seen {
            return Err(Error::DuplicateColumnSize);
        }
        let l = layout.int_len();
        if bytes.len() < 2 * l {
            return Err(Error::malformed("column size subheader too short"));
        }
        let count = read_uint(layout.endianness, &bytes[l..], l);
        let count = usize::try_from(count)
            .map_err(|_| Error::malformed("column count exceeds platform pointer width"))?;
        self.column_count = Some(count);
        self.column_size_seen = true;

        let p1 = self.col_count_p1.unwrap_or(0);
        let p2 = self.col_count_p2.unwrap_or(0);
        if p1 + p2 != count as u64 && options.logs(log::Level::Warn) {
            warn!("column count mismatch: {p1} + {p2} != {count}");
        }
        Ok(())
    }

    /// Processes a ColumnText subheader: stores the text-pool blob, and for
    /// the first blob detects compression and the creator strings.
    pub fn handle_column_text(
        &mut self,
        bytes: &[u8],
        layout: Layout,
        properties: &mut Properties,
        encoding: &'static Encoding,
    ) -> Result<()> {
        let l = layout.int_len();
        if bytes.len() < l + 2 {
            return Err(Error::malformed("column text subheader too short"));
        }
        let block_size = usize::from(read_u16(layout.endianness, &bytes[l..]));
        let end = (l + block_size).min(bytes.len());
        // The blob keeps its two length-prefix bytes; name references index
        // into the buffer as stored.
        let blob = bytes[l..end].to_vec();

        let first = self.text_blobs.is_empty();
        if first {
            if blob.windows(RLE_LITERAL.len()).any(|w| w == RLE_LITERAL) {
                properties.compression = Compression::Rle;
            } else if blob.windows(RDC_LITERAL.len()).any(|w| w == RDC_LITERAL) {
                properties.compression = Compression::Rdc;
            }

            let base = if layout.uses_u64 { 20 } else { 16 };
            let probe = slice_in(bytes, base, 8)
                .map(|raw| decode_metadata_text(raw, encoding))
                .unwrap_or_default();
            if probe.is_empty() {
                self.lcs = Some(0);
                let lcp = usize::from(self.lcp.unwrap_or(0));
                if let Some(raw) = slice_in(bytes, 16 + base, lcp) {
                    properties.creator_proc = decode_metadata_text(raw, encoding);
                }
            } else if probe.as_bytes() == RLE_LITERAL {
                let lcp = usize::from(self.lcp.unwrap_or(0));
                if let Some(raw) = slice_in(bytes, 24 + base, lcp) {
                    properties.creator_proc = decode_metadata_text(raw, encoding);
                }
            } else if self.lcs.unwrap_or(0) > 0 {
                self.lcp = Some(0);
                let lcs = usize::from(self.lcs.unwrap_or(0));
                if let Some(raw) = slice_in(bytes, base, lcs) {
                    properties.creator = decode_metadata_text(raw, encoding);
                }
            }
        }

        self.text_blobs.push(blob);
        Ok(())
    }

    /// Processes a ColumnName subheader: one 8-byte pointer per column into
    /// the text pool.
    pub fn handle_column_name(
        &mut self,
        bytes: &[u8],
        layout: Layout,
        encoding: &'static Encoding,
    ) -> Result<()> {
        let l = layout.int_len();
        let Some(payload) = bytes.len().checked_sub(2 * l + 12) else {
            return Err(Error::malformed("column name subheader too short"));
        };
        let count = payload / 8;
        for k in 0..count {
            let entry = l + 8 + k * 8;
            let text_index = read_u16(layout.endianness, &bytes[entry..]);
            let name_offset = read_u16(layout.endianness, &bytes[entry + 2..]);
            let name_length = read_u16(layout.endianness, &bytes[entry + 4..]);
            let name = self
                .blob_text(text_index, name_offset, name_length, encoding)
                .ok_or_else(|| Error::malformed("column name reference outside text pool"))?;
            self.column_names.push(name);
        }
        Ok(())
    }

    /// Processes a ColumnAttributes subheader: per-column offset, length,
    /// and semantic type.
    pub fn handle_column_attributes(&mut self, bytes: &[u8], layout: Layout) -> Result<()> {
        let l = layout.int_len();
        let Some(payload) = bytes.len().checked_sub(2 * l + 12) else {
            return Err(Error::malformed("column attributes subheader too short"));
        };
        let count = payload / (l + 8);
        for k in 0..count {
            let entry = l + 8 + k * (l + 8);
            let data_offset = read_uint(layout.endianness, &bytes[entry..], l);
            let data_length = u64::from(read_u32(layout.endianness, &bytes[entry + l..]));
            let type_code = bytes[entry + l + 4];
            let kind = match type_code {
                1 => ColumnType::Number,
                2 => ColumnType::Text,
                other => {
                    return Err(Error::malformed(format!(
                        "unknown column type code {other}"
                    )));
                }
            };
            self.column_data_offsets.push(data_offset);
            self.column_data_lengths.push(data_length);
            self.column_types.push(kind);
        }
        Ok(())
    }

    /// Processes a FormatAndLabel subheader, materializing the next column.
    pub fn handle_format_and_label(
        &mut self,
        bytes: &[u8],
        layout: Layout,
        encoding: &'static Encoding,
        options: &ParseOptions,
    ) -> Result<()> {
        let l = layout.int_len();
        if bytes.len() < 3 * l + 12 {
            return Err(Error::malformed("format subheader too short"));
        }
        let endian = layout.endianness;
        let base = 3 * l;
        let mut format_text_index = read_u16(endian, &bytes[base..]);
        let format_offset = read_u16(endian, &bytes[base + 2..]);
        let format_length = read_u16(endian, &bytes[base + 4..]);
        let mut label_text_index = read_u16(endian, &bytes[base + 6..]);
        let label_offset = read_u16(endian, &bytes[base + 8..]);
        let label_length = read_u16(endian, &bytes[base + 10..]);

        // Some producers write text indices past the pool; clamp to the
        // last blob rather than failing.
        let last_blob = u16::try_from(self.text_blobs.len().saturating_sub(1)).unwrap_or(u16::MAX);
        format_text_index = format_text_index.min(last_blob);
        label_text_index = label_text_index.min(last_blob);

        let format = self
            .blob_text(format_text_index, format_offset, format_length, encoding)
            .unwrap_or_default();
        let label = self
            .blob_text(label_text_index, label_offset, label_length, encoding)
            .unwrap_or_default();

        let index = self.columns.len();
        let name = self.column_names.get(index).cloned().unwrap_or_default();
        let kind = self.column_types.get(index).copied();
        let length = self.column_data_lengths.get(index).copied();
        if (kind.is_none() || length.is_none()) && options.logs(log::Level::Warn) {
            warn!("format subheader for column {index} arrived before its attributes");
        }
        self.columns.push(Column {
            index,
            name,
            label,
            format,
            kind: kind.unwrap_or(ColumnType::Number),
            length: length.unwrap_or(0),
        });
        Ok(())
    }

    /// Resolves a text-pool reference, clamping the range to the blob.
    fn blob_text(
        &self,
        index: u16,
        offset: u16,
        length: u16,
        encoding: &'static Encoding,
    ) -> Option<String> {
        if length == 0 {
            return Some(String::new());
        }
        let blob = self.text_blobs.get(usize::from(index))?;
        let start = usize::from(offset).min(blob.len());
        let end = (start + usize::from(length)).min(blob.len());
        Some(decode_metadata_text(&blob[start..end], encoding))
    }

    /// Moves the collected shape into `properties` and validates the
    /// schema-completion invariants. Warnings do not fail the parse.
    pub fn finalize(self, properties: &mut Properties, options: &ParseOptions) -> Result<Schema> {
        let row_length = self
            .row_length
            .ok_or_else(|| Error::malformed("row size subheader missing"))?;
        let column_count = self
            .column_count
            .ok_or_else(|| Error::malformed("column size subheader missing"))?;

        properties.row_length = row_length;
        properties.row_count = self.row_count.unwrap_or(0);
        properties.column_count = column_count;
        properties.col_count_p1 = self.col_count_p1.unwrap_or(0);
        properties.col_count_p2 = self.col_count_p2.unwrap_or(0);
        properties.mix_page_row_count = self.mix_page_row_count.unwrap_or(0);
        properties.lcs = self.lcs.unwrap_or(0);
        properties.lcp = self.lcp.unwrap_or(0);

        if properties.compression == Compression::Rdc {
            return Err(Error::UnsupportedCompression {
                method: "SASYZCR2",
            });
        }

        let lengths_agree = self.column_names.len() == column_count
            && self.column_data_offsets.len() == column_count
            && self.column_data_lengths.len() == column_count
            && self.column_types.len() == column_count
            && self.columns.len() == column_count;
        if !lengths_agree && options.logs(log::Level::Warn) {
            warn!(
                "schema arrays disagree with column count {column_count}: names={}, offsets={}, lengths={}, types={}, columns={}",
                self.column_names.len(),
                self.column_data_offsets.len(),
                self.column_data_lengths.len(),
                self.column_types.len(),
                self.columns.len()
            );
        }

        Ok(Schema {
            column_names: self.column_names,
            column_data_offsets: self.column_data_offsets,
            column_data_lengths: self.column_data_lengths,
            column_types: self.column_types,
            columns: self.columns,
        })
    }

    /// Logs an ignored subheader family at debug severity.
    pub fn note_ignored(kind: SubheaderKind, options: &ParseOptions) {
        if options.logs(log::Level::Debug) {
            debug!("ignoring {kind:?} subheader");
        }
    }
}

/// Column schema produced once the metadata walk completes.
#[derive(Debug, Clone)]
pub struct Schema {
    pub column_names: Vec<String>,
    pub column_data_offsets: Vec<u64>,
    pub column_data_lengths: Vec<u64>,
    pub column_types: Vec<ColumnType>,
    pub columns: Vec<Column>,
}

fn set_once(slot: &mut Option<u64>, value: u64, field: &'static str) -> Result<()> {
    if slot.is_some() {
        return Err(Error::DuplicateRowSizeField { field });
    }
    *slot = Some(value);
    Ok(())
}

fn slice_in(bytes: &[u8], offset: usize, length: usize) -> Option<&[u8]> {
    if length == 0 {
        return None;
    }
    bytes.get(offset..offset + length)
}
