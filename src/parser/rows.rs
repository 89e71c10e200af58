//! Row extraction from pages and per-cell decoding.

use encoding_rs::Encoding;

use crate::error::{Error, Result};
use crate::formats::{
    TemporalClass, classify_format, days_to_date, seconds_to_datetime, seconds_to_time,
};
use crate::options::ParseOptions;
use crate::parser::byteorder::{read_double, read_int};
use crate::parser::compression::rle_decompress;
use crate::parser::encoding::decode_text;
use crate::parser::header::Layout;
use crate::parser::meta::Metadata;
use crate::parser::page::{PageHeader, PageKind, SUBHEADER_POINTERS_OFFSET};
use crate::parser::subheaders::{identify, parse_pointer, read_signature};
use crate::properties::{ColumnType, Compression};
use crate::value::Cell;

/// Where one row of the current page lives: a slice of the page buffer, or
/// an owned buffer produced by decompression.
#[derive(Debug)]
pub enum RowLocation {
    Direct { offset: usize },
    Inflated(Vec<u8>),
}

impl RowLocation {
    pub fn as_slice<'a>(&'a self, page: &'a [u8], row_length: usize) -> Result<&'a [u8]> {
        match self {
            Self::Direct { offset } => page
                .get(*offset..*offset + row_length)
                .ok_or_else(|| Error::malformed("row slice exceeds page bounds")),
            Self::Inflated(buffer) => Ok(buffer.as_slice()),
        }
    }
}

/// Per-column facts the row decoder needs, precomputed once the schema
/// freezes.
#[derive(Debug)]
pub struct DecodePlan {
    pub row_length: usize,
    offsets: Vec<usize>,
    lengths: Vec<usize>,
    kinds: Vec<ColumnType>,
    classes: Vec<Option<TemporalClass>>,
}

impl DecodePlan {
    /// Builds the plan from frozen metadata. Schema arrays shorter than the
    /// declared column count simply bound the decoded width; the mismatch
    /// was already reported by the metadata walk.
    pub fn new(metadata: &Metadata, options: &ParseOptions) -> Result<Self> {
        let schema = &metadata.schema;
        let count = metadata
            .properties
            .column_count
            .min(schema.column_data_offsets.len())
            .min(schema.column_data_lengths.len())
            .min(schema.column_types.len());

        let mut offsets = Vec::with_capacity(count);
        let mut lengths = Vec::with_capacity(count);
        for i in 0..count {
            offsets.push(
                usize::try_from(schema.column_data_offsets[i])
                    .map_err(|_| Error::malformed("column offset exceeds platform pointer width"))?,
            );
            lengths.push(
                usize::try_from(schema.column_data_lengths[i])
                    .map_err(|_| Error::malformed("column length exceeds platform pointer width"))?,
            );
        }
        let kinds = schema.column_types[..count].to_vec();
        let classes = (0..count)
            .map(|i| {
                schema
                    .columns
                    .get(i)
                    .and_then(|column| classify_format(&column.format, options))
            })
            .collect();

        let row_length = usize::try_from(metadata.properties.row_length)
            .map_err(|_| Error::malformed("row length exceeds platform pointer width"))?;

        Ok(Self {
            row_length,
            offsets,
            lengths,
            kinds,
            classes,
        })
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.lengths.len()
    }
}

/// Collects the row locations of one page, in emission order.
pub fn collect_page_rows(
    page: &[u8],
    page_header: &PageHeader,
    kind: PageKind,
    page_index: u64,
    layout: Layout,
    plan: &DecodePlan,
    compression: Compression,
    total_row_count: u64,
    mix_page_row_count: u64,
    remaining: u64,
    align_correction: bool,
) -> Result<Vec<RowLocation>> {
    match kind {
        PageKind::Data | PageKind::Mix => packed_rows(
            page,
            page_header,
            kind,
            layout,
            plan.row_length,
            total_row_count,
            mix_page_row_count,
            remaining,
            align_correction,
        ),
        PageKind::Meta => pointer_rows(
            page,
            page_header,
            page_index,
            layout,
            plan.row_length,
            compression,
            remaining,
        ),
        // Known page types that never carry rows are skipped recursively.
        PageKind::Amd | PageKind::Metc | PageKind::Comp => Ok(Vec::new()),
    }
}

/// Rows packed after the page header (DATA) or after the subheader pointer
/// array plus an optional 8-byte alignment shift (MIX).
#[allow(clippy::too_many_arguments)]
fn packed_rows(
    page: &[u8],
    page_header: &PageHeader,
    kind: PageKind,
    layout: Layout,
    row_length: usize,
    total_row_count: u64,
    mix_page_row_count: u64,
    remaining: u64,
    align_correction: bool,
) -> Result<Vec<RowLocation>> {
    if row_length == 0 {
        return Ok(Vec::new());
    }
    let bit_offset = layout.page_bit_offset();
    let (base, declared) = if kind == PageKind::Data {
        (
            bit_offset + SUBHEADER_POINTERS_OFFSET,
            u64::from(page_header.block_count),
        )
    } else {
        let pointer_area =
            usize::from(page_header.subheader_count) * layout.pointer_length();
        let shift = if align_correction {
            (bit_offset + SUBHEADER_POINTERS_OFFSET + pointer_area) % 8
        } else {
            0
        };
        (
            bit_offset + SUBHEADER_POINTERS_OFFSET + shift + pointer_area,
            total_row_count.min(mix_page_row_count),
        )
    };

    let capacity = page.len().saturating_sub(base) / row_length;
    let count = usize::try_from(declared.min(remaining))
        .unwrap_or(usize::MAX)
        .min(capacity);

    let mut rows = Vec::with_capacity(count);
    for k in 0..count {
        rows.push(RowLocation::Direct {
            offset: base + k * row_length,
        });
    }
    Ok(rows)
}

/// Rows carried by data-classified subheader pointers on metadata pages,
/// one row per pointer, in pointer order.
fn pointer_rows(
    page: &[u8],
    page_header: &PageHeader,
    page_index: u64,
    layout: Layout,
    row_length: usize,
    compression: Compression,
    remaining: u64,
) -> Result<Vec<RowLocation>> {
    let mut rows = Vec::new();
    for i in 0..usize::from(page_header.subheader_count) {
        if rows.len() as u64 >= remaining {
            break;
        }
        let pointer = parse_pointer(page, layout, i)?;
        if pointer.is_skippable() || !pointer.is_data(compression) {
            continue;
        }
        if pointer.offset.saturating_add(pointer.length) > page.len() {
            return Err(Error::malformed(format!(
                "data subheader on page {page_index} exceeds page bounds"
            )));
        }
        // An uncompressed pointer large enough to carry a signature may
        // still be a schema subheader; those were handled already.
        if pointer.length >= layout.signature_length() {
            let signature = read_signature(page, pointer.offset, layout);
            if identify(signature, layout.uses_u64).is_some() {
                continue;
            }
        }

        if pointer.length < row_length {
            let inflated = match compression {
                Compression::Rle => {
                    rle_decompress(page, pointer.offset, pointer.length, row_length)?
                }
                Compression::Rdc => {
                    return Err(Error::UnsupportedCompression {
                        method: "SASYZCR2",
                    });
                }
                Compression::None => {
                    return Err(Error::malformed(
                        "row compression pointer in an uncompressed dataset",
                    ));
                }
            };
            rows.push(RowLocation::Inflated(inflated));
        } else {
            rows.push(RowLocation::Direct {
                offset: pointer.offset,
            });
        }
    }
    Ok(rows)
}

/// Decodes one row into cells, stopping early at the first zero-length
/// column.
pub fn decode_row(
    row: &[u8],
    plan: &DecodePlan,
    layout: Layout,
    options: &ParseOptions,
    encoding: &'static Encoding,
) -> Result<Vec<Cell>> {
    let mut cells = Vec::with_capacity(plan.column_count());
    for i in 0..plan.column_count() {
        let length = plan.lengths[i];
        if length == 0 {
            break;
        }
        let offset = plan.offsets[i];
        let slice = row
            .get(offset..offset + length)
            .ok_or_else(|| Error::malformed("column slice exceeds row bounds"))?;
        cells.push(decode_cell(
            slice,
            plan.kinds[i],
            plan.classes[i],
            layout,
            options,
            encoding,
        ));
    }
    Ok(cells)
}

fn decode_cell(
    slice: &[u8],
    kind: ColumnType,
    class: Option<TemporalClass>,
    layout: Layout,
    options: &ParseOptions,
    encoding: &'static Encoding,
) -> Cell {
    match kind {
        ColumnType::Text => Cell::Text(decode_text(slice, encoding).into_owned()),
        ColumnType::Number => {
            if slice.len() <= 2 {
                return Cell::Integer(read_int(layout.endianness, slice, slice.len().max(1)));
            }
            let value = read_double(layout.endianness, slice);
            if value.is_nan() {
                return Cell::Null;
            }
            match class {
                None => Cell::Number(value),
                Some(TemporalClass::Time) => seconds_to_time(value).map_or(
                    Cell::Number(value),
                    |time| Cell::Text(options.formatter.format_time(time)),
                ),
                Some(TemporalClass::DateTime) => datetime_cell(value, options),
                Some(TemporalClass::Date) => days_to_date(value).map_or_else(
                    // Dates out of range as days are retried as datetime
                    // seconds; some producers mistag datetime columns.
                    || datetime_cell(value, options),
                    |date| Cell::Text(options.formatter.format_date(date)),
                ),
            }
        }
    }
}

fn datetime_cell(seconds: f64, options: &ParseOptions) -> Cell {
    seconds_to_datetime(seconds).map_or(Cell::Number(seconds), |datetime| {
        Cell::Text(options.formatter.format_datetime(datetime))
    })
}
