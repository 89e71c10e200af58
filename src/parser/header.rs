use std::io::{Read, Seek};

use encoding_rs::Encoding;
use log::warn;
use time::PrimitiveDateTime;

use crate::error::{Error, Result};
use crate::formats::seconds_to_datetime;
use crate::options::ParseOptions;
use crate::parser::byteorder::{read_double, read_u32, read_uint};
use crate::parser::encoding::decode_metadata_text;
use crate::properties::{Endianness, Platform, Properties};
use crate::source::ByteSource;

/// Fixed prefix every SAS7BDAT header starts with; the alignment probes and
/// the geometry fields all live inside it.
pub const HEADER_PREFIX_SIZE: usize = 288;

const HEADER_MIN_SIZE: u32 = 1024;
const PAGE_MIN_SIZE: u32 = 1024;
const SIZE_SANITY_LIMIT: u32 = 1 << 24;

/// Header length every 64-bit producer observed in the wild writes.
const U64_EXPECTED_HEADER_LENGTH: u32 = 8192;

const ALIGNMENT_MARKER: u8 = b'3';
const ENDIAN_LITTLE: u8 = 0x01;
const PLATFORM_UNIX: u8 = b'1';
const PLATFORM_WINDOWS: u8 = b'2';

const SAS7BDAT_MAGIC_NUMBER: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC2, 0xEA, 0x81, 0x60,
    0xB3, 0x14, 0x11, 0xCF, 0xBD, 0x92, 0x08, 0x00, 0x09, 0xC7, 0x31, 0x8C, 0x18, 0x1F, 0x10, 0x11,
];

/// Word-size and endianness facts every later parsing stage depends on.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub endianness: Endianness,
    pub uses_u64: bool,
}

impl Layout {
    /// Width of integer fields and subheader offsets (`L` in the on-disk
    /// layout): 8 bytes in 64-bit files, 4 otherwise.
    #[must_use]
    pub const fn int_len(self) -> usize {
        if self.uses_u64 { 8 } else { 4 }
    }

    /// Offset of the page type/block-count/subheader-count words within a
    /// page.
    #[must_use]
    pub const fn page_bit_offset(self) -> usize {
        if self.uses_u64 { 32 } else { 16 }
    }

    /// Size of one subheader pointer in the page pointer array.
    #[must_use]
    pub const fn pointer_length(self) -> usize {
        if self.uses_u64 { 24 } else { 12 }
    }

    /// Size of a subheader magic signature.
    #[must_use]
    pub const fn signature_length(self) -> usize {
        if self.uses_u64 { 8 } else { 4 }
    }
}

/// Result of parsing the file header: the populated informational fields
/// plus the layout facts needed to read pages.
#[derive(Debug)]
pub struct ParsedHeader {
    pub properties: Properties,
    pub layout: Layout,
}

/// Parses the variable-width file header at offset 0.
pub fn parse_header<R: Read + Seek>(
    source: &mut ByteSource<R>,
    options: &ParseOptions,
    encoding: &'static Encoding,
) -> Result<ParsedHeader> {
    let mut prefix = [0u8; HEADER_PREFIX_SIZE];
    let got = source.read_at(0, &mut prefix)?;
    if got < HEADER_PREFIX_SIZE {
        return Err(Error::HeaderTooShort {
            actual: got,
            needed: HEADER_PREFIX_SIZE,
        });
    }

    if prefix[..32] != SAS7BDAT_MAGIC_NUMBER {
        return Err(Error::BadMagic);
    }

    // Two independent alignment probes: byte 32 selects the 64-bit layout
    // and widens the page count, byte 35 shifts everything from the
    // timestamps onward.
    let uses_u64 = prefix[32] == ALIGNMENT_MARKER;
    let align2 = if uses_u64 { 4usize } else { 0 };
    let align1 = if prefix[35] == ALIGNMENT_MARKER { 4usize } else { 0 };
    let total_align = align1 + align2;

    let endianness = if prefix[37] == ENDIAN_LITTLE {
        Endianness::Little
    } else {
        Endianness::Big
    };
    let platform = match prefix[39] {
        PLATFORM_UNIX => Platform::Unix,
        PLATFORM_WINDOWS => Platform::Windows,
        _ => Platform::Unknown,
    };
    let layout = Layout {
        endianness,
        uses_u64,
    };

    let header_length = read_u32(endianness, &prefix[196 + align1..]);
    let page_length = read_u32(endianness, &prefix[200 + align1..]);
    let page_count = read_uint(endianness, &prefix[204 + align1..], 4 + align2);

    if !(HEADER_MIN_SIZE..=SIZE_SANITY_LIMIT).contains(&header_length) {
        return Err(Error::malformed(format!(
            "header length {header_length} outside expected range"
        )));
    }
    if !(PAGE_MIN_SIZE..=SIZE_SANITY_LIMIT).contains(&page_length) {
        return Err(Error::malformed(format!(
            "page length {page_length} outside expected range"
        )));
    }
    if uses_u64
        && header_length != U64_EXPECTED_HEADER_LENGTH
        && options.logs(log::Level::Warn)
    {
        warn!(
            "64-bit file declares header length {header_length}, expected {U64_EXPECTED_HEADER_LENGTH}"
        );
    }

    // Slurp the remainder so the shifted tail fields can be sliced no
    // matter which alignment combination is in effect.
    let mut header = vec![0u8; header_length as usize];
    header[..HEADER_PREFIX_SIZE].copy_from_slice(&prefix);
    source.read_exact_at(
        HEADER_PREFIX_SIZE as u64,
        &mut header[HEADER_PREFIX_SIZE..],
    )?;

    if header.len() < HEADER_PREFIX_SIZE + total_align + 8 {
        return Err(Error::HeaderTooShort {
            actual: header.len(),
            needed: HEADER_PREFIX_SIZE + total_align + 8,
        });
    }

    let text = |offset: usize, len: usize| decode_metadata_text(&header[offset..offset + len], encoding);

    let name = text(92, 64);
    let file_type = text(156, 8);
    let date_created = header_timestamp(endianness, &header[164 + align1..]);
    let date_modified = header_timestamp(endianness, &header[172 + align1..]);

    let sas_release = text(216 + total_align, 8);
    let server_type = text(224 + total_align, 16);
    let os_type = text(240 + total_align, 16);
    let os_maker = text(256 + total_align, 16);
    let mut os_name = text(272 + total_align, 16);
    if os_name.is_empty() {
        os_name = os_maker;
    }

    let properties = Properties {
        uses_u64,
        endianness,
        platform,
        header_length,
        page_length,
        page_count,
        name,
        file_type,
        date_created,
        date_modified,
        sas_release,
        server_type,
        os_type,
        os_name,
        ..Properties::default()
    };

    Ok(ParsedHeader { properties, layout })
}

/// Decodes an 8-byte seconds-since-1960 timestamp; unparseable values are
/// swallowed and surface as `None`.
fn header_timestamp(endianness: Endianness, bytes: &[u8]) -> Option<time::OffsetDateTime> {
    let seconds = read_double(endianness, &bytes[..8]);
    seconds_to_datetime(seconds).map(PrimitiveDateTime::assume_utc)
}
