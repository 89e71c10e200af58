use std::io::{Read, Seek};

use crate::error::{Error, Result};
use crate::parser::byteorder::read_u16;
use crate::parser::header::Layout;
use crate::source::ByteSource;

/// Page type words, viewed as unsigned 16-bit. `COMP` is -28672 when read
/// as signed.
pub const PAGE_META_TYPE: u16 = 0;
pub const PAGE_DATA_TYPE: u16 = 256;
pub const PAGE_MIX_TYPES: [u16; 2] = [512, 640];
pub const PAGE_AMD_TYPE: u16 = 1024;
pub const PAGE_METC_TYPE: u16 = 16384;
pub const PAGE_COMP_TYPE: u16 = 0x9000;

/// Rows and subheader pointers start this many bytes past the page bit
/// offset.
pub const SUBHEADER_POINTERS_OFFSET: usize = 8;

/// Classification of a page by its type word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Meta,
    Data,
    Mix,
    Amd,
    Metc,
    Comp,
}

impl PageKind {
    /// Maps a raw type word to a kind; `None` for unknown words.
    #[must_use]
    pub fn classify(raw: u16) -> Option<Self> {
        match raw {
            PAGE_META_TYPE => Some(Self::Meta),
            PAGE_DATA_TYPE => Some(Self::Data),
            raw if PAGE_MIX_TYPES.contains(&raw) => Some(Self::Mix),
            PAGE_AMD_TYPE => Some(Self::Amd),
            PAGE_METC_TYPE => Some(Self::Metc),
            PAGE_COMP_TYPE => Some(Self::Comp),
            _ => None,
        }
    }

    /// Pages whose subheader pointer array is walked: META, MIX, AMD.
    #[must_use]
    pub const fn has_subheaders(self) -> bool {
        matches!(self, Self::Meta | Self::Mix | Self::Amd)
    }

    /// Pages carrying packed rows: MIX and DATA.
    #[must_use]
    pub const fn has_rows(self) -> bool {
        matches!(self, Self::Mix | Self::Data)
    }
}

/// The three header words of a page.
#[derive(Debug, Clone, Copy)]
pub struct PageHeader {
    pub page_type: u16,
    pub block_count: u16,
    pub subheader_count: u16,
}

impl PageHeader {
    /// Decodes the page header at the layout's bit offset.
    #[must_use]
    pub fn parse(page: &[u8], layout: Layout) -> Self {
        let offset = layout.page_bit_offset();
        Self {
            page_type: read_u16(layout.endianness, &page[offset..]),
            block_count: read_u16(layout.endianness, &page[offset + 2..]),
            subheader_count: read_u16(layout.endianness, &page[offset + 4..]),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Option<PageKind> {
        PageKind::classify(self.page_type)
    }
}

/// Reads page `index` in full, failing with [`Error::IncompleteRead`] when
/// the file ends mid-page.
pub fn read_page<R: Read + Seek>(
    source: &mut ByteSource<R>,
    header_length: u32,
    page_length: u32,
    index: u64,
    buf: &mut [u8],
) -> Result<()> {
    debug_assert_eq!(buf.len(), page_length as usize);
    let offset = u64::from(header_length) + index * u64::from(page_length);
    let got = source.read_at(offset, buf)?;
    if got < buf.len() {
        return Err(Error::IncompleteRead {
            page: index,
            wanted: buf.len(),
            got,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::Endianness;
    use std::io::Cursor;

    const LAYOUT_32: Layout = Layout {
        endianness: Endianness::Little,
        uses_u64: false,
    };

    #[test]
    fn classifies_every_known_type_word() {
        assert_eq!(PageKind::classify(0), Some(PageKind::Meta));
        assert_eq!(PageKind::classify(256), Some(PageKind::Data));
        assert_eq!(PageKind::classify(512), Some(PageKind::Mix));
        assert_eq!(PageKind::classify(640), Some(PageKind::Mix));
        assert_eq!(PageKind::classify(1024), Some(PageKind::Amd));
        assert_eq!(PageKind::classify(16384), Some(PageKind::Metc));
        assert_eq!(PageKind::classify(0x9000), Some(PageKind::Comp));
        assert_eq!(PageKind::classify(0x1234), None);
        // -28672 as a signed word is the COMP page marker.
        assert_eq!(PageKind::classify((-28672i16) as u16), Some(PageKind::Comp));
    }

    #[test]
    fn row_and_subheader_sets_match_the_format() {
        assert!(PageKind::Mix.has_rows());
        assert!(PageKind::Data.has_rows());
        assert!(!PageKind::Meta.has_rows());
        assert!(PageKind::Meta.has_subheaders());
        assert!(PageKind::Mix.has_subheaders());
        assert!(PageKind::Amd.has_subheaders());
        assert!(!PageKind::Data.has_subheaders());
    }

    #[test]
    fn parses_the_three_header_words() {
        let mut page = vec![0u8; 64];
        page[16..18].copy_from_slice(&512u16.to_le_bytes());
        page[18..20].copy_from_slice(&7u16.to_le_bytes());
        page[20..22].copy_from_slice(&3u16.to_le_bytes());

        let header = PageHeader::parse(&page, LAYOUT_32);
        assert_eq!(header.page_type, 512);
        assert_eq!(header.block_count, 7);
        assert_eq!(header.subheader_count, 3);
        assert_eq!(header.kind(), Some(PageKind::Mix));
    }

    #[test]
    fn truncated_pages_fail_with_incomplete_read() {
        let bytes = vec![0u8; 1024 + 100]; // header plus a fragment of page 0
        let mut source = ByteSource::new(Cursor::new(bytes)).unwrap();
        let mut buf = vec![0u8; 512];
        match read_page(&mut source, 1024, 512, 0, &mut buf) {
            Err(Error::IncompleteRead { page, wanted, got }) => {
                assert_eq!(page, 0);
                assert_eq!(wanted, 512);
                assert_eq!(got, 100);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
