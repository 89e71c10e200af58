//! Walks the metadata pages and assembles the dataset schema.

use std::io::{Read, Seek};

use encoding_rs::Encoding;
use log::{debug, warn};

use crate::error::Result;
use crate::options::ParseOptions;
use crate::parser::header::{Layout, parse_header};
use crate::parser::page::{PageHeader, read_page};
use crate::parser::subheaders::{
    Schema, SchemaBuilder, SubheaderKind, identify, parse_pointer, read_signature,
};
use crate::properties::Properties;
use crate::source::ByteSource;

/// Everything known about the dataset once the header and the metadata
/// subheaders have been processed.
#[derive(Debug)]
pub struct Metadata {
    pub properties: Properties,
    pub layout: Layout,
    pub schema: Schema,
}

/// Parses the header and walks pages for schema subheaders.
///
/// The scan stops as soon as the schema is complete; row-bearing pages are
/// revisited lazily by the row pass.
pub fn parse_metadata<R: Read + Seek>(
    source: &mut ByteSource<R>,
    options: &ParseOptions,
    encoding: &'static Encoding,
) -> Result<Metadata> {
    let parsed = parse_header(source, options, encoding)?;
    let layout = parsed.layout;
    let mut properties = parsed.properties;
    let mut builder = SchemaBuilder::default();

    let mut page = vec![0u8; properties.page_length as usize];
    for index in 0..properties.page_count {
        read_page(
            source,
            properties.header_length,
            properties.page_length,
            index,
            &mut page,
        )?;
        let page_header = PageHeader::parse(&page, layout);
        match page_header.kind() {
            None => {
                if options.logs(log::Level::Debug) {
                    debug!(
                        "skipping page {index} with unknown type 0x{:04X}",
                        page_header.page_type
                    );
                }
                continue;
            }
            Some(kind) if kind.has_subheaders() => {
                process_page_subheaders(
                    &page,
                    &page_header,
                    index,
                    layout,
                    &mut builder,
                    &mut properties,
                    options,
                    encoding,
                )?;
            }
            Some(_) => {}
        }
        if builder.is_complete() {
            break;
        }
    }

    let schema = builder.finalize(&mut properties, options)?;
    Ok(Metadata {
        properties,
        layout,
        schema,
    })
}

#[allow(clippy::too_many_arguments)]
fn process_page_subheaders(
    page: &[u8],
    page_header: &PageHeader,
    page_index: u64,
    layout: Layout,
    builder: &mut SchemaBuilder,
    properties: &mut Properties,
    options: &ParseOptions,
    encoding: &'static Encoding,
) -> Result<()> {
    for i in 0..usize::from(page_header.subheader_count) {
        let pointer = parse_pointer(page, layout, i)?;
        if pointer.is_skippable() {
            continue;
        }
        let end = pointer.offset.saturating_add(pointer.length);
        if end > page.len() || pointer.length < layout.signature_length() {
            // Compressed rows can be shorter than a signature; the row
            // pass collects those.
            if pointer.is_data(properties.compression) {
                continue;
            }
            if options.logs(log::Level::Warn) {
                warn!(
                    "skipping subheader {i} on page {page_index}: range {}..{end} outside page",
                    pointer.offset
                );
            }
            continue;
        }

        let signature = read_signature(page, pointer.offset, layout);
        let bytes = &page[pointer.offset..end];
        match identify(signature, layout.uses_u64) {
            Some(SubheaderKind::RowSize) => builder.handle_row_size(bytes, layout)?,
            Some(SubheaderKind::ColumnSize) => builder.handle_column_size(bytes, layout, options)?,
            Some(SubheaderKind::ColumnText) => {
                builder.handle_column_text(bytes, layout, properties, encoding)?;
            }
            Some(SubheaderKind::ColumnName) => {
                builder.handle_column_name(bytes, layout, encoding)?;
            }
            Some(SubheaderKind::ColumnAttributes) => {
                builder.handle_column_attributes(bytes, layout)?;
            }
            Some(SubheaderKind::FormatAndLabel) => {
                builder.handle_format_and_label(bytes, layout, encoding, options)?;
            }
            Some(kind @ (SubheaderKind::SubheaderCounts | SubheaderKind::ColumnList)) => {
                SchemaBuilder::note_ignored(kind, options);
            }
            None => {
                // Row data behind a pointer is collected by the row pass;
                // anything else is an unrecognized signature.
                if !pointer.is_data(properties.compression) && options.logs(log::Level::Debug) {
                    debug!(
                        "unknown subheader signature 0x{signature:016X} on page {page_index}"
                    );
                }
            }
        }
    }
    Ok(())
}
