use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use encoding_rs::Encoding;

use crate::error::{Error, Result};
use crate::options::{ParseOptions, RowFormat};
use crate::parser::encoding::resolve_encoding;
use crate::parser::meta::{Metadata, parse_metadata};
use crate::parser::page::{PageHeader, read_page};
use crate::parser::rows::{DecodePlan, RowLocation, collect_page_rows, decode_row};
use crate::properties::{Column, Properties};
use crate::source::ByteSource;
use crate::value::{Cell, Row};

/// Streaming reader over a SAS7BDAT dataset.
///
/// Construction is cheap; the header and metadata are parsed on the first
/// call to [`next_row`](Self::next_row), [`properties`](Self::properties),
/// or [`columns`](Self::columns). Rows are decoded lazily, one page at a
/// time, and the byte source is dropped once the last row has been
/// emitted.
pub struct SasReader<R: Read + Seek> {
    source: Option<ByteSource<R>>,
    options: ParseOptions,
    encoding: &'static Encoding,
    state: Option<ReaderState>,
    finished: bool,
}

struct ReaderState {
    metadata: Metadata,
    plan: DecodePlan,
    page: Vec<u8>,
    rows: Vec<RowLocation>,
    next_row: usize,
    next_page: u64,
    emitted: u64,
    header_row_pending: bool,
}

impl SasReader<File> {
    /// Opens a dataset from disk.
    pub fn open<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<Self> {
        Self::new(File::open(path)?, options)
    }
}

impl SasReader<Cursor<Vec<u8>>> {
    /// Wraps an in-memory dataset.
    pub fn from_bytes(bytes: Vec<u8>, options: ParseOptions) -> Result<Self> {
        Self::new(Cursor::new(bytes), options)
    }
}

impl<R: Read + Seek> SasReader<R> {
    /// Wraps any seekable byte source.
    pub fn new(reader: R, options: ParseOptions) -> Result<Self> {
        let encoding = resolve_encoding(&options.encoding);
        Ok(Self {
            source: Some(ByteSource::new(reader)?),
            options,
            encoding,
            state: None,
            finished: false,
        })
    }

    /// File-level properties, parsing the header and metadata on first use.
    pub fn properties(&mut self) -> Result<&Properties> {
        self.ensure_initialized()?;
        Ok(&self.state().metadata.properties)
    }

    /// Column schema in declaration order, parsing metadata on first use.
    pub fn columns(&mut self) -> Result<&[Column]> {
        self.ensure_initialized()?;
        Ok(&self.state().metadata.schema.columns)
    }

    /// Produces the next row, or `None` at end-of-data.
    ///
    /// The first call parses the header and metadata; unless suppressed by
    /// [`ParseOptions::with_skip_header`] it yields one header row of
    /// column names before the data rows.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        if self.finished && self.state.is_none() {
            return Ok(None);
        }
        self.ensure_initialized()?;

        if self.state().header_row_pending {
            self.state_mut().header_row_pending = false;
            return Ok(Some(self.header_row()));
        }

        loop {
            if self.state().next_row < self.state().rows.len() {
                let cells = self.decode_current_row()?;
                return Ok(Some(self.shape_row(cells)));
            }
            if self.finished || !self.fetch_next_page()? {
                return Ok(None);
            }
        }
    }

    fn decode_current_row(&mut self) -> Result<Vec<Cell>> {
        let Self {
            state,
            options,
            encoding,
            ..
        } = self;
        let state = state.as_mut().expect("reader initialized");
        let location = &state.rows[state.next_row];
        let row = location.as_slice(&state.page, state.plan.row_length)?;
        let cells = decode_row(row, &state.plan, state.metadata.layout, options, *encoding)?;
        state.next_row += 1;
        state.emitted += 1;
        Ok(cells)
    }

    /// Reads pages until one yields rows. Returns `false` at end-of-data,
    /// dropping the byte source.
    fn fetch_next_page(&mut self) -> Result<bool> {
        loop {
            let state = self.state_mut();
            let properties = &state.metadata.properties;
            let row_count = properties.row_count;
            let page_count = properties.page_count;
            let header_length = properties.header_length;
            let page_length = properties.page_length;
            let compression = properties.compression;
            let mix_page_row_count = properties.mix_page_row_count;

            if state.emitted >= row_count || state.next_page >= page_count {
                self.finish();
                return Ok(false);
            }
            let index = state.next_page;
            state.next_page += 1;
            let remaining = row_count - state.emitted;

            let Self {
                source,
                state,
                options,
                ..
            } = self;
            let state = state.as_mut().expect("reader initialized");
            let Some(source) = source.as_mut() else {
                self.finish();
                return Ok(false);
            };
            read_page(source, header_length, page_length, index, &mut state.page)?;

            let layout = state.metadata.layout;
            let page_header = PageHeader::parse(&state.page, layout);
            let Some(kind) = page_header.kind() else {
                // Recoverable while the metadata was being scanned; fatal
                // once rows are being pulled.
                return Err(Error::UnknownPageType {
                    page_type: page_header.page_type,
                    page: index,
                });
            };

            let rows = collect_page_rows(
                &state.page,
                &page_header,
                kind,
                index,
                layout,
                &state.plan,
                compression,
                row_count,
                mix_page_row_count,
                remaining,
                options.align_correction,
            )?;
            if rows.is_empty() {
                continue;
            }
            state.rows = rows;
            state.next_row = 0;
            return Ok(true);
        }
    }

    fn ensure_initialized(&mut self) -> Result<()> {
        if self.state.is_some() {
            return Ok(());
        }
        let source = self
            .source
            .as_mut()
            .ok_or_else(|| Error::malformed("byte source unavailable"))?;
        let metadata = parse_metadata(source, &self.options, self.encoding)?;
        let plan = DecodePlan::new(&metadata, &self.options)?;
        let page = vec![0u8; metadata.properties.page_length as usize];
        let header_row_pending = !self.options.skip_header;
        self.state = Some(ReaderState {
            metadata,
            plan,
            page,
            rows: Vec::new(),
            next_row: 0,
            next_page: 0,
            emitted: 0,
            header_row_pending,
        });
        Ok(())
    }

    fn header_row(&self) -> Row {
        let names = &self.state().metadata.schema.column_names;
        let count = self.state().metadata.properties.column_count;
        let name_at =
            |i: usize| -> String { names.get(i).cloned().unwrap_or_else(|| format!("col{i}")) };
        match self.options.row_format {
            RowFormat::Array => Row::Cells((0..count).map(|i| Cell::Text(name_at(i))).collect()),
            RowFormat::Map => Row::Named(
                (0..count)
                    .map(|i| {
                        let name = name_at(i);
                        (name.clone(), Cell::Text(name))
                    })
                    .collect(),
            ),
        }
    }

    fn shape_row(&self, cells: Vec<Cell>) -> Row {
        match self.options.row_format {
            RowFormat::Array => Row::Cells(cells),
            RowFormat::Map => {
                let names = &self.state().metadata.schema.column_names;
                let map: HashMap<String, Cell> = cells
                    .into_iter()
                    .enumerate()
                    .map(|(i, cell)| {
                        let name = names.get(i).cloned().unwrap_or_else(|| format!("col{i}"));
                        (name, cell)
                    })
                    .collect();
                Row::Named(map)
            }
        }
    }

    /// Drops the byte source; further advances yield `None`.
    fn finish(&mut self) {
        self.finished = true;
        self.source = None;
    }

    fn state(&self) -> &ReaderState {
        self.state.as_ref().expect("reader initialized")
    }

    fn state_mut(&mut self) -> &mut ReaderState {
        self.state.as_mut().expect("reader initialized")
    }
}

impl<R: Read + Seek> Iterator for SasReader<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => None,
            Err(err) => {
                self.finish();
                Some(Err(err))
            }
        }
    }
}
