//! Streaming reader for SAS7BDAT files, the binary dataset format of the
//! SAS statistical system.
//!
//! The reader decodes the file header, extracts the schema from the
//! metadata subheaders, decompresses RLE row pages when required, and
//! yields rows lazily, one page at a time:
//!
//! ```no_run
//! use sas7bdat_stream::{ParseOptions, SasReader};
//!
//! # fn main() -> sas7bdat_stream::Result<()> {
//! let mut reader = SasReader::open("dataset.sas7bdat", ParseOptions::new())?;
//! while let Some(row) = reader.next_row()? {
//!     println!("{row:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod formats;
pub mod options;
pub mod parser;
pub mod properties;
pub mod reader;
pub mod source;
pub mod value;

pub use error::{Error, Result};
pub use formats::{DATE_FORMAT_STRINGS, DATE_TIME_FORMAT_STRINGS, TIME_FORMAT_STRINGS};
pub use options::{Iso8601, ParseOptions, RowFormat, TemporalFormatter};
pub use properties::{Column, ColumnType, Compression, Endianness, Platform, Properties};
pub use reader::SasReader;
pub use source::ByteSource;
pub use value::{Cell, Row};
