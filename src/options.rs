use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use log::LevelFilter;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime, Time};

/// Shape of the rows produced by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowFormat {
    /// Ordered values, one per column.
    #[default]
    Array,
    /// Values keyed by column name.
    Map,
}

/// Renders decoded date, time, and datetime values into cell text.
///
/// The default implementation is [`Iso8601`]; callers may substitute their
/// own rendering via [`ParseOptions::with_formatter`].
pub trait TemporalFormatter: Send + Sync {
    fn format_date(&self, date: Date) -> String;
    fn format_time(&self, time: Time) -> String;
    fn format_datetime(&self, datetime: PrimitiveDateTime) -> String;
}

/// ISO-8601 rendering: `2020-01-13`, `08:45:00`, `2020-01-13T08:45:00`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Iso8601;

impl TemporalFormatter for Iso8601 {
    fn format_date(&self, date: Date) -> String {
        date.format(format_description!("[year]-[month]-[day]"))
            .unwrap_or_else(|_| date.to_string())
    }

    fn format_time(&self, time: Time) -> String {
        time.format(format_description!("[hour]:[minute]:[second]"))
            .unwrap_or_else(|_| time.to_string())
    }

    fn format_datetime(&self, datetime: PrimitiveDateTime) -> String {
        datetime
            .format(format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second]"
            ))
            .unwrap_or_else(|_| datetime.to_string())
    }
}

/// Configuration for [`SasReader`](crate::SasReader).
#[derive(Clone)]
pub struct ParseOptions {
    pub(crate) log_level: LevelFilter,
    pub(crate) extra_time_formats: Vec<String>,
    pub(crate) extra_datetime_formats: Vec<String>,
    pub(crate) extra_date_formats: Vec<String>,
    pub(crate) skip_header: bool,
    pub(crate) encoding: Cow<'static, str>,
    pub(crate) align_correction: bool,
    pub(crate) row_format: RowFormat,
    pub(crate) formatter: Arc<dyn TemporalFormatter>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ParseOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            log_level: LevelFilter::Warn,
            extra_time_formats: Vec::new(),
            extra_datetime_formats: Vec::new(),
            extra_date_formats: Vec::new(),
            skip_header: false,
            encoding: Cow::Borrowed("utf-8"),
            align_correction: true,
            row_format: RowFormat::Array,
            formatter: Arc::new(Iso8601),
        }
    }

    /// Minimum severity the reader reports through the `log` facade.
    #[must_use]
    pub const fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    /// Extends the set of format strings decoded as time-of-day.
    #[must_use]
    pub fn with_extra_time_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_time_formats
            .extend(formats.into_iter().map(Into::into));
        self
    }

    /// Extends the set of format strings decoded as datetimes.
    #[must_use]
    pub fn with_extra_datetime_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_datetime_formats
            .extend(formats.into_iter().map(Into::into));
        self
    }

    /// Extends the set of format strings decoded as dates.
    #[must_use]
    pub fn with_extra_date_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_date_formats
            .extend(formats.into_iter().map(Into::into));
        self
    }

    /// Suppresses the initial header row of column names.
    #[must_use]
    pub const fn with_skip_header(mut self, skip: bool) -> Self {
        self.skip_header = skip;
        self
    }

    /// Encoding label used to decode text cells and metadata strings.
    ///
    /// Any label `encoding_rs` understands is accepted; unresolvable labels
    /// fall back to UTF-8 with a warning.
    #[must_use]
    pub fn with_encoding(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.encoding = label.into();
        self
    }

    /// Enables or disables the 8-byte alignment shift applied before the
    /// packed rows of a MIX page.
    #[must_use]
    pub const fn with_align_correction(mut self, enabled: bool) -> Self {
        self.align_correction = enabled;
        self
    }

    /// Selects ordered or name-keyed rows.
    #[must_use]
    pub const fn with_row_format(mut self, format: RowFormat) -> Self {
        self.row_format = format;
        self
    }

    /// Substitutes a custom renderer for date, time, and datetime cells.
    #[must_use]
    pub fn with_formatter(mut self, formatter: Arc<dyn TemporalFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// True when diagnostics at `level` should be forwarded to the logger.
    pub(crate) fn logs(&self, level: log::Level) -> bool {
        level <= self.log_level
    }
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("log_level", &self.log_level)
            .field("extra_time_formats", &self.extra_time_formats)
            .field("extra_datetime_formats", &self.extra_datetime_formats)
            .field("extra_date_formats", &self.extra_date_formats)
            .field("skip_header", &self.skip_header)
            .field("encoding", &self.encoding)
            .field("align_correction", &self.align_correction)
            .field("row_format", &self.row_format)
            .finish_non_exhaustive()
    }
}
