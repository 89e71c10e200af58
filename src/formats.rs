use time::{Date, Duration, Month, PrimitiveDateTime, Time};

use crate::options::ParseOptions;

/// Format strings decoded as time-of-day values (seconds since midnight).
pub const TIME_FORMAT_STRINGS: &[&str] = &["TIME"];

/// Format strings decoded as datetimes (seconds since the SAS epoch).
pub const DATE_TIME_FORMAT_STRINGS: &[&str] = &["DATETIME"];

/// Format strings decoded as dates (days since the SAS epoch).
pub const DATE_FORMAT_STRINGS: &[&str] = &[
    "YYMMDD", "MMDDYY", "DDMMYY", "DATE", "JULIAN", "MONYY", "WEEKDATE",
];

/// SAS accepts calendar dates from 1582 through 9999; a day count whose
/// conversion lands outside that window is treated as mistagged datetime
/// seconds instead.
const MIN_REASONABLE_YEAR: i32 = 1582;
const MAX_REASONABLE_YEAR: i32 = 9999;

/// Temporal family a numeric column's format resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalClass {
    Date,
    DateTime,
    Time,
}

/// Classifies a column format string against the built-in families plus any
/// caller-supplied extensions.
#[must_use]
pub(crate) fn classify_format(format: &str, options: &ParseOptions) -> Option<TemporalClass> {
    let name = format.trim().to_ascii_uppercase();
    if name.is_empty() {
        return None;
    }
    if TIME_FORMAT_STRINGS.contains(&name.as_str())
        || options.extra_time_formats.iter().any(|f| f == &name)
    {
        return Some(TemporalClass::Time);
    }
    if DATE_TIME_FORMAT_STRINGS.contains(&name.as_str())
        || options.extra_datetime_formats.iter().any(|f| f == &name)
    {
        return Some(TemporalClass::DateTime);
    }
    if DATE_FORMAT_STRINGS.contains(&name.as_str())
        || options.extra_date_formats.iter().any(|f| f == &name)
    {
        return Some(TemporalClass::Date);
    }
    None
}

/// 1960-01-01T00:00:00, the zero point of every SAS date and time value.
pub(crate) fn sas_epoch() -> PrimitiveDateTime {
    PrimitiveDateTime::new(
        Date::from_calendar_date(1960, Month::January, 1).expect("valid SAS epoch"),
        Time::MIDNIGHT,
    )
}

/// Converts seconds relative to the SAS epoch into a calendar datetime.
/// Non-finite or out-of-range inputs yield `None`.
#[must_use]
pub(crate) fn seconds_to_datetime(seconds: f64) -> Option<PrimitiveDateTime> {
    if !seconds.is_finite() {
        return None;
    }
    let magnitude = Duration::checked_seconds_f64(seconds.abs())?;
    if seconds >= 0.0 {
        sas_epoch().checked_add(magnitude)
    } else {
        sas_epoch().checked_sub(magnitude)
    }
}

/// Converts days relative to the SAS epoch into a calendar date.
///
/// Returns `None` when the day count is not representable or the resulting
/// year falls outside the range SAS itself accepts; callers retry such
/// values as datetime seconds.
#[must_use]
pub(crate) fn days_to_date(days: f64) -> Option<Date> {
    let datetime = seconds_to_datetime(days * 86_400.0)?;
    let year = datetime.year();
    if (MIN_REASONABLE_YEAR..=MAX_REASONABLE_YEAR).contains(&year) {
        Some(datetime.date())
    } else {
        None
    }
}

/// Converts seconds since midnight into a time-of-day, wrapping values that
/// run past the end of the day.
#[must_use]
pub(crate) fn seconds_to_time(seconds: f64) -> Option<Time> {
    seconds_to_datetime(seconds).map(|datetime| datetime.time())
}
