use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use log::warn;
use simdutf8::basic;

/// Resolves an encoding label to an `encoding_rs` encoding, falling back to
/// UTF-8 when the label is unknown.
pub fn resolve_encoding(label: &str) -> &'static Encoding {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return UTF_8;
    }
    if let Some(encoding) = Encoding::for_label(trimmed.as_bytes()) {
        return encoding;
    }
    let normalized = trimmed.to_ascii_lowercase().replace('_', "-");
    if let Some(encoding) = Encoding::for_label(normalized.as_bytes()) {
        return encoding;
    }
    warn!("unknown encoding label {trimmed:?}, falling back to UTF-8");
    UTF_8
}

/// Drops trailing NUL and space padding.
#[must_use]
pub fn trim_trailing(bytes: &[u8]) -> &[u8] {
    match bytes.iter().rposition(|b| *b != 0 && *b != b' ') {
        Some(last) => &bytes[..=last],
        None => &[],
    }
}

/// Decodes a data cell: trailing padding dropped, bytes interpreted in the
/// configured encoding. Valid UTF-8 takes the fast path.
#[must_use]
pub fn decode_text<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Cow<'a, str> {
    let trimmed = trim_trailing(bytes);
    if trimmed.is_empty() {
        return Cow::Borrowed("");
    }
    if let Ok(text) = basic::from_utf8(trimmed) {
        return Cow::Borrowed(text);
    }
    let (decoded, had_errors) = encoding.decode_without_bom_handling(trimmed);
    if had_errors && decoded.is_empty() {
        return Cow::Owned(String::from_utf8_lossy(trimmed).into_owned());
    }
    decoded
}

/// Decodes a fixed-width metadata field: embedded NULs stripped, surrounding
/// whitespace trimmed.
#[must_use]
pub fn decode_metadata_text(bytes: &[u8], encoding: &'static Encoding) -> String {
    let stripped: Vec<u8> = bytes.iter().copied().filter(|b| *b != 0).collect();
    let decoded = match basic::from_utf8(&stripped) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => encoding.decode_without_bom_handling(&stripped).0,
    };
    decoded.trim().to_owned()
}
