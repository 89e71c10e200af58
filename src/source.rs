use std::io::{Read, Seek, SeekFrom};

use crate::error::{Error, Result};

/// Random-access view over the file bytes.
///
/// Owns the single cursor used for every read: callers address bytes by
/// absolute offset and the source performs the seek itself, so there is no
/// second position to fall out of sync.
#[derive(Debug)]
pub struct ByteSource<R> {
    inner: R,
    len: u64,
}

impl<R: Read + Seek> ByteSource<R> {
    /// Wraps a reader, measuring its total length once.
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner, len })
    }

    /// Total length of the underlying bytes.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fills `buf` from `offset`, reading as much as is available. Returns
    /// the number of bytes read.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.inner.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            let got = self.inner.read(&mut buf[filled..])?;
            if got == 0 {
                break;
            }
            filled += got;
        }
        Ok(filled)
    }

    /// Fills `buf` from `offset` entirely, failing with
    /// [`Error::ShortRead`] if the source ends first.
    pub fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let got = self.read_at(offset, buf)?;
        if got < buf.len() {
            return Err(Error::ShortRead {
                offset,
                wanted: buf.len(),
                got,
            });
        }
        Ok(())
    }
}
