//! Fixed-width big-endian field reader.

use crate::{Error, Result};
use std::io::{self, Read};

/// Sequential reader for FLV fields.
///
/// Never seeks. Every fixed-width read either returns the full value or
/// fails with [`Error::TruncatedInput`] reporting how many bytes it got.
pub struct ByteReader<R> {
    inner: R,
    position: u64,
}

impl<R: Read> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read until `buf` is full or the source ends; returns the count read.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.position += filled as u64;
                    return Err(Error::Io(e));
                }
            }
        }
        self.position += filled as u64;
        Ok(filled)
    }

    /// Discard up to `n` bytes; returns the count discarded.
    pub fn skip(&mut self, n: u64) -> Result<u64> {
        let skipped = io::copy(&mut (&mut self.inner).take(n), &mut io::sink())?;
        self.position += skipped;
        Ok(skipped)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let [b] = self.read_array::<1>()?;
        Ok(b)
    }

    /// Big-endian 24-bit value; the first byte is the most significant.
    pub fn read_u24(&mut self) -> Result<u32> {
        let [b0, b1, b2] = self.read_array::<3>()?;
        Ok(u32::from_be_bytes([0, b0, b1, b2]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array::<4>()?))
    }

    /// FLV timestamp: a big-endian 24-bit base followed by an extension
    /// byte that supplies bits 24..32 of the result.
    pub fn read_extended_timestamp(&mut self) -> Result<u32> {
        let [b0, b1, b2, ext] = self.read_array::<4>()?;
        Ok(u32::from_be_bytes([ext, b0, b1, b2]))
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        let read = self.read_into(&mut bytes)?;
        if read < N {
            return Err(Error::TruncatedInput {
                needed: N,
                available: read,
            });
        }
        Ok(bytes)
    }
}
