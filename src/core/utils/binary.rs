use std::io::{self, Write};

/// Binary I/O trait for writing little-endian values
/// Reduces boilerplate in serialization code (BWT, SA, flattened index regions).
///
/// # Example
/// ```
/// use ferrous_bisulfite::core::utils::binary::BinaryWrite;
/// use std::io::Cursor;
///
/// let mut buffer = Cursor::new(Vec::new());
/// buffer.write_u64_le(0x123456789ABCDEF0).unwrap();
/// buffer.write_u32_le(0xDEADBEEF).unwrap();
/// assert_eq!(buffer.into_inner().len(), 12);
/// ```
pub trait BinaryWrite: Write {
    /// Write a u64 in little-endian format
    #[inline]
    fn write_u64_le(&mut self, val: u64) -> io::Result<()> {
        self.write_all(&val.to_le_bytes())
    }

    /// Write a u32 in little-endian format
    #[inline]
    fn write_u32_le(&mut self, val: u32) -> io::Result<()> {
        self.write_all(&val.to_le_bytes())
    }

    /// Write a u8 (single byte)
    #[inline]
    fn write_u8_le(&mut self, val: u8) -> io::Result<()> {
        self.write_all(&[val])
    }

    /// Write an array of u64 values in little-endian format
    #[inline]
    fn write_u64_array_le(&mut self, vals: &[u64]) -> io::Result<()> {
        for &val in vals {
            self.write_u64_le(val)?;
        }
        Ok(())
    }
}

/// Blanket implementation for all types that implement Write
impl<W: Write + ?Sized> BinaryWrite for W {}

/// Read a little-endian u32 at word index `i` of a byte slice.
#[inline(always)]
pub fn le_u32_at(bytes: &[u8], i: usize) -> u32 {
    let o = i * 4;
    u32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]])
}

/// Read a little-endian u64 at element index `i` of a byte slice.
#[inline(always)]
pub fn le_u64_at(bytes: &[u8], i: usize) -> u64 {
    let o = i * 8;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[o..o + 8]);
    u64::from_le_bytes(buf)
}

/// Forward-only reader over a flattened byte region.
///
/// Every `take` is bounds checked; callers turn `None` into a corruption
/// error. `position()` is the number of bytes consumed so far.
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        ByteCursor { bytes, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Consume `len` bytes, returning their offset in the region.
    pub fn skip(&mut self, len: usize) -> Option<usize> {
        if len > self.remaining() {
            return None;
        }
        let start = self.pos;
        self.pos += len;
        Some(start)
    }

    pub fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let start = self.skip(len)?;
        Some(&self.bytes[start..start + len])
    }

    pub fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    pub fn u32(&mut self) -> Option<u32> {
        self.take(4).map(|b| le_u32_at(b, 0))
    }

    pub fn u64(&mut self) -> Option<u64> {
        self.take(8).map(|b| le_u64_at(b, 0))
    }

    /// Consume a NUL-terminated string (terminator included).
    pub fn c_str(&mut self) -> Option<&'a [u8]> {
        let rest = &self.bytes[self.pos..];
        let nul = rest.iter().position(|&b| b == 0)?;
        let s = &rest[..nul];
        self.pos += nul + 1;
        Some(s)
    }
}
