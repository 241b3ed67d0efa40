// 2-bit packed reference (.pac) and window extraction
//
// Bases are packed four per byte, most significant bits first. Only the
// forward strand is stored; the coordinate space is [0, 2 * forward_len) and
// the upper half reads the reverse complement.

use crate::core::utils::binary::BinaryWrite;
use crate::error::{IndexError, Result};
use crate::index::slab::Slab;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Recoverable window rejection; the candidate is simply dropped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowReject {
    #[error("empty window [{rb}, {re})")]
    Empty { rb: u64, re: u64 },

    #[error("window [{rb}, {re}) bridges the forward-reverse boundary at {forward_len}")]
    Straddle { rb: u64, re: u64, forward_len: u64 },

    #[error("window [{rb}, {re}) yields {got} bases")]
    OutOfRange { rb: u64, re: u64, got: u64 },
}

#[derive(Debug, Clone)]
pub struct PackedReference {
    forward_len: u64,
    bytes: Slab,
}

/// Bytes needed for `forward_len` packed bases (l_pac/4 + 1).
pub fn packed_size(forward_len: u64) -> usize {
    (forward_len / 4 + 1) as usize
}

// _get_pac
#[inline(always)]
fn get_pac(pac: &[u8], l: u64) -> u8 {
    pac[(l >> 2) as usize] >> ((!l & 3) << 1) & 3
}

impl PackedReference {
    pub(crate) fn from_slab(forward_len: u64, bytes: Slab) -> Self {
        PackedReference { forward_len, bytes }
    }

    /// Pack forward-strand codes; ambiguous codes must already be replaced.
    pub fn from_codes(codes: &[u8]) -> Self {
        let forward_len = codes.len() as u64;
        let mut pac = vec![0u8; packed_size(forward_len)];
        for (l, &c) in codes.iter().enumerate() {
            let l = l as u64;
            pac[(l >> 2) as usize] |= (c & 3) << ((!l & 3) << 1);
        }
        PackedReference {
            forward_len,
            bytes: Slab::Heap(pac),
        }
    }

    /// Load the first `forward_len/4 + 1` bytes of a `.pac` file.
    pub fn restore(path: &Path, forward_len: u64) -> Result<Self> {
        let want = packed_size(forward_len);
        let mut file = File::open(path)?;
        // bound the untrusted l_pac by the file size before allocating
        let file_len = file.metadata()?.len();
        if file_len < want as u64 {
            return Err(IndexError::format(
                path,
                format!("expected at least {} bytes, found {}", want, file_len),
            ));
        }
        let mut bytes = Vec::with_capacity(want);
        (&mut file).take(want as u64).read_to_end(&mut bytes)?;
        if bytes.len() != want {
            return Err(IndexError::format(
                path,
                format!("expected at least {} bytes, found {}", want, bytes.len()),
            ));
        }
        log::debug!("Loaded .pac: {} bytes for l_pac={}", bytes.len(), forward_len);
        Ok(PackedReference {
            forward_len,
            bytes: Slab::Heap(bytes),
        })
    }

    /// Write the `.pac` file: packed bytes, an extra zero byte when
    /// `forward_len % 4 == 0`, then `forward_len % 4`.
    pub fn dump(&self, path: &Path) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        let used = ((self.forward_len + 3) / 4) as usize;
        w.write_all(&self.bytes[..used])?;
        if self.forward_len % 4 == 0 {
            w.write_u8_le(0)?;
        }
        w.write_u8_le((self.forward_len % 4) as u8)?;
        w.flush()?;
        Ok(())
    }

    pub fn forward_len(&self) -> u64 {
        self.forward_len
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_flat(&self) -> bool {
        self.bytes.is_region()
    }

    /// Base at `pos` in the doubled coordinate space.
    pub fn base_at(&self, pos: u64) -> Option<u8> {
        let l = self.forward_len;
        if pos < l {
            Some(get_pac(&self.bytes, pos))
        } else if pos < l << 1 {
            Some(3 - get_pac(&self.bytes, (l << 1) - 1 - pos))
        } else {
            None
        }
    }

    /// All forward-strand codes.
    pub fn unpack_forward(&self) -> Vec<u8> {
        (0..self.forward_len).map(|l| get_pac(&self.bytes, l)).collect()
    }

    /// Extract `[rb, re)` (bns_get_seq), rejecting empty windows, windows
    /// that bridge the strand boundary and windows truncated by the end of
    /// the reference.
    pub fn fetch(&self, rb: u64, re: u64) -> std::result::Result<Vec<u8>, WindowReject> {
        if re <= rb {
            return Err(WindowReject::Empty { rb, re });
        }
        let l = self.forward_len;
        let end = re.min(l << 1);
        let beg = rb;
        if beg < l && end > l {
            return Err(WindowReject::Straddle {
                rb,
                re,
                forward_len: l,
            });
        }
        let got = end.saturating_sub(beg);
        if got != re - rb {
            return Err(WindowReject::OutOfRange { rb, re, got });
        }

        let mut seq = Vec::with_capacity(got as usize);
        if beg >= l {
            // reverse strand: complement of the mirrored forward interval, read backwards
            let beg_f = (l << 1) - end;
            let end_f = (l << 1) - beg;
            for k in (beg_f..end_f).rev() {
                seq.push(3 - get_pac(&self.bytes, k));
            }
        } else {
            for k in beg..end {
                seq.push(get_pac(&self.bytes, k));
            }
        }
        Ok(seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ACGTTGCAG
    fn reference() -> PackedReference {
        PackedReference::from_codes(&[0, 1, 2, 3, 3, 2, 1, 0, 2])
    }

    #[test]
    fn test_packing_is_msb_first() {
        let r = PackedReference::from_codes(&[0, 1, 2, 3]);
        assert_eq!(r.as_bytes(), &[0b00_01_10_11, 0]);
    }

    #[test]
    fn test_fetch_forward() {
        let r = reference();
        assert_eq!(r.fetch(0, 4).unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(r.fetch(5, 9).unwrap(), vec![2, 1, 0, 2]);
    }

    #[test]
    fn test_fetch_reverse_is_reverse_complement() {
        let r = reference();
        let l = r.forward_len();
        // Whole reverse half = reverse complement of the whole forward strand
        let rc: Vec<u8> = r.unpack_forward().iter().rev().map(|b| 3 - b).collect();
        assert_eq!(r.fetch(l, 2 * l).unwrap(), rc);
        // Window [l, l+3) covers the last three forward bases (CAG), reversed and complemented
        assert_eq!(r.fetch(l, l + 3).unwrap(), vec![1, 3, 2]);
        for p in l..2 * l {
            assert_eq!(r.base_at(p), Some(rc[(p - l) as usize]));
        }
    }

    #[test]
    fn test_fetch_rejections() {
        let r = reference();
        let l = r.forward_len();
        assert_eq!(r.fetch(4, 4), Err(WindowReject::Empty { rb: 4, re: 4 }));
        assert!(matches!(r.fetch(l - 2, l + 2), Err(WindowReject::Straddle { .. })));
        assert_eq!(
            r.fetch(2 * l - 2, 2 * l + 3),
            Err(WindowReject::OutOfRange {
                rb: 2 * l - 2,
                re: 2 * l + 3,
                got: 2
            })
        );
    }

    #[test]
    fn test_restore_rejects_oversized_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ref.pac");
        PackedReference::from_codes(&[0, 1, 2, 3]).dump(&path).unwrap();

        let err = PackedReference::restore(&path, u64::MAX / 2).unwrap_err();
        assert!(matches!(err, IndexError::Format { .. }), "{err}");
    }

    #[test]
    fn test_dump_restore() {
        let dir = TempDir::new().unwrap();
        for codes in [vec![0u8, 1, 2, 3], vec![3u8, 3, 1, 0, 2, 2, 1]] {
            let path = dir.path().join("ref.pac");
            let r = PackedReference::from_codes(&codes);
            r.dump(&path).unwrap();

            let raw = std::fs::read(&path).unwrap();
            assert_eq!(*raw.last().unwrap() as usize, codes.len() % 4);

            let back = PackedReference::restore(&path, codes.len() as u64).unwrap();
            assert_eq!(back.unpack_forward(), codes);
        }
    }
}
