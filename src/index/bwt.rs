// BWT with interleaved occurrence checkpoints and sampled suffix array
//
// Layout follows BWA's bwt_t after bwt_bwtupdate_core: every 128-base interval
// starts with four cumulative counts (u64, stored as 8 little-endian u32
// words) followed by eight u32 words holding 16 bases each, most significant
// bits first. One final count block closes the array.
//
// The sentinel `$` is not stored; `primary` is the row whose BWT symbol it
// would be.

use crate::core::alignment::bisulfite::ConversionStrand;
use crate::core::utils::binary::{le_u32_at, le_u64_at, BinaryWrite};
use crate::error::{IndexError, Result};
use crate::index::slab::Slab;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const OCC_INTV_SHIFT: u32 = 7;
pub const OCC_INTERVAL: u64 = 1 << OCC_INTV_SHIFT;
pub const OCC_INTV_MASK: u64 = OCC_INTERVAL - 1;

// primary + L2[1..=4]
const BWT_HEADER_BYTES: usize = 5 * 8;
// primary + L2[1..=4] + sa_intv + seq_len
const SA_HEADER_BYTES: usize = 7 * 8;

#[path = "bwt_test.rs"]
mod bwt_test;

#[derive(Debug, Clone)]
pub struct BwtIndex {
    pub strand: ConversionStrand,
    pub primary: u64,
    pub l2: [u64; 5], // C(), cumulative count
    pub seq_len: u64,
    pub bwt_size: u64, // in u32 words, checkpoints included
    pub cnt_table: [u32; 256],
    pub sa_intv: u64,
    pub n_sa: u64,
    pub(crate) bwt: Slab, // bwt_size little-endian u32 words
    pub(crate) sa: Slab,  // n_sa little-endian u64 samples, sa[0] = u64::MAX
}

/// Number of u32 words the interleaved layout needs for `seq_len` bases.
///
/// `None` when the size does not fit in a u64; lengths come from file
/// headers and are not trusted.
pub fn interleaved_size(seq_len: u64) -> Option<u64> {
    let n_occ = seq_len.checked_add(OCC_INTERVAL - 1)? / OCC_INTERVAL + 1;
    let base_words = seq_len.checked_add(15)? >> 4;
    n_occ.checked_mul(8)?.checked_add(base_words)
}

/// Number of suffix-array samples kept at interval `sa_intv`, `None` for a
/// zero interval or on overflow.
pub fn sample_count(seq_len: u64, sa_intv: u64) -> Option<u64> {
    if sa_intv == 0 {
        return None;
    }
    Some(seq_len.checked_add(sa_intv)? / sa_intv)
}

/// Per-byte base counts: byte `i` holds four bases, entry `j` of the
/// result (bits `8j..8j+8`) counts how many of them equal `j`.
pub fn gen_cnt_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        let mut x = 0u32;
        for j in 0..4usize {
            let n = ((i & 3) == j) as u32
                + ((i >> 2 & 3) == j) as u32
                + ((i >> 4 & 3) == j) as u32
                + ((i >> 6) == j) as u32;
            x |= n << (j << 3);
        }
        *slot = x;
    }
    table
}

/// Pack BWT symbols (2-bit codes, sentinel excluded) into the interleaved
/// checkpoint layout (bwt_bwtupdate_core).
pub fn interleave_occ(bwt_codes: &[u8]) -> Vec<u32> {
    let seq_len = bwt_codes.len() as u64;
    let mut buf = Vec::with_capacity(interleaved_size(seq_len).unwrap_or(0) as usize);
    let mut c = [0u64; 4];
    let mut word = 0u32;

    fn push_counts(buf: &mut Vec<u32>, c: &[u64; 4]) {
        for &v in c {
            buf.push(v as u32);
            buf.push((v >> 32) as u32);
        }
    }

    for (i, &b) in bwt_codes.iter().enumerate() {
        if i as u64 & OCC_INTV_MASK == 0 {
            push_counts(&mut buf, &c);
        }
        let b = b & 3;
        word |= (b as u32) << ((!(i as u32) & 0xf) << 1);
        if i & 0xf == 0xf {
            buf.push(word);
            word = 0;
        }
        c[b as usize] += 1;
    }
    if seq_len & 0xf != 0 {
        buf.push(word);
    }
    push_counts(&mut buf, &c);

    buf
}

#[inline(always)]
fn occ_aux(y: u64, c: u8) -> u64 {
    // reduce nucleotide counting to bits counting
    let hi = if c & 2 != 0 { y } else { !y };
    let lo = if c & 1 != 0 { y } else { !y };
    ((hi >> 1) & lo & 0x5555_5555_5555_5555).count_ones() as u64
}

impl BwtIndex {
    /// Assemble from buffers whose sizes have already been established.
    pub(crate) fn from_parts(
        strand: ConversionStrand,
        primary: u64,
        l2: [u64; 5],
        bwt: Slab,
        sa_intv: u64,
        sa: Slab,
    ) -> Self {
        let seq_len = l2[4];
        BwtIndex {
            strand,
            primary,
            l2,
            seq_len,
            bwt_size: (bwt.len() / 4) as u64,
            cnt_table: gen_cnt_table(),
            sa_intv,
            n_sa: (sa.len() / 8) as u64,
            bwt,
            sa,
        }
    }

    /// Load `.bwt` and `.sa` files (bwt_restore_bwt + bwt_restore_sa).
    pub fn restore(bwt_path: &Path, sa_path: &Path, strand: ConversionStrand) -> Result<Self> {
        let (primary, l2, words) = Self::restore_bwt(bwt_path)?;
        let (sa_intv, sa) = Self::restore_sa(sa_path, primary, l2[4])?;

        log::debug!(
            "Restored {:?} BWT: seq_len={}, bwt_size={}, sa_intv={}, n_sa={}",
            strand,
            l2[4],
            words.len() / 4,
            sa_intv,
            sa.len() / 8
        );
        Ok(Self::from_parts(strand, primary, l2, Slab::Heap(words), sa_intv, Slab::Heap(sa)))
    }

    fn restore_bwt(path: &Path) -> Result<(u64, [u64; 5], Vec<u8>)> {
        let mut data = std::fs::read(path)?;
        if data.len() < BWT_HEADER_BYTES || (data.len() - BWT_HEADER_BYTES) % 4 != 0 {
            return Err(IndexError::format(path, format!("unexpected file size {}", data.len())));
        }

        let primary = le_u64_at(&data, 0);
        let mut l2 = [0u64; 5];
        for (i, slot) in l2.iter_mut().enumerate().skip(1) {
            *slot = le_u64_at(&data, i);
        }
        let words = data.split_off(BWT_HEADER_BYTES);

        let seq_len = l2[4];
        let bwt_size = (words.len() / 4) as u64;
        let expected = interleaved_size(seq_len)
            .ok_or_else(|| IndexError::format(path, format!("seq_len {seq_len} is out of range")))?;
        if bwt_size != expected {
            return Err(IndexError::format(
                path,
                format!(
                    "bwt_size {} does not match seq_len {} (expected {} words)",
                    bwt_size, seq_len, expected
                ),
            ));
        }
        if primary > seq_len {
            return Err(IndexError::format(path, format!("primary {primary} > seq_len {seq_len}")));
        }

        Ok((primary, l2, words))
    }

    fn restore_sa(path: &Path, primary: u64, seq_len: u64) -> Result<(u64, Vec<u8>)> {
        let data = std::fs::read(path)?;
        if data.len() < SA_HEADER_BYTES {
            return Err(IndexError::format(path, "truncated header"));
        }

        if le_u64_at(&data, 0) != primary {
            return Err(IndexError::Inconsistent(format!(
                "SA-BWT inconsistency: primary is not the same ({})",
                path.display()
            )));
        }
        // L2[1..=4] is repeated here and skipped
        let sa_intv = le_u64_at(&data, 5);
        if le_u64_at(&data, 6) != seq_len {
            return Err(IndexError::Inconsistent(format!(
                "SA-BWT inconsistency: seq_len is not the same ({})",
                path.display()
            )));
        }
        if sa_intv == 0 {
            return Err(IndexError::format(path, "sa_intv is zero"));
        }

        let n_sa = sample_count(seq_len, sa_intv)
            .ok_or_else(|| IndexError::format(path, format!("sa_intv {sa_intv} is out of range")))?;
        let body = &data[SA_HEADER_BYTES..];
        if Some(body.len() as u64) != (n_sa - 1).checked_mul(8) {
            return Err(IndexError::format(
                path,
                format!("expected {} samples, found {} bytes", n_sa - 1, body.len()),
            ));
        }

        let mut sa = Vec::with_capacity(n_sa as usize * 8);
        sa.write_u64_le(u64::MAX)?;
        sa.extend_from_slice(body);
        Ok((sa_intv, sa))
    }

    /// Write `.bwt` and `.sa` files (bwt_dump_bwt + bwt_dump_sa).
    pub fn dump(&self, bwt_path: &Path, sa_path: &Path) -> Result<()> {
        let mut w = BufWriter::new(File::create(bwt_path)?);
        w.write_u64_le(self.primary)?;
        w.write_u64_array_le(&self.l2[1..])?;
        w.write_all(&self.bwt)?;
        w.flush()?;

        let mut w = BufWriter::new(File::create(sa_path)?);
        w.write_u64_le(self.primary)?;
        w.write_u64_array_le(&self.l2[1..])?;
        w.write_u64_le(self.sa_intv)?;
        w.write_u64_le(self.seq_len)?;
        w.write_all(self.sa.get(8..).unwrap_or(&[]))?;
        w.flush()?;

        Ok(())
    }

    /// Raw interleaved words as little-endian bytes.
    pub fn bwt_bytes(&self) -> &[u8] {
        &self.bwt
    }

    /// Suffix-array samples as little-endian bytes, `sa[0]` included.
    pub fn sa_bytes(&self) -> &[u8] {
        &self.sa
    }

    /// True when the buffers live inside a flattened region.
    pub fn is_flat(&self) -> bool {
        self.bwt.is_region()
    }

    #[inline(always)]
    fn word(&self, i: usize) -> u32 {
        le_u32_at(&self.bwt, i)
    }

    #[inline(always)]
    fn pair(&self, i: usize) -> u64 {
        (self.word(i) as u64) << 32 | self.word(i + 1) as u64
    }

    // ((bwtint_t*)bwt_occ_intv(b, k))[c]
    #[inline(always)]
    fn interval_count(&self, start: usize, c: usize) -> u64 {
        self.word(start + 2 * c) as u64 | (self.word(start + 2 * c + 1) as u64) << 32
    }

    /// BWT symbol of the sentinel-free string at position `k`.
    #[inline(always)]
    fn b0(&self, k: u64) -> u8 {
        let w = self.word((((k >> OCC_INTV_SHIFT) << 4) + 8 + ((k & OCC_INTV_MASK) >> 4)) as usize);
        (w >> ((!k & 0xf) << 1) & 3) as u8
    }

    /// BWT symbol of row `k`; `None` for the sentinel row and out of range.
    pub fn base_at(&self, row: u64) -> Option<u8> {
        if row == self.primary || row > self.seq_len {
            return None;
        }
        let k = if row > self.primary { row - 1 } else { row };
        Some(self.b0(k))
    }

    /// Occurrences of `c` in rows `[0, k]` (bwt_occ). `k = u64::MAX` means
    /// the empty prefix.
    pub fn occ(&self, k: u64, c: u8) -> u64 {
        let c = c & 3;
        if k == u64::MAX {
            return 0;
        }
        if k >= self.seq_len {
            return self.l2[c as usize + 1] - self.l2[c as usize];
        }
        // because $ is not in bwt
        let k = if k >= self.primary {
            match k.checked_sub(1) {
                Some(k) => k,
                None => return 0,
            }
        } else {
            k
        };

        let start = ((k >> OCC_INTV_SHIFT) << 4) as usize;
        let mut n = self.interval_count(start, c as usize);
        let mut p = start + 8;
        let end = p + ((((k >> 5) - ((k & !OCC_INTV_MASK) >> 5)) << 1) as usize);
        while p < end {
            n += occ_aux(self.pair(p), c);
            p += 2;
        }
        let mask = !((1u64 << ((!k & 31) << 1)) - 1);
        n += occ_aux(self.pair(p) & mask, c);
        if c == 0 {
            n -= !k & 31; // corrected for the masked bits
        }
        n
    }

    /// Suffix-array sample `i`, i.e. SA[i * sa_intv].
    pub fn sa_sample(&self, i: u64) -> Option<u64> {
        if i >= self.n_sa {
            return None;
        }
        Some(le_u64_at(&self.sa, i as usize))
    }
}
