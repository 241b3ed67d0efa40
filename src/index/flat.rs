//! Single-region form of a loaded index.
//!
//! `flatten` lays every component out in one contiguous little-endian
//! buffer; `unflatten` walks the same layout with a bounds-checked cursor
//! and re-points each large buffer at a range inside the region, so a region
//! mapped from shared memory is used in place. Only the contig table, its
//! strings and the hole table are copied to the heap.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! header      magic[8] version:u32 sections:u32 total_len:u64
//! bwt x2      strand:u8 pad[7] primary l2[5] seq_len bwt_size sa_intv n_sa (u64)
//!             words[bwt_size * 4] sa[n_sa * 8]           (daughter, then parent)
//! annotations forward_len:u64 seed:u32 n_seqs:u32 n_holes:u32 pad:u32
//!             holes:    offset:u64 len:u32 amb:u8 pad[3]
//!             contigs:  offset:u64 len:u32 n_ambs:u32 gi:u32 is_alt:u32
//!                       name_len:u32 anno_len:u32
//!             strings:  name\0 anno\0 per contig
//! reference   forward_len:u64 pac[forward_len/4 + 1]
//! ```
//!
//! Absent components are skipped and recorded in the `sections` bits.

use crate::core::alignment::bisulfite::ConversionStrand;
use crate::core::utils::binary::ByteCursor;
use crate::error::{IndexError, Result};
use crate::index::bntseq::{AnnotationTable, Contig, Hole};
use crate::index::bwt::{interleaved_size, sample_count, BwtIndex};
use crate::index::pac::{packed_size, PackedReference};
use crate::index::slab::{FlatRegion, Slab};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub const FLAT_MAGIC: [u8; 8] = *b"BISFLAT\0";
pub const FLAT_VERSION: u32 = 1;

const HEADER_BYTES: usize = 8 + 4 + 4 + 8;

pub const SECTION_DAUGHTER: u32 = 1;
pub const SECTION_PARENT: u32 = 1 << 1;
pub const SECTION_ANNOTATIONS: u32 = 1 << 2;
pub const SECTION_REFERENCE: u32 = 1 << 3;

/// Components recovered from a region, in flattening order.
#[derive(Debug)]
pub struct FlatParts {
    pub daughter: Option<BwtIndex>,
    pub parent: Option<BwtIndex>,
    pub annotations: Option<AnnotationTable>,
    pub reference: Option<PackedReference>,
}

fn put_u8(buf: &mut Vec<u8>, v: u8) {
    buf.push(v);
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn flatten_bwt(buf: &mut Vec<u8>, bwt: &BwtIndex) {
    put_u8(buf, bwt.strand.tag());
    buf.extend_from_slice(&[0u8; 7]);
    put_u64(buf, bwt.primary);
    for &v in &bwt.l2 {
        put_u64(buf, v);
    }
    put_u64(buf, bwt.seq_len);
    put_u64(buf, bwt.bwt_size);
    put_u64(buf, bwt.sa_intv);
    put_u64(buf, bwt.n_sa);
    buf.extend_from_slice(bwt.bwt_bytes());
    buf.extend_from_slice(bwt.sa_bytes());
}

fn flatten_annotations(buf: &mut Vec<u8>, bns: &AnnotationTable) {
    put_u64(buf, bns.forward_len);
    put_u32(buf, bns.seed);
    put_u32(buf, bns.contigs().len() as u32);
    put_u32(buf, bns.holes().len() as u32);
    put_u32(buf, 0);
    for h in bns.holes() {
        put_u64(buf, h.offset);
        put_u32(buf, h.len);
        put_u8(buf, h.amb);
        buf.extend_from_slice(&[0u8; 3]);
    }
    for c in bns.contigs() {
        put_u64(buf, c.offset);
        put_u32(buf, c.len);
        put_u32(buf, c.n_ambs);
        put_u32(buf, c.gi);
        put_u32(buf, c.is_alt as u32);
        put_u32(buf, c.name.len() as u32);
        put_u32(buf, c.anno.len() as u32);
    }
    for c in bns.contigs() {
        buf.extend_from_slice(c.name.as_bytes());
        put_u8(buf, 0);
        buf.extend_from_slice(c.anno.as_bytes());
        put_u8(buf, 0);
    }
}

/// Serialize loaded components into one region (bwa_idx2mem).
pub fn flatten(
    daughter: Option<&BwtIndex>,
    parent: Option<&BwtIndex>,
    annotations: Option<&AnnotationTable>,
    reference: Option<&PackedReference>,
) -> Vec<u8> {
    let mut sections = 0;
    let mut buf = Vec::new();
    buf.extend_from_slice(&FLAT_MAGIC);
    put_u32(&mut buf, FLAT_VERSION);
    put_u32(&mut buf, 0); // sections, patched below
    put_u64(&mut buf, 0); // total length, patched below

    if let Some(bwt) = daughter {
        sections |= SECTION_DAUGHTER;
        flatten_bwt(&mut buf, bwt);
    }
    if let Some(bwt) = parent {
        sections |= SECTION_PARENT;
        flatten_bwt(&mut buf, bwt);
    }
    if let Some(bns) = annotations {
        sections |= SECTION_ANNOTATIONS;
        flatten_annotations(&mut buf, bns);
    }
    if let Some(pac) = reference {
        sections |= SECTION_REFERENCE;
        put_u64(&mut buf, pac.forward_len());
        buf.extend_from_slice(&pac.as_bytes()[..packed_size(pac.forward_len())]);
    }

    let total = buf.len() as u64;
    buf[12..16].copy_from_slice(&sections.to_le_bytes());
    buf[16..24].copy_from_slice(&total.to_le_bytes());
    buf
}

/// Write a flattened region to `path`, e.g. a file under `/dev/shm`.
pub fn write_region(path: &Path, region: &[u8]) -> Result<()> {
    let mut f = File::create(path)?;
    f.write_all(region)?;
    f.flush()?;
    Ok(())
}

struct RegionReader<'a> {
    cur: ByteCursor<'a>,
    region: &'a Arc<FlatRegion>,
}

impl<'a> RegionReader<'a> {
    fn truncated(&self, what: &str) -> IndexError {
        IndexError::Corrupt(format!("region truncated in {} at byte {}", what, self.cur.position()))
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        self.cur.u8().ok_or_else(|| self.truncated(what))
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        self.cur.u32().ok_or_else(|| self.truncated(what))
    }

    fn u64(&mut self, what: &str) -> Result<u64> {
        self.cur.u64().ok_or_else(|| self.truncated(what))
    }

    fn skip(&mut self, len: usize, what: &str) -> Result<usize> {
        self.cur.skip(len).ok_or_else(|| self.truncated(what))
    }

    // A range of the region, not a copy
    fn slab(&mut self, len: u64, what: &str) -> Result<Slab> {
        let len = usize::try_from(len).map_err(|_| self.truncated(what))?;
        let start = self.skip(len, what)?;
        Ok(Slab::Region {
            region: Arc::clone(self.region),
            range: start..start + len,
        })
    }

    fn string(&mut self, expected: u32, what: &str) -> Result<String> {
        let s = self.cur.c_str().ok_or_else(|| self.truncated(what))?;
        if s.len() != expected as usize {
            return Err(IndexError::Corrupt(format!(
                "{} length {} does not match record ({})",
                what,
                s.len(),
                expected
            )));
        }
        String::from_utf8(s.to_vec())
            .map_err(|_| IndexError::Corrupt(format!("{what} is not UTF-8")))
    }

    fn bwt(&mut self, expect: ConversionStrand) -> Result<BwtIndex> {
        let tag = self.u8("bwt header")?;
        self.skip(7, "bwt header")?;
        let strand = ConversionStrand::from_tag(tag)
            .ok_or_else(|| IndexError::Corrupt(format!("unknown strand tag {tag}")))?;
        if strand != expect {
            return Err(IndexError::Corrupt(format!(
                "expected {expect:?} BWT, found {strand:?}"
            )));
        }

        let primary = self.u64("bwt header")?;
        let mut l2 = [0u64; 5];
        for v in l2.iter_mut() {
            *v = self.u64("bwt header")?;
        }
        let seq_len = self.u64("bwt header")?;
        let bwt_size = self.u64("bwt header")?;
        let sa_intv = self.u64("bwt header")?;
        let n_sa = self.u64("bwt header")?;

        if seq_len != l2[4] || Some(bwt_size) != interleaved_size(seq_len) {
            return Err(IndexError::Corrupt(format!(
                "{strand:?} BWT sizes disagree (seq_len={seq_len}, bwt_size={bwt_size})"
            )));
        }
        if Some(n_sa) != sample_count(seq_len, sa_intv) {
            return Err(IndexError::Corrupt(format!(
                "{strand:?} SA sizes disagree (sa_intv={sa_intv}, n_sa={n_sa})"
            )));
        }

        // sizes are established before the buffers are carved out
        let word_bytes = bwt_size.checked_mul(4).ok_or_else(|| {
            IndexError::Corrupt(format!("{strand:?} bwt_size {bwt_size} is out of range"))
        })?;
        let sa_bytes = n_sa
            .checked_mul(8)
            .ok_or_else(|| IndexError::Corrupt(format!("{strand:?} n_sa {n_sa} is out of range")))?;
        let words = self.slab(word_bytes, "bwt words")?;
        let sa = self.slab(sa_bytes, "suffix array")?;
        Ok(BwtIndex::from_parts(strand, primary, l2, words, sa_intv, sa))
    }

    fn annotations(&mut self) -> Result<AnnotationTable> {
        let forward_len = self.u64("annotation header")?;
        let seed = self.u32("annotation header")?;
        let n_seqs = self.u32("annotation header")?;
        let n_holes = self.u32("annotation header")?;
        self.skip(4, "annotation header")?;

        let mut holes = Vec::with_capacity((n_holes as usize).min(self.cur.remaining() / 16));
        for _ in 0..n_holes {
            let offset = self.u64("hole")?;
            let len = self.u32("hole")?;
            let amb = self.u8("hole")?;
            self.skip(3, "hole")?;
            holes.push(Hole { offset, len, amb });
        }

        let mut records = Vec::with_capacity((n_seqs as usize).min(self.cur.remaining() / 32));
        for _ in 0..n_seqs {
            let offset = self.u64("contig")?;
            let len = self.u32("contig")?;
            let n_ambs = self.u32("contig")?;
            let gi = self.u32("contig")?;
            let is_alt = self.u32("contig")? != 0;
            let name_len = self.u32("contig")?;
            let anno_len = self.u32("contig")?;
            records.push((offset, len, n_ambs, gi, is_alt, name_len, anno_len));
        }

        let mut contigs = Vec::with_capacity(records.len());
        for (offset, len, n_ambs, gi, is_alt, name_len, anno_len) in records {
            let name = self.string(name_len, "contig name")?;
            let anno = self.string(anno_len, "contig annotation")?;
            contigs.push(Contig {
                offset,
                len,
                n_ambs,
                gi,
                is_alt,
                name,
                anno,
            });
        }

        Ok(AnnotationTable::new(forward_len, seed, contigs, holes))
    }

    fn reference(&mut self) -> Result<PackedReference> {
        let forward_len = self.u64("reference header")?;
        let bytes = self.slab(packed_size(forward_len) as u64, "packed reference")?;
        Ok(PackedReference::from_slab(forward_len, bytes))
    }
}

/// Rebuild components from a region (bwa_mem2idx).
///
/// Every byte must be consumed; anything else means the region does not
/// describe a well-formed index.
pub fn unflatten(region: &Arc<FlatRegion>) -> Result<FlatParts> {
    let bytes = region.bytes();
    let mut r = RegionReader {
        cur: ByteCursor::new(bytes),
        region,
    };

    let magic = r.cur.take(8).ok_or_else(|| r.truncated("header"))?;
    if magic != FLAT_MAGIC {
        return Err(IndexError::Corrupt("bad magic".to_string()));
    }
    let version = r.u32("header")?;
    if version != FLAT_VERSION {
        return Err(IndexError::UnsupportedVersion {
            found: version,
            expected: FLAT_VERSION,
        });
    }
    let sections = r.u32("header")?;
    let total = r.u64("header")?;
    if total != bytes.len() as u64 {
        return Err(IndexError::Corrupt(format!(
            "region is {} bytes, header says {}",
            bytes.len(),
            total
        )));
    }
    debug_assert_eq!(r.cur.position(), HEADER_BYTES);

    let daughter = if sections & SECTION_DAUGHTER != 0 {
        Some(r.bwt(ConversionStrand::Daughter)?)
    } else {
        None
    };
    let parent = if sections & SECTION_PARENT != 0 {
        Some(r.bwt(ConversionStrand::Parent)?)
    } else {
        None
    };
    let annotations = if sections & SECTION_ANNOTATIONS != 0 {
        Some(r.annotations()?)
    } else {
        None
    };
    let reference = if sections & SECTION_REFERENCE != 0 {
        Some(r.reference()?)
    } else {
        None
    };

    if let (Some(bns), Some(pac)) = (&annotations, &reference) {
        if bns.forward_len != pac.forward_len() {
            return Err(IndexError::Corrupt(format!(
                "annotation length {} does not match packed reference {}",
                bns.forward_len,
                pac.forward_len()
            )));
        }
    }

    if r.cur.position() != bytes.len() {
        return Err(IndexError::Corrupt(format!(
            "consumed {} of {} bytes",
            r.cur.position(),
            bytes.len()
        )));
    }

    Ok(FlatParts {
        daughter,
        parent,
        annotations,
        reference,
    })
}
