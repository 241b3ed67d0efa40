// Index construction from reference sequences
//
// 1. Pack the forward strand; runs of ambiguous bases become holes and are
//    replaced by seeded random bases (bns_fasta2bntseq)
// 2. Append the reverse complement and derive the two converted texts:
//    parent (C>T) and daughter (G>A)
// 3. Suffix-sort each text with bio, emit the interleaved BWT and SA samples
//
// Memory is dominated by the full suffix array of the doubled reference, so
// this is meant for test references and small genomes.

use super::bntseq::{AnnotationTable, Contig, Hole, NST_NT4_TABLE};
use super::bwt::{interleave_occ, sample_count, BwtIndex};
use super::index::BisIndex;
use super::pac::PackedReference;
use super::slab::Slab;
use crate::core::alignment::bisulfite::ConversionStrand;
use crate::defaults::AMBIGUOUS_SEED;
use crate::error::{IndexError, Result};
use bio::data_structures::suffix_array::suffix_array;
use bio::io::fasta;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::path::Path;
use std::time::Instant;

/// One reference sequence as read from FASTA (ASCII bases).
#[derive(Debug, Clone)]
pub struct ReferenceRecord {
    pub name: String,
    pub anno: String,
    pub seq: Vec<u8>,
}

impl ReferenceRecord {
    pub fn new(name: impl Into<String>, seq: impl Into<Vec<u8>>) -> Self {
        ReferenceRecord {
            name: name.into(),
            anno: String::new(),
            seq: seq.into(),
        }
    }
}

/// Pack records into annotations plus forward-strand codes.
pub fn pack_records(records: &[ReferenceRecord]) -> (AnnotationTable, Vec<u8>) {
    let mut rng = StdRng::seed_from_u64(AMBIGUOUS_SEED as u64);
    let total: usize = records.iter().map(|r| r.seq.len()).sum();
    let mut codes = Vec::with_capacity(total);
    let mut contigs = Vec::with_capacity(records.len());
    let mut holes: Vec<Hole> = Vec::new();

    for record in records {
        let offset = codes.len() as u64;
        let mut n_ambs = 0u32;
        for &base in &record.seq {
            let mut c = NST_NT4_TABLE[base as usize];
            if c >= 4 {
                let pos = codes.len() as u64;
                match holes.last_mut() {
                    Some(h)
                        if h.offset >= offset && h.offset + h.len as u64 == pos && h.amb == base =>
                    {
                        h.len += 1
                    }
                    _ => holes.push(Hole {
                        offset: pos,
                        len: 1,
                        amb: base,
                    }),
                }
                n_ambs += 1;
                c = rng.gen_range(0..4);
            }
            codes.push(c);
        }
        contigs.push(Contig {
            offset,
            len: record.seq.len() as u32,
            n_ambs,
            gi: 0,
            is_alt: false,
            name: record.name.clone(),
            anno: record.anno.clone(),
        });
    }

    let table = AnnotationTable::new(codes.len() as u64, AMBIGUOUS_SEED, contigs, holes);
    (table, codes)
}

/// Forward strand followed by its reverse complement.
pub fn doubled_text(forward: &[u8]) -> Vec<u8> {
    let mut text = Vec::with_capacity(forward.len() * 2);
    text.extend_from_slice(forward);
    text.extend(forward.iter().rev().map(|&b| 3 - b));
    text
}

/// Build a BWT with checkpoints and SA samples over `text` (2-bit codes).
/// A zero `sa_intv` is treated as 1.
pub fn build_bwt(text: &[u8], strand: ConversionStrand, sa_intv: u64) -> BwtIndex {
    let sa_intv = sa_intv.max(1);
    // bio needs a unique, lexicographically smallest sentinel at the end,
    // so shift bases to 1..=4 and use 0 as sentinel
    let mut shifted: Vec<u8> = Vec::with_capacity(text.len() + 1);
    shifted.extend(text.iter().map(|&b| (b & 3) + 1));
    shifted.push(0);
    let sa = suffix_array(&shifted);

    let seq_len = text.len() as u64;
    let mut primary = 0u64;
    let mut bwt_codes = Vec::with_capacity(text.len());
    let mut counts = [0u64; 4];
    for (row, &s) in sa.iter().enumerate() {
        if s == 0 {
            primary = row as u64;
            continue;
        }
        let c = shifted[s - 1] - 1;
        counts[c as usize] += 1;
        bwt_codes.push(c);
    }

    let mut l2 = [0u64; 5];
    for c in 0..4 {
        l2[c + 1] = l2[c] + counts[c];
    }

    let words = interleave_occ(&bwt_codes);
    let mut word_bytes = Vec::with_capacity(words.len() * 4);
    for w in words {
        word_bytes.extend_from_slice(&w.to_le_bytes());
    }

    let n_sa = sample_count(seq_len, sa_intv).unwrap_or(1);
    let mut sa_bytes = Vec::with_capacity(n_sa as usize * 8);
    sa_bytes.extend_from_slice(&u64::MAX.to_le_bytes());
    for i in 1..n_sa {
        let v = sa[(i * sa_intv) as usize] as u64;
        sa_bytes.extend_from_slice(&v.to_le_bytes());
    }

    BwtIndex::from_parts(strand, primary, l2, Slab::Heap(word_bytes), sa_intv, Slab::Heap(sa_bytes))
}

/// Build a heap-mode index for `records` without touching the filesystem.
pub fn build_index(records: &[ReferenceRecord], sa_intv: u64) -> Result<BisIndex> {
    if records.is_empty() {
        return Err(IndexError::Inconsistent("no reference sequences".to_string()));
    }
    if sa_intv == 0 {
        return Err(IndexError::Inconsistent("sa_intv must be positive".to_string()));
    }

    let start = Instant::now();
    let (table, forward) = pack_records(records);
    let reference = PackedReference::from_codes(&forward);
    let text = doubled_text(&forward);
    drop(forward);

    let parent_text: Vec<u8> = text
        .iter()
        .map(|&b| ConversionStrand::Parent.convert(b))
        .collect();
    let parent = build_bwt(&parent_text, ConversionStrand::Parent, sa_intv);
    drop(parent_text);

    let daughter_text: Vec<u8> = text
        .iter()
        .map(|&b| ConversionStrand::Daughter.convert(b))
        .collect();
    let daughter = build_bwt(&daughter_text, ConversionStrand::Daughter, sa_intv);

    log::info!(
        "Built bisulfite index: {} contigs, l_pac={}, {} holes in {:.3}s",
        table.n_seqs(),
        table.forward_len,
        table.holes().len(),
        start.elapsed().as_secs_f64()
    );

    Ok(BisIndex::from_components(
        Some(daughter),
        Some(parent),
        Some(table),
        Some(reference),
    ))
}

/// Build and dump the complete file set under `prefix`.
pub fn build_from_records(
    records: &[ReferenceRecord],
    prefix: &Path,
    sa_intv: u64,
) -> Result<BisIndex> {
    let index = build_index(records, sa_intv)?;
    index.dump(prefix)?;
    log::info!("Index files written with prefix {}", prefix.display());
    Ok(index)
}

/// Read a FASTA file and build the index under `prefix`.
pub fn build_from_fasta(fasta_path: &Path, prefix: &Path, sa_intv: u64) -> Result<BisIndex> {
    log::info!("Building index for {} with prefix {}", fasta_path.display(), prefix.display());
    let reader = fasta::Reader::new(File::open(fasta_path)?);
    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IndexError::format(fasta_path, e.to_string()))?;
        records.push(ReferenceRecord {
            name: record.id().to_string(),
            anno: record.desc().unwrap_or("").to_string(),
            seq: record.seq().to_vec(),
        });
    }
    build_from_records(&records, prefix, sa_intv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_records_collects_holes() {
        let records = vec![
            ReferenceRecord::new("a", b"ACNNGT".to_vec()),
            ReferenceRecord::new("b", b"NACG".to_vec()),
        ];
        let (table, codes) = pack_records(&records);
        assert_eq!(table.forward_len, 10);
        assert_eq!(codes.len(), 10);
        assert!(codes.iter().all(|&c| c < 4));
        assert_eq!(&codes[..2], &[0, 1]);
        assert_eq!(&codes[4..6], &[2, 3]);

        let holes = table.holes();
        assert_eq!(holes.len(), 2);
        assert_eq!((holes[0].offset, holes[0].len, holes[0].amb), (2, 2, b'N'));
        assert_eq!((holes[1].offset, holes[1].len), (6, 1));
        assert_eq!(table.contigs()[0].n_ambs, 2);
        assert_eq!(table.contigs()[1].offset, 6);
    }

    #[test]
    fn test_random_replacement_is_deterministic() {
        let records = vec![ReferenceRecord::new("a", b"NNNNNNNNNNNNACGT".to_vec())];
        assert_eq!(pack_records(&records).1, pack_records(&records).1);
    }

    #[test]
    fn test_doubled_text() {
        assert_eq!(doubled_text(&[0, 1, 1, 2]), vec![0, 1, 1, 2, 1, 2, 2, 3]);
    }

    #[test]
    fn test_converted_texts_lack_converted_base() {
        let records = vec![ReferenceRecord::new("chr", b"ACGTACGGCCTTAGCA".to_vec())];
        let idx = build_index(&records, 4).unwrap();
        let parent = idx.parent().unwrap();
        let daughter = idx.daughter().unwrap();
        // no C left in the parent text, no G in the daughter text
        assert_eq!(parent.l2[2] - parent.l2[1], 0);
        assert_eq!(daughter.l2[3] - daughter.l2[2], 0);
        assert_eq!(parent.seq_len, 32);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(build_index(&[], 32).is_err());
    }
}
