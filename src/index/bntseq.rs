// Reference annotations: contigs and ambiguous-base holes (.ann / .amb / .alt)
//
// The table describes the forward strand only. Coordinates at or past
// `forward_len` refer to the reverse complement and are mirrored back onto
// the forward strand before any lookup.

use crate::error::{IndexError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

// From C's bntseq.h
pub const NST_NT4_TABLE: [u8; 256] = [
    4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
    4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
    4, 0, 4, 1, 4, 4, 4, 2, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 3, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
    4, 0, 4, 1, 4, 4, 4, 2, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 3, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
    4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
    4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
    4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
    4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
];

/// Per-contig annotation (bntann1_t)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contig {
    /// Offset in the concatenated forward strand
    pub offset: u64,
    pub len: u32,
    /// Number of ambiguous bases (N) in this contig
    pub n_ambs: u32,
    /// GenInfo identifier, 0 when absent
    pub gi: u32,
    /// Listed in the `.alt` file
    pub is_alt: bool,
    pub name: String,
    /// FASTA header comment, empty when absent
    pub anno: String,
}

/// Run of ambiguous bases (bntamb1_t)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hole {
    pub offset: u64,
    pub len: u32,
    pub amb: u8,
}

/// Contig and hole tables for one reference (bntseq_t without the pac).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationTable {
    /// Forward strand length (l_pac)
    pub forward_len: u64,
    /// Seed used to replace ambiguous bases when the index was built
    pub seed: u32,
    pub(crate) contigs: Vec<Contig>,
    pub(crate) holes: Vec<Hole>,
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut s = prefix.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

// Pull the next line or fail with a format error naming the file
fn next_line<B: BufRead>(lines: &mut std::io::Lines<B>, file: &Path, what: &str) -> Result<String> {
    match lines.next() {
        Some(line) => Ok(line?),
        None => Err(IndexError::format(file, format!("missing {what}"))),
    }
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>, file: &Path, what: &str) -> Result<T> {
    field
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| IndexError::format(file, format!("invalid {what}")))
}

impl AnnotationTable {
    pub fn new(forward_len: u64, seed: u32, contigs: Vec<Contig>, holes: Vec<Hole>) -> Self {
        AnnotationTable {
            forward_len,
            seed,
            contigs,
            holes,
        }
    }

    pub fn contigs(&self) -> &[Contig] {
        &self.contigs
    }

    pub fn holes(&self) -> &[Hole] {
        &self.holes
    }

    pub fn n_seqs(&self) -> usize {
        self.contigs.len()
    }

    pub fn alt_count(&self) -> usize {
        self.contigs.iter().filter(|c| c.is_alt).count()
    }

    /// Contigs ordered by name; load order is left untouched.
    pub fn sorted_by_name(&self) -> Vec<&Contig> {
        let mut v: Vec<&Contig> = self.contigs.iter().collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        v
    }

    /// Set the ALT flag on every contig named in `names`; returns how many
    /// contigs were flagged.
    pub fn mark_alt<'a, I>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut n = 0;
        for name in names {
            for c in self.contigs.iter_mut().filter(|c| c.name == name && !c.is_alt) {
                c.is_alt = true;
                n += 1;
            }
        }
        n
    }

    /// Contig id containing `pos` (either strand), as bns_pos2rid after
    /// bns_depos. `None` past the end of the reference.
    pub fn position_to_contig(&self, pos: u64) -> Option<usize> {
        let l = self.forward_len;
        if pos >= l << 1 || self.contigs.is_empty() {
            return None;
        }
        let pos_f = if pos >= l { (l << 1) - 1 - pos } else { pos };
        let idx = self.contigs.partition_point(|c| c.offset <= pos_f);
        if idx == 0 {
            return None;
        }
        let c = &self.contigs[idx - 1];
        if pos_f < c.offset + c.len as u64 {
            Some(idx - 1)
        } else {
            None
        }
    }

    /// Read `<prefix>.ann`, `<prefix>.amb` and, if present, `<prefix>.alt`.
    pub fn restore(prefix: &Path) -> Result<Self> {
        let ann_path = with_suffix(prefix, ".ann");
        let amb_path = with_suffix(prefix, ".amb");
        let mut table = Self::restore_ann(&ann_path)?;
        table.holes = Self::restore_amb(&amb_path, table.forward_len, table.contigs.len())?;

        let alt_path = with_suffix(prefix, ".alt");
        if alt_path.exists() {
            let names = read_alt_names(&alt_path)?;
            let marked = table.mark_alt(names.iter().map(String::as_str));
            if marked < names.len() {
                log::warn!(
                    "{}: {} of {} ALT names match no contig",
                    alt_path.display(),
                    names.len() - marked,
                    names.len()
                );
            }
        }

        Ok(table)
    }

    fn restore_ann(path: &Path) -> Result<Self> {
        let mut lines = BufReader::new(File::open(path)?).lines();

        // l_pac n_seqs seed
        let first = next_line(&mut lines, path, "header line")?;
        let mut parts = first.split_whitespace();
        let forward_len: u64 = parse_field(parts.next(), path, "l_pac")?;
        let n_seqs: usize = parse_field(parts.next(), path, "n_seqs")?;
        let seed: u32 = parse_field(parts.next(), path, "seed")?;

        let mut contigs = Vec::with_capacity(n_seqs);
        for _ in 0..n_seqs {
            // gi name [anno]
            let line = next_line(&mut lines, path, "name line")?;
            let line = line.trim_end_matches('\r');
            let mut name_parts = line.splitn(3, ' ');
            let gi: u32 = parse_field(name_parts.next(), path, "gi")?;
            let name = match name_parts.next() {
                Some(n) if !n.is_empty() => n.to_string(),
                _ => return Err(IndexError::format(path, "missing contig name")),
            };
            let anno = match name_parts.next() {
                Some(a) if a != "(null)" => a.to_string(),
                _ => String::new(),
            };

            // offset len n_ambs
            let line = next_line(&mut lines, path, "offset line")?;
            let mut parts = line.split_whitespace();
            let offset: u64 = parse_field(parts.next(), path, "offset")?;
            let len: u32 = parse_field(parts.next(), path, "len")?;
            let n_ambs: u32 = parse_field(parts.next(), path, "n_ambs")?;

            contigs.push(Contig {
                offset,
                len,
                n_ambs,
                gi,
                is_alt: false,
                name,
                anno,
            });
        }

        Ok(AnnotationTable {
            forward_len,
            seed,
            contigs,
            holes: Vec::new(),
        })
    }

    fn restore_amb(path: &Path, forward_len: u64, n_seqs: usize) -> Result<Vec<Hole>> {
        let mut lines = BufReader::new(File::open(path)?).lines();

        // l_pac n_seqs n_holes
        let first = next_line(&mut lines, path, "header line")?;
        let mut parts = first.split_whitespace();
        let l_pac: u64 = parse_field(parts.next(), path, "l_pac")?;
        let seqs: usize = parse_field(parts.next(), path, "n_seqs")?;
        let n_holes: usize = parse_field(parts.next(), path, "n_holes")?;
        if l_pac != forward_len || seqs != n_seqs {
            return Err(IndexError::Inconsistent(
                "inconsistent .ann and .amb files".to_string(),
            ));
        }

        let mut holes = Vec::with_capacity(n_holes);
        for _ in 0..n_holes {
            let line = next_line(&mut lines, path, "hole line")?;
            let mut parts = line.split_whitespace();
            let offset: u64 = parse_field(parts.next(), path, "hole offset")?;
            let len: u32 = parse_field(parts.next(), path, "hole len")?;
            let amb = match parts.next().and_then(|s| s.bytes().next()) {
                Some(b) => b,
                None => return Err(IndexError::format(path, "missing hole char")),
            };
            holes.push(Hole { offset, len, amb });
        }

        Ok(holes)
    }

    /// Write `.ann`, `.amb` and, when any contig is ALT, `.alt` (bns_dump).
    pub fn dump(&self, prefix: &Path) -> Result<()> {
        let mut ann = BufWriter::new(File::create(with_suffix(prefix, ".ann"))?);
        writeln!(ann, "{} {} {}", self.forward_len, self.contigs.len(), self.seed)?;
        for c in &self.contigs {
            if c.anno.is_empty() {
                writeln!(ann, "{} {}", c.gi, c.name)?;
            } else {
                writeln!(ann, "{} {} {}", c.gi, c.name, c.anno)?;
            }
            writeln!(ann, "{} {} {}", c.offset, c.len, c.n_ambs)?;
        }
        ann.flush()?;

        let mut amb = BufWriter::new(File::create(with_suffix(prefix, ".amb"))?);
        writeln!(amb, "{} {} {}", self.forward_len, self.contigs.len(), self.holes.len())?;
        for h in &self.holes {
            writeln!(amb, "{} {} {}", h.offset, h.len, h.amb as char)?;
        }
        amb.flush()?;

        if self.alt_count() > 0 {
            let mut alt = BufWriter::new(File::create(with_suffix(prefix, ".alt"))?);
            for c in self.contigs.iter().filter(|c| c.is_alt) {
                writeln!(alt, "{}", c.name)?;
            }
            alt.flush()?;
        }

        Ok(())
    }
}

/// First token of every non-header line of an `.alt` file.
fn read_alt_names(path: &Path) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut names = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.starts_with('@') {
            continue;
        }
        if let Some(name) = line.split_whitespace().next() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table() -> AnnotationTable {
        AnnotationTable::new(
            30,
            11,
            vec![
                Contig {
                    offset: 0,
                    len: 12,
                    n_ambs: 2,
                    gi: 0,
                    is_alt: false,
                    name: "chr2".into(),
                    anno: "second contig".into(),
                },
                Contig {
                    offset: 12,
                    len: 18,
                    n_ambs: 0,
                    gi: 7,
                    is_alt: false,
                    name: "chr1_alt".into(),
                    anno: String::new(),
                },
            ],
            vec![Hole {
                offset: 4,
                len: 2,
                amb: b'N',
            }],
        )
    }

    #[test]
    fn test_dump_restore_roundtrip_with_alt() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("ref");
        let mut t = table();
        assert_eq!(t.mark_alt(["chr1_alt"]), 1);
        t.dump(&prefix).unwrap();

        let restored = AnnotationTable::restore(&prefix).unwrap();
        assert_eq!(restored, t);
        assert_eq!(restored.alt_count(), 1);
    }

    #[test]
    fn test_alt_file_skips_header_lines() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("ref");
        table().dump(&prefix).unwrap();
        std::fs::write(
            with_suffix(&prefix, ".alt"),
            "@SQ\tSN:chr2\tLN:12\nchr1_alt\t0\tchr2\t1\nnot_a_contig\n",
        )
        .unwrap();

        let t = AnnotationTable::restore(&prefix).unwrap();
        assert!(!t.contigs()[0].is_alt);
        assert!(t.contigs()[1].is_alt);
    }

    #[test]
    fn test_inconsistent_amb_is_fatal() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("ref");
        table().dump(&prefix).unwrap();
        std::fs::write(with_suffix(&prefix, ".amb"), "31 2 0\n").unwrap();

        let err = AnnotationTable::restore(&prefix).unwrap_err();
        assert!(matches!(err, IndexError::Inconsistent(_)), "{err}");
    }

    #[test]
    fn test_malformed_ann_reports_file() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("ref");
        table().dump(&prefix).unwrap();
        std::fs::write(with_suffix(&prefix, ".ann"), "30 2 11\n0 chr2\n").unwrap();

        match AnnotationTable::restore(&prefix) {
            Err(IndexError::Format { file, .. }) => assert!(file.ends_with("ref.ann")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_position_to_contig_both_strands() {
        let t = table();
        assert_eq!(t.position_to_contig(0), Some(0));
        assert_eq!(t.position_to_contig(11), Some(0));
        assert_eq!(t.position_to_contig(12), Some(1));
        assert_eq!(t.position_to_contig(29), Some(1));
        // Reverse strand: 2*30 - 1 - 30 = 29 -> chr1_alt, 2*30 - 1 - 59 = 0 -> chr2
        assert_eq!(t.position_to_contig(30), Some(1));
        assert_eq!(t.position_to_contig(59), Some(0));
        assert_eq!(t.position_to_contig(60), None);
    }

    #[test]
    fn test_sorted_by_name_keeps_load_order() {
        let t = table();
        let names: Vec<&str> = t.sorted_by_name().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["chr1_alt", "chr2"]);
        assert_eq!(t.contigs()[0].name, "chr2");
    }
}
