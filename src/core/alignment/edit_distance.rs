//! Edit distance (NM) and MD string computation.
//!
//! One pass over the CIGAR computes NM, MD and, when the classifier tracks
//! bisulfite conversion, the conversion and retention tallies. The same
//! routine serves plain and bisulfite alignments; only the classifier
//! differs.
//!
//! Deletions that open or close the CIGAR are not written to MD and do not
//! count toward NM. Global alignment can produce them at window edges and
//! they carry no information about the read.

use super::bisulfite::{BaseCall, BaseClassifier};
use super::cigar::{Cigar, CigarOp};

/// Convert 2-bit encoded base to ASCII character
#[inline(always)]
pub const fn base_to_char(b: u8) -> char {
    match b {
        0 => 'A',
        1 => 'C',
        2 => 'G',
        3 => 'T',
        _ => 'N',
    }
}

/// Result of one MD/NM pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSummary {
    pub nm: i32,
    pub md: String,
    pub mismatches: u32,
    /// Inserted plus interior deleted bases
    pub gaps: u32,
    pub conversions: u32,
    pub retentions: u32,
}

/// Compute NM, MD and bisulfite tallies from aligned sequences and CIGAR.
///
/// # Arguments
/// * `ref_seq` - Reference window (2-bit encoded), in CIGAR orientation
/// * `query_seq` - Query (2-bit encoded), in CIGAR orientation
/// * `cigar` - M/I/D operations covering both sequences
/// * `classifier` - decides whether an aligned pair matches
///
/// # MD Tag Format
/// - Numbers: count of bases treated as matching (matches, retentions and
///   conversions alike)
/// - Letters: mismatching reference base
/// - ^LETTERS: reference bases deleted by an interior D
/// - Consecutive mismatches are separated by 0: "A0T" not "AT"
/// - The trailing count is always written, so an alignment ending in a
///   mismatch ends in "0"
///
/// # Example
/// ```ignore
/// let s = compute_nm_and_md(&ref_seq, &query_seq, &cigar, &ExactClassifier);
/// // ref ACGT, query ACTT, 4M: nm=1, md="2G1"
/// ```
pub fn compute_nm_and_md<C: BaseClassifier + ?Sized>(
    ref_seq: &[u8],
    query_seq: &[u8],
    cigar: &Cigar,
    classifier: &C,
) -> EditSummary {
    let mut summary = EditSummary {
        md: String::with_capacity(cigar.len() * 3 + 8),
        ..EditSummary::default()
    };
    let mut u: u32 = 0; // bases since the last MD letter

    let mut ri = 0usize; // Reference index
    let mut qi = 0usize; // Query index
    let last = cigar.len().saturating_sub(1);

    for (k, (op, len)) in cigar.iter().enumerate() {
        let len_usize = len as usize;

        match op {
            CigarOp::M => {
                for _ in 0..len {
                    if ri >= ref_seq.len() || qi >= query_seq.len() {
                        break;
                    }
                    match classifier.classify(query_seq[qi], ref_seq[ri]) {
                        BaseCall::Match => u += 1,
                        BaseCall::Retention => {
                            summary.retentions += 1;
                            u += 1;
                        }
                        BaseCall::Conversion => {
                            summary.conversions += 1;
                            u += 1;
                        }
                        BaseCall::Mismatch => {
                            summary.mismatches += 1;
                            push_number(&mut summary.md, u);
                            summary.md.push(base_to_char(ref_seq[ri]));
                            u = 0;
                        }
                    }
                    ri += 1;
                    qi += 1;
                }
            }
            CigarOp::I => {
                summary.gaps += len;
                qi += len_usize;
            }
            CigarOp::D => {
                if k > 0 && k < last {
                    push_number(&mut summary.md, u);
                    summary.md.push('^');
                    let end = (ri + len_usize).min(ref_seq.len());
                    for &b in &ref_seq[ri.min(end)..end] {
                        summary.md.push(base_to_char(b));
                    }
                    u = 0;
                    summary.gaps += len;
                }
                ri += len_usize;
            }
        }
    }

    push_number(&mut summary.md, u);
    summary.nm = (summary.mismatches + summary.gaps) as i32;
    summary
}

/// Compute NM from an existing MD tag and CIGAR.
///
/// Counts mismatch letters outside deletion blocks plus I and interior D
/// lengths, so it agrees with [`compute_nm_and_md`] on its own output.
pub fn compute_nm_from_md(md_tag: &str, cigar: &Cigar) -> i32 {
    let mut nm: i32 = 0;
    let mut in_deletion = false;

    for ch in md_tag.chars() {
        if ch == '^' {
            in_deletion = true;
        } else if ch.is_ascii_digit() {
            in_deletion = false;
        } else if ch.is_ascii_alphabetic() && !in_deletion {
            nm += 1;
        }
    }

    let last = cigar.len().saturating_sub(1);
    for (k, (op, len)) in cigar.iter().enumerate() {
        match op {
            CigarOp::I => nm += len as i32,
            CigarOp::D if k > 0 && k < last => nm += len as i32,
            _ => {}
        }
    }

    nm
}

/// Helper to push a number to the MD string
#[inline(always)]
fn push_number(md: &mut String, n: u32) {
    // Fast path for common small numbers
    if n < 10 {
        md.push((b'0' + n as u8) as char);
    } else if n < 100 {
        md.push((b'0' + (n / 10) as u8) as char);
        md.push((b'0' + (n % 10) as u8) as char);
    } else {
        md.push_str(&n.to_string());
    }
}
