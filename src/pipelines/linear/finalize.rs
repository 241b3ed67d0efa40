//! Alignment finishing: CIGAR, score, NM and MD for a known window.
//!
//! Given a query and the reference interval `[rb, re)` it aligns to, this
//! module fetches the window from the packed reference, runs a banded global
//! alignment and walks the CIGAR once to produce NM, MD and (in bisulfite
//! mode) conversion/retention counts. It is the Rust counterpart of
//! `bwa_gen_cigar2`.
//!
//! ## Orientation
//!
//! Windows on the reverse half (`rb >= l_pac`) are aligned on reversed
//! scratch copies so that indels are placed consistently with the forward
//! strand; the CIGAR is reversed back afterwards. CIGAR and MD are reported
//! in the orientation of the query and window as supplied. The caller's
//! query is never modified.

use crate::core::alignment::banded_global::{GapPenalties, GlobalAligner};
use crate::core::alignment::bisulfite::{
    BaseClassifier, BisulfiteClassifier, ConversionStrand, ExactClassifier,
};
use crate::core::alignment::cigar::Cigar;
use crate::core::alignment::edit_distance::compute_nm_and_md;
use crate::core::alignment::scoring::ScoringMatrix;
use crate::finish_opt::FinishOpt;
use crate::index::pac::PackedReference;

/// A query and the reference interval it is known to align to.
#[derive(Debug, Clone, Copy)]
pub struct AlignmentWindow<'q> {
    /// 2-bit query codes (4 = ambiguous)
    pub query: &'q [u8],
    pub rb: u64,
    pub re: u64,
    /// Requested band width; 0 allows the no-gap fast path
    pub band: i32,
}

impl<'q> AlignmentWindow<'q> {
    pub fn new(query: &'q [u8], rb: u64, re: u64, band: i32) -> Self {
        AlignmentWindow { query, rb, re, band }
    }

    pub fn ref_len(&self) -> u64 {
        self.re.saturating_sub(self.rb)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BisulfiteCounts {
    /// Expected C>T (parent) or G>A (daughter) substitutions
    pub conversions: u32,
    /// Convertible reference bases read back unchanged
    pub retentions: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentResult {
    pub cigar: Cigar,
    pub score: i32,
    pub nm: i32,
    pub md: String,
    /// Present when the classifier tracks bisulfite conversion
    pub bisulfite: Option<BisulfiteCounts>,
}

impl AlignmentResult {
    pub fn cigar_string(&self) -> String {
        self.cigar.to_string()
    }

    /// CIGAR in packed `len << 4 | op` form.
    pub fn packed_cigar(&self) -> &[u32] {
        self.cigar.packed()
    }
}

// Fetch the window and align; also hands back the reference bases so the
// MD pass does not fetch twice.
fn fetch_and_align(
    reference: &PackedReference,
    window: &AlignmentWindow<'_>,
    mat: &ScoringMatrix,
    gaps: &GapPenalties,
) -> Option<(Cigar, i32, Vec<u8>)> {
    if window.query.is_empty() {
        log::debug!("finish: empty query for window [{}, {})", window.rb, window.re);
        return None;
    }

    let rseq = match reference.fetch(window.rb, window.re) {
        Ok(seq) => seq,
        Err(reject) => {
            log::debug!("finish: {}", reject);
            return None;
        }
    };

    let reverse = window.rb >= reference.forward_len();
    let aligner = GlobalAligner::new(mat, *gaps);
    let (cigar, score) = aligner.align(window.query, &rseq, window.band, reverse)?;
    Some((cigar, score, rseq))
}

/// CIGAR and score for `window` without the MD/NM pass.
pub fn align_window(
    reference: &PackedReference,
    window: &AlignmentWindow<'_>,
    mat: &ScoringMatrix,
    gaps: &GapPenalties,
) -> Option<(Cigar, i32)> {
    fetch_and_align(reference, window, mat, gaps).map(|(cigar, score, _)| (cigar, score))
}

/// Align `window` and compute NM, MD and classifier counts.
///
/// Returns `None` when the window is rejected (empty, bridging the strand
/// boundary, or running past the end of the reference).
pub fn finish<C: BaseClassifier + ?Sized>(
    reference: &PackedReference,
    window: &AlignmentWindow<'_>,
    mat: &ScoringMatrix,
    gaps: &GapPenalties,
    classifier: &C,
) -> Option<AlignmentResult> {
    let (cigar, score, rseq) = fetch_and_align(reference, window, mat, gaps)?;
    let summary = compute_nm_and_md(&rseq, window.query, &cigar, classifier);

    let bisulfite = if classifier.tracks_conversion() {
        Some(BisulfiteCounts {
            conversions: summary.conversions,
            retentions: summary.retentions,
        })
    } else {
        None
    };

    Some(AlignmentResult {
        cigar,
        score,
        nm: summary.nm,
        md: summary.md,
        bisulfite,
    })
}

/// [`finish`] with one open/extend pair for both gap kinds (bwa_gen_cigar).
pub fn finish_symmetric_gaps<C: BaseClassifier + ?Sized>(
    reference: &PackedReference,
    window: &AlignmentWindow<'_>,
    mat: &ScoringMatrix,
    gap_open: i32,
    gap_extend: i32,
    classifier: &C,
) -> Option<AlignmentResult> {
    let gaps = GapPenalties::symmetric(gap_open, gap_extend);
    finish(reference, window, mat, &gaps, classifier)
}

/// Finish using the scoring in `opt`: bisulfite mode picks the strand's
/// asymmetric matrix and classifier, otherwise plain scoring is used.
pub fn finish_with_opt(
    reference: &PackedReference,
    window: &AlignmentWindow<'_>,
    opt: &FinishOpt,
    strand: ConversionStrand,
) -> Option<AlignmentResult> {
    let mat = opt.matrix_for(strand);
    let gaps = opt.gap_penalties();
    if opt.bisulfite {
        finish(reference, window, &mat, &gaps, &BisulfiteClassifier::new(strand))
    } else {
        finish(reference, window, &mat, &gaps, &ExactClassifier)
    }
}
