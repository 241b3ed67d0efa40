// Finishing options, in the shape of bwa's mem_opt_t scoring fields.
//
// Passed explicitly to every call that needs them; there is no global
// options state.

use crate::core::alignment::banded_global::GapPenalties;
use crate::core::alignment::bisulfite::ConversionStrand;
use crate::core::alignment::scoring::ScoringMatrix;
use crate::defaults::{
    BAND_WIDTH, GAP_EXTEND_PENALTY, GAP_OPEN_PENALTY, MATCH_SCORE, MISMATCH_PENALTY,
};

/// Scoring and band options for alignment finishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishOpt {
    // Scoring parameters
    pub a: i32,     // Match score
    pub b: i32,     // Mismatch penalty
    pub o_del: i32, // Gap open penalty (deletions)
    pub e_del: i32, // Gap extension penalty (deletions)
    pub o_ins: i32, // Gap open penalty (insertions)
    pub e_ins: i32, // Gap extension penalty (insertions)

    // Alignment parameters
    pub w: i32, // Band width for banded alignment

    // Bisulfite mode: score and classify expected conversions as matches
    pub bisulfite: bool,
}

impl Default for FinishOpt {
    fn default() -> Self {
        FinishOpt {
            a: MATCH_SCORE,
            b: MISMATCH_PENALTY,
            o_del: GAP_OPEN_PENALTY,
            e_del: GAP_EXTEND_PENALTY,
            o_ins: GAP_OPEN_PENALTY,
            e_ins: GAP_EXTEND_PENALTY,
            w: BAND_WIDTH,
            bisulfite: false,
        }
    }
}

impl FinishOpt {
    /// Bisulfite-mode options with default scoring.
    pub fn bisulfite() -> Self {
        FinishOpt {
            bisulfite: true,
            ..Default::default()
        }
    }

    /// Substitution matrix for a read on `strand`.
    ///
    /// Outside bisulfite mode the strand is ignored and the symmetric
    /// matrix is returned.
    pub fn matrix_for(&self, strand: ConversionStrand) -> ScoringMatrix {
        if self.bisulfite {
            ScoringMatrix::for_strand(strand, self.a, self.b)
        } else {
            ScoringMatrix::symmetric(self.a, self.b)
        }
    }

    pub fn symmetric_matrix(&self) -> ScoringMatrix {
        ScoringMatrix::symmetric(self.a, self.b)
    }

    pub fn gap_penalties(&self) -> GapPenalties {
        GapPenalties::new(self.o_del, self.e_del, self.o_ins, self.e_ins)
    }
}
