//! 5x5 substitution matrices for A, C, G, T and the ambiguous code 4.
//!
//! Cells are indexed `reference * 5 + query`. The two asymmetric variants
//! score one bisulfite substitution as a match: C (ref) -> T (query) for
//! the C>T-converted strand and G (ref) -> A (query) for the G>A strand.

use crate::core::alignment::bisulfite::ConversionStrand;
use crate::defaults::AMBIGUOUS_PENALTY;

pub const ALPHABET_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringMatrix {
    mat: [i8; 25],
}

// Helper mirroring bwa_fill_scmat: match on the diagonal, -mismatch elsewhere,
// ambiguous row and column fixed. `bonus` marks one (ref, query) cell that
// scores as a match.
fn fill_scmat(match_score: i32, mismatch_penalty: i32, bonus: Option<(usize, usize)>) -> [i8; 25] {
    let a = match_score as i8;
    let b = mismatch_penalty as i8;
    let mut mat = [0i8; 25];
    let mut k = 0;

    for i in 0..4 {
        for j in 0..4 {
            mat[k] = if i == j || bonus == Some((i, j)) { a } else { -b };
            k += 1;
        }
        mat[k] = AMBIGUOUS_PENALTY;
        k += 1;
    }

    for _ in 0..5 {
        mat[k] = AMBIGUOUS_PENALTY;
        k += 1;
    }

    mat
}

impl ScoringMatrix {
    /// Regular matrix: `a` on the diagonal, `-b` off it.
    pub fn symmetric(match_score: i32, mismatch_penalty: i32) -> Self {
        ScoringMatrix {
            mat: fill_scmat(match_score, mismatch_penalty, None),
        }
    }

    /// Reference C aligned to query T scores `a`.
    pub fn ct_asymmetric(match_score: i32, mismatch_penalty: i32) -> Self {
        ScoringMatrix {
            mat: fill_scmat(match_score, mismatch_penalty, Some((1, 3))),
        }
    }

    /// Reference G aligned to query A scores `a`.
    pub fn ga_asymmetric(match_score: i32, mismatch_penalty: i32) -> Self {
        ScoringMatrix {
            mat: fill_scmat(match_score, mismatch_penalty, Some((2, 0))),
        }
    }

    /// Matrix tolerating the conversions expected on `strand`.
    pub fn for_strand(strand: ConversionStrand, match_score: i32, mismatch_penalty: i32) -> Self {
        match strand {
            ConversionStrand::Parent => Self::ct_asymmetric(match_score, mismatch_penalty),
            ConversionStrand::Daughter => Self::ga_asymmetric(match_score, mismatch_penalty),
        }
    }

    pub fn from_raw(mat: [i8; 25]) -> Self {
        ScoringMatrix { mat }
    }

    #[inline(always)]
    pub fn score(&self, reference: u8, query: u8) -> i32 {
        let r = (reference as usize).min(4);
        let q = (query as usize).min(4);
        self.mat[r * ALPHABET_SIZE + q] as i32
    }

    /// Score of an A/A match, used as the per-base match score when
    /// inferring band widths.
    #[inline]
    pub fn match_score(&self) -> i32 {
        self.mat[0] as i32
    }

    pub fn as_array(&self) -> &[i8; 25] {
        &self.mat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_layout() {
        let m = ScoringMatrix::symmetric(1, 4);
        let expected: [i8; 25] = [
            1, -4, -4, -4, -1, //
            -4, 1, -4, -4, -1, //
            -4, -4, 1, -4, -1, //
            -4, -4, -4, 1, -1, //
            -1, -1, -1, -1, -1,
        ];
        assert_eq!(m.as_array(), &expected);
    }

    #[test]
    fn test_symmetric_is_swap_invariant() {
        let m = ScoringMatrix::symmetric(2, 5);
        for r in 0..5u8 {
            for q in 0..5u8 {
                assert_eq!(m.score(r, q), m.score(q, r), "r={r} q={q}");
            }
        }
    }

    #[test]
    fn test_ct_differs_only_at_c_t() {
        let s = ScoringMatrix::symmetric(1, 4);
        let ct = ScoringMatrix::ct_asymmetric(1, 4);
        for k in 0..25 {
            if k == 5 + 3 {
                assert_eq!(ct.as_array()[k], 1);
                assert_eq!(s.as_array()[k], -4);
            } else {
                assert_eq!(ct.as_array()[k], s.as_array()[k], "cell {k}");
            }
        }
        // The reverse direction stays a mismatch.
        assert_eq!(ct.score(3, 1), -4);
    }

    #[test]
    fn test_ga_differs_only_at_g_a() {
        let s = ScoringMatrix::symmetric(1, 4);
        let ga = ScoringMatrix::ga_asymmetric(1, 4);
        let diffs: Vec<usize> = (0..25)
            .filter(|&k| ga.as_array()[k] != s.as_array()[k])
            .collect();
        assert_eq!(diffs, vec![2 * 5]);
        assert_eq!(ga.score(2, 0), 1);
        assert_eq!(ga.score(0, 2), -4);
    }

    #[test]
    fn test_ambiguous_always_minus_one() {
        for m in [
            ScoringMatrix::symmetric(3, 7),
            ScoringMatrix::for_strand(ConversionStrand::Parent, 3, 7),
            ScoringMatrix::for_strand(ConversionStrand::Daughter, 3, 7),
        ] {
            for b in 0..5u8 {
                assert_eq!(m.score(4, b), -1);
                assert_eq!(m.score(b, 4), -1);
            }
        }
    }
}
