//! Banded global alignment with affine gaps (ksw_global2 semantics).
//!
//! Used once the alignment end points are known: both sequences are aligned
//! end to end inside a diagonal band. Insertion and deletion costs are
//! independent. Ties prefer M over E over F, which places gaps at the
//! leftmost equivalent position once the traceback runs from the end.

use super::cigar::{Cigar, CigarOp};
use super::scoring::{ScoringMatrix, ALPHABET_SIZE};

pub const MINUS_INF: i32 = -0x4000_0000;

// Rust equivalent of eh_t
#[derive(Debug, Clone, Copy, Default)]
struct EhT {
    h: i32, // H(i-1, j-1) at the start of a row step
    e: i32, // E(i, j)
}

/// Affine gap penalties; a gap of length `l` costs `open + extend * l`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapPenalties {
    pub o_del: i32,
    pub e_del: i32,
    pub o_ins: i32,
    pub e_ins: i32,
}

impl GapPenalties {
    pub fn new(o_del: i32, e_del: i32, o_ins: i32, e_ins: i32) -> Self {
        GapPenalties {
            o_del,
            e_del,
            o_ins,
            e_ins,
        }
    }

    /// Same open/extend pair for insertions and deletions.
    pub fn symmetric(open: i32, extend: i32) -> Self {
        Self::new(open, extend, open, extend)
    }
}

/// Band half-width for a global alignment of `l_query` bases against
/// `l_ref` bases (bwa_gen_cigar2).
///
/// The longest gap a perfect match over half the query could still pay for
/// bounds the band; it is then capped by the caller's `requested` width and
/// floored at `|l_ref - l_query| + 3` so the end cell is always reachable.
pub fn infer_global_band(
    l_query: i32,
    l_ref: i32,
    match_score: i32,
    gaps: &GapPenalties,
    requested: i32,
) -> i32 {
    let half = ((l_query + 1) >> 1) * match_score;
    let max_ins = ((half - gaps.o_ins) as f64 / gaps.e_ins as f64 + 1.0) as i32;
    let max_del = ((half - gaps.o_del) as f64 / gaps.e_del as f64 + 1.0) as i32;
    let max_gap = max_ins.max(max_del).max(1);

    let diff = (l_ref - l_query).abs();
    let w = ((max_gap + diff + 1) >> 1).min(requested);
    w.max(diff + 3)
}

/// Global alignment of `query` against `target` restricted to `|i - j| <= w`.
///
/// Returns the score of the end cell and the CIGAR (target = reference).
pub fn banded_global(
    query: &[u8],
    target: &[u8],
    mat: &ScoringMatrix,
    gaps: &GapPenalties,
    w: i32,
) -> (i32, Cigar) {
    let qlen = query.len();
    let tlen = target.len();

    // Degenerate cases: the whole alignment is one gap
    if qlen == 0 || tlen == 0 {
        let mut cigar = Cigar::new();
        if tlen > 0 {
            cigar.push(CigarOp::D, tlen as u32);
            return (-(gaps.o_del + gaps.e_del * tlen as i32), cigar);
        }
        if qlen > 0 {
            cigar.push(CigarOp::I, qlen as u32);
            return (-(gaps.o_ins + gaps.e_ins * qlen as i32), cigar);
        }
        return (0, cigar);
    }

    let w = w.max(0) as usize;
    let oe_del = gaps.o_del + gaps.e_del;
    let oe_ins = gaps.o_ins + gaps.e_ins;

    // Backtrack matrix: one row per target base, at most 2w+1 columns.
    // Each cell holds f<<4 | e<<2 | h.
    let n_col = qlen.min(2 * w + 1);
    let mut z = vec![0u8; n_col * tlen];

    // Query profile
    let mut qp = vec![0i8; qlen * ALPHABET_SIZE];
    let raw = mat.as_array();
    for k in 0..ALPHABET_SIZE {
        let row = &raw[k * ALPHABET_SIZE..(k + 1) * ALPHABET_SIZE];
        for j in 0..qlen {
            qp[k * qlen + j] = row[(query[j] as usize).min(4)];
        }
    }

    // First row: leading insertions inside the band, -inf outside
    let mut eh = vec![EhT::default(); qlen + 1];
    eh[0].h = 0;
    eh[0].e = MINUS_INF;
    for j in 1..=qlen {
        if j <= w {
            eh[j].h = -(gaps.o_ins + gaps.e_ins * j as i32);
        } else {
            eh[j].h = MINUS_INF;
        }
        eh[j].e = MINUS_INF;
    }

    for i in 0..tlen {
        let mut f = MINUS_INF;
        let t = (target[i] as usize).min(4);
        let q = &qp[t * qlen..(t + 1) * qlen];
        let beg = i.saturating_sub(w);
        let end = (i + w + 1).min(qlen);
        let mut h1 = if beg == 0 {
            -(gaps.o_del + gaps.e_del * (i as i32 + 1))
        } else {
            MINUS_INF
        };

        let zi = &mut z[i * n_col..(i + 1) * n_col];
        for j in beg..end {
            // eh[j] = { H(i-1,j-1), E(i,j) }, f = F(i,j), h1 = H(i,j-1)
            let p = &mut eh[j];
            let mut m = p.h;
            let mut e = p.e;
            p.h = h1;
            m += q[j] as i32;

            let mut d: u8 = if m >= e { 0 } else { 1 };
            let mut h = if m >= e { m } else { e };
            if h < f {
                d = 2;
                h = f;
            }
            h1 = h;

            let t_del = m - oe_del;
            e -= gaps.e_del;
            if e > t_del {
                d |= 1 << 2;
            } else {
                e = t_del;
            }
            p.e = e;

            let t_ins = m - oe_ins;
            f -= gaps.e_ins;
            if f > t_ins {
                d |= 2 << 4;
            } else {
                f = t_ins;
            }
            zi[j - beg] = d;
        }
        eh[end].h = h1;
        eh[end].e = MINUS_INF;
    }
    let score = eh[qlen].h;

    // Backtrack from the last cell of the band in the last row
    let mut cigar = Cigar::with_capacity(8);
    let w = w as isize;
    let qlen_i = qlen as isize;
    let mut i = tlen as isize - 1;
    let mut k = (i + w + 1).min(qlen_i) - 1;
    let mut which = 0u8;
    while i >= 0 && k >= 0 {
        let beg = if i > w { i - w } else { 0 };
        let col = k - beg;
        if col < 0 || col >= n_col as isize {
            log::debug!("banded_global: traceback left the band at i={i}, k={k}, w={w}");
            break;
        }
        which = (z[i as usize * n_col + col as usize] >> (which << 1)) & 3;
        match which {
            0 => {
                cigar.push(CigarOp::M, 1);
                i -= 1;
                k -= 1;
            }
            1 => {
                cigar.push(CigarOp::D, 1);
                i -= 1;
            }
            _ => {
                cigar.push(CigarOp::I, 1);
                k -= 1;
            }
        }
    }
    if i >= 0 {
        cigar.push(CigarOp::D, (i + 1) as u32);
    }
    if k >= 0 {
        cigar.push(CigarOp::I, (k + 1) as u32);
    }
    cigar.reverse();

    (score, cigar)
}

/// Global aligner bound to one scoring scheme.
///
/// Chooses between the no-gap fast path and banded DP and owns the
/// reversal used to canonicalise indel placement.
#[derive(Debug, Clone, Copy)]
pub struct GlobalAligner<'m> {
    mat: &'m ScoringMatrix,
    gaps: GapPenalties,
}

impl<'m> GlobalAligner<'m> {
    pub fn new(mat: &'m ScoringMatrix, gaps: GapPenalties) -> Self {
        GlobalAligner { mat, gaps }
    }

    pub fn matrix(&self) -> &ScoringMatrix {
        self.mat
    }

    pub fn gaps(&self) -> &GapPenalties {
        &self.gaps
    }

    /// Align `query` end to end against `target`.
    ///
    /// With `reverse` set both sequences are reversed into scratch copies
    /// first and the CIGAR is reversed back, so the output is expressed in
    /// the orientation of the inputs. Returns `None` for empty inputs.
    pub fn align(
        &self,
        query: &[u8],
        target: &[u8],
        band: i32,
        reverse: bool,
    ) -> Option<(Cigar, i32)> {
        if query.is_empty() || target.is_empty() {
            return None;
        }

        if !reverse {
            return Some(self.align_oriented(query, target, band));
        }

        let q: Vec<u8> = query.iter().rev().copied().collect();
        let t: Vec<u8> = target.iter().rev().copied().collect();
        let (mut cigar, score) = self.align_oriented(&q, &t, band);
        cigar.reverse();
        Some((cigar, score))
    }

    fn align_oriented(&self, query: &[u8], target: &[u8], band: i32) -> (Cigar, i32) {
        if query.len() == target.len() && band == 0 {
            self.ungapped(query, target)
        } else {
            self.banded(query, target, band)
        }
    }

    /// No-gap path: one full-length M and the summed substitution scores.
    pub fn ungapped(&self, query: &[u8], target: &[u8]) -> (Cigar, i32) {
        let score = query
            .iter()
            .zip(target)
            .map(|(&q, &r)| self.mat.score(r, q))
            .sum();
        (Cigar::single(CigarOp::M, query.len() as u32), score)
    }

    /// DP path with the band inferred from the sequence lengths.
    pub fn banded(&self, query: &[u8], target: &[u8], band: i32) -> (Cigar, i32) {
        let w = infer_global_band(
            query.len() as i32,
            target.len() as i32,
            self.mat.match_score(),
            &self.gaps,
            band,
        );
        log::trace!(
            "global band {} (requested {}), qlen={}, tlen={}",
            w,
            band,
            query.len(),
            target.len()
        );
        let (score, cigar) = banded_global(query, target, self.mat, &self.gaps, w);
        (cigar, score)
    }
}
