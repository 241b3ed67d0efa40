// Randomized checks of alignment finishing against a packed reference.
//
// Reads are simulated from random windows (forward and reverse half) with
// substitutions, one optional indel, or bisulfite conversion, then finished
// and checked for internal consistency: CIGAR spans, score recomputation,
// MD replay against the window and NM accounting.

use ferrous_bisulfite::core::alignment::banded_global::{GapPenalties, GlobalAligner};
use ferrous_bisulfite::core::alignment::bisulfite::{
    BisulfiteClassifier, ConversionStrand, ExactClassifier,
};
use ferrous_bisulfite::core::alignment::cigar::{Cigar, CigarOp};
use ferrous_bisulfite::core::alignment::scoring::ScoringMatrix;
use ferrous_bisulfite::index::pac::PackedReference;
use ferrous_bisulfite::pipelines::linear::finalize::{finish, AlignmentWindow};
use ferrous_bisulfite::FinishOpt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const REF_LEN: usize = 2_000;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_reference(rng: &mut StdRng) -> PackedReference {
    let codes: Vec<u8> = (0..REF_LEN).map(|_| rng.gen_range(0..4u8)).collect();
    PackedReference::from_codes(&codes)
}

// Window start on either half, never bridging the strand boundary
fn random_window(rng: &mut StdRng, len: u64) -> (u64, u64) {
    let l = REF_LEN as u64;
    let rb = if rng.gen_bool(0.5) {
        rng.gen_range(0..=l - len)
    } else {
        rng.gen_range(l..=2 * l - len)
    };
    (rb, rb + len)
}

fn substitute(rng: &mut StdRng, seq: &mut [u8], n: usize) {
    for _ in 0..n {
        let i = rng.gen_range(0..seq.len());
        seq[i] = (seq[i] + rng.gen_range(1..4u8)) & 3;
    }
}

#[derive(Debug, PartialEq)]
enum MdToken {
    Match(u32),
    Mismatch(u8),
    Deletion(Vec<u8>),
}

fn char_to_base(c: u8) -> u8 {
    match c {
        b'A' => 0,
        b'C' => 1,
        b'G' => 2,
        b'T' => 3,
        _ => 4,
    }
}

fn parse_md(md: &str) -> Vec<MdToken> {
    let bytes = md.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let mut n = 0u32;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                n = n * 10 + (bytes[i] - b'0') as u32;
                i += 1;
            }
            tokens.push(MdToken::Match(n));
        } else if bytes[i] == b'^' {
            i += 1;
            let mut del = Vec::new();
            while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                del.push(char_to_base(bytes[i]));
                i += 1;
            }
            tokens.push(MdToken::Deletion(del));
        } else {
            tokens.push(MdToken::Mismatch(char_to_base(bytes[i])));
            i += 1;
        }
    }
    tokens
}

// Walk CIGAR and MD together and check every reference base MD implies
// against the window. Returns (mismatches, inserted, interior deleted).
fn replay_md(window: &[u8], query: &[u8], cigar: &Cigar, md: &str) -> (u32, u32, u32) {
    let mut tokens = parse_md(md).into_iter().filter(|t| *t != MdToken::Match(0)).peekable();
    let mut pending = 0u32;
    let (mut r, mut q) = (0usize, 0usize);
    let (mut mm, mut ins, mut del) = (0u32, 0u32, 0u32);
    let last = cigar.len() - 1;

    for (k, (op, len)) in cigar.iter().enumerate() {
        match op {
            CigarOp::M => {
                for _ in 0..len {
                    if pending == 0 {
                        match tokens.next() {
                            Some(MdToken::Match(n)) => pending = n,
                            Some(MdToken::Mismatch(b)) => {
                                assert_eq!(window[r], b, "MD mismatch letter at ref {r}");
                                assert_ne!(query[q], b, "MD mismatch on a match at ref {r}");
                                mm += 1;
                                r += 1;
                                q += 1;
                                continue;
                            }
                            other => panic!("MD {md} ran out or hit {other:?} inside M"),
                        }
                    }
                    pending -= 1;
                    assert_eq!(window[r], query[q], "MD claims a match at ref {r}");
                    r += 1;
                    q += 1;
                }
            }
            CigarOp::I => {
                q += len as usize;
                ins += len;
            }
            CigarOp::D => {
                if k != 0 && k != last {
                    assert_eq!(pending, 0, "deletion inside an MD match run");
                    match tokens.next() {
                        Some(MdToken::Deletion(bases)) => {
                            assert_eq!(&bases[..], &window[r..r + len as usize]);
                        }
                        other => panic!("expected deletion in MD {md}, got {other:?}"),
                    }
                    del += len;
                }
                r += len as usize;
            }
        }
    }
    assert_eq!(pending, 0, "MD {md} longer than CIGAR");
    assert!(tokens.next().is_none(), "MD {md} has trailing tokens");
    assert_eq!(r, window.len());
    assert_eq!(q, query.len());
    (mm, ins, del)
}

fn path_score(
    window: &[u8],
    query: &[u8],
    cigar: &Cigar,
    mat: &ScoringMatrix,
    gaps: &GapPenalties,
) -> i32 {
    let (mut r, mut q, mut score) = (0usize, 0usize, 0i32);
    for (op, len) in cigar.iter() {
        let len_i = len as i32;
        match op {
            CigarOp::M => {
                for _ in 0..len {
                    score += mat.score(window[r], query[q]);
                    r += 1;
                    q += 1;
                }
            }
            CigarOp::I => {
                score -= gaps.o_ins + gaps.e_ins * len_i;
                q += len as usize;
            }
            CigarOp::D => {
                score -= gaps.o_del + gaps.e_del * len_i;
                r += len as usize;
            }
        }
    }
    score
}

#[test]
fn test_finish_is_self_consistent_on_simulated_reads() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let reference = random_reference(&mut rng);
    let opt = FinishOpt::default();
    let mat = opt.symmetric_matrix();
    let gaps = opt.gap_penalties();

    for round in 0..200 {
        let len = rng.gen_range(30..150);
        let (rb, re) = random_window(&mut rng, len);
        let window = reference.fetch(rb, re).unwrap();
        let mut query = window.clone();
        let n_sub = rng.gen_range(0..4);
        substitute(&mut rng, &mut query, n_sub);
        match rng.gen_range(0..3) {
            0 => {
                let at = rng.gen_range(5..query.len() - 5);
                let n = rng.gen_range(1..4);
                query.drain(at..at + n);
            }
            1 => {
                let at = rng.gen_range(5..query.len() - 5);
                for _ in 0..rng.gen_range(1..4) {
                    query.insert(at, rng.gen_range(0..4u8));
                }
            }
            _ => {}
        }

        let w = AlignmentWindow::new(&query, rb, re, opt.w);
        let res = finish(&reference, &w, &mat, &gaps, &ExactClassifier)
            .unwrap_or_else(|| panic!("round {round}: window [{rb}, {re}) rejected"));

        assert_eq!(res.cigar.query_length() as usize, query.len(), "round {round}");
        assert_eq!(res.cigar.reference_length() as u64, re - rb, "round {round}");
        assert_eq!(
            path_score(&window, &query, &res.cigar, &mat, &gaps),
            res.score,
            "round {round}: {}",
            res.cigar
        );

        let (mm, ins, del) = replay_md(&window, &query, &res.cigar, &res.md);
        assert_eq!(res.nm as u32, mm + ins + del, "round {round}: {} {}", res.cigar, res.md);
        assert!(res.bisulfite.is_none());
    }
}

#[test]
fn test_ungapped_and_banded_paths_agree_on_sparse_substitutions() {
    let mut rng = StdRng::seed_from_u64(7);
    let reference = random_reference(&mut rng);
    let mat = ScoringMatrix::symmetric(1, 4);
    let gaps = GapPenalties::symmetric(6, 1);
    let aligner = GlobalAligner::new(&mat, gaps);

    for _ in 0..100 {
        let len = rng.gen_range(20..200);
        let (rb, re) = random_window(&mut rng, len);
        let window = reference.fetch(rb, re).unwrap();
        let mut query = window.clone();
        // two substitutions cost less than any pair of gaps
        substitute(&mut rng, &mut query, 2);

        let (fast_cigar, fast_score) = aligner.ungapped(&query, &window);
        let (dp_cigar, dp_score) = aligner.banded(&query, &window, 10);
        assert_eq!(fast_score, dp_score);
        assert_eq!(fast_cigar, dp_cigar);
    }
}

#[test]
fn test_bisulfite_reads_count_conversions() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(42);
    let reference = random_reference(&mut rng);
    let opt = FinishOpt::bisulfite();

    for strand in [ConversionStrand::Parent, ConversionStrand::Daughter] {
        let mat = opt.matrix_for(strand);
        let gaps = opt.gap_penalties();
        let classifier = BisulfiteClassifier::new(strand);

        for _ in 0..50 {
            let len = rng.gen_range(40..120);
            let (rb, re) = random_window(&mut rng, len);
            let window = reference.fetch(rb, re).unwrap();
            let convertible = window
                .iter()
                .filter(|&&b| b == strand.convertible_base())
                .count() as u32;

            let mut converted = 0u32;
            let query: Vec<u8> = window
                .iter()
                .map(|&b| {
                    if b == strand.convertible_base() && rng.gen_bool(0.7) {
                        converted += 1;
                        strand.converted_base()
                    } else {
                        b
                    }
                })
                .collect();

            let w = AlignmentWindow::new(&query, rb, re, 0);
            let res = finish(&reference, &w, &mat, &gaps, &classifier).unwrap();
            let counts = res.bisulfite.unwrap();

            assert_eq!(res.cigar.to_string(), format!("{}M", query.len()));
            assert_eq!(res.score, query.len() as i32 * opt.a);
            assert_eq!(res.nm, 0);
            assert_eq!(res.md, query.len().to_string());
            assert_eq!(counts.conversions, converted);
            assert_eq!(counts.retentions, convertible - converted);
        }
    }
}

#[test]
fn test_bisulfite_mismatches_still_count() {
    let mut rng = StdRng::seed_from_u64(99);
    let reference = random_reference(&mut rng);
    let strand = ConversionStrand::Parent;
    let opt = FinishOpt::bisulfite();
    let mat = opt.matrix_for(strand);
    let gaps = opt.gap_penalties();

    for _ in 0..50 {
        let (rb, re) = random_window(&mut rng, 80);
        let window = reference.fetch(rb, re).unwrap();
        let mut query = window.clone();
        // T>C is never an expected conversion on the parent strand
        let Some(pos) = window.iter().position(|&b| b == 3) else {
            continue;
        };
        query[pos] = 1;

        let w = AlignmentWindow::new(&query, rb, re, 0);
        let res = finish(&reference, &w, &mat, &gaps, &BisulfiteClassifier::new(strand)).unwrap();
        assert_eq!(res.nm, 1);
        let (mm, _, _) = replay_md(&window, &query, &res.cigar, &res.md);
        assert_eq!(mm, 1);
        let counts = res.bisulfite.unwrap();
        let cytosines = window.iter().filter(|&&b| b == 1).count() as u32;
        assert!(counts.conversions + counts.retentions <= cytosines);
    }
}
