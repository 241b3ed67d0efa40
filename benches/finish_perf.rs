// benches/finish_perf.rs
// Criterion benchmarks for alignment finishing and BWT occurrence counting.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};

use ferrous_bisulfite::core::alignment::banded_global::GlobalAligner;
use ferrous_bisulfite::core::alignment::bisulfite::{
    BisulfiteClassifier, ConversionStrand, ExactClassifier,
};
use ferrous_bisulfite::index::builder::{build_index, ReferenceRecord};
use ferrous_bisulfite::index::pac::PackedReference;
use ferrous_bisulfite::pipelines::linear::finalize::{finish, AlignmentWindow};
use ferrous_bisulfite::FinishOpt;

const READ_LEN: u64 = 150;

fn random_reference(rng: &mut StdRng, len: usize) -> PackedReference {
    let codes: Vec<u8> = (0..len).map(|_| rng.gen_range(0..4u8)).collect();
    PackedReference::from_codes(&codes)
}

fn make_reads(
    rng: &mut StdRng,
    reference: &PackedReference,
    n: usize,
    indel: bool,
) -> Vec<(Vec<u8>, u64)> {
    let l = reference.forward_len();
    (0..n)
        .map(|_| {
            let rb = rng.gen_range(0..2 * l - READ_LEN);
            let rb = if rb < l && rb + READ_LEN > l { l } else { rb };
            let mut q = reference.fetch(rb, rb + READ_LEN).unwrap();
            for _ in 0..3 {
                let i = rng.gen_range(0..q.len());
                q[i] = (q[i] + 1) & 3;
            }
            if indel {
                let at = rng.gen_range(20..q.len() - 20);
                q.remove(at);
            }
            (q, rb)
        })
        .collect()
}

fn bench_finish(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let reference = random_reference(&mut rng, 1 << 20);
    let opt = FinishOpt::default();
    let mat = opt.symmetric_matrix();
    let gaps = opt.gap_penalties();

    let mut group = c.benchmark_group("finish");
    let cases = [
        ("ungapped", false, 0),
        ("banded_sub", false, opt.w),
        ("banded_indel", true, opt.w),
    ];
    for (name, indel, band) in cases {
        let reads = make_reads(&mut rng, &reference, 256, indel);
        group.throughput(Throughput::Elements(reads.len() as u64));
        group.bench_function(name, |b| {
            b.iter(|| {
                for (q, rb) in &reads {
                    let w = AlignmentWindow::new(q, *rb, rb + READ_LEN, band);
                    black_box(finish(&reference, &w, &mat, &gaps, &ExactClassifier));
                }
            })
        });
    }

    let bs_opt = FinishOpt::bisulfite();
    let bs_mat = bs_opt.matrix_for(ConversionStrand::Parent);
    let classifier = BisulfiteClassifier::new(ConversionStrand::Parent);
    let reads = make_reads(&mut rng, &reference, 256, false);
    group.throughput(Throughput::Elements(reads.len() as u64));
    group.bench_function("bisulfite_parent", |b| {
        b.iter(|| {
            for (q, rb) in &reads {
                let w = AlignmentWindow::new(q, *rb, rb + READ_LEN, bs_opt.w);
                black_box(finish(&reference, &w, &bs_mat, &gaps, &classifier));
            }
        })
    });
    group.finish();
}

fn bench_global_dp(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2);
    let opt = FinishOpt::default();
    let mat = opt.symmetric_matrix();
    let aligner = GlobalAligner::new(&mat, opt.gap_penalties());

    c.bench_function("global_dp_150_band100", |b| {
        b.iter_batched(
            || {
                let t: Vec<u8> = (0..150).map(|_| rng.gen_range(0..4u8)).collect();
                let mut q = t.clone();
                q.remove(75);
                (q, t)
            },
            |(q, t)| black_box(aligner.banded(&q, &t, 100)),
            BatchSize::SmallInput,
        )
    });
}

fn bench_occ(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(3);
    let seq: Vec<u8> = (0..200_000).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();
    let index = build_index(&[ReferenceRecord::new("chr1", seq)], 32).unwrap();
    let bwt = index.parent().unwrap();
    let rows: Vec<u64> = (0..4096).map(|_| rng.gen_range(0..bwt.seq_len)).collect();

    let mut group = c.benchmark_group("bwt");
    group.throughput(Throughput::Elements(rows.len() as u64));
    group.bench_function("occ", |b| {
        b.iter(|| {
            let mut acc = 0u64;
            for &k in &rows {
                acc = acc.wrapping_add(bwt.occ(k, (k & 3) as u8));
            }
            black_box(acc)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_finish, bench_global_dp, bench_occ);
criterion_main!(benches);
