//! Fusion-ranker hot loop benchmark: score, sort, and dedup a shortlist
//! of the size a large frame produces.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use her::{
    ActionKind, ElementDescriptor, Embedder, HashEmbedder, Intent, RankCandidate, RankOptions,
    rank,
};

fn candidates(n: usize) -> Vec<RankCandidate> {
    let embedder = HashEmbedder::for_elements();
    (0..n)
        .map(|i| {
            let text = format!("Product card {i} with a descriptive label");
            let descriptor =
                ElementDescriptor::new(i as i64, "main", "a", format!("/html/body/div/a[{i}]"))
                    .unwrap()
                    .with_text(&text);
            RankCandidate {
                row_id: i,
                element_hash: format!("hash-{i}"),
                cosine: 0.3 + (i % 50) as f32 * 0.01,
                vector: embedder.embed(&text).unwrap(),
                descriptor,
            }
        })
        .collect()
}

fn bench_rank(c: &mut Criterion) {
    let intent = Intent::new(ActionKind::Click, "product card 17");
    let pool = candidates(500);

    c.bench_function("rank_500_candidates", |b| {
        b.iter(|| {
            let ranked = rank(
                black_box("click product card 17"),
                Some(&intent),
                pool.clone(),
                &RankOptions::default(),
            );
            black_box(ranked.len())
        })
    });
}

criterion_group!(benches, bench_rank);
criterion_main!(benches);
