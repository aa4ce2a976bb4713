//! Concurrency behavior: distinct sessions proceed in parallel, the
//! shared caches tolerate concurrent readers and writers, and repeated
//! parallel queries converge on one deterministic answer.

use std::sync::Arc;
use std::thread;

use her::{
    ElementDescriptor, EmbeddingCache, PageSnapshot, PipelineOptions, QueryOptions, Retriever,
};

fn el(id: i64, tag: &str, text: &str) -> ElementDescriptor {
    ElementDescriptor::new(id, "main", tag, format!("//{tag}[{id}]"))
        .unwrap()
        .with_text(text)
}

fn shop_snapshot(seed: i64) -> PageSnapshot {
    PageSnapshot::single_frame(
        format!("https://example.com/shop/{seed}"),
        vec![
            el(seed * 10 + 1, "button", "Add to cart"),
            el(seed * 10 + 2, "button", "Checkout"),
            el(seed * 10 + 3, "a", "Continue shopping"),
        ],
    )
}

#[test]
fn distinct_sessions_run_in_parallel() {
    let retriever = Arc::new(Retriever::ephemeral(PipelineOptions::default()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let retriever = retriever.clone();
            thread::spawn(move || {
                let snapshot = shop_snapshot(i);
                let session = format!("session-{i}");
                retriever
                    .query_snapshot(
                        "click checkout",
                        &snapshot,
                        Some(&session),
                        QueryOptions::default(),
                    )
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        let resolution = handle.join().expect("worker thread panicked");
        assert!(resolution.ok);
        assert_eq!(resolution.element.as_ref().unwrap().text, "Checkout");
    }
}

#[test]
fn same_session_parallel_queries_see_one_history() {
    let retriever = Arc::new(Retriever::ephemeral(PipelineOptions::default()));
    let snapshot = Arc::new(shop_snapshot(1));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let retriever = retriever.clone();
            let snapshot = snapshot.clone();
            thread::spawn(move || {
                retriever
                    .query_snapshot(
                        "click checkout",
                        &snapshot,
                        Some("shared"),
                        QueryOptions::default(),
                    )
                    .unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("worker thread panicked"))
        .collect();

    // Every answer is the same resolution, regardless of interleaving.
    for pair in results.windows(2) {
        assert!(pair[0].same_resolution(&pair[1]));
    }
}

#[test]
fn cache_tolerates_concurrent_put_get() {
    let cache = Arc::new(EmbeddingCache::in_memory(1024));

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let key = format!("w{w}-k{i}");
                    cache.put_vec(&key, &[w as f32, i as f32]);
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|r| {
            let cache = cache.clone();
            thread::spawn(move || {
                let mut hits = 0usize;
                for i in 0..200 {
                    let key = format!("w{r}-k{i}");
                    if cache.get_vec(&key).is_some() {
                        hits += 1;
                    }
                }
                hits
            })
        })
        .collect();

    for w in writers {
        w.join().expect("writer panicked");
    }
    for r in readers {
        r.join().expect("reader panicked");
    }

    // After all writers land, every key reads back exactly.
    for w in 0..4 {
        for i in 0..200 {
            let key = format!("w{w}-k{i}");
            assert_eq!(cache.get_vec(&key), Some(vec![w as f32, i as f32]));
        }
    }
}

#[test]
fn concurrent_upserts_never_duplicate_rows() {
    use her::{CanonicalMode, FrameIndex, HashEmbedder};

    let index = Arc::new(FrameIndex::new());
    let elements: Vec<ElementDescriptor> =
        (0..50).map(|i| el(i, "li", &format!("Row {i}"))).collect();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let index = index.clone();
            let elements = elements.clone();
            thread::spawn(move || {
                index
                    .upsert(&elements, CanonicalMode::Both, &HashEmbedder::for_elements(), None)
                    .unwrap()
            })
        })
        .collect();

    let mut total_added = 0usize;
    for handle in handles {
        total_added += handle.join().expect("upsert thread panicked").added;
    }

    assert_eq!(total_added, 50, "each hash lands exactly once");
    assert_eq!(index.len(), 50);
}
