//! Determinism guarantees: identical inputs produce identical hashes,
//! embeddings, and results, regardless of field order, frame order, or
//! which process run is asking.

use her::{
    CanonicalMode, ElementDescriptor, Embedder, FrameSnapshot, HashEmbedder, PageSnapshot,
    PipelineOptions, QueryOptions, Retriever, canonical, dom_hash, element_hash,
};

fn button(id: i64, text: &str) -> ElementDescriptor {
    ElementDescriptor::new(id, "main", "button", format!("//button[{id}]"))
        .unwrap()
        .with_text(text)
}

#[test]
fn canonical_form_ignores_attribute_insertion_order() {
    let mut forward = button(1, "Checkout");
    forward.set_attribute("id", "checkout");
    forward.set_attribute("class", "btn primary");
    forward.set_attribute("data-testid", "checkout-button");

    let mut reversed = button(1, "Checkout");
    reversed.set_attribute("data-testid", "checkout-button");
    reversed.set_attribute("class", "btn primary");
    reversed.set_attribute("id", "checkout");

    assert_eq!(
        canonical(&forward, CanonicalMode::Both),
        canonical(&reversed, CanonicalMode::Both)
    );
    assert_eq!(
        element_hash(&forward, CanonicalMode::Both),
        element_hash(&reversed, CanonicalMode::Both)
    );
}

#[test]
fn dom_hash_is_frame_order_invariant() {
    let mut a = FrameSnapshot::new("frame-a", "https://example.com/a");
    a.elements = vec![button(1, "One"), button(2, "Two")];
    let mut b = FrameSnapshot::new("frame-b", "https://example.com/b");
    b.frame_path = vec![0, 1];
    b.elements = vec![button(3, "Three")];

    assert_eq!(
        dom_hash(&[a.clone(), b.clone()]),
        dom_hash(&[b, a])
    );
}

#[test]
fn hash_embedder_is_stable_across_instances() {
    let first = HashEmbedder::for_queries().embed("click the apple filter").unwrap();
    let second = HashEmbedder::for_queries().embed("click the apple filter").unwrap();
    assert_eq!(first, second);

    let batch = HashEmbedder::for_queries()
        .embed_batch(&["click the apple filter".to_string()])
        .unwrap();
    assert_eq!(batch[0], first);
}

#[test]
fn identical_queries_resolve_identically_across_engine_instances() {
    let snapshot = PageSnapshot::single_frame(
        "https://example.com/shop",
        vec![
            button(1, "Add to cart"),
            button(2, "Checkout"),
            button(3, "Apply coupon"),
        ],
    );

    let run = || {
        let retriever = Retriever::ephemeral(PipelineOptions::default());
        retriever
            .query_snapshot("click checkout", &snapshot, None, QueryOptions::default())
            .unwrap()
    };

    let first = run();
    let second = run();
    assert!(first.same_resolution(&second));
    assert_eq!(
        serde_json::to_string(&first.element).unwrap(),
        serde_json::to_string(&second.element).unwrap()
    );
}

#[test]
fn ranking_is_stable_under_candidate_shuffle() {
    let elements = vec![
        button(1, "Alpha"),
        button(2, "Beta"),
        button(3, "Gamma"),
        button(4, "Delta"),
    ];
    let mut shuffled = elements.clone();
    shuffled.rotate_left(2);

    let query = |els: Vec<ElementDescriptor>| {
        let retriever = Retriever::ephemeral(PipelineOptions::default());
        let snapshot = PageSnapshot::single_frame("https://example.com/", els);
        retriever
            .query_snapshot("click gamma", &snapshot, None, QueryOptions::default())
            .unwrap()
    };

    let a = query(elements);
    let b = query(shuffled);
    assert_eq!(a.element.as_ref().unwrap().text, b.element.as_ref().unwrap().text);
    assert_eq!(a.confidence, b.confidence);
}
