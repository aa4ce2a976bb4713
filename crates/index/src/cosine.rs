//! Cosine similarity with dimension truncation.

/// Chunk size sized for auto-vectorization of the inner loops.
const CHUNK: usize = 32;

/// Cosine similarity of the common-dimension prefixes of `a` and `b`,
/// clamped to `[0, 1]`. Mismatched dimensions (query and element models
/// may differ) truncate both sides to the shorter length and normalize
/// over the prefixes, so the result is a true cosine of what was
/// compared.
pub fn cosine_truncated(a: &[f32], b: &[f32]) -> f32 {
    let d = a.len().min(b.len());
    if d == 0 {
        return 0.0;
    }
    let a = &a[..d];
    let b = &b[..d];

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (ca, cb) in a.chunks(CHUNK).zip(b.chunks(CHUNK)) {
        let mut cd = 0.0f32;
        let mut na = 0.0f32;
        let mut nb = 0.0f32;
        for (x, y) in ca.iter().zip(cb.iter()) {
            cd += x * y;
            na += x * x;
            nb += y * y;
        }
        dot += cd;
        norm_a += na;
        norm_b += nb;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    (dot / denom).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_score_one() {
        let v = vec![0.3f32, -0.4, 0.5];
        assert!((cosine_truncated(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert_eq!(cosine_truncated(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn negative_similarity_clamps_to_zero() {
        assert_eq!(cosine_truncated(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
    }

    #[test]
    fn mismatched_dims_truncate() {
        let short = vec![1.0f32, 0.0];
        let long = vec![1.0f32, 0.0, 0.7, 0.7];
        assert!((cosine_truncated(&short, &long) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_scores_zero() {
        assert_eq!(cosine_truncated(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_truncated(&[], &[1.0]), 0.0);
    }

    #[test]
    fn chunked_matches_scalar_reference() {
        let a: Vec<f32> = (0..100).map(|i| (i as f32 * 0.37).sin()).collect();
        let b: Vec<f32> = (0..100).map(|i| (i as f32 * 0.11).cos()).collect();
        let chunked = cosine_truncated(&a, &b);

        let dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let reference = (dot / (na * nb)).clamp(0.0, 1.0);

        assert!((chunked - reference).abs() < 1e-5);
    }
}
