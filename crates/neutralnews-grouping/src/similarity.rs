/// Normalizes in place to unit length. A zero vector is left as-is; its
/// cosine distance to everything else ends up `1.0` (maximally dissimilar),
/// which is the correct outlier behavior for an item we couldn't embed.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Mean pairwise cosine similarity across a set of (already unit-normalized)
/// embeddings. Mirrors the "average similarity" used to gate both
/// reference-group absorption and subdivision-cluster acceptance.
pub fn mean_pairwise_similarity(embeddings: &[Vec<f32>]) -> f64 {
    if embeddings.len() < 2 {
        return 0.5;
    }
    let mut total = 0.0f64;
    let mut count = 0u64;
    for i in 0..embeddings.len() {
        for j in (i + 1)..embeddings.len() {
            total += cosine_similarity(&embeddings[i], &embeddings[j]) as f64;
            count += 1;
        }
    }
    if count == 0 {
        0.5
    } else {
        total / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_zero_similarity() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn single_embedding_defaults_to_midpoint() {
        assert_eq!(mean_pairwise_similarity(&[vec![1.0, 0.0]]), 0.5);
    }
}
