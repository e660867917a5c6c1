use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg32;

/// Fixed seed so subdivision is reproducible across runs given the same
/// input embeddings, matching a pinned `random_state` in the reference
/// clustering library.
const KMEANS_SEED: u64 = 42;
const MAX_ITERATIONS: usize = 100;

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt()
}

/// k-means++ seeding: pick the first centroid uniformly at random, then each
/// subsequent one with probability proportional to squared distance from
/// the nearest already-chosen centroid.
fn seed_centroids(points: &[Vec<f32>], k: usize, rng: &mut Pcg32) -> Vec<Vec<f32>> {
    let mut centroids = Vec::with_capacity(k);
    let first = rng.random_range(0..points.len());
    centroids.push(points[first].clone());

    while centroids.len() < k {
        let weights: Vec<f32> = points
            .iter()
            .map(|p| {
                centroids
                    .iter()
                    .map(|c| euclidean_distance(p, c))
                    .fold(f32::MAX, f32::min)
                    .powi(2)
            })
            .collect();
        let total: f32 = weights.iter().sum();
        if total <= 0.0 {
            // all remaining points coincide with a chosen centroid; fill arbitrarily
            let next = rng.random_range(0..points.len());
            centroids.push(points[next].clone());
            continue;
        }
        let mut threshold = rng.random_range(0.0..total);
        let mut chosen = points.len() - 1;
        for (idx, w) in weights.iter().enumerate() {
            if threshold <= *w {
                chosen = idx;
                break;
            }
            threshold -= w;
        }
        centroids.push(points[chosen].clone());
    }
    centroids
}

/// Partitions `points` into `k` clusters via Lloyd's algorithm, returning a
/// cluster index per point. `k` must be `<= points.len()`.
pub fn kmeans(points: &[Vec<f32>], k: usize) -> Vec<usize> {
    assert!(k > 0 && k <= points.len());
    let dim = points[0].len();
    let mut rng = Pcg32::seed_from_u64(KMEANS_SEED);
    let mut centroids = seed_centroids(points, k, &mut rng);
    let mut assignments = vec![0usize; points.len()];

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, point) in points.iter().enumerate() {
            let mut best = 0usize;
            let mut best_dist = f32::MAX;
            for (c_idx, centroid) in centroids.iter().enumerate() {
                let d = euclidean_distance(point, centroid);
                if d < best_dist {
                    best_dist = d;
                    best = c_idx;
                }
            }
            if assignments[i] != best {
                changed = true;
            }
            assignments[i] = best;
        }

        let mut sums = vec![vec![0.0f32; dim]; k];
        let mut counts = vec![0usize; k];
        for (point, &cluster) in points.iter().zip(&assignments) {
            counts[cluster] += 1;
            for d in 0..dim {
                sums[cluster][d] += point[d];
            }
        }
        for c in 0..k {
            if counts[c] > 0 {
                for d in 0..dim {
                    centroids[c][d] = sums[c][d] / counts[c] as f32;
                }
            }
        }

        if !changed {
            break;
        }
    }

    assignments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_two_well_spaced_blobs() {
        let points = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.1],
            vec![0.05, -0.05],
            vec![10.0, 10.0],
            vec![10.1, 9.9],
            vec![9.9, 10.1],
        ];
        let labels = kmeans(&points, 2);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn is_deterministic_across_runs() {
        let points = vec![
            vec![0.0, 0.0],
            vec![1.0, 1.0],
            vec![5.0, 5.0],
            vec![6.0, 6.0],
        ];
        let first = kmeans(&points, 2);
        let second = kmeans(&points, 2);
        assert_eq!(first, second);
    }
}
