use crate::similarity::cosine_distance;

/// Builds a k-NN cosine-distance adjacency list: for each point, its `k`
/// nearest neighbors (excluding itself) paired with their distance. This is
/// deliberately asymmetric (point A's neighbor list need not contain B even
/// if B's contains A) to match DBSCAN run over a precomputed sparse
/// k-neighbors graph rather than a full pairwise distance matrix.
pub fn knn_graph(embeddings: &[Vec<f32>], k: usize) -> Vec<Vec<(usize, f32)>> {
    let n = embeddings.len();
    let mut graph = Vec::with_capacity(n);
    for i in 0..n {
        let mut distances: Vec<(usize, f32)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| (j, cosine_distance(&embeddings[i], &embeddings[j])))
            .collect();
        distances.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        distances.truncate(k);
        graph.push(distances);
    }
    graph
}

/// DBSCAN over a precomputed k-NN distance graph. Returns a label per point:
/// `-1` for noise, `>= 0` identifying the density cluster otherwise.
/// Neighbor lookups only ever consult `graph`, never recomputed pairwise
/// distances, matching clustering over a precomputed sparse matrix.
pub fn dbscan(graph: &[Vec<(usize, f32)>], eps: f64, min_samples: usize) -> Vec<i64> {
    let n = graph.len();
    let mut labels = vec![-1i64; n];
    let mut visited = vec![false; n];
    let mut next_cluster = 0i64;

    let region_query = |p: usize| -> Vec<usize> {
        graph[p]
            .iter()
            .filter(|(_, dist)| (*dist as f64) <= eps)
            .map(|(idx, _)| *idx)
            .collect()
    };

    for p in 0..n {
        if visited[p] {
            continue;
        }
        visited[p] = true;

        let neighbors = region_query(p);
        if neighbors.len() < min_samples {
            continue; // tentatively noise; may be claimed as a border point later
        }

        let cluster_id = next_cluster;
        next_cluster += 1;
        labels[p] = cluster_id;

        let mut seeds = neighbors;
        let mut idx = 0;
        while idx < seeds.len() {
            let q = seeds[idx];
            idx += 1;

            if !visited[q] {
                visited[q] = true;
                let q_neighbors = region_query(q);
                if q_neighbors.len() >= min_samples {
                    for nb in q_neighbors {
                        if !seeds.contains(&nb) {
                            seeds.push(nb);
                        }
                    }
                }
            }

            if labels[q] == -1 {
                labels[q] = cluster_id;
            }
        }
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(x: f32, y: f32) -> Vec<f32> {
        let norm = (x * x + y * y).sqrt();
        vec![x / norm, y / norm]
    }

    #[test]
    fn finds_one_dense_cluster_and_outliers() {
        let embeddings = vec![
            unit(1.0, 0.01),
            unit(1.0, 0.02),
            unit(1.0, 0.0),
            unit(0.0, 1.0), // far away, alone
        ];
        let graph = knn_graph(&embeddings, 3);
        let labels = dbscan(&graph, 0.2125, 3);

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_ne!(labels[0], -1);
        assert_eq!(labels[3], -1);
    }

    #[test]
    fn all_isolated_points_are_noise_when_below_min_samples() {
        let embeddings = vec![unit(1.0, 0.0), unit(0.0, 1.0), unit(-1.0, 0.0)];
        let graph = knn_graph(&embeddings, 2);
        let labels = dbscan(&graph, 0.2125, 3);
        assert!(labels.iter().all(|&l| l == -1));
    }
}
