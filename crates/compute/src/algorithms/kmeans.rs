use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use lrfmp_core::{CustomerId, LrfmpError};

/// Cluster label. Values are `0..k` and carry no ranking.
pub type ClusterId = usize;

/// How a Lloyd's run terminated. Both outcomes yield a usable partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStatus {
    /// No point changed cluster between two consecutive iterations.
    Converged,
    /// `max_iterations` was hit first; the result is best-effort.
    IterationCapReached,
}

/// Inputs for a single K-means run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionParams {
    pub k: usize,
    pub seed: u64,
    pub max_iterations: usize,
}

/// Result of a full batch K-means run.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Assignment of each customer to its cluster.
    pub assignments: HashMap<CustomerId, ClusterId>,
    /// Cluster of each input row, in input order.
    pub labels: Vec<ClusterId>,
    /// Final centroid vectors, indexed by cluster id.
    pub centroids: Vec<Vec<f64>>,
    /// Number of clusters.
    pub k: usize,
    /// Number of Lloyd's iterations performed.
    pub iterations: usize,
    /// Sum of squared distances from each point to its assigned centroid.
    pub wss: f64,
    pub status: PartitionStatus,
    /// How many times an empty cluster had to be reseeded.
    pub reseeded: usize,
}

impl Partition {
    /// Number of members per cluster, indexed by cluster id.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }

    pub fn label_of(&self, customer_id: &str) -> Option<ClusterId> {
        self.assignments.get(customer_id).copied()
    }
}

/// Run Lloyd's K-means algorithm.
///
/// Uses seeded K-means++ initialization, so the same points, `k`, and seed
/// always give the same partition. Iterates until assignments stabilize or
/// `max_iterations` is reached. A cluster that ends an update step empty is
/// reseeded from the point farthest from its own centroid, so every label in
/// `0..k` keeps at least one member.
///
/// # Errors
/// * `EmptyInput` if `points` is empty
/// * `InvalidConfig` if `k` or `max_iterations` is 0, or `k > points.len()`
/// * `InvalidInput` if rows are ragged, zero-width, or non-finite
pub fn partition(
    points: &[(CustomerId, Vec<f64>)],
    params: &PartitionParams,
) -> Result<Partition, LrfmpError> {
    validate(points, params)?;

    let k = params.k;
    let n = points.len();
    let mut rng = StdRng::seed_from_u64(params.seed);

    // K-means++ initialization.
    let mut centroids = kmeanspp_init(points, k, &mut rng);

    // usize::MAX marks "not yet assigned" so the first pass always counts as a change.
    let mut labels = vec![usize::MAX; n];
    let mut iterations = 0;
    let mut reseeded = 0;
    let mut status = PartitionStatus::IterationCapReached;

    while iterations < params.max_iterations {
        iterations += 1;

        // Assignment step: assign each point to nearest centroid.
        let next: Vec<ClusterId> = points
            .par_iter()
            .map(|(_, vec)| nearest_centroid(vec, &centroids))
            .collect();

        if next == labels {
            status = PartitionStatus::Converged;
            break;
        }
        labels = next;

        // Update step: recompute centroids as mean of assigned points.
        centroids = recompute_centroids(points, &labels, &centroids);
        reseeded += reseed_empty_clusters(points, &mut labels, &mut centroids);
    }

    let wss = points
        .iter()
        .zip(&labels)
        .map(|((_, vec), &c)| squared_euclidean(vec, &centroids[c]))
        .sum();

    let assignments = points
        .iter()
        .zip(&labels)
        .map(|((id, _), &c)| (id.clone(), c))
        .collect();

    debug!(k, iterations, wss, ?status, reseeded, "k-means finished");

    Ok(Partition {
        assignments,
        labels,
        centroids,
        k,
        iterations,
        wss,
        status,
        reseeded,
    })
}

fn validate(points: &[(CustomerId, Vec<f64>)], params: &PartitionParams) -> Result<(), LrfmpError> {
    if points.is_empty() {
        return Err(LrfmpError::EmptyInput("no points to cluster".to_string()));
    }
    if params.k == 0 {
        return Err(LrfmpError::InvalidConfig("k must be at least 1".to_string()));
    }
    if params.max_iterations == 0 {
        return Err(LrfmpError::InvalidConfig(
            "max_iterations must be at least 1".to_string(),
        ));
    }
    if params.k > points.len() {
        return Err(LrfmpError::InvalidConfig(format!(
            "k ({}) must be <= number of points ({})",
            params.k,
            points.len()
        )));
    }

    let dim = points[0].1.len();
    if dim == 0 {
        return Err(LrfmpError::invalid("points have no features"));
    }
    for (id, vec) in points {
        if vec.len() != dim {
            return Err(LrfmpError::invalid(format!(
                "point {id} has {} features, expected {dim}",
                vec.len()
            )));
        }
        if vec.iter().any(|v| !v.is_finite()) {
            return Err(LrfmpError::invalid(format!("point {id} has a non-finite feature")));
        }
    }
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────

/// K-means++ initialization: pick k centroids with D²-weighted sampling.
///
/// When every remaining point already coincides with a centroid (all D² are
/// zero) the next pick is uniform, which lets `k` exceed the number of
/// distinct points.
fn kmeanspp_init(points: &[(CustomerId, Vec<f64>)], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);

    let first = rng.gen_range(0..n);
    centroids.push(points[first].1.clone());

    let mut min_d2: Vec<f64> = points
        .iter()
        .map(|(_, vec)| squared_euclidean(vec, &centroids[0]))
        .collect();

    for _ in 1..k {
        let total: f64 = min_d2.iter().sum();
        let idx = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            let mut picked = None;
            for (i, &d2) in min_d2.iter().enumerate() {
                if d2 <= 0.0 {
                    continue;
                }
                cumulative += d2;
                picked = Some(i);
                if cumulative >= target {
                    break;
                }
            }
            // `total > 0` guarantees at least one positive weight.
            picked.unwrap_or(0)
        } else {
            rng.gen_range(0..n)
        };

        let chosen = points[idx].1.clone();
        for (d2, (_, vec)) in min_d2.iter_mut().zip(points) {
            *d2 = d2.min(squared_euclidean(vec, &chosen));
        }
        centroids.push(chosen);
    }

    centroids
}

/// Mean of the points in each cluster. Empty clusters keep their previous centroid.
fn recompute_centroids(
    points: &[(CustomerId, Vec<f64>)],
    labels: &[ClusterId],
    previous: &[Vec<f64>],
) -> Vec<Vec<f64>> {
    let k = previous.len();
    let dim = previous[0].len();
    let mut sums = vec![vec![0.0; dim]; k];
    let mut counts = vec![0usize; k];

    for ((_, vec), &cluster) in points.iter().zip(labels) {
        counts[cluster] += 1;
        for (s, &val) in sums[cluster].iter_mut().zip(vec) {
            *s += val;
        }
    }

    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((mut sum, count), prev)| {
            if count == 0 {
                return prev.clone();
            }
            let count = count as f64;
            for val in sum.iter_mut() {
                *val /= count;
            }
            sum
        })
        .collect()
}

/// Give every empty cluster one point: the point farthest from its own
/// centroid among clusters that have more than one member. Returns the
/// number of clusters reseeded.
fn reseed_empty_clusters(
    points: &[(CustomerId, Vec<f64>)],
    labels: &mut [ClusterId],
    centroids: &mut Vec<Vec<f64>>,
) -> usize {
    let k = centroids.len();
    let mut counts = vec![0usize; k];
    for &label in labels.iter() {
        counts[label] += 1;
    }

    let mut reseeded = 0;
    for empty in 0..k {
        if counts[empty] > 0 {
            continue;
        }

        let mut farthest: Option<(usize, f64)> = None;
        for (i, (_, vec)) in points.iter().enumerate() {
            if counts[labels[i]] <= 1 {
                continue;
            }
            let d2 = squared_euclidean(vec, &centroids[labels[i]]);
            if farthest.map_or(true, |(_, best)| d2 > best) {
                farthest = Some((i, d2));
            }
        }

        // k <= n means some cluster can always donate while one is empty.
        let Some((i, _)) = farthest else { break };
        counts[labels[i]] -= 1;
        counts[empty] = 1;
        labels[i] = empty;
        centroids[empty] = points[i].1.clone();
        reseeded += 1;
    }

    if reseeded > 0 {
        *centroids = recompute_centroids(points, labels, centroids);
    }
    reseeded
}

/// Find the index of the nearest centroid. Ties go to the lowest index.
fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> ClusterId {
    let mut best_idx = 0;
    let mut best_dist = f64::MAX;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = squared_euclidean(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best_idx = i;
        }
    }
    best_idx
}

/// Squared Euclidean distance.
#[inline]
pub(crate) fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Euclidean distance (with sqrt, for silhouette).
#[inline]
pub(crate) fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: usize) -> CustomerId {
        format!("C{n:04}")
    }

    fn params(k: usize) -> PartitionParams {
        PartitionParams {
            k,
            seed: 7,
            max_iterations: 100,
        }
    }

    /// Helper: generate points in well-separated clusters for testing.
    fn make_clusters(centers: &[(f64, f64)], points_per_cluster: usize) -> Vec<(CustomerId, Vec<f64>)> {
        let mut result = Vec::new();
        let mut n = 1;
        for &(cx, cy) in centers {
            for i in 0..points_per_cluster {
                let offset = (i as f64) * 0.1;
                result.push((id(n), vec![cx + offset, cy - offset]));
                n += 1;
            }
        }
        result
    }

    #[test]
    fn basic_kmeans_two_clusters() {
        let points = make_clusters(&[(0.0, 0.0), (100.0, 100.0)], 10);
        let result = partition(&points, &params(2)).unwrap();

        assert_eq!(result.k, 2);
        assert_eq!(result.centroids.len(), 2);
        assert_eq!(result.assignments.len(), 20);
        assert_eq!(result.status, PartitionStatus::Converged);

        // All points near (0,0) should be in the same cluster.
        let c0 = result.label_of(&id(1)).unwrap();
        for i in 1..=10 {
            assert_eq!(result.label_of(&id(i)), Some(c0));
        }

        // All points near (100,100) should be in a different cluster.
        let c1 = result.label_of(&id(11)).unwrap();
        assert_ne!(c0, c1);
        for i in 11..=20 {
            assert_eq!(result.label_of(&id(i)), Some(c1));
        }
    }

    #[test]
    fn kmeans_single_cluster() {
        let points = make_clusters(&[(5.0, 5.0)], 20);
        let result = partition(&points, &params(1)).unwrap();

        assert_eq!(result.centroids.len(), 1);
        assert!(result.labels.iter().all(|&c| c == 0));
        assert!((result.centroids[0][0] - 5.95).abs() < 1e-9);
    }

    #[test]
    fn kmeans_three_clusters() {
        let points = make_clusters(&[(0.0, 0.0), (50.0, 50.0), (100.0, 100.0)], 15);
        let result = partition(&points, &params(3)).unwrap();

        // Verify each group has consistent assignment.
        let groups: Vec<ClusterId> = [1, 16, 31].iter().map(|&i| result.labels[i - 1]).collect();
        for (g, &label) in groups.iter().enumerate() {
            for i in 0..15 {
                assert_eq!(result.labels[g * 15 + i], label);
            }
        }

        // All three clusters should be distinct.
        assert_ne!(groups[0], groups[1]);
        assert_ne!(groups[1], groups[2]);
        assert_ne!(groups[0], groups[2]);
        assert_eq!(result.cluster_sizes(), vec![15, 15, 15]);
    }

    #[test]
    fn kmeans_converges_quickly_on_separable_data() {
        let points = make_clusters(&[(0.0, 0.0), (1000.0, 1000.0)], 5);
        let result = partition(&points, &params(2)).unwrap();

        // Well-separated data should converge in very few iterations.
        assert!(result.iterations <= 5, "iterations: {}", result.iterations);
        assert_eq!(result.status, PartitionStatus::Converged);
    }

    #[test]
    fn wss_matches_assignment() {
        let points = make_clusters(&[(0.0, 0.0), (10.0, 10.0)], 10);
        let result = partition(&points, &params(2)).unwrap();

        let expected: f64 = points
            .iter()
            .zip(&result.labels)
            .map(|((_, v), &c)| squared_euclidean(v, &result.centroids[c]))
            .sum();
        assert!(result.wss >= 0.0);
        assert!((result.wss - expected).abs() < 1e-12);
    }

    #[test]
    fn same_seed_is_deterministic() {
        let points = make_clusters(&[(0.0, 0.0), (3.0, 1.0), (1.0, 4.0), (5.0, 5.0)], 12);
        let p = PartitionParams { k: 4, seed: 1234, max_iterations: 50 };

        let a = partition(&points, &p).unwrap();
        let b = partition(&points, &p).unwrap();

        assert_eq!(a.labels, b.labels);
        assert_eq!(a.centroids, b.centroids);
        assert_eq!(a.wss.to_bits(), b.wss.to_bits());
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn iteration_cap_is_a_normal_outcome() {
        let points = make_clusters(&[(0.0, 0.0), (1.0, 1.0), (2.0, 0.0)], 10);
        let p = PartitionParams { k: 3, seed: 3, max_iterations: 1 };
        let result = partition(&points, &p).unwrap();

        assert_eq!(result.iterations, 1);
        assert_eq!(result.status, PartitionStatus::IterationCapReached);
        assert_eq!(result.labels.len(), 30);
    }

    #[test]
    fn k_above_distinct_points_keeps_every_cluster() {
        // 10 points, only 3 distinct locations.
        let mut points = Vec::new();
        for i in 0..10 {
            let loc = (i % 3) as f64 * 10.0;
            points.push((id(i), vec![loc, loc]));
        }

        for seed in 0..5 {
            let p = PartitionParams { k: 5, seed, max_iterations: 50 };
            let result = partition(&points, &p).unwrap();

            let sizes = result.cluster_sizes();
            assert_eq!(sizes.len(), 5);
            assert!(sizes.iter().all(|&s| s >= 1), "sizes = {sizes:?}");
            assert_eq!(sizes.iter().sum::<usize>(), 10);
            assert_eq!(result.centroids.len(), 5);
        }
    }

    #[test]
    fn identical_points_fill_every_cluster() {
        let points: Vec<_> = (0..6).map(|i| (id(i), vec![1.0, 1.0, 1.0])).collect();
        let result = partition(&points, &PartitionParams { k: 3, seed: 9, max_iterations: 20 }).unwrap();

        assert!(result.cluster_sizes().iter().all(|&s| s >= 1));
        assert!(result.reseeded > 0);
        assert_eq!(result.wss, 0.0);
    }

    #[test]
    fn kmeanspp_init_picks_spread_centroids() {
        let points = make_clusters(&[(0.0, 0.0), (100.0, 100.0)], 5);
        let mut rng = StdRng::seed_from_u64(11);
        let centroids = kmeanspp_init(&points, 2, &mut rng);

        assert_eq!(centroids.len(), 2);

        // The two centroids should be far apart (from different groups).
        let dist = squared_euclidean(&centroids[0], &centroids[1]);
        assert!(dist > 1000.0, "centroids too close: dist²={}", dist);
    }

    #[test]
    fn kmeans_higher_dimensions() {
        // 5-dimensional data with 2 clusters.
        let mut points = Vec::new();
        for i in 0..20 {
            points.push((id(i), vec![0.0, 0.0, 0.0, 0.0, (i as f64) * 0.01]));
        }
        for i in 20..40 {
            points.push((id(i), vec![100.0, 100.0, 100.0, 100.0, 100.0 + (i as f64) * 0.01]));
        }

        let result = partition(&points, &params(2)).unwrap();
        assert_eq!(result.assignments.len(), 40);
        assert_ne!(result.labels[0], result.labels[20]);
    }

    #[test]
    fn rejects_bad_arguments() {
        let empty: Vec<(CustomerId, Vec<f64>)> = Vec::new();
        assert!(matches!(partition(&empty, &params(1)), Err(LrfmpError::EmptyInput(_))));

        let points = vec![(id(1), vec![1.0]), (id(2), vec![2.0])];
        assert!(matches!(partition(&points, &params(0)), Err(LrfmpError::InvalidConfig(_))));
        assert!(matches!(partition(&points, &params(3)), Err(LrfmpError::InvalidConfig(_))));

        let no_iters = PartitionParams { k: 1, seed: 0, max_iterations: 0 };
        assert!(matches!(partition(&points, &no_iters), Err(LrfmpError::InvalidConfig(_))));

        let ragged = vec![(id(1), vec![1.0]), (id(2), vec![2.0, 3.0])];
        assert!(matches!(partition(&ragged, &params(1)), Err(LrfmpError::InvalidInput { .. })));

        let nan = vec![(id(1), vec![f64::NAN]), (id(2), vec![2.0])];
        assert!(matches!(partition(&nan, &params(1)), Err(LrfmpError::InvalidInput { .. })));
    }
}
