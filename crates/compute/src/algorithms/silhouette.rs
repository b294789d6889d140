use rayon::prelude::*;

use lrfmp_core::CustomerId;

use super::kmeans::{euclidean, ClusterId};

/// Compute the mean silhouette score for a clustering.
///
/// For each point i:
///   a(i) = average distance to other points in the same cluster
///   b(i) = minimum average distance to points in any other cluster
///   s(i) = (b(i) - a(i)) / max(a(i), b(i))
///
/// Points alone in their cluster score 0. Returns the mean s(i) across all
/// points, or 0 when fewer than two clusters have members. Range: [-1, 1].
///
/// `labels` is row-aligned with `points` and holds values in `0..k`.
pub fn silhouette_score(points: &[(CustomerId, Vec<f64>)], labels: &[ClusterId], k: usize) -> f64 {
    let n = points.len();
    if n <= 1 || k <= 1 || labels.len() != n {
        return 0.0;
    }

    let mut sizes = vec![0usize; k];
    for &label in labels {
        sizes[label] += 1;
    }
    if sizes.iter().filter(|&&s| s > 0).count() < 2 {
        return 0.0;
    }

    // Collect before summing so the float total does not depend on how
    // rayon splits the work.
    let per_point: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|i| point_silhouette(i, points, labels, &sizes))
        .collect();

    per_point.iter().sum::<f64>() / n as f64
}

fn point_silhouette(
    i: usize,
    points: &[(CustomerId, Vec<f64>)],
    labels: &[ClusterId],
    sizes: &[usize],
) -> f64 {
    let own = labels[i];
    if sizes[own] <= 1 {
        return 0.0;
    }

    // Sum of distances from point i to each cluster.
    let mut sums = vec![0.0; sizes.len()];
    let vec_i = &points[i].1;
    for (j, (_, vec_j)) in points.iter().enumerate() {
        if j != i {
            sums[labels[j]] += euclidean(vec_i, vec_j);
        }
    }

    let a = sums[own] / (sizes[own] - 1) as f64;
    let b = sums
        .iter()
        .zip(sizes)
        .enumerate()
        .filter(|&(c, (_, &size))| c != own && size > 0)
        .map(|(_, (&sum, &size))| sum / size as f64)
        .fold(f64::INFINITY, f64::min);

    let max_ab = a.max(b);
    if max_ab > 0.0 { (b - a) / max_ab } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(coords: &[f64]) -> Vec<(CustomerId, Vec<f64>)> {
        coords
            .iter()
            .enumerate()
            .map(|(i, &x)| (i.to_string(), vec![x]))
            .collect()
    }

    #[test]
    fn well_separated_scores_near_one() {
        let pts = points(&[0.0, 0.1, 0.2, 100.0, 100.1, 100.2]);
        let score = silhouette_score(&pts, &[0, 0, 0, 1, 1, 1], 2);
        assert!(score > 0.99, "silhouette score = {}", score);
    }

    #[test]
    fn hand_computed_value() {
        // Cluster 0: {0, 2}, cluster 1: {10}.
        // Point 0: a = 2, b = 10 -> 0.8
        // Point 2: a = 2, b = 8  -> 0.75
        // Point 10: singleton -> 0
        let pts = points(&[0.0, 2.0, 10.0]);
        let score = silhouette_score(&pts, &[0, 0, 1], 2);
        assert!((score - (0.8 + 0.75) / 3.0).abs() < 1e-12, "score = {score}");
    }

    #[test]
    fn wrong_assignment_is_negative() {
        let pts = points(&[0.0, 0.1, 100.0, 100.1]);
        let score = silhouette_score(&pts, &[0, 1, 0, 1], 2);
        assert!(score < 0.0, "score = {score}");
    }

    #[test]
    fn single_cluster_is_zero() {
        let pts = points(&[1.0, 2.0, 3.0]);
        assert_eq!(silhouette_score(&pts, &[0, 0, 0], 1), 0.0);
        assert_eq!(silhouette_score(&pts, &[1, 1, 1], 2), 0.0);
    }
}
