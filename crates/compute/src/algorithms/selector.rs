//! Cluster-count sweep: runs K-means for every candidate k and reports the
//! within-cluster sum of squares and mean silhouette side by side.
//!
//! The two curves often disagree on the best k. The sweep reports the
//! silhouette argmax and the wss knee as candidates; picking the final k is
//! left to the caller.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use lrfmp_core::config::resolve_worker_threads;
use lrfmp_core::{CustomerId, LrfmpError};

use super::kmeans::{partition, PartitionParams, PartitionStatus};
use super::silhouette::silhouette_score;

/// Inputs for a k-sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepParams {
    /// Smallest candidate k (>= 2).
    pub k_min: usize,
    /// Largest candidate k, inclusive.
    pub k_max: usize,
    pub seed: u64,
    pub max_iterations: usize,
    /// Size of the worker pool. 0 = available cores.
    pub worker_threads: usize,
}

/// Model-selection signals for one candidate k.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepEntry {
    pub k: usize,
    pub wss: f64,
    pub silhouette: f64,
    pub iterations: usize,
    pub status: PartitionStatus,
}

/// Sweep results ordered by k.
#[derive(Debug, Clone, Serialize)]
pub struct KSweep {
    pub entries: Vec<SweepEntry>,
    /// Set when the sweep was cancelled before every candidate ran.
    pub cancelled: bool,
}

impl KSweep {
    pub fn get(&self, k: usize) -> Option<&SweepEntry> {
        self.entries.iter().find(|e| e.k == k)
    }

    pub fn wss_curve(&self) -> Vec<(usize, f64)> {
        self.entries.iter().map(|e| (e.k, e.wss)).collect()
    }

    pub fn silhouette_curve(&self) -> Vec<(usize, f64)> {
        self.entries.iter().map(|e| (e.k, e.silhouette)).collect()
    }

    /// The k with the highest mean silhouette. Ties go to the smaller k.
    pub fn silhouette_argmax(&self) -> Option<usize> {
        self.entries
            .iter()
            .fold(None::<&SweepEntry>, |best, e| match best {
                Some(b) if b.silhouette >= e.silhouette => Some(b),
                _ => Some(e),
            })
            .map(|e| e.k)
    }

    /// Elbow of the wss curve: the k farthest from the straight line joining
    /// the first and last points, after scaling both axes to [0, 1].
    ///
    /// `None` with fewer than three candidates or when the curve is flat or
    /// straight.
    pub fn wss_knee(&self) -> Option<usize> {
        if self.entries.len() < 3 {
            return None;
        }
        let first = self.entries.first()?;
        let last = self.entries.last()?;

        let (w_min, w_max) = self
            .entries
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), e| (lo.min(e.wss), hi.max(e.wss)));
        let k_span = (last.k - first.k) as f64;
        let w_span = w_max - w_min;
        if k_span <= 0.0 || w_span <= 0.0 {
            return None;
        }

        let scale = |e: &SweepEntry| ((e.k - first.k) as f64 / k_span, (e.wss - w_min) / w_span);
        let (x0, y0) = scale(first);
        let (x1, y1) = scale(last);
        let norm = ((y1 - y0).powi(2) + (x1 - x0).powi(2)).sqrt();

        let (knee, distance) = self
            .entries
            .iter()
            .map(|e| {
                let (x, y) = scale(e);
                let d = ((y1 - y0) * x - (x1 - x0) * y + x1 * y0 - y1 * x0).abs() / norm;
                (e.k, d)
            })
            .fold((first.k, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });

        if distance <= 1e-9 { None } else { Some(knee) }
    }
}

/// Run K-means and silhouette for every k in `[k_min, k_max]`.
///
/// Candidates are independent and run in parallel on a pool of
/// `worker_threads`. `k_max` is clamped to `n - 1`, the largest k for which
/// silhouette is defined. If `cancel` is set, candidates that have not
/// started yet are skipped and the sweep returns what already finished.
pub fn sweep_k(
    points: &[(CustomerId, Vec<f64>)],
    params: &SweepParams,
    cancel: Option<&AtomicBool>,
) -> Result<KSweep, LrfmpError> {
    sweep_k_until(points, params, &|_| {
        cancel.is_some_and(|c| c.load(Ordering::Relaxed))
    })
}

/// Like [`sweep_k`], but asks `stop(k)` right before each candidate starts.
/// A candidate for which it returns true is skipped and the sweep is marked
/// cancelled; entries already computed are kept unchanged.
pub fn sweep_k_until(
    points: &[(CustomerId, Vec<f64>)],
    params: &SweepParams,
    stop: &(dyn Fn(usize) -> bool + Sync),
) -> Result<KSweep, LrfmpError> {
    if points.is_empty() {
        return Err(LrfmpError::EmptyInput("no points to sweep".to_string()));
    }
    if params.k_min < 2 {
        return Err(LrfmpError::InvalidConfig(format!(
            "k_min must be >= 2 (got {})",
            params.k_min
        )));
    }

    let k_max = params.k_max.min(points.len().saturating_sub(1));
    if k_max < params.k_max {
        warn!(
            requested = params.k_max,
            clamped = k_max,
            points = points.len(),
            "k_max clamped to number of points - 1"
        );
    }
    if k_max < params.k_min {
        return Err(LrfmpError::InvalidConfig(format!(
            "k range {}..={} is empty for {} points",
            params.k_min,
            params.k_max,
            points.len()
        )));
    }

    let workers = resolve_worker_threads(params.worker_threads);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| LrfmpError::InvalidConfig(format!("failed to build worker pool: {e}")))?;

    info!(
        k_min = params.k_min,
        k_max,
        points = points.len(),
        workers,
        "starting k sweep"
    );

    let ks: Vec<usize> = (params.k_min..=k_max).collect();
    let results: Vec<Option<SweepEntry>> = pool.install(|| {
        ks.par_iter()
            .map(|&k| -> Result<Option<SweepEntry>, LrfmpError> {
                if stop(k) {
                    return Ok(None);
                }
                let run = partition(
                    points,
                    &PartitionParams {
                        k,
                        seed: params.seed,
                        max_iterations: params.max_iterations,
                    },
                )?;
                let silhouette = silhouette_score(points, &run.labels, k);
                debug!(k, wss = run.wss, silhouette, "candidate evaluated");
                Ok(Some(SweepEntry {
                    k,
                    wss: run.wss,
                    silhouette,
                    iterations: run.iterations,
                    status: run.status,
                }))
            })
            .collect::<Result<Vec<_>, LrfmpError>>()
    })?;

    let cancelled = results.iter().any(Option::is_none);
    let entries: Vec<SweepEntry> = results.into_iter().flatten().collect();

    if cancelled {
        warn!(completed = entries.len(), total = ks.len(), "k sweep cancelled");
    }

    let sweep = KSweep { entries, cancelled };
    info!(
        candidates = sweep.entries.len(),
        silhouette_argmax = ?sweep.silhouette_argmax(),
        wss_knee = ?sweep.wss_knee(),
        "k sweep finished"
    );
    Ok(sweep)
}
