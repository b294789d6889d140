//! Segmentation pipeline orchestrator.
//!
//! Runs the batch stages in order, each one either succeeding fully or
//! failing the run:
//!
//! - **Features**: group events by customer and derive LRFMP vectors.
//! - **Standardize**: build the eligible matrix (plus optional category
//!   spend columns) and z-score every column.
//! - **Sweep**: evaluate every candidate k with wss and silhouette.
//! - **Partition**: if the caller fixed a k, cluster at that k and map the
//!   centroids back to original units.

pub mod features;
pub mod matrix;
pub mod metrics;
pub mod preferences;
pub mod report;
pub mod standardize;

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use lrfmp_core::{ClusteringConfig, LrfmpError, TransactionEvent};

use crate::algorithms::kmeans::{partition, PartitionParams};
use crate::algorithms::selector::{sweep_k, SweepParams};
use crate::algorithms::silhouette::silhouette_score;

use self::features::FeatureBuilder;
use self::matrix::FeatureMatrix;
use self::metrics::PipelineMetrics;
use self::preferences::append_category_spend;
use self::report::{ClusterSummary, CustomerCounts, FinalClustering, SegmentationReport};
use self::standardize::Scaler;

/// Batch customer segmentation over a slice of transaction events.
pub struct SegmentationPipeline {
    config: ClusteringConfig,
}

impl SegmentationPipeline {
    pub fn new(config: ClusteringConfig) -> Self {
        Self { config }
    }

    /// Run every stage over `events`.
    ///
    /// `cancel` is checked between sweep candidates and before the final
    /// partition. A cancelled run still returns the candidates that
    /// finished, with `sweep_cancelled` set and no final clustering.
    pub fn run(
        &self,
        events: &[TransactionEvent],
        cancel: Option<&AtomicBool>,
    ) -> Result<SegmentationReport, LrfmpError> {
        self.config.validate()?;
        let mut metrics = PipelineMetrics::default();

        // Features
        let timer = metrics.stage_timer();
        let mut builder = FeatureBuilder::new();
        for event in events {
            builder.update(event)?;
        }
        let events_seen = builder.events_seen() as u64;
        debug!(customers = builder.customer_count(), "events grouped by customer");
        let table = builder.build()?;
        let eligible = table.eligible();
        metrics.record_features(events_seen, timer.elapsed());

        let counts = CustomerCounts {
            total: table.customers.len(),
            eligible: eligible.len(),
            single_visit: table.single_visit_count(),
        };
        info!(
            events = events_seen,
            customers = counts.total,
            eligible = counts.eligible,
            single_visit = counts.single_visit,
            observation_end = %table.observation_end,
            "features built"
        );
        if eligible.is_empty() {
            return Err(LrfmpError::EmptyInput(
                "no customer has two or more visits".to_string(),
            ));
        }

        // Standardize
        let timer = metrics.stage_timer();
        let mut raw: FeatureMatrix = eligible.to_matrix();
        if self.config.include_categories {
            let added = append_category_spend(&mut raw, &table)?;
            debug!(columns = ?added, "category spend columns appended");
        }
        let (standardized, scaler) = Scaler::fit_transform(&raw)?;
        metrics.record_standardize(timer.elapsed());
        info!(
            rows = standardized.nrows(),
            columns = standardized.ncols(),
            "features standardized"
        );

        // Sweep
        let timer = metrics.stage_timer();
        let sweep = sweep_k(
            standardized.points(),
            &SweepParams {
                k_min: self.config.k_min,
                k_max: self.config.k_max,
                seed: self.config.random_seed,
                max_iterations: self.config.max_iterations,
                worker_threads: self.config.resolved_worker_threads(),
            },
            cancel,
        )?;
        metrics.record_sweep(sweep.entries.len(), timer.elapsed());

        // Partition
        let cancelled = sweep.cancelled || cancel.is_some_and(|c| c.load(Ordering::Relaxed));
        let clustering = match self.config.chosen_k {
            Some(k) if !cancelled => {
                let timer = metrics.stage_timer();
                let clustering = self.final_clustering(&standardized, &scaler, k)?;
                metrics.record_partition(timer.elapsed());
                Some(clustering)
            }
            Some(k) => {
                warn!(k, "run cancelled, skipping final partition");
                None
            }
            None => None,
        };

        metrics.finish();
        info!(total_ms = metrics.total_ms(), "segmentation finished");

        Ok(SegmentationReport {
            observation_end: table.observation_end,
            customers: counts,
            columns: standardized.columns().to_vec(),
            features: eligible.customers().to_vec(),
            scaler,
            silhouette_argmax: sweep.silhouette_argmax(),
            wss_knee: sweep.wss_knee(),
            sweep_cancelled: sweep.cancelled,
            sweep: sweep.entries,
            clustering,
            metrics,
        })
    }

    fn final_clustering(
        &self,
        standardized: &FeatureMatrix,
        scaler: &Scaler,
        k: usize,
    ) -> Result<FinalClustering, LrfmpError> {
        let points = standardized.points();
        let run = partition(
            points,
            &PartitionParams {
                k,
                seed: self.config.random_seed,
                max_iterations: self.config.max_iterations,
            },
        )?;
        let silhouette = silhouette_score(points, &run.labels, k);
        let originals = scaler.denormalize(&run.centroids)?;

        let n = points.len() as f64;
        let clusters: Vec<ClusterSummary> = run
            .cluster_sizes()
            .into_iter()
            .zip(run.centroids.iter().zip(originals))
            .enumerate()
            .map(|(id, (size, (centroid, centroid_original)))| ClusterSummary {
                id,
                size,
                share: size as f64 / n,
                centroid: centroid.clone(),
                centroid_original,
            })
            .collect();

        info!(
            k,
            wss = run.wss,
            silhouette,
            iterations = run.iterations,
            status = ?run.status,
            "final partition"
        );

        Ok(FinalClustering {
            k,
            wss: run.wss,
            silhouette,
            iterations: run.iterations,
            status: run.status,
            clusters,
            assignments: run.assignments.into_iter().collect(),
        })
    }
}
