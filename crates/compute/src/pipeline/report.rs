use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use lrfmp_core::CustomerId;

use crate::algorithms::kmeans::{ClusterId, PartitionStatus};
use crate::algorithms::selector::SweepEntry;

use super::features::CustomerFeatureVector;
use super::metrics::PipelineMetrics;
use super::standardize::Scaler;

/// Customer population counts for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CustomerCounts {
    pub total: usize,
    /// Customers with at least two distinct visit dates.
    pub eligible: usize,
    pub single_visit: usize,
}

/// One cluster of the final partition.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    /// Zero-based label in `0..k`; the same value used in `assignments`.
    pub id: ClusterId,
    pub size: usize,
    /// Fraction of eligible customers in this cluster.
    pub share: f64,
    /// Centroid in standardized units.
    pub centroid: Vec<f64>,
    /// Centroid mapped back to original feature units.
    pub centroid_original: Vec<f64>,
}

/// Partition at the caller's chosen k.
#[derive(Debug, Clone, Serialize)]
pub struct FinalClustering {
    pub k: usize,
    pub wss: f64,
    pub silhouette: f64,
    pub iterations: usize,
    pub status: PartitionStatus,
    pub clusters: Vec<ClusterSummary>,
    /// Customer to zero-based cluster label.
    pub assignments: BTreeMap<CustomerId, ClusterId>,
}

impl FinalClustering {
    pub fn cluster(&self, id: ClusterId) -> Option<&ClusterSummary> {
        self.clusters.iter().find(|c| c.id == id)
    }
}

/// Everything a segmentation run produces.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentationReport {
    pub observation_end: NaiveDate,
    pub customers: CustomerCounts,
    /// Column order of every vector in the report.
    pub columns: Vec<String>,
    /// LRFMP vectors of the eligible customers, sorted by customer id.
    pub features: Vec<CustomerFeatureVector>,
    pub scaler: Scaler,
    pub sweep: Vec<SweepEntry>,
    pub sweep_cancelled: bool,
    pub silhouette_argmax: Option<usize>,
    pub wss_knee: Option<usize>,
    pub clustering: Option<FinalClustering>,
    pub metrics: PipelineMetrics,
}
