pub mod algorithms;
pub mod pipeline;

pub use algorithms::kmeans::{partition, ClusterId, Partition, PartitionParams, PartitionStatus};
pub use algorithms::selector::{sweep_k, sweep_k_until, KSweep, SweepEntry, SweepParams};
pub use algorithms::silhouette::silhouette_score;
pub use pipeline::features::{build_features, CustomerFeatureVector, FeatureBuilder, FeatureTable};
pub use pipeline::matrix::{FeatureMatrix, LRFMP_COLUMNS};
pub use pipeline::metrics::PipelineMetrics;
pub use pipeline::report::{ClusterSummary, CustomerCounts, FinalClustering, SegmentationReport};
pub use pipeline::standardize::{ColumnScale, Scaler};
pub use pipeline::SegmentationPipeline;
