pub mod kmeans;
pub mod selector;
pub mod silhouette;
