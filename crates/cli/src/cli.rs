use std::path::PathBuf;

use clap::Parser;

use lrfmp_core::ClusteringConfig;

/// LRFMP customer segmentation.
///
/// Reads a transaction ledger, derives Length/Recency/Frequency/Monetary/
/// Periodicity features per customer, sweeps candidate cluster counts and
/// optionally partitions at a chosen k. Prints the report as JSON.
#[derive(Parser, Debug)]
#[command(name = "lrfmp", version, about)]
pub struct CliArgs {
    /// Ledger CSV file.
    #[arg(long, env = "LRFMP_INPUT")]
    pub input: PathBuf,

    /// TOML config file. Environment variables and flags override it.
    #[arg(long, env = "LRFMP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Smallest candidate k.
    #[arg(long)]
    pub k_min: Option<usize>,

    /// Largest candidate k (clamped to eligible customers - 1).
    #[arg(long)]
    pub k_max: Option<usize>,

    /// Partition at this k after the sweep.
    #[arg(long)]
    pub chosen_k: Option<usize>,

    /// Seed for K-means++ initialization.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Lloyd's iteration cap per run.
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Sweep worker threads (0 = all cores).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Append per-category spend columns to the feature matrix.
    #[arg(long)]
    pub include_categories: bool,

    /// Write the report here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl CliArgs {
    /// Apply flags that were given on the command line.
    pub fn apply_overrides(&self, clustering: &mut ClusteringConfig) {
        if let Some(k) = self.k_min {
            clustering.k_min = k;
        }
        if let Some(k) = self.k_max {
            clustering.k_max = k;
        }
        if let Some(k) = self.chosen_k {
            clustering.chosen_k = Some(k);
        }
        if let Some(seed) = self.seed {
            clustering.random_seed = seed;
        }
        if let Some(cap) = self.max_iterations {
            clustering.max_iterations = cap;
        }
        if let Some(workers) = self.workers {
            clustering.worker_threads = workers;
        }
        if self.include_categories {
            clustering.include_categories = true;
        }
    }
}
