use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Pipeline run metrics, filled in stage by stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineMetrics {
    /// Events folded into the feature builder.
    pub events_processed: u64,
    /// Feature derivation time in milliseconds.
    pub features_ms: u64,
    /// Matrix assembly and standardization time in milliseconds.
    pub standardize_ms: u64,
    /// Wall time of the whole k-sweep in milliseconds.
    pub sweep_ms: u64,
    /// Number of candidate k values that completed.
    pub candidates_evaluated: usize,
    /// Final partition time in milliseconds; 0 when no k was chosen.
    pub partition_ms: u64,
    /// When the run finished.
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineMetrics {
    pub fn record_features(&mut self, events_processed: u64, elapsed: Duration) {
        self.events_processed = events_processed;
        self.features_ms = elapsed.as_millis() as u64;
    }

    pub fn record_standardize(&mut self, elapsed: Duration) {
        self.standardize_ms = elapsed.as_millis() as u64;
    }

    pub fn record_sweep(&mut self, candidates: usize, elapsed: Duration) {
        self.candidates_evaluated = candidates;
        self.sweep_ms = elapsed.as_millis() as u64;
    }

    pub fn record_partition(&mut self, elapsed: Duration) {
        self.partition_ms = elapsed.as_millis() as u64;
    }

    /// Stamp the completion time.
    pub fn finish(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    /// Total of all recorded stage durations.
    pub fn total_ms(&self) -> u64 {
        self.features_ms + self.standardize_ms + self.sweep_ms + self.partition_ms
    }

    /// Start a timer for one stage.
    pub fn stage_timer(&self) -> StageTimer {
        StageTimer {
            start: Instant::now(),
        }
    }
}

/// A scoped timer for a single pipeline stage.
pub struct StageTimer {
    start: Instant,
}

impl StageTimer {
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
