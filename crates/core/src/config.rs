use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LrfmpError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

/// Parse a profiled env var, reporting unparsable values instead of
/// silently keeping the default.
fn profiled_env_parse<T: FromStr>(profile: &str, key: &str) -> Result<Option<T>, LrfmpError> {
    match profiled_env_opt(profile, key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| LrfmpError::InvalidConfig(format!("{key}: cannot parse '{raw}'"))),
        None => Ok(None),
    }
}

/// Map a requested worker count to a real one; 0 means available parallelism.
pub fn resolve_worker_threads(requested: usize) -> usize {
    if requested == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        requested
    }
}

fn profiled_env_bool(profile: &str, key: &str) -> Option<bool> {
    profiled_env_opt(profile, key).map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
}

impl Config {
    /// Parse a TOML document. Missing sections and keys take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, LrfmpError> {
        toml::from_str(content).map_err(|e| LrfmpError::InvalidConfig(e.to_string()))
    }

    /// Overlay environment variables on top of the current values.
    ///
    /// When `LRFMP_PROFILE` is set (e.g. `PROD`), every key is first looked
    /// up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn apply_env(&mut self) -> Result<(), LrfmpError> {
        let profile = env_or("LRFMP_PROFILE", &self.profile).to_uppercase();
        self.apply_env_profiled(&profile)
    }

    /// Overlay environment variables for an explicit profile name.
    pub fn apply_env_profiled(&mut self, profile: &str) -> Result<(), LrfmpError> {
        let p = profile.to_uppercase();
        self.profile = p.clone();
        self.ledger.apply_env_profiled(&p);
        self.clustering.apply_env_profiled(&p)
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        let c = &self.clustering;
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  ledger:      approved_status={}, date_format={}",
            self.ledger.approved_status,
            self.ledger.date_format
        );
        tracing::info!(
            "  clustering:  k={}..={}, chosen_k={}, seed={}, max_iterations={}, workers={}, categories={}",
            c.k_min,
            c.k_max,
            c.chosen_k.map(|k| k.to_string()).unwrap_or_else(|| "(none)".to_string()),
            c.random_seed,
            c.max_iterations,
            c.worker_threads,
            c.include_categories
        );
    }
}

// ── Ledger ────────────────────────────────────────────────────

/// How raw ledger rows are filtered and parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// `order_status` value a row must carry to be included (case-insensitive).
    #[serde(default = "default_approved_status")]
    pub approved_status: String,
    /// chrono format string for `transaction_date`.
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_approved_status() -> String {
    "Approved".to_string()
}

fn default_date_format() -> String {
    "%d/%m/%Y".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            approved_status: default_approved_status(),
            date_format: default_date_format(),
        }
    }
}

impl LedgerConfig {
    fn apply_env_profiled(&mut self, p: &str) {
        if let Some(v) = profiled_env_opt(p, "LRFMP_APPROVED_STATUS") {
            self.approved_status = v;
        }
        if let Some(v) = profiled_env_opt(p, "LRFMP_DATE_FORMAT") {
            self.date_format = v;
        }
    }
}

// ── Clustering ────────────────────────────────────────────────

/// Parameters for the k-sweep and the final partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Smallest candidate cluster count (>= 2).
    #[serde(default = "default_k_min")]
    pub k_min: usize,
    /// Largest candidate cluster count (inclusive).
    #[serde(default = "default_k_max")]
    pub k_max: usize,
    /// Final cluster count picked by the analyst. `None` = sweep only.
    #[serde(default)]
    pub chosen_k: Option<usize>,
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Worker threads for the k-sweep. 0 = available cores.
    #[serde(default)]
    pub worker_threads: usize,
    /// Append per-category spend columns before standardization.
    #[serde(default)]
    pub include_categories: bool,
}

fn default_k_min() -> usize { 2 }
fn default_k_max() -> usize { 20 }
fn default_random_seed() -> u64 { 42 }
fn default_max_iterations() -> usize { 300 }

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            k_min: default_k_min(),
            k_max: default_k_max(),
            chosen_k: None,
            random_seed: default_random_seed(),
            max_iterations: default_max_iterations(),
            worker_threads: 0,
            include_categories: false,
        }
    }
}

impl ClusteringConfig {
    fn apply_env_profiled(&mut self, p: &str) -> Result<(), LrfmpError> {
        if let Some(v) = profiled_env_parse(p, "LRFMP_K_MIN")? {
            self.k_min = v;
        }
        if let Some(v) = profiled_env_parse(p, "LRFMP_K_MAX")? {
            self.k_max = v;
        }
        if let Some(v) = profiled_env_parse(p, "LRFMP_CHOSEN_K")? {
            self.chosen_k = Some(v);
        }
        if let Some(v) = profiled_env_parse(p, "LRFMP_RANDOM_SEED")? {
            self.random_seed = v;
        }
        if let Some(v) = profiled_env_parse(p, "LRFMP_MAX_ITERATIONS")? {
            self.max_iterations = v;
        }
        if let Some(v) = profiled_env_parse(p, "LRFMP_WORKER_THREADS")? {
            self.worker_threads = v;
        }
        if let Some(v) = profiled_env_bool(p, "LRFMP_INCLUDE_CATEGORIES") {
            self.include_categories = v;
        }
        Ok(())
    }

    pub fn resolved_worker_threads(&self) -> usize {
        resolve_worker_threads(self.worker_threads)
    }

    pub fn validate(&self) -> Result<(), LrfmpError> {
        if self.k_min < 2 {
            return Err(LrfmpError::InvalidConfig(format!(
                "k_min must be >= 2 (got {})",
                self.k_min
            )));
        }
        if self.k_max < self.k_min {
            return Err(LrfmpError::InvalidConfig(format!(
                "k_max ({}) must be >= k_min ({})",
                self.k_max, self.k_min
            )));
        }
        if self.max_iterations == 0 {
            return Err(LrfmpError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if let Some(k) = self.chosen_k {
            if k == 0 {
                return Err(LrfmpError::InvalidConfig("chosen_k must be at least 1".to_string()));
            }
        }
        Ok(())
    }
}
