//! TOML configuration deserialisation for benchmark jobs.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;

use rowcast_core::harness::{BenchmarkConfig, FailurePolicy, InputPolicy};
use rowcast_core::PartitionPolicy;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub benchmark: RunConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Element width the whole pipeline runs at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    F32,
    #[default]
    F64,
}

/// What to benchmark.
#[derive(Debug, Deserialize)]
pub struct RunConfig {
    /// Matrix dimensions, in run order.
    pub sizes: Vec<usize>,
    /// Timed runs per configuration (default: 3).
    #[serde(default = "default_runs")]
    pub runs: usize,
    /// Worker counts for the distributed engine (default: [1, 2, 4]).
    #[serde(default = "default_worker_counts")]
    pub worker_counts: Vec<usize>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// "fixed" (default) or "per_run".
    #[serde(default)]
    pub inputs: InputPolicy,
    #[serde(default)]
    pub warmup_runs: usize,
    /// "f64" (default) or "f32".
    #[serde(default)]
    pub precision: Precision,
    /// "abort" (default) or "skip".
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

fn default_runs() -> usize {
    3
}
fn default_worker_counts() -> Vec<usize> {
    vec![1, 2, 4]
}
fn default_seed() -> u64 {
    42
}

/// Correctness checking against the serial reference.
#[derive(Debug, Deserialize)]
pub struct VerificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Absolute tolerance; 1e-10 for f64 and 1e-4 for f32 when omitted.
    #[serde(default)]
    pub tolerance: Option<f64>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance: None,
        }
    }
}

/// Options for the distributed protocol.
#[derive(Debug, Deserialize)]
pub struct ProtocolConfig {
    /// Receive timeout in seconds (default: none, wait forever).
    #[serde(default)]
    pub timeout_secs: Option<f64>,
    /// Allow more workers than rows; surplus workers get no rows.
    #[serde(default)]
    pub allow_idle_workers: bool,
    /// Threads each worker uses for its local block (default: 1).
    #[serde(default = "default_threads_per_worker")]
    pub threads_per_worker: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            allow_idle_workers: false,
            threads_per_worker: default_threads_per_worker(),
        }
    }
}

fn default_threads_per_worker() -> usize {
    1
}

impl ProtocolConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs_f64)
    }

    pub fn partition(&self) -> PartitionPolicy {
        PartitionPolicy {
            allow_idle_workers: self.allow_idle_workers,
        }
    }
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./results").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save the full result bundle as JSON (default: true).
    #[serde(default = "default_true")]
    pub save_json: bool,
    /// Whether to save a CSV summary (default: true).
    #[serde(default = "default_true")]
    pub save_csv: bool,
    /// Whether to save the plain-text performance report (default: true).
    #[serde(default = "default_true")]
    pub save_report: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_json: true,
            save_csv: true,
            save_report: true,
        }
    }
}

fn default_output_dir() -> String {
    "./results".into()
}
fn default_true() -> bool {
    true
}

impl JobConfig {
    /// Session configuration for the harness.
    pub fn benchmark_config(&self) -> BenchmarkConfig {
        let b = &self.benchmark;
        BenchmarkConfig::new(b.sizes.clone(), b.worker_counts.clone(), b.runs)
            .with_seed(b.seed)
            .with_warmup(b.warmup_runs)
            .with_inputs(b.inputs)
            .with_verification(self.verification.enabled, self.verification.tolerance)
            .with_failure_policy(b.on_failure)
            .with_partition(self.protocol.partition())
    }

    /// Check everything that can be checked without running.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.benchmark_config().validate()?;
        if self.protocol.threads_per_worker == 0 {
            bail!("protocol.threads_per_worker must be at least 1");
        }
        if let Some(t) = self.protocol.timeout_secs {
            if !t.is_finite() || t <= 0.0 {
                bail!("protocol.timeout_secs must be a positive number of seconds, got {t}");
            }
        }
        Ok(())
    }
}

/// Parse a TOML job configuration.
pub fn parse_config(content: &str) -> anyhow::Result<JobConfig> {
    let config: JobConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_config(&content).with_context(|| format!("parsing {}", path.display()))
}
