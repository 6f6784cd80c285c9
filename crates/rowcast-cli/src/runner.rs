//! Benchmark runner: ties together configuration, engines and output files.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use rowcast_compute::{ComputeBackend, CpuBackend, Element};
use rowcast_core::analysis::PerformanceSummary;
use rowcast_core::harness::{BenchmarkSession, EngineFactory};
use rowcast_core::verify::compare;
use rowcast_core::{
    multiply_serial, DistributedEngine, EngineKind, MatrixPair, MultiplyEngine, PartitionPolicy,
    ResultBundle,
};

use crate::config::{JobConfig, Precision};
use crate::report::{fmt_cv, fmt_verified};

/// Run a full benchmark from a parsed job configuration.
pub fn run_benchmark(job: &JobConfig) -> Result<ResultBundle> {
    match job.benchmark.precision {
        Precision::F32 => run_typed::<f32>(job),
        Precision::F64 => run_typed::<f64>(job),
    }
}

fn run_typed<T: Element>(job: &JobConfig) -> Result<ResultBundle> {
    let config = job.benchmark_config();
    println!(
        "Sizes: {:?}, workers: {:?}, runs: {} ({}, seed {})",
        config.sizes,
        config.worker_counts,
        config.runs,
        T::NAME,
        config.seed
    );

    let backend = create_backend::<T>(job.protocol.threads_per_worker)?;
    let partition = job.protocol.partition();
    let timeout = job.protocol.timeout();
    let factory: EngineFactory<T> = Box::new(move |workers| {
        Box::new(
            DistributedEngine::new(workers)
                .with_backend(Arc::clone(&backend))
                .with_policy(partition)
                .with_timeout(timeout),
        ) as Box<dyn MultiplyEngine<T>>
    });

    let mut session = BenchmarkSession::<T>::new(config)?.with_distributed_engines(factory);
    let bundle = session.run()?;

    for s in &bundle.serial {
        println!(
            "  N={:<6} serial          {:.6}s ± {:.6}s (cv {})",
            s.size,
            s.mean_secs,
            s.std_dev_secs,
            fmt_cv(s.coefficient_of_variation())
        );
    }
    for s in &bundle.distributed {
        println!(
            "  N={:<6} P={:<4}        {:.6}s ± {:.6}s (verified: {})",
            s.size,
            s.workers,
            s.mean_secs,
            s.std_dev_secs,
            fmt_verified(s.verification_passed())
        );
    }
    for f in &bundle.failures {
        println!("  N={:<6} P={:<4} skipped: {}", f.size, f.workers, f.message);
    }

    Ok(bundle)
}

/// Local compute backend shared by every rank.
fn create_backend<T: Element>(threads_per_worker: usize) -> Result<Arc<dyn ComputeBackend<T>>> {
    let backend = if threads_per_worker <= 1 {
        CpuBackend::sequential()
    } else {
        CpuBackend::with_threads(threads_per_worker)?
    };
    println!("Backend: {}", ComputeBackend::<T>::device_info(&backend).name);
    Ok(Arc::new(backend))
}

/// Outcome of a one-off verification.
#[derive(Debug)]
pub struct VerificationReport {
    pub size: usize,
    pub workers: usize,
    pub tolerance: f64,
    pub max_abs_error: f64,
    pub worst: Option<(usize, usize)>,
    pub messages: u64,
    pub elements: u64,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.max_abs_error <= self.tolerance
    }
}

/// Multiply one seeded pair both ways and compare.
pub fn run_verification(
    size: usize,
    workers: usize,
    seed: u64,
    tolerance: Option<f64>,
    precision: Precision,
    allow_idle_workers: bool,
) -> Result<VerificationReport> {
    match precision {
        Precision::F32 => verify_typed::<f32>(size, workers, seed, tolerance, allow_idle_workers),
        Precision::F64 => verify_typed::<f64>(size, workers, seed, tolerance, allow_idle_workers),
    }
}

fn verify_typed<T: Element>(
    size: usize,
    workers: usize,
    seed: u64,
    tolerance: Option<f64>,
    allow_idle_workers: bool,
) -> Result<VerificationReport> {
    let tolerance = tolerance.unwrap_or(T::DEFAULT_TOLERANCE);
    if !tolerance.is_finite() || tolerance < 0.0 {
        bail!("tolerance must be a non-negative finite number, got {tolerance}");
    }

    let pair = MatrixPair::<T>::seeded(size, seed);
    let serial = multiply_serial(&pair.a, &pair.b)?;
    let engine =
        DistributedEngine::new(workers).with_policy(PartitionPolicy { allow_idle_workers });
    let (distributed, traffic) = engine.multiply_with_traffic(&pair.a, &pair.b)?;
    let cmp = compare(&distributed, &serial)?;

    Ok(VerificationReport {
        size,
        workers,
        tolerance,
        max_abs_error: cmp.max_abs_diff,
        worst: cmp.worst,
        messages: traffic.messages,
        elements: traffic.elements,
    })
}

/// Load a result bundle written by `run`.
pub fn load_results(path: &Path) -> Result<ResultBundle> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Write the full result bundle to a JSON file.
pub fn write_results_json(bundle: &ResultBundle, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(bundle)
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    std::fs::write(path, json)?;

    println!("Results (JSON) written to: {}", path.display());
    Ok(())
}

/// Write one row per aggregate to a CSV file with a metadata header.
pub fn write_summary_csv(
    bundle: &ResultBundle,
    summary: &PerformanceSummary,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::File::create(path)?;

    writeln!(file, "# Rowcast benchmark summary")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# precision: {}", bundle.element)?;
    writeln!(file, "# seed: {}", bundle.config.seed)?;
    writeln!(file, "#")?;
    writeln!(
        file,
        "engine,size,workers,runs,mean_s,std_s,min_s,max_s,cv,speedup,efficiency,verified"
    )?;

    for s in bundle.serial.iter().chain(&bundle.distributed) {
        let point = match s.engine {
            EngineKind::Serial => None,
            EngineKind::Distributed => summary
                .points
                .iter()
                .find(|p| p.size == s.size && p.workers == s.workers),
        };
        writeln!(
            file,
            "{},{},{},{},{:.6e},{:.6e},{:.6e},{:.6e},{},{},{},{}",
            s.engine,
            s.size,
            s.workers,
            s.runs,
            s.mean_secs,
            s.std_dev_secs,
            s.min_secs,
            s.max_secs,
            s.coefficient_of_variation()
                .map_or_else(String::new, |cv| format!("{cv:.4}")),
            point.map_or_else(String::new, |p| format!("{:.4}", p.speedup)),
            point.map_or_else(String::new, |p| format!("{:.4}", p.efficiency)),
            s.verification_passed()
                .map_or_else(String::new, |v| v.to_string()),
        )?;
    }

    println!("Summary (CSV) written to: {}", path.display());
    Ok(())
}

/// Write the plain-text performance report.
pub fn write_report(report: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, report)?;
    println!("Report written to: {}", path.display());
    Ok(())
}
