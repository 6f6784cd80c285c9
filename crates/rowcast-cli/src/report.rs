//! Plain-text rendering of benchmark results.

use std::fmt::Write;

use rowcast_core::analysis::PerformanceSummary;
use rowcast_core::ResultBundle;

/// Render the performance report for a finished session.
pub fn render_report(bundle: &ResultBundle, summary: &PerformanceSummary) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, bundle, summary);
    out
}

fn write_report(
    out: &mut String,
    bundle: &ResultBundle,
    summary: &PerformanceSummary,
) -> std::fmt::Result {
    writeln!(out, "Rowcast Performance Report")?;
    writeln!(out, "==========================")?;
    writeln!(
        out,
        "Precision: {}   Runs: {}   Seed: {}   Inputs: {:?}",
        bundle.element, bundle.config.runs, bundle.config.seed, bundle.config.inputs
    )?;
    writeln!(out)?;

    writeln!(out, "Serial baseline")?;
    writeln!(out, "---------------")?;
    writeln!(out, "{:>8}  {:>12}  {:>12}  {:>8}", "N", "mean (s)", "std (s)", "cv")?;
    for s in &bundle.serial {
        writeln!(
            out,
            "{:>8}  {:>12.6}  {:>12.6}  {:>8}",
            s.size,
            s.mean_secs,
            s.std_dev_secs,
            fmt_cv(s.coefficient_of_variation())
        )?;
    }
    writeln!(out)?;

    writeln!(out, "Distributed")?;
    writeln!(out, "-----------")?;
    writeln!(
        out,
        "{:>8}  {:>4}  {:>12}  {:>12}  {:>8}  {:>10}  {:>8}",
        "N", "P", "mean (s)", "std (s)", "speedup", "efficiency", "verified"
    )?;
    for p in &summary.points {
        let std_dev = bundle
            .distributed_for(p.size, p.workers)
            .map_or(0.0, |s| s.std_dev_secs);
        writeln!(
            out,
            "{:>8}  {:>4}  {:>12.6}  {:>12.6}  {:>8.2}  {:>10.2}  {:>8}",
            p.size,
            p.workers,
            p.distributed_mean_secs,
            std_dev,
            p.speedup,
            p.efficiency,
            fmt_verified(p.verification_passed)
        )?;
    }
    writeln!(out)?;

    if !summary.best.is_empty() {
        writeln!(out, "Best speedup per size")?;
        writeln!(out, "---------------------")?;
        for b in &summary.best {
            writeln!(out, "  N={:<6} {:.2}x with {} workers", b.size, b.speedup, b.workers)?;
        }
        writeln!(out)?;
    }

    let scaling = summary.scalability();
    if let Some(first) = scaling.first() {
        writeln!(out, "Scalability at N={}", first.size)?;
        writeln!(out, "--------------------")?;
        for p in &scaling {
            writeln!(
                out,
                "  P={:<4} speedup {:.2}x, efficiency {:.1}%",
                p.workers,
                p.speedup,
                p.efficiency * 100.0
            )?;
        }
        writeln!(out)?;
    }

    match (summary.average_best_speedup, summary.assessment) {
        (Some(avg), Some(assessment)) => {
            writeln!(out, "Average best speedup: {avg:.2}x")?;
            writeln!(out, "Assessment: {assessment}")?;
        }
        _ => writeln!(out, "No distributed results to assess.")?,
    }

    if !bundle.failures.is_empty() {
        writeln!(out)?;
        writeln!(out, "Skipped configurations")?;
        writeln!(out, "----------------------")?;
        for f in &bundle.failures {
            let stage = f.stage.map_or_else(|| "-".to_string(), |s| s.to_string());
            writeln!(out, "  N={} P={} [{}]: {}", f.size, f.workers, stage, f.message)?;
        }
    }

    Ok(())
}

pub fn fmt_cv(cv: Option<f64>) -> String {
    cv.map_or_else(|| "-".into(), |cv| format!("{cv:.3}"))
}

pub fn fmt_verified(passed: Option<bool>) -> &'static str {
    match passed {
        Some(true) => "yes",
        Some(false) => "FAILED",
        None => "-",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowcast_core::analysis::analyze;
    use rowcast_core::{AggregateStat, BenchmarkConfig, ConfigFailure, EngineKind, Stage};

    fn stat(engine: EngineKind, size: usize, workers: usize, mean_secs: f64) -> AggregateStat {
        AggregateStat {
            engine,
            size,
            workers,
            runs: 3,
            mean_secs,
            std_dev_secs: mean_secs / 10.0,
            min_secs: mean_secs,
            max_secs: mean_secs,
            verification: None,
        }
    }

    fn bundle() -> ResultBundle {
        ResultBundle {
            config: BenchmarkConfig::new(vec![100], vec![1, 4], 3),
            element: "f64".into(),
            serial: vec![stat(EngineKind::Serial, 100, 1, 1.0)],
            distributed: vec![
                stat(EngineKind::Distributed, 100, 1, 1.1),
                stat(EngineKind::Distributed, 100, 4, 0.4),
            ],
            records: Vec::new(),
            failures: vec![ConfigFailure {
                size: 100,
                workers: 8,
                stage: Some(Stage::Gather),
                message: "timed out".into(),
            }],
        }
    }

    #[test]
    fn test_report_sections() {
        let bundle = bundle();
        let report = render_report(&bundle, &analyze(&bundle));
        assert!(report.contains("Serial baseline"));
        assert!(report.contains("Scalability at N=100"));
        assert!(report.contains("2.50x with 4 workers"));
        assert!(report.contains("Assessment: good parallel performance"));
        assert!(report.contains("N=100 P=8 [gather]: timed out"));
    }

    #[test]
    fn test_report_without_distributed_results() {
        let mut bundle = bundle();
        bundle.distributed.clear();
        let report = render_report(&bundle, &analyze(&bundle));
        assert!(report.contains("No distributed results to assess."));
    }

    #[test]
    fn test_formatters() {
        assert_eq!(fmt_cv(None), "-");
        assert_eq!(fmt_cv(Some(0.05)), "0.050");
        assert_eq!(fmt_verified(Some(false)), "FAILED");
    }
}
