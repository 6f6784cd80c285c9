//! Speedup and efficiency analysis of a finished benchmark.
//!
//! Speedup is `serial mean / distributed mean` for the same size; efficiency
//! is speedup divided by the worker count. The analysis only reads a
//! [`ResultBundle`], so it works equally on a fresh session or on results
//! loaded from disk.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ResultBundle;

/// Speedup above which scaling is rated [`Assessment::Good`].
pub const GOOD_SPEEDUP: f64 = 2.0;
/// Speedup above which scaling is rated [`Assessment::Moderate`].
pub const MODERATE_SPEEDUP: f64 = 1.5;

/// One distributed configuration compared with its serial baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPoint {
    pub size: usize,
    pub workers: usize,
    pub serial_mean_secs: f64,
    pub distributed_mean_secs: f64,
    pub speedup: f64,
    pub efficiency: f64,
    pub verification_passed: Option<bool>,
}

/// Fastest configuration for one size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestSpeedup {
    pub size: usize,
    pub workers: usize,
    pub speedup: f64,
}

/// Overall verdict on how well the distributed engine scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    Good,
    Moderate,
    Poor,
}

impl Assessment {
    pub fn from_speedup(speedup: f64) -> Self {
        if speedup > GOOD_SPEEDUP {
            Assessment::Good
        } else if speedup > MODERATE_SPEEDUP {
            Assessment::Moderate
        } else {
            Assessment::Poor
        }
    }
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assessment::Good => write!(f, "good parallel performance"),
            Assessment::Moderate => write!(f, "moderate parallel performance"),
            Assessment::Poor => write!(f, "limited parallel performance"),
        }
    }
}

/// Everything derived from one result bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    /// Points in bundle order.
    pub points: Vec<ScalingPoint>,
    /// Best point per size, in size order of first appearance.
    pub best: Vec<BestSpeedup>,
    /// Mean of the per-size best speedups; `None` with no points.
    pub average_best_speedup: Option<f64>,
    pub assessment: Option<Assessment>,
}

impl PerformanceSummary {
    /// Points at the largest size, ordered by worker count.
    pub fn scalability(&self) -> Vec<&ScalingPoint> {
        let Some(largest) = self.points.iter().map(|p| p.size).max() else {
            return Vec::new();
        };
        let mut points: Vec<&ScalingPoint> =
            self.points.iter().filter(|p| p.size == largest).collect();
        points.sort_by_key(|p| p.workers);
        points
    }
}

/// Derive speedups, efficiencies and the overall assessment.
///
/// Distributed results without a serial baseline of the same size, or with a
/// non-positive mean time, are left out.
pub fn analyze(bundle: &ResultBundle) -> PerformanceSummary {
    let points: Vec<ScalingPoint> = bundle
        .distributed
        .iter()
        .filter_map(|d| {
            let serial = bundle.serial_for(d.size)?;
            if d.mean_secs <= 0.0 || d.workers == 0 {
                return None;
            }
            let speedup = serial.mean_secs / d.mean_secs;
            Some(ScalingPoint {
                size: d.size,
                workers: d.workers,
                serial_mean_secs: serial.mean_secs,
                distributed_mean_secs: d.mean_secs,
                speedup,
                efficiency: speedup / d.workers as f64,
                verification_passed: d.verification_passed(),
            })
        })
        .collect();

    let mut best: Vec<BestSpeedup> = Vec::new();
    for p in &points {
        match best.iter_mut().find(|b| b.size == p.size) {
            Some(b) if p.speedup > b.speedup => {
                b.workers = p.workers;
                b.speedup = p.speedup;
            }
            Some(_) => {}
            None => best.push(BestSpeedup {
                size: p.size,
                workers: p.workers,
                speedup: p.speedup,
            }),
        }
    }

    let average_best_speedup = (!best.is_empty())
        .then(|| best.iter().map(|b| b.speedup).sum::<f64>() / best.len() as f64);

    PerformanceSummary {
        points,
        best,
        average_best_speedup,
        assessment: average_best_speedup.map(Assessment::from_speedup),
    }
}
