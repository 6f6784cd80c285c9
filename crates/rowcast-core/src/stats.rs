//! Summary statistics over timing samples.

use crate::types::{AggregateStat, StatKey};

/// Arithmetic mean; `0.0` for no samples.
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Population standard deviation (divides by `n`, not `n - 1`).
pub fn std_dev(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let m = mean(samples);
    let var = samples.iter().map(|x| (x - m).powi(2)).sum::<f64>() / samples.len() as f64;
    var.sqrt()
}

/// Standard deviation over mean, `None` when the mean is not positive.
pub fn coefficient_of_variation(samples: &[f64]) -> Option<f64> {
    let m = mean(samples);
    (m > 0.0).then(|| std_dev(samples) / m)
}

impl AggregateStat {
    /// Aggregate the elapsed times of every run under `key`.
    pub fn from_samples(key: StatKey, samples: &[f64]) -> Self {
        let min_secs = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max_secs = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            engine: key.engine,
            size: key.size,
            workers: key.workers,
            runs: samples.len(),
            mean_secs: mean(samples),
            std_dev_secs: std_dev(samples),
            min_secs: if samples.is_empty() { 0.0 } else { min_secs },
            max_secs: if samples.is_empty() { 0.0 } else { max_secs },
            verification: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EngineKind;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_population_std() {
        let samples = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&samples), 5.0);
        assert_relative_eq!(std_dev(&samples), 2.0);
    }

    #[test]
    fn test_single_sample_has_zero_spread() {
        assert_eq!(std_dev(&[3.5]), 0.0);
        assert_eq!(coefficient_of_variation(&[3.5]), Some(0.0));
    }

    #[test]
    fn test_empty_samples() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_dev(&[]), 0.0);
        assert_eq!(coefficient_of_variation(&[]), None);
    }

    #[test]
    fn test_aggregate_from_samples() {
        let key = StatKey {
            engine: EngineKind::Distributed,
            size: 50,
            workers: 2,
        };
        let stat = AggregateStat::from_samples(key, &[0.1, 0.3, 0.2]);
        assert_eq!(stat.key(), key);
        assert_eq!(stat.runs, 3);
        assert_relative_eq!(stat.mean_secs, 0.2, epsilon = 1e-15);
        assert_eq!(stat.min_secs, 0.1);
        assert_eq!(stat.max_secs, 0.3);
        assert!(stat.verification.is_none());
    }
}
