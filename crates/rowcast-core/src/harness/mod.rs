//! Benchmark harness.
//!
//! A [`BenchmarkSession`] walks every configured size: it generates the
//! inputs, times the serial engine to get a baseline, then for each worker
//! count verifies the distributed engine once against the serial reference
//! and times it. Every run lands in the session's [`RunLog`], and the
//! collected aggregates come back as a [`ResultBundle`].
//!
//! Sessions hold no global state; two sessions never share anything.

pub mod config;
pub mod run_log;

pub use config::{BenchmarkConfig, FailurePolicy, InputPolicy};
pub use run_log::RunLog;

use std::borrow::Cow;
use std::fmt;
use std::time::Instant;

use rowcast_compute::Element;

use crate::engine::distributed::DistributedEngine;
use crate::engine::serial::{multiply_serial, SerialEngine};
use crate::engine::{EngineError, MultiplyEngine};
use crate::matrix::MatrixPair;
use crate::types::{
    ConfigFailure, EngineKind, Matrix, ResultBundle, RunRecord, VerificationOutcome,
};
use crate::verify::compare;

/// Where a session is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    Idle,
    Generating { size: usize },
    TimingSerial { size: usize },
    TimingDistributed { size: usize, workers: usize },
    Aggregating,
    Done,
    Failed,
}

impl fmt::Display for HarnessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarnessState::Idle => write!(f, "idle"),
            HarnessState::Generating { size } => write!(f, "generating N={size}"),
            HarnessState::TimingSerial { size } => write!(f, "timing serial N={size}"),
            HarnessState::TimingDistributed { size, workers } => {
                write!(f, "timing distributed N={size} P={workers}")
            }
            HarnessState::Aggregating => write!(f, "aggregating"),
            HarnessState::Done => write!(f, "done"),
            HarnessState::Failed => write!(f, "failed"),
        }
    }
}

/// Builds the distributed engine for a worker count.
pub type EngineFactory<T> = Box<dyn Fn(usize) -> Box<dyn MultiplyEngine<T>> + Send + Sync>;

/// One benchmark session over a fixed configuration.
pub struct BenchmarkSession<T: Element> {
    config: BenchmarkConfig,
    serial: Box<dyn MultiplyEngine<T>>,
    distributed: EngineFactory<T>,
    state: HarnessState,
    history: Vec<HarnessState>,
    log: RunLog,
    failures: Vec<ConfigFailure>,
}

impl<T: Element> BenchmarkSession<T> {
    /// Session using [`SerialEngine`] and default [`DistributedEngine`]s.
    pub fn new(config: BenchmarkConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let partition = config.partition;
        Ok(Self {
            config,
            serial: Box::new(SerialEngine::new()),
            distributed: Box::new(move |workers| {
                Box::new(DistributedEngine::<T>::new(workers).with_policy(partition))
                    as Box<dyn MultiplyEngine<T>>
            }),
            state: HarnessState::Idle,
            history: vec![HarnessState::Idle],
            log: RunLog::new(),
            failures: Vec::new(),
        })
    }

    /// Replace the baseline engine.
    pub fn with_serial_engine(mut self, engine: Box<dyn MultiplyEngine<T>>) -> Self {
        self.serial = engine;
        self
    }

    /// Replace how distributed engines are built for each worker count.
    pub fn with_distributed_engines(mut self, factory: EngineFactory<T>) -> Self {
        self.distributed = factory;
        self
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn state(&self) -> HarnessState {
        self.state
    }

    /// Every state visited so far, starting with [`HarnessState::Idle`].
    pub fn history(&self) -> &[HarnessState] {
        &self.history
    }

    pub fn run_log(&self) -> &RunLog {
        &self.log
    }

    /// Run every configuration and collect the results.
    ///
    /// A session runs once; calling this again is an error.
    pub fn run(&mut self) -> Result<ResultBundle, EngineError> {
        if self.state != HarnessState::Idle {
            return Err(EngineError::InvalidConfiguration(format!(
                "session already ran (state: {})",
                self.state
            )));
        }

        let sizes = self.config.sizes.clone();
        for n in sizes {
            self.run_size(n)?;
        }

        self.transition(HarnessState::Aggregating);
        let stats = self.log.stats();
        let (serial, distributed): (Vec<_>, Vec<_>) = stats
            .into_iter()
            .partition(|s| s.engine == EngineKind::Serial);
        let bundle = ResultBundle {
            config: self.config.clone(),
            element: T::NAME.to_string(),
            serial,
            distributed,
            records: self.log.records().to_vec(),
            failures: self.failures.clone(),
        };
        self.transition(HarnessState::Done);
        log::info!(
            "benchmark complete: {} records, {} failure(s)",
            bundle.records.len(),
            bundle.failures.len()
        );
        Ok(bundle)
    }

    fn run_size(&mut self, n: usize) -> Result<(), EngineError> {
        self.transition(HarnessState::Generating { size: n });
        let fixed = MatrixPair::<T>::seeded(n, self.config.seed);
        let reference = if self.config.verify {
            match multiply_serial(&fixed.a, &fixed.b) {
                Ok(c) => Some(c),
                Err(e) => return self.fail(n, 1, e),
            }
        } else {
            None
        };

        self.transition(HarnessState::TimingSerial { size: n });
        log::info!("N={n}: timing serial baseline");
        let serial_records =
            match self.time_engine(self.serial.as_ref(), EngineKind::Serial, &fixed) {
                Ok(records) => records,
                Err(e) => return self.fail(n, 1, e),
            };
        self.append_all(serial_records);

        let worker_counts = self.config.worker_counts.clone();
        for workers in worker_counts {
            if workers > n && !self.config.partition.allow_idle_workers {
                log::warn!("N={n} P={workers}: more workers than rows, pair skipped");
                self.failures.push(ConfigFailure {
                    size: n,
                    workers,
                    stage: None,
                    message: format!("{workers} workers exceed {n} rows"),
                });
                continue;
            }

            self.transition(HarnessState::TimingDistributed { size: n, workers });
            log::info!("N={n} P={workers}: timing distributed engine");
            let engine = (self.distributed)(workers);

            let outcome = match &reference {
                Some(reference) => match self.check(engine.as_ref(), &fixed, reference) {
                    Ok(outcome) => Some(outcome),
                    Err(e) => {
                        self.fail(n, workers, e)?;
                        continue;
                    }
                },
                None => None,
            };

            let timed = self.time_engine(engine.as_ref(), EngineKind::Distributed, &fixed);
            let records = match timed {
                Ok(records) => records,
                Err(e) => {
                    self.fail(n, workers, e)?;
                    continue;
                }
            };
            if let (Some(outcome), Some(first)) = (outcome, records.first()) {
                self.log.set_verification(first.key(), outcome);
            }
            self.append_all(records);
        }
        Ok(())
    }

    /// Verify one distributed result. A mismatch is recorded, not raised.
    fn check(
        &self,
        engine: &dyn MultiplyEngine<T>,
        pair: &MatrixPair<T>,
        reference: &Matrix<T>,
    ) -> Result<VerificationOutcome, EngineError> {
        let tolerance = self.config.tolerance.unwrap_or(T::DEFAULT_TOLERANCE);
        let c = engine.multiply(&pair.a, &pair.b)?;
        let outcome = compare(&c, reference)?.outcome(tolerance);
        if !outcome.passed {
            log::warn!(
                "N={} P={}: verification failed, max error {} exceeds {:.1e}",
                pair.size(),
                engine.worker_count(),
                outcome
                    .max_abs_error
                    .map_or_else(|| "non-finite".to_string(), |e| format!("{e:.3e}")),
                tolerance
            );
        }
        Ok(outcome)
    }

    /// Warm up, then time `runs` multiplies. Returns the records without
    /// appending them, so a failed configuration leaves no partial aggregate.
    fn time_engine(
        &self,
        engine: &dyn MultiplyEngine<T>,
        kind: EngineKind,
        fixed: &MatrixPair<T>,
    ) -> Result<Vec<RunRecord>, EngineError> {
        let n = fixed.size();
        for _ in 0..self.config.warmup_runs {
            engine.multiply(&fixed.a, &fixed.b)?;
        }

        let mut records = Vec::with_capacity(self.config.runs);
        for iteration in 0..self.config.runs {
            let pair = self.inputs_for(fixed, iteration);
            let start = Instant::now();
            engine.multiply(&pair.a, &pair.b)?;
            let elapsed_secs = start.elapsed().as_secs_f64();
            log::debug!(
                "{} N={} P={} run {}: {:.6}s",
                kind,
                n,
                engine.worker_count(),
                iteration,
                elapsed_secs
            );
            records.push(RunRecord {
                engine: kind,
                size: n,
                workers: engine.worker_count(),
                elapsed_secs,
                iteration,
            });
        }
        Ok(records)
    }

    fn inputs_for<'a>(&self, fixed: &'a MatrixPair<T>, iteration: usize) -> Cow<'a, MatrixPair<T>> {
        match self.config.inputs {
            InputPolicy::Fixed => Cow::Borrowed(fixed),
            InputPolicy::PerRun => Cow::Owned(MatrixPair::seeded(
                fixed.size(),
                self.config.seed.wrapping_add(iteration as u64),
            )),
        }
    }

    fn append_all(&mut self, records: Vec<RunRecord>) {
        for record in records {
            self.log.append(record);
        }
    }

    /// Apply the failure policy to a failed configuration.
    fn fail(&mut self, size: usize, workers: usize, error: EngineError) -> Result<(), EngineError> {
        match self.config.on_failure {
            FailurePolicy::Abort => {
                self.transition(HarnessState::Failed);
                Err(EngineError::BenchmarkAborted {
                    size,
                    workers,
                    source: Box::new(error),
                })
            }
            FailurePolicy::Skip => {
                log::warn!("N={size} P={workers}: skipped after failure: {error}");
                self.failures.push(ConfigFailure {
                    size,
                    workers,
                    stage: error.stage(),
                    message: error.to_string(),
                });
                Ok(())
            }
        }
    }

    fn transition(&mut self, next: HarnessState) {
        log::debug!("harness: {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }
}
