//! Append-only log of timed runs with per-configuration aggregates.

use std::collections::HashMap;

use crate::types::{AggregateStat, RunRecord, StatKey, VerificationOutcome};

/// Records in arrival order plus one aggregate per [`StatKey`], in the order
/// each key was first seen. The aggregate for a key is recomputed whenever a
/// record for it is appended.
#[derive(Debug, Default)]
pub struct RunLog {
    records: Vec<RunRecord>,
    keys: Vec<StatKey>,
    samples: HashMap<StatKey, Vec<f64>>,
    verifications: HashMap<StatKey, VerificationOutcome>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return the updated aggregate for its key.
    pub fn append(&mut self, record: RunRecord) -> AggregateStat {
        let key = record.key();
        let samples = self.samples.entry(key).or_insert_with(|| {
            self.keys.push(key);
            Vec::new()
        });
        samples.push(record.elapsed_secs);
        self.records.push(record);
        self.stat(key).unwrap_or_else(|| AggregateStat::from_samples(key, &[]))
    }

    /// Attach a verification outcome to `key`.
    pub fn set_verification(&mut self, key: StatKey, outcome: VerificationOutcome) {
        self.verifications.insert(key, outcome);
    }

    /// Aggregate for `key`, if any record has been appended for it.
    pub fn stat(&self, key: StatKey) -> Option<AggregateStat> {
        let samples = self.samples.get(&key)?;
        let mut stat = AggregateStat::from_samples(key, samples);
        stat.verification = self.verifications.get(&key).cloned();
        Some(stat)
    }

    /// Every aggregate, in first-seen order.
    pub fn stats(&self) -> Vec<AggregateStat> {
        self.keys.iter().filter_map(|&k| self.stat(k)).collect()
    }

    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
