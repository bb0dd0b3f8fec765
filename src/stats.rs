//! Grouped latency statistics.
//!
//! Records are partitioned by `entries`; each partition reports its size, the
//! mean of `millis`, and the sample standard deviation of `millis`:
//! std = sqrt(sum((x - mean)^2) / (n - 1)).
//! Groups come out in ascending `entries` order.

use crate::record::BenchmarkRecord;
use std::collections::BTreeMap;

/// Sample standard deviation of a group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StdDev {
    Value(f64),
    /// The group has a single member; the N-1 estimator is undefined.
    InsufficientSample,
}

impl StdDev {
    pub fn value(self) -> Option<f64> {
        match self {
            StdDev::Value(v) => Some(v),
            StdDev::InsufficientSample => None,
        }
    }
}

/// Statistics for all records sharing one `entries` value.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStat {
    pub entries: u64,
    pub count: usize,
    pub mean: f64,
    pub std_dev: StdDev,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedStats {
    pub groups: Vec<GroupStat>,
}

impl GroupedStats {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn entries(&self) -> Vec<u64> {
        self.groups.iter().map(|g| g.entries).collect()
    }

    pub fn means(&self) -> Vec<f64> {
        self.groups.iter().map(|g| g.mean).collect()
    }

    pub fn std_devs(&self) -> Vec<StdDev> {
        self.groups.iter().map(|g| g.std_dev).collect()
    }
}

/// Group records by `entries` and compute mean and sample std of `millis`.
pub fn grouped_stats(records: &[BenchmarkRecord]) -> GroupedStats {
    let mut by_entries: BTreeMap<u64, Vec<f64>> = BTreeMap::new();
    for rec in records {
        by_entries.entry(rec.entries).or_default().push(rec.millis);
    }

    let groups = by_entries
        .into_iter()
        .map(|(entries, millis)| {
            let mean = mean(&millis);
            GroupStat {
                entries,
                count: millis.len(),
                mean,
                std_dev: sample_std_dev(&millis, mean),
            }
        })
        .collect();

    GroupedStats { groups }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std_dev(values: &[f64], mean: f64) -> StdDev {
    if values.len() < 2 {
        return StdDev::InsufficientSample;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    StdDev::Value((sum_sq / (values.len() - 1) as f64).sqrt())
}
