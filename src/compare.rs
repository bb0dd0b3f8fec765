use crate::record::BenchmarkRecord;

pub const BATCHED_LABEL: &str = "BatchAPI";
pub const STANDARD_LABEL: &str = "Standard";

/// Aligned `(entries, millis)` points for one side of a comparison.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub entries: Vec<u64>,
    pub millis: Vec<f64>,
}

impl Series {
    fn push(&mut self, rec: &BenchmarkRecord) {
        self.entries.push(rec.entries);
        self.millis.push(rec.millis);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
        self.entries.iter().copied().zip(self.millis.iter().copied())
    }
}

/// Batched vs. standard latency for one operation kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comparison {
    pub method: String,
    pub batched: Series,
    pub standard: Series,
}

/// Split the records of `method` by whether the batched code path was used.
///
/// Points keep record order; records of other methods, or without a
/// `batchapi` flag, land in neither series.
pub fn compare_method(records: &[BenchmarkRecord], method: &str) -> Comparison {
    let mut cmp = Comparison {
        method: method.to_string(),
        ..Default::default()
    };
    for rec in records.iter().filter(|r| r.is_method(method)) {
        match rec.batchapi {
            Some(true) => cmp.batched.push(rec),
            Some(false) => cmp.standard.push(rec),
            None => {}
        }
    }
    tracing::debug!(
        method,
        batched = cmp.batched.len(),
        standard = cmp.standard.len(),
        "split comparison series"
    );
    cmp
}
