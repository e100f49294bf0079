use crate::access::value::CompareOp;
use std::fmt;

/// Fixed-width histogram over an integer column.
///
/// The inclusive range `min..=max` is cut into equal-width buckets; values
/// inside a bucket are assumed uniformly spread. Space is constant in the
/// number of values added.
#[derive(Debug, Clone)]
pub struct IntHistogram {
    min: i32,
    max: i32,
    width: f64,
    counts: Vec<u64>,
    total: u64,
}

impl IntHistogram {
    /// Never uses more buckets than there are integers in the range.
    pub fn new(buckets: usize, min: i32, max: i32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let range = (i64::from(max) - i64::from(min) + 1) as u64;
        let buckets = (buckets.max(1) as u64).min(range) as usize;

        Self {
            min,
            max,
            width: range as f64 / buckets as f64,
            counts: vec![0; buckets],
            total: 0,
        }
    }

    /// Records a value. Values outside the range count toward the nearest
    /// edge bucket.
    pub fn add_value(&mut self, v: i32) {
        let idx = self.bucket_index(i64::from(v.clamp(self.min, self.max)));
        self.counts[idx] += 1;
        self.total += 1;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn num_buckets(&self) -> usize {
        self.counts.len()
    }

    fn bucket_index(&self, v: i64) -> usize {
        let offset = (v - i64::from(self.min)) as f64;
        ((offset / self.width) as usize).min(self.counts.len() - 1)
    }

    /// Estimated number of recorded values strictly below `v`.
    fn count_below(&self, v: i64) -> f64 {
        if v <= i64::from(self.min) {
            return 0.0;
        }
        if v > i64::from(self.max) {
            return self.total as f64;
        }

        let idx = self.bucket_index(v);
        let left = i64::from(self.min) as f64 + idx as f64 * self.width;
        let fraction = ((v as f64 - left) / self.width).clamp(0.0, 1.0);
        let full: u64 = self.counts[..idx].iter().sum();
        full as f64 + fraction * self.counts[idx] as f64
    }

    /// Estimated fraction of recorded values `x` for which `x op v` holds.
    pub fn estimate_selectivity(&self, op: CompareOp, v: i32) -> f64 {
        if self.total == 0 {
            return 0.0;
        }

        let total = self.total as f64;
        let v = i64::from(v);
        let below = self.count_below(v) / total;
        let at_or_below = self.count_below(v + 1) / total;

        let estimate = match op {
            CompareOp::LessThan => below,
            CompareOp::LessThanOrEq => at_or_below,
            CompareOp::GreaterThan => 1.0 - at_or_below,
            CompareOp::GreaterThanOrEq => 1.0 - below,
            CompareOp::Equals | CompareOp::Like => at_or_below - below,
            CompareOp::NotEquals => 1.0 - (at_or_below - below),
        };
        estimate.clamp(0.0, 1.0)
    }

    /// Expected selectivity of an equality predicate whose operand is drawn
    /// from the recorded values. 1.0 for an empty histogram.
    pub fn avg_selectivity(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        let total = self.total as f64;
        self.counts
            .iter()
            .map(|&c| {
                let share = c as f64 / total;
                share * share / self.width
            })
            .sum()
    }
}

impl fmt::Display for IntHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IntHistogram[{}..={}, {} buckets, {} values]:",
            self.min,
            self.max,
            self.counts.len(),
            self.total
        )?;
        for (i, count) in self.counts.iter().enumerate() {
            let lo = f64::from(self.min) + i as f64 * self.width;
            write!(f, " [{:.0}: {}]", lo.ceil(), count)?;
        }
        Ok(())
    }
}
