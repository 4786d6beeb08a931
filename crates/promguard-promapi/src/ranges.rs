use crate::response::RangeSeries;
use std::collections::BTreeMap;
use std::time::Duration;

/// A contiguous run of samples: first and last sample timestamp in unix
/// seconds. A run's wall-clock life is `(end - start) + step`, so a
/// single-sample run still counts for one scrape period.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn life(&self, step: Duration) -> Duration {
        Duration::from_secs_f64((self.end - self.start).max(0.0) + step.as_secs_f64())
    }
}

/// Contiguous runs assembled from every sample of a matrix result,
/// regardless of labels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SeriesRanges {
    pub ranges: Vec<TimeRange>,
    step_secs: f64,
}

impl SeriesRanges {
    pub fn from_matrix(series: &[RangeSeries], step: Duration) -> Self {
        let timestamps = series.iter().flat_map(|s| s.samples.iter().map(|(ts, _)| *ts));
        Self::from_timestamps(timestamps, step)
    }

    pub fn from_timestamps(timestamps: impl IntoIterator<Item = f64>, step: Duration) -> Self {
        let mut ts: Vec<f64> = timestamps.into_iter().collect();
        ts.sort_by(|a, b| a.total_cmp(b));
        ts.dedup();

        let step_secs = step.as_secs_f64();
        // Consecutive samples are one step apart; anything noticeably
        // larger splits the run.
        let gap = step_secs * 1.5;

        let mut ranges: Vec<TimeRange> = Vec::new();
        for t in ts {
            match ranges.last_mut() {
                Some(last) if t - last.end <= gap => last.end = t,
                _ => ranges.push(TimeRange { start: t, end: t }),
            }
        }
        Self { ranges, step_secs }
    }

    fn step(&self) -> Duration {
        Duration::from_secs_f64(self.step_secs)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The series existed as one uninterrupted run.
    pub fn single_run(&self) -> bool {
        self.ranges.len() == 1
    }

    /// Timestamp of the newest sample.
    pub fn newest(&self) -> Option<f64> {
        self.ranges.last().map(|r| r.end)
    }

    pub fn oldest(&self) -> Option<f64> {
        self.ranges.first().map(|r| r.start)
    }

    /// Fraction of the lookback window covered by samples.
    pub fn coverage(&self, lookback: Duration) -> f64 {
        if lookback.is_zero() {
            return 0.0;
        }
        let covered: f64 = self
            .ranges
            .iter()
            .map(|r| r.life(self.step()).as_secs_f64())
            .sum();
        covered / lookback.as_secs_f64()
    }

    /// Mean life of the contiguous runs.
    pub fn avg_life(&self) -> Duration {
        if self.ranges.is_empty() {
            return Duration::ZERO;
        }
        let total: f64 = self
            .ranges
            .iter()
            .map(|r| r.life(self.step()).as_secs_f64())
            .sum();
        Duration::from_secs_f64(total / self.ranges.len() as f64)
    }

    /// Overall span from first to last sample, inclusive of one step.
    pub fn span(&self) -> Option<TimeRange> {
        match (self.oldest(), self.newest()) {
            (Some(start), Some(end)) => Some(TimeRange { start, end }),
            _ => None,
        }
    }
}

/// Per-value sample runs for one label of a `count(...) by (label)`
/// result. Series not carrying the label are dropped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabelValues {
    pub values: BTreeMap<String, SeriesRanges>,
}

pub fn group_by_label(series: &[RangeSeries], label: &str, step: Duration) -> LabelValues {
    let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for s in series {
        let Some(value) = s.labels.get(label) else {
            continue;
        };
        grouped
            .entry(value.clone())
            .or_default()
            .extend(s.samples.iter().map(|(ts, _)| *ts));
    }
    LabelValues {
        values: grouped
            .into_iter()
            .map(|(value, ts)| (value, SeriesRanges::from_timestamps(ts, step)))
            .collect(),
    }
}

impl LabelValues {
    /// No series carried the label at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// High-churn heuristic: at least three distinct values, every value
    /// covering less than `max_coverage` of the lookback, and the values'
    /// overall spans not overlapping each other.
    pub fn high_churn(&self, lookback: Duration, max_coverage: f64) -> bool {
        if self.values.len() < 3 {
            return false;
        }
        if self
            .values
            .values()
            .any(|r| r.coverage(lookback) >= max_coverage)
        {
            return false;
        }

        let mut spans: Vec<TimeRange> = self
            .values
            .values()
            .filter_map(|r| r.span())
            .collect();
        spans.sort_by(|a, b| a.start.total_cmp(&b.start));
        spans.windows(2).all(|pair| pair[0].end <= pair[1].start)
    }
}
