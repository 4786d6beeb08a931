//! Prometheus HTTP API client for promguard.
//!
//! Wraps `POST /api/v1/query` and `POST /api/v1/query_range` with typed
//! errors, timeout retry and a per-run result cache, plus the sample
//! time-range analysis (coverage, gaps, life spans, label churn) the
//! series check builds its classifications on.

#![forbid(unsafe_code)]

mod client;
mod error;
mod ranges;
mod response;

pub use client::Prometheus;
pub use error::PromError;
pub use ranges::{group_by_label, LabelValues, SeriesRanges, TimeRange};
pub use response::{InstantSample, RangeSeries};
