//! Stable DTOs and IDs used across the promguard workspace.
//!
//! This crate is intentionally boring:
//! - data types for emitted problems and the report envelope
//! - stable check-name IDs
//! - canonical rule-file path handling
//! - duration parsing/formatting shared by diagnostics and config

#![forbid(unsafe_code)]

pub mod duration;
pub mod ids;
pub mod path;
pub mod problem;

pub use duration::{format_duration, format_since, parse_duration, DurationParseError};
pub use path::RulePath;
pub use problem::{
    Anchor, LintData, Problem, ProblemRecord, PromguardReport, ReportEnvelope, Severity, ToolMeta,
    Verdict, SCHEMA_REPORT_V1,
};
