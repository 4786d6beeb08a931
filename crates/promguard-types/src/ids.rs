//! Stable identifiers for checks.
//!
//! A check name is a slash-separated namespace; it appears verbatim as the
//! `reporter` field of every problem the check emits and in disable
//! comments (`# promguard disable promql/series(...)`).

pub const CHECK_SERIES: &str = "promql/series";
pub const CHECK_RULE_DEPENDENCY: &str = "rule/dependency";

/// All checks known to the runner, in registration order.
pub const ALL_CHECKS: &[&str] = &[CHECK_SERIES, CHECK_RULE_DEPENDENCY];
