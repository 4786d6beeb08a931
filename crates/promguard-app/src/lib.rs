//! Application layer for promguard.
//!
//! Wires config, discovery, the check runner and report assembly into
//! the `lint` use case the CLI exposes. IO stays here; the CLI remains
//! thin and the checks stay pure.

#![forbid(unsafe_code)]

mod lint;
mod render;
mod report;

pub use lint::{run_lint, LintInput, LintOutput, LintScope};
pub use render::{render_github_annotations, render_text};
pub use report::{
    empty_report, report_exit_code, runtime_error_report, serialize_report, write_report,
};
