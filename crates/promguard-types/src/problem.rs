use crate::RulePath;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Stable schema identifier for promguard reports.
pub const SCHEMA_REPORT_V1: &str = "promguard.report.v1";

/// Problem severity, from advisory to run-aborting.
///
/// `Fatal` stops the run; `Bug` and `Warning` are reportable findings;
/// `Information` is advisory only.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Information,
    Warning,
    Bug,
    Fatal,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Information => "information",
            Severity::Warning => "warning",
            Severity::Bug => "bug",
            Severity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Where a problem attaches relative to its lines when rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Before,
    After,
}

/// A single diagnostic produced by a check for one rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Problem {
    /// Canonical text of the offending fragment (selector or rule header).
    pub fragment: String,
    /// Source lines the problem refers to, sorted and unique.
    pub lines: Vec<usize>,
    pub anchor: Anchor,
    /// Name of the check that produced this problem.
    pub reporter: String,
    pub text: String,
    /// Optional multi-line explanation rendered below the text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub severity: Severity,
}

impl Problem {
    /// First referenced line, used for report ordering.
    pub fn first_line(&self) -> usize {
        self.lines.first().copied().unwrap_or(0)
    }
}

/// A problem paired with the reported path of the rule file it belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProblemRecord {
    pub path: RulePath,
    #[serde(flatten)]
    pub problem: Problem,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ToolMeta {
    pub name: String,
    pub version: String,
}

/// Promguard-specific summary payload for the report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct LintData {
    pub profile: String,

    pub entries_scanned: u32,
    pub rules_checked: u32,

    pub problems_total: u32,
    pub problems_emitted: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated_reason: Option<String>,
}

/// The report envelope written after every lint run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportEnvelope<TData = LintData> {
    /// Versioned schema identifier for the envelope shape.
    pub schema: String,
    pub tool: ToolMeta,
    #[schemars(with = "String")]
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[schemars(with = "String")]
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub verdict: Verdict,
    pub problems: Vec<ProblemRecord>,
    pub data: TData,
}

pub type PromguardReport = ReportEnvelope<LintData>;
