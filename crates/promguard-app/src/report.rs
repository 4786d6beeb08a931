use anyhow::Context;
use camino::Utf8Path;
use promguard_types::{
    LintData, PromguardReport, ReportEnvelope, ToolMeta, Verdict, SCHEMA_REPORT_V1,
};
use time::OffsetDateTime;

fn envelope(verdict: Verdict, data: LintData) -> PromguardReport {
    let now = OffsetDateTime::now_utc();
    ReportEnvelope {
        schema: SCHEMA_REPORT_V1.to_string(),
        tool: ToolMeta {
            name: "promguard".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        started_at: now,
        finished_at: now,
        verdict,
        problems: Vec::new(),
        data,
    }
}

/// A passing report with no problems, for runs that found nothing to lint.
pub fn empty_report(profile: &str) -> PromguardReport {
    envelope(
        Verdict::Pass,
        LintData {
            profile: profile.to_string(),
            ..LintData::default()
        },
    )
}

/// A failing report recording that the tool itself could not run.
pub fn runtime_error_report(error: &str) -> PromguardReport {
    envelope(
        Verdict::Fail,
        LintData {
            profile: "unknown".to_string(),
            truncated_reason: Some(format!("runtime error: {error}")),
            ..LintData::default()
        },
    )
}

/// Map verdict to exit code: 0 = pass/warn, 2 = fail.
pub fn report_exit_code(report: &PromguardReport) -> i32 {
    match report.verdict {
        Verdict::Pass | Verdict::Warn => 0,
        Verdict::Fail => 2,
    }
}

pub fn serialize_report(report: &PromguardReport) -> anyhow::Result<Vec<u8>> {
    serde_json::to_vec_pretty(report).context("serialize report to JSON")
}

/// Write a report to a JSON file (creates parent directories as needed).
pub fn write_report(path: &Utf8Path, report: &PromguardReport) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("create directory: {parent}"))?;
    }
    let data = serialize_report(report)?;
    std::fs::write(path, data).with_context(|| format!("write report: {path}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_verdict() {
        assert_eq!(report_exit_code(&empty_report("strict")), 0);
        assert_eq!(report_exit_code(&runtime_error_report("boom")), 2);
    }

    #[test]
    fn write_and_reparse_report() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let root = camino::Utf8Path::from_path(tmp.path()).expect("utf8 path");
        let path = root.join("artifacts/report.json");

        let report = empty_report("strict");
        write_report(&path, &report).expect("write report");

        let text = std::fs::read_to_string(&path).expect("read report");
        let loaded: PromguardReport = serde_json::from_str(&text).expect("parse report");
        assert_eq!(loaded.schema, SCHEMA_REPORT_V1);
        assert_eq!(loaded.verdict, Verdict::Pass);
    }
}
