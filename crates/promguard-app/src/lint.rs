use anyhow::Context;
use camino::Utf8Path;
use promguard_checks::{CheckContext, FailOn, Runner, ServerHandle};
use promguard_discovery::{discover_git, discover_glob, Entry};
use promguard_promapi::Prometheus;
use promguard_settings::{Overrides, ResolvedConfig};
use promguard_types::{
    LintData, ProblemRecord, PromguardReport, ReportEnvelope, Severity, ToolMeta, Verdict,
    SCHEMA_REPORT_V1,
};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// Input for the lint use case.
#[derive(Clone, Debug)]
pub struct LintInput<'a> {
    /// Directory the rule-file globs are resolved against.
    pub root: &'a Utf8Path,
    /// Config file contents (empty string if not found).
    pub config_text: &'a str,
    /// CLI overrides.
    pub overrides: Overrides,
    pub scope: LintScope,
    /// Optional wall-clock budget for the whole run.
    pub deadline: Option<Duration>,
}

/// Which batch of entries to lint.
#[derive(Clone, Debug)]
pub enum LintScope {
    /// Everything the include globs match.
    Glob,
    /// Overlay change states from `git diff <base>..<head>`.
    Git { base: String, head: String },
}

#[derive(Clone, Debug)]
pub struct LintOutput {
    pub report: PromguardReport,
    pub resolved_config: ResolvedConfig,
}

/// Run the lint use case: parse config, discover rule files, run enabled
/// checks against every configured Prometheus server, produce a report.
pub fn run_lint(input: LintInput<'_>) -> anyhow::Result<LintOutput> {
    let started_at = OffsetDateTime::now_utc();

    let cfg = if input.config_text.trim().is_empty() {
        promguard_settings::PromguardConfigV1::default()
    } else {
        promguard_settings::parse_config_toml(input.config_text).context("parse config")?
    };
    let resolved =
        promguard_settings::resolve_config(cfg, input.overrides.clone()).context("resolve config")?;

    let entries = match &input.scope {
        LintScope::Glob => discover_glob(input.root, &resolved.include, &resolved.exclude)
            .context("discover rule files")?,
        LintScope::Git { base, head } => discover_git(
            input.root,
            &resolved.include,
            &resolved.exclude,
            base,
            head,
        )
        .context("discover changed rule files")?,
    };
    tracing::debug!(entries = entries.len(), "discovered rule entries");

    let mut servers = Vec::new();
    for s in &resolved.servers {
        let prom = Arc::new(
            Prometheus::new(&s.name, &s.uri)
                .with_timeout(s.timeout)
                .with_uptime_metric(&s.uptime_metric),
        );
        servers.push(
            ServerHandle::new(prom, s.lookback, &s.include, &s.exclude)
                .with_context(|| format!("configure prometheus {}", s.name))?,
        );
    }

    let mut ctx = CheckContext::new();
    if let Some(deadline) = input.deadline {
        ctx = ctx.with_deadline(deadline);
    }

    let runner = Runner::new(resolved.effective.clone(), servers);
    let records = runner.run(&ctx, &entries);

    let report = assemble_report(started_at, &resolved, &entries, records);
    Ok(LintOutput {
        report,
        resolved_config: resolved,
    })
}

fn assemble_report(
    started_at: OffsetDateTime,
    resolved: &ResolvedConfig,
    entries: &[Entry],
    records: Vec<ProblemRecord>,
) -> PromguardReport {
    let total = records.len() as u32;

    let mut emitted = records;
    let mut truncated_reason = None;
    if emitted.len() > resolved.effective.max_problems {
        emitted.truncate(resolved.effective.max_problems);
        truncated_reason = Some(format!(
            "problems truncated to max_problems={}",
            resolved.effective.max_problems
        ));
    }

    let verdict = compute_verdict(&emitted, resolved.effective.fail_on);
    let rules_checked = entries.iter().filter(|e| e.rule().is_some()).count() as u32;

    ReportEnvelope {
        schema: SCHEMA_REPORT_V1.to_string(),
        tool: ToolMeta {
            name: "promguard".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        started_at,
        finished_at: OffsetDateTime::now_utc(),
        verdict,
        data: LintData {
            profile: resolved.effective.profile.clone(),
            entries_scanned: entries.len() as u32,
            rules_checked,
            problems_total: total,
            problems_emitted: emitted.len() as u32,
            truncated_reason,
        },
        problems: emitted,
    }
}

fn compute_verdict(records: &[ProblemRecord], fail_on: FailOn) -> Verdict {
    let worst = records
        .iter()
        .map(|r| r.problem.severity)
        .max()
        .unwrap_or(Severity::Information);

    match worst {
        Severity::Fatal | Severity::Bug => Verdict::Fail,
        Severity::Warning => match fail_on {
            FailOn::Warning => Verdict::Fail,
            FailOn::Bug => Verdict::Warn,
        },
        Severity::Information => Verdict::Pass,
    }
}
