use promguard_types::{PromguardReport, Severity, Verdict};

/// Render a report as console text: one line per problem, details
/// indented underneath.
pub fn render_text(report: &PromguardReport) -> String {
    let mut out = String::new();
    for record in &report.problems {
        let p = &record.problem;
        let line = p.first_line();
        out.push_str(&format!(
            "{}:{} {}: {} ({})\n",
            record.path, line, p.severity, p.text, p.reporter
        ));
        if let Some(details) = &p.details {
            for detail_line in details.lines() {
                out.push_str(&format!("  {detail_line}\n"));
            }
        }
    }

    let verdict = match report.verdict {
        Verdict::Pass => "pass",
        Verdict::Warn => "warn",
        Verdict::Fail => "fail",
    };
    out.push_str(&format!(
        "{} problem(s) found, verdict: {}\n",
        report.problems.len(),
        verdict
    ));
    out
}

/// Render problems as GitHub Actions workflow command annotations.
///
/// Format: `::{level} file={path},line={line}::{message}`
pub fn render_github_annotations(report: &PromguardReport) -> Vec<String> {
    let mut out = Vec::new();
    for record in &report.problems {
        let p = &record.problem;
        let level = match p.severity {
            Severity::Fatal | Severity::Bug => "error",
            Severity::Warning => "warning",
            Severity::Information => "notice",
        };
        let message = format!("[{}] {}", p.reporter, p.text)
            .replace('%', "%25")
            .replace('\r', "%0D")
            .replace('\n', "%0A");
        out.push(format!(
            "::{} file={},line={}::{}",
            level,
            record.path,
            p.first_line(),
            message
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::empty_report;
    use promguard_types::{Anchor, Problem, ProblemRecord, RulePath};

    fn report_with(problems: Vec<ProblemRecord>) -> PromguardReport {
        let mut report = empty_report("strict");
        report.problems = problems;
        report
    }

    fn problem(severity: Severity, details: Option<&str>) -> ProblemRecord {
        ProblemRecord {
            path: RulePath::new("rules/foo.yaml"),
            problem: Problem {
                fragment: "notfound".to_string(),
                lines: vec![2],
                anchor: Anchor::Before,
                reporter: "promql/series".to_string(),
                text: "metric is missing".to_string(),
                details: details.map(|s| s.to_string()),
                severity,
            },
        }
    }

    #[test]
    fn text_lists_problems_with_details() {
        let report = report_with(vec![problem(Severity::Bug, Some("- `alert` at `foo.yaml:2`"))]);
        let text = render_text(&report);
        assert!(text.contains("rules/foo.yaml:2 bug: metric is missing (promql/series)"));
        assert!(text.contains("  - `alert` at `foo.yaml:2`"));
        assert!(text.contains("1 problem(s) found"));
    }

    #[test]
    fn annotations_map_severities_and_escape_newlines() {
        let report = report_with(vec![
            problem(Severity::Bug, None),
            problem(Severity::Warning, None),
            problem(Severity::Information, None),
        ]);
        let annotations = render_github_annotations(&report);
        assert_eq!(annotations.len(), 3);
        assert!(annotations[0].starts_with("::error file=rules/foo.yaml,line=2::"));
        assert!(annotations[1].starts_with("::warning "));
        assert!(annotations[2].starts_with("::notice "));

        let mut multiline = problem(Severity::Bug, None);
        multiline.problem.text = "line1\nline2".to_string();
        let report = report_with(vec![multiline]);
        let annotations = render_github_annotations(&report);
        assert!(annotations[0].ends_with("line1%0Aline2"));
    }
}
