use crate::checks::RuleChecker;
use crate::CheckContext;
use promguard_discovery::{ChangeType, Entry};
use promguard_parser::RuleKind;
use promguard_types::{ids, Anchor, Problem, RulePath, Severity};
use std::collections::{BTreeMap, BTreeSet};

/// One rule consuming a recorded metric. Field order drives the sort:
/// reported path, then line, then rule name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Consumer {
    pub path: RulePath,
    pub line: usize,
    pub name: String,
}

/// Metric name → rules whose expressions reference it.
///
/// Built once per check invocation from the batch itself. Entries that
/// are removed, excluded or broken contribute nothing; consumers are
/// deduplicated on `(path, line, name)`, which collapses symlinked
/// copies sharing one reported path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyIndex {
    consumers: BTreeMap<String, BTreeSet<Consumer>>,
}

impl DependencyIndex {
    pub fn build(entries: &[Entry]) -> Self {
        let mut consumers: BTreeMap<String, BTreeSet<Consumer>> = BTreeMap::new();
        for entry in entries {
            if matches!(entry.state, ChangeType::Removed | ChangeType::Excluded) {
                continue;
            }
            let Some(rule) = entry.rule() else {
                continue;
            };
            if rule.expr.ast.is_err() {
                continue;
            }
            let mut referenced: BTreeSet<&str> = BTreeSet::new();
            let selectors = rule.expr.selectors();
            for selector in &selectors {
                if let Some(metric) = selector.node.metric_name() {
                    referenced.insert(metric);
                }
            }
            for metric in referenced {
                consumers.entry(metric.to_string()).or_default().insert(Consumer {
                    path: entry.reported_path.clone(),
                    line: rule.expr.line,
                    name: rule.name.clone(),
                });
            }
        }
        Self { consumers }
    }

    pub fn consumers(&self, metric: &str) -> impl Iterator<Item = &Consumer> {
        self.consumers.get(metric).into_iter().flatten()
    }
}

/// Flags removed recording rules whose output metric is still consumed
/// by other rules in the batch.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleDependencyCheck;

impl RuleDependencyCheck {
    pub fn new() -> Self {
        Self
    }
}

impl RuleChecker for RuleDependencyCheck {
    fn reporter(&self) -> &'static str {
        ids::CHECK_RULE_DEPENDENCY
    }

    fn check(&self, ctx: &CheckContext, entry: &Entry, entries: &[Entry]) -> Vec<Problem> {
        if ctx.is_cancelled() {
            return Vec::new();
        }
        if entry.state != ChangeType::Removed {
            return Vec::new();
        }
        let Some(rule) = entry.rule() else {
            return Vec::new();
        };
        if rule.kind != RuleKind::Recording {
            return Vec::new();
        }

        let metric = rule.name.as_str();
        let index = DependencyIndex::build(entries);
        let consumers: Vec<&Consumer> = index
            .consumers(metric)
            .filter(|c| {
                // The removed rule itself is not its own consumer.
                !(c.path == entry.reported_path && c.line == rule.lines.0)
            })
            .collect();
        if consumers.is_empty() {
            return Vec::new();
        }

        let mut broken = String::new();
        for c in &consumers {
            broken.push_str(&format!("- `{}` at `{}:{}`\n", c.name, c.path, c.line));
        }
        let details = format!(
            "If you remove the recording rule generating `{metric}`, and there is no other source of this metric, then any other rule depending on it will break.\nList of found rules that are using `{metric}`:\n\n{broken}"
        );

        vec![Problem {
            fragment: format!("record: {metric}"),
            lines: rule.header_lines(),
            anchor: Anchor::Before,
            reporter: ids::CHECK_RULE_DEPENDENCY.to_string(),
            text: format!(
                "Metric generated by this rule is used by {} other rule(s).",
                consumers.len()
            ),
            details: Some(details),
            severity: Severity::Warning,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promguard_discovery::{entries_from_content, EntryItem};

    fn parse_with_state(content: &str, state: ChangeType, sp: &str, rp: &str) -> Vec<Entry> {
        entries_from_content(content, RulePath::new(sp), RulePath::new(rp), state)
    }

    fn run(entries: &[Entry]) -> Vec<Problem> {
        let check = RuleDependencyCheck::new();
        let ctx = CheckContext::new();
        entries
            .iter()
            .flat_map(|e| check.check(&ctx, e, entries))
            .collect()
    }

    #[test]
    fn ignores_alerting_rules() {
        let entries = parse_with_state(
            "- alert: foo\n  expr: up == 0\n",
            ChangeType::Removed,
            "foo.yaml",
            "foo.yaml",
        );
        assert!(run(&entries).is_empty());
    }

    #[test]
    fn ignores_removed_rules_without_consumers() {
        let mut entries = parse_with_state(
            "- record: foo\n  expr: sum(foo)\n",
            ChangeType::Removed,
            "foo.yaml",
            "foo.yaml",
        );
        entries.extend(parse_with_state(
            "- alert: foo\n  expr: up == 0\n",
            ChangeType::Noop,
            "foo.yaml",
            "foo.yaml",
        ));
        assert!(run(&entries).is_empty());
    }

    #[test]
    fn consumers_with_broken_expressions_do_not_count() {
        let mut entries = parse_with_state(
            "- record: foo\n  expr: sum(foo)\n",
            ChangeType::Removed,
            "foo.yaml",
            "foo.yaml",
        );
        entries.extend(parse_with_state(
            "- alert: foo\n  expr: foo ==\n",
            ChangeType::Noop,
            "foo.yaml",
            "foo.yaml",
        ));
        assert!(run(&entries).is_empty());
    }

    #[test]
    fn warns_about_removed_dependency() {
        let mut entries = parse_with_state(
            "- record: foo\n  expr: sum(foo)\n",
            ChangeType::Removed,
            "foo.yaml",
            "foo.yaml",
        );
        entries.extend(parse_with_state(
            "- alert: alert\n  expr: foo == 0\n",
            ChangeType::Noop,
            "foo.yaml",
            "foo.yaml",
        ));

        let problems = run(&entries);
        assert_eq!(problems.len(), 1);
        let p = &problems[0];
        assert_eq!(p.fragment, "record: foo");
        assert_eq!(p.lines, vec![1, 2]);
        assert_eq!(p.anchor, Anchor::Before);
        assert_eq!(p.reporter, "rule/dependency");
        assert_eq!(p.severity, Severity::Warning);
        assert_eq!(p.text, "Metric generated by this rule is used by 1 other rule(s).");
        assert_eq!(
            p.details.as_deref(),
            Some(
                "If you remove the recording rule generating `foo`, and there is no other source of this metric, then any other rule depending on it will break.\nList of found rules that are using `foo`:\n\n- `alert` at `foo.yaml:2`\n"
            )
        );
    }

    #[test]
    fn ignores_entries_with_path_errors() {
        let mut entries = parse_with_state(
            "- record: foo\n  expr: sum(foo)\n",
            ChangeType::Removed,
            "foo.yaml",
            "foo.yaml",
        );
        entries.push(Entry {
            source_path: RulePath::new("broken.yaml"),
            reported_path: RulePath::new("broken.yaml"),
            state: ChangeType::Noop,
            item: EntryItem::PathError("bad file".to_string()),
        });
        entries.extend(parse_with_state(
            "- alert: foo\n  expr: up == 0\n",
            ChangeType::Noop,
            "foo.yaml",
            "foo.yaml",
        ));
        assert!(run(&entries).is_empty());
    }

    #[test]
    fn ignores_rules_that_failed_to_parse() {
        let mut entries = parse_with_state(
            "- recordx: foo\n  expr: sum(foo)\n",
            ChangeType::Noop,
            "foo.yaml",
            "foo.yaml",
        );
        entries.extend(parse_with_state(
            "- alert: foo\n  expr: up == 0\n",
            ChangeType::Noop,
            "foo.yaml",
            "foo.yaml",
        ));
        assert!(run(&entries).is_empty());
    }

    #[test]
    fn deduplicates_consumers_by_reported_path() {
        let two_alerts =
            "\n\n- alert: alert\n  expr: (foo / foo) == 0\n- alert: alert\n  expr: (foo / foo) == 0\n";
        let mut entries = Vec::new();
        entries.push(parse_with_state(two_alerts, ChangeType::Noop, "alice.yaml", "alice.yaml").remove(1));
        entries.push(parse_with_state(two_alerts, ChangeType::Noop, "alice.yaml", "alice.yaml").remove(0));
        entries.extend(parse_with_state(
            "- alert: alert\n  expr: (foo / foo) == 0\n",
            ChangeType::Noop,
            "symlink3.yaml",
            "bar.yaml",
        ));
        entries.extend(parse_with_state(
            "- record: foo\n  expr: sum(foo)\n",
            ChangeType::Removed,
            "foo.yaml",
            "foo.yaml",
        ));
        entries.extend(parse_with_state(
            "- alert: alert\n  expr: foo == 0\n",
            ChangeType::Noop,
            "foo.yaml",
            "foo.yaml",
        ));
        entries.extend(parse_with_state(
            "- alert: xxx\n  expr: (foo / foo) == 0\n",
            ChangeType::Noop,
            "bar.yaml",
            "bar.yaml",
        ));
        entries.extend(parse_with_state(
            "- alert: alert\n  expr: (foo / foo) == 0\n",
            ChangeType::Noop,
            "bar.yaml",
            "bar.yaml",
        ));
        entries.extend(parse_with_state(
            "- alert: alert\n  expr: foo == 0\n",
            ChangeType::Noop,
            "symlink1.yaml",
            "foo.yaml",
        ));
        entries.extend(parse_with_state(
            "- alert: alert\n  expr: foo == 0\n",
            ChangeType::Noop,
            "symlink2.yaml",
            "foo.yaml",
        ));

        let problems = run(&entries);
        assert_eq!(problems.len(), 1);
        assert_eq!(
            problems[0].text,
            "Metric generated by this rule is used by 5 other rule(s)."
        );
        assert_eq!(
            problems[0].details.as_deref(),
            Some(
                "If you remove the recording rule generating `foo`, and there is no other source of this metric, then any other rule depending on it will break.\nList of found rules that are using `foo`:\n\n- `alert` at `alice.yaml:4`\n- `alert` at `alice.yaml:6`\n- `alert` at `bar.yaml:2`\n- `xxx` at `bar.yaml:2`\n- `alert` at `foo.yaml:2`\n"
            )
        );
    }

    #[test]
    fn name_label_references_count_as_consumers() {
        let mut entries = parse_with_state(
            "- record: foo\n  expr: sum(foo)\n",
            ChangeType::Removed,
            "foo.yaml",
            "foo.yaml",
        );
        entries.extend(parse_with_state(
            "- alert: alert\n  expr: '{__name__=\"foo\"} == 0'\n",
            ChangeType::Noop,
            "other.yaml",
            "other.yaml",
        ));

        let problems = run(&entries);
        assert_eq!(problems.len(), 1);
        assert!(problems[0]
            .details
            .as_deref()
            .expect("details")
            .contains("- `alert` at `other.yaml:2`"));
    }

    #[test]
    fn index_is_idempotent() {
        let mut entries = parse_with_state(
            "- alert: alert\n  expr: foo == 0\n",
            ChangeType::Noop,
            "foo.yaml",
            "foo.yaml",
        );
        entries.extend(parse_with_state(
            "- record: bar\n  expr: sum(foo)\n",
            ChangeType::Noop,
            "bar.yaml",
            "bar.yaml",
        ));
        assert_eq!(DependencyIndex::build(&entries), DependencyIndex::build(&entries));
    }
}
