use crate::checks::dependency::RuleDependencyCheck;
use crate::checks::series::SeriesCheck;
use crate::checks::RuleChecker;
use crate::{CheckContext, EffectiveConfig};
use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use promguard_discovery::{ChangeType, Entry};
use promguard_promapi::Prometheus;
use promguard_types::{ids, ProblemRecord, RulePath};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Duration;

/// One configured Prometheus server plus the paths it is responsible for.
pub struct ServerHandle {
    prom: Arc<Prometheus>,
    lookback: Duration,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl ServerHandle {
    pub fn new(
        prom: Arc<Prometheus>,
        lookback: Duration,
        include: &[String],
        exclude: &[String],
    ) -> anyhow::Result<Self> {
        Ok(Self {
            prom,
            lookback,
            include: build_globset(include).context("compile server include globset")?,
            exclude: build_globset(exclude).context("compile server exclude globset")?,
        })
    }

    pub fn prom(&self) -> &Arc<Prometheus> {
        &self.prom
    }

    /// Whether rules from this path are deployed to this server.
    fn covers(&self, path: &RulePath) -> bool {
        if let Some(include) = &self.include {
            if !include.is_match(path.as_str()) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(path.as_str()) {
                return false;
            }
        }
        true
    }
}

fn build_globset(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

/// Dispatches enabled checks over a batch of entries.
///
/// Probes run in parallel; the final report is sorted by
/// `(reported path, line, reporter)` so the output is deterministic
/// regardless of scheduling.
pub struct Runner {
    config: EffectiveConfig,
    servers: Vec<ServerHandle>,
}

impl Runner {
    pub fn new(config: EffectiveConfig, servers: Vec<ServerHandle>) -> Self {
        Self { config, servers }
    }

    pub fn run(&self, ctx: &CheckContext, entries: &[Entry]) -> Vec<ProblemRecord> {
        let series_enabled = self.config.check_enabled(ids::CHECK_SERIES);
        let dependency_enabled = self.config.check_enabled(ids::CHECK_RULE_DEPENDENCY);

        if series_enabled {
            for server in &self.servers {
                let prom = server.prom();
                let probe = format!("count({})", prom.uptime_metric());
                if let Err(err) = prom.query(&probe) {
                    tracing::warn!(
                        prometheus = %prom.name(),
                        uri = %prom.uri(),
                        %err,
                        "server not responding, probes against it will likely fail"
                    );
                }
            }
        }

        let dependency = RuleDependencyCheck::new();
        let series: Vec<(SeriesCheck, &ServerHandle)> = if series_enabled {
            self.servers
                .iter()
                .map(|s| {
                    (
                        SeriesCheck::new(s.prom.clone()).with_lookback(s.lookback),
                        s,
                    )
                })
                .collect()
        } else {
            Vec::new()
        };

        let mut jobs: Vec<(&Entry, &dyn RuleChecker)> = Vec::new();
        for entry in entries {
            if entry.state == ChangeType::Excluded {
                continue;
            }
            if dependency_enabled {
                jobs.push((entry, &dependency));
            }
            // Removed rules are no longer deployed; nothing to probe.
            if entry.state != ChangeType::Removed {
                for (check, server) in &series {
                    if server.covers(&entry.reported_path) {
                        jobs.push((entry, check));
                    }
                }
            }
        }

        let mut records: Vec<ProblemRecord> = jobs
            .par_iter()
            .flat_map_iter(|(entry, check)| {
                check
                    .check(ctx, entry, entries)
                    .into_iter()
                    .map(|problem| ProblemRecord {
                        path: entry.reported_path.clone(),
                        problem,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        records.sort_by(compare_records);
        records
    }
}

/// Report ordering: reported path, first line, reporter; remaining
/// fields only break ties so equal-keyed problems stay stable.
pub(crate) fn compare_records(a: &ProblemRecord, b: &ProblemRecord) -> std::cmp::Ordering {
    a.path
        .cmp(&b.path)
        .then(a.problem.first_line().cmp(&b.problem.first_line()))
        .then(a.problem.reporter.cmp(&b.problem.reporter))
        .then(a.problem.lines.cmp(&b.problem.lines))
        .then(a.problem.text.cmp(&b.problem.text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CheckPolicy;
    use crate::FailOn;
    use httpmock::{Method::POST, MockServer};
    use promguard_discovery::entries_from_content;
    use promguard_test_util::{empty_matrix, empty_vector, single_sample_vector};
    use std::collections::BTreeMap;

    const LOOKBACK: Duration = Duration::from_secs(7 * 24 * 3600);

    fn config(checks: &[&str]) -> EffectiveConfig {
        let mut map = BTreeMap::new();
        for check in checks {
            map.insert(check.to_string(), CheckPolicy::enabled());
        }
        EffectiveConfig {
            profile: "test".to_string(),
            fail_on: FailOn::Bug,
            max_problems: 200,
            checks: map,
        }
    }

    fn entries(batch: &[(&str, &str, ChangeType)]) -> Vec<Entry> {
        batch
            .iter()
            .flat_map(|(path, content, state)| {
                entries_from_content(
                    content,
                    RulePath::new(path),
                    RulePath::new(path),
                    *state,
                )
            })
            .collect()
    }

    fn mock_uptime(server: &MockServer) {
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/query")
                .x_www_form_urlencoded_tuple("query", "count(up)");
            then.status(200).json_body(single_sample_vector());
        });
    }

    #[test]
    fn report_is_sorted_by_path_line_and_reporter() {
        let server = MockServer::start();
        mock_uptime(&server);
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/query")
                .x_www_form_urlencoded_tuple("query", "count(notfound)");
            then.status(200).json_body(empty_vector());
        });
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/query_range");
            then.status(200).json_body(empty_matrix());
        });
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/query")
                .x_www_form_urlencoded_tuple("query", "count(foo)");
            then.status(200).json_body(single_sample_vector());
        });

        let batch = entries(&[
            (
                "b.yaml",
                "- record: other\n  expr: sum(notfound)\n",
                ChangeType::Noop,
            ),
            (
                "a.yaml",
                "- record: foo\n  expr: sum(foo)\n",
                ChangeType::Removed,
            ),
            ("a.yaml", "- alert: alert\n  expr: foo == 0\n", ChangeType::Noop),
        ]);

        let prom = Arc::new(Prometheus::new("prom", server.base_url()));
        let handle = ServerHandle::new(prom, LOOKBACK, &[], &[]).expect("handle");
        let runner = Runner::new(
            config(&["promql/series", "rule/dependency"]),
            vec![handle],
        );
        let records = runner.run(&CheckContext::new(), &batch);

        let keys: Vec<(&str, usize, &str)> = records
            .iter()
            .map(|r| {
                (
                    r.path.as_str(),
                    r.problem.first_line(),
                    r.problem.reporter.as_str(),
                )
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                ("a.yaml", 1, "rule/dependency"),
                ("b.yaml", 2, "promql/series"),
            ]
        );
    }

    #[test]
    fn excluded_entries_and_uncovered_servers_are_skipped() {
        let server = MockServer::start();
        mock_uptime(&server);
        let instant = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/query")
                .x_www_form_urlencoded_tuple("query", "count(foo)");
            then.status(200).json_body(single_sample_vector());
        });

        let batch = entries(&[
            ("rules/a.yaml", "- record: r\n  expr: sum(foo)\n", ChangeType::Noop),
            (
                "rules/skipped.yaml",
                "- record: r\n  expr: sum(foo)\n",
                ChangeType::Excluded,
            ),
            ("other/b.yaml", "- record: r\n  expr: sum(foo)\n", ChangeType::Noop),
        ]);

        let prom = Arc::new(Prometheus::new("prom", server.base_url()));
        let handle = ServerHandle::new(
            prom,
            LOOKBACK,
            &["rules/**".to_string()],
            &["rules/skipped.yaml".to_string()],
        )
        .expect("handle");
        let runner = Runner::new(config(&["promql/series"]), vec![handle]);
        let records = runner.run(&CheckContext::new(), &batch);

        assert!(records.is_empty());
        // Only rules/a.yaml is covered; the probe is cached so it counts once.
        instant.assert_hits(1);
    }

    #[test]
    fn cancelled_run_reports_nothing() {
        let server = MockServer::start();
        let batch = entries(&[(
            "a.yaml",
            "- record: foo\n  expr: sum(foo)\n",
            ChangeType::Noop,
        )]);

        let prom = Arc::new(Prometheus::new("prom", server.base_url()));
        let handle = ServerHandle::new(prom, LOOKBACK, &[], &[]).expect("handle");
        let runner = Runner::new(config(&["promql/series"]), vec![handle]);

        let ctx = CheckContext::new();
        ctx.cancel();
        let records = runner.run(&ctx, &batch);
        assert!(records.is_empty());
    }

    #[test]
    fn disabled_checks_never_run() {
        let server = MockServer::start();
        let batch = entries(&[(
            "a.yaml",
            "- record: foo\n  expr: sum(notfound)\n",
            ChangeType::Noop,
        )]);

        let prom = Arc::new(Prometheus::new("prom", server.base_url()));
        let handle = ServerHandle::new(prom, LOOKBACK, &[], &[]).expect("handle");
        let runner = Runner::new(config(&[]), vec![handle]);
        let records = runner.run(&CheckContext::new(), &batch);
        assert!(records.is_empty());
    }
}
