use crate::checks::RuleChecker;
use crate::{comments, CheckContext};
use promguard_discovery::Entry;
use promguard_parser::{Matcher, Selector};
use promguard_promapi::{group_by_label, LabelValues, PromError, Prometheus, SeriesRanges};
use promguard_types::duration::{format_duration, format_since};
use promguard_types::{ids, Anchor, Problem, Severity};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Default range-query window.
pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(7 * 24 * 3600);
/// Range-query resolution; one scrape period for gap detection.
pub const RANGE_STEP: Duration = Duration::from_secs(300);
/// Presence below this fraction of the lookback counts as "sometimes
/// present".
pub const MIN_COVERAGE_RATIO: f64 = 0.5;
/// A label value covering less than this fraction of the lookback is a
/// churn candidate.
pub const CHURN_COVERAGE_RATIO: f64 = 0.25;

/// The series existence prober.
///
/// For every selector in a rule it runs a fixed decision procedure
/// against one Prometheus server: an instant probe, a range probe on the
/// bare metric, per-label key probes and per-matcher probes, classifying
/// the selector as missing, disappeared, unmatched or flapping.
pub struct SeriesCheck {
    prom: Arc<Prometheus>,
    lookback: Duration,
    step: Duration,
    min_coverage: f64,
    churn_coverage: f64,
}

impl SeriesCheck {
    pub fn new(prom: Arc<Prometheus>) -> Self {
        Self {
            prom,
            lookback: DEFAULT_LOOKBACK,
            step: RANGE_STEP,
            min_coverage: MIN_COVERAGE_RATIO,
            churn_coverage: CHURN_COVERAGE_RATIO,
        }
    }

    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }
}

impl RuleChecker for SeriesCheck {
    fn reporter(&self) -> &'static str {
        ids::CHECK_SERIES
    }

    fn check(&self, ctx: &CheckContext, entry: &Entry, _entries: &[Entry]) -> Vec<Problem> {
        let Some(rule) = entry.rule() else {
            return Vec::new();
        };

        let mut problems = Vec::new();
        for selector in rule.expr.selectors() {
            if comments::is_disabled(rule, ids::CHECK_SERIES, &selector.node) {
                continue;
            }
            match self.probe(ctx, &selector) {
                Ok(Some(problem)) => problems.push(problem),
                Ok(None) => {}
                Err(err) if err.is_cancelled() => return problems,
                Err(err) => problems.push(self.query_problem(&selector, &err)),
            }
        }
        problems
    }
}

impl SeriesCheck {
    /// The decision procedure for one selector. Issues between one and
    /// `O(|matchers| + 3)` queries, short-circuiting on the first
    /// classification.
    fn probe(&self, ctx: &CheckContext, selector: &Selector) -> Result<Option<Problem>, PromError> {
        let node = &selector.node;
        let full = node.to_string();

        // 1. Live right now? Then there is nothing to report.
        ctx.checkpoint()?;
        let samples = self.prom.query(&format!("count({full})"))?;
        if !samples.is_empty() {
            return Ok(None);
        }

        let end = ctx.now_epoch();
        let start = end - self.lookback.as_secs() as i64;
        let bare = node.bare();
        let bare_str = bare.to_string();

        // 2. Did the bare metric exist at all during the lookback?
        ctx.checkpoint()?;
        let matrix = self
            .prom
            .query_range(&format!("count({bare_str})"), start, end, self.step)?;
        let bare_ranges = SeriesRanges::from_matrix(&matrix, self.step);
        if bare_ranges.is_empty() {
            return Ok(Some(self.problem(
                &bare_str,
                selector.line,
                Severity::Bug,
                self.no_metric_text(&bare_str),
            )));
        }

        // 3. One uninterrupted run that already ended: it disappeared.
        //    Disjoint runs are flapping, handled after the matcher loop.
        if bare_ranges.single_run() {
            if let Some(gap) = self.gap(end, &bare_ranges) {
                let text = format!(
                    "prometheus \"{}\" at {} doesn't currently have \"{bare_str}\", it was last present {} ago",
                    self.prom.name(),
                    self.prom.uri(),
                    format_since(gap),
                );
                return Ok(Some(self.problem(&bare_str, selector.line, Severity::Bug, text)));
            }
        }

        // 4. Per-label probes: does every matched label key exist at all?
        let mut by_label: BTreeMap<String, LabelValues> = BTreeMap::new();
        for label in node.filter_labels() {
            ctx.checkpoint()?;
            let matrix = self.prom.query_range(
                &format!("count({bare_str}) by ({label})"),
                start,
                end,
                self.step,
            )?;
            let values = group_by_label(&matrix, label, self.step);
            let required = node
                .filter_matchers()
                .any(|m| m.label == label && m.op.is_positive());
            if values.is_empty() && required {
                let text = format!(
                    "prometheus \"{}\" at {} has \"{bare_str}\" metric but there are no series with \"{label}\" label in the last {}",
                    self.prom.name(),
                    self.prom.uri(),
                    self.lookback_text(),
                );
                return Ok(Some(self.problem(&full, selector.line, Severity::Bug, text)));
            }
            by_label.insert(label.to_string(), values);
        }

        // 5. Per-matcher probes for positive matchers.
        let mut never_matched: Vec<&Matcher> = Vec::new();
        for matcher in node.filter_matchers().filter(|m| m.op.is_positive()) {
            ctx.checkpoint()?;
            let probe_sel = node.with_single_matcher(matcher);
            let probe_str = probe_sel.to_string();
            let matrix = self
                .prom
                .query_range(&format!("count({probe_str})"), start, end, self.step)?;
            let ranges = SeriesRanges::from_matrix(&matrix, self.step);

            if ranges.is_empty() {
                never_matched.push(matcher);
                continue;
            }
            if ranges.single_run() {
                if let Some(gap) = self.gap(end, &ranges) {
                    let text = format!(
                        "prometheus \"{}\" at {} has \"{bare_str}\" metric but doesn't currently have series matching {{{matcher}}}, such series was last present {} ago",
                        self.prom.name(),
                        self.prom.uri(),
                        format_since(gap),
                    );
                    return Ok(Some(self.problem(
                        &probe_str,
                        selector.line,
                        Severity::Bug,
                        text,
                    )));
                }
            }
            if ranges.coverage(self.lookback) < self.min_coverage {
                let text = format!(
                    "metric \"{bare_str}\" with label {{{matcher}}} is only sometimes present on prometheus \"{}\" at {} with average life span of {}",
                    self.prom.name(),
                    self.prom.uri(),
                    format_duration(ranges.avg_life()),
                );
                return Ok(Some(self.problem(
                    &probe_str,
                    selector.line,
                    Severity::Warning,
                    text,
                )));
            }
        }

        if !never_matched.is_empty() {
            let filter = never_matched
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(",");
            let churn_label = never_matched.iter().find_map(|m| {
                by_label
                    .get(&m.label)
                    .filter(|values| values.high_churn(self.lookback, self.churn_coverage))
                    .map(|_| m.label.clone())
            });

            let mut text = format!(
                "prometheus \"{}\" at {} has \"{bare_str}\" metric but there are no series matching {{{filter}}} in the last {}",
                self.prom.name(),
                self.prom.uri(),
                self.lookback_text(),
            );
            let severity = match churn_label {
                Some(label) => {
                    text.push_str(&format!(", \"{label}\" looks like a high churn label"));
                    Severity::Warning
                }
                None => Severity::Bug,
            };
            return Ok(Some(self.problem(&full, selector.line, severity, text)));
        }

        // 6. Bare metric flapping in and out of existence.
        if bare_ranges.coverage(self.lookback) < self.min_coverage {
            let text = format!(
                "metric \"{bare_str}\" is only sometimes present on prometheus \"{}\" at {} with average life span of {} in the last {}",
                self.prom.name(),
                self.prom.uri(),
                format_duration(bare_ranges.avg_life()),
                self.lookback_text(),
            );
            return Ok(Some(self.problem(
                &bare_str,
                selector.line,
                Severity::Warning,
                text,
            )));
        }

        Ok(None)
    }

    /// How long ago the newest sample was, when older than one scrape
    /// period.
    fn gap(&self, now_epoch: i64, ranges: &SeriesRanges) -> Option<Duration> {
        let newest = ranges.newest()?;
        let gap = now_epoch as f64 - newest;
        if gap > self.step.as_secs_f64() {
            Some(Duration::from_secs_f64(gap.max(0.0)))
        } else {
            None
        }
    }

    fn lookback_text(&self) -> String {
        format_duration(self.lookback)
    }

    fn no_metric_text(&self, metric: &str) -> String {
        format!(
            "prometheus \"{}\" at {} didn't have any series for \"{metric}\" metric in the last {}",
            self.prom.name(),
            self.prom.uri(),
            self.lookback_text(),
        )
    }

    fn problem(&self, fragment: &str, line: usize, severity: Severity, text: String) -> Problem {
        Problem {
            fragment: fragment.to_string(),
            lines: vec![line],
            anchor: Anchor::Before,
            reporter: ids::CHECK_SERIES.to_string(),
            text,
            details: None,
            severity,
        }
    }

    /// A probe that could not run at all. URI misconfiguration is an
    /// operator warning; everything else is a bug.
    fn query_problem(&self, selector: &Selector, err: &PromError) -> Problem {
        let (severity, text) = match err {
            PromError::BadData(_) | PromError::Api { .. } => (
                Severity::Bug,
                format!(
                    "prometheus \"{}\" at {} failed with: {err}",
                    self.prom.name(),
                    self.prom.uri(),
                ),
            ),
            _ => {
                let severity = if err.is_uri_error() {
                    Severity::Warning
                } else {
                    Severity::Bug
                };
                (
                    severity,
                    format!(
                        "couldn't run \"{}\" checks due to prometheus \"{}\" at {} connection error: {err}",
                        ids::CHECK_SERIES,
                        self.prom.name(),
                        self.prom.uri(),
                    ),
                )
            }
        };
        self.problem(&selector.fragment(), selector.line, severity, text)
    }
}
