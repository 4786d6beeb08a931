use promguard_parser::{parse_expr, DisableDirective, Expr, Rule, VectorSelector};

/// Whether a rule comment suppresses `check` for this selector.
///
/// `# promguard disable <check>` disables the check for the whole rule.
/// `# promguard disable <check>(<selector>)` suppresses only matching
/// selectors: a disable expression without matchers covers any selector
/// on the same metric; one with matchers covers a selector only when
/// every disable matcher appears in it with identical operator and
/// value. A matcher-carrying disable never suppresses a bare selector.
pub fn is_disabled(rule: &Rule, check: &str, selector: &VectorSelector) -> bool {
    rule.disable_directives()
        .iter()
        .any(|d| directive_matches(d, check, selector))
}

fn directive_matches(
    directive: &DisableDirective,
    check: &str,
    selector: &VectorSelector,
) -> bool {
    if directive.check != check {
        return false;
    }
    let Some(text) = &directive.selector else {
        return true;
    };
    let Ok(Expr::Selector(disable)) = parse_expr(text) else {
        return false;
    };

    if disable.metric_name() != selector.metric_name() {
        return false;
    }

    let disable_matchers: Vec<_> = disable.filter_matchers().collect();
    if disable_matchers.is_empty() {
        return true;
    }
    let selector_matchers: Vec<_> = selector.filter_matchers().collect();
    if selector_matchers.is_empty() {
        return false;
    }
    disable_matchers
        .iter()
        .all(|dm| selector_matchers.iter().any(|sm| sm == dm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use promguard_parser::parse_rules;

    fn first_rule(content: &str) -> Rule {
        parse_rules(content)
            .into_iter()
            .next()
            .expect("one rule")
            .expect("valid rule")
    }

    fn first_selector(rule: &Rule) -> VectorSelector {
        rule.expr.selectors()[0].node.clone()
    }

    #[test]
    fn bare_disable_suppresses_any_selector_on_the_metric() {
        for expr in [
            "count(notfound) == 0",
            r#"count(notfound{job="foo"}) == 0"#,
            r#"count(notfound{job!="foo"}) == 0"#,
        ] {
            let rule = first_rule(&format!(
                "# promguard disable promql/series(notfound)\n- record: foo\n  expr: {expr}\n"
            ));
            let selector = first_selector(&rule);
            assert!(
                is_disabled(&rule, "promql/series", &selector),
                "expected suppression for {expr}"
            );
        }
    }

    #[test]
    fn matcher_disable_does_not_suppress_bare_selector() {
        let rule = first_rule(
            "# promguard disable promql/series(notfound{job=\"foo\"})\n- record: foo\n  expr: count(notfound) == 0\n",
        );
        let selector = first_selector(&rule);
        assert!(!is_disabled(&rule, "promql/series", &selector));
    }

    #[test]
    fn matcher_disable_requires_identical_matchers() {
        let content = "# promguard disable promql/series(notfound{job=\"foo\"})\n- record: foo\n  expr: count(notfound{job=\"foo\", instance=\"bar\"}) == 0\n";
        let rule = first_rule(content);
        let selector = first_selector(&rule);
        assert!(is_disabled(&rule, "promql/series", &selector));

        let content = "# promguard disable promql/series(notfound{job=\"other\"})\n- record: foo\n  expr: count(notfound{job=\"foo\"}) == 0\n";
        let rule = first_rule(content);
        let selector = first_selector(&rule);
        assert!(!is_disabled(&rule, "promql/series", &selector));
    }

    #[test]
    fn different_metric_or_check_never_matches() {
        let rule = first_rule(
            "# promguard disable promql/series(other)\n- record: foo\n  expr: count(notfound) == 0\n",
        );
        let selector = first_selector(&rule);
        assert!(!is_disabled(&rule, "promql/series", &selector));

        let rule = first_rule(
            "# promguard disable rule/dependency(notfound)\n- record: foo\n  expr: count(notfound) == 0\n",
        );
        let selector = first_selector(&rule);
        assert!(!is_disabled(&rule, "promql/series", &selector));
    }

    #[test]
    fn whole_check_disable_needs_no_selector() {
        let rule = first_rule(
            "# promguard disable promql/series\n- record: foo\n  expr: count(notfound) == 0\n",
        );
        let selector = first_selector(&rule);
        assert!(is_disabled(&rule, "promql/series", &selector));
    }
}
