use std::fmt;

/// Label matcher operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MatchOp {
    Eq,
    Ne,
    Re,
    NotRe,
}

impl MatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOp::Eq => "=",
            MatchOp::Ne => "!=",
            MatchOp::Re => "=~",
            MatchOp::NotRe => "!~",
        }
    }

    /// Positive matchers require the label to carry a matching value.
    pub fn is_positive(&self) -> bool {
        matches!(self, MatchOp::Eq | MatchOp::Re)
    }
}

impl fmt::Display for MatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(label, op, value)` triple filtering a vector selector.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Matcher {
    pub label: String,
    pub op: MatchOp,
    pub value: String,
}

impl Matcher {
    pub fn new(label: impl Into<String>, op: MatchOp, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            op,
            value: value.into(),
        }
    }

    /// Canonical ordering: label name, then operator text, then value.
    pub fn sort_key(&self) -> (&str, &'static str, &str) {
        (&self.label, self.op.as_str(), &self.value)
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}\"{}\"",
            self.label,
            self.op.as_str(),
            escape_value(&self.value)
        )
    }
}

fn escape_value(v: &str) -> String {
    let mut out = String::with_capacity(v.len());
    for c in v.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

pub const NAME_LABEL: &str = "__name__";

/// A PromQL vector selector: metric name plus label matchers.
///
/// `name` is empty when the metric was written as `{__name__="x", ...}`;
/// in that case `matchers` holds the `__name__` matcher.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorSelector {
    pub name: String,
    pub matchers: Vec<Matcher>,
    /// Raw offset modifier text (`5m`, `-15m`). Not part of the selector's
    /// identity: probes and canonical rendering ignore it.
    pub offset: Option<String>,
    /// Byte offset of the selector within the expression source.
    pub span: usize,
}

impl VectorSelector {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            matchers: Vec::new(),
            offset: None,
            span: 0,
        }
    }

    /// Metric name, whether written bare or as a `__name__` matcher.
    pub fn metric_name(&self) -> Option<&str> {
        if !self.name.is_empty() {
            return Some(&self.name);
        }
        self.matchers
            .iter()
            .find(|m| m.label == NAME_LABEL && m.op == MatchOp::Eq)
            .map(|m| m.value.as_str())
    }

    /// Canonical form: matchers sorted, offset dropped.
    pub fn canonical(&self) -> VectorSelector {
        let mut matchers = self.matchers.clone();
        matchers.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        VectorSelector {
            name: self.name.clone(),
            matchers,
            offset: None,
            span: self.span,
        }
    }

    /// The selector with all matchers stripped, preserving how the metric
    /// was written: `found` stays `found`, `{__name__="found", ...}`
    /// becomes `{__name__="found"}`.
    pub fn bare(&self) -> VectorSelector {
        let matchers = if self.name.is_empty() {
            self.matchers
                .iter()
                .filter(|m| m.label == NAME_LABEL)
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        VectorSelector {
            name: self.name.clone(),
            matchers,
            offset: None,
            span: self.span,
        }
    }

    /// A probe selector for a single matcher. The metric name is lifted
    /// out of any `__name__` matcher, so `{__name__="found"}` plus
    /// `removed="xxx"` renders as `found{removed="xxx"}`.
    pub fn with_single_matcher(&self, matcher: &Matcher) -> VectorSelector {
        let name = self.metric_name().unwrap_or_default().to_string();
        let matchers = if name.is_empty() {
            // No usable name at all: keep the __name__ matchers.
            let mut ms: Vec<Matcher> = self
                .matchers
                .iter()
                .filter(|m| m.label == NAME_LABEL)
                .cloned()
                .collect();
            ms.push(matcher.clone());
            ms
        } else {
            vec![matcher.clone()]
        };
        VectorSelector {
            name,
            matchers,
            offset: None,
            span: self.span,
        }
        .canonical()
    }

    /// Matchers excluding `__name__`.
    pub fn filter_matchers(&self) -> impl Iterator<Item = &Matcher> {
        self.matchers.iter().filter(|m| m.label != NAME_LABEL)
    }

    /// Distinct matcher labels excluding `__name__`, in canonical order.
    pub fn filter_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self
            .filter_matchers()
            .map(|m| m.label.as_str())
            .collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }
}

impl fmt::Display for VectorSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.matchers.is_empty() {
            if self.name.is_empty() {
                f.write_str("{}")?;
            }
            return Ok(());
        }
        f.write_str("{")?;
        for (i, m) in self.matchers.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{m}")?;
        }
        f.write_str("}")
    }
}

/// `by` / `without` grouping on an aggregation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grouping {
    By,
    Without,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AggModifier {
    pub grouping: Grouping,
    pub labels: Vec<String>,
}

/// Vector-matching modifiers on a binary expression. Parsed so selector
/// extraction can walk through them; the linter does not evaluate them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BinModifier {
    pub bool_mode: bool,
    pub matching: Option<(String, Vec<String>)>,
    pub group: Option<(String, Vec<String>)>,
}

impl BinModifier {
    pub fn is_empty(&self) -> bool {
        !self.bool_mode && self.matching.is_none() && self.group.is_none()
    }
}

/// A parsed PromQL expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    String(String),
    Selector(VectorSelector),
    /// Range vector (`foo[5m]`) or subquery (`rate(foo[5m])[1h:]`).
    Matrix {
        expr: Box<Expr>,
        range: String,
        resolution: Option<String>,
    },
    Call {
        func: String,
        args: Vec<Expr>,
    },
    Aggregate {
        op: String,
        modifier: Option<AggModifier>,
        args: Vec<Expr>,
    },
    Unary {
        op: char,
        expr: Box<Expr>,
    },
    Binary {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        modifier: BinModifier,
    },
    Paren(Box<Expr>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matcher_renders_with_escaped_value() {
        let m = Matcher::new("path", MatchOp::Re, "a\"b\\c");
        assert_eq!(m.to_string(), r#"path=~"a\"b\\c""#);
    }

    #[test]
    fn canonical_sorts_by_label_then_op_then_value() {
        let sel = VectorSelector {
            name: "found".to_string(),
            matchers: vec![
                Matcher::new("notfound", MatchOp::Eq, "notfound"),
                Matcher::new("instance", MatchOp::Re, ".+"),
                Matcher::new("not", MatchOp::Ne, "negative"),
                Matcher::new("instance", MatchOp::NotRe, "bad"),
            ],
            offset: None,
            span: 0,
        };
        assert_eq!(
            sel.canonical().to_string(),
            r#"found{instance!~"bad",instance=~".+",not!="negative",notfound="notfound"}"#
        );
    }

    #[test]
    fn bare_keeps_the_written_form() {
        let named = VectorSelector {
            name: "found".to_string(),
            matchers: vec![Matcher::new("job", MatchOp::Eq, "foo")],
            offset: None,
            span: 0,
        };
        assert_eq!(named.bare().to_string(), "found");

        let nameless = VectorSelector {
            name: String::new(),
            matchers: vec![
                Matcher::new(NAME_LABEL, MatchOp::Eq, "found"),
                Matcher::new("removed", MatchOp::Eq, "xxx"),
            ],
            offset: None,
            span: 0,
        };
        assert_eq!(nameless.bare().to_string(), r#"{__name__="found"}"#);
        assert_eq!(nameless.metric_name(), Some("found"));
    }

    #[test]
    fn single_matcher_probe_lifts_the_name_label() {
        let nameless = VectorSelector {
            name: String::new(),
            matchers: vec![
                Matcher::new(NAME_LABEL, MatchOp::Eq, "found"),
                Matcher::new("removed", MatchOp::Eq, "xxx"),
            ],
            offset: None,
            span: 0,
        };
        let probe =
            nameless.with_single_matcher(&Matcher::new("removed", MatchOp::Eq, "xxx"));
        assert_eq!(probe.to_string(), r#"found{removed="xxx"}"#);
    }

    #[test]
    fn filter_labels_dedupes_and_sorts() {
        let sel = VectorSelector {
            name: "found".to_string(),
            matchers: vec![
                Matcher::new("instance", MatchOp::Re, ".+"),
                Matcher::new("job", MatchOp::Eq, "foo"),
                Matcher::new("instance", MatchOp::NotRe, "bad"),
            ],
            offset: None,
            span: 0,
        };
        assert_eq!(sel.filter_labels(), vec!["instance", "job"]);
    }
}
