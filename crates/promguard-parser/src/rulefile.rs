use crate::parser::{parse_expr, ParseError};
use crate::selector::{extract_selectors, Selector};
use crate::Expr;

/// A comment line preceding a rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Comment {
    pub line: usize,
    pub text: String,
}

/// `# promguard disable <check>` or `# promguard disable <check>(<selector>)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisableDirective {
    pub check: String,
    pub selector: Option<String>,
}

const DISABLE_PREFIX: &str = "promguard disable";

impl Comment {
    pub fn disable_directive(&self) -> Option<DisableDirective> {
        let rest = self.text.trim().strip_prefix(DISABLE_PREFIX)?.trim();
        if rest.is_empty() {
            return None;
        }
        match (rest.find('('), rest.rfind(')')) {
            (Some(open), Some(close)) if open < close => Some(DisableDirective {
                check: rest[..open].trim().to_string(),
                selector: Some(rest[open + 1..close].trim().to_string()),
            }),
            _ => Some(DisableDirective {
                check: rest.to_string(),
                selector: None,
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleKind {
    Recording,
    Alerting,
}

/// A rule expression: raw text, position and parse outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleExpr {
    pub text: String,
    /// 1-based line the expression text starts on.
    pub line: usize,
    pub ast: Result<Expr, ParseError>,
}

impl RuleExpr {
    /// Selectors referenced by the expression, empty when it failed to parse.
    pub fn selectors(&self) -> Vec<Selector> {
        match &self.ast {
            Ok(expr) => extract_selectors(expr, &self.text, self.line),
            Err(_) => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    pub kind: RuleKind,
    /// `record` value for recording rules, `alert` value for alerting rules.
    pub name: String,
    /// 1-based first and last source line of the rule block.
    pub lines: (usize, usize),
    pub expr: RuleExpr,
    /// `for` duration of an alerting rule, raw text.
    pub for_: Option<String>,
    pub comments: Vec<Comment>,
}

impl Rule {
    pub fn disable_directives(&self) -> Vec<DisableDirective> {
        self.comments
            .iter()
            .filter_map(|c| c.disable_directive())
            .collect()
    }

    /// The first two source lines of the rule, for problems anchored at
    /// the rule header.
    pub fn header_lines(&self) -> Vec<usize> {
        let (start, end) = self.lines;
        if end > start {
            vec![start, start + 1]
        } else {
            vec![start]
        }
    }
}

/// A rule block that could not be turned into a [`Rule`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for RuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for RuleError {}

/// Parse rule-file content into rule blocks.
///
/// The reader is line oriented so every rule and selector keeps its
/// position: it handles plain rule lists (`- record: ... / - alert: ...`)
/// with scalar or block (`|`) expressions and attaches preceding comments
/// to the next rule. Group-file scaffolding lines are skipped.
pub fn parse_rules(content: &str) -> Vec<Result<Rule, RuleError>> {
    let lines: Vec<&str> = content.lines().collect();
    let mut out = Vec::new();
    let mut pending_comments: Vec<Comment> = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let raw = lines[i];
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }
        if let Some(comment) = trimmed.strip_prefix('#') {
            pending_comments.push(Comment {
                line: i + 1,
                text: comment.trim().to_string(),
            });
            i += 1;
            continue;
        }
        if trimmed.starts_with("- ") {
            let indent = indent_of(raw);
            let comments = std::mem::take(&mut pending_comments);
            let (item, next) = parse_item(&lines, i, indent, comments);
            out.push(item);
            i = next;
            continue;
        }
        // groups:/rules:/interval: scaffolding or stray content.
        i += 1;
    }

    out
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// One `key: value` line inside a rule item.
struct FieldLine<'a> {
    line_no: usize,
    indent: usize,
    text: &'a str,
}

fn parse_item(
    lines: &[&str],
    start: usize,
    indent: usize,
    comments: Vec<Comment>,
) -> (Result<Rule, RuleError>, usize) {
    // Gather the lines belonging to this list item: the dash line plus
    // everything indented deeper than the dash.
    let mut item_lines: Vec<FieldLine<'_>> = Vec::new();
    let first_content = &lines[start][indent + 2..];
    item_lines.push(FieldLine {
        line_no: start + 1,
        indent: indent + 2,
        text: first_content,
    });

    let mut j = start + 1;
    let mut last_content = start;
    while j < lines.len() {
        let raw = lines[j];
        if raw.trim().is_empty() {
            j += 1;
            continue;
        }
        let line_indent = indent_of(raw);
        if line_indent <= indent {
            break;
        }
        if raw.trim_start().starts_with('#') {
            j += 1;
            continue;
        }
        item_lines.push(FieldLine {
            line_no: j + 1,
            indent: line_indent,
            text: raw.trim_end(),
        });
        last_content = j;
        j += 1;
    }
    // Blank lines trailing the item are not part of it.
    let end_line = last_content.max(start) + 1;

    let rule = build_rule(&item_lines, (start + 1, end_line), comments);
    (rule, j)
}

fn build_rule(
    item_lines: &[FieldLine<'_>],
    span: (usize, usize),
    comments: Vec<Comment>,
) -> Result<Rule, RuleError> {
    let key_indent = item_lines[0].indent;

    let mut record: Option<String> = None;
    let mut alert: Option<String> = None;
    let mut for_: Option<String> = None;
    let mut expr: Option<RuleExpr> = None;

    let mut idx = 0;
    while idx < item_lines.len() {
        let field = &item_lines[idx];
        let content = if idx == 0 {
            field.text
        } else {
            if field.indent != key_indent {
                // Nested content without a current block key, e.g. a
                // labels/annotations mapping body. Skip it.
                idx += 1;
                continue;
            }
            field.text.trim_start()
        };

        let Some((key, value)) = split_key(content) else {
            return Err(RuleError {
                line: field.line_no,
                message: format!("invalid rule line: {content:?}"),
            });
        };

        match key {
            "record" => record = Some(unquote(value).to_string()),
            "alert" => alert = Some(unquote(value).to_string()),
            "for" | "keep_firing_for" => {
                if key == "for" {
                    for_ = Some(unquote(value).to_string());
                }
            }
            "expr" => {
                let (parsed, consumed) = parse_expr_value(item_lines, idx, value, key_indent);
                expr = Some(parsed);
                idx += consumed;
                continue;
            }
            "labels" | "annotations" => {
                // Swallow the nested mapping.
                idx += 1;
                while idx < item_lines.len() && item_lines[idx].indent > key_indent {
                    idx += 1;
                }
                continue;
            }
            other => {
                return Err(RuleError {
                    line: field.line_no,
                    message: format!("invalid key(s) found: {other}"),
                });
            }
        }
        idx += 1;
    }

    let (kind, name) = match (record, alert) {
        (Some(_), Some(_)) => {
            return Err(RuleError {
                line: span.0,
                message: "got both record and alert keys in a single rule".to_string(),
            });
        }
        (Some(name), None) => (RuleKind::Recording, name),
        (None, Some(name)) => (RuleKind::Alerting, name),
        (None, None) => {
            return Err(RuleError {
                line: span.0,
                message: "incomplete rule, no record or alert key".to_string(),
            });
        }
    };

    let Some(expr) = expr else {
        return Err(RuleError {
            line: span.0,
            message: "missing expr key".to_string(),
        });
    };

    Ok(Rule {
        kind,
        name,
        lines: span,
        expr,
        for_,
        comments,
    })
}

/// Parse the value of an `expr` key, scalar or block. Returns the
/// expression and how many item lines were consumed (including the key
/// line itself).
fn parse_expr_value(
    item_lines: &[FieldLine<'_>],
    key_idx: usize,
    value: &str,
    key_indent: usize,
) -> (RuleExpr, usize) {
    let key_line = item_lines[key_idx].line_no;
    let value = value.trim();

    if matches!(value, "|" | "|-" | "|+" | ">" | ">-") {
        let mut block: Vec<&str> = Vec::new();
        let mut first_line = key_line + 1;
        let mut consumed = 1;
        for field in &item_lines[key_idx + 1..] {
            if field.indent <= key_indent {
                break;
            }
            if block.is_empty() {
                first_line = field.line_no;
            }
            block.push(field.text);
            consumed += 1;
        }
        let dedent = block
            .iter()
            .map(|l| indent_of(l))
            .min()
            .unwrap_or(0);
        let joiner = if value.starts_with('>') { " " } else { "\n" };
        let text: String = block
            .iter()
            .map(|l| &l[dedent.min(l.len())..])
            .collect::<Vec<_>>()
            .join(joiner);
        let ast = parse_expr(&text);
        (
            RuleExpr {
                text,
                line: first_line,
                ast,
            },
            consumed,
        )
    } else {
        let text = unquote(value).to_string();
        let ast = parse_expr(&text);
        (
            RuleExpr {
                text,
                line: key_line,
                ast,
            },
            1,
        )
    }
}

fn split_key(content: &str) -> Option<(&str, &str)> {
    let colon = content.find(':')?;
    let key = content[..colon].trim();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some((key, content[colon + 1..].trim()))
}

fn unquote(value: &str) -> &str {
    let v = value.trim();
    if v.len() >= 2
        && ((v.starts_with('"') && v.ends_with('"')) || (v.starts_with('\'') && v.ends_with('\'')))
    {
        &v[1..v.len() - 1]
    } else {
        v
    }
}
