use crate::ast::{
    AggModifier, BinModifier, Expr, Grouping, MatchOp, Matcher, VectorSelector,
};
use crate::lexer::{lexer, Span, Token};
use chumsky::Parser as _;

/// Error produced while parsing a PromQL expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    /// Byte offset into the expression source.
    pub offset: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at offset {})", self.message, self.offset)
    }
}

impl std::error::Error for ParseError {}

const AGGREGATORS: &[&str] = &[
    "sum",
    "min",
    "max",
    "avg",
    "group",
    "stddev",
    "stdvar",
    "count",
    "count_values",
    "bottomk",
    "topk",
    "quantile",
];

/// Parse a PromQL expression into an AST.
pub fn parse_expr(input: &str) -> Result<Expr, ParseError> {
    let tokens = lexer().parse(input).map_err(|errs| {
        let first = errs.into_iter().next();
        match first {
            Some(err) => ParseError {
                offset: err.span().start,
                message: format!("unexpected input: {err}"),
            },
            None => ParseError {
                offset: 0,
                message: "unexpected input".to_string(),
            },
        }
    })?;

    let mut parser = TokenParser {
        tokens: &tokens,
        pos: 0,
        src_len: input.len(),
    };
    let expr = parser.parse_binary(0)?;
    parser.expect_eof()?;
    Ok(expr)
}

struct TokenParser<'a> {
    tokens: &'a [(Token, Span)],
    pos: usize,
    src_len: usize,
}

impl<'a> TokenParser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek() {
            Some(Token::Ident(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| s.start)
            .unwrap_or(self.src_len)
    }

    fn bump(&mut self) -> Option<(Token, Span)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            offset: self.offset(),
        }
    }

    fn expect(&mut self, want: &Token, what: &str) -> Result<(), ParseError> {
        match self.peek() {
            Some(t) if t == want => {
                self.pos += 1;
                Ok(())
            }
            Some(t) => Err(self.err(format!("expected {what}, found {}", t.describe()))),
            None => Err(self.err(format!("expected {what}, found end of input"))),
        }
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(self.err(format!("unexpected {}", t.describe()))),
        }
    }

    fn binary_op(&self) -> Option<(String, u8, bool)> {
        // (operator text, precedence, right-associative)
        let op = match self.peek()? {
            Token::Ident(s) => match s.as_str() {
                "or" => ("or", 1, false),
                "and" | "unless" => (s.as_str(), 2, false),
                _ => return None,
            },
            Token::EqCmp => ("==", 3, false),
            Token::Ne => ("!=", 3, false),
            Token::Gt => (">", 3, false),
            Token::Ge => (">=", 3, false),
            Token::Lt => ("<", 3, false),
            Token::Le => ("<=", 3, false),
            Token::Add => ("+", 4, false),
            Token::Sub => ("-", 4, false),
            Token::Mul => ("*", 5, false),
            Token::Div => ("/", 5, false),
            Token::Mod => ("%", 5, false),
            Token::Pow => ("^", 6, true),
            _ => return None,
        };
        Some((op.0.to_string(), op.1, op.2))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        while let Some((op, prec, right_assoc)) = self.binary_op() {
            if prec < min_prec {
                break;
            }
            self.bump();
            let modifier = self.parse_bin_modifier()?;
            let next_min = if right_assoc { prec } else { prec + 1 };
            let rhs = self.parse_binary(next_min)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                modifier,
            };
        }
        Ok(lhs)
    }

    fn parse_bin_modifier(&mut self) -> Result<BinModifier, ParseError> {
        let mut modifier = BinModifier::default();
        if self.peek_ident() == Some("bool") {
            self.bump();
            modifier.bool_mode = true;
        }
        if matches!(self.peek_ident(), Some("on") | Some("ignoring")) {
            let keyword = self.peek_ident().unwrap_or_default().to_string();
            self.bump();
            let labels = self.parse_label_list()?;
            modifier.matching = Some((keyword, labels));
        }
        if matches!(self.peek_ident(), Some("group_left") | Some("group_right")) {
            let keyword = self.peek_ident().unwrap_or_default().to_string();
            self.bump();
            let labels = if matches!(self.peek(), Some(Token::LParen)) {
                self.parse_label_list()?
            } else {
                Vec::new()
            };
            modifier.group = Some((keyword, labels));
        }
        Ok(modifier)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Token::Sub) => {
                self.bump();
                Ok(Expr::Unary {
                    op: '-',
                    expr: Box::new(self.parse_unary()?),
                })
            }
            Some(Token::Add) => {
                self.bump();
                Ok(Expr::Unary {
                    op: '+',
                    expr: Box::new(self.parse_unary()?),
                })
            }
            _ => {
                let atom = self.parse_atom()?;
                self.parse_postfix(atom)
            }
        }
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr, ParseError> {
        loop {
            match self.peek() {
                Some(Token::LBracket) => {
                    self.bump();
                    let range = self.parse_duration_text("range duration")?;
                    let resolution = if matches!(self.peek(), Some(Token::Colon)) {
                        self.bump();
                        if matches!(self.peek(), Some(Token::Duration(_))) {
                            Some(self.parse_duration_text("subquery resolution")?)
                        } else {
                            None
                        }
                    } else {
                        None
                    };
                    self.expect(&Token::RBracket, "']'")?;
                    expr = Expr::Matrix {
                        expr: Box::new(expr),
                        range,
                        resolution,
                    };
                }
                Some(Token::Ident(s)) if s == "offset" => {
                    self.bump();
                    let negative = if matches!(self.peek(), Some(Token::Sub)) {
                        self.bump();
                        true
                    } else {
                        false
                    };
                    let dur = self.parse_duration_text("offset duration")?;
                    let text = if negative { format!("-{dur}") } else { dur };
                    apply_offset(&mut expr, text)
                        .map_err(|msg| self.err(msg))?;
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_duration_text(&mut self, what: &str) -> Result<String, ParseError> {
        match self.bump() {
            Some((Token::Duration(d), _)) => Ok(d),
            Some((t, s)) => Err(ParseError {
                message: format!("expected {what}, found {}", t.describe()),
                offset: s.start,
            }),
            None => Err(self.err(format!("expected {what}, found end of input"))),
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Token::Number(_)) => {
                let Some((Token::Number(n), _)) = self.bump() else {
                    unreachable!("peeked a number token");
                };
                Ok(Expr::Number(n))
            }
            Some(Token::Str(_)) => {
                let Some((Token::Str(s), _)) = self.bump() else {
                    unreachable!("peeked a string token");
                };
                Ok(Expr::String(s))
            }
            Some(Token::LParen) => {
                self.bump();
                let inner = self.parse_binary(0)?;
                self.expect(&Token::RParen, "')'")?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            Some(Token::LBrace) => {
                let span = self.offset();
                let matchers = self.parse_matchers()?;
                Ok(Expr::Selector(VectorSelector {
                    name: String::new(),
                    matchers,
                    offset: None,
                    span,
                }))
            }
            Some(Token::Ident(_)) => {
                let Some((Token::Ident(name), span)) = self.bump() else {
                    unreachable!("peeked an identifier token");
                };
                if AGGREGATORS.contains(&name.as_str()) {
                    let grouping = matches!(self.peek_ident(), Some("by") | Some("without"));
                    if grouping || matches!(self.peek(), Some(Token::LParen)) {
                        return self.parse_aggregate(name);
                    }
                }
                if matches!(self.peek(), Some(Token::LParen)) {
                    return self.parse_call(name);
                }
                let matchers = if matches!(self.peek(), Some(Token::LBrace)) {
                    self.parse_matchers()?
                } else {
                    Vec::new()
                };
                Ok(Expr::Selector(VectorSelector {
                    name,
                    matchers,
                    offset: None,
                    span: span.start,
                }))
            }
            Some(t) => Err(self.err(format!("unexpected {}", t.describe()))),
            None => Err(self.err("unexpected end of input")),
        }
    }

    fn parse_aggregate(&mut self, op: String) -> Result<Expr, ParseError> {
        // `sum by (x) (...)` or `sum(...) by (x)`
        let mut modifier = self.parse_agg_modifier()?;
        self.expect(&Token::LParen, "'('")?;
        let args = self.parse_args()?;
        if modifier.is_none() {
            modifier = self.parse_agg_modifier()?;
        }
        Ok(Expr::Aggregate { op, modifier, args })
    }

    fn parse_agg_modifier(&mut self) -> Result<Option<AggModifier>, ParseError> {
        let grouping = match self.peek_ident() {
            Some("by") => Grouping::By,
            Some("without") => Grouping::Without,
            _ => return Ok(None),
        };
        self.bump();
        let labels = self.parse_label_list()?;
        Ok(Some(AggModifier { grouping, labels }))
    }

    fn parse_call(&mut self, func: String) -> Result<Expr, ParseError> {
        self.expect(&Token::LParen, "'('")?;
        let args = self.parse_args()?;
        Ok(Expr::Call { func, args })
    }

    /// Comma-separated expressions up to and including the closing paren.
    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.bump();
            return Ok(args);
        }
        loop {
            args.push(self.parse_binary(0)?);
            match self.peek() {
                Some(Token::Comma) => {
                    self.bump();
                    if matches!(self.peek(), Some(Token::RParen)) {
                        self.bump();
                        return Ok(args);
                    }
                }
                Some(Token::RParen) => {
                    self.bump();
                    return Ok(args);
                }
                Some(t) => {
                    return Err(self.err(format!("expected ',' or ')', found {}", t.describe())))
                }
                None => return Err(self.err("expected ')', found end of input")),
            }
        }
    }

    fn parse_label_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(&Token::LParen, "'('")?;
        let mut labels = Vec::new();
        loop {
            match self.bump() {
                Some((Token::RParen, _)) => return Ok(labels),
                Some((Token::Ident(l), _)) => {
                    labels.push(l);
                    match self.peek() {
                        Some(Token::Comma) => {
                            self.bump();
                        }
                        Some(Token::RParen) => {}
                        Some(t) => {
                            let msg = format!("expected ',' or ')', found {}", t.describe());
                            return Err(self.err(msg));
                        }
                        None => return Err(self.err("expected ')', found end of input")),
                    }
                }
                Some((t, s)) => {
                    return Err(ParseError {
                        message: format!("expected label name, found {}", t.describe()),
                        offset: s.start,
                    })
                }
                None => return Err(self.err("expected label name, found end of input")),
            }
        }
    }

    fn parse_matchers(&mut self) -> Result<Vec<Matcher>, ParseError> {
        self.expect(&Token::LBrace, "'{'")?;
        let mut matchers = Vec::new();
        loop {
            match self.peek() {
                Some(Token::RBrace) => {
                    self.bump();
                    return Ok(matchers);
                }
                Some(Token::Ident(_)) => {
                    let Some((Token::Ident(label), _)) = self.bump() else {
                        unreachable!("peeked an identifier token");
                    };
                    let op = match self.bump() {
                        Some((Token::Assign, _)) => MatchOp::Eq,
                        Some((Token::Ne, _)) => MatchOp::Ne,
                        Some((Token::Re, _)) => MatchOp::Re,
                        Some((Token::NotRe, _)) => MatchOp::NotRe,
                        Some((t, s)) => {
                            return Err(ParseError {
                                message: format!(
                                    "expected matcher operator, found {}",
                                    t.describe()
                                ),
                                offset: s.start,
                            })
                        }
                        None => {
                            return Err(self.err("expected matcher operator, found end of input"))
                        }
                    };
                    let value = match self.bump() {
                        Some((Token::Str(v), _)) => v,
                        Some((t, s)) => {
                            return Err(ParseError {
                                message: format!("expected matcher value, found {}", t.describe()),
                                offset: s.start,
                            })
                        }
                        None => {
                            return Err(self.err("expected matcher value, found end of input"))
                        }
                    };
                    matchers.push(Matcher { label, op, value });
                    if matches!(self.peek(), Some(Token::Comma)) {
                        self.bump();
                    }
                }
                Some(t) => {
                    return Err(self.err(format!("expected label matcher, found {}", t.describe())))
                }
                None => return Err(self.err("expected '}', found end of input")),
            }
        }
    }
}

fn apply_offset(expr: &mut Expr, text: String) -> Result<(), String> {
    match expr {
        Expr::Selector(vs) => {
            vs.offset = Some(text);
            Ok(())
        }
        Expr::Matrix { expr, .. } => apply_offset(expr, text),
        Expr::Paren(inner) => apply_offset(inner, text),
        _ => Err("offset modifier must follow a selector".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NAME_LABEL;

    fn selector(expr: &Expr) -> &VectorSelector {
        match expr {
            Expr::Selector(vs) => vs,
            other => panic!("expected selector, got {other:?}"),
        }
    }

    #[test]
    fn parses_bare_metric() {
        let expr = parse_expr("foo").expect("parse");
        assert_eq!(selector(&expr).name, "foo");
    }

    #[test]
    fn parses_selector_with_matchers() {
        let expr = parse_expr(r#"found{job="foo", notfound="xxx"}"#).expect("parse");
        let vs = selector(&expr);
        assert_eq!(vs.matchers.len(), 2);
        assert_eq!(vs.matchers[0].label, "job");
        assert_eq!(vs.matchers[1].op, MatchOp::Eq);
    }

    #[test]
    fn parses_name_label_form() {
        let expr = parse_expr(r#"{__name__="notfound", job="bar"}"#).expect("parse");
        let vs = selector(&expr);
        assert!(vs.name.is_empty());
        assert_eq!(vs.metric_name(), Some("notfound"));
        assert_eq!(vs.matchers[0].label, NAME_LABEL);
    }

    #[test]
    fn parses_aggregation_both_grouping_positions() {
        for src in ["sum(foo) by (job)", "sum by (job) (foo)"] {
            let expr = parse_expr(src).expect(src);
            match expr {
                Expr::Aggregate { op, modifier, args } => {
                    assert_eq!(op, "sum");
                    assert_eq!(
                        modifier.expect("grouping").labels,
                        vec!["job".to_string()]
                    );
                    assert_eq!(args.len(), 1);
                }
                other => panic!("expected aggregate, got {other:?}"),
            }
        }
    }

    #[test]
    fn parses_binary_with_matching_modifiers() {
        let expr = parse_expr(
            "count(up) by (device,instance) > 0 and on (device, instance) disk_info",
        )
        .expect("parse");
        match expr {
            Expr::Binary { op, modifier, .. } => {
                assert_eq!(op, "and");
                let (keyword, labels) = modifier.matching.expect("matching");
                assert_eq!(keyword, "on");
                assert_eq!(labels, vec!["device".to_string(), "instance".to_string()]);
            }
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[test]
    fn parses_matrix_and_subquery() {
        let expr = parse_expr("rate(foo[5m])").expect("parse");
        match expr {
            Expr::Call { func, args } => {
                assert_eq!(func, "rate");
                match &args[0] {
                    Expr::Matrix { range, .. } => assert_eq!(range, "5m"),
                    other => panic!("expected matrix, got {other:?}"),
                }
            }
            other => panic!("expected call, got {other:?}"),
        }

        assert!(parse_expr("max_over_time(rate(foo[5m])[1h:])").is_ok());
        assert!(parse_expr("max_over_time(rate(foo[5m])[1h:1m])").is_ok());
    }

    #[test]
    fn parses_offsets_without_changing_identity() {
        let expr = parse_expr(r#"node_filesystem_readonly{mountpoint!=""} offset 5m"#)
            .expect("parse");
        let vs = selector(&expr);
        assert_eq!(vs.offset.as_deref(), Some("5m"));
        assert_eq!(
            vs.canonical().to_string(),
            r#"node_filesystem_readonly{mountpoint!=""}"#
        );

        let expr = parse_expr("foo offset -15m").expect("parse");
        assert_eq!(selector(&expr).offset.as_deref(), Some("-15m"));
    }

    #[test]
    fn parses_comparisons_and_arithmetic_with_precedence() {
        let expr = parse_expr("sum(found_7 * on (job) sum(sum(notfound))) / found_7")
            .expect("parse");
        match expr {
            Expr::Binary { op, .. } => assert_eq!(op, "/"),
            other => panic!("expected binary, got {other:?}"),
        }

        let expr = parse_expr("count(ALERTS) >= 10").expect("parse");
        match expr {
            Expr::Binary { op, .. } => assert_eq!(op, ">="),
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[test]
    fn parses_bool_modifier() {
        let expr = parse_expr("up == bool 1").expect("parse");
        match expr {
            Expr::Binary { modifier, .. } => assert!(modifier.bool_mode),
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_expressions() {
        for bad in [
            "sum(foo) without(",
            "foo ==",
            "foo{job=}",
            "foo{job}",
            "sum(",
            "foo and",
            "foo bar",
        ] {
            assert!(parse_expr(bad).is_err(), "expected error for {bad:?}");
        }
    }

    #[test]
    fn selector_spans_point_into_the_source() {
        let src = "sum(found_7 * on (job) sum(sum(notfound))) / found_7";
        let expr = parse_expr(src).expect("parse");
        let selectors = crate::selector::extract_selectors(&expr, src, 1);
        let names: Vec<String> = selectors.iter().map(|s| s.node.to_string()).collect();
        assert_eq!(names, vec!["found_7", "notfound", "found_7"]);
    }
}
