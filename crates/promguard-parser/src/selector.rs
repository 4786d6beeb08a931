use crate::ast::{Expr, VectorSelector};

/// A vector selector extracted from an expression, canonicalized and
/// positioned at its 1-based source line.
#[derive(Clone, Debug, PartialEq)]
pub struct Selector {
    pub node: VectorSelector,
    pub line: usize,
}

impl Selector {
    /// Canonical textual form; this is what appears in diagnostics.
    pub fn fragment(&self) -> String {
        self.node.to_string()
    }
}

/// Walk an expression and yield every vector selector in source order,
/// one entry per occurrence.
///
/// `source` is the expression text the AST was parsed from and
/// `base_line` the 1-based line the text starts on; selector lines are
/// resolved against both. String arguments (e.g. the label arguments of
/// `label_replace`) contain no selectors and contribute nothing.
pub fn extract_selectors(expr: &Expr, source: &str, base_line: usize) -> Vec<Selector> {
    let mut nodes = Vec::new();
    walk(expr, &mut nodes);
    nodes
        .into_iter()
        .map(|vs| {
            let upto = vs.span.min(source.len());
            let line = base_line + source[..upto].matches('\n').count();
            Selector {
                node: vs.canonical(),
                line,
            }
        })
        .collect()
}

fn walk<'a>(expr: &'a Expr, out: &mut Vec<&'a VectorSelector>) {
    match expr {
        Expr::Number(_) | Expr::String(_) => {}
        Expr::Selector(vs) => out.push(vs),
        Expr::Matrix { expr, .. } => walk(expr, out),
        Expr::Call { args, .. } => {
            for arg in args {
                walk(arg, out);
            }
        }
        Expr::Aggregate { args, .. } => {
            for arg in args {
                walk(arg, out);
            }
        }
        Expr::Unary { expr, .. } => walk(expr, out),
        Expr::Binary { lhs, rhs, .. } => {
            walk(lhs, out);
            walk(rhs, out);
        }
        Expr::Paren(inner) => walk(inner, out),
    }
}
