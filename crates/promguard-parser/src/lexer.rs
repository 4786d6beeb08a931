use chumsky::prelude::*;

pub(crate) type Span = std::ops::Range<usize>;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Duration(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Assign,
    EqCmp,
    Ne,
    Re,
    NotRe,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier {s:?}"),
            Token::Number(n) => format!("number {n}"),
            Token::Str(s) => format!("string {s:?}"),
            Token::Duration(d) => format!("duration {d:?}"),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Add => "'+'".to_string(),
            Token::Sub => "'-'".to_string(),
            Token::Mul => "'*'".to_string(),
            Token::Div => "'/'".to_string(),
            Token::Mod => "'%'".to_string(),
            Token::Pow => "'^'".to_string(),
            Token::Assign => "'='".to_string(),
            Token::EqCmp => "'=='".to_string(),
            Token::Ne => "'!='".to_string(),
            Token::Re => "'=~'".to_string(),
            Token::NotRe => "'!~'".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::Ge => "'>='".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Le => "'<='".to_string(),
        }
    }
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        other => other,
    }
}

pub(crate) fn lexer() -> impl Parser<char, Vec<(Token, Span)>, Error = Simple<char>> {
    // Durations must be tried before plain numbers: `5m` is one token.
    let duration_part = text::int(10)
        .then(choice((
            just("ms").to("ms".to_string()),
            one_of("smhdwy").map(|c: char| c.to_string()),
        )))
        .map(|(n, u): (String, String)| format!("{n}{u}"));
    let duration = duration_part
        .repeated()
        .at_least(1)
        .map(|parts: Vec<String>| Token::Duration(parts.concat()));

    let number = text::int(10)
        .then(just('.').then(text::digits(10)).or_not())
        .try_map(|(int_part, frac): (String, Option<(char, String)>), span| {
            let mut s = int_part;
            if let Some((dot, frac)) = frac {
                s.push(dot);
                s.push_str(&frac);
            }
            s.parse::<f64>()
                .map_err(|_| Simple::custom(span, "invalid number literal"))
        })
        .map(Token::Number);

    let double_quoted = just('"')
        .ignore_then(
            filter(|c: &char| *c != '"' && *c != '\\')
                .or(just('\\').ignore_then(any().map(unescape)))
                .repeated()
                .collect::<String>(),
        )
        .then_ignore(just('"'))
        .map(Token::Str);

    let single_quoted = just('\'')
        .ignore_then(
            filter(|c: &char| *c != '\'' && *c != '\\')
                .or(just('\\').ignore_then(any().map(unescape)))
                .repeated()
                .collect::<String>(),
        )
        .then_ignore(just('\''))
        .map(Token::Str);

    // Metric and label identifiers; colons are valid in recording-rule
    // names (`job:rate5m`).
    let ident = filter(|c: &char| c.is_ascii_alphabetic() || *c == '_')
        .chain::<char, _, _>(
            filter(|c: &char| c.is_ascii_alphanumeric() || matches!(*c, '_' | ':')).repeated(),
        )
        .collect::<String>()
        .map(Token::Ident);

    let op = choice::<_, Simple<char>>(vec![
        just("==").to(Token::EqCmp).boxed(),
        just("=~").to(Token::Re).boxed(),
        just("!=").to(Token::Ne).boxed(),
        just("!~").to(Token::NotRe).boxed(),
        just(">=").to(Token::Ge).boxed(),
        just("<=").to(Token::Le).boxed(),
        just("=").to(Token::Assign).boxed(),
        just(">").to(Token::Gt).boxed(),
        just("<").to(Token::Lt).boxed(),
        just("+").to(Token::Add).boxed(),
        just("-").to(Token::Sub).boxed(),
        just("*").to(Token::Mul).boxed(),
        just("/").to(Token::Div).boxed(),
        just("%").to(Token::Mod).boxed(),
        just("^").to(Token::Pow).boxed(),
        just("(").to(Token::LParen).boxed(),
        just(")").to(Token::RParen).boxed(),
        just("{").to(Token::LBrace).boxed(),
        just("}").to(Token::RBrace).boxed(),
        just("[").to(Token::LBracket).boxed(),
        just("]").to(Token::RBracket).boxed(),
        just(",").to(Token::Comma).boxed(),
        just(":").to(Token::Colon).boxed(),
    ]);

    let comment = just('#')
        .then(take_until(just('\n')))
        .ignored()
        .or(just('#').then(end()).ignored());

    choice((duration, number, double_quoted, single_quoted, ident, op))
        .map_with_span(|tok, span| (tok, span))
        .padded_by(comment.repeated())
        .padded()
        .repeated()
        .then_ignore(end())
}
