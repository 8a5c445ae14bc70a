use std::fmt;

use chumsky::prelude::*;

pub(crate) type Span = SimpleSpan<usize>;
pub(crate) type Output<'a> = Vec<(Token<'a>, Span)>;
pub(crate) type Error<'a> = extra::Err<Rich<'a, char, Span>>;

#[derive(Clone, Debug, PartialEq)]
pub enum Token<'src> {
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Ident(&'src str),
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Neq,
    Not,
    And,
    Or,
    Implies,
    Equiv,
    Next,
    Always,
    Eventually,
    Until,
}

impl<'src> fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sym = match self {
            Token::Bool(val) => return write!(f, "{}", val),
            Token::Int(val) => return write!(f, "{}", val),
            Token::UInt(val) => return write!(f, "{}", val),
            Token::Float(val) => return write!(f, "{}", val),
            Token::Ident(ident) => return write!(f, "{}", ident),
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Comma => ",",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::Eq => "==",
            Token::Neq => "!=",
            Token::Not => "!",
            Token::And => "&&",
            Token::Or => "||",
            Token::Implies => "->",
            Token::Equiv => "<->",
            Token::Next => "X",
            Token::Always => "alw_",
            Token::Eventually => "ev_",
            Token::Until => "U_",
        };
        f.write_str(sym)
    }
}

/// Classify a numeric literal: anything with a fraction or an exponent is a float, a
/// signed integer is an `Int`, and an unsigned one a `UInt`.
fn number_token<'src>(lit: &'src str, span: Span) -> Result<Token<'src>, Rich<'src, char, Span>> {
    let invalid = |kind: &str, err: &dyn fmt::Display| {
        Rich::custom(span, format!("`{}` is not a valid {}: {}", lit, kind, err))
    };
    if lit.contains(['.', 'e', 'E']) {
        lit.parse().map(Token::Float).map_err(|err| invalid("64-bit float", &err))
    } else if lit.starts_with(['+', '-']) {
        lit.parse().map(Token::Int).map_err(|err| invalid("64-bit signed integer", &err))
    } else {
        lit.parse().map(Token::UInt).map_err(|err| invalid("64-bit unsigned integer", &err))
    }
}

pub fn lexer<'src>() -> impl Parser<'src, &'src str, Output<'src>, Error<'src>> {
    let digits = text::digits(10).to_slice();
    let frac = just('.').then(digits.or_not());
    let exp = one_of("eE").then(one_of("+-").or_not()).then(digits);

    // `1`, `-1`, `+1.`, `.5`, `1e-3`, ...
    let number = one_of("+-")
        .or_not()
        .then(choice((digits.then(frac.or_not()).ignored(), frac.ignored())))
        .then(exp.or_not())
        .to_slice()
        .try_map_with(|lit, e| number_token(lit, e.span()))
        .labelled("number")
        .boxed();

    // A parser for control characters (delimiters, commas)
    let ctrl = choice((
        just("[").to(Token::LBracket),
        just("]").to(Token::RBracket),
        just("(").to(Token::LParen),
        just(")").to(Token::RParen),
        just(",").to(Token::Comma),
    ))
    .labelled("control token");

    // Lexer for operator symbols
    let op = choice((
        just("<->").to(Token::Equiv),
        just("<=>").to(Token::Equiv),
        just("<=").to(Token::Le),
        just("<").to(Token::Lt),
        just(">=").to(Token::Ge),
        just(">").to(Token::Gt),
        just("!=").to(Token::Neq),
        just("==").to(Token::Eq),
        just("->").to(Token::Implies),
        just("=>").to(Token::Implies),
        just("!").to(Token::Not),
        just("~").to(Token::Not),
        just("\u{00ac}").to(Token::Not), // ¬
        just("&&").to(Token::And),
        just("&").to(Token::And),
        just("\u{2227}").to(Token::And), // ∧
        just("||").to(Token::Or),
        just("|").to(Token::Or),
        just("\u{2228}").to(Token::Or), // ∨
    ))
    .labelled("operator token");

    // Must run before `ctrl` and `op`, which would split `[]` and `<>`
    let temporal_op = choice((
        just("[]_").to(Token::Always),
        just("[]").to(Token::Always),
        just("<>_").to(Token::Eventually),
        just("<>").to(Token::Eventually),
        just("\u{25cb}").to(Token::Next),       // ○
        just("\u{25ef}").to(Token::Next),       // ◯
        just("\u{25c7}").to(Token::Eventually), // ◇
        just("\u{25a1}").to(Token::Always),     // □
    ))
    .labelled("temporal operator token");

    // A parser for quoted channel names, e.g., names that clash with keywords
    let quoted_ident = none_of('"')
        .repeated()
        .to_slice()
        .delimited_by(just('"'), just('"'))
        .map(Token::Ident)
        .labelled("quoted identifier");

    // A parser for identifiers and keywords
    let ident = text::ident()
        .map(|ident: &str| match ident {
            "true" | "TRUE" => Token::Bool(true),
            "false" | "FALSE" => Token::Bool(false),
            "G" | "alw" | "alw_" | "always" | "globally" => Token::Always,
            "F" | "ev" | "ev_" | "eventually" | "finally" => Token::Eventually,
            "X" | "next" => Token::Next,
            "U" | "U_" | "until" => Token::Until,
            _ => Token::Ident(ident),
        })
        .labelled("identifier");

    // A single token can be one of the above
    let token = choice((temporal_op, op, ctrl, quoted_ident, ident, number)).boxed();

    let comment = just("//").then(any().and_is(just('\n').not()).repeated()).padded();

    token
        .map_with(|tok, e| (tok, e.span()))
        .padded_by(comment.repeated())
        .padded()
        // If we encounter an error, skip and attempt to lex the next character as a token instead
        .recover_with(skip_then_retry_until(any().ignored(), end()))
        .repeated()
        .collect()
}
