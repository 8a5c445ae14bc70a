use chumsky::input::ValueInput;
use chumsky::prelude::*;

use super::lexer::{Span, Token};

pub type Spanned<T> = (T, Span);

pub(crate) type Error<'tokens, 'src> = extra::Err<Rich<'tokens, Token<'src>, Span>>;

#[derive(Clone, Debug, PartialEq, Eq, Copy)]
pub enum UnaryOps {
    Not,
    Next,
    Always,
    Eventually,
}

#[derive(Clone, Debug, PartialEq, Eq, Copy)]
pub enum BinaryOps {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Neq,
    And,
    Or,
    Implies,
    Equiv,
    Until,
}

/// Bounds of a temporal operator, as written.
#[derive(Clone, Debug, PartialEq)]
pub struct Interval<'src> {
    pub a: Option<Box<Spanned<Expr<'src>>>>,
    pub b: Option<Box<Spanned<Expr<'src>>>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr<'src> {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// A named channel
    Var {
        name: &'src str,
    },
    /// A positional channel, e.g., `signal(3)`
    Channel {
        kind: &'src str,
        index: u64,
    },
    Unary {
        op: UnaryOps,
        interval: Option<Spanned<Interval<'src>>>,
        arg: Box<Spanned<Self>>,
    },
    Binary {
        op: BinaryOps,
        interval: Option<Spanned<Interval<'src>>>,
        args: (Box<Spanned<Self>>, Box<Spanned<Self>>),
    },
}

impl<'src> Expr<'src> {
    fn binary(op: BinaryOps, interval: Option<Spanned<Interval<'src>>>, lhs: Spanned<Self>, rhs: Spanned<Self>) -> Spanned<Self> {
        let span = Span::new(lhs.1.start, rhs.1.end);
        (
            Self::Binary {
                op,
                interval,
                args: (Box::new(lhs), Box::new(rhs)),
            },
            span,
        )
    }
}

/// Fold `first op1 e1 op2 e2 ...` into `first op1 (e1 op2 (e2 ...))`.
fn fold_right<'src>(first: Spanned<Expr<'src>>, mut rest: Vec<(BinaryOps, Spanned<Expr<'src>>)>) -> Spanned<Expr<'src>> {
    let Some((mut op, mut acc)) = rest.pop() else {
        return first;
    };
    while let Some((prev_op, operand)) = rest.pop() {
        acc = Expr::binary(op, None, operand, acc);
        op = prev_op;
    }
    Expr::binary(op, None, first, acc)
}

pub fn parser<'tokens, 'src: 'tokens, I>() -> impl Parser<'tokens, I, Spanned<Expr<'src>>, Error<'tokens, 'src>> + Clone
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = Span>,
{
    let number = select! {
        Token::Int(val) => Expr::Int(val),
        Token::UInt(val) => Expr::UInt(val),
        Token::Float(val) => Expr::Float(val),
    }
    .labelled("number");

    let index = select! { Token::UInt(val) => val }.labelled("channel index");

    let channel = select! { Token::Ident(name) => name }
        .then(index.delimited_by(just(Token::LParen), just(Token::RParen)).or_not())
        .map(|(name, index)| match index {
            Some(index) => Expr::Channel { kind: name, index },
            None => Expr::Var { name },
        })
        .labelled("channel");

    let operand = channel.or(number).map_with(|expr, e| (expr, e.span())).boxed();

    let cmp_op = choice((
        just(Token::Lt).to(BinaryOps::Lt),
        just(Token::Le).to(BinaryOps::Le),
        just(Token::Gt).to(BinaryOps::Gt),
        just(Token::Ge).to(BinaryOps::Ge),
        just(Token::Eq).to(BinaryOps::Eq),
        just(Token::Neq).to(BinaryOps::Neq),
    ))
    .labelled("comparison operator");

    let atom = operand
        .clone()
        .then(cmp_op)
        .then(operand)
        .map(|((lhs, op), rhs)| Expr::binary(op, None, lhs, rhs))
        .labelled("atomic predicate");

    let bool_lit = select! { Token::Bool(val) => Expr::Bool(val) }
        .map_with(|expr, e| (expr, e.span()))
        .labelled("boolean literal");

    let bound = select! {
        Token::UInt(val) => Expr::UInt(val),
        Token::Float(val) => Expr::Float(val),
        Token::Int(val) => Expr::Int(val),
    }
    .map_with(|expr, e| (expr, e.span()))
    .labelled("interval bound");

    let interval = bound
        .clone()
        .or_not()
        .then_ignore(just(Token::Comma))
        .then(bound.or_not())
        .delimited_by(just(Token::LBracket), just(Token::RBracket))
        .map_with(|(a, b), e| {
            (
                Interval {
                    a: a.map(Box::new),
                    b: b.map(Box::new),
                },
                e.span(),
            )
        })
        .labelled("interval")
        .boxed();

    recursive(|formula| {
        let parens = formula
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .map_with(|(expr, _), e| (expr, e.span()));

        let primary = choice((atom, bool_lit, parens)).boxed();

        let unary_op = choice((
            just(Token::Not).to(UnaryOps::Not),
            just(Token::Next).to(UnaryOps::Next),
            just(Token::Always).to(UnaryOps::Always),
            just(Token::Eventually).to(UnaryOps::Eventually),
        ))
        .map_with(|op, e| (op, e.span()))
        .then(interval.clone().or_not());

        let unary = unary_op
            .repeated()
            .foldr(
                primary,
                |((op, op_span), interval): ((UnaryOps, Span), Option<Spanned<Interval<'src>>>),
                 arg: Spanned<Expr<'src>>| {
                    let span = Span::new(op_span.start, arg.1.end);
                    (
                        Expr::Unary {
                            op,
                            interval,
                            arg: Box::new(arg),
                        },
                        span,
                    )
                },
            )
            .labelled("unary expression")
            .boxed();

        let until = unary
            .clone()
            .foldl(
                just(Token::Until)
                    .ignore_then(interval.or_not())
                    .then(unary)
                    .repeated(),
                |lhs, (interval, rhs)| Expr::binary(BinaryOps::Until, interval, lhs, rhs),
            )
            .boxed();

        let and = until
            .clone()
            .foldl(just(Token::And).ignore_then(until).repeated(), |lhs, rhs| {
                Expr::binary(BinaryOps::And, None, lhs, rhs)
            })
            .boxed();

        let or = and
            .clone()
            .foldl(just(Token::Or).ignore_then(and).repeated(), |lhs, rhs| {
                Expr::binary(BinaryOps::Or, None, lhs, rhs)
            })
            .boxed();

        let imp_op = choice((
            just(Token::Implies).to(BinaryOps::Implies),
            just(Token::Equiv).to(BinaryOps::Equiv),
        ));

        or.clone()
            .then(imp_op.then(or).repeated().collect::<Vec<_>>())
            .map(|(first, rest)| fold_right(first, rest))
            .labelled("formula")
    })
    .then_ignore(end())
}
