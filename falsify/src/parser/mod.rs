//! # STL formula syntax
//!
//! Formulas are written in the syntax of the benchmark scripts, e.g.,
//! `alw_[0,30](velocity < 120) && ev_[0,10](previous_max_velocity > 50)`. Atoms bind
//! the declared channels of an [`ExprBuilder`], and time bounds written as decimal
//! numbers are converted to sample counts using its sampling step.

use chumsky::prelude::Rich;
use itertools::Itertools;

use crate::core::expr::{Comparison, ExprBuilder, Interval, StlExpr};
use crate::{ChannelRef, FormulaSyntaxError, SyntaxIssue};

mod lexer;
mod syntax;

use lexer::{lexer, Span, Token};
use syntax::{parser, BinaryOps, Expr, Spanned, UnaryOps};

type ConvertError<'tokens, 'src> = Rich<'tokens, Token<'src>, Span>;

/// Parse a formula and bind it to the channels known to `ctx`.
pub fn parse_str(src: &str, ctx: &ExprBuilder) -> Result<StlExpr, FormulaSyntaxError> {
    use chumsky::prelude::{Input, Parser};

    let (tokens, lex_errors) = lexer().parse(src).into_output_errors();
    log::debug!("** Tokens output **");
    log::debug!("{:#?}", tokens);
    log::debug!("** Lexing Errors: {} **", lex_errors.len());

    let (parsed, parse_errors) = if let Some(tokens) = &tokens {
        parser()
            .parse(tokens.as_slice().spanned((src.len()..src.len()).into()))
            .into_output_errors()
    } else {
        (None, Vec::new())
    };

    log::debug!("** Parse output **");
    log::debug!("{:#?}", parsed);
    log::debug!("** Parse Errors: {} **", parse_errors.len());

    let (expr, expr_errors) = match parsed {
        Some((ast, span)) => match ast_to_expr(&ast, span, ctx) {
            Ok(expr) => (Some(expr), vec![]),
            Err(err) => (None, vec![err]),
        },
        None => (None, vec![]),
    };

    let issues: Vec<SyntaxIssue> = lex_errors
        .into_iter()
        .filter(|e| {
            // The recovering lexer may report a skipped character with nothing expected
            use chumsky::error::RichReason::*;
            !matches!(e.reason(), ExpectedFound { expected, found: _ } if expected.is_empty())
        })
        .map(|e| SyntaxIssue {
            span: e.span().into_range(),
            message: e.to_string(),
        })
        .chain(
            parse_errors
                .into_iter()
                .chain(expr_errors)
                .map(|e| SyntaxIssue {
                    span: e.span().into_range(),
                    message: e.to_string(),
                }),
        )
        .collect();
    log::debug!("** Total Errors: {} **", issues.len());
    log::debug!("[{}]", issues.iter().join("\n"));

    match expr {
        Some(expr) if issues.is_empty() => Ok(expr),
        _ => Err(FormulaSyntaxError {
            formula: src.to_string(),
            issues: if issues.is_empty() {
                vec![SyntaxIssue {
                    span: 0..src.len(),
                    message: "expected a formula".to_string(),
                }]
            } else {
                issues
            },
        }),
    }
}

/// Convert the bounds of a temporal operator to sample indices.
fn interval_convert<'tokens, 'src: 'tokens>(
    interval: &syntax::Interval<'src>,
    ctx: &ExprBuilder,
) -> Result<Interval, ConvertError<'tokens, 'src>> {
    let bound = |bound: Option<&Spanned<Expr<'src>>>| -> Result<Option<usize>, ConvertError<'tokens, 'src>> {
        match bound {
            None => Ok(None),
            Some((Expr::UInt(value), _)) => Ok(Some(*value as usize)),
            Some((Expr::Float(value), _)) if value.is_finite() && *value >= 0.0 => Ok(Some(ctx.steps_from_secs(*value))),
            Some((_, span)) => Err(Rich::custom(*span, "interval bounds must be non-negative numbers")),
        }
    };
    let start = bound(interval.a.as_deref())?.unwrap_or(0);
    let end = bound(interval.b.as_deref())?;
    Ok(Interval::new(start, end))
}

fn comparison(op: BinaryOps) -> Option<Comparison> {
    match op {
        BinaryOps::Lt => Some(Comparison::Less { strict: true }),
        BinaryOps::Le => Some(Comparison::Less { strict: false }),
        BinaryOps::Gt => Some(Comparison::Greater { strict: true }),
        BinaryOps::Ge => Some(Comparison::Greater { strict: false }),
        BinaryOps::Eq => Some(Comparison::Eq),
        BinaryOps::Neq => Some(Comparison::NotEq),
        _ => None,
    }
}

enum Operand {
    Channel(ChannelRef),
    Constant(f64),
}

fn operand<'tokens, 'src: 'tokens>(
    ast: &Expr<'src>,
    span: Span,
    ctx: &ExprBuilder,
) -> Result<Operand, ConvertError<'tokens, 'src>> {
    match ast {
        Expr::Int(value) => Ok(Operand::Constant(*value as f64)),
        Expr::UInt(value) => Ok(Operand::Constant(*value as f64)),
        Expr::Float(value) => Ok(Operand::Constant(*value)),
        Expr::Var { name } => ctx
            .channel(name)
            .map(Operand::Channel)
            .ok_or_else(|| Rich::custom(span, format!("unknown channel `{}`", name))),
        Expr::Channel { kind, index } => {
            let index = *index as usize;
            let channel = match *kind {
                "input" => ctx.input(index),
                "signal" | "output" => ctx.output(index),
                _ => {
                    return Err(Rich::custom(
                        span,
                        format!("unknown positional channel `{}`; expected `input`, `signal` or `output`", kind),
                    ))
                }
            };
            channel
                .map(Operand::Channel)
                .map_err(|err| Rich::custom(span, err.to_string()))
        }
        _ => Err(Rich::custom(span, "expected a channel or a number")),
    }
}

/// Convert a parsed [`Expr`] into an [`StlExpr`]
fn ast_to_expr<'tokens, 'src: 'tokens>(
    ast: &Expr<'src>,
    span: Span,
    ctx: &ExprBuilder,
) -> Result<StlExpr, ConvertError<'tokens, 'src>> {
    match ast {
        Expr::Bool(value) => Ok(ctx.bool_const(*value)),
        Expr::Int(_) | Expr::UInt(_) | Expr::Float(_) | Expr::Var { .. } | Expr::Channel { .. } => {
            Err(Rich::custom(span, "expected a formula, found a bare operand"))
        }
        Expr::Unary { op, interval, arg } => {
            let arg = Box::new(ast_to_expr(&arg.0, arg.1, ctx)?);
            let interval = match interval {
                Some((interval, ispan)) => Some((interval_convert(interval, ctx)?, *ispan)),
                None => None,
            };
            match (op, interval) {
                (UnaryOps::Not, None) => Ok(ctx.make_not(arg)),
                (UnaryOps::Next, None) => Ok(ctx.make_next(arg)),
                (UnaryOps::Not | UnaryOps::Next, Some((_, ispan))) => {
                    Err(Rich::custom(ispan, "this operator does not take an interval"))
                }
                (UnaryOps::Always, None) => Ok(ctx.make_always(arg)),
                (UnaryOps::Always, Some((interval, ispan))) => ctx
                    .make_timed_always(interval, arg)
                    .map_err(|err| Rich::custom(ispan, err.to_string())),
                (UnaryOps::Eventually, None) => Ok(ctx.make_eventually(arg)),
                (UnaryOps::Eventually, Some((interval, ispan))) => ctx
                    .make_timed_eventually(interval, arg)
                    .map_err(|err| Rich::custom(ispan, err.to_string())),
            }
        }
        Expr::Binary {
            op,
            interval,
            args: (lhs, rhs),
        } => {
            if let Some(cmp) = comparison(*op) {
                return match (operand(&lhs.0, lhs.1, ctx)?, operand(&rhs.0, rhs.1, ctx)?) {
                    (Operand::Channel(channel), Operand::Constant(threshold)) => {
                        Ok(ctx.make_atom(channel, cmp, threshold))
                    }
                    (Operand::Constant(threshold), Operand::Channel(channel)) => {
                        Ok(ctx.make_atom(channel, cmp.flip(), threshold))
                    }
                    _ => Err(Rich::custom(span, "a comparison must relate a channel to a constant")),
                };
            }

            let lhs = Box::new(ast_to_expr(&lhs.0, lhs.1, ctx)?);
            let rhs = Box::new(ast_to_expr(&rhs.0, rhs.1, ctx)?);

            match (op, interval) {
                (BinaryOps::Until, None) => Ok(ctx.make_until(lhs, rhs)),
                (BinaryOps::Until, Some((interval, ispan))) => ctx
                    .make_timed_until(interval_convert(interval, ctx)?, lhs, rhs)
                    .map_err(|err| Rich::custom(*ispan, err.to_string())),
                (_, Some((_, ispan))) => Err(Rich::custom(*ispan, "this operator does not take an interval")),
                (BinaryOps::And, None) => ctx
                    .make_and([*lhs, *rhs])
                    .map_err(|err| Rich::custom(span, err.to_string())),
                (BinaryOps::Or, None) => ctx
                    .make_or([*lhs, *rhs])
                    .map_err(|err| Rich::custom(span, err.to_string())),
                (BinaryOps::Implies, None) => ctx
                    .make_implies(lhs, rhs)
                    .map_err(|err| Rich::custom(span, err.to_string())),
                (BinaryOps::Equiv, None) => ctx
                    .make_equiv(lhs, rhs)
                    .map_err(|err| Rich::custom(span, err.to_string())),
                (_, None) => Err(Rich::custom(span, "unexpected comparison operator")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::core::expr::arbitrary;

    fn context() -> ExprBuilder {
        let mut ctx = ExprBuilder::new().with_signal_step(0.5).with_widths(2, 3);
        ctx.declare("throttle", ChannelRef::Input(0)).unwrap();
        ctx.declare("velocity", ChannelRef::Output(0)).unwrap();
        ctx.declare("rotation", ChannelRef::Output(1)).unwrap();
        ctx
    }

    #[test]
    fn atoms() {
        let ctx = context();
        let cases = [
            ("velocity < 120", ctx.make_lt(ChannelRef::Output(0), 120.0)),
            ("120 > velocity", ctx.make_lt(ChannelRef::Output(0), 120.0)),
            ("signal(2) >= -1.5", ctx.make_ge(ChannelRef::Output(2), -1.5)),
            ("output(1) == 3", ctx.make_eq(ChannelRef::Output(1), 3.0)),
            ("input(0) != 0", ctx.make_neq(ChannelRef::Input(0), 0.0)),
            ("throttle <= 40", ctx.make_le(ChannelRef::Input(0), 40.0)),
        ];
        for (src, expected) in cases {
            assert_eq!(parse_str(src, &ctx).unwrap(), expected, "parsing `{}`", src);
        }
    }

    #[test]
    fn temporal_operators() {
        let ctx = context();
        let x = Box::new(ctx.make_lt(ChannelRef::Output(0), 120.0));
        let y = Box::new(ctx.make_gt(ChannelRef::Output(1), 4000.0));

        let alw = ctx.make_timed_always((0..=4).into(), x.clone()).unwrap();
        for src in [
            "alw_[0,4](velocity < 120)",
            "[]_[0,4] velocity < 120",
            "G[0,4] (velocity < 120)",
            "always[0,4] velocity < 120",
            // decimal bounds are seconds: 2.0 / 0.5 = 4 samples
            "alw_[0.0,2.0](velocity < 120)",
        ] {
            assert_eq!(parse_str(src, &ctx).unwrap(), alw, "parsing `{}`", src);
        }

        let ev = ctx.make_eventually(y.clone());
        assert_eq!(parse_str("ev(rotation > 4000)", &ctx).unwrap(), ev);
        assert_eq!(parse_str("<> rotation > 4000", &ctx).unwrap(), ev);

        let open = ctx.make_timed_eventually(Interval::new(3, None), y.clone()).unwrap();
        assert_eq!(parse_str("ev_[3,](rotation > 4000)", &ctx).unwrap(), open);

        let until = ctx.make_timed_until((1..=2).into(), x.clone(), y.clone()).unwrap();
        assert_eq!(parse_str("(velocity < 120) U_[1,2] (rotation > 4000)", &ctx).unwrap(), until);

        let next = ctx.make_next(x);
        assert_eq!(parse_str("X velocity < 120", &ctx).unwrap(), next);
    }

    #[test]
    fn boolean_connectives() {
        let ctx = context();
        let x = ctx.make_lt(ChannelRef::Output(0), 120.0);
        let y = ctx.make_gt(ChannelRef::Output(1), 4000.0);

        assert_eq!(
            parse_str("velocity < 120 && rotation > 4000", &ctx).unwrap(),
            ctx.make_and([x.clone(), y.clone()]).unwrap()
        );
        assert_eq!(
            parse_str("velocity < 120 -> rotation > 4000", &ctx).unwrap(),
            ctx.make_or([ctx.make_not(Box::new(x.clone())), y.clone()]).unwrap()
        );
        assert_eq!(
            parse_str("velocity < 120 <-> rotation > 4000", &ctx).unwrap(),
            ctx.make_equiv(Box::new(x.clone()), Box::new(y.clone())).unwrap()
        );
        assert_eq!(
            parse_str("!(velocity < 120) || true // trailing comment", &ctx).unwrap(),
            ctx.make_or([ctx.make_not(Box::new(x)), ctx.bool_const(true)]).unwrap()
        );
    }

    #[test]
    fn second_bounds_at_fine_steps() {
        let cases = [
            (0.1, "alw_[0.0, 0.3] (x < 1)", 0, 3),
            (0.1, "alw_[0.0, 2.3] (x < 1)", 0, 23),
            (0.1, "alw_[0.1, 0.5] (x < 1)", 1, 5),
            (0.2, "ev_[0.2, 0.6] (x < 1)", 1, 3),
            (0.2, "ev_[0.0, 1.4] (x < 1)", 0, 7),
            (0.2, "ev_[0.0, 0.5] (x < 1)", 0, 2),
            (0.01, "alw_[0.07, 1.13] (x < 1)", 7, 113),
        ];
        for (step, src, start, end) in cases {
            let mut ctx = ExprBuilder::new().with_signal_step(step);
            ctx.declare("x", ChannelRef::Output(0)).unwrap();
            let expr = parse_str(src, &ctx).unwrap();
            let interval = match &expr {
                StlExpr::Always(node) => node.interval,
                StlExpr::Eventually(node) => node.interval,
                other => panic!("unexpected formula {}", other),
            };
            assert_eq!(interval, Interval::new(start, Some(end)), "parsing `{}` at step {}", src, step);
            assert_eq!(expr.horizon(), Some(end));
        }
    }

    #[test]
    fn unknown_channel_reports_its_span() {
        let ctx = context();
        let src = "alw_[0,4](gear < 3)";
        let err = parse_str(src, &ctx).unwrap_err();
        assert_eq!(err.formula, src);
        assert_eq!(err.issues.len(), 1);
        assert_eq!(&src[err.issues[0].span.clone()], "gear");
        assert!(err.issues[0].message.contains("unknown channel"));
    }

    #[test]
    fn malformed_formulas() {
        let ctx = context();
        for src in [
            "",
            "velocity <",
            "velocity < 120 &&",
            "alw_[4,2](velocity < 120)",
            "alw_[-1.0,2](velocity < 120)",
            "velocity < rotation",
            "signal(3) < 1",
            "probe(0) < 1",
            "![0,1] velocity < 120",
            "(velocity < 120",
        ] {
            let err = parse_str(src, &ctx).unwrap_err();
            assert!(!err.issues.is_empty(), "no issue reported for `{}`", src);
        }
    }

    proptest! {
        #[test]
        fn display_reparses(expr in arbitrary::stl_expr()) {
            let ctx = ExprBuilder::new();
            let once = parse_str(&expr.to_string(), &ctx).unwrap();
            let twice = parse_str(&once.to_string(), &ctx).unwrap();
            assert_eq!(once, twice);
        }
    }
}
