use super::utils::lemire_minmax::MonoWedge;
use super::Trace;
use crate::core::expr::*;
use crate::{Error, FalsifyResult, Signal};

/// Quantitative semantics for Signal Temporal Logic expressions defined by an
/// [`StlExpr`].
///
/// The robustness of a formula is a signed distance to its satisfaction: positive
/// values mean satisfied, negative values mean violated. The robustness signal of a
/// temporal operator is only defined at the samples whose window fits in the trace,
/// so it is a prefix of the trace.
pub struct QuantitativeSemantics;

impl QuantitativeSemantics {
    /// Evaluates a [formula](StlExpr) given a [`Trace`].
    pub fn eval(expr: &StlExpr, trace: &impl Trace) -> FalsifyResult<Signal<f64>> {
        let ret = match expr {
            StlExpr::BoolLit(val) => Signal::constant(top_or_bot(val.0)),
            StlExpr::Atom(Atom { channel, op, threshold }) => {
                let signal = trace.signal(*channel).ok_or(Error::SignalNotPresent(*channel))?;
                let c = *threshold;
                match op {
                    Comparison::Less { strict: _ } => signal.map(|&x| c - x),
                    Comparison::Greater { strict: _ } => signal.map(|&x| x - c),
                    Comparison::Eq => signal.map(|&x| -(x - c).abs()),
                    Comparison::NotEq => signal.map(|&x| (x - c).abs()),
                }
            }
            StlExpr::Not(Not { arg }) => Self::eval(arg, trace)?.negate(),
            StlExpr::And(And { args }) => {
                args.iter()
                    .map(|arg| Self::eval(arg, trace))
                    .try_fold(Signal::constant(f64::INFINITY), |acc, item| {
                        let item = item?;
                        Ok::<_, Error>(acc.min(&item))
                    })?
            }
            StlExpr::Or(Or { args }) => {
                args.iter()
                    .map(|arg| Self::eval(arg, trace))
                    .try_fold(Signal::constant(f64::NEG_INFINITY), |acc, item| {
                        let item = item?;
                        Ok::<_, Error>(acc.max(&item))
                    })?
            }
            StlExpr::Always(Always { arg, interval }) => {
                let arg = Self::eval(arg, trace)?;
                compute_always(arg, interval, trace.len())
            }
            StlExpr::Eventually(Eventually { arg, interval }) => {
                let arg = Self::eval(arg, trace)?;
                compute_eventually(arg, interval, trace.len())
            }
            StlExpr::Until(Until { lhs, rhs, interval }) => {
                let lhs = Self::eval(lhs, trace)?;
                let rhs = Self::eval(rhs, trace)?;
                compute_until(lhs, rhs, interval, trace.len())
            }
        };
        Ok(ret)
    }

    /// The robustness of a formula at time 0.
    ///
    /// Returns `None` if the formula is undefined at time 0, i.e., its look-ahead
    /// doesn't fit in the trace.
    pub fn robustness(expr: &StlExpr, trace: &impl Trace) -> FalsifyResult<Option<f64>> {
        if trace.is_empty() {
            return Ok(None);
        }
        Ok(Self::eval(expr, trace)?.at(0).copied())
    }
}

/// Compute always for a signal
fn compute_always(signal: Signal<f64>, interval: &Interval, len: usize) -> Signal<f64> {
    let values = signal.materialize(len);
    window_extremum(&values, interval, MonoWedge::min_wedge(), f64::min)
}

/// Compute eventually for a signal
fn compute_eventually(signal: Signal<f64>, interval: &Interval, len: usize) -> Signal<f64> {
    let values = signal.materialize(len);
    window_extremum(&values, interval, MonoWedge::max_wedge(), f64::max)
}

/// Extremum of `values` over the window `t + interval`, for every `t` whose window
/// fits in `values`.
fn window_extremum(
    values: &[f64],
    interval: &Interval,
    wedge: MonoWedge<f64>,
    combine: fn(f64, f64) -> f64,
) -> Signal<f64> {
    let a = interval.start;
    if a >= values.len() || interval.is_empty() {
        return Signal::Empty;
    }
    let shifted = &values[a..];
    match interval.end {
        Some(b) => wedge.sliding(shifted, b - a).into_iter().collect(),
        None => {
            // Unbounded: the extremum of every suffix, computed from the back.
            let mut ret = shifted.to_vec();
            for i in (0..ret.len().saturating_sub(1)).rev() {
                ret[i] = combine(ret[i], ret[i + 1]);
            }
            ret.into_iter().collect()
        }
    }
}

/// Compute until
///
/// For every `t`, the maximum over `t'` in `t + interval` of
/// `min(rhs(t'), min over s in [t, t') of lhs(s))`.
fn compute_until(lhs: Signal<f64>, rhs: Signal<f64>, interval: &Interval, len: usize) -> Signal<f64> {
    if interval.is_empty() {
        return Signal::Empty;
    }
    let lhs = lhs.materialize(len);
    let rhs = rhs.materialize(len);
    let n = lhs.len().min(rhs.len());
    let a = interval.start;

    let mut ret = Signal::with_capacity(n);
    for t in 0..n {
        let last = match interval.end {
            Some(b) if t + b < n => t + b,
            Some(_) => break,
            None if t + a < n => n - 1,
            None => break,
        };
        let mut lhs_min = lhs[t..t + a].iter().copied().fold(f64::INFINITY, f64::min);
        let mut value = f64::NEG_INFINITY;
        for t_prime in (t + a)..=last {
            value = value.max(rhs[t_prime].min(lhs_min));
            lhs_min = lhs_min.min(lhs[t_prime]);
        }
        // Pushing to a sampled signal can't fail.
        let _ = ret.push(value);
    }
    if ret.is_empty() {
        Signal::Empty
    } else {
        ret
    }
}

fn top_or_bot(value: bool) -> f64 {
    if value {
        f64::INFINITY
    } else {
        f64::NEG_INFINITY
    }
}
