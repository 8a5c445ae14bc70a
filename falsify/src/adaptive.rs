//! The properties under test
//!
//! Each property is tracked with a status and a list of strengthened candidates.
//! Candidates are obtained by disjunction elimination: `φ || ψ` is strengthened to
//! `φ` and to `ψ`, and the temporal operators and conjunctions distribute over the
//! candidates of their operands. The robustness of a candidate never exceeds the
//! robustness of the property, so minimizing over candidates pulls the search toward
//! the boundary of the strongest variant first. A candidate that is violated by a
//! trace satisfying the property is spurious and is weakened away.

use std::fmt;

use crate::core::expr::*;
use crate::semantics::{QuantitativeSemantics, Trace};
use crate::FalsifyResult;

/// Maximum number of strengthened candidates of one property
pub const MAX_CANDIDATES: usize = 16;

/// Status of a property under test
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    /// Still searched for a counterexample
    Active,
    /// A counterexample was found
    Falsified,
    /// The search budget ran out before a counterexample was found
    Exhausted,
}

impl fmt::Display for PropertyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyStatus::Active => write!(f, "active"),
            PropertyStatus::Falsified => write!(f, "falsified"),
            PropertyStatus::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Strengthen `expr` by disjunction elimination.
///
/// Returns `[expr]` when the formula has no disjunction to eliminate or when it would
/// produce more than [`MAX_CANDIDATES`] candidates.
pub fn strengthen(expr: &StlExpr) -> Vec<StlExpr> {
    let candidates = candidates(expr);
    if candidates.is_empty() || candidates.len() > MAX_CANDIDATES {
        vec![expr.clone()]
    } else {
        candidates
    }
}

/// Strictly stronger variants of `expr`; empty if there is none.
fn candidates(expr: &StlExpr) -> Vec<StlExpr> {
    let or_self = |expr: &StlExpr| {
        let ret = candidates(expr);
        if ret.is_empty() {
            vec![expr.clone()]
        } else {
            ret
        }
    };
    match expr {
        StlExpr::Or(Or { args }) => args.iter().flat_map(or_self).collect(),
        StlExpr::And(And { args }) => args
            .iter()
            .enumerate()
            .flat_map(|(i, arg)| {
                candidates(arg).into_iter().map(move |c| {
                    let mut args = args.clone();
                    args[i] = c;
                    StlExpr::from(And { args })
                })
            })
            .collect(),
        StlExpr::Always(Always { arg, interval }) => candidates(arg)
            .into_iter()
            .map(|c| {
                StlExpr::from(Always {
                    arg: Box::new(c),
                    interval: *interval,
                })
            })
            .collect(),
        StlExpr::Eventually(Eventually { arg, interval }) => candidates(arg)
            .into_iter()
            .map(|c| {
                StlExpr::from(Eventually {
                    arg: Box::new(c),
                    interval: *interval,
                })
            })
            .collect(),
        StlExpr::Until(Until { lhs, rhs, interval }) => candidates(rhs)
            .into_iter()
            .map(|c| {
                StlExpr::from(Until {
                    lhs: lhs.clone(),
                    rhs: Box::new(c),
                    interval: *interval,
                })
            })
            .collect(),
        StlExpr::BoolLit(_) | StlExpr::Atom(_) | StlExpr::Not(_) => Vec::new(),
    }
}

/// One property under test
#[derive(Clone, Debug)]
pub struct AdaptiveProperty {
    formula: StlExpr,
    status: PropertyStatus,
    candidates: Vec<StlExpr>,
}

impl AdaptiveProperty {
    pub fn new(formula: StlExpr) -> Self {
        let candidates = strengthen(&formula);
        Self {
            formula,
            status: PropertyStatus::Active,
            candidates,
        }
    }

    pub fn formula(&self) -> &StlExpr {
        &self.formula
    }

    pub fn status(&self) -> PropertyStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == PropertyStatus::Active
    }

    /// The current strengthened candidates.
    pub fn candidates(&self) -> &[StlExpr] {
        &self.candidates
    }

    /// Robustness of the property itself at time 0
    pub fn robustness(&self, trace: &impl Trace) -> FalsifyResult<Option<f64>> {
        QuantitativeSemantics::robustness(&self.formula, trace)
    }

    /// The search objective: the minimum robustness over the property and its
    /// candidates, or `None` if the property is undefined on `trace`.
    pub fn objective(&self, trace: &impl Trace) -> FalsifyResult<Option<f64>> {
        let Some(mut objective) = self.robustness(trace)? else {
            return Ok(None);
        };
        for candidate in &self.candidates {
            if let Some(rob) = QuantitativeSemantics::robustness(candidate, trace)? {
                objective = objective.min(rob);
            }
        }
        Ok(Some(objective))
    }

    /// Remove the candidates violated by `trace`, returning how many were removed.
    ///
    /// Must only be called with a trace that satisfies the property.
    fn weaken(&mut self, trace: &impl Trace) -> FalsifyResult<usize> {
        let before = self.candidates.len();
        let mut kept = Vec::with_capacity(before);
        for candidate in self.candidates.drain(..) {
            match QuantitativeSemantics::robustness(&candidate, trace)? {
                Some(rob) if rob < 0.0 => {
                    log::debug!("weakening away spurious candidate `{}`", candidate);
                }
                _ => kept.push(candidate),
            }
        }
        self.candidates = kept;
        Ok(before - self.candidates.len())
    }
}

impl fmt::Display for AdaptiveProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.formula, self.status)
    }
}

/// The ordered list of properties of one repetition
#[derive(Clone, Debug)]
pub struct AdaptiveStlList {
    properties: Vec<AdaptiveProperty>,
    signal_length: usize,
    revision: u64,
}

impl AdaptiveStlList {
    /// Track `formulas` over traces of `signal_length` samples.
    pub fn new<I>(formulas: I, signal_length: usize) -> Self
    where
        I: IntoIterator<Item = StlExpr>,
    {
        let properties: Vec<_> = formulas.into_iter().map(AdaptiveProperty::new).collect();
        for property in &properties {
            match property.formula.horizon() {
                Some(h) if h >= signal_length => log::warn!(
                    "`{}` looks {} samples ahead and is undefined on signals of length {}",
                    property.formula,
                    h,
                    signal_length
                ),
                None => log::debug!(
                    "`{}` has an unbounded operator; it is evaluated up to the end of the signal",
                    property.formula
                ),
                _ => {}
            }
        }
        Self {
            properties,
            signal_length,
            revision: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn signal_length(&self) -> usize {
        self.signal_length
    }

    pub fn get(&self, index: usize) -> Option<&AdaptiveProperty> {
        self.properties.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AdaptiveProperty> {
        self.properties.iter()
    }

    /// Bumped on every status or candidate change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn active_count(&self) -> usize {
        self.properties.iter().filter(|p| p.is_active()).count()
    }

    /// `true` once no property is [`Active`](PropertyStatus::Active).
    pub fn all_resolved(&self) -> bool {
        self.active_count() == 0
    }

    /// The robustness of every active property with a defined verdict on `trace`
    pub fn evaluate(&self, trace: &impl Trace) -> FalsifyResult<Vec<(usize, f64)>> {
        let mut ret = Vec::new();
        for (i, property) in self.properties.iter().enumerate() {
            if !property.is_active() {
                continue;
            }
            if let Some(rob) = property.robustness(trace)? {
                ret.push((i, rob));
            }
        }
        Ok(ret)
    }

    /// The minimum search objective over the active properties, or `None` if no active
    /// property is defined on `trace`.
    pub fn min_robustness(&self, trace: &impl Trace) -> FalsifyResult<Option<f64>> {
        let mut ret: Option<f64> = None;
        for property in self.properties.iter().filter(|p| p.is_active()) {
            if let Some(obj) = property.objective(trace)? {
                ret = Some(ret.map_or(obj, |r| r.min(obj)));
            }
        }
        Ok(ret)
    }

    /// Mark an active property as falsified.
    pub fn mark_falsified(&mut self, index: usize) {
        if let Some(property) = self.properties.get_mut(index) {
            if property.is_active() {
                property.status = PropertyStatus::Falsified;
                self.revision += 1;
            }
        }
    }

    /// Weaken away the candidates of the active properties that `trace` shows to be
    /// spurious. Returns the number of candidates removed.
    pub fn weaken(&mut self, trace: &impl Trace) -> FalsifyResult<usize> {
        let mut removed = 0;
        for property in self.properties.iter_mut().filter(|p| p.is_active()) {
            if matches!(property.robustness(trace)?, Some(rob) if rob >= 0.0) {
                removed += property.weaken(trace)?;
            }
        }
        if removed > 0 {
            self.revision += 1;
        }
        Ok(removed)
    }

    /// Score `trace`: every active property it violates is marked falsified, and the
    /// spurious candidates of the others are weakened away.
    ///
    /// Returns the newly falsified properties with their robustness, in list order.
    pub fn report(&mut self, trace: &impl Trace) -> FalsifyResult<Vec<(usize, f64)>> {
        let falsified: Vec<_> = self.evaluate(trace)?.into_iter().filter(|(_, rob)| *rob < 0.0).collect();
        for &(i, _) in &falsified {
            self.mark_falsified(i);
        }
        self.weaken(trace)?;
        Ok(falsified)
    }

    /// Mark every remaining active property as exhausted.
    pub fn mark_exhausted_remaining(&mut self) {
        for property in self.properties.iter_mut().filter(|p| p.is_active()) {
            property.status = PropertyStatus::Exhausted;
            self.revision += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IoTrace;

    fn trace_of(x: &[f64], y: &[f64]) -> IoTrace {
        let mut trace = IoTrace::default();
        for (&x, &y) in x.iter().zip(y) {
            trace.push(vec![0], vec![0.0], vec![x, y], vec![0, 0]);
        }
        trace
    }

    #[test]
    fn disjunction_elimination() {
        let ctx = ExprBuilder::new();
        let x = ctx.make_lt(ChannelRef::Output(0), 1.0);
        let y = ctx.make_gt(ChannelRef::Output(1), 2.0);
        let z = ctx.make_le(ChannelRef::Output(1), 5.0);

        assert_eq!(strengthen(&x), vec![x.clone()]);

        let or = ctx.make_or([x.clone(), y.clone()]).unwrap();
        assert_eq!(strengthen(&or), vec![x.clone(), y.clone()]);

        let alw = ctx.make_timed_always((0..=3).into(), Box::new(or.clone())).unwrap();
        assert_eq!(
            strengthen(&alw),
            vec![
                ctx.make_timed_always((0..=3).into(), Box::new(x.clone())).unwrap(),
                ctx.make_timed_always((0..=3).into(), Box::new(y.clone())).unwrap(),
            ]
        );

        let and = ctx.make_and([z.clone(), or.clone()]).unwrap();
        assert_eq!(
            strengthen(&and),
            vec![
                ctx.make_and([z.clone(), x.clone()]).unwrap(),
                ctx.make_and([z.clone(), y.clone()]).unwrap(),
            ]
        );

        let until = ctx.make_until(Box::new(or.clone()), Box::new(or.clone()));
        assert_eq!(strengthen(&until).len(), 2);

        // negation is not strengthened
        let not = ctx.make_not(Box::new(or));
        assert_eq!(strengthen(&not), vec![not]);
    }

    #[test]
    fn candidate_count_is_capped() {
        let ctx = ExprBuilder::new();
        let or = |i: usize| {
            ctx.make_or((0..3).map(|j| ctx.make_lt(ChannelRef::Output(i), j as f64)))
                .unwrap()
        };
        // conjuncts are strengthened one at a time, not as a product
        let spec = ctx.make_always(Box::new(ctx.make_and([or(0), or(1)]).unwrap()));
        assert_eq!(strengthen(&spec).len(), 6);

        let wide = ctx.make_or((0..20).map(|j| ctx.make_lt(ChannelRef::Output(0), j as f64))).unwrap();
        assert_eq!(strengthen(&wide), vec![wide.clone()]);
    }

    #[test]
    fn falsified_properties_are_excluded() {
        let ctx = ExprBuilder::new();
        let x_lt_35 = ctx
            .make_timed_always((0..=4).into(), Box::new(ctx.make_lt(ChannelRef::Output(0), 35.0)))
            .unwrap();
        let y_gt_0 = ctx
            .make_timed_always((0..=4).into(), Box::new(ctx.make_gt(ChannelRef::Output(1), 0.0)))
            .unwrap();
        let mut list = AdaptiveStlList::new([x_lt_35, y_gt_0], 5);

        let ok = trace_of(&[35.0; 5], &[3.0; 5]);
        assert_eq!(list.evaluate(&ok).unwrap(), vec![(0, 0.0), (1, 3.0)]);
        assert_eq!(list.min_robustness(&ok).unwrap(), Some(0.0));
        assert!(list.report(&ok).unwrap().is_empty());

        let bad = trace_of(&[35.0, 35.0, 36.0, 35.0, 35.0], &[3.0; 5]);
        let revision = list.revision();
        assert_eq!(list.report(&bad).unwrap(), vec![(0, -1.0)]);
        assert!(list.revision() > revision);
        assert_eq!(list.get(0).unwrap().status(), PropertyStatus::Falsified);

        // the falsified property no longer drives the fitness
        assert_eq!(list.min_robustness(&bad).unwrap(), Some(3.0));
        assert_eq!(list.evaluate(&bad).unwrap(), vec![(1, 3.0)]);

        list.mark_exhausted_remaining();
        assert_eq!(list.get(1).unwrap().status(), PropertyStatus::Exhausted);
        assert!(list.all_resolved());
        assert_eq!(list.min_robustness(&bad).unwrap(), None);
    }

    #[test]
    fn spurious_candidates_are_weakened_away() {
        let ctx = ExprBuilder::new();
        let x = ChannelRef::Output(0);
        let spec = ctx
            .make_timed_always(
                (0..=2).into(),
                Box::new(ctx.make_or([ctx.make_lt(x, 10.0), ctx.make_gt(x, 20.0)]).unwrap()),
            )
            .unwrap();
        let mut list = AdaptiveStlList::new([spec], 3);
        assert_eq!(list.get(0).unwrap().candidates().len(), 2);

        // satisfies the property, but neither `alw x < 10` nor `alw x > 20`
        let trace = trace_of(&[5.0, 25.0, 5.0], &[0.0; 3]);
        assert_eq!(list.evaluate(&trace).unwrap(), vec![(0, 5.0)]);
        assert_eq!(list.min_robustness(&trace).unwrap(), Some(-15.0));

        let revision = list.revision();
        assert!(list.report(&trace).unwrap().is_empty());
        assert!(list.revision() > revision);
        assert!(list.get(0).unwrap().candidates().is_empty());
        assert_eq!(list.get(0).unwrap().status(), PropertyStatus::Active);

        // with no candidate left, the property itself is the objective
        assert_eq!(list.min_robustness(&trace).unwrap(), Some(5.0));
    }

    #[test]
    fn undefined_properties_have_no_verdict() {
        let ctx = ExprBuilder::new();
        let spec = ctx
            .make_timed_always((0..=9).into(), Box::new(ctx.make_lt(ChannelRef::Output(0), 0.0)))
            .unwrap();
        let mut list = AdaptiveStlList::new([spec], 5);
        let trace = trace_of(&[1.0; 5], &[0.0; 5]);
        assert!(list.evaluate(&trace).unwrap().is_empty());
        assert_eq!(list.min_robustness(&trace).unwrap(), None);
        assert!(list.report(&trace).unwrap().is_empty());
        assert_eq!(list.get(0).unwrap().status(), PropertyStatus::Active);
    }
}
