//! Expression tree for STL requirements

use hashbrown::HashMap;

pub mod iter;
mod nodes;

use enum_dispatch::enum_dispatch;
use itertools::Itertools;
pub use nodes::*;

use self::iter::AstIter;
use crate::{ConfigurationError, Error, FalsifyResult};

/// Largest distance to an integer sample count treated as rounding error
const STEP_TOLERANCE: f64 = 1e-9;

/// A trait representing expressions
#[enum_dispatch]
pub trait AnyExpr {
    /// Get the arguments to the current expression.
    ///
    /// If the expression doesn't contain arguments (i.e., it is a leaf expression) then
    /// the vector is empty.
    fn args(&self) -> Vec<&StlExpr>;
}

/// Marker trait for formula nodes
pub trait IsStlExpr: AnyExpr + Into<StlExpr> {}

/// An STL formula
#[enum_dispatch(AnyExpr)]
#[derive(Clone, Debug, PartialEq, falsify_derive::StlExpr, derive_more::Display)]
pub enum StlExpr {
    /// A `bool` literal
    BoolLit(BoolLit),
    /// An atomic predicate over a single channel
    Atom(Atom),
    /// Logical negation of an expression
    Not(Not),
    /// Logical conjunction of a list of expressions
    And(And),
    /// Logical disjunction of a list of expressions
    Or(Or),
    /// A temporal always expression
    Always(Always),
    /// A temporal eventually expression
    Eventually(Eventually),
    /// A temporal until expression
    Until(Until),
}

impl StlExpr {
    /// Create a borrowed iterator over the expression tree
    pub fn iter(&self) -> AstIter<'_> {
        AstIter::new(self)
    }

    /// The number of samples after the current one that the formula looks at.
    ///
    /// Returns `None` for formulas with an unbounded temporal operator. A formula with
    /// horizon `h` is defined at time `t` of a trace of length `L` iff `t + h < L`.
    pub fn horizon(&self) -> Option<usize> {
        match self {
            StlExpr::BoolLit(_) | StlExpr::Atom(_) => Some(0),
            StlExpr::Not(Not { arg }) => arg.horizon(),
            StlExpr::And(And { args }) | StlExpr::Or(Or { args }) => args
                .iter()
                .map(StlExpr::horizon)
                .try_fold(0, |acc, h| h.map(|h| acc.max(h))),
            StlExpr::Always(Always { arg, interval }) | StlExpr::Eventually(Eventually { arg, interval }) => {
                Some(interval.end? + arg.horizon()?)
            }
            StlExpr::Until(Until { lhs, rhs, interval }) => {
                Some(interval.end? + lhs.horizon()?.max(rhs.horizon()?))
            }
        }
    }

    /// The channels read by the formula, sorted and without duplicates.
    pub fn channels(&self) -> Vec<ChannelRef> {
        self.iter()
            .filter_map(|node| match node {
                StlExpr::Atom(Atom { channel, .. }) => Some(*channel),
                _ => None,
            })
            .sorted()
            .dedup()
            .collect()
    }
}

/// Expression builder
///
/// The `ExprBuilder` is a factory structure that deals with the creation of
/// expressions. It knows the names of the declared channels, the number of input and
/// output channels, and the sampling step used to convert time bounds to sample
/// indices.
#[derive(Clone, Debug)]
pub struct ExprBuilder {
    pub(crate) declarations: HashMap<String, ChannelRef>,
    input_width: Option<usize>,
    output_width: Option<usize>,
    signal_step: f64,
}

impl Default for ExprBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExprBuilder {
    /// Create a new `ExprBuilder` context, with a sampling step of one time unit and
    /// no restriction on positional channels.
    pub fn new() -> Self {
        Self {
            declarations: Default::default(),
            input_width: None,
            output_width: None,
            signal_step: 1.0,
        }
    }

    /// Set the sampling step, used to convert time bounds given in seconds.
    pub fn with_signal_step(mut self, signal_step: f64) -> Self {
        self.signal_step = signal_step;
        self
    }

    /// Restrict positional channels to `input(0..inputs)` and `signal(0..outputs)`.
    pub fn with_widths(mut self, inputs: usize, outputs: usize) -> Self {
        self.input_width = Some(inputs);
        self.output_width = Some(outputs);
        self
    }

    /// The sampling step of the traces the formulas are evaluated on.
    pub fn signal_step(&self) -> f64 {
        self.signal_step
    }

    /// Convert a duration in seconds to a number of samples (rounded down).
    ///
    /// A duration within floating-point error of a multiple of the step counts as that
    /// multiple, so `0.3` seconds at a step of `0.1` is 3 samples.
    pub fn steps_from_secs(&self, secs: f64) -> usize {
        let steps = secs / self.signal_step;
        let nearest = steps.round();
        if (steps - nearest).abs() < STEP_TOLERANCE {
            nearest as usize
        } else {
            steps.floor() as usize
        }
    }

    /// Declare a named channel
    pub fn declare(&mut self, name: impl Into<String>, channel: ChannelRef) -> FalsifyResult<()> {
        let name = name.into();
        self.check(channel)?;
        match self.declarations.insert(name.clone(), channel) {
            None => Ok(()),
            Some(prev) if prev == channel => Ok(()),
            Some(_) => Err(ConfigurationError::DuplicateChannel(name).into()),
        }
    }

    /// Look up a declared channel
    pub fn channel(&self, name: &str) -> Option<ChannelRef> {
        self.declarations.get(name).copied()
    }

    /// Get the `index`-th input channel, checking it against the declared width.
    pub fn input(&self, index: usize) -> FalsifyResult<ChannelRef> {
        let channel = ChannelRef::Input(index);
        self.check(channel).map(|_| channel)
    }

    /// Get the `index`-th (extended) output channel, checking it against the declared
    /// width.
    pub fn output(&self, index: usize) -> FalsifyResult<ChannelRef> {
        let channel = ChannelRef::Output(index);
        self.check(channel).map(|_| channel)
    }

    fn check(&self, channel: ChannelRef) -> FalsifyResult<()> {
        let (index, width) = match channel {
            ChannelRef::Input(i) => (i, self.input_width),
            ChannelRef::Output(i) => (i, self.output_width),
        };
        match width {
            Some(width) if index >= width => Err(Error::SignalNotPresent(channel)),
            _ => Ok(()),
        }
    }

    /// Declare a constant boolean expression
    pub fn bool_const(&self, value: bool) -> StlExpr {
        BoolLit(value).into()
    }

    /// Create a [`StlExpr::Atom`] expression
    pub fn make_atom(&self, channel: ChannelRef, op: Comparison, threshold: f64) -> StlExpr {
        (Atom { channel, op, threshold }).into()
    }

    /// Create a "less than" ([`StlExpr::Atom`]) expression
    pub fn make_lt(&self, channel: ChannelRef, threshold: f64) -> StlExpr {
        self.make_atom(channel, Comparison::Less { strict: true }, threshold)
    }

    /// Create a "less than or equal" ([`StlExpr::Atom`]) expression
    pub fn make_le(&self, channel: ChannelRef, threshold: f64) -> StlExpr {
        self.make_atom(channel, Comparison::Less { strict: false }, threshold)
    }

    /// Create a "greater than" ([`StlExpr::Atom`]) expression
    pub fn make_gt(&self, channel: ChannelRef, threshold: f64) -> StlExpr {
        self.make_atom(channel, Comparison::Greater { strict: true }, threshold)
    }

    /// Create a "greater than or equal" ([`StlExpr::Atom`]) expression
    pub fn make_ge(&self, channel: ChannelRef, threshold: f64) -> StlExpr {
        self.make_atom(channel, Comparison::Greater { strict: false }, threshold)
    }

    /// Create a "equals" ([`StlExpr::Atom`]) expression
    pub fn make_eq(&self, channel: ChannelRef, threshold: f64) -> StlExpr {
        self.make_atom(channel, Comparison::Eq, threshold)
    }

    /// Create a "not equals" ([`StlExpr::Atom`]) expression
    pub fn make_neq(&self, channel: ChannelRef, threshold: f64) -> StlExpr {
        self.make_atom(channel, Comparison::NotEq, threshold)
    }

    /// Create a [`StlExpr::Not`] expression.
    pub fn make_not(&self, arg: Box<StlExpr>) -> StlExpr {
        (Not { arg }).into()
    }

    /// Create a [`StlExpr::Or`] expression.
    pub fn make_or<I>(&self, args: I) -> FalsifyResult<StlExpr>
    where
        I: IntoIterator<Item = StlExpr>,
    {
        let mut new_args = Vec::<StlExpr>::new();
        for arg in args.into_iter() {
            // Flatten the args if there is an Or
            if let StlExpr::Or(Or { args }) = arg {
                new_args.extend(args.into_iter());
            } else {
                new_args.push(arg);
            }
        }
        if new_args.len() < 2 {
            Err(Error::IncompleteArgs)
        } else {
            Ok((Or { args: new_args }).into())
        }
    }

    /// Create a [`StlExpr::And`] expression.
    pub fn make_and<I>(&self, args: I) -> FalsifyResult<StlExpr>
    where
        I: IntoIterator<Item = StlExpr>,
    {
        let mut new_args = Vec::<StlExpr>::new();
        for arg in args.into_iter() {
            // Flatten the args if there is an And
            if let StlExpr::And(And { args }) = arg {
                new_args.extend(args.into_iter());
            } else {
                new_args.push(arg);
            }
        }
        if new_args.len() < 2 {
            Err(Error::IncompleteArgs)
        } else {
            Ok((And { args: new_args }).into())
        }
    }

    /// Create an expression equivalent to `lhs -> rhs`.
    ///
    /// This essentially breaks down the expression as `!lhs || rhs`.
    #[allow(clippy::boxed_local)]
    pub fn make_implies(&self, lhs: Box<StlExpr>, rhs: Box<StlExpr>) -> FalsifyResult<StlExpr> {
        let np = self.make_not(lhs);
        self.make_or([np, *rhs])
    }

    /// Create an expression equivalent to `lhs <-> rhs`.
    ///
    /// This essentially breaks down the expression as `(lhs && rhs) || (!lhs && !rhs)`.
    pub fn make_equiv(&self, lhs: Box<StlExpr>, rhs: Box<StlExpr>) -> FalsifyResult<StlExpr> {
        let np = self.make_not(lhs.clone());
        let nq = self.make_not(rhs.clone());

        let npnq = self.make_and([np, nq])?;
        let pq = self.make_and([*lhs, *rhs])?;

        self.make_or([pq, npnq])
    }

    /// Create a next expression, i.e., `ev_[1,1] arg`.
    pub fn make_next(&self, arg: Box<StlExpr>) -> StlExpr {
        (Eventually {
            arg,
            interval: Interval::new(1, Some(1)),
        })
        .into()
    }

    /// Create a [`StlExpr::Always`] expression over the whole trace.
    pub fn make_always(&self, arg: Box<StlExpr>) -> StlExpr {
        (Always {
            arg,
            interval: (..).into(),
        })
        .into()
    }

    /// Create a [`StlExpr::Always`] expression with an interval.
    pub fn make_timed_always(&self, interval: Interval, arg: Box<StlExpr>) -> FalsifyResult<StlExpr> {
        check_interval(&interval)?;
        Ok((Always { arg, interval }).into())
    }

    /// Create a [`StlExpr::Eventually`] expression over the whole trace.
    pub fn make_eventually(&self, arg: Box<StlExpr>) -> StlExpr {
        (Eventually {
            arg,
            interval: (..).into(),
        })
        .into()
    }

    /// Create a [`StlExpr::Eventually`] expression with an interval.
    pub fn make_timed_eventually(&self, interval: Interval, arg: Box<StlExpr>) -> FalsifyResult<StlExpr> {
        check_interval(&interval)?;
        Ok((Eventually { arg, interval }).into())
    }

    /// Create a [`StlExpr::Until`] expression over the whole trace.
    pub fn make_until(&self, lhs: Box<StlExpr>, rhs: Box<StlExpr>) -> StlExpr {
        (Until {
            lhs,
            rhs,
            interval: (..).into(),
        })
        .into()
    }

    /// Create a [`StlExpr::Until`] expression with an interval.
    pub fn make_timed_until(&self, interval: Interval, lhs: Box<StlExpr>, rhs: Box<StlExpr>) -> FalsifyResult<StlExpr> {
        check_interval(&interval)?;
        Ok(StlExpr::from(Until { lhs, rhs, interval }))
    }
}

fn check_interval(interval: &Interval) -> FalsifyResult<()> {
    if interval.is_empty() {
        Err(Error::InvalidInterval {
            reason: "interval start is after its end",
        })
    } else {
        Ok(())
    }
}

#[cfg(any(test, feature = "arbitrary"))]
pub mod arbitrary {

    //! Helper functions to generate arbitrary expressions using [`mod@proptest`].
    use proptest::prelude::*;

    use super::*;

    /// Generate arbitrary channels among `width` output channels
    pub fn channel(width: usize) -> impl Strategy<Value = ChannelRef> {
        (0..width).prop_map(ChannelRef::Output)
    }

    /// Generate arbitrary comparison operators
    pub fn comparison() -> impl Strategy<Value = Comparison> {
        use Comparison::*;
        prop_oneof![
            any::<bool>().prop_map(|strict| Less { strict }),
            any::<bool>().prop_map(|strict| Greater { strict }),
            Just(Eq),
            Just(NotEq),
        ]
    }

    /// Generate bounded intervals whose end is at most `max_end`
    pub fn interval(max_end: usize) -> impl Strategy<Value = Interval> {
        (0..=max_end)
            .prop_flat_map(move |end| (0..=end, Just(end)))
            .prop_map(|(start, end)| Interval::new(start, Some(end)))
    }

    /// Generate arbitrary atomic predicates over `width` output channels
    pub fn atom(width: usize) -> impl Strategy<Value = Box<StlExpr>> {
        (channel(width), comparison(), -100i32..100)
            .prop_map(|(channel, op, threshold)| Box::new((Atom { channel, op, threshold: threshold.into() }).into()))
    }

    /// Generate arbitrary formulas over 3 output channels with bounded intervals
    pub fn stl_expr() -> impl Strategy<Value = Box<StlExpr>> {
        let leaf = prop_oneof![
            1 => any::<bool>().prop_map(|val| Box::new(BoolLit(val).into())),
            4 => atom(3),
        ];

        #[allow(clippy::arc_with_non_send_sync)]
        leaf.prop_recursive(
            4,  // 4 levels deep
            32, // Shoot for maximum size of 32 nodes
            4,  // We put up to 4 items per collection
            |inner| {
                prop_oneof![
                    inner.clone().prop_map(|arg| Box::new((Not { arg }).into())),
                    prop::collection::vec(inner.clone(), 2..4).prop_map(|args| {
                        Box::new(
                            (And {
                                args: args.into_iter().map(|arg| *arg).collect(),
                            })
                            .into(),
                        )
                    }),
                    prop::collection::vec(inner.clone(), 2..4).prop_map(|args| {
                        Box::new(
                            (Or {
                                args: args.into_iter().map(|arg| *arg).collect(),
                            })
                            .into(),
                        )
                    }),
                    (inner.clone(), interval(4))
                        .prop_map(|(arg, interval)| Box::new((Always { arg, interval }).into())),
                    (inner.clone(), interval(4))
                        .prop_map(|(arg, interval)| Box::new((Eventually { arg, interval }).into())),
                    (inner.clone(), inner, interval(4))
                        .prop_map(|(lhs, rhs, interval)| Box::new((Until { lhs, rhs, interval }).into())),
                ]
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use paste::paste;
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn correctly_create_stl_expr(expr in arbitrary::stl_expr()) {
            _ = expr;
        }
    }

    proptest! {
        #[test]
        fn not_stl_expr(arg in arbitrary::stl_expr()) {
            let expr = !*arg;
            assert!(matches!(expr, StlExpr::Not(Not { arg: _ })));
        }
    }

    macro_rules! test_stl_binop {
        ($name:ident, $method:ident with $op:tt) => {
            paste! {
                proptest! {
                    #[test]
                    fn [<$method _stl_expr>](lhs in arbitrary::stl_expr(), rhs in arbitrary::stl_expr()) {
                        let expr = *lhs $op *rhs;
                        assert!(matches!(expr, StlExpr::$name($name { args: _ })));
                    }
                }
            }
        };
    }

    test_stl_binop!(And, bitand with &);
    test_stl_binop!(Or, bitor with |);

    #[test]
    fn connectives_flatten() {
        let ctx = ExprBuilder::new();
        let a = ctx.make_lt(ChannelRef::Output(0), 1.0);
        let b = ctx.make_gt(ChannelRef::Output(1), 2.0);
        let c = ctx.make_le(ChannelRef::Input(0), 3.0);

        let spec = (a.clone() & b.clone()) & c.clone();
        assert_eq!(spec, StlExpr::from(And { args: vec![a.clone(), b.clone(), c.clone()] }));

        let spec = ctx.make_or([a.clone(), ctx.make_or([b.clone(), c.clone()]).unwrap()]).unwrap();
        assert_eq!(spec, StlExpr::from(Or { args: vec![a.clone(), b, c] }));

        assert!(matches!(ctx.make_and([a]), Err(Error::IncompleteArgs)));
    }

    #[test]
    fn horizon_of_nested_operators() {
        let ctx = ExprBuilder::new();
        let x = ctx.make_lt(ChannelRef::Output(0), 35.0);
        let y = ctx.make_gt(ChannelRef::Output(1), 0.0);

        assert_eq!(x.horizon(), Some(0));

        let alw = ctx.make_timed_always((0..=4).into(), Box::new(x.clone())).unwrap();
        assert_eq!(alw.horizon(), Some(4));

        let ev = ctx.make_timed_eventually((2..=3).into(), Box::new(alw.clone())).unwrap();
        assert_eq!(ev.horizon(), Some(7));

        let until = ctx
            .make_timed_until((1..=2).into(), Box::new(alw), Box::new(y))
            .unwrap();
        assert_eq!(until.horizon(), Some(6));

        let untimed = ctx.make_always(Box::new(x));
        assert_eq!(untimed.horizon(), None);
        assert_eq!((untimed & ev).horizon(), None);
    }

    #[test]
    fn empty_intervals_are_rejected() {
        let ctx = ExprBuilder::new();
        let x = Box::new(ctx.make_lt(ChannelRef::Output(0), 35.0));
        let interval = Interval::new(3, Some(2));
        assert!(interval.is_empty());
        assert!(matches!(
            ctx.make_timed_always(interval, x),
            Err(Error::InvalidInterval { .. })
        ));
        assert!(Interval::from(0..0).is_empty());
        assert_eq!(Interval::from(1..4), Interval::new(1, Some(3)));
        assert!(Interval::from(..).is_untimed());
    }

    #[test]
    fn channels_are_collected_once() {
        let ctx = ExprBuilder::new();
        let spec = ctx
            .make_and([
                ctx.make_lt(ChannelRef::Output(2), 1.0),
                ctx.make_gt(ChannelRef::Input(0), 2.0),
                ctx.make_next(Box::new(ctx.make_le(ChannelRef::Output(2), 3.0))),
            ])
            .unwrap();
        assert_eq!(spec.channels(), vec![ChannelRef::Input(0), ChannelRef::Output(2)]);
    }

    #[test]
    fn positional_channels_are_checked() {
        let mut ctx = ExprBuilder::new().with_widths(1, 2);
        assert_eq!(ctx.output(1).unwrap(), ChannelRef::Output(1));
        assert!(matches!(ctx.output(2), Err(Error::SignalNotPresent(ChannelRef::Output(2)))));
        assert!(matches!(ctx.input(1), Err(Error::SignalNotPresent(ChannelRef::Input(1)))));

        ctx.declare("velocity", ChannelRef::Output(0)).unwrap();
        assert_eq!(ctx.channel("velocity"), Some(ChannelRef::Output(0)));
        assert!(ctx.declare("velocity", ChannelRef::Output(1)).is_err());
    }

    #[test]
    fn seconds_to_samples() {
        let cases = [
            (0.1, 0.3, 3),
            (0.1, 2.3, 23),
            (0.1, 0.5, 5),
            (0.1, 0.35, 3),
            (0.1, 39.9, 399),
            (0.2, 0.6, 3),
            (0.2, 1.4, 7),
            (0.2, 0.5, 2),
            (0.01, 0.07, 7),
            (0.01, 1.13, 113),
            (0.5, 2.0, 4),
            (1.0, 0.0, 0),
        ];
        for (step, secs, expected) in cases {
            let ctx = ExprBuilder::new().with_signal_step(step);
            assert_eq!(ctx.steps_from_secs(secs), expected, "{} s at step {}", secs, step);
        }
    }

    #[test]
    fn display() {
        let ctx = ExprBuilder::new();
        let x = ctx.make_lt(ChannelRef::Output(0), 35.0);
        let spec = ctx.make_timed_always((0..=4).into(), Box::new(x)).unwrap();
        assert_eq!(spec.to_string(), "alw_[0,4](signal(0) < 35)");
    }
}
