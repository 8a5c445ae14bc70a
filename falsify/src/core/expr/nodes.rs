//! STL formula nodes
use std::fmt;
use std::ops::{Bound, RangeBounds};

use itertools::Itertools;

use super::{AnyExpr, StlExpr};

/// A channel of an input/output trace.
///
/// Output channels index the *extended* output vector, i.e., the raw outputs of the
/// system followed by the pseudo-signals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelRef {
    /// The `i`-th concrete input
    Input(usize),
    /// The `i`-th (extended) output
    Output(usize),
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRef::Input(i) => write!(f, "input({})", i),
            ChannelRef::Output(i) => write!(f, "signal({})", i),
        }
    }
}

/// Types of comparison operations
#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display)]
pub enum Comparison {
    /// Equality check
    #[display(fmt = "==")]
    Eq,
    /// Non-equality check
    #[display(fmt = "!=")]
    NotEq,
    /// Less than check
    #[display(fmt = "{}", r#"if *strict { "<".to_string() } else { "<=".to_string() } "#)]
    Less {
        /// Denotes `lhs < rhs` if `strict`, and `lhs <= rhs` otherwise.
        strict: bool,
    },
    /// Greater than check
    #[display(fmt = "{}", r#"if *strict { ">".to_string() } else { ">=".to_string() } "#)]
    Greater {
        /// Denotes `lhs > rhs` if `strict`, and `lhs >= rhs` otherwise.
        strict: bool,
    },
}

impl Comparison {
    /// The comparison obtained by swapping both sides, e.g., `c < x` is `x > c`.
    pub fn flip(self) -> Self {
        match self {
            Comparison::Less { strict } => Comparison::Greater { strict },
            Comparison::Greater { strict } => Comparison::Less { strict },
            op => op,
        }
    }
}

/// A time interval of a temporal operator, in sample indices.
///
/// The interval is closed on both ends. An `end` of `None` extends the interval up to
/// the end of the trace.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Interval {
    /// First sample offset covered by the interval
    pub start: usize,
    /// Last sample offset covered by the interval, if bounded
    pub end: Option<usize>,
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "[{},{}]", self.start, end),
            None => write!(f, "[{},]", self.start),
        }
    }
}

impl Interval {
    /// Create a new interval `[start, end]`.
    pub fn new(start: usize, end: Option<usize>) -> Self {
        Self { start, end }
    }

    /// Check if the interval is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self.end, Some(end) if end < self.start)
    }

    /// Check if the interval is a singleton
    ///
    /// This implies that only 1 sample offset is valid within this interval.
    #[inline]
    pub fn is_singleton(&self) -> bool {
        self.end == Some(self.start)
    }

    /// Check if the interval covers `[0, ..)`.
    #[inline]
    pub fn is_untimed(&self) -> bool {
        self.start == 0 && self.end.is_none()
    }
}

impl<T> From<T> for Interval
where
    T: RangeBounds<usize>,
{
    fn from(value: T) -> Self {
        use Bound::*;
        let start = match value.start_bound() {
            Included(&a) => a,
            Excluded(&a) => a + 1,
            Unbounded => 0,
        };
        match value.end_bound() {
            Included(&b) => Self::new(start, Some(b)),
            // `..0` covers nothing; keep it representable as an empty interval.
            Excluded(&0) => Self::new(start.max(1), Some(0)),
            Excluded(&b) => Self::new(start, Some(b - 1)),
            Unbounded => Self::new(start, None),
        }
    }
}

macro_rules! impl_stl_expr {
    ($ty:ty$(, $($arg:ident),* )? ) => {
        impl AnyExpr for $ty {
            fn args(&self) -> Vec<&StlExpr> {
                vec![$($( self.$arg.as_ref(), )* )*]
            }
        }
    };
    ($ty:ty, [$args:ident]) => {
        impl AnyExpr for $ty {
            fn args(&self) -> Vec<&StlExpr> {
                self.$args.iter().collect()
            }
        }
    };
}

/// A `bool` literal
#[derive(Clone, Debug, PartialEq, falsify_derive::StlExpr, derive_more::Display)]
pub struct BoolLit(pub bool);

impl_stl_expr!(BoolLit);

/// An atomic predicate `channel op threshold`
#[derive(Clone, Debug, PartialEq, falsify_derive::StlExpr, derive_more::Display)]
#[display(fmt = "{} {} {}", channel, op, threshold)]
pub struct Atom {
    /// The channel being compared
    pub channel: ChannelRef,
    /// The type of comparison
    pub op: Comparison,
    /// The constant the channel is compared against
    pub threshold: f64,
}

impl_stl_expr!(Atom);

/// Logical negation of an expression
#[derive(Clone, Debug, PartialEq, falsify_derive::StlExpr, derive_more::Display)]
#[display(fmt = "!({})", arg)]
pub struct Not {
    /// Expression to be negated
    pub arg: Box<StlExpr>,
}

impl_stl_expr!(Not, arg);

/// Logical conjunction of a list of expressions
#[derive(Clone, Debug, PartialEq, falsify_derive::StlExpr, derive_more::Display)]
#[display(fmt = "({})", r#"args.iter().map(ToString::to_string).join(") && (")"#)]
pub struct And {
    /// Expressions to be "and"-ed
    pub args: Vec<StlExpr>,
}

impl_stl_expr!(And, [args]);

/// Logical disjunction of a list of expressions
#[derive(Clone, Debug, PartialEq, falsify_derive::StlExpr, derive_more::Display)]
#[display(fmt = "({})", r#"args.iter().map(ToString::to_string).join(") || (")"#)]
pub struct Or {
    /// Expressions to be "or"-ed
    pub args: Vec<StlExpr>,
}

impl_stl_expr!(Or, [args]);

/// A temporal always expression
///
/// Holds at `t` if `arg` holds at every sample of `t + interval`.
#[derive(Clone, Debug, PartialEq, falsify_derive::StlExpr, derive_more::Display)]
#[display(fmt = "alw_{}({})", interval, arg)]
pub struct Always {
    /// Argument for `Always`
    pub arg: Box<StlExpr>,
    /// Interval for the expression
    pub interval: Interval,
}
impl_stl_expr!(Always, arg);

/// A temporal eventually expression
///
/// Holds at `t` if `arg` holds at some sample of `t + interval`.
#[derive(Clone, Debug, PartialEq, falsify_derive::StlExpr, derive_more::Display)]
#[display(fmt = "ev_{}({})", interval, arg)]
pub struct Eventually {
    /// Argument for `Eventually`
    pub arg: Box<StlExpr>,
    /// Interval for the expression
    pub interval: Interval,
}
impl_stl_expr!(Eventually, arg);

/// A temporal until expression
///
/// Holds at `t` if `rhs` holds at some `t'` in `t + interval` and `lhs` holds on every
/// sample of `[t, t')`.
#[derive(Clone, Debug, PartialEq, falsify_derive::StlExpr, derive_more::Display)]
#[display(fmt = "({}) U_{} ({})", lhs, interval, rhs)]
pub struct Until {
    /// LHS to `lhs Until rhs`
    pub lhs: Box<StlExpr>,
    /// RHS to `lhs Until rhs`
    pub rhs: Box<StlExpr>,
    /// Interval for the expression
    pub interval: Interval,
}
impl_stl_expr!(Until, lhs, rhs);
