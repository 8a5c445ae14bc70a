use super::Trace;
use crate::core::expr::*;
use crate::semantics::QuantitativeSemantics;
use crate::{FalsifyResult, Signal};

/// Boolean semantics for Signal Temporal Logic expressions defined by an [`StlExpr`].
///
/// A formula is satisfied at a sample iff its robustness there is non-negative, so a
/// robustness of exactly zero counts as satisfied for every comparison operator.
pub struct BooleanSemantics;

impl BooleanSemantics {
    /// Evaluates a [formula](StlExpr) given a [`Trace`].
    pub fn eval(expr: &StlExpr, trace: &impl Trace) -> FalsifyResult<Signal<bool>> {
        let rob = QuantitativeSemantics::eval(expr, trace)?;
        Ok(rob.signal_ge(0.0))
    }

    /// The verdict of a formula at time 0, or `None` if it is undefined there.
    pub fn satisfied(expr: &StlExpr, trace: &impl Trace) -> FalsifyResult<Option<bool>> {
        Ok(QuantitativeSemantics::robustness(expr, trace)?.map(|rob| rob >= 0.0))
    }
}
