//! Iterators for expression trees

use std::collections::VecDeque;

use super::{AnyExpr, StlExpr};

/// Iterator that starts from some root [`StlExpr`] and travels down to it's leaf
/// expressions.
///
/// This essentially implements breadth-first search over the expression tree rooted at
/// the given [`StlExpr`].
pub struct AstIter<'a> {
    queue: VecDeque<&'a StlExpr>,
}

impl<'a> AstIter<'a> {
    /// Create an iterator that traverses an [`StlExpr`] from root to leaf.
    pub fn new(root: &'a StlExpr) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back(root);
        Self { queue }
    }
}

impl<'a> Iterator for AstIter<'a> {
    type Item = &'a StlExpr;

    fn next(&mut self) -> Option<Self::Item> {
        let expr = self.queue.pop_front()?;
        // Intervals are not part of the tree, only the sub-formulas are.
        self.queue.extend(expr.args());
        Some(expr)
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use crate::expr::{ChannelRef, ExprBuilder, StlExpr};

    #[test]
    fn simple_iter() {
        let ctx = ExprBuilder::new();

        let pred1 = Box::new(ctx.make_le(ChannelRef::Output(0), 2.0));
        let pred2 = Box::new(ctx.make_gt(ChannelRef::Output(1), 2.0));
        let alw = Box::new(ctx.make_timed_always((0..=3).into(), pred2.clone()).unwrap());
        let spec = Box::new(ctx.make_or([*pred1.clone(), *alw.clone()]).unwrap());

        let expected: Vec<&StlExpr> = vec![spec.as_ref(), pred1.as_ref(), alw.as_ref(), pred2.as_ref()];

        for (lhs, rhs) in spec.iter().zip_eq(expected.into_iter()) {
            assert_eq!(lhs, rhs);
        }
    }
}
