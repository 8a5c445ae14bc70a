//! Corner-case oracle
//!
//! Tries the input words built from the extreme letters: every constant word, then
//! every word switching from one extreme letter to a later one at a fixed step.

use itertools::Itertools;
use log::Level;

use super::{log_at, EquivalenceOracle, SearchContext};
use crate::mapper::{Letter, Word};
use crate::FalsifyResult;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CornerCaseOracle {
    length: usize,
    switch_step: usize,
}

impl CornerCaseOracle {
    /// Words of `length` letters, switching letters after `switch_step` steps.
    pub fn new(length: usize, switch_step: usize) -> Self {
        Self { length, switch_step }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn switch_step(&self) -> usize {
        self.switch_step
    }

    /// The candidate words over `extremes`, in the order they are tried.
    pub fn words(&self, extremes: &[Letter]) -> Vec<Word> {
        let extremes: Vec<&Letter> = extremes.iter().unique().collect();
        let constant = extremes.iter().map(|&letter| vec![letter.clone(); self.length]);
        let switching = extremes.iter().tuple_combinations().map(|(&p, &q)| {
            (0..self.length)
                .map(|t| if t < self.switch_step { p.clone() } else { q.clone() })
                .collect()
        });
        constant.chain(switching).unique().collect()
    }
}

impl EquivalenceOracle for CornerCaseOracle {
    fn name(&self) -> &'static str {
        "corner-case"
    }

    fn search(&mut self, ctx: &mut dyn SearchContext) -> FalsifyResult<usize> {
        let verbosity = ctx.verbosity();
        let words = self.words(&ctx.extremes());
        log_at!(verbosity, Level::Debug, "trying {} corner-case words", words.len());

        let mut queries = 0;
        for word in &words {
            if ctx.should_stop() {
                break;
            }
            let eval = ctx.evaluate(word)?;
            queries += 1;
            if eval.falsified {
                log_at!(verbosity, Level::Info, "corner case {:?} is a counterexample", word);
            }
        }
        Ok(queries)
    }
}
