//! Equivalence oracles
//!
//! An equivalence oracle searches for an input word on which the system violates one
//! of the active properties. Oracles don't simulate by themselves: they submit words
//! to a [`SearchContext`], which answers with the observed trace and its fitness and
//! records the counterexamples.

use log::LevelFilter;

use crate::mapper::{Letter, Word};
use crate::{FalsifyResult, IoTrace};

pub mod corner;
pub mod ga;

pub use corner::CornerCaseOracle;
pub use ga::{GaConfig, GeneticOracle, Selection};

/// Log through the `log` facade if `$lvl` is enabled by `$verbosity`.
macro_rules! log_at {
    ($verbosity:expr, $lvl:expr, $($arg:tt)+) => {
        if $lvl <= $verbosity {
            log::log!($lvl, $($arg)+);
        }
    };
}
pub(crate) use log_at;

/// The answer to one query
#[derive(Clone, Debug)]
pub struct Evaluation {
    /// The observed trace
    pub trace: IoTrace,
    /// Minimum robustness over the active properties (lower is better), if any is
    /// defined on the trace
    pub fitness: Option<f64>,
    /// `true` if the trace falsified at least one property
    pub falsified: bool,
}

/// What an oracle can ask of the verifier.
pub trait SearchContext {
    /// Number of symbols of every input channel
    fn symbol_counts(&self) -> Vec<usize>;

    /// The letters holding every input channel at its minimum or maximum symbol
    fn extremes(&self) -> Vec<Letter>;

    /// Run `word`, score its trace against the active properties, and record any
    /// counterexample. Every call is one equivalence query.
    fn evaluate(&mut self, word: &Word) -> FalsifyResult<Evaluation>;

    /// Re-score a trace against the current active properties, without simulating.
    fn fitness(&self, trace: &IoTrace) -> FalsifyResult<Option<f64>>;

    /// Changes whenever a property is falsified or weakened.
    fn revision(&self) -> u64;

    /// `true` when no property is active or the timeout elapsed.
    fn should_stop(&self) -> bool;

    /// Verbosity of the search logs
    fn verbosity(&self) -> LevelFilter {
        LevelFilter::Info
    }
}

/// A counterexample search
pub trait EquivalenceOracle {
    /// A short name for logs
    fn name(&self) -> &'static str;

    /// Search until the budget of the oracle is spent or `ctx` asks to stop.
    ///
    /// Returns the number of queries made.
    fn search(&mut self, ctx: &mut dyn SearchContext) -> FalsifyResult<usize>;
}

/// Ranks an undefined fitness after every defined one
pub(crate) fn rank(fitness: Option<f64>) -> f64 {
    fitness.unwrap_or(f64::INFINITY)
}
