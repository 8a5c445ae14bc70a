//! # `falsify`
//!
//! Falsification of Signal Temporal Logic (STL) requirements against black-box,
//! simulatable control systems.
//!
//! The crate is organised bottom-up:
//!
//! 1. [`mapper`]: discretization of real-valued signals into a finite alphabet,
//!    including [pseudo-signals](mapper::pseudo) that summarise the raw behaviour
//!    between two sampling instants.
//! 2. [`expr`], [`parser`] and [`semantics`]: the STL formula tree, its textual syntax,
//!    and its quantitative (robustness) and Boolean semantics over discrete-time traces.
//! 3. [`adaptive`]: the set of properties under test and their strengthening state.
//! 4. [`oracle`]: the corner-case and genetic-algorithm counterexample searches.
//! 5. [`verifier`]: the orchestrator that drives a [`sut::Sut`] through the search.
//! 6. [`config`] and [`experiment`]: typed benchmark declarations and repeated runs.

extern crate self as falsify;

pub mod adaptive;
pub mod config;
pub mod core;
pub mod experiment;
pub mod learning;
pub mod mapper;
pub mod oracle;
pub mod parser;
pub mod semantics;
pub mod sut;
pub mod verifier;

use std::fmt;
use std::ops::Range;

pub use crate::core::expr::{self, *};
pub use crate::core::signals::{self, Signal};
pub use crate::core::trace::IoTrace;
pub use parser::parse_str;
pub use semantics::{BooleanSemantics, QuantitativeSemantics, Trace};
use thiserror::Error;

/// Errors generated by all components of the crate.
#[derive(Error, Debug)]
pub enum Error {
    /// A malformed benchmark declaration, detected before any simulation.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// An STL formula that failed to parse or bind to the declared channels.
    #[error(transparent)]
    FormulaSyntax(#[from] FormulaSyntaxError),

    /// A failure while mapping signals to symbols (or back).
    #[error(transparent)]
    Mapper(#[from] MapperError),

    /// The verifier was used out of order.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The system under test failed; aborts the current repetition only.
    #[error(transparent)]
    Simulation(#[from] SimulationError),

    /// A formula node was built with fewer arguments than it needs.
    #[error("insufficient number of arguments")]
    IncompleteArgs,

    /// An interval with `start > end`.
    #[error("invalid interval: {reason}")]
    InvalidInterval {
        /// Reason for interval being invalid
        reason: &'static str,
    },

    /// Pushing a sample to a constant signal.
    #[error("cannot push a sample to a constant signal")]
    InvalidPushToSignal,

    /// A formula referenced a channel that the trace doesn't carry.
    #[error("channel `{0}` is not present in the trace")]
    SignalNotPresent(ChannelRef),

    /// Failure while writing experiment results.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alias for [`Error`]
pub type FalsifyError = Error;

/// Alias for [`Result<T, FalsifyError>`]
pub type FalsifyResult<T> = Result<T, Error>;

/// Malformed configuration of the mappers, the oracles or a benchmark.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("breakpoints of channel `{channel}` must be finite and strictly increasing")]
    InvalidBreakpoints { channel: String },

    #[error("input channel `{channel}` has no values")]
    EmptyInputChannel { channel: String },

    #[error("expected {expected} channels, got {actual}")]
    ChannelCountMismatch { expected: usize, actual: usize },

    #[error("channel `{0}` is declared more than once")]
    DuplicateChannel(String),

    #[error("invalid value for `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("malformed benchmark declaration: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single problem found while parsing a formula.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntaxIssue {
    /// Byte range of the offending text.
    pub span: Range<usize>,
    /// Human readable description of the problem.
    pub message: String,
}

impl fmt::Display for SyntaxIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}: {}", self.span.start, self.span.end, self.message)
    }
}

/// An STL formula that could not be parsed or bound to the declared channels.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("failed to parse `{formula}`: {}", itertools::join(.issues, "; "))]
pub struct FormulaSyntaxError {
    /// The formula text.
    pub formula: String,
    /// Every problem found, in source order.
    pub issues: Vec<SyntaxIssue>,
}

#[cfg(feature = "reporting")]
impl FormulaSyntaxError {
    /// Pretty-print the issues to `stderr`, pointing at the offending spans.
    pub fn eprint(&self) -> std::io::Result<()> {
        use ariadne::{sources, Color, Label, Report, ReportKind};

        let name = String::from("formula");
        for issue in &self.issues {
            Report::build(ReportKind::Error, name.clone(), issue.span.start)
                .with_message(&issue.message)
                .with_label(
                    Label::new((name.clone(), issue.span.clone()))
                        .with_message(&issue.message)
                        .with_color(Color::Red),
                )
                .finish()
                .eprint(sources([(name.clone(), self.formula.clone())]))?;
        }
        Ok(())
    }
}

/// Failures of the signal mappers and the pseudo-signal extender.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapperError {
    #[error("unknown channel `{0}`")]
    UnknownChannel(String),

    #[error("cannot aggregate an empty sub-trace")]
    EmptySubTrace,

    #[error("expected a sample with {expected} values, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("symbol {symbol} is out of range for channel {channel}")]
    InvalidSymbol { channel: usize, symbol: usize },

    #[error("malformed pseudo-signal `{expr}`: {reason}")]
    MalformedPseudoSignal { expr: String, reason: String },
}

/// Usage errors of the [`verifier::Verifier`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("the timeout must be set before any equivalence oracle is added")]
    TimeoutAfterOracle,

    #[error("the genetic-algorithm oracle needs a timeout; call `set_timeout` first")]
    MissingTimeout,

    #[error("equivalence testing cannot be configured once the search has started")]
    SearchStarted,
}

/// Failures reported by (or about) the system under test.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("simulation failed: {0}")]
    Failed(String),

    #[error("the system under test was already closed")]
    Closed,

    #[error("expected {expected} input values, got {actual}")]
    InputWidth { expected: usize, actual: usize },
}
