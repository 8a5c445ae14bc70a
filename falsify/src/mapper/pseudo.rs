//! Pseudo-signals
//!
//! A pseudo-signal summarises the raw outputs produced between two sampling instants:
//! the maximum or minimum of a raw channel (or of the difference of two raw channels)
//! over the sub-trace that excludes the starting instant and includes the ending one.
//! Pseudo-signals are appended to the raw outputs and discretized like any other
//! output channel.
//!
//! They are declared with the textual syntax of the benchmark scripts:
//!
//! ```
//! use falsify::mapper::pseudo::PseudoSignalExtender;
//!
//! let extender = PseudoSignalExtender::new(["velocity", "rotation"])
//!     .with_signal("previous_max_velocity", "previous_max(velocity)")
//!     .unwrap()
//!     .with_signal("previous_min_gap", "previous_min(signal(1) - velocity)")
//!     .unwrap();
//!
//! let sample = extender
//!     .extend(&[vec![10.0, 100.0], vec![30.0, 90.0], vec![20.0, 80.0]])
//!     .unwrap();
//! assert_eq!(sample, vec![20.0, 80.0, 30.0, 60.0]);
//! ```

use std::fmt;
use std::str::FromStr;

use chumsky::prelude::*;
use itertools::Itertools;

use crate::MapperError;

/// How the samples of a sub-trace are aggregated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregator {
    PreviousMax,
    PreviousMin,
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregator::PreviousMax => write!(f, "previous_max"),
            Aggregator::PreviousMin => write!(f, "previous_min"),
        }
    }
}

/// A raw output channel, by name or by position
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Name(String),
    Index(usize),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Name(name) => write!(f, "{}", name),
            Operand::Index(i) => write!(f, "signal({})", i),
        }
    }
}

/// A parsed pseudo-signal expression, e.g., `previous_max(signal(5) - signal(4))`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PseudoSignalDecl {
    pub aggregator: Aggregator,
    pub lhs: Operand,
    /// Subtracted from `lhs` sample by sample, if present
    pub rhs: Option<Operand>,
}

impl fmt::Display for PseudoSignalDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rhs {
            Some(rhs) => write!(f, "{}({} - {})", self.aggregator, self.lhs, rhs),
            None => write!(f, "{}({})", self.aggregator, self.lhs),
        }
    }
}

fn decl_parser<'src>() -> impl Parser<'src, &'src str, PseudoSignalDecl, extra::Err<Rich<'src, char>>> {
    let index = text::int(10)
        .to_slice()
        .try_map_with(|s: &str, e| {
            s.parse::<usize>()
                .map_err(|err| Rich::custom(e.span(), format!("Unable to parse channel index: {}", err)))
        })
        .padded()
        .delimited_by(just('('), just(')'))
        .labelled("channel index");

    let positional = just("signal")
        .or(just("output"))
        .ignore_then(index.clone())
        .map(Operand::Index);
    let operand = positional
        .or(text::ident().map(|name: &str| Operand::Name(name.to_string())))
        .padded()
        .labelled("channel");

    let shorthand = choice((
        just("previous_max_output").to(Aggregator::PreviousMax),
        just("previous_min_output").to(Aggregator::PreviousMin),
    ))
    .then(index)
    .map(|(aggregator, i)| PseudoSignalDecl {
        aggregator,
        lhs: Operand::Index(i),
        rhs: None,
    });

    let general = choice((
        just("previous_max").to(Aggregator::PreviousMax),
        just("previous_min").to(Aggregator::PreviousMin),
    ))
    .then(
        operand
            .clone()
            .then(just('-').ignore_then(operand).or_not())
            .delimited_by(just('('), just(')')),
    )
    .map(|(aggregator, (lhs, rhs))| PseudoSignalDecl { aggregator, lhs, rhs });

    choice((shorthand, general)).padded().then_ignore(end())
}

impl FromStr for PseudoSignalDecl {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decl_parser().parse(s).into_result().map_err(|errs| MapperError::MalformedPseudoSignal {
            expr: s.to_string(),
            reason: errs.iter().join("; "),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
struct PseudoSignal {
    name: String,
    aggregator: Aggregator,
    lhs: usize,
    rhs: Option<usize>,
}

impl PseudoSignal {
    fn value(&self, row: &[f64]) -> f64 {
        match self.rhs {
            Some(rhs) => row[self.lhs] - row[rhs],
            None => row[self.lhs],
        }
    }

    fn aggregate(&self, sub_trace: &[Vec<f64>]) -> f64 {
        let values = sub_trace.iter().map(|row| self.value(row));
        match self.aggregator {
            Aggregator::PreviousMax => values.fold(f64::NEG_INFINITY, f64::max),
            Aggregator::PreviousMin => values.fold(f64::INFINITY, f64::min),
        }
    }
}

/// Computes the pseudo-signals of a sub-trace and appends them to the raw outputs.
///
/// Channel names are resolved when a pseudo-signal is added, so an unknown name is
/// reported before any simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct PseudoSignalExtender {
    raw_names: Vec<String>,
    signals: Vec<PseudoSignal>,
}

impl PseudoSignalExtender {
    /// An extender without pseudo-signals over the named raw output channels
    pub fn new<I, S>(raw_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            raw_names: raw_names.into_iter().map(Into::into).collect(),
            signals: Vec::new(),
        }
    }

    /// Add a pseudo-signal named `name`, defined by the expression `decl`.
    pub fn with_signal(mut self, name: impl Into<String>, decl: &str) -> Result<Self, MapperError> {
        let decl: PseudoSignalDecl = decl.parse()?;
        self.push(name, &decl)?;
        Ok(self)
    }

    /// Add a parsed pseudo-signal named `name`.
    pub fn push(&mut self, name: impl Into<String>, decl: &PseudoSignalDecl) -> Result<(), MapperError> {
        let lhs = self.resolve(&decl.lhs)?;
        let rhs = decl.rhs.as_ref().map(|op| self.resolve(op)).transpose()?;
        self.signals.push(PseudoSignal {
            name: name.into(),
            aggregator: decl.aggregator,
            lhs,
            rhs,
        });
        Ok(())
    }

    fn resolve(&self, operand: &Operand) -> Result<usize, MapperError> {
        match operand {
            Operand::Index(i) if *i < self.raw_width() => Ok(*i),
            Operand::Name(name) => self
                .raw_names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| MapperError::UnknownChannel(name.clone())),
            op => Err(MapperError::UnknownChannel(op.to_string())),
        }
    }

    /// Number of raw output channels
    pub fn raw_width(&self) -> usize {
        self.raw_names.len()
    }

    /// Number of pseudo-signals
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Names of the extended output channels: raw outputs, then pseudo-signals.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.raw_names
            .iter()
            .map(String::as_str)
            .chain(self.signals.iter().map(|s| s.name.as_str()))
    }

    /// The value of every pseudo-signal over `sub_trace`
    pub fn apply(&self, sub_trace: &[Vec<f64>]) -> Result<Vec<f64>, MapperError> {
        if sub_trace.is_empty() {
            return Err(MapperError::EmptySubTrace);
        }
        if let Some(row) = sub_trace.iter().find(|row| row.len() != self.raw_width()) {
            return Err(MapperError::WidthMismatch {
                expected: self.raw_width(),
                actual: row.len(),
            });
        }
        Ok(self.signals.iter().map(|s| s.aggregate(sub_trace)).collect())
    }

    /// The extended output sample of `sub_trace`: its last raw sample followed by the
    /// pseudo-signals.
    pub fn extend(&self, sub_trace: &[Vec<f64>]) -> Result<Vec<f64>, MapperError> {
        let pseudo = self.apply(sub_trace)?;
        let mut sample = sub_trace.last().cloned().ok_or(MapperError::EmptySubTrace)?;
        sample.extend(pseudo);
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_declarations() {
        use Aggregator::*;
        let cases = [
            (
                "previous_max_output(0)",
                PseudoSignalDecl {
                    aggregator: PreviousMax,
                    lhs: Operand::Index(0),
                    rhs: None,
                },
            ),
            (
                "previous_min_output( 3 )",
                PseudoSignalDecl {
                    aggregator: PreviousMin,
                    lhs: Operand::Index(3),
                    rhs: None,
                },
            ),
            (
                "previous_min(signal(5) - signal(4))",
                PseudoSignalDecl {
                    aggregator: PreviousMin,
                    lhs: Operand::Index(5),
                    rhs: Some(Operand::Index(4)),
                },
            ),
            (
                "previous_max(velocity)",
                PseudoSignalDecl {
                    aggregator: PreviousMax,
                    lhs: Operand::Name("velocity".into()),
                    rhs: None,
                },
            ),
            (
                "previous_max(output(1)-signal_y)",
                PseudoSignalDecl {
                    aggregator: PreviousMax,
                    lhs: Operand::Index(1),
                    rhs: Some(Operand::Name("signal_y".into())),
                },
            ),
        ];
        for (src, expected) in cases {
            assert_eq!(src.parse::<PseudoSignalDecl>().unwrap(), expected, "parsing `{}`", src);
        }
    }

    #[test]
    fn display_reparses() {
        let decl: PseudoSignalDecl = "previous_min(signal(5) - velocity)".parse().unwrap();
        assert_eq!(decl.to_string(), "previous_min(signal(5) - velocity)");
        assert_eq!(decl.to_string().parse::<PseudoSignalDecl>().unwrap(), decl);
    }

    #[test]
    fn malformed_declarations() {
        for src in ["", "previous_avg(x)", "previous_max()", "previous_max(x - )", "previous_max(x) y"] {
            assert!(
                matches!(src.parse::<PseudoSignalDecl>(), Err(MapperError::MalformedPseudoSignal { .. })),
                "accepted `{}`",
                src
            );
        }
    }

    #[test]
    fn aggregators() {
        let extender = PseudoSignalExtender::new(["y4", "y5"])
            .with_signal("max_y4", "previous_max_output(0)")
            .unwrap()
            .with_signal("min_y4", "previous_min(y4)")
            .unwrap()
            .with_signal("max_diff", "previous_max(y5 - y4)")
            .unwrap()
            .with_signal("min_diff", "previous_min(signal(1) - signal(0))")
            .unwrap();
        assert_eq!(extender.len(), 4);

        let sub_trace = vec![vec![1.0, 4.0], vec![3.0, 4.5], vec![2.0, 7.0]];
        assert_eq!(extender.apply(&sub_trace).unwrap(), vec![3.0, 1.0, 5.0, 1.5]);

        // the initial sample of a run is a sub-trace of length one
        assert_eq!(
            extender.extend(&[vec![1.0, 2.0]]).unwrap(),
            vec![1.0, 2.0, 1.0, 1.0, 1.0, 1.0]
        );
    }

    #[test]
    fn errors() {
        let extender = PseudoSignalExtender::new(["velocity"]);
        assert!(matches!(
            extender.clone().with_signal("p", "previous_max(speed)"),
            Err(MapperError::UnknownChannel(name)) if name == "speed"
        ));
        assert!(matches!(
            extender.clone().with_signal("p", "previous_max_output(1)"),
            Err(MapperError::UnknownChannel(_))
        ));

        let extender = extender.with_signal("p", "previous_max(velocity)").unwrap();
        assert_eq!(extender.apply(&[]), Err(MapperError::EmptySubTrace));
        assert_eq!(
            extender.apply(&[vec![1.0, 2.0]]),
            Err(MapperError::WidthMismatch { expected: 1, actual: 2 })
        );
    }
}
