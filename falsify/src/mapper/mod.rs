//! Discretization of real-valued signals
//!
//! Every channel carries a strictly increasing list of breakpoints. A value maps to
//! the symbol of the right-closed bucket containing it: symbol `k` covers
//! `(b[k-1], b[k]]`.
//!
//! - Input channels expose exactly their breakpoints as values, and a value above the
//!   last breakpoint clamps to the last symbol.
//! - Output channels carry one more symbol, the "largest" symbol, covering
//!   `(b[n-1], ∞)` with the representative value `+∞`. An output channel with no
//!   breakpoints is ignored by the abstraction: it has a single symbol.

use itertools::Itertools;

pub mod pseudo;

use self::pseudo::PseudoSignalExtender;
use crate::core::expr::{ChannelRef, ExprBuilder};
use crate::{ConfigurationError, FalsifyResult, MapperError};

/// Index of a bucket of a channel
pub type Symbol = usize;
/// One symbol per input channel, i.e., one discrete step of an input signal
pub type Letter = Vec<Symbol>;
/// A discrete input signal
pub type Word = Vec<Letter>;

#[derive(Clone, Debug, PartialEq)]
struct Channel {
    name: String,
    breakpoints: Vec<f64>,
}

impl Channel {
    fn new(name: String, breakpoints: Vec<f64>) -> Result<Self, ConfigurationError> {
        let finite = breakpoints.iter().all(|b| b.is_finite());
        let increasing = breakpoints.iter().tuple_windows().all(|(a, b)| a < b);
        if finite && increasing {
            Ok(Self { name, breakpoints })
        } else {
            Err(ConfigurationError::InvalidBreakpoints { channel: name })
        }
    }

    /// Number of breakpoints strictly less than `value`
    fn bucket(&self, value: f64) -> Symbol {
        self.breakpoints.partition_point(|b| *b < value)
    }
}

/// Symbols and representative values of the input channels
#[derive(Clone, Debug, PartialEq)]
pub struct InputMapper {
    channels: Vec<Channel>,
}

impl InputMapper {
    /// Create a mapper from `(name, values)` pairs, one per input channel.
    pub fn new<I, S>(channels: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let channels = channels
            .into_iter()
            .map(|(name, values)| {
                let name = name.into();
                if values.is_empty() {
                    Err(ConfigurationError::EmptyInputChannel { channel: name })
                } else {
                    Channel::new(name, values)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { channels })
    }

    /// Number of input channels
    pub fn width(&self) -> usize {
        self.channels.len()
    }

    /// Names of the input channels
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.name.as_str())
    }

    /// Number of symbols of `channel`
    pub fn symbol_count(&self, channel: usize) -> Option<usize> {
        self.channels.get(channel).map(|c| c.breakpoints.len())
    }

    pub fn to_symbol(&self, channel: usize, value: f64) -> Result<Symbol, MapperError> {
        let ch = self.get(channel)?;
        Ok(ch.bucket(value).min(ch.breakpoints.len() - 1))
    }

    pub fn to_value(&self, channel: usize, symbol: Symbol) -> Result<f64, MapperError> {
        self.get(channel)?
            .breakpoints
            .get(symbol)
            .copied()
            .ok_or(MapperError::InvalidSymbol { channel, symbol })
    }

    /// The concrete input values of a letter
    pub fn concretize(&self, letter: &[Symbol]) -> Result<Vec<f64>, MapperError> {
        if letter.len() != self.width() {
            return Err(MapperError::WidthMismatch {
                expected: self.width(),
                actual: letter.len(),
            });
        }
        letter
            .iter()
            .enumerate()
            .map(|(channel, &symbol)| self.to_value(channel, symbol))
            .collect()
    }

    /// Every letter of the input alphabet, in lexicographic order.
    pub fn alphabet(&self) -> Vec<Letter> {
        self.channels
            .iter()
            .map(|c| 0..c.breakpoints.len())
            .multi_cartesian_product()
            .collect()
    }

    /// The letters holding every channel at its minimum or maximum symbol, without
    /// duplicates, in lexicographic order.
    pub fn extremes(&self) -> Vec<Letter> {
        self.channels
            .iter()
            .map(|c| [0, c.breakpoints.len() - 1].into_iter().dedup())
            .multi_cartesian_product()
            .collect()
    }

    fn get(&self, channel: usize) -> Result<&Channel, MapperError> {
        self.channels
            .get(channel)
            .ok_or_else(|| MapperError::UnknownChannel(ChannelRef::Input(channel).to_string()))
    }
}

/// Symbols and representative values of the (extended) output channels
#[derive(Clone, Debug, PartialEq)]
pub struct OutputMapper {
    channels: Vec<Channel>,
}

impl OutputMapper {
    /// Create a mapper from `(name, breakpoints)` pairs, one per extended output
    /// channel.
    pub fn new<I, S>(channels: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let channels = channels
            .into_iter()
            .map(|(name, breakpoints)| Channel::new(name.into(), breakpoints))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { channels })
    }

    /// Number of output channels
    pub fn width(&self) -> usize {
        self.channels.len()
    }

    /// Names of the output channels
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.name.as_str())
    }

    /// Number of symbols of `channel`, including the largest symbol
    pub fn symbol_count(&self, channel: usize) -> Option<usize> {
        self.channels.get(channel).map(|c| c.breakpoints.len() + 1)
    }

    /// The largest symbol of `channel`
    pub fn largest(&self, channel: usize) -> Option<Symbol> {
        self.channels.get(channel).map(|c| c.breakpoints.len())
    }

    pub fn to_symbol(&self, channel: usize, value: f64) -> Result<Symbol, MapperError> {
        Ok(self.get(channel)?.bucket(value))
    }

    pub fn to_value(&self, channel: usize, symbol: Symbol) -> Result<f64, MapperError> {
        let ch = self.get(channel)?;
        match symbol.cmp(&ch.breakpoints.len()) {
            std::cmp::Ordering::Less => Ok(ch.breakpoints[symbol]),
            std::cmp::Ordering::Equal => Ok(f64::INFINITY),
            std::cmp::Ordering::Greater => Err(MapperError::InvalidSymbol { channel, symbol }),
        }
    }

    /// The symbols of one extended output sample
    pub fn abstract_output(&self, sample: &[f64]) -> Result<Letter, MapperError> {
        if sample.len() != self.width() {
            return Err(MapperError::WidthMismatch {
                expected: self.width(),
                actual: sample.len(),
            });
        }
        Ok(self
            .channels
            .iter()
            .zip(sample)
            .map(|(channel, &value)| channel.bucket(value))
            .collect())
    }

    fn get(&self, channel: usize) -> Result<&Channel, MapperError> {
        self.channels
            .get(channel)
            .ok_or_else(|| MapperError::UnknownChannel(ChannelRef::Output(channel).to_string()))
    }
}

/// The mapper between the concrete system under test and its abstraction.
///
/// Owns the input mapper, the output mapper and the pseudo-signal extender. The
/// output mapper covers the extended output vector: the raw outputs followed by the
/// pseudo-signals.
#[derive(Clone, Debug)]
pub struct SignalMapper {
    input: InputMapper,
    output: OutputMapper,
    extender: PseudoSignalExtender,
}

impl SignalMapper {
    pub fn new(input: InputMapper, output: OutputMapper, extender: PseudoSignalExtender) -> Result<Self, ConfigurationError> {
        let expected = extender.raw_width() + extender.len();
        if output.width() != expected {
            return Err(ConfigurationError::ChannelCountMismatch {
                expected,
                actual: output.width(),
            });
        }
        Ok(Self { input, output, extender })
    }

    pub fn input(&self) -> &InputMapper {
        &self.input
    }

    pub fn output(&self) -> &OutputMapper {
        &self.output
    }

    pub fn extender(&self) -> &PseudoSignalExtender {
        &self.extender
    }

    /// The concrete input values of a letter
    pub fn concretize(&self, letter: &[Symbol]) -> Result<Vec<f64>, MapperError> {
        self.input.concretize(letter)
    }

    /// Extend a raw sub-trace into one extended output sample.
    pub fn extend(&self, sub_trace: &[Vec<f64>]) -> Result<Vec<f64>, MapperError> {
        self.extender.extend(sub_trace)
    }

    /// The output symbols of one extended output sample
    pub fn abstract_output(&self, sample: &[f64]) -> Result<Letter, MapperError> {
        self.output.abstract_output(sample)
    }

    /// Every letter of the input alphabet
    pub fn letters(&self) -> Vec<Letter> {
        self.input.alphabet()
    }

    /// Every combination of per-channel minimum and maximum input symbols
    pub fn extremes(&self) -> Vec<Letter> {
        self.input.extremes()
    }

    /// An [`ExprBuilder`] that knows every channel name of this mapper.
    ///
    /// Input names bind to `input(i)`, raw output and pseudo-signal names to
    /// `signal(i)` of the extended output vector.
    pub fn expr_builder(&self, signal_step: f64) -> FalsifyResult<ExprBuilder> {
        let mut ctx = ExprBuilder::new()
            .with_signal_step(signal_step)
            .with_widths(self.input.width(), self.output.width());
        for (i, name) in self.input.names().enumerate() {
            ctx.declare(name, ChannelRef::Input(i))?;
        }
        for (i, name) in self.extender.names().enumerate() {
            ctx.declare(name, ChannelRef::Output(i))?;
        }
        Ok(ctx)
    }
}
