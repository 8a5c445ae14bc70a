//! Discrete-time signals
//!
//! Signals are sampled at a fixed step, so the index of a sample is its time. A
//! robustness signal of a formula with a look-ahead is only defined on a prefix of
//! the trace; that prefix is all a [`Signal`] stores.

use num_traits::Float;

use crate::{Error, FalsifyResult};

/// A typed discrete-time signal
///
/// A Signal can either be empty, constant throughout its domain, or sampled at the
/// consecutive sample indices `0..len`.
#[derive(Default, Clone, Debug, PartialEq)]
pub enum Signal<T> {
    /// An empty signal.
    ///
    /// Used when a formula is undefined at every sample of a trace.
    #[default]
    Empty,
    /// A signal that has a constant value at every sample.
    Constant {
        /// The value of the signal at every sample.
        value: T,
    },
    /// Values at the sample indices `0..values.len()`.
    Sampled {
        /// Values of the samples of the signal.
        values: Vec<T>,
    },
}

impl<T> Signal<T> {
    /// Create a new empty signal
    #[inline]
    pub fn new() -> Self {
        Self::Empty
    }

    /// Create a new constant signal
    #[inline]
    pub fn constant(value: T) -> Self {
        Self::Constant { value }
    }

    /// Create a new sampled signal with the specified capacity
    pub fn with_capacity(size: usize) -> Self {
        Self::Sampled {
            values: Vec::with_capacity(size),
        }
    }

    /// Number of samples, or `None` for a [`Constant`](Signal::Constant) signal, which
    /// is defined everywhere.
    pub fn len(&self) -> Option<usize> {
        match self {
            Signal::Empty => Some(0),
            Signal::Constant { value: _ } => None,
            Signal::Sampled { values } => Some(values.len()),
        }
    }

    /// Check if the signal is undefined at every sample
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Push a new sample at the end of the signal
    ///
    /// It is an error to `push` a value to a [`Constant`](Signal::Constant) signal.
    pub fn push(&mut self, value: T) -> FalsifyResult<()> {
        match self {
            Signal::Constant { value: _ } => Err(Error::InvalidPushToSignal),
            Signal::Empty => {
                *self = Signal::Sampled { values: vec![value] };
                Ok(())
            }
            Signal::Sampled { values } => {
                values.push(value);
                Ok(())
            }
        }
    }

    /// Get the value of the signal at the given sample index
    pub fn at(&self, index: usize) -> Option<&T> {
        match self {
            Signal::Empty => None,
            Signal::Constant { value } => Some(value),
            Signal::Sampled { values } => values.get(index),
        }
    }

    /// Map every sample of the signal
    pub fn map<U, F>(&self, f: F) -> Signal<U>
    where
        F: Fn(&T) -> U,
    {
        match self {
            Signal::Empty => Signal::Empty,
            Signal::Constant { value } => Signal::constant(f(value)),
            Signal::Sampled { values } => values.iter().map(f).collect(),
        }
    }
}

impl<T: Clone> Signal<T> {
    /// The samples `0..len` of the signal, repeating a constant value if needed.
    ///
    /// A sampled signal shorter than `len` keeps its length.
    pub fn materialize(&self, len: usize) -> Vec<T> {
        match self {
            Signal::Empty => Vec::new(),
            Signal::Constant { value } => vec![value.clone(); len],
            Signal::Sampled { values } => values.iter().take(len).cloned().collect(),
        }
    }

    /// Combine two signals sample by sample.
    ///
    /// The result is defined where both signals are defined.
    pub fn zip_with<F>(&self, other: &Self, f: F) -> Self
    where
        F: Fn(&T, &T) -> T,
    {
        use Signal::*;
        match (self, other) {
            (Empty, _) | (_, Empty) => Empty,
            (Constant { value: a }, Constant { value: b }) => Signal::constant(f(a, b)),
            (Constant { value: a }, Sampled { values }) => values.iter().map(|b| f(a, b)).collect(),
            (Sampled { values }, Constant { value: b }) => values.iter().map(|a| f(a, b)).collect(),
            (Sampled { values: lhs }, Sampled { values: rhs }) => lhs.iter().zip(rhs).map(|(a, b)| f(a, b)).collect(),
        }
    }
}

impl<T: Float> Signal<T> {
    /// Negate every sample
    pub fn negate(&self) -> Self {
        self.map(|v| v.neg())
    }

    /// Sample-wise minimum of two signals
    pub fn min(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a.min(*b))
    }

    /// Sample-wise maximum of two signals
    pub fn max(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a.max(*b))
    }

    /// Check, sample by sample, if the signal is at least `threshold`.
    pub fn signal_ge(&self, threshold: T) -> Signal<bool> {
        self.map(|v| *v >= threshold)
    }
}

impl<T> FromIterator<T> for Signal<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let values: Vec<T> = iter.into_iter().collect();
        if values.is_empty() {
            Signal::Empty
        } else {
            Signal::Sampled { values }
        }
    }
}
