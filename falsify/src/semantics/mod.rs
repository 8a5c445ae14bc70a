//! Offline semantics of STL formulas
//!
//! We are concerned with the monitoring of _finite discrete-time traces_, i.e., a
//! collection of signals sampled at a fixed step from the system under test. The
//! index of a sample is its time.

mod boolean;
mod quantitative;
pub mod utils;

pub use boolean::BooleanSemantics;
pub use quantitative::QuantitativeSemantics;

use crate::expr::ChannelRef;
use crate::Signal;

/// A trace is a collection of equally long, synchronously sampled signals
///
/// # Example
///
/// An example of a `Trace` may be:
///
/// ```rust
/// use falsify::{ChannelRef, Signal, Trace};
///
/// struct MyTrace {
///     x: Vec<f64>,
/// }
///
/// impl Trace for MyTrace {
///     fn len(&self) -> usize {
///         self.x.len()
///     }
///
///     fn value(&self, channel: ChannelRef, index: usize) -> Option<f64> {
///         match channel {
///             ChannelRef::Output(0) => self.x.get(index).copied(),
///             _ => None,
///         }
///     }
/// }
///
/// let trace = MyTrace { x: vec![1.0, 2.0] };
///
/// assert_eq!(trace.signal(ChannelRef::Output(0)), Some(Signal::Sampled { values: vec![1.0, 2.0] }));
/// assert_eq!(trace.signal(ChannelRef::Input(0)), None);
/// ```
pub trait Trace {
    /// Number of samples in the trace
    fn len(&self) -> usize;

    /// Check if the trace has no samples
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of `channel` at the sample `index`
    fn value(&self, channel: ChannelRef, index: usize) -> Option<f64>;

    /// Query the whole signal of a channel
    fn signal(&self, channel: ChannelRef) -> Option<Signal<f64>> {
        (0..self.len()).map(|t| self.value(channel, t)).collect::<Option<Vec<_>>>().map(|values| {
            if values.is_empty() {
                Signal::Empty
            } else {
                Signal::Sampled { values }
            }
        })
    }
}
