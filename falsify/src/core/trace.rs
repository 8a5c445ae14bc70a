//! Input/output traces of the system under test

use std::fmt;

use itertools::Itertools;

use crate::expr::ChannelRef;
use crate::mapper::{Letter, Word};
use crate::semantics::Trace;

/// The trace of one query of the system under test.
///
/// Sample `t` holds the concrete input applied at step `t`, the extended output
/// observed at the end of that step (raw outputs followed by the pseudo-signals), and
/// the symbols of both.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IoTrace {
    /// The abstract input word that produced this trace
    pub abstract_inputs: Word,
    /// Concrete input values, one row per step
    pub inputs: Vec<Vec<f64>>,
    /// Extended output values, one row per step
    pub outputs: Vec<Vec<f64>>,
    /// Output symbols, one letter per step
    pub abstract_outputs: Vec<Letter>,
}

impl IoTrace {
    /// Create an empty trace with room for `len` steps
    pub fn with_capacity(len: usize) -> Self {
        Self {
            abstract_inputs: Vec::with_capacity(len),
            inputs: Vec::with_capacity(len),
            outputs: Vec::with_capacity(len),
            abstract_outputs: Vec::with_capacity(len),
        }
    }

    /// Append one step to the trace
    pub fn push(&mut self, letter: Letter, input: Vec<f64>, output: Vec<f64>, abstract_output: Letter) {
        self.abstract_inputs.push(letter);
        self.inputs.push(input);
        self.outputs.push(output);
        self.abstract_outputs.push(abstract_output);
    }

    /// The first `len` steps of the trace
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            abstract_inputs: self.abstract_inputs.iter().take(len).cloned().collect(),
            inputs: self.inputs.iter().take(len).cloned().collect(),
            outputs: self.outputs.iter().take(len).cloned().collect(),
            abstract_outputs: self.abstract_outputs.iter().take(len).cloned().collect(),
        }
    }
}

impl Trace for IoTrace {
    fn len(&self) -> usize {
        self.outputs.len()
    }

    fn value(&self, channel: ChannelRef, index: usize) -> Option<f64> {
        match channel {
            ChannelRef::Input(i) => self.inputs.get(index)?.get(i).copied(),
            ChannelRef::Output(i) => self.outputs.get(index)?.get(i).copied(),
        }
    }
}

/// Formats rows of values as `[a, b]; [c, d]; ...`
pub(crate) struct Rows<'a, T>(pub &'a [Vec<T>]);

impl<T: fmt::Display> fmt::Display for Rows<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.0.iter().map(|row| format!("[{}]", row.iter().join(", "))).join("; ")
        )
    }
}

impl fmt::Display for IoTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "input:           {}", Rows(&self.inputs))?;
        writeln!(f, "abstract input:  {}", Rows(&self.abstract_inputs))?;
        writeln!(f, "output:          {}", Rows(&self.outputs))?;
        write!(f, "abstract output: {}", Rows(&self.abstract_outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_indexed_per_step() {
        let mut trace = IoTrace::with_capacity(2);
        trace.push(vec![0], vec![10.0], vec![1.0, 2.0], vec![0, 1]);
        trace.push(vec![1], vec![20.0], vec![3.0, 4.0], vec![1, 1]);

        assert_eq!(trace.len(), 2);
        assert_eq!(trace.value(ChannelRef::Input(0), 1), Some(20.0));
        assert_eq!(trace.value(ChannelRef::Output(1), 0), Some(2.0));
        assert_eq!(trace.value(ChannelRef::Output(2), 0), None);
        assert_eq!(trace.value(ChannelRef::Output(0), 2), None);

        let prefix = trace.prefix(1);
        assert_eq!(prefix.len(), 1);
        assert_eq!(prefix.abstract_inputs, vec![vec![0]]);
    }

    #[test]
    fn display_rows() {
        let mut trace = IoTrace::default();
        trace.push(vec![0, 1], vec![0.0, 325.0], vec![35.5], vec![0]);
        let text = trace.to_string();
        assert!(text.contains("input:           [0, 325]"));
        assert!(text.contains("abstract input:  [0, 1]"));
    }
}
