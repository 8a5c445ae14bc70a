//! The learned abstraction of the system under test
//!
//! An observation tree is a prefix tree of the abstract input words queried so far.
//! Each node stores what was observed at the step that reached it. Since the system
//! is deterministic, a word whose path is already in the tree is answered without
//! simulation.

use hashbrown::HashMap;

use crate::mapper::{Letter, Word};
use crate::IoTrace;

#[derive(Clone, Debug, Default)]
struct Node {
    children: HashMap<Letter, usize>,
    input: Vec<f64>,
    output: Vec<f64>,
    abstract_output: Letter,
}

/// Prefix tree of queried words and their observations
#[derive(Clone, Debug)]
pub struct ObservationTree {
    nodes: Vec<Node>,
}

impl Default for ObservationTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservationTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
        }
    }

    /// Number of observed steps, i.e., nodes below the root
    pub fn size(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// The trace of `word`, if every step of it was observed.
    pub fn lookup(&self, word: &Word) -> Option<IoTrace> {
        let mut trace = IoTrace::with_capacity(word.len());
        let mut current = 0;
        for letter in word {
            current = *self.nodes[current].children.get(letter)?;
            let node = &self.nodes[current];
            trace.push(
                letter.clone(),
                node.input.clone(),
                node.output.clone(),
                node.abstract_output.clone(),
            );
        }
        Some(trace)
    }

    /// Record every step of `trace`.
    pub fn insert(&mut self, trace: &IoTrace) {
        let mut current = 0;
        for (t, letter) in trace.abstract_inputs.iter().enumerate() {
            current = match self.nodes[current].children.get(letter) {
                Some(&next) => next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(Node {
                        children: HashMap::new(),
                        input: trace.inputs[t].clone(),
                        output: trace.outputs[t].clone(),
                        abstract_output: trace.abstract_outputs[t].clone(),
                    });
                    self.nodes[current].children.insert(letter.clone(), next);
                    next
                }
            };
        }
    }
}
