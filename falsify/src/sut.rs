//! The system under test
//!
//! The simulator itself is external to this crate; it is driven through the [`Sut`]
//! trait. A [`SutHandle`] wraps it for the duration of an experiment: it maps abstract
//! inputs to concrete values, counts simulations and their wall-clock time, and closes
//! the simulator when dropped.

use std::time::{Duration, Instant};

use crate::mapper::{SignalMapper, Word};
use crate::{FalsifyResult, IoTrace, SimulationError};

/// A simulatable, deterministic system with piecewise-constant inputs.
pub trait Sut {
    /// Number of concrete input values per step
    fn input_width(&self) -> usize;

    /// Number of raw output values per sample
    fn output_width(&self) -> usize;

    /// Restart the simulation from the initial state.
    fn reset(&mut self) -> Result<(), SimulationError>;

    /// Hold `input` for `duration` and return the raw output samples produced.
    ///
    /// The sub-trace excludes the starting instant and includes the end. The first step
    /// after a reset has a zero duration and returns the initial sample.
    fn step(&mut self, input: &[f64], duration: Duration) -> Result<Vec<Vec<f64>>, SimulationError>;

    /// Release the simulator.
    fn close(&mut self) -> Result<(), SimulationError> {
        Ok(())
    }
}

impl<S: Sut + ?Sized> Sut for Box<S> {
    fn input_width(&self) -> usize {
        (**self).input_width()
    }

    fn output_width(&self) -> usize {
        (**self).output_width()
    }

    fn reset(&mut self) -> Result<(), SimulationError> {
        (**self).reset()
    }

    fn step(&mut self, input: &[f64], duration: Duration) -> Result<Vec<Vec<f64>>, SimulationError> {
        (**self).step(input, duration)
    }

    fn close(&mut self) -> Result<(), SimulationError> {
        (**self).close()
    }
}

/// Scoped owner of a [`Sut`] and its counters
#[derive(Debug)]
pub struct SutHandle<S: Sut> {
    sut: S,
    closed: bool,
    simulations: usize,
    simulation_time: Duration,
}

impl<S: Sut> SutHandle<S> {
    pub fn new(sut: S) -> Self {
        Self {
            sut,
            closed: false,
            simulations: 0,
            simulation_time: Duration::ZERO,
        }
    }

    /// Number of simulations since the last [`clear`](Self::clear)
    pub fn simulations(&self) -> usize {
        self.simulations
    }

    /// Cumulative simulation wall-clock time since the last [`clear`](Self::clear)
    pub fn simulation_time(&self) -> Duration {
        self.simulation_time
    }

    /// Reset the counters without reloading the simulator.
    pub fn clear(&mut self) {
        self.simulations = 0;
        self.simulation_time = Duration::ZERO;
    }

    pub fn get_ref(&self) -> &S {
        &self.sut
    }

    /// Simulate `word` from the initial state.
    ///
    /// The first letter is applied for a zero duration, so sample `0` is the initial
    /// output. Every later letter `t` is held over `((t - 1) * signal_step, t *
    /// signal_step]`, and sample `t` is the extended output of that sub-trace.
    pub fn execute(&mut self, mapper: &SignalMapper, word: &Word, signal_step: Duration) -> FalsifyResult<IoTrace> {
        if self.closed {
            return Err(SimulationError::Closed.into());
        }
        let start = Instant::now();
        let result = self.run(mapper, word, signal_step);
        self.simulations += 1;
        self.simulation_time += start.elapsed();
        result
    }

    fn run(&mut self, mapper: &SignalMapper, word: &Word, signal_step: Duration) -> FalsifyResult<IoTrace> {
        self.sut.reset()?;
        let mut trace = IoTrace::with_capacity(word.len());
        for (t, letter) in word.iter().enumerate() {
            let input = mapper.concretize(letter)?;
            if input.len() != self.sut.input_width() {
                return Err(SimulationError::InputWidth {
                    expected: self.sut.input_width(),
                    actual: input.len(),
                }
                .into());
            }
            let duration = if t == 0 { Duration::ZERO } else { signal_step };
            let sub_trace = self.sut.step(&input, duration)?;
            let output = mapper.extend(&sub_trace)?;
            let abstract_output = mapper.abstract_output(&output)?;
            trace.push(letter.clone(), input, output, abstract_output);
        }
        Ok(trace)
    }

    /// Close the simulator. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), SimulationError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.sut.close()
    }
}

impl<S: Sut> Drop for SutHandle<S> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("failed to close the system under test: {}", err);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::mapper::pseudo::PseudoSignalExtender;
    use crate::mapper::{InputMapper, OutputMapper};
    use crate::Error;

    /// Echoes its input, sampled `substeps` times per step.
    pub(crate) struct Echo {
        pub substeps: usize,
        pub closed: Rc<Cell<usize>>,
    }

    impl Echo {
        pub(crate) fn new() -> Self {
            Self {
                substeps: 2,
                closed: Rc::default(),
            }
        }
    }

    impl Sut for Echo {
        fn input_width(&self) -> usize {
            1
        }

        fn output_width(&self) -> usize {
            1
        }

        fn reset(&mut self) -> Result<(), SimulationError> {
            Ok(())
        }

        fn step(&mut self, input: &[f64], duration: Duration) -> Result<Vec<Vec<f64>>, SimulationError> {
            let samples = if duration.is_zero() { 1 } else { self.substeps };
            Ok(vec![input.to_vec(); samples])
        }

        fn close(&mut self) -> Result<(), SimulationError> {
            self.closed.set(self.closed.get() + 1);
            Ok(())
        }
    }

    /// A mapper for [`Echo`]: one input channel `u` in `{0, 50, 100}`, one output `y`
    /// with breakpoints `[20, 60]`, and the pseudo-signal `max_y`.
    pub(crate) fn echo_mapper() -> SignalMapper {
        let input = InputMapper::new([("u", vec![0.0, 50.0, 100.0])]).unwrap();
        let extender = PseudoSignalExtender::new(["y"])
            .with_signal("max_y", "previous_max(y)")
            .unwrap();
        let output = OutputMapper::new([("y", vec![20.0, 60.0]), ("max_y", vec![])]).unwrap();
        SignalMapper::new(input, output, extender).unwrap()
    }

    #[test]
    fn execute_maps_and_counts() {
        let mapper = echo_mapper();
        let mut handle = SutHandle::new(Echo::new());
        let word = vec![vec![0], vec![2], vec![1]];
        let trace = handle.execute(&mapper, &word, Duration::from_secs(1)).unwrap();

        assert_eq!(trace.abstract_inputs, word);
        assert_eq!(trace.inputs, vec![vec![0.0], vec![100.0], vec![50.0]]);
        assert_eq!(trace.outputs, vec![vec![0.0, 0.0], vec![100.0, 100.0], vec![50.0, 50.0]]);
        assert_eq!(trace.abstract_outputs, vec![vec![0, 0], vec![2, 0], vec![1, 0]]);
        assert_eq!(handle.simulations(), 1);

        handle.clear();
        assert_eq!(handle.simulations(), 0);
        assert_eq!(handle.simulation_time(), Duration::ZERO);
    }

    #[test]
    fn first_letter_samples_the_initial_state() {
        struct Recorder(Vec<(f64, Duration)>);
        impl Sut for Recorder {
            fn input_width(&self) -> usize {
                1
            }
            fn output_width(&self) -> usize {
                1
            }
            fn reset(&mut self) -> Result<(), SimulationError> {
                self.0.clear();
                Ok(())
            }
            fn step(&mut self, input: &[f64], duration: Duration) -> Result<Vec<Vec<f64>>, SimulationError> {
                self.0.push((input[0], duration));
                Ok(vec![vec![input[0]]])
            }
        }

        let mut handle = SutHandle::new(Recorder(Vec::new()));
        let word = vec![vec![2], vec![0], vec![1]];
        handle.execute(&echo_mapper(), &word, Duration::from_millis(500)).unwrap();
        assert_eq!(
            handle.get_ref().0,
            vec![
                (100.0, Duration::ZERO),
                (0.0, Duration::from_millis(500)),
                (50.0, Duration::from_millis(500)),
            ]
        );
    }

    #[test]
    fn closes_once_on_drop() {
        let sut = Echo::new();
        let closed = sut.closed.clone();
        {
            let mut handle = SutHandle::new(sut);
            handle.close().unwrap();
            let err = handle.execute(&echo_mapper(), &vec![vec![0]], Duration::from_secs(1));
            assert!(matches!(err, Err(Error::Simulation(SimulationError::Closed))));
        }
        assert_eq!(closed.get(), 1);

        let sut = Echo::new();
        let closed = sut.closed.clone();
        drop(SutHandle::new(sut));
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn input_width_is_checked() {
        struct Wide;
        impl Sut for Wide {
            fn input_width(&self) -> usize {
                2
            }
            fn output_width(&self) -> usize {
                1
            }
            fn reset(&mut self) -> Result<(), SimulationError> {
                Ok(())
            }
            fn step(&mut self, _: &[f64], _: Duration) -> Result<Vec<Vec<f64>>, SimulationError> {
                Ok(vec![vec![0.0]])
            }
        }

        let mut handle = SutHandle::new(Wide);
        let err = handle.execute(&echo_mapper(), &vec![vec![0]], Duration::from_secs(1));
        assert!(matches!(
            err,
            Err(Error::Simulation(SimulationError::InputWidth { expected: 2, actual: 1 }))
        ));
    }
}
