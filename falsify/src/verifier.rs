//! The falsification verifier
//!
//! A [`Verifier`] runs the configured equivalence oracles against one system under
//! test, in a fixed order: the corner-case search first, the genetic search second.
//! Every query goes through the observation tree, and every trace is scored against
//! the [`AdaptiveStlList`]. A property with a negative robustness is falsified, its
//! counterexample recorded, and the remaining searches only target the properties
//! still active.

use std::fmt;
use std::time::{Duration, Instant};

use log::{Level, LevelFilter};

use crate::adaptive::{AdaptiveStlList, PropertyStatus};
use crate::learning::ObservationTree;
use crate::mapper::{Letter, SignalMapper, Word};
use crate::oracle::{log_at, CornerCaseOracle, EquivalenceOracle, Evaluation, GeneticOracle, SearchContext};
use crate::sut::{Sut, SutHandle};
use crate::{ConfigurationError, FalsifyResult, IoTrace, LifecycleError, QuantitativeSemantics, StlExpr};

/// The phases of a verification run, in order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VerifierState {
    Init,
    CornerSearch,
    GaSearch,
    Satisfied,
    Falsified,
}

impl fmt::Display for VerifierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifierState::Init => write!(f, "init"),
            VerifierState::CornerSearch => write!(f, "corner-case search"),
            VerifierState::GaSearch => write!(f, "genetic search"),
            VerifierState::Satisfied => write!(f, "satisfied"),
            VerifierState::Falsified => write!(f, "falsified"),
        }
    }
}

/// A trace violating one property
#[derive(Clone, Debug)]
pub struct Counterexample {
    /// Index of the property in the property list
    pub property: usize,
    pub formula: StlExpr,
    /// Robustness of the property at time 0; always negative
    pub robustness: f64,
    pub trace: IoTrace,
}

impl fmt::Display for Counterexample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (robustness {})", self.formula, self.robustness)?;
        write!(f, "{}", self.trace)
    }
}

/// The outcome and statistics of one run
#[derive(Clone, Debug)]
pub struct VerificationResult {
    /// Either [`Satisfied`](VerifierState::Satisfied) or [`Falsified`](VerifierState::Falsified)
    pub outcome: VerifierState,
    /// Every property with its final status, in list order
    pub properties: Vec<(StlExpr, PropertyStatus)>,
    /// In the order the properties were falsified
    pub counterexamples: Vec<Counterexample>,
    /// Number of simulations of the system under test
    pub simulations: usize,
    /// Number of equivalence queries, answered by simulation or by the observation tree
    pub eq_simulations: usize,
    pub simulation_time: Duration,
    pub elapsed: Duration,
    /// Size of the observation tree at the end of the run
    pub tree_size: usize,
}

impl VerificationResult {
    pub fn is_falsified(&self) -> bool {
        self.outcome == VerifierState::Falsified
    }

    /// The counterexample of a property, if it was falsified.
    pub fn counterexample(&self, property: usize) -> Option<&Counterexample> {
        self.counterexamples.iter().find(|cex| cex.property == property)
    }
}

pub struct Verifier<'a, S: Sut> {
    sut: &'a mut SutHandle<S>,
    mapper: &'a SignalMapper,
    properties: AdaptiveStlList,
    signal_step: Duration,
    timeout: Option<Duration>,
    oracles: Vec<(VerifierState, Box<dyn EquivalenceOracle>)>,
    state: VerifierState,
    tree: ObservationTree,
    counterexamples: Vec<Counterexample>,
    eq_queries: usize,
    verbosity: LevelFilter,
    deadline: Option<Instant>,
}

impl<'a, S: Sut> Verifier<'a, S> {
    /// A verifier of `properties` on `sut`, holding every input letter for
    /// `signal_step` seconds.
    pub fn new(
        sut: &'a mut SutHandle<S>,
        mapper: &'a SignalMapper,
        properties: AdaptiveStlList,
        signal_step: f64,
    ) -> FalsifyResult<Self> {
        if !signal_step.is_finite() || signal_step <= 0.0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "signal_step",
                reason: format!("expected a positive duration, got {}", signal_step),
            }
            .into());
        }
        Ok(Self {
            sut,
            mapper,
            properties,
            signal_step: Duration::from_secs_f64(signal_step),
            timeout: None,
            oracles: Vec::new(),
            state: VerifierState::Init,
            tree: ObservationTree::new(),
            counterexamples: Vec::new(),
            eq_queries: 0,
            verbosity: LevelFilter::Info,
            deadline: None,
        })
    }

    /// Gate the search logs at `verbosity`.
    pub fn with_verbosity(mut self, verbosity: LevelFilter) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn state(&self) -> VerifierState {
        self.state
    }

    pub fn properties(&self) -> &AdaptiveStlList {
        &self.properties
    }

    pub fn counterexamples(&self) -> &[Counterexample] {
        &self.counterexamples
    }

    pub fn tree_size(&self) -> usize {
        self.tree.size()
    }

    fn check_not_started(&self) -> Result<(), LifecycleError> {
        if self.state == VerifierState::Init {
            Ok(())
        } else {
            Err(LifecycleError::SearchStarted)
        }
    }

    /// Bound the wall-clock time of the search. Must precede every oracle.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), LifecycleError> {
        self.check_not_started()?;
        if !self.oracles.is_empty() {
            return Err(LifecycleError::TimeoutAfterOracle);
        }
        self.timeout = Some(timeout);
        Ok(())
    }

    pub fn add_corner_case_oracle(&mut self, length: usize, switch_step: usize) -> Result<(), LifecycleError> {
        self.check_not_started()?;
        self.oracles.push((
            VerifierState::CornerSearch,
            Box::new(CornerCaseOracle::new(length, switch_step)),
        ));
        Ok(())
    }

    pub fn add_ga_oracle(&mut self, oracle: GeneticOracle) -> Result<(), LifecycleError> {
        self.check_not_started()?;
        if self.timeout.is_none() {
            return Err(LifecycleError::MissingTimeout);
        }
        self.oracles.push((VerifierState::GaSearch, Box::new(oracle)));
        Ok(())
    }

    /// Run every oracle until all properties are resolved or the timeout elapses.
    pub fn run(&mut self) -> FalsifyResult<VerificationResult> {
        self.check_not_started()?;
        let start = Instant::now();
        self.sut.clear();
        self.deadline = self.timeout.map(|timeout| start + timeout);

        let mut oracles = std::mem::take(&mut self.oracles);
        oracles.sort_by_key(|(state, _)| *state);
        for (state, oracle) in oracles.iter_mut() {
            if self.should_stop() {
                break;
            }
            self.state = *state;
            log_at!(self.verbosity, Level::Info, "starting the {} search", oracle.name());
            let queries = oracle.search(self)?;
            log_at!(
                self.verbosity,
                Level::Info,
                "{} search done after {} queries; {} of {} properties still active",
                oracle.name(),
                queries,
                self.properties.active_count(),
                self.properties.len()
            );
        }

        self.properties.mark_exhausted_remaining();
        self.state = if self.counterexamples.is_empty() {
            VerifierState::Satisfied
        } else {
            VerifierState::Falsified
        };
        log_at!(self.verbosity, Level::Info, "verification finished: {}", self.state);

        Ok(VerificationResult {
            outcome: self.state,
            properties: self
                .properties
                .iter()
                .map(|p| (p.formula().clone(), p.status()))
                .collect(),
            counterexamples: self.counterexamples.clone(),
            simulations: self.sut.simulations(),
            eq_simulations: self.eq_queries,
            simulation_time: self.sut.simulation_time(),
            elapsed: start.elapsed(),
            tree_size: self.tree.size(),
        })
    }

    /// Simulate the input of `cex` again, bypassing the observation tree, and return
    /// the robustness of its property on the new trace.
    pub fn replay(&mut self, cex: &Counterexample) -> FalsifyResult<Option<f64>> {
        let trace = self
            .sut
            .execute(self.mapper, &cex.trace.abstract_inputs, self.signal_step)?;
        QuantitativeSemantics::robustness(&cex.formula, &trace)
    }

    fn observe(&mut self, word: &Word) -> FalsifyResult<IoTrace> {
        if let Some(trace) = self.tree.lookup(word) {
            return Ok(trace);
        }
        let trace = self.sut.execute(self.mapper, word, self.signal_step)?;
        self.tree.insert(&trace);
        Ok(trace)
    }
}

impl<S: Sut> SearchContext for Verifier<'_, S> {
    fn symbol_counts(&self) -> Vec<usize> {
        let input = self.mapper.input();
        (0..input.width()).filter_map(|i| input.symbol_count(i)).collect()
    }

    fn extremes(&self) -> Vec<Letter> {
        self.mapper.extremes()
    }

    fn evaluate(&mut self, word: &Word) -> FalsifyResult<Evaluation> {
        self.eq_queries += 1;
        let trace = self.observe(word)?;

        let falsified = self.properties.report(&trace)?;
        for &(property, robustness) in &falsified {
            let Some(formula) = self.properties.get(property).map(|p| p.formula().clone()) else {
                continue;
            };
            log_at!(
                self.verbosity,
                Level::Info,
                "falsified `{}` with robustness {} after {} queries",
                formula,
                robustness,
                self.eq_queries
            );
            self.counterexamples.push(Counterexample {
                property,
                formula,
                robustness,
                trace: trace.clone(),
            });
        }

        let fitness = self.properties.min_robustness(&trace)?;
        Ok(Evaluation {
            trace,
            fitness,
            falsified: !falsified.is_empty(),
        })
    }

    fn fitness(&self, trace: &IoTrace) -> FalsifyResult<Option<f64>> {
        self.properties.min_robustness(trace)
    }

    fn revision(&self) -> u64 {
        self.properties.revision()
    }

    fn should_stop(&self) -> bool {
        self.properties.all_resolved() || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn verbosity(&self) -> LevelFilter {
        self.verbosity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::GaConfig;
    use crate::sut::tests::{echo_mapper, Echo};
    use crate::{parse_str, Error};

    fn properties(mapper: &SignalMapper, formulas: &[&str]) -> AdaptiveStlList {
        let ctx = mapper.expr_builder(1.0).unwrap();
        AdaptiveStlList::new(formulas.iter().map(|src| parse_str(src, &ctx).unwrap()), 3)
    }

    #[test]
    fn corner_cases_falsify() {
        let mapper = echo_mapper();
        let mut sut = SutHandle::new(Echo::new());
        let props = properties(&mapper, &["alw_[0,2] (y < 80)"]);
        let mut verifier = Verifier::new(&mut sut, &mapper, props, 1.0).unwrap();
        verifier.add_corner_case_oracle(3, 1).unwrap();

        let result = verifier.run().unwrap();
        assert!(result.is_falsified());
        assert_eq!(result.properties[0].1, PropertyStatus::Falsified);
        // `u = 0` first, then `u = 100`
        assert_eq!(result.eq_simulations, 2);
        assert_eq!(result.simulations, 2);

        let cex = result.counterexample(0).unwrap();
        assert_eq!(cex.robustness, -20.0);
        assert_eq!(cex.trace.abstract_inputs, vec![vec![2]; 3]);
        assert_eq!(verifier.replay(cex).unwrap(), Some(-20.0));
    }

    #[test]
    fn satisfied_after_both_searches() {
        let mapper = echo_mapper();
        let mut sut = SutHandle::new(Echo::new());
        let props = properties(&mapper, &["alw_[0,2] (max_y <= 100)", "ev_[0,2] (y >= 0)"]);
        let mut verifier = Verifier::new(&mut sut, &mapper, props, 1.0)
            .unwrap()
            .with_verbosity(LevelFilter::Off);
        verifier.set_timeout(Duration::from_secs(60)).unwrap();
        verifier.add_corner_case_oracle(3, 1).unwrap();
        let config = GaConfig {
            population_size: 4,
            max_test: 20,
            seed: Some(11),
            ..Default::default()
        };
        verifier.add_ga_oracle(GeneticOracle::new(3, config).unwrap()).unwrap();

        let result = verifier.run().unwrap();
        assert_eq!(result.outcome, VerifierState::Satisfied);
        assert!(result.counterexamples.is_empty());
        assert!(result.properties.iter().all(|(_, s)| *s == PropertyStatus::Exhausted));
        // 3 corner-case words and the whole genetic budget
        assert_eq!(result.eq_simulations, 23);
        // repeated words are answered by the observation tree; only 27 words exist
        assert!(result.simulations <= 23);
        assert!(result.tree_size > 0);
    }

    #[test]
    fn oracles_run_in_order() {
        let mapper = echo_mapper();
        let mut sut = SutHandle::new(Echo::new());
        let props = properties(&mapper, &["alw_[0,2] (y < 120)", "alw_[0,2] (y > -1)"]);
        let mut verifier = Verifier::new(&mut sut, &mapper, props, 1.0).unwrap();
        verifier.set_timeout(Duration::from_secs(60)).unwrap();
        let config = GaConfig {
            population_size: 2,
            max_test: 2,
            seed: Some(3),
            ..Default::default()
        };
        verifier.add_ga_oracle(GeneticOracle::new(3, config).unwrap()).unwrap();
        verifier.add_corner_case_oracle(3, 1).unwrap();

        let result = verifier.run().unwrap();
        assert_eq!(result.eq_simulations, 5);
        assert_eq!(verifier.state(), VerifierState::Satisfied);
    }

    #[test]
    fn lifecycle_errors() {
        let mapper = echo_mapper();
        let mut sut = SutHandle::new(Echo::new());
        let props = properties(&mapper, &["alw_[0,2] (y < 80)"]);
        let mut verifier = Verifier::new(&mut sut, &mapper, props, 1.0).unwrap();

        let ga = || GeneticOracle::new(3, GaConfig::default()).unwrap();
        assert_eq!(verifier.add_ga_oracle(ga()), Err(LifecycleError::MissingTimeout));
        verifier.add_corner_case_oracle(3, 1).unwrap();
        assert_eq!(
            verifier.set_timeout(Duration::from_secs(1)),
            Err(LifecycleError::TimeoutAfterOracle)
        );

        verifier.run().unwrap();
        assert!(matches!(
            verifier.run(),
            Err(Error::Lifecycle(LifecycleError::SearchStarted))
        ));
        assert_eq!(verifier.add_corner_case_oracle(3, 1), Err(LifecycleError::SearchStarted));
    }

    #[test]
    fn invalid_signal_step() {
        let mapper = echo_mapper();
        let mut sut = SutHandle::new(Echo::new());
        let props = properties(&mapper, &["y < 80"]);
        assert!(matches!(
            Verifier::new(&mut sut, &mapper, props, 0.0),
            Err(Error::Configuration(ConfigurationError::InvalidParameter { .. }))
        ));
    }
}
