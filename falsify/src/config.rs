//! Benchmark declarations
//!
//! A benchmark is declared in JSON and compiled into the signal mapper, the parsed
//! properties and the oracle parameters, validating everything before the first
//! simulation.
//!
//! ```
//! use falsify::config::BenchmarkConfig;
//!
//! let config = BenchmarkConfig::from_json(r#"{
//!     "name": "AT1",
//!     "inputs": [
//!         {"name": "throttle", "values": [0.0, 100.0]},
//!         {"name": "brake", "values": [0.0, 325.0]}
//!     ],
//!     "outputs": [
//!         {"name": "velocity", "breakpoints": [120.0]},
//!         {"name": "rpm"},
//!         {"name": "gear"}
//!     ],
//!     "signal_step": 1.0,
//!     "properties": ["alw_[0,20] (velocity < 120)"],
//!     "signal_length": 30
//! }"#).unwrap();
//! let benchmark = config.compile().unwrap();
//! assert_eq!(benchmark.corner, (30, 15));
//! assert_eq!(benchmark.properties().len(), 1);
//! ```

use std::io::Read;
use std::time::Duration;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::adaptive::AdaptiveStlList;
use crate::mapper::pseudo::PseudoSignalExtender;
use crate::mapper::{InputMapper, OutputMapper, SignalMapper};
use crate::oracle::{GaConfig, GeneticOracle};
use crate::{parse_str, ConfigurationError, FalsifyResult, StlExpr};

/// An input channel and the values it can take
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputChannel {
    pub name: String,
    pub values: Vec<f64>,
}

/// A raw output channel; without breakpoints it is ignored by the abstraction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputChannel {
    pub name: String,
    #[serde(default)]
    pub breakpoints: Vec<f64>,
}

/// A derived output channel, e.g. `previous_max(velocity)`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PseudoSignal {
    pub name: String,
    pub expr: String,
    #[serde(default)]
    pub breakpoints: Vec<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CornerCaseConfig {
    pub length: usize,
    pub switch_step: usize,
}

fn default_timeout() -> f64 {
    600.0
}

fn default_repetitions() -> usize {
    1
}

fn default_log_level() -> LevelFilter {
    LevelFilter::Info
}

/// The declaration of one benchmark
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkConfig {
    pub name: String,
    pub inputs: Vec<InputChannel>,
    pub outputs: Vec<OutputChannel>,
    #[serde(default)]
    pub pseudo_signals: Vec<PseudoSignal>,
    /// Duration of one input letter, in seconds
    pub signal_step: f64,
    /// Sampling step of the simulation itself; defaults to `signal_step`.
    #[serde(default)]
    pub simulation_step: Option<f64>,
    /// STL formulas over the declared channel names
    pub properties: Vec<String>,
    /// Number of letters of every input word
    pub signal_length: usize,
    /// Defaults to `(signal_length, signal_length / 2)`.
    #[serde(default)]
    pub corner_case: Option<CornerCaseConfig>,
    #[serde(default)]
    pub ga: GaConfig,
    #[serde(default = "default_timeout")]
    pub timeout_secs: f64,
    #[serde(default = "default_repetitions")]
    pub repetitions: usize,
    #[serde(default = "default_log_level")]
    pub log_level: LevelFilter,
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidParameter {
            name,
            reason: format!("expected a positive number, got {}", value),
        })
    }
}

impl BenchmarkConfig {
    pub fn from_json(src: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(src)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Validate the declaration and build the mapper, the formulas and the oracle
    /// parameters.
    pub fn compile(&self) -> FalsifyResult<Benchmark> {
        positive("signal_step", self.signal_step)?;
        let simulation_step = self.simulation_step.unwrap_or(self.signal_step);
        positive("simulation_step", simulation_step)?;
        if simulation_step > self.signal_step {
            return Err(ConfigurationError::InvalidParameter {
                name: "simulation_step",
                reason: "must not exceed the signal step".to_string(),
            }
            .into());
        }
        positive("timeout_secs", self.timeout_secs)?;
        if self.signal_length == 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "signal_length",
                reason: "words must have at least one letter".to_string(),
            }
            .into());
        }
        if self.repetitions == 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "repetitions",
                reason: "must be positive".to_string(),
            }
            .into());
        }
        if self.properties.is_empty() {
            return Err(ConfigurationError::InvalidParameter {
                name: "properties",
                reason: "no property to falsify".to_string(),
            }
            .into());
        }
        self.ga.validate()?;

        let input = InputMapper::new(self.inputs.iter().map(|c| (c.name.clone(), c.values.clone())))?;
        let mut extender = PseudoSignalExtender::new(self.outputs.iter().map(|c| c.name.clone()));
        for pseudo in &self.pseudo_signals {
            extender = extender.with_signal(pseudo.name.clone(), &pseudo.expr)?;
        }
        let output = OutputMapper::new(
            self.outputs
                .iter()
                .map(|c| (c.name.clone(), c.breakpoints.clone()))
                .chain(self.pseudo_signals.iter().map(|p| (p.name.clone(), p.breakpoints.clone()))),
        )?;
        let mapper = SignalMapper::new(input, output, extender)?;

        let ctx = mapper.expr_builder(self.signal_step)?;
        let mut formulas = Vec::with_capacity(self.properties.len());
        for src in &self.properties {
            let expr = parse_str(src, &ctx)?;
            log::debug!("property `{}` parsed as `{}`", src, expr);
            formulas.push((src.clone(), expr));
        }

        let corner = match self.corner_case {
            Some(c) => (c.length, c.switch_step),
            None => (self.signal_length, self.signal_length / 2),
        };

        Ok(Benchmark {
            name: self.name.clone(),
            mapper,
            formulas,
            signal_step: self.signal_step,
            simulation_step,
            signal_length: self.signal_length,
            corner,
            ga: self.ga.clone(),
            timeout: Duration::from_secs_f64(self.timeout_secs),
            repetitions: self.repetitions,
            log_level: self.log_level,
        })
    }
}

/// A validated benchmark, ready to run
#[derive(Clone, Debug)]
pub struct Benchmark {
    pub name: String,
    pub mapper: SignalMapper,
    /// The source text of every property with its parsed formula
    pub formulas: Vec<(String, StlExpr)>,
    pub signal_step: f64,
    pub simulation_step: f64,
    pub signal_length: usize,
    /// Word length and switching step of the corner-case search
    pub corner: (usize, usize),
    pub ga: GaConfig,
    pub timeout: Duration,
    pub repetitions: usize,
    pub log_level: LevelFilter,
}

impl Benchmark {
    /// A fresh property list; strengthening state never carries over between runs.
    pub fn properties(&self) -> AdaptiveStlList {
        AdaptiveStlList::new(self.formulas.iter().map(|(_, expr)| expr.clone()), self.signal_length)
    }

    /// The genetic oracle of repetition `index`.
    ///
    /// A configured seed is offset by the repetition index, so repetitions explore
    /// different populations while staying reproducible.
    pub fn genetic_oracle(&self, index: usize) -> Result<GeneticOracle, ConfigurationError> {
        let config = GaConfig {
            seed: self.ga.seed.map(|seed| seed.wrapping_add(index as u64)),
            ..self.ga.clone()
        };
        GeneticOracle::new(self.signal_length, config)
    }
}
