//! Repeated falsification runs
//!
//! Every repetition of a benchmark starts from a fresh property list and fresh
//! simulation counters, and is summarised by an [`ExperimentSummary`]. A batch of
//! summaries is written as CSV or as JSON.

use std::fmt;
use std::io::Write;

use itertools::Itertools;
use serde::Serialize;

use crate::adaptive::PropertyStatus;
use crate::config::Benchmark;
use crate::core::trace::Rows;
use crate::sut::{Sut, SutHandle};
use crate::verifier::{VerificationResult, Verifier};
use crate::{Error, FalsifyResult};

/// The statistics of one repetition
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExperimentSummary {
    pub index: usize,
    /// `true` if no property was falsified
    pub satisfied: bool,
    pub simulations: usize,
    pub eq_simulations: usize,
    /// Wall-clock time of the run, in seconds
    pub elapsed: f64,
    /// Final status of every property, in declaration order
    pub properties: Vec<PropertyStatus>,
}

impl ExperimentSummary {
    pub fn new(index: usize, result: &VerificationResult) -> Self {
        Self {
            index,
            satisfied: !result.is_falsified(),
            simulations: result.simulations,
            eq_simulations: result.eq_simulations,
            elapsed: result.elapsed.as_secs_f64(),
            properties: result.properties.iter().map(|(_, status)| *status).collect(),
        }
    }
}

const CSV_HEADER: &str = "index,satisfied,simulations,eq_simulations,elapsed";

/// Write `summaries` as CSV, after a header row.
pub fn write_csv<W: Write>(mut writer: W, summaries: &[ExperimentSummary]) -> std::io::Result<()> {
    writeln!(writer, "{}", CSV_HEADER)?;
    for s in summaries {
        writeln!(
            writer,
            "{},{},{},{},{}",
            s.index, s.satisfied, s.simulations, s.eq_simulations, s.elapsed
        )?;
    }
    writer.flush()
}

/// Write `summaries` as a JSON array.
pub fn write_json<W: Write>(mut writer: W, summaries: &[ExperimentSummary]) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, summaries)?;
    writeln!(writer)?;
    writer.flush()
}

/// Run repetition `index` of `benchmark`: the corner-case search, then the genetic
/// search, under the benchmark timeout.
pub fn run_experiment<S: Sut>(
    benchmark: &Benchmark,
    sut: &mut SutHandle<S>,
    index: usize,
) -> FalsifyResult<VerificationResult> {
    let mut verifier = Verifier::new(sut, &benchmark.mapper, benchmark.properties(), benchmark.signal_step)?
        .with_verbosity(benchmark.log_level);
    verifier.set_timeout(benchmark.timeout)?;
    let (length, switch_step) = benchmark.corner;
    verifier.add_corner_case_oracle(length, switch_step)?;
    verifier.add_ga_oracle(benchmark.genetic_oracle(index)?)?;
    verifier.run()
}

/// Run every repetition of `benchmark`.
///
/// A repetition aborted by a simulation failure is logged and skipped; any other
/// error aborts the batch.
pub fn run_batch<S: Sut>(benchmark: &Benchmark, sut: &mut SutHandle<S>) -> FalsifyResult<Vec<ExperimentSummary>> {
    let mut summaries = Vec::with_capacity(benchmark.repetitions);
    for index in 0..benchmark.repetitions {
        log::info!("{}: experiment {} / {}", benchmark.name, index + 1, benchmark.repetitions);
        match run_experiment(benchmark, sut, index) {
            Ok(result) => summaries.push(ExperimentSummary::new(index, &result)),
            Err(Error::Simulation(err)) => {
                log::error!("{}: experiment {} aborted: {}", benchmark.name, index + 1, err);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(summaries)
}

/// The human-readable report of a single run
pub struct Report<'a> {
    pub benchmark: &'a Benchmark,
    pub result: &'a VerificationResult,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.result.counterexamples.is_empty() {
            writeln!(f, "The property is likely satisfied")?;
        }
        for cex in &self.result.counterexamples {
            let source = self
                .benchmark
                .formulas
                .get(cex.property)
                .map_or_else(|| cex.formula.to_string(), |(src, _)| src.clone());
            writeln!(f, "{} is falsified by the following counterexample", source)?;
            writeln!(f, "cex concrete input: {}", Rows(&cex.trace.inputs))?;
            writeln!(f, "cex abstract input: {}", Rows(&cex.trace.abstract_inputs))?;
            writeln!(f, "cex output: {}", Rows(&cex.trace.outputs))?;
        }
        writeln!(
            f,
            "Execution time for simulation: {} [sec]",
            self.result.simulation_time.as_secs_f64()
        )?;
        writeln!(f, "Number of simulations: {}", self.result.simulations)?;
        write!(
            f,
            "Number of simulations for equivalence testing: {}",
            self.result.eq_simulations
        )?;
        let unresolved: Vec<_> = self
            .result
            .properties
            .iter()
            .filter(|(_, status)| *status == PropertyStatus::Exhausted)
            .map(|(expr, _)| expr)
            .collect();
        if !unresolved.is_empty() && !self.result.counterexamples.is_empty() {
            write!(f, "\nNot falsified: {}", unresolved.iter().join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::BenchmarkConfig;
    use crate::sut::tests::Echo;
    use crate::SimulationError;

    fn echo_benchmark(properties: &[&str], repetitions: usize) -> Benchmark {
        let config = BenchmarkConfig::from_json(&format!(
            r#"{{
                "name": "echo",
                "inputs": [{{"name": "u", "values": [0.0, 50.0, 100.0]}}],
                "outputs": [{{"name": "y", "breakpoints": [20.0, 60.0]}}],
                "pseudo_signals": [{{"name": "max_y", "expr": "previous_max(y)"}}],
                "signal_step": 1.0,
                "properties": {},
                "signal_length": 3,
                "ga": {{"population_size": 4, "max_test": 12, "seed": 5}},
                "timeout_secs": 30,
                "repetitions": {},
                "log_level": "off"
            }}"#,
            serde_json::to_string(properties).unwrap(),
            repetitions
        ))
        .unwrap();
        config.compile().unwrap()
    }

    #[test]
    fn batch_summaries() {
        let benchmark = echo_benchmark(&["alw_[0,2] (y < 80)"], 2);
        let mut sut = SutHandle::new(Echo::new());
        let summaries = run_batch(&benchmark, &mut sut).unwrap();
        assert_eq!(summaries.len(), 2);
        for (i, s) in summaries.iter().enumerate() {
            assert_eq!(s.index, i);
            assert!(!s.satisfied);
            // counters restart with every repetition
            assert_eq!(s.eq_simulations, 2);
            assert_eq!(s.simulations, 2);
        }

        let mut out = Vec::new();
        write_csv(&mut out, &summaries).unwrap();
        let csv = String::from_utf8(out).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "index,satisfied,simulations,eq_simulations,elapsed");
        assert!(lines[1].starts_with("0,false,2,2,"));
        assert!(lines[2].starts_with("1,false,2,2,"));

        let mut out = Vec::new();
        write_json(&mut out, &summaries).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(2));
        assert_eq!(json[1]["index"], 1);
        assert_eq!(json[1]["satisfied"], false);
        assert_eq!(json[1]["eq_simulations"], 2);
        assert_eq!(json[1]["properties"], serde_json::json!(["falsified"]));
    }

    #[test]
    fn simulation_failures_skip_the_repetition() {
        struct Broken;
        impl Sut for Broken {
            fn input_width(&self) -> usize {
                1
            }
            fn output_width(&self) -> usize {
                1
            }
            fn reset(&mut self) -> Result<(), SimulationError> {
                Err(SimulationError::Failed("solver diverged".to_string()))
            }
            fn step(&mut self, _: &[f64], _: Duration) -> Result<Vec<Vec<f64>>, SimulationError> {
                Ok(vec![vec![0.0]])
            }
        }

        let benchmark = echo_benchmark(&["y < 80"], 3);
        let mut sut = SutHandle::new(Broken);
        assert!(run_batch(&benchmark, &mut sut).unwrap().is_empty());
    }

    #[test]
    fn report() {
        let benchmark = echo_benchmark(&["alw_[0,2] (y < 80)", "alw_[0,2] (max_y <= 100)"], 1);
        let mut sut = SutHandle::new(Echo::new());
        let result = run_experiment(&benchmark, &mut sut, 0).unwrap();
        let text = Report {
            benchmark: &benchmark,
            result: &result,
        }
        .to_string();
        assert!(text.contains("alw_[0,2] (y < 80) is falsified by the following counterexample"));
        assert!(text.contains("cex concrete input: [100]; [100]; [100]"));
        assert!(text.contains("cex abstract input: [2]; [2]; [2]"));
        assert!(text.contains("Number of simulations for equivalence testing: "));
        assert!(text.contains("Not falsified: "));

        let benchmark = echo_benchmark(&["alw_[0,2] (max_y <= 100)"], 1);
        let result = run_experiment(&benchmark, &mut sut, 0).unwrap();
        let text = Report {
            benchmark: &benchmark,
            result: &result,
        }
        .to_string();
        assert!(text.starts_with("The property is likely satisfied"));
        // 3 corner-case words and the genetic budget
        assert!(text.contains("Number of simulations for equivalence testing: 15"));
    }
}
