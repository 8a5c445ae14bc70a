//! Falsify a thermostat against two requirements.
//!
//! The room temperature follows `dT/dt = k (T_out - T) + p * heat`, integrated with a
//! fixed Euler step. The input is the heater power; the outputs are the temperature
//! and the cumulative energy.

use std::time::Duration;

use falsify::config::BenchmarkConfig;
use falsify::experiment::{run_batch, run_experiment, write_csv, Report};
use falsify::sut::{Sut, SutHandle};
use falsify::SimulationError;

const BENCHMARK: &str = r#"{
    "name": "heater",
    "inputs": [{"name": "power", "values": [0.0, 0.5, 1.0]}],
    "outputs": [
        {"name": "temp", "breakpoints": [18.0, 22.0, 26.0]},
        {"name": "energy"}
    ],
    "pseudo_signals": [
        {"name": "max_temp", "expr": "previous_max(temp)", "breakpoints": [26.0]},
        {"name": "min_temp", "expr": "previous_min(temp)", "breakpoints": [15.0]}
    ],
    "signal_step": 5.0,
    "simulation_step": 0.5,
    "properties": [
        "alw_[0,9] (max_temp < 30)",
        "alw_[0,9] (min_temp > 10) && ev_[0,9] (temp >= 22 || energy < 20)"
    ],
    "signal_length": 10,
    "ga": {"population_size": 20, "max_test": 2000, "seed": 42},
    "timeout_secs": 30,
    "repetitions": 3
}"#;

struct Heater {
    dt: f64,
    temp: f64,
    energy: f64,
}

impl Heater {
    const OUTSIDE: f64 = 5.0;
    const LOSS: f64 = 0.05;
    const GAIN: f64 = 2.0;

    fn new(dt: f64) -> Self {
        Self {
            dt,
            temp: 20.0,
            energy: 0.0,
        }
    }
}

impl Sut for Heater {
    fn input_width(&self) -> usize {
        1
    }

    fn output_width(&self) -> usize {
        2
    }

    fn reset(&mut self) -> Result<(), SimulationError> {
        self.temp = 20.0;
        self.energy = 0.0;
        Ok(())
    }

    fn step(&mut self, input: &[f64], duration: Duration) -> Result<Vec<Vec<f64>>, SimulationError> {
        let power = input[0];
        if duration.is_zero() {
            return Ok(vec![vec![self.temp, self.energy]]);
        }
        let steps = (duration.as_secs_f64() / self.dt).round() as usize;
        let mut samples = Vec::with_capacity(steps);
        for _ in 0..steps {
            self.temp += self.dt * (Self::LOSS * (Self::OUTSIDE - self.temp) + Self::GAIN * power);
            self.energy += self.dt * power;
            if !self.temp.is_finite() {
                return Err(SimulationError::Failed("temperature diverged".to_string()));
            }
            samples.push(vec![self.temp, self.energy]);
        }
        Ok(samples)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = BenchmarkConfig::from_json(BENCHMARK)?;
    env_logger::Builder::new().filter_level(config.log_level).init();
    let benchmark = config.compile()?;

    let mut sut = SutHandle::new(Heater::new(benchmark.simulation_step));
    let result = run_experiment(&benchmark, &mut sut, 0)?;
    println!(
        "{}",
        Report {
            benchmark: &benchmark,
            result: &result,
        }
    );

    let summaries = run_batch(&benchmark, &mut sut)?;
    write_csv(std::io::stdout().lock(), &summaries)?;
    Ok(())
}
