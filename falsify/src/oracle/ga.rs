//! Genetic-algorithm oracle
//!
//! A steady-state genetic search over abstract input words of a fixed length. The
//! fitness of a word is the minimum robustness of the active properties on its trace,
//! so the search descends toward a violation.

use log::Level;
use rand::prelude::*;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use super::{log_at, rank, EquivalenceOracle, SearchContext};
use crate::mapper::Word;
use crate::{ConfigurationError, FalsifyResult, IoTrace};

/// Parent selection policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// The fittest of `tournament_size` individuals sampled without replacement
    #[default]
    Tournament,
    /// The two fittest individuals
    BestSolution,
}

/// Parameters of the genetic search
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GaConfig {
    pub population_size: usize,
    pub crossover_prob: f64,
    pub mutation_prob: f64,
    pub selection: Selection,
    pub tournament_size: usize,
    /// Maximum number of evaluated individuals
    pub max_test: usize,
    /// Seed of the random generator; drawn from the OS when absent.
    pub seed: Option<u64>,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            crossover_prob: 0.9,
            mutation_prob: 0.01,
            selection: Selection::Tournament,
            tournament_size: 2,
            max_test: 50000,
            seed: None,
        }
    }
}

impl GaConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |name, reason: &str| {
            Err(ConfigurationError::InvalidParameter {
                name,
                reason: reason.to_string(),
            })
        };
        if self.population_size < 2 {
            return invalid("population_size", "the population needs at least 2 individuals");
        }
        if !(0.0..=1.0).contains(&self.crossover_prob) {
            return invalid("crossover_prob", "must be a probability in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.mutation_prob) {
            return invalid("mutation_prob", "must be a probability in [0, 1]");
        }
        if self.tournament_size == 0 {
            return invalid("tournament_size", "must be positive");
        }
        if self.max_test == 0 {
            return invalid("max_test", "must be positive");
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
struct Individual {
    word: Word,
    trace: IoTrace,
    fitness: Option<f64>,
}

fn sort_population(population: &mut [Individual]) {
    population.sort_by(|a, b| rank(a.fitness).total_cmp(&rank(b.fitness)));
}

#[derive(Debug)]
pub struct GeneticOracle {
    length: usize,
    config: GaConfig,
    rng: StdRng,
    initial: Vec<Word>,
    generations: usize,
}

impl GeneticOracle {
    /// A search over words of `length` letters.
    pub fn new(length: usize, config: GaConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        if length == 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "signal_length",
                reason: "words must have at least one letter".to_string(),
            });
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            length,
            config,
            rng,
            initial: Vec::new(),
            generations: 0,
        })
    }

    /// Start from `words`; the rest of the population is drawn at random.
    pub fn with_initial_population(mut self, words: Vec<Word>) -> Self {
        self.initial = words;
        self
    }

    pub fn config(&self) -> &GaConfig {
        &self.config
    }

    /// Number of completed generations
    pub fn generations(&self) -> usize {
        self.generations
    }

    fn random_word(&mut self, symbol_counts: &[usize]) -> Word {
        (0..self.length)
            .map(|_| symbol_counts.iter().map(|&n| self.rng.random_range(0..n)).collect())
            .collect()
    }

    /// Index of the winner of a tournament among the individuals other than `exclude`.
    ///
    /// The population is sorted, so the winner is the smallest sampled index.
    fn tournament(&mut self, size: usize, exclude: Option<usize>) -> usize {
        let pool: Vec<usize> = (0..size).filter(|&i| Some(i) != exclude).collect();
        let k = self.config.tournament_size.min(pool.len());
        index::sample(&mut self.rng, pool.len(), k)
            .into_iter()
            .map(|i| pool[i])
            .min()
            .unwrap_or(pool[0])
    }

    fn select(&mut self, size: usize) -> (usize, usize) {
        match self.config.selection {
            Selection::BestSolution => (0, 1),
            Selection::Tournament => {
                let first = self.tournament(size, None);
                let second = self.tournament(size, Some(first));
                (first, second)
            }
        }
    }

    fn crossover(&mut self, a: &mut Word, b: &mut Word) {
        if a.len() < 2 || a.len() != b.len() || !self.rng.random_bool(self.config.crossover_prob) {
            return;
        }
        let cut = self.rng.random_range(1..a.len());
        a[cut..].swap_with_slice(&mut b[cut..]);
    }

    fn mutate(&mut self, word: &mut Word, symbol_counts: &[usize]) {
        for letter in word.iter_mut() {
            for (symbol, &n) in letter.iter_mut().zip(symbol_counts) {
                if n > 1 && self.rng.random_bool(self.config.mutation_prob) {
                    let other = self.rng.random_range(0..n - 1);
                    *symbol = if other >= *symbol { other + 1 } else { other };
                }
            }
        }
    }
}

impl EquivalenceOracle for GeneticOracle {
    fn name(&self) -> &'static str {
        "genetic-algorithm"
    }

    fn search(&mut self, ctx: &mut dyn SearchContext) -> FalsifyResult<usize> {
        let verbosity = ctx.verbosity();
        let symbol_counts = ctx.symbol_counts();
        let size = self.config.population_size;

        let mut words = std::mem::take(&mut self.initial);
        words.truncate(size);
        while words.len() < size {
            words.push(self.random_word(&symbol_counts));
        }

        let mut evaluations = 0;
        let mut population = Vec::with_capacity(size + 2);
        for word in words {
            if ctx.should_stop() || evaluations >= self.config.max_test {
                return Ok(evaluations);
            }
            let eval = ctx.evaluate(&word)?;
            evaluations += 1;
            population.push(Individual {
                word,
                trace: eval.trace,
                fitness: eval.fitness,
            });
        }
        sort_population(&mut population);
        log_at!(
            verbosity,
            Level::Debug,
            "initial population of {}, best fitness {:?}",
            population.len(),
            population[0].fitness
        );

        let mut revision = ctx.revision();
        while !ctx.should_stop() && evaluations < self.config.max_test {
            if ctx.revision() != revision {
                for individual in population.iter_mut() {
                    individual.fitness = ctx.fitness(&individual.trace)?;
                }
                sort_population(&mut population);
                revision = ctx.revision();
            }

            let (a, b) = self.select(population.len());
            let mut first = population[a].word.clone();
            let mut second = population[b].word.clone();
            self.crossover(&mut first, &mut second);
            self.mutate(&mut first, &symbol_counts);
            self.mutate(&mut second, &symbol_counts);

            for word in [first, second] {
                let eval = ctx.evaluate(&word)?;
                evaluations += 1;
                population.push(Individual {
                    word,
                    trace: eval.trace,
                    fitness: eval.fitness,
                });
            }
            sort_population(&mut population);
            population.truncate(size);
            self.generations += 1;

            log_at!(
                verbosity,
                Level::Trace,
                "generation {}: best fitness {:?}",
                self.generations,
                population[0].fitness
            );
        }

        log_at!(
            verbosity,
            Level::Debug,
            "genetic search stopped after {} generations and {} evaluations",
            self.generations,
            evaluations
        );
        Ok(evaluations)
    }
}
