use super::traits::ConfigSection;
use crate::error::TunebreederError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Notes per genome.
    pub genome_length: usize,
    /// Genomes per generation, both at genesis and as offspring count.
    pub population_size: usize,
    /// Top-ranked genomes eligible as crossover parents.
    pub crossover_pool_size: usize,
    /// Positions perturbed by a standalone mutation pass.
    pub genes_to_mutate: usize,
    /// Probability that a fresh crossover child gets an extra conservative
    /// mutation pass.
    pub post_crossover_mutation_rate: f64,
    /// Fraction of the child's notes that pass touches.
    pub post_crossover_mutation_fraction: f64,
    /// Fixed RNG seed for reproducible runs; entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            genome_length: 64,
            population_size: 10,
            crossover_pool_size: 5,
            genes_to_mutate: 4,
            post_crossover_mutation_rate: 0.1,
            post_crossover_mutation_fraction: 0.05,
            seed: None,
        }
    }
}

impl ConfigSection for EvolutionConfig {
    fn section_name() -> &'static str {
        "evolution"
    }

    fn validate(&self) -> Result<(), TunebreederError> {
        if self.genome_length < 2 {
            return Err(TunebreederError::Configuration(
                "Genome length must be at least 2".to_string(),
            ));
        }
        if self.population_size < 1 {
            return Err(TunebreederError::Configuration(
                "Population size must be at least 1".to_string(),
            ));
        }
        if self.crossover_pool_size < 2 {
            return Err(TunebreederError::Configuration(
                "Crossover pool size must be at least 2".to_string(),
            ));
        }
        if self.genes_to_mutate > self.genome_length {
            return Err(TunebreederError::Configuration(
                "Cannot mutate more genes than the genome holds".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.post_crossover_mutation_rate) {
            return Err(TunebreederError::Configuration(
                "Post-crossover mutation rate must be between 0 and 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.post_crossover_mutation_fraction) {
            return Err(TunebreederError::Configuration(
                "Post-crossover mutation fraction must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}
