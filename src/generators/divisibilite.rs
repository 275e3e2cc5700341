//! "Which of these numbers are divisible by d?" multiselects.
//!
//! Config keys: `difficulty` (easy | medium | hard) sets the candidate range,
//! `divisor` (default 2).

use rand::{Rng, RngCore};
use serde_json::Value;

use super::{exercise, ExerciseGenerator, GeneratorConfig};
use crate::domain::{Answer, GeneratedExercise, TYPE_MULTISELECT};

const CANDIDATES: usize = 6;

pub struct DivisibilityGenerator;

fn upper_bound(difficulty: &str) -> i64 {
  match difficulty {
    "easy" => 100,
    "medium" => 1000,
    _ => 10_000,
  }
}

impl ExerciseGenerator for DivisibilityGenerator {
  fn generate(&self, config: &GeneratorConfig<'_>, count: usize, rng: &mut dyn RngCore) -> Vec<GeneratedExercise> {
    let difficulty = config.str_or("difficulty", "medium");
    let divisor = config.int("divisor").filter(|d| *d > 0).unwrap_or(2);
    let max = upper_bound(difficulty);

    (0..count)
      .map(|_| {
        let mut numbers: Vec<i64> = Vec::with_capacity(CANDIDATES);
        while numbers.len() < CANDIDATES {
          let n = rng.gen_range(2..=max);
          if !numbers.contains(&n) {
            numbers.push(n);
          }
        }

        let divisible = numbers.iter().filter(|n| *n % divisor == 0).map(|n| n.to_string());
        let mut ex = exercise(
          "gen_div",
          TYPE_MULTISELECT,
          format!("Quels sont les nombres divisibles par {} ?", divisor),
          Answer::labels(divisible),
          format!("math:arithmetique:divisibilite:{}", divisor),
        );
        ex.options = numbers.iter().map(|n| Value::String(n.to_string())).collect();
        ex.meta.difficulty = Some(difficulty.to_string());
        ex
      })
      .collect()
  }
}
