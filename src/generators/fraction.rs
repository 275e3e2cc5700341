//! Fraction simplification QCMs: the learner picks the irreducible form.

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde_json::Value;

use super::{exercise, ExerciseGenerator, GeneratorConfig};
use crate::domain::{Answer, GeneratedExercise, TYPE_QCM};

const OPTIONS: usize = 4;

pub struct FractionGenerator;

pub(crate) fn gcd(mut a: i64, mut b: i64) -> i64 {
  while b != 0 {
    (a, b) = (b, a % b);
  }
  a.abs()
}

fn latex(num: i64, den: i64) -> String {
  format!("$\\frac{{{}}}{{{}}}$", num, den)
}

impl ExerciseGenerator for FractionGenerator {
  fn generate(&self, _config: &GeneratorConfig<'_>, count: usize, rng: &mut dyn RngCore) -> Vec<GeneratedExercise> {
    (0..count).map(|_| one(rng)).collect()
  }
}

fn one(rng: &mut dyn RngCore) -> GeneratedExercise {
  let (num, den) = loop {
    let den = rng.gen_range(2..=12);
    let num = rng.gen_range(1..den);
    if gcd(num, den) == 1 {
      break (num, den);
    }
  };
  let factor = rng.gen_range(2..=6);
  let (shown_num, shown_den) = (num * factor, den * factor);
  let correct = latex(num, den);

  let mut options = BTreeSet::from([correct.clone()]);
  // Halving once is the classic "stopped too early" mistake.
  if factor > 2 && factor % 2 == 0 {
    options.insert(latex(shown_num / 2, shown_den / 2));
  }
  while options.len() < OPTIONS {
    let d = rng.gen_range(2..=20);
    options.insert(latex(rng.gen_range(1..=d), d));
  }
  let mut options: Vec<String> = options.into_iter().collect();
  options.shuffle(rng);

  let mut ex = exercise(
    "gen_simp",
    TYPE_QCM,
    format!("Simplifiez la fraction {}", latex(shown_num, shown_den)),
    Answer::text(correct),
    "math:fractions:simplification".into(),
  );
  ex.options = options.into_iter().map(Value::String).collect();
  ex
}
