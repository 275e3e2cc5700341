//! Mental arithmetic: one operation per exercise, operands drawn from a
//! difficulty band.
//!
//! Config keys: `subtype` (addition | soustraction | multiplication | division),
//! `difficulty` (simple | medium | hard, anything else is a wide mixed band),
//! `focus` (multiplication table to drill, 1 to 100; other values are ignored).

use std::ops::RangeInclusive;

use rand::{Rng, RngCore};
use tracing::warn;

use super::{exercise, ExerciseGenerator, GeneratorConfig};
use crate::domain::{Answer, GeneratedExercise, TYPE_INPUT};

const FOCUS_TABLES: RangeInclusive<i64> = 1..=100;

pub struct ArithmeticGenerator;

impl ExerciseGenerator for ArithmeticGenerator {
  fn generate(&self, config: &GeneratorConfig<'_>, count: usize, rng: &mut dyn RngCore) -> Vec<GeneratedExercise> {
    let subtype = config.str_or("subtype", "addition");
    let difficulty = config.str_or("difficulty", "medium");
    let focus = config.int("focus");
    if let Some(table) = focus.filter(|t| !FOCUS_TABLES.contains(t)) {
      warn!(target: "exercise", focus = table, "Multiplication focus out of range; drawing random tables");
    }
    let focus = focus.filter(|t| FOCUS_TABLES.contains(t));
    (0..count).map(|_| one(subtype, difficulty, focus, rng)).collect()
  }
}

fn bands(difficulty: &str) -> ((i64, i64), (i64, i64)) {
  match difficulty {
    "simple" => ((1, 10), (1, 10)),
    "medium" => ((10, 50), (1, 30)),
    "hard" => ((50, 200), (10, 100)),
    _ => ((1, 50), (1, 50)),
  }
}

fn one(subtype: &str, difficulty: &str, focus: Option<i64>, rng: &mut dyn RngCore) -> GeneratedExercise {
  let ((a_lo, a_hi), (b_lo, b_hi)) = bands(difficulty);
  let simple = difficulty == "simple";

  let (mut a, mut b) = match (subtype, focus) {
    ("multiplication", Some(table)) => (table, rng.gen_range(1..=10)),
    _ => (rng.gen_range(a_lo..=a_hi), rng.gen_range(b_lo..=b_hi)),
  };

  let (question, answer) = match subtype {
    "addition" => (format!("Combien font ${} + {}$ ?", a, b), a + b),
    "soustraction" => {
      // Young learners never see negative results.
      if simple && a < b {
        std::mem::swap(&mut a, &mut b);
      }
      (format!("Combien font ${} - {}$ ?", a, b), a - b)
    }
    "multiplication" => {
      if simple && focus.is_none() {
        a = rng.gen_range(1..=5);
        b = rng.gen_range(1..=10);
      }
      (format!("Combien font ${} \\times {}$ ?", a, b), a * b)
    }
    "division" => {
      // Built from the quotient so the result is always exact.
      let divisor = rng.gen_range(2..=10);
      let max_quotient = if simple { 10 } else { 20 };
      let quotient = rng.gen_range(1..=max_quotient);
      (format!("Combien font ${} \\div {}$ ?", divisor * quotient, divisor), quotient)
    }
    _ => ("Combien font $1 + 1$ ?".to_string(), 2),
  };

  exercise(
    &format!("cal_{}", subtype),
    TYPE_INPUT,
    question,
    Answer::text(answer.to_string()),
    format!("math:calcul:{}", subtype),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::{json, Map, Value};

  fn config(v: Value) -> Map<String, Value> {
    match v {
      Value::Object(m) => m,
      _ => Map::new(),
    }
  }

  fn parse_operands(question: &str, symbol: &str) -> (i64, i64) {
    let inner = question.trim_start_matches("Combien font $").trim_end_matches("$ ?");
    let mut parts = inner.split(symbol).map(|p| p.trim().parse::<i64>().unwrap());
    (parts.next().unwrap(), parts.next().unwrap())
  }

  #[test]
  fn simple_subtraction_is_never_negative() {
    let raw = config(json!({"subtype": "soustraction", "difficulty": "simple"}));
    let batch = ArithmeticGenerator.generate(&GeneratorConfig::new(&raw), 50, &mut rand::thread_rng());
    assert_eq!(batch.len(), 50);
    for ex in batch {
      let (a, b) = parse_operands(&ex.question, "-");
      assert!(a >= b);
      assert_eq!(ex.answer, Answer::text((a - b).to_string()));
      assert_eq!(ex.tags, vec!["math:calcul:soustraction".to_string()]);
    }
  }

  #[test]
  fn division_is_exact() {
    let raw = config(json!({"subtype": "division", "difficulty": "hard"}));
    for ex in ArithmeticGenerator.generate(&GeneratorConfig::new(&raw), 30, &mut rand::thread_rng()) {
      let (dividend, divisor) = parse_operands(&ex.question, "\\div");
      assert_eq!(dividend % divisor, 0);
      assert_eq!(ex.answer, Answer::text((dividend / divisor).to_string()));
    }
  }

  #[test]
  fn focus_drills_one_table() {
    let raw = config(json!({"subtype": "multiplication", "focus": 7}));
    for ex in ArithmeticGenerator.generate(&GeneratorConfig::new(&raw), 20, &mut rand::thread_rng()) {
      let (a, b) = parse_operands(&ex.question, "\\times");
      assert_eq!(a, 7);
      assert!((1..=10).contains(&b));
    }
  }

  #[test]
  fn out_of_range_focus_is_ignored() {
    for focus in [json!(i64::MAX), json!(0), json!(-3), json!(101)] {
      let raw = config(json!({"subtype": "multiplication", "difficulty": "simple", "focus": focus}));
      for ex in ArithmeticGenerator.generate(&GeneratorConfig::new(&raw), 10, &mut rand::thread_rng()) {
        let (a, b) = parse_operands(&ex.question, "\\times");
        assert!((1..=5).contains(&a));
        assert_eq!(ex.answer, Answer::text((a * b).to_string()));
      }
    }
  }

  #[test]
  fn unknown_subtype_falls_back() {
    let raw = config(json!({"subtype": "racine"}));
    let ex = &ArithmeticGenerator.generate(&GeneratorConfig::new(&raw), 1, &mut rand::thread_rng())[0];
    assert_eq!(ex.answer, Answer::text("2"));
    assert_eq!(ex.kind, "input");
  }
}
