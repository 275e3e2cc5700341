//! Answer comparison.
//!
//! Expected and submitted values are both normalised to lists of trimmed
//! strings. Lists must have the same length; elements are compared in order,
//! except for multiselects where order does not matter. Two elements match on
//! exact text, or numerically (integers, decimals with `.` or `,`, fractions
//! `n/d`) within 1e-4 when both sides contain a digit. Shape mismatches are
//! simply wrong.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::{Answer, GeneratedExercise, TYPE_MULTISELECT};
use crate::template::ANSWER_ERROR;
use crate::util::value_text;

const NUMERIC_TOLERANCE: f64 = 1e-4;

/// Verdict for one exercise, echoed back with the expected answer.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ExerciseResult {
  pub correct: bool,
  pub correct_answer: Answer,
}

/// An exercise whose expected answer is the `ERROR` marker (broken logic,
/// missing template) is never correct, whatever was submitted.
pub fn grade(exercise: &GeneratedExercise, submitted: Option<&Value>) -> ExerciseResult {
  if exercise.answer == Answer::text(ANSWER_ERROR) {
    debug!(target: "progression", exercise_id = %exercise.id, "Ungradable exercise; counted wrong");
    return ExerciseResult { correct: false, correct_answer: exercise.answer.clone() };
  }
  let expected = match &exercise.answer {
    Answer::List(items) => normalize_items(items),
    Answer::Scalar(v) => normalize(v),
  };
  let given = submitted.map(normalize).unwrap_or_default();

  let unordered = exercise.kind == TYPE_MULTISELECT;
  ExerciseResult { correct: lists_match(&expected, &given, unordered), correct_answer: exercise.answer.clone() }
}

pub fn normalize(value: &Value) -> Vec<String> {
  match value {
    Value::Null => Vec::new(),
    Value::Array(items) => normalize_items(items),
    other => {
      let s = value_text(other).trim().to_string();
      if s.is_empty() {
        Vec::new()
      } else {
        vec![s]
      }
    }
  }
}

fn normalize_items(items: &[Value]) -> Vec<String> {
  items
    .iter()
    .filter(|v| !v.is_null())
    .map(|v| value_text(v).trim().to_string())
    .filter(|s| !s.is_empty())
    .collect()
}

fn lists_match(expected: &[String], given: &[String], unordered: bool) -> bool {
  if expected.len() != given.len() {
    return false;
  }
  if !unordered {
    return expected.iter().zip(given).all(|(e, g)| elements_match(e, g));
  }

  let mut used = vec![false; given.len()];
  expected.iter().all(|e| {
    let hit = given.iter().enumerate().position(|(i, g)| !used[i] && elements_match(e, g));
    match hit {
      Some(i) => {
        used[i] = true;
        true
      }
      None => false,
    }
  })
}

pub fn elements_match(a: &str, b: &str) -> bool {
  if a == b {
    return true;
  }
  let has_digit = |s: &str| s.chars().any(|c| c.is_ascii_digit());
  if !(has_digit(a) && has_digit(b)) {
    return false;
  }
  match (parse_number_or_fraction(a), parse_number_or_fraction(b)) {
    (Some(x), Some(y)) => (x - y).abs() < NUMERIC_TOLERANCE,
    _ => false,
  }
}

/// `"3"`, `"0,5"`, `"-1.25"`, `"3/4"`, `" 6 / 8 "`; `None` for anything else.
pub fn parse_number_or_fraction(s: &str) -> Option<f64> {
  let s = s.trim().replace(',', ".");
  let value = match s.split_once('/') {
    Some((num, den)) => {
      let den: f64 = den.trim().parse().ok()?;
      if den == 0.0 {
        return None;
      }
      num.trim().parse::<f64>().ok()? / den
    }
    None => s.parse().ok()?,
  };
  value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn ex(kind: &str, answer: Answer) -> GeneratedExercise {
    let mut e = crate::generators::exercise("t", kind, "q".into(), answer, "test:t".into());
    e.id = "e1".into();
    e
  }

  #[test]
  fn numeric_and_fraction_equivalence() {
    let e = ex("input", Answer::text("0.5"));
    for ok in [json!("1/2"), json!("0,5"), json!(" 0.50 "), json!(0.5), json!("2/4")] {
      assert!(grade(&e, Some(&ok)).correct, "{ok}");
    }
    assert!(!grade(&e, Some(&json!("1/3"))).correct);
  }

  #[test]
  fn text_needs_exact_trimmed_match() {
    let e = ex("qcm", Answer::text("Somme"));
    assert!(grade(&e, Some(&json!("  Somme "))).correct);
    assert!(!grade(&e, Some(&json!("somme"))).correct);
  }

  #[test]
  fn unparseable_values_never_match_numerically() {
    // Both would have parsed to 0.0 with a lenient parser.
    assert!(!elements_match("1a", "0"));
    assert!(!elements_match("x1", "y1"));
    assert!(!elements_match("1/0", "2/0"));
    assert_eq!(parse_number_or_fraction("abc"), None);
  }

  #[test]
  fn missing_answers_are_wrong_unless_nothing_was_expected() {
    let e = ex("input", Answer::text("3"));
    assert!(!grade(&e, None).correct);
    assert!(!grade(&e, Some(&json!(""))).correct);
    assert!(!grade(&e, Some(&json!([]))).correct);

    let empty = ex("multiselect", Answer::List(vec![]));
    assert!(grade(&empty, None).correct);
    assert!(!grade(&empty, Some(&json!(["4"]))).correct);
  }

  #[test]
  fn error_marker_is_never_correct() {
    let e = ex("input", Answer::text(ANSWER_ERROR));
    assert!(!grade(&e, Some(&json!("ERROR"))).correct);
    assert_eq!(grade(&e, Some(&json!("ERROR"))).correct_answer, Answer::text("ERROR"));
  }

  #[test]
  fn ordered_lists_compare_pairwise() {
    let e = ex("ordering", Answer::labels(["1", "2", "3"]));
    assert!(grade(&e, Some(&json!(["1", "2", "3"]))).correct);
    assert!(!grade(&e, Some(&json!(["3", "2", "1"]))).correct);
    assert!(!grade(&e, Some(&json!(["1", "2"]))).correct);
  }

  #[test]
  fn multiselect_ignores_order() {
    let e = ex("multiselect", Answer::labels(["4", "10"]));
    assert!(grade(&e, Some(&json!(["10", "4"]))).correct);
    assert!(grade(&e, Some(&json!([10, 4]))).correct);
    assert!(!grade(&e, Some(&json!(["4", "4"]))).correct);
    assert!(!grade(&e, Some(&json!(["4"]))).correct);
  }

  #[test]
  fn scalar_against_single_item_list() {
    let e = ex("input", Answer::text("7"));
    assert!(grade(&e, Some(&json!(["7"]))).correct);
    let e = ex("input", Answer::Scalar(json!(7)));
    assert!(grade(&e, Some(&json!("7"))).correct);
  }
}
