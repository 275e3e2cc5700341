//! Vocabulary flashcards from the built-in definition deck.
//!
//! Config keys: `mode` (definition: find the term; reverse: give the
//! definition; anything else is treated as definition), `interaction`
//! (input | qcm).

use rand::seq::SliceRandom;
use rand::RngCore;
use serde_json::Value;
use tracing::debug;

use super::{exercise, ExerciseGenerator, GeneratorConfig};
use crate::domain::{Answer, GeneratedExercise, TYPE_INPUT, TYPE_QCM};
use crate::seeds::{Definition, VOCABULARY};

const QCM_OPTIONS: usize = 3;

pub struct VocabularyGenerator;

impl ExerciseGenerator for VocabularyGenerator {
  fn generate(&self, config: &GeneratorConfig<'_>, count: usize, rng: &mut dyn RngCore) -> Vec<GeneratedExercise> {
    let reverse = match config.str_or("mode", "definition") {
      "reverse" => true,
      "definition" => false,
      other => {
        debug!(target: "exercise", mode = %other, "Unknown vocabulary mode; using definition");
        false
      }
    };
    let interaction = config.str_or("interaction", TYPE_INPUT);

    let mut out = Vec::new();
    for _ in 0..count {
      let Some(item) = VOCABULARY.choose(rng) else { break };

      let (question, answer) = if reverse {
        (format!("Quelle est la définition de : {} ?", item.term), item.definition)
      } else {
        (format!("Quel est le terme mathématique pour : {} ?", item.definition), item.term)
      };

      let mut ex = exercise("cours", interaction, question, Answer::text(answer), "math:vocabulaire".into());
      ex.explanation = item.clue.to_string();
      if interaction == TYPE_QCM {
        ex.options = options_for(item, reverse, rng).into_iter().map(Value::from).collect();
      }
      out.push(ex);
    }
    out
  }
}

/// The correct card's field plus distinct distractors, shuffled.
fn options_for(item: &Definition, reverse: bool, rng: &mut dyn RngCore) -> Vec<&'static str> {
  let field = |d: &Definition| if reverse { d.definition } else { d.term };
  let mut options = vec![field(item)];
  let mut others: Vec<&Definition> = VOCABULARY.iter().filter(|d| d.term != item.term).collect();
  others.shuffle(rng);
  options.extend(others.into_iter().take(QCM_OPTIONS - 1).map(field));
  options.shuffle(rng);
  options
}
