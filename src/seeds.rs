//! Built-in content: the vocabulary table behind the `cours` generator and the
//! stand-in exercise served when a step names a template that does not exist.

use uuid::Uuid;

use crate::domain::{Answer, ExerciseMeta, GeneratedExercise, TYPE_INPUT};
use crate::template::ANSWER_ERROR;

/// One flashcard of the maths vocabulary deck.
#[derive(Clone, Copy, Debug)]
pub struct Definition {
  pub term: &'static str,
  pub definition: &'static str,
  pub clue: &'static str,
}

pub const VOCABULARY: &[Definition] = &[
  Definition { term: "Somme", definition: "Résultat d'une addition.", clue: "Résultat de 5 + 3" },
  Definition { term: "Différence", definition: "Résultat d'une soustraction.", clue: "Résultat de 10 - 4" },
  Definition { term: "Produit", definition: "Résultat d'une multiplication.", clue: "Résultat de 6 x 7" },
  Definition { term: "Quotient", definition: "Résultat d'une division.", clue: "Résultat de 20 / 4" },
  Definition {
    term: "Termes",
    definition: "Nombres que l'on additionne ou soustrait.",
    clue: "Dans 5 + 3, 5 et 3 sont des...",
  },
  Definition { term: "Facteurs", definition: "Nombres que l'on multiplie.", clue: "Dans 5 x 3, 5 et 3 sont des..." },
];

/// Placeholder for a template id the catalog does not know.
/// Its answer is the `ERROR` marker, which grading always counts wrong.
pub fn missing_template_exercise(template_id: &str) -> GeneratedExercise {
  GeneratedExercise {
    id: format!("missing_{}", Uuid::new_v4().simple()),
    template_id: Some(template_id.to_string()),
    kind: TYPE_INPUT.to_string(),
    render_type: None,
    multiple: false,
    question: format!("Exercice introuvable : {}", template_id),
    options: Vec::new(),
    answer: Answer::text(ANSWER_ERROR),
    explanation: String::new(),
    unit: String::new(),
    variables: Default::default(),
    tags: Vec::new(),
    meta: ExerciseMeta::default(),
  }
}
