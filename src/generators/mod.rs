//! Procedural exercise generators and the weighted factory composing them.
//!
//! Each generator is independent: it owns its difficulty semantics and its
//! tagging scheme, and only promises exercises carrying an id, a type, a
//! question, an answer, one hierarchical tag and optional meta.
//!
//! The registry is filled once at startup (`GeneratorRegistry::with_builtins`)
//! and looked up by the recipe's `type` key; unknown keys are inert.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::domain::{Answer, ExerciseMeta, GeneratedExercise, RecipeEntry};

pub mod calcul;
pub mod cours;
pub mod divisibilite;
pub mod fraction;
pub mod probleme;

pub use calcul::ArithmeticGenerator;
pub use cours::VocabularyGenerator;
pub use divisibilite::DivisibilityGenerator;
pub use fraction::FractionGenerator;
pub use probleme::WordProblemGenerator;

/// Capability shared by every generator variant.
pub trait ExerciseGenerator: Send + Sync {
  /// Produce up to `count` exercises. Fewer is allowed when the config
  /// points at content the generator does not know.
  fn generate(&self, config: &GeneratorConfig<'_>, count: usize, rng: &mut dyn RngCore) -> Vec<GeneratedExercise>;
}

/// Read-only view over the generator-specific keys of a recipe entry.
#[derive(Clone, Copy, Debug)]
pub struct GeneratorConfig<'a> {
  raw: &'a Map<String, Value>,
}

impl<'a> GeneratorConfig<'a> {
  pub fn new(raw: &'a Map<String, Value>) -> Self {
    Self { raw }
  }

  pub fn str_or(&self, key: &str, default: &'a str) -> &'a str {
    self.raw.get(key).and_then(Value::as_str).unwrap_or(default)
  }

  /// Integer setting; numeric strings are accepted (`focus = "7"`).
  pub fn int(&self, key: &str) -> Option<i64> {
    match self.raw.get(key)? {
      Value::Number(n) => n.as_i64(),
      Value::String(s) => s.trim().parse().ok(),
      _ => None,
    }
  }

  pub fn str_list(&self, key: &str) -> Option<Vec<String>> {
    match self.raw.get(key)? {
      Value::Array(items) => Some(items.iter().filter_map(Value::as_str).map(str::to_string).collect()),
      Value::String(s) => Some(vec![s.clone()]),
      _ => None,
    }
  }
}

/// Skeleton of a generator-produced exercise; callers fill options/meta.
pub(crate) fn exercise(prefix: &str, kind: &str, question: String, answer: Answer, tag: String) -> GeneratedExercise {
  GeneratedExercise {
    id: format!("{}_{}", prefix, Uuid::new_v4().simple()),
    template_id: None,
    kind: kind.to_string(),
    render_type: None,
    multiple: kind == crate::domain::TYPE_MULTISELECT,
    question,
    options: Vec::new(),
    answer,
    explanation: String::new(),
    unit: String::new(),
    variables: Default::default(),
    tags: vec![tag],
    meta: ExerciseMeta::default(),
  }
}

/// Generator lookup by recipe `type`.
#[derive(Default)]
pub struct GeneratorRegistry {
  generators: HashMap<String, Box<dyn ExerciseGenerator>>,
}

impl GeneratorRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registry holding every built-in generator.
  pub fn with_builtins() -> Self {
    let mut reg = Self::new();
    reg.register("calcul", ArithmeticGenerator);
    reg.register("probleme", WordProblemGenerator);
    reg.register("cours", VocabularyGenerator);
    reg.register("divisibilite", DivisibilityGenerator);
    reg.register("fraction", FractionGenerator);
    reg
  }

  pub fn register(&mut self, kind: impl Into<String>, generator: impl ExerciseGenerator + 'static) {
    self.generators.insert(kind.into(), Box::new(generator));
  }

  pub fn get(&self, kind: &str) -> Option<&dyn ExerciseGenerator> {
    self.generators.get(kind).map(|g| g.as_ref())
  }

  pub fn kinds(&self) -> Vec<&str> {
    let mut kinds: Vec<&str> = self.generators.keys().map(String::as_str).collect();
    kinds.sort_unstable();
    kinds
  }

  /// Compose a mixed batch of `total_count` exercises from a weighted recipe.
  ///
  /// Each entry first gets `floor(weight / total_weight * total_count)` items.
  /// The truncation shortfall is filled one item at a time from uniformly
  /// chosen registered entries. The batch is shuffled, then cut to size. It
  /// is shorter than requested only when no entry can produce anything.
  #[instrument(level = "debug", skip(self, recipe, rng), fields(entries = recipe.len()))]
  pub fn create_exercises(
    &self,
    recipe: &[RecipeEntry],
    total_count: usize,
    rng: &mut dyn RngCore,
  ) -> Vec<GeneratedExercise> {
    let total_weight: u64 = recipe.iter().map(|e| u64::from(e.weight)).sum();
    if total_weight == 0 || total_count == 0 {
      return Vec::new();
    }

    let mut exercises = Vec::new();
    for entry in recipe {
      let share = (u128::from(entry.weight) * total_count as u128 / u128::from(total_weight)) as usize;
      match self.get(&entry.kind) {
        Some(generator) => {
          let produced = generator.generate(&GeneratorConfig::new(&entry.config), share, rng);
          debug!(target: "exercise", kind = %entry.kind, share, produced = produced.len(), "Recipe entry generated");
          exercises.extend(produced);
        }
        None => warn!(target: "exercise", kind = %entry.kind, "Generator type not registered; skipping recipe entry"),
      }
    }

    // Any registered entry can top up, zero-weight ones included.
    let mut candidates: Vec<&RecipeEntry> = recipe.iter().filter(|e| self.generators.contains_key(&e.kind)).collect();
    while exercises.len() < total_count && !candidates.is_empty() {
      let idx = rng.gen_range(0..candidates.len());
      let entry = candidates[idx];
      let extra = self
        .get(&entry.kind)
        .map(|g| g.generate(&GeneratorConfig::new(&entry.config), 1, rng))
        .unwrap_or_default();
      if extra.is_empty() {
        // This entry cannot produce anything; stop drawing from it.
        candidates.swap_remove(idx);
        continue;
      }
      exercises.extend(extra);
    }

    if exercises.len() < total_count {
      warn!(target: "exercise", requested = total_count, produced = exercises.len(), "Recipe could not fill the batch");
    }

    exercises.shuffle(rng);
    exercises.truncate(total_count);
    exercises
  }
}
