//! Domain models used by the engine: exercise templates and their generated
//! instances, curriculum steps, and the per-learner records owned by the store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Exercise type emitted when the template does not say otherwise.
pub const TYPE_INPUT: &str = "input";
pub const TYPE_QCM: &str = "qcm";
pub const TYPE_MULTISELECT: &str = "multiselect";

/// How one template variable gets its concrete value.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum VarSpec {
  /// Uniform pick among the listed values.
  Choice(Vec<Value>),
  /// Uniform inclusive integer in `[min, max]`.
  Range {
    #[serde(default)]
    min: i64,
    #[serde(default = "default_range_max")]
    max: i64,
  },
  /// Passed through unchanged.
  Fixed(Value),
}

fn default_range_max() -> i64 { 10 }

/// Declarative recipe for one family of exercises. Loaded once, never mutated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExerciseTemplate {
  pub id: String,
  /// Hierarchical capability labels (`math:calcul:addition`), matched as a set.
  #[serde(default)] pub tags: Vec<String>,
  #[serde(default = "default_difficulty")] pub difficulty: u8,
  #[serde(default)] pub vars: BTreeMap<String, VarSpec>,
  /// Named text fields (question, options, explanation, unit, answer, ...).
  #[serde(default)] pub content: BTreeMap<String, Value>,
  /// Expression computing the answer from the resolved variables.
  #[serde(default)] pub logic: Option<String>,
  #[serde(default)] pub render_type: Option<String>,
  #[serde(default)] pub interaction: Option<String>,
  #[serde(default)] pub multiple: bool,
  /// Owning subject, set by the loader from the content folder.
  #[serde(default)] pub subject_id: String,
}

fn default_difficulty() -> u8 { 1 }

impl ExerciseTemplate {
  /// Subset match: every target tag must be present on the template.
  pub fn has_tags(&self, targets: &[String]) -> bool {
    targets.iter().all(|t| self.tags.iter().any(|own| own == t))
  }
}

/// Expected answer of a generated exercise. Lists stay lists so that ordered
/// and unordered list comparison remain possible downstream.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Answer {
  List(Vec<Value>),
  Scalar(Value),
}

impl Answer {
  pub fn text(s: impl Into<String>) -> Self {
    Answer::Scalar(Value::String(s.into()))
  }

  pub fn labels<I, S>(items: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Answer::List(items.into_iter().map(|s| Value::String(s.into())).collect())
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlueprintStyle {
  Eaten,
  Missing,
}

/// Rendering-agnostic description of the picture accompanying a word problem.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisualBlueprint {
  Pizza {
    total: u32,
    highlighted: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    style: Option<BlueprintStyle>,
  },
  Grid {
    rows: u32,
    cols: u32,
    highlighted: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    style: Option<BlueprintStyle>,
  },
  Beaker {
    capacity: u32,
    level_start: u32,
    level_end: u32,
  },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ExerciseMeta {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub difficulty: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub visual_blueprint: Option<VisualBlueprint>,
}

/// One concrete, presentable exercise. Ephemeral: produced for a response and
/// sent back verbatim with the learner's answers for re-grading.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneratedExercise {
  pub id: String,
  #[serde(default)] pub template_id: Option<String>,
  #[serde(rename = "type")] pub kind: String,
  #[serde(default)] pub render_type: Option<String>,
  #[serde(default)] pub multiple: bool,
  pub question: String,
  #[serde(default)] pub options: Vec<Value>,
  pub answer: Answer,
  #[serde(default)] pub explanation: String,
  #[serde(default)] pub unit: String,
  #[serde(default)] pub variables: BTreeMap<String, Value>,
  #[serde(default)] pub tags: Vec<String>,
  #[serde(default)] pub meta: ExerciseMeta,
}

impl GeneratedExercise {
  /// Most specific label, used when logging attempts.
  pub fn primary_tag(&self) -> Option<&str> {
    self.tags.first().map(String::as_str)
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subject {
  pub id: String,
  pub name: String,
}

/// Behavioural family of a curriculum step, derived from its authored type name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepKind {
  Cours,
  Practice,
  Exam,
  Sequence,
  Validation,
  Flash,
  Reinforcement,
  Dialogue,
  Page,
}

impl StepKind {
  pub fn from_name(name: &str) -> Self {
    match name {
      n if n.starts_with("flash") => StepKind::Flash,
      n if n.starts_with("practice") => StepKind::Practice,
      "validation" => StepKind::Validation,
      "cours" | "theory" => StepKind::Cours,
      "exam" | "test" => StepKind::Exam,
      "sequence" => StepKind::Sequence,
      "reinforcement" => StepKind::Reinforcement,
      "dialogue" => StepKind::Dialogue,
      "page" => StepKind::Page,
      _ => StepKind::Practice,
    }
  }

  /// Step types whose submissions move the 0..=max mastery counter.
  pub fn tracks_mastery(self) -> bool {
    matches!(self, StepKind::Flash | StepKind::Validation)
  }

  /// Step types graded from exercises (as opposed to read-only pages).
  pub fn is_assessed(self) -> bool {
    !matches!(self, StepKind::Cours | StepKind::Dialogue | StepKind::Page | StepKind::Sequence)
  }
}

/// Template-selection rule: by tag set (optionally one difficulty), or by ids.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TemplateRule {
  #[serde(default)] pub tags: Vec<String>,
  #[serde(default)] pub difficulty: Option<u8>,
  #[serde(default)] pub ids: Vec<String>,
  #[serde(default)] pub count: Option<usize>,
}

/// One weighted generator configuration inside a recipe.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecipeEntry {
  #[serde(rename = "type")] pub kind: String,
  #[serde(default = "default_weight")] pub weight: u32,
  /// Generator-specific keys (subtype, difficulty, focus, categories, ...).
  #[serde(flatten)] pub config: serde_json::Map<String, Value>,
}

fn default_weight() -> u32 { 1 }

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
  #[serde(default)] pub count: Option<usize>,
  #[serde(default)] pub generators: Vec<RecipeEntry>,
}

/// Curriculum node. Shared by all learners; `order` is unique within a subject.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoadStep {
  pub id: String,
  pub title: String,
  #[serde(default)] pub subtitle: Option<String>,
  #[serde(rename = "type", default = "default_step_type")] pub step_type: String,
  #[serde(default)] pub order: u32,
  #[serde(default)] pub subject_id: String,
  #[serde(default)] pub activated: bool,
  #[serde(default)] pub selection: Vec<TemplateRule>,
  #[serde(default)] pub recipe: Option<Recipe>,
  #[serde(default)] pub content_file: Option<String>,
  /// Tag prefix a reinforcement step draws from.
  #[serde(default)] pub scope: Option<String>,
  #[serde(default)] pub strategy: Option<String>,
  #[serde(default)] pub count: Option<usize>,
  #[serde(default)] pub pages: Vec<String>,
}

fn default_step_type() -> String { "theory".into() }

impl RoadStep {
  pub fn kind(&self) -> StepKind {
    StepKind::from_name(&self.step_type)
  }
}

/// Persisted per learner x step.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RoadStepProgress {
  pub learner_id: String,
  pub step_id: String,
  /// Monotonic: once true, never reset.
  pub is_completed: bool,
  pub mastery: u8,
  /// Last submitted answer map, kept for review.
  pub answers: BTreeMap<String, Value>,
  pub updated_at: DateTime<Utc>,
}

/// Append-only record of one graded attempt; the reinforcement selector's input.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseLog {
  pub learner_id: String,
  pub tag: String,
  pub question_id: String,
  pub is_correct: bool,
  pub timestamp: DateTime<Utc>,
  pub difficulty: String,
}

/// What the learner sends back: every presented exercise plus the answers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Submission {
  #[serde(default)] pub learner_id: String,
  pub step_id: String,
  #[serde(default)] pub answers: BTreeMap<String, Value>,
  #[serde(default)] pub generated_exercises: Vec<GeneratedExercise>,
}
