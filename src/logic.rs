//! Step-level behaviors behind the HTTP handlers.
//!
//! This includes:
//!   - choosing a batch for a step (reinforcement, recipe, or template rules)
//!   - grading a submission and committing it through the store
//!   - ad-hoc recipe batches
//!   - test batches (a step's exercises topped up with fractions) and
//!     subject-wide flash batches
//!   - listing a subject's road with the learner's status
//!   - reloading content

use rand::seq::SliceRandom;
use rand::RngCore;
use serde_json::Map;
use tracing::{debug, info, instrument, warn};

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::domain::{
  ExerciseLog, ExerciseTemplate, GeneratedExercise, Recipe, RoadStep, StepKind, Submission, TemplateRule,
};
use crate::error::EngineError;
use crate::generators::{ExerciseGenerator, FractionGenerator, GeneratorConfig, GeneratorRegistry};
use crate::loader::load_catalog;
use crate::progression::grade_submission;
use crate::protocol::{ReloadOut, StepStatusOut, StepsOut, SubmitOut, ANONYMOUS};
use crate::reinforcement;
use crate::seeds::missing_template_exercise;
use crate::state::AppState;
use crate::template;

fn learner_or_anonymous(learner: Option<&str>) -> &str {
  match learner {
    Some(l) if !l.trim().is_empty() => l,
    _ => ANONYMOUS,
  }
}

/// Cap a batch size at `max_count`.
fn bounded(requested: usize, max_count: usize) -> usize {
  if requested > max_count {
    warn!(target: "exercise", requested, max_count, "Batch size capped");
    max_count
  } else {
    requested
  }
}

/// Batch of exercises for `step_id`. `count` overrides the step's own count.
#[instrument(level = "info", skip(state), fields(%step_id))]
pub async fn exercises_for_step(
  state: &AppState,
  step_id: &str,
  learner: Option<&str>,
  count: Option<usize>,
) -> Result<Vec<GeneratedExercise>, EngineError> {
  let catalog = state.catalog.snapshot().await;
  let step = catalog.get_step(step_id).ok_or_else(|| EngineError::UnknownStep(step_id.to_string()))?;
  let learner = learner_or_anonymous(learner);

  let history = match (step.kind(), &step.scope) {
    (StepKind::Reinforcement, Some(scope)) => state.store.logs_for_scope(learner, scope).await,
    _ => Vec::new(),
  };

  let batch = build_batch(&catalog, &state.generators, &state.config, step, &history, count, &mut rand::thread_rng());
  info!(target: "exercise", %step_id, %learner, served = batch.len(), "Step batch served");
  Ok(batch)
}

/// Pick the batch strategy a step declares: reinforcement scope first, then a
/// generator recipe, then template-selection rules. Read-only steps get none.
/// No batch exceeds `config.batch.max_count`.
pub fn build_batch(
  catalog: &Catalog,
  generators: &GeneratorRegistry,
  config: &EngineConfig,
  step: &RoadStep,
  history: &[ExerciseLog],
  count: Option<usize>,
  rng: &mut dyn RngCore,
) -> Vec<GeneratedExercise> {
  let max = config.batch.max_count;
  if step.kind() == StepKind::Reinforcement {
    let Some(scope) = step.scope.as_deref() else {
      warn!(target: "exercise", step_id = %step.id, "Reinforcement step without scope");
      return Vec::new();
    };
    let n = bounded(count.or(step.count).unwrap_or(config.reinforcement.default_count), max);
    return reinforcement::select(history, scope, n, catalog, &config.reinforcement, rng);
  }

  if let Some(recipe) = &step.recipe {
    let n = bounded(count.or(recipe.count).or(step.count).unwrap_or(config.batch.default_count), max);
    return generators.create_exercises(&recipe.generators, n, rng);
  }

  let default = bounded(count.or(step.count).unwrap_or(config.batch.default_count), max);
  let mut batch = Vec::new();
  for rule in &step.selection {
    batch.extend(from_rule(catalog, rule, default, max, rng));
  }
  batch.truncate(max);
  if step.selection.is_empty() && step.kind().is_assessed() {
    debug!(target: "exercise", step_id = %step.id, "Assessed step declares no exercises");
  }
  batch
}

fn from_rule(
  catalog: &Catalog,
  rule: &TemplateRule,
  default: usize,
  max: usize,
  rng: &mut dyn RngCore,
) -> Vec<GeneratedExercise> {
  if !rule.ids.is_empty() {
    return rule
      .ids
      .iter()
      .take(max)
      .map(|id| match catalog.get_template(id) {
        Some(t) => template::generate(t, rule.difficulty, rng),
        None => {
          warn!(target: "exercise", template_id = %id, "Template not found; serving placeholder");
          missing_template_exercise(id)
        }
      })
      .collect();
  }

  let pool = catalog.select_templates(&rule.tags, rule.difficulty);
  if pool.is_empty() {
    warn!(target: "exercise", tags = ?rule.tags, difficulty = ?rule.difficulty, "No template matches selection rule");
    return Vec::new();
  }
  let n = rule.count.map_or(default, |c| bounded(c, max));
  (0..n)
    .filter_map(|_| pool.choose(rng).map(|t| template::generate(t, rule.difficulty, rng)))
    .collect()
}

fn fraction_fill(n: usize, rng: &mut dyn RngCore) -> Vec<GeneratedExercise> {
  FractionGenerator.generate(&GeneratorConfig::new(&Map::new()), n, rng)
}

/// Test batch for a step: the step's own exercises, topped up with fraction
/// simplifications to `count` (default `batch.test_count`), then shuffled.
pub fn build_test_batch(
  catalog: &Catalog,
  generators: &GeneratorRegistry,
  config: &EngineConfig,
  step: &RoadStep,
  count: Option<usize>,
  rng: &mut dyn RngCore,
) -> Vec<GeneratedExercise> {
  let total = bounded(count.unwrap_or(config.batch.test_count), config.batch.max_count);
  let mut batch = build_batch(catalog, generators, config, step, &[], None, rng);
  batch.truncate(total);
  let own = batch.len();
  batch.extend(fraction_fill(total - own, rng));
  batch.shuffle(rng);
  debug!(target: "exercise", step_id = %step.id, own, total, "Test batch composed");
  batch
}

/// Flash batch across a subject: at most half drawn from distinct templates of
/// the subject, the rest fraction simplifications, shuffled.
pub fn build_flash_batch(
  catalog: &Catalog,
  config: &EngineConfig,
  subject_id: &str,
  count: Option<usize>,
  rng: &mut dyn RngCore,
) -> Vec<GeneratedExercise> {
  let total = bounded(count.unwrap_or(config.batch.flash_count), config.batch.max_count);
  let pool = catalog.templates_for_subject(subject_id);
  let from_content = pool.len().min(total / 2);
  let picked: Vec<&ExerciseTemplate> = pool.choose_multiple(rng, from_content).copied().collect();

  let mut batch: Vec<GeneratedExercise> = picked.into_iter().map(|t| template::generate(t, None, rng)).collect();
  batch.extend(fraction_fill(total - from_content, rng));
  batch.shuffle(rng);
  debug!(target: "exercise", subject = %subject_id, from_content, total, "Flash batch composed");
  batch
}

/// Test batch for `step_id`, for grading through the test submission route.
#[instrument(level = "info", skip(state), fields(%step_id))]
pub async fn test_batch_for_step(
  state: &AppState,
  step_id: &str,
  count: Option<usize>,
) -> Result<Vec<GeneratedExercise>, EngineError> {
  let catalog = state.catalog.snapshot().await;
  let step = catalog.get_step(step_id).ok_or_else(|| EngineError::UnknownStep(step_id.to_string()))?;
  let batch = build_test_batch(&catalog, &state.generators, &state.config, step, count, &mut rand::thread_rng());
  info!(target: "exercise", %step_id, served = batch.len(), "Test batch served");
  Ok(batch)
}

/// Flash batch mixing every template of `subject_id`.
#[instrument(level = "info", skip(state), fields(%subject_id))]
pub async fn flash_batch_for_subject(
  state: &AppState,
  subject_id: &str,
  count: Option<usize>,
) -> Result<Vec<GeneratedExercise>, EngineError> {
  let catalog = state.catalog.snapshot().await;
  if catalog.get_subject(subject_id).is_none() {
    return Err(EngineError::UnknownSubject(subject_id.to_string()));
  }
  let batch = build_flash_batch(&catalog, &state.config, subject_id, count, &mut rand::thread_rng());
  info!(target: "exercise", %subject_id, served = batch.len(), "Flash batch served");
  Ok(batch)
}

/// Grade and commit one submission. `xp_per_correct` differs between step
/// and test submissions.
#[instrument(level = "info", skip(state, submission), fields(step_id = %submission.step_id, exercises = submission.generated_exercises.len()))]
pub async fn submit(state: &AppState, mut submission: Submission, xp_per_correct: u32) -> Result<SubmitOut, EngineError> {
  let catalog = state.catalog.snapshot().await;
  let step = catalog
    .get_step(&submission.step_id)
    .ok_or_else(|| EngineError::UnknownStep(submission.step_id.clone()))?;

  let learner = learner_or_anonymous(Some(submission.learner_id.as_str())).to_string();
  submission.learner_id = learner.clone();

  let cfg = &state.config.progression;
  let outcome = state
    .store
    .apply_submission(&learner, &step.id, &step.subject_id, |prior| {
      grade_submission(step, prior, &submission, xp_per_correct, cfg, chrono::Utc::now())
    })
    .await;
  let totals = state.store.totals(&learner).await;

  info!(
    target: "progression",
    step_id = %step.id,
    %learner,
    correct = outcome.correct,
    total = outcome.total,
    xp_gained = outcome.xp_gained,
    completed = outcome.completed,
    "Submission graded"
  );
  Ok(SubmitOut::new(step.id.clone(), outcome, &totals))
}

/// Ad-hoc weighted batch, outside any step.
#[instrument(level = "info", skip(state, recipe), fields(entries = recipe.generators.len()))]
pub fn generate_from_recipe(state: &AppState, recipe: &Recipe, count: Option<usize>) -> Vec<GeneratedExercise> {
  let n = bounded(count.or(recipe.count).unwrap_or(state.config.batch.default_count), state.config.batch.max_count);
  state.generators.create_exercises(&recipe.generators, n, &mut rand::thread_rng())
}

/// A subject's road with the learner's completion and mastery per step.
#[instrument(level = "info", skip(state), fields(%subject_id))]
pub async fn steps_with_status(state: &AppState, subject_id: &str, learner: Option<&str>) -> Result<StepsOut, EngineError> {
  let catalog = state.catalog.snapshot().await;
  let subject = catalog
    .get_subject(subject_id)
    .cloned()
    .ok_or_else(|| EngineError::UnknownSubject(subject_id.to_string()))?;
  let learner = learner_or_anonymous(learner);

  let progress = state.store.progress_for_learner(learner).await;
  let steps = catalog
    .steps_for_subject(subject_id)
    .into_iter()
    .map(|s| StepStatusOut::new(s, progress.get(&s.id)))
    .collect();
  let totals = state.store.totals(learner).await;
  Ok(StepsOut { subject, steps, totals })
}

/// Rebuild the catalog from the configured content directory and swap it in.
/// On failure the current catalog stays in place.
#[instrument(level = "info", skip(state))]
pub async fn reload_content(state: &AppState) -> Result<ReloadOut, EngineError> {
  let catalog = load_catalog(&state.config.content_dir)?;
  let out = ReloadOut {
    subjects: catalog.subjects().len(),
    steps: catalog.step_count(),
    templates: catalog.template_count(),
  };
  state.catalog.replace(catalog).await;
  Ok(out)
}
