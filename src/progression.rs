//! Progression state machine for one (learner, step) pair.
//!
//! `not started` -> `in progress` -> `completed`; completion is absorbing.
//! Grading is recomputed from the exercises sent back with the submission,
//! never from client-side verdicts. The function is pure: it returns the
//! updated progress record and the attempt logs for the store to commit.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::ProgressionConfig;
use crate::domain::{ExerciseLog, RoadStep, RoadStepProgress, Submission};
use crate::grading::{self, ExerciseResult};

#[derive(Clone, Debug, Serialize)]
pub struct GradeOutcome {
  pub results: BTreeMap<String, ExerciseResult>,
  pub correct: usize,
  pub total: usize,
  pub xp_gained: u32,
  pub mastery: u8,
  pub completed: bool,
  /// True only for the submission that moved the step to completed.
  pub newly_completed: bool,
  #[serde(skip)]
  pub progress: RoadStepProgress,
  #[serde(skip)]
  pub logs: Vec<ExerciseLog>,
}

/// Grade `submission` against `step` given the learner's previous record.
///
/// XP (`xp_per_correct` per correct answer) is only granted by the submission
/// that completes the step. Mastery moves only on mastery-tracked steps with at
/// least one presented exercise: +1 when everything is right, -1 otherwise,
/// clamped to `0..=max_mastery`. Non-assessed steps (pages, lessons) complete
/// on any submission.
#[instrument(level = "debug", skip_all, fields(step_id = %step.id, learner = %submission.learner_id))]
pub fn grade_submission(
  step: &RoadStep,
  prior: Option<&RoadStepProgress>,
  submission: &Submission,
  xp_per_correct: u32,
  cfg: &ProgressionConfig,
  now: DateTime<Utc>,
) -> GradeOutcome {
  let mut results = BTreeMap::new();
  let mut logs = Vec::new();
  let mut correct = 0usize;

  for exercise in &submission.generated_exercises {
    let result = grading::grade(exercise, submission.answers.get(&exercise.id));
    if result.correct {
      correct += 1;
    }
    if let Some(tag) = exercise.primary_tag() {
      logs.push(ExerciseLog {
        learner_id: submission.learner_id.clone(),
        tag: tag.to_string(),
        question_id: exercise.id.clone(),
        is_correct: result.correct,
        timestamp: now,
        difficulty: exercise.meta.difficulty.clone().unwrap_or_default(),
      });
    }
    results.insert(exercise.id.clone(), result);
  }
  let total = submission.generated_exercises.len();

  let kind = step.kind();
  let was_completed = prior.is_some_and(|p| p.is_completed);
  let prior_mastery = prior.map_or(0, |p| p.mastery).min(cfg.max_mastery);

  let passed = if !kind.is_assessed() {
    true
  } else if total == 0 {
    false
  } else {
    correct as f64 / total as f64 >= cfg.completion_ratio
  };

  let mastery = if kind.tracks_mastery() && total > 0 {
    if correct == total {
      (prior_mastery + 1).min(cfg.max_mastery)
    } else {
      prior_mastery.saturating_sub(1)
    }
  } else {
    prior_mastery
  };

  let completed = was_completed || passed;
  let newly_completed = completed && !was_completed;
  let xp_gained = if newly_completed { correct as u32 * xp_per_correct } else { 0 };

  if newly_completed {
    info!(target: "progression", step_id = %step.id, learner = %submission.learner_id, correct, total, xp_gained, "Step completed");
  } else {
    debug!(target: "progression", step_id = %step.id, correct, total, mastery, completed, "Submission graded");
  }

  let progress = RoadStepProgress {
    learner_id: submission.learner_id.clone(),
    step_id: step.id.clone(),
    is_completed: completed,
    mastery,
    answers: submission.answers.clone(),
    updated_at: now,
  };

  GradeOutcome { results, correct, total, xp_gained, mastery, completed, newly_completed, progress, logs }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Answer, GeneratedExercise};
  use proptest::prelude::*;
  use serde_json::json;

  fn step(kind: &str) -> RoadStep {
    toml::from_str(&format!("id = \"s1\"\ntitle = \"S\"\ntype = \"{kind}\"")).unwrap()
  }

  fn exercise(i: usize) -> GeneratedExercise {
    let mut e = crate::generators::exercise("t", "input", "q".into(), Answer::text("1"), "math:test".into());
    e.id = format!("e{i}");
    e
  }

  /// `correct` right answers out of `total` presented exercises.
  fn submission(correct: usize, total: usize) -> Submission {
    Submission {
      learner_id: "ana".into(),
      step_id: "s1".into(),
      answers: (0..total).map(|i| (format!("e{i}"), json!(if i < correct { "1" } else { "0" }))).collect(),
      generated_exercises: (0..total).map(exercise).collect(),
    }
  }

  fn run(kind: &str, prior: Option<&RoadStepProgress>, correct: usize, total: usize) -> GradeOutcome {
    grade_submission(&step(kind), prior, &submission(correct, total), 10, &ProgressionConfig::default(), Utc::now())
  }

  #[test]
  fn half_correct_completes_practice_and_grants_xp() {
    let out = run("practice", None, 2, 4);
    assert!(out.completed && out.newly_completed);
    assert_eq!(out.xp_gained, 20);
    assert_eq!(out.mastery, 0);
    assert_eq!(out.logs.len(), 4);
    assert_eq!(out.results.len(), 4);
    assert!(out.results["e0"].correct);
    assert!(!out.results["e3"].correct);
  }

  #[test]
  fn below_half_stays_in_progress_but_keeps_answers() {
    let out = run("practice", None, 1, 4);
    assert!(!out.completed);
    assert_eq!(out.xp_gained, 0);
    assert_eq!(out.progress.answers.len(), 4);
  }

  #[test]
  fn resubmitting_a_completed_step_earns_nothing_and_never_uncompletes() {
    let first = run("practice", None, 4, 4);
    let again = run("practice", Some(&first.progress), 4, 4);
    assert!(again.completed);
    assert!(!again.newly_completed);
    assert_eq!(again.xp_gained, 0);

    let worse = run("practice", Some(&again.progress), 0, 4);
    assert!(worse.completed);
    assert_eq!(worse.progress.answers["e0"], json!("0"));
  }

  #[test]
  fn mastery_streak_and_drop() {
    let a = run("flash_review", None, 3, 3);
    assert_eq!(a.mastery, 1);
    let b = run("flash_review", Some(&a.progress), 3, 3);
    let c = run("flash_review", Some(&b.progress), 3, 3);
    let d = run("flash_review", Some(&c.progress), 3, 3);
    assert_eq!(d.mastery, 3);
    let e = run("flash_review", Some(&d.progress), 2, 3);
    assert_eq!(e.mastery, 2);
    assert!(e.completed);
  }

  #[test]
  fn validation_tracks_mastery_practice_does_not() {
    assert_eq!(run("validation", None, 2, 2).mastery, 1);
    assert_eq!(run("practice", None, 2, 2).mastery, 0);
  }

  #[test]
  fn empty_submission_on_assessed_step_changes_nothing() {
    let mut prior = run("validation", None, 2, 2).progress;
    prior.is_completed = false;
    let out = run("validation", Some(&prior), 0, 0);
    assert_eq!(out.mastery, 1);
    assert!(!out.completed);
    assert_eq!(out.xp_gained, 0);
  }

  #[test]
  fn lessons_complete_when_marked_read() {
    let out = run("cours", None, 0, 0);
    assert!(out.completed && out.newly_completed);
    assert_eq!(out.xp_gained, 0);
    assert_eq!(out.mastery, 0);
  }

  #[test]
  fn untagged_exercises_are_graded_but_not_logged() {
    let mut sub = submission(1, 2);
    sub.generated_exercises[1].tags.clear();
    let out = grade_submission(&step("practice"), None, &sub, 15, &ProgressionConfig::default(), Utc::now());
    assert_eq!(out.results.len(), 2);
    assert_eq!(out.logs.len(), 1);
    assert_eq!(out.xp_gained, 15);
  }

  proptest! {
    #[test]
    fn mastery_bounded_and_completion_monotonic(
      rounds in proptest::collection::vec((0usize..6, 0usize..6), 1..25),
      kind in prop_oneof![Just("flash"), Just("validation"), Just("practice")],
    ) {
      let mut prior: Option<RoadStepProgress> = None;
      for (a, b) in rounds {
        let total = a.max(b);
        let correct = a.min(b);
        let before = prior.as_ref().map_or(0, |p| p.mastery);
        let was_completed = prior.as_ref().is_some_and(|p| p.is_completed);

        let out = run(kind, prior.as_ref(), correct, total);

        prop_assert!(out.mastery <= 3);
        if was_completed {
          prop_assert!(out.completed);
          prop_assert_eq!(out.xp_gained, 0);
        }
        if total > 0 && correct == total {
          prop_assert!(out.mastery >= before);
        }
        if correct < total {
          prop_assert!(out.mastery <= before);
        }
        prior = Some(out.progress);
      }
    }
  }
}
