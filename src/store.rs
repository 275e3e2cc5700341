//! In-memory persistence for learner progress, attempt logs and XP totals.
//!
//! All records sit behind one async mutex. A submission's read-modify-write
//! (read prior progress, grade, write progress + logs + XP) runs entirely under
//! that lock, so two submissions for the same learner and step are applied one
//! after the other.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::domain::{ExerciseLog, RoadStepProgress};
use crate::progression::GradeOutcome;

/// XP earned by one learner, overall and per subject.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct LearnerTotals {
  pub total_xp: u64,
  pub subject_scores: BTreeMap<String, u64>,
}

#[derive(Default)]
struct Records {
  /// Keyed by (learner, step).
  progress: HashMap<(String, String), RoadStepProgress>,
  logs: Vec<ExerciseLog>,
  learners: HashMap<String, LearnerTotals>,
}

#[derive(Clone, Default)]
pub struct ProgressStore {
  inner: Arc<Mutex<Records>>,
}

impl ProgressStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn progress(&self, learner_id: &str, step_id: &str) -> Option<RoadStepProgress> {
    let records = self.inner.lock().await;
    records.progress.get(&(learner_id.to_string(), step_id.to_string())).cloned()
  }

  /// Every progress record of one learner, keyed by step id.
  pub async fn progress_for_learner(&self, learner_id: &str) -> HashMap<String, RoadStepProgress> {
    let records = self.inner.lock().await;
    records
      .progress
      .iter()
      .filter(|((learner, _), _)| learner == learner_id)
      .map(|((_, step), p)| (step.clone(), p.clone()))
      .collect()
  }

  /// Attempt history of one learner for tags under `scope_prefix`, oldest first.
  pub async fn logs_for_scope(&self, learner_id: &str, scope_prefix: &str) -> Vec<ExerciseLog> {
    let records = self.inner.lock().await;
    records
      .logs
      .iter()
      .filter(|l| l.learner_id == learner_id && l.tag.starts_with(scope_prefix))
      .cloned()
      .collect()
  }

  pub async fn totals(&self, learner_id: &str) -> LearnerTotals {
    let records = self.inner.lock().await;
    records.learners.get(learner_id).cloned().unwrap_or_default()
  }

  /// Serialized read-modify-write of one submission.
  ///
  /// `grade` receives the prior progress record (if any) and returns the
  /// outcome; its progress, logs and XP are committed before the lock drops.
  #[instrument(level = "debug", skip(self, grade))]
  pub async fn apply_submission<F>(&self, learner_id: &str, step_id: &str, subject_id: &str, grade: F) -> GradeOutcome
  where
    F: FnOnce(Option<&RoadStepProgress>) -> GradeOutcome,
  {
    let mut records = self.inner.lock().await;
    let key = (learner_id.to_string(), step_id.to_string());

    let outcome = grade(records.progress.get(&key));
    records.progress.insert(key, outcome.progress.clone());
    records.logs.extend(outcome.logs.iter().cloned());

    if outcome.xp_gained > 0 {
      let totals = records.learners.entry(learner_id.to_string()).or_default();
      totals.total_xp += u64::from(outcome.xp_gained);
      *totals.subject_scores.entry(subject_id.to_string()).or_default() += u64::from(outcome.xp_gained);
    }
    debug!(target: "progression", learner = %learner_id, step_id = %step_id, logs = outcome.logs.len(), xp = outcome.xp_gained, "Submission committed");
    outcome
  }
}
