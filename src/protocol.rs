//! Public request/response structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{GeneratedExercise, RoadStep, RoadStepProgress, Subject};
use crate::grading::ExerciseResult;
use crate::progression::GradeOutcome;
use crate::store::LearnerTotals;

/// Learner used when a request does not name one.
pub const ANONYMOUS: &str = "anonymous";

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct SubjectsOut {
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LearnerQuery {
    pub learner: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExercisesQuery {
    pub learner: Option<String>,
    pub count: Option<usize>,
}

/// One road step as shown to a learner.
#[derive(Debug, Serialize)]
pub struct StepStatusOut {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    #[serde(rename = "type")]
    pub step_type: String,
    pub order: u32,
    pub activated: bool,
    pub completed: bool,
    pub mastery: u8,
}

impl StepStatusOut {
    pub fn new(step: &RoadStep, progress: Option<&RoadStepProgress>) -> Self {
        Self {
            id: step.id.clone(),
            title: step.title.clone(),
            subtitle: step.subtitle.clone(),
            step_type: step.step_type.clone(),
            order: step.order,
            activated: step.activated,
            completed: progress.is_some_and(|p| p.is_completed),
            mastery: progress.map_or(0, |p| p.mastery),
        }
    }
}

#[derive(Serialize)]
pub struct StepsOut {
    pub subject: Subject,
    pub steps: Vec<StepStatusOut>,
    pub totals: LearnerTotals,
}

#[derive(Serialize)]
pub struct ExercisesOut {
    pub step_id: Option<String>,
    pub exercises: Vec<GeneratedExercise>,
}

#[derive(Serialize)]
pub struct SubmitOut {
    pub step_id: String,
    pub results: BTreeMap<String, ExerciseResult>,
    pub correct: usize,
    pub total: usize,
    pub xp_gained: u32,
    pub mastery: u8,
    pub completed: bool,
    pub newly_completed: bool,
    pub total_xp: u64,
}

impl SubmitOut {
    pub fn new(step_id: String, outcome: GradeOutcome, totals: &LearnerTotals) -> Self {
        Self {
            step_id,
            results: outcome.results,
            correct: outcome.correct,
            total: outcome.total,
            xp_gained: outcome.xp_gained,
            mastery: outcome.mastery,
            completed: outcome.completed,
            newly_completed: outcome.newly_completed,
            total_xp: totals.total_xp,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ReloadOut {
    pub subjects: usize,
    pub steps: usize,
    pub templates: usize,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}
