//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, info, instrument, warn};

use crate::domain::{Recipe, Submission};
use crate::error::EngineError;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::UnknownStep(_) | EngineError::UnknownSubject(_) => StatusCode::NOT_FOUND,
            EngineError::Content(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(target: "cours_engine", error = %self, "Request failed");
        } else {
            warn!(target: "cours_engine", error = %self, "Request rejected");
        }
        (status, Json(ErrorOut { error: self.to_string() })).into_response()
    }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
    Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_subjects(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let catalog = state.catalog.snapshot().await;
    let subjects = catalog.subjects().into_iter().cloned().collect();
    Json(SubjectsOut { subjects })
}

#[instrument(level = "info", skip(state), fields(%subject_id))]
pub async fn http_get_steps(
    State(state): State<Arc<AppState>>,
    Path(subject_id): Path<String>,
    Query(q): Query<LearnerQuery>,
) -> Result<Json<StepsOut>, EngineError> {
    let out = steps_with_status(&state, &subject_id, q.learner.as_deref()).await?;
    info!(target: "cours_engine", %subject_id, steps = out.steps.len(), "HTTP road served");
    Ok(Json(out))
}

#[instrument(level = "info", skip(state), fields(%step_id))]
pub async fn http_get_exercises(
    State(state): State<Arc<AppState>>,
    Path(step_id): Path<String>,
    Query(q): Query<ExercisesQuery>,
) -> Result<Json<ExercisesOut>, EngineError> {
    let exercises = exercises_for_step(&state, &step_id, q.learner.as_deref(), q.count).await?;
    Ok(Json(ExercisesOut { step_id: Some(step_id), exercises }))
}

#[instrument(level = "info", skip(state), fields(%step_id))]
pub async fn http_get_test(
    State(state): State<Arc<AppState>>,
    Path(step_id): Path<String>,
    Query(q): Query<ExercisesQuery>,
) -> Result<Json<ExercisesOut>, EngineError> {
    let exercises = test_batch_for_step(&state, &step_id, q.count).await?;
    Ok(Json(ExercisesOut { step_id: Some(step_id), exercises }))
}

#[instrument(level = "info", skip(state), fields(%subject_id))]
pub async fn http_get_flash(
    State(state): State<Arc<AppState>>,
    Path(subject_id): Path<String>,
    Query(q): Query<ExercisesQuery>,
) -> Result<Json<ExercisesOut>, EngineError> {
    let exercises = flash_batch_for_subject(&state, &subject_id, q.count).await?;
    Ok(Json(ExercisesOut { step_id: None, exercises }))
}

#[instrument(level = "info", skip(state, body), fields(step_id = %body.step_id, answers = body.answers.len()))]
pub async fn http_post_step_submit(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Submission>,
) -> Result<Json<SubmitOut>, EngineError> {
    let xp = state.config.progression.xp_per_correct;
    Ok(Json(submit(&state, body, xp).await?))
}

#[instrument(level = "info", skip(state, body), fields(step_id = %body.step_id, answers = body.answers.len()))]
pub async fn http_post_test_submit(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Submission>,
) -> Result<Json<SubmitOut>, EngineError> {
    let xp = state.config.progression.test_xp_per_correct;
    Ok(Json(submit(&state, body, xp).await?))
}

#[instrument(level = "info", skip(state, body), fields(entries = body.generators.len()))]
pub async fn http_post_recipe(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Recipe>,
) -> impl IntoResponse {
    let exercises = generate_from_recipe(&state, &body, None);
    info!(target: "exercise", served = exercises.len(), "HTTP recipe batch served");
    Json(ExercisesOut { step_id: None, exercises })
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_reload(State(state): State<Arc<AppState>>) -> Result<Json<ReloadOut>, EngineError> {
    Ok(Json(reload_content(&state).await?))
}
