#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;
use cours_engine::config::EngineConfig;
use cours_engine::domain::{GeneratedExercise, Submission};
use cours_engine::loader::load_catalog;
use cours_engine::routes::build_router;
use cours_engine::state::AppState;
use serde_json::Value;

pub fn content_dir() -> String {
    format!("{}/content", env!("CARGO_MANIFEST_DIR"))
}

pub fn create_test_state() -> AppState {
    let config = EngineConfig { content_dir: content_dir(), ..EngineConfig::default() };
    let catalog = load_catalog(&config.content_dir).unwrap();
    AppState::with_parts(config, catalog)
}

pub fn create_test_app() -> (Router, Arc<AppState>) {
    let state = Arc::new(create_test_state());
    (build_router(state.clone()), state)
}

/// Submission answering every exercise with its own expected answer.
pub fn perfect_submission(learner: &str, step_id: &str, exercises: Vec<GeneratedExercise>) -> Submission {
    let answers: BTreeMap<String, Value> = exercises
        .iter()
        .map(|e| (e.id.clone(), serde_json::to_value(&e.answer).unwrap()))
        .collect();
    Submission {
        learner_id: learner.to_string(),
        step_id: step_id.to_string(),
        answers,
        generated_exercises: exercises,
    }
}
