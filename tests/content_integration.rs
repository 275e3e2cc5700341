//! Loading the bundled `content/` tree and driving a learner through it.

use cours_engine::domain::StepKind;
use cours_engine::logic::{exercises_for_step, steps_with_status, submit};

mod common;

#[tokio::test]
async fn test_bundled_content_loads() {
    let state = common::create_test_state();
    let catalog = state.catalog.snapshot().await;

    let subjects = catalog.subjects();
    assert_eq!(subjects.len(), 1);
    assert_eq!(subjects[0].id, "maths");
    assert_eq!(subjects[0].name, "Mathématiques");
    assert_eq!(catalog.step_count(), 11);
    assert_eq!(catalog.template_count(), 8);

    let road = catalog.steps_for_subject("maths");
    let orders: Vec<u32> = road.iter().map(|s| s.order).collect();
    assert_eq!(orders, (0..11).collect::<Vec<u32>>());

    let tables: Vec<&str> = road
        .iter()
        .filter(|s| s.kind() == StepKind::Flash)
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(tables, vec!["table_2", "table_3", "table_4", "table_5"]);
    assert!(road.iter().all(|s| s.subject_id == "maths"));
}

#[tokio::test]
async fn test_practice_step_completes_once() {
    let state = common::create_test_state();

    let exercises = exercises_for_step(&state, "addition", Some("ana"), None).await.unwrap();
    assert_eq!(exercises.len(), 5);
    assert!(exercises.iter().all(|e| e.tags.iter().any(|t| t == "math:calcul:addition")));

    let first = submit(&state, common::perfect_submission("ana", "addition", exercises.clone()), 10)
        .await
        .unwrap();
    assert_eq!(first.correct, 5);
    assert!(first.completed && first.newly_completed);
    assert_eq!(first.xp_gained, 50);
    assert_eq!(first.total_xp, 50);

    let again = submit(&state, common::perfect_submission("ana", "addition", exercises), 10)
        .await
        .unwrap();
    assert!(again.completed && !again.newly_completed);
    assert_eq!(again.xp_gained, 0);
    assert_eq!(again.total_xp, 50);

    let road = steps_with_status(&state, "maths", Some("ana")).await.unwrap();
    let addition = road.steps.iter().find(|s| s.id == "addition").unwrap();
    assert!(addition.completed);
    assert_eq!(road.totals.subject_scores.get("maths"), Some(&50));
}

#[tokio::test]
async fn test_flash_step_builds_mastery() {
    let state = common::create_test_state();

    let exercises = exercises_for_step(&state, "table_3", None, None).await.unwrap();
    assert_eq!(exercises.len(), 8);
    assert!(exercises.iter().all(|e| e.question.contains("3 \\times")));

    let out = submit(&state, common::perfect_submission("", "table_3", exercises), 10).await.unwrap();
    assert_eq!(out.mastery, 1);

    let road = steps_with_status(&state, "maths", None).await.unwrap();
    let table = road.steps.iter().find(|s| s.id == "table_3").unwrap();
    assert_eq!(table.mastery, 1);
}

#[tokio::test]
async fn test_fixed_template_step_and_lesson() {
    let state = common::create_test_state();

    let fractions = exercises_for_step(&state, "fractions", None, None).await.unwrap();
    let ids: Vec<_> = fractions.iter().map(|e| e.template_id.as_deref()).collect();
    assert_eq!(ids, vec![Some("frac_moitie"), Some("frac_equivalentes")]);

    let lesson = exercises_for_step(&state, "intro_calcul", None, None).await.unwrap();
    assert!(lesson.is_empty());
    let out = submit(&state, common::perfect_submission("bo", "intro_calcul", lesson), 10).await.unwrap();
    assert!(out.completed);
    assert_eq!(out.xp_gained, 0);
}

#[tokio::test]
async fn test_unknown_step_is_an_error() {
    let state = common::create_test_state();
    assert!(exercises_for_step(&state, "nope", None, None).await.is_err());
    assert!(steps_with_status(&state, "histoire", None).await.is_err());
}
