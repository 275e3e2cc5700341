//! Template catalog: read-only lookup of templates, curriculum steps and
//! subjects, plus the handle that swaps a whole catalog on reload.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::{ExerciseTemplate, RoadStep, Subject};

#[derive(Clone, Debug, Default)]
pub struct Catalog {
  templates: BTreeMap<String, ExerciseTemplate>,
  steps: HashMap<String, RoadStep>,
  subjects: BTreeMap<String, Subject>,
}

impl Catalog {
  pub fn new() -> Self {
    Self::default()
  }

  /// Later definitions of the same id win; the collision is logged.
  pub fn insert_template(&mut self, template: ExerciseTemplate) {
    if let Some(old) = self.templates.insert(template.id.clone(), template) {
      warn!(target: "content", template_id = %old.id, "Duplicate template id; keeping the last definition");
    }
  }

  pub fn insert_step(&mut self, step: RoadStep) {
    if let Some(old) = self.steps.insert(step.id.clone(), step) {
      warn!(target: "content", step_id = %old.id, "Duplicate step id; keeping the last definition");
    }
  }

  pub fn insert_subject(&mut self, subject: Subject) {
    self.subjects.insert(subject.id.clone(), subject);
  }

  pub fn get_template(&self, id: &str) -> Option<&ExerciseTemplate> {
    self.templates.get(id)
  }

  pub fn get_step(&self, id: &str) -> Option<&RoadStep> {
    self.steps.get(id)
  }

  pub fn get_subject(&self, id: &str) -> Option<&Subject> {
    self.subjects.get(id)
  }

  pub fn subjects(&self) -> Vec<&Subject> {
    self.subjects.values().collect()
  }

  /// Templates authored under one subject's folder.
  pub fn templates_for_subject(&self, subject_id: &str) -> Vec<&ExerciseTemplate> {
    self.templates.values().filter(|t| t.subject_id == subject_id).collect()
  }

  /// Steps of one subject in curriculum order.
  pub fn steps_for_subject(&self, subject_id: &str) -> Vec<&RoadStep> {
    let mut steps: Vec<&RoadStep> = self.steps.values().filter(|s| s.subject_id == subject_id).collect();
    steps.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
    steps
  }

  /// Templates carrying every tag in `tags`, optionally at exactly `difficulty`.
  /// An empty tag list matches every template.
  pub fn select_templates(&self, tags: &[String], difficulty: Option<u8>) -> Vec<&ExerciseTemplate> {
    self
      .templates
      .values()
      .filter(|t| t.has_tags(tags))
      .filter(|t| difficulty.map_or(true, |d| t.difficulty == d))
      .collect()
  }

  pub fn template_count(&self) -> usize {
    self.templates.len()
  }

  pub fn step_count(&self) -> usize {
    self.steps.len()
  }
}

/// Shared pointer to the current catalog.
///
/// Readers take a snapshot (`Arc<Catalog>`) and keep using it for the whole
/// request; a reload builds a fresh catalog off to the side and swaps the
/// pointer, so nobody ever sees a half-built one.
#[derive(Clone, Default)]
pub struct CatalogHandle {
  inner: Arc<RwLock<Arc<Catalog>>>,
}

impl CatalogHandle {
  pub fn new(catalog: Catalog) -> Self {
    Self { inner: Arc::new(RwLock::new(Arc::new(catalog))) }
  }

  pub async fn snapshot(&self) -> Arc<Catalog> {
    self.inner.read().await.clone()
  }

  pub async fn replace(&self, catalog: Catalog) {
    let (templates, steps) = (catalog.template_count(), catalog.step_count());
    *self.inner.write().await = Arc::new(catalog);
    info!(target: "content", templates, steps, "Catalog swapped");
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tpl(id: &str, tags: &[&str], difficulty: u8) -> ExerciseTemplate {
    ExerciseTemplate {
      id: id.into(),
      tags: tags.iter().map(|t| t.to_string()).collect(),
      difficulty,
      vars: Default::default(),
      content: Default::default(),
      logic: None,
      render_type: None,
      interaction: None,
      multiple: false,
      subject_id: "maths".into(),
    }
  }

  fn step(id: &str, subject: &str, order: u32) -> RoadStep {
    toml::from_str(&format!("id = \"{id}\"\ntitle = \"{id}\"\nsubject_id = \"{subject}\"\norder = {order}")).unwrap()
  }

  fn sample() -> Catalog {
    let mut c = Catalog::new();
    c.insert_template(tpl("add_1", &["math:calcul", "math:calcul:addition"], 1));
    c.insert_template(tpl("add_2", &["math:calcul", "math:calcul:addition"], 2));
    c.insert_template(tpl("sub_1", &["math:calcul", "math:calcul:soustraction"], 1));
    c.insert_template(tpl("geo_1", &["math:geometrie"], 1));
    c
  }

  #[test]
  fn selection_is_subset_match_with_optional_difficulty() {
    let c = sample();
    let ids = |v: Vec<&ExerciseTemplate>| v.into_iter().map(|t| t.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(c.select_templates(&["math:calcul:addition".into()], None)), vec!["add_1", "add_2"]);
    assert_eq!(ids(c.select_templates(&["math:calcul".into()], Some(1))), vec!["add_1", "sub_1"]);
    assert!(c.select_templates(&["math:calcul".into(), "math:geometrie".into()], None).is_empty());
    assert_eq!(c.select_templates(&[], None).len(), 4);
  }

  #[test]
  fn templates_are_grouped_by_subject() {
    let mut c = sample();
    let mut dictee = tpl("dictee_1", &["fr:orthographe"], 1);
    dictee.subject_id = "francais".into();
    c.insert_template(dictee);
    assert_eq!(c.templates_for_subject("maths").len(), 4);
    let fr: Vec<_> = c.templates_for_subject("francais").iter().map(|t| t.id.as_str()).collect();
    assert_eq!(fr, vec!["dictee_1"]);
    assert!(c.templates_for_subject("histoire").is_empty());
  }

  #[test]
  fn steps_are_sorted_by_order() {
    let mut c = Catalog::new();
    c.insert_step(step("c", "maths", 3));
    c.insert_step(step("a", "maths", 1));
    c.insert_step(step("b", "maths", 2));
    c.insert_step(step("x", "francais", 1));
    let ids: Vec<_> = c.steps_for_subject("maths").iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
  }

  #[tokio::test]
  async fn snapshots_survive_a_swap() {
    let handle = CatalogHandle::new(sample());
    let before = handle.snapshot().await;
    handle.replace(Catalog::new()).await;
    assert_eq!(before.template_count(), 4);
    assert_eq!(handle.snapshot().await.template_count(), 0);
  }
}
