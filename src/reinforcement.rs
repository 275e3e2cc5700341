//! Reinforcement selector: builds a batch biased toward the learner's weak tags.
//!
//! The batch is split into three buckets, filled in order:
//!   - weak: `weak_share` of the batch, each item from a uniformly chosen weak
//!     tag, then a uniformly chosen template carrying that tag
//!   - easy: `easy_share` of the batch from scope templates at `easy_difficulty`
//!   - fill: whatever is left, from any scope template
//!
//! A bucket without source templates contributes nothing and the final batch
//! may be short. The result is shuffled.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::RngCore;
use tracing::{debug, instrument, warn};

use crate::catalog::Catalog;
use crate::config::ReinforcementConfig;
use crate::domain::{ExerciseLog, ExerciseTemplate, GeneratedExercise};
use crate::template;

/// Per-tag attempt tally.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TagStats {
  pub correct: u32,
  pub total: u32,
}

impl TagStats {
  pub fn success_rate(&self) -> f64 {
    if self.total == 0 {
      return 1.0;
    }
    f64::from(self.correct) / f64::from(self.total)
  }
}

/// Tally history entries whose tag starts with `scope_tag`, keyed by exact tag.
pub fn tag_stats(history: &[ExerciseLog], scope_tag: &str) -> BTreeMap<String, TagStats> {
  let mut stats: BTreeMap<String, TagStats> = BTreeMap::new();
  for log in history.iter().filter(|l| l.tag.starts_with(scope_tag)) {
    let entry = stats.entry(log.tag.clone()).or_default();
    entry.total += 1;
    if log.is_correct {
      entry.correct += 1;
    }
  }
  stats
}

/// Tags under the threshold, worst first.
pub fn weak_tags(history: &[ExerciseLog], scope_tag: &str, threshold: f64) -> Vec<String> {
  let mut weak: Vec<(String, f64)> = tag_stats(history, scope_tag)
    .into_iter()
    .map(|(tag, s)| (tag, s.success_rate()))
    .filter(|(_, rate)| *rate < threshold)
    .collect();
  weak.sort_by(|a, b| a.1.total_cmp(&b.1));
  weak.into_iter().map(|(tag, _)| tag).collect()
}

#[derive(Debug, Default)]
struct Buckets {
  weak: Vec<GeneratedExercise>,
  easy: Vec<GeneratedExercise>,
  fill: Vec<GeneratedExercise>,
}

/// Build a reinforcement batch of (up to) `count` exercises for `scope_tag`.
#[instrument(level = "debug", skip(history, catalog, cfg, rng), fields(history = history.len()))]
pub fn select(
  history: &[ExerciseLog],
  scope_tag: &str,
  count: usize,
  catalog: &Catalog,
  cfg: &ReinforcementConfig,
  rng: &mut dyn RngCore,
) -> Vec<GeneratedExercise> {
  let buckets = fill_buckets(history, scope_tag, count, catalog, cfg, rng);
  debug!(
    target: "exercise",
    scope = %scope_tag,
    weak = buckets.weak.len(),
    easy = buckets.easy.len(),
    fill = buckets.fill.len(),
    "Reinforcement batch composed"
  );

  let mut out: Vec<GeneratedExercise> = buckets.weak.into_iter().chain(buckets.easy).chain(buckets.fill).collect();
  out.shuffle(rng);
  out
}

fn fill_buckets(
  history: &[ExerciseLog],
  scope_tag: &str,
  count: usize,
  catalog: &Catalog,
  cfg: &ReinforcementConfig,
  rng: &mut dyn RngCore,
) -> Buckets {
  let scope = [scope_tag.to_string()];
  let weak = weak_tags(history, scope_tag, cfg.weak_threshold);
  let n_weak = (count as f64 * cfg.weak_share).floor() as usize;
  let n_easy = (count as f64 * cfg.easy_share).floor() as usize;

  let mut buckets = Buckets::default();

  if !weak.is_empty() {
    for _ in 0..n_weak {
      let Some(tag) = weak.choose(rng) else { break };
      let pool = catalog.select_templates(std::slice::from_ref(tag), None);
      match pool.choose(rng) {
        Some(t) => buckets.weak.push(template::generate(t, None, rng)),
        None => debug!(target: "exercise", %tag, "No template for weak tag"),
      }
    }
  }

  let easy_pool = catalog.select_templates(&scope, Some(cfg.easy_difficulty));
  buckets.easy = draw(&easy_pool, n_easy, rng);

  let produced = buckets.weak.len() + buckets.easy.len();
  let fill_pool = catalog.select_templates(&scope, None);
  buckets.fill = draw(&fill_pool, count.saturating_sub(produced), rng);

  if fill_pool.is_empty() {
    warn!(target: "exercise", scope = %scope_tag, "No template matches the reinforcement scope");
  }
  buckets
}

fn draw(pool: &[&ExerciseTemplate], n: usize, rng: &mut dyn RngCore) -> Vec<GeneratedExercise> {
  if pool.is_empty() {
    return Vec::new();
  }
  (0..n)
    .filter_map(|_| pool.choose(rng).map(|t| template::generate(t, None, rng)))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Utc;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  fn log(tag: &str, ok: bool) -> ExerciseLog {
    ExerciseLog {
      learner_id: "ana".into(),
      tag: tag.into(),
      question_id: "q".into(),
      is_correct: ok,
      timestamp: Utc::now(),
      difficulty: "1".into(),
    }
  }

  fn history(tag: &str, correct: usize, total: usize) -> Vec<ExerciseLog> {
    (0..total).map(|i| log(tag, i < correct)).collect()
  }

  fn tpl(id: &str, specific: &str, difficulty: u8) -> ExerciseTemplate {
    toml::from_str(&format!(
      "id = \"{id}\"\ntags = [\"{specific}\", \"math:calcul\"]\ndifficulty = {difficulty}\nlogic = \"1\"\n[content]\nquestion = \"q\""
    ))
    .unwrap()
  }

  fn catalog() -> Catalog {
    let mut c = Catalog::new();
    c.insert_template(tpl("add_1", "math:calcul:addition", 1));
    c.insert_template(tpl("add_2", "math:calcul:addition", 2));
    c.insert_template(tpl("sub_1", "math:calcul:soustraction", 1));
    c.insert_template(tpl("sub_2", "math:calcul:soustraction", 2));
    c
  }

  fn calcul_history() -> Vec<ExerciseLog> {
    let mut h = history("math:calcul:addition", 4, 10);
    h.extend(history("math:calcul:soustraction", 19, 20));
    h.extend(history("math:geometrie:aire", 0, 5));
    h
  }

  #[test]
  fn weak_tags_are_scoped_and_thresholded() {
    let weak = weak_tags(&calcul_history(), "math:calcul", 0.8);
    assert_eq!(weak, vec!["math:calcul:addition".to_string()]);

    let stats = tag_stats(&calcul_history(), "math:calcul");
    assert_eq!(stats["math:calcul:addition"], TagStats { correct: 4, total: 10 });
    assert!(!stats.contains_key("math:geometrie:aire"));
  }

  #[test]
  fn weak_bucket_targets_addition_only() {
    let cfg = ReinforcementConfig::default();
    let mut rng = StdRng::seed_from_u64(11);
    let b = fill_buckets(&calcul_history(), "math:calcul", 10, &catalog(), &cfg, &mut rng);

    assert_eq!(b.weak.len(), 6);
    assert!(b.weak.iter().all(|e| e.tags[0] == "math:calcul:addition"));
    assert_eq!(b.easy.len(), 2);
    assert!(b.easy.iter().all(|e| e.meta.difficulty.as_deref() == Some("1")));
    assert_eq!(b.fill.len(), 2);

    let batch = select(&calcul_history(), "math:calcul", 10, &catalog(), &cfg, &mut rng);
    assert_eq!(batch.len(), 10);
    let additions = batch.iter().filter(|e| e.tags[0] == "math:calcul:addition").count();
    assert!(additions >= 6, "only {additions} additions");
  }

  #[test]
  fn no_history_degrades_to_easy_and_fill() {
    let cfg = ReinforcementConfig::default();
    let b = fill_buckets(&[], "math:calcul", 10, &catalog(), &cfg, &mut StdRng::seed_from_u64(1));
    assert!(b.weak.is_empty());
    assert_eq!(b.easy.len(), 2);
    assert_eq!(b.fill.len(), 8);
  }

  #[test]
  fn empty_scope_yields_nothing() {
    let cfg = ReinforcementConfig::default();
    let batch = select(&calcul_history(), "francais", 10, &catalog(), &cfg, &mut rand::thread_rng());
    assert!(batch.is_empty());
  }

  #[test]
  fn weak_tag_without_templates_leaves_room_for_fill() {
    let cfg = ReinforcementConfig::default();
    let h = history("math:calcul:division", 0, 4);
    let b = fill_buckets(&h, "math:calcul", 10, &catalog(), &cfg, &mut rand::thread_rng());
    assert!(b.weak.is_empty());
    assert_eq!(b.easy.len() + b.fill.len(), 10);
  }
}
