//! Builds a `Catalog` from a content directory.
//!
//! Layout:
//!
//! ```text
//! content/
//!   maths/            one folder per subject (folder name = subject id)
//!     road.toml       `title` + ordered `[[road]]` steps
//!     calcul.toml     `[[templates]]` (any other *.toml, at any depth)
//! ```
//!
//! A `type = "sequence"` road entry is a macro: it carries `repeat`, an
//! optional `start` (default 1) and a `step_config` table, and expands here into
//! `repeat` concrete steps with `{index}` substituted everywhere in the config.
//! A string that is exactly `"{index}"` becomes the integer itself.
//!
//! Steps get their `order` from their position in the expanded road.
//! Unreadable or malformed files are logged and skipped.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, instrument, warn};
use walkdir::WalkDir;

use crate::catalog::Catalog;
use crate::domain::{ExerciseTemplate, RoadStep, Subject};
use crate::error::ContentError;
use crate::util::fill_template;

const ROAD_FILE: &str = "road.toml";
const SEQUENCE: &str = "sequence";

/// Load every subject under `root`. Fails only when `root` itself is unusable.
#[instrument(level = "info", skip_all, fields(root = %root.as_ref().display()))]
pub fn load_catalog(root: impl AsRef<Path>) -> Result<Catalog, ContentError> {
  let root = root.as_ref();
  if !root.is_dir() {
    return Err(ContentError::MissingRoot { path: root.to_path_buf() });
  }

  let mut catalog = Catalog::new();
  for entry in WalkDir::new(root).min_depth(1).max_depth(1).sort_by_file_name() {
    let entry = entry?;
    if !entry.file_type().is_dir() {
      continue;
    }
    let subject_id = entry.file_name().to_string_lossy().to_string();
    load_subject(&mut catalog, &subject_id, entry.path());
  }

  info!(
    target: "content",
    subjects = catalog.subjects().len(),
    steps = catalog.step_count(),
    templates = catalog.template_count(),
    "Content loaded"
  );
  Ok(catalog)
}

fn load_subject(catalog: &mut Catalog, subject_id: &str, dir: &Path) {
  let files: Vec<PathBuf> = WalkDir::new(dir)
    .sort_by_file_name()
    .into_iter()
    .filter_map(|e| match e {
      Ok(e) => Some(e),
      Err(err) => {
        warn!(target: "content", subject = %subject_id, error = %err, "Skipping unreadable entry");
        None
      }
    })
    .filter(|e| e.file_type().is_file())
    .map(|e| e.into_path())
    .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
    .collect();

  let mut name = None;
  for path in files {
    let table = match read_toml(&path) {
      Ok(table) => table,
      Err(e) => {
        error!(target: "content", error = %e, "Skipping content file");
        continue;
      }
    };

    if path.file_name().is_some_and(|f| f == ROAD_FILE) && path.parent() == Some(dir) {
      name = table.get("title").and_then(toml::Value::as_str).map(str::to_string);
      let entries = match table.get("road") {
        Some(toml::Value::Array(items)) => items.clone(),
        _ => Vec::new(),
      };
      for step in expand_road(subject_id, entries) {
        catalog.insert_step(step);
      }
    } else {
      for mut template in parse_templates(&path, &table) {
        template.subject_id = subject_id.to_string();
        catalog.insert_template(template);
      }
    }
  }

  let name = name.unwrap_or_else(|| capitalize(subject_id));
  catalog.insert_subject(Subject { id: subject_id.to_string(), name });
}

fn read_toml(path: &Path) -> Result<toml::Table, ContentError> {
  let raw = std::fs::read_to_string(path).map_err(|source| ContentError::Io { path: path.to_path_buf(), source })?;
  raw.parse::<toml::Table>().map_err(|source| ContentError::Toml { path: path.to_path_buf(), source })
}

/// Templates of one file; a malformed entry is skipped, not the whole file.
fn parse_templates(path: &Path, table: &toml::Table) -> Vec<ExerciseTemplate> {
  let Some(toml::Value::Array(items)) = table.get("templates") else {
    debug!(target: "content", path = %path.display(), "No [[templates]] in file");
    return Vec::new();
  };
  items
    .iter()
    .enumerate()
    .filter_map(|(i, item)| match item.clone().try_into::<ExerciseTemplate>() {
      Ok(t) => Some(t),
      Err(e) => {
        warn!(target: "content", path = %path.display(), index = i, error = %e, "Skipping malformed template");
        None
      }
    })
    .collect()
}

/// Flatten a subject's road: expand sequence macros and number the result.
pub fn expand_road(subject_id: &str, entries: Vec<toml::Value>) -> Vec<RoadStep> {
  let mut raw_steps = Vec::with_capacity(entries.len());
  for entry in entries {
    let is_sequence = entry.get("type").and_then(toml::Value::as_str) == Some(SEQUENCE);
    if is_sequence {
      raw_steps.extend(expand_sequence(subject_id, &entry));
    } else {
      raw_steps.push(entry);
    }
  }

  let mut steps = Vec::with_capacity(raw_steps.len());
  for raw in raw_steps {
    match raw.try_into::<RoadStep>() {
      Ok(mut step) => {
        step.order = steps.len() as u32;
        step.subject_id = subject_id.to_string();
        steps.push(step);
      }
      Err(e) => warn!(target: "content", subject = %subject_id, error = %e, "Skipping malformed road step"),
    }
  }
  steps
}

fn expand_sequence(subject_id: &str, node: &toml::Value) -> Vec<toml::Value> {
  let node_id = node.get("id").and_then(toml::Value::as_str).unwrap_or("?");
  let repeat = node.get("repeat").and_then(toml::Value::as_integer).unwrap_or(0);
  let start = node.get("start").and_then(toml::Value::as_integer).unwrap_or(1);
  let Some(config) = node.get("step_config").filter(|c| c.is_table()) else {
    warn!(target: "content", subject = %subject_id, node = %node_id, "Sequence without step_config; skipped");
    return Vec::new();
  };
  if repeat <= 0 {
    warn!(target: "content", subject = %subject_id, node = %node_id, repeat, "Sequence with no repetitions");
    return Vec::new();
  }

  debug!(target: "content", subject = %subject_id, node = %node_id, repeat, start, "Expanding sequence");
  (start..start + repeat).map(|index| substitute_index(config, index)).collect()
}

/// Deep copy of `value` with `{index}` replaced in every string.
fn substitute_index(value: &toml::Value, index: i64) -> toml::Value {
  match value {
    toml::Value::String(s) if s == "{index}" => toml::Value::Integer(index),
    toml::Value::String(s) => toml::Value::String(fill_template(s, &[("index", &index.to_string())])),
    toml::Value::Array(items) => toml::Value::Array(items.iter().map(|v| substitute_index(v, index)).collect()),
    toml::Value::Table(table) => {
      toml::Value::Table(table.iter().map(|(k, v)| (k.clone(), substitute_index(v, index))).collect())
    }
    other => other.clone(),
  }
}

fn capitalize(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn road(src: &str) -> Vec<toml::Value> {
    let table: toml::Table = src.parse().unwrap();
    match table.get("road") {
      Some(toml::Value::Array(items)) => items.clone(),
      _ => Vec::new(),
    }
  }

  #[test]
  fn sequence_expands_with_index_and_consecutive_order() {
    let steps = expand_road(
      "maths",
      road(
        r#"
[[road]]
id = "intro"
title = "Introduction"

[[road]]
id = "tables"
type = "sequence"
repeat = 3
start = 2
[road.step_config]
id = "table_{index}"
title = "Table de {index}"
type = "practice"
[[road.step_config.selection]]
tags = ["math:calcul:multiplication:{index}"]
[road.step_config.recipe]
count = 5
[[road.step_config.recipe.generators]]
type = "calcul"
subtype = "multiplication"
focus = "{index}"

[[road]]
id = "bilan"
title = "Bilan"
type = "validation"
"#,
      ),
    );

    let ids: Vec<_> = steps.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["intro", "table_2", "table_3", "table_4", "bilan"]);
    let orders: Vec<_> = steps.iter().map(|s| s.order).collect();
    assert_eq!(orders, vec![0, 1, 2, 3, 4]);
    assert!(steps.iter().all(|s| s.subject_id == "maths"));

    let t3 = &steps[2];
    assert_eq!(t3.title, "Table de 3");
    assert_eq!(t3.selection[0].tags, vec!["math:calcul:multiplication:3".to_string()]);
    let recipe = t3.recipe.as_ref().unwrap();
    assert_eq!(recipe.generators[0].config.get("focus"), Some(&serde_json::json!(3)));
  }

  #[test]
  fn broken_sequences_and_steps_are_skipped() {
    let steps = expand_road(
      "maths",
      road(
        r#"
[[road]]
id = "no_config"
type = "sequence"
repeat = 2

[[road]]
title = "missing id"

[[road]]
id = "ok"
title = "Ok"
"#,
      ),
    );
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].id, "ok");
    assert_eq!(steps[0].order, 0);
  }

  #[test]
  fn missing_root_is_an_error() {
    assert!(matches!(load_catalog("/no/such/content"), Err(ContentError::MissingRoot { .. })));
  }

  #[test]
  fn capitalizes_subject_names() {
    assert_eq!(capitalize("maths"), "Maths");
    assert_eq!(capitalize("éveil"), "Éveil");
  }
}
