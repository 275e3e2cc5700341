//! Word problems grouped by scenario category, each with a picture blueprint.
//!
//! Config keys: `categories` (subset of pizza | chocolat | liquide; default all).
//! Unknown categories produce nothing.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde_json::Value;

use super::{exercise, ExerciseGenerator, GeneratorConfig};
use crate::domain::{Answer, BlueprintStyle, GeneratedExercise, VisualBlueprint, TYPE_INPUT};
use crate::util::fill_template;

type Vars = BTreeMap<&'static str, i64>;

struct Scenario {
  text: &'static str,
  draw: fn(&mut dyn RngCore) -> Vars,
  solve: fn(&Vars) -> i64,
  picture: fn(&Vars) -> VisualBlueprint,
}

const CATEGORIES: [&str; 3] = ["pizza", "liquide", "chocolat"];

const PIZZA: &[Scenario] = &[
  Scenario {
    text: "Tom a commandé une pizza coupée en {total} parts. Il en mange {taken}. Combien de parts reste-t-il ?",
    draw: |rng| {
      let total = *[4, 6, 8].choose(rng).unwrap_or(&8);
      Vars::from([("total", total), ("taken", rng.gen_range(1..total))])
    },
    solve: |v| v["total"] - v["taken"],
    picture: |v| VisualBlueprint::Pizza {
      total: v["total"] as u32,
      highlighted: v["taken"] as u32,
      style: Some(BlueprintStyle::Eaten),
    },
  },
  Scenario {
    text: "Alice et Tom partagent une pizza de {total} parts. Alice en prend {alice}, Tom en prend {tom}. Combien de parts ont-ils mangées ensemble ?",
    draw: |rng| {
      let total = *[6, 8, 10, 12].choose(rng).unwrap_or(&8);
      Vars::from([
        ("total", total),
        ("alice", rng.gen_range(1..=total / 2)),
        ("tom", rng.gen_range(1..=total / 2)),
      ])
    },
    solve: |v| v["alice"] + v["tom"],
    picture: |v| VisualBlueprint::Pizza {
      total: v["total"] as u32,
      highlighted: (v["alice"] + v["tom"]) as u32,
      style: None,
    },
  },
];

const CHOCOLAT: &[Scenario] = &[
  Scenario {
    text: "Une tablette de chocolat compte {rows} rangées de {cols} carrés. Combien de carrés y a-t-il en tout ?",
    draw: |rng| Vars::from([("rows", rng.gen_range(2..=5)), ("cols", rng.gen_range(3..=6))]),
    solve: |v| v["rows"] * v["cols"],
    picture: |v| VisualBlueprint::Grid {
      rows: v["rows"] as u32,
      cols: v["cols"] as u32,
      highlighted: 0,
      style: None,
    },
  },
  Scenario {
    text: "Tom a mangé {eaten} carrés d'une tablette de {rows} rangées de {cols}. Combien en reste-t-il ?",
    draw: |rng| {
      let rows = rng.gen_range(3..=5);
      let cols = rng.gen_range(4..=8);
      Vars::from([("rows", rows), ("cols", cols), ("eaten", rng.gen_range(1..rows * cols))])
    },
    solve: |v| v["rows"] * v["cols"] - v["eaten"],
    picture: |v| VisualBlueprint::Grid {
      rows: v["rows"] as u32,
      cols: v["cols"] as u32,
      highlighted: v["eaten"] as u32,
      style: Some(BlueprintStyle::Missing),
    },
  },
];

const LIQUIDE: &[Scenario] = &[Scenario {
  text: "Un verre doseur contient {level} ml de lait. Alice en verse encore {add} ml. Quel volume y a-t-il maintenant ?",
  draw: |rng| Vars::from([("level", rng.gen_range(50..=200)), ("add", rng.gen_range(20..=100))]),
  solve: |v| v["level"] + v["add"],
  picture: |v| VisualBlueprint::Beaker {
    capacity: 500,
    level_start: v["level"] as u32,
    level_end: (v["level"] + v["add"]) as u32,
  },
}];

fn scenarios(category: &str) -> Option<&'static [Scenario]> {
  match category {
    "pizza" => Some(PIZZA),
    "chocolat" => Some(CHOCOLAT),
    "liquide" => Some(LIQUIDE),
    _ => None,
  }
}

pub struct WordProblemGenerator;

impl ExerciseGenerator for WordProblemGenerator {
  fn generate(&self, config: &GeneratorConfig<'_>, count: usize, rng: &mut dyn RngCore) -> Vec<GeneratedExercise> {
    let categories = config
      .str_list("categories")
      .unwrap_or_else(|| CATEGORIES.iter().map(|c| c.to_string()).collect());

    let mut out = Vec::new();
    for _ in 0..count {
      let Some(category) = categories.choose(rng) else { break };
      let Some(scenario) = scenarios(category).and_then(|pool| pool.choose(rng)) else {
        continue;
      };

      let vars = (scenario.draw)(rng);
      let rendered: Vec<(&str, String)> = vars.iter().map(|(k, v)| (*k, v.to_string())).collect();
      let pairs: Vec<(&str, &str)> = rendered.iter().map(|(k, v)| (*k, v.as_str())).collect();

      let mut ex = exercise(
        &format!("prob_{}", category),
        TYPE_INPUT,
        fill_template(scenario.text, &pairs),
        Answer::text((scenario.solve)(&vars).to_string()),
        format!("math:probleme:{}", category),
      );
      ex.variables = vars.iter().map(|(k, v)| (k.to_string(), Value::from(*v))).collect();
      ex.meta.visual_blueprint = Some((scenario.picture)(&vars));
      out.push(ex);
    }
    out
  }
}
