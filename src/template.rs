//! Exercise template engine: turns one `ExerciseTemplate` into one concrete
//! `GeneratedExercise`.
//!
//! Steps:
//!   1) resolve every variable spec to a concrete value
//!   2) interpolate content fields (`[[ expr ]]` first, then `{name}`)
//!   3) compute the answer from `logic`, or resolve the static `content.answer`
//!   4) assemble the exercise
//!
//! Nothing here fails: broken expressions surface as `ERR(<expr>)` in the text
//! and as the literal answer `"ERROR"`, so bad content is visible in the
//! rendered exercise instead of taking the batch down.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::domain::{
  Answer, ExerciseMeta, ExerciseTemplate, GeneratedExercise, VarSpec, TYPE_INPUT, TYPE_MULTISELECT, TYPE_QCM,
};
use crate::expr;
use crate::util::{format_placeholders, trunc_for_log, value_text};

/// Literal answer emitted when `logic` cannot be evaluated.
pub const ANSWER_ERROR: &str = "ERROR";

static BRACKET_EXPR: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\[\[(.+?)\]\]").expect("Invalid bracket expression regex"));

/// Generate one exercise instance from `template`.
///
/// `difficulty_hint` is the difficulty the caller asked for; templates carry a
/// fixed difficulty, so the hint is only recorded on the span.
#[instrument(level = "debug", skip(template, rng), fields(template_id = %template.id))]
pub fn generate<R: Rng + ?Sized>(
  template: &ExerciseTemplate,
  difficulty_hint: Option<u8>,
  rng: &mut R,
) -> GeneratedExercise {
  let variables = resolve_vars(template, rng);

  let content: BTreeMap<String, Value> = template
    .content
    .iter()
    .map(|(k, v)| (k.clone(), interpolate_value(v, &variables)))
    .collect();

  let answer = resolve_answer(template, &content, &variables);

  let kind = match template.interaction.as_deref() {
    Some(TYPE_QCM) if template.multiple => TYPE_MULTISELECT.to_string(),
    Some(other) => other.to_string(),
    None => TYPE_INPUT.to_string(),
  };

  let options = match content.get("options") {
    Some(Value::Array(items)) => items.clone(),
    Some(Value::Null) | None => Vec::new(),
    Some(other) => vec![other.clone()],
  };

  GeneratedExercise {
    id: format!("{}_{}", template.id, Uuid::new_v4().simple()),
    template_id: Some(template.id.clone()),
    kind,
    render_type: template.render_type.clone(),
    multiple: template.multiple,
    question: text_field(&content, "question"),
    options,
    answer,
    explanation: text_field(&content, "explanation"),
    unit: text_field(&content, "unit"),
    variables,
    tags: template.tags.clone(),
    meta: ExerciseMeta {
      difficulty: Some(template.difficulty.to_string()),
      visual_blueprint: None,
    },
  }
}

/// Pick a concrete value for every variable spec.
pub fn resolve_vars<R: Rng + ?Sized>(template: &ExerciseTemplate, rng: &mut R) -> BTreeMap<String, Value> {
  let mut out = BTreeMap::new();
  for (name, spec) in &template.vars {
    let value = match spec {
      VarSpec::Choice(choices) => match choices.choose(rng) {
        Some(v) => v.clone(),
        None => {
          warn!(target: "exercise", template_id = %template.id, var = %name, "Empty choice list; variable left undefined");
          continue;
        }
      },
      VarSpec::Range { min, max } => {
        let (lo, hi) = if min <= max { (*min, *max) } else { (*max, *min) };
        if min > max {
          warn!(target: "exercise", template_id = %template.id, var = %name, min, max, "Range bounds inverted; swapping");
        }
        Value::from(rng.gen_range(lo..=hi))
      }
      VarSpec::Fixed(v) => v.clone(),
    };
    out.insert(name.clone(), value);
  }
  out
}

/// Interpolate one text: evaluate `[[ expr ]]` blocks, then fill `{name}`.
/// A failing `{name}` pass leaves the text as it was after the first pass.
pub fn interpolate(text: &str, variables: &BTreeMap<String, Value>) -> String {
  let processed = BRACKET_EXPR.replace_all(text, |caps: &Captures| eval_bracket(&caps[1], variables));
  format_placeholders(&processed, variables).unwrap_or_else(|| processed.into_owned())
}

fn eval_bracket(raw: &str, variables: &BTreeMap<String, Value>) -> String {
  let Some(source) = format_placeholders(raw, variables) else {
    debug!(target: "exercise", expr = %trunc_for_log(raw, 80), "Unresolved placeholder inside expression");
    return format!("ERR({})", raw);
  };
  match expr::eval_str(&source, variables) {
    Ok(v) => v.render(),
    Err(e) => {
      debug!(target: "exercise", expr = %trunc_for_log(raw, 80), error = %e, "Expression evaluation failed");
      format!("ERR({})", raw)
    }
  }
}

/// Strings are interpolated, lists element-wise, anything else passes through.
fn interpolate_value(value: &Value, variables: &BTreeMap<String, Value>) -> Value {
  match value {
    Value::String(s) => Value::String(interpolate(s, variables)),
    Value::Array(items) => Value::Array(
      items
        .iter()
        .map(|item| match item {
          Value::String(s) => Value::String(interpolate(s, variables)),
          other => other.clone(),
        })
        .collect(),
    ),
    other => other.clone(),
  }
}

fn resolve_answer(
  template: &ExerciseTemplate,
  content: &BTreeMap<String, Value>,
  variables: &BTreeMap<String, Value>,
) -> Answer {
  if let Some(logic) = &template.logic {
    let evaluated = format_placeholders(logic, variables)
      .ok_or_else(|| "unresolved placeholder".to_string())
      .and_then(|src| expr::eval_str(&src, variables).map_err(|e| e.to_string()));
    return match evaluated {
      Ok(v) => Answer::text(v.render()),
      Err(e) => {
        warn!(target: "exercise", template_id = %template.id, %logic, error = %e, "Logic evaluation failed");
        Answer::text(ANSWER_ERROR)
      }
    };
  }

  let Some(raw) = content.get("answer") else {
    return Answer::Scalar(Value::Null);
  };
  let options: &[Value] = match content.get("options") {
    Some(Value::Array(items)) => items,
    _ => &[],
  };

  let resolved = if options.is_empty() {
    raw.clone()
  } else {
    match raw {
      Value::Array(items) => {
        let labels: Vec<Value> = items.iter().map(|a| option_label(a, options)).collect();
        if !template.multiple && labels.len() == 1 {
          labels.into_iter().next().unwrap_or(Value::Null)
        } else {
          Value::Array(labels)
        }
      }
      other => option_label(other, options),
    }
  };

  match resolved {
    Value::Array(items) => Answer::List(items),
    other => Answer::text(value_text(&other)),
  }
}

/// Map an option index to its label; anything else is kept as-is.
fn option_label(answer: &Value, options: &[Value]) -> Value {
  match answer.as_u64().and_then(|i| options.get(i as usize)) {
    Some(label) => label.clone(),
    None => answer.clone(),
  }
}

fn text_field(content: &BTreeMap<String, Value>, key: &str) -> String {
  content.get(key).map(value_text).unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use serde_json::json;

  fn template(toml_src: &str) -> ExerciseTemplate {
    toml::from_str(toml_src).unwrap()
  }

  #[test]
  fn degenerate_ranges_generate_deterministically() {
    let tpl = template(
      r#"
id = "add"
logic = "a + b"
[vars]
a = { min = 1, max = 1 }
b = { min = 2, max = 2 }
[content]
question = "[[a]] + [[b]]"
"#,
    );
    for seed in 0..5 {
      let ex = generate(&tpl, None, &mut StdRng::seed_from_u64(seed));
      assert_eq!(ex.question, "1 + 2");
      assert_eq!(ex.answer, Answer::text("3"));
      assert_eq!(ex.kind, "input");
      assert_eq!(ex.template_id.as_deref(), Some("add"));
      assert!(ex.id.starts_with("add_"));
    }
  }

  #[test]
  fn qcm_with_multiple_becomes_multiselect() {
    let tpl = template(
      r#"
id = "pairs"
interaction = "qcm"
multiple = true
[content]
question = "Quels nombres sont pairs ?"
options = ["2", "3", "4"]
answer = [0, 2]
"#,
    );
    let ex = generate(&tpl, None, &mut rand::thread_rng());
    assert_eq!(ex.kind, "multiselect");
    assert_eq!(ex.answer, Answer::labels(["2", "4"]));
  }

  #[test]
  fn single_index_list_flattens_without_multiple() {
    let tpl = template(
      r#"
id = "capital"
interaction = "qcm"
[content]
question = "Capitale de la France ?"
options = ["Lyon", "Paris", "Nice"]
answer = [1]
"#,
    );
    let ex = generate(&tpl, None, &mut rand::thread_rng());
    assert_eq!(ex.kind, "qcm");
    assert_eq!(ex.answer, Answer::text("Paris"));
  }

  #[test]
  fn scalar_index_and_out_of_range_values() {
    let tpl = template(
      r#"
id = "idx"
interaction = "qcm"
[content]
options = ["a", "b"]
answer = 1
"#,
    );
    assert_eq!(generate(&tpl, None, &mut rand::thread_rng()).answer, Answer::text("b"));

    let tpl = template(
      r#"
id = "idx"
interaction = "qcm"
multiple = true
[content]
options = ["a", "b"]
answer = [0, 7, "z"]
"#,
    );
    assert_eq!(
      generate(&tpl, None, &mut rand::thread_rng()).answer,
      Answer::List(vec![json!("a"), json!(7), json!("z")])
    );
  }

  #[test]
  fn broken_expressions_degrade_visibly() {
    let tpl = template(
      r#"
id = "broken"
logic = "a / z"
[vars]
a = 4
z = 0
[content]
question = "Calcule [[ a / z ]] et [[ a * 2 ]] avec {missing}"
"#,
    );
    let ex = generate(&tpl, None, &mut rand::thread_rng());
    assert_eq!(ex.question, "Calcule ERR( a / z ) et 8 avec {missing}");
    assert_eq!(ex.answer, Answer::text(ANSWER_ERROR));
  }

  #[test]
  fn placeholders_inside_expressions_are_substituted_first() {
    let tpl = template(
      r#"
id = "inner"
[vars]
a = 6
[content]
question = "Double de {a} : [[ {a} * 2 ]], moitié : [[ a / 4 ]]"
"#,
    );
    let ex = generate(&tpl, None, &mut rand::thread_rng());
    assert_eq!(ex.question, "Double de 6 : 12, moitié : 1.5");
  }

  #[test]
  fn list_fields_interpolate_only_strings() {
    let tpl = template(
      r#"
id = "list"
[vars]
n = 5
[content]
options = ["[[ n + 1 ]]", 42, "{n}"]
"#,
    );
    let ex = generate(&tpl, None, &mut rand::thread_rng());
    assert_eq!(ex.options, vec![json!("6"), json!(42), json!("5")]);
  }

  #[test]
  fn latex_braces_survive_interpolation() {
    let vars: BTreeMap<String, Value> = [("n".to_string(), json!(3))].into_iter().collect();
    assert_eq!(interpolate("$\\frac{[[n]]}{4}$", &vars), "$\\frac{3}{4}$");
  }

  #[test]
  fn choice_and_fixed_vars() {
    let tpl = template(
      r#"
id = "choice"
logic = "prix * 2"
[vars]
prix = [3, 5]
objet = "stylo"
[content]
question = "Deux {objet}s à {prix} euros ?"
"#,
    );
    let ex = generate(&tpl, Some(2), &mut StdRng::seed_from_u64(7));
    let prix = ex.variables["prix"].as_i64().unwrap();
    assert!(prix == 3 || prix == 5);
    assert_eq!(ex.question, format!("Deux stylos à {} euros ?", prix));
    assert_eq!(ex.answer, Answer::text((prix * 2).to_string()));
  }

  proptest! {
    #[test]
    fn range_values_stay_within_bounds(a in -100i64..100, b in -100i64..100, seed in any::<u64>()) {
      let mut vars = BTreeMap::new();
      vars.insert("x".to_string(), VarSpec::Range { min: a, max: b });
      let tpl = ExerciseTemplate {
        id: "p".into(),
        tags: vec![],
        difficulty: 1,
        vars,
        content: BTreeMap::new(),
        logic: None,
        render_type: None,
        interaction: None,
        multiple: false,
        subject_id: String::new(),
      };
      let resolved = resolve_vars(&tpl, &mut StdRng::seed_from_u64(seed));
      let v = resolved["x"].as_i64().unwrap();
      prop_assert!(a.min(b) <= v && v <= a.max(b));
    }

    #[test]
    fn multiple_qcm_is_always_multiselect(multiple in any::<bool>(), qcm in any::<bool>()) {
      let tpl = ExerciseTemplate {
        id: "p".into(),
        tags: vec![],
        difficulty: 1,
        vars: BTreeMap::new(),
        content: BTreeMap::new(),
        logic: None,
        render_type: None,
        interaction: Some(if qcm { "qcm".into() } else { "input".into() }),
        multiple,
        subject_id: String::new(),
      };
      let ex = generate(&tpl, None, &mut rand::thread_rng());
      prop_assert_eq!(ex.kind == "multiselect", multiple && qcm);
    }
  }
}
