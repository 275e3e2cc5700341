//! Small utility helpers used across modules.

use std::collections::BTreeMap;

use serde_json::Value;

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values;
/// unknown placeholders are left untouched.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Strict `{name}` substitution from resolved variables.
///
/// `{{` and `}}` stand for literal braces. Returns `None` as soon as one
/// placeholder is unknown or a brace is unbalanced, so callers can keep the
/// original text instead of a half-substituted one.
pub fn format_placeholders(tpl: &str, vars: &BTreeMap<String, Value>) -> Option<String> {
  let mut out = String::with_capacity(tpl.len());
  let mut chars = tpl.chars().peekable();

  while let Some(c) = chars.next() {
    match c {
      '{' if chars.peek() == Some(&'{') => {
        chars.next();
        out.push('{');
      }
      '}' if chars.peek() == Some(&'}') => {
        chars.next();
        out.push('}');
      }
      '{' => {
        let mut name = String::new();
        loop {
          match chars.next() {
            Some('}') => break,
            Some(ch) => name.push(ch),
            None => return None,
          }
        }
        let value = vars.get(name.trim())?;
        out.push_str(&value_text(value));
      }
      '}' => return None,
      _ => out.push(c),
    }
  }
  Some(out)
}

/// Text form of a JSON value as shown to learners.
pub fn value_text(v: &Value) -> String {
  match v {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    Value::Number(n) => n.to_string(),
    other => other.to_string(),
  }
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge answer payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}
