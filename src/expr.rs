//! Sandboxed expression language embedded in exercise templates.
//!
//! Only numeric literals, the resolved template variables, and
//! arithmetic/comparison/boolean operators exist. There are no function calls,
//! no member access and no way to reach anything outside the bindings.
//!
//! Precedence, lowest first: `or`, `and`, `not`, comparisons, `+ -`,
//! `* / // %`, unary `- +`, `**` (right associative).

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// Nesting limit for parentheses and unary chains.
const MAX_DEPTH: usize = 64;

/// Binary operators supported in expressions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
  Add,
  Sub,
  Mul,
  Div,
  FloorDiv,
  Mod,
  Pow,
  Gt,
  Lt,
  Gte,
  Lte,
  Eq,
  Neq,
  And,
  Or,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
  Neg,
  Pos,
  Not,
}

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Literal(f64),
  Var(String),
  BinOp {
    op: BinOp,
    left: Box<Expr>,
    right: Box<Expr>,
  },
  UnaryOp {
    op: UnaryOp,
    operand: Box<Expr>,
  },
}

/// Runtime value of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
  Num(f64),
  Bool(bool),
  Text(String),
}

impl Scalar {
  fn from_json(v: &Value) -> Option<Self> {
    match v {
      Value::Number(n) => n.as_f64().map(Scalar::Num),
      Value::Bool(b) => Some(Scalar::Bool(*b)),
      Value::String(s) => Some(Scalar::Text(s.clone())),
      _ => None,
    }
  }

  fn truthy(&self) -> bool {
    match self {
      Scalar::Num(n) => *n != 0.0,
      Scalar::Bool(b) => *b,
      Scalar::Text(s) => !s.is_empty(),
    }
  }

  fn as_num(&self) -> Option<f64> {
    match self {
      Scalar::Num(n) => Some(*n),
      Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
      Scalar::Text(_) => None,
    }
  }

  /// Display form used in rendered exercises: integral numbers print without
  /// a fractional part, other numbers are rounded to two decimals.
  pub fn render(&self) -> String {
    match self {
      Scalar::Num(n) => format_number(*n),
      Scalar::Bool(b) => b.to_string(),
      Scalar::Text(s) => s.clone(),
    }
  }
}

pub fn format_number(n: f64) -> String {
  if n.fract() == 0.0 && n.abs() < 1e15 {
    format!("{}", n as i64)
  } else {
    let rounded = (n * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 && rounded.abs() < 1e15 {
      format!("{}", rounded as i64)
    } else {
      format!("{}", rounded)
    }
  }
}

/// Error type for expression parsing
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
  pub message: String,
}

impl ParseError {
  fn new(message: impl Into<String>) -> Self {
    Self { message: message.into() }
  }
}

impl fmt::Display for ParseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Parse error: {}", self.message)
  }
}

impl std::error::Error for ParseError {}

/// Error type for expression evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
  UnknownVar(String),
  UnsupportedValue(String),
  DivisionByZero,
  TypeMismatch { op: BinOp },
  NonFinite,
}

impl fmt::Display for EvalError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EvalError::UnknownVar(name) => write!(f, "Unknown variable: {}", name),
      EvalError::UnsupportedValue(name) => write!(f, "Variable {} is not a number, text or boolean", name),
      EvalError::DivisionByZero => write!(f, "Division by zero"),
      EvalError::TypeMismatch { op } => write!(f, "Operand types not supported for {:?}", op),
      EvalError::NonFinite => write!(f, "Result is not a finite number"),
    }
  }
}

impl std::error::Error for EvalError {}

#[derive(Debug, thiserror::Error)]
pub enum ExprError {
  #[error(transparent)]
  Parse(#[from] ParseError),
  #[error(transparent)]
  Eval(#[from] EvalError),
}

/// Parse and evaluate `source` against the resolved template variables.
pub fn eval_str(source: &str, vars: &BTreeMap<String, Value>) -> Result<Scalar, ExprError> {
  let expr = Expr::parse(source)?;
  Ok(expr.evaluate(vars)?)
}

// -------- Tokenizer --------

#[derive(Debug, Clone, PartialEq)]
enum Token {
  Num(f64),
  Ident(String),
  Op(&'static str),
  LParen,
  RParen,
}

const OPERATORS: [&str; 17] = [
  "**", "//", "==", "!=", "<=", ">=", "&&", "||", "+", "-", "*", "/", "%", "<", ">", "!", "=",
];

fn tokenize(src: &str) -> Result<Vec<Token>, ParseError> {
  let chars: Vec<char> = src.chars().collect();
  let mut tokens = Vec::new();
  let mut i = 0;

  while i < chars.len() {
    let c = chars[i];
    if c.is_whitespace() {
      i += 1;
      continue;
    }
    if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) {
      let start = i;
      while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
        i += 1;
      }
      let text: String = chars[start..i].iter().collect();
      let n = text
        .parse::<f64>()
        .map_err(|_| ParseError::new(format!("invalid number '{}'", text)))?;
      tokens.push(Token::Num(n));
      continue;
    }
    if c.is_alphabetic() || c == '_' {
      let start = i;
      while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
        i += 1;
      }
      tokens.push(Token::Ident(chars[start..i].iter().collect()));
      continue;
    }
    match c {
      '(' => {
        tokens.push(Token::LParen);
        i += 1;
        continue;
      }
      ')' => {
        tokens.push(Token::RParen);
        i += 1;
        continue;
      }
      _ => {}
    }
    let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
    match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
      // A lone '=' is assignment, which does not exist here.
      Some(&"=") | None => return Err(ParseError::new(format!("unexpected character '{}'", c))),
      Some(op) => {
        tokens.push(Token::Op(op));
        i += op.len();
      }
    }
  }
  Ok(tokens)
}

// -------- Parser --------

struct Parser {
  tokens: Vec<Token>,
  pos: usize,
  depth: usize,
}

impl Parser {
  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn next(&mut self) -> Option<Token> {
    let t = self.tokens.get(self.pos).cloned();
    self.pos += 1;
    t
  }

  fn eat_op(&mut self, candidates: &[&str]) -> Option<&'static str> {
    if let Some(Token::Op(op)) = self.peek() {
      if candidates.contains(op) {
        let op = *op;
        self.pos += 1;
        return Some(op);
      }
    }
    None
  }

  fn eat_keyword(&mut self, word: &str) -> bool {
    if matches!(self.peek(), Some(Token::Ident(w)) if w == word) {
      self.pos += 1;
      true
    } else {
      false
    }
  }

  fn enter(&mut self) -> Result<(), ParseError> {
    self.depth += 1;
    if self.depth > MAX_DEPTH {
      return Err(ParseError::new("expression nested too deeply"));
    }
    Ok(())
  }

  fn or_expr(&mut self) -> Result<Expr, ParseError> {
    let mut left = self.and_expr()?;
    while self.eat_keyword("or") || self.eat_op(&["||"]).is_some() {
      let right = self.and_expr()?;
      left = bin(BinOp::Or, left, right);
    }
    Ok(left)
  }

  fn and_expr(&mut self) -> Result<Expr, ParseError> {
    let mut left = self.not_expr()?;
    while self.eat_keyword("and") || self.eat_op(&["&&"]).is_some() {
      let right = self.not_expr()?;
      left = bin(BinOp::And, left, right);
    }
    Ok(left)
  }

  fn not_expr(&mut self) -> Result<Expr, ParseError> {
    if self.eat_keyword("not") || self.eat_op(&["!"]).is_some() {
      self.enter()?;
      let operand = self.not_expr()?;
      self.depth -= 1;
      return Ok(Expr::UnaryOp { op: UnaryOp::Not, operand: Box::new(operand) });
    }
    self.comparison()
  }

  fn comparison(&mut self) -> Result<Expr, ParseError> {
    let mut left = self.additive()?;
    while let Some(op) = self.eat_op(&["==", "!=", "<=", ">=", "<", ">"]) {
      let op = match op {
        "==" => BinOp::Eq,
        "!=" => BinOp::Neq,
        "<=" => BinOp::Lte,
        ">=" => BinOp::Gte,
        "<" => BinOp::Lt,
        _ => BinOp::Gt,
      };
      let right = self.additive()?;
      left = bin(op, left, right);
    }
    Ok(left)
  }

  fn additive(&mut self) -> Result<Expr, ParseError> {
    let mut left = self.multiplicative()?;
    while let Some(op) = self.eat_op(&["+", "-"]) {
      let op = if op == "+" { BinOp::Add } else { BinOp::Sub };
      let right = self.multiplicative()?;
      left = bin(op, left, right);
    }
    Ok(left)
  }

  fn multiplicative(&mut self) -> Result<Expr, ParseError> {
    let mut left = self.unary()?;
    while let Some(op) = self.eat_op(&["*", "//", "/", "%"]) {
      let op = match op {
        "*" => BinOp::Mul,
        "//" => BinOp::FloorDiv,
        "/" => BinOp::Div,
        _ => BinOp::Mod,
      };
      let right = self.unary()?;
      left = bin(op, left, right);
    }
    Ok(left)
  }

  fn unary(&mut self) -> Result<Expr, ParseError> {
    if let Some(op) = self.eat_op(&["-", "+"]) {
      self.enter()?;
      let operand = self.unary()?;
      self.depth -= 1;
      let op = if op == "-" { UnaryOp::Neg } else { UnaryOp::Pos };
      return Ok(Expr::UnaryOp { op, operand: Box::new(operand) });
    }
    self.power()
  }

  fn power(&mut self) -> Result<Expr, ParseError> {
    let base = self.atom()?;
    if self.eat_op(&["**"]).is_some() {
      self.enter()?;
      let exponent = self.unary()?;
      self.depth -= 1;
      return Ok(bin(BinOp::Pow, base, exponent));
    }
    Ok(base)
  }

  fn atom(&mut self) -> Result<Expr, ParseError> {
    match self.next() {
      Some(Token::Num(n)) => Ok(Expr::Literal(n)),
      Some(Token::Ident(name)) => {
        if matches!(name.as_str(), "and" | "or" | "not") {
          return Err(ParseError::new(format!("unexpected keyword '{}'", name)));
        }
        Ok(Expr::Var(name))
      }
      Some(Token::LParen) => {
        self.enter()?;
        let inner = self.or_expr()?;
        self.depth -= 1;
        match self.next() {
          Some(Token::RParen) => Ok(inner),
          _ => Err(ParseError::new("missing closing parenthesis")),
        }
      }
      Some(t) => Err(ParseError::new(format!("unexpected token {:?}", t))),
      None => Err(ParseError::new("unexpected end of expression")),
    }
  }
}

fn bin(op: BinOp, left: Expr, right: Expr) -> Expr {
  Expr::BinOp { op, left: Box::new(left), right: Box::new(right) }
}

impl Expr {
  pub fn parse(src: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
      return Err(ParseError::new("empty expression"));
    }
    let mut parser = Parser { tokens, pos: 0, depth: 0 };
    let expr = parser.or_expr()?;
    if let Some(t) = parser.peek() {
      return Err(ParseError::new(format!("unexpected trailing token {:?}", t)));
    }
    Ok(expr)
  }

  pub fn evaluate(&self, vars: &BTreeMap<String, Value>) -> Result<Scalar, EvalError> {
    match self {
      Expr::Literal(n) => Ok(Scalar::Num(*n)),
      Expr::Var(name) => {
        let raw = vars.get(name).ok_or_else(|| EvalError::UnknownVar(name.clone()))?;
        Scalar::from_json(raw).ok_or_else(|| EvalError::UnsupportedValue(name.clone()))
      }
      Expr::UnaryOp { op, operand } => {
        let v = operand.evaluate(vars)?;
        match op {
          UnaryOp::Not => Ok(Scalar::Bool(!v.truthy())),
          UnaryOp::Neg => v.as_num().map(|n| Scalar::Num(-n)).ok_or(EvalError::TypeMismatch { op: BinOp::Sub }),
          UnaryOp::Pos => v.as_num().map(Scalar::Num).ok_or(EvalError::TypeMismatch { op: BinOp::Add }),
        }
      }
      Expr::BinOp { op: BinOp::And, left, right } => {
        let l = left.evaluate(vars)?;
        if l.truthy() { right.evaluate(vars) } else { Ok(l) }
      }
      Expr::BinOp { op: BinOp::Or, left, right } => {
        let l = left.evaluate(vars)?;
        if l.truthy() { Ok(l) } else { right.evaluate(vars) }
      }
      Expr::BinOp { op, left, right } => {
        let l = left.evaluate(vars)?;
        let r = right.evaluate(vars)?;
        apply(*op, l, r)
      }
    }
  }
}

fn apply(op: BinOp, l: Scalar, r: Scalar) -> Result<Scalar, EvalError> {
  match (op, &l, &r) {
    (BinOp::Add, Scalar::Text(a), Scalar::Text(b)) => return Ok(Scalar::Text(format!("{}{}", a, b))),
    (BinOp::Eq, _, _) => return Ok(Scalar::Bool(loose_eq(&l, &r))),
    (BinOp::Neq, _, _) => return Ok(Scalar::Bool(!loose_eq(&l, &r))),
    (BinOp::Lt | BinOp::Lte | BinOp::Gt | BinOp::Gte, Scalar::Text(a), Scalar::Text(b)) => {
      return Ok(Scalar::Bool(compare(op, a.cmp(b))));
    }
    _ => {}
  }

  let (a, b) = match (l.as_num(), r.as_num()) {
    (Some(a), Some(b)) => (a, b),
    _ => return Err(EvalError::TypeMismatch { op }),
  };

  let n = match op {
    BinOp::Add => a + b,
    BinOp::Sub => a - b,
    BinOp::Mul => a * b,
    BinOp::Div => {
      if b == 0.0 { return Err(EvalError::DivisionByZero); }
      a / b
    }
    BinOp::FloorDiv => {
      if b == 0.0 { return Err(EvalError::DivisionByZero); }
      (a / b).floor()
    }
    BinOp::Mod => {
      if b == 0.0 { return Err(EvalError::DivisionByZero); }
      // Result takes the sign of the divisor.
      a - b * (a / b).floor()
    }
    BinOp::Pow => a.powf(b),
    BinOp::Lt | BinOp::Lte | BinOp::Gt | BinOp::Gte => {
      let ord = a.partial_cmp(&b).ok_or(EvalError::NonFinite)?;
      return Ok(Scalar::Bool(compare(op, ord)));
    }
    BinOp::Eq | BinOp::Neq | BinOp::And | BinOp::Or => unreachable!("handled above"),
  };

  if n.is_finite() { Ok(Scalar::Num(n)) } else { Err(EvalError::NonFinite) }
}

fn loose_eq(l: &Scalar, r: &Scalar) -> bool {
  match (l, r) {
    (Scalar::Text(a), Scalar::Text(b)) => a == b,
    (Scalar::Text(_), _) | (_, Scalar::Text(_)) => false,
    _ => l.as_num() == r.as_num(),
  }
}

fn compare(op: BinOp, ord: std::cmp::Ordering) -> bool {
  use std::cmp::Ordering::*;
  match op {
    BinOp::Lt => ord == Less,
    BinOp::Lte => ord != Greater,
    BinOp::Gt => ord == Greater,
    BinOp::Gte => ord != Less,
    _ => false,
  }
}
