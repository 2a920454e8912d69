//! Value comparison rules
//!
//! Compares a value received in a response with the value a test set
//! expects. Loose equality compares canonical string forms, so `123`
//! equals `"123"`. Strict equality also requires the JSON types to match.

use std::fmt;
use std::str::FromStr;
use serde_json::Value as JsonValue;
use crate::errors::CompareError;

/// Integral floats below this magnitude render without a fraction
const INTEGRAL_FLOAT_LIMIT: f64 = 1e15;

/// A comparison rule usable in an expectation rule-set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    Equals,
    Lt,
    Gt,
    Le,
    Ge,
    Exists,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::Equals => "equals",
            Rule::Lt => "lt",
            Rule::Gt => "gt",
            Rule::Le => "le",
            Rule::Ge => "ge",
            Rule::Exists => "exists",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Rule::Equals => "equal to",
            Rule::Lt => "less than",
            Rule::Gt => "greater than",
            Rule::Le => "less than or equal to",
            Rule::Ge => "greater than or equal to",
            Rule::Exists => "present",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rule {
    type Err = CompareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" => Ok(Rule::Equals),
            "lt" => Ok(Rule::Lt),
            "gt" => Ok(Rule::Gt),
            "le" => Ok(Rule::Le),
            "ge" => Ok(Rule::Ge),
            "exists" => Ok(Rule::Exists),
            other => Err(CompareError::InvalidRule(other.to_string())),
        }
    }
}

/// Equality semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareMode {
    /// Compare canonical string forms
    #[default]
    Loose,
    /// Require matching JSON type and value
    Strict,
}

impl CompareMode {
    pub fn from_strict(strict: bool) -> Self {
        if strict { CompareMode::Strict } else { CompareMode::Loose }
    }
}

/// Compare `received` against `comparison` under `rule`.
///
/// Returns `Ok(false)` when the comparison does not hold. Numeric rules fail
/// with [`CompareError::Parse`] when an operand is not a number.
pub fn compare(
    rule: Rule,
    received: &JsonValue,
    comparison: &JsonValue,
    mode: CompareMode,
) -> Result<bool, CompareError> {
    match rule {
        Rule::Equals => Ok(match mode {
            CompareMode::Loose => loose_equals(received, comparison),
            CompareMode::Strict => strict_equals(received, comparison),
        }),
        Rule::Lt => numeric(received, comparison, |a, b| a < b),
        Rule::Gt => numeric(received, comparison, |a, b| a > b),
        Rule::Le => numeric(received, comparison, |a, b| a <= b),
        Rule::Ge => numeric(received, comparison, |a, b| a >= b),
        // The selector has already resolved the key by the time a rule runs
        Rule::Exists => Ok(true),
    }
}

/// Compare by rule name, for rule-sets read from a test set
pub fn compare_named(
    rule: &str,
    received: &JsonValue,
    comparison: &JsonValue,
    mode: CompareMode,
) -> Result<bool, CompareError> {
    let rule: Rule = rule.parse()?;
    compare(rule, received, comparison, mode)
}

/// Message describing a comparison that did not hold
pub fn mismatch_message(rule: Rule, received: &JsonValue, comparison: &JsonValue) -> String {
    match rule {
        Rule::Equals => format!(
            "expected: {} received: {}",
            canonical_string(comparison),
            canonical_string(received)
        ),
        _ => format!(
            "expected {} {} {}",
            canonical_string(received),
            rule.describe(),
            canonical_string(comparison)
        ),
    }
}

/// Loose equality on canonical string forms
pub fn loose_equals(a: &JsonValue, b: &JsonValue) -> bool {
    canonical_string(a) == canonical_string(b)
}

/// Strict equality: same JSON type and equal value
pub fn strict_equals(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x == y;
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x == y;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (JsonValue::String(x), JsonValue::String(y)) => x == y,
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x == y,
        (JsonValue::Null, JsonValue::Null) => true,
        (JsonValue::Array(x), JsonValue::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| strict_equals(a, b))
        }
        (JsonValue::Object(x), JsonValue::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).is_some_and(|other| strict_equals(v, other)))
        }
        _ => false,
    }
}

/// Render a value to its canonical string form.
///
/// - strings: raw text, no quotes
/// - booleans: `true` / `false`; null: `null`
/// - integers: decimal digits
/// - floats: integral values below 1e15 without a fraction (`100.0` -> `100`),
///   otherwise the shortest round-trip decimal from `f64`'s `Display`
/// - arrays and objects: compact JSON
pub fn canonical_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Null => "null".to_string(),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                format_float(f)
            }
        }
        JsonValue::Array(_) | JsonValue::Object(_) => value.to_string(),
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < INTEGRAL_FLOAT_LIMIT {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

fn numeric<F>(received: &JsonValue, comparison: &JsonValue, cmp: F) -> Result<bool, CompareError>
where
    F: Fn(f64, f64) -> bool,
{
    let a = as_float(received)?;
    let b = as_float(comparison)?;
    Ok(cmp(a, b))
}

/// Parse a value as `f64` through its canonical string form
pub fn as_float(value: &JsonValue) -> Result<f64, CompareError> {
    let s = canonical_string(value);
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|f| !f.is_nan())
        .ok_or(CompareError::Parse { value: s })
}
