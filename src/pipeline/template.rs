//! `{{ name }}` placeholder expansion
//!
//! Placeholders are replaced with the canonical string form of a variable.
//! JSON bodies are expanded leaf by leaf, so substituted text never has to
//! be re-parsed as JSON.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};

use super::compare::canonical_string;
use crate::errors::TemplateError;

/// Variable environment shared by the requests of one run
pub type Variables = IndexMap<String, JsonValue>;

static VAR_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").expect("valid variable name regex")
});

/// What to do when a placeholder names an unknown variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UndefinedVariables {
    /// Fail the substitution
    #[default]
    Error,
    /// Render as the empty string
    Empty,
}

/// A placeholder found in a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub span: std::ops::Range<usize>,
}

/// Find every placeholder in `template`
pub fn placeholders(template: &str) -> Result<Vec<Placeholder>, TemplateError> {
    let mut found = Vec::new();
    let mut offset = 0;

    while let Some(start) = template[offset..].find("{{").map(|p| p + offset) {
        let inner_start = start + 2;
        let close = template[inner_start..].find("}}").ok_or_else(|| TemplateError::Malformed {
            position: start,
            message: "missing closing '}}'".to_string(),
        })?;
        let end = inner_start + close + 2;
        let name = template[inner_start..inner_start + close].trim();

        if !VAR_NAME_RE.is_match(name) {
            return Err(TemplateError::Malformed {
                position: start,
                message: if name.is_empty() {
                    "empty variable name".to_string()
                } else {
                    format!("invalid variable name '{}'", name)
                },
            });
        }

        found.push(Placeholder { name: name.to_string(), span: start..end });
        offset = end;
    }

    Ok(found)
}

/// Expand every placeholder in `template`
pub fn substitute(
    template: &str,
    variables: &Variables,
    policy: UndefinedVariables,
) -> Result<String, TemplateError> {
    if !template.contains("{{") {
        return Ok(template.to_string());
    }

    let mut output = String::with_capacity(template.len());
    let mut last = 0;

    for placeholder in placeholders(template)? {
        output.push_str(&template[last..placeholder.span.start]);
        match variables.get(&placeholder.name) {
            Some(value) => output.push_str(&canonical_string(value)),
            None => match policy {
                UndefinedVariables::Error => {
                    return Err(TemplateError::Undefined { name: placeholder.name });
                }
                UndefinedVariables::Empty => {}
            },
        }
        last = placeholder.span.end;
    }

    output.push_str(&template[last..]);
    Ok(output)
}

/// Expand placeholders in every string of a JSON tree (keys included)
pub fn substitute_value(
    value: &JsonValue,
    variables: &Variables,
    policy: UndefinedVariables,
) -> Result<JsonValue, TemplateError> {
    Ok(match value {
        JsonValue::String(s) => JsonValue::String(substitute(s, variables, policy)?),
        JsonValue::Array(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| substitute_value(item, variables, policy))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        JsonValue::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(
                    substitute(key, variables, policy)?,
                    substitute_value(item, variables, policy)?,
                );
            }
            JsonValue::Object(out)
        }
        other => other.clone(),
    })
}

/// Like [`substitute_value`], except a string that is exactly one
/// placeholder takes the variable's own JSON value, keeping its type for
/// strict comparisons
pub fn substitute_expected(
    value: &JsonValue,
    variables: &Variables,
    policy: UndefinedVariables,
) -> Result<JsonValue, TemplateError> {
    match value {
        JsonValue::String(s) => {
            if let [only] = placeholders(s)?.as_slice() {
                if only.span == (0..s.len()) {
                    if let Some(found) = variables.get(&only.name) {
                        return Ok(found.clone());
                    }
                }
            }
            substitute_value(value, variables, policy)
        }
        JsonValue::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(key.clone(), substitute_expected(item, variables, policy)?);
            }
            Ok(JsonValue::Object(out))
        }
        other => substitute_value(other, variables, policy),
    }
}

/// Expand placeholders in the values of a header map
pub fn substitute_headers(
    headers: &IndexMap<String, String>,
    variables: &Variables,
    policy: UndefinedVariables,
) -> Result<IndexMap<String, String>, TemplateError> {
    headers
        .iter()
        .map(|(name, value)| Ok((name.clone(), substitute(value, variables, policy)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> Variables {
        let mut v = Variables::new();
        v.insert("host".to_string(), json!("localhost:8000"));
        v.insert("id".to_string(), json!(42));
        v.insert("quote".to_string(), json!("say \"hi\""));
        v.insert("flag".to_string(), json!(true));
        v
    }

    #[test]
    fn test_substitute_url() {
        let out = substitute("http://{{host}}/todos/{{ id }}", &vars(), UndefinedVariables::Error).unwrap();
        assert_eq!(out, "http://localhost:8000/todos/42");
    }

    #[test]
    fn test_no_placeholders_unchanged() {
        for s in ["", "plain text", "{ single }", "a } b { c", "json {\"a\": 1}"] {
            assert_eq!(substitute(s, &vars(), UndefinedVariables::Error).unwrap(), s);
        }
    }

    #[test]
    fn test_undefined_variable_error() {
        let err = substitute("{{ missing }}", &vars(), UndefinedVariables::Error).unwrap_err();
        assert_eq!(err, TemplateError::Undefined { name: "missing".to_string() });
    }

    #[test]
    fn test_undefined_variable_empty() {
        let out = substitute("a{{missing}}b", &vars(), UndefinedVariables::Empty).unwrap();
        assert_eq!(out, "ab");
    }

    #[test]
    fn test_malformed_placeholders() {
        assert!(matches!(
            substitute("{{ id", &vars(), UndefinedVariables::Error),
            Err(TemplateError::Malformed { position: 0, .. })
        ));
        assert!(matches!(
            substitute("x {{ }}", &vars(), UndefinedVariables::Error),
            Err(TemplateError::Malformed { position: 2, .. })
        ));
        assert!(matches!(
            substitute("{{ a b }}", &vars(), UndefinedVariables::Error),
            Err(TemplateError::Malformed { .. })
        ));
    }

    #[test]
    fn test_substitute_value_keeps_json_intact() {
        let body = json!({
            "title": "{{quote}}",
            "nested": {"ids": ["{{id}}", 7], "enabled": "{{flag}}"},
            "count": 3
        });
        let out = substitute_value(&body, &vars(), UndefinedVariables::Error).unwrap();
        assert_eq!(out, json!({
            "title": "say \"hi\"",
            "nested": {"ids": ["42", 7], "enabled": "true"},
            "count": 3
        }));
    }

    #[test]
    fn test_substitute_expected_keeps_type() {
        let v = vars();
        let policy = UndefinedVariables::Error;

        assert_eq!(substitute_expected(&json!("{{ id }}"), &v, policy).unwrap(), json!(42));
        assert_eq!(substitute_expected(&json!("{{flag}}"), &v, policy).unwrap(), json!(true));
        assert_eq!(substitute_expected(&json!("#{{ id }}"), &v, policy).unwrap(), json!("#42"));
        assert_eq!(
            substitute_expected(&json!({"gt": "{{ id }}", "exists": true}), &v, policy).unwrap(),
            json!({"gt": 42, "exists": true})
        );
        assert_eq!(
            substitute_expected(&json!("{{ nope }}"), &v, UndefinedVariables::Empty).unwrap(),
            json!("")
        );
        assert!(substitute_expected(&json!("{{ nope }}"), &v, policy).is_err());
    }

    #[test]
    fn test_substitute_headers() {
        let mut headers = IndexMap::new();
        headers.insert("X-Todo".to_string(), "{{id}}".to_string());
        let out = substitute_headers(&headers, &vars(), UndefinedVariables::Error).unwrap();
        assert_eq!(out["X-Todo"], "42");
    }

    #[test]
    fn test_placeholder_spans() {
        let found = placeholders("a {{x}} b {{ y.z }}").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].span, 2..7);
        assert_eq!(found[1].name, "y.z");
    }
}
