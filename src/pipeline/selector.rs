//! Path selectors for JSON response bodies
//!
//! A selector is a dot-delimited list of keys and array indices:
//! `id`, `.data.user.name`, `items.[0].id`, `items[0].id` and `items.0.id`
//! all work. A leading dot is optional.

use serde_json::Value as JsonValue;
use crate::errors::SelectError;

/// One step of a parsed selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Object key. Digit-only keys also index arrays.
    Key(String),
    /// Bracketed array index (`[0]`)
    Index(usize),
}

impl Segment {
    fn display(&self) -> String {
        match self {
            Segment::Key(k) => k.clone(),
            Segment::Index(i) => format!("[{}]", i),
        }
    }
}

/// Resolve `selector` against `document`
pub fn select<'a>(document: &'a JsonValue, selector: &str) -> Result<&'a JsonValue, SelectError> {
    let segments = parse_selector(selector)?;
    let mut current = document;

    for segment in &segments {
        current = step(current, segment, selector)?;
    }

    Ok(current)
}

fn step<'a>(
    current: &'a JsonValue,
    segment: &Segment,
    selector: &str,
) -> Result<&'a JsonValue, SelectError> {
    let not_found = || SelectError::NotFound {
        selector: selector.to_string(),
        segment: segment.display(),
    };

    match (current, segment) {
        (JsonValue::Object(map), Segment::Key(key)) => map.get(key).ok_or_else(not_found),
        (JsonValue::Array(items), Segment::Index(idx)) => items.get(*idx).ok_or_else(not_found),
        (JsonValue::Array(items), Segment::Key(key)) => match key.parse::<usize>() {
            Ok(idx) => items.get(idx).ok_or_else(not_found),
            Err(_) => Err(type_mismatch(current, segment, selector)),
        },
        _ => Err(type_mismatch(current, segment, selector)),
    }
}

fn type_mismatch(current: &JsonValue, segment: &Segment, selector: &str) -> SelectError {
    SelectError::TypeMismatch {
        selector: selector.to_string(),
        segment: segment.display(),
        found: type_name(current),
    }
}

/// Human-readable name of a JSON value's type
pub fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Split a selector into segments.
///
/// `.` and the empty selector select the whole document.
pub fn parse_selector(selector: &str) -> Result<Vec<Segment>, SelectError> {
    let invalid = |message: &str| SelectError::Invalid {
        selector: selector.to_string(),
        message: message.to_string(),
    };

    let trimmed = selector.trim();
    let path = trimmed.strip_prefix('.').unwrap_or(trimmed);
    if path.is_empty() {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();

    for part in path.split('.') {
        if part.is_empty() {
            return Err(invalid("empty segment"));
        }

        // A part is an optional key followed by any number of [n] indices
        let (key, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };

        if key.contains(']') {
            return Err(invalid("unexpected ']'"));
        }
        if !key.is_empty() {
            segments.push(Segment::Key(key.to_string()));
        }

        while !rest.is_empty() {
            let inner = rest.strip_prefix('[').ok_or_else(|| invalid("expected '['"))?;
            let close = inner.find(']').ok_or_else(|| invalid("unclosed '['"))?;
            let index = inner[..close].trim();
            let index = index
                .parse::<usize>()
                .map_err(|_| invalid(&format!("array index '{}' is not a non-negative integer", index)))?;
            segments.push(Segment::Index(index));
            rest = &inner[close + 1..];
        }
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_key() {
        let doc = json!({"foo": "bar"});
        assert_eq!(select(&doc, "foo").unwrap(), &json!("bar"));
        assert_eq!(select(&doc, ".foo").unwrap(), &json!("bar"));
    }

    #[test]
    fn test_nested_key() {
        let doc = json!({"foo": {"bar": "baz"}});
        assert_eq!(select(&doc, "foo.bar").unwrap(), &json!("baz"));
        assert_eq!(select(&doc, ".foo.bar").unwrap(), &json!("baz"));
    }

    #[test]
    fn test_array_index_forms() {
        let doc = json!({"items": [{"id": 1}, {"id": 2}]});
        assert_eq!(select(&doc, "items.[1].id").unwrap(), &json!(2));
        assert_eq!(select(&doc, "items[1].id").unwrap(), &json!(2));
        assert_eq!(select(&doc, "items.1.id").unwrap(), &json!(2));

        let top = json!([10, 20]);
        assert_eq!(select(&top, ".[0]").unwrap(), &json!(10));
        assert_eq!(select(&top, "[1]").unwrap(), &json!(20));
    }

    #[test]
    fn test_nested_indices() {
        let doc = json!({"grid": [[1, 2], [3, 4]]});
        assert_eq!(select(&doc, "grid[1][0]").unwrap(), &json!(3));
    }

    #[test]
    fn test_whole_document() {
        let doc = json!({"a": 1});
        assert_eq!(select(&doc, ".").unwrap(), &doc);
        assert_eq!(select(&doc, "").unwrap(), &doc);
    }

    #[test]
    fn test_null_value_is_found() {
        let doc = json!({"deleted_at": null});
        assert_eq!(select(&doc, "deleted_at").unwrap(), &JsonValue::Null);
    }

    #[test]
    fn test_missing_key() {
        let doc = json!({"foo": "bar"});
        let err = select(&doc, "missing").unwrap_err();
        assert_eq!(err, SelectError::NotFound {
            selector: "missing".to_string(),
            segment: "missing".to_string(),
        });

        let doc = json!({"items": [1]});
        assert!(matches!(select(&doc, "items.[3]"), Err(SelectError::NotFound { .. })));
    }

    #[test]
    fn test_type_mismatch() {
        let doc = json!({"foo": "bar"});
        let err = select(&doc, "foo.bar").unwrap_err();
        assert!(matches!(err, SelectError::TypeMismatch { found: "a string", .. }));

        let doc = json!({"obj": {"a": 1}});
        assert!(matches!(select(&doc, "obj[0]"), Err(SelectError::TypeMismatch { .. })));

        let doc = json!({"list": [1]});
        assert!(matches!(select(&doc, "list.name"), Err(SelectError::TypeMismatch { .. })));
    }

    #[test]
    fn test_invalid_selectors() {
        assert!(matches!(parse_selector("foo..bar"), Err(SelectError::Invalid { .. })));
        assert!(matches!(parse_selector("foo[0"), Err(SelectError::Invalid { .. })));
        assert!(matches!(parse_selector("foo[x]"), Err(SelectError::Invalid { .. })));
        assert!(matches!(parse_selector("foo[0]bar"), Err(SelectError::Invalid { .. })));
    }

    #[test]
    fn test_parse_segments() {
        assert_eq!(parse_selector(".a.[2].b").unwrap(), vec![
            Segment::Key("a".to_string()),
            Segment::Index(2),
            Segment::Key("b".to_string()),
        ]);
    }
}
