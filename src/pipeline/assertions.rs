//! Response assertions
//!
//! Checks a response's status code and body fields against a request's
//! expectation. Every check runs; failures are collected, not raised.

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use super::compare::{self, CompareMode, Rule};
use super::executor::RawResponse;
use super::selector;
use super::testset::Expectation;
use crate::errors::ApitestError;

/// Selector name used for status code failures
pub const STATUS_SELECTOR: &str = "status";

/// What to do with field checks when the response is not JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NonJsonPolicy {
    /// Skip field checks with a warning; only the status counts
    #[default]
    Skip,
    /// Fail the request with a non-JSON error
    Fail,
}

/// A single check that did not hold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssertionFailure {
    pub selector: String,
    pub rule: String,
    pub expected: JsonValue,
    /// Absent when the selector did not resolve
    pub received: Option<JsonValue>,
    pub message: String,
}

impl AssertionFailure {
    fn new(selector: &str, rule: &str, expected: &JsonValue, received: Option<&JsonValue>, message: String) -> Self {
        Self {
            selector: selector.to_string(),
            rule: rule.to_string(),
            expected: expected.clone(),
            received: received.cloned(),
            message,
        }
    }
}

/// Outcome of checking one response
#[derive(Debug, Default)]
pub struct Evaluation {
    pub status_matched: bool,
    pub failures: Vec<AssertionFailure>,
    /// Set when the response was not JSON and the policy is [`NonJsonPolicy::Fail`]
    pub error: Option<ApitestError>,
    /// Decoded body, when the response is JSON
    pub document: Option<JsonValue>,
    /// Why a body labelled as JSON could not be decoded
    pub decode_error: Option<String>,
    /// Number of field checks that were skipped
    pub skipped_checks: usize,
}

impl Evaluation {
    pub fn passed(&self) -> bool {
        self.status_matched && self.failures.is_empty() && self.error.is_none()
    }
}

/// Whether a Content-Type header denotes a JSON body
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };

    match content_type.parse::<mime::Mime>() {
        Ok(m) => {
            (m.type_() == mime::APPLICATION && m.subtype() == mime::JSON)
                || m.suffix() == Some(mime::JSON)
        }
        Err(_) => content_type.contains("application/json"),
    }
}

/// Check `response` against `expectation`
pub fn evaluate(expectation: &Expectation, response: &RawResponse, policy: NonJsonPolicy) -> Evaluation {
    let mut evaluation = Evaluation::default();

    // Status mismatches are recorded but do not stop the field checks
    evaluation.status_matched = response.status == expectation.status;
    if !evaluation.status_matched {
        evaluation.failures.push(AssertionFailure::new(
            STATUS_SELECTOR,
            Rule::Equals.as_str(),
            &JsonValue::from(expectation.status),
            Some(&JsonValue::from(response.status)),
            format!("expected: {} received: {}", expectation.status, response.status),
        ));
    }

    let checks = expectation.values.len();

    if !is_json_content_type(response.content_type()) {
        let content_type = response.content_type().unwrap_or("none").to_string();
        if checks > 0 {
            match policy {
                NonJsonPolicy::Skip => {
                    warn!(content_type = %content_type, checks, "response is not JSON, skipping field checks");
                    evaluation.skipped_checks = checks;
                }
                NonJsonPolicy::Fail => {
                    evaluation.error = Some(ApitestError::NonJsonResponse { content_type, checks });
                }
            }
        }
        return evaluation;
    }

    let document = match serde_json::from_slice::<JsonValue>(&response.body) {
        Ok(doc) => doc,
        Err(e) => {
            for (selector, expected) in &expectation.values {
                evaluation.failures.push(AssertionFailure::new(
                    selector,
                    Rule::Equals.as_str(),
                    expected,
                    None,
                    format!("could not decode response body: {}", e),
                ));
            }
            evaluation.decode_error = Some(e.to_string());
            return evaluation;
        }
    };

    let mode = CompareMode::from_strict(expectation.strict);
    for (selector, expected) in &expectation.values {
        evaluation.failures.extend(check_field(&document, selector, expected, mode));
    }

    evaluation.document = Some(document);
    evaluation
}

/// Check one selector; a non-empty mapping as expected value is a
/// rule-set, while `{}` is compared for equality
pub fn check_field(
    document: &JsonValue,
    selector: &str,
    expected: &JsonValue,
    mode: CompareMode,
) -> Vec<AssertionFailure> {
    let rules: Vec<(&str, &JsonValue)> = match expected {
        JsonValue::Object(rules) if !rules.is_empty() => {
            rules.iter().map(|(k, v)| (k.as_str(), v)).collect()
        }
        other => vec![(Rule::Equals.as_str(), other)],
    };

    let received = match selector::select(document, selector) {
        Ok(value) => value,
        Err(e) => {
            let rule = if rules.len() == 1 { rules[0].0 } else { "select" };
            return vec![AssertionFailure::new(selector, rule, expected, None, e.to_string())];
        }
    };

    let mut failures = Vec::new();
    for (rule_name, comparison) in rules {
        let outcome = rule_name
            .parse::<Rule>()
            .and_then(|rule| compare::compare(rule, received, comparison, mode).map(|ok| (rule, ok)));

        match outcome {
            Ok((_, true)) => {
                debug!(selector, rule = rule_name, "assertion passed");
            }
            Ok((rule, false)) => failures.push(AssertionFailure::new(
                selector,
                rule_name,
                comparison,
                Some(received),
                compare::mismatch_message(rule, received, comparison),
            )),
            Err(e) => failures.push(AssertionFailure::new(
                selector,
                rule_name,
                comparison,
                Some(received),
                e.to_string(),
            )),
        }
    }

    failures
}
