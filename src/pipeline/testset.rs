//! Test-set definition and parsing
//!
//! Supports YAML and TOML test-set files.

use std::fs;
use std::path::Path;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::template::Variables;
use crate::errors::ApitestError;

/// Maximum test-set file size (1 MB)
const MAX_TEST_SET_FILE_SIZE: u64 = 1024 * 1024;

/// A set of requests and the defaults they share
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestSet {
    /// Defaults applied to every request
    #[serde(default)]
    pub environment: EnvironmentDefaults,

    /// Requests, run in file order
    #[serde(default)]
    pub requests: Vec<RequestSpec>,
}

/// Initial variables and headers for every request.
///
/// `vars` may be updated during a run by a request's `set` block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentDefaults {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub vars: Variables,

    /// Header values may contain placeholders
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
}

/// A request to make and the response it should produce
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSpec {
    pub name: String,

    /// URL template, e.g. `{{ api }}/todos/{{ created_id }}`
    pub url: String,

    #[serde(default = "default_method")]
    pub method: String,

    /// `json` (default) or one of the form-encoding hints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Request-specific headers, merged over the environment headers
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<IndexMap<String, JsonValue>>,

    #[serde(default)]
    pub expect: Expectation,

    /// Values to copy from the response into the variable environment
    #[serde(default, rename = "set", skip_serializing_if = "Vec::is_empty")]
    pub set_vars: Vec<SetDirective>,
}

/// Conditions checked against a request's response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expectation {
    /// Expected HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Selector -> expected value, or selector -> rule-set
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub values: IndexMap<String, JsonValue>,

    /// Require matching types for equality checks
    #[serde(default)]
    pub strict: bool,
}

impl Default for Expectation {
    fn default() -> Self {
        Self {
            status: default_status(),
            values: IndexMap::new(),
            strict: false,
        }
    }
}

/// Copies the response value at `from` into variable `var`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDirective {
    /// Selector into the response body
    pub from: String,
    /// Target variable name
    pub var: String,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_status() -> u16 {
    200
}

/// Load a test set from a file (YAML or TOML)
pub fn load_test_set(path: &Path) -> Result<TestSet, ApitestError> {
    let metadata = fs::metadata(path).map_err(|e| {
        ApitestError::Config(format!("Cannot open test set {}: {}", path.display(), e))
    })?;

    let file_size = metadata.len();
    if file_size > MAX_TEST_SET_FILE_SIZE {
        return Err(ApitestError::Config(format!(
            "Test set file too large: {} bytes (max {} bytes)",
            file_size, MAX_TEST_SET_FILE_SIZE
        )));
    }

    let content = fs::read_to_string(path).map_err(|e| {
        ApitestError::Config(format!("Cannot read test set {}: {}", path.display(), e))
    })?;

    let extension = path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let set = parse_test_set(&content, extension)?;
    validate_test_set(&set)?;

    Ok(set)
}

/// Parse test-set text; `extension` picks the format
pub fn parse_test_set(content: &str, extension: &str) -> Result<TestSet, ApitestError> {
    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(content)
            .map_err(|e| ApitestError::Config(format!("Failed to parse YAML test set: {}", e))),
        "toml" => toml::from_str(content)
            .map_err(|e| ApitestError::Config(format!("Failed to parse TOML test set: {}", e))),
        _ => serde_yaml::from_str(content).or_else(|_| {
            toml::from_str(content)
                .map_err(|e| ApitestError::Config(format!("Failed to parse test set: {}", e)))
        }),
    }
}

/// Validate basic test-set structure
fn validate_test_set(set: &TestSet) -> Result<(), ApitestError> {
    for (i, request) in set.requests.iter().enumerate() {
        if request.url.is_empty() {
            return Err(ApitestError::Config(format!(
                "Request {} ({}) must have a URL", i + 1, request.name
            )));
        }
        for directive in &request.set_vars {
            if directive.var.is_empty() || directive.from.is_empty() {
                return Err(ApitestError::Config(format!(
                    "Request {} ({}): every 'set' entry needs both 'var' and 'from'",
                    i + 1, request.name
                )));
            }
        }
    }

    Ok(())
}

/// Merge `KEY=VALUE` overrides into the initial variables.
///
/// Values are kept as strings; the key ends at the first `=`.
pub fn apply_cli_variables(variables: &mut Variables, vars: &[String]) -> Result<(), ApitestError> {
    for var in vars {
        match var.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                variables.insert(key.trim().to_string(), JsonValue::String(value.to_string()));
            }
            _ => {
                return Err(ApitestError::Config(format!(
                    "Invalid variable format: {}. Usage example: -e myvar=$MYVAR -e anothervar=$MYVAR2",
                    var
                )));
            }
        }
    }
    Ok(())
}
