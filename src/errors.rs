//! Error types for apitest

use thiserror::Error;

/// Main error type for apitest
#[derive(Error, Debug)]
pub enum ApitestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("{0}")]
    Template(#[from] TemplateError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout after {0:.1} seconds")]
    Timeout(f64),

    #[error("Response is not JSON (Content-Type: {content_type}); {checks} field check(s) cannot run")]
    NonJsonResponse {
        content_type: String,
        checks: usize,
    },

    #[error("Capture error: cannot set '{var}' from '{from}': {source}")]
    Capture {
        var: String,
        from: String,
        #[source]
        source: SelectError,
    },

    #[error("Capture error: cannot set '{var}': response is not JSON (Content-Type: {content_type})")]
    CaptureNonJson {
        var: String,
        content_type: String,
    },

    #[error("Capture error: cannot set '{var}': response body is not valid JSON: {reason}")]
    CaptureDecode {
        var: String,
        reason: String,
    },

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("Report error: {0}")]
    Report(String),
}

impl From<reqwest::Error> for ApitestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            ApitestError::Transport(format!("Connection failed: {}", err))
        } else {
            ApitestError::Transport(err.to_string())
        }
    }
}

/// Placeholder expansion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("undefined variable '{name}'")]
    Undefined { name: String },

    #[error("malformed placeholder at byte {position}: {message}")]
    Malformed { position: usize, message: String },
}

/// Path selector errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    #[error("key '{segment}' not found (selector '{selector}')")]
    NotFound { selector: String, segment: String },

    #[error("cannot apply '{segment}' to {found} (selector '{selector}')")]
    TypeMismatch {
        selector: String,
        segment: String,
        found: &'static str,
    },

    #[error("invalid selector '{selector}': {message}")]
    Invalid { selector: String, message: String },
}

/// Comparator errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompareError {
    #[error("unable to parse {value} as a number")]
    Parse { value: String },

    #[error("invalid rule: {0}")]
    InvalidRule(String),
}

pub type Result<T> = std::result::Result<T, ApitestError>;
