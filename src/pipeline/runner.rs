//! Test-set execution
//!
//! Runs requests strictly in file order. Each request goes through
//! substitute -> execute -> evaluate -> capture, and a failure at any stage
//! fails only that request.

use std::time::Duration;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use super::assertions::{self, NonJsonPolicy};
use super::capture::capture;
use super::executor::{BodyEncoding, Executor, ResolvedRequest, DEFAULT_TIMEOUT};
use super::report::{Outcome, RequestReport, RunSummary};
use super::template::{self, UndefinedVariables, Variables};
use super::testset::{Expectation, RequestSpec, TestSet};
use crate::errors::ApitestError;
use crate::monitor::metrics;
use crate::signals;

/// Options for a test run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Only run the request with this name
    pub test_filter: Option<String>,
    /// Keep response bodies in the reports
    pub verbose: bool,
    pub undefined: UndefinedVariables,
    pub non_json: NonJsonPolicy,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            test_filter: None,
            verbose: false,
            undefined: UndefinedVariables::default(),
            non_json: NonJsonPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Lifecycle of a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Running,
    Passed,
    Failed,
}

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
}

/// Executes test sets against a live server
pub struct TestRunner {
    executor: Executor,
    options: RunOptions,
    state: RunState,
}

impl TestRunner {
    pub fn new(options: RunOptions) -> Result<Self, ApitestError> {
        Ok(Self {
            executor: Executor::new(options.timeout)?,
            options,
            state: RunState::Idle,
        })
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run every selected request; captures are written into `variables`
    pub async fn run(&mut self, set: &TestSet, variables: &mut Variables) -> RunSummary {
        self.run_with(set, variables, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_report` as each request finishes
    pub async fn run_with<F>(
        &mut self,
        set: &TestSet,
        variables: &mut Variables,
        mut on_report: F,
    ) -> RunSummary
    where
        F: FnMut(&RequestReport),
    {
        self.state = RunState::Running;
        let mut summary = RunSummary::default();

        for (i, spec) in set.requests.iter().enumerate() {
            if let Some(ref filter) = self.options.test_filter {
                if spec.name != *filter {
                    debug!(request = %spec.name, "skipped by test filter");
                    continue;
                }
            }

            if signals::was_interrupted() {
                warn!(remaining = set.requests.len() - i, "run interrupted");
                summary.interrupted = true;
                break;
            }

            let report = self.run_request(i + 1, spec, &set.environment.headers, variables).await;
            metrics::record_request(&report);
            on_report(&report);
            summary.record(report);
        }

        self.state = RunState::Completed;
        info!(total = summary.total, failed = summary.failed, "run completed");
        summary
    }

    async fn run_request(
        &self,
        index: usize,
        spec: &RequestSpec,
        env_headers: &IndexMap<String, String>,
        variables: &mut Variables,
    ) -> RequestReport {
        let mut state = RequestState::Pending;
        let mut report = RequestReport {
            index,
            name: spec.name.clone(),
            method: spec.method.to_uppercase(),
            url: spec.url.clone(),
            status: None,
            outcome: Outcome::Failed,
            failures: Vec::new(),
            error: None,
            duration: Duration::ZERO,
            skipped_checks: 0,
            body: None,
        };

        let (resolved, expectation) = match self.resolve(spec, env_headers, variables)
            .and_then(|request| Ok((request, self.resolve_expectation(&spec.expect, variables)?)))
        {
            Ok(pair) => pair,
            Err(e) => {
                warn!(request = %spec.name, error = %e, "substitution failed");
                report.error = Some(e.to_string());
                return report;
            }
        };
        report.url = resolved.url.clone();

        state = transition(&spec.name, state, RequestState::Running);

        let response = match self.executor.execute(&resolved).await {
            Ok(response) => response,
            Err(e) => {
                warn!(request = %spec.name, error = %e, "request failed");
                report.error = Some(e.to_string());
                transition(&spec.name, state, RequestState::Failed);
                return report;
            }
        };

        report.status = Some(response.status);
        report.duration = response.duration;
        if self.options.verbose {
            report.body = Some(response.text());
        }

        let evaluation = assertions::evaluate(&expectation, &response, self.options.non_json);
        let mut passed = evaluation.passed();
        report.skipped_checks = evaluation.skipped_checks;
        report.error = evaluation.error.map(|e| e.to_string());
        report.failures = evaluation.failures;

        if !spec.set_vars.is_empty() {
            let var = &spec.set_vars[0].var;
            let captured = match evaluation.document {
                Some(ref document) => capture(&spec.set_vars, document, variables),
                None => match evaluation.decode_error {
                    Some(ref reason) => Err(ApitestError::CaptureDecode {
                        var: var.clone(),
                        reason: reason.clone(),
                    }),
                    None => Err(ApitestError::CaptureNonJson {
                        var: var.clone(),
                        content_type: response.content_type().unwrap_or("none").to_string(),
                    }),
                },
            };

            if let Err(e) = captured {
                warn!(request = %spec.name, error = %e, "capture failed");
                passed = false;
                match report.error {
                    Some(ref mut existing) => {
                        existing.push_str("; ");
                        existing.push_str(&e.to_string());
                    }
                    None => report.error = Some(e.to_string()),
                }
            }
        }

        let end = if passed { RequestState::Passed } else { RequestState::Failed };
        transition(&spec.name, state, end);
        report.outcome = if passed { Outcome::Passed } else { Outcome::Failed };
        report
    }

    /// Expand placeholders in the URL, headers and body of a request.
    ///
    /// Request headers override environment headers of the same name,
    /// compared case-insensitively.
    pub fn resolve(
        &self,
        spec: &RequestSpec,
        env_headers: &IndexMap<String, String>,
        variables: &Variables,
    ) -> Result<ResolvedRequest, ApitestError> {
        let policy = self.options.undefined;

        let url = template::substitute(&spec.url, variables, policy)?;

        let mut headers = template::substitute_headers(env_headers, variables, policy)?;
        for (name, value) in template::substitute_headers(&spec.headers, variables, policy)? {
            headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
            headers.insert(name, value);
        }

        let body = match spec.body {
            Some(ref body) => {
                let mut resolved: IndexMap<String, JsonValue> = IndexMap::with_capacity(body.len());
                for (key, value) in body {
                    resolved.insert(
                        template::substitute(key, variables, policy)?,
                        template::substitute_value(value, variables, policy)?,
                    );
                }
                Some(resolved)
            }
            None => None,
        };

        Ok(ResolvedRequest {
            method: spec.method.to_uppercase(),
            url,
            headers,
            body,
            encoding: BodyEncoding::from_hint(spec.content_type.as_deref()),
        })
    }

    /// Expand placeholders inside expected values, so a check can refer
    /// to a value captured earlier in the run
    pub fn resolve_expectation(
        &self,
        expectation: &Expectation,
        variables: &Variables,
    ) -> Result<Expectation, ApitestError> {
        let mut values = IndexMap::with_capacity(expectation.values.len());
        for (selector, expected) in &expectation.values {
            values.insert(
                selector.clone(),
                template::substitute_expected(expected, variables, self.options.undefined)?,
            );
        }
        Ok(Expectation {
            status: expectation.status,
            values,
            strict: expectation.strict,
        })
    }
}

fn transition(request: &str, from: RequestState, to: RequestState) -> RequestState {
    debug!(request, ?from, ?to, "request state");
    to
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec() -> RequestSpec {
        let mut headers = IndexMap::new();
        headers.insert("authorization".to_string(), "Token {{ id }}".to_string());
        headers.insert("X-Trace".to_string(), "abc".to_string());

        let mut body = IndexMap::new();
        body.insert("title".to_string(), json!("todo {{ id }}"));
        body.insert("{{ key }}".to_string(), json!({"tags": ["{{ id }}"], "done": false}));

        RequestSpec {
            name: "Update todo".to_string(),
            url: "{{ api }}/todos/{{ id }}".to_string(),
            method: "put".to_string(),
            content_type: Some("urlencoded".to_string()),
            headers,
            body: Some(body),
            ..Default::default()
        }
    }

    fn vars() -> Variables {
        let mut v = Variables::new();
        v.insert("api".to_string(), json!("http://localhost:8000"));
        v.insert("id".to_string(), json!(7));
        v.insert("key".to_string(), json!("meta"));
        v.insert("token".to_string(), json!("secret"));
        v
    }

    #[test]
    fn test_resolve_request() {
        let runner = TestRunner::new(RunOptions::default()).unwrap();
        let mut env_headers = IndexMap::new();
        env_headers.insert("Authorization".to_string(), "Bearer {{ token }}".to_string());
        env_headers.insert("Accept".to_string(), "application/json".to_string());

        let resolved = runner.resolve(&spec(), &env_headers, &vars()).unwrap();

        assert_eq!(resolved.method, "PUT");
        assert_eq!(resolved.url, "http://localhost:8000/todos/7");
        assert_eq!(resolved.encoding, BodyEncoding::Form);

        let headers: Vec<(&str, &str)> = resolved
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(headers, vec![
            ("Accept", "application/json"),
            ("authorization", "Token 7"),
            ("X-Trace", "abc"),
        ]);

        let body = resolved.body.unwrap();
        assert_eq!(body["title"], json!("todo 7"));
        assert_eq!(body["meta"], json!({"tags": ["7"], "done": false}));
    }

    #[test]
    fn test_resolve_undefined_variable() {
        let runner = TestRunner::new(RunOptions::default()).unwrap();
        let mut v = vars();
        v.shift_remove("id");

        let err = runner.resolve(&spec(), &IndexMap::new(), &v).unwrap_err();
        assert_eq!(err.to_string(), "undefined variable 'id'");

        let lenient = TestRunner::new(RunOptions {
            undefined: UndefinedVariables::Empty,
            ..Default::default()
        })
        .unwrap();
        let resolved = lenient.resolve(&spec(), &IndexMap::new(), &v).unwrap();
        assert_eq!(resolved.url, "http://localhost:8000/todos/");
    }

    #[test]
    fn test_resolve_without_body() {
        let runner = TestRunner::new(RunOptions::default()).unwrap();
        let spec = RequestSpec {
            name: "List".to_string(),
            url: "{{ api }}/todos".to_string(),
            method: "GET".to_string(),
            ..Default::default()
        };
        let resolved = runner.resolve(&spec, &IndexMap::new(), &vars()).unwrap();
        assert!(resolved.body.is_none());
        assert_eq!(resolved.encoding, BodyEncoding::Json);
    }

    #[test]
    fn test_resolve_expectation() {
        let runner = TestRunner::new(RunOptions::default()).unwrap();
        let mut values = IndexMap::new();
        values.insert("id".to_string(), json!("{{ id }}"));
        values.insert("count".to_string(), json!({"gt": "{{ id }}", "lt": 10}));
        values.insert("done".to_string(), json!(false));
        let expectation = Expectation { status: 201, values, strict: true };

        let resolved = runner.resolve_expectation(&expectation, &vars()).unwrap();
        assert_eq!(resolved.status, 201);
        assert!(resolved.strict);
        assert_eq!(resolved.values["id"], json!(7));
        assert_eq!(resolved.values["count"], json!({"gt": 7, "lt": 10}));
        assert_eq!(resolved.values["done"], json!(false));

        let mut missing = Expectation::default();
        missing.values.insert("id".to_string(), json!("{{ nope }}"));
        let err = runner.resolve_expectation(&missing, &vars()).unwrap_err();
        assert_eq!(err.to_string(), "undefined variable 'nope'");
    }

    #[tokio::test]
    async fn test_substitution_error_fails_request_and_run_continues() {
        let mut runner = TestRunner::new(RunOptions::default()).unwrap();
        assert_eq!(runner.state(), RunState::Idle);

        let set = TestSet {
            requests: vec![
                RequestSpec {
                    name: "first".to_string(),
                    url: "{{ missing }}/a".to_string(),
                    ..Default::default()
                },
                RequestSpec {
                    name: "second".to_string(),
                    url: "{{ missing }}/b".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let mut seen = Vec::new();
        let summary = runner
            .run_with(&set, &mut Variables::new(), |r| seen.push(r.name.clone()))
            .await;

        assert_eq!(runner.state(), RunState::Completed);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(seen, vec!["first", "second"]);
        assert_eq!(summary.reports[0].url, "{{ missing }}/a");
        assert!(summary.reports[0].status.is_none());
    }

    #[tokio::test]
    async fn test_filter_skips_other_requests() {
        let mut runner = TestRunner::new(RunOptions {
            test_filter: Some("second".to_string()),
            ..Default::default()
        })
        .unwrap();

        let set = TestSet {
            requests: vec![
                RequestSpec { name: "first".to_string(), url: "{{ x }}".to_string(), ..Default::default() },
                RequestSpec { name: "second".to_string(), url: "{{ x }}".to_string(), ..Default::default() },
            ],
            ..Default::default()
        };

        let summary = runner.run(&set, &mut Variables::new()).await;
        assert_eq!(summary.total, 1);
        assert_eq!(summary.reports[0].name, "second");
        assert_eq!(summary.reports[0].index, 2);
    }
}
