//! Run reports
//!
//! Human-readable request lines and summaries for the terminal, JSON lines
//! for machines, and JUnit XML / JSON / TAP report files for CI systems.

use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use junit_report::{Report, TestCase, TestSuite};
use serde::Serialize;
use serde_json::json;
use time::OffsetDateTime;

use super::assertions::AssertionFailure;
use crate::errors::ApitestError;
use crate::output::terminal::{Painter, Style};

/// Final state of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
}

/// Everything recorded about one executed request
#[derive(Debug, Clone, Serialize)]
pub struct RequestReport {
    /// 1-based position in the test set
    pub index: usize,
    pub name: String,
    pub method: String,
    pub url: String,
    /// Absent when no response was received
    pub status: Option<u16>,
    pub outcome: Outcome,
    pub failures: Vec<AssertionFailure>,
    /// Request-level error (substitution, transport, non-JSON, capture)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(serialize_with = "serialize_millis", rename = "duration_ms")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "is_zero")]
    pub skipped_checks: usize,
    /// Response body, kept only in verbose mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl RequestReport {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Aggregate of one run over a test set
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Requests attempted (filtered-out requests are not counted)
    pub total: usize,
    pub failed: usize,
    pub reports: Vec<RequestReport>,
    /// The run was stopped by Ctrl+C before every request ran
    pub interrupted: bool,
    pub duration: Duration,
}

impl RunSummary {
    pub fn record(&mut self, report: RequestReport) {
        self.total += 1;
        if !report.passed() {
            self.failed += 1;
        }
        self.duration += report.duration;
        self.reports.push(report);
    }

    pub fn passed(&self) -> bool {
        self.failed == 0
    }
}

/// One line per request plus its failures, indented
pub fn format_request(report: &RequestReport, painter: Painter) -> String {
    let mut out = String::new();

    let mark = match report.outcome {
        Outcome::Passed => painter.paint("ok", Style::Pass),
        Outcome::Failed => painter.paint("FAIL", Style::Fail),
    };

    let _ = writeln!(
        out,
        "[{}] {} {} {} {} {} {}",
        report.index,
        painter.paint(&report.name, Style::Name),
        painter.method(&report.method),
        report.url,
        painter.status(report.status),
        painter.paint(&format!("({}ms)", report.duration.as_millis()), Style::Dim),
        mark,
    );

    for failure in &report.failures {
        let _ = writeln!(
            out,
            "    {} ({}): {}",
            painter.paint(&failure.selector, Style::Selector),
            failure.rule,
            failure.message
        );
    }

    if report.skipped_checks > 0 {
        let _ = writeln!(
            out,
            "    {}",
            painter.paint(
                &format!("{} field check(s) skipped: response is not JSON", report.skipped_checks),
                Style::Warn
            )
        );
    }

    if let Some(ref error) = report.error {
        let _ = writeln!(out, "    {}", painter.paint(&format!("error: {}", error), Style::Fail));
    }

    if let Some(ref body) = report.body {
        for line in body.lines() {
            let _ = writeln!(out, "    | {}", painter.paint(line, Style::Body));
        }
    }

    out
}

/// Closing line, e.g. `PASSED todos.yaml (2 requests)`
pub fn format_summary(source: &str, summary: &RunSummary, painter: Painter) -> String {
    let plural = if summary.total == 1 { "request" } else { "requests" };
    let mut line = if summary.passed() {
        format!(
            "{} {} ({} {})",
            painter.paint("PASSED", Style::Pass),
            source,
            summary.total,
            plural
        )
    } else {
        format!(
            "{} {} ({} {}, {} failed)",
            painter.paint("FAIL", Style::Fail),
            source,
            summary.total,
            plural,
            summary.failed
        )
    };

    if summary.interrupted {
        line.push_str(&format!(" {}", painter.paint("[interrupted]", Style::Warn)));
    }
    line
}

/// A request as a single JSON line
pub fn format_request_json(report: &RequestReport) -> String {
    let mut value = serde_json::to_value(report).unwrap_or_else(|_| json!({}));
    if let Some(map) = value.as_object_mut() {
        map.insert("type".to_string(), json!("request"));
        map.insert("timestamp".to_string(), json!(chrono::Utc::now().to_rfc3339()));
    }
    value.to_string()
}

/// The run summary as a single JSON line
pub fn format_summary_json(source: &str, summary: &RunSummary) -> String {
    json!({
        "type": "summary",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "file": source,
        "passed": summary.passed(),
        "total": summary.total,
        "failed": summary.failed,
        "interrupted": summary.interrupted,
        "duration_ms": summary.duration.as_millis() as u64,
    })
    .to_string()
}

/// Report file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// JUnit XML (for CI/CD systems)
    JUnit,
    Json,
    /// Test Anything Protocol
    Tap,
}

/// Where and how to write a report file
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub output_path: PathBuf,
    pub format: ReportFormat,
    /// Test-suite name, usually the test-set file name
    pub suite_name: String,
}

/// Write a report file for a finished run
pub fn generate_report(summary: &RunSummary, config: &ReportConfig) -> Result<(), ApitestError> {
    let content = match config.format {
        ReportFormat::JUnit => render_junit(summary, &config.suite_name)?,
        ReportFormat::Json => render_json(summary, &config.suite_name)?,
        ReportFormat::Tap => render_tap(summary),
    };

    let mut file = File::create(&config.output_path).map_err(|e| {
        ApitestError::Report(format!("Cannot create {}: {}", config.output_path.display(), e))
    })?;
    file.write_all(&content)?;

    Ok(())
}

fn render_junit(summary: &RunSummary, suite_name: &str) -> Result<Vec<u8>, ApitestError> {
    let classname = sanitize_classname(suite_name);
    let mut suite = TestSuite::new(suite_name);
    suite.set_timestamp(OffsetDateTime::now_utc());

    for report in &summary.reports {
        let duration = junit_report::Duration::new(
            report.duration.as_secs() as i64,
            report.duration.subsec_nanos() as i32,
        );

        let mut case = if let Some(ref error) = report.error {
            TestCase::error(&report.name, duration, "RequestError", &failure_details(report, error))
        } else if !report.failures.is_empty() {
            let messages: Vec<String> = report
                .failures
                .iter()
                .map(|f| format!("{} ({}): {}", f.selector, f.rule, f.message))
                .collect();
            TestCase::failure(
                &report.name,
                duration,
                "AssertionFailure",
                &failure_details(report, &messages.join("\n")),
            )
        } else {
            TestCase::success(&report.name, duration)
        };
        case.set_classname(&classname);
        suite.add_testcase(case);
    }

    let mut junit = Report::new();
    junit.add_testsuite(suite);

    let mut buf = Vec::new();
    junit
        .write_xml(&mut buf)
        .map_err(|e| ApitestError::Report(format!("Failed to write JUnit XML: {}", e)))?;
    Ok(buf)
}

fn failure_details(report: &RequestReport, message: &str) -> String {
    format!(
        "{}\nRequest: {} {}\nStatus: {}",
        message,
        report.method.to_uppercase(),
        report.url,
        report.status.map(|s| s.to_string()).unwrap_or_else(|| "N/A".to_string())
    )
}

fn render_json(summary: &RunSummary, suite_name: &str) -> Result<Vec<u8>, ApitestError> {
    let report = json!({
        "name": suite_name,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "summary": {
            "total": summary.total,
            "passed": summary.total - summary.failed,
            "failed": summary.failed,
            "interrupted": summary.interrupted,
            "total_time_ms": summary.duration.as_millis() as u64,
        },
        "requests": summary.reports,
    });

    Ok(serde_json::to_vec_pretty(&report)?)
}

fn render_tap(summary: &RunSummary) -> Vec<u8> {
    let mut out = String::new();
    let _ = writeln!(out, "TAP version 14");
    let _ = writeln!(out, "1..{}", summary.reports.len());

    for (i, report) in summary.reports.iter().enumerate() {
        if report.passed() {
            let _ = writeln!(out, "ok {} - {} # time={}ms", i + 1, report.name, report.duration.as_millis());
            continue;
        }

        let _ = writeln!(out, "not ok {} - {}", i + 1, report.name);
        let _ = writeln!(out, "  ---");
        let _ = writeln!(out, "  method: {}", report.method.to_uppercase());
        let _ = writeln!(out, "  url: {}", report.url);
        if let Some(status) = report.status {
            let _ = writeln!(out, "  status: {}", status);
        }
        if let Some(ref error) = report.error {
            let _ = writeln!(out, "  error: {}", error);
        }
        if !report.failures.is_empty() {
            let _ = writeln!(out, "  failures:");
            for f in &report.failures {
                let _ = writeln!(out, "    - {} ({}): {}", f.selector, f.rule, f.message);
            }
        }
        let _ = writeln!(out, "  ...");
    }

    if summary.interrupted {
        let _ = writeln!(out, "Bail out! interrupted");
    }

    out.into_bytes()
}

/// Make a string usable as a JUnit classname
fn sanitize_classname(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '.' { c } else { '_' })
        .collect()
}
