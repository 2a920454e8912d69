//! Prometheus request metrics
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed, so one-shot runs pay nothing for it.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::errors::ApitestError;
use crate::pipeline::RequestReport;

pub const REQUESTS_TOTAL: &str = "apitest_requests_total";
pub const REQUESTS_ERRORS_TOTAL: &str = "apitest_requests_errors_total";
pub const REQUESTS_DURATION: &str = "apitest_requests_duration";

/// Label values attached to every request metric
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLabels {
    pub name: String,
    pub hostname: String,
    pub path: String,
    pub method: String,
}

impl RequestLabels {
    /// Labels for a finished request; host and path come from its URL
    pub fn from_report(report: &RequestReport) -> Self {
        let (hostname, path) = match url::Url::parse(&report.url) {
            Ok(url) => (
                url.host_str().unwrap_or_default().to_string(),
                url.path().to_string(),
            ),
            Err(_) => (String::new(), report.url.clone()),
        };

        Self {
            name: report.name.clone(),
            hostname,
            path,
            method: report.method.to_uppercase(),
        }
    }

    fn pairs(&self) -> [(&'static str, String); 4] {
        [
            ("name", self.name.clone()),
            ("hostname", self.hostname.clone()),
            ("path", self.path.clone()),
            ("method", self.method.clone()),
        ]
    }
}

/// Count the request, its failure if any, and its duration in seconds
pub fn record_request(report: &RequestReport) {
    let labels = RequestLabels::from_report(report);

    counter!(REQUESTS_TOTAL, &labels.pairs()).increment(1);
    if !report.passed() {
        counter!(REQUESTS_ERRORS_TOTAL, &labels.pairs()).increment(1);
    }
    histogram!(REQUESTS_DURATION, &labels.pairs()).record(report.duration.as_secs_f64());
}

/// Register metric descriptions with the current recorder
pub fn describe() {
    describe_counter!(REQUESTS_TOTAL, Unit::Count, "Total number of requests sent");
    describe_counter!(
        REQUESTS_ERRORS_TOTAL,
        Unit::Count,
        "Number of requests with at least one failure"
    );
    describe_histogram!(REQUESTS_DURATION, Unit::Seconds, "Request duration in seconds");
}

/// Install the global Prometheus recorder and return a handle for rendering
pub fn install_recorder() -> Result<PrometheusHandle, ApitestError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ApitestError::Metrics(format!("Failed to install Prometheus recorder: {}", e)))?;
    describe();
    Ok(handle)
}
