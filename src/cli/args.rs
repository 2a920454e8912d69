//! CLI argument definitions using clap

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::monitor::{DEFAULT_DELAY, DEFAULT_PORT};
use crate::pipeline::{NonJsonPolicy, RunOptions, UndefinedVariables};

/// apitest - run declarative HTTP API test sets
#[derive(Parser, Debug, Clone)]
#[command(name = "apitest", version, about, long_about = None)]
pub struct Args {
    /// Test-set file (YAML or TOML); takes precedence over --file
    #[arg(value_name = "FILE", required_unless_present = "file")]
    pub file_arg: Option<PathBuf>,

    /// Test-set file (YAML or TOML)
    #[arg(short = 'f', long = "file", value_name = "FILE", env = "APITEST_FILE")]
    pub file: Option<PathBuf>,

    /// Run only the request with this name
    #[arg(short = 't', long = "test", value_name = "NAME", env = "APITEST_TEST")]
    pub test: Option<String>,

    /// Set a variable, overriding the test set's value (repeatable)
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", value_delimiter = ',', action = ArgAction::Append)]
    pub vars: Vec<String>,

    /// Include response bodies in the output and enable debug logs
    #[arg(short = 'v', long = "verbose", action = ArgAction::SetTrue)]
    pub verbose: bool,

    // =========================================================================
    // MONITOR MODE
    // =========================================================================

    /// Repeat the run forever and serve Prometheus metrics
    #[arg(short = 'm', long = "monitor", action = ArgAction::SetTrue, env = "APITEST_MONITOR")]
    pub monitor: bool,

    /// Port for the /metrics listener in monitor mode
    #[arg(short = 'p', long = "port", value_name = "PORT", default_value_t = DEFAULT_PORT, env = "APITEST_PORT")]
    pub port: u16,

    /// Seconds to wait between monitor runs
    #[arg(short = 'd', long = "delay", value_name = "SECONDS", default_value_t = DEFAULT_DELAY.as_secs(), env = "APITEST_DELAY")]
    pub delay: u64,

    // =========================================================================
    // REQUEST BEHAVIOUR
    // =========================================================================

    /// Per-request timeout, e.g. 30s, 1m, 500ms
    #[arg(long = "timeout", value_name = "DURATION", default_value = "30s", value_parser = parse_duration, env = "APITEST_TIMEOUT")]
    pub timeout: Duration,

    /// Render undefined {{ variables }} as empty strings instead of failing
    #[arg(long = "allow-undefined", action = ArgAction::SetTrue)]
    pub allow_undefined: bool,

    /// Fail requests whose field checks meet a non-JSON response
    #[arg(long = "fail-on-non-json", action = ArgAction::SetTrue)]
    pub fail_on_non_json: bool,

    // =========================================================================
    // OUTPUT & REPORTS
    // =========================================================================

    /// Output style: text (default) or json (JSON Lines)
    #[arg(long = "log-format", value_name = "FORMAT", value_enum, default_value_t = LogFormat::Text, env = "APITEST_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Disable colors in output
    #[arg(long = "no-color", action = ArgAction::SetTrue)]
    pub no_color: bool,

    /// Write a JUnit XML report (for CI/CD integration)
    #[arg(long = "report-junit", value_name = "FILE")]
    pub report_junit: Option<PathBuf>,

    /// Write a JSON report
    #[arg(long = "report-json", value_name = "FILE")]
    pub report_json: Option<PathBuf>,

    /// Write a TAP (Test Anything Protocol) report
    #[arg(long = "report-tap", value_name = "FILE")]
    pub report_tap: Option<PathBuf>,
}

/// Output format for results and logs
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Plain text output (default)
    #[default]
    Text,
    /// JSON Lines format for parsing
    Json,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s).map_err(|e| format!("invalid duration '{}': {}", s, e))
}

impl Args {
    /// The test-set path. A positional file wins over `--file`, which
    /// may come from `APITEST_FILE`
    pub fn test_set_path(&self) -> Option<&PathBuf> {
        self.file_arg.as_ref().or(self.file.as_ref())
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            test_filter: self.test.clone(),
            verbose: self.verbose,
            undefined: if self.allow_undefined {
                UndefinedVariables::Empty
            } else {
                UndefinedVariables::Error
            },
            non_json: if self.fail_on_non_json {
                NonJsonPolicy::Fail
            } else {
                NonJsonPolicy::Skip
            },
            timeout: self.timeout,
        }
    }

    pub fn monitor_delay(&self) -> Duration {
        Duration::from_secs(self.delay)
    }
}
