//! Program entry: argument parsing, logging setup and run dispatch

use std::path::Path;
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Args, LogFormat};
use crate::errors::ApitestError;
use crate::monitor::{self, MonitorOptions};
use crate::output::terminal::Painter;
use crate::pipeline::report::{self, ReportConfig, ReportFormat};
use crate::pipeline::{apply_cli_variables, load_test_set, RequestReport, RunSummary, TestRunner};
use crate::status::ExitStatus;

/// Environment variable holding the log filter directives
pub const LOG_ENV: &str = "APITEST_LOG";

/// Main entry point for the CLI.
///
/// Parses arguments, sets up logging and runs the test set on a tokio
/// runtime.
pub fn run(args: Vec<String>) -> ExitStatus {
    let parsed = match Args::try_parse_from(&args) {
        Ok(args) => args,
        Err(e) => {
            e.print().ok();
            return if e.kind() == clap::error::ErrorKind::DisplayHelp
                || e.kind() == clap::error::ErrorKind::DisplayVersion {
                ExitStatus::Success
            } else {
                ExitStatus::Error
            };
        }
    };

    init_logging(parsed.verbose, parsed.log_format);
    debug!(?parsed, "parsed arguments");

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => return handle_error(ApitestError::Io(e)),
    };

    match runtime.block_on(program(parsed)) {
        Ok(status) => status,
        Err(e) => handle_error(e),
    }
}

/// Install the global tracing subscriber.
///
/// `APITEST_LOG` takes `EnvFilter` directives; without it the level is
/// `warn`, or `debug` for this crate when verbose. Logs go to stderr.
pub fn init_logging(verbose: bool, format: LogFormat) {
    let default = if verbose { "warn,apitest=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);

    // A subscriber may already be installed (tests)
    let _ = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
    };
}

pub async fn program(args: Args) -> Result<ExitStatus, ApitestError> {
    let path = args
        .test_set_path()
        .cloned()
        .ok_or_else(|| ApitestError::Argument("a test-set file is required".to_string()))?;

    let set = load_test_set(&path)?;
    let mut variables = set.environment.vars.clone();
    apply_cli_variables(&mut variables, &args.vars)?;

    if let Some(ref name) = args.test {
        if !set.requests.iter().any(|r| &r.name == name) {
            warn!(test = %name, "no request with this name in the test set");
        }
    }

    let source = path.display().to_string();
    let printer = Printer {
        format: args.log_format,
        painter: if args.no_color { Painter::plain() } else { Painter::detect() },
    };
    let mut runner = TestRunner::new(args.run_options())?;

    if args.monitor {
        let options = MonitorOptions { port: args.port, delay: args.monitor_delay() };
        monitor::run_monitor(&mut runner, &set, &variables, options, |_, summary| {
            for report in &summary.reports {
                printer.request(report);
            }
            printer.summary(&source, summary);
        })
        .await?;
        return Ok(ExitStatus::Interrupted);
    }

    let summary = runner
        .run_with(&set, &mut variables, |report| printer.request(report))
        .await;
    printer.summary(&source, &summary);

    write_reports(&args, &path, &summary)?;

    Ok(ExitStatus::from_summary(&summary))
}

/// Writes results to stdout in the selected format
struct Printer {
    format: LogFormat,
    painter: Painter,
}

impl Printer {
    fn request(&self, report: &RequestReport) {
        match self.format {
            LogFormat::Text => print!("{}", report::format_request(report, self.painter)),
            LogFormat::Json => println!("{}", report::format_request_json(report)),
        }
    }

    fn summary(&self, source: &str, summary: &RunSummary) {
        match self.format {
            LogFormat::Text => println!("{}", report::format_summary(source, summary, self.painter)),
            LogFormat::Json => println!("{}", report::format_summary_json(source, summary)),
        }
    }
}

fn write_reports(args: &Args, path: &Path, summary: &RunSummary) -> Result<(), ApitestError> {
    let suite_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let requested = [
        (&args.report_junit, ReportFormat::JUnit, "JUnit"),
        (&args.report_json, ReportFormat::Json, "JSON"),
        (&args.report_tap, ReportFormat::Tap, "TAP"),
    ];

    for (output, format, label) in requested {
        if let Some(output_path) = output {
            let config = ReportConfig {
                output_path: output_path.clone(),
                format,
                suite_name: suite_name.clone(),
            };
            report::generate_report(summary, &config)?;
            eprintln!("{} report written to: {}", label, output_path.display());
        }
    }

    Ok(())
}

fn handle_error(error: ApitestError) -> ExitStatus {
    eprintln!("Error: {}", error);
    ExitStatus::Error
}
