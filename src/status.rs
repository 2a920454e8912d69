//! Exit status codes for the CLI
//!
//! apitest follows standard Unix exit code conventions:
//! - 0: every selected request passed
//! - 1: a request failed, or the test set or arguments were invalid
//! - 130: interrupted (Ctrl+C, standard SIGINT exit code)

use std::process::{ExitCode, Termination};

use crate::pipeline::RunSummary;

/// Exit status codes following standard Unix conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    /// At least one failed request, or a configuration error
    Error = 1,
    /// User interrupted (Ctrl+C) - standard SIGINT code
    Interrupted = 130,
}

impl Termination for ExitStatus {
    fn report(self) -> ExitCode {
        ExitCode::from(self as u8)
    }
}

impl ExitStatus {
    /// Exit status for a finished run
    pub fn from_summary(summary: &RunSummary) -> Self {
        if summary.interrupted {
            ExitStatus::Interrupted
        } else if summary.passed() {
            ExitStatus::Success
        } else {
            ExitStatus::Error
        }
    }
}
