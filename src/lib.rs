//! apitest library interface
//!
//! Runs declarative HTTP API test sets: ordered requests whose responses
//! are checked against expected status codes and field values, with values
//! captured from one response feeding later requests.
//!
//! # Module Organization
//!
//! - [`pipeline`] - Test-set model, substitution, execution, assertions, reports
//! - [`monitor`] - Repeated runs with a Prometheus metrics endpoint
//! - [`cli`] - Command-line arguments
//! - [`core`] - Main execution logic
//! - [`errors`] - Error types (ApitestError, Result)
//! - [`status`] - Exit status codes (ExitStatus)
//! - [`signals`] - Interrupt handling (was_interrupted, wait_for_interrupt)

pub mod cli;
pub mod core;
pub mod errors;
pub mod monitor;
pub mod output;
pub mod pipeline;
pub mod signals;
pub mod status;
