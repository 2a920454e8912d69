//! Test-set pipeline
//!
//! Loading, placeholder expansion, request execution, assertions, captures
//! and reporting for declarative API test sets.

pub mod assertions;
pub mod capture;
pub mod compare;
pub mod executor;
pub mod report;
pub mod runner;
pub mod selector;
pub mod template;
pub mod testset;

pub use assertions::{AssertionFailure, Evaluation, NonJsonPolicy};
pub use compare::{CompareMode, Rule};
pub use executor::{BodyEncoding, Executor, RawResponse, ResolvedRequest};
pub use report::{Outcome, ReportConfig, ReportFormat, RequestReport, RunSummary};
pub use runner::{RunOptions, RunState, RequestState, TestRunner};
pub use template::{UndefinedVariables, Variables};
pub use testset::{load_test_set, parse_test_set, apply_cli_variables, TestSet, RequestSpec, Expectation, SetDirective};
