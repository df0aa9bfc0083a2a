pub mod commands;
pub mod orchestrator;
mod types;

pub use orchestrator::run_suites;
pub use types::{
    ImageCheckResult, RunEvent, RunInput, RunReport, Stream, SuiteReport, Summary, TestResult,
    TestStatus,
};
