use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::checks::Failure;
use crate::config::Config;
use crate::docker::ImageInfo;
use crate::suite::Suite;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
    Skip,
    Error,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pass => "pass",
            TestStatus::Fail => "fail",
            TestStatus::Skip => "skip",
            TestStatus::Error => "error",
        }
    }

    pub fn from_failures(failures: &[Failure]) -> Self {
        if failures.is_empty() {
            TestStatus::Pass
        } else {
            TestStatus::Fail
        }
    }
}

/// Mirrors the JSON report written by `--format json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub suites: Vec<SuiteReport>,
    pub summary: Summary,
}

impl RunReport {
    pub fn new(suites: Vec<SuiteReport>) -> Self {
        let summary = Summary::tally(&suites);
        Self { suites, summary }
    }

    pub fn success(&self) -> bool {
        self.summary.failed == 0 && self.summary.errors == 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteReport {
    pub name: String,
    pub path: PathBuf,
    pub image: String,
    pub image_checks: Option<ImageCheckResult>,
    pub tests: Vec<TestResult>,
}

impl SuiteReport {
    /// Test results plus the image check, in report order.
    pub fn statuses(&self) -> impl Iterator<Item = TestStatus> + '_ {
        self.image_checks
            .iter()
            .map(|c| c.status)
            .chain(self.tests.iter().map(|t| t.status))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageCheckResult {
    pub status: TestStatus,
    pub failures: Vec<Failure>,
    pub info: Option<ImageInfo>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub suite: String,
    pub name: String,
    pub status: TestStatus,
    pub duration_ms: u64,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub peak_memory: Option<u64>,
    pub peak_cpu: Option<f64>,
    pub failures: Vec<Failure>,
    pub skip_reason: Option<String>,
    pub error: Option<String>,
    pub stdout: String,
    pub stderr: String,
}

impl TestResult {
    pub fn skipped(suite: &str, name: &str, reason: String) -> Self {
        Self {
            skip_reason: Some(reason),
            ..Self::blank(suite, name, TestStatus::Skip)
        }
    }

    pub fn errored(suite: &str, name: &str, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::blank(suite, name, TestStatus::Error)
        }
    }

    fn blank(suite: &str, name: &str, status: TestStatus) -> Self {
        Self {
            suite: suite.to_string(),
            name: name.to_string(),
            status,
            duration_ms: 0,
            exit_code: None,
            timed_out: false,
            peak_memory: None,
            peak_cpu: None,
            failures: Vec::new(),
            skip_reason: None,
            error: None,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Image checks count as one entry per suite alongside its tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl Summary {
    pub fn tally(suites: &[SuiteReport]) -> Self {
        let mut summary = Summary::default();
        for status in suites.iter().flat_map(SuiteReport::statuses) {
            summary.total += 1;
            match status {
                TestStatus::Pass => summary.passed += 1,
                TestStatus::Fail => summary.failed += 1,
                TestStatus::Skip => summary.skipped += 1,
                TestStatus::Error => summary.errors += 1,
            }
        }
        summary
    }
}

/// Input to the test runner.
pub struct RunInput {
    pub config: Config,
    pub suites: Vec<Suite>,
    /// Substring matched against `suite/test`.
    pub filter: Option<String>,
    pub fail_fast: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Events emitted by the runner.
#[derive(Debug)]
pub enum RunEvent {
    SuiteStarted { suite: String, image: String },
    TestStarted { suite: String, test: String },
    Log {
        suite: String,
        test: String,
        stream: Stream,
        line: String,
    },
    TestFinished(TestResult),
    SuiteFinished(SuiteReport),
    Completed(RunReport),
    Aborted(String),
}
