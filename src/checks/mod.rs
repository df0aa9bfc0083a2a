//! Assertion evaluation. Every check returns the failures it found; no failures means pass.

mod image;
mod output;
mod runtime;

pub use image::check_image;
pub use output::{check_output, unified_diff};
pub use runtime::{RunMeasurement, check_run};

use serde::{Deserialize, Serialize};

/// One failed assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Dotted name of the expectation, e.g. `stdout.contains`.
    pub check: String,
    pub message: String,
}

impl Failure {
    pub fn new(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            message: message.into(),
        }
    }
}
