//! Test runtime characteristics of Docker images.
//!
//! Suites are YAML files naming an image, static expectations about its
//! configuration, and commands to run in containers with expectations about
//! exit codes, output, duration, and resource usage.

pub mod checks;
pub mod config;
pub mod docker;
pub mod error;
pub mod report;
pub mod runner;
pub mod suite;
pub mod templates;
pub mod units;
