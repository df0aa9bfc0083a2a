use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use anyhow::{Result, bail};
use tracing::{debug, info, warn};

use crate::checks::{self, Failure, RunMeasurement};
use crate::config::{Config, PullPolicy};
use crate::docker::{self, CancelToken, OutputLine};
use crate::suite::{Suite, TestCase};

use super::commands::{
    build_run_command, effective_pull, filter_matches, next_container_name, resolve_test,
};
use super::types::{
    ImageCheckResult, RunEvent, RunInput, RunReport, Stream, SuiteReport, TestResult, TestStatus,
};

/// Launch the runner on a background thread.
///
/// Returns a receiver that streams `RunEvent` values. The final event
/// is always either `Completed` or `Aborted`.
pub fn run_suites(input: RunInput, cancel: CancelToken) -> Receiver<RunEvent> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        run_inner(input, cancel, tx);
    });
    rx
}

fn run_inner(input: RunInput, cancel: CancelToken, tx: Sender<RunEvent>) {
    let cfg = &input.config;
    let filter = input.filter.as_deref();
    let mut reports = Vec::with_capacity(input.suites.len());

    for suite in &input.suites {
        let selected: Vec<&TestCase> = suite
            .tests
            .iter()
            .filter(|t| filter_matches(filter, &suite.name, &t.name))
            .collect();
        if selected.is_empty() {
            debug!(suite = %suite.name, "no tests match filter");
            continue;
        }

        let _ = tx.send(RunEvent::SuiteStarted {
            suite: suite.name.clone(),
            image: suite.image.clone(),
        });
        info!(suite = %suite.name, image = %suite.image, tests = selected.len(), "running suite");

        let report = run_suite(suite, &selected, cfg, input.fail_fast, &cancel, &tx);
        let failed = report
            .statuses()
            .any(|s| matches!(s, TestStatus::Fail | TestStatus::Error));

        let _ = tx.send(RunEvent::SuiteFinished(report.clone()));
        reports.push(report);

        if cancel.is_cancelled() {
            let _ = tx.send(RunEvent::Aborted("Cancelled by user".into()));
            return;
        }
        if input.fail_fast && failed {
            info!(suites_run = reports.len(), "stopping after first failure");
            break;
        }
    }

    let _ = tx.send(RunEvent::Completed(RunReport::new(reports)));
}

fn run_suite(
    suite: &Suite,
    selected: &[&TestCase],
    cfg: &Config,
    fail_fast: bool,
    cancel: &CancelToken,
    tx: &Sender<RunEvent>,
) -> SuiteReport {
    let mut report = SuiteReport {
        name: suite.name.clone(),
        path: suite.path.clone(),
        image: suite.image.clone(),
        image_checks: None,
        tests: Vec::with_capacity(selected.len()),
    };

    if let Err(e) = ensure_image(cfg, &suite.image, effective_pull(suite, cfg)) {
        let message = format!("{e:#}");
        warn!(suite = %suite.name, "{message}");
        if suite.inspect.is_some() {
            report.image_checks = Some(ImageCheckResult {
                status: TestStatus::Error,
                failures: Vec::new(),
                info: None,
                error: Some(message.clone()),
            });
        }
        for test in selected {
            let result = match test.skip_reason() {
                Some(reason) => TestResult::skipped(&suite.name, &test.name, reason),
                None => TestResult::errored(&suite.name, &test.name, message.clone()),
            };
            let _ = tx.send(RunEvent::TestFinished(result.clone()));
            report.tests.push(result);
        }
        return report;
    }

    if let Some(expect) = &suite.inspect {
        report.image_checks = Some(match docker::inspect_image(&cfg.docker, &suite.image) {
            Ok(info) => {
                let failures = checks::check_image(expect, &info);
                ImageCheckResult {
                    status: TestStatus::from_failures(&failures),
                    failures,
                    info: Some(info),
                    error: None,
                }
            }
            Err(e) => ImageCheckResult {
                status: TestStatus::Error,
                failures: Vec::new(),
                info: None,
                error: Some(format!("{e:#}")),
            },
        });
        let image_failed = report
            .image_checks
            .as_ref()
            .is_some_and(|c| c.status != TestStatus::Pass);
        if fail_fast && image_failed {
            return report;
        }
    }

    report.tests = run_tests_parallel(suite, selected, cfg, fail_fast, cancel, tx);
    report
}

/// Make the image available according to the pull policy.
fn ensure_image(cfg: &Config, image: &str, policy: PullPolicy) -> Result<()> {
    match policy {
        PullPolicy::Always => docker::pull_image(&cfg.docker, image),
        PullPolicy::Missing => {
            if docker::image_present(&cfg.docker, image) {
                Ok(())
            } else {
                docker::pull_image(&cfg.docker, image)
            }
        }
        PullPolicy::Never => {
            if docker::image_present(&cfg.docker, image) {
                Ok(())
            } else {
                bail!("image {image} is not present locally and pull policy is `never`")
            }
        }
    }
}

/// Run tests with bounded parallelism. With `fail_fast`, the first failing
/// test halts the suite: running siblings are stopped and reported as skipped,
/// and no further chunk starts. Only `cancel` aborts the whole run.
fn run_tests_parallel(
    suite: &Suite,
    selected: &[&TestCase],
    cfg: &Config,
    fail_fast: bool,
    cancel: &CancelToken,
    tx: &Sender<RunEvent>,
) -> Vec<TestResult> {
    let jobs = cfg.jobs.resolve().max(1);
    let halt = cancel.child();
    let mut results = Vec::with_capacity(selected.len());

    for chunk in selected.chunks(jobs) {
        if halt.is_cancelled() {
            break;
        }

        let handles: Vec<_> = chunk
            .iter()
            .map(|test| {
                let suite_name = suite.name.clone();
                let test_name = test.name.clone();
                let tx = tx.clone();
                let cancel = cancel.clone();
                let halt = halt.clone();

                if let Some(reason) = test.skip_reason() {
                    let handle = std::thread::spawn(move || {
                        let result = TestResult::skipped(&suite_name, &test_name, reason);
                        let _ = tx.send(RunEvent::TestFinished(result.clone()));
                        result
                    });
                    return (test.name.as_str(), handle);
                }

                let prepared = resolve_test(suite, test, cfg).map(|resolved| {
                    build_run_command(cfg, &suite.image, &resolved, &next_container_name())
                });
                let expect = test.expect.clone();

                let handle = std::thread::spawn(move || {
                    let _ = tx.send(RunEvent::TestStarted {
                        suite: suite_name.clone(),
                        test: test_name.clone(),
                    });
                    let result = match prepared {
                        Ok(cmd) => {
                            run_test(cmd, &expect, &suite_name, &test_name, &cancel, &halt, &tx)
                        }
                        Err(e) => TestResult::errored(&suite_name, &test_name, e),
                    };
                    if fail_fast && is_failure(result.status) {
                        debug!(suite = %suite_name, test = %test_name, "halting suite");
                        halt.cancel();
                    }
                    let _ = tx.send(RunEvent::TestFinished(result.clone()));
                    result
                });
                (test.name.as_str(), handle)
            })
            .collect();

        for (name, handle) in handles {
            results.push(join_test(&suite.name, name, handle, tx));
        }
    }

    results
}

/// A panicked test thread still yields a result so the summary stays complete.
fn join_test(
    suite: &str,
    name: &str,
    handle: JoinHandle<TestResult>,
    tx: &Sender<RunEvent>,
) -> TestResult {
    handle.join().unwrap_or_else(|_| {
        let result = TestResult::errored(suite, name, "test thread panicked".into());
        let _ = tx.send(RunEvent::TestFinished(result.clone()));
        result
    })
}

fn is_failure(status: TestStatus) -> bool {
    matches!(status, TestStatus::Fail | TestStatus::Error)
}

/// Run a single test container, forwarding its lines as `RunEvent::Log`.
/// The container watches `halt`, the suite's child of the run-wide `cancel`.
fn run_test(
    cmd: docker::ContainerCommand,
    expect: &crate::suite::Expect,
    suite: &str,
    test: &str,
    cancel: &CancelToken,
    halt: &CancelToken,
    tx: &Sender<RunEvent>,
) -> TestResult {
    let container_rx = match docker::spawn(cmd, halt.clone()) {
        Ok(rx) => rx,
        Err(e) => {
            return TestResult::errored(suite, test, format!("failed to start container: {e:#}"));
        }
    };

    let mut outcome = None;
    for line in container_rx {
        let (stream, line) = match line {
            OutputLine::Stdout(s) => (Stream::Stdout, s),
            OutputLine::Stderr(s) => (Stream::Stderr, s),
            OutputLine::Done(result) => {
                outcome = Some(result);
                break;
            }
        };
        let _ = tx.send(RunEvent::Log {
            suite: suite.to_string(),
            test: test.to_string(),
            stream,
            line,
        });
    }

    let Some(result) = outcome else {
        return TestResult::errored(suite, test, "container runner exited without a result".into());
    };

    if result.cancelled {
        if cancel.is_cancelled() {
            return TestResult::errored(suite, test, "cancelled".into());
        }
        return TestResult::skipped(
            suite,
            test,
            "stopped after an earlier failure (fail-fast)".into(),
        );
    }

    // The docker CLI itself reports daemon or image problems with 125.
    if result.exit_code == Some(125) && !result.timed_out && !expect.exit_code.accepts(Some(125)) {
        return TestResult {
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            ..TestResult::errored(
                suite,
                test,
                format!("docker failed to run the container: {}", result.stderr.trim()),
            )
        };
    }

    let measurement = RunMeasurement {
        exit_code: result.exit_code,
        timed_out: result.timed_out,
        elapsed: result.elapsed,
        peak_memory: result.peak.memory_bytes,
        peak_cpu: result.peak.cpu_percent,
        stdout: result.stdout,
        stderr: result.stderr,
    };
    let failures: Vec<Failure> = checks::check_run(expect, &measurement);

    TestResult {
        suite: suite.to_string(),
        name: test.to_string(),
        status: TestStatus::from_failures(&failures),
        duration_ms: measurement.elapsed.as_millis() as u64,
        exit_code: measurement.exit_code,
        timed_out: measurement.timed_out,
        peak_memory: measurement.peak_memory,
        peak_cpu: measurement.peak_cpu,
        failures,
        skip_reason: None,
        error: None,
        stdout: measurement.stdout,
        stderr: measurement.stderr,
    }
}
