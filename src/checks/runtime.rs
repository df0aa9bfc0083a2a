use std::time::Duration;

use super::Failure;
use super::output::check_output;
use crate::suite::Expect;
use crate::units::{format_bytes, format_duration};

/// What a finished test run looked like from the outside.
#[derive(Debug, Clone, Default)]
pub struct RunMeasurement {
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub elapsed: Duration,
    pub peak_memory: Option<u64>,
    pub peak_cpu: Option<f64>,
    pub stdout: String,
    pub stderr: String,
}

pub fn check_run(expect: &Expect, run: &RunMeasurement) -> Vec<Failure> {
    let mut failures = Vec::new();

    if expect.timed_out != run.timed_out {
        let message = if expect.timed_out {
            format!(
                "container exited after {} but was expected to keep running until the timeout",
                format_duration(run.elapsed)
            )
        } else {
            format!("timed out after {}", format_duration(run.elapsed))
        };
        failures.push(Failure::new("timed_out", message));
    }

    // A killed container has no meaningful exit code.
    if !run.timed_out && !expect.exit_code.accepts(run.exit_code) {
        let actual = run
            .exit_code
            .map_or_else(|| "none".to_string(), |c| c.to_string());
        failures.push(Failure::new(
            "exit_code",
            format!(
                "expected exit code {}, got {actual}",
                expect.exit_code.describe()
            ),
        ));
    }

    if let Some(limit) = expect.max_duration
        && run.elapsed > limit.get()
    {
        failures.push(Failure::new(
            "max_duration",
            format!(
                "took {}, limit {}",
                format_duration(run.elapsed),
                format_duration(limit.get())
            ),
        ));
    }

    if let Some(limit) = expect.max_memory {
        match run.peak_memory {
            Some(peak) if peak > limit.bytes() => failures.push(Failure::new(
                "max_memory",
                format!(
                    "peak memory {}, limit {}",
                    format_bytes(peak),
                    format_bytes(limit.bytes())
                ),
            )),
            Some(_) => {}
            None => failures.push(Failure::new("max_memory", "no memory samples collected")),
        }
    }

    if let Some(limit) = expect.max_cpu {
        match run.peak_cpu {
            Some(peak) if peak > limit => failures.push(Failure::new(
                "max_cpu",
                format!("peak CPU {peak:.1}%, limit {limit:.1}%"),
            )),
            Some(_) => {}
            None => failures.push(Failure::new("max_cpu", "no CPU samples collected")),
        }
    }

    failures.extend(check_output("stdout", &expect.stdout, &run.stdout));
    failures.extend(check_output("stderr", &expect.stderr, &run.stderr));
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::{ExitExpect, OutputExpect};
    use crate::units::{ByteSize, HumanDuration};

    fn finished(code: i32) -> RunMeasurement {
        RunMeasurement {
            exit_code: Some(code),
            elapsed: Duration::from_millis(120),
            stdout: "ok\n".into(),
            ..RunMeasurement::default()
        }
    }

    fn checks(failures: &[Failure]) -> Vec<&str> {
        failures.iter().map(|f| f.check.as_str()).collect()
    }

    #[test]
    fn default_expectation_is_clean_exit() {
        assert!(check_run(&Expect::default(), &finished(0)).is_empty());
        let failures = check_run(&Expect::default(), &finished(2));
        assert_eq!(checks(&failures), vec!["exit_code"]);
        assert!(failures[0].message.contains("got 2"));
    }

    #[test]
    fn any_exit_code() {
        let expect = Expect {
            exit_code: ExitExpect::Any,
            ..Expect::default()
        };
        assert!(check_run(&expect, &finished(137)).is_empty());
    }

    #[test]
    fn timeout_expectations() {
        let mut run = finished(0);
        run.exit_code = None;
        run.timed_out = true;

        let failures = check_run(&Expect::default(), &run);
        assert_eq!(checks(&failures), vec!["timed_out"]);

        let long_running = Expect {
            timed_out: true,
            ..Expect::default()
        };
        assert!(check_run(&long_running, &run).is_empty());
        assert_eq!(checks(&check_run(&long_running, &finished(0))), vec!["timed_out"]);
    }

    #[test]
    fn resource_limits() {
        let expect = Expect {
            max_duration: Some(HumanDuration(Duration::from_millis(100))),
            max_memory: Some(ByteSize(1024)),
            max_cpu: Some(50.0),
            ..Expect::default()
        };
        let mut run = finished(0);
        run.peak_memory = Some(2048);
        run.peak_cpu = Some(75.0);
        let failures = check_run(&expect, &run);
        assert_eq!(checks(&failures), vec!["max_duration", "max_memory", "max_cpu"]);

        run.elapsed = Duration::from_millis(50);
        run.peak_memory = Some(512);
        run.peak_cpu = Some(10.0);
        assert!(check_run(&expect, &run).is_empty());
    }

    #[test]
    fn missing_samples_fail_resource_limits() {
        let expect = Expect {
            max_memory: Some(ByteSize(1024)),
            ..Expect::default()
        };
        let failures = check_run(&expect, &finished(0));
        assert_eq!(failures[0].message, "no memory samples collected");
    }

    #[test]
    fn stream_checks_are_included() {
        let expect = Expect {
            stdout: OutputExpect {
                contains: vec!["missing".into()],
                ..OutputExpect::default()
            },
            stderr: OutputExpect {
                empty: Some(true),
                ..OutputExpect::default()
            },
            ..Expect::default()
        };
        let mut run = finished(0);
        run.stderr = "warning\n".into();
        assert_eq!(
            checks(&check_run(&expect, &run)),
            vec!["stdout.contains", "stderr.empty"]
        );
    }
}
