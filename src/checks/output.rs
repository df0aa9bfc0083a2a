use regex::Regex;
use similar::TextDiff;

use super::Failure;
use crate::suite::OutputExpect;

/// Evaluate stream assertions against captured text. `stream` is `stdout` or `stderr`.
pub fn check_output(stream: &str, expect: &OutputExpect, actual: &str) -> Vec<Failure> {
    let mut failures = Vec::new();

    if let Some(want) = &expect.equals
        && want != actual
    {
        failures.push(Failure::new(
            format!("{stream}.equals"),
            format!("{stream} differs from expected:\n{}", unified_diff(want, actual)),
        ));
    }

    for needle in &expect.contains {
        if !actual.contains(needle.as_str()) {
            failures.push(Failure::new(
                format!("{stream}.contains"),
                format!("{stream} does not contain {needle:?}"),
            ));
        }
    }

    for needle in &expect.not_contains {
        if actual.contains(needle.as_str()) {
            failures.push(Failure::new(
                format!("{stream}.not_contains"),
                format!("{stream} unexpectedly contains {needle:?}"),
            ));
        }
    }

    if let Some(pattern) = &expect.matches {
        match Regex::new(pattern) {
            Ok(re) if re.is_match(actual) => {}
            Ok(_) => failures.push(Failure::new(
                format!("{stream}.matches"),
                format!("{stream} does not match /{pattern}/"),
            )),
            Err(e) => failures.push(Failure::new(
                format!("{stream}.matches"),
                format!("invalid pattern /{pattern}/: {e}"),
            )),
        }
    }

    match expect.empty {
        Some(true) if !actual.is_empty() => failures.push(Failure::new(
            format!("{stream}.empty"),
            format!("{stream} should be empty but has {} bytes", actual.len()),
        )),
        Some(false) if actual.is_empty() => failures.push(Failure::new(
            format!("{stream}.empty"),
            format!("{stream} should not be empty"),
        )),
        _ => {}
    }

    failures
}

pub fn unified_diff(expected: &str, actual: &str) -> String {
    TextDiff::from_lines(expected, actual)
        .unified_diff()
        .context_radius(3)
        .header("expected", "actual")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect() -> OutputExpect {
        OutputExpect::default()
    }

    #[test]
    fn empty_expectation_always_passes() {
        assert!(check_output("stdout", &expect(), "anything").is_empty());
    }

    #[test]
    fn equals_failure_carries_diff() {
        let e = OutputExpect {
            equals: Some("hello\nworld\n".into()),
            ..expect()
        };
        let failures = check_output("stdout", &e, "hello\nthere\n");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].check, "stdout.equals");
        assert!(failures[0].message.contains("-world"));
        assert!(failures[0].message.contains("+there"));
        assert!(check_output("stdout", &e, "hello\nworld\n").is_empty());
    }

    #[test]
    fn contains_and_not_contains() {
        let e = OutputExpect {
            contains: vec!["ready".into(), "port 80".into()],
            not_contains: vec!["panic".into()],
            ..expect()
        };
        assert!(check_output("stderr", &e, "ready on port 80").is_empty());
        let failures = check_output("stderr", &e, "ready\npanic: boom");
        let checks: Vec<_> = failures.iter().map(|f| f.check.as_str()).collect();
        assert_eq!(checks, vec!["stderr.contains", "stderr.not_contains"]);
    }

    #[test]
    fn regex_match() {
        let e = OutputExpect {
            matches: Some(r"(?m)^v\d+\.\d+$".into()),
            ..expect()
        };
        assert!(check_output("stdout", &e, "build\nv1.25\n").is_empty());
        assert_eq!(check_output("stdout", &e, "version one").len(), 1);
    }

    #[test]
    fn emptiness() {
        let must_be_empty = OutputExpect {
            empty: Some(true),
            ..expect()
        };
        assert!(check_output("stderr", &must_be_empty, "").is_empty());
        assert_eq!(check_output("stderr", &must_be_empty, "warn\n").len(), 1);

        let must_have_output = OutputExpect {
            empty: Some(false),
            ..expect()
        };
        assert_eq!(check_output("stdout", &must_have_output, "").len(), 1);
    }
}
