use std::fmt::Write;

use crossterm::style::{Color, Stylize};

use crate::runner::{ImageCheckResult, RunEvent, RunReport, SuiteReport, TestResult, TestStatus};
use crate::units::{format_bytes, format_duration};

fn paint(text: &str, color: Color, enabled: bool) -> String {
    if enabled {
        text.with(color).bold().to_string()
    } else {
        text.to_string()
    }
}

fn tag(status: TestStatus, color: bool) -> String {
    let (label, c) = match status {
        TestStatus::Pass => ("PASS", Color::Green),
        TestStatus::Fail => ("FAIL", Color::Red),
        TestStatus::Skip => ("SKIP", Color::Yellow),
        TestStatus::Error => ("ERR ", Color::Magenta),
    };
    paint(label, c, color)
}

/// One progress line for streamed events; `None` for events that print nothing.
pub fn render_event_line(event: &RunEvent, color: bool) -> Option<String> {
    match event {
        RunEvent::SuiteStarted { suite, image } => Some(format!(
            "{} {suite} ({image})",
            paint("==>", Color::Cyan, color)
        )),
        RunEvent::TestFinished(result) => Some(test_line(result, color)),
        RunEvent::SuiteFinished(suite) => suite
            .image_checks
            .as_ref()
            .map(|c| image_line(c, color)),
        RunEvent::Aborted(reason) => Some(format!("--- Aborted: {reason} ---")),
        _ => None,
    }
}

fn test_line(result: &TestResult, color: bool) -> String {
    let mut line = format!("  {} {}", tag(result.status, color), result.name);
    match result.status {
        TestStatus::Skip => {
            if let Some(reason) = &result.skip_reason {
                let _ = write!(line, " ({reason})");
            }
        }
        TestStatus::Error => {}
        _ => {
            let mut facts = vec![format_duration(std::time::Duration::from_millis(
                result.duration_ms,
            ))];
            if let Some(mem) = result.peak_memory {
                facts.push(format!("mem {}", format_bytes(mem)));
            }
            if let Some(cpu) = result.peak_cpu {
                facts.push(format!("cpu {cpu:.1}%"));
            }
            let _ = write!(line, " [{}]", facts.join(", "));
        }
    }
    line
}

fn image_line(check: &ImageCheckResult, color: bool) -> String {
    let mut line = format!("  {} image characteristics", tag(check.status, color));
    if let Some(info) = &check.info {
        let _ = write!(line, " [{}]", format_bytes(info.size));
    }
    line
}

/// Full report: every suite and test, then failure details and the summary.
pub fn render_console(report: &RunReport, color: bool) -> String {
    let mut out = String::new();
    for suite in &report.suites {
        let _ = writeln!(
            out,
            "{} {} ({})",
            paint("==>", Color::Cyan, color),
            suite.name,
            suite.image
        );
        if let Some(check) = &suite.image_checks {
            let _ = writeln!(out, "{}", image_line(check, color));
        }
        for test in &suite.tests {
            let _ = writeln!(out, "{}", test_line(test, color));
        }
    }
    out.push_str(&render_summary(report, color));
    out
}

/// Failure details and the one-line summary.
pub fn render_summary(report: &RunReport, color: bool) -> String {
    let mut out = String::new();

    let mut details = String::new();
    for suite in &report.suites {
        write_suite_failures(&mut details, suite);
    }
    if !details.is_empty() {
        let _ = writeln!(out, "\n{}", paint("Failures:", Color::Red, color));
        out.push_str(&details);
    }

    let s = &report.summary;
    let verdict = if report.success() {
        paint("OK", Color::Green, color)
    } else {
        paint("FAILED", Color::Red, color)
    };
    let _ = writeln!(
        out,
        "\n{verdict}: {} total, {} passed, {} failed, {} skipped, {} errors",
        s.total, s.passed, s.failed, s.skipped, s.errors
    );
    out
}

fn write_suite_failures(out: &mut String, suite: &SuiteReport) {
    if let Some(check) = &suite.image_checks {
        if let Some(err) = &check.error {
            let _ = writeln!(out, "\n  {} / image characteristics: {err}", suite.name);
        }
        if !check.failures.is_empty() {
            let _ = writeln!(out, "\n  {} / image characteristics", suite.name);
            for f in &check.failures {
                write_indented(out, &format!("[{}] {}", f.check, f.message));
            }
        }
    }

    for test in &suite.tests {
        match test.status {
            TestStatus::Fail => {
                let _ = writeln!(out, "\n  {} / {}", suite.name, test.name);
                for f in &test.failures {
                    write_indented(out, &format!("[{}] {}", f.check, f.message));
                }
            }
            TestStatus::Error => {
                let _ = writeln!(
                    out,
                    "\n  {} / {}: {}",
                    suite.name,
                    test.name,
                    test.error.as_deref().unwrap_or("error")
                );
            }
            _ => {}
        }
    }
}

fn write_indented(out: &mut String, text: &str) {
    for line in text.lines() {
        let _ = writeln!(out, "      {line}");
    }
}
