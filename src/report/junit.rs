use std::fmt::Write;

use crate::runner::{RunReport, SuiteReport, TestResult, TestStatus};

const IMAGE_CASE: &str = "image characteristics";

pub fn render_junit(report: &RunReport) -> String {
    let s = &report.summary;
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        out,
        "<testsuites name=\"docker-unit\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\">",
        s.total, s.failed, s.errors, s.skipped
    );
    for suite in &report.suites {
        write_suite(&mut out, suite);
    }
    out.push_str("</testsuites>\n");
    out
}

fn write_suite(out: &mut String, suite: &SuiteReport) {
    let mut counts = [0usize; 4];
    for status in suite.statuses() {
        counts[status_index(status)] += 1;
    }
    let total: usize = counts.iter().sum();
    let time: f64 = suite.tests.iter().map(|t| t.duration_ms as f64 / 1000.0).sum();

    let _ = writeln!(
        out,
        "  <testsuite name=\"{}\" tests=\"{total}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{time:.3}\">",
        escape(&suite.name),
        counts[1],
        counts[3],
        counts[2],
    );
    let _ = writeln!(
        out,
        "    <properties><property name=\"image\" value=\"{}\"/></properties>",
        escape(&suite.image)
    );

    if let Some(check) = &suite.image_checks {
        let _ = write!(
            out,
            "    <testcase classname=\"{}\" name=\"{IMAGE_CASE}\" time=\"0.000\"",
            escape(&suite.name)
        );
        match check.status {
            TestStatus::Fail => {
                out.push_str(">\n");
                let body: Vec<String> = check.failures.iter().map(|f| f.message.clone()).collect();
                write_element(out, "failure", "image checks failed", &body.join("\n"));
                out.push_str("    </testcase>\n");
            }
            TestStatus::Error => {
                out.push_str(">\n");
                let msg = check.error.as_deref().unwrap_or("image inspection failed");
                write_element(out, "error", msg, "");
                out.push_str("    </testcase>\n");
            }
            _ => out.push_str("/>\n"),
        }
    }

    for test in &suite.tests {
        write_case(out, test);
    }
    out.push_str("  </testsuite>\n");
}

fn write_case(out: &mut String, test: &TestResult) {
    let _ = write!(
        out,
        "    <testcase classname=\"{}\" name=\"{}\" time=\"{:.3}\"",
        escape(&test.suite),
        escape(&test.name),
        test.duration_ms as f64 / 1000.0
    );
    match test.status {
        TestStatus::Pass => out.push_str("/>\n"),
        TestStatus::Skip => {
            let _ = writeln!(
                out,
                ">\n      <skipped message=\"{}\"/>\n    </testcase>",
                escape(test.skip_reason.as_deref().unwrap_or(""))
            );
        }
        TestStatus::Fail => {
            out.push_str(">\n");
            let summary = test
                .failures
                .first()
                .map(|f| f.check.as_str())
                .unwrap_or("failed");
            let body: Vec<String> = test
                .failures
                .iter()
                .map(|f| format!("[{}] {}", f.check, f.message))
                .collect();
            write_element(out, "failure", summary, &body.join("\n"));
            write_output(out, test);
            out.push_str("    </testcase>\n");
        }
        TestStatus::Error => {
            out.push_str(">\n");
            write_element(out, "error", test.error.as_deref().unwrap_or("error"), "");
            write_output(out, test);
            out.push_str("    </testcase>\n");
        }
    }
}

fn write_element(out: &mut String, tag: &str, message: &str, body: &str) {
    let _ = writeln!(
        out,
        "      <{tag} message=\"{}\">{}</{tag}>",
        escape(message),
        escape(body)
    );
}

fn write_output(out: &mut String, test: &TestResult) {
    if !test.stdout.is_empty() {
        let _ = writeln!(out, "      <system-out>{}</system-out>", escape(&test.stdout));
    }
    if !test.stderr.is_empty() {
        let _ = writeln!(out, "      <system-err>{}</system-err>", escape(&test.stderr));
    }
}

fn status_index(status: TestStatus) -> usize {
    match status {
        TestStatus::Pass => 0,
        TestStatus::Fail => 1,
        TestStatus::Skip => 2,
        TestStatus::Error => 3,
    }
}

/// Escape XML text and attribute content, dropping characters XML 1.0 forbids.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 => {}
            c => out.push(c),
        }
    }
    out
}
