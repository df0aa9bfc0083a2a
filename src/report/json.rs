use anyhow::{Context, Result};

use crate::runner::RunReport;

pub fn render_json(report: &RunReport) -> Result<String> {
    let mut out = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{SuiteReport, TestResult};

    #[test]
    fn json_report_reads_back() {
        let report = RunReport::new(vec![SuiteReport {
            name: "web".into(),
            image: "nginx:1.27".into(),
            tests: vec![TestResult::skipped("web", "slow", "later".into())],
            ..SuiteReport::default()
        }]);
        let json = render_json(&report).unwrap();
        assert!(json.contains("\"status\": \"skip\""));

        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary, report.summary);
        assert_eq!(back.suites[0].tests[0].skip_reason.as_deref(), Some("later"));
    }
}
