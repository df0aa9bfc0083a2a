use std::collections::HashSet;
use std::path::Path;

use regex::Regex;

use super::types::{OutputExpect, Suite};
use crate::error::SuiteError;

/// Read and validate a suite file.
pub fn load_suite(path: &Path) -> Result<Suite, SuiteError> {
    let source = std::fs::read_to_string(path).map_err(|source| SuiteError::Io {
        file: path.display().to_string(),
        source,
    })?;
    parse_suite(&source, path)
}

/// Parse suite YAML. `path` names the suite in errors and supplies the default suite name.
pub fn parse_suite(source: &str, path: &Path) -> Result<Suite, SuiteError> {
    let file = path.display().to_string();

    let mut suite: Suite = serde_yaml::from_str(source).map_err(|source| SuiteError::Yaml {
        file: file.clone(),
        source,
    })?;
    suite.path = path.to_path_buf();

    if suite.name.trim().is_empty() {
        suite.name = default_name(path);
    }

    if suite.image.trim().is_empty() {
        return Err(SuiteError::BlankImage { file });
    }
    suite.image = suite.image.trim().to_string();

    if suite.tests.is_empty() {
        return Err(SuiteError::NoTests { file });
    }

    let mut seen = HashSet::new();
    for (index, test) in suite.tests.iter().enumerate() {
        let name = test.name.trim();
        if name.is_empty() {
            return Err(SuiteError::BlankTestName {
                file,
                index: index + 1,
            });
        }
        if !seen.insert(name.to_string()) {
            return Err(SuiteError::DuplicateTest {
                file,
                name: name.to_string(),
            });
        }
        if let Some(cmd) = &test.command
            && let Err(message) = cmd.to_args()
        {
            return Err(SuiteError::InvalidCommand {
                file,
                test: name.to_string(),
                message,
            });
        }
        for (stream, expect) in [("stdout", &test.expect.stdout), ("stderr", &test.expect.stderr)] {
            if let Err(message) = validate_pattern(expect) {
                return Err(SuiteError::InvalidPattern {
                    file,
                    test: name.to_string(),
                    stream: stream.to_string(),
                    message,
                });
            }
        }
    }

    Ok(suite)
}

fn validate_pattern(expect: &OutputExpect) -> Result<(), String> {
    match &expect.matches {
        Some(pattern) => Regex::new(pattern).map(|_| ()).map_err(|e| e.to_string()),
        None => Ok(()),
    }
}

/// `web.dunit.yml` -> `web`, `my.app.yml` -> `my.app`,
/// `docker-unit.yml` -> parent directory name when there is one.
fn default_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|n| n.to_str())
        .map(|n| n.strip_suffix(".dunit").unwrap_or(n).to_string())
        .unwrap_or_default();

    if stem == "docker-unit"
        && let Some(parent) = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
    {
        return parent.to_string();
    }

    if stem.is_empty() { "suite".to_string() } else { stem }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::types::{CommandSpec, ExitExpect};
    use std::time::Duration;

    const BASIC: &str = r#"
image: alpine:3.19
defaults:
  timeout: 10s
  env: { LANG: C.UTF-8 }
inspect:
  max_size: 10MB
  exposed_ports: []
tests:
  - name: hello
    command: echo hello
    expect:
      stdout: { equals: "hello\n" }
  - name: fails
    command: [sh, -c, "exit 3"]
    expect:
      exit_code: 3
      max_duration: 2s
"#;

    #[test]
    fn parses_basic_suite() {
        let suite = parse_suite(BASIC, Path::new("suites/alpine.dunit.yml")).unwrap();
        assert_eq!(suite.name, "alpine");
        assert_eq!(suite.image, "alpine:3.19");
        assert_eq!(suite.tests.len(), 2);
        assert_eq!(suite.defaults.timeout.unwrap().get(), Duration::from_secs(10));
        assert_eq!(suite.inspect.unwrap().max_size.unwrap().bytes(), 10_000_000);
        assert_eq!(
            suite.tests[0].command,
            Some(CommandSpec::Line("echo hello".into()))
        );
        assert_eq!(suite.tests[1].expect.exit_code, ExitExpect::Code(3));
    }

    #[test]
    fn well_known_file_takes_directory_name() {
        let suite = parse_suite(BASIC, Path::new("images/web/docker-unit.yml")).unwrap();
        assert_eq!(suite.name, "web");
    }

    #[test]
    fn default_name_keeps_inner_dots() {
        let suite = parse_suite(BASIC, Path::new("suites/my.app.yml")).unwrap();
        assert_eq!(suite.name, "my.app");
    }

    #[test]
    fn explicit_name_wins() {
        let src = format!("name: smoke\n{BASIC}");
        let suite = parse_suite(&src, Path::new("x.yml")).unwrap();
        assert_eq!(suite.name, "smoke");
    }

    #[test]
    fn rejects_blank_image() {
        let err = parse_suite("image: ' '\ntests: [{name: a}]\n", Path::new("s.yml")).unwrap_err();
        assert!(matches!(err, SuiteError::BlankImage { .. }));
    }

    #[test]
    fn rejects_missing_tests() {
        let err = parse_suite("image: alpine\n", Path::new("s.yml")).unwrap_err();
        assert!(matches!(err, SuiteError::NoTests { .. }));
    }

    #[test]
    fn rejects_duplicate_and_blank_names() {
        let err = parse_suite(
            "image: alpine\ntests: [{name: a}, {name: a}]\n",
            Path::new("s.yml"),
        )
        .unwrap_err();
        assert!(matches!(err, SuiteError::DuplicateTest { ref name, .. } if name == "a"));

        let err =
            parse_suite("image: alpine\ntests: [{name: a}, {}]\n", Path::new("s.yml")).unwrap_err();
        assert!(matches!(err, SuiteError::BlankTestName { index: 2, .. }));
    }

    #[test]
    fn rejects_bad_command_and_pattern() {
        let err = parse_suite(
            "image: alpine\ntests: [{name: a, command: []}]\n",
            Path::new("s.yml"),
        )
        .unwrap_err();
        assert!(matches!(err, SuiteError::InvalidCommand { .. }));

        let err = parse_suite(
            "image: alpine\ntests:\n  - name: a\n    expect: { stderr: { matches: '(' } }\n",
            Path::new("s.yml"),
        )
        .unwrap_err();
        assert!(matches!(err, SuiteError::InvalidPattern { ref stream, .. } if stream == "stderr"));
    }

    #[test]
    fn rejects_bad_units_and_unknown_keys() {
        let err = parse_suite(
            "image: alpine\ntests:\n  - name: a\n    timeout: soon\n",
            Path::new("s.yml"),
        )
        .unwrap_err();
        assert!(matches!(err, SuiteError::Yaml { .. }));

        for timeout in ["1e30", "99999999999999999999999h"] {
            let src = format!("image: alpine\ntests:\n  - name: a\n    timeout: {timeout}\n");
            let err = parse_suite(&src, Path::new("s.yml")).unwrap_err();
            assert!(matches!(err, SuiteError::Yaml { .. }), "{timeout}: {err}");
        }

        let err = parse_suite(
            "image: alpine\ntests:\n  - name: a\n    commnd: ls\n",
            Path::new("s.yml"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("s.yml"));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = load_suite(Path::new("/nonexistent/suite.yml")).unwrap_err();
        assert!(matches!(err, SuiteError::Io { .. }));
        assert_eq!(err.file(), "/nonexistent/suite.yml");
    }
}
