use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::PullPolicy;
use crate::units::{ByteSize, HumanDuration};

/// One suite file: an image and the tests run against it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Suite {
    #[serde(default)]
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub pull: Option<PullPolicy>,
    #[serde(default)]
    pub defaults: TestDefaults,
    #[serde(default)]
    pub inspect: Option<ImageExpect>,
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

/// Settings merged into every test of a suite.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestDefaults {
    pub timeout: Option<HumanDuration>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub user: Option<String>,
    pub workdir: Option<String>,
    pub memory_limit: Option<ByteSize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCase {
    #[serde(default)]
    pub name: String,
    pub command: Option<CommandSpec>,
    pub entrypoint: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub user: Option<String>,
    pub workdir: Option<String>,
    pub timeout: Option<HumanDuration>,
    pub memory_limit: Option<ByteSize>,
    pub skip: Option<Skip>,
    #[serde(default)]
    pub expect: Expect,
}

impl TestCase {
    pub fn skip_reason(&self) -> Option<String> {
        match &self.skip {
            None | Some(Skip::Flag(false)) => None,
            Some(Skip::Flag(true)) => Some("skipped".to_string()),
            Some(Skip::Reason(r)) => Some(r.clone()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Skip {
    Flag(bool),
    Reason(String),
}

/// A command as a shell-like string or an explicit argument list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Line(String),
    Args(Vec<String>),
}

impl CommandSpec {
    /// Split into argv. Strings follow POSIX shell quoting but are never run through a shell.
    pub fn to_args(&self) -> Result<Vec<String>, String> {
        let args = match self {
            CommandSpec::Line(line) => shell_words::split(line).map_err(|e| e.to_string())?,
            CommandSpec::Args(args) => args.clone(),
        };
        if args.is_empty() {
            return Err("command is empty".to_string());
        }
        Ok(args)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitExpect {
    #[default]
    Success,
    Code(i32),
    Any,
}

impl ExitExpect {
    pub fn accepts(self, code: Option<i32>) -> bool {
        match self {
            ExitExpect::Any => true,
            ExitExpect::Success => code == Some(0),
            ExitExpect::Code(want) => code == Some(want),
        }
    }

    pub fn describe(self) -> String {
        match self {
            ExitExpect::Any => "any".to_string(),
            ExitExpect::Success => "0".to_string(),
            ExitExpect::Code(c) => c.to_string(),
        }
    }
}

impl Serialize for ExitExpect {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ExitExpect::Any => serializer.serialize_str("any"),
            ExitExpect::Success => serializer.serialize_i32(0),
            ExitExpect::Code(c) => serializer.serialize_i32(*c),
        }
    }
}

impl<'de> Deserialize<'de> for ExitExpect {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ExitVisitor;

        impl<'de> Visitor<'de> for ExitVisitor {
            type Value = ExitExpect;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an exit code or \"any\"")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<ExitExpect, E> {
                i32::try_from(value)
                    .map(ExitExpect::Code)
                    .map_err(|_| E::custom("exit code out of range"))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<ExitExpect, E> {
                i32::try_from(value)
                    .map(ExitExpect::Code)
                    .map_err(|_| E::custom("exit code out of range"))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<ExitExpect, E> {
                if value.eq_ignore_ascii_case("any") {
                    Ok(ExitExpect::Any)
                } else {
                    Err(E::custom("exit_code must be an integer or \"any\""))
                }
            }
        }

        deserializer.deserialize_any(ExitVisitor)
    }
}

/// Runtime expectations for one test.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Expect {
    pub exit_code: ExitExpect,
    pub timed_out: bool,
    pub max_duration: Option<HumanDuration>,
    pub max_memory: Option<ByteSize>,
    pub max_cpu: Option<f64>,
    pub stdout: OutputExpect,
    pub stderr: OutputExpect,
}

/// Assertions over one captured output stream.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputExpect {
    pub equals: Option<String>,
    pub contains: Vec<String>,
    pub not_contains: Vec<String>,
    pub matches: Option<String>,
    pub empty: Option<bool>,
}

impl OutputExpect {
    pub fn is_empty(&self) -> bool {
        self.equals.is_none()
            && self.contains.is_empty()
            && self.not_contains.is_empty()
            && self.matches.is_none()
            && self.empty.is_none()
    }
}

/// Static expectations checked against `docker image inspect`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageExpect {
    pub max_size: Option<ByteSize>,
    pub user: Option<String>,
    pub workdir: Option<String>,
    pub exposed_ports: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub entrypoint: Option<Vec<String>>,
    pub cmd: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_is_shell_split() {
        let cmd = CommandSpec::Line(r#"sh -c "echo 'a b'""#.into());
        assert_eq!(cmd.to_args().unwrap(), vec!["sh", "-c", "echo 'a b'"]);
    }

    #[test]
    fn command_rejects_unbalanced_quotes_and_empty() {
        assert!(CommandSpec::Line("echo \"oops".into()).to_args().is_err());
        assert!(CommandSpec::Line("   ".into()).to_args().is_err());
        assert!(CommandSpec::Args(vec![]).to_args().is_err());
    }

    #[test]
    fn exit_expect_variants() {
        let e: ExitExpect = serde_yaml::from_str("3").unwrap();
        assert_eq!(e, ExitExpect::Code(3));
        let e: ExitExpect = serde_yaml::from_str("any").unwrap();
        assert!(e.accepts(None));
        assert!(ExitExpect::default().accepts(Some(0)));
        assert!(!ExitExpect::default().accepts(Some(1)));
        assert!(serde_yaml::from_str::<ExitExpect>("sometimes").is_err());
    }

    #[test]
    fn skip_accepts_flag_or_reason() {
        let t: TestCase = serde_yaml::from_str("name: a\nskip: true\n").unwrap();
        assert_eq!(t.skip_reason().as_deref(), Some("skipped"));
        let t: TestCase = serde_yaml::from_str("name: a\nskip: flaky on arm\n").unwrap();
        assert_eq!(t.skip_reason().as_deref(), Some("flaky on arm"));
        let t: TestCase = serde_yaml::from_str("name: a\nskip: false\n").unwrap();
        assert!(t.skip_reason().is_none());
    }

    #[test]
    fn unknown_expectation_keys_are_rejected() {
        assert!(serde_yaml::from_str::<Expect>("exit: 0\n").is_err());
    }
}
