use std::fmt;
use std::time::Duration;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::units::HumanDuration;

/// When to fetch the image under test before running a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullPolicy {
    Always,
    Missing,
    Never,
}

impl PullPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PullPolicy::Always => "always",
            PullPolicy::Missing => "missing",
            PullPolicy::Never => "never",
        }
    }

    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Some(PullPolicy::Always),
            "missing" | "if-not-present" => Some(PullPolicy::Missing),
            "never" => Some(PullPolicy::Never),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jobs {
    Auto,
    Fixed(usize),
}

impl Jobs {
    pub fn resolve(self) -> usize {
        match self {
            Jobs::Fixed(n) => n,
            Jobs::Auto => std::thread::available_parallelism()
                .map(|n| n.get().min(4))
                .unwrap_or(1),
        }
    }

    pub fn from_str_lenient(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("auto") {
            return Some(Jobs::Auto);
        }
        match s.parse::<usize>() {
            Ok(n) if n > 0 => Some(Jobs::Fixed(n)),
            _ => None,
        }
    }
}

impl Serialize for Jobs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Jobs::Auto => serializer.serialize_str("auto"),
            Jobs::Fixed(n) => serializer.serialize_u64(*n as u64),
        }
    }
}

impl<'de> Deserialize<'de> for Jobs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct JobsVisitor;

        impl<'de> Visitor<'de> for JobsVisitor {
            type Value = Jobs;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("\"auto\" or a positive integer")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Jobs, E> {
                if value == 0 {
                    return Err(E::custom("jobs must be a positive integer"));
                }
                Ok(Jobs::Fixed(value as usize))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Jobs, E> {
                if value <= 0 {
                    return Err(E::custom("jobs must be a positive integer"));
                }
                Ok(Jobs::Fixed(value as usize))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Jobs, E> {
                if value.eq_ignore_ascii_case("auto") {
                    Ok(Jobs::Auto)
                } else {
                    Err(E::custom("jobs must be \"auto\" or a positive integer"))
                }
            }
        }

        deserializer.deserialize_any(JobsVisitor)
    }
}

/// Project-level settings, read from `.docker-unit.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The docker CLI to invoke. Anything CLI-compatible (e.g. `podman`) works.
    pub docker: String,
    pub timeout: HumanDuration,
    pub jobs: Jobs,
    pub search_depth: usize,
    pub pull: PullPolicy,
    pub stats_interval: HumanDuration,
    pub format: String,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        self.timeout.get()
    }

    pub fn stats_interval(&self) -> Duration {
        self.stats_interval.get()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docker: "docker".to_string(),
            timeout: HumanDuration::from_secs(60),
            jobs: Jobs::Auto,
            search_depth: 4,
            pull: PullPolicy::Missing,
            stats_interval: HumanDuration(Duration::from_millis(500)),
            format: "console".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg: Config = serde_yaml::from_str("timeout: 10s\n").unwrap();
        assert_eq!(cfg.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.docker, "docker");
        assert_eq!(cfg.pull, PullPolicy::Missing);
        assert_eq!(cfg.jobs, Jobs::Auto);
        assert_eq!(cfg.stats_interval(), Duration::from_millis(500));
    }

    #[test]
    fn jobs_accepts_auto_and_positive_integers() {
        let cfg: Config = serde_yaml::from_str("jobs: 3\n").unwrap();
        assert_eq!(cfg.jobs, Jobs::Fixed(3));
        let cfg: Config = serde_yaml::from_str("jobs: AUTO\n").unwrap();
        assert_eq!(cfg.jobs, Jobs::Auto);
    }

    #[test]
    fn jobs_rejects_zero() {
        assert!(serde_yaml::from_str::<Config>("jobs: 0\n").is_err());
        assert!(serde_yaml::from_str::<Config>("jobs: many\n").is_err());
    }

    #[test]
    fn jobs_auto_resolves_to_at_least_one() {
        let n = Jobs::Auto.resolve();
        assert!((1..=4).contains(&n));
        assert_eq!(Jobs::Fixed(7).resolve(), 7);
    }

    #[test]
    fn jobs_from_cli_string() {
        assert_eq!(Jobs::from_str_lenient("auto"), Some(Jobs::Auto));
        assert_eq!(Jobs::from_str_lenient("2"), Some(Jobs::Fixed(2)));
        assert_eq!(Jobs::from_str_lenient("0"), None);
    }

    #[test]
    fn pull_policy_parses_lowercase() {
        let cfg: Config = serde_yaml::from_str("pull: never\n").unwrap();
        assert_eq!(cfg.pull, PullPolicy::Never);
        assert_eq!(PullPolicy::from_str_lenient("Always"), Some(PullPolicy::Always));
        assert_eq!(PullPolicy::from_str_lenient("sometimes"), None);
    }
}
