use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::{Config, PullPolicy};
use crate::docker::ContainerCommand;
use crate::suite::{Suite, TestCase};
use crate::units::ByteSize;

static CONTAINER_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Unique per process: `docker-unit-<pid>-<seq>`.
pub fn next_container_name() -> String {
    let seq = CONTAINER_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("docker-unit-{}-{seq}", std::process::id())
}

/// A test with suite defaults and config applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTest {
    pub args: Vec<String>,
    pub entrypoint: Option<String>,
    pub env: BTreeMap<String, String>,
    pub user: Option<String>,
    pub workdir: Option<String>,
    pub timeout: Duration,
    pub memory_limit: Option<ByteSize>,
}

/// Test value, else suite default, else config.
pub fn resolve_test(suite: &Suite, test: &TestCase, cfg: &Config) -> Result<ResolvedTest, String> {
    let defaults = &suite.defaults;

    let args = match &test.command {
        Some(cmd) => cmd.to_args()?,
        None => Vec::new(),
    };

    let mut env = defaults.env.clone();
    env.extend(test.env.iter().map(|(k, v)| (k.clone(), v.clone())));

    Ok(ResolvedTest {
        args,
        entrypoint: test.entrypoint.clone(),
        env,
        user: test.user.clone().or_else(|| defaults.user.clone()),
        workdir: test.workdir.clone().or_else(|| defaults.workdir.clone()),
        timeout: test
            .timeout
            .or(defaults.timeout)
            .map_or_else(|| cfg.timeout(), |t| t.get()),
        memory_limit: test.memory_limit.or(defaults.memory_limit),
    })
}

/// Build the `docker run` invocation for one test.
pub fn build_run_command(
    cfg: &Config,
    image: &str,
    test: &ResolvedTest,
    container_name: &str,
) -> ContainerCommand {
    let mut args: Vec<String> = vec![
        "run".into(),
        "--rm".into(),
        "--name".into(),
        container_name.to_string(),
        "--label".into(),
        "docker-unit=1".into(),
    ];

    if let Some(entrypoint) = &test.entrypoint {
        args.extend(["--entrypoint".into(), entrypoint.clone()]);
    }
    for (key, value) in &test.env {
        args.extend(["-e".into(), format!("{key}={value}")]);
    }
    if let Some(user) = &test.user {
        args.extend(["--user".into(), user.clone()]);
    }
    if let Some(workdir) = &test.workdir {
        args.extend(["--workdir".into(), workdir.clone()]);
    }
    if let Some(limit) = test.memory_limit {
        args.extend(["--memory".into(), limit.docker_arg()]);
    }

    // Images are fetched up front according to the pull policy.
    args.extend(["--pull".into(), "never".into()]);
    args.push(image.to_string());
    args.extend(test.args.iter().cloned());

    ContainerCommand {
        docker: cfg.docker.clone(),
        args,
        timeout: test.timeout,
        container_name: Some(container_name.to_string()),
        stats_interval: Some(cfg.stats_interval()),
    }
}

/// Pull policy in force for a suite: the suite's own setting wins over config.
pub fn effective_pull(suite: &Suite, cfg: &Config) -> PullPolicy {
    suite.pull.unwrap_or(cfg.pull)
}

/// Whether `suite/test` passes the `--filter` substring.
pub fn filter_matches(filter: Option<&str>, suite: &str, test: &str) -> bool {
    match filter {
        None => true,
        Some(f) if f.is_empty() => true,
        Some(f) => format!("{suite}/{test}").contains(f),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::parse_suite;
    use crate::units::HumanDuration;
    use std::path::Path;

    fn suite() -> Suite {
        parse_suite(
            r#"
image: alpine:3.19
pull: always
defaults:
  timeout: 20s
  env: { A: "1", B: "2" }
  user: "1000"
  memory_limit: 64MiB
tests:
  - name: plain
    command: echo "a b"
  - name: override
    command: [cat, /etc/os-release]
    entrypoint: ""
    env: { B: "3" }
    user: root
    workdir: /etc
    timeout: 1s
  - name: image-default
"#,
            Path::new("alpine.yml"),
        )
        .unwrap()
    }

    #[test]
    fn resolve_applies_defaults() {
        let s = suite();
        let cfg = Config::default();
        let t = resolve_test(&s, &s.tests[0], &cfg).unwrap();
        assert_eq!(t.args, vec!["echo", "a b"]);
        assert_eq!(t.timeout, Duration::from_secs(20));
        assert_eq!(t.user.as_deref(), Some("1000"));
        assert_eq!(t.env["B"], "2");
        assert_eq!(t.memory_limit.unwrap().bytes(), 64 * 1024 * 1024);
    }

    #[test]
    fn resolve_prefers_test_values() {
        let s = suite();
        let t = resolve_test(&s, &s.tests[1], &Config::default()).unwrap();
        assert_eq!(t.env["A"], "1");
        assert_eq!(t.env["B"], "3");
        assert_eq!(t.user.as_deref(), Some("root"));
        assert_eq!(t.workdir.as_deref(), Some("/etc"));
        assert_eq!(t.timeout, Duration::from_secs(1));
        assert_eq!(t.entrypoint.as_deref(), Some(""));
    }

    #[test]
    fn resolve_falls_back_to_config_timeout() {
        let mut s = suite();
        s.defaults.timeout = None;
        let cfg = Config {
            timeout: HumanDuration::from_secs(7),
            ..Config::default()
        };
        let t = resolve_test(&s, &s.tests[2], &cfg).unwrap();
        assert!(t.args.is_empty());
        assert_eq!(t.timeout, Duration::from_secs(7));
    }

    #[test]
    fn run_command_layout() {
        let s = suite();
        let cfg = Config::default();
        let t = resolve_test(&s, &s.tests[1], &cfg).unwrap();
        let cmd = build_run_command(&cfg, &s.image, &t, "docker-unit-1-0");

        assert_eq!(&cmd.args[..4], ["run", "--rm", "--name", "docker-unit-1-0"]);
        let image_pos = cmd.args.iter().position(|a| a == "alpine:3.19").unwrap();
        assert_eq!(&cmd.args[image_pos + 1..], ["cat", "/etc/os-release"]);

        let joined = cmd.args.join(" ");
        assert!(joined.contains("-e A=1"));
        assert!(joined.contains("-e B=3"));
        assert!(joined.contains("--user root"));
        assert!(joined.contains("--workdir /etc"));
        assert!(joined.contains(&format!("--memory {}b", 64 * 1024 * 1024)));
        assert!(cmd.args.contains(&"--entrypoint".to_string()));
        assert_eq!(cmd.timeout, Duration::from_secs(1));
        assert_eq!(cmd.container_name.as_deref(), Some("docker-unit-1-0"));
        assert_eq!(cmd.stats_interval, Some(cfg.stats_interval()));
    }

    #[test]
    fn container_names_are_unique() {
        let a = next_container_name();
        let b = next_container_name();
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("docker-unit-{}-", std::process::id())));
    }

    #[test]
    fn suite_pull_overrides_config() {
        let s = suite();
        assert_eq!(effective_pull(&s, &Config::default()), PullPolicy::Always);
    }

    #[test]
    fn filter_is_substring_of_qualified_name() {
        assert!(filter_matches(None, "web", "health"));
        assert!(filter_matches(Some("web/"), "web", "health"));
        assert!(filter_matches(Some("heal"), "web", "health"));
        assert!(!filter_matches(Some("api"), "web", "health"));
    }
}
