use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

/// Verify that the Docker daemon is reachable through `docker`.
pub fn ensure_available(docker: &str) -> Result<()> {
    let status = Command::new(docker)
        .args(["version", "--format", "{{.Server.Version}}"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .with_context(|| format!("failed to invoke `{docker}`; is it installed and on PATH?"))?;

    if !status.success() {
        bail!("docker daemon is not reachable via `{docker}` (exit {status})");
    }
    Ok(())
}

/// Force-remove a container by name. A container that is already gone is not an error.
pub fn remove_container(docker: &str, name: &str) {
    debug!(container = name, "force-removing container");
    match Command::new(docker)
        .args(["rm", "-f", name])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(_) => {}
        Err(e) => warn!(container = name, "failed to run `{docker} rm -f`: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_available_does_not_panic() {
        // CI may or may not have Docker.
        let _ = ensure_available("docker");
    }

    #[test]
    fn ensure_available_reports_missing_binary() {
        let err = ensure_available("definitely-not-a-docker-binary").unwrap_err();
        assert!(err.to_string().contains("definitely-not-a-docker-binary"));
    }

    #[test]
    fn remove_container_tolerates_missing_binary() {
        remove_container("definitely-not-a-docker-binary", "nothing");
    }
}
