use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::engine::remove_container;
use super::stats::Sampler;
use super::types::{CancelToken, ContainerCommand, ContainerResult, OutputLine, ResourcePeak};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Spawn a container and return a channel that streams its output.
///
/// The caller receives [`OutputLine::Stdout`]/[`OutputLine::Stderr`] as they arrive,
/// followed by exactly one [`OutputLine::Done`] carrying the final result.
pub fn spawn(cmd: ContainerCommand, cancel: CancelToken) -> Result<Receiver<OutputLine>> {
    debug!(docker = %cmd.docker, args = ?cmd.args, "spawning container");
    let mut child = Command::new(&cmd.docker)
        .args(&cmd.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn `{}`", cmd.docker))?;

    let stdout = child.stdout.take().context("child stdout was not piped")?;
    let stderr = child.stderr.take().context("child stderr was not piped")?;

    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        orchestrate(child, stdout, stderr, tx, cancel, cmd);
    });

    Ok(rx)
}

/// Run to completion, discarding streamed lines.
pub fn run_to_end(cmd: ContainerCommand, cancel: CancelToken) -> Result<ContainerResult> {
    let rx = spawn(cmd, cancel)?;
    for line in rx {
        if let OutputLine::Done(result) = line {
            return Ok(result);
        }
    }
    anyhow::bail!("container runner exited without a result")
}

fn forward_lines<R, F>(
    source: R,
    tx: Sender<OutputLine>,
    buf: Arc<Mutex<String>>,
    wrap: F,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
    F: Fn(String) -> OutputLine + Send + 'static,
{
    std::thread::spawn(move || {
        let reader = BufReader::new(source);
        for line in reader.lines() {
            match line {
                Ok(l) => {
                    if let Ok(mut b) = buf.lock() {
                        b.push_str(&l);
                        b.push('\n');
                    }
                    // Receiver may be dropped; ignore send errors.
                    let _ = tx.send(wrap(l));
                }
                Err(_) => break,
            }
        }
    })
}

fn orchestrate(
    mut child: Child,
    stdout: std::process::ChildStdout,
    stderr: std::process::ChildStderr,
    tx: Sender<OutputLine>,
    cancel: CancelToken,
    cmd: ContainerCommand,
) {
    let out_buf = Arc::new(Mutex::new(String::new()));
    let err_buf = Arc::new(Mutex::new(String::new()));

    let stdout_handle = forward_lines(stdout, tx.clone(), out_buf.clone(), OutputLine::Stdout);
    let stderr_handle = forward_lines(stderr, tx.clone(), err_buf.clone(), OutputLine::Stderr);

    let sampler = match (&cmd.container_name, cmd.stats_interval) {
        (Some(name), Some(interval)) => {
            Some(Sampler::start(cmd.docker.clone(), name.clone(), interval))
        }
        _ => None,
    };

    let start = Instant::now();
    let mut cancelled = false;
    let mut timed_out = false;

    let exit_status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {}
            Err(e) => {
                warn!("failed to poll docker client: {e}");
                break None;
            }
        }

        if cancel.is_cancelled() {
            cancelled = true;
            break None;
        }

        if start.elapsed() > cmd.timeout {
            timed_out = true;
            break None;
        }

        std::thread::sleep(POLL_INTERVAL);
    };
    let elapsed = start.elapsed();

    let peak = sampler.map(Sampler::finish).unwrap_or_else(ResourcePeak::default);

    if exit_status.is_none() {
        // Killing the attached client does not stop the container itself.
        if let Some(name) = &cmd.container_name {
            remove_container(&cmd.docker, name);
        }
        let _ = child.kill();
        let _ = child.wait();
    }

    let _ = stdout_handle.join();
    let _ = stderr_handle.join();

    let take = |buf: &Arc<Mutex<String>>| buf.lock().map(|b| b.clone()).unwrap_or_default();

    let _ = tx.send(OutputLine::Done(ContainerResult {
        exit_code: exit_status.and_then(|s| s.code()),
        stdout: take(&out_buf),
        stderr: take(&err_buf),
        elapsed,
        cancelled,
        timed_out,
        peak,
    }));
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    // `sh -c` stands in for the docker CLI: same process contract, no daemon needed.
    fn shell(script: &str, timeout: Duration) -> ContainerCommand {
        ContainerCommand {
            docker: "sh".into(),
            args: vec!["-c".into(), script.into()],
            timeout,
            container_name: None,
            stats_interval: None,
        }
    }

    #[test]
    fn streams_and_separates_output() {
        let rx = spawn(
            shell("echo out; echo err 1>&2; exit 3", Duration::from_secs(10)),
            CancelToken::new(),
        )
        .unwrap();
        let mut lines = Vec::new();
        let mut done = None;
        for line in rx {
            match line {
                OutputLine::Done(r) => done = Some(r),
                other => lines.push(other),
            }
        }
        let result = done.expect("missing Done");
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert!(!result.success());
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn timeout_kills_process() {
        let result = run_to_end(shell("sleep 5", Duration::from_millis(200)), CancelToken::new())
            .unwrap();
        assert!(result.timed_out);
        assert_eq!(result.exit_code, None);
        assert!(result.elapsed < Duration::from_secs(5));
    }

    #[test]
    fn cancellation_stops_process() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = run_to_end(shell("sleep 5", Duration::from_secs(10)), cancel).unwrap();
        assert!(result.cancelled);
        assert!(!result.timed_out);
    }

    #[test]
    fn spawn_fails_for_missing_binary() {
        let mut cmd = shell("true", Duration::from_secs(1));
        cmd.docker = "definitely-not-a-docker-binary".into();
        assert!(spawn(cmd, CancelToken::new()).is_err());
    }
}
