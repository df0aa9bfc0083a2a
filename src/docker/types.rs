use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Cooperative cancellation token backed by an `AtomicBool`.
///
/// A token made with [`CancelToken::child`] also reports cancelled once any
/// ancestor is cancelled; cancelling the child leaves the parent untouched.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
            || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }
}

/// Describes a container invocation. `args` is the full argument list passed
/// to the docker CLI; the runner layer is responsible for assembling it.
#[derive(Debug, Clone)]
pub struct ContainerCommand {
    pub docker: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    /// Name given via `--name`. Needed to sample stats and to force-remove on timeout.
    pub container_name: Option<String>,
    /// Sampling period for `docker stats`. `None` disables sampling.
    pub stats_interval: Option<Duration>,
}

/// Peak resource usage observed while a container ran.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourcePeak {
    pub memory_bytes: Option<u64>,
    pub cpu_percent: Option<f64>,
    pub samples: usize,
}

impl ResourcePeak {
    pub fn record(&mut self, memory_bytes: Option<u64>, cpu_percent: Option<f64>) {
        if let Some(m) = memory_bytes {
            self.memory_bytes = Some(self.memory_bytes.map_or(m, |cur| cur.max(m)));
        }
        if let Some(c) = cpu_percent {
            self.cpu_percent = Some(self.cpu_percent.map_or(c, |cur| cur.max(c)));
        }
        self.samples += 1;
    }
}

/// Outcome of a container run.
#[derive(Debug, Clone)]
pub struct ContainerResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
    pub cancelled: bool,
    pub timed_out: bool,
    pub peak: ResourcePeak,
}

impl ContainerResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.cancelled && !self.timed_out
    }

    /// Interleaving is lost, so the combined log is stdout followed by stderr.
    pub fn combined_log(&self) -> String {
        let mut log = self.stdout.clone();
        log.push_str(&self.stderr);
        log
    }
}

/// Streamed output from a running container.
#[derive(Debug)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
    Done(ContainerResult),
}
