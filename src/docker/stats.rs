use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Deserialize;
use tracing::trace;

use super::types::{CancelToken, ResourcePeak};
use crate::units::parse_size;

/// One line of `docker stats --no-stream --format "{{json .}}"`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StatsLine {
    #[serde(default)]
    mem_usage: String,
    #[serde(rename = "CPUPerc", default)]
    cpu_perc: String,
}

/// A single resource sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub memory_bytes: Option<u64>,
    pub cpu_percent: Option<f64>,
}

/// Parse a stats JSON line. Returns `None` for anything that is not a stats object.
pub fn parse_stats_line(line: &str) -> Option<Sample> {
    let stats: StatsLine = serde_json::from_str(line.trim()).ok()?;
    Some(Sample {
        memory_bytes: parse_mem_usage(&stats.mem_usage),
        cpu_percent: parse_percent(&stats.cpu_perc),
    })
}

/// `"12.5MiB / 1.944GiB"` -> bytes used.
fn parse_mem_usage(s: &str) -> Option<u64> {
    let used = s.split('/').next()?.trim();
    if used.is_empty() || used == "--" {
        return None;
    }
    parse_size(used).ok()
}

fn parse_percent(s: &str) -> Option<f64> {
    let v = s.trim().trim_end_matches('%').trim();
    if v.is_empty() || v == "--" {
        return None;
    }
    v.parse().ok()
}

/// Take one sample of a running container. `None` when the container is gone.
pub fn sample(docker: &str, container: &str) -> Option<Sample> {
    let output = Command::new(docker)
        .args(["stats", "--no-stream", "--format", "{{json .}}", container])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    text.lines().find_map(parse_stats_line)
}

/// Background poller recording peak usage until `stop` is signalled.
pub struct Sampler {
    handle: JoinHandle<()>,
    stop: CancelToken,
    peak: Arc<Mutex<ResourcePeak>>,
}

impl Sampler {
    pub fn start(docker: String, container: String, interval: Duration) -> Self {
        let stop = CancelToken::new();
        let peak = Arc::new(Mutex::new(ResourcePeak::default()));

        let stop_flag = stop.clone();
        let shared = peak.clone();
        let handle = std::thread::spawn(move || {
            while !stop_flag.is_cancelled() {
                if let Some(s) = sample(&docker, &container) {
                    trace!(container = %container, ?s, "stats sample");
                    if let Ok(mut p) = shared.lock() {
                        p.record(s.memory_bytes, s.cpu_percent);
                    }
                }
                sleep_unless_stopped(&stop_flag, interval);
            }
        });

        Self { handle, stop, peak }
    }

    pub fn finish(self) -> ResourcePeak {
        self.stop.cancel();
        let _ = self.handle.join();
        self.peak.lock().map(|p| *p).unwrap_or_default()
    }
}

fn sleep_unless_stopped(stop: &CancelToken, interval: Duration) {
    const STEP: Duration = Duration::from_millis(50);
    let mut slept = Duration::ZERO;
    while slept < interval && !stop.is_cancelled() {
        let step = STEP.min(interval - slept);
        std::thread::sleep(step);
        slept += step;
    }
}
