use std::collections::BTreeMap;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Static characteristics of an image, as reported by `docker image inspect`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub id: String,
    pub size: u64,
    pub user: String,
    pub workdir: String,
    pub env: BTreeMap<String, String>,
    pub exposed_ports: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub entrypoint: Vec<String>,
    pub cmd: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawImage {
    #[serde(default)]
    id: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    config: Option<RawConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawConfig {
    #[serde(default)]
    user: String,
    #[serde(default)]
    working_dir: String,
    #[serde(default)]
    env: Option<Vec<String>>,
    #[serde(default)]
    exposed_ports: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    entrypoint: Option<Vec<String>>,
    #[serde(default)]
    cmd: Option<Vec<String>>,
}

/// Parse the JSON printed by `docker image inspect` (either an array or a single object).
pub fn parse_inspect_json(raw: &str) -> Result<ImageInfo> {
    let value: serde_json::Value =
        serde_json::from_str(raw.trim()).context("image inspect output is not JSON")?;
    let object = match value {
        serde_json::Value::Array(mut items) => {
            if items.is_empty() {
                bail!("image inspect returned no images");
            }
            items.swap_remove(0)
        }
        other => other,
    };
    let image: RawImage =
        serde_json::from_value(object).context("unexpected image inspect structure")?;
    let config = image.config.unwrap_or_default();

    let env = config
        .env
        .unwrap_or_default()
        .into_iter()
        .map(|entry| match entry.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (entry, String::new()),
        })
        .collect();

    Ok(ImageInfo {
        id: image.id,
        size: image.size,
        user: config.user,
        workdir: config.working_dir,
        env,
        exposed_ports: config
            .exposed_ports
            .map(|ports| ports.into_keys().collect())
            .unwrap_or_default(),
        labels: config.labels.unwrap_or_default(),
        entrypoint: config.entrypoint.unwrap_or_default(),
        cmd: config.cmd.unwrap_or_default(),
    })
}

pub fn inspect_image(docker: &str, image: &str) -> Result<ImageInfo> {
    let output = Command::new(docker)
        .args(["image", "inspect", image])
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("failed to invoke `{docker} image inspect`"))?;
    if !output.status.success() {
        bail!(
            "cannot inspect image {image}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    parse_inspect_json(&String::from_utf8_lossy(&output.stdout))
        .with_context(|| format!("failed to read inspect data for {image}"))
}

/// Whether the image exists locally.
pub fn image_present(docker: &str, image: &str) -> bool {
    Command::new(docker)
        .args(["image", "inspect", image])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn pull_image(docker: &str, image: &str) -> Result<()> {
    info!(image, "pulling image");
    let output = Command::new(docker)
        .args(["pull", "--quiet", image])
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("failed to invoke `{docker} pull`"))?;
    if !output.status.success() {
        bail!(
            "failed to pull {image}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
