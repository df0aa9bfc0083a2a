use super::Failure;
use crate::docker::ImageInfo;
use crate::suite::ImageExpect;
use crate::units::format_bytes;

/// Compare static image configuration with the suite's `inspect` block.
pub fn check_image(expect: &ImageExpect, info: &ImageInfo) -> Vec<Failure> {
    let mut failures = Vec::new();

    if let Some(limit) = expect.max_size
        && info.size > limit.bytes()
    {
        failures.push(Failure::new(
            "max_size",
            format!(
                "image is {}, limit {}",
                format_bytes(info.size),
                format_bytes(limit.bytes())
            ),
        ));
    }

    if let Some(user) = &expect.user
        && user != &info.user
    {
        failures.push(Failure::new(
            "user",
            format!("expected user {user:?}, image has {:?}", info.user),
        ));
    }

    if let Some(workdir) = &expect.workdir
        && workdir != &info.workdir
    {
        failures.push(Failure::new(
            "workdir",
            format!("expected workdir {workdir:?}, image has {:?}", info.workdir),
        ));
    }

    for port in &expect.exposed_ports {
        if !info.exposed_ports.iter().any(|p| ports_equal(p, port)) {
            failures.push(Failure::new(
                "exposed_ports",
                format!("port {port} is not exposed (exposed: {:?})", info.exposed_ports),
            ));
        }
    }

    for (key, want) in &expect.env {
        match info.env.get(key) {
            Some(got) if got == want => {}
            Some(got) => failures.push(Failure::new(
                "env",
                format!("env {key}: expected {want:?}, got {got:?}"),
            )),
            None => failures.push(Failure::new("env", format!("env {key} is not set"))),
        }
    }

    for (key, want) in &expect.labels {
        match info.labels.get(key) {
            Some(got) if got == want => {}
            Some(got) => failures.push(Failure::new(
                "labels",
                format!("label {key}: expected {want:?}, got {got:?}"),
            )),
            None => failures.push(Failure::new("labels", format!("label {key} is missing"))),
        }
    }

    if let Some(entrypoint) = &expect.entrypoint
        && entrypoint != &info.entrypoint
    {
        failures.push(Failure::new(
            "entrypoint",
            format!("expected entrypoint {entrypoint:?}, got {:?}", info.entrypoint),
        ));
    }

    if let Some(cmd) = &expect.cmd
        && cmd != &info.cmd
    {
        failures.push(Failure::new(
            "cmd",
            format!("expected cmd {cmd:?}, got {:?}", info.cmd),
        ));
    }

    failures
}

/// `8080` is shorthand for `8080/tcp`, matching docker's own default.
fn ports_equal(exposed: &str, wanted: &str) -> bool {
    let normalize = |p: &str| {
        if p.contains('/') {
            p.to_ascii_lowercase()
        } else {
            format!("{p}/tcp")
        }
    };
    normalize(exposed) == normalize(wanted)
}
