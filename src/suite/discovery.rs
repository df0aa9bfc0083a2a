use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::debug;
use walkdir::WalkDir;

pub const WELL_KNOWN_NAMES: [&str; 2] = ["docker-unit.yml", "docker-unit.yaml"];

/// Walk the directory tree to find suite files.
/// Returns a sorted list of paths, joined onto `root`.
pub fn discover_suites(root: &Path, max_depth: usize) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("not a directory: {}", root.display());
    }

    // A well-known name at the root short-circuits the walk.
    for name in WELL_KNOWN_NAMES {
        let candidate = root.join(name);
        if candidate.is_file() {
            return Ok(vec![candidate]);
        }
    }

    let mut matches = Vec::new();
    let walker = WalkDir::new(root)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !should_skip(e));

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if is_yaml(path) && is_suite(path) {
            matches.push(path.to_path_buf());
        }
    }

    matches.sort();
    debug!(root = %root.display(), found = matches.len(), "suite discovery");
    Ok(matches)
}

/// Turn CLI arguments into suite files. Files are taken as given,
/// directories are searched, and no arguments means searching `root`.
pub fn resolve_suite_paths(root: &Path, args: &[PathBuf], max_depth: usize) -> Result<Vec<PathBuf>> {
    if args.is_empty() {
        return discover_suites(root, max_depth);
    }

    let mut paths = Vec::new();
    for arg in args {
        let path = if arg.is_absolute() {
            arg.clone()
        } else {
            root.join(arg)
        };
        if path.is_dir() {
            paths.extend(discover_suites(&path, max_depth)?);
        } else if path.is_file() {
            paths.push(path);
        } else {
            bail!("suite file not found: {}", path.display());
        }
    }
    paths.dedup();
    Ok(paths)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml" | "YAML" | "YML")
    )
}

/// A suite is a YAML mapping with both `image` and `tests` at the top level.
fn is_suite(path: &Path) -> bool {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };
    let mut content = String::new();
    if file.read_to_string(&mut content).is_err() {
        return false;
    }
    let doc: serde_yaml::Value = match serde_yaml::from_str(&content) {
        Ok(v) => v,
        Err(_) => return false,
    };
    match doc {
        serde_yaml::Value::Mapping(mapping) => {
            let keys: Vec<&str> = mapping.keys().filter_map(|k| k.as_str()).collect();
            keys.contains(&"image") && keys.contains(&"tests")
        }
        _ => false,
    }
}

fn should_skip(entry: &walkdir::DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    matches!(
        entry.file_name().to_str().unwrap_or_default(),
        ".git" | "target" | "node_modules" | ".idea" | ".vscode"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SUITE: &str = "image: alpine\ntests:\n  - name: a\n";

    #[test]
    fn discover_finds_well_known_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("docker-unit.yml"), SUITE).unwrap();
        fs::write(dir.path().join("other.yml"), SUITE).unwrap();

        let suites = discover_suites(dir.path(), 4).unwrap();
        assert_eq!(suites, vec![dir.path().join("docker-unit.yml")]);
    }

    #[test]
    fn discover_finds_nested_suites_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("images");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("web.yml"), SUITE).unwrap();
        fs::write(sub.join("api.yaml"), SUITE).unwrap();

        let suites = discover_suites(dir.path(), 4).unwrap();
        assert_eq!(suites, vec![sub.join("api.yaml"), sub.join("web.yml")]);
    }

    #[test]
    fn discover_ignores_other_yaml() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("compose.yaml"), "services:\n  web:\n    image: nginx\n").unwrap();
        fs::write(dir.path().join("broken.yml"), "image: [\n").unwrap();

        let suites = discover_suites(dir.path(), 4).unwrap();
        assert!(suites.is_empty());
    }

    #[test]
    fn discover_skips_ignored_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let hidden = dir.path().join("node_modules").join("pkg");
        fs::create_dir_all(&hidden).unwrap();
        fs::write(hidden.join("suite.yml"), SUITE).unwrap();

        let suites = discover_suites(dir.path(), 4).unwrap();
        assert!(suites.is_empty());
    }

    #[test]
    fn discover_respects_depth() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("a").join("b").join("c");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("suite.yml"), SUITE).unwrap();

        assert!(discover_suites(dir.path(), 2).unwrap().is_empty());
        assert_eq!(discover_suites(dir.path(), 4).unwrap().len(), 1);
    }

    #[test]
    fn resolve_mixes_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("more");
        fs::create_dir_all(&sub).unwrap();
        fs::write(dir.path().join("one.yml"), SUITE).unwrap();
        fs::write(sub.join("two.yml"), SUITE).unwrap();

        let paths = resolve_suite_paths(
            dir.path(),
            &[PathBuf::from("one.yml"), PathBuf::from("more")],
            4,
        )
        .unwrap();
        assert_eq!(paths, vec![dir.path().join("one.yml"), sub.join("two.yml")]);
    }

    #[test]
    fn resolve_rejects_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = resolve_suite_paths(dir.path(), &[PathBuf::from("nope.yml")], 4);
        assert!(result.is_err());
    }
}
