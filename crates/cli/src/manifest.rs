use anyhow::{Context, Result, bail};
use argbind_metadata::GroupManifest;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MANIFEST_NAME: &str = "argbind.json";

#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub path: PathBuf,
    pub manifest: GroupManifest,
}

pub fn load_manifest(manifest_path: &Path) -> Result<LoadedManifest> {
    let cwd = std::env::current_dir().context("failed to get current directory")?;
    let path = resolve_against(&cwd, manifest_path);

    if !path.exists() {
        bail!("manifest not found: {}", path.display());
    }

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read manifest: {}", path.display()))?;
    let manifest = GroupManifest::from_json(&contents)
        .with_context(|| format!("failed to parse manifest JSON: {}", path.display()))?;
    tracing::debug!(path = %path.display(), name = %manifest.name, "loaded manifest");

    Ok(LoadedManifest { path, manifest })
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let pid = std::process::id();
        let dir = std::env::temp_dir().join(format!("argbind-{prefix}-{pid}-{nanos}"));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn loads_kebab_case_manifest() {
        let dir = make_temp_dir("manifest-load");
        let path = dir.join(DEFAULT_MANIFEST_NAME);
        fs::write(
            &path,
            r#"{
  "name": "tool",
  "commands": [{
    "name": "get",
    "options": [{ "kind": "key", "keys": ["--port"], "value-type": "uint" }],
    "params": [{ "name": "url" }]
  }]
}"#,
        )
        .unwrap();

        let loaded = load_manifest(&path).unwrap();
        assert_eq!(loaded.path, path);
        assert_eq!(loaded.manifest.name, "tool");
        assert_eq!(loaded.manifest.commands.len(), 1);
        assert_eq!(loaded.manifest.commands[0].params[0].name, "url");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_manifest_is_an_error() {
        let dir = make_temp_dir("manifest-missing");
        let err = load_manifest(&dir.join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("manifest not found"), "{err}");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_manifest_names_the_file() {
        let dir = make_temp_dir("manifest-bad");
        let path = dir.join("bad.json");
        fs::write(&path, r#"{ "name": "tool", "options": [{ "kind": "switch" }] }"#).unwrap();

        let err = load_manifest(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse manifest JSON"), "{err}");

        let _ = fs::remove_dir_all(&dir);
    }
}
