//! Tuning policy files.
//!
//! The policy lives in `~/.config/fpvtune/policy.toml` unless a path is given on the
//! command line or in `FPVTUNE_POLICY_FILE`.

use anyhow::{anyhow, Context, Result};
use fpvtune_core::TuningPolicy;
use std::ffi::OsString;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const POLICY_ENV: &str = "FPVTUNE_POLICY_FILE";
const POLICY_FILE: &str = "policy.toml";

/// Where the effective policy path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySource {
    Flag,
    Env,
    ConfigDir,
}

impl PolicySource {
    pub fn label(&self) -> &'static str {
        match self {
            PolicySource::Flag => "--policy",
            PolicySource::Env => POLICY_ENV,
            PolicySource::ConfigDir => "config directory",
        }
    }
}

fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("fpvtune"))
}

fn resolve_with(
    explicit: Option<&Path>,
    env: Option<OsString>,
    config_dir: Option<PathBuf>,
) -> Option<(PathBuf, PolicySource)> {
    if let Some(path) = explicit {
        return Some((path.to_path_buf(), PolicySource::Flag));
    }
    if let Some(path) = env.filter(|value| !value.is_empty()) {
        return Some((PathBuf::from(path), PolicySource::Env));
    }
    config_dir.map(|dir| (dir.join(POLICY_FILE), PolicySource::ConfigDir))
}

/// The policy path in effect: `--policy`, then `FPVTUNE_POLICY_FILE`, then the
/// user config directory.
pub fn resolve_policy_path(explicit: Option<&Path>) -> Option<(PathBuf, PolicySource)> {
    resolve_with(explicit, std::env::var_os(POLICY_ENV), config_dir())
}

/// Load the policy in effect. A missing file in the config directory means defaults;
/// a missing file the user named is an error.
pub fn load_policy(explicit: Option<&Path>) -> Result<TuningPolicy> {
    let Some((path, source)) = resolve_policy_path(explicit) else {
        return Ok(TuningPolicy::default());
    };
    match load_policy_file(&path) {
        Ok(Some(policy)) => Ok(policy),
        Ok(None) if source == PolicySource::ConfigDir => {
            debug!(path = %path.display(), "no policy file, using defaults");
            Ok(TuningPolicy::default())
        }
        Ok(None) => Err(anyhow!(
            "Policy file '{}' (from {}) does not exist",
            path.display(),
            source.label()
        )),
        Err(err) => Err(err),
    }
}

/// Read one policy file. `Ok(None)` when it does not exist. A file that does not
/// parse is moved aside to `<name>.corrupt` and defaults are returned.
pub fn load_policy_file(path: &Path) -> Result<Option<TuningPolicy>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("Failed to read policy file '{}'", path.display()))
        }
    };

    match toml::from_str::<TuningPolicy>(&content) {
        Ok(mut policy) => {
            policy.sanitize();
            Ok(Some(policy))
        }
        Err(err) => {
            let backup = preserve_corrupt_policy(path, &content);
            warn!(
                path = %path.display(),
                backup = %backup.display(),
                error = %err,
                "policy file is corrupt; a backup was saved and defaults were loaded"
            );
            Ok(Some(TuningPolicy::default()))
        }
    }
}

pub fn to_toml(policy: &TuningPolicy) -> Result<String> {
    toml::to_string_pretty(policy).context("Failed to serialize policy")
}

/// Write the policy (sanitized) to `path`, creating parent directories.
pub fn save_policy(policy: &TuningPolicy, path: &Path) -> Result<()> {
    let mut sanitized = policy.clone();
    sanitized.sanitize();
    let content = to_toml(&sanitized)?;

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| {
            format!("Failed to create policy directory '{}'", dir.display())
        })?;
    }
    write_atomic(path, &content)
        .with_context(|| format!("Failed to write policy file '{}'", path.display()))
}

fn preserve_corrupt_policy(path: &Path, content: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".corrupt");
    let corrupt_path = PathBuf::from(name);
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
    corrupt_path
}

fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let tmp_path = path.with_extension("toml.tmp");
    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    drop(file);

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolution_order() {
        let flag = PathBuf::from("/tmp/flag.toml");
        let dir = PathBuf::from("/home/pilot/.config/fpvtune");

        let (path, source) =
            resolve_with(Some(&flag), Some("env.toml".into()), Some(dir.clone())).unwrap();
        assert_eq!((path, source), (flag, PolicySource::Flag));

        let (path, source) = resolve_with(None, Some("env.toml".into()), Some(dir.clone())).unwrap();
        assert_eq!((path, source), (PathBuf::from("env.toml"), PolicySource::Env));

        let (path, source) = resolve_with(None, Some(OsString::new()), Some(dir.clone())).unwrap();
        assert_eq!(path, dir.join("policy.toml"));
        assert_eq!(source, PolicySource::ConfigDir);

        assert!(resolve_with(None, None, None).is_none());
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempdir().unwrap();
        assert!(load_policy_file(&dir.path().join("policy.toml"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        fs::write(
            &path,
            "search_depth = 3\n\n[p_window]\nmin = 150.0\nmax = 25.0\n",
        )
        .unwrap();

        let policy = load_policy_file(&path).unwrap().unwrap();
        assert_eq!(policy.search_depth, 3);
        assert_eq!(policy.p_window.min, 25.0);
        assert_eq!(policy.p_window.max, 150.0);
        assert_eq!(policy.narrative_limit, TuningPolicy::default().narrative_limit);
    }

    #[test]
    fn test_corrupt_file_is_backed_up_and_defaults_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        fs::write(&path, "search_depth = [not toml").unwrap();

        let policy = load_policy_file(&path).unwrap().unwrap();
        assert_eq!(policy, TuningPolicy::default());
        assert!(!path.exists());
        let backup = dir.path().join("policy.toml.corrupt");
        assert_eq!(
            fs::read_to_string(backup).unwrap(),
            "search_depth = [not toml"
        );
    }

    #[test]
    fn test_saved_policy_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("policy.toml");
        let mut policy = TuningPolicy::default();
        policy.narrative_limit = 3;
        policy.frame_gain_scale.seven = 1.2;

        save_policy(&policy, &path).unwrap();
        let loaded = load_policy_file(&path).unwrap().unwrap();
        assert_eq!(loaded, policy);
        assert!(!dir.path().join("nested").join("policy.toml.tmp").exists());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_policy(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
