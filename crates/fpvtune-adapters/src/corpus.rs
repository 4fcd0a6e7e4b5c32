//! Captured-response corpora for replay.
//!
//! A corpus is either a directory with a `corpus.toml` manifest, a manifest file, or
//! a plain directory of `.txt`, `.md` and `.json` captures.

use anyhow::{anyhow, Context, Result};
use fpvtune_core::{Locale, Provenance, TuningHints};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

pub const MANIFEST_FILE: &str = "corpus.toml";
const CAPTURE_EXTENSIONS: [&str; 3] = ["txt", "md", "json"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusManifest {
    pub schema_version: u32,
    #[serde(default)]
    pub case: Vec<CorpusCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusCase {
    pub id: String,
    /// Capture path, relative to the corpus root.
    pub file: PathBuf,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub frame_size: Option<String>,
    #[serde(default)]
    pub flying_style: Option<String>,
    #[serde(default)]
    pub expect_provenance: Option<Provenance>,
}

impl CorpusCase {
    pub fn locale(&self) -> Locale {
        self.locale.as_deref().map(Locale::parse).unwrap_or_default()
    }

    pub fn hints(&self) -> TuningHints {
        TuningHints::from_text(self.frame_size.as_deref(), self.flying_style.as_deref())
    }
}

impl CorpusManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read corpus manifest '{}'", path.display()))?;
        let manifest: CorpusManifest = toml::from_str(&content).with_context(|| {
            format!("Failed to parse corpus manifest TOML '{}'", path.display())
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        if self.schema_version != 1 {
            return Err(anyhow!(
                "Unsupported corpus manifest schema_version={} (expected 1)",
                self.schema_version
            ));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for case in &self.case {
            if case.id.trim().is_empty() {
                return Err(anyhow!("Corpus case id must not be empty"));
            }
            if !is_valid_id(&case.id) {
                return Err(anyhow!(
                    "Corpus case id '{}' contains unsupported characters (allowed: a-zA-Z0-9_-)",
                    case.id
                ));
            }
            if !seen.insert(case.id.as_str()) {
                return Err(anyhow!("Duplicate corpus case id '{}'", case.id));
            }
            if !is_safe_relative_path(&case.file) {
                return Err(anyhow!(
                    "Corpus case '{}' file '{}' is unsafe (must be relative, no traversal)",
                    case.id,
                    case.file.display()
                ));
            }
        }
        Ok(())
    }
}

fn is_valid_id(id: &str) -> bool {
    id.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}

fn is_safe_relative_path(path: &Path) -> bool {
    if path.as_os_str().is_empty() || path.is_absolute() {
        return false;
    }
    for component in path.components() {
        match component {
            Component::CurDir | Component::Normal(_) => {}
            _ => return false,
        }
    }
    true
}

/// A loaded corpus: cases plus the directory their files are relative to.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub root: PathBuf,
    pub cases: Vec<CorpusCase>,
}

impl Corpus {
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_file() {
            let manifest = CorpusManifest::load(path)?;
            let root = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            return Ok(Self {
                root,
                cases: manifest.case,
            });
        }
        if !path.is_dir() {
            return Err(anyhow!("Corpus path '{}' does not exist", path.display()));
        }

        let manifest_path = path.join(MANIFEST_FILE);
        let cases = if manifest_path.is_file() {
            CorpusManifest::load(&manifest_path)?.case
        } else {
            discover(path)?
        };
        Ok(Self {
            root: path.to_path_buf(),
            cases,
        })
    }

    pub fn read(&self, case: &CorpusCase) -> Result<String> {
        let path = self.root.join(&case.file);
        std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read capture '{}' for case '{}'",
                path.display(),
                case.id
            )
        })
    }
}

/// Locale from a `_zh` / `-zh` / `.zh` stem suffix; English otherwise.
fn locale_from_stem(stem: &str) -> Option<String> {
    let lower = stem.to_ascii_lowercase();
    ["_zh", "-zh", ".zh"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
        .then(|| "zh".to_string())
}

fn case_id(relative: &Path) -> String {
    let stem = relative.with_extension("");
    stem.to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Every capture under `dir`, in path order, with ids derived from relative paths.
pub fn discover(dir: &Path) -> Result<Vec<CorpusCase>> {
    let mut cases = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("Failed to walk corpus directory '{}'", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_capture = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| CAPTURE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if !is_capture {
            continue;
        }
        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };

        let base = case_id(relative);
        let mut id = base.clone();
        let mut n = 2;
        while !seen.insert(id.clone()) {
            id = format!("{}-{}", base, n);
            n += 1;
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        cases.push(CorpusCase {
            id,
            file: relative.to_path_buf(),
            locale: locale_from_stem(&stem),
            frame_size: None,
            flying_style: None,
            expect_provenance: None,
        });
    }
    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpvtune_core::{FlyingStyle, FrameSize};
    use std::fs;
    use tempfile::tempdir;

    fn write_manifest(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join(MANIFEST_FILE);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_manifest_loads_cases() {
        let dir = tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            r#"
schema_version = 1

[[case]]
id = "table-7in"
file = "captures/table.md"
locale = "zh-CN"
frame_size = "7 inch"
flying_style = "racing"
expect_provenance = "markdown-fallback"

[[case]]
id = "plain"
file = "plain.json"
"#,
        );

        let manifest = CorpusManifest::load(&path).unwrap();
        assert_eq!(manifest.case.len(), 2);
        let first = &manifest.case[0];
        assert_eq!(first.locale(), Locale::Zh);
        assert_eq!(
            first.hints(),
            TuningHints::new(FrameSize::Seven, FlyingStyle::Racing)
        );
        assert_eq!(first.expect_provenance, Some(Provenance::MarkdownFallback));
        assert_eq!(manifest.case[1].locale(), Locale::En);
        assert_eq!(manifest.case[1].hints(), TuningHints::default());
    }

    #[test]
    fn test_manifest_rejects_duplicate_ids() {
        let dir = tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            "schema_version = 1\n[[case]]\nid = \"a\"\nfile = \"a.txt\"\n[[case]]\nid = \"a\"\nfile = \"b.txt\"\n",
        );
        let err = CorpusManifest::load(&path).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_manifest_rejects_bad_ids_and_paths() {
        let dir = tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            "schema_version = 1\n[[case]]\nid = \"a b\"\nfile = \"a.txt\"\n",
        );
        assert!(CorpusManifest::load(&path).is_err());

        let path = write_manifest(
            dir.path(),
            "schema_version = 1\n[[case]]\nid = \"a\"\nfile = \"../secret.txt\"\n",
        );
        let err = CorpusManifest::load(&path).unwrap_err();
        assert!(err.to_string().contains("unsafe"));
    }

    #[test]
    fn test_manifest_rejects_unknown_schema() {
        let dir = tempdir().unwrap();
        let path = write_manifest(dir.path(), "schema_version = 2\n");
        let err = CorpusManifest::load(&path).unwrap_err();
        assert!(err.to_string().contains("schema_version=2"));
    }

    #[test]
    fn test_discover_without_manifest() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("deepseek")).unwrap();
        fs::write(dir.path().join("deepseek").join("run 1_zh.md"), "表格").unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("a.txt"), "text").unwrap();
        fs::write(dir.path().join("notes.log"), "ignored").unwrap();

        let corpus = Corpus::open(dir.path()).unwrap();
        let ids: Vec<&str> = corpus.cases.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a-2", "deepseek_run_1_zh"]);
        assert_eq!(corpus.cases[2].locale(), Locale::Zh);
        assert_eq!(corpus.read(&corpus.cases[1]).unwrap(), "text");
    }

    #[test]
    fn test_open_manifest_file_uses_parent_as_root() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("one.txt"), "set p_roll = 52").unwrap();
        let path = write_manifest(
            dir.path(),
            "schema_version = 1\n[[case]]\nid = \"one\"\nfile = \"one.txt\"\n",
        );
        let corpus = Corpus::open(&path).unwrap();
        assert_eq!(corpus.root, dir.path());
        assert_eq!(corpus.read(&corpus.cases[0]).unwrap(), "set p_roll = 52");
    }
}
