use std::path::{Path, PathBuf};

use crate::{
    config::ConfigFile,
    error::{Error, Result},
};

pub const ROOT_ENV_VAR: &str = "ARXIV_BRAIN_ROOT";

/// Index file name inside the knowledge root.
pub const STORE_FILE_NAME: &str = ".brain.redb";

const DEFAULT_ROOT: &str = "knowledge/arxiv";

/// Current user's home directory from `$HOME`.
pub(crate) fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

/// Expand a leading `~` against `home`.
fn expand_home(raw: &str, home: Option<&Path>) -> PathBuf {
    match (raw.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home.to_path_buf(),
        (Some(rest), Some(home)) if rest.starts_with('/') => {
            home.join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(raw),
    }
}

/// The knowledge root: category/project directories plus the index file.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the knowledge root from, in order of priority:
    /// 1. An explicit path (from --root)
    /// 2. The ARXIV_BRAIN_ROOT environment variable
    /// 3. `arxiv_root` in the config file
    /// 4. `~/knowledge/arxiv`
    ///
    /// The directory is not created.
    pub fn resolve(explicit: Option<&Path>, config: &ConfigFile) -> Result<Self> {
        let env = std::env::var(ROOT_ENV_VAR).ok();
        let root = pick_root(
            explicit,
            env.as_deref(),
            config.arxiv_root.as_deref(),
            home_dir().as_deref(),
        )?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_path(&self) -> PathBuf {
        self.root.join(STORE_FILE_NAME)
    }
}

fn pick_root(
    explicit: Option<&Path>,
    env: Option<&str>,
    configured: Option<&str>,
    home: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(val) = env.filter(|v| !v.trim().is_empty()) {
        return Ok(expand_home(val, home));
    }
    if let Some(val) = configured.filter(|v| !v.trim().is_empty()) {
        return Ok(expand_home(val, home));
    }
    home.map(|h| h.join(DEFAULT_ROOT)).ok_or_else(|| {
        Error::Config(
            "could not determine the knowledge root: HOME is not set (pass --root)"
                .into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_with_explicit_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path()), &ConfigFile::default()).unwrap();

        assert_eq!(dir.root(), tmp.path());
        assert_eq!(dir.store_path(), tmp.path().join(".brain.redb"));
    }

    #[test]
    fn explicit_beats_env_and_config() {
        let root = pick_root(
            Some(Path::new("/flag")),
            Some("/env"),
            Some("/config"),
            Some(Path::new("/home/u")),
        )
        .unwrap();
        assert_eq!(root, PathBuf::from("/flag"));
    }

    #[test]
    fn env_beats_config() {
        let root =
            pick_root(None, Some("/env"), Some("/config"), Some(Path::new("/h")))
                .unwrap();
        assert_eq!(root, PathBuf::from("/env"));
    }

    #[test]
    fn config_value_expands_tilde() {
        let root = pick_root(
            None,
            None,
            Some("~/papers/arxiv"),
            Some(Path::new("/home/u")),
        )
        .unwrap();
        assert_eq!(root, PathBuf::from("/home/u/papers/arxiv"));
    }

    #[test]
    fn blank_values_are_ignored() {
        let root =
            pick_root(None, Some(""), Some("  "), Some(Path::new("/home/u")))
                .unwrap();
        assert_eq!(root, PathBuf::from("/home/u/knowledge/arxiv"));
    }

    #[test]
    fn no_home_and_nothing_configured_is_an_error() {
        assert!(matches!(
            pick_root(None, None, None, None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn tilde_variants() {
        let home = Some(Path::new("/home/u"));
        assert_eq!(expand_home("~", home), PathBuf::from("/home/u"));
        assert_eq!(expand_home("~/kb", home), PathBuf::from("/home/u/kb"));
        assert_eq!(expand_home("~other/kb", home), PathBuf::from("~other/kb"));
        assert_eq!(expand_home("~/kb", None), PathBuf::from("~/kb"));
        assert_eq!(expand_home("/abs", home), PathBuf::from("/abs"));
    }
}
