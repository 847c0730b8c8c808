use std::{
    fmt,
    path::{Path, PathBuf},
};

use globset::GlobSet;
use serde::Serialize;
use walkdir::WalkDir;

/// Per-project summary document.
pub const SUMMARY_FILE: &str = "SUMMARY.md";
/// Per-project metadata document.
pub const INFO_FILE: &str = "info.yaml";
/// Per-project directory holding code files.
pub const PLAYGROUND_DIR: &str = "playground";

/// Provenance of an indexed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Summary,
    Info,
    Code,
}

impl SourceTag {
    pub const ALL: [SourceTag; 3] =
        [SourceTag::Summary, SourceTag::Info, SourceTag::Code];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceTag::Summary => "summary",
            SourceTag::Info => "info",
            SourceTag::Code => "code",
        }
    }

    /// Single-byte encoding used in stored chunk records.
    pub fn to_byte(self) -> u8 {
        match self {
            SourceTag::Summary => 0,
            SourceTag::Info => 1,
            SourceTag::Code => 2,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(SourceTag::Summary),
            1 => Some(SourceTag::Info),
            2 => Some(SourceTag::Code),
            _ => None,
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document discovered under the knowledge root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub tag: SourceTag,
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Non-hidden child directories of `dir`, sorted by name. Symlinks to
/// directories count. Unreadable directories have no children.
fn visible_subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        tracing::debug!(path = %dir.display(), "skipping unreadable directory");
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| !is_hidden(&entry.file_name()))
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn project_documents(
    project: PathBuf,
    code_files: GlobSet,
) -> impl Iterator<Item = SourceDocument> {
    let fixed = [(SUMMARY_FILE, SourceTag::Summary), (INFO_FILE, SourceTag::Info)]
        .into_iter()
        .map(|(name, tag)| (project.join(name), tag))
        .filter(|(path, _)| path.is_file())
        .map(|(path, tag)| SourceDocument { path, tag })
        .collect::<Vec<_>>();

    let code = WalkDir::new(project.join(PLAYGROUND_DIR))
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(move |entry| code_files.is_match(entry.file_name()))
        .map(|entry| SourceDocument {
            path: entry.into_path(),
            tag: SourceTag::Code,
        });

    fixed.into_iter().chain(code)
}

/// Lazily enumerate indexable documents under `root`.
///
/// Expects `<root>/<category>/<project>/` directories. Each project yields
/// its `SUMMARY.md`, its `info.yaml`, then every file under `playground/`
/// whose name matches `code_files`. Symlinks are followed; link cycles
/// under `playground/` are skipped.
///
/// Hidden entries are skipped at every level, including inside
/// `playground/`, so virtualenvs and `.git` directories there are never
/// indexed. A missing or unreadable root yields nothing.
pub fn walk_sources(
    root: &Path,
    code_files: &GlobSet,
) -> impl Iterator<Item = SourceDocument> + use<> {
    let categories = match root.canonicalize() {
        Ok(root) => visible_subdirs(&root),
        Err(e) => {
            tracing::debug!(path = %root.display(), error = %e, "knowledge root not readable");
            Vec::new()
        }
    };
    let code_files = code_files.clone();

    categories
        .into_iter()
        .flat_map(|category| visible_subdirs(&category))
        .flat_map(move |project| project_documents(project, code_files.clone()))
}
