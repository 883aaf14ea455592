//! Stack detection: which scopes apply to an invocation.
//!
//! [`detect`] is a pure function of the file list, git metadata and scope
//! definitions. Gathering those inputs from disk and git happens in
//! [`collect_workspace`] behind the [`FileSource`] and [`GitProbe`] traits.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::domain::{QaError, RequestError, Result, ScopeDef, ScopeSelector};
use crate::git::{GitContext, GitProbe};

/// Enumerates candidate files under a repository root.
pub trait FileSource: Send + Sync {
    /// Files relative to `root`, sorted.
    fn files(&self, root: &Path) -> Result<Vec<PathBuf>>;

    /// Whether a relative path is excluded from checking.
    fn is_excluded(&self, _relative: &Path) -> bool {
        false
    }
}

/// Walks the tree with `walkdir`, skipping `.git` and excluded globs.
#[derive(Debug, Clone)]
pub struct WalkdirFileSource {
    excludes: GlobSet,
}

impl WalkdirFileSource {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                QaError::Configuration(format!("invalid exclude glob {pattern:?}: {e}"))
            })?;
            builder.add(glob);
        }
        let excludes = builder
            .build()
            .map_err(|e| QaError::Configuration(format!("invalid exclude globs: {e}")))?;
        Ok(Self { excludes })
    }

    // A directory is pruned when a file directly inside it would be excluded.
    fn prunes_dir(&self, relative: &Path) -> bool {
        relative.file_name().is_some_and(|n| n == ".git")
            || self.excludes.is_match(relative.join("_"))
    }
}

impl FileSource for WalkdirFileSource {
    fn files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                entry
                    .path()
                    .strip_prefix(root)
                    .map(|rel| !self.prunes_dir(rel))
                    .unwrap_or(true)
            });
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(root) {
                if !self.excludes.is_match(rel) {
                    files.push(rel.to_path_buf());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    fn is_excluded(&self, relative: &Path) -> bool {
        self.excludes.is_match(relative)
            || relative
                .components()
                .any(|c| matches!(c, Component::Normal(n) if n == ".git"))
    }
}

/// Inputs gathered for one run: the file set and optional git metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workspace {
    pub root: PathBuf,
    /// Candidate files relative to `root`, sorted and deduplicated.
    pub files: Vec<PathBuf>,
    pub git: Option<GitContext>,
}

/// How to gather the workspace file set.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkspaceQuery<'a> {
    /// Explicit files replace enumeration entirely.
    pub explicit_files: &'a [PathBuf],
    pub changed_only: bool,
    pub base_ref: Option<&'a str>,
}

/// Gather files and git metadata.
///
/// Git problems never fail the run: they are logged and the tree is scanned
/// in full instead.
pub fn collect_workspace(
    root: &Path,
    source: &dyn FileSource,
    probe: &dyn GitProbe,
    query: &WorkspaceQuery<'_>,
) -> Result<Workspace> {
    let git = match probe.context(root, query.base_ref, query.changed_only) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            if query.changed_only && query.explicit_files.is_empty() {
                tracing::warn!(error = %e, "git unavailable, scanning the full tree");
            } else {
                tracing::debug!(error = %e, "no git context");
            }
            None
        }
    };

    let files = if !query.explicit_files.is_empty() {
        explicit_files(root, query.explicit_files)?
    } else if query.changed_only {
        match git.as_ref().and_then(|g| g.changed_files.as_ref()) {
            Some(changed) => changed
                .iter()
                .filter(|f| root.join(f).is_file() && !source.is_excluded(f))
                .cloned()
                .collect(),
            None => source.files(root)?,
        }
    } else {
        source.files(root)?
    };

    let mut files = files;
    files.sort();
    files.dedup();
    Ok(Workspace {
        root: root.to_path_buf(),
        files,
        git,
    })
}

fn explicit_files(root: &Path, requested: &[PathBuf]) -> Result<Vec<PathBuf>> {
    requested
        .iter()
        .map(|path| {
            let relative = normalize_relative(root, path);
            if !root.join(&relative).is_file() {
                return Err(QaError::from(RequestError::MissingFile(path.clone())));
            }
            Ok(relative)
        })
        .collect()
}

/// Express a user-supplied path relative to `root`, dropping `./` segments.
pub fn normalize_relative(root: &Path, path: &Path) -> PathBuf {
    let stripped = if path.is_absolute() {
        path.strip_prefix(root).unwrap_or(path)
    } else {
        path
    };
    stripped
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Active scopes for a file set and optional git metadata. Deterministic.
pub fn detect(files: &[PathBuf], git: Option<&GitContext>, defs: &[ScopeDef]) -> BTreeSet<String> {
    let branch = git.and_then(|g| g.branch.as_deref());
    defs.iter()
        .filter(|def| {
            branch.is_some_and(|b| def.matches_branch(b))
                || files
                    .iter()
                    .any(|f| def.owns_file(f) || def.is_marker(f))
        })
        .map(|def| def.name.clone())
        .collect()
}

/// Scope definitions a run targets: the named ones, or the detected ones.
pub fn select_scopes(
    selector: &ScopeSelector,
    detected: &BTreeSet<String>,
    defs: &[ScopeDef],
) -> Result<Vec<ScopeDef>> {
    match selector {
        ScopeSelector::Auto => Ok(defs
            .iter()
            .filter(|def| detected.contains(&def.name))
            .cloned()
            .collect()),
        ScopeSelector::Named(names) => names
            .iter()
            .map(|name| {
                defs.iter()
                    .find(|def| &def.name == name)
                    .cloned()
                    .ok_or_else(|| QaError::from(RequestError::UnknownScope(name.clone())))
            })
            .collect(),
    }
}
