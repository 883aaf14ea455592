//! Git integration: branch, HEAD and changed-file discovery.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::domain::error::{QaError, Result};

/// Git metadata consumed by the stack detector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitContext {
    /// Current branch, `None` when detached.
    pub branch: Option<String>,
    pub head_sha: Option<String>,
    /// Files changed relative to the base ref plus uncommitted and untracked
    /// files. `None` when changes were not requested.
    pub changed_files: Option<Vec<PathBuf>>,
}

/// Source of git metadata for a repository root.
pub trait GitProbe: Send + Sync {
    fn context(&self, root: &Path, base_ref: Option<&str>, want_changes: bool)
        -> Result<GitContext>;
}

/// Probe that shells out to the `git` executable.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandGitProbe;

impl GitProbe for CommandGitProbe {
    fn context(
        &self,
        root: &Path,
        base_ref: Option<&str>,
        want_changes: bool,
    ) -> Result<GitContext> {
        if !is_git_repo(root) {
            return Err(QaError::GitError(format!(
                "{} is not inside a git work tree",
                root.display()
            )));
        }
        let branch = current_branch(root)?;
        let head_sha = capture_head_sha(root).ok();
        let changed_files = if want_changes {
            Some(changed_files(root, base_ref)?)
        } else {
            None
        };
        Ok(GitContext {
            branch,
            head_sha,
            changed_files,
        })
    }
}

fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| QaError::GitError(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(QaError::GitError(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Capture the HEAD commit SHA from a git repository.
pub fn capture_head_sha(repo_dir: &Path) -> Result<String> {
    let sha = run_git(repo_dir, &["rev-parse", "HEAD"])?.trim().to_string();
    if sha.is_empty() {
        return Err(QaError::GitError(
            "git rev-parse HEAD returned empty output".to_string(),
        ));
    }
    Ok(sha)
}

/// Check whether a directory is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Current branch name, `None` when HEAD is detached or unborn.
pub fn current_branch(repo_dir: &Path) -> Result<Option<String>> {
    match run_git(repo_dir, &["rev-parse", "--abbrev-ref", "HEAD"]) {
        Ok(out) => {
            let name = out.trim();
            Ok((!name.is_empty() && name != "HEAD").then(|| name.to_string()))
        }
        // Unborn branch: fall back to the symbolic ref.
        Err(_) => Ok(run_git(repo_dir, &["symbolic-ref", "--short", "HEAD"])
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())),
    }
}

/// Changed files relative to `repo_dir`, sorted and deduplicated.
///
/// Combines `<base>...HEAD` (when a base ref is given), uncommitted changes
/// against HEAD and untracked files.
pub fn changed_files(repo_dir: &Path, base_ref: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();
    if let Some(base) = base_ref {
        let range = format!("{base}...HEAD");
        collect_lines(
            &run_git(repo_dir, &["diff", "--name-only", "--relative", &range])?,
            &mut files,
        );
    }
    collect_lines(
        &run_git(repo_dir, &["diff", "--name-only", "--relative", "HEAD"])?,
        &mut files,
    );
    collect_lines(
        &run_git(repo_dir, &["ls-files", "--others", "--exclude-standard"])?,
        &mut files,
    );
    Ok(files.into_iter().collect())
}

fn collect_lines(output: &str, into: &mut BTreeSet<PathBuf>) {
    into.extend(
        output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(PathBuf::from),
    );
}
