//! Git history navigation for architecture snapshots.
//!
//! Checkouts for old versions go to scratch directories so the working tree
//! is never touched. All git invocations shell out to the `git` binary.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use tempfile::TempDir;

const SHORT_HASH_LEN: usize = 8;
const MAX_MESSAGE_LEN: usize = 100;

/// Field separator for `git log --format` output, chosen because it cannot
/// appear in commit metadata.
const SEP: char = '\x1f';

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("repository path does not exist: {0}")]
    RepoNotFound(PathBuf),
    #[error("not a git repository: {0}")]
    NotARepository(PathBuf),
    #[error("cannot resolve ref '{0}'")]
    InvalidRef(String),
    #[error("git {context} failed: {stderr}")]
    Command { context: String, stderr: String },
    #[error("checkout task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitInfo {
    pub hash: String,
    pub short_hash: String,
    pub message: String,
    pub author: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchInfo {
    pub name: String,
    pub is_remote: bool,
    pub head_commit: String,
}

/// Files changed between two refs, grouped by change type.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangedFiles {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
    pub renamed: Vec<(String, String)>,
}

/// Navigates a repository's history and produces isolated checkouts.
///
/// Scratch checkouts are tracked and removed by [`close`](Self::close) or on
/// drop, whichever comes first. `close` is idempotent.
#[derive(Debug)]
pub struct GitNavigator {
    repo_path: PathBuf,
    temp_dirs: Arc<Mutex<Vec<TempDir>>>,
}

impl GitNavigator {
    pub fn open(repo_path: impl Into<PathBuf>) -> Result<Self, GitError> {
        let repo_path = repo_path.into();
        if !repo_path.exists() {
            return Err(GitError::RepoNotFound(repo_path));
        }
        let check = run_git(&repo_path, &["rev-parse", "--git-dir"], "rev-parse");
        if check.is_err() {
            return Err(GitError::NotARepository(repo_path));
        }
        Ok(Self {
            repo_path,
            temp_dirs: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Recent commits on `branch` (or the current branch), newest first.
    pub fn list_commits(
        &self,
        max_count: usize,
        branch: Option<&str>,
    ) -> Result<Vec<CommitInfo>, GitError> {
        let max = max_count.to_string();
        let format = format!("--format=%H{SEP}%an <%ae>{SEP}%at{SEP}%s");
        let mut args = vec!["log", "--max-count", &max, &format];
        if let Some(branch) = branch {
            args.push(branch);
        }

        let stdout = run_git(&self.repo_path, &args, "log")?;
        Ok(stdout.lines().filter_map(parse_commit_line).collect())
    }

    /// Commit metadata for one ref.
    pub fn commit_info(&self, reference: &str) -> Result<CommitInfo, GitError> {
        let format = format!("--format=%H{SEP}%an <%ae>{SEP}%at{SEP}%s");
        let stdout = run_git(
            &self.repo_path,
            &["log", "-1", &format, reference],
            "log",
        )
        .map_err(|_| GitError::InvalidRef(reference.to_string()))?;
        stdout
            .lines()
            .next()
            .and_then(parse_commit_line)
            .ok_or_else(|| GitError::InvalidRef(reference.to_string()))
    }

    /// All branches; remote-tracking branches included on request
    /// (`origin/HEAD` is skipped).
    pub fn list_branches(&self, include_remote: bool) -> Result<Vec<BranchInfo>, GitError> {
        let format = "--format=%(refname:short)\x1f%(objectname)";
        let mut branches = Vec::new();

        let local = run_git(&self.repo_path, &["branch", format], "branch")?;
        for line in local.lines() {
            if let Some(branch) = parse_branch_line(line, false) {
                branches.push(branch);
            }
        }

        if include_remote {
            let remote = run_git(&self.repo_path, &["branch", "-r", format], "branch")?;
            for line in remote.lines() {
                if let Some(branch) = parse_branch_line(line, true) {
                    if !branch.name.ends_with("/HEAD") {
                        branches.push(branch);
                    }
                }
            }
        }

        Ok(branches)
    }

    /// Resolve a ref to its full commit hash.
    pub fn resolve_ref(&self, reference: &str) -> Result<String, GitError> {
        let spec = format!("{reference}^{{commit}}");
        run_git(&self.repo_path, &["rev-parse", "--verify", &spec], "rev-parse")
            .map(|out| out.trim().to_string())
            .map_err(|_| GitError::InvalidRef(reference.to_string()))
    }

    /// Files changed between two refs.
    pub fn changed_files(&self, base: &str, target: &str) -> Result<ChangedFiles, GitError> {
        let base = self.resolve_ref(base)?;
        let target = self.resolve_ref(target)?;
        let stdout = run_git(
            &self.repo_path,
            &["diff", "--name-status", "-M", &base, &target],
            "diff",
        )?;

        let mut changed = ChangedFiles::default();
        for line in stdout.lines() {
            let mut fields = line.split('\t');
            let Some(status) = fields.next() else {
                continue;
            };
            match (status.chars().next(), fields.next(), fields.next()) {
                (Some('A'), Some(path), _) => changed.added.push(path.to_string()),
                (Some('M'), Some(path), _) => changed.modified.push(path.to_string()),
                (Some('D'), Some(path), _) => changed.deleted.push(path.to_string()),
                (Some('R'), Some(from), Some(to)) => {
                    changed.renamed.push((from.to_string(), to.to_string()));
                }
                _ => {}
            }
        }
        Ok(changed)
    }

    /// Check out `reference` into a fresh scratch directory and return its
    /// path. The clone and checkout run on the blocking pool.
    pub async fn checkout_to_temp(&self, reference: &str) -> Result<PathBuf, GitError> {
        let repo_path = self.repo_path.clone();
        let temp_dirs = Arc::clone(&self.temp_dirs);
        let reference = reference.to_string();

        tokio::task::spawn_blocking(move || {
            let short: String = reference.chars().take(SHORT_HASH_LEN).collect();
            let temp_dir = tempfile::Builder::new()
                .prefix(&format!("blueprint_diff_{short}_"))
                .tempdir()?;
            let dest = temp_dir.path().to_path_buf();

            run_git(
                Path::new("."),
                &[
                    "clone",
                    "--no-checkout",
                    &repo_path.to_string_lossy(),
                    &dest.to_string_lossy(),
                ],
                "clone",
            )?;
            run_git(&dest, &["checkout", &reference], "checkout")
                .map_err(|_| GitError::InvalidRef(reference.clone()))?;

            tracing::info!("checked out {reference} to {}", dest.display());
            // The TempDir guard keeps the directory alive until close().
            temp_dirs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(temp_dir);
            Ok(dest)
        })
        .await?
    }

    /// Remove all scratch checkouts. Safe to call more than once.
    pub fn close(&self) {
        let dirs: Vec<TempDir> = {
            let mut guard = self.temp_dirs.lock().unwrap_or_else(PoisonError::into_inner);
            guard.drain(..).collect()
        };
        for dir in dirs {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!("failed to clean up {}: {e}", path.display());
            }
        }
    }
}

impl Drop for GitNavigator {
    fn drop(&mut self) {
        self.close();
    }
}

fn parse_commit_line(line: &str) -> Option<CommitInfo> {
    let mut fields = line.split(SEP);
    let hash = fields.next()?.to_string();
    let author = fields.next()?.to_string();
    let timestamp: i64 = fields.next()?.parse().ok()?;
    let subject = fields.next().unwrap_or_default();
    if hash.is_empty() {
        return None;
    }

    Some(CommitInfo {
        short_hash: hash.chars().take(SHORT_HASH_LEN).collect(),
        hash,
        message: subject.trim().chars().take(MAX_MESSAGE_LEN).collect(),
        author,
        date: Utc.timestamp_opt(timestamp, 0).single()?,
    })
}

fn parse_branch_line(line: &str, is_remote: bool) -> Option<BranchInfo> {
    let mut fields = line.trim().split(SEP);
    let name = fields.next()?.trim().to_string();
    let commit = fields.next()?.trim();
    if name.is_empty() || commit.is_empty() {
        return None;
    }
    Some(BranchInfo {
        name,
        is_remote,
        head_commit: commit.chars().take(SHORT_HASH_LEN).collect(),
    })
}

fn run_git(cwd: &Path, args: &[&str], context: &str) -> Result<String, GitError> {
    let output = Command::new("git").args(args).current_dir(cwd).output()?;
    if !output.status.success() {
        return Err(GitError::Command {
            context: context.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
