//! Read-only queries against git working trees.
//!
//! These shell out to the `git` CLI, which is already a required tool for a run,
//! through `tokio::process` so callers on the runtime are never blocked.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GitError {
  #[error("failed to run git in {dir}: {source}")]
  Spawn {
    dir: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("`git {args}` failed in {dir}: {stderr}")]
  Failed { args: String, dir: PathBuf, stderr: String },

  #[error("unexpected output from `git {args}`: {output:?}")]
  Parse { args: String, output: String },
}

async fn git(dir: &Path, args: &[&str]) -> Result<std::process::Output, GitError> {
  debug!(dir = ?dir, args = ?args, "running git");
  Command::new("git")
    .arg("-C")
    .arg(dir)
    .args(args)
    .output()
    .await
    .map_err(|source| GitError::Spawn {
      dir: dir.to_path_buf(),
      source,
    })
}

async fn git_stdout(dir: &Path, args: &[&str]) -> Result<String, GitError> {
  let output = git(dir, args).await?;
  if !output.status.success() {
    return Err(GitError::Failed {
      args: args.join(" "),
      dir: dir.to_path_buf(),
      stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    });
  }
  Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Version string for HEAD.
///
/// An exact tag on HEAD wins (with a leading `v` stripped); otherwise the
/// 12-character abbreviated commit hash is used.
pub async fn head_version(dir: &Path) -> Result<String, GitError> {
  let described = git(dir, &["describe", "--exact-match", "HEAD"]).await?;
  if described.status.success() {
    let tag = String::from_utf8_lossy(&described.stdout).trim().to_string();
    if !tag.is_empty() {
      return Ok(tag.strip_prefix('v').unwrap_or(&tag).to_string());
    }
  }

  git_stdout(dir, &["rev-parse", "--short=12", "HEAD"]).await
}

/// Committer timestamp of HEAD, in seconds since the Unix epoch.
pub async fn head_commit_time(dir: &Path) -> Result<u64, GitError> {
  let args = ["log", "--format=%ct", "-1"];
  let out = git_stdout(dir, &args).await?;
  out.parse().map_err(|_| GitError::Parse {
    args: args.join(" "),
    output: out,
  })
}

/// Whether the working tree has no uncommitted changes to tracked files.
pub async fn is_clean(dir: &Path) -> Result<bool, GitError> {
  let out = git_stdout(dir, &["status", "--porcelain", "--untracked-files=no"]).await?;
  Ok(out.is_empty())
}

/// Absolute path of the repository's common git directory.
///
/// Worktrees point back at it, so the sandbox needs it exposed to read history.
pub async fn common_dir(dir: &Path) -> Result<PathBuf, GitError> {
  let out = git_stdout(dir, &["rev-parse", "--git-common-dir"]).await?;
  let path = PathBuf::from(&out);
  let path = if path.is_absolute() { path } else { dir.join(path) };
  Ok(dunce::canonicalize(&path).unwrap_or(path))
}
