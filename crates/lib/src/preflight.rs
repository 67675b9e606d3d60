//! Precondition checks run once before any target is signed.
//!
//! Checks run in a fixed order and stop at the first failure. Nothing is
//! written until every check has passed; then the scratch and output bases are
//! created.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::git::{self, GitError};
use crate::plan::TargetPlan;
use crate::sandbox::{SandboxError, SandboxRunner, guix};
use crate::target::Target;

fn list_targets(entries: &[(Target, PathBuf)]) -> String {
  entries
    .iter()
    .map(|(target, path)| format!("  {}: {}", target, path.display()))
    .collect::<Vec<_>>()
    .join("\n")
}

#[derive(Debug, Error)]
pub enum PreflightError {
  #[error("required tools are not installed or not in PATH: {}", .0.join(", "))]
  MissingTools(Vec<String>),

  #[error("DETACHED_SIGS_REPO must be set to the detached signatures checkout")]
  DetachedSigsUnset,

  #[error("DETACHED_SIGS_REPO must be a non-empty directory: {0}")]
  DetachedSigsEmpty(PathBuf),

  #[error(
    "{0} has uncommitted changes\n\
     Commit or stash them, or set FORCE_DIRTY_WORKTREE=1 to sign anyway"
  )]
  DirtyWorktree(PathBuf),

  #[error(
    "scratch directories from an earlier run already exist:\n{}\n\
     Remove them before signing again",
    list_targets(.0)
  )]
  ScratchDirsExist(Vec<(Target, PathBuf)>),

  #[error(
    "unsigned tarballs are missing for these targets:\n{}\n\
     Build the unsigned release first",
    list_targets(.0)
  )]
  MissingInputs(Vec<(Target, PathBuf)>),

  #[error(
    "could not reach the guix daemon through `{program}`: {detail}\n\
     Make sure guix-daemon is running, e.g. `sudo systemctl restart guix-daemon`"
  )]
  DaemonUnreachable { program: String, detail: String },

  #[error("interrupted while probing the guix daemon")]
  Interrupted,

  #[error(transparent)]
  Git(#[from] GitError),

  #[error("failed to create {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

pub fn check_tools(config: &RunConfig) -> Result<(), PreflightError> {
  let missing: Vec<String> = config
    .required_tools()
    .into_iter()
    .filter(|tool| which::which(tool).is_err())
    .map(str::to_string)
    .collect();

  if missing.is_empty() {
    Ok(())
  } else {
    Err(PreflightError::MissingTools(missing))
  }
}

/// The detached signatures location must be set and hold something.
pub fn check_detached_sigs(config: &RunConfig) -> Result<&Path, PreflightError> {
  let sigs = config
    .detached_sigs_repo
    .as_deref()
    .ok_or(PreflightError::DetachedSigsUnset)?;

  let non_empty = std::fs::read_dir(sigs)
    .map(|mut entries| entries.next().is_some())
    .unwrap_or(false);
  if !non_empty {
    return Err(PreflightError::DetachedSigsEmpty(sigs.to_path_buf()));
  }
  Ok(sigs)
}

pub async fn check_clean_worktrees(config: &RunConfig, sigs: &Path) -> Result<(), PreflightError> {
  if config.force_dirty_worktree {
    info!("FORCE_DIRTY_WORKTREE set, skipping clean worktree checks");
    return Ok(());
  }

  for dir in [config.source_dir.as_path(), sigs] {
    if !git::is_clean(dir).await? {
      return Err(PreflightError::DirtyWorktree(dir.to_path_buf()));
    }
  }
  Ok(())
}

pub fn check_scratch_dirs(plans: &[TargetPlan]) -> Result<(), PreflightError> {
  let existing: Vec<_> = plans
    .iter()
    .filter(|plan| plan.distsrc.exists())
    .map(|plan| (plan.target.clone(), plan.distsrc.clone()))
    .collect();

  if existing.is_empty() {
    Ok(())
  } else {
    Err(PreflightError::ScratchDirsExist(existing))
  }
}

pub fn check_inputs(plans: &[TargetPlan]) -> Result<(), PreflightError> {
  let missing: Vec<_> = plans
    .iter()
    .filter(|plan| !plan.unsigned_tarball.is_file())
    .map(|plan| (plan.target.clone(), plan.unsigned_tarball.clone()))
    .collect();

  if missing.is_empty() {
    Ok(())
  } else {
    Err(PreflightError::MissingInputs(missing))
  }
}

pub async fn check_daemon<R: SandboxRunner>(config: &RunConfig, runner: &R) -> Result<(), PreflightError> {
  let probe = guix::daemon_probe(config);
  let unreachable = |detail: String| PreflightError::DaemonUnreachable {
    program: probe.display(),
    detail,
  };

  match runner.run(&probe).await {
    Ok(outcome) if outcome.success() => Ok(()),
    Ok(outcome) => {
      let stderr = outcome.stderr.trim();
      Err(unreachable(if stderr.is_empty() {
        format!("exit code {:?}", outcome.code)
      } else {
        stderr.to_string()
      }))
    }
    Err(SandboxError::Interrupted { .. }) => Err(PreflightError::Interrupted),
    Err(e) => Err(unreachable(e.to_string())),
  }
}

/// Run every check, then create the scratch and output base directories.
pub async fn run<R: SandboxRunner>(config: &RunConfig, runner: &R) -> Result<(), PreflightError> {
  check_tools(config)?;
  debug!(tools = ?config.required_tools(), "required tools present");

  let sigs = check_detached_sigs(config)?;
  check_clean_worktrees(config, sigs).await?;

  let plans = TargetPlan::for_all(config);
  check_scratch_dirs(&plans)?;
  check_inputs(&plans)?;

  check_daemon(config, runner).await?;
  debug!("sandbox daemon reachable");

  for dir in [&config.distsrc_base, &config.outdir_base] {
    std::fs::create_dir_all(dir).map_err(|source| PreflightError::CreateDir {
      path: dir.clone(),
      source,
    })?;
  }

  info!(targets = config.targets.len(), "preflight checks passed");
  Ok(())
}
