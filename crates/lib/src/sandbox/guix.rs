//! Command lines for the Guix sandbox.
//!
//! The codesigning step runs inside `guix environment --container --pure`,
//! optionally through `guix time-machine` to pin the Guix revision. Only the
//! directories listed here are visible inside the container, and only the
//! variables in [`guest_env`] reach the second-stage script.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::RunConfig;
use crate::consts::guest;
use crate::plan::TargetPlan;

use super::CommandSpec;

/// A host directory made visible inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
  pub host: PathBuf,
  /// Mount point inside the container; `None` keeps the host path.
  pub guest: Option<PathBuf>,
  pub writable: bool,
}

impl Mount {
  fn share(host: &Path, guest: Option<&str>) -> Self {
    Self {
      host: host.to_path_buf(),
      guest: guest.map(PathBuf::from),
      writable: true,
    }
  }

  fn expose(host: &Path, guest: Option<&str>) -> Self {
    Self {
      writable: false,
      ..Self::share(host, guest)
    }
  }

  pub fn to_flag(&self) -> String {
    let kind = if self.writable { "--share" } else { "--expose" };
    match &self.guest {
      Some(guest) => format!("{}={}={}", kind, self.host.display(), guest.display()),
      None => format!("{}={}", kind, self.host.display()),
    }
  }
}

/// Mounts for one codesigning run.
///
/// `git_common_dir` is exposed at its host path so git metadata in the source
/// tree still resolves inside the container.
pub fn mounts(config: &RunConfig, git_common_dir: Option<&Path>) -> Vec<Mount> {
  let mut mounts = vec![
    Mount::share(&config.source_dir, Some(guest::SOURCE)),
    Mount::share(&config.distsrc_base, Some(guest::DISTSRC_BASE)),
    Mount::share(&config.outdir_base, Some(guest::OUTDIR_BASE)),
  ];
  if let Some(sigs) = &config.detached_sigs_repo {
    mounts.push(Mount::expose(sigs, Some(guest::DETACHED_SIGS)));
  }
  if let Some(dir) = git_common_dir {
    mounts.push(Mount::expose(dir, None));
  }
  if let Some(sources) = &config.sources_path {
    mounts.push(Mount::share(sources, None));
  }
  mounts
}

/// Variables handed to the second-stage script; nothing else crosses into the container.
pub fn guest_env(config: &RunConfig, plan: &TargetPlan) -> BTreeMap<String, String> {
  let mut env = BTreeMap::new();
  env.insert("HOST".to_string(), plan.target.to_string());
  env.insert("DISTNAME".to_string(), config.distname());
  env.insert("JOBS".to_string(), config.jobs.to_string());
  env.insert("SOURCE_DATE_EPOCH".to_string(), config.source_date_epoch.to_string());
  if config.verbose {
    env.insert("V".to_string(), "1".to_string());
  }
  if let Some(sources) = &config.sources_path {
    env.insert("SOURCES_PATH".to_string(), sources.display().to_string());
  }
  env.insert("DISTSRC".to_string(), plan.guest_distsrc.display().to_string());
  env.insert("OUTDIR".to_string(), plan.guest_outdir.display().to_string());
  env.insert("DIST_ARCHIVE_BASE".to_string(), guest::DIST_ARCHIVE_BASE.to_string());
  env.insert("DETACHED_SIGS_REPO".to_string(), guest::DETACHED_SIGS.to_string());
  env.insert(
    "UNSIGNED_TARBALL".to_string(),
    plan.guest_unsigned_tarball.display().to_string(),
  );
  env
}

fn substitute_flag(config: &RunConfig) -> Option<String> {
  if config.substitute_urls.is_empty() {
    None
  } else {
    Some(format!("--substitute-urls={}", config.substitute_urls.join(" ")))
  }
}

/// Flags shared by every Guix subcommand that builds or fetches.
fn build_flags(config: &RunConfig) -> Vec<String> {
  let mut flags = vec![
    format!("--cores={}", config.jobs),
    "--keep-failed".to_string(),
    "--fallback".to_string(),
  ];
  flags.extend(substitute_flag(config));
  flags.extend(config.sandbox.common_flags.iter().cloned());
  flags
}

/// Start a Guix command line, routed through `time-machine` when pinned.
fn guix_prefix(config: &RunConfig) -> CommandSpec {
  let sandbox = &config.sandbox;
  let spec = CommandSpec::new(&sandbox.program).cwd(&config.source_dir);
  match &sandbox.time_machine {
    Some(pin) => spec
      .arg("time-machine")
      .arg(format!("--url={}", pin.url))
      .arg(format!("--commit={}", pin.commit))
      .args(build_flags(config))
      .args(sandbox.time_machine_flags.iter().cloned())
      .arg("--"),
    None => spec,
  }
}

/// Lightweight query that only succeeds when the Guix daemon answers.
pub fn daemon_probe(config: &RunConfig) -> CommandSpec {
  CommandSpec::new(&config.sandbox.program)
    .args(["gc", "--list-failures"])
    .capture()
}

/// Full command line that codesigns one target inside the container.
pub fn codesign_command(config: &RunConfig, plan: &TargetPlan, git_common_dir: Option<&Path>) -> CommandSpec {
  let env_assignments = guest_env(config, plan)
    .into_iter()
    .map(|(key, value)| format!("{}={}", key, value));
  let stage = format!("cd {} && bash {}", guest::SOURCE, config.sandbox.stage_script);

  guix_prefix(config)
    .arg("environment")
    .arg(format!("--manifest={}", config.sandbox.manifest.display()))
    .args(["--container", "--pure", "--no-cwd"])
    .args(mounts(config, git_common_dir).iter().map(Mount::to_flag))
    .args(build_flags(config))
    .arg("--link-profile")
    .arg(format!("--root={}", plan.profile.display()))
    .args(config.sandbox.environment_flags.iter().cloned())
    .arg("--")
    .arg("env")
    .args(env_assignments)
    .args(["bash", "-c"])
    .arg(stage)
}
