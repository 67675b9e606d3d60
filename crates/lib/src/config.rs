//! Run configuration.
//!
//! Settings arrive as environment variables (optionally overridden from the
//! command line) and are resolved exactly once into an immutable [`RunConfig`].
//! Empty variables are treated as unset.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::consts::{
  CONFLICTING_VAR, DEFAULT_MANIFEST, DEFAULT_SANDBOX_PROGRAM, DEFAULT_STAGE_SCRIPT, DEFAULT_TARGETS,
  DEFAULT_TIME_MACHINE_URL,
};
use crate::git::{self, GitError};
use crate::paths;
use crate::target::{Target, parse_targets};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error(
    "environment variable {name} is set, but guix reads it as its own verbosity level\n\
     Unset it and pass `--verbosity=<level>` through ADDITIONAL_GUIX_COMMON_FLAGS instead"
  )]
  ConflictingVar { name: &'static str },

  #[error("invalid value for {name}: {value:?} ({reason})")]
  InvalidValue {
    name: &'static str,
    value: String,
    reason: &'static str,
  },

  #[error("no targets configured; set HOSTS to a space-separated list of platform triples")]
  NoTargets,

  #[error("source tree {path} is not accessible: {source}")]
  SourceDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("could not determine {what} from the source tree: {source}")]
  Git {
    what: &'static str,
    #[source]
    source: GitError,
  },
}

/// Raw, unvalidated settings.
#[derive(Debug, Clone, Default)]
pub struct ConfigInput {
  /// Value of the conflicting variable, if the caller set it.
  pub conflicting_var: Option<String>,
  pub targets: Option<String>,
  pub force_version: Option<String>,
  pub package: Option<String>,
  pub distsrc_base: Option<PathBuf>,
  pub outdir_base: Option<PathBuf>,
  pub profiles_base: Option<PathBuf>,
  pub jobs: Option<String>,
  pub source_date_epoch: Option<String>,
  pub detached_sigs_repo: Option<PathBuf>,
  pub sources_path: Option<PathBuf>,
  pub substitute_urls: Option<String>,
  pub force_dirty_worktree: bool,
  pub verbose: bool,
  pub common_flags: Option<String>,
  pub environment_flags: Option<String>,
  pub time_machine_flags: Option<String>,
  pub sandbox_program: Option<String>,
  pub time_machine_url: Option<String>,
  pub time_machine_commit: Option<String>,
}

fn var(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn path_var(name: &str) -> Option<PathBuf> {
  var(name).map(PathBuf::from)
}

impl ConfigInput {
  /// Read every supported variable from the process environment.
  pub fn from_env() -> Self {
    Self {
      conflicting_var: var(CONFLICTING_VAR),
      targets: var("HOSTS"),
      force_version: var("FORCE_VERSION"),
      package: var("PACKAGE_NAME"),
      distsrc_base: path_var("DISTSRC_BASE"),
      outdir_base: path_var("OUTDIR_BASE"),
      profiles_base: path_var("PROFILES_BASE"),
      jobs: var("JOBS"),
      source_date_epoch: var("SOURCE_DATE_EPOCH"),
      detached_sigs_repo: path_var("DETACHED_SIGS_REPO"),
      sources_path: path_var("SOURCES_PATH"),
      substitute_urls: var("SUBSTITUTE_URLS"),
      force_dirty_worktree: var("FORCE_DIRTY_WORKTREE").is_some(),
      verbose: var("VERBOSE").is_some(),
      common_flags: var("ADDITIONAL_GUIX_COMMON_FLAGS"),
      environment_flags: var("ADDITIONAL_GUIX_ENVIRONMENT_FLAGS"),
      time_machine_flags: var("ADDITIONAL_GUIX_TIMEMACHINE_FLAGS"),
      sandbox_program: var("GUIX"),
      time_machine_url: var("GUIX_TIME_MACHINE_URL"),
      time_machine_commit: var("GUIX_TIME_MACHINE_COMMIT"),
    }
  }
}

/// Pin for running the sandbox tool at a fixed revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeMachine {
  pub url: String,
  pub commit: String,
}

#[derive(Debug, Clone)]
pub struct SandboxSettings {
  pub program: String,
  /// Package manifest, absolute.
  pub manifest: PathBuf,
  /// Second-stage script, relative to the source tree.
  pub stage_script: String,
  pub time_machine: Option<TimeMachine>,
  pub common_flags: Vec<String>,
  pub environment_flags: Vec<String>,
  pub time_machine_flags: Vec<String>,
}

/// Immutable snapshot of everything a run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
  pub source_dir: PathBuf,
  pub package: String,
  pub version: String,
  pub targets: Vec<Target>,
  pub distsrc_base: PathBuf,
  pub outdir_base: PathBuf,
  pub profiles_base: PathBuf,
  pub jobs: usize,
  pub source_date_epoch: u64,
  pub detached_sigs_repo: Option<PathBuf>,
  pub sources_path: Option<PathBuf>,
  pub substitute_urls: Vec<String>,
  pub force_dirty_worktree: bool,
  pub verbose: bool,
  pub sandbox: SandboxSettings,
}

fn split_words(value: Option<&String>) -> Vec<String> {
  value
    .map(|v| v.split_whitespace().map(str::to_string).collect())
    .unwrap_or_default()
}

fn absolute(path: &Path) -> PathBuf {
  std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn default_jobs() -> usize {
  std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

impl RunConfig {
  /// Validate `input` and fill in defaults.
  ///
  /// The conflicting-variable check runs before anything else, including any
  /// git query against `source_dir`.
  pub async fn resolve(input: &ConfigInput, source_dir: &Path) -> Result<Self, ConfigError> {
    if input.conflicting_var.is_some() {
      return Err(ConfigError::ConflictingVar { name: CONFLICTING_VAR });
    }

    let source_dir = dunce::canonicalize(source_dir).map_err(|source| ConfigError::SourceDir {
      path: source_dir.to_path_buf(),
      source,
    })?;

    let version = match &input.force_version {
      Some(version) => version.clone(),
      None => git::head_version(&source_dir).await.map_err(|source| ConfigError::Git {
        what: "the version",
        source,
      })?,
    };
    if version.chars().any(|c| c == '/' || c.is_whitespace()) {
      return Err(ConfigError::InvalidValue {
        name: if input.force_version.is_some() {
          "FORCE_VERSION"
        } else {
          "version tag on HEAD"
        },
        value: version,
        reason: "must not contain slashes or whitespace",
      });
    }

    let source_date_epoch = match &input.source_date_epoch {
      Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name: "SOURCE_DATE_EPOCH",
        value: raw.clone(),
        reason: "expected seconds since the Unix epoch",
      })?,
      None => git::head_commit_time(&source_dir).await.map_err(|source| ConfigError::Git {
        what: "SOURCE_DATE_EPOCH",
        source,
      })?,
    };

    let targets = match &input.targets {
      Some(list) => parse_targets(list),
      None => DEFAULT_TARGETS.iter().copied().map(Target::new).collect(),
    };
    if targets.is_empty() {
      return Err(ConfigError::NoTargets);
    }

    let jobs = match &input.jobs {
      Some(raw) => match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
          return Err(ConfigError::InvalidValue {
            name: "JOBS",
            value: raw.clone(),
            reason: "expected a positive integer",
          });
        }
      },
      None => default_jobs(),
    };

    let package = match &input.package {
      Some(package) => package.clone(),
      None => source_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| ConfigError::InvalidValue {
          name: "PACKAGE_NAME",
          value: String::new(),
          reason: "source tree has no directory name to derive it from",
        })?,
    };

    let version_base = paths::version_base(&source_dir, &version);
    let distsrc_base = input
      .distsrc_base
      .as_deref()
      .map(absolute)
      .unwrap_or_else(|| version_base.clone());
    let outdir_base = input
      .outdir_base
      .as_deref()
      .map(absolute)
      .unwrap_or_else(|| version_base.join("output"));
    let profiles_base = input
      .profiles_base
      .as_deref()
      .map(absolute)
      .unwrap_or_else(|| version_base.join("profiles"));

    let time_machine = input.time_machine_commit.as_ref().map(|commit| TimeMachine {
      url: input
        .time_machine_url
        .clone()
        .unwrap_or_else(|| DEFAULT_TIME_MACHINE_URL.to_string()),
      commit: commit.clone(),
    });

    let config = RunConfig {
      package,
      version,
      targets,
      distsrc_base,
      outdir_base,
      profiles_base,
      jobs,
      source_date_epoch,
      detached_sigs_repo: input.detached_sigs_repo.as_deref().map(absolute),
      sources_path: input.sources_path.as_deref().map(absolute),
      substitute_urls: split_words(input.substitute_urls.as_ref()),
      force_dirty_worktree: input.force_dirty_worktree,
      verbose: input.verbose,
      sandbox: SandboxSettings {
        program: input
          .sandbox_program
          .clone()
          .unwrap_or_else(|| DEFAULT_SANDBOX_PROGRAM.to_string()),
        manifest: source_dir.join(DEFAULT_MANIFEST),
        stage_script: DEFAULT_STAGE_SCRIPT.to_string(),
        time_machine,
        common_flags: split_words(input.common_flags.as_ref()),
        environment_flags: split_words(input.environment_flags.as_ref()),
        time_machine_flags: split_words(input.time_machine_flags.as_ref()),
      },
      source_dir,
    };

    debug!(?config, "resolved configuration");
    Ok(config)
  }

  /// Distribution name, `<package>-<version>`.
  pub fn distname(&self) -> String {
    format!("{}-{}", self.package, self.version)
  }

  /// Executables that must be on `PATH` for a run.
  pub fn required_tools(&self) -> Vec<&str> {
    vec!["git", self.sandbox.program.as_str()]
  }
}
