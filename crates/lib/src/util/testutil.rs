//! Test utilities for detsign-lib.
//!
//! Git fixtures are created with the `git` CLI; sandbox runs go through
//! [`FakeRunner`], which records every command instead of spawning it.

use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

use tempfile::TempDir;

use crate::config::{RunConfig, SandboxSettings};
use crate::consts::{DEFAULT_MANIFEST, DEFAULT_STAGE_SCRIPT};
use crate::plan::TargetPlan;
use crate::sandbox::{CommandSpec, RunOutcome, SandboxError, SandboxRunner};
use crate::target::Target;

/// Fixed date so commit timestamps are predictable.
const FIXTURE_DATE: &str = "@1700000000 +0000";

/// Run git with a fixed identity and dates, panicking on failure.
pub fn run_git(dir: &Path, args: &[&str]) {
  let status = Command::new("git")
    .arg("-C")
    .arg(dir)
    .args(["-c", "user.name=detsign", "-c", "user.email=detsign@example.invalid"])
    .args(["-c", "commit.gpgsign=false", "-c", "init.defaultBranch=main"])
    .args(args)
    .env("GIT_AUTHOR_DATE", FIXTURE_DATE)
    .env("GIT_COMMITTER_DATE", FIXTURE_DATE)
    .status()
    .unwrap_or_else(|e| panic!("failed to run git {args:?}: {e}"));
  assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

/// Initialize a repository with one committed README.
pub fn init_repo(dir: &Path) {
  std::fs::create_dir_all(dir).unwrap();
  run_git(dir, &["init", "-q"]);
  std::fs::write(dir.join("README"), "fixture\n").unwrap();
  commit_all(dir, "initial");
}

pub fn commit_all(dir: &Path, message: &str) {
  run_git(dir, &["add", "-A"]);
  run_git(dir, &["commit", "-q", "-m", message]);
}

/// Returns a command that runs `script` through `/bin/sh -c`.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> CommandSpec {
  CommandSpec::new("/bin/sh").args(["-c", script])
}

/// Config rooted in `root` with pinned version and timestamp. Touches nothing on disk.
pub fn test_config(root: &Path, targets: &[&str]) -> RunConfig {
  let source_dir = root.join("source");
  RunConfig {
    package: "pkg".to_string(),
    version: "27.0".to_string(),
    targets: targets.iter().copied().map(Target::new).collect(),
    distsrc_base: root.join("distsrc"),
    outdir_base: root.join("output"),
    profiles_base: root.join("profiles"),
    jobs: 4,
    source_date_epoch: 1_700_000_000,
    detached_sigs_repo: Some(root.join("sigs")),
    sources_path: None,
    substitute_urls: Vec::new(),
    force_dirty_worktree: false,
    verbose: false,
    sandbox: SandboxSettings {
      program: "guix".to_string(),
      manifest: source_dir.join(DEFAULT_MANIFEST),
      stage_script: DEFAULT_STAGE_SCRIPT.to_string(),
      time_machine: None,
      common_flags: Vec::new(),
      environment_flags: Vec::new(),
      time_machine_flags: Vec::new(),
    },
    source_dir,
  }
}

/// A workspace where every precondition holds.
///
/// The source tree and signatures checkout are clean git repositories, every
/// unsigned tarball exists, and the sandbox program is `sh` so the tool check
/// passes without Guix installed.
pub struct SignFixture {
  pub temp: TempDir,
  pub config: RunConfig,
}

impl SignFixture {
  pub fn new(targets: &[&str]) -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    let mut config = test_config(&root, targets);
    config.sandbox.program = "sh".to_string();

    init_repo(&config.source_dir);
    init_repo(config.detached_sigs_repo.as_ref().unwrap());

    for plan in TargetPlan::for_all(&config) {
      std::fs::create_dir_all(plan.unsigned_tarball.parent().unwrap()).unwrap();
      std::fs::write(&plan.unsigned_tarball, b"unsigned").unwrap();
    }

    Self { temp, config }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
  Exit(i32),
  Interrupt,
  Spawn,
  /// Ctrl-C arrives after this many codesigning runs, outside any run.
  PendingInterrupt,
}

#[derive(Debug, Clone, Default)]
enum Probe {
  #[default]
  Reachable,
  Fails(String),
  Interrupted,
}

/// Records commands and answers with scripted outcomes.
///
/// The daemon probe (`gc --list-failures`) is told apart from codesigning
/// runs; faults are keyed by the index of the codesigning run.
#[derive(Debug, Default)]
pub struct FakeRunner {
  calls: Mutex<Vec<CommandSpec>>,
  probe: Probe,
  fault: Option<(usize, Fault)>,
}

fn is_probe(spec: &CommandSpec) -> bool {
  spec.args.iter().any(|arg| arg == "--list-failures")
}

impl FakeRunner {
  pub fn succeeding() -> Self {
    Self::default()
  }

  pub fn with_probe_failure(stderr: &str) -> Self {
    Self {
      probe: Probe::Fails(stderr.to_string()),
      ..Self::default()
    }
  }

  pub fn with_probe_interrupted() -> Self {
    Self {
      probe: Probe::Interrupted,
      ..Self::default()
    }
  }

  pub fn failing_at(index: usize, code: i32) -> Self {
    Self {
      fault: Some((index, Fault::Exit(code))),
      ..Self::default()
    }
  }

  pub fn interrupted_at(index: usize) -> Self {
    Self {
      fault: Some((index, Fault::Interrupt)),
      ..Self::default()
    }
  }

  pub fn spawn_error_at(index: usize) -> Self {
    Self {
      fault: Some((index, Fault::Spawn)),
      ..Self::default()
    }
  }

  /// Ctrl-C lands once `completed` codesigning runs have finished.
  pub fn interrupted_after(completed: usize) -> Self {
    Self {
      fault: Some((completed, Fault::PendingInterrupt)),
      ..Self::default()
    }
  }

  pub fn calls(&self) -> Vec<CommandSpec> {
    self.calls.lock().unwrap().clone()
  }

  /// `HOST=` value of every codesigning run, in call order.
  pub fn signed_hosts(&self) -> Vec<String> {
    self
      .calls()
      .iter()
      .filter(|spec| !is_probe(spec))
      .filter_map(|spec| spec.args.iter().find_map(|arg| arg.strip_prefix("HOST=")))
      .map(str::to_string)
      .collect()
  }
}

impl SandboxRunner for FakeRunner {
  async fn run(&self, spec: &CommandSpec) -> Result<RunOutcome, SandboxError> {
    let index = {
      let mut calls = self.calls.lock().unwrap();
      let index = calls.iter().filter(|c| !is_probe(c)).count();
      calls.push(spec.clone());
      index
    };

    if is_probe(spec) {
      return match &self.probe {
        Probe::Reachable => Ok(RunOutcome {
          code: Some(0),
          ..Default::default()
        }),
        Probe::Fails(stderr) => Ok(RunOutcome {
          code: Some(1),
          stderr: stderr.clone(),
          ..Default::default()
        }),
        Probe::Interrupted => Err(SandboxError::Interrupted {
          program: spec.program.clone(),
        }),
      };
    }

    match self.fault {
      Some((at, Fault::Exit(code))) if at == index => Ok(RunOutcome {
        code: Some(code),
        ..Default::default()
      }),
      Some((at, Fault::Interrupt)) if at == index => Err(SandboxError::Interrupted {
        program: spec.program.clone(),
      }),
      Some((at, Fault::Spawn)) if at == index => Err(SandboxError::Spawn {
        program: spec.program.clone(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such program"),
      }),
      _ => Ok(RunOutcome {
        code: Some(0),
        ..Default::default()
      }),
    }
  }

  async fn interrupt_pending(&self) -> bool {
    match self.fault {
      Some((at, Fault::PendingInterrupt)) => self.signed_hosts().len() == at,
      _ => false,
    }
  }
}
