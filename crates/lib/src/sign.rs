//! Per-target codesigning loop.
//!
//! Targets are signed one at a time in configured order. The first failure
//! stops the loop; targets after it are not attempted.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::RunConfig;
use crate::git;
use crate::plan::TargetPlan;
use crate::preflight::{self, PreflightError};
use crate::sandbox::{SandboxError, SandboxRunner, guix};
use crate::target::Target;

fn list_paths(paths: &[PathBuf]) -> String {
  paths
    .iter()
    .map(|path| format!("  {}", path.display()))
    .collect::<Vec<_>>()
    .join("\n")
}

#[derive(Debug, Error)]
pub enum SignError {
  #[error(transparent)]
  Preflight(#[from] PreflightError),

  #[error("codesigning {target} failed with exit code {code:?}")]
  Failed { target: Target, code: Option<i32> },

  #[error(
    "codesigning {target} was interrupted\n\
     These directories may be left in an inconsistent state and should be removed before retrying:\n{}",
    list_paths(.leftovers)
  )]
  Interrupted { target: Target, leftovers: Vec<PathBuf> },

  #[error("interrupted before codesigning {target}; it and the targets after it were not attempted")]
  Cancelled { target: Target },

  #[error("could not run the sandbox for {target}: {source}")]
  Sandbox {
    target: Target,
    #[source]
    source: SandboxError,
  },
}

/// One successfully signed target.
#[derive(Debug, Clone)]
pub struct SignedTarget {
  pub target: Target,
  pub outdir: PathBuf,
  pub elapsed: Duration,
}

#[derive(Debug, Default)]
pub struct SignReport {
  pub signed: Vec<SignedTarget>,
}

fn trace_plan(config: &RunConfig, plan: &TargetPlan) {
  info!(
    version = %config.version,
    target = %plan.target,
    source_date_epoch = config.source_date_epoch,
    jobs = config.jobs,
    distsrc = %plan.distsrc.display(),
    outdir = %plan.outdir.display(),
    profile = %plan.profile.display(),
    unsigned_tarball = %plan.unsigned_tarball.display(),
    guest_distsrc = %plan.guest_distsrc.display(),
    guest_outdir = %plan.guest_outdir.display(),
    guest_unsigned_tarball = %plan.guest_unsigned_tarball.display(),
    "codesigning target"
  );
}

/// Sign every target, assuming preconditions were already checked.
pub async fn sign_targets<R: SandboxRunner>(config: &RunConfig, runner: &R) -> Result<SignReport, SignError> {
  // Not fatal: the container then just lacks git history.
  let git_common_dir = match git::common_dir(&config.source_dir).await {
    Ok(dir) => Some(dir),
    Err(e) => {
      warn!(error = %e, "could not locate git common dir, not exposing it");
      None
    }
  };

  let mut report = SignReport::default();

  for target in &config.targets {
    if runner.interrupt_pending().await {
      warn!(target = %target, "interrupted between targets, stopping");
      return Err(SignError::Cancelled { target: target.clone() });
    }

    let plan = TargetPlan::new(config, target);
    trace_plan(config, &plan);

    let spec = guix::codesign_command(config, &plan, git_common_dir.as_deref());
    let started = Instant::now();

    match runner.run(&spec).await {
      Ok(outcome) if outcome.success() => {
        let elapsed = started.elapsed();
        info!(target = %target, elapsed_ms = elapsed.as_millis() as u64, "target signed");
        report.signed.push(SignedTarget {
          target: target.clone(),
          outdir: plan.outdir,
          elapsed,
        });
      }
      Ok(outcome) => {
        error!(target = %target, code = ?outcome.code, "codesigning failed, skipping remaining targets");
        return Err(SignError::Failed {
          target: target.clone(),
          code: outcome.code,
        });
      }
      Err(SandboxError::Interrupted { .. }) => {
        warn!(
          target = %target,
          distsrc = %plan.distsrc.display(),
          outdir = %plan.outdir.display(),
          "interrupted; these directories may need manual cleanup"
        );
        return Err(SignError::Interrupted {
          target: target.clone(),
          leftovers: vec![plan.distsrc, plan.outdir],
        });
      }
      Err(source) => {
        return Err(SignError::Sandbox {
          target: target.clone(),
          source,
        });
      }
    }
  }

  Ok(report)
}

/// Validate preconditions, then sign every target.
pub async fn run<R: SandboxRunner>(config: &RunConfig, runner: &R) -> Result<SignReport, SignError> {
  preflight::run(config, runner).await?;
  sign_targets(config, runner).await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{FakeRunner, SignFixture};
  use tracing_test::traced_test;

  const THREE: [&str; 3] = ["x86_64-w64-mingw32", "x86_64-apple-darwin", "arm64-apple-darwin"];

  #[tokio::test]
  async fn signs_every_target_in_order() {
    let fixture = SignFixture::new(&THREE);
    let runner = FakeRunner::succeeding();

    let report = run(&fixture.config, &runner).await.unwrap();

    assert_eq!(runner.signed_hosts(), THREE);
    let signed: Vec<_> = report.signed.iter().map(|s| s.target.as_str()).collect();
    assert_eq!(signed, THREE);
    assert_eq!(
      report.signed[1].outdir,
      fixture.config.outdir_base.join("x86_64-apple-darwin-codesigned")
    );
  }

  #[tokio::test]
  async fn stops_after_first_failure() {
    let fixture = SignFixture::new(&THREE);
    let runner = FakeRunner::failing_at(1, 2);

    let err = run(&fixture.config, &runner).await.unwrap_err();

    assert!(matches!(
      &err,
      SignError::Failed { target, code: Some(2) } if target.as_str() == "x86_64-apple-darwin"
    ));
    assert_eq!(runner.signed_hosts(), vec!["x86_64-w64-mingw32", "x86_64-apple-darwin"]);
  }

  #[tokio::test]
  async fn failing_preflight_invokes_nothing() {
    let fixture = SignFixture::new(&THREE);
    let plans = TargetPlan::for_all(&fixture.config);
    std::fs::create_dir_all(&plans[1].distsrc).unwrap();
    let runner = FakeRunner::succeeding();

    let err = run(&fixture.config, &runner).await.unwrap_err();

    assert!(matches!(err, SignError::Preflight(PreflightError::ScratchDirsExist(_))));
    assert!(runner.calls().is_empty());
  }

  #[tokio::test]
  async fn interrupt_names_leftover_directories() {
    let fixture = SignFixture::new(&THREE);
    let runner = FakeRunner::interrupted_at(0);

    let err = run(&fixture.config, &runner).await.unwrap_err();

    let plan = TargetPlan::new(&fixture.config, &fixture.config.targets[0]);
    let message = err.to_string();
    assert!(message.contains(&plan.distsrc.display().to_string()));
    assert!(message.contains(&plan.outdir.display().to_string()));
    assert_eq!(runner.signed_hosts(), vec!["x86_64-w64-mingw32"]);
  }

  #[tokio::test]
  async fn interrupt_between_targets_stops_the_loop() {
    let fixture = SignFixture::new(&THREE);
    let runner = FakeRunner::interrupted_after(1);

    let err = run(&fixture.config, &runner).await.unwrap_err();

    assert!(matches!(&err, SignError::Cancelled { target } if target.as_str() == "x86_64-apple-darwin"));
    assert_eq!(runner.signed_hosts(), vec!["x86_64-w64-mingw32"]);
  }

  #[tokio::test]
  async fn sandbox_errors_carry_the_target() {
    let fixture = SignFixture::new(&THREE);
    let runner = FakeRunner::spawn_error_at(0);

    let err = sign_targets(&fixture.config, &runner).await.unwrap_err();

    assert!(matches!(&err, SignError::Sandbox { target, .. } if target.as_str() == "x86_64-w64-mingw32"));
  }

  #[tokio::test]
  async fn exposes_git_common_dir_of_source_tree() {
    let fixture = SignFixture::new(&["arm64-apple-darwin"]);
    let runner = FakeRunner::succeeding();

    sign_targets(&fixture.config, &runner).await.unwrap();

    let common = git::common_dir(&fixture.config.source_dir).await.unwrap();
    let expected = format!("--expose={}", common.display());
    assert!(runner.calls()[0].args.contains(&expected));
  }

  #[tokio::test]
  #[traced_test]
  async fn traces_resolved_paths() {
    let fixture = SignFixture::new(&["x86_64-apple-darwin"]);
    let runner = FakeRunner::succeeding();

    sign_targets(&fixture.config, &runner).await.unwrap();

    assert!(logs_contain("codesigning target"));
    assert!(logs_contain("guest_outdir=/outdir-base/x86_64-apple-darwin-codesigned"));
  }
}
