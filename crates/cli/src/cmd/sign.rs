//! Implementation of the `detsign sign` command.
//!
//! Checks every precondition, then runs the sandbox once per target in order,
//! stopping at the first failure.

use anyhow::{Context, Result};
use tracing::info;

use detsign_lib::{ProcessRunner, sign};

use super::{ConfigArgs, runtime};
use crate::output::{format_elapsed, print_info, print_stat, print_success};

pub fn cmd_sign(args: &ConfigArgs) -> Result<()> {
  let rt = runtime()?;
  let config = rt.block_on(args.resolve())?;

  print_info(&format!(
    "Codesigning {} for {} target(s)",
    config.distname(),
    config.targets.len()
  ));

  let report = rt.block_on(async {
    let runner = ProcessRunner::new().context("Failed to listen for interrupts")?;
    sign::run(&config, &runner).await.context("Codesigning failed")
  })?;

  info!(signed = report.signed.len(), "codesigning finished");

  println!();
  print_success("Codesigning complete!");
  for signed in &report.signed {
    print_stat(
      signed.target.as_str(),
      &format!("{} ({})", signed.outdir.display(), format_elapsed(signed.elapsed)),
    );
  }

  Ok(())
}
