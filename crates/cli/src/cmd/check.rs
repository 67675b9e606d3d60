//! `detsign check`: run the precondition checks and stop.

use anyhow::{Context, Result};

use detsign_lib::{ProcessRunner, preflight};

use super::{ConfigArgs, runtime};
use crate::output::{print_stat, print_success};

pub fn cmd_check(args: &ConfigArgs) -> Result<()> {
  let rt = runtime()?;
  let config = rt.block_on(async {
    let config = args.resolve().await?;
    let runner = ProcessRunner::new().context("Failed to listen for interrupts")?;
    preflight::run(&config, &runner)
      .await
      .context("Preflight checks failed")?;
    anyhow::Ok(config)
  })?;

  print_success(&format!(
    "Ready to codesign {} target(s)",
    config.targets.len()
  ));
  print_stat("Version", &config.version);
  print_stat("SOURCE_DATE_EPOCH", &config.source_date_epoch.to_string());
  print_stat("Jobs", &config.jobs.to_string());
  print_stat("Scratch base", &config.distsrc_base.display().to_string());
  print_stat("Output base", &config.outdir_base.display().to_string());

  Ok(())
}
