//! `detsign paths`: show where every target's run reads and writes.
//!
//! Pure computation; nothing is checked or created.

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use detsign_lib::TargetPlan;

use super::{ConfigArgs, runtime};
use crate::output::{OutputFormat, print_json, print_stat, symbols};

#[derive(Serialize)]
struct PathsReport {
  distname: String,
  version: String,
  source_date_epoch: u64,
  distsrc_base: PathBuf,
  outdir_base: PathBuf,
  targets: Vec<TargetPlan>,
}

pub fn cmd_paths(args: &ConfigArgs, format: OutputFormat) -> Result<()> {
  let config = runtime()?.block_on(args.resolve())?;
  let plans = TargetPlan::for_all(&config);

  if format.is_json() {
    return print_json(&PathsReport {
      distname: config.distname(),
      version: config.version.clone(),
      source_date_epoch: config.source_date_epoch,
      distsrc_base: config.distsrc_base.clone(),
      outdir_base: config.outdir_base.clone(),
      targets: plans,
    });
  }

  print_stat("Distribution", &config.distname());
  print_stat("SOURCE_DATE_EPOCH", &config.source_date_epoch.to_string());

  for plan in &plans {
    println!();
    println!("{} {}", symbols::INFO, plan.target);
    print_stat("Scratch", &plan.distsrc.display().to_string());
    print_stat("Output", &plan.outdir.display().to_string());
    print_stat("Profile", &plan.profile.display().to_string());
    print_stat("Unsigned tarball", &plan.unsigned_tarball.display().to_string());
    print_stat(
      "In sandbox",
      &format!(
        "{} {} {}",
        plan.guest_distsrc.display(),
        symbols::ARROW,
        plan.guest_outdir.display()
      ),
    );
  }

  Ok(())
}
