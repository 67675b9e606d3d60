//! Resolved per-target layout, on the host and inside the sandbox.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::RunConfig;
use crate::consts::{CODESIGNED_SUFFIX, guest};
use crate::paths::{distsrc_for_target, outdir_for_target, profile_for_target};
use crate::target::{Target, TargetFamily};

/// Every path one codesigning invocation touches.
///
/// Host paths are where things live on this machine; guest paths are the same
/// locations as seen through the sandbox mounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetPlan {
  pub target: Target,
  pub family: TargetFamily,
  pub distsrc: PathBuf,
  pub outdir: PathBuf,
  pub profile: PathBuf,
  pub unsigned_tarball: PathBuf,
  pub guest_distsrc: PathBuf,
  pub guest_outdir: PathBuf,
  pub guest_unsigned_tarball: PathBuf,
}

impl TargetPlan {
  pub fn new(config: &RunConfig, target: &Target) -> Self {
    let suffix = Some(CODESIGNED_SUFFIX);
    let distname = config.distname();
    let guest_distsrc_base = Path::new(guest::DISTSRC_BASE);
    let guest_outdir_base = Path::new(guest::OUTDIR_BASE);

    Self {
      target: target.clone(),
      family: target.family(),
      distsrc: distsrc_for_target(&config.distsrc_base, &config.version, target, suffix),
      outdir: outdir_for_target(&config.outdir_base, target, suffix),
      profile: profile_for_target(&config.profiles_base, target, suffix),
      unsigned_tarball: target.unsigned_tarball(&config.outdir_base, &distname),
      guest_distsrc: distsrc_for_target(guest_distsrc_base, &config.version, target, suffix),
      guest_outdir: outdir_for_target(guest_outdir_base, target, suffix),
      guest_unsigned_tarball: target.unsigned_tarball(guest_outdir_base, &distname),
    }
  }

  /// Plans for every configured target, in configured order.
  pub fn for_all(config: &RunConfig) -> Vec<Self> {
    config.targets.iter().map(|target| Self::new(config, target)).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::test_config;
  use tempfile::TempDir;

  #[test]
  fn host_and_guest_paths_line_up() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &["x86_64-w64-mingw32"]);
    let plan = TargetPlan::new(&config, &config.targets[0]);

    assert_eq!(
      plan.distsrc,
      config.distsrc_base.join("distsrc-27.0-x86_64-w64-mingw32-codesigned")
    );
    assert_eq!(plan.outdir, config.outdir_base.join("x86_64-w64-mingw32-codesigned"));
    assert_eq!(
      plan.unsigned_tarball,
      config
        .outdir_base
        .join("x86_64-w64-mingw32")
        .join("pkg-27.0-win64-codesigning.tar.gz")
    );
    assert_eq!(
      plan.guest_distsrc,
      PathBuf::from("/distsrc-base/distsrc-27.0-x86_64-w64-mingw32-codesigned")
    );
    assert_eq!(plan.guest_outdir, PathBuf::from("/outdir-base/x86_64-w64-mingw32-codesigned"));
    assert_eq!(
      plan.guest_unsigned_tarball,
      PathBuf::from("/outdir-base/x86_64-w64-mingw32/pkg-27.0-win64-codesigning.tar.gz")
    );
  }

  #[test]
  fn plans_follow_target_order_and_are_stable() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &["b-apple-darwin", "a-w64-mingw32"]);

    let first = TargetPlan::for_all(&config);
    let second = TargetPlan::for_all(&config);
    assert_eq!(first, second);
    assert_eq!(first[0].target.as_str(), "b-apple-darwin");
    assert_eq!(first[1].target.as_str(), "a-w64-mingw32");
  }
}
