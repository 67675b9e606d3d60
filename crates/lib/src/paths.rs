//! Per-target directory layout.
//!
//! Every function here is a pure string computation; nothing touches the filesystem.

use std::path::{Path, PathBuf};

use crate::target::Target;

fn with_suffix(name: String, suffix: Option<&str>) -> String {
  match suffix {
    Some(suffix) if !suffix.is_empty() => format!("{}-{}", name, suffix),
    _ => name,
  }
}

/// Scratch directory: `<base>/distsrc-<version>-<target>[-<suffix>]`.
pub fn distsrc_for_target(base: &Path, version: &str, target: &Target, suffix: Option<&str>) -> PathBuf {
  base.join(with_suffix(format!("distsrc-{}-{}", version, target), suffix))
}

/// Output directory: `<base>/<target>[-<suffix>]`.
pub fn outdir_for_target(base: &Path, target: &Target, suffix: Option<&str>) -> PathBuf {
  base.join(with_suffix(target.to_string(), suffix))
}

/// Sandbox profile root: `<base>/<target>[-<suffix>]`.
pub fn profile_for_target(base: &Path, target: &Target, suffix: Option<&str>) -> PathBuf {
  base.join(with_suffix(target.to_string(), suffix))
}

/// Default base shared by the scratch, output and profile directories.
pub fn version_base(source_dir: &Path, version: &str) -> PathBuf {
  source_dir.join(format!("guix-build-{}", version))
}
