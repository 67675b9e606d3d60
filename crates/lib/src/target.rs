//! Target platform identifiers and their input artifact naming.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Operating system family of a target triple.
///
/// The family decides how the unsigned input tarball is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFamily {
  Windows,
  Darwin,
  Other,
}

/// A platform triple (e.g., "x86_64-apple-darwin") to produce a signed artifact for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
  pub fn new(triple: impl Into<String>) -> Self {
    Self(triple.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn family(&self) -> TargetFamily {
    if self.0.contains("mingw") {
      TargetFamily::Windows
    } else if self.0.contains("darwin") {
      TargetFamily::Darwin
    } else {
      TargetFamily::Other
    }
  }

  /// File name of the unsigned tarball produced by the earlier build stage.
  ///
  /// All Windows targets share one name; every other target is named per triple.
  pub fn unsigned_tarball_name(&self, distname: &str) -> String {
    match self.family() {
      TargetFamily::Windows => format!("{}-win64-codesigning.tar.gz", distname),
      TargetFamily::Darwin | TargetFamily::Other => format!("{}-{}-codesigning.tar.gz", distname, self.0),
    }
  }

  /// Location of the unsigned tarball inside the target's unsuffixed output directory.
  pub fn unsigned_tarball(&self, outdir_base: &Path, distname: &str) -> PathBuf {
    crate::paths::outdir_for_target(outdir_base, self, None).join(self.unsigned_tarball_name(distname))
  }
}

impl fmt::Display for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Split a whitespace-separated target list, preserving order.
pub fn parse_targets(list: &str) -> Vec<Target> {
  list.split_whitespace().map(Target::new).collect()
}
