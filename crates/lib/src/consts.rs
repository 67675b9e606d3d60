//! Names and defaults shared across the crate.

/// Targets signed when `HOSTS` is not set.
pub const DEFAULT_TARGETS: &[&str] = &["x86_64-w64-mingw32", "x86_64-apple-darwin", "arm64-apple-darwin"];

/// Suffix appended to per-target directories produced by codesigning.
pub const CODESIGNED_SUFFIX: &str = "codesigned";

/// Environment variable whose presence aborts the run.
///
/// Guix reads `V` as its own verbosity setting, so a stray value leaks into
/// every nested invocation.
pub const CONFLICTING_VAR: &str = "V";

pub const DEFAULT_SANDBOX_PROGRAM: &str = "guix";
pub const DEFAULT_TIME_MACHINE_URL: &str = "https://codeberg.org/guix/guix.git";

/// Relative to the source tree.
pub const DEFAULT_MANIFEST: &str = "contrib/guix/manifest.scm";
/// Relative to the source tree.
pub const DEFAULT_STAGE_SCRIPT: &str = "contrib/guix/libexec/codesign.sh";

/// Mount points inside the sandbox.
pub mod guest {
  pub const SOURCE: &str = "/source";
  pub const DISTSRC_BASE: &str = "/distsrc-base";
  pub const OUTDIR_BASE: &str = "/outdir-base";
  pub const DETACHED_SIGS: &str = "/detached-sigs";
  pub const DIST_ARCHIVE_BASE: &str = "/outdir-base/dist-archive";
}
