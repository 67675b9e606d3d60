//! Running commands under the external sandbox tool.
//!
//! [`SandboxRunner`] is the single seam between this crate and the outside
//! world's processes. [`ProcessRunner`] spawns real processes; tests substitute
//! a recording fake.

pub mod guix;
mod interrupt;
pub mod process;

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

pub use process::ProcessRunner;

/// How the child's standard streams are wired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StdioMode {
  /// Stream straight to the operator's terminal.
  #[default]
  Inherit,
  /// Collect stdout and stderr into the [`RunOutcome`].
  Capture,
}

/// A fully described command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
  pub program: String,
  pub args: Vec<String>,
  /// Variables set on top of the inherited environment.
  pub env: BTreeMap<String, String>,
  pub cwd: Option<PathBuf>,
  pub stdio: StdioMode,
}

impl CommandSpec {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      ..Default::default()
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  pub fn capture(mut self) -> Self {
    self.stdio = StdioMode::Capture;
    self
  }

  /// Shell-like rendering for logs. Not meant to be re-parsed.
  pub fn display(&self) -> String {
    std::iter::once(self.program.as_str())
      .chain(self.args.iter().map(String::as_str))
      .map(|word| {
        if word.is_empty() || word.contains(char::is_whitespace) {
          format!("'{}'", word)
        } else {
          word.to_string()
        }
      })
      .collect::<Vec<_>>()
      .join(" ")
  }
}

/// What a finished command reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
  /// Exit code, `None` when the child was killed by a signal.
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl RunOutcome {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

#[derive(Debug, Error)]
pub enum SandboxError {
  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("{program} was interrupted")]
  Interrupted { program: String },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Executes a [`CommandSpec`] to completion.
pub trait SandboxRunner {
  fn run(&self, spec: &CommandSpec) -> impl Future<Output = Result<RunOutcome, SandboxError>> + Send;

  /// Whether an operator interrupt arrived outside of [`run`](Self::run) since
  /// the last check. Consumes it.
  fn interrupt_pending(&self) -> impl Future<Output = bool> + Send {
    async { false }
  }
}
