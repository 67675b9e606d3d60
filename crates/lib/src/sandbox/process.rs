//! Real process execution.
//!
//! Spawns the command with tokio and waits for it with no timeout. An operator
//! interrupt (Ctrl-C) while the child runs does not stop the child: it gets the
//! same signal from the terminal and tears itself down. Once it has exited the
//! invocation surfaces as [`SandboxError::Interrupted`]; nothing is rolled back.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use super::interrupt::InterruptListener;
use super::{CommandSpec, RunOutcome, SandboxError, SandboxRunner, StdioMode};

pub struct ProcessRunner {
  interrupt: InterruptListener,
}

impl ProcessRunner {
  /// Create a runner and start listening for interrupts.
  ///
  /// Must be called from inside a tokio runtime, before the first command runs.
  pub fn new() -> Result<Self, SandboxError> {
    Ok(Self {
      interrupt: InterruptListener::install()?,
    })
  }
}

impl SandboxRunner for ProcessRunner {
  async fn run(&self, spec: &CommandSpec) -> Result<RunOutcome, SandboxError> {
    debug!(cmd = %spec.display(), cwd = ?spec.cwd, "spawning process");

    let mut command = Command::new(&spec.program);
    command.args(&spec.args).envs(&spec.env).stdin(Stdio::null());

    if let Some(cwd) = &spec.cwd {
      command.current_dir(cwd);
    }

    if spec.stdio == StdioMode::Capture {
      command.stdout(Stdio::piped()).stderr(Stdio::piped());
    }

    let child = command.spawn().map_err(|source| SandboxError::Spawn {
      program: spec.program.clone(),
      source,
    })?;

    let wait = child.wait_with_output();
    tokio::pin!(wait);

    // Interrupts are polled first so an exit caused by the same Ctrl-C is
    // still reported as an interrupt.
    let mut interrupted = false;
    let output = loop {
      tokio::select! {
        biased;
        () = self.interrupt.recv(), if !interrupted => {
          interrupted = true;
          warn!(program = %spec.program, "interrupt received, waiting for the child to exit");
        }
        output = &mut wait => break output?,
      }
    };

    if interrupted || self.interrupt.take_pending().await {
      debug!(code = ?output.status.code(), "interrupted process exited");
      return Err(SandboxError::Interrupted {
        program: spec.program.clone(),
      });
    }

    let outcome = RunOutcome {
      code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !outcome.stderr.is_empty() {
      debug!(stderr = %outcome.stderr.trim_end(), "command stderr");
    }
    if !outcome.stdout.is_empty() {
      debug!(stdout = %outcome.stdout.trim_end(), "command stdout");
    }
    debug!(code = ?outcome.code, "process exited");

    Ok(outcome)
  }

  async fn interrupt_pending(&self) -> bool {
    self.interrupt.take_pending().await
  }
}
