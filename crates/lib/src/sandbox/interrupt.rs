//! Operator interrupt (Ctrl-C) listener.
//!
//! Registered before any child is spawned and kept for the whole run. An
//! interrupt never stops a child; it only marks the current invocation as
//! interrupted so the caller can stop after the child has exited on its own.

use std::io;

use tokio::sync::Mutex;

#[cfg(unix)]
type SignalStream = tokio::signal::unix::Signal;
#[cfg(windows)]
type SignalStream = tokio::signal::windows::CtrlC;

pub struct InterruptListener {
  stream: Mutex<SignalStream>,
}

impl InterruptListener {
  /// Start listening. Must be called from inside a tokio runtime.
  ///
  /// Once installed, Ctrl-C no longer terminates the process.
  pub fn install() -> io::Result<Self> {
    #[cfg(unix)]
    let stream = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    #[cfg(windows)]
    let stream = tokio::signal::windows::ctrl_c()?;

    Ok(Self {
      stream: Mutex::new(stream),
    })
  }

  /// Resolves on the next interrupt, or right away if one is already pending.
  ///
  /// Cancel-safe: dropping the future does not lose an interrupt.
  pub async fn recv(&self) {
    let mut stream = self.stream.lock().await;
    if stream.recv().await.is_none() {
      // Signal driver shut down; no interrupt can arrive any more.
      std::future::pending::<()>().await;
    }
  }

  /// Consume an interrupt received since the last check, without waiting.
  pub async fn take_pending(&self) -> bool {
    let mut stream = self.stream.lock().await;
    tokio::select! {
      biased;
      received = stream.recv() => received.is_some(),
      () = std::future::ready(()) => false,
    }
  }
}
