mod check;
mod paths;
mod sign;

use std::path::PathBuf;

use anyhow::{Context, Result};

use detsign_lib::{ConfigInput, RunConfig};

pub use check::cmd_check;
pub use paths::cmd_paths;
pub use sign::cmd_sign;

/// Command-line overrides applied on top of the environment.
pub struct ConfigArgs {
  pub source_dir: PathBuf,
  pub targets: Vec<String>,
  pub jobs: Option<usize>,
}

impl ConfigArgs {
  /// Resolve the run configuration from the environment plus these overrides.
  pub async fn resolve(&self) -> Result<RunConfig> {
    let mut input = ConfigInput::from_env();
    if !self.targets.is_empty() {
      input.targets = Some(self.targets.join(" "));
    }
    if let Some(jobs) = self.jobs {
      input.jobs = Some(jobs.to_string());
    }

    RunConfig::resolve(&input, &self.source_dir)
      .await
      .context("Invalid configuration")
  }
}

/// Create the async runtime used for sandbox invocations.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}
