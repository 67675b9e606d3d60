//! detsign-lib: reproducible multi-target codesigning driver
//!
//! This crate resolves a [`config::RunConfig`] once, checks every
//! precondition with [`preflight`], and then runs the external Guix sandbox
//! once per target through [`sign`]:
//! - `Target`: a platform triple to produce a signed artifact for
//! - `TargetPlan`: every host and sandbox path a target's run touches
//! - `SandboxRunner`: the seam between this crate and spawned processes

pub mod config;
pub mod consts;
pub mod git;
pub mod paths;
pub mod plan;
pub mod preflight;
pub mod sandbox;
pub mod sign;
pub mod target;
#[cfg(test)]
mod util;

pub use config::{ConfigError, ConfigInput, RunConfig};
pub use plan::TargetPlan;
pub use sandbox::{ProcessRunner, SandboxRunner};
pub use sign::{SignError, SignReport};
pub use target::Target;
