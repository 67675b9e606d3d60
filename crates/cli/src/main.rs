use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use cmd::{ConfigArgs, cmd_check, cmd_paths, cmd_sign};
use output::{OutputFormat, print_error};

/// detsign - Reproducible multi-target codesigning driver
///
/// Configuration comes from the environment (HOSTS, DETACHED_SIGS_REPO,
/// JOBS, SOURCE_DATE_EPOCH, ...); the flags below override it.
#[derive(Parser)]
#[command(name = "detsign")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Source tree to sign from
  #[arg(short = 'C', long, global = true, default_value = ".")]
  source_dir: PathBuf,

  /// Target triple to sign (repeatable, overrides HOSTS)
  #[arg(short, long = "target", global = true)]
  targets: Vec<String>,

  /// Job-count hint passed to the sandbox (overrides JOBS)
  #[arg(short, long, global = true)]
  jobs: Option<usize>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Check preconditions, then codesign every target
  Sign,

  /// Check preconditions without signing anything
  Check,

  /// Show the per-target directory layout
  Paths {
    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
}

fn init_logging(verbose: bool) {
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn run(cli: Cli) -> Result<()> {
  let args = ConfigArgs {
    source_dir: cli.source_dir,
    targets: cli.targets,
    jobs: cli.jobs,
  };

  match cli.command {
    Commands::Sign => cmd_sign(&args),
    Commands::Check => cmd_check(&args),
    Commands::Paths { output } => cmd_paths(&args, output),
  }
}

fn main() {
  // Usage errors exit 1 like every other failure; help and version exit 0.
  let cli = match Cli::try_parse() {
    Ok(cli) => cli,
    Err(e) => {
      let code = if e.use_stderr() { 1 } else { 0 };
      let _ = e.print();
      std::process::exit(code);
    }
  };
  init_logging(cli.verbose);

  if let Err(e) = run(cli) {
    print_error(&format!("{:#}", e));
    std::process::exit(1);
  }
}
