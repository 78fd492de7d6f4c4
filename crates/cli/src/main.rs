//! girder - maintenance CLI for the Girder build engine.
//!
//! Builds themselves are driven by project build scripts linking
//! girder-lib; this binary covers what needs no build description:
//! inspecting and clearing the fingerprint caches, resolving tools on
//! the search path, and fingerprinting files.

mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "girder")]
#[command(version, about = "Girder build engine maintenance tool", long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Inspect or clear the fingerprint caches
  Cache {
    #[command(subcommand)]
    command: CacheCommands,
  },

  /// Resolve an executable on the search path
  Which {
    /// Name of the tool (basename only)
    name: String,
  },

  /// Print the content fingerprint of a file or directory
  Hash {
    /// Path to fingerprint
    path: PathBuf,
  },
}

#[derive(Subcommand)]
enum CacheCommands {
  /// Show cache locations and entry counts
  Status,

  /// Delete cached state
  Clear {
    /// Clear only the project-scope cache
    #[arg(long)]
    project: bool,

    /// Clear only the system-scope cache
    #[arg(long)]
    system: bool,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_filter = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .without_time()
    .with_writer(std::io::stderr)
    .try_init();

  let result = match cli.command {
    Commands::Cache { command } => match command {
      CacheCommands::Status => cmd::cmd_cache_status(),
      CacheCommands::Clear { project, system } => cmd::cmd_cache_clear(project, system),
    },
    Commands::Which { name } => cmd::cmd_which(&name),
    Commands::Hash { path } => cmd::cmd_hash(&path),
  };

  match result {
    Ok(code) => code,
    Err(e) => {
      output::print_error(&format!("{e:#}"));
      ExitCode::FAILURE
    }
  }
}
