//! The command-line driver for build scripts.
//!
//! A build description is an ordinary Rust program: it parses the
//! standard girder command-line surface, registers its targets inside a
//! `setup` closure, and lets the driver resolve and build the requested
//! keys. A minimal build script is:
//!
//! ```no_run
//! use girder_lib::driver;
//!
//! fn main() -> std::process::ExitCode {
//!   driver::main_with(|ctx| {
//!     let outs = girder_lib::generator(
//!       ctx,
//!       &["hello.c"],
//!       &[&["cc", "hello.c", "-o", "hello"]],
//!       &["hello"],
//!       "Compiling",
//!     )?;
//!     ctx.tag("all").require_all(outs);
//!     Ok(())
//!   })
//! }
//! ```
//!
//! Exit status: 0 when every requested target builds, 1 when any fails,
//! and clap's usage status for a malformed command line.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use owo_colors::{OwoColorize, Stream};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::context::{Context, ContextConfig};
use crate::error::BuildError;
use crate::exec::Importance;
use crate::key::TargetKey;
use crate::target::build_requested;
use crate::watch::{self, WatchOptions};

/// The standard command-line surface of a girder build script.
#[derive(Debug, Parser)]
#[command(name = "girder", version, about = "Incremental build orchestrator")]
pub struct Options {
  /// Targets to build; bare names are file paths, `:name` is a tag.
  /// Defaults to `:all`.
  #[arg(value_name = "TARGET")]
  pub targets: Vec<String>,

  /// Build scratch directory (default: `build/` under the project root).
  #[arg(short, long, value_name = "DIR")]
  pub out: Option<PathBuf>,

  /// Define a configuration value: `key`, `key=v`, `key+=v` or `key^=v`.
  #[arg(short = 'D', long = "define", value_name = "KEY[=VALUE]")]
  pub defines: Vec<String>,

  /// Append a configuration value to a list.
  #[arg(short = 'A', long = "append", value_name = "KEY[=VALUE]")]
  pub appends: Vec<String>,

  /// Prepend a configuration value to a list.
  #[arg(short = 'P', long = "prepend", value_name = "KEY[=VALUE]")]
  pub prepends: Vec<String>,

  /// Discard state from previous runs and do not persist this one.
  #[arg(long = "no-cache")]
  pub no_cache: bool,

  /// Keep running, rebuilding whenever watched files change.
  #[arg(long)]
  pub watch: bool,

  /// Lowest importance of build steps to print.
  #[arg(long, value_enum, default_value_t = Importance::Med)]
  pub importance: Importance,

  /// Enable verbose logging.
  #[arg(short, long)]
  pub verbose: bool,
}

/// Parse the process arguments and run the build.
pub fn main_with<F>(setup: F) -> ExitCode
where
  F: FnOnce(&Context) -> Result<(), BuildError>,
{
  let options = Options::parse();
  init_logging(options.verbose);

  let root = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
  if execute(&root, options, setup) {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  }
}

/// Run the build with explicit options against an explicit root.
pub fn run_at<F>(root: &std::path::Path, options: Options, setup: F) -> ExitCode
where
  F: FnOnce(&Context) -> Result<(), BuildError>,
{
  if execute(root, options, setup) {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  }
}

/// The driver proper; true on full success.
fn execute<F>(root: &std::path::Path, options: Options, setup: F) -> bool
where
  F: FnOnce(&Context) -> Result<(), BuildError>,
{
  let mut config = ContextConfig::new(root)
    .cache(!options.no_cache)
    .min_importance(options.importance);
  if let Some(out) = &options.out {
    config = config.out_dir(out);
  }

  let ctx = match Context::new(config) {
    Ok(ctx) => ctx,
    Err(e) => {
      report_error(&format!("{e}"));
      return false;
    }
  };

  // Command-line configuration, applied before the script runs.
  for spec in &options.defines {
    ctx.defines().define(spec);
  }
  for spec in &options.appends {
    ctx.defines().append(spec);
  }
  for spec in &options.prepends {
    ctx.defines().prepend(spec);
  }

  // Let the build script register its targets.
  if let Err(e) = setup(&ctx) {
    report_error(&format!("{e}"));
    flush(&ctx);
    return false;
  }

  let requested: Vec<TargetKey> = if options.targets.is_empty() {
    vec![TargetKey::tag("all")]
  } else {
    options.targets.iter().map(|t| ctx.key(t)).collect()
  };
  debug!(?requested, "build pass starting");

  if options.watch {
    // Never returns unless the watcher itself breaks.
    if let Err(e) = watch::watch(&ctx, &requested, WatchOptions::default()) {
      report_error(&format!("{e}"));
      flush(&ctx);
      return false;
    }
    return true;
  }

  let mut ok = true;
  for (key, result) in build_requested(&ctx, &requested) {
    if let Err(e) = result {
      report_error(&format!("{key}: {e}"));
      ok = false;
    }
  }

  flush(&ctx);
  ok
}

fn flush(ctx: &Context) {
  if let Err(e) = ctx.flush_stores() {
    warn!(error = %e, "failed to flush fingerprint stores");
  }
}

fn report_error(message: &str) {
  eprintln!(
    "{} {}",
    "error:".if_supports_color(Stream::Stderr, |s| s.red().bold().to_string()),
    message
  );
}

fn init_logging(verbose: bool) {
  let default_filter = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .without_time()
    .with_writer(std::io::stderr)
    .try_init();
}
