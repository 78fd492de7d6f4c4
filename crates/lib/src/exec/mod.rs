//! Synchronous external command execution and build-step reporting.
//!
//! A [`Command`] spawns one child process, feeds it an optional input
//! buffer, captures stdout and stderr fully into memory and blocks until
//! exit. Every production action run through [`run`] is wrapped in a
//! [`BuildStep`] and printed immediately with a pass/fail colour cue,
//! filterable by importance so that housekeeping steps can be suppressed.
//!
//! There are no retries and no timeouts: builds are assumed deterministic
//! and re-running the tool is the retry mechanism.

pub mod which;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{self, Stdio};
use std::thread;

use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};
use tracing::debug;

use crate::context::Context;
use crate::error::BuildError;

/// How prominent a build step is in the report output.
///
/// Steps below the configured threshold are not printed. `Low` is for
/// housekeeping such as creating output directories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Importance {
  Low,
  #[default]
  Med,
  High,
}

impl std::fmt::Display for Importance {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Importance::Low => "low",
      Importance::Med => "med",
      Importance::High => "high",
    };
    write!(f, "{name}")
  }
}

/// A single external process invocation.
///
/// The environment override map is overlaid on the inherited environment;
/// a `None` value removes the variable. With `clear_env` the child sees
/// only the overrides.
pub struct Command {
  argv: Vec<String>,
  env: BTreeMap<String, Option<String>>,
  clear_env: bool,
  merge_outputs: bool,
  stdin: Vec<u8>,
  cwd: Option<PathBuf>,
}

impl Command {
  pub fn new(argv: Vec<String>) -> Command {
    Command {
      argv,
      env: BTreeMap::new(),
      clear_env: false,
      merge_outputs: false,
      stdin: Vec::new(),
      cwd: None,
    }
  }

  /// Override one environment variable; `None` removes it.
  pub fn env(mut self, key: impl Into<String>, value: Option<String>) -> Command {
    self.env.insert(key.into(), value);
    self
  }

  /// Drop the inherited environment entirely.
  pub fn clear_env(mut self, clear: bool) -> Command {
    self.clear_env = clear;
    self
  }

  /// Append captured stderr to stdout in the result.
  pub fn merge_outputs(mut self, merge: bool) -> Command {
    self.merge_outputs = merge;
    self
  }

  /// Bytes fed to the child's stdin.
  pub fn stdin(mut self, input: Vec<u8>) -> Command {
    self.stdin = input;
    self
  }

  /// Working directory for the child.
  pub fn cwd(mut self, dir: PathBuf) -> Command {
    self.cwd = Some(dir);
    self
  }

  /// Spawn the process and block until it exits.
  pub fn run(&self) -> io::Result<CommandResult> {
    let Some(program) = self.argv.first() else {
      return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command"));
    };

    debug!(cmd = ?self.argv, clear_env = self.clear_env, "spawning process");

    let mut cmd = process::Command::new(program);
    cmd.args(&self.argv[1..]);

    if self.clear_env {
      cmd.env_clear();
    }
    for (key, value) in &self.env {
      match value {
        Some(v) => cmd.env(key, v),
        None => cmd.env_remove(key),
      };
    }
    if let Some(dir) = &self.cwd {
      cmd.current_dir(dir);
    }

    cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = cmd.spawn()?;

    // Feed stdin from a separate thread so a large input buffer cannot
    // deadlock against the child filling its output pipes.
    let writer = child.stdin.take().map(|mut stdin| {
      let input = self.stdin.clone();
      thread::spawn(move || {
        let _ = stdin.write_all(&input);
      })
    });

    let output = child.wait_with_output()?;
    if let Some(handle) = writer {
      let _ = handle.join();
    }

    let mut stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if self.merge_outputs {
      stdout.push_str(&stderr);
      stderr = String::new();
    }

    Ok(CommandResult {
      status: output.status.code(),
      stdout,
      stderr,
    })
  }
}

/// The captured outcome of one [`Command`].
#[derive(Debug, Clone)]
pub struct CommandResult {
  /// Exit code, or `None` when killed by a signal.
  pub status: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl CommandResult {
  pub fn success(&self) -> bool {
    self.status == Some(0)
  }
}

/// One reported production action.
#[derive(Debug, Clone)]
pub struct BuildStep {
  /// Human verb, e.g. "Compiling".
  pub verb: String,
  /// The literal argv that was executed.
  pub argv: Vec<String>,
  /// Captured (merged) output.
  pub output: String,
  /// Exit code of the command.
  pub status: Option<i32>,
  pub importance: Importance,
}

impl BuildStep {
  pub fn success(&self) -> bool {
    self.status == Some(0)
  }

  /// The argv rendered so it could be pasted into a shell.
  pub fn format_cmd(&self) -> String {
    let quoted: Vec<Cow<'_, str>> = self.argv.iter().map(|a| shell_quote(a)).collect();
    quoted.join(" ")
  }

  /// Print this step unless it falls below the reporting threshold.
  ///
  /// Failed steps are always printed, whatever their importance.
  pub fn report(&self, threshold: Importance) {
    if self.importance < threshold && self.success() {
      return;
    }

    if self.success() {
      println!("{}", self.verb.if_supports_color(Stream::Stdout, |v| v.bold()));
    } else {
      println!(
        "{}",
        self.verb.if_supports_color(Stream::Stdout, |v| v.red().bold().to_string())
      );
    }
    println!("{}", self.format_cmd());
    print!("{}", self.output);
  }
}

/// Quote one argument for display.
fn shell_quote(arg: &str) -> Cow<'_, str> {
  let plain = !arg.is_empty()
    && arg
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || "_-./=:+@,".contains(c));

  if plain {
    Cow::Borrowed(arg)
  } else {
    Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")))
  }
}

/// Run a command as part of the build and report it.
///
/// The first argv element is resolved on the search path; a missing tool
/// is fatal with the tool name reported. Stdout and stderr are merged in
/// the captured output. Returns the reported step; the caller decides
/// whether a non-zero exit aborts the build.
pub fn run_step(
  ctx: &Context,
  argv: &[String],
  verb: &str,
  importance: Importance,
) -> Result<BuildStep, BuildError> {
  let Some(program) = argv.first() else {
    return Err(BuildError::Io(io::Error::new(
      io::ErrorKind::InvalidInput,
      "empty command",
    )));
  };

  let exe = which::find_executable(ctx, program).ok_or_else(|| BuildError::ExecutableNotFound {
    name: program.clone(),
  })?;

  let mut resolved = argv.to_vec();
  resolved[0] = exe.display().to_string();

  let result = Command::new(resolved.clone()).merge_outputs(true).run()?;

  let step = BuildStep {
    verb: verb.to_string(),
    argv: resolved,
    output: result.stdout,
    status: result.status,
    importance,
  };
  step.report(ctx.min_importance());

  Ok(step)
}

/// Run a command, reporting it; true iff it exited zero.
pub fn run(ctx: &Context, argv: &[String], verb: &str, importance: Importance) -> Result<bool, BuildError> {
  run_step(ctx, argv, verb, importance).map(|step| step.success())
}
