//! Command-executing generator targets.
//!
//! A generator turns declared inputs into declared outputs by running an
//! ordered list of external commands. The first token of every command
//! is resolved to an absolute executable path at registration time and
//! added to the inputs, so a changed compiler binary invalidates the
//! fingerprint just like a changed source file. The command lines
//! themselves are part of the fingerprint: editing a flag rebuilds.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::context::Context;
use crate::error::BuildError;
use crate::exec::{self, BuildStep, Importance};
use crate::key::TargetKey;
use crate::target::{BuildFlag, Target, display_outputs, smart};

/// Separator joining argv elements inside one fingerprint parameter.
const ARG_SEP: &str = "\u{1f}";

/// A target whose production step is a sequence of external commands.
pub struct GeneratorTarget {
  inputs: BTreeSet<TargetKey>,
  outputs: BTreeSet<TargetKey>,
  commands: Vec<Vec<String>>,
  params: Vec<String>,
  verb: String,
  flag: BuildFlag,
}

impl GeneratorTarget {
  /// Assemble a generator, resolving every command's executable.
  ///
  /// Fails with [`BuildError::ExecutableNotFound`] if a command names a
  /// tool that cannot be found; the failure happens at registration
  /// time, not at build time.
  pub fn new(
    ctx: &Context,
    sources: impl IntoIterator<Item = TargetKey>,
    commands: &[&[&str]],
    outputs: impl IntoIterator<Item = TargetKey>,
    verb: impl Into<String>,
  ) -> Result<GeneratorTarget, BuildError> {
    let mut inputs: BTreeSet<TargetKey> = sources.into_iter().collect();
    let outputs: BTreeSet<TargetKey> = outputs.into_iter().collect();

    let mut resolved_commands: Vec<Vec<String>> = Vec::with_capacity(commands.len());
    for command in commands {
      let Some(program) = command.first() else {
        continue;
      };

      let exe = exec::which::find_executable(ctx, program).ok_or_else(|| BuildError::ExecutableNotFound {
        name: (*program).to_string(),
      })?;

      let mut argv: Vec<String> = command.iter().map(|a| (*a).to_string()).collect();
      argv[0] = exe.display().to_string();

      // The tool itself is an input: a new compiler means a rebuild.
      inputs.insert(TargetKey::Path(exe));
      resolved_commands.push(argv);
    }

    let params: Vec<String> = resolved_commands.iter().map(|argv| argv.join(ARG_SEP)).collect();

    Ok(GeneratorTarget {
      inputs,
      outputs,
      commands: resolved_commands,
      params,
      verb: verb.into(),
      flag: BuildFlag::new(),
    })
  }

  pub fn commands(&self) -> &[Vec<String>] {
    &self.commands
  }

  /// Create any missing parent directories of the declared outputs.
  fn prepare_output_dirs(&self, ctx: &Context) -> Result<(), BuildError> {
    let mut dirs: BTreeSet<PathBuf> = BTreeSet::new();
    for key in &self.outputs {
      if let Some(parent) = key.as_path().and_then(|p| p.parent())
        && !parent.exists()
      {
        dirs.insert(parent.to_path_buf());
      }
    }

    if dirs.is_empty() {
      return Ok(());
    }

    let mut argv = vec!["mkdir".to_string(), "-p".to_string()];
    for dir in &dirs {
      fs::create_dir_all(dir)?;
      argv.push(dir.display().to_string());
    }

    let step = BuildStep {
      verb: "Preparing output directories".to_string(),
      argv,
      output: String::new(),
      status: Some(0),
      importance: Importance::Low,
    };
    step.report(ctx.min_importance());

    Ok(())
  }
}

impl Target for GeneratorTarget {
  fn inputs(&self) -> BTreeSet<TargetKey> {
    self.inputs.clone()
  }

  fn outputs(&self) -> BTreeSet<TargetKey> {
    self.outputs.clone()
  }

  fn flag(&self) -> &BuildFlag {
    &self.flag
  }

  fn is_clean(&self, ctx: &Context) -> bool {
    smart::is_clean(ctx, self, &self.params)
  }

  fn build_self(&self, ctx: &Context) -> Result<(), BuildError> {
    self.prepare_output_dirs(ctx)?;

    let verb = format!("{} {}", self.verb, display_outputs(&self.outputs));
    for argv in &self.commands {
      let step = exec::run_step(ctx, argv, &verb, Importance::Med)?;
      if !step.success() {
        // Partial outputs stay on disk; no fingerprint is recorded, so
        // the next run retries from here.
        return Err(BuildError::CommandFailed {
          cmd: step.format_cmd(),
          code: step.status,
        });
      }
    }

    Ok(())
  }

  fn mark_clean(&self, ctx: &Context) {
    smart::mark_clean(ctx, self, &self.params);
  }
}

/// Register a generator and return its output keys.
///
/// The convenience entry point build scripts use: sources, commands and
/// outputs as plain strings, resolved against the invocation dir.
/// Commands run in declaration order.
pub fn generator(
  ctx: &Context,
  sources: &[&str],
  commands: &[&[&str]],
  outputs: &[&str],
  verb: &str,
) -> Result<Vec<TargetKey>, BuildError> {
  let source_keys: Vec<TargetKey> = sources.iter().map(|s| ctx.key(s)).collect();
  let output_keys: Vec<TargetKey> = outputs.iter().map(|o| ctx.key(o)).collect();

  let target = GeneratorTarget::new(ctx, source_keys, commands, output_keys.clone(), verb)?;
  ctx.register(Arc::new(target));

  Ok(output_keys)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  use crate::context::ContextConfig;

  fn test_ctx(root: &std::path::Path) -> Context {
    Context::new(ContextConfig::new(root).cache(false)).unwrap()
  }

  #[test]
  fn unknown_tool_fails_at_registration() {
    let temp = tempdir().unwrap();
    let ctx = test_ctx(temp.path());

    let result = generator(
      &ctx,
      &[],
      &[&["girder-no-such-compiler", "-c", "x"]],
      &["out"],
      "Compiling",
    );

    match result {
      Err(BuildError::ExecutableNotFound { name }) => {
        assert_eq!(name, "girder-no-such-compiler");
      }
      other => panic!("expected ExecutableNotFound, got {other:?}"),
    }
  }

  #[test]
  #[cfg(unix)]
  fn the_resolved_tool_becomes_an_input() {
    let temp = tempdir().unwrap();
    let ctx = test_ctx(temp.path());

    let target = GeneratorTarget::new(
      &ctx,
      [ctx.path_key(temp.path().join("in.txt"))],
      &[&["/bin/sh", "-c", "true"]],
      [ctx.path_key(temp.path().join("out.txt"))],
      "Generating",
    )
    .unwrap();

    assert!(target.inputs().contains(&TargetKey::Path(PathBuf::from("/bin/sh"))));
    assert_eq!(target.commands().len(), 1);
    assert_eq!(target.commands()[0][0], "/bin/sh");
  }

  #[test]
  #[cfg(unix)]
  fn builds_run_commands_in_order_and_skip_when_clean() {
    let temp = tempdir().unwrap();
    let ctx = test_ctx(temp.path());

    let src = temp.path().join("input.txt");
    fs::write(&src, "payload").unwrap();
    let out = temp.path().join("out").join("copy.txt");
    let log = temp.path().join("steps.log");

    let copy = format!("cp {} {}", src.display(), out.display());
    let note = format!("echo ran >> {}", log.display());

    let outputs = generator(
      &ctx,
      &[&src.display().to_string()],
      &[
        &["/bin/sh", "-c", &copy],
        &["/bin/sh", "-c", &note],
      ],
      &[&out.display().to_string()],
      "Copying",
    )
    .unwrap();

    let target = ctx.get_target(&outputs[0]);
    target.build(&ctx).unwrap();

    assert_eq!(fs::read_to_string(&out).unwrap(), "payload");
    assert_eq!(fs::read_to_string(&log).unwrap(), "ran\n");

    // A second pass in the same process finds the fingerprint in the
    // in-memory store and skips both commands.
    target.invalidate();
    target.build(&ctx).unwrap();
    assert_eq!(fs::read_to_string(&log).unwrap(), "ran\n");
  }

  #[test]
  #[cfg(unix)]
  fn failing_command_aborts_the_chain() {
    let temp = tempdir().unwrap();
    let ctx = test_ctx(temp.path());

    let marker = temp.path().join("after.txt");
    let touch_after = format!("touch {}", marker.display());

    let outputs = generator(
      &ctx,
      &[],
      &[
        &["/bin/sh", "-c", "exit 7"],
        &["/bin/sh", "-c", &touch_after],
      ],
      &[&temp.path().join("never.txt").display().to_string()],
      "Failing",
    )
    .unwrap();

    let err = ctx.get_target(&outputs[0]).build(&ctx).unwrap_err();
    match err {
      BuildError::CommandFailed { code, .. } => assert_eq!(code, Some(7)),
      other => panic!("expected CommandFailed, got {other}"),
    }

    // The second command never ran.
    assert!(!marker.exists());
  }

  #[test]
  #[cfg(unix)]
  fn output_directories_are_created() {
    let temp = tempdir().unwrap();
    let ctx = test_ctx(temp.path());

    let out = temp.path().join("deep").join("nested").join("file.txt");
    let write = format!("echo hi > {}", out.display());

    let outputs = generator(
      &ctx,
      &[],
      &[&["/bin/sh", "-c", &write]],
      &[&out.display().to_string()],
      "Writing",
    )
    .unwrap();

    ctx.get_target(&outputs[0]).build(&ctx).unwrap();
    assert!(out.exists());
  }
}
