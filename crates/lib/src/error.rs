//! Error taxonomy for build execution.
//!
//! Expected failure paths (missing sources, failed commands, failed
//! dependencies) are ordinary `Result` values that propagate up the
//! dependency walk; nothing here is used for control flow inside a
//! successful build.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::hash::HashError;

/// Errors that can occur while building a target.
#[derive(Debug, Error)]
pub enum BuildError {
  /// A leaf key has no registered builder and the file does not exist.
  /// Fatal for the requesting build, with the offending path named.
  #[error("source file {} does not exist", .path.display())]
  MissingSource { path: PathBuf },

  /// A command's executable could not be found on the search path.
  #[error("cannot find executable: {name}")]
  ExecutableNotFound { name: String },

  /// An external command exited non-zero.
  #[error("command failed with exit code {code:?}: {cmd}")]
  CommandFailed { cmd: String, code: Option<i32> },

  /// A dependency of this target already failed earlier in the pass.
  #[error("dependency failed: {target}")]
  DependencyFailed { target: String },

  /// Content hashing failed (unreadable input, broken symlink).
  #[error(transparent)]
  Hash(#[from] HashError),

  /// I/O error while preparing or running a production step.
  #[error("io error: {0}")]
  Io(#[from] io::Error),
}
