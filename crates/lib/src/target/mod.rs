//! The target graph node and its build protocol.
//!
//! A [`Target`] is responsible for producing one or more output keys from
//! zero or more input keys. Building a target builds its inputs first
//! (recursive post-order walk), then runs its own production step unless
//! the target can prove it is already clean.
//!
//! Each target carries a per-pass [`BuildFlag`]. Within one pass the
//! production step runs at most once: re-entry on a finished target is a
//! no-op, re-entry on an in-progress target is a dependency cycle and is
//! reported then treated as satisfied rather than deadlocking. Across
//! passes (watch mode) the flag is reset by [`Target::invalidate`].

pub mod generator;
pub mod smart;
pub mod source;
pub mod tag;

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::context::Context;
use crate::error::BuildError;
use crate::hash::{Fingerprint, hash_path};
use crate::key::TargetKey;

/// Per-pass build progress of one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
  /// Not reached yet in this pass.
  Pending,
  /// Dependency walk or production step currently running.
  InProgress,
  Succeeded,
  Failed,
}

/// Outcome of trying to start a build on a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Begin {
  /// The caller owns the build and must call [`BuildFlag::finish`].
  Started,
  /// Already built successfully this pass.
  AlreadyBuilt,
  /// Already failed this pass.
  AlreadyFailed,
  /// Re-entered while building: a dependency cycle.
  InProgress,
}

/// The per-pass state cell embedded in every target.
#[derive(Debug)]
pub struct BuildFlag {
  state: Mutex<BuildState>,
}

impl Default for BuildFlag {
  fn default() -> BuildFlag {
    BuildFlag {
      state: Mutex::new(BuildState::Pending),
    }
  }
}

impl BuildFlag {
  pub fn new() -> BuildFlag {
    BuildFlag::default()
  }

  pub fn state(&self) -> BuildState {
    *self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Attempt to take ownership of this pass's build.
  pub fn begin(&self) -> Begin {
    let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
    match *state {
      BuildState::Pending => {
        *state = BuildState::InProgress;
        Begin::Started
      }
      BuildState::InProgress => Begin::InProgress,
      BuildState::Succeeded => Begin::AlreadyBuilt,
      BuildState::Failed => Begin::AlreadyFailed,
    }
  }

  /// Record the outcome of a build started with [`BuildFlag::begin`].
  pub fn finish(&self, ok: bool) {
    let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
    *state = if ok { BuildState::Succeeded } else { BuildState::Failed };
  }

  /// Reset to pending for the next pass.
  pub fn reset(&self) {
    let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
    *state = BuildState::Pending;
  }
}

/// A node of the build graph.
pub trait Target: Send + Sync {
  /// Keys that must be built before this target.
  fn inputs(&self) -> BTreeSet<TargetKey> {
    BTreeSet::new()
  }

  /// Keys this target is responsible for producing.
  fn outputs(&self) -> BTreeSet<TargetKey>;

  /// Shown when listing targets.
  fn description(&self) -> Option<String> {
    None
  }

  /// The per-pass state cell.
  fn flag(&self) -> &BuildFlag;

  /// Whether the production step can be skipped.
  ///
  /// The default is false: targets with no persisted notion of done
  /// (tags, plain targets) always re-run their cheap production step.
  fn is_clean(&self, _ctx: &Context) -> bool {
    false
  }

  /// The production step. Inputs are already built when this runs.
  fn build_self(&self, ctx: &Context) -> Result<(), BuildError>;

  /// Persist the evidence that this target is now clean.
  fn mark_clean(&self, _ctx: &Context) {}

  /// Fingerprint of one of this target's output keys.
  ///
  /// Dependents ask the owning target rather than re-reading disk, so
  /// owners may cache. Tag keys yield a fresh nonce every time - they
  /// are never clean.
  fn fingerprint_of(&self, _ctx: &Context, key: &TargetKey) -> Result<Fingerprint, BuildError> {
    fingerprint_key(key)
  }

  /// Forget pass state and cached hashes; the next build re-checks.
  fn invalidate(&self) {
    self.flag().reset();
  }

  /// Build this target: dependencies first, then the production step.
  ///
  /// Idempotent within a pass. A dependency cycle is reported and
  /// treated as satisfied. A target that already failed this pass
  /// reports `DependencyFailed` without re-running anything.
  fn build(&self, ctx: &Context) -> Result<(), BuildError> {
    match self.flag().begin() {
      Begin::AlreadyBuilt => Ok(()),
      Begin::AlreadyFailed => Err(BuildError::DependencyFailed {
        target: display_outputs(&self.outputs()),
      }),
      Begin::InProgress => {
        warn!(
          target = %display_outputs(&self.outputs()),
          "dependency cycle detected, treating as satisfied"
        );
        Ok(())
      }
      Begin::Started => {
        let result = (|| -> Result<(), BuildError> {
          for key in self.inputs() {
            ctx.registry().get(&key).build(ctx)?;
          }

          if self.is_clean(ctx) {
            debug!(target = %display_outputs(&self.outputs()), "clean, skipping production step");
            return Ok(());
          }

          self.build_self(ctx)?;
          self.mark_clean(ctx);
          Ok(())
        })();

        self.flag().finish(result.is_ok());
        result
      }
    }
  }
}

/// Render an output set for messages: `a.o, prog` or `:all`.
pub fn display_outputs(outputs: &BTreeSet<TargetKey>) -> String {
  let rendered: Vec<String> = outputs.iter().map(|k| k.to_string()).collect();
  rendered.join(", ")
}

/// Default fingerprint for a key: file content for paths, a nonce for tags.
pub fn fingerprint_key(key: &TargetKey) -> Result<Fingerprint, BuildError> {
  match key {
    TargetKey::Tag(_) => Ok(tag_fingerprint()),
    TargetKey::Path(path) => Ok(hash_path(path)?),
  }
}

/// A fingerprint that never repeats within or across runs.
pub fn tag_fingerprint() -> Fingerprint {
  static NONCE: AtomicU64 = AtomicU64::new(1);
  Fingerprint(format!(
    "tag-{}-{:x}",
    std::process::id(),
    NONCE.fetch_add(1, Ordering::Relaxed)
  ))
}

/// Build each requested key, collecting per-key outcomes.
///
/// One requested target failing does not abort siblings that do not
/// depend on it; the caller maps any failure to a non-zero exit.
pub fn build_requested(ctx: &Context, keys: &[TargetKey]) -> Vec<(TargetKey, Result<(), BuildError>)> {
  keys
    .iter()
    .map(|key| {
      let target = ctx.registry().get(key);
      (key.clone(), target.build(ctx))
    })
    .collect()
}
