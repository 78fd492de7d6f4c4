//! Fingerprint bookkeeping for targets with a persisted notion of done.
//!
//! A smart target is clean when every declared output exists on disk and
//! the fingerprint stored for its output set matches the freshly
//! computed one. The fingerprint digests, in order: each input's own
//! fingerprint (obtained from the input's owning target, which may cache
//! it), the content of each declared output, and the target's declared
//! parameters (command argv and the like). It therefore changes when any
//! input's content or existence changes, when an output is touched or
//! removed behind the build's back, and when the recipe itself changes.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::consts::TARGET_KEY_PREFIX;
use crate::context::Context;
use crate::error::BuildError;
use crate::hash::{Fingerprint, hash_parts};
use crate::key::TargetKey;
use crate::target::Target;

/// The project-store key for a target's fingerprint: the sorted output
/// set, NUL-joined, under a fixed prefix.
pub fn store_key(outputs: &BTreeSet<TargetKey>) -> String {
  let joined: Vec<String> = outputs.iter().map(|k| k.to_string()).collect();
  format!("{}{}", TARGET_KEY_PREFIX, joined.join("\0"))
}

/// Whether every output is a path that exists on disk.
///
/// Tag outputs fail this check by definition: tags are never clean.
pub fn outputs_exist(outputs: &BTreeSet<TargetKey>) -> bool {
  outputs.iter().all(|key| match key.as_path() {
    Some(path) => path.exists(),
    None => false,
  })
}

/// Compute the current fingerprint of `target`.
///
/// Fails when an input or output cannot be hashed (typically: it does
/// not exist yet), which callers treat as "not clean".
pub fn signature(ctx: &Context, target: &dyn Target, params: &[String]) -> Result<Fingerprint, BuildError> {
  let mut parts: Vec<String> = Vec::new();

  for key in target.inputs() {
    let owner = ctx.registry().get(&key);
    parts.push(owner.fingerprint_of(ctx, &key)?.to_string());
  }

  for key in target.outputs() {
    parts.push(key.to_string());
    parts.push(target.fingerprint_of(ctx, &key)?.to_string());
  }

  parts.extend(params.iter().cloned());

  Ok(hash_parts(parts))
}

/// Is `target` provably up to date?
pub fn is_clean(ctx: &Context, target: &dyn Target, params: &[String]) -> bool {
  let outputs = target.outputs();
  if !outputs_exist(&outputs) {
    return false;
  }

  let Some(stored) = ctx.project_store().get_str(&store_key(&outputs)) else {
    return false;
  };

  match signature(ctx, target, params) {
    Ok(current) => current.as_str() == stored,
    Err(e) => {
      debug!(error = %e, "fingerprint computation failed, treating as dirty");
      false
    }
  }
}

/// Record that `target` was just built successfully.
///
/// Skipped (with a warning) when an output is missing after the build
/// or the fingerprint cannot be computed; the target then simply
/// rebuilds next run.
pub fn mark_clean(ctx: &Context, target: &dyn Target, params: &[String]) {
  let outputs = target.outputs();
  if !outputs_exist(&outputs) {
    warn!(
      target = %super::display_outputs(&outputs),
      "declared outputs missing after build, not recording fingerprint"
    );
    return;
  }

  match signature(ctx, target, params) {
    Ok(current) => {
      ctx
        .project_store()
        .set_str(store_key(&outputs), current.to_string());
    }
    Err(e) => {
      warn!(error = %e, "could not fingerprint built target, not recording");
    }
  }
}
