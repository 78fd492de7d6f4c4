//! Leaf targets for existing source files.
//!
//! Synthesized by the registry for any key that has no explicit builder.
//! Building one only verifies that the underlying file exists; the
//! content hash is computed lazily and cached until invalidated, so a
//! source consumed by many dependents is read once per pass.

use std::collections::BTreeSet;
use std::sync::Mutex;

use crate::context::Context;
use crate::error::BuildError;
use crate::hash::{Fingerprint, hash_path};
use crate::key::TargetKey;
use crate::target::{BuildFlag, Target, fingerprint_key};

/// A graph leaf standing in for a file nobody builds.
pub struct SourceTarget {
  key: TargetKey,
  flag: BuildFlag,
  cached_hash: Mutex<Option<Fingerprint>>,
}

impl SourceTarget {
  pub fn new(key: TargetKey) -> SourceTarget {
    SourceTarget {
      key,
      flag: BuildFlag::new(),
      cached_hash: Mutex::new(None),
    }
  }

  pub fn key(&self) -> &TargetKey {
    &self.key
  }
}

impl Target for SourceTarget {
  fn outputs(&self) -> BTreeSet<TargetKey> {
    [self.key.clone()].into_iter().collect()
  }

  fn flag(&self) -> &BuildFlag {
    &self.flag
  }

  fn build_self(&self, _ctx: &Context) -> Result<(), BuildError> {
    match self.key.as_path() {
      Some(path) if path.exists() => Ok(()),
      Some(path) => Err(BuildError::MissingSource {
        path: path.to_path_buf(),
      }),
      // A tag key with no builder has nothing to verify.
      None => Ok(()),
    }
  }

  fn fingerprint_of(&self, _ctx: &Context, key: &TargetKey) -> Result<Fingerprint, BuildError> {
    let Some(path) = key.as_path() else {
      return fingerprint_key(key);
    };

    let mut cached = self.cached_hash.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(hash) = cached.as_ref() {
      return Ok(hash.clone());
    }

    let hash = hash_path(path)?;
    *cached = Some(hash.clone());
    Ok(hash)
  }

  fn invalidate(&self) {
    self.flag.reset();
    let mut cached = self.cached_hash.lock().unwrap_or_else(|e| e.into_inner());
    *cached = None;
  }
}
