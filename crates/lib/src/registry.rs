//! The target graph registry.
//!
//! One map from output key to the target that builds it. Explicitly
//! registered builders are kept apart from lazily synthesized source
//! leaves so that a later registration can claim a key that was first
//! seen as a plain source file.
//!
//! Registration conflicts ("built two ways") are warnings, not errors:
//! build scripts may be loaded speculatively and the last registration
//! wins.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::key::TargetKey;
use crate::target::Target;
use crate::target::source::SourceTarget;

/// Global mapping from target key to the target that builds it.
#[derive(Default)]
pub struct Registry {
  targets: RwLock<HashMap<TargetKey, Arc<dyn Target>>>,
  sources: RwLock<HashMap<TargetKey, Arc<SourceTarget>>>,
}

impl Registry {
  pub fn new() -> Registry {
    Registry::default()
  }

  /// Look up the target owning `key`, without synthesizing anything.
  pub fn find(&self, key: &TargetKey) -> Option<Arc<dyn Target>> {
    if let Some(target) = self.read_targets().get(key) {
      return Some(target.clone());
    }
    self.read_sources().get(key).map(|s| s.clone() as Arc<dyn Target>)
  }

  /// Look up the target owning `key`, synthesizing a source leaf on miss.
  ///
  /// This guarantees every key is buildable even without an explicit
  /// rule; a key whose file does not exist fails at build time instead.
  pub fn get(&self, key: &TargetKey) -> Arc<dyn Target> {
    if let Some(target) = self.find(key) {
      return target;
    }

    let mut sources = self.write_sources();
    // Racing synthesizers settle on whichever inserted first.
    sources
      .entry(key.clone())
      .or_insert_with(|| Arc::new(SourceTarget::new(key.clone())))
      .clone()
  }

  /// Register `target` as the builder for each of its output keys.
  ///
  /// A key already owned by a different explicit builder is reported as
  /// a conflict; the new registration wins.
  pub fn register(&self, target: Arc<dyn Target>) {
    let mut targets = self.write_targets();
    for key in target.outputs() {
      if let Some(existing) = targets.get(&key)
        && !Arc::ptr_eq(existing, &target)
      {
        warn!(target = %key, "target can be built two ways, last registration wins");
      }
      targets.insert(key, target.clone());
    }
  }

  /// Snapshot of all explicitly registered builders, deduplicated.
  pub fn registered(&self) -> Vec<Arc<dyn Target>> {
    let targets = self.read_targets();
    let mut seen: Vec<Arc<dyn Target>> = Vec::new();
    for target in targets.values() {
      if !seen.iter().any(|t| Arc::ptr_eq(t, target)) {
        seen.push(target.clone());
      }
    }
    seen
  }

  /// All keys with an explicit builder.
  pub fn keys(&self) -> Vec<TargetKey> {
    self.read_targets().keys().cloned().collect()
  }

  /// Number of keys with an explicit builder.
  pub fn len(&self) -> usize {
    self.read_targets().len()
  }

  pub fn is_empty(&self) -> bool {
    self.read_targets().is_empty()
  }

  fn read_targets(&self) -> std::sync::RwLockReadGuard<'_, HashMap<TargetKey, Arc<dyn Target>>> {
    self.targets.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write_targets(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<TargetKey, Arc<dyn Target>>> {
    self.targets.write().unwrap_or_else(|e| e.into_inner())
  }

  fn read_sources(&self) -> std::sync::RwLockReadGuard<'_, HashMap<TargetKey, Arc<SourceTarget>>> {
    self.sources.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write_sources(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<TargetKey, Arc<SourceTarget>>> {
    self.sources.write().unwrap_or_else(|e| e.into_inner())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeSet;
  use std::path::PathBuf;

  use crate::context::Context;
  use crate::error::BuildError;
  use crate::target::BuildFlag;

  struct Stub {
    outputs: BTreeSet<TargetKey>,
    flag: BuildFlag,
  }

  impl Stub {
    fn new(keys: &[TargetKey]) -> Arc<Stub> {
      Arc::new(Stub {
        outputs: keys.iter().cloned().collect(),
        flag: BuildFlag::new(),
      })
    }
  }

  impl Target for Stub {
    fn outputs(&self) -> BTreeSet<TargetKey> {
      self.outputs.clone()
    }

    fn flag(&self) -> &BuildFlag {
      &self.flag
    }

    fn build_self(&self, _ctx: &Context) -> Result<(), BuildError> {
      Ok(())
    }
  }

  fn path_key(p: &str) -> TargetKey {
    TargetKey::Path(PathBuf::from(p))
  }

  #[test]
  fn find_returns_none_for_unknown_keys() {
    let registry = Registry::new();
    assert!(registry.find(&path_key("/x")).is_none());
    assert!(registry.is_empty());
  }

  #[test]
  fn get_synthesizes_a_source_leaf_once() {
    let registry = Registry::new();
    let key = path_key("/src/main.c");

    let first = registry.get(&key);
    let second = registry.get(&key);

    assert!(Arc::ptr_eq(&first, &second));
    // Synthesized sources are visible to find but are not builders.
    assert!(registry.find(&key).is_some());
    assert_eq!(registry.len(), 0);
  }

  #[test]
  fn register_claims_every_output_key() {
    let registry = Registry::new();
    let target = Stub::new(&[path_key("/out/a"), path_key("/out/b")]);

    registry.register(target.clone());

    assert_eq!(registry.len(), 2);
    assert!(Arc::ptr_eq(&registry.find(&path_key("/out/a")).unwrap(), &(target.clone() as Arc<dyn Target>)));
  }

  #[test]
  fn explicit_builder_wins_over_synthesized_source() {
    let registry = Registry::new();
    let key = path_key("/gen/file.c");

    let leaf = registry.get(&key);
    let builder = Stub::new(&[key.clone()]);
    registry.register(builder.clone());

    let found = registry.find(&key).unwrap();
    assert!(Arc::ptr_eq(&found, &(builder as Arc<dyn Target>)));
    assert!(!Arc::ptr_eq(&found, &leaf));
  }

  #[test]
  fn conflicting_registration_takes_over() {
    let registry = Registry::new();
    let key = path_key("/out/prog");

    let first = Stub::new(&[key.clone()]);
    let second = Stub::new(&[key.clone()]);
    registry.register(first.clone());
    registry.register(second.clone());

    let owner = registry.find(&key).unwrap();
    assert!(Arc::ptr_eq(&owner, &(second as Arc<dyn Target>)));
    assert_eq!(registry.len(), 1);
  }

  #[test]
  fn re_registering_the_same_target_is_quiet() {
    let registry = Registry::new();
    let target = Stub::new(&[path_key("/out/a")]);

    registry.register(target.clone());
    registry.register(target.clone());

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.registered().len(), 1);
  }

  #[test]
  fn registered_deduplicates_multi_output_targets() {
    let registry = Registry::new();
    registry.register(Stub::new(&[path_key("/out/a"), path_key("/out/b")]));
    registry.register(Stub::new(&[path_key("/out/c")]));

    assert_eq!(registry.len(), 3);
    assert_eq!(registry.registered().len(), 2);
  }
}
