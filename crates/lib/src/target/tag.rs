//! Tag (phony) targets.
//!
//! A tag aggregates other keys under an abstract goal such as `:all` or
//! `:install`. It has no production step and is never clean: requesting
//! a tag always re-walks its inputs, which is cheap because clean
//! dependents skip their own production steps.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use crate::context::Context;
use crate::error::BuildError;
use crate::key::TargetKey;
use crate::target::{BuildFlag, Target};

/// The registry-resident target behind a tag.
pub struct TagTarget {
  name: String,
  inputs: RwLock<BTreeSet<TargetKey>>,
  description: RwLock<Option<String>>,
  flag: BuildFlag,
}

impl TagTarget {
  pub fn new(name: impl Into<String>) -> TagTarget {
    TagTarget {
      name: name.into(),
      inputs: RwLock::new(BTreeSet::new()),
      description: RwLock::new(None),
      flag: BuildFlag::new(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Add a key this tag pulls in.
  pub fn require(&self, key: TargetKey) {
    let mut inputs = self.inputs.write().unwrap_or_else(|e| e.into_inner());
    inputs.insert(key);
  }

  pub fn set_description(&self, description: impl Into<String>) {
    let mut slot = self.description.write().unwrap_or_else(|e| e.into_inner());
    *slot = Some(description.into());
  }
}

impl Target for TagTarget {
  fn inputs(&self) -> BTreeSet<TargetKey> {
    self.inputs.read().unwrap_or_else(|e| e.into_inner()).clone()
  }

  fn outputs(&self) -> BTreeSet<TargetKey> {
    [TargetKey::tag(&self.name)].into_iter().collect()
  }

  fn description(&self) -> Option<String> {
    self.description.read().unwrap_or_else(|e| e.into_inner()).clone()
  }

  fn flag(&self) -> &BuildFlag {
    &self.flag
  }

  fn build_self(&self, _ctx: &Context) -> Result<(), BuildError> {
    // Aggregation only: the dependency walk already built the inputs.
    Ok(())
  }
}

/// Build-script handle for a tag, obtained from [`Context::tag`].
#[derive(Clone)]
pub struct Tag {
  target: Arc<TagTarget>,
}

impl Tag {
  pub(crate) fn from_target(target: Arc<TagTarget>) -> Tag {
    Tag { target }
  }

  /// The tag's key, e.g. `:all`.
  pub fn key(&self) -> TargetKey {
    TargetKey::tag(self.target.name())
  }

  pub fn name(&self) -> &str {
    self.target.name()
  }

  /// Require a single key.
  pub fn require(&self, key: TargetKey) {
    self.target.require(key);
  }

  /// Require several keys at once.
  pub fn require_all(&self, keys: impl IntoIterator<Item = TargetKey>) {
    for key in keys {
      self.target.require(key);
    }
  }

  /// Set the help text shown when listing targets.
  pub fn describe(&self, description: impl Into<String>) {
    self.target.set_description(description);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  use crate::context::ContextConfig;

  #[test]
  fn tags_are_never_clean() {
    let tag = TagTarget::new("all");
    let temp = tempdir().unwrap();
    let ctx = Context::new(ContextConfig::new(temp.path()).cache(false)).unwrap();
    assert!(!tag.is_clean(&ctx));
  }

  #[test]
  fn require_accumulates_inputs() {
    let tag = TagTarget::new("all");
    tag.require(TargetKey::tag("prog"));
    tag.require(TargetKey::tag("docs"));
    tag.require(TargetKey::tag("prog"));

    assert_eq!(tag.inputs().len(), 2);
  }

  #[test]
  fn building_a_tag_builds_its_requirements() {
    let temp = tempdir().unwrap();
    let ctx = Context::new(ContextConfig::new(temp.path()).cache(false)).unwrap();

    // A requirement that is itself a tag with no builder resolves to a
    // synthesized leaf and succeeds trivially.
    let all = ctx.tag("everything");
    all.require(ctx.tag("sub").key());

    let target = ctx.get_target(&all.key());
    target.build(&ctx).unwrap();
  }

  #[test]
  fn handle_exposes_name_and_key() {
    let tag = Tag::from_target(Arc::new(TagTarget::new("test")));
    assert_eq!(tag.name(), "test");
    assert_eq!(tag.key(), TargetKey::tag("test"));
  }
}
