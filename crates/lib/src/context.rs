//! The process-scoped build context.
//!
//! One explicit [`Context`] owns everything the engine and its
//! collaborators share: the target registry, both fingerprint store
//! scopes, the configuration defines and the directory layout. It is
//! created at startup, passed by reference everywhere, and torn down
//! with a final store flush. There are no module-level globals.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::consts::DEFAULT_OUT_DIR;
use crate::define::Defines;
use crate::exec::Importance;
use crate::key::{self, TargetKey};
use crate::registry::Registry;
use crate::store::{Scope, Store, StoreError, paths};
use crate::target::Target;
use crate::target::tag::{Tag, TagTarget};

/// Configuration for building a [`Context`].
pub struct ContextConfig {
  root_dir: PathBuf,
  out_dir: Option<PathBuf>,
  cache: bool,
  min_importance: Importance,
}

impl ContextConfig {
  /// Start from a project root directory.
  pub fn new(root_dir: impl Into<PathBuf>) -> ContextConfig {
    ContextConfig {
      root_dir: root_dir.into(),
      out_dir: None,
      cache: true,
      min_importance: Importance::Med,
    }
  }

  /// Override the out dir (default: `<root>/build`).
  pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> ContextConfig {
    self.out_dir = Some(dir.into());
    self
  }

  /// Enable or disable persistent caching for this run.
  pub fn cache(mut self, enabled: bool) -> ContextConfig {
    self.cache = enabled;
    self
  }

  /// Suppress reported build steps below this importance.
  pub fn min_importance(mut self, importance: Importance) -> ContextConfig {
    self.min_importance = importance;
    self
  }
}

/// The process-scoped engine state.
pub struct Context {
  invocation_dir: PathBuf,
  root_dir: PathBuf,
  out_dir: PathBuf,
  cache_enabled: bool,
  min_importance: Importance,
  registry: Registry,
  defines: Defines,
  project_store: Store,
  system_store: Store,
  tags: RwLock<HashMap<String, Arc<TagTarget>>>,
}

impl Context {
  /// Build a context and load the fingerprint stores.
  ///
  /// The invocation dir is captured from the current working directory;
  /// path keys resolve relative to it. Creates the default `:all`,
  /// `:install` and `:none` tags.
  pub fn new(config: ContextConfig) -> Result<Context, StoreError> {
    let invocation_dir = env::current_dir()
      .and_then(dunce::canonicalize)
      .unwrap_or_else(|_| PathBuf::from("."));

    let root_dir = key::normalize(&if config.root_dir.is_absolute() {
      config.root_dir.clone()
    } else {
      invocation_dir.join(&config.root_dir)
    });

    let out_dir = match config.out_dir {
      Some(dir) if dir.is_absolute() => key::normalize(&dir),
      Some(dir) => key::normalize(&invocation_dir.join(dir)),
      None => root_dir.join(DEFAULT_OUT_DIR),
    };

    debug!(
      root = %root_dir.display(),
      out = %out_dir.display(),
      cache = config.cache,
      "creating build context"
    );

    let project_store = Store::open(
      Scope::Project,
      paths::project_store_file(&out_dir),
      config.cache,
    )?;
    let system_store = Store::open(Scope::System, paths::system_store_file(), config.cache)?;

    let ctx = Context {
      invocation_dir,
      root_dir,
      out_dir,
      cache_enabled: config.cache,
      min_importance: config.min_importance,
      registry: Registry::new(),
      defines: Defines::new(),
      project_store,
      system_store,
      tags: RwLock::new(HashMap::new()),
    };

    // Default phony goals every project gets.
    ctx.tag("all").describe("All targets.");
    ctx.tag("install").describe("Install the project.");
    ctx.tag("none").describe("Do nothing.");
    crate::help::register_help_targets(&ctx);

    Ok(ctx)
  }

  pub fn invocation_dir(&self) -> &Path {
    &self.invocation_dir
  }

  pub fn root_dir(&self) -> &Path {
    &self.root_dir
  }

  pub fn out_dir(&self) -> &Path {
    &self.out_dir
  }

  pub fn cache_enabled(&self) -> bool {
    self.cache_enabled
  }

  pub fn min_importance(&self) -> Importance {
    self.min_importance
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  pub fn defines(&self) -> &Defines {
    &self.defines
  }

  pub fn project_store(&self) -> &Store {
    &self.project_store
  }

  pub fn system_store(&self) -> &Store {
    &self.system_store
  }

  pub fn store(&self, scope: Scope) -> &Store {
    match scope {
      Scope::Project => &self.project_store,
      Scope::System => &self.system_store,
    }
  }

  /// Resolve a raw target string against the invocation dir.
  pub fn key(&self, raw: &str) -> TargetKey {
    TargetKey::resolve(raw, &self.invocation_dir)
  }

  /// Resolve a path (never a tag) against the invocation dir.
  pub fn path_key(&self, path: impl AsRef<Path>) -> TargetKey {
    TargetKey::path(path, &self.invocation_dir)
  }

  /// Expand a glob pattern into sorted path keys.
  ///
  /// Relative patterns are anchored at the invocation dir. Unreadable
  /// entries are skipped; an invalid pattern yields an empty list with
  /// a warning rather than failing the script.
  pub fn glob(&self, pattern: &str) -> Vec<TargetKey> {
    let absolute = if Path::new(pattern).is_absolute() {
      pattern.to_string()
    } else {
      self.invocation_dir.join(pattern).display().to_string()
    };

    match glob::glob(&absolute) {
      Ok(paths) => {
        let mut keys: Vec<TargetKey> = paths
          .filter_map(Result::ok)
          .map(|p| TargetKey::Path(key::normalize(&p)))
          .collect();
        keys.sort();
        keys
      }
      Err(e) => {
        warn!(pattern, error = %e, "invalid glob pattern");
        Vec::new()
      }
    }
  }

  /// A probably-unique output path under the out dir.
  ///
  /// The directory segment is derived from `seed`, so the same seed
  /// yields the same path across runs and generated files keep stable
  /// keys instead of forcing rebuilds.
  pub fn unique_path(&self, base: &str, seed: &str) -> PathBuf {
    let digest = crate::hash::hash_bytes(seed.as_bytes());
    self.out_dir.join("unique").join(&digest.as_str()[..20]).join(base)
  }

  /// Shorthand for [`Registry::find`].
  pub fn find_target(&self, key: &TargetKey) -> Option<Arc<dyn Target>> {
    self.registry.find(key)
  }

  /// Shorthand for [`Registry::get`].
  pub fn get_target(&self, key: &TargetKey) -> Arc<dyn Target> {
    self.registry.get(key)
  }

  /// Shorthand for [`Registry::register`].
  pub fn register(&self, target: Arc<dyn Target>) {
    self.registry.register(target);
  }

  /// Get or create the tag named `name`.
  pub fn tag(&self, name: &str) -> Tag {
    {
      let tags = self.tags.read().unwrap_or_else(|e| e.into_inner());
      if let Some(existing) = tags.get(name) {
        return Tag::from_target(existing.clone());
      }
    }

    let mut tags = self.tags.write().unwrap_or_else(|e| e.into_inner());
    let target = tags
      .entry(name.to_string())
      .or_insert_with(|| {
        let target = Arc::new(TagTarget::new(name));
        self.registry.register(target.clone());
        target
      })
      .clone();
    Tag::from_target(target)
  }

  /// Flush both store scopes to disk.
  ///
  /// This is the teardown step of the persistence lifecycle; call it
  /// once after the last pass. Errors in one scope do not prevent the
  /// flush of the other.
  pub fn flush_stores(&self) -> Result<(), StoreError> {
    let project = self.project_store.flush();
    let system = self.system_store.flush();

    if let Err(e) = &project {
      warn!(error = %e, "project store flush failed");
    }
    if let Err(e) = &system {
      warn!(error = %e, "system store flush failed");
    }

    project.and(system)
  }
}
