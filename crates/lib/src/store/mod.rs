//! Persistent fingerprint store.
//!
//! Two independently scoped key-value maps survive across runs: the
//! project scope (target fingerprints, under the out dir) and the system
//! scope (memoized executable lookups, in the user cache dir). Each scope
//! is one JSON file holding a `string -> value` map, loaded whole at
//! startup and flushed whole at teardown.
//!
//! Disabling caching for a run skips both the load and the flush for a
//! scope: reads start from an empty map, but memoization still works
//! within the run. There is no locking against concurrent processes; a
//! single writer is assumed.

pub mod paths;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

/// Which persisted map a store instance is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
  /// Per-project state, kept under the out dir.
  Project,
  /// Cross-project state, kept in the user cache dir.
  System,
}

impl std::fmt::Display for Scope {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Scope::Project => write!(f, "project"),
      Scope::System => write!(f, "system"),
    }
  }
}

/// Errors while loading or flushing a store file.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("failed to read {scope} store: {source}")]
  Read { scope: Scope, source: io::Error },

  #[error("failed to write {scope} store: {source}")]
  Write { scope: Scope, source: io::Error },

  #[error("failed to create {scope} cache directory: {source}")]
  CreateDir { scope: Scope, source: io::Error },

  #[error("failed to parse {scope} store: {source}")]
  Parse {
    scope: Scope,
    source: serde_json::Error,
  },

  #[error("failed to serialize {scope} store: {source}")]
  Serialize {
    scope: Scope,
    source: serde_json::Error,
  },
}

/// One scope of the persistent fingerprint store.
pub struct Store {
  scope: Scope,
  path: PathBuf,
  enabled: bool,
  entries: RwLock<BTreeMap<String, Value>>,
}

impl Store {
  /// Open a store backed by `path`.
  ///
  /// The backing file is read only when caching is enabled and the file
  /// exists; otherwise the store starts empty. A corrupt file is an
  /// error, not a silent reset.
  pub fn open(scope: Scope, path: PathBuf, enabled: bool) -> Result<Store, StoreError> {
    let entries = if enabled && path.exists() {
      let content = fs::read_to_string(&path).map_err(|source| StoreError::Read { scope, source })?;
      let map: BTreeMap<String, Value> =
        serde_json::from_str(&content).map_err(|source| StoreError::Parse { scope, source })?;
      info!(scope = %scope, path = %path.display(), entries = map.len(), "loaded fingerprint store");
      map
    } else {
      debug!(scope = %scope, enabled, "starting with empty fingerprint store");
      BTreeMap::new()
    };

    Ok(Store {
      scope,
      path,
      enabled,
      entries: RwLock::new(entries),
    })
  }

  pub fn scope(&self) -> Scope {
    self.scope
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn enabled(&self) -> bool {
    self.enabled
  }

  pub fn len(&self) -> usize {
    self.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.read().is_empty()
  }

  /// Look up a value.
  pub fn get(&self, key: &str) -> Option<Value> {
    self.read().get(key).cloned()
  }

  /// Look up a value expected to be a string.
  pub fn get_str(&self, key: &str) -> Option<String> {
    match self.read().get(key) {
      Some(Value::String(s)) => Some(s.clone()),
      _ => None,
    }
  }

  /// Insert or replace a value.
  pub fn set(&self, key: impl Into<String>, value: Value) {
    self.write().insert(key.into(), value);
  }

  /// Insert or replace a string value.
  pub fn set_str(&self, key: impl Into<String>, value: impl Into<String>) {
    self.set(key, Value::String(value.into()));
  }

  /// Remove a single entry.
  pub fn remove(&self, key: &str) -> Option<Value> {
    self.write().remove(key)
  }

  /// Drop every entry in this scope.
  pub fn clear(&self) {
    self.write().clear();
  }

  /// Serialize the full map to the backing file.
  ///
  /// Skipped entirely when caching is disabled for this run. The write is
  /// atomic: a sibling temp file is renamed over the target.
  pub fn flush(&self) -> Result<(), StoreError> {
    if !self.enabled {
      debug!(scope = %self.scope, "caching disabled, skipping store flush");
      return Ok(());
    }

    let scope = self.scope;
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir { scope, source })?;
    }

    let snapshot = self.read().clone();
    let content =
      serde_json::to_string_pretty(&snapshot).map_err(|source| StoreError::Serialize { scope, source })?;

    let temp_path = self.path.with_extension("json.tmp");
    fs::write(&temp_path, &content).map_err(|source| StoreError::Write { scope, source })?;
    fs::rename(&temp_path, &self.path).map_err(|source| StoreError::Write { scope, source })?;

    info!(scope = %scope, path = %self.path.display(), entries = snapshot.len(), "flushed fingerprint store");
    Ok(())
  }

  /// Delete the backing file, if any.
  ///
  /// Used by cache clearing; the in-memory map is cleared as well.
  pub fn delete_file(&self) -> Result<(), StoreError> {
    self.clear();
    match fs::remove_file(&self.path) {
      Ok(()) => {
        info!(scope = %self.scope, path = %self.path.display(), "deleted fingerprint store file");
        Ok(())
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(source) => Err(StoreError::Write {
        scope: self.scope,
        source,
      }),
    }
  }

  fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Value>> {
    self.entries.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Value>> {
    self.entries.write().unwrap_or_else(|e| e.into_inner())
  }
}
