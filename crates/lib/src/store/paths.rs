//! Cache file locations for the two store scopes.

use std::env;
use std::path::{Path, PathBuf};

use crate::consts::{APP_NAME, PROJECT_CACHE_DIR, STORE_FILENAME, SYSTEM_CACHE_ENV};

/// The system-scope cache directory.
///
/// `GIRDER_CACHE_HOME` overrides the platform cache dir; the fallback for
/// exotic environments without a resolvable cache dir is `~/.cache`.
pub fn system_cache_dir() -> PathBuf {
  if let Some(dir) = env::var_os(SYSTEM_CACHE_ENV) {
    return PathBuf::from(dir);
  }

  dirs::cache_dir()
    .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
    .unwrap_or_else(|| PathBuf::from("."))
    .join(APP_NAME)
}

/// The backing file of the system-scope store.
pub fn system_store_file() -> PathBuf {
  system_cache_dir().join(STORE_FILENAME)
}

/// The project-scope cache directory, inside the out dir.
pub fn project_cache_dir(out_dir: &Path) -> PathBuf {
  out_dir.join(PROJECT_CACHE_DIR)
}

/// The backing file of the project-scope store.
pub fn project_store_file(out_dir: &Path) -> PathBuf {
  project_cache_dir(out_dir).join(STORE_FILENAME)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn env_var_overrides_system_cache_dir() {
    temp_env::with_var(SYSTEM_CACHE_ENV, Some("/tmp/girder-test-cache"), || {
      assert_eq!(system_cache_dir(), PathBuf::from("/tmp/girder-test-cache"));
      assert_eq!(
        system_store_file(),
        PathBuf::from("/tmp/girder-test-cache").join(STORE_FILENAME)
      );
    });
  }

  #[test]
  #[serial]
  fn default_system_cache_dir_ends_with_app_name() {
    temp_env::with_var(SYSTEM_CACHE_ENV, None::<&str>, || {
      let dir = system_cache_dir();
      assert!(dir.ends_with(APP_NAME));
    });
  }

  #[test]
  fn project_store_lives_under_the_out_dir() {
    let out = Path::new("/work/project/build");
    assert_eq!(
      project_store_file(out),
      PathBuf::from("/work/project/build/cache").join(STORE_FILENAME)
    );
  }
}
