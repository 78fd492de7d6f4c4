//! Executable lookup on the search path, memoized across runs.
//!
//! Results are cached in the system-scope fingerprint store so repeated
//! builds skip the directory scan. A cached path is re-validated before
//! use; a stale entry falls back to a fresh scan. The cache is not
//! invalidated when `PATH` itself changes between runs - it exists to
//! avoid filesystem scans, and lookups that move are rare.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::consts::WHICH_KEY_PREFIX;
use crate::context::Context;

/// Find an executable by name.
///
/// An absolute name is returned unchanged without re-verification.
/// Otherwise each directory on `PATH` is scanned in order, trying the
/// platform's executable suffixes from `PATHEXT` (empty suffix on Unix);
/// the first hit is cached and returned.
pub fn find_executable(ctx: &Context, name: &str) -> Option<PathBuf> {
  let as_path = Path::new(name);
  if as_path.is_absolute() {
    return Some(as_path.to_path_buf());
  }

  let cache_key = format!("{}{}", WHICH_KEY_PREFIX, name);
  if let Some(cached) = ctx.system_store().get_str(&cache_key) {
    let path = PathBuf::from(&cached);
    if is_executable(&path) {
      debug!(name, path = %path.display(), "executable lookup cache hit");
      return Some(path);
    }
    debug!(name, path = %cached, "cached executable vanished, rescanning");
  }

  let found = scan_path(name)?;
  ctx.system_store().set_str(cache_key, found.display().to_string());
  debug!(name, path = %found.display(), "executable found on search path");
  Some(found)
}

/// Walk the search path directories looking for `name`.
fn scan_path(name: &str) -> Option<PathBuf> {
  let path_var = env::var_os("PATH")?;
  let names = candidate_names(name);

  for dir in env::split_paths(&path_var) {
    for candidate in &names {
      let full = dir.join(candidate);
      if is_executable(&full) {
        return Some(full);
      }
    }
  }

  None
}

/// The file names to try for a command, honouring `PATHEXT`.
fn candidate_names(name: &str) -> Vec<String> {
  match env::var("PATHEXT") {
    Ok(exts) if !exts.is_empty() => exts
      .split(';')
      .map(|ext| format!("{}{}", name, ext))
      .collect(),
    _ => vec![name.to_string()],
  }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
  use std::os::unix::fs::PermissionsExt;

  path
    .metadata()
    .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
    .unwrap_or(false)
}

#[cfg(windows)]
fn is_executable(path: &Path) -> bool {
  path.is_file()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use serial_test::serial;
  use tempfile::tempdir;

  use crate::context::ContextConfig;

  #[cfg(unix)]
  fn install_tool(dir: &Path, name: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
  }

  fn test_ctx(root: &Path) -> Context {
    Context::new(ContextConfig::new(root).cache(false)).unwrap()
  }

  #[test]
  fn absolute_names_pass_through() {
    let temp = tempdir().unwrap();
    let ctx = test_ctx(temp.path());

    let result = find_executable(&ctx, "/no/such/tool");
    assert_eq!(result, Some(PathBuf::from("/no/such/tool")));
  }

  #[test]
  #[serial]
  #[cfg(unix)]
  fn finds_tools_on_the_search_path() {
    let temp = tempdir().unwrap();
    let bin = temp.path().join("bin");
    fs::create_dir(&bin).unwrap();
    let tool = install_tool(&bin, "girder-test-tool");

    let ctx = test_ctx(temp.path());
    temp_env::with_var("PATH", Some(bin.as_os_str()), || {
      assert_eq!(find_executable(&ctx, "girder-test-tool"), Some(tool.clone()));
    });
  }

  #[test]
  #[serial]
  #[cfg(unix)]
  fn lookup_is_memoized_in_the_system_store() {
    let temp = tempdir().unwrap();
    let bin = temp.path().join("bin");
    fs::create_dir(&bin).unwrap();
    let tool = install_tool(&bin, "cached-tool");

    let ctx = test_ctx(temp.path());
    temp_env::with_var("PATH", Some(bin.as_os_str()), || {
      find_executable(&ctx, "cached-tool").unwrap();
    });

    assert_eq!(
      ctx.system_store().get_str("which.cached-tool"),
      Some(tool.display().to_string())
    );

    // A cache hit does not need PATH at all.
    temp_env::with_var("PATH", Some(""), || {
      assert_eq!(find_executable(&ctx, "cached-tool"), Some(tool.clone()));
    });
  }

  #[test]
  #[serial]
  #[cfg(unix)]
  fn stale_cache_entry_triggers_a_rescan() {
    let temp = tempdir().unwrap();
    let bin = temp.path().join("bin");
    fs::create_dir(&bin).unwrap();
    let tool = install_tool(&bin, "moving-tool");

    let ctx = test_ctx(temp.path());
    ctx
      .system_store()
      .set_str("which.moving-tool", temp.path().join("gone").display().to_string());

    temp_env::with_var("PATH", Some(bin.as_os_str()), || {
      assert_eq!(find_executable(&ctx, "moving-tool"), Some(tool.clone()));
    });
  }

  #[test]
  #[serial]
  fn missing_tools_return_none() {
    let temp = tempdir().unwrap();
    let ctx = test_ctx(temp.path());

    temp_env::with_var("PATH", Some(temp.path().as_os_str()), || {
      assert_eq!(find_executable(&ctx, "definitely-not-installed"), None);
    });
  }

  #[test]
  #[serial]
  #[cfg(unix)]
  fn misses_are_not_cached() {
    let temp = tempdir().unwrap();
    let bin = temp.path().join("bin");
    fs::create_dir(&bin).unwrap();

    let ctx = test_ctx(temp.path());
    temp_env::with_var("PATH", Some(bin.as_os_str()), || {
      assert_eq!(find_executable(&ctx, "late-tool"), None);

      // The tool appears later; the next lookup rescans and finds it.
      let tool = install_tool(&bin, "late-tool");
      assert_eq!(find_executable(&ctx, "late-tool"), Some(tool));
    });
  }
}
