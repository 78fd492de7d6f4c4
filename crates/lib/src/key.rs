//! Canonical target identity.
//!
//! A [`TargetKey`] names one node of the build graph: either an absolute,
//! lexically normalized filesystem path, or an abstract tag such as `:all`.
//! Two raw strings that denote the same entity must resolve to the same
//! key, because registry de-duplication and built-two-ways detection
//! compare keys for equality.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Prefix marking a raw target string as a tag rather than a path.
pub const TAG_PREFIX: char = ':';

/// A canonical identifier for a build target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TargetKey {
  /// An absolute filesystem path.
  Path(PathBuf),
  /// An abstract tag name (phony goal), without the `:` prefix.
  Tag(String),
}

impl TargetKey {
  /// Resolve a raw user-supplied string into a canonical key.
  ///
  /// Strings starting with `:` become tags. Anything else is treated as a
  /// path: `~` is expanded, relative paths are joined onto `base`, and
  /// `.`/`..` segments are resolved lexically.
  pub fn resolve(raw: &str, base: &Path) -> TargetKey {
    if let Some(name) = raw.strip_prefix(TAG_PREFIX) {
      return TargetKey::Tag(name.to_string());
    }

    TargetKey::Path(resolve_path(Path::new(raw), base))
  }

  /// Build a tag key directly.
  pub fn tag(name: impl Into<String>) -> TargetKey {
    TargetKey::Tag(name.into())
  }

  /// Build a path key, canonicalizing against `base`.
  pub fn path(path: impl AsRef<Path>, base: &Path) -> TargetKey {
    TargetKey::Path(resolve_path(path.as_ref(), base))
  }

  pub fn is_tag(&self) -> bool {
    matches!(self, TargetKey::Tag(_))
  }

  /// The filesystem path behind this key, if it is a path key.
  pub fn as_path(&self) -> Option<&Path> {
    match self {
      TargetKey::Path(p) => Some(p),
      TargetKey::Tag(_) => None,
    }
  }
}

impl std::fmt::Display for TargetKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      TargetKey::Path(p) => write!(f, "{}", p.display()),
      TargetKey::Tag(t) => write!(f, "{}{}", TAG_PREFIX, t),
    }
  }
}

/// Canonicalize a path: expand `~`, absolutize against `base`, normalize.
fn resolve_path(path: &Path, base: &Path) -> PathBuf {
  let expanded = expand_home(path);
  let absolute = if expanded.is_absolute() {
    expanded
  } else {
    base.join(expanded)
  };
  normalize(&absolute)
}

/// Expand a leading `~` or `~/` into the user's home directory.
fn expand_home(path: &Path) -> PathBuf {
  let Some(s) = path.to_str() else {
    return path.to_path_buf();
  };

  if s == "~" {
    return dirs::home_dir().unwrap_or_else(|| path.to_path_buf());
  }
  if let Some(rest) = s.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }

  path.to_path_buf()
}

/// Lexically resolve `.` and `..` components of an absolute path.
///
/// This deliberately does not touch the filesystem: output paths do not
/// exist before their first build, yet must still have stable keys. A
/// `..` at the root is dropped, matching shell behaviour.
pub fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();

  for component in path.components() {
    match component {
      Component::Prefix(p) => out.push(p.as_os_str()),
      Component::RootDir => out.push(Component::RootDir.as_os_str()),
      Component::CurDir => {}
      Component::ParentDir => {
        out.pop();
      }
      Component::Normal(part) => out.push(part),
    }
  }

  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn base() -> PathBuf {
    PathBuf::from("/work/project")
  }

  #[test]
  fn tag_strings_become_tags() {
    assert_eq!(TargetKey::resolve(":all", &base()), TargetKey::Tag("all".to_string()));
    assert_eq!(TargetKey::resolve(":install", &base()), TargetKey::tag("install"));
  }

  #[test]
  fn relative_paths_join_the_base() {
    assert_eq!(
      TargetKey::resolve("src/main.c", &base()),
      TargetKey::Path(PathBuf::from("/work/project/src/main.c"))
    );
  }

  #[test]
  fn absolute_paths_are_kept() {
    assert_eq!(
      TargetKey::resolve("/usr/bin/cc", &base()),
      TargetKey::Path(PathBuf::from("/usr/bin/cc"))
    );
  }

  #[test]
  fn equivalent_spellings_resolve_identically() {
    let plain = TargetKey::resolve("src/main.c", &base());
    let dotted = TargetKey::resolve("./src/./main.c", &base());
    let parented = TargetKey::resolve("src/../src/main.c", &base());

    assert_eq!(plain, dotted);
    assert_eq!(plain, parented);
  }

  #[test]
  fn parent_segments_walk_up() {
    assert_eq!(
      TargetKey::resolve("../other/file", &base()),
      TargetKey::Path(PathBuf::from("/work/other/file"))
    );
  }

  #[test]
  fn parent_of_root_is_root() {
    assert_eq!(normalize(Path::new("/../etc")), PathBuf::from("/etc"));
  }

  #[test]
  fn display_round_trips_the_tag_prefix() {
    assert_eq!(TargetKey::tag("all").to_string(), ":all");
    assert_eq!(
      TargetKey::Path(PathBuf::from("/a/b")).to_string(),
      "/a/b"
    );
  }

  #[test]
  fn keys_order_stably() {
    let mut keys = vec![
      TargetKey::tag("b"),
      TargetKey::Path(PathBuf::from("/z")),
      TargetKey::tag("a"),
      TargetKey::Path(PathBuf::from("/a")),
    ];
    keys.sort();
    let rendered: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    assert_eq!(rendered, vec!["/a", "/z", ":a", ":b"]);
  }
}
