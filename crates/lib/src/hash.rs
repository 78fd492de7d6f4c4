//! Content hashing for staleness detection.
//!
//! Every fingerprint is a full SHA-256 digest rendered as lowercase hex.
//! Fingerprints summarize file contents, directory trees, or arbitrary
//! part lists (used to combine input fingerprints with build parameters),
//! and must be deterministic across processes so they can be compared
//! against values persisted by earlier runs.

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// A deterministic digest of a target's build-relevant state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Error while hashing filesystem content.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
  #[error("failed to read {path}: {message}")]
  ReadFile { path: String, message: String },

  #[error("failed to walk directory: {message}")]
  WalkDir { message: String },

  #[error("failed to read symlink {path}: {message}")]
  ReadSymlink { path: String, message: String },
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> Fingerprint {
  let mut hasher = Sha256::new();
  hasher.update(data);
  Fingerprint(hex::encode(hasher.finalize()))
}

/// Hash an ordered list of string parts.
///
/// Each part is fed with a NUL terminator so that part boundaries matter:
/// `["ab", "c"]` and `["a", "bc"]` hash differently.
pub fn hash_parts<I, S>(parts: I) -> Fingerprint
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let mut hasher = Sha256::new();
  for part in parts {
    hasher.update(part.as_ref().as_bytes());
    hasher.update(b"\0");
  }
  Fingerprint(hex::encode(hasher.finalize()))
}

/// Hash a file's contents, streaming in fixed-size chunks.
pub fn hash_file(path: &Path) -> Result<Fingerprint, HashError> {
  let mut file = fs::File::open(path).map_err(|e| HashError::ReadFile {
    path: path.display().to_string(),
    message: e.to_string(),
  })?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(|e| HashError::ReadFile {
      path: path.display().to_string(),
      message: e.to_string(),
    })?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(Fingerprint(hex::encode(hasher.finalize())))
}

/// Compute a deterministic hash of a directory's contents.
///
/// Includes file contents, the directory structure, and symlink targets;
/// excludes metadata such as timestamps and permissions. Entries are
/// visited in sorted order so the result is stable.
pub fn hash_dir(path: &Path) -> Result<Fingerprint, HashError> {
  let mut entries: Vec<String> = Vec::new();

  for entry in WalkDir::new(path).sort_by_file_name() {
    let entry = entry.map_err(|e| HashError::WalkDir { message: e.to_string() })?;
    let entry_path = entry.path();

    let rel_path = entry_path
      .strip_prefix(path)
      .unwrap_or(entry_path)
      .to_string_lossy()
      .to_string();

    // Skip the root directory itself.
    if rel_path.is_empty() {
      continue;
    }

    let file_type = entry.file_type();
    let line = if file_type.is_file() {
      let content = hash_file(entry_path)?;
      format!("F:{}:{}", rel_path, content.0)
    } else if file_type.is_dir() {
      format!("D:{}", rel_path)
    } else if file_type.is_symlink() {
      let link = fs::read_link(entry_path).map_err(|e| HashError::ReadSymlink {
        path: entry_path.display().to_string(),
        message: e.to_string(),
      })?;
      format!("L:{}:{}", rel_path, hash_bytes(link.to_string_lossy().as_bytes()).0)
    } else {
      // Special files (sockets, devices) carry no buildable content.
      continue;
    };

    entries.push(line);
  }

  Ok(hash_parts(entries))
}

/// Hash a filesystem path, dispatching on its type.
///
/// Regular files hash their contents; directories hash their whole tree.
pub fn hash_path(path: &Path) -> Result<Fingerprint, HashError> {
  if path.is_dir() {
    hash_dir(path)
  } else {
    hash_file(path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  #[test]
  fn bytes_hash_is_deterministic() {
    assert_eq!(hash_bytes(b"hello"), hash_bytes(b"hello"));
    assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
  }

  #[test]
  fn parts_hash_respects_boundaries() {
    assert_ne!(hash_parts(["ab", "c"]), hash_parts(["a", "bc"]));
    assert_ne!(hash_parts(["a", "b"]), hash_parts(["a", "b", ""]));
    assert_eq!(hash_parts(["a", "b"]), hash_parts(["a", "b"]));
  }

  #[test]
  fn file_hash_tracks_content() {
    let temp = tempdir().unwrap();
    let file = temp.path().join("input.txt");

    fs::write(&file, "original").unwrap();
    let before = hash_file(&file).unwrap();
    assert_eq!(before.0.len(), 64);

    fs::write(&file, "modified").unwrap();
    let after = hash_file(&file).unwrap();
    assert_ne!(before, after);
  }

  #[test]
  fn missing_file_is_an_error() {
    let temp = tempdir().unwrap();
    let result = hash_file(&temp.path().join("nope"));
    assert!(matches!(result, Err(HashError::ReadFile { .. })));
  }

  #[test]
  fn dir_hash_is_deterministic() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("a.txt"), "content a").unwrap();
    fs::write(temp.path().join("b.txt"), "content b").unwrap();

    assert_eq!(hash_dir(temp.path()).unwrap(), hash_dir(temp.path()).unwrap());
  }

  #[test]
  fn dir_hash_changes_with_new_file() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("a.txt"), "content").unwrap();
    let before = hash_dir(temp.path()).unwrap();

    fs::write(temp.path().join("b.txt"), "more").unwrap();
    assert_ne!(before, hash_dir(temp.path()).unwrap());
  }

  #[test]
  fn dir_hash_sees_structure() {
    let flat = tempdir().unwrap();
    fs::write(flat.path().join("file.txt"), "content").unwrap();

    let nested = tempdir().unwrap();
    fs::create_dir(nested.path().join("sub")).unwrap();
    fs::write(nested.path().join("sub/file.txt"), "content").unwrap();

    assert_ne!(hash_dir(flat.path()).unwrap(), hash_dir(nested.path()).unwrap());
  }

  #[test]
  fn path_hash_dispatches() {
    let temp = tempdir().unwrap();
    let file = temp.path().join("f");
    fs::write(&file, "x").unwrap();

    assert_eq!(hash_path(&file).unwrap(), hash_file(&file).unwrap());
    assert_eq!(hash_path(temp.path()).unwrap(), hash_dir(temp.path()).unwrap());
  }
}
