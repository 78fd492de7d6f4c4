//! `girder hash` - print the content fingerprint of a path.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use girder_lib::hash::hash_path;

use crate::output;

/// Fingerprint a file or directory the way the engine would.
pub fn cmd_hash(path: &Path) -> Result<ExitCode> {
  if !path.exists() {
    output::print_error(&format!("no such path: {}", path.display()));
    return Ok(ExitCode::FAILURE);
  }

  let fingerprint = hash_path(path)?;
  println!("{fingerprint}");
  Ok(ExitCode::SUCCESS)
}
