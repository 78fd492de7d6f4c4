//! `girder cache` - fingerprint cache inspection and clearing.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use girder_lib::consts::DEFAULT_OUT_DIR;
use girder_lib::store::{Scope, Store, paths};
use tracing::debug;

use crate::output;

/// The project out dir implied by the current working directory.
fn default_out_dir() -> Result<PathBuf> {
  let cwd = env::current_dir().context("cannot determine current directory")?;
  Ok(cwd.join(DEFAULT_OUT_DIR))
}

/// Show where both cache scopes live and how much they hold.
pub fn cmd_cache_status() -> Result<ExitCode> {
  let project_file = paths::project_store_file(&default_out_dir()?);
  let system_file = paths::system_store_file();

  print_scope(Scope::Project, &project_file)?;
  print_scope(Scope::System, &system_file)?;

  Ok(ExitCode::SUCCESS)
}

fn print_scope(scope: Scope, file: &Path) -> Result<()> {
  output::print_info(&format!("{scope} cache"));
  output::print_stat("path", &file.display().to_string());

  if file.exists() {
    // Loading also validates the file; a corrupt cache is worth knowing.
    match Store::open(scope, file.to_path_buf(), true) {
      Ok(store) => output::print_stat("entries", &store.len().to_string()),
      Err(e) => output::print_stat("entries", &format!("unreadable ({e})")),
    }
  } else {
    output::print_stat("entries", "none (no cache file)");
  }

  Ok(())
}

/// Delete cached state; both scopes unless narrowed by a flag.
///
/// Operates on the files directly so that even a corrupt cache can be
/// cleared.
pub fn cmd_cache_clear(project: bool, system: bool) -> Result<ExitCode> {
  // No flag means both.
  let all = !project && !system;

  if project || all {
    let file = paths::project_store_file(&default_out_dir()?);
    remove(&file)?;
    output::print_success(&format!("cleared project cache ({})", file.display()));
  }

  if system || all {
    let file = paths::system_store_file();
    remove(&file)?;
    output::print_success(&format!("cleared system cache ({})", file.display()));
  }

  Ok(ExitCode::SUCCESS)
}

fn remove(file: &Path) -> Result<()> {
  match fs::remove_file(file) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      debug!(path = %file.display(), "cache file already absent");
      Ok(())
    }
    Err(e) => Err(e).context(format!("cannot remove {}", file.display())),
  }
}
