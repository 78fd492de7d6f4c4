//! `girder which` - resolve a tool on the search path.

use std::env;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use girder_lib::{Context, ContextConfig, find_executable};

use crate::output;

/// Resolve `name` the way generators do, warming the system cache.
pub fn cmd_which(name: &str) -> Result<ExitCode> {
  let cwd = env::current_dir().context("cannot determine current directory")?;
  let ctx = Context::new(ContextConfig::new(cwd)).context("cannot open fingerprint stores")?;

  match find_executable(&ctx, name) {
    Some(path) => {
      println!("{}", path.display());
      // Persist the lookup so the next build starts warm.
      let _ = ctx.flush_stores();
      Ok(ExitCode::SUCCESS)
    }
    None => {
      output::print_error(&format!("cannot find executable: {name}"));
      Ok(ExitCode::FAILURE)
    }
  }
}
