//! Watch mode: change-driven rebuild passes.
//!
//! A filesystem watcher feeds change events into a channel consumed by
//! one coalescing loop. Bursts of events are batched with a short quiet
//! window, then the affected targets (the changed keys plus everything
//! transitively depending on them) are invalidated and the requested
//! keys are rebuilt. An in-flight pass is never cancelled; a new pass
//! simply starts after the current one completes.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::consts::WATCH_DEBOUNCE;
use crate::context::Context;
use crate::graph::DepGraph;
use crate::key::TargetKey;
use crate::target::build_requested;

/// Errors setting up or running the watch loop.
#[derive(Debug, Error)]
pub enum WatchError {
  #[error("file watcher error: {0}")]
  Watcher(#[from] notify::Error),

  #[error("file watcher channel disconnected")]
  Disconnected,
}

/// Tuning for the watch loop.
pub struct WatchOptions {
  /// Quiet window used to coalesce bursts of change events.
  pub debounce: Duration,
  /// Directories to watch recursively; defaults to the project root.
  pub paths: Vec<PathBuf>,
}

impl Default for WatchOptions {
  fn default() -> WatchOptions {
    WatchOptions {
      debounce: WATCH_DEBOUNCE,
      paths: Vec::new(),
    }
  }
}

/// Run build passes forever, re-triggered by filesystem changes.
///
/// The initial pass runs immediately. Pass failures are reported and do
/// not end the loop; the stores are flushed after every pass so state
/// survives however the process eventually exits.
pub fn watch(ctx: &Context, requested: &[TargetKey], options: WatchOptions) -> Result<(), WatchError> {
  run_pass(ctx, requested);

  let (tx, rx) = mpsc::channel::<Event>();
  let mut watcher: RecommendedWatcher =
    notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
      if let Ok(event) = res {
        let _ = tx.send(event);
      }
    })?;

  let roots = if options.paths.is_empty() {
    vec![ctx.root_dir().to_path_buf()]
  } else {
    options.paths.clone()
  };
  for root in &roots {
    watcher.watch(root, RecursiveMode::Recursive)?;
    info!(path = %root.display(), "watching for changes");
  }

  loop {
    // Block for the first event of a burst.
    let first = match rx.recv() {
      Ok(event) => event,
      Err(_) => return Err(WatchError::Disconnected),
    };

    let mut changed: HashSet<PathBuf> = HashSet::new();
    collect_paths(&first, ctx, &mut changed);

    // Coalesce the rest of the burst until a quiet window passes.
    loop {
      match rx.recv_timeout(options.debounce) {
        Ok(event) => collect_paths(&event, ctx, &mut changed),
        Err(RecvTimeoutError::Timeout) => break,
        Err(RecvTimeoutError::Disconnected) => return Err(WatchError::Disconnected),
      }
    }

    if changed.is_empty() {
      continue;
    }

    let invalidated = invalidate_affected(ctx, &changed);
    if invalidated == 0 {
      debug!("changes touched no known targets, skipping pass");
      continue;
    }

    info!(changed = changed.len(), invalidated, "changes detected, rebuilding");
    run_pass(ctx, requested);
  }
}

/// Record the paths of a relevant change event.
fn collect_paths(event: &Event, ctx: &Context, into: &mut HashSet<PathBuf>) {
  if !matches!(
    event.kind,
    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
  ) {
    return;
  }

  for path in &event.paths {
    // Cache writes during a pass must not re-trigger the next one.
    if path.starts_with(ctx.out_dir().join(crate::consts::PROJECT_CACHE_DIR)) {
      continue;
    }
    into.insert(path.clone());
  }
}

/// Invalidate every target affected by the changed paths.
///
/// Returns how many targets were invalidated; zero means the changes
/// were irrelevant to the graph.
fn invalidate_affected(ctx: &Context, changed: &HashSet<PathBuf>) -> usize {
  let graph = DepGraph::snapshot(ctx.registry());
  let changed_keys: Vec<TargetKey> = changed
    .iter()
    .map(|p| TargetKey::Path(crate::key::normalize(p)))
    .filter(|k| graph.contains(k))
    .collect();

  if changed_keys.is_empty() {
    return 0;
  }

  let mut invalidated = 0;
  for key in graph.affected(changed_keys) {
    if let Some(target) = ctx.registry().find(&key) {
      debug!(target = %key, "invalidating");
      target.invalidate();
      invalidated += 1;
    }
  }
  invalidated
}

/// One build pass over the requested keys, with store flush.
fn run_pass(ctx: &Context, requested: &[TargetKey]) {
  for (key, result) in build_requested(ctx, requested) {
    match result {
      Ok(()) => info!(target = %key, "up to date"),
      Err(e) => warn!(target = %key, error = %e, "build failed"),
    }
  }

  if let Err(e) = ctx.flush_stores() {
    warn!(error = %e, "store flush after pass failed");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  use crate::context::ContextConfig;
  use crate::target::generator::generator;

  #[test]
  fn default_options_use_the_debounce_constant() {
    let options = WatchOptions::default();
    assert_eq!(options.debounce, WATCH_DEBOUNCE);
    assert!(options.paths.is_empty());
  }

  #[test]
  #[cfg(unix)]
  fn invalidation_covers_transitive_dependents() {
    let temp = tempdir().unwrap();
    let ctx = Context::new(ContextConfig::new(temp.path()).cache(false)).unwrap();

    let src = temp.path().join("a.c");
    fs::write(&src, "source").unwrap();
    let obj = temp.path().join("a.o");
    let prog = temp.path().join("prog");

    let compile = format!("cp {} {}", src.display(), obj.display());
    let link = format!("cp {} {}", obj.display(), prog.display());

    generator(
      &ctx,
      &[&src.display().to_string()],
      &[&["/bin/sh", "-c", &compile]],
      &[&obj.display().to_string()],
      "Compiling",
    )
    .unwrap();
    generator(
      &ctx,
      &[&obj.display().to_string()],
      &[&["/bin/sh", "-c", &link]],
      &[&prog.display().to_string()],
      "Linking",
    )
    .unwrap();

    // First pass builds everything.
    ctx.get_target(&ctx.path_key(&prog)).build(&ctx).unwrap();
    assert!(prog.exists());

    // A change to the source invalidates compile, link and the source leaf.
    let changed: HashSet<PathBuf> = [src.clone()].into_iter().collect();
    let invalidated = invalidate_affected(&ctx, &changed);
    assert!(invalidated >= 2);

    // An unrelated path invalidates nothing.
    let unrelated: HashSet<PathBuf> = [temp.path().join("README")].into_iter().collect();
    assert_eq!(invalidate_affected(&ctx, &unrelated), 0);
  }

  #[test]
  fn cache_writes_are_ignored() {
    let temp = tempdir().unwrap();
    let ctx = Context::new(ContextConfig::new(temp.path()).cache(false)).unwrap();

    let cache_file = ctx
      .out_dir()
      .join(crate::consts::PROJECT_CACHE_DIR)
      .join("fingerprints.json");
    let event = Event {
      kind: EventKind::Modify(notify::event::ModifyKind::Any),
      paths: vec![cache_file],
      attrs: Default::default(),
    };

    let mut changed = HashSet::new();
    collect_paths(&event, &ctx, &mut changed);
    assert!(changed.is_empty());
  }

  #[test]
  #[cfg(unix)]
  fn second_pass_after_invalidation_rebuilds() {
    let temp = tempdir().unwrap();
    let ctx = Context::new(ContextConfig::new(temp.path()).cache(false)).unwrap();

    let src = temp.path().join("in.txt");
    fs::write(&src, "v1").unwrap();
    let out = temp.path().join("out.txt");
    let copy = format!("cp {} {}", src.display(), out.display());

    let outputs = generator(
      &ctx,
      &[&src.display().to_string()],
      &[&["/bin/sh", "-c", &copy]],
      &[&out.display().to_string()],
      "Copying",
    )
    .unwrap();

    run_pass(&ctx, &outputs);
    assert_eq!(fs::read_to_string(&out).unwrap(), "v1");

    fs::write(&src, "v2").unwrap();
    let changed: HashSet<PathBuf> = [src.clone()].into_iter().collect();
    invalidate_affected(&ctx, &changed);

    run_pass(&ctx, &outputs);
    assert_eq!(fs::read_to_string(&out).unwrap(), "v2");
  }
}
