//! Built-in help targets.
//!
//! Building `:help` prints the known tags with their descriptions;
//! `:help-built` lists targets produced under the out dir, `:help-src`
//! everything else, and `:help-all` prints every section. The listings
//! are targets rather than flags so that requesting `:help` composes
//! with ordinary requests and always reflects what the script actually
//! registered.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::context::Context;
use crate::error::BuildError;
use crate::key::TargetKey;
use crate::target::{BuildFlag, Target};

/// Which sections a help target prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
  Tags,
  Built,
  Sources,
}

/// One registered `:help*` tag.
pub struct HelpTarget {
  name: &'static str,
  sections: &'static [Section],
  hint: bool,
  flag: BuildFlag,
}

impl HelpTarget {
  fn new(name: &'static str, sections: &'static [Section], hint: bool) -> Arc<HelpTarget> {
    Arc::new(HelpTarget {
      name,
      sections,
      hint,
      flag: BuildFlag::new(),
    })
  }

  fn print_group(ctx: &Context, heading: &str, wanted: Section) {
    let mut lines: Vec<(String, Option<String>)> = Vec::new();

    for target in ctx.registry().registered() {
      for key in target.outputs() {
        let section = match &key {
          TargetKey::Tag(_) => Section::Tags,
          TargetKey::Path(p) if p.starts_with(ctx.out_dir()) => Section::Built,
          TargetKey::Path(_) => Section::Sources,
        };
        if section == wanted {
          lines.push((key.to_string(), target.description()));
        }
      }
    }

    if lines.is_empty() {
      return;
    }
    lines.sort();

    println!("{heading}");
    for (key, description) in lines {
      match description {
        Some(text) => println!("  {key:<20} - {text}"),
        None => println!("  {key}"),
      }
    }
  }
}

impl Target for HelpTarget {
  fn outputs(&self) -> BTreeSet<TargetKey> {
    [TargetKey::tag(self.name)].into_iter().collect()
  }

  fn description(&self) -> Option<String> {
    Some("Show available targets.".to_string())
  }

  fn flag(&self) -> &BuildFlag {
    &self.flag
  }

  fn build_self(&self, ctx: &Context) -> Result<(), BuildError> {
    if self.hint {
      println!("Help:");
      println!("  Showing tags only. For more see :help-built, :help-src or :help-all.");
    }
    for section in self.sections {
      match section {
        Section::Tags => Self::print_group(ctx, "Tags:", Section::Tags),
        Section::Built => Self::print_group(ctx, "Build targets:", Section::Built),
        Section::Sources => Self::print_group(ctx, "Other targets:", Section::Sources),
      }
    }
    Ok(())
  }
}

/// Register the `:help` family; called once from context construction.
pub(crate) fn register_help_targets(ctx: &Context) {
  ctx.register(HelpTarget::new("help", &[Section::Tags], true));
  ctx.register(HelpTarget::new("help-tag", &[Section::Tags], false));
  ctx.register(HelpTarget::new("help-built", &[Section::Built], false));
  ctx.register(HelpTarget::new("help-src", &[Section::Sources], false));
  ctx.register(HelpTarget::new(
    "help-all",
    &[Section::Tags, Section::Built, Section::Sources],
    false,
  ));
}
