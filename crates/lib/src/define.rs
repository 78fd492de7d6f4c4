//! Configuration values supplied to build scripts.
//!
//! `-D/--define`, `-A/--append` and `-P/--prepend` populate one
//! process-wide map of named values that build scripts read back through
//! typed getters. A spec string is `key`, `key=value`, `key+=value`
//! (append) or `key^=value` (prepend); a bare key sets a flag.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::debug;

/// One configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefineValue {
  /// A bare flag, set or unset.
  Flag(bool),
  /// A single string value.
  Str(String),
  /// An ordered list of strings.
  List(Vec<String>),
}

/// The process-wide configuration map.
#[derive(Default)]
pub struct Defines {
  map: RwLock<BTreeMap<String, DefineValue>>,
}

impl Defines {
  pub fn new() -> Defines {
    Defines::default()
  }

  /// Apply a `-D` spec.
  ///
  /// `key=value` overwrites, `key+=value` appends, `key^=value` prepends
  /// and a bare `key` sets a flag. Later defines overwrite earlier ones.
  pub fn define(&self, spec: &str) {
    match split_spec(spec) {
      (key, None) => self.set(key, DefineValue::Flag(true)),
      (key, Some((Op::Set, value))) => self.set(key, DefineValue::Str(value.to_string())),
      (key, Some((Op::Append, value))) => self.push(key, value, Position::Back),
      (key, Some((Op::Prepend, value))) => self.push(key, value, Position::Front),
    }
  }

  /// Apply a `-A` spec: always appends, `key=value` and `key+=value` alike.
  pub fn append(&self, spec: &str) {
    let (key, rest) = split_spec(spec);
    match rest {
      None => self.push(key, "", Position::Back),
      Some((_, value)) => self.push(key, value, Position::Back),
    }
  }

  /// Apply a `-P` spec: always prepends.
  pub fn prepend(&self, spec: &str) {
    let (key, rest) = split_spec(spec);
    match rest {
      None => self.push(key, "", Position::Front),
      Some((_, value)) => self.push(key, value, Position::Front),
    }
  }

  /// Set a value directly.
  pub fn set(&self, key: &str, value: DefineValue) {
    debug!(key, ?value, "define set");
    self.write().insert(key.to_string(), value);
  }

  /// Set a value only if the key is not already defined.
  ///
  /// Used by build scripts for overridable defaults such as `prefix`.
  pub fn set_default(&self, key: &str, value: DefineValue) {
    let mut map = self.write();
    map.entry(key.to_string()).or_insert(value);
  }

  pub fn get(&self, key: &str) -> Option<DefineValue> {
    self.read().get(key).cloned()
  }

  /// The value as a single string; the last element for lists.
  pub fn get_str(&self, key: &str) -> Option<String> {
    match self.read().get(key) {
      Some(DefineValue::Str(s)) => Some(s.clone()),
      Some(DefineValue::List(items)) => items.last().cloned(),
      _ => None,
    }
  }

  /// The value as a list; a scalar becomes a one-element list.
  pub fn get_list(&self, key: &str) -> Vec<String> {
    match self.read().get(key) {
      Some(DefineValue::List(items)) => items.clone(),
      Some(DefineValue::Str(s)) => vec![s.clone()],
      _ => Vec::new(),
    }
  }

  /// Whether a flag is set (or any non-flag value is present).
  pub fn is_set(&self, key: &str) -> bool {
    match self.read().get(key) {
      Some(DefineValue::Flag(b)) => *b,
      Some(_) => true,
      None => false,
    }
  }

  /// Push onto a list value, converting scalars and overwriting flags.
  fn push(&self, key: &str, value: &str, position: Position) {
    let mut map = self.write();
    let entry = map
      .entry(key.to_string())
      .or_insert_with(|| DefineValue::List(Vec::new()));

    // A non-list current value is replaced by a list.
    if !matches!(entry, DefineValue::List(_)) {
      let seed = match entry {
        DefineValue::Str(s) => vec![s.clone()],
        _ => Vec::new(),
      };
      *entry = DefineValue::List(seed);
    }

    if let DefineValue::List(items) = entry {
      match position {
        Position::Back => items.push(value.to_string()),
        Position::Front => items.insert(0, value.to_string()),
      }
    }
  }

  fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, DefineValue>> {
    self.map.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, DefineValue>> {
    self.map.write().unwrap_or_else(|e| e.into_inner())
  }
}

enum Position {
  Front,
  Back,
}

enum Op {
  Set,
  Append,
  Prepend,
}

/// Split `key[=value]` with `+=`/`^=` operators.
///
/// The key is everything up to the first `=`; a `+` or `^` immediately
/// before the `=` selects append or prepend.
fn split_spec(spec: &str) -> (&str, Option<(Op, &str)>) {
  let Some(eq) = spec.find('=') else {
    return (spec, None);
  };

  let (raw_key, raw_value) = spec.split_at(eq);
  let value = &raw_value[1..];

  if let Some(key) = raw_key.strip_suffix('+') {
    (key, Some((Op::Append, value)))
  } else if let Some(key) = raw_key.strip_suffix('^') {
    (key, Some((Op::Prepend, value)))
  } else {
    (raw_key, Some((Op::Set, value)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bare_key_sets_a_flag() {
    let defines = Defines::new();
    defines.define("debug");

    assert!(defines.is_set("debug"));
    assert!(!defines.is_set("release"));
    assert_eq!(defines.get("debug"), Some(DefineValue::Flag(true)));
  }

  #[test]
  fn plain_define_overwrites() {
    let defines = Defines::new();
    defines.define("cc=gcc");
    defines.define("cc=clang");

    assert_eq!(defines.get_str("cc"), Some("clang".to_string()));
  }

  #[test]
  fn append_builds_a_list_in_order() {
    let defines = Defines::new();
    defines.define("cflags+=-O2");
    defines.append("cflags=-Wall");
    defines.append("cflags+=-g");

    assert_eq!(defines.get_list("cflags"), vec!["-O2", "-Wall", "-g"]);
  }

  #[test]
  fn prepend_inserts_at_the_front() {
    let defines = Defines::new();
    defines.append("path=/usr/bin");
    defines.prepend("path=/usr/local/bin");
    defines.define("path^=/opt/bin");

    assert_eq!(defines.get_list("path"), vec!["/opt/bin", "/usr/local/bin", "/usr/bin"]);
  }

  #[test]
  fn scalar_is_absorbed_into_a_list() {
    let defines = Defines::new();
    defines.define("libs=m");
    defines.append("libs=pthread");

    assert_eq!(defines.get_list("libs"), vec!["m", "pthread"]);
    // get_str on a list yields the last element.
    assert_eq!(defines.get_str("libs"), Some("pthread".to_string()));
  }

  #[test]
  fn set_default_does_not_overwrite() {
    let defines = Defines::new();
    defines.define("prefix=/opt");
    defines.set_default("prefix", DefineValue::Str("/usr/local".to_string()));
    defines.set_default("jobs", DefineValue::Str("4".to_string()));

    assert_eq!(defines.get_str("prefix"), Some("/opt".to_string()));
    assert_eq!(defines.get_str("jobs"), Some("4".to_string()));
  }

  #[test]
  fn scalar_reads_as_one_element_list() {
    let defines = Defines::new();
    defines.define("cc=gcc");
    assert_eq!(defines.get_list("cc"), vec!["gcc"]);
  }

  #[test]
  fn value_with_equals_keeps_the_tail() {
    let defines = Defines::new();
    defines.define("expr=a=b");
    assert_eq!(defines.get_str("expr"), Some("a=b".to_string()));
  }
}
