//! girder-lib: Core engine for the Girder incremental build orchestrator
//!
//! Build descriptions are ordinary Rust programs that link this crate,
//! register targets against a [`Context`] and hand control to
//! [`driver::main_with`]. The engine provides:
//! - `TargetKey`: canonical target identity (absolute path or `:tag`)
//! - `Target`: the graph node and its recursive build protocol
//! - `GeneratorTarget`: command-running targets with fingerprint caching
//! - `Store`: the persistent fingerprint cache (project and system scope)
//! - `exec`: synchronous command execution with build-step reporting
//! - `watch`: change-driven rebuild passes

pub mod consts;
pub mod context;
pub mod define;
pub mod driver;
pub mod error;
pub mod exec;
pub mod graph;
pub mod hash;
pub mod help;
pub mod key;
pub mod registry;
pub mod store;
pub mod target;
pub mod watch;

pub use context::{Context, ContextConfig};
pub use error::BuildError;
pub use exec::{Importance, run};
pub use exec::which::find_executable;
pub use hash::Fingerprint;
pub use key::TargetKey;
pub use registry::Registry;
pub use target::Target;
pub use target::generator::generator;
pub use target::tag::Tag;
