//! Shared constants for cache layout, store keys and timing.

use std::time::Duration;

/// Application name, used for the system cache directory.
pub const APP_NAME: &str = "girder";

/// Environment variable overriding the system cache directory.
pub const SYSTEM_CACHE_ENV: &str = "GIRDER_CACHE_HOME";

/// File name of a serialized fingerprint store, in either scope.
pub const STORE_FILENAME: &str = "fingerprints.json";

/// Subdirectory of the out dir holding the project-scope cache.
pub const PROJECT_CACHE_DIR: &str = "cache";

/// Default out dir, relative to the project root.
pub const DEFAULT_OUT_DIR: &str = "build";

/// Store key prefix for persisted target fingerprints (project scope).
pub const TARGET_KEY_PREFIX: &str = "target.";

/// Store key prefix for memoized executable lookups (system scope).
pub const WHICH_KEY_PREFIX: &str = "which.";

/// Quiet window used to coalesce bursts of file-change events.
pub const WATCH_DEBOUNCE: Duration = Duration::from_millis(200);
