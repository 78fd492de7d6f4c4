mod cache;
mod hash;
mod which;

pub use cache::{cmd_cache_clear, cmd_cache_status};
pub use hash::cmd_hash;
pub use which::cmd_which;
