//! Version checking: the persisted cache, the remote source, and the
//! timeout-bounded resolver that combines them.

pub mod cache;
pub mod resolver;
pub mod source;

pub use cache::{CACHE_TTL, VersionCache, VersionCacheEntry};
pub use resolver::{CheckState, PendingCheck, Resolution, UpdateResolver};
pub use source::{NpmRegistrySource, VersionSource, is_newer};
