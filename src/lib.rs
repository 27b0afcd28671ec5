//! Pixcache - an async image loader with two-tier caching.
//!
//! Loads images identified by URL onto a caller-supplied render target,
//! falling back through memory cache, disk cache, and network. Decoded
//! images live in a byte-budgeted LRU memory tier; encoded bytes persist
//! in a write-once disk tier keyed by a SHA-256 derived cache key.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing cache tiers, the HTTP fetcher, and the loader.
pub mod infrastructure;

pub use domain::entities::{CacheKey, Fallback, ImageBlob, ImageRef, ImageSource, LoadedImage};
pub use domain::errors::{LoadError, LoadResult};
pub use domain::ports::{FetcherPort, RenderTarget};
pub use infrastructure::{
    CacheStats, DiskImageCache, HttpFetcher, ImageLoadedEvent, ImageLoader, LoaderBuilder,
    LoaderConfig, MemoryImageCache, TargetHandle,
};

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = "pixcache";
