//! Infrastructure layer with cache tiers and external service adapters.

/// Loader configuration and builder.
pub mod config;
/// Disk cache tier.
pub mod disk_cache;
/// Network fetch and decode.
pub mod fetch;
/// Load orchestration.
pub mod loader;
/// In-memory cache tier.
pub mod memory_cache;

pub use config::{LoaderBuilder, LoaderConfig};
pub use disk_cache::DiskImageCache;
pub use fetch::{FetchAdapter, FetchedImage, HttpFetcher};
pub use loader::{ImageLoadedEvent, ImageLoader, TargetHandle};
pub use memory_cache::{CacheStats, MemoryImageCache};
