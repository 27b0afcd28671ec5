//! Loader configuration and builder.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::domain::entities::ImageRef;
use crate::domain::errors::LoadResult;
use crate::domain::ports::FetcherPort;
use crate::infrastructure::disk_cache::DiskImageCache;
use crate::infrastructure::fetch::HttpFetcher;
use crate::infrastructure::loader::{ImageLoadedEvent, ImageLoader};
use crate::infrastructure::memory_cache::DEFAULT_MEMORY_BUDGET;

const APP_NAME: &str = "pixcache";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Immutable options shared by every load issued by one loader instance.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Fallback shown immediately on every load, if configured.
    pub placeholder: Option<ImageRef>,
    /// Fallback shown when a fetch fails, if configured.
    pub error_image: Option<ImageRef>,
    /// Byte budget for the in-memory tier.
    pub memory_budget_bytes: usize,
    /// Directory holding the disk tier's files.
    pub cache_dir: PathBuf,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Cap on concurrent fetches. `None` leaves them unbounded.
    pub max_concurrent_fetches: Option<usize>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            placeholder: None,
            error_image: None,
            memory_budget_bytes: DEFAULT_MEMORY_BUDGET,
            cache_dir: default_cache_dir(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_concurrent_fetches: None,
        }
    }
}

/// Returns the default cache directory path.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME).map_or_else(
        || {
            std::env::temp_dir()
                .join(APP_NAME)
                .join("cache")
                .join("images")
        },
        |dirs| dirs.cache_dir().join("images"),
    )
}

/// Builder for [`ImageLoader`].
///
/// ```no_run
/// # use pixcache::LoaderBuilder;
/// # async fn build() -> pixcache::LoadResult<()> {
/// let loader = LoaderBuilder::new()
///     .placeholder("spinner")
///     .error_image("broken-image")
///     .memory_budget_bytes(32 * 1024 * 1024)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct LoaderBuilder {
    config: LoaderConfig,
    fetcher: Option<Arc<dyn FetcherPort>>,
    event_tx: Option<mpsc::UnboundedSender<ImageLoadedEvent>>,
}

impl LoaderBuilder {
    /// Starts a builder with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the placeholder shown immediately on every load.
    #[must_use]
    pub fn placeholder(mut self, image: impl Into<ImageRef>) -> Self {
        self.config.placeholder = Some(image.into());
        self
    }

    /// Sets the fallback shown when a fetch fails.
    #[must_use]
    pub fn error_image(mut self, image: impl Into<ImageRef>) -> Self {
        self.config.error_image = Some(image.into());
        self
    }

    /// Sets the byte budget for the in-memory tier.
    #[must_use]
    pub fn memory_budget_bytes(mut self, bytes: usize) -> Self {
        self.config.memory_budget_bytes = bytes;
        self
    }

    /// Sets the disk tier directory.
    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = dir.into();
        self
    }

    /// Sets the request timeout in seconds.
    #[must_use]
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    /// Caps the number of concurrent fetches.
    #[must_use]
    pub fn max_concurrent_fetches(mut self, max: usize) -> Self {
        self.config.max_concurrent_fetches = Some(max);
        self
    }

    /// Replaces the network fetcher. Defaults to [`HttpFetcher`].
    #[must_use]
    pub fn fetcher(mut self, fetcher: Arc<dyn FetcherPort>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Registers a channel that receives an [`ImageLoadedEvent`] for every
    /// terminal load outcome.
    #[must_use]
    pub fn events(mut self, tx: mpsc::UnboundedSender<ImageLoadedEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Builds the loader.
    ///
    /// If the cache directory cannot be created the loader degrades to
    /// memory-only caching; the disk tier is simply absent for its
    /// lifetime.
    ///
    /// # Errors
    /// Returns [`crate::LoadError::Network`] if the default HTTP client
    /// cannot be constructed.
    pub async fn build(self) -> LoadResult<ImageLoader> {
        let fetcher: Arc<dyn FetcherPort> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(self.config.timeout_secs)?),
        };

        let disk = match DiskImageCache::new(self.config.cache_dir.clone()).await {
            Ok(cache) => Some(Arc::new(cache)),
            Err(e) => {
                warn!(dir = %self.config.cache_dir.display(), error = %e,
                    "Cache directory unavailable, degrading to memory-only caching");
                None
            }
        };

        Ok(ImageLoader::new(self.config, fetcher, disk, self.event_tx))
    }
}

impl std::fmt::Debug for LoaderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_fallbacks() {
        let config = LoaderConfig::default();
        assert!(config.placeholder.is_none());
        assert!(config.error_image.is_none());
        assert_eq!(config.memory_budget_bytes, DEFAULT_MEMORY_BUDGET);
        assert!(config.max_concurrent_fetches.is_none());
    }

    #[test]
    fn builder_collects_options() {
        let builder = LoaderBuilder::new()
            .placeholder("spinner")
            .error_image("broken")
            .memory_budget_bytes(1024)
            .timeout_secs(5)
            .max_concurrent_fetches(2);

        assert_eq!(builder.config.placeholder, Some(ImageRef::new("spinner")));
        assert_eq!(builder.config.error_image, Some(ImageRef::new("broken")));
        assert_eq!(builder.config.memory_budget_bytes, 1024);
        assert_eq!(builder.config.timeout_secs, 5);
        assert_eq!(builder.config.max_concurrent_fetches, Some(2));
    }

    #[tokio::test]
    async fn build_degrades_when_cache_dir_unavailable() {
        let temp = tempfile::TempDir::new().unwrap();
        let blocker = temp.path().join("occupied");
        std::fs::write(&blocker, b"x").unwrap();

        let loader = LoaderBuilder::new()
            .cache_dir(blocker.join("cache"))
            .build()
            .await
            .unwrap();

        assert!(!loader.has_disk_tier());
    }
}
