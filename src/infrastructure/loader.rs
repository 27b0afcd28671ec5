//! Async image loading orchestrator.
//!
//! Implements the fallback chain: memory cache -> disk cache -> network.
//! Memory probes are synchronous, disk probes await inline on the caller's
//! task, and only a double miss spawns a fetch task. Per-target ordering
//! is enforced by a generation token so a stale completion never reaches
//! the render target.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::AbortHandle;
use tracing::{debug, info, trace, warn};

use crate::domain::entities::{CacheKey, Fallback, ImageBlob, ImageSource, LoadedImage};
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::{FetcherPort, RenderTarget};
use crate::infrastructure::config::{LoaderBuilder, LoaderConfig};
use crate::infrastructure::disk_cache::DiskImageCache;
use crate::infrastructure::fetch::FetchAdapter;
use crate::infrastructure::memory_cache::MemoryImageCache;

/// Message sent when a load reaches a terminal outcome.
#[derive(Debug, Clone)]
pub struct ImageLoadedEvent {
    /// The cache key derived from the URL.
    pub key: CacheKey,
    /// The requested URL.
    pub url: String,
    /// The terminal outcome.
    pub result: Result<LoadedImage, LoadError>,
}

struct Inflight {
    generation: u64,
    key: CacheKey,
    abort: AbortHandle,
}

struct TargetShared {
    target: Arc<dyn RenderTarget>,
    generation: AtomicU64,
    inflight: Mutex<Option<Inflight>>,
}

/// A render target paired with the request-generation state the loader
/// uses to order and cancel loads against it.
///
/// Create one handle per render target and reuse it for every `load`
/// aimed at that target; a newer load supersedes the older one, aborting
/// its fetch and neutralizing any completion that races past the abort.
/// Cloning is cheap and clones share the same generation state.
#[derive(Clone)]
pub struct TargetHandle {
    shared: Arc<TargetShared>,
}

impl TargetHandle {
    /// Wraps a render target.
    #[must_use]
    pub fn new(target: Arc<dyn RenderTarget>) -> Self {
        Self {
            shared: Arc::new(TargetShared {
                target,
                generation: AtomicU64::new(0),
                inflight: Mutex::new(None),
            }),
        }
    }

    /// Bumps the generation, invalidating every outstanding completion for
    /// this target. Returns the new generation and the in-flight fetch it
    /// displaced, if any.
    fn begin(&self) -> (u64, Option<Inflight>) {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let displaced = self.shared.inflight.lock().take();
        (generation, displaced)
    }

    /// Records the fetch task for `generation`. Fails when a newer load
    /// has already superseded it, in which case the task must be aborted
    /// by the caller.
    fn register(&self, generation: u64, key: CacheKey, abort: AbortHandle) -> bool {
        let mut slot = self.shared.inflight.lock();
        if self.shared.generation.load(Ordering::SeqCst) == generation {
            *slot = Some(Inflight {
                generation,
                key,
                abort,
            });
            true
        } else {
            false
        }
    }

    /// Clears the in-flight slot if it still belongs to `generation`.
    /// Returns true if this call took ownership of the cleanup.
    fn clear(&self, generation: u64) -> bool {
        let mut slot = self.shared.inflight.lock();
        if slot.as_ref().is_some_and(|i| i.generation == generation) {
            *slot = None;
            true
        } else {
            false
        }
    }

    fn apply_image(&self, generation: u64, blob: &ImageBlob) -> bool {
        if self.shared.generation.load(Ordering::SeqCst) == generation {
            self.shared.target.show_image(blob);
            true
        } else {
            trace!(generation, "Stale image completion ignored");
            false
        }
    }

    fn apply_fallback(&self, generation: u64, fallback: Fallback) -> bool {
        if self.shared.generation.load(Ordering::SeqCst) == generation {
            self.shared.target.show_fallback(fallback);
            true
        } else {
            trace!(generation, "Stale fallback completion ignored");
            false
        }
    }
}

impl std::fmt::Debug for TargetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetHandle")
            .field("generation", &self.shared.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

type PendingMap = Arc<Mutex<HashMap<CacheKey, u32>>>;

/// Orchestrates image loading from memory, disk, and network.
pub struct ImageLoader {
    config: LoaderConfig,
    memory: Arc<MemoryImageCache>,
    disk: Option<Arc<DiskImageCache>>,
    adapter: FetchAdapter,
    semaphore: Option<Arc<Semaphore>>,
    pending: PendingMap,
    event_tx: Option<mpsc::UnboundedSender<ImageLoadedEvent>>,
}

impl ImageLoader {
    pub(crate) fn new(
        config: LoaderConfig,
        fetcher: Arc<dyn FetcherPort>,
        disk: Option<Arc<DiskImageCache>>,
        event_tx: Option<mpsc::UnboundedSender<ImageLoadedEvent>>,
    ) -> Self {
        let memory = Arc::new(MemoryImageCache::new(config.memory_budget_bytes));
        let semaphore = config
            .max_concurrent_fetches
            .map(|max| Arc::new(Semaphore::new(max)));

        Self {
            config,
            memory,
            disk,
            adapter: FetchAdapter::new(fetcher),
            semaphore,
            pending: Arc::new(Mutex::new(HashMap::new())),
            event_tx,
        }
    }

    /// Starts a builder with default options.
    #[must_use]
    pub fn builder() -> LoaderBuilder {
        LoaderBuilder::new()
    }

    /// Loads the image at `url` onto the given render target.
    ///
    /// Shows the configured placeholder immediately, then resolves through
    /// memory, disk, and finally an asynchronously fetched download. The
    /// memory probe never suspends; the disk probe awaits inline; only a
    /// double miss spawns a task. Returns as soon as the outcome is either
    /// applied (cache hit) or in flight (fetch path).
    ///
    /// A later `load` on the same handle supersedes this one: its fetch is
    /// aborted and any completion that slips through is dropped before it
    /// touches the target.
    pub async fn load(&self, url: &str, handle: &TargetHandle) {
        let generation = self.supersede(handle);

        if let Some(placeholder) = &self.config.placeholder {
            handle.apply_fallback(generation, Fallback::Image(placeholder.clone()));
        }

        let key = CacheKey::from_url(url);

        if let Some(blob) = self.memory.get(&key) {
            handle.apply_image(generation, &blob);
            self.emit(&key, url, Ok(loaded(&key, blob, ImageSource::Memory)));
            return;
        }

        if let Some(disk) = &self.disk
            && let Some(blob) = disk.read(&key).await
        {
            handle.apply_image(generation, &blob);
            // read-through population of the memory tier
            self.memory.put(key.clone(), blob.clone());
            self.emit(&key, url, Ok(loaded(&key, blob, ImageSource::Disk)));
            return;
        }

        self.spawn_fetch(url.to_string(), key, handle.clone(), generation);
    }

    /// Loads the image at `url` and returns it, without a render target.
    ///
    /// Walks the same fallback chain as [`load`](Self::load) and populates
    /// both tiers on the way; failures come back as values instead of a
    /// visual fallback.
    ///
    /// # Errors
    /// [`LoadError::Network`] or [`LoadError::Decode`] from the fetch path.
    pub async fn fetch_image(&self, url: &str) -> LoadResult<LoadedImage> {
        let key = CacheKey::from_url(url);

        if let Some(blob) = self.memory.get(&key) {
            return Ok(loaded(&key, blob, ImageSource::Memory));
        }

        if let Some(disk) = &self.disk
            && let Some(blob) = disk.read(&key).await
        {
            self.memory.put(key.clone(), blob.clone());
            return Ok(loaded(&key, blob, ImageSource::Disk));
        }

        let _permit = match &self.semaphore {
            Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
            None => None,
        };

        debug!(key = %key, url = %url, "Downloading image from network");
        let fetched = self.adapter.fetch_image(url).await?;

        self.memory.put(key.clone(), fetched.blob.clone());
        if let Some(disk) = &self.disk {
            spawn_disk_write(disk.clone(), key.clone(), fetched.encoded.to_vec());
        }

        Ok(loaded(&key, fetched.blob, ImageSource::Network))
    }

    /// Cancels the in-flight load for a target, if any, and invalidates
    /// outstanding completions for it. Other targets' loads are unaffected.
    pub fn cancel(&self, handle: &TargetHandle) {
        let (_, displaced) = handle.begin();
        if let Some(inflight) = displaced {
            inflight.abort.abort();
            self.pending_dec(&inflight.key);
            debug!(key = %inflight.key, "Cancelled in-flight load");
        }
    }

    /// Returns true if a fetch for this key is currently in flight.
    pub fn is_loading(&self, key: &CacheKey) -> bool {
        self.pending.lock().contains_key(key)
    }

    /// Number of distinct keys with a fetch in flight.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns true if the disk tier is available.
    #[must_use]
    pub fn has_disk_tier(&self) -> bool {
        self.disk.is_some()
    }

    /// The memory tier, for direct probes.
    #[must_use]
    pub fn memory_cache(&self) -> &Arc<MemoryImageCache> {
        &self.memory
    }

    /// The disk tier, absent when the loader degraded to memory-only.
    #[must_use]
    pub fn disk_cache(&self) -> Option<&Arc<DiskImageCache>> {
        self.disk.as_ref()
    }

    /// The immutable configuration this loader was built with.
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Clears both cache tiers.
    pub async fn clear_all(&self) {
        self.memory.clear();
        if let Some(disk) = &self.disk
            && let Err(e) = disk.clear().await
        {
            warn!(error = %e, "Failed to clear disk cache");
        }
        info!("Cleared all image caches");
    }

    /// Bumps the target's generation and aborts whatever fetch it was
    /// still waiting on.
    fn supersede(&self, handle: &TargetHandle) -> u64 {
        let (generation, displaced) = handle.begin();
        if let Some(inflight) = displaced {
            inflight.abort.abort();
            self.pending_dec(&inflight.key);
            debug!(key = %inflight.key, "Superseded in-flight load");
        }
        generation
    }

    fn spawn_fetch(&self, url: String, key: CacheKey, handle: TargetHandle, generation: u64) {
        self.pending.lock().entry(key.clone()).and_modify(|n| *n += 1).or_insert(1);

        let job = FetchJob {
            memory: self.memory.clone(),
            disk: self.disk.clone(),
            adapter: self.adapter.clone(),
            semaphore: self.semaphore.clone(),
            pending: self.pending.clone(),
            event_tx: self.event_tx.clone(),
            error_image: self.config.error_image.clone(),
        };

        let task = tokio::spawn(job.run(url, key.clone(), handle.clone(), generation));

        if !handle.register(generation, key.clone(), task.abort_handle()) {
            // a newer load slipped in between the probes and the spawn
            task.abort();
            self.pending_dec(&key);
        }
    }

    fn pending_dec(&self, key: &CacheKey) {
        pending_dec(&self.pending, key);
    }

    fn emit(&self, key: &CacheKey, url: &str, result: Result<LoadedImage, LoadError>) {
        emit(self.event_tx.as_ref(), key, url, result);
    }
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// State cloned into each spawned fetch task.
struct FetchJob {
    memory: Arc<MemoryImageCache>,
    disk: Option<Arc<DiskImageCache>>,
    adapter: FetchAdapter,
    semaphore: Option<Arc<Semaphore>>,
    pending: PendingMap,
    event_tx: Option<mpsc::UnboundedSender<ImageLoadedEvent>>,
    error_image: Option<crate::domain::entities::ImageRef>,
}

impl FetchJob {
    async fn run(self, url: String, key: CacheKey, handle: TargetHandle, generation: u64) {
        let result = self.fetch_and_apply(&url, &key, &handle, generation).await;

        // Whoever takes the in-flight slot owns the pending bookkeeping;
        // on abort that is the superseding/cancelling call instead of us.
        if handle.clear(generation) {
            pending_dec(&self.pending, &key);
        }

        emit(self.event_tx.as_ref(), &key, &url, result);
    }

    async fn fetch_and_apply(
        &self,
        url: &str,
        key: &CacheKey,
        handle: &TargetHandle,
        generation: u64,
    ) -> Result<LoadedImage, LoadError> {
        let _permit = match &self.semaphore {
            Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
            None => None,
        };

        debug!(key = %key, url = %url, "Downloading image from network");

        match self.adapter.fetch_image(url).await {
            Ok(fetched) => {
                // user-visible update first; cache population must not
                // delay first paint
                handle.apply_image(generation, &fetched.blob);

                self.memory.put(key.clone(), fetched.blob.clone());
                if let Some(disk) = &self.disk {
                    spawn_disk_write(disk.clone(), key.clone(), fetched.encoded.to_vec());
                }

                debug!(key = %key, source = "network", "Image loaded");
                Ok(loaded(key, fetched.blob, ImageSource::Network))
            }
            Err(e) => {
                let fallback = self
                    .error_image
                    .clone()
                    .map_or(Fallback::DefaultError, Fallback::Image);
                handle.apply_fallback(generation, fallback);
                warn!(key = %key, url = %url, error = %e, "Image load failed");
                Err(e)
            }
        }
    }
}

fn loaded(key: &CacheKey, blob: ImageBlob, source: ImageSource) -> LoadedImage {
    LoadedImage {
        key: key.clone(),
        blob,
        source,
    }
}

/// Best-effort disk persistence; failure is logged, never surfaced.
fn spawn_disk_write(disk: Arc<DiskImageCache>, key: CacheKey, bytes: Vec<u8>) {
    tokio::spawn(async move {
        if let Err(e) = disk.write(&key, &bytes).await {
            warn!(key = %key, error = %e, "Failed to cache to disk");
        }
    });
}

fn pending_dec(pending: &PendingMap, key: &CacheKey) {
    let mut map = pending.lock();
    if let Some(count) = map.get_mut(key) {
        *count -= 1;
        if *count == 0 {
            map.remove(key);
        }
    }
}

fn emit(
    tx: Option<&mpsc::UnboundedSender<ImageLoadedEvent>>,
    key: &CacheKey,
    url: &str,
    result: Result<LoadedImage, LoadError>,
) {
    if let Some(tx) = tx {
        let _ = tx.send(ImageLoadedEvent {
            key: key.clone(),
            url: url.to_string(),
            result,
        });
    }
}
