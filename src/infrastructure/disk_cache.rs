//! Disk-based image cache for persistence across sessions.
//!
//! One file per cache key, holding the encoded image bytes exactly as
//! fetched. Entries are write-once: content is assumed immutable by URL,
//! so a later fetch of the same key never rewrites the file. There is no
//! expiry or eviction in this tier.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

use crate::domain::entities::{CacheKey, ImageBlob};
use crate::domain::errors::{LoadError, LoadResult};

/// Disk cache keyed by [`CacheKey`], storing raw encoded image bytes.
#[derive(Debug)]
pub struct DiskImageCache {
    cache_dir: PathBuf,
}

impl DiskImageCache {
    /// Creates a disk cache rooted at `cache_dir`, creating the directory
    /// if absent.
    ///
    /// # Errors
    /// Returns [`LoadError::CacheDirUnavailable`] if the directory cannot
    /// be created.
    pub async fn new(cache_dir: PathBuf) -> LoadResult<Self> {
        fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| LoadError::CacheDirUnavailable(format!("{}: {e}", cache_dir.display())))?;
        Ok(Self { cache_dir })
    }

    /// The directory this cache writes into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path for a cached image.
    fn cache_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(format!("{}.img", key.as_str()))
    }

    /// Checks whether an entry exists for `key`.
    pub async fn exists(&self, key: &CacheKey) -> bool {
        fs::try_exists(&self.cache_path(key)).await.unwrap_or(false)
    }

    /// Reads the raw encoded bytes for `key`. Any I/O error is a miss.
    pub async fn read_bytes(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let path = self.cache_path(key);
        match fs::read(&path).await {
            Ok(bytes) => {
                trace!(key = %key, path = %path.display(), "Disk cache hit");
                Some(bytes)
            }
            Err(_) => {
                trace!(key = %key, "Disk cache miss");
                None
            }
        }
    }

    /// Reads and decodes the entry for `key`.
    ///
    /// Bytes that fail to decode are treated as a miss, never served as a
    /// hit with garbage content.
    pub async fn read(&self, key: &CacheKey) -> Option<ImageBlob> {
        let bytes = self.read_bytes(key).await?;

        let result = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await;

        match result {
            Ok(Ok(img)) => {
                debug!(key = %key, "Decoded image from disk cache");
                Some(ImageBlob::from_image(img))
            }
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Failed to decode cached image, treating as miss");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Decode task panicked, treating as miss");
                None
            }
        }
    }

    /// Stores encoded bytes for `key`.
    ///
    /// Write-once: a no-op if an entry already exists (first writer wins).
    /// Bytes land in a temporary sibling first and are renamed into place,
    /// so a torn write can never be observed as the final file.
    ///
    /// # Errors
    /// Returns [`LoadError::Disk`] if the file cannot be written.
    pub async fn write(&self, key: &CacheKey, bytes: &[u8]) -> LoadResult<()> {
        let path = self.cache_path(key);

        if fs::try_exists(&path).await.unwrap_or(false) {
            trace!(key = %key, "Disk entry already present, keeping original");
            return Ok(());
        }

        let tmp = self.cache_dir.join(format!("{}.img.tmp", key.as_str()));

        let mut file = fs::File::create(&tmp)
            .await
            .map_err(|e| LoadError::Disk(format!("failed to create cache file: {e}")))?;
        file.write_all(bytes)
            .await
            .map_err(|e| LoadError::Disk(format!("failed to write cache file: {e}")))?;
        file.flush()
            .await
            .map_err(|e| LoadError::Disk(format!("failed to flush cache file: {e}")))?;
        drop(file);

        // Another writer may have landed while we were writing the temp file.
        if fs::try_exists(&path).await.unwrap_or(false) {
            let _ = fs::remove_file(&tmp).await;
            trace!(key = %key, "Lost write race, keeping first writer's entry");
            return Ok(());
        }

        fs::rename(&tmp, &path)
            .await
            .map_err(|e| LoadError::Disk(format!("failed to publish cache file: {e}")))?;

        debug!(key = %key, path = %path.display(), size = bytes.len(), "Stored image in disk cache");
        Ok(())
    }

    /// Removes every entry. Manual maintenance only; nothing in the load
    /// path ever invalidates this tier.
    ///
    /// # Errors
    /// Returns [`LoadError::Disk`] if the cache directory cannot be read.
    pub async fn clear(&self) -> LoadResult<()> {
        let mut entries = fs::read_dir(&self.cache_dir)
            .await
            .map_err(|e| LoadError::Disk(format!("failed to read cache dir: {e}")))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LoadError::Disk(format!("failed to read entry: {e}")))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "img")
                && fs::remove_file(&path).await.is_err()
            {
                warn!(path = %path.display(), "Failed to remove cache file");
            }
        }
        debug!("Cleared disk cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_cache() -> (DiskImageCache, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskImageCache::new(temp_dir.path().to_path_buf())
            .await
            .unwrap();
        (cache, temp_dir)
    }

    fn key(name: &str) -> CacheKey {
        CacheKey::from_url(name)
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::DynamicImage::new_rgba8(4, 4);
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn write_and_read_bytes() {
        let (cache, _temp) = create_test_cache().await;
        let k = key("a");
        let data = b"test image data";

        cache.write(&k, data).await.unwrap();

        assert!(cache.exists(&k).await);
        assert_eq!(cache.read_bytes(&k).await.unwrap(), data);
    }

    #[tokio::test]
    async fn missing_key_is_a_miss() {
        let (cache, _temp) = create_test_cache().await;
        assert!(!cache.exists(&key("nope")).await);
        assert!(cache.read_bytes(&key("nope")).await.is_none());
    }

    #[tokio::test]
    async fn write_once_keeps_first_bytes() {
        let (cache, _temp) = create_test_cache().await;
        let k = key("a");

        cache.write(&k, b"first").await.unwrap();
        cache.write(&k, b"second").await.unwrap();

        assert_eq!(cache.read_bytes(&k).await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn read_decodes_valid_entry() {
        let (cache, _temp) = create_test_cache().await;
        let k = key("a");

        cache.write(&k, &png_bytes()).await.unwrap();
        let blob = cache.read(&k).await;

        assert!(blob.is_some());
        assert_eq!(blob.unwrap().width(), 4);
    }

    #[tokio::test]
    async fn corrupt_entry_reads_as_miss() {
        let (cache, _temp) = create_test_cache().await;
        let k = key("a");

        cache.write(&k, b"not an image at all").await.unwrap();

        assert!(cache.read(&k).await.is_none());
    }

    #[tokio::test]
    async fn no_temp_files_remain_after_write() {
        let (cache, temp) = create_test_cache().await;
        cache.write(&key("a"), b"data").await.unwrap();

        let mut names = Vec::new();
        let mut entries = fs::read_dir(temp.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }

        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".img"));
    }

    #[tokio::test]
    async fn clear_removes_entries() {
        let (cache, _temp) = create_test_cache().await;

        cache.write(&key("a"), b"one").await.unwrap();
        cache.write(&key("b"), b"two").await.unwrap();

        cache.clear().await.unwrap();

        assert!(!cache.exists(&key("a")).await);
        assert!(!cache.exists(&key("b")).await);
    }

    #[tokio::test]
    async fn unwritable_dir_fails_construction() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("occupied");
        std::fs::write(&file_path, b"x").unwrap();

        // A path whose parent is a regular file cannot become a directory.
        let result = DiskImageCache::new(file_path.join("cache")).await;
        assert!(matches!(result, Err(LoadError::CacheDirUnavailable(_))));
    }
}
