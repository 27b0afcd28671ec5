//! Domain types for image identification and loaded image data.

use std::sync::Arc;

/// Unique identifier for a cached image, derived from its URL.
///
/// Doubles as the disk cache file name, so it must be stable across
/// process restarts and contain only filesystem-safe characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Creates a `CacheKey` from a URL by hashing it.
    ///
    /// Deterministic: the same URL always yields the same key. Uses the
    /// first 128 bits of SHA-256, wide enough that collisions across any
    /// realistic URL population are not a practical concern.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let result = hasher.finalize();
        Self(hex::encode(&result[..16]))
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A decoded image together with its estimated memory footprint.
///
/// Cheap to clone; the pixel data is shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ImageBlob {
    image: Arc<image::DynamicImage>,
    size_bytes: usize,
}

impl ImageBlob {
    /// Wraps a decoded image, estimating its footprint from the pixel buffer.
    #[must_use]
    pub fn new(image: Arc<image::DynamicImage>) -> Self {
        let size_bytes = image.as_bytes().len();
        Self { image, size_bytes }
    }

    /// Wraps an owned decoded image.
    #[must_use]
    pub fn from_image(image: image::DynamicImage) -> Self {
        Self::new(Arc::new(image))
    }

    /// The decoded image.
    #[must_use]
    pub fn image(&self) -> &Arc<image::DynamicImage> {
        &self.image
    }

    /// Estimated memory footprint in bytes, used for eviction accounting.
    #[must_use]
    pub const fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Opaque identifier for a caller-registered fallback asset.
///
/// The loader never interprets it; the render target resolves it to
/// whatever placeholder or error art the host application registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef(String);

impl ImageRef {
    /// Creates an `ImageRef` from any string-like input.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ImageRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ImageRef {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// What a render target should display instead of a loaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// A configured fallback asset, resolved by the render target.
    Image(ImageRef),
    /// No error image was configured; the target shows its own indicator.
    DefaultError,
}

/// A successfully resolved image and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// The cache key derived from the request URL.
    pub key: CacheKey,
    /// The decoded image.
    pub blob: ImageBlob,
    /// Which tier satisfied the load.
    pub source: ImageSource,
}

/// Where an image was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Served from the in-memory LRU tier.
    Memory,
    /// Served from the disk tier.
    Disk,
    /// Downloaded from the network.
    Network,
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Disk => write!(f, "disk"),
            Self::Network => write!(f, "network"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("https://example.com/a.png")]
    #[test_case("https://example.com/a.png?size=256")]
    #[test_case("file:///tmp/x.webp")]
    fn key_is_deterministic(url: &str) {
        assert_eq!(CacheKey::from_url(url), CacheKey::from_url(url));
    }

    #[test]
    fn key_is_hex_and_fixed_width() {
        let key = CacheKey::from_url("https://example.com/image.png");
        assert_eq!(key.as_str().len(), 32);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_urls_get_distinct_keys() {
        let a = CacheKey::from_url("https://example.com/a.png");
        let b = CacheKey::from_url("https://example.com/b.png");
        assert_ne!(a, b);
    }

    #[test]
    fn blob_footprint_tracks_pixel_buffer() {
        let blob = ImageBlob::from_image(image::DynamicImage::new_rgba8(10, 10));
        assert_eq!(blob.size_bytes(), 10 * 10 * 4);
        assert_eq!(blob.width(), 10);
    }
}
