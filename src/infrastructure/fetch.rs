//! Network fetch and decode.
//!
//! [`HttpFetcher`] is the production [`FetcherPort`] implementation;
//! [`FetchAdapter`] wraps any fetcher and performs the collaborating
//! decode step, yielding both the decoded blob and the encoded bytes
//! (the latter go on to the disk tier unchanged).

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::domain::entities::ImageBlob;
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::FetcherPort;

/// HTTP fetcher backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the given request timeout.
    ///
    /// # Errors
    /// Returns [`LoadError::Network`] if the HTTP client cannot be built.
    pub fn new(timeout_secs: u64) -> LoadResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LoadError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl FetcherPort for HttpFetcher {
    async fn fetch(&self, url: &str) -> LoadResult<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::Network(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(LoadError::Network(format!(
                "HTTP {}: {}",
                response.status(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| LoadError::Network(format!("failed to read body: {e}")))?;

        if bytes.is_empty() {
            return Err(LoadError::Network("empty response body".into()));
        }

        Ok(bytes)
    }
}

/// A fetched image: the decoded blob plus the encoded bytes it came from.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    /// The decoded image.
    pub blob: ImageBlob,
    /// The encoded bytes as received from the network.
    pub encoded: Bytes,
}

/// Wraps a [`FetcherPort`] and decodes what it fetches.
#[derive(Clone)]
pub struct FetchAdapter {
    fetcher: Arc<dyn FetcherPort>,
}

impl FetchAdapter {
    /// Creates an adapter over the given fetcher.
    #[must_use]
    pub fn new(fetcher: Arc<dyn FetcherPort>) -> Self {
        Self { fetcher }
    }

    /// Fetches `url` and decodes the result.
    ///
    /// Decoding runs on the blocking pool; the caller's task only awaits.
    ///
    /// # Errors
    /// [`LoadError::Network`] from the fetcher, [`LoadError::Decode`] if
    /// the codec rejects the bytes or the decode task panics.
    pub async fn fetch_image(&self, url: &str) -> LoadResult<FetchedImage> {
        let bytes = self.fetcher.fetch(url).await?;
        debug!(url = %url, size = bytes.len(), "Fetched image bytes");

        let encoded = bytes.clone();
        let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| LoadError::Decode(format!("decode task panicked: {e}")))?
            .map_err(|e| LoadError::Decode(format!("failed to decode image: {e}")))?;

        Ok(FetchedImage {
            blob: ImageBlob::from_image(decoded),
            encoded,
        })
    }
}

impl std::fmt::Debug for FetchAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchAdapter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticFetcher(Vec<u8>);

    #[async_trait::async_trait]
    impl FetcherPort for StaticFetcher {
        async fn fetch(&self, _url: &str) -> LoadResult<Bytes> {
            Ok(Bytes::from(self.0.clone()))
        }
    }

    struct FailingFetcher;

    #[async_trait::async_trait]
    impl FetcherPort for FailingFetcher {
        async fn fetch(&self, _url: &str) -> LoadResult<Bytes> {
            Err(LoadError::Network("connection refused".into()))
        }
    }

    fn png_bytes(side: u32) -> Vec<u8> {
        let img = image::DynamicImage::new_rgba8(side, side);
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn decodes_valid_bytes() {
        let adapter = FetchAdapter::new(Arc::new(StaticFetcher(png_bytes(8))));

        let fetched = adapter.fetch_image("https://example.com/a.png").await.unwrap();

        assert_eq!(fetched.blob.width(), 8);
        assert_eq!(fetched.encoded, Bytes::from(png_bytes(8)));
    }

    #[tokio::test]
    async fn invalid_bytes_are_a_decode_error() {
        let adapter = FetchAdapter::new(Arc::new(StaticFetcher(b"garbage".to_vec())));

        let err = adapter.fetch_image("https://example.com/a.png").await;
        assert!(matches!(err, Err(LoadError::Decode(_))));
    }

    #[tokio::test]
    async fn network_errors_pass_through() {
        let adapter = FetchAdapter::new(Arc::new(FailingFetcher));

        let err = adapter.fetch_image("https://example.com/a.png").await;
        assert!(matches!(err, Err(LoadError::Network(_))));
    }
}
