//! Port definition for the network fetcher collaborator.

use bytes::Bytes;

use crate::domain::errors::LoadResult;

/// Port for fetching raw image bytes from a URL.
///
/// Implementations own all protocol details (headers, redirects, TLS) and
/// must classify failures into [`crate::LoadError::Network`]. An empty
/// response body counts as a failure.
#[async_trait::async_trait]
pub trait FetcherPort: Send + Sync {
    /// Fetches the resource at `url`, returning its raw bytes.
    async fn fetch(&self, url: &str) -> LoadResult<Bytes>;
}
