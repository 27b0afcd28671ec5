//! Domain error types.

/// Result type for load and cache operations.
pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// Errors that can occur while loading or caching an image.
///
/// Carries string payloads so results stay `Clone` when forwarded over
/// event channels.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    /// Network failure: transport error, non-success status, or empty body.
    #[error("network error: {0}")]
    Network(String),
    /// The codec rejected the bytes.
    #[error("decode error: {0}")]
    Decode(String),
    /// I/O failure in the disk tier. Best-effort on the load path.
    #[error("disk cache error: {0}")]
    Disk(String),
    /// The cache directory could not be created at construction time.
    #[error("cache directory unavailable: {0}")]
    CacheDirUnavailable(String),
}
