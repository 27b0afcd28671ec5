//! Port definitions for external collaborators.

mod fetcher_port;
mod render_target_port;

pub use fetcher_port::FetcherPort;
pub use render_target_port::RenderTarget;
