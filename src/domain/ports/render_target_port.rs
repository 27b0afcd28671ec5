//! Port definition for the caller-owned render target.

use crate::domain::entities::{Fallback, ImageBlob};

/// Port for the UI element that ultimately displays a loaded image.
///
/// The loader calls these methods from its own tasks; implementations that
/// are bound to a UI thread should marshal internally (for example by
/// posting onto their event loop). Per-target ordering is enforced by the
/// loader's generation token, so a stale completion never reaches either
/// method.
pub trait RenderTarget: Send + Sync {
    /// Displays a decoded image.
    fn show_image(&self, blob: &ImageBlob);

    /// Displays a placeholder or error fallback.
    fn show_fallback(&self, fallback: Fallback);
}
