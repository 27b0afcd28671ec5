//! Domain entity definitions.

mod image;

pub use image::{CacheKey, Fallback, ImageBlob, ImageRef, ImageSource, LoadedImage};
