// thumbkit/src/processors/mod.rs
mod compressor;
pub mod geometry;
mod loader;
mod metadata;
pub mod resizer;
pub mod watermark;

pub use compressor::Compressor;
pub use geometry::{Geometry, Rect};
pub use loader::{to_8bit, Loader, RawDecoder};
pub use metadata::{MetadataBundle, MetadataProcessor, MetadataStore};
pub use watermark::Blend;
