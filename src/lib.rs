pub mod core;
pub mod operations;
pub mod processors;
pub mod utils;

pub use crate::core::params::{ResizeOptions, ResizeParams};
pub use crate::core::pipeline::{resize_once, Pipeline, PipelineReport};
pub use crate::core::{
    Gravity, OperationStatus, OutputFormat, ResizeMode, Result, ThumbError, WatermarkMode,
    DEFAULT_QUALITY, MAX_RESIZE_PIXELS,
};
pub use operations::{Operation, OperationReport, ResizeOperation};
pub use processors::{
    Compressor, Loader, MetadataBundle, MetadataProcessor, MetadataStore, RawDecoder,
};
pub use utils::{format_file_size, resolve_reference, to_reference};

pub mod prelude {
    pub use crate::{
        resize_once, Compressor, Loader, MetadataProcessor, OutputFormat, Pipeline,
        ResizeOptions,
    };
}

// Re-export commonly used types
pub use image::DynamicImage;
