// thumbkit/src/processors/loader.rs
use crate::core::{Result, ThumbError};
use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;

/// Camera raw decoding hook.
///
/// Implementations return `None` when the bytes are not a raw format they
/// recognise, in which case the loader falls back to standard decoding.
/// Output is expected white-balanced, demosaiced and gamma corrected RGB.
pub trait RawDecoder: Send + Sync {
    fn decode_raw(&self, data: &[u8]) -> Option<Result<DynamicImage>>;
}

#[derive(Clone)]
pub struct Loader {
    max_dimensions: Option<(u32, u32)>,
    raw_decoder: Option<Arc<dyn RawDecoder>>,
}

impl Loader {
    pub fn new() -> Self {
        Self {
            max_dimensions: Some((100_000, 100_000)),
            raw_decoder: None,
        }
    }

    pub fn with_max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.max_dimensions = Some((width, height));
        self
    }

    pub fn with_raw_decoder(mut self, decoder: Arc<dyn RawDecoder>) -> Self {
        self.raw_decoder = Some(decoder);
        self
    }

    /// Reads the whole file. An empty file is an extraction failure.
    pub fn read(&self, path: &Path) -> Result<Vec<u8>> {
        log::debug!("Reading image from: {}", path.display());

        if !path.exists() {
            return Err(ThumbError::InvalidParameter(format!(
                "File does not exist: {}",
                path.display()
            )));
        }

        let data = std::fs::read(path)?;
        if data.is_empty() {
            return Err(ThumbError::Decode("Failed to extract image".to_string()));
        }

        Ok(data)
    }

    pub fn load(&self, path: &Path) -> Result<DynamicImage> {
        let data = self.read(path)?;
        self.decode(&data)
    }

    /// Raw decode first, then standard decode. Alpha is kept and embedded
    /// orientation is not applied. The result is always 8 bits per channel.
    pub fn decode(&self, data: &[u8]) -> Result<DynamicImage> {
        if data.is_empty() {
            return Err(ThumbError::Decode("Failed to extract image".to_string()));
        }

        let raw = self
            .raw_decoder
            .as_ref()
            .and_then(|decoder| decoder.decode_raw(data));

        let image = match raw {
            Some(decoded) => {
                log::debug!("Decoded camera raw data");
                decoded?
            }
            None => image::load_from_memory(data).map_err(|e| {
                ThumbError::Decode(format!("Failed to decode image from bytes: {}", e))
            })?,
        };

        let image = to_8bit(image);
        let (width, height) = (image.width(), image.height());

        if width == 0 || height == 0 {
            return Err(ThumbError::Decode("Input image data is empty".to_string()));
        }

        if let Some((max_w, max_h)) = self.max_dimensions {
            if width > max_w || height > max_h {
                return Err(ThumbError::Decode(format!(
                    "Image dimensions {}x{} exceed maximum {}x{}",
                    width, height, max_w, max_h
                )));
            }
        }

        log::info!(
            "Loaded image: {}x{} pixels, format: {:?}",
            width,
            height,
            image.color()
        );

        Ok(image)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalise to 8 bits per channel with three or four channels.
pub fn to_8bit(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image,
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}
