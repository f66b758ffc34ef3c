// thumbkit/src/processors/compressor.rs
use crate::core::{OutputFormat, Result, ThumbError, DEFAULT_QUALITY};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat};
use oxipng::{optimize_from_memory, Options};
use std::io::Cursor;
use std::path::Path;

pub struct Compressor {
    quality: u8,
    optimize_png: bool,
}

impl Compressor {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            optimize_png: true,
        }
    }

    pub fn with_png_optimization(mut self, optimize: bool) -> Self {
        self.optimize_png = optimize;
        self
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode to an in-memory buffer. JPEG drops alpha; WebP is lossless.
    pub fn encode(&self, image: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>> {
        log::debug!(
            "Encoding {}x{} image as {} (quality {})",
            image.width(),
            image.height(),
            format,
            self.quality
        );

        match format {
            OutputFormat::Jpeg => self.encode_jpeg(image),
            OutputFormat::Png => self.encode_png(image),
            OutputFormat::WebP => self.encode_webp(image),
            OutputFormat::Jpeg2000 => Err(ThumbError::UnsupportedFormat(
                "JPEG 2000 encoding is not available".to_string(),
            )),
        }
    }

    /// Write to `path`, picking the encoder from the file extension.
    pub fn save(&self, image: &DynamicImage, path: &Path) -> Result<()> {
        let format = ImageFormat::from_path(path).map_err(|_| {
            ThumbError::UnsupportedFormat(format!(
                "Failed to detect format for: {}",
                path.display()
            ))
        })?;

        log::debug!(
            "Saving image to {} with format {:?}, quality: {}",
            path.display(),
            format,
            self.quality
        );

        let data = match format {
            ImageFormat::Jpeg => self.encode_jpeg(image)?,
            ImageFormat::Png => self.encode_png(image)?,
            ImageFormat::WebP => self.encode_webp(image)?,
            other => {
                image.save_with_format(path, other)?;
                return self.log_save_result(path);
            }
        };

        std::fs::write(path, data)?;
        self.log_save_result(path)
    }

    fn encode_jpeg(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, self.quality);
        image.to_rgb8().write_with_encoder(encoder)?;
        Ok(buffer)
    }

    fn encode_png(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png)?;

        if self.optimize_png {
            return optimize_from_memory(&buffer.into_inner(), &Options::default()).map_err(|e| {
                ThumbError::UnsupportedFormat(format!("PNG optimization failed: {}", e))
            });
        }

        Ok(buffer.into_inner())
    }

    fn encode_webp(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = WebPEncoder::new_lossless(&mut buffer);
        image.write_with_encoder(encoder)?;
        Ok(buffer)
    }

    fn log_save_result(&self, path: &Path) -> Result<()> {
        let file_size = std::fs::metadata(path)?.len();
        log::info!(
            "Saved image: {} ({})",
            path.display(),
            crate::utils::format_file_size(file_size)
        );
        Ok(())
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn sample() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(16, 9, |x, y| {
            Rgb([(x * 15) as u8, (y * 25) as u8, 90])
        }))
    }

    #[test]
    fn encodes_each_supported_format() {
        let compressor = Compressor::default();
        let jpeg = compressor.encode(&sample(), OutputFormat::Jpeg).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let png = compressor.encode(&sample(), OutputFormat::Png).unwrap();
        assert_eq!(&png[1..4], b"PNG");

        let webp = compressor.encode(&sample(), OutputFormat::WebP).unwrap();
        assert_eq!(&webp[..4], b"RIFF");
        assert_eq!(&webp[8..12], b"WEBP");
    }

    #[test]
    fn png_round_trip_keeps_pixels_and_alpha() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 3, Rgba([1, 2, 3, 4])));
        let png = Compressor::default().encode(&source, OutputFormat::Png).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.to_rgba8(), source.to_rgba8());
    }

    #[test]
    fn jpeg_accepts_alpha_sources() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 3, Rgba([1, 2, 3, 4])));
        assert!(Compressor::default().encode(&source, OutputFormat::Jpeg).is_ok());
    }

    #[test]
    fn jpeg_2000_is_unsupported() {
        let err = Compressor::default()
            .encode(&sample(), OutputFormat::Jpeg2000)
            .unwrap_err();
        assert!(matches!(err, ThumbError::UnsupportedFormat(_)));
    }

    #[test]
    fn lower_quality_gives_smaller_jpeg() {
        let noisy = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, y| {
            Rgb([((x * 37 + y * 11) % 256) as u8, ((x * y) % 256) as u8, ((x ^ y) * 9 % 256) as u8])
        }));
        let low = Compressor::new(10).encode(&noisy, OutputFormat::Jpeg).unwrap();
        let high = Compressor::new(100).encode(&noisy, OutputFormat::Jpeg).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn save_picks_encoder_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        Compressor::default().save(&sample(), &path).unwrap();
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 9));

        let unknown = dir.path().join("out.unknown");
        assert!(Compressor::default().save(&sample(), &unknown).is_err());
    }
}
