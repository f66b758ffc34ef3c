// thumbkit/src/operations/resize.rs
use super::{OperationReport, RunContext};
use crate::core::params::ResizeParams;
use crate::core::{OperationStatus, OutputFormat, Result, ThumbError, MAX_RESIZE_PIXELS};
use crate::processors::geometry::{self, Geometry};
use crate::processors::resizer::{gaussian_blur, resample_area, unsharp_mask};
use crate::processors::watermark::{self, Blend};
use crate::processors::{to_8bit, Compressor, Loader};
use crate::utils::to_reference;
use image::DynamicImage;
use std::borrow::Cow;
use std::path::Path;

/// Crop, resample, sharpen and watermark a source image.
///
/// An operation runs at most once. After a successful run the final image
/// stays in memory so it can be encoded on demand.
#[derive(Debug)]
pub struct ResizeOperation {
    params: ResizeParams,
    status: OperationStatus,
    error_message: Option<String>,
    output: Option<DynamicImage>,
    optimize_png: bool,
}

impl ResizeOperation {
    pub fn new(params: ResizeParams) -> Self {
        Self {
            params,
            status: OperationStatus::NotAttempted,
            error_message: None,
            output: None,
            optimize_png: true,
        }
    }

    pub fn params(&self) -> &ResizeParams {
        &self.params
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn output_image(&self) -> Option<&DynamicImage> {
        self.output.as_ref()
    }

    pub fn output_dimensions(&self) -> Option<(u32, u32)> {
        self.output.as_ref().map(|image| (image.width(), image.height()))
    }

    pub fn set_png_optimization(&mut self, optimize: bool) {
        self.optimize_png = optimize;
    }

    pub fn run(&mut self, source: &DynamicImage, ctx: &RunContext<'_>) -> bool {
        if self.status != OperationStatus::NotAttempted {
            log::warn!("Resize operation already ran ({:?})", self.status);
            return self.status == OperationStatus::Success;
        }

        self.status = OperationStatus::Pending;

        match self.execute(source, ctx) {
            Ok(image) => {
                log::info!(
                    "Resized {}x{} -> {}x{} ({})",
                    source.width(),
                    source.height(),
                    image.width(),
                    image.height(),
                    self.params.mode().as_str()
                );
                self.output = Some(image);
                self.status = OperationStatus::Success;
                true
            }
            Err(e) => {
                log::error!("Resize operation failed: {}", e);
                self.error_message = Some(e.to_string());
                self.status = OperationStatus::Error;
                false
            }
        }
    }

    /// Encode the final image. Only valid after a successful run.
    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>> {
        match (&self.status, &self.output) {
            (OperationStatus::Success, Some(image)) => self.compressor().encode(image, format),
            _ => Err(ThumbError::Operation(format!(
                "Resize operation has no result to encode ({:?})",
                self.status
            ))),
        }
    }

    pub fn report(&self) -> OperationReport {
        let output_url = self.params.output().map(to_reference);
        let success = self.status == OperationStatus::Success;
        let dimensions = self.output_dimensions().filter(|_| success);

        OperationReport {
            kind: "resize",
            output_url,
            result: success,
            output_height: dimensions.map(|(_, h)| h),
            output_width: dimensions.map(|(w, _)| w),
            error_message: if success {
                None
            } else {
                self.error_message.clone()
            },
        }
    }

    fn compressor(&self) -> Compressor {
        Compressor::new(self.params.quality()).with_png_optimization(self.optimize_png)
    }

    fn execute(&self, source: &DynamicImage, ctx: &RunContext<'_>) -> Result<DynamicImage> {
        let params = &self.params;
        let (src_w, src_h) = (source.width(), source.height());
        let (width, height) = (params.width(), params.height());

        if src_w == 0 || src_h == 0 {
            return Err(operation_error("Input image data is empty"));
        }
        if height == 0 {
            return Err(operation_error("Height cannot be 0"));
        }
        if width == 0 {
            return Err(operation_error("Width cannot be 0"));
        }
        if u64::from(height) * u64::from(width) > MAX_RESIZE_PIXELS {
            return Err(operation_error("Desired resize dimensions exceed maximum"));
        }

        let mut image = if (width, height) == (src_w, src_h) {
            log::debug!("Requested size matches source, skipping resample");
            to_8bit(source.clone())
        } else {
            let geometry = geometry::compute(
                params.mode(),
                (src_w, src_h),
                (width, height),
                params.gravity(),
            )
            .ok_or_else(|| operation_error("Invalid resize type"))?;
            if u64::from(geometry.width) * u64::from(geometry.height) > MAX_RESIZE_PIXELS {
                return Err(operation_error("Desired resize dimensions exceed maximum"));
            }
            self.render(source, &geometry)?
        };

        if let Some(path) = params.watermark() {
            self.apply_watermark(&mut image, path, ctx.loader);
        }

        if let Some(output) = params.output() {
            self.compressor().save(&image, output).map_err(|e| {
                log::error!("Could not write {}: {}", output.display(), e);
                operation_error("Failed to write output image")
            })?;

            if params.preserve_metadata() {
                if let Some(bundle) = ctx.metadata.filter(|bundle| !bundle.is_empty()) {
                    ctx.metadata_store.write_metadata(output, bundle)?;
                }
            }
        }

        Ok(image)
    }

    fn render(&self, source: &DynamicImage, geometry: &Geometry) -> Result<DynamicImage> {
        let crop = geometry.crop;
        log::debug!(
            "Crop {}x{}+{}+{}, resample to {}x{}",
            crop.width,
            crop.height,
            crop.x,
            crop.y,
            geometry.width,
            geometry.height
        );

        let cropped = if crop.is_full(source.width(), source.height()) {
            Cow::Borrowed(source)
        } else {
            Cow::Owned(source.crop_imm(crop.x, crop.y, crop.width, crop.height))
        };

        let cropped = if self.params.pre_blur() {
            let sigma = cropped.width() as f32 / 1000.0;
            Cow::Owned(gaussian_blur(&cropped, sigma))
        } else {
            cropped
        };

        let resized = resample_area(&cropped, geometry.width, geometry.height)?;

        Ok(match self.params.sharpen_amount() {
            0 => resized,
            amount => unsharp_mask(&resized, amount, self.params.sharpen_radius()),
        })
    }

    fn apply_watermark(&self, image: &mut DynamicImage, path: &Path, loader: &Loader) {
        let mark = match loader.load(path) {
            Ok(mark) => mark.to_rgba8(),
            Err(e) => {
                log::warn!("Skipping watermark {}: {}", path.display(), e);
                return;
            }
        };

        let params = &self.params;
        let blend = Blend::new(
            params.watermark_mode(),
            params.watermark_amount(),
            params.watermark_min(),
            params.watermark_max(),
        );
        watermark::apply(image, &mark, blend);
    }
}

fn operation_error(message: &str) -> ThumbError {
    ThumbError::Operation(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::{MetadataBundle, MetadataStore};
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        writes: Mutex<Vec<PathBuf>>,
        fail: bool,
    }

    impl MetadataStore for RecordingStore {
        fn read_metadata(&self, _path: &Path) -> Result<MetadataBundle> {
            Ok(MetadataBundle::default())
        }

        fn write_metadata(&self, path: &Path, _bundle: &MetadataBundle) -> Result<()> {
            if self.fail {
                return Err(ThumbError::Metadata("store offline".to_string()));
            }
            self.writes.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    fn source(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    fn params(mode: &str, width: u32, height: u32) -> ResizeParams {
        let mut params = ResizeParams::new();
        params.set_mode(mode);
        params.set_width(width);
        params.set_height(height);
        params
    }

    fn run_with(op: &mut ResizeOperation, image: &DynamicImage, store: &RecordingStore) -> bool {
        let loader = Loader::new();
        let bundle = MetadataBundle {
            exif: Some(vec![1, 2, 3]),
            ..Default::default()
        };
        let ctx = RunContext {
            loader: &loader,
            metadata_store: store,
            metadata: Some(&bundle),
        };
        op.run(image, &ctx)
    }

    fn run(op: &mut ResizeOperation, image: &DynamicImage) -> bool {
        run_with(op, image, &RecordingStore::default())
    }

    #[test]
    fn fill_produces_requested_size() {
        let mut op = ResizeOperation::new(params("fill", 200, 200));
        assert!(run(&mut op, &source(1000, 800)));
        assert_eq!(op.status(), OperationStatus::Success);
        assert_eq!(op.output_dimensions(), Some((200, 200)));
    }

    #[test]
    fn fixed_width_keeps_aspect() {
        let mut op = ResizeOperation::new(params("width", 100, 1000));
        assert!(run(&mut op, &source(400, 300)));
        assert_eq!(op.output_dimensions(), Some((100, 75)));
    }

    #[test]
    fn validation_order() {
        let image = source(10, 10);

        let mut op = ResizeOperation::new(params("fill", 0, 0));
        assert!(!run(&mut op, &image));
        assert_eq!(op.error_message(), Some("Height cannot be 0"));

        let mut op = ResizeOperation::new(params("fill", 0, 5));
        assert!(!run(&mut op, &image));
        assert_eq!(op.error_message(), Some("Width cannot be 0"));

        let mut op = ResizeOperation::new(params("fill", 5_000, 5_000));
        assert!(!run(&mut op, &image));
        assert_eq!(
            op.error_message(),
            Some("Desired resize dimensions exceed maximum")
        );

        let mut op = ResizeOperation::new(params("stretch", 5, 5));
        assert!(!run(&mut op, &image));
        assert_eq!(op.error_message(), Some("Invalid resize type"));
        assert_eq!(op.status(), OperationStatus::Error);
    }

    #[test]
    fn square_target_area_is_bounded() {
        // Only the width drives a square target.
        let mut op = ResizeOperation::new(params("square", 10_000_000, 1));
        assert!(!run(&mut op, &source(10, 10)));
        assert_eq!(
            op.error_message(),
            Some("Desired resize dimensions exceed maximum")
        );
        assert!(op.output_image().is_none());
    }

    fn checkerboard(width: u32, height: u32, cell: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }))
    }

    #[test]
    fn pre_blur_changes_output_not_source() {
        // sigma = crop width / 1000 = 2.0
        let board = checkerboard(2000, 20, 100);
        let before = board.clone();

        let mut plain = ResizeOperation::new(params("width", 1000, 1000));
        assert!(run(&mut plain, &board));

        let mut p = params("width", 1000, 1000);
        p.set_pre_blur(true);
        let mut blurred = ResizeOperation::new(p);
        assert!(run(&mut blurred, &board));

        let plain = plain.output_image().unwrap().to_rgb8();
        let blurred = blurred.output_image().unwrap().to_rgb8();
        assert_eq!(plain.dimensions(), (1000, 10));
        assert_eq!(blurred.dimensions(), (1000, 10));
        assert_ne!(plain, blurred);
        // Next to a cell edge the blur bleeds white into black.
        assert_eq!(plain.get_pixel(48, 2).0[0], 0);
        assert!(blurred.get_pixel(48, 2).0[0] > 0);
        assert_eq!(board, before);
    }

    #[test]
    fn sharpen_raises_edge_contrast() {
        let halves = DynamicImage::ImageRgb8(RgbImage::from_fn(80, 80, |x, _| {
            if x < 40 {
                Rgb([100, 100, 100])
            } else {
                Rgb([150, 150, 150])
            }
        }));

        let mut soft = ResizeOperation::new(params("fill", 20, 20));
        assert!(run(&mut soft, &halves));

        let mut p = params("fill", 20, 20);
        assert!(p.set_sharpen_amount(100));
        assert!(p.set_sharpen_radius(1.0));
        let mut sharp = ResizeOperation::new(p);
        assert!(run(&mut sharp, &halves));

        let soft = soft.output_image().unwrap().to_rgb8();
        let sharp = sharp.output_image().unwrap().to_rgb8();
        let contrast = |img: &RgbImage| {
            i32::from(img.get_pixel(10, 10).0[0]) - i32::from(img.get_pixel(9, 10).0[0])
        };
        assert!(contrast(&sharp) > contrast(&soft));
    }

    #[test]
    fn empty_source_is_rejected() {
        let mut op = ResizeOperation::new(params("fill", 5, 5));
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(!run(&mut op, &empty));
        assert_eq!(op.error_message(), Some("Input image data is empty"));
    }

    #[test]
    fn same_size_is_pass_through() {
        let image = source(40, 30);
        let mut p = params("stretch", 40, 30);
        assert!(p.set_sharpen_amount(300));
        p.set_pre_blur(true);

        let mut op = ResizeOperation::new(p);
        assert!(run(&mut op, &image));
        assert_eq!(op.output_image().unwrap().to_rgb8(), image.to_rgb8());
    }

    #[test]
    fn runs_only_once() {
        let mut op = ResizeOperation::new(params("square", 8, 8));
        assert!(run(&mut op, &source(20, 10)));
        assert!(run(&mut op, &source(1, 1)));
        assert_eq!(op.output_dimensions(), Some((8, 8)));
    }

    #[test]
    fn encode_requires_success() {
        let op = ResizeOperation::new(params("square", 8, 8));
        assert!(op.encode(OutputFormat::Jpeg).is_err());

        let mut op = ResizeOperation::new(params("square", 8, 8));
        assert!(run(&mut op, &source(20, 10)));
        let png = op.encode(OutputFormat::Png).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }

    #[test]
    fn missing_watermark_is_skipped() {
        let image = source(10, 10);
        let mut p = params("fill", 10, 10);
        p.set_watermark_url("file:///nonexistent/mark.png");

        let mut op = ResizeOperation::new(p);
        assert!(run(&mut op, &image));
        assert_eq!(op.output_image().unwrap().to_rgb8(), image.to_rgb8());
    }

    #[test]
    fn watermark_is_composited() {
        let dir = tempfile::tempdir().unwrap();
        let mark_path = dir.path().join("mark.png");
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255])))
            .save(&mark_path)
            .unwrap();

        let black = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let mut p = params("fill", 4, 4);
        p.set_watermark_url(mark_path.to_str().unwrap());
        assert!(p.set_watermark_amount(0.5));

        let mut op = ResizeOperation::new(p);
        assert!(run(&mut op, &black));
        let out = op.output_image().unwrap().to_rgb8();
        assert!(out.pixels().all(|px| px.0 == [127, 127, 127]));
    }

    #[test]
    fn writes_output_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("thumb.jpg");
        let mut p = params("fill", 16, 16);
        p.set_output_url(&format!("file://{}", out.display()));
        p.set_preserve_metadata(true);

        let store = RecordingStore::default();
        let mut op = ResizeOperation::new(p);
        assert!(run_with(&mut op, &source(64, 48), &store));
        assert!(out.exists());
        assert_eq!(*store.writes.lock().unwrap(), vec![out.clone()]);

        let report = op.report();
        assert!(report.result);
        assert_eq!(report.output_url, Some(format!("file://{}", out.display())));
        assert_eq!((report.output_width, report.output_height), (Some(16), Some(16)));
    }

    #[test]
    fn metadata_failure_fails_operation() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("thumb.jpg");
        let mut p = params("fill", 16, 16);
        p.set_output_url(out.to_str().unwrap());
        p.set_preserve_metadata(true);

        let store = RecordingStore {
            fail: true,
            ..Default::default()
        };
        let mut op = ResizeOperation::new(p);
        assert!(!run_with(&mut op, &source(64, 48), &store));
        assert!(op.error_message().unwrap().contains("store offline"));
    }

    #[test]
    fn unwritable_output_fails() {
        let mut p = params("fill", 16, 16);
        p.set_output_url("/nonexistent/dir/thumb.jpg");
        let mut op = ResizeOperation::new(p);
        assert!(!run(&mut op, &source(64, 48)));
        assert_eq!(op.error_message(), Some("Failed to write output image"));

        let report = op.report();
        assert!(!report.result);
        assert_eq!(report.output_width, None);
    }
}
