// thumbkit/src/processors/resizer.rs
use crate::core::{Result, ThumbError};
use crate::processors::loader::to_8bit;
use fast_image_resize as fr;
use image::{DynamicImage, ImageBuffer, Pixel};
use imageproc::filter::gaussian_blur_f32;

/// Resample with area averaging.
///
/// A box convolution whose support follows the scale factor, so every
/// destination pixel is the mean of the source pixels under its footprint.
/// Channels are filtered independently (no alpha premultiplication).
pub fn resample_area(image: &DynamicImage, width: u32, height: u32) -> Result<DynamicImage> {
    if width == image.width() && height == image.height() {
        log::debug!("Image dimensions unchanged, skipping resize");
        return Ok(image.clone());
    }

    log::debug!(
        "Resizing image from {}x{} to {}x{}",
        image.width(),
        image.height(),
        width,
        height
    );

    match image {
        DynamicImage::ImageRgb8(img) => Ok(DynamicImage::ImageRgb8(resample_buffer(
            img,
            fr::PixelType::U8x3,
            width,
            height,
        )?)),
        DynamicImage::ImageRgba8(img) => Ok(DynamicImage::ImageRgba8(resample_buffer(
            img,
            fr::PixelType::U8x4,
            width,
            height,
        )?)),
        other => resample_area(&to_8bit(other.clone()), width, height),
    }
}

/// Gaussian blur. Non-positive (or NaN) sigma returns the image unchanged.
pub fn gaussian_blur(image: &DynamicImage, sigma: f32) -> DynamicImage {
    if !(sigma > 0.0) {
        return image.clone();
    }

    match image {
        DynamicImage::ImageRgb8(img) => DynamicImage::ImageRgb8(gaussian_blur_f32(img, sigma)),
        DynamicImage::ImageRgba8(img) => DynamicImage::ImageRgba8(gaussian_blur_f32(img, sigma)),
        other => gaussian_blur(&to_8bit(other.clone()), sigma),
    }
}

/// Classic unsharp mask: `original × (1 + k) − blurred × k` with
/// `k = amount / 100`, saturated to 8 bits.
pub fn unsharp_mask(image: &DynamicImage, amount: u32, radius: f32) -> DynamicImage {
    let mut sharpened = to_8bit(image.clone());
    if amount == 0 {
        return sharpened;
    }

    let blurred = gaussian_blur(&sharpened, radius);
    let weight = amount as f32 / 100.0;

    log::debug!("Sharpening amount {} radius {}", amount, radius);

    match (&mut sharpened, &blurred) {
        (DynamicImage::ImageRgb8(out), DynamicImage::ImageRgb8(soft)) => {
            combine_weighted(out, soft, weight)
        }
        (DynamicImage::ImageRgba8(out), DynamicImage::ImageRgba8(soft)) => {
            combine_weighted(out, soft, weight)
        }
        _ => log::warn!("Skipping sharpen: unexpected pixel layout"),
    }

    sharpened
}

fn combine_weighted(target: &mut [u8], blurred: &[u8], weight: f32) {
    for (px, &soft) in target.iter_mut().zip(blurred) {
        let value = *px as f32 * (1.0 + weight) - soft as f32 * weight;
        *px = value.round().clamp(0.0, 255.0) as u8;
    }
}

fn resample_buffer<P>(
    src: &ImageBuffer<P, Vec<u8>>,
    pixel_type: fr::PixelType,
    width: u32,
    height: u32,
) -> Result<ImageBuffer<P, Vec<u8>>>
where
    P: Pixel<Subpixel = u8>,
{
    let (src_w, src_h) = src.dimensions();
    let src_image = fr::images::Image::from_vec_u8(src_w, src_h, src.as_raw().clone(), pixel_type)
        .map_err(|e| ThumbError::Operation(format!("Failed to build resize source: {}", e)))?;
    let mut dst_image = fr::images::Image::new(width, height, pixel_type);

    let options = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Box))
        .use_alpha(false);

    fr::Resizer::new()
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| ThumbError::Operation(format!("Resize failed: {}", e)))?;

    ImageBuffer::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| ThumbError::Operation("Resized buffer has unexpected length".to_string()))
}
