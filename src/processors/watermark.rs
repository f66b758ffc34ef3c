// thumbkit/src/processors/watermark.rs
//! In-place alpha compositing of a (tiled) watermark.
//!
//! The watermark is sampled at `(x mod wm_width, y mod wm_height)` so it
//! repeats across targets larger than itself. Watermark pixels with zero
//! alpha are skipped outright. Blended channels are truncated to 8 bits.

use crate::core::WatermarkMode;
use crate::processors::loader::to_8bit;
use image::{DynamicImage, RgbaImage};

/// How strongly the watermark is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Blend {
    /// Constant blend factor for every pixel.
    Standard { amount: f64 },
    /// Blend factor grows logarithmically with background brightness,
    /// from `min` on black to `max` on white.
    Adaptive { min: f64, max: f64 },
}

impl Blend {
    pub fn new(mode: WatermarkMode, amount: f32, min: f32, max: f32) -> Self {
        match mode {
            WatermarkMode::Standard => Blend::Standard {
                amount: f64::from(amount),
            },
            WatermarkMode::Adaptive => Blend::Adaptive {
                min: f64::from(min),
                max: f64::from(max),
            },
        }
    }
}

/// Fast perceptual brightness approximation, `(2r + 3g + 3b) / 8`.
///
/// Older builds weighted channels as `(3r + 4g + b) >> 3`; this one uses
/// `(2r + 3g + 3b) >> 3`, so adaptive blends can differ on saturated colours.
pub fn brightness(r: u8, g: u8, b: u8) -> u32 {
    (2 * u32::from(r) + 3 * u32::from(g) + 3 * u32::from(b)) >> 3
}

/// `min + (max − min) × log10(1 + 9 × brightness / 255)`.
pub fn adaptive_blend(min: f64, max: f64, brightness: u32) -> f64 {
    const NORM: f64 = 9.0 / 255.0;
    min + (max - min) * (1.0 + NORM * f64::from(brightness)).log10()
}

/// Blend `watermark` into `target` in place.
pub fn apply(target: &mut DynamicImage, watermark: &RgbaImage, blend: Blend) {
    if !matches!(
        target,
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_)
    ) {
        *target = to_8bit(target.clone());
    }

    log::debug!(
        "Applying {}x{} watermark to {}x{} image ({:?})",
        watermark.width(),
        watermark.height(),
        target.width(),
        target.height(),
        blend
    );

    match target {
        DynamicImage::ImageRgb8(img) => {
            let (width, height) = img.dimensions();
            composite(img, width, height, 3, watermark, blend);
        }
        DynamicImage::ImageRgba8(img) => {
            let (width, height) = img.dimensions();
            composite(img, width, height, 4, watermark, blend);
        }
        _ => log::warn!("Skipping watermark: unexpected pixel layout"),
    }
}

fn composite(
    target: &mut [u8],
    width: u32,
    height: u32,
    channels: usize,
    watermark: &RgbaImage,
    blend: Blend,
) {
    let (mark_w, mark_h) = watermark.dimensions();
    if mark_w == 0 || mark_h == 0 {
        return;
    }
    let mark: &[u8] = watermark.as_raw();

    for y in 0..height {
        let wy = y % mark_h;
        for x in 0..width {
            let wx = x % mark_w;
            let wi = (wy as usize * mark_w as usize + wx as usize) * 4;

            let alpha = mark[wi + 3];
            if alpha == 0 {
                continue;
            }

            let ti = (y as usize * width as usize + x as usize) * channels;

            let factor = match blend {
                Blend::Standard { amount } => amount,
                Blend::Adaptive { min, max } if channels >= 3 => adaptive_blend(
                    min,
                    max,
                    brightness(target[ti], target[ti + 1], target[ti + 2]),
                ),
                Blend::Adaptive { min, .. } => min,
            };

            let opacity = factor * f64::from(alpha) / 255.0;

            for c in 0..channels {
                let background = f64::from(target[ti + c]);
                let foreground = f64::from(mark[wi + c]);
                target[ti + c] = (background * (1.0 - opacity) + foreground * opacity) as u8;
            }
        }
    }
}
