// thumbkit/src/processors/geometry.rs
//! Pure crop/target-size math for each resize mode.
//!
//! Nothing here touches pixels. Given the source size, the requested size
//! and a gravity, each function returns the region of the source to resample
//! and the size to resample it to. Rounding is half away from zero
//! (`f64::round`), crop offsets for centred gravities use floor division.

use crate::core::{Gravity, ResizeMode};

/// Region of the source image, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn is_full(&self, width: u32, height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == width && self.height == height
    }
}

/// Crop to take and the size to resample it to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub crop: Rect,
    pub width: u32,
    pub height: u32,
}

/// Dispatches on `mode`. Returns `None` for [`ResizeMode::Invalid`].
pub fn compute(
    mode: ResizeMode,
    source: (u32, u32),
    requested: (u32, u32),
    gravity: Gravity,
) -> Option<Geometry> {
    let (src_w, src_h) = source;
    let (req_w, req_h) = requested;

    let geometry = match mode {
        ResizeMode::FixedWidth => fixed_width(src_w, src_h, req_w, req_h),
        ResizeMode::FixedHeight => fixed_height(src_w, src_h, req_w, req_h),
        ResizeMode::Square => square(src_w, src_h, req_w),
        ResizeMode::Fill => fill(src_w, src_h, req_w, req_h, gravity),
        ResizeMode::Invalid => return None,
    };

    log::debug!(
        "{} geometry: crop {}x{}+{}+{} of {}x{}, target {}x{}",
        mode.as_str(),
        geometry.crop.width,
        geometry.crop.height,
        geometry.crop.x,
        geometry.crop.y,
        src_w,
        src_h,
        geometry.width,
        geometry.height
    );

    Some(geometry)
}

/// Width is authoritative; `max_height` only caps the derived height.
pub fn fixed_width(src_w: u32, src_h: u32, width: u32, max_height: u32) -> Geometry {
    let aspect = src_h as f64 / src_w as f64;

    let mut target_w = width;
    let mut target_h = aspect_height(target_w, aspect);

    if target_h > max_height {
        target_h = max_height;
        target_w = aspect_width(target_h, aspect);
    }

    Geometry {
        crop: Rect::full(src_w, src_h),
        width: target_w.max(1),
        height: target_h.max(1),
    }
}

/// Height is authoritative; `max_width` only caps the derived width.
pub fn fixed_height(src_w: u32, src_h: u32, max_width: u32, height: u32) -> Geometry {
    let aspect = src_h as f64 / src_w as f64;

    let mut target_h = height;
    let mut target_w = aspect_width(target_h, aspect);

    if target_w > max_width {
        target_w = max_width;
        target_h = aspect_height(target_w, aspect);
    }

    Geometry {
        crop: Rect::full(src_w, src_h),
        width: target_w.max(1),
        height: target_h.max(1),
    }
}

/// Output is `width × width`; a non-square source is centre-cropped along
/// its longer axis.
pub fn square(src_w: u32, src_h: u32, width: u32) -> Geometry {
    let crop = if src_w == src_h {
        Rect::full(src_w, src_h)
    } else if src_h > src_w {
        let y = ((src_h as f64 - src_w as f64) / 2.0).round() as u32;
        Rect {
            x: 0,
            y,
            width: src_w,
            height: src_w,
        }
    } else {
        let x = ((src_w as f64 - src_h as f64) / 2.0).round() as u32;
        Rect {
            x,
            y: 0,
            width: src_h,
            height: src_h,
        }
    };

    Geometry {
        crop,
        width,
        height: width,
    }
}

/// Output is exactly `width × height`; the crop matches the destination
/// aspect ratio and is anchored by `gravity`.
pub fn fill(src_w: u32, src_h: u32, width: u32, height: u32, gravity: Gravity) -> Geometry {
    let dest_aspect = height as f64 / width as f64;

    let scale_x = width as f64 / src_w as f64;
    let scale_y = height as f64 / src_h as f64;

    let (crop_w, crop_h) = if scale_x > scale_y {
        (src_w, aspect_height(src_w, dest_aspect))
    } else {
        (aspect_width(src_h, dest_aspect), src_h)
    };
    let crop_w = crop_w.clamp(1, src_w);
    let crop_h = crop_h.clamp(1, src_h);

    let (x, y) = anchor(src_w - crop_w, src_h - crop_h, gravity);

    Geometry {
        crop: Rect {
            x,
            y,
            width: crop_w,
            height: crop_h,
        },
        width,
        height,
    }
}

/// Offset of a crop given the horizontal and vertical slack around it.
fn anchor(slack_x: u32, slack_y: u32, gravity: Gravity) -> (u32, u32) {
    match gravity {
        Gravity::Center => (slack_x / 2, slack_y / 2),
        Gravity::North => (slack_x / 2, 0),
        Gravity::NorthWest => (0, 0),
        Gravity::NorthEast => (slack_x, 0),
        Gravity::South => (slack_x / 2, slack_y),
        Gravity::SouthWest => (0, slack_y),
        Gravity::SouthEast => (slack_x, slack_y),
        Gravity::West => (0, slack_y / 2),
        Gravity::East => (slack_x, slack_y / 2),
    }
}

/// `aspect` is height / width.
fn aspect_height(width: u32, aspect: f64) -> u32 {
    (width as f64 * aspect).round() as u32
}

fn aspect_width(height: u32, aspect: f64) -> u32 {
    (height as f64 / aspect).round() as u32
}
