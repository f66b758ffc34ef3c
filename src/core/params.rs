// thumbkit/src/core/params.rs
//! Resize parameters and their lenient setup rules.
//!
//! Optional values that fail validation are dropped and the previous value
//! is kept; setup never fails. Required values (`height`, `width`, `type`)
//! that are missing or unreadable simply stay at their defaults and are
//! reported when the operation runs.

use super::{Gravity, ResizeMode, WatermarkMode, DEFAULT_QUALITY};
use crate::utils::resolve_reference;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Pure validators. Each returns the value to keep and whether the candidate
/// was accepted.
pub mod validate {
    pub fn quality(current: u8, raw: u64) -> (u8, bool) {
        match u8::try_from(raw) {
            Ok(quality) if quality <= 100 => (quality, true),
            _ => (current, false),
        }
    }

    pub fn sharpen_amount(current: u32, raw: u64) -> (u32, bool) {
        if raw <= 1000 {
            (raw as u32, true)
        } else {
            (current, false)
        }
    }

    pub fn sharpen_radius(current: f32, raw: f32) -> (f32, bool) {
        if raw > 0.0 && raw < 10.0 {
            (raw, true)
        } else {
            (current, false)
        }
    }

    pub fn watermark_amount(current: f32, raw: f32) -> (f32, bool) {
        if (0.0..=1.0).contains(&raw) {
            (raw, true)
        } else {
            (current, false)
        }
    }

    pub fn watermark_range(current: (f32, f32), min: f32, max: f32) -> ((f32, f32), bool) {
        let unit = 0.0..=1.0;
        if unit.contains(&min) && unit.contains(&max) && min <= max {
            ((min, max), true)
        } else {
            (current, false)
        }
    }
}

/// Settings for one resize operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    mode: ResizeMode,
    height: u32,
    width: u32,
    quality: u8,
    gravity: Gravity,
    pre_blur: bool,
    sharpen_amount: u32,
    sharpen_radius: f32,
    watermark: Option<PathBuf>,
    watermark_mode: WatermarkMode,
    watermark_amount: f32,
    watermark_min: f32,
    watermark_max: f32,
    preserve_metadata: bool,
    output: Option<PathBuf>,
}

impl Default for ResizeParams {
    fn default() -> Self {
        Self {
            mode: ResizeMode::Invalid,
            height: 0,
            width: 0,
            quality: DEFAULT_QUALITY,
            gravity: Gravity::Center,
            pre_blur: false,
            sharpen_amount: 0,
            sharpen_radius: 0.0,
            watermark: None,
            watermark_mode: WatermarkMode::Standard,
            watermark_amount: 0.05,
            watermark_min: 0.05,
            watermark_max: 0.5,
            preserve_metadata: false,
            output: None,
        }
    }
}

impl ResizeParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a structured `params` object.
    pub fn from_json(params: &Value) -> Self {
        let mut resize = Self::default();

        // Required; problems surface at run time.
        if let Some(mode) = params.get("type").and_then(Value::as_str) {
            resize.set_mode(mode);
        }
        if let Some(height) = read_u64(params, "height").and_then(|h| u32::try_from(h).ok()) {
            resize.set_height(height);
        }
        if let Some(width) = read_u64(params, "width").and_then(|w| u32::try_from(w).ok()) {
            resize.set_width(width);
        }
        if let Some(output) = params.get("output_url").and_then(Value::as_str) {
            resize.set_output_url(output);
        }

        if let Some(gravity) = params.get("gravity").and_then(Value::as_str) {
            resize.set_gravity(gravity);
        }
        if let Some(preserve) = read_bool(params, "preserve_meta") {
            resize.set_preserve_metadata(preserve);
        }
        if let Some(quality) = read_u64(params, "quality") {
            resize.set_quality(quality);
        }
        if let Some(pre_filter) = read_bool(params, "pre_filter") {
            resize.set_pre_blur(pre_filter);
        }
        if let Some(amount) = read_u64(params, "sharpen_amount") {
            resize.set_sharpen_amount(amount);
        }
        if let Some(radius) = read_f32(params, "sharpen_radius") {
            resize.set_sharpen_radius(radius);
        }
        if let Some(kind) = params.get("watermark_type").and_then(Value::as_str) {
            resize.set_watermark_mode(kind);
        }
        if let Some(url) = params.get("watermark_url").and_then(Value::as_str) {
            resize.set_watermark_url(url);
        }
        if let Some(amount) = read_f32(params, "watermark_amount") {
            resize.set_watermark_amount(amount);
        }
        if let (Some(min), Some(max)) = (
            read_f32(params, "watermark_min"),
            read_f32(params, "watermark_max"),
        ) {
            resize.set_watermark_range(min, max);
        }

        resize
    }

    pub fn from_options(options: &ResizeOptions) -> Self {
        let mut resize = Self::default();

        if let Some(mode) = &options.mode {
            resize.set_mode(mode);
        }
        resize.set_height(options.height);
        resize.set_width(options.width);

        if let Some(gravity) = &options.gravity {
            resize.set_gravity(gravity);
        }
        if let Some(quality) = options.quality {
            resize.set_quality(u64::from(quality));
        }
        resize.set_pre_blur(options.pre_filter);
        if let Some(amount) = options.sharpen_amount {
            resize.set_sharpen_amount(u64::from(amount));
        }
        if let Some(radius) = options.sharpen_radius {
            resize.set_sharpen_radius(radius);
        }
        resize.set_preserve_metadata(options.preserve_meta);

        if let Some(url) = &options.watermark_url {
            resize.set_watermark_url(url);
            if let Some(amount) = options.watermark_amount {
                resize.set_watermark_amount(amount);
            }
            if let (Some(min), Some(max)) = (options.watermark_min, options.watermark_max) {
                resize.set_watermark_range(min, max);
            }
        }
        if let Some(kind) = &options.watermark_type {
            resize.set_watermark_mode(kind);
        }
        if let Some(output) = &options.output_url {
            resize.set_output_url(output);
        }

        resize
    }

    pub fn set_mode(&mut self, mode: &str) {
        self.mode = ResizeMode::parse(mode);
    }

    pub fn set_height(&mut self, height: u32) {
        self.height = height;
    }

    pub fn set_width(&mut self, width: u32) {
        self.width = width;
    }

    pub fn set_quality(&mut self, quality: u64) -> bool {
        let (value, accepted) = validate::quality(self.quality, quality);
        self.quality = value;
        reject_note("quality", &quality, accepted)
    }

    pub fn set_gravity(&mut self, gravity: &str) -> bool {
        match Gravity::parse(gravity) {
            Some(parsed) => {
                self.gravity = parsed;
                true
            }
            None => reject_note("gravity", &gravity, false),
        }
    }

    pub fn set_pre_blur(&mut self, pre_blur: bool) {
        self.pre_blur = pre_blur;
    }

    pub fn set_sharpen_amount(&mut self, amount: u64) -> bool {
        let (value, accepted) = validate::sharpen_amount(self.sharpen_amount, amount);
        self.sharpen_amount = value;
        reject_note("sharpen_amount", &amount, accepted)
    }

    pub fn set_sharpen_radius(&mut self, radius: f32) -> bool {
        let (value, accepted) = validate::sharpen_radius(self.sharpen_radius, radius);
        self.sharpen_radius = value;
        reject_note("sharpen_radius", &radius, accepted)
    }

    pub fn set_watermark_url(&mut self, url: &str) {
        self.watermark = Some(resolve_reference(url));
    }

    pub fn set_watermark_mode(&mut self, mode: &str) -> bool {
        match WatermarkMode::parse(mode) {
            Some(parsed) => {
                self.watermark_mode = parsed;
                true
            }
            None => reject_note("watermark_type", &mode, false),
        }
    }

    pub fn set_watermark_amount(&mut self, amount: f32) -> bool {
        let (value, accepted) = validate::watermark_amount(self.watermark_amount, amount);
        self.watermark_amount = value;
        reject_note("watermark_amount", &amount, accepted)
    }

    pub fn set_watermark_range(&mut self, min: f32, max: f32) -> bool {
        let current = (self.watermark_min, self.watermark_max);
        let ((min_value, max_value), accepted) = validate::watermark_range(current, min, max);
        self.watermark_min = min_value;
        self.watermark_max = max_value;
        reject_note("watermark_min/watermark_max", &format!("{}/{}", min, max), accepted)
    }

    pub fn set_preserve_metadata(&mut self, preserve: bool) {
        self.preserve_metadata = preserve;
    }

    pub fn set_output_url(&mut self, url: &str) {
        self.output = Some(resolve_reference(url));
    }

    pub fn mode(&self) -> ResizeMode {
        self.mode
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn gravity(&self) -> Gravity {
        self.gravity
    }

    pub fn pre_blur(&self) -> bool {
        self.pre_blur
    }

    pub fn sharpen_amount(&self) -> u32 {
        self.sharpen_amount
    }

    pub fn sharpen_radius(&self) -> f32 {
        self.sharpen_radius
    }

    pub fn watermark(&self) -> Option<&Path> {
        self.watermark.as_deref()
    }

    pub fn watermark_mode(&self) -> WatermarkMode {
        self.watermark_mode
    }

    pub fn watermark_amount(&self) -> f32 {
        self.watermark_amount
    }

    pub fn watermark_min(&self) -> f32 {
        self.watermark_min
    }

    pub fn watermark_max(&self) -> f32 {
        self.watermark_max
    }

    pub fn preserve_metadata(&self) -> bool {
        self.preserve_metadata
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }
}

/// Flat, programmatic description of a resize, mirroring the structured
/// params object field for field.
#[derive(Debug, Clone, Default)]
pub struct ResizeOptions {
    pub mode: Option<String>,
    pub height: u32,
    pub width: u32,
    pub gravity: Option<String>,
    pub quality: Option<u32>,
    pub pre_filter: bool,
    pub sharpen_amount: Option<u32>,
    pub sharpen_radius: Option<f32>,
    pub preserve_meta: bool,
    pub watermark_url: Option<String>,
    pub watermark_type: Option<String>,
    pub watermark_amount: Option<f32>,
    pub watermark_min: Option<f32>,
    pub watermark_max: Option<f32>,
    pub output_url: Option<String>,
}

fn reject_note<T: std::fmt::Display + ?Sized>(field: &str, value: &T, accepted: bool) -> bool {
    if !accepted {
        log::warn!("Ignoring invalid {} value: {}", field, value);
    }
    accepted
}

fn read_u64(params: &Value, key: &str) -> Option<u64> {
    match params.get(key)? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_f32(params: &Value, key: &str) -> Option<f32> {
    match params.get(key)? {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_bool(params: &Value, key: &str) -> Option<bool> {
    match params.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_u64().map(|v| v != 0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
