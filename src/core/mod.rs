// thumbkit/src/core/mod.rs
pub mod params;
pub mod pipeline;

use std::fmt;
use thiserror::Error;

/// Largest target area (width × height) a resize may request.
pub const MAX_RESIZE_PIXELS: u64 = 10_000_000;

/// JPEG-family quality used when none is configured.
pub const DEFAULT_QUALITY: u8 = 92;

/// Prefix marking a reference as a local file.
pub const FILE_SOURCE: &str = "file://";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    FixedWidth,
    FixedHeight,
    Square,
    Fill,
    #[default]
    Invalid,
}

impl ResizeMode {
    /// Case-insensitive; anything unrecognised maps to `Invalid`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "width" => ResizeMode::FixedWidth,
            "height" => ResizeMode::FixedHeight,
            "square" => ResizeMode::Square,
            "fill" => ResizeMode::Fill,
            _ => ResizeMode::Invalid,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResizeMode::FixedWidth => "width",
            ResizeMode::FixedHeight => "height",
            ResizeMode::Square => "square",
            ResizeMode::Fill => "fill",
            ResizeMode::Invalid => "invalid",
        }
    }
}

/// Compass anchor for positioning a crop inside the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    #[default]
    Center,
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Gravity {
    pub const ALL: [Gravity; 9] = [
        Gravity::Center,
        Gravity::North,
        Gravity::South,
        Gravity::East,
        Gravity::West,
        Gravity::NorthEast,
        Gravity::NorthWest,
        Gravity::SouthEast,
        Gravity::SouthWest,
    ];

    /// Accepts full names and their short forms (`nw`, `se`, `c`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "center" | "c" => Some(Gravity::Center),
            "north" | "n" => Some(Gravity::North),
            "south" | "s" => Some(Gravity::South),
            "east" | "e" => Some(Gravity::East),
            "west" | "w" => Some(Gravity::West),
            "northeast" | "ne" => Some(Gravity::NorthEast),
            "northwest" | "nw" => Some(Gravity::NorthWest),
            "southeast" | "se" => Some(Gravity::SouthEast),
            "southwest" | "sw" => Some(Gravity::SouthWest),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatermarkMode {
    #[default]
    Standard,
    /// Opacity follows the brightness of the background pixel.
    Adaptive,
}

impl WatermarkMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "standard" => Some(WatermarkMode::Standard),
            "adaptive" => Some(WatermarkMode::Adaptive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Jpeg2000,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Jpeg => f.write_str("JPEG"),
            OutputFormat::Png => f.write_str("PNG"),
            OutputFormat::WebP => f.write_str("WebP"),
            OutputFormat::Jpeg2000 => f.write_str("JPEG 2000"),
        }
    }
}

/// Lifecycle of a single operation. Only ever moves forward within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationStatus {
    #[default]
    NotAttempted,
    Pending,
    Success,
    Error,
}

#[derive(Error, Debug)]
pub enum ThumbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("{0}")]
    Operation(String),

    #[error("{0}")]
    Setup(String),
}

pub type Result<T> = std::result::Result<T, ThumbError>;
