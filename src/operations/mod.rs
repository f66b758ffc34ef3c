// thumbkit/src/operations/mod.rs
//! Pipeline units.
//!
//! Every operation is driven through the same surface: run against the
//! shared source image, report its status, and encode its result on demand.
//! The set of operations is closed; add a variant to [`Operation`] to add one.

mod resize;

pub use resize::ResizeOperation;

use crate::core::params::ResizeParams;
use crate::core::{OperationStatus, OutputFormat, Result, ThumbError};
use crate::processors::{Loader, MetadataBundle, MetadataStore};
use image::DynamicImage;
use serde::Serialize;
use serde_json::Value;

/// Collaborators and shared inputs handed to an operation while it runs.
pub struct RunContext<'a> {
    pub loader: &'a Loader,
    pub metadata_store: &'a dyn MetadataStore,
    pub metadata: Option<&'a MetadataBundle>,
}

/// Serialisable outcome of one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationReport {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    pub result: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug)]
pub enum Operation {
    Resize(ResizeOperation),
}

impl Operation {
    /// Build from a `{ "type": ..., "params": { ... } }` descriptor.
    pub fn from_descriptor(descriptor: &Value) -> Result<Self> {
        let kind = descriptor
            .get("type")
            .ok_or_else(|| ThumbError::Setup("missing field `type`".to_string()))?
            .as_str()
            .ok_or_else(|| ThumbError::Setup("field `type` must be a string".to_string()))?;

        let params = descriptor
            .get("params")
            .ok_or_else(|| ThumbError::Setup("missing field `params`".to_string()))?;

        match kind {
            "resize" => Ok(Operation::Resize(ResizeOperation::new(
                ResizeParams::from_json(params),
            ))),
            other => Err(ThumbError::Setup(format!(
                "Operation not supported: {}",
                other
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Resize(_) => "resize",
        }
    }

    /// Whether the source pixels must be decoded before this runs.
    pub fn requires_pixels(&self) -> bool {
        match self {
            Operation::Resize(_) => true,
        }
    }

    /// Whether source metadata must be read for this to run.
    pub fn preserves_metadata(&self) -> bool {
        match self {
            Operation::Resize(resize) => resize.params().preserve_metadata(),
        }
    }

    pub fn run(&mut self, source: &DynamicImage, ctx: &RunContext<'_>) -> bool {
        match self {
            Operation::Resize(resize) => resize.run(source, ctx),
        }
    }

    pub fn status(&self) -> OperationStatus {
        match self {
            Operation::Resize(resize) => resize.status(),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Operation::Resize(resize) => resize.error_message(),
        }
    }

    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>> {
        match self {
            Operation::Resize(resize) => resize.encode(format),
        }
    }

    pub fn set_png_optimization(&mut self, optimize: bool) {
        match self {
            Operation::Resize(resize) => resize.set_png_optimization(optimize),
        }
    }

    pub fn report(&self) -> OperationReport {
        match self {
            Operation::Resize(resize) => resize.report(),
        }
    }

    pub fn as_resize(&self) -> Option<&ResizeOperation> {
        match self {
            Operation::Resize(resize) => Some(resize),
        }
    }
}
