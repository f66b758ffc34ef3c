// thumbkit/src/core/pipeline.rs
//! Pipeline orchestration: extract the source once, run each queued
//! operation against it in order, and hand out encoded results by index.

use super::params::{ResizeOptions, ResizeParams};
use super::{OutputFormat, Result, ThumbError};
use crate::operations::{Operation, OperationReport, ResizeOperation, RunContext};
use crate::processors::{Loader, MetadataBundle, MetadataProcessor, MetadataStore};
use crate::utils::resolve_reference;
use image::DynamicImage;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Serialisable summary of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub result: bool,
    pub total_operations: usize,
    pub failed_operations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub operations: Vec<OperationReport>,
}

pub struct Pipeline {
    input: Option<PathBuf>,
    source: Option<DynamicImage>,
    operations: Vec<Operation>,
    loader: Loader,
    metadata_store: Box<dyn MetadataStore>,
    decode_image: bool,
    optimize_png: bool,
    total_operations: usize,
    failed_operations: usize,
    succeeded: bool,
    error_message: Option<String>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            input: None,
            source: None,
            operations: Vec::new(),
            loader: Loader::new(),
            metadata_store: Box::new(MetadataProcessor::new()),
            decode_image: false,
            optimize_png: true,
            total_operations: 0,
            failed_operations: 0,
            succeeded: false,
            error_message: None,
        }
    }

    /// Build from an input reference and a JSON array of operation
    /// descriptors. Any malformed descriptor aborts construction.
    pub fn from_descriptors(input_url: &str, descriptors: &Value) -> Result<Self> {
        let list = descriptors
            .as_array()
            .ok_or_else(|| ThumbError::Setup("Operations must be an array".to_string()))?;

        let mut pipeline = Self::new();
        if !pipeline.set_input_url(input_url) {
            return Err(ThumbError::Setup(format!(
                "Invalid input reference: '{}'",
                input_url
            )));
        }

        for (index, descriptor) in list.iter().enumerate() {
            let operation = Operation::from_descriptor(descriptor).map_err(|e| {
                ThumbError::Setup(format!("Could not parse operation {} - {}", index + 1, e))
            })?;
            pipeline.add_operation(operation);
        }

        log::debug!(
            "Pipeline for {} with {} operation(s)",
            input_url,
            pipeline.operations.len()
        );
        Ok(pipeline)
    }

    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_metadata_store(mut self, store: impl MetadataStore + 'static) -> Self {
        self.metadata_store = Box::new(store);
        self
    }

    pub fn set_input_url(&mut self, reference: &str) -> bool {
        if reference.trim().is_empty() {
            log::warn!("Ignoring empty input reference");
            return false;
        }
        self.input = Some(resolve_reference(reference));
        true
    }

    pub fn input(&self) -> Option<&Path> {
        self.input.as_deref()
    }

    /// Supply pixels directly; extraction is skipped when a source is set.
    pub fn set_source_image(&mut self, image: DynamicImage) {
        self.source = Some(crate::processors::to_8bit(image));
    }

    pub fn source_image(&self) -> Option<&DynamicImage> {
        self.source.as_ref()
    }

    /// Force decoding even when no queued operation needs pixels.
    pub fn set_decode_image(&mut self, decode: bool) {
        self.decode_image = decode;
    }

    pub fn set_png_optimization(&mut self, optimize: bool) {
        self.optimize_png = optimize;
        for operation in &mut self.operations {
            operation.set_png_optimization(optimize);
        }
    }

    pub fn add_operation(&mut self, mut operation: Operation) {
        operation.set_png_optimization(self.optimize_png);
        self.operations.push(operation);
    }

    pub fn add_resize_operation(&mut self, options: &ResizeOptions) {
        let params = ResizeParams::from_options(options);
        self.add_operation(Operation::Resize(ResizeOperation::new(params)));
    }

    pub fn operation(&self, index: usize) -> Option<&Operation> {
        self.operations.get(index)
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn total_operations(&self) -> usize {
        self.total_operations
    }

    pub fn failed_operations(&self) -> usize {
        self.failed_operations
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Extract the source and run every operation in order, stopping at the
    /// first failure. Returns overall success.
    pub fn run(&mut self) -> bool {
        self.total_operations = self.operations.len();
        self.failed_operations = 0;
        self.error_message = None;
        self.succeeded = false;

        let needs_pixels =
            self.decode_image || self.operations.iter().any(Operation::requires_pixels);

        if self.source.is_none() {
            let Some(input) = self.input.clone() else {
                return self.fail("No input image specified".to_string());
            };

            let extracted = if needs_pixels {
                self.loader.load(&input).map(Some)
            } else {
                self.loader.read(&input).map(|_| None)
            };
            match extracted {
                Ok(image) => self.source = image,
                Err(e) => return self.fail(format!("Failed to extract image: {}", e)),
            }
        }

        let metadata = self.read_metadata();

        let Some(source) = self.source.as_ref() else {
            // Nothing queued needs pixels.
            self.succeeded = true;
            return true;
        };

        if source.width() == 0 || source.height() == 0 {
            return self.fail("Input image data is empty".to_string());
        }

        let ctx = RunContext {
            loader: &self.loader,
            metadata_store: &*self.metadata_store,
            metadata: metadata.as_ref(),
        };

        for (index, operation) in self.operations.iter_mut().enumerate() {
            log::debug!("Running operation {} ({})", index + 1, operation.kind());
            if !operation.run(source, &ctx) {
                self.failed_operations += 1;
                self.error_message = Some(format!(
                    "Operation {} failed: {}",
                    index + 1,
                    operation.error_message().unwrap_or("unknown error")
                ));
                break;
            }
        }

        self.succeeded = self.failed_operations == 0;
        log::info!(
            "Pipeline finished: {} operation(s), {} failed",
            self.total_operations,
            self.failed_operations
        );
        self.succeeded
    }

    /// Encoded bytes for the operation at `index`.
    pub fn encode(&mut self, index: usize, format: OutputFormat) -> Result<Vec<u8>> {
        let result = match self.operations.get(index) {
            None => Err(ThumbError::Operation(format!(
                "Invalid operation to {} encode",
                format
            ))),
            Some(operation) => operation.encode(format).map_err(|e| {
                log::warn!("Encoding operation {} as {} failed: {}", index + 1, format, e);
                ThumbError::Operation(format!("Could not encode {}", format))
            }),
        };

        if let Err(e) = &result {
            self.error_message = Some(e.to_string());
        }
        result
    }

    pub fn jpeg(&mut self, index: usize) -> Result<Vec<u8>> {
        self.encode(index, OutputFormat::Jpeg)
    }

    pub fn png(&mut self, index: usize) -> Result<Vec<u8>> {
        self.encode(index, OutputFormat::Png)
    }

    pub fn webp(&mut self, index: usize) -> Result<Vec<u8>> {
        self.encode(index, OutputFormat::WebP)
    }

    pub fn jpeg2000(&mut self, index: usize) -> Result<Vec<u8>> {
        self.encode(index, OutputFormat::Jpeg2000)
    }

    pub fn report(&self) -> PipelineReport {
        PipelineReport {
            result: self.succeeded,
            total_operations: self.total_operations,
            failed_operations: self.failed_operations,
            error_message: self.error_message.clone(),
            operations: self.operations.iter().map(Operation::report).collect(),
        }
    }

    fn read_metadata(&self) -> Option<MetadataBundle> {
        if !self.operations.iter().any(Operation::preserves_metadata) {
            return None;
        }
        let input = self.input.as_deref()?;

        match self.metadata_store.read_metadata(input) {
            Ok(bundle) => Some(bundle),
            Err(e) => {
                log::warn!("Could not read metadata from {}: {}", input.display(), e);
                None
            }
        }
    }

    fn fail(&mut self, message: String) -> bool {
        log::error!("{}", message);
        self.error_message = Some(message);
        self.succeeded = false;
        false
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Resize a single input and return the encoded result.
pub fn resize_once(input_url: &str, options: &ResizeOptions, format: OutputFormat) -> Result<Vec<u8>> {
    let mut pipeline = Pipeline::new();
    if !pipeline.set_input_url(input_url) {
        return Err(ThumbError::InvalidParameter(format!(
            "Invalid input reference: '{}'",
            input_url
        )));
    }
    pipeline.add_resize_operation(options);

    if !pipeline.run() {
        return Err(ThumbError::Operation(
            pipeline
                .error_message()
                .unwrap_or("Resize failed")
                .to_string(),
        ));
    }
    pipeline.encode(0, format)
}
