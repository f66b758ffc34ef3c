use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use thumbkit::{
    format_file_size, resize_once, to_reference, Loader, MetadataProcessor, MetadataStore,
    OutputFormat, Pipeline, ResizeOptions,
};

#[derive(Parser)]
#[command(name = "thumbkit", version, about = "Image thumbnailing pipelines")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a JSON list of operations against one input and print the report
    Run {
        input: String,

        /// File holding the operation descriptors
        #[arg(short, long)]
        operations: PathBuf,
    },

    /// Resize a single image
    Resize {
        input: String,

        #[arg(short, long)]
        out: PathBuf,

        /// width, height, square or fill
        #[arg(long = "type", default_value = "fill")]
        mode: String,

        #[arg(short = 'W', long)]
        width: u32,

        #[arg(short = 'H', long)]
        height: u32,

        #[arg(short, long)]
        gravity: Option<String>,

        #[arg(short, long)]
        quality: Option<u32>,

        #[arg(long, value_enum, default_value = "jpeg")]
        format: Format,

        #[arg(long)]
        pre_filter: bool,

        #[arg(long)]
        sharpen_amount: Option<u32>,

        #[arg(long)]
        sharpen_radius: Option<f32>,

        #[arg(long)]
        watermark: Option<String>,

        /// standard or adaptive
        #[arg(long)]
        watermark_type: Option<String>,

        #[arg(long)]
        watermark_amount: Option<f32>,
    },

    /// Show image dimensions and metadata blocks
    Info { input: String },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Format {
    Jpeg,
    Png,
    Webp,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Jpeg => OutputFormat::Jpeg,
            Format::Png => OutputFormat::Png,
            Format::Webp => OutputFormat::WebP,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    match cli.command {
        Commands::Run { input, operations } => run_pipeline(&input, &operations),
        Commands::Resize {
            input,
            out,
            mode,
            width,
            height,
            gravity,
            quality,
            format,
            pre_filter,
            sharpen_amount,
            sharpen_radius,
            watermark,
            watermark_type,
            watermark_amount,
        } => {
            let options = ResizeOptions {
                mode: Some(mode),
                width,
                height,
                gravity,
                quality,
                pre_filter,
                sharpen_amount,
                sharpen_radius,
                watermark_url: watermark,
                watermark_type,
                watermark_amount,
                ..Default::default()
            };
            let bytes = resize_once(&input, &options, format.into())
                .with_context(|| format!("Failed to resize {}", input))?;
            std::fs::write(&out, &bytes)
                .with_context(|| format!("Failed to write {}", out.display()))?;

            println!(
                "Resized image saved to: {} ({})",
                out.display(),
                format_file_size(bytes.len() as u64)
            );
            Ok(())
        }
        Commands::Info { input } => show_info(&input),
    }
}

fn run_pipeline(input: &str, operations: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(operations)
        .with_context(|| format!("Failed to read {}", operations.display()))?;
    let descriptors: serde_json::Value =
        serde_json::from_str(&text).context("Operations file is not valid JSON")?;

    let mut pipeline = Pipeline::from_descriptors(input, &descriptors)?;
    let succeeded = pipeline.run();

    println!("{}", serde_json::to_string_pretty(&pipeline.report())?);

    if !succeeded {
        bail!(
            "Pipeline failed: {}",
            pipeline.error_message().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn show_info(input: &str) -> anyhow::Result<()> {
    let path = thumbkit::resolve_reference(input);
    let file_size = std::fs::metadata(&path)
        .with_context(|| format!("File does not exist: {}", path.display()))?
        .len();

    let image = Loader::new().load(&path)?;
    let metadata = MetadataProcessor::new().read_metadata(&path)?;

    println!("=== Image Information ===");
    println!("File: {}", to_reference(&path));
    println!("Size: {}", format_file_size(file_size));
    println!("Dimensions: {} x {} pixels", image.width(), image.height());
    println!("Color: {:?}", image.color());
    println!("EXIF: {}", block_summary(metadata.exif.as_deref()));
    println!("XMP: {}", block_summary(metadata.xmp.as_deref()));
    println!("IPTC: {}", block_summary(metadata.iptc.as_deref()));

    Ok(())
}

fn block_summary(block: Option<&[u8]>) -> String {
    match block {
        Some(data) => format!("{} bytes", data.len()),
        None => "none".to_string(),
    }
}
