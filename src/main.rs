use clap::{ArgAction, Parser, Subcommand};
use imgprep::config::{self, PipelineConfig};
use imgprep::imaging::{RustBackend, guess_mime_type};
use imgprep::metadata::{ExifReader, KamadakExifReader};
use imgprep::process::Preprocessor;
use imgprep::types::{EncodedImage, Image};
use imgprep::{naming, output};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imgprep")]
#[command(about = "Prepare images for upload: fix orientation, enforce size limits, convert format")]
#[command(long_about = "\
Prepare images for upload: fix orientation, enforce size limits, convert format

Every image goes through three stages, in order:

  orient   turn EXIF-rotated photos upright (lossless pixel permutation)
  resize   shrink uniformly until width, height and pixel limits all hold
  convert  encode to the target format (JPEG at quality 75 by default)

Settings come from imgprep.toml in the working directory (or --config FILE),
with command-line flags applied on top.

Run 'imgprep gen-config' to generate a documented imgprep.toml.")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline on one image and write the result
    Process(ProcessArgs),
    /// Show an image's EXIF metadata and orientation
    Inspect {
        /// Image file to read
        input: PathBuf,
    },
    /// Print a stock imgprep.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct ProcessArgs {
    /// Image file to process
    input: PathBuf,

    /// Output file (default: <input>.processed.<ext> next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file (default: ./imgprep.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum output width in pixels
    #[arg(long)]
    max_width: Option<u32>,

    /// Maximum output height in pixels
    #[arg(long)]
    max_height: Option<u32>,

    /// Maximum output size in megapixels
    #[arg(long)]
    max_megapixels: Option<f64>,

    /// Output MIME type or extension (image/webp, png, ...)
    #[arg(long, value_name = "FORMAT")]
    format: Option<String>,

    /// JPEG quality, 1-100
    #[arg(long)]
    quality: Option<u32>,

    /// Leave EXIF orientation alone
    #[arg(long)]
    no_orientation: bool,

    /// Resize with the codec's resampler instead of the box filter
    #[arg(long)]
    native_scaler: bool,

    /// Keep already-encoded input as is unless a stage changed it
    #[arg(long)]
    no_force: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Process(args) => run_process(args).await?,
        Command::Inspect { input } => {
            let bytes = std::fs::read(&input)?;
            let mime = detect_mime(&input, &bytes);
            let tags = KamadakExifReader::new().read(&bytes).await;
            output::print_inspect(&input, mime, bytes.len(), &tags);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run_process(args: ProcessArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(Path::new("."))?,
    };
    apply_overrides(&mut config, &args)?;
    config.validate()?;

    let bytes = std::fs::read(&args.input)?;
    let mime = detect_mime(&args.input, &bytes)
        .ok_or_else(|| format!("{}: not a recognised image", args.input.display()))?;
    let mut input = EncodedImage::new(bytes, mime);
    if let Some(name) = args.input.file_name() {
        input = input.with_name(name.to_string_lossy());
    }

    let preprocessor = Preprocessor::new(
        Arc::new(RustBackend::new()),
        Arc::new(KamadakExifReader::new()),
        config,
    );
    let (image, mut report) = preprocessor.process_with_report(input.into()).await?;

    let encoded = match image {
        Image::Encoded(encoded) => encoded,
        Image::Decoded(bitmap) => {
            warn!("Conversion is disabled; writing the bitmap as PNG");
            let png = bitmap
                .encode(preprocessor.backend(), "image/png", None)
                .await?;
            report.output_mime = Some(png.mime_type().to_string());
            report.output_bytes = Some(png.len());
            png
        }
    };

    let out_path = args
        .output
        .clone()
        .unwrap_or_else(|| naming::default_output_path(&args.input, encoded.mime_type()));
    std::fs::write(&out_path, encoded.as_bytes())?;

    if args.json {
        println!(
            "{}",
            output::format_process_report_json(&report, &args.input, &out_path)?
        );
    } else {
        output::print_process_report(&report, &args.input, &out_path);
    }
    Ok(())
}

/// Fold command-line flags into the loaded config.
fn apply_overrides(config: &mut PipelineConfig, args: &ProcessArgs) -> Result<(), String> {
    if args.max_width.is_some() {
        config.resize.max_width = args.max_width;
    }
    if args.max_height.is_some() {
        config.resize.max_height = args.max_height;
    }
    if args.max_megapixels.is_some() {
        config.resize.max_megapixels = args.max_megapixels;
    }
    if let Some(format) = &args.format {
        config.output.mime_type = resolve_format(format)?;
    }
    if args.quality.is_some() {
        config.output.quality = args.quality;
    }
    if args.no_orientation {
        config.apply_orientation = false;
    }
    if args.native_scaler {
        config.resize.use_area_average = false;
    }
    if args.no_force {
        config.output.force = false;
    }
    Ok(())
}

/// Accept either a MIME type or a bare extension.
fn resolve_format(format: &str) -> Result<String, String> {
    if format.contains('/') {
        return Ok(format.to_ascii_lowercase());
    }
    naming::mime_for_extension(format.trim_start_matches('.'))
        .map(str::to_string)
        .ok_or_else(|| format!("unknown output format '{format}'"))
}

/// Sniff the content first; fall back to the file extension.
fn detect_mime(path: &Path, bytes: &[u8]) -> Option<&'static str> {
    guess_mime_type(bytes).or_else(|| naming::mime_for_path(path))
}
