use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidmark::{
    ExportPreset, Fps, MediaItem, MediaProcessor, ProcessorConfig, SourceAsset, WatermarkJob,
    default_frame_rate,
};

#[derive(Parser, Debug)]
#[command(name = "vidmark", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watermark a video and export an MP4 (requires `ffmpeg`/`ffprobe` on PATH).
    Video(VideoArgs),
    /// Watermark a still image and write a PNG.
    Image(ImageArgs),
}

#[derive(Parser, Debug)]
struct VideoArgs {
    /// Job JSON describing the source and overlays.
    #[arg(long)]
    job: PathBuf,

    /// Output directory (defaults to the user's document directory).
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Uniform scale applied with the orientation correction.
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Output frames per second (defaults to the source video's rate).
    #[arg(long)]
    fps: Option<u32>,

    /// Encoder quality: highest, medium or low.
    #[arg(long, default_value_t = ExportPreset::Highest)]
    preset: ExportPreset,
}

#[derive(Parser, Debug)]
struct ImageArgs {
    /// Job JSON describing the source and overlays.
    #[arg(long)]
    job: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidmark=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Video(args) => cmd_video(args),
        Command::Image(args) => cmd_image(args),
    }
}

fn load_item(job_path: &Path) -> anyhow::Result<MediaItem> {
    let job = WatermarkJob::read(job_path)?;
    let base_dir = job_path.parent().unwrap_or_else(|| Path::new("."));
    job.into_media_item(base_dir)
        .with_context(|| format!("load job '{}'", job_path.display()))
}

fn cmd_video(args: VideoArgs) -> anyhow::Result<()> {
    let item = load_item(&args.job)?;
    let fps = match (args.fps, &item.source) {
        (Some(fps), _) => Fps::new(fps, 1)?,
        (None, SourceAsset::Video(asset)) => default_frame_rate(asset),
        (None, SourceAsset::Image(_)) => Fps::default(),
    };
    tracing::debug!(?fps, "output frame rate");

    let config = ProcessorConfig {
        scale_factor: args.scale,
        fps,
        output_dir: args.out_dir,
        preset: args.preset,
        ..Default::default()
    };
    let processor = MediaProcessor::new(config)?;

    let result = processor.process_blocking(item)?;
    let url = result
        .processed_url
        .context("export finished without an output location")?;
    eprintln!("wrote {}", url.display());
    Ok(())
}

fn cmd_image(args: ImageArgs) -> anyhow::Result<()> {
    let processor = MediaProcessor::new(ProcessorConfig::default())?;
    let item = load_item(&args.job)?;

    let result = processor.process_image_blocking(&item)?;
    let image = result
        .image
        .context("image processing finished without an image")?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image
        .save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
