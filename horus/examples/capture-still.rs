use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use horus::camera::libcamera::{CameraManager, LibcameraStack};
use horus::{CaptureConfig, CaptureController, OutputFormat};

/// Capture one still into today's folder.
#[derive(Debug, Parser)]
struct Args {
    /// Directory the dated folders are created in
    #[arg(long, default_value = "/home/horus/DataCapture")]
    root: PathBuf,

    /// Frames to let exposure and white balance settle for
    #[arg(long, default_value_t = 30)]
    frames: u32,

    /// JPEG quality, 1 to 100
    #[arg(long, default_value_t = 90)]
    quality: u8,

    /// Write the raw frame bytes instead of a JPEG
    #[arg(long)]
    raw: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let now = Local::now();
    let folder = args.root.join(now.format("%Y-%m-%d").to_string());
    fs::create_dir_all(&folder)
        .with_context(|| format!("unable to create {}", folder.display()))?;
    let (output, extension) = if args.raw {
        (OutputFormat::Raw, "raw")
    } else {
        (
            OutputFormat::Jpeg {
                quality: args.quality,
            },
            "jpg",
        )
    };
    let destination = folder.join(format!("{}.{}", now.format("img_%FT%H:%M:%S%Z"), extension));
    info!(destination = %destination.display(), "capturing");

    let manager = CameraManager::new()?;
    let config = CaptureConfig::default()
        .with_convergence_frames(args.frames)
        .with_output(output);
    let mut controller = CaptureController::new(LibcameraStack::new(&manager), config);
    controller.start()?;
    controller.capture(&destination)?;
    controller.stop();
    println!("{}", destination.display());
    Ok(())
}
