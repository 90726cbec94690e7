// FINISHLINE Main Entry Point
// Copyright (c) 2026 Xing_The_Creator | FINISHLINE

use finishline_core::decode::FfmpegDecoder;
use finishline_core::engine::motion::{self, MotionConfig};
use finishline_core::reader::{CalibrationConfig, FrameReader, ReaderConfig};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "finishline-core")]
#[command(about = "FINISHLINE Frame Engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe a video file and print its stream geometry
    Probe {
        /// Input video path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Extract or synthesize the frame at a (possibly fractional) position
    Frame {
        /// Input video path
        #[arg(short, long)]
        input: PathBuf,

        /// Fractional frame position (e.g. 1204.5)
        #[arg(short, long)]
        position: f64,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        /// Use the motion-shifted variant instead of the blended one
        #[arg(long)]
        shift: bool,

        /// Skip the sharpening pass on synthesized frames
        #[arg(long)]
        no_sharpen: bool,

        /// Finish-line x position for motion estimation (pixels)
        #[arg(long, default_value_t = 0)]
        x_position: i32,

        /// Pixels on either side of the x position to estimate over
        #[arg(long, default_value_t = 64)]
        pixel_range: i32,
    },

    /// Estimate displacement between two integer frames
    Motion {
        /// Input video path
        #[arg(short, long)]
        input: PathBuf,

        /// First frame index
        #[arg(short, long)]
        a: u32,

        /// Second frame index
        #[arg(short, long)]
        b: u32,

        /// Finish-line x position for motion estimation (pixels)
        #[arg(long, default_value_t = 0)]
        x_position: i32,

        /// Pixels on either side of the x position to estimate over
        #[arg(long, default_value_t = 64)]
        pixel_range: i32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    info!("--- FINISHLINE FRAME ENGINE v0.1.1 ---");

    let cli = Cli::parse();
    match cli.command {
        Commands::Probe { input } => {
            let path = input.to_string_lossy().to_string();
            let mut reader = FrameReader::new(FfmpegDecoder::new(), ReaderConfig::default());
            let info = reader.open(&path).await?;
            println!(
                "{}: {}x{} @ {:.3} fps, {} frames",
                path, info.width, info.height, info.fps, info.num_frames
            );
        }

        Commands::Frame {
            input,
            position,
            output,
            shift,
            no_sharpen,
            x_position,
            pixel_range,
        } => {
            let path = input.to_string_lossy().to_string();
            let config = ReaderConfig {
                sharpen_interpolated: !no_sharpen,
                calibration: CalibrationConfig {
                    x_position,
                    pixel_range,
                    ..CalibrationConfig::default()
                },
                ..ReaderConfig::default()
            };
            let mut reader = FrameReader::new(FfmpegDecoder::new(), config);
            reader.open(&path).await?;

            let frame = reader
                .frame_at(&path, position, false, !shift)
                .await
                .with_context(|| format!("fetching frame {:.6} of {}", position, path))?;

            save_png(&frame, &output)?;
            println!(
                "Wrote {} ({}x{}, ts {} ms, motion valid: {})",
                output.display(),
                frame.width,
                frame.height,
                frame.timestamp,
                frame.motion.valid
            );
        }

        Commands::Motion {
            input,
            a,
            b,
            x_position,
            pixel_range,
        } => {
            let path = input.to_string_lossy().to_string();
            let mut reader = FrameReader::new(FfmpegDecoder::new(), ReaderConfig::default());
            reader.open(&path).await?;

            let frame_a = reader.frame_at(&path, a as f64, false, true).await?;
            let frame_b = reader.frame_at(&path, b as f64, false, true).await?;

            let calib = CalibrationConfig {
                x_position,
                pixel_range,
                ..CalibrationConfig::default()
            };
            let result = motion::estimate(
                &frame_a,
                &frame_b,
                calib.roi_for(&frame_a),
                &MotionConfig::default(),
            );
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

/// Write a frame's pixels as PNG. Rows are repacked when the stride carries
/// padding beyond `width * 3`.
fn save_png(frame: &finishline_core::engine::Frame, output: &Path) -> Result<()> {
    let w = frame.width as usize;
    let stride = frame.linesize as usize;
    let tight = w * finishline_core::engine::CHANNELS;

    let pixels: Vec<u8> = if stride == tight {
        frame.data.as_ref().clone()
    } else {
        frame
            .data
            .chunks(stride)
            .flat_map(|row| row[..tight].to_vec())
            .collect()
    };

    let img = image::RgbImage::from_raw(frame.width, frame.height, pixels)
        .ok_or_else(|| anyhow!("frame buffer does not match its geometry"))?;
    img.save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}
