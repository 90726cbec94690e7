// FINISHLINE Decoder Collaborator
// Copyright (c) 2026 Xing_The_Creator | FINISHLINE
//
// The engine treats decoding as a collaborator behind the `FrameDecoder`
// trait: open a file, fetch one integer-indexed raw frame, close the file.
// `FfmpegDecoder` is the shipping implementation: ffprobe for stream
// geometry, an ffmpeg rawvideo pipe for pixel data. Any non-OK status is a
// hard stop for the request that needed the frame.

use std::collections::HashMap;
use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use crate::engine::{EngineError, Frame, CHANNELS};

/// Result of an open/close call on the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStatus {
    Ok,
    Failed(String),
}

impl DecodeStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, DecodeStatus::Ok)
    }
}

/// Stream geometry and timing for an opened file.
#[derive(Debug, Clone, Copy)]
pub struct VideoStreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub num_frames: u32,
}

/// Decoder seam consumed by the frame reader. Implementations decode whole
/// integer frames; fractional positions are the engine's business.
#[allow(async_fn_in_trait)]
pub trait FrameDecoder {
    async fn open_file(&mut self, path: &str) -> DecodeStatus;
    async fn close_file(&mut self, path: &str) -> DecodeStatus;
    async fn get_frame(&mut self, path: &str, index: u32) -> Result<Frame, EngineError>;
    fn stream_info(&self, path: &str) -> Option<VideoStreamInfo>;
}

/// FFmpeg/ffprobe-backed decoder. Keeps per-file stream info so repeated
/// frame requests skip re-probing.
#[derive(Default)]
pub struct FfmpegDecoder {
    open_files: HashMap<String, VideoStreamInfo>,
}

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe width/height/frame-rate/frame-count from the first video stream.
    async fn probe(path: &str) -> Result<VideoStreamInfo, String> {
        if !Path::new(path).exists() {
            return Err(format!("no such file: {}", path));
        }

        let out = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-count_frames",
                "-show_entries",
                "stream=width,height,r_frame_rate,nb_read_frames",
                "-of",
                "csv=p=0",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| format!("ffprobe spawn failed: {}", e))?;

        if !out.status.success() {
            return Err(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }

        // csv=p=0 output: "1920,1080,30000/1001,5400"
        let text = String::from_utf8_lossy(&out.stdout);
        let line = text.trim();
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() < 4 {
            return Err(format!("unexpected ffprobe output: {}", line));
        }

        let width: u32 = parts[0].parse().map_err(|_| "bad width".to_string())?;
        let height: u32 = parts[1].parse().map_err(|_| "bad height".to_string())?;
        let fps = parse_frame_rate(parts[2]).ok_or_else(|| "bad frame rate".to_string())?;
        let num_frames: u32 = parts[3].parse().unwrap_or(0);

        Ok(VideoStreamInfo {
            width,
            height,
            fps,
            num_frames,
        })
    }
}

impl FrameDecoder for FfmpegDecoder {
    async fn open_file(&mut self, path: &str) -> DecodeStatus {
        if self.open_files.contains_key(path) {
            return DecodeStatus::Ok;
        }
        match Self::probe(path).await {
            Ok(info) => {
                info!(
                    "[DECODE] Opened {}: {}x{} @ {:.3} fps, {} frames",
                    path, info.width, info.height, info.fps, info.num_frames
                );
                self.open_files.insert(path.to_string(), info);
                DecodeStatus::Ok
            }
            Err(msg) => DecodeStatus::Failed(msg),
        }
    }

    async fn close_file(&mut self, path: &str) -> DecodeStatus {
        match self.open_files.remove(path) {
            Some(_) => DecodeStatus::Ok,
            None => DecodeStatus::Failed(format!("not open: {}", path)),
        }
    }

    async fn get_frame(&mut self, path: &str, index: u32) -> Result<Frame, EngineError> {
        if !self.open_files.contains_key(path) {
            if let DecodeStatus::Failed(msg) = self.open_file(path).await {
                return Err(EngineError::DecodeFailed {
                    file: path.to_string(),
                    index,
                    status: msg,
                });
            }
        }
        let info = self.open_files[path];

        // TODO: fast-seek with -ss to the nearest keyframe before the select
        // filter; needs accuracy validation against frame-exact fixtures.
        let select = format!("select=eq(n\\,{})", index);
        let out = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(path)
            .arg("-vf")
            .arg(&select)
            .args(["-vframes", "1", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .output()
            .await
            .map_err(|e| EngineError::DecodeFailed {
                file: path.to_string(),
                index,
                status: format!("ffmpeg spawn failed: {}", e),
            })?;

        let frame_size = (info.width * info.height) as usize * CHANNELS;
        if !out.status.success() || out.stdout.len() != frame_size {
            return Err(EngineError::DecodeFailed {
                file: path.to_string(),
                index,
                status: format!(
                    "expected {} bytes, got {} ({})",
                    frame_size,
                    out.stdout.len(),
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
            });
        }

        debug!("[DECODE] Raw frame {} from {}", index, path);
        let mut frame = Frame::new(
            path,
            index as f64,
            false,
            info.width,
            info.height,
            info.width * CHANNELS as u32,
            out.stdout,
        );
        frame.set_timing(info.fps, info.num_frames);
        Ok(frame)
    }

    fn stream_info(&self, path: &str) -> Option<VideoStreamInfo> {
        self.open_files.get(path).copied()
    }
}

/// ffprobe reports `r_frame_rate` as "num/den" (e.g. "30000/1001").
fn parse_frame_rate(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() == 2 {
        let num: f64 = parts[0].parse().ok()?;
        let den: f64 = parts[1].parse().ok()?;
        if den != 0.0 {
            Some(num / den)
        } else {
            None
        }
    } else {
        s.parse().ok()
    }
}
