// FINISHLINE Engine Module
// Copyright (c) 2026 Xing_The_Creator | FINISHLINE
//
// Frame data model shared by the cache, the motion estimator and the
// synthesizer. A frame's pixel buffer is reference-counted so a caller and a
// cache entry can hold the same decoded data; the buffer is released when the
// last holder drops it.

pub mod cache;
pub mod interp;
pub mod motion;
pub mod sharpen;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytes per pixel of the working format (packed RGB24).
pub const CHANNELS: usize = 3;

/// Failure kinds surfaced by the engine. Motion ambiguity is deliberately not
/// here: an untrustworthy estimate is a value (`Motion::valid == false`), not
/// an error, so synthesis can degrade to the zero-displacement path.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("frame dimensions do not match: {0}x{1} vs {2}x{3}")]
    DimensionMismatch(u32, u32, u32, u32),

    #[error("pixel buffer inconsistent with declared geometry: {expected} bytes declared, {actual} present")]
    MalformedBuffer { expected: usize, actual: usize },

    #[error("decode failed for '{file}' frame {index}: {status}")]
    DecodeFailed {
        file: String,
        index: u32,
        status: String,
    },
}

/// Displacement estimated between two frames.
///
/// When `valid` is false the displacement values are meaningless and must not
/// be used for spatial shifting; callers fall back to zero displacement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    /// Horizontal displacement in pixels (frame A → frame B).
    pub x: f64,
    /// Vertical displacement in pixels.
    pub y: f64,
    /// Elapsed time between the two frames in microseconds.
    pub dt: u64,
    /// Whether the estimate is trustworthy enough to shift by.
    pub valid: bool,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            dt: 0,
            valid: false,
        }
    }
}

/// A rectangle in source-frame pixel coordinates (region of interest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FrameRect {
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// True if the rectangle lies fully inside a `frame_w` x `frame_h` frame.
    pub fn fits_within(&self, frame_w: u32, frame_h: u32) -> bool {
        !self.is_empty()
            && self.x >= 0
            && self.y >= 0
            && self.x + self.width <= frame_w as i32
            && self.y + self.height <= frame_h as i32
    }
}

/// Formats the canonical identity key for a frame: the source file and the
/// fractional position fixed to 6 decimal digits, with a `-z` suffix when the
/// frame is rendered zoomed. Every component that constructs or looks up a
/// frame identity goes through here, otherwise cache hits are impossible.
pub fn format_key(file: &str, frame_num: f64, has_zoom: bool) -> String {
    let z_str = if has_zoom { "-z" } else { "" };
    format!("{}-{:.6}{}", file, frame_num, z_str)
}

/// One decoded or synthesized video frame.
///
/// All fields except the pixel contents are immutable after construction; the
/// sharpening filter is the only component that rewrites pixels in place.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Fractional frame position (non-integer for synthesized frames).
    pub frame_num: f64,
    /// Total number of frames in the source file.
    pub num_frames: u32,
    /// Frames per second of the source file.
    pub fps: f64,
    /// Byte length of the pixel buffer.
    pub total_bytes: usize,
    /// Packed RGB24 pixels, shared between all holders of this frame.
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Row stride in bytes.
    pub linesize: u32,
    /// Timestamp in milliseconds.
    pub timestamp: u64,
    /// Timestamp in microseconds.
    pub ts_micro: u64,
    /// Source file this frame was decoded from.
    pub file: String,
    /// Motion record attached by the estimator (invalid until estimated).
    pub motion: Motion,
    /// Identity key: `format_key(file, frame_num, zoom)`.
    pub key: String,
}

impl Frame {
    /// Create a frame over an owned pixel buffer. Timing fields start at zero
    /// until [`Frame::set_timing`] derives them from the source frame rate.
    pub fn new(
        file: &str,
        frame_num: f64,
        has_zoom: bool,
        width: u32,
        height: u32,
        linesize: u32,
        data: Vec<u8>,
    ) -> Self {
        Self {
            frame_num,
            num_frames: 0,
            fps: 0.0,
            total_bytes: data.len(),
            data: Arc::new(data),
            width,
            height,
            linesize,
            timestamp: 0,
            ts_micro: 0,
            file: file.to_string(),
            motion: Motion::default(),
            key: format_key(file, frame_num, has_zoom),
        }
    }

    /// Fill in frame-rate metadata and derive both timestamps from the
    /// fractional position, keeping the millisecond and microsecond values
    /// consistent with each other.
    pub fn set_timing(&mut self, fps: f64, num_frames: u32) {
        self.fps = fps;
        self.num_frames = num_frames;
        if fps > 0.0 {
            self.ts_micro = (self.frame_num / fps * 1_000_000.0).round() as u64;
            self.timestamp = self.ts_micro / 1_000;
        }
    }

    /// Expected buffer length for the declared geometry.
    pub fn expected_bytes(&self) -> usize {
        self.linesize as usize * self.height as usize
    }

    /// Whether the pixel buffer is present and consistent with the declared
    /// width/height/stride. The stride must cover at least one full row.
    pub fn buffer_is_consistent(&self) -> bool {
        !self.data.is_empty()
            && self.linesize as usize >= self.width as usize * CHANNELS
            && self.data.len() == self.expected_bytes()
    }
}
