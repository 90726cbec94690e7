// FINISHLINE Frame Reader
// Copyright (c) 2026 Xing_The_Creator | FINISHLINE
//
// Ties the engine together: key the request, probe the cache, decode the
// bounding integer frames, estimate motion over the calibration region,
// synthesize the fractional frame, sharpen, cache, return. One reader serves
// one logical viewer; the surrounding system serializes calls and uses
// `PendingRequest` to keep only the newest superseded request.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::decode::{DecodeStatus, FrameDecoder, VideoStreamInfo};
use crate::engine::cache::FrameCache;
use crate::engine::interp;
use crate::engine::motion::MotionConfig;
use crate::engine::sharpen::sharpen;
use crate::engine::{format_key, EngineError, Frame, FrameRect};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Where the finish line projects into frame pixel space, as resolved by the
/// external calibration collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Center x of the motion-estimation window (finish-line projection).
    pub x_position: i32,
    /// Pixels on either side of `x_position` to include in the window.
    pub pixel_range: i32,
    /// Top of the estimation window.
    pub roi_top: i32,
    /// Height of the estimation window (0 = full frame height).
    pub roi_height: i32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            x_position: 0,
            pixel_range: 64,
            roi_top: 0,
            roi_height: 0,
        }
    }
}

impl CalibrationConfig {
    /// Resolve the region of interest for a concrete frame, clamped to the
    /// frame bounds. A window that degenerates to nothing soft-fails in the
    /// estimator downstream.
    pub fn roi_for(&self, frame: &Frame) -> FrameRect {
        let w = frame.width as i32;
        let h = frame.height as i32;
        let x0 = (self.x_position - self.pixel_range).clamp(0, w);
        let x1 = (self.x_position + self.pixel_range).clamp(0, w);
        let y0 = self.roi_top.clamp(0, h);
        let y1 = if self.roi_height > 0 {
            (self.roi_top + self.roi_height).clamp(0, h)
        } else {
            h
        };
        FrameRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Sharpen synthesized frames to counter interpolation blur. Raw decodes
    /// are never sharpened.
    pub sharpen_interpolated: bool,
    /// Maximum number of cached frames.
    pub cache_capacity: usize,
    pub motion: MotionConfig,
    pub calibration: CalibrationConfig,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            sharpen_interpolated: true,
            cache_capacity: crate::engine::cache::DEFAULT_CAPACITY,
            motion: MotionConfig::default(),
            calibration: CalibrationConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pending request slot
// ─────────────────────────────────────────────────────────────────────────────

/// One frame request from the viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRequest {
    pub file: String,
    pub position: f64,
    pub has_zoom: bool,
    pub blend: bool,
}

/// At-most-one-outstanding holder: while a request is in flight, newly
/// arriving requests overwrite each other here and only the latest survives
/// to run next. Cancellation is the caller discarding a stale result.
#[derive(Default)]
pub struct PendingRequest {
    slot: Mutex<Option<FrameRequest>>,
}

impl PendingRequest {
    pub fn submit(&self, request: FrameRequest) {
        let mut slot = self.slot.lock().expect("pending slot poisoned");
        if let Some(old) = slot.replace(request) {
            debug!(
                "[READER] Superseded pending request {} @ {:.6}",
                old.file, old.position
            );
        }
    }

    pub fn take(&self) -> Option<FrameRequest> {
        self.slot.lock().expect("pending slot poisoned").take()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FrameReader
// ─────────────────────────────────────────────────────────────────────────────

pub struct FrameReader<D: FrameDecoder> {
    decoder: D,
    cache: FrameCache,
    config: ReaderConfig,
}

impl<D: FrameDecoder> FrameReader<D> {
    pub fn new(decoder: D, config: ReaderConfig) -> Self {
        let cache = FrameCache::new(config.cache_capacity);
        Self {
            decoder,
            cache,
            config,
        }
    }

    pub async fn open(&mut self, path: &str) -> Result<VideoStreamInfo> {
        match self.decoder.open_file(path).await {
            DecodeStatus::Ok => self
                .decoder
                .stream_info(path)
                .ok_or_else(|| anyhow!("decoder opened {} without stream info", path)),
            DecodeStatus::Failed(msg) => {
                Err(anyhow!(msg)).with_context(|| format!("opening {}", path))
            }
        }
    }

    pub async fn close(&mut self, path: &str) -> DecodeStatus {
        self.decoder.close_file(path).await
    }

    /// Fetch the frame at a (possibly fractional) position.
    ///
    /// Cache probe first; on a miss the two bounding integer frames are
    /// obtained (themselves cached under their integer keys), motion is
    /// estimated over the calibration window, the requested variant is
    /// synthesized and sharpened, and the result is cached before returning.
    /// `blend` selects the cross-dissolve variant; otherwise the shifted one.
    pub async fn frame_at(
        &mut self,
        file: &str,
        position: f64,
        has_zoom: bool,
        blend: bool,
    ) -> Result<Arc<Frame>, EngineError> {
        let key = format_key(file, position, has_zoom);
        if let Some(hit) = self.cache.get(&key) {
            debug!("[READER] Cache hit: {}", key);
            return Ok(hit);
        }

        let lower = position.floor();
        let upper = position.ceil();

        if lower == upper {
            let base = self.integer_frame(file, lower).await?;
            if !has_zoom {
                return Ok(base);
            }
            // Same pixels, separate identity for the zoomed render state.
            let mut zoomed = (*base).clone();
            zoomed.key = key;
            let zoomed = Arc::new(zoomed);
            self.cache.add(zoomed.clone());
            return Ok(zoomed);
        }

        let frame_a = self.integer_frame(file, lower).await?;
        let frame_b = self.integer_frame(file, upper).await?;

        let pct = position - lower;
        let roi = self.config.calibration.roi_for(&frame_a);
        let result = interp::interpolate(&frame_a, &frame_b, pct, roi, blend, &self.config.motion)?;

        let mut frame = if blend {
            result.blended.expect("blend variant requested")
        } else {
            result.shifted.expect("shift variant always produced")
        };

        if self.config.sharpen_interpolated {
            sharpen(&mut frame)?;
        }

        frame.key = key.clone();
        let frame = Arc::new(frame);
        self.cache.add(frame.clone());
        info!(
            "[READER] Synthesized {} (motion valid: {})",
            key, frame.motion.valid
        );
        Ok(frame)
    }

    /// Fetch a whole decoded frame, from cache when possible.
    async fn integer_frame(&mut self, file: &str, n: f64) -> Result<Arc<Frame>, EngineError> {
        let key = format_key(file, n, false);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let frame = Arc::new(self.decoder.get_frame(file, n as u32).await?);
        self.cache.add(frame.clone());
        Ok(frame)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_keys(&self) -> Vec<String> {
        self.cache.keys().iter().map(|k| k.to_string()).collect()
    }

    pub fn stream_info(&self, path: &str) -> Option<VideoStreamInfo> {
        self.decoder.stream_info(path)
    }
}
