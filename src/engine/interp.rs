// FINISHLINE Frame Synthesizer
// Copyright (c) 2026 Xing_The_Creator | FINISHLINE
//
// Generates a frame at a fractional time position between two decoded frames.
// Two variants come out of one pass: a temporal cross-dissolve (blend) and a
// spatial extrapolation of frame A along the estimated motion vector (shift),
// which stays ghost-free at the cost of ignoring frame B's pixels.

use rayon::prelude::*;
use tracing::debug;

use super::motion::{self, MotionConfig};
use super::{format_key, EngineError, Frame, FrameRect, Motion, CHANNELS};

/// Output of [`interpolate`]: a tagged pair of optional variants rather than
/// a mode hierarchy. `shifted` is always produced; `blended` only when
/// requested.
#[derive(Debug, Clone)]
pub struct InterpResult {
    pub blended: Option<Frame>,
    pub shifted: Option<Frame>,
}

/// Synthesize the frame at fraction `pct` of the way from `frame_a` to
/// `frame_b` (`frame_a` precedes `frame_b`; `pct` in `[0, 1]`).
///
/// Fails outright on mismatched dimensions or malformed buffers; no partial
/// result is produced. Motion is estimated over `roi`; an invalid estimate degrades the
/// shifted variant to a plain copy of `frame_a`. The synthesizer does not
/// cache; callers insert the results where they see fit.
pub fn interpolate(
    frame_a: &Frame,
    frame_b: &Frame,
    pct: f64,
    roi: FrameRect,
    blend: bool,
    config: &MotionConfig,
) -> Result<InterpResult, EngineError> {
    if frame_a.width != frame_b.width || frame_a.height != frame_b.height {
        return Err(EngineError::DimensionMismatch(
            frame_a.width,
            frame_a.height,
            frame_b.width,
            frame_b.height,
        ));
    }
    for frame in [frame_a, frame_b] {
        if !frame.buffer_is_consistent() {
            return Err(EngineError::MalformedBuffer {
                expected: frame.expected_bytes(),
                actual: frame.data.len(),
            });
        }
    }

    let motion = motion::estimate(frame_a, frame_b, roi, config);

    let blended = blend.then(|| {
        let data = blend_buffers(&frame_a.data, &frame_b.data, frame_a.linesize as usize, pct);
        with_interp_metadata(frame_a, frame_b, pct, motion, data)
    });

    let shifted = {
        let (dx, dy) = if motion.valid {
            (
                (motion.x * pct).round() as i32,
                (motion.y * pct).round() as i32,
            )
        } else {
            (0, 0)
        };
        let data = shift_buffer(frame_a, dx, dy);
        Some(with_interp_metadata(frame_a, frame_b, pct, motion, data))
    };

    debug!(
        "[INTERP] {} pct {:.4} motion ({:.1}, {:.1}) valid {}",
        frame_a.file, pct, motion.x, motion.y, motion.valid
    );
    Ok(InterpResult { blended, shifted })
}

/// Build the output frame for either variant: interpolated temporal metadata,
/// copied source metadata, and the attached motion record.
fn with_interp_metadata(
    frame_a: &Frame,
    frame_b: &Frame,
    pct: f64,
    motion: Motion,
    data: Vec<u8>,
) -> Frame {
    let frame_num = lerp(frame_a.frame_num, frame_b.frame_num, pct);
    let mut out = Frame::new(
        &frame_a.file,
        frame_num,
        false,
        frame_a.width,
        frame_a.height,
        frame_a.linesize,
        data,
    );
    out.fps = frame_a.fps;
    out.num_frames = frame_a.num_frames;
    out.timestamp = lerp(frame_a.timestamp as f64, frame_b.timestamp as f64, pct).round() as u64;
    out.ts_micro = lerp(frame_a.ts_micro as f64, frame_b.ts_micro as f64, pct).round() as u64;
    out.motion = motion;
    out.key = format_key(&frame_a.file, frame_num, false);
    out
}

#[inline]
fn lerp(a: f64, b: f64, pct: f64) -> f64 {
    a + pct * (b - a)
}

/// Per-pixel, per-channel linear mix `(1-pct)·A + pct·B`. Exact at the
/// endpoints: pct 0 reproduces A byte-for-byte, pct 1 reproduces B.
fn blend_buffers(a: &[u8], b: &[u8], stride: usize, pct: f64) -> Vec<u8> {
    if pct <= 0.0 {
        return a.to_vec();
    }
    if pct >= 1.0 {
        return b.to_vec();
    }

    let mut out = vec![0u8; a.len()];
    out.par_chunks_mut(stride)
        .zip(a.par_chunks(stride).zip(b.par_chunks(stride)))
        .for_each(|(row_out, (row_a, row_b))| {
            for (o, (&pa, &pb)) in row_out.iter_mut().zip(row_a.iter().zip(row_b.iter())) {
                *o = ((1.0 - pct) * pa as f64 + pct * pb as f64).round() as u8;
            }
        });
    out
}

/// Copy `frame`'s pixels displaced by `(dx, dy)` whole pixels, replicating
/// edge pixels where the displaced sample falls outside the frame. A zero
/// displacement is a straight copy.
fn shift_buffer(frame: &Frame, dx: i32, dy: i32) -> Vec<u8> {
    if dx == 0 && dy == 0 {
        return frame.data.as_ref().clone();
    }

    let w = frame.width as i32;
    let h = frame.height as i32;
    let stride = frame.linesize as usize;
    let src = &frame.data;

    let mut out = vec![0u8; src.len()];
    out.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let sy = (y as i32 - dy).clamp(0, h - 1) as usize;
            for x in 0..w {
                let sx = (x - dx).clamp(0, w - 1) as usize;
                let si = sy * stride + sx * CHANNELS;
                let oi = x as usize * CHANNELS;
                row_out[oi..oi + CHANNELS].copy_from_slice(&src[si..si + CHANNELS]);
            }
        });
    out
}
