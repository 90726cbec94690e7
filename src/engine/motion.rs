// FINISHLINE Motion Estimator
// Copyright (c) 2026 Xing_The_Creator | FINISHLINE
//
// Block-matching displacement search between two frames, confined to the
// calibration region of interest. Candidate offsets are scored by mean
// absolute luminance difference; a small magnitude penalty makes zero
// displacement win exact ties, and a distinctness guard downgrades ambiguous
// minima to an invalid estimate instead of returning a wild vector.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Frame, FrameRect, Motion, CHANNELS};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Search range in pixels on either side of zero, per axis.
    pub search_range: i32,
    /// Cost added per pixel of offset magnitude, in luminance units. Breaks
    /// ties toward zero displacement.
    pub magnitude_penalty: f64,
    /// Minimum mean-luminance-difference gap between the winning offset and
    /// the best non-adjacent runner-up for the estimate to count as valid.
    pub ambiguity_margin: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            search_range: 16,
            magnitude_penalty: 0.05,
            ambiguity_margin: 0.75,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Estimation
// ─────────────────────────────────────────────────────────────────────────────

/// Estimate the displacement of the content inside `roi` from `frame_a` to
/// `frame_b`.
///
/// Soft-fail contract: dimension mismatch, an unusable region or an ambiguous
/// minimum all produce `Motion { valid: false }` with zero displacement, never
/// an error, so synthesis can degrade gracefully. `dt` is always the absolute
/// microsecond timestamp difference. Two identical frames yield zero
/// displacement with `valid == true`.
pub fn estimate(frame_a: &Frame, frame_b: &Frame, roi: FrameRect, config: &MotionConfig) -> Motion {
    let dt = frame_b.ts_micro.abs_diff(frame_a.ts_micro);
    let invalid = Motion {
        x: 0.0,
        y: 0.0,
        dt,
        valid: false,
    };

    if frame_a.width != frame_b.width || frame_a.height != frame_b.height {
        debug!(
            "[MOTION] Dimension mismatch: {}x{} vs {}x{}",
            frame_a.width, frame_a.height, frame_b.width, frame_b.height
        );
        return invalid;
    }
    if !frame_a.buffer_is_consistent() || !frame_b.buffer_is_consistent() {
        return invalid;
    }
    if !roi.fits_within(frame_a.width, frame_a.height) {
        debug!("[MOTION] ROI {:?} outside frame bounds", roi);
        return invalid;
    }

    // Score every candidate offset whose shifted region still lies fully
    // inside the frame. Full overlap keeps the scores comparable.
    let range = config.search_range.max(0);
    let mut candidates: Vec<(i32, i32, f64)> = Vec::new();
    for dy in -range..=range {
        for dx in -range..=range {
            let shifted = FrameRect {
                x: roi.x + dx,
                y: roi.y + dy,
                width: roi.width,
                height: roi.height,
            };
            if !shifted.fits_within(frame_b.width, frame_b.height) {
                continue;
            }
            let mad = region_mad(frame_a, frame_b, roi, dx, dy);
            candidates.push((dx, dy, mad));
        }
    }

    // (0, 0) is always a candidate here: the ROI bounds were checked above.
    let (best_dx, best_dy, best_mad) = candidates
        .iter()
        .copied()
        .min_by(|a, b| {
            let ca = a.2 + config.magnitude_penalty * (a.0.abs() + a.1.abs()) as f64;
            let cb = b.2 + config.magnitude_penalty * (b.0.abs() + b.1.abs()) as f64;
            ca.total_cmp(&cb)
        })
        .expect("candidate set contains the zero offset");

    // A perfect match is unambiguous by definition; this is what keeps
    // identical frames valid even on featureless content.
    if best_mad > f64::EPSILON {
        // Offsets adjacent to the winner naturally score close and do not
        // count as competing interpretations.
        let runner_up = candidates
            .iter()
            .filter(|(dx, dy, _)| (dx - best_dx).abs().max((dy - best_dy).abs()) > 1)
            .map(|&(_, _, mad)| mad)
            .min_by(f64::total_cmp);

        if let Some(runner_up) = runner_up {
            if runner_up - best_mad < config.ambiguity_margin {
                debug!(
                    "[MOTION] Ambiguous minimum: best {:.3} vs runner-up {:.3}",
                    best_mad, runner_up
                );
                return invalid;
            }
        }
    }

    debug!(
        "[MOTION] Displacement ({}, {}) mad {:.3} dt {}us",
        best_dx, best_dy, best_mad, dt
    );
    Motion {
        x: best_dx as f64,
        y: best_dy as f64,
        dt,
        valid: true,
    }
}

/// Mean absolute luminance difference between the ROI in `frame_a` and the
/// same region offset by `(dx, dy)` in `frame_b`. The caller guarantees both
/// regions are in bounds.
fn region_mad(frame_a: &Frame, frame_b: &Frame, roi: FrameRect, dx: i32, dy: i32) -> f64 {
    let stride_a = frame_a.linesize as usize;
    let stride_b = frame_b.linesize as usize;
    let mut total: u64 = 0;

    for row in 0..roi.height {
        let ya = (roi.y + row) as usize;
        let yb = (roi.y + row + dy) as usize;
        let mut ia = ya * stride_a + roi.x as usize * CHANNELS;
        let mut ib = yb * stride_b + (roi.x + dx) as usize * CHANNELS;
        for _ in 0..roi.width {
            let la = luma(&frame_a.data[ia..ia + 3]);
            let lb = luma(&frame_b.data[ib..ib + 3]);
            total += la.abs_diff(lb) as u64;
            ia += CHANNELS;
            ib += CHANNELS;
        }
    }

    total as f64 / (roi.width as f64 * roi.height as f64)
}

/// Integer Rec.601 luminance approximation.
#[inline]
fn luma(px: &[u8]) -> u32 {
    ((px[0] as u32 * 77) + (px[1] as u32 * 150) + (px[2] as u32 * 29)) >> 8
}
