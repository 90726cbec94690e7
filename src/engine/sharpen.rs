// FINISHLINE Sharpening Filter
// Copyright (c) 2026 Xing_The_Creator | FINISHLINE

use rayon::prelude::*;
use std::sync::Arc;

use super::{EngineError, Frame, CHANNELS};

/// 3x3 edge-enhancement kernel, applied per channel. Not a converging
/// operator: every application increases edge contrast further.
const KERNEL_CENTER: i32 = 5;
const KERNEL_CROSS: i32 = -1;

/// Sharpen the frame's pixel buffer in place. Border pixels sample their
/// clamped neighbors. Fails without modifying anything when the buffer is
/// absent or inconsistent with the declared geometry.
///
/// Callers sharpen a frame before sharing it into the cache; on a frame whose
/// buffer is already shared this falls back to copy-on-write.
pub fn sharpen(frame: &mut Frame) -> Result<(), EngineError> {
    if !frame.buffer_is_consistent() {
        return Err(EngineError::MalformedBuffer {
            expected: frame.expected_bytes(),
            actual: frame.data.len(),
        });
    }

    let w = frame.width as i32;
    let h = frame.height as i32;
    let stride = frame.linesize as usize;

    // The convolution reads original values while writing new ones, so the
    // source must be snapshotted up front.
    let src: Vec<u8> = frame.data.as_ref().clone();
    let dst = Arc::make_mut(&mut frame.data);

    dst.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        let y = y as i32;
        let up = (y - 1).max(0) as usize * stride;
        let down = (y + 1).min(h - 1) as usize * stride;
        let here = y as usize * stride;

        for x in 0..w {
            let left = (x - 1).max(0) as usize * CHANNELS;
            let right = (x + 1).min(w - 1) as usize * CHANNELS;
            let center = x as usize * CHANNELS;

            for c in 0..CHANNELS {
                let acc = KERNEL_CENTER * src[here + center + c] as i32
                    + KERNEL_CROSS
                        * (src[up + center + c] as i32
                            + src[down + center + c] as i32
                            + src[here + left + c] as i32
                            + src[here + right + c] as i32);
                row[center + c] = acc.clamp(0, 255) as u8;
            }
        }
    });

    Ok(())
}
