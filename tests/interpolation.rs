use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use finishline_core::decode::{DecodeStatus, FrameDecoder, VideoStreamInfo};
use finishline_core::engine::interp::interpolate;
use finishline_core::engine::motion::MotionConfig;
use finishline_core::engine::sharpen::sharpen;
use finishline_core::engine::{EngineError, Frame, FrameRect, CHANNELS};
use finishline_core::reader::{CalibrationConfig, FrameReader, ReaderConfig};

const W: u32 = 64;
const H: u32 = 48;

/// Aperiodic grayscale texture; a translated copy matches at one offset only.
fn texel(x: i32, y: i32) -> u8 {
    let x = x.rem_euclid(512);
    let y = y.rem_euclid(512);
    ((x * 37 + y * 91 + (x * x).rem_euclid(97) * 13 + (y * y).rem_euclid(89) * 7) % 251) as u8
}

/// A frame whose content is the base texture shifted `shift_x` pixels right,
/// with timing derived from a 100 fps source.
fn textured_frame(position: f64, shift_x: i32) -> Frame {
    let mut data = vec![0u8; (W * H) as usize * CHANNELS];
    for y in 0..H as i32 {
        for x in 0..W as i32 {
            let i = (y as i32 * W as i32 + x) as usize * CHANNELS;
            let v = texel(x - shift_x, y);
            data[i] = v;
            data[i + 1] = v;
            data[i + 2] = v;
        }
    }
    let mut frame = Frame::new("race.mp4", position, false, W, H, W * CHANNELS as u32, data);
    frame.set_timing(100.0, 1000);
    frame
}

fn center_roi() -> FrameRect {
    FrameRect {
        x: 20,
        y: 16,
        width: 24,
        height: 16,
    }
}

// ─── Synthesizer ─────────────────────────────────────────────────────────────

#[test]
fn test_blend_endpoints_are_exact() {
    let a = textured_frame(10.0, 0);
    let b = textured_frame(11.0, 5);

    let at_a = interpolate(&a, &b, 0.0, center_roi(), true, &MotionConfig::default()).unwrap();
    assert_eq!(*at_a.blended.unwrap().data, *a.data);

    let at_b = interpolate(&a, &b, 1.0, center_roi(), true, &MotionConfig::default()).unwrap();
    assert_eq!(*at_b.blended.unwrap().data, *b.data);
}

#[test]
fn test_interpolated_timestamps_and_position() {
    let mut a = textured_frame(10.0, 0);
    let mut b = textured_frame(11.0, 0);
    // A at 1000 ms, B at 1100 ms.
    a.timestamp = 1000;
    a.ts_micro = 1_000_000;
    b.timestamp = 1100;
    b.ts_micro = 1_100_000;

    let result = interpolate(&a, &b, 0.5, center_roi(), true, &MotionConfig::default()).unwrap();
    let blended = result.blended.unwrap();
    assert_eq!(blended.timestamp, 1050);
    assert_eq!(blended.ts_micro, 1_050_000);
    assert_eq!(blended.frame_num, 10.5);
    assert_eq!(blended.fps, a.fps);
    assert_eq!(blended.num_frames, a.num_frames);
    assert_eq!(blended.key, "race.mp4-10.500000");
}

#[test]
fn test_dimension_mismatch_fails_with_no_frames() {
    let a = textured_frame(10.0, 0);
    let mut data = vec![0u8; (32 * H) as usize * CHANNELS];
    data.fill(7);
    let b = Frame::new("race.mp4", 11.0, false, 32, H, 32 * CHANNELS as u32, data);

    let result = interpolate(&a, &b, 0.5, center_roi(), true, &MotionConfig::default());
    assert!(matches!(result, Err(EngineError::DimensionMismatch(..))));
}

#[test]
fn test_shifted_frame_follows_motion() {
    // Content moves 6 px right between A and B; at pct 0.5 the shifted
    // variant displaces A by 3 px. Away from the borders it must equal the
    // texture at half displacement.
    let a = textured_frame(10.0, 0);
    let b = textured_frame(11.0, 6);

    let result = interpolate(&a, &b, 0.5, center_roi(), false, &MotionConfig::default()).unwrap();
    let shifted = result.shifted.unwrap();
    assert!(shifted.motion.valid);
    assert_eq!(shifted.motion.x, 6.0);

    for y in 10..(H as i32 - 10) {
        for x in 10..(W as i32 - 10) {
            let i = (y * W as i32 + x) as usize * CHANNELS;
            assert_eq!(
                shifted.data[i],
                texel(x - 3, y),
                "pixel ({}, {}) should come from 3 px left",
                x,
                y
            );
        }
    }
}

#[test]
fn test_invalid_motion_degrades_shift_to_copy() {
    let a = textured_frame(10.0, 0);
    let b = textured_frame(11.0, 6);

    // An empty region gives the estimator nothing to work with; the
    // displacement must be ignored no matter the pct.
    let empty_roi = FrameRect {
        x: 20,
        y: 16,
        width: 0,
        height: 16,
    };
    for pct in [0.1, 0.5, 0.9] {
        let result = interpolate(&a, &b, pct, empty_roi, false, &MotionConfig::default()).unwrap();
        let shifted = result.shifted.unwrap();
        assert!(!shifted.motion.valid);
        assert_eq!(*shifted.data, *a.data, "pct {} should copy A", pct);
    }
}

#[test]
fn test_sharpen_twice_diverges_from_once() {
    let result = interpolate(
        &textured_frame(10.0, 0),
        &textured_frame(11.0, 2),
        0.5,
        center_roi(),
        true,
        &MotionConfig::default(),
    )
    .unwrap();

    let mut once = result.blended.unwrap();
    let mut twice = once.clone();
    sharpen(&mut once).unwrap();
    sharpen(&mut twice).unwrap();
    sharpen(&mut twice).unwrap();
    assert_ne!(*once.data, *twice.data);
}

// ─── Reader end-to-end ───────────────────────────────────────────────────────

/// Decoder serving synthetic textured frames, with per-call accounting.
struct SyntheticDecoder {
    decoded: Arc<AtomicU32>,
    fail: bool,
}

impl FrameDecoder for SyntheticDecoder {
    async fn open_file(&mut self, _path: &str) -> DecodeStatus {
        DecodeStatus::Ok
    }

    async fn close_file(&mut self, _path: &str) -> DecodeStatus {
        DecodeStatus::Ok
    }

    async fn get_frame(&mut self, path: &str, index: u32) -> Result<Frame, EngineError> {
        if self.fail {
            return Err(EngineError::DecodeFailed {
                file: path.to_string(),
                index,
                status: "synthetic failure".to_string(),
            });
        }
        self.decoded.fetch_add(1, Ordering::SeqCst);
        // Each frame advances the content by 2 px.
        Ok(textured_frame(index as f64, index as i32 * 2))
    }

    fn stream_info(&self, _path: &str) -> Option<VideoStreamInfo> {
        Some(VideoStreamInfo {
            width: W,
            height: H,
            fps: 100.0,
            num_frames: 1000,
        })
    }
}

fn test_reader(fail: bool) -> (FrameReader<SyntheticDecoder>, Arc<AtomicU32>) {
    let decoded = Arc::new(AtomicU32::new(0));
    let decoder = SyntheticDecoder {
        decoded: decoded.clone(),
        fail,
    };
    let config = ReaderConfig {
        sharpen_interpolated: false,
        calibration: CalibrationConfig {
            x_position: W as i32 / 2,
            pixel_range: 12,
            roi_top: 16,
            roi_height: 16,
        },
        ..ReaderConfig::default()
    };
    (FrameReader::new(decoder, config), decoded)
}

#[tokio::test]
async fn test_integer_request_decodes_once_then_hits_cache() {
    let (mut reader, decoded) = test_reader(false);

    let first = reader.frame_at("race.mp4", 3.0, false, true).await.unwrap();
    assert_eq!(decoded.load(Ordering::SeqCst), 1);

    let second = reader.frame_at("race.mp4", 3.0, false, true).await.unwrap();
    assert_eq!(decoded.load(Ordering::SeqCst), 1, "second fetch is a cache hit");
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_fractional_request_synthesizes_and_caches() {
    let (mut reader, decoded) = test_reader(false);

    let frame = reader.frame_at("race.mp4", 3.5, false, true).await.unwrap();
    // Bounding frames 3 and 4 were decoded, once each.
    assert_eq!(decoded.load(Ordering::SeqCst), 2);
    assert_eq!(frame.frame_num, 3.5);
    assert_eq!(frame.key, "race.mp4-3.500000");
    // Frame 3 is at 30 ms, frame 4 at 40 ms.
    assert_eq!(frame.timestamp, 35);
    assert!(frame.motion.valid, "uniform 2 px/frame pan should be tracked");
    assert_eq!(frame.motion.x, 2.0);

    // The synthesized frame and both bounding frames are now cached.
    assert_eq!(reader.cache_len(), 3);
    reader.frame_at("race.mp4", 3.5, false, true).await.unwrap();
    assert_eq!(decoded.load(Ordering::SeqCst), 2, "re-request hits the cache");
}

#[tokio::test]
async fn test_zoomed_and_plain_requests_are_distinct_entries() {
    let (mut reader, _) = test_reader(false);

    let plain = reader.frame_at("race.mp4", 3.0, false, true).await.unwrap();
    let zoomed = reader.frame_at("race.mp4", 3.0, true, true).await.unwrap();
    assert_ne!(plain.key, zoomed.key);
    assert_eq!(zoomed.key, "race.mp4-3.000000-z");
    assert_eq!(reader.cache_len(), 2);
}

#[tokio::test]
async fn test_decode_failure_aborts_request() {
    let (mut reader, _) = test_reader(true);

    let result = reader.frame_at("race.mp4", 3.5, false, true).await;
    assert!(matches!(result, Err(EngineError::DecodeFailed { .. })));
    assert_eq!(reader.cache_len(), 0, "no partial result is cached");
}
