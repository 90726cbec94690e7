use std::sync::Arc;

use finishline_core::engine::cache::FrameCache;
use finishline_core::engine::{format_key, Frame};

fn frame_at(position: f64) -> Arc<Frame> {
    Arc::new(Frame::new(
        "race.mp4",
        position,
        false,
        4,
        4,
        12,
        vec![0; 48],
    ))
}

#[test]
fn test_thirty_three_adds_evict_the_first() {
    // Capacity 32, distinct keys 1..=33 inserted in order: key 1 is the
    // oldest and must be the one evicted.
    let mut cache = FrameCache::new(32);
    for n in 1..=33 {
        cache.add(frame_at(n as f64));
    }

    assert_eq!(cache.len(), 32);
    assert!(cache.get(&format_key("race.mp4", 1.0, false)).is_none());
    for n in 2..=33 {
        assert!(
            cache.get(&format_key("race.mp4", n as f64, false)).is_some(),
            "key {} should have survived",
            n
        );
    }
}

#[test]
fn test_update_refreshes_recency_without_growing() {
    let mut cache = FrameCache::new(32);
    for n in 1..=32 {
        cache.add(frame_at(n as f64));
    }

    // Re-inserting key 1 moves it to head; the next eviction victim is 2.
    cache.add(frame_at(1.0));
    assert_eq!(cache.len(), 32);

    cache.add(frame_at(33.0));
    assert!(cache.get(&format_key("race.mp4", 1.0, false)).is_some());
    assert!(cache.get(&format_key("race.mp4", 2.0, false)).is_none());
}

#[test]
fn test_reads_do_not_rescue_from_eviction() {
    // The cache promotes on add only. A frame read on every request but
    // never re-inserted still ages out.
    let mut cache = FrameCache::new(3);
    cache.add(frame_at(1.0));
    cache.add(frame_at(2.0));
    cache.add(frame_at(3.0));

    let key1 = format_key("race.mp4", 1.0, false);
    for _ in 0..10 {
        assert!(cache.get(&key1).is_some());
    }

    cache.add(frame_at(4.0));
    assert!(cache.get(&key1).is_none());
}

#[test]
fn test_shared_buffer_survives_eviction_for_holders() {
    // A caller holding a frame keeps its pixels alive after the cache
    // drops its own reference.
    let mut cache = FrameCache::new(1);
    let held = frame_at(1.0);
    cache.add(held.clone());
    cache.add(frame_at(2.0)); // evicts 1.0

    assert!(cache.get(&held.key).is_none());
    // The cache dropped its reference; ours is the last one standing and the
    // pixels are still readable through it.
    assert_eq!(Arc::strong_count(&held), 1);
    assert_eq!(held.data.len(), 48);
}
