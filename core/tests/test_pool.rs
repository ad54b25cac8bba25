// Lane pool: growth, scrubbing and bounds.

#[cfg(test)]
mod tests {

use cipher_offload::constants::{HEADER_REGION_LEN, MAX_PIPELINES};
use cipher_offload::pipeline::LanePool;
use cipher_offload::types::ChainError;

#[test]
fn capacity_only_grows() {
    let mut pool = LanePool::new();
    assert_eq!(pool.capacity(), 0);
    pool.ensure_capacity(4).unwrap();
    assert_eq!(pool.capacity(), 4);
    pool.ensure_capacity(2).unwrap();
    assert_eq!(pool.capacity(), 4);
    pool.ensure_capacity(MAX_PIPELINES).unwrap();
    assert_eq!(pool.capacity(), MAX_PIPELINES);
}

#[test]
fn capacity_is_bounded() {
    let mut pool = LanePool::new();
    let err = pool.ensure_capacity(MAX_PIPELINES + 1).unwrap_err();
    assert!(matches!(err, ChainError::InvalidArgument(_)));
    assert_eq!(pool.capacity(), 0);
}

#[test]
fn peak_tracks_largest_use() {
    let mut pool = LanePool::new();
    pool.record_use(3);
    pool.record_use(1);
    assert_eq!(pool.peak(), 3);
    pool.clear();
    assert_eq!((pool.peak(), pool.capacity()), (0, 0));
}

#[test]
fn buffers_come_back_scrubbed() {
    let mut pool = LanePool::new();
    pool.ensure_capacity(2).unwrap();

    let mut buf = pool.take_buffer(1, 48).unwrap();
    assert_eq!(buf.len(), HEADER_REGION_LEN + 48);
    assert!(buf.iter().all(|b| *b == 0));
    buf.fill(0xEE);
    pool.restore(1, buf);

    let again = pool.take_buffer(1, 16).unwrap();
    assert_eq!(again.len(), HEADER_REGION_LEN + 16);
    assert!(again.iter().all(|b| *b == 0));
}

#[test]
fn lane_ivs_are_per_lane() {
    let mut pool = LanePool::new();
    pool.ensure_capacity(2).unwrap();
    *pool.iv_mut(0).unwrap() = [1u8; 16];
    assert_eq!(pool.iv_mut(1).unwrap(), &[0u8; 16]);
    assert_eq!(pool.iv_mut(0).unwrap(), &[1u8; 16]);
}

#[test]
fn lanes_beyond_capacity_are_invalid_state() {
    let mut pool = LanePool::new();
    pool.ensure_capacity(1).unwrap();
    assert!(matches!(pool.take_buffer(1, 16), Err(ChainError::InvalidState(_))));
    assert!(matches!(pool.iv_mut(3), Err(ChainError::InvalidState(_))));
}

}
