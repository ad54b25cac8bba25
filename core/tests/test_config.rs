// Engine configuration and the small-packet threshold table.
//
// * JSON loading with defaults and validation
// * per-cipher thresholds shared between contexts
// * records routed to software at or below the threshold

mod common;

#[cfg(test)]
mod tests {

use std::sync::Arc;
use std::thread;

use cipher_offload::config::{ConfigError, EngineConfig, ThresholdTable};
use cipher_offload::constants::{MAX_PIPELINES, SMALL_PACKET_THRESHOLD_DEFAULT};
use cipher_offload::fallback::CbcHmacSoftware;
use cipher_offload::context::ChainedCipherCtx;
use cipher_offload::pipeline::WaitStrategy;
use cipher_offload::registry::{ChainedCipherId, Direction};

use crate::common::*;

// ----------------------------------------------------------------------
// EngineConfig
// ----------------------------------------------------------------------

#[test]
fn defaults() {
    let cfg = EngineConfig::default();
    assert_eq!(cfg.max_pipelines, MAX_PIPELINES);
    assert_eq!(cfg.wait_strategy, WaitStrategy::Park);
    assert!(!cfg.small_packet_offload);
    assert!(cfg.thresholds.is_empty());
    cfg.validate().unwrap();
}

#[test]
fn json_fills_missing_fields_with_defaults() {
    let cfg = EngineConfig::from_json(r#"{ "max_pipelines": 8, "thresholds": { "2": 512 } }"#).unwrap();
    assert_eq!(cfg.max_pipelines, 8);
    assert_eq!(cfg.wait_strategy, WaitStrategy::Park);
    assert_eq!(cfg.thresholds.get(&2), Some(&512));

    let back = EngineConfig::from_json(&cfg.to_json().unwrap()).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn json_selects_wait_strategy() {
    let cfg = EngineConfig::from_json(r#"{ "wait_strategy": "SpinYield", "small_packet_offload": true }"#).unwrap();
    assert_eq!(cfg.wait_strategy, WaitStrategy::SpinYield);
    assert!(cfg.small_packet_offload);
}

#[test]
fn invalid_configs_are_rejected() {
    assert!(matches!(EngineConfig::from_json("{ nope"), Err(ConfigError::Parse(_))));
    assert!(matches!(
        EngineConfig::from_json(r#"{ "max_pipelines": 0 }"#),
        Err(ConfigError::LaneLimit(0))
    ));
    assert!(matches!(
        EngineConfig::from_json(r#"{ "max_pipelines": 33 }"#),
        Err(ConfigError::LaneLimit(33))
    ));
    let err = EngineConfig::from_json(r#"{ "thresholds": { "9": 1 } }"#).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownCipher(9)));
    assert!(err.to_string().contains("0x0009"));
}

// ----------------------------------------------------------------------
// ThresholdTable
// ----------------------------------------------------------------------

#[test]
fn table_starts_at_default_for_every_cipher() {
    let table = ThresholdTable::new();
    for id in ChainedCipherId::ALL {
        assert_eq!(table.get(id), SMALL_PACKET_THRESHOLD_DEFAULT);
    }
}

#[test]
fn set_and_reset() {
    let table = ThresholdTable::new();
    table.set(ChainedCipherId::Aes256CbcHmacSha1, 0);
    assert_eq!(table.get(ChainedCipherId::Aes256CbcHmacSha1), 0);
    assert_eq!(table.get(ChainedCipherId::Aes128CbcHmacSha1), SMALL_PACKET_THRESHOLD_DEFAULT);
    table.reset(ChainedCipherId::Aes256CbcHmacSha1);
    assert_eq!(table.get(ChainedCipherId::Aes256CbcHmacSha1), SMALL_PACKET_THRESHOLD_DEFAULT);
}

#[test]
fn config_overrides_seed_the_table() {
    let mut cfg = EngineConfig::default();
    cfg.thresholds.insert(ChainedCipherId::Aes128CbcHmacSha256 as u16, 100);
    let table = cfg.threshold_table().unwrap();
    assert_eq!(table.get(ChainedCipherId::Aes128CbcHmacSha256), 100);
    assert_eq!(table.get(ChainedCipherId::Aes128CbcHmacSha1), SMALL_PACKET_THRESHOLD_DEFAULT);
}

#[test]
fn concurrent_readers_and_writers() {
    let table = Arc::new(ThresholdTable::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let t = table.clone();
            thread::spawn(move || {
                for n in 0..1000 {
                    let id = ChainedCipherId::ALL[(i + n) % 4];
                    if i % 2 == 0 {
                        t.set(id, n);
                    } else {
                        assert!(t.get(id) <= SMALL_PACKET_THRESHOLD_DEFAULT);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

// ----------------------------------------------------------------------
// Routing
// ----------------------------------------------------------------------

#[test]
fn records_at_or_below_threshold_stay_in_software() {
    init_tracing();
    let id = ChainedCipherId::Aes128CbcHmacSha1;
    let accel = Arc::new(ScriptedAccelerator::new());
    let table = Arc::new(ThresholdTable::new());
    table.set(id, 256);

    let mut ctx = ChainedCipherCtx::new(
        id,
        accel.clone(),
        Box::new(CbcHmacSoftware::new()),
        table.clone(),
        EngineConfig::default(),
    );
    ctx.init(&cipher_key(id), Some(&CHAIN_IV), Direction::Encrypt).unwrap();
    ctx.set_mac_key(MAC_KEY).unwrap();

    let mut out = vec![0u8; 512];
    ctx.process(&mut out[..256], &[1u8; 256]).unwrap();
    assert_eq!(accel.submits(), 0);
    ctx.process(&mut out[..272], &[1u8; 272]).unwrap();
    assert_eq!(accel.submits(), 1);

    // the table is live: lowering the threshold moves records immediately
    table.set(id, 0);
    ctx.process(&mut out[..16], &[1u8; 16]).unwrap();
    assert_eq!(accel.submits(), 2);

    let c = ctx.counters();
    assert_eq!((c.records_fallback, c.records_offloaded), (1, 2));
}

#[test]
fn small_packet_offload_bypasses_the_table() {
    let accel = Arc::new(ScriptedAccelerator::new());
    let mut ctx = context(ChainedCipherId::Aes256CbcHmacSha256, Direction::Encrypt, accel.clone(), offload_config());
    let mut out = [0u8; 32];
    ctx.process(&mut out, &[0u8; 32]).unwrap();
    assert_eq!(accel.submits(), 1);
}

}
