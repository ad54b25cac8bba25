//! Record codec and end-to-end record benchmarks.
//!
//! Run: `cargo bench -p cipher-offload-core`
//!
//! This benchmarks:
//! - The decrypt-side padding check (constant in the padding value)
//! - Sealing one TLS 1.2 record through the software path and the
//!   in-process accelerator

use std::sync::Arc;

use cipher_offload::config::EngineConfig;
use cipher_offload::crypto::CbcImpl;
use cipher_offload::prelude::*;
use cipher_offload::record::{decrypt_framing, mac_and_padding_len};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const SIZES: [usize; 5] = [64, 256, 1024, 4096, 16384];

fn bench_padding_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/decrypt_framing");
    let cipher = CbcImpl::new(&[1u8; 16]).expect("key");
    let iv = [2u8; 16];

    for size in SIZES {
        // all zero: a valid one-byte padding
        let mut body = vec![0u8; size];
        cipher.encrypt_in_place(&iv, &mut body).expect("aligned");

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &body, |b, body| {
            b.iter(|| std::hint::black_box(decrypt_framing(&cipher, &iv, body, 20).ok()));
        });
    }
    group.finish();
}

fn record_ctx(accel: Arc<dyn Accelerator>, config: EngineConfig) -> ChainedCipherCtx {
    let id = ChainedCipherId::Aes128CbcHmacSha256;
    let thresholds = config.threshold_table().expect("config");
    let mut ctx = ChainedCipherCtx::new(id, accel, Box::new(CbcHmacSoftware::new()), thresholds, config);
    ctx.init(&[3u8; 16], None, Direction::Encrypt).expect("init");
    ctx.set_mac_key(b"bench mac key").expect("mac key");
    ctx
}

fn bench_seal(c: &mut Criterion) {
    let accel: Arc<dyn Accelerator> = Arc::new(SoftAccelerator::from_config(&EngineConfig::default()));
    let mut software = EngineConfig::default();
    for id in ChainedCipherId::ALL {
        software.thresholds.insert(id as u16, usize::MAX);
    }
    let offload = EngineConfig { small_packet_offload: true, ..EngineConfig::default() };

    for (name, config) in [("software", software), ("offload", offload)] {
        let mut group = c.benchmark_group(format!("record/seal/{}", name));
        let mut ctx = record_ctx(accel.clone(), config);

        for size in SIZES {
            let header = TlsHeader::new(0, 23, 0x0303, (16 + size) as u16);
            let record_len = 16 + size + mac_and_padding_len(size, 32);
            let input = vec![0x5Au8; record_len];
            let mut out = vec![0u8; record_len];

            group.throughput(Throughput::Bytes(size as u64));
            group.bench_function(BenchmarkId::from_parameter(size), |b| {
                b.iter(|| {
                    ctx.set_tls_aad(header.as_bytes()).expect("header");
                    std::hint::black_box(ctx.process(&mut out, &input).expect("seal"))
                });
            });
        }
        group.finish();
    }
}

criterion_group!(benches, bench_padding_check, bench_seal);
criterion_main!(benches);
