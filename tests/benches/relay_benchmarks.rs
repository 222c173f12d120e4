//! # Bitcoin Relay Benchmarks
//!
//! | Area              | Operation                                 |
//! |-------------------|-------------------------------------------|
//! | Stored headers    | `compute_chain` over a batch              |
//! | Calldata          | Submission encode / decode                |
//! | Merkle proofs     | Build and verify in large blocks          |
//! | Transactions      | Segwit parse + txid                       |

use btc_relay_sync::{
    build_merkle_proof, decode_submission, encode_submission, verify_merkle_proof, ForkId,
};
use btc_relay_types::{
    sha256d, BlockHash, BtcHeader, BtcTransaction, StoredHeader, TxInput, TxOutput, Txid, H256,
    U256,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn headers(n: u32) -> Vec<BtcHeader> {
    (0..n)
        .map(|i| BtcHeader {
            version: 0x2000_0000,
            prev_block_hash: BlockHash::ZERO,
            merkle_root: sha256d(&i.to_le_bytes()),
            timestamp: 1_700_000_000 + i * 600,
            nbits: 0x207f_ffff,
            nonce: i,
        })
        .collect()
}

fn anchor() -> StoredHeader {
    let header = headers(1)[0];
    StoredHeader::new(header, U256::from(2u64), 0, header.timestamp, [header.timestamp; 10])
}

fn bench_compute_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("stored-headers");
    let from = anchor();
    for size in [10u32, 100, 2016] {
        let batch = headers(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("compute_chain", size), &batch, |b, batch| {
            b.iter(|| black_box(from.compute_chain(batch)))
        });
    }
    group.finish();
}

fn bench_calldata(c: &mut Criterion) {
    let mut group = c.benchmark_group("calldata");
    let from = anchor();
    let batch = headers(100);
    group.bench_function("encode_long_fork_100", |b| {
        b.iter(|| black_box(encode_submission(ForkId::LongFork(7), &from, &batch)))
    });
    let Ok(data) = encode_submission(ForkId::LongFork(7), &from, &batch) else {
        return;
    };
    group.bench_function("decode_long_fork_100", |b| {
        b.iter(|| black_box(decode_submission(&data)))
    });
    group.finish();
}

fn bench_merkle(c: &mut Criterion) {
    let mut group = c.benchmark_group("merkle");
    for size in [16usize, 1_000, 4_000] {
        let txids: Vec<H256> = (0..size as u32).map(|i| sha256d(&i.to_be_bytes())).collect();
        let index = size / 2;
        group.bench_with_input(BenchmarkId::new("build", size), &txids, |b, txids| {
            b.iter(|| black_box(build_merkle_proof(txids, index)))
        });

        let Ok(proof) = build_merkle_proof(&txids, index) else {
            continue;
        };
        let root = btc_relay_sync::compute_merkle_root(&txids);
        group.bench_with_input(BenchmarkId::new("verify", size), &proof, |b, proof| {
            b.iter(|| black_box(verify_merkle_proof(&txids[index], proof, &root)))
        });
    }
    group.finish();
}

fn bench_tx_parse(c: &mut Criterion) {
    let tx = BtcTransaction {
        version: 2,
        inputs: (0..4)
            .map(|i| TxInput {
                prev_txid: Txid::from_raw([i; 32]),
                prev_vout: u32::from(i),
                script_sig: Vec::new(),
                sequence: u32::MAX,
                witness: vec![vec![0x30; 72], vec![0x02; 33]],
            })
            .collect(),
        outputs: vec![
            TxOutput {
                value: 10_000,
                script_pubkey: vec![0x00, 0x14, 0x01],
            };
            3
        ],
        lock_time: 0,
    };
    let raw = tx.serialize();
    c.bench_function("tx_parse_segwit_txid", |b| {
        b.iter(|| black_box(BtcTransaction::parse(&raw).map(|tx| tx.txid())))
    });
}

criterion_group!(benches, bench_compute_chain, bench_calldata, bench_merkle, bench_tx_parse);
criterion_main!(benches);
