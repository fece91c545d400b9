// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Benchmarks for the wallet engine.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Single-threaded deposits, withdrawals, and transfers
//! - Optimistic-retry throughput under rayon contention
//! - Scaling with number of wallets

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use vpay_ledger_rs::{AccountId, CurrencyCode, Engine, LedgerConfig, LedgerError, WalletId};

// =============================================================================
// Helper Functions
// =============================================================================

fn new_engine() -> Engine {
    let usd = CurrencyCode::new("USD").unwrap();
    Engine::new(LedgerConfig::new(vec![usd]).unwrap())
}

fn account(i: usize) -> AccountId {
    AccountId::new(format!("account-{i}"))
}

fn one() -> Decimal {
    Decimal::new(100, 2)
}

/// Deposit with the optimistic retry loop a real caller would use.
fn deposit_with_retry(engine: &Engine, wallet_id: WalletId, amount: Decimal) {
    loop {
        let snapshot = engine.wallet(&wallet_id).unwrap();
        match engine.deposit(&snapshot, amount, None, None, None) {
            Ok(_) => return,
            Err(LedgerError::ConcurrentUpdate) => continue,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}

// =============================================================================
// Single-Threaded Benchmarks
// =============================================================================

fn bench_single_deposit(c: &mut Criterion) {
    c.bench_function("single_deposit", |b| {
        b.iter(|| {
            let engine = new_engine();
            let wallet = engine.get_or_create_wallet(&account(1), None).unwrap();
            engine
                .deposit(black_box(&wallet), one(), None, None, None)
                .unwrap();
        })
    });
}

fn bench_single_withdrawal(c: &mut Criterion) {
    c.bench_function("single_withdrawal", |b| {
        b.iter(|| {
            let engine = new_engine();
            let wallet = engine.get_or_create_wallet(&account(1), None).unwrap();
            engine.deposit(&wallet, one(), None, None, None).unwrap();
            let wallet = engine.wallet(&wallet.id).unwrap();
            engine
                .withdraw(black_box(&wallet), one(), None, None, None)
                .unwrap();
        })
    });
}

fn bench_single_transfer(c: &mut Criterion) {
    c.bench_function("single_transfer", |b| {
        b.iter(|| {
            let engine = new_engine();
            let sender = engine.get_or_create_wallet(&account(1), None).unwrap();
            let receiver = engine.get_or_create_wallet(&account(2), None).unwrap();
            engine.deposit(&sender, one(), None, None, None).unwrap();
            let sender = engine.wallet(&sender.id).unwrap();
            engine
                .transfer(black_box(&sender), &receiver, one(), None, None)
                .unwrap();
        })
    });
}

fn bench_deposit_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("deposit_throughput");

    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let engine = new_engine();
                let wallet = engine.get_or_create_wallet(&account(1), None).unwrap();
                let wallet_id = wallet.id;
                for _ in 0..count {
                    let snapshot = engine.wallet(&wallet_id).unwrap();
                    engine.deposit(&snapshot, one(), None, None, None).unwrap();
                }
                black_box(&engine);
            })
        });
    }
    group.finish();
}

fn bench_transfer_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("transfer_throughput");

    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let engine = new_engine();
                let sender = engine.get_or_create_wallet(&account(1), None).unwrap();
                let receiver = engine.get_or_create_wallet(&account(2), None).unwrap();
                engine
                    .deposit(&sender, Decimal::from(count as u32), None, None, None)
                    .unwrap();
                for _ in 0..count {
                    let sender = engine.wallet(&sender.id).unwrap();
                    let receiver = engine.wallet(&receiver.id).unwrap();
                    engine
                        .transfer(&sender, &receiver, one(), None, None)
                        .unwrap();
                }
                black_box(&engine);
            })
        });
    }
    group.finish();
}

// =============================================================================
// Multi-Threaded Benchmarks
// =============================================================================

fn bench_parallel_deposits_same_wallet(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_deposits_same_wallet");

    for count in [1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let engine = Arc::new(new_engine());
                let wallet = engine.get_or_create_wallet(&account(1), None).unwrap();

                (0..count).into_par_iter().for_each(|_| {
                    deposit_with_retry(&engine, wallet.id, one());
                });

                black_box(&engine);
            })
        });
    }
    group.finish();
}

fn bench_parallel_deposits_different_wallets(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_deposits_different_wallets");

    for count in [1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let engine = Arc::new(new_engine());

                (0..count as usize).into_par_iter().for_each(|i| {
                    // Spread across 1000 wallets.
                    let wallet = engine
                        .get_or_create_wallet(&account(i % 1_000), None)
                        .unwrap();
                    deposit_with_retry(&engine, wallet.id, one());
                });

                black_box(&engine);
            })
        });
    }
    group.finish();
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");
    let total_ops = 10_000usize;

    // Fewer wallets means more version conflicts and more retries.
    for num_wallets in [1usize, 10, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(total_ops as u64));
        group.bench_with_input(
            BenchmarkId::new("wallets", num_wallets),
            num_wallets,
            |b, &num_wallets| {
                b.iter(|| {
                    let engine = Arc::new(new_engine());

                    (0..total_ops).into_par_iter().for_each(|i| {
                        let wallet = engine
                            .get_or_create_wallet(&account(i % num_wallets), None)
                            .unwrap();
                        deposit_with_retry(&engine, wallet.id, one());
                    });

                    black_box(&engine);
                })
            },
        );
    }
    group.finish();
}

// =============================================================================
// Scaling Benchmarks
// =============================================================================

fn bench_wallet_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("wallet_creation");

    for count in [100usize, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let engine = new_engine();
                for i in 0..count {
                    engine.get_or_create_wallet(&account(i), None).unwrap();
                }
                black_box(&engine);
            })
        });
    }
    group.finish();
}

fn bench_transaction_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("transaction_history");

    // How commit latency changes as per-wallet history grows.
    for history_size in [100, 1_000, 10_000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(history_size),
            history_size,
            |b, &history_size| {
                b.iter_batched(
                    || {
                        let engine = new_engine();
                        let wallet = engine.get_or_create_wallet(&account(1), None).unwrap();
                        let wallet_id = wallet.id;
                        for _ in 0..history_size {
                            let snapshot = engine.wallet(&wallet_id).unwrap();
                            engine.deposit(&snapshot, one(), None, None, None).unwrap();
                        }
                        (engine, wallet_id)
                    },
                    |(engine, wallet_id)| {
                        let snapshot = engine.wallet(&wallet_id).unwrap();
                        engine
                            .deposit(black_box(&snapshot), one(), None, None, None)
                            .unwrap();
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

// =============================================================================
// Criterion Groups
// =============================================================================

criterion_group!(
    single_threaded,
    bench_single_deposit,
    bench_single_withdrawal,
    bench_single_transfer,
    bench_deposit_throughput,
    bench_transfer_throughput,
);

criterion_group!(
    multi_threaded,
    bench_parallel_deposits_same_wallet,
    bench_parallel_deposits_different_wallets,
    bench_contention,
);

criterion_group!(scaling, bench_wallet_creation, bench_transaction_history,);

criterion_main!(single_threaded, multi_threaded, scaling);
