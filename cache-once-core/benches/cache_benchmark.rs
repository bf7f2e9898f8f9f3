use cache_once_core::{CacheOnce, LockMode};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(3600);
const MODES: [LockMode; 2] = [LockMode::PerKey, LockMode::Global];

fn bench_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("hit");

    for mode in MODES {
        let cache: CacheOnce<u64, u64, ()> = CacheOnce::in_memory(mode);
        for key in 0..100 {
            let _ = cache.get_or_create(key, || Ok(key), TTL);
        }

        group.bench_function(BenchmarkId::from_parameter(mode), |b| {
            let mut key = 0;
            b.iter(|| {
                key = (key + 1) % 100;
                black_box(cache.get_or_create(black_box(key), || Ok(0), TTL))
            });
        });
    }

    group.finish();
}

fn bench_miss_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("miss_sequential");

    for mode in MODES {
        group.bench_function(BenchmarkId::from_parameter(mode), |b| {
            b.iter(|| {
                let cache: CacheOnce<u64, u64, ()> = CacheOnce::in_memory(mode);
                for key in 0..100 {
                    black_box(cache.get_or_create(key, || Ok(key * 2), TTL)).ok();
                }
            });
        });
    }

    group.finish();
}

fn bench_contended_miss(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_miss");

    for threads in [2, 4, 8] {
        for mode in MODES {
            group.bench_with_input(
                BenchmarkId::new(mode.to_string(), threads),
                &threads,
                |b, &threads| {
                    b.iter(|| {
                        let cache: Arc<CacheOnce<u64, u64, ()>> =
                            Arc::new(CacheOnce::in_memory(mode));
                        let handles: Vec<_> = (0..threads)
                            .map(|_| {
                                let cache = Arc::clone(&cache);
                                thread::spawn(move || {
                                    for key in 0..16 {
                                        black_box(cache.get_or_create(
                                            key,
                                            || Ok(key.wrapping_mul(31)),
                                            TTL,
                                        ))
                                        .ok();
                                    }
                                })
                            })
                            .collect();

                        for handle in handles {
                            handle.join().unwrap();
                        }
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_async_hit(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let cache: CacheOnce<u64, u64, ()> = CacheOnce::default();
    runtime.block_on(async {
        for key in 0..100 {
            let _ = cache.get_or_create_async(key, || async move { Ok(key) }, TTL).await;
        }
    });

    c.bench_function("async_hit", |b| {
        let mut key = 0;
        b.iter(|| {
            key = (key + 1) % 100;
            runtime.block_on(async {
                black_box(
                    cache
                        .get_or_create_async(black_box(key), || async { Ok(0) }, TTL)
                        .await,
                )
            })
        });
    });
}

criterion_group!(
    benches,
    bench_hit,
    bench_miss_sequential,
    bench_contended_miss,
    bench_async_hit
);
criterion_main!(benches);
