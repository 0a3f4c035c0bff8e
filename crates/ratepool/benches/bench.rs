use core::hint::black_box;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ratepool::{PoolConfig, RateLimiter, WorkerPool, handler_fn};
use tokio::runtime::Builder;

const JOBS: usize = 4096;

/// Submits a batch of no-op jobs and awaits all of them. The limiter is sized
/// so it never gates, which isolates queue and result-slot overhead.
fn bench_pool_round_trip(c: &mut Criterion) {
    let rt = Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");

    let mut group = c.benchmark_group("pool/round_trip");
    group.throughput(Throughput::Elements(JOBS as u64));

    for workers in [1, 4, 16, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            b.to_async(&rt).iter(|| async move {
                let pool: WorkerPool<usize, _> = WorkerPool::new(
                    PoolConfig::new(workers, u32::MAX).with_burst(JOBS as u32),
                    handler_fn(|_worker_id: usize, n: usize| async move {
                        Ok::<_, ()>(black_box(n))
                    }),
                )
                .expect("valid config");

                let handles: Vec<_> = (0..JOBS).map(|n| pool.submit(n)).collect();
                for handle in &handles {
                    black_box(handle.result().await.ok());
                }
                pool.shutdown().await;
            });
        });
    }

    group.finish();
}

/// Uncontended token acquisition on a bucket that refills faster than it
/// drains.
fn bench_limiter_try_acquire(c: &mut Criterion) {
    let limiter = RateLimiter::new(1_000_000, u32::MAX).expect("valid limiter");
    let rt = Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("failed to build runtime");
    let _guard = rt.enter();

    let mut group = c.benchmark_group("limiter");
    group.throughput(Throughput::Elements(1));
    group.bench_function("try_acquire", |b| {
        b.iter(|| black_box(limiter.try_acquire()));
    });
    group.finish();
}

criterion_group!(benches, bench_pool_round_trip, bench_limiter_try_acquire);
criterion_main!(benches);
