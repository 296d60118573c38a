//! Benchmarking emission, connection churn and copying of emitters under each lock policy.

#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use criterion::{Criterion, criterion_group, criterion_main};
use signals::{
    Emitter, GlobalLock, HasReceiver, LockPolicy, PerObjectLock, Receiver, Unsynchronized,
};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

#[derive(Debug)]
struct Sum<P>
where
    P: LockPolicy,
{
    receiver: Receiver<P>,
    value: AtomicU64,
}

impl<P> Sum<P>
where
    P: LockPolicy,
{
    fn new() -> Arc<Self> {
        Arc::new(Self {
            receiver: Receiver::new(),
            value: AtomicU64::new(0),
        })
    }

    fn add(&self, amount: u64) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }
}

impl<P> HasReceiver<P> for Sum<P>
where
    P: LockPolicy,
{
    fn receiver(&self) -> &Receiver<P> {
        &self.receiver
    }
}

fn entrypoint(c: &mut Criterion) {
    bench_policy::<Unsynchronized>(c, "unsynchronized");
    bench_policy::<GlobalLock>(c, "global_lock");
    bench_policy::<PerObjectLock>(c, "per_object_lock");
}

fn bench_policy<P>(c: &mut Criterion, policy_name: &str)
where
    P: LockPolicy,
{
    let mut group = c.benchmark_group(format!("signals_{policy_name}"));

    let empty = Emitter::<u64, P>::new();
    group.bench_function("emit_no_connections", |b| {
        b.iter(|| empty.emit(black_box(1)));
    });

    let one = Emitter::<u64, P>::new();
    let one_receiver = Sum::<P>::new();
    one.connect(&one_receiver, Sum::add);
    group.bench_function("emit_1_connection", |b| {
        b.iter(|| one.emit(black_box(1)));
    });

    let many = Emitter::<u64, P>::new();
    let many_receivers = (0..16).map(|_| Sum::<P>::new()).collect::<Vec<_>>();
    for receiver in &many_receivers {
        many.connect(receiver, Sum::add);
    }
    group.bench_function("emit_16_connections", |b| {
        b.iter(|| many.emit(black_box(1)));
    });

    let churn = Emitter::<u64, P>::new();
    let churn_receiver = Sum::<P>::new();
    group.bench_function("connect_disconnect", |b| {
        b.iter(|| {
            churn.connect(&churn_receiver, Sum::add);
            churn.disconnect(&*churn_receiver);
        });
    });

    group.bench_function("receiver_drop_with_connection", |b| {
        b.iter(|| {
            let receiver = Sum::<P>::new();
            churn.connect(&receiver, Sum::add);
            drop(black_box(receiver));
        });
    });

    group.bench_function("clone_emitter_16_connections", |b| {
        b.iter(|| black_box(many.clone()));
    });

    group.finish();
}
