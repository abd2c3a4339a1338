use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use tempfile::TempDir;

use loaner::database::{DatabaseConfig, PoolConfig, Store};
use loaner::{
    Device, EventBus, NewDevice, NewRequester, Requester, ReservationManager, ReservationStatus,
    Tier,
};

const QUEUE_SIZES: &[usize] = &[10, 100, 500];
const FLEET_SIZES: &[usize] = &[10, 100, 250];

fn setup_manager() -> (TempDir, ReservationManager) {
    let temp_dir = TempDir::new().expect("failed to create temporary directory");
    let store = Store::open(
        DatabaseConfig::new(temp_dir.path().join("loaner.db")),
        PoolConfig::default(),
    )
    .expect("failed to open temporary store");
    let manager = ReservationManager::load(store, EventBus::new()).expect("failed to load manager");
    (temp_dir, manager)
}

fn add_device(manager: &ReservationManager, tier: Tier) -> Device {
    manager
        .register_device(NewDevice::new("Bench", "Unit", 256, 16, tier))
        .expect("failed to register device")
}

fn add_requesters(manager: &ReservationManager, count: usize, tier: Tier) -> Vec<Requester> {
    (0..count)
        .map(|index| {
            manager
                .register_requester(NewRequester::new(format!("bench-{index}"), tier))
                .expect("failed to register requester")
        })
        .collect()
}

fn bench_reserve_and_complete(c: &mut Criterion) {
    c.bench_function("reserve_and_complete", |b| {
        b.iter_batched(
            || {
                let (temp_dir, manager) = setup_manager();
                let device = add_device(&manager, Tier::High);
                let requester = add_requesters(&manager, 1, Tier::High).remove(0);
                (temp_dir, manager, device, requester)
            },
            |(temp_dir, manager, device, requester)| {
                let _temp_dir = temp_dir;
                let reservation = manager
                    .create_reservation(device.id(), requester.id())
                    .expect("reservation failed");
                let changed = manager
                    .update_reservation_status(reservation.id(), ReservationStatus::Completed)
                    .expect("completion failed");
                black_box(changed);
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_enqueue(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue");

    for &size in QUEUE_SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &count| {
            b.iter_batched(
                || {
                    let (temp_dir, manager) = setup_manager();
                    let requesters = add_requesters(&manager, count, Tier::Low);
                    (temp_dir, manager, requesters)
                },
                |(temp_dir, manager, requesters)| {
                    let _temp_dir = temp_dir;
                    for requester in &requesters {
                        let outcome = manager
                            .add_to_queue(requester.id(), Tier::Low)
                            .expect("enqueue failed");
                        black_box(outcome);
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_drain_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain_queue");

    for &size in QUEUE_SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &count| {
            b.iter_batched(
                || {
                    let (temp_dir, manager) = setup_manager();
                    for requester in add_requesters(&manager, count, Tier::High) {
                        manager
                            .add_to_queue(requester.id(), Tier::High)
                            .expect("enqueue failed");
                    }
                    (temp_dir, manager)
                },
                |(temp_dir, manager)| {
                    let _temp_dir = temp_dir;
                    // Each new device serves the head of the queue
                    for _ in 0..count {
                        black_box(add_device(&manager, Tier::High));
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_verify_consistency(c: &mut Criterion) {
    let mut group = c.benchmark_group("verify_consistency");

    for &size in FLEET_SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &count| {
            b.iter_batched(
                || {
                    let (temp_dir, manager) = setup_manager();
                    let requesters = add_requesters(&manager, count * 2, Tier::Low);
                    for requester in &requesters[..count] {
                        let device = add_device(&manager, Tier::Low);
                        manager
                            .create_reservation(device.id(), requester.id())
                            .expect("reservation failed");
                    }
                    for requester in &requesters[count..] {
                        manager
                            .add_to_queue(requester.id(), Tier::Low)
                            .expect("enqueue failed");
                    }
                    (temp_dir, manager)
                },
                |(temp_dir, manager)| {
                    let _temp_dir = temp_dir;
                    let violations = manager.verify_consistency().expect("audit failed");
                    black_box(violations);
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_reserve_and_complete,
    bench_enqueue,
    bench_drain_queue,
    bench_verify_consistency
);
criterion_main!(benches);
