use criterion::{black_box, criterion_group, criterion_main, Criterion};
use opsched::{
    NoopNodeExtension, Operation, OperationHandler, OperationHandlerFactory, OperationScheduler,
    Packet, PartitionId, ResponsePacketHandler, SchedulerConfig, Task, ThreadGroup,
};
use std::sync::Arc;

struct Idle;

impl OperationHandler for Idle {
    fn process(&self, task: Task) {
        drop(task);
    }
}

struct IdleFactory;

impl OperationHandlerFactory for IdleFactory {
    fn create_partition_handler(&self, _partition_id: PartitionId) -> Arc<dyn OperationHandler> {
        Arc::new(Idle)
    }

    fn create_generic_handler(&self) -> Arc<dyn OperationHandler> {
        Arc::new(Idle)
    }

    fn create_ad_hoc_handler(&self) -> Arc<dyn OperationHandler> {
        Arc::new(Idle)
    }
}

struct IgnoreResponses;

impl ResponsePacketHandler for IgnoreResponses {
    fn handle(&self, packet: Packet) {
        drop(packet);
    }
}

fn start() -> OperationScheduler {
    let config = SchedulerConfig {
        partition_thread_count: 4,
        generic_thread_count: 2,
        partition_count: 16,
    };
    OperationScheduler::new(
        &config,
        ThreadGroup::new("bench"),
        &IdleFactory,
        Arc::new(IgnoreResponses),
        Arc::new(NoopNodeExtension),
    )
    .unwrap()
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    group.bench_function("execute_partition_operation", |b| {
        let scheduler = start();
        b.iter(|| {
            scheduler
                .execute_operation(black_box(Operation::new(3, vec![0u8; 64])))
                .unwrap();
        });
        scheduler.shutdown();
    });

    group.bench_function("execute_generic_operation", |b| {
        let scheduler = start();
        b.iter(|| {
            scheduler
                .execute_operation(black_box(Operation::new(-1, vec![0u8; 64])))
                .unwrap();
        });
        scheduler.shutdown();
    });

    group.bench_function("execute_urgent_operation", |b| {
        let scheduler = start();
        b.iter(|| {
            scheduler
                .execute_operation(black_box(Operation::new(3, vec![0u8; 64]).urgent()))
                .unwrap();
        });
        scheduler.shutdown();
    });

    group.bench_function("execute_operation_packet", |b| {
        let scheduler = start();
        b.iter(|| {
            scheduler
                .execute_packet(black_box(Packet::operation(7, vec![0u8; 64])))
                .unwrap();
        });
        scheduler.shutdown();
    });

    group.finish();
}

fn bench_predicates(c: &mut Criterion) {
    let mut group = c.benchmark_group("predicates");
    let scheduler = start();
    let op = Operation::new(3, vec![]);

    group.bench_function("may_run_here", |b| {
        b.iter(|| scheduler.may_run_here(black_box(&op)));
    });

    group.bench_function("may_invoke_here", |b| {
        b.iter(|| scheduler.may_invoke_here(black_box(&op)));
    });

    group.finish();
    scheduler.shutdown();
}

criterion_group!(benches, bench_dispatch, bench_predicates);
criterion_main!(benches);
