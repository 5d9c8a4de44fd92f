//! Throughput benchmarks for archetype creation, spawn/despawn, and
//! cross-archetype migration -- the operations that walk an
//! `ArchetypeOperationHelper`'s tables on every call.
//!
//! Run with: `cargo bench --bench ecs_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use loom_ecs::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Name(String);

fn registered_world() -> (World, ComponentId, ComponentId, ComponentId) {
    let mut world = World::new();
    let pos = world
        .register_component::<Position>("position", ComponentBuilder::new(ConstructStrategy::Zeroed))
        .unwrap();
    let vel = world
        .register_component::<Velocity>("velocity", ComponentBuilder::new(ConstructStrategy::Zeroed))
        .unwrap();
    let name = world
        .register_component::<Name>(
            "name",
            ComponentBuilder::new(ConstructStrategy::Default(|| Name(String::new()))),
        )
        .unwrap();
    (world, pos, vel, name)
}

// ---------------------------------------------------------------------------
// Benchmark 1: spawn throughput, trivial-only archetype
// ---------------------------------------------------------------------------

fn bench_spawn_trivial(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_trivial");
    for count in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let (mut world, pos, vel, _name) = registered_world();
                let mask = ComponentIdMask::from_ids([pos, vel]);
                for _ in 0..count {
                    black_box(world.spawn(mask.clone()).unwrap());
                }
            });
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark 2: spawn throughput, archetype with a non-trivial component
// ---------------------------------------------------------------------------

fn bench_spawn_non_trivial(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_non_trivial");
    for count in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let (mut world, pos, _vel, name) = registered_world();
                let mask = ComponentIdMask::from_ids([pos, name]);
                for _ in 0..count {
                    black_box(world.spawn(mask.clone()).unwrap());
                }
            });
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark 3: despawn throughput (swap-remove compaction)
// ---------------------------------------------------------------------------

fn bench_despawn(c: &mut Criterion) {
    c.bench_function("despawn_1k", |b| {
        b.iter_batched(
            || {
                let (mut world, pos, vel, _name) = registered_world();
                let mask = ComponentIdMask::from_ids([pos, vel]);
                let entities: Vec<Entity> = (0..1_000).map(|_| world.spawn(mask.clone()).unwrap()).collect();
                (world, entities)
            },
            |(mut world, entities)| {
                for entity in entities {
                    world.despawn(entity).unwrap();
                }
                black_box(world.entity_count());
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

// ---------------------------------------------------------------------------
// Benchmark 4: archetype migration (add-component transition)
// ---------------------------------------------------------------------------

fn bench_insert_component_migration(c: &mut Criterion) {
    c.bench_function("insert_component_migration_1k", |b| {
        b.iter_batched(
            || {
                let (mut world, pos, _vel, name) = registered_world();
                let mask = ComponentIdMask::from_ids([pos]);
                let entities: Vec<Entity> = (0..1_000).map(|_| world.spawn(mask.clone()).unwrap()).collect();
                (world, entities, name)
            },
            |(mut world, entities, name)| {
                for entity in entities {
                    world.insert_component(entity, name).unwrap();
                }
                black_box(world.archetype_count());
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_spawn_trivial,
    bench_spawn_non_trivial,
    bench_despawn,
    bench_insert_component_migration,
);
criterion_main!(benches);
