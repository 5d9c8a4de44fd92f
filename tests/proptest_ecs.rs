//! Property tests driving random sequences of spawn/despawn/insert/remove
//! against a `World`, checking the invariants the archetype helper exists
//! to uphold: entity count tracking, liveness, and component-data integrity
//! across archetype migrations.

use loom_ecs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}

fn test_world() -> (World, ComponentId, ComponentId) {
    let mut world = World::new();
    let pos = world
        .register_component::<Position>("position", ComponentBuilder::new(ConstructStrategy::Zeroed))
        .unwrap();
    let vel = world
        .register_component::<Velocity>("velocity", ComponentBuilder::new(ConstructStrategy::Zeroed))
        .unwrap();
    (world, pos, vel)
}

/// One step of a random structural-edit sequence.
#[derive(Debug, Clone)]
enum EcsOp {
    SpawnPos,
    SpawnPosVel,
    Despawn(usize),
    InsertVel(usize),
    RemoveVel(usize),
}

fn ecs_op_strategy() -> impl Strategy<Value = EcsOp> {
    prop_oneof![
        Just(EcsOp::SpawnPos),
        Just(EcsOp::SpawnPosVel),
        (0..64usize).prop_map(EcsOp::Despawn),
        (0..64usize).prop_map(EcsOp::InsertVel),
        (0..64usize).prop_map(EcsOp::RemoveVel),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    /// After every operation in a random sequence, `World::entity_count`
    /// matches our own bookkeeping and every entity we believe alive really
    /// is alive.
    #[test]
    fn random_ops_preserve_entity_count_and_liveness(ops in prop::collection::vec(ecs_op_strategy(), 1..64)) {
        let (mut world, pos, vel) = test_world();
        let pos_mask = ComponentIdMask::from_ids([pos]);
        let pos_vel_mask = ComponentIdMask::from_ids([pos, vel]);
        let mut alive: Vec<Entity> = Vec::new();

        for op in ops {
            match op {
                EcsOp::SpawnPos => alive.push(world.spawn(pos_mask.clone()).unwrap()),
                EcsOp::SpawnPosVel => alive.push(world.spawn(pos_vel_mask.clone()).unwrap()),
                EcsOp::Despawn(i) => {
                    if !alive.is_empty() {
                        let entity = alive.remove(i % alive.len());
                        world.despawn(entity).unwrap();
                    }
                }
                EcsOp::InsertVel(i) => {
                    if !alive.is_empty() {
                        let entity = alive[i % alive.len()];
                        // Already-present is a legitimate outcome of random
                        // op sequences, not a bug; only the structural
                        // invariants below matter for this test.
                        let _ = world.insert_component(entity, vel);
                    }
                }
                EcsOp::RemoveVel(i) => {
                    if !alive.is_empty() {
                        let entity = alive[i % alive.len()];
                        let _ = world.remove_component(entity, vel);
                    }
                }
            }

            prop_assert_eq!(world.entity_count(), alive.len());
            for &entity in &alive {
                prop_assert!(world.is_alive(entity));
            }
        }
    }

    /// Stale entity handles (despawned, possibly index-recycled by a later
    /// spawn) are never reported alive again.
    #[test]
    fn stale_entities_stay_dead_after_index_recycle(
        spawn_count in 1..30usize,
        despawn_indices in prop::collection::vec(0..30usize, 1..15),
    ) {
        let (mut world, pos, _vel) = test_world();
        let mask = ComponentIdMask::from_ids([pos]);

        let mut entities: Vec<Entity> = (0..spawn_count).map(|_| world.spawn(mask.clone()).unwrap()).collect();
        let mut stale: Vec<Entity> = Vec::new();

        for idx in despawn_indices {
            if entities.is_empty() {
                break;
            }
            let entity = entities.remove(idx % entities.len());
            world.despawn(entity).unwrap();
            stale.push(entity);
        }

        for _ in 0..stale.len() {
            entities.push(world.spawn(mask.clone()).unwrap());
        }

        for &entity in &stale {
            prop_assert!(!world.is_alive(entity));
            prop_assert!(matches!(world.has_component(entity, pos), Err(EcsError::EntityNotFound { .. })));
        }
        for &entity in &entities {
            prop_assert!(world.is_alive(entity));
        }
    }

    /// Archetype migration (insert/remove component) never disturbs the
    /// component bytes shared between the source and destination archetype.
    #[test]
    fn migration_preserves_shared_component_data(
        x in -1_000.0f32..1_000.0,
        y in -1_000.0f32..1_000.0,
        dx in -1_000.0f32..1_000.0,
        dy in -1_000.0f32..1_000.0,
        remove_after in proptest::bool::ANY,
    ) {
        let (mut world, pos, vel) = test_world();
        let entity = world.spawn(ComponentIdMask::from_ids([pos])).unwrap();
        unsafe {
            let ptr = world.component_ptr_mut(entity, pos).unwrap().unwrap() as *mut Position;
            *ptr = Position { x, y };
        }

        world.insert_component(entity, vel).unwrap();
        unsafe {
            let ptr = world.component_ptr_mut(entity, vel).unwrap().unwrap() as *mut Velocity;
            *ptr = Velocity { dx, dy };
        }

        unsafe {
            let ptr = world.component_ptr(entity, pos).unwrap().unwrap() as *const Position;
            prop_assert_eq!(*ptr, Position { x, y });
        }

        if remove_after {
            world.remove_component(entity, vel).unwrap();
            prop_assert!(!world.has_component(entity, vel).unwrap());
            unsafe {
                let ptr = world.component_ptr(entity, pos).unwrap().unwrap() as *const Position;
                prop_assert_eq!(*ptr, Position { x, y });
            }
        }
    }

    /// Entities in the same archetype never alias each other's storage.
    #[test]
    fn entities_in_same_archetype_have_independent_storage(count in 2..64usize) {
        let (mut world, pos, _vel) = test_world();
        let mask = ComponentIdMask::from_ids([pos]);

        let entities: Vec<Entity> = (0..count)
            .map(|i| {
                let entity = world.spawn(mask.clone()).unwrap();
                unsafe {
                    let ptr = world.component_ptr_mut(entity, pos).unwrap().unwrap() as *mut Position;
                    *ptr = Position { x: i as f32, y: (i * 2) as f32 };
                }
                entity
            })
            .collect();

        for (i, &entity) in entities.iter().enumerate() {
            unsafe {
                let ptr = world.component_ptr(entity, pos).unwrap().unwrap() as *const Position;
                prop_assert_eq!(*ptr, Position { x: i as f32, y: (i * 2) as f32 });
            }
        }
    }
}
