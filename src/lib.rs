//! Archetype-based entity component storage: a component type registry and
//! a precomputed per-archetype operation table that performs type-erased
//! construct/destroy/move operations on raw byte buffers without per-row
//! type dispatch.
//!
//! Entities are grouped into archetypes, one per unique set of component
//! types, using Structure-of-Arrays storage for cache-friendly iteration.
//! Each archetype carries an [`archetype::ArchetypeOperationHelper`] built
//! once from its component set, so spawning, despawning, and migrating
//! entities between archetypes never re-derives which lifecycle function
//! applies to which component -- it walks five small precomputed tables.
//!
//! This crate does not provide a query language, serialization, multiple
//! cooperating worlds, or a reflection-based editor surface. Entity id
//! allocation/versioning, chunked column iteration, system scheduling, and
//! event dispatch are named only at the interfaces where this core touches
//! them ([`entity::EntityManager`], [`context::WorldContext`]); a minimal
//! default ships for the first so [`world::World`] is usable standalone.
//!
//! # Quick Start
//!
//! ```
//! use loom_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Name(String);
//!
//! let mut world = World::new();
//! let position = world
//!     .register_component::<Position>("position", ComponentBuilder::new(ConstructStrategy::Zeroed))
//!     .unwrap();
//! let name = world
//!     .register_component::<Name>(
//!         "name",
//!         ComponentBuilder::new(ConstructStrategy::Default(|| Name(String::new()))),
//!     )
//!     .unwrap();
//!
//! let entity = world.spawn(ComponentIdMask::from_ids([position])).unwrap();
//! world.insert_component(entity, name).unwrap();
//! assert!(world.has_component(entity, name).unwrap());
//! ```

#![deny(unsafe_code)]

#[allow(unsafe_code)]
pub mod archetype;
#[allow(unsafe_code)]
pub mod component;
pub mod context;
pub mod entity;
pub mod error;
pub mod mask;
#[allow(unsafe_code)]
pub mod world;

pub use error::EcsError;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::archetype::{Archetype, ArchetypeId, ArchetypeOperationHelper};
    pub use crate::component::{ComponentBuilder, ComponentInfo, ComponentRegistry, ConstructStrategy};
    pub use crate::context::{Dispatcher, MemoryManager, WorldContext};
    pub use crate::entity::{Entity, EntityAllocator, EntityManager};
    pub use crate::error::EcsError;
    pub use crate::mask::{ComponentId, ComponentIdMask, ComponentIndex};
    pub use crate::world::{SystemManager, World, WorldId, WorldVersion};
}
