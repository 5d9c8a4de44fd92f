//! The [`World`] facade: the single entry point that ties the component
//! registry, entity allocation, and archetype storage together, and routes
//! every structural edit through the owning archetype's
//! [`ArchetypeOperationHelper`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::archetype::{Archetype, ArchetypeId};
use crate::component::{ComponentBuilder, ComponentRegistry};
use crate::context::WorldContext;
use crate::entity::{Entity, EntityAllocator, EntityManager};
use crate::error::EcsError;
use crate::mask::{ComponentId, ComponentIdMask};

/// A process-wide, monotonically increasing identifier distinguishing one
/// [`World`] instance from another. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorldId(u64);

static NEXT_WORLD_ID: AtomicU64 = AtomicU64::new(0);

impl WorldId {
    fn next() -> Self {
        Self(NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw integer value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A monotonically increasing counter bumped whenever a [`World`] performs
/// a structural change (spawn, despawn, insert, remove). Systems that cache
/// query results elsewhere can compare this to detect staleness; the core
/// itself does not interpret it beyond incrementing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WorldVersion(u64);

impl WorldVersion {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Where an entity currently lives.
#[derive(Debug, Clone, Copy)]
struct EntityLocation {
    archetype_id: ArchetypeId,
    row: usize,
}

/// Placeholder for the system scheduler this crate does not implement:
/// constructed lazily on first access so a `World` that never schedules
/// systems pays nothing for it. Scheduling itself is an external
/// collaborator's job; this type only reserves the seam.
#[derive(Debug, Default)]
pub struct SystemManager {
    registered_systems: usize,
}

impl SystemManager {
    /// Number of systems this manager has been told about. There is no
    /// execution model here -- registration bookkeeping only.
    pub fn registered_count(&self) -> usize {
        self.registered_systems
    }

    /// Record that a system was registered, for bookkeeping only.
    pub fn note_registration(&mut self) {
        self.registered_systems += 1;
    }
}

/// Owns the entity allocator, the component registry, and every archetype,
/// and is the only thing in this crate that knows how to route a
/// structural edit across an archetype boundary.
///
/// Scheduling model: single-threaded within one `World` for every
/// structural operation. Archetypes assume exclusive access to the rows
/// they hand out; callers coordinate their own concurrency above this
/// facade.
pub struct World {
    id: WorldId,
    version: WorldVersion,
    context: WorldContext,
    entities: EntityAllocator,
    registry: ComponentRegistry,
    archetypes: Vec<Archetype>,
    archetype_index: HashMap<ComponentIdMask, ArchetypeId>,
    locations: HashMap<Entity, EntityLocation>,
    systems: Option<SystemManager>,
}

impl World {
    /// Create a new, empty world with a null [`WorldContext`].
    pub fn new() -> Self {
        Self::with_context(WorldContext::null())
    }

    /// Create a new, empty world backed by the given shared collaborators.
    pub fn with_context(context: WorldContext) -> Self {
        Self {
            id: WorldId::next(),
            version: WorldVersion(0),
            context,
            entities: EntityAllocator::new(),
            registry: ComponentRegistry::new(),
            archetypes: Vec::new(),
            archetype_index: HashMap::new(),
            locations: HashMap::new(),
            systems: None,
        }
    }

    #[inline]
    pub fn id(&self) -> WorldId {
        self.id
    }

    #[inline]
    pub fn version(&self) -> WorldVersion {
        self.version
    }

    #[inline]
    pub fn context(&self) -> &WorldContext {
        &self.context
    }

    #[inline]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    #[inline]
    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    /// Lazily construct and return the system manager, per the "constructed
    /// on first use" contract. There is no scheduling behavior beyond the
    /// bookkeeping [`SystemManager`] itself offers.
    pub fn systems_mut(&mut self) -> &mut SystemManager {
        self.systems.get_or_insert_with(SystemManager::default)
    }

    /// Register a component type, convenience wrapper over
    /// [`ComponentRegistry::register`].
    pub fn register_component<T: 'static>(
        &mut self,
        name: &'static str,
        builder: ComponentBuilder<T>,
    ) -> Result<ComponentId, EcsError> {
        self.registry.register(name, builder)
    }

    fn bump_version(&mut self) {
        self.version = WorldVersion(self.version.0 + 1);
    }

    fn archetype_for_mask(&mut self, mask: ComponentIdMask) -> Result<ArchetypeId, EcsError> {
        if let Some(&id) = self.archetype_index.get(&mask) {
            return Ok(id);
        }
        let id = ArchetypeId(self.archetypes.len() as u32);
        let archetype = Archetype::new(id, mask.clone(), &self.registry)?;
        self.archetypes.push(archetype);
        self.archetype_index.insert(mask, id);
        Ok(id)
    }

    fn archetype(&self, id: ArchetypeId) -> &Archetype {
        &self.archetypes[id.0 as usize]
    }

    fn archetype_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        &mut self.archetypes[id.0 as usize]
    }

    fn location(&self, entity: Entity) -> Result<EntityLocation, EcsError> {
        self.locations
            .get(&entity)
            .copied()
            .filter(|_| self.entities.is_alive(entity))
            .ok_or(EcsError::EntityNotFound { entity })
    }

    /// Spawn a new entity belonging to the archetype identified by `mask`.
    /// Every component in `mask` is constructed via its registered
    /// `create`/default-value path; there is no way to supply initial
    /// values here (use [`Self::insert_component`] afterwards, or a future
    /// bundle-style convenience built on top of this facade).
    pub fn spawn(&mut self, mask: ComponentIdMask) -> Result<Entity, EcsError> {
        let archetype_id = self.archetype_for_mask(mask)?;
        let entity = self.entities.allocate();
        let row = self
            .archetype_mut(archetype_id)
            .spawn_row(entity, &self.context);
        self.locations.insert(
            entity,
            EntityLocation {
                archetype_id,
                row,
            },
        );
        self.bump_version();
        Ok(entity)
    }

    /// Despawn an entity: destroy its components via the owning archetype's
    /// helper and recycle its id.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), EcsError> {
        let loc = self.location(entity)?;
        let swapped = self
            .archetype_mut(loc.archetype_id)
            .despawn_row(loc.row, &self.context);
        self.locations.remove(&entity);
        if let Some(moved) = swapped {
            if let Some(moved_loc) = self.locations.get_mut(&moved) {
                moved_loc.row = loc.row;
            }
        }
        self.entities.deallocate(entity);
        self.bump_version();
        Ok(())
    }

    /// Whether `entity` refers to a currently alive entity.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Total number of alive entities.
    pub fn entity_count(&self) -> usize {
        self.locations.len()
    }

    /// Total number of archetypes created so far.
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Whether `entity` currently carries `id`.
    pub fn has_component(&self, entity: Entity, id: ComponentId) -> Result<bool, EcsError> {
        let loc = self.location(entity)?;
        Ok(self.archetype(loc.archetype_id).has_component(id))
    }

    /// Raw pointer to `entity`'s component `id`, or `None` if it does not
    /// carry that component.
    ///
    /// # Safety
    /// The caller must read through the returned pointer only as the
    /// concrete type registered for `id`.
    pub unsafe fn component_ptr(
        &self,
        entity: Entity,
        id: ComponentId,
    ) -> Result<Option<*const u8>, EcsError> {
        let loc = self.location(entity)?;
        Ok(unsafe { self.archetype(loc.archetype_id).component_ptr(loc.row, id) })
    }

    /// Mutable raw pointer to `entity`'s component `id`. See
    /// [`Self::component_ptr`].
    ///
    /// # Safety
    /// Same contract as [`Self::component_ptr`].
    pub unsafe fn component_ptr_mut(
        &mut self,
        entity: Entity,
        id: ComponentId,
    ) -> Result<Option<*mut u8>, EcsError> {
        let loc = self.location(entity)?;
        Ok(unsafe {
            self.archetype_mut(loc.archetype_id)
                .component_ptr_mut(loc.row, id)
        })
    }

    /// Migrate `entity` to the archetype for `new_mask`, which must differ
    /// from its current archetype. Used by [`Self::insert_component`] and
    /// [`Self::remove_component`]; exposed directly for callers that
    /// compute a target mask themselves (e.g. adding or removing several
    /// components in one transition).
    fn migrate(&mut self, entity: Entity, new_mask: ComponentIdMask) -> Result<(), EcsError> {
        let loc = self.location(entity)?;
        let dst_id = self.archetype_for_mask(new_mask)?;
        if dst_id.0 == loc.archetype_id.0 {
            return Ok(());
        }

        // Split the borrow: migrate_row needs `&mut self` on both the
        // source and destination archetype simultaneously.
        let (src_idx, dst_idx) = (loc.archetype_id.0 as usize, dst_id.0 as usize);
        let (dst_row, relocated) = if src_idx < dst_idx {
            let (left, right) = self.archetypes.split_at_mut(dst_idx);
            left[src_idx].migrate_row(loc.row, &mut right[0], entity, &self.context)
        } else {
            let (left, right) = self.archetypes.split_at_mut(src_idx);
            right[0].migrate_row(loc.row, &mut left[dst_idx], entity, &self.context)
        };

        self.locations.insert(
            entity,
            EntityLocation {
                archetype_id: dst_id,
                row: dst_row,
            },
        );
        if let Some(moved) = relocated {
            if let Some(moved_loc) = self.locations.get_mut(&moved) {
                moved_loc.row = loc.row;
            }
        }
        self.bump_version();
        Ok(())
    }

    /// Add `id` to `entity`'s component set, migrating it to the archetype
    /// that includes `id`. The new component is constructed via its
    /// registered `create`/default-value path (see
    /// [`ArchetypeOperationHelper::move_external`](crate::archetype::ArchetypeOperationHelper::move_external)).
    /// Fails with [`EcsError::ComponentAlreadyPresent`] if the entity
    /// already has `id`.
    pub fn insert_component(&mut self, entity: Entity, id: ComponentId) -> Result<(), EcsError> {
        let loc = self.location(entity)?;
        if self.archetype(loc.archetype_id).has_component(id) {
            let name = self.registry.info(id)?.name;
            return Err(EcsError::ComponentAlreadyPresent { entity, name });
        }
        let new_mask = self.archetype(loc.archetype_id).mask().with(id);
        self.migrate(entity, new_mask)
    }

    /// Remove `id` from `entity`'s component set, migrating it to the
    /// archetype without `id`. Fails with [`EcsError::ComponentNotPresent`]
    /// if the entity does not have `id`.
    pub fn remove_component(&mut self, entity: Entity, id: ComponentId) -> Result<(), EcsError> {
        let loc = self.location(entity)?;
        if !self.archetype(loc.archetype_id).has_component(id) {
            let name = self.registry.info(id)?.name;
            return Err(EcsError::ComponentNotPresent { entity, name });
        }
        let new_mask = self.archetype(loc.archetype_id).mask().without(id);
        self.migrate(entity, new_mask)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("entity_count", &self.entity_count())
            .field("archetype_count", &self.archetype_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ConstructStrategy;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Name(String);

    fn world_with_position_and_name() -> (World, ComponentId, ComponentId) {
        let mut world = World::new();
        let pos = world
            .register_component::<Position>("position", ComponentBuilder::new(ConstructStrategy::Zeroed))
            .unwrap();
        let name = world
            .register_component::<Name>(
                "name",
                ComponentBuilder::new(ConstructStrategy::Default(|| Name(String::new()))),
            )
            .unwrap();
        (world, pos, name)
    }

    #[test]
    fn spawn_and_despawn_roundtrip() {
        let (mut world, pos, _name) = world_with_position_and_name();
        let mask = ComponentIdMask::from_ids([pos]);
        let entity = world.spawn(mask).unwrap();
        assert!(world.is_alive(entity));
        assert_eq!(world.entity_count(), 1);
        world.despawn(entity).unwrap();
        assert!(!world.is_alive(entity));
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn insert_component_migrates_and_preserves_existing() {
        let (mut world, pos, name) = world_with_position_and_name();
        let entity = world.spawn(ComponentIdMask::from_ids([pos])).unwrap();
        unsafe {
            let ptr = world.component_ptr_mut(entity, pos).unwrap().unwrap() as *mut Position;
            *ptr = Position { x: 1.0, y: 2.0 };
        }
        world.insert_component(entity, name).unwrap();
        assert!(world.has_component(entity, name).unwrap());
        unsafe {
            let ptr = world.component_ptr(entity, pos).unwrap().unwrap() as *const Position;
            assert_eq!(*ptr, Position { x: 1.0, y: 2.0 });
        }
        assert_eq!(world.archetype_count(), 2);
    }

    #[test]
    fn remove_component_migrates_back() {
        let (mut world, pos, name) = world_with_position_and_name();
        let entity = world
            .spawn(ComponentIdMask::from_ids([pos, name]))
            .unwrap();
        world.remove_component(entity, name).unwrap();
        assert!(!world.has_component(entity, name).unwrap());
        assert!(world.has_component(entity, pos).unwrap());
    }

    #[test]
    fn insert_component_already_present_errors() {
        let (mut world, pos, name) = world_with_position_and_name();
        let entity = world
            .spawn(ComponentIdMask::from_ids([pos, name]))
            .unwrap();
        assert!(matches!(
            world.insert_component(entity, name),
            Err(EcsError::ComponentAlreadyPresent { .. })
        ));
    }

    #[test]
    fn remove_component_not_present_errors() {
        let (mut world, pos, name) = world_with_position_and_name();
        let entity = world.spawn(ComponentIdMask::from_ids([pos])).unwrap();
        assert!(matches!(
            world.remove_component(entity, name),
            Err(EcsError::ComponentNotPresent { .. })
        ));
    }

    #[test]
    fn unknown_entity_errors() {
        let (mut world, pos, _name) = world_with_position_and_name();
        let entity = world.spawn(ComponentIdMask::from_ids([pos])).unwrap();
        world.despawn(entity).unwrap();
        assert!(matches!(
            world.despawn(entity),
            Err(EcsError::EntityNotFound { .. })
        ));
    }

    #[test]
    fn version_bumps_on_structural_change() {
        let (mut world, pos, _name) = world_with_position_and_name();
        let before = world.version();
        let entity = world.spawn(ComponentIdMask::from_ids([pos])).unwrap();
        assert!(world.version() > before);
        let after_spawn = world.version();
        world.despawn(entity).unwrap();
        assert!(world.version() > after_spawn);
    }

    #[test]
    fn swap_on_despawn_updates_location_of_moved_entity() {
        let (mut world, pos, _name) = world_with_position_and_name();
        let mask = ComponentIdMask::from_ids([pos]);
        let e0 = world.spawn(mask.clone()).unwrap();
        let e1 = world.spawn(mask).unwrap();
        world.despawn(e0).unwrap();
        assert!(world.is_alive(e1));
        unsafe {
            assert!(world.component_ptr(e1, pos).unwrap().is_some());
        }
    }
}
