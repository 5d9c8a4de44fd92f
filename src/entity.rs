//! Entity identifiers and the default allocator.
//!
//! Entity identifier allocation and versioning is an external collaborator of
//! the archetype core (see crate docs): this module exists so [`World`](crate::world::World)
//! is usable standalone, but nothing in [`crate::archetype`] or [`crate::component`]
//! depends on the concrete [`EntityAllocator`] -- only on the [`Entity`] handle
//! shape itself.

use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A generational entity handle.
///
/// Layout: `[generation: u32 | index: u32]`, packed into a single `u64` so
/// it is cheap to copy, hash, and use as a map key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity(u64);

impl Entity {
    /// Construct an `Entity` from an index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The index portion (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation portion (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityManager boundary
// ---------------------------------------------------------------------------

/// The boundary `World` uses for entity identifier allocation and liveness
/// tracking. Allocation policy, generation-wraparound handling, and index
/// recycling strategy are all external collaborator concerns; `World` only
/// needs these three operations.
pub trait EntityManager {
    /// Allocate a fresh entity handle.
    fn allocate(&mut self) -> Entity;
    /// Release an entity handle, invalidating any outstanding copies.
    /// Returns `true` if the entity was alive.
    fn deallocate(&mut self, entity: Entity) -> bool;
    /// Whether `entity` refers to a currently alive handle.
    fn is_alive(&self, entity: Entity) -> bool;
}

// ---------------------------------------------------------------------------
// EntityAllocator -- the shipped default EntityManager
// ---------------------------------------------------------------------------

/// Allocates and recycles [`Entity`] handles with generational tracking.
///
/// Free indices are kept in a FIFO queue so generations are spread out over
/// time rather than concentrated on one hot index.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_indices: VecDeque<u32>,
}

impl EntityAllocator {
    /// Create a new, empty allocator.
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free_indices: VecDeque::new(),
        }
    }

    /// Total number of currently alive entities.
    pub fn alive_count(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }
}

impl EntityManager for EntityAllocator {
    fn allocate(&mut self) -> Entity {
        if let Some(index) = self.free_indices.pop_front() {
            self.alive[index as usize] = true;
            Entity::new(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            Entity::new(index, 0)
        }
    }

    fn deallocate(&mut self, entity: Entity) -> bool {
        let idx = entity.index() as usize;
        if idx >= self.generations.len() {
            return false;
        }
        if self.generations[idx] != entity.generation() || !self.alive[idx] {
            return false;
        }
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_indices.push_back(entity.index());
        true
    }

    fn is_alive(&self, entity: Entity) -> bool {
        let idx = entity.index() as usize;
        idx < self.generations.len()
            && self.alive[idx]
            && self.generations[idx] == entity.generation()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_unique_ids() {
        let mut alloc = EntityAllocator::new();
        let ids: Vec<Entity> = (0..100).map(|_| alloc.allocate()).collect();
        let mut indices: Vec<u32> = ids.iter().map(|id| id.index()).collect();
        indices.sort();
        indices.dedup();
        assert_eq!(indices.len(), 100);
    }

    #[test]
    fn generation_increments_on_recycle() {
        let mut alloc = EntityAllocator::new();
        let e0 = alloc.allocate();
        assert_eq!(e0.generation(), 0);
        assert!(alloc.deallocate(e0));
        let e1 = alloc.allocate();
        assert_eq!(e1.index(), e0.index());
        assert_eq!(e1.generation(), 1);
    }

    #[test]
    fn stale_id_detection() {
        let mut alloc = EntityAllocator::new();
        let e0 = alloc.allocate();
        assert!(alloc.is_alive(e0));
        assert!(alloc.deallocate(e0));
        assert!(!alloc.is_alive(e0));
        let _e1 = alloc.allocate();
        assert!(!alloc.is_alive(e0), "stale ID still not alive after recycle");
    }

    #[test]
    fn double_deallocate_returns_false() {
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate();
        assert!(alloc.deallocate(e));
        assert!(!alloc.deallocate(e));
    }

    #[test]
    fn entity_roundtrip() {
        let id = Entity::new(42, 7);
        assert_eq!(id.index(), 42);
        assert_eq!(id.generation(), 7);
        assert_eq!(Entity::from_raw(id.to_raw()), id);
    }
}
