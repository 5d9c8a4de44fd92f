//! The shared collaborators threaded into component lifecycle calls.
//!
//! Memory-pool selection and system dispatch are external collaborators of
//! the archetype core: this module defines only the trait boundary each one
//! crosses, plus a no-op default so a [`World`](crate::world::World) is
//! constructible without pulling in a real allocator or thread pool.

use std::fmt;
use std::sync::Arc;

/// Where component and archetype backing storage is allocated from.
///
/// The core treats this as opaque: it never inspects the allocation
/// strategy, only that a [`WorldContext`] can hand out a stable reference to
/// one. Selecting a real pooled/arena allocator is outside this crate's
/// scope.
pub trait MemoryManager: Send + Sync {
    /// A short label for diagnostics.
    fn name(&self) -> &str;
}

/// Where cross-system work fans out to once archetypes are already built.
///
/// The archetype core never calls into this itself; it is carried on
/// [`WorldContext`] purely so component constructors and hooks that need to
/// enqueue follow-up work have somewhere to reach.
pub trait Dispatcher: Send + Sync {
    /// A short label for diagnostics.
    fn name(&self) -> &str;
}

/// A [`MemoryManager`] that performs no pooling; backing storage for
/// components still goes through the normal global allocator inside
/// [`crate::archetype::Column`]. Suitable as a placeholder until a real
/// memory manager is wired in.
#[derive(Debug, Default)]
pub struct NullMemoryManager;

impl MemoryManager for NullMemoryManager {
    fn name(&self) -> &str {
        "null-memory-manager"
    }
}

/// A [`Dispatcher`] that does not actually dispatch anything.
#[derive(Debug, Default)]
pub struct NullDispatcher;

impl Dispatcher for NullDispatcher {
    fn name(&self) -> &str {
        "null-dispatcher"
    }
}

/// The bundle of shared collaborators passed by reference into lifecycle
/// calls (`create`, `before_remove`, `after_assign`) that need them, without
/// granting those calls access to the rest of [`World`](crate::world::World).
#[derive(Clone)]
pub struct WorldContext {
    memory_manager: Arc<dyn MemoryManager>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl WorldContext {
    /// Build a context from explicit collaborators.
    pub fn new(memory_manager: Arc<dyn MemoryManager>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            memory_manager,
            dispatcher,
        }
    }

    /// A context backed by no-op collaborators, for tests and simple
    /// single-threaded use.
    pub fn null() -> Self {
        Self::new(Arc::new(NullMemoryManager), Arc::new(NullDispatcher))
    }

    /// The memory manager this context carries.
    pub fn memory_manager(&self) -> &Arc<dyn MemoryManager> {
        &self.memory_manager
    }

    /// The dispatcher this context carries.
    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.dispatcher
    }
}

impl fmt::Debug for WorldContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldContext")
            .field("memory_manager", &self.memory_manager.name())
            .field("dispatcher", &self.dispatcher.name())
            .finish()
    }
}

impl Default for WorldContext {
    fn default() -> Self {
        Self::null()
    }
}
