//! Error taxonomy for registry, archetype, and world-facade operations.

use crate::mask::ComponentId;

/// Errors produced by ECS operations.
///
/// Registration and facade-level errors are recoverable and returned to the
/// caller as `Result<_, EcsError>`. Fail-stubs (invoking `copy` on a
/// non-cloneable component, or `compare` on a non-comparable one) are not
/// represented here: they are logic errors and panic at the call site after
/// logging, per the helper's "misuse is a programming error" contract.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// A `ComponentId` was referenced that has not been registered.
    #[error("component id {id:?} is not registered")]
    UnknownComponent { id: ComponentId },

    /// A type was registered again with a `FunctionSet` shape incompatible
    /// with its existing registration (same type, different capabilities).
    #[error("component '{name}' was already registered with an incompatible function set")]
    RegistrationConflict { name: &'static str },

    /// A mask named ids the registry has never seen.
    #[error("mask contains component id {id:?} which exceeds the registry's range")]
    MaskOutOfRange { id: ComponentId },

    /// The entity handle does not refer to a currently alive entity (never
    /// allocated, already despawned, or a stale generation).
    #[error("entity {entity:?} does not exist (stale or never allocated)")]
    EntityNotFound { entity: crate::entity::Entity },

    /// The entity already carries the component being inserted.
    #[error("entity {entity:?} already has component '{name}'")]
    ComponentAlreadyPresent {
        entity: crate::entity::Entity,
        name: &'static str,
    },

    /// The entity does not carry the component being removed or read.
    #[error("entity {entity:?} has no component '{name}'")]
    ComponentNotPresent {
        entity: crate::entity::Entity,
        name: &'static str,
    },
}
