//! Component type registration and the per-type lifecycle `FunctionSet`.
//!
//! Every component type used by an archetype must be registered in a
//! [`ComponentRegistry`] before it can appear in a [`ComponentIdMask`]. A
//! registration synthesizes the type's [`FunctionSet`]: which lifecycle
//! operations are real, which are elided because the type is trivial, and
//! which are fail-stubs reserved for a capability the type does not have.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::ptr;
use std::sync::Arc;

use crate::context::WorldContext;
use crate::entity::Entity;
use crate::error::EcsError;
use crate::mask::ComponentId;

// ---------------------------------------------------------------------------
// Construction strategy
// ---------------------------------------------------------------------------

/// How a component's `create` function, if any, builds a fresh value.
///
/// Stable Rust has no specialization to auto-detect which constructor
/// signature a type supports the way the source's SFINAE preference chain
/// did, so the registrant declares the strategy explicitly. [`Self::Zeroed`]
/// is the trivial case: the all-zero bit pattern is a valid `T` and no code
/// runs at all, eliding the `create` table entry entirely.
pub enum ConstructStrategy<T> {
    /// The type's all-zero byte pattern is a valid value; `create` is
    /// elided and the archetype leaves the slot's bytes untouched.
    Zeroed,
    /// A zero-argument constructor (e.g. `T::default`), used when `T` is
    /// default-constructible but that construction is not a no-op.
    Default(fn() -> T),
    /// Constructed from the [`WorldContext`] alone.
    WithContext(fn(&WorldContext) -> T),
    /// Constructed from the [`Entity`] alone.
    WithEntity(fn(Entity) -> T),
    /// Constructed from the context, then the entity.
    WithContextAndEntity(fn(&WorldContext, Entity) -> T),
    /// Constructed from the entity, then the context.
    WithEntityAndContext(fn(Entity, &WorldContext) -> T),
}

// ---------------------------------------------------------------------------
// Type-erased function pointers
// ---------------------------------------------------------------------------

/// A component's constructor or a lifecycle hook, type-erased.
///
/// # Safety
/// `ptr` must point to `size` properly aligned bytes for the component's
/// registered type; `create` functions additionally require the memory to
/// be uninitialized, and hook functions require it to hold a live value.
pub type CreateFn = Arc<dyn Fn(*mut u8, Entity, &WorldContext) + Send + Sync>;

/// A `before_remove` / `after_assign` hook, type-erased. See [`CreateFn`].
pub type HookFn = Arc<dyn Fn(*mut u8, Entity, &WorldContext) + Send + Sync>;

/// Copy-construct `dst` from `src`. Monomorphized per type; no captured
/// state, so this is a plain function pointer rather than a closure.
///
/// # Safety
/// `src` must point to a live value of the component's type; `dst` must be
/// uninitialized storage of the same size/alignment.
pub type CopyFn = unsafe fn(*mut u8, *const u8);

/// Move-assign `src`'s value into the already-constructed `dst`.
///
/// # Safety
/// Both `dst` and `src` must point to live values of the component's type;
/// after the call `src` is moved-from and must be destroyed, never read.
pub type MoveAssignFn = unsafe fn(*mut u8, *mut u8);

/// Move-construct `dst` from `src`, which must be raw uninitialized storage.
///
/// # Safety
/// `src` must point to a live value; `dst` must be uninitialized storage of
/// the same size/alignment. After the call `src` is moved-from.
pub type MoveConstructFn = unsafe fn(*mut u8, *mut u8);

/// Drop the value at `ptr` in place.
///
/// # Safety
/// `ptr` must point to a live value of the component's type.
pub type DestroyFn = unsafe fn(*mut u8);

/// Structural equality between two live values.
///
/// # Safety
/// Both pointers must point to live values of the component's type.
pub type CompareFn = unsafe fn(*const u8, *const u8) -> bool;

// ---------------------------------------------------------------------------
// Monomorphized shims
// ---------------------------------------------------------------------------

unsafe fn destroy_shim<T>(ptr: *mut u8) {
    ptr::drop_in_place(ptr as *mut T);
}

unsafe fn move_assign_shim<T>(dst: *mut u8, src: *mut u8) {
    *(dst as *mut T) = ptr::read(src as *mut T);
}

unsafe fn move_construct_shim<T>(dst: *mut u8, src: *mut u8) {
    ptr::write(dst as *mut T, ptr::read(src as *mut T));
}

unsafe fn copy_shim<T: Clone>(dst: *mut u8, src: *const u8) {
    let cloned = (*(src as *const T)).clone();
    ptr::write(dst as *mut T, cloned);
}

unsafe fn copy_fail_stub<T>(_dst: *mut u8, _src: *const u8) {
    let name = std::any::type_name::<T>();
    tracing::error!(component = name, op = "copy", "component is not cloneable");
    panic!("component '{name}' is not cloneable; copy fail-stub invoked");
}

unsafe fn compare_shim<T: PartialEq>(a: *const u8, b: *const u8) -> bool {
    *(a as *const T) == *(b as *const T)
}

unsafe fn compare_fail_stub<T>(_a: *const u8, _b: *const u8) -> bool {
    let name = std::any::type_name::<T>();
    tracing::error!(component = name, op = "compare", "component is not comparable");
    panic!("component '{name}' does not support equality; compare fail-stub invoked");
}

fn build_create<T: 'static>(strategy: ConstructStrategy<T>) -> Option<CreateFn> {
    match strategy {
        ConstructStrategy::Zeroed => None,
        ConstructStrategy::Default(f) => Some(Arc::new(move |ptr, _entity, _ctx| unsafe {
            ptr::write(ptr as *mut T, f());
        })),
        ConstructStrategy::WithContext(f) => Some(Arc::new(move |ptr, _entity, ctx| unsafe {
            ptr::write(ptr as *mut T, f(ctx));
        })),
        ConstructStrategy::WithEntity(f) => Some(Arc::new(move |ptr, entity, _ctx| unsafe {
            ptr::write(ptr as *mut T, f(entity));
        })),
        ConstructStrategy::WithContextAndEntity(f) => {
            Some(Arc::new(move |ptr, entity, ctx| unsafe {
                ptr::write(ptr as *mut T, f(ctx, entity));
            }))
        }
        ConstructStrategy::WithEntityAndContext(f) => {
            Some(Arc::new(move |ptr, entity, ctx| unsafe {
                ptr::write(ptr as *mut T, f(entity, ctx));
            }))
        }
    }
}

// ---------------------------------------------------------------------------
// FunctionSet
// ---------------------------------------------------------------------------

/// The lifecycle operations synthesized for one registered component type.
///
/// `copy`, `move_assign`, `move_construct`, and `compare` are always
/// present: either the genuine operation or a fail-stub, so the table shape
/// never has to be branched on by the caller (see §4.1 of the design
/// notes). `create` and `destroy` are the two fields that are actually
/// elided when trivial, since eliding them is the performance-relevant
/// optimization.
#[derive(Clone)]
pub struct FunctionSet {
    pub create: Option<CreateFn>,
    pub copy: CopyFn,
    pub move_assign: MoveAssignFn,
    pub move_construct: MoveConstructFn,
    pub destroy: Option<DestroyFn>,
    pub compare: CompareFn,
    pub before_remove: Option<HookFn>,
    pub after_assign: Option<HookFn>,
}

impl fmt::Debug for FunctionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionSet")
            .field("create", &self.create.is_some())
            .field("destroy", &self.destroy.is_some())
            .field("before_remove", &self.before_remove.is_some())
            .field("after_assign", &self.after_assign.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ComponentBuilder
// ---------------------------------------------------------------------------

/// Declares one component type's registration: its construction strategy
/// and which optional capabilities (cloneable, comparable, hooks) it has.
pub struct ComponentBuilder<T> {
    construct: ConstructStrategy<T>,
    default_value: Option<Box<[u8]>>,
    copy: CopyFn,
    compare: CompareFn,
    before_remove: Option<HookFn>,
    after_assign: Option<HookFn>,
}

impl<T: 'static> ComponentBuilder<T> {
    /// Start a builder with the given construction strategy. `copy` and
    /// `compare` default to fail-stubs until [`Self::cloneable`] /
    /// [`Self::comparable`] opt in.
    pub fn new(construct: ConstructStrategy<T>) -> Self {
        Self {
            construct,
            default_value: None,
            copy: copy_fail_stub::<T>,
            compare: compare_fail_stub::<T>,
            before_remove: None,
            after_assign: None,
        }
    }

    /// Supply a default byte pattern used when `create` is absent (i.e. the
    /// strategy is [`ConstructStrategy::Zeroed`] would never need this;
    /// this is for a type with no feasible `create` function at all).
    /// Must be exactly `size_of::<T>()` bytes or registration fails.
    pub fn default_value(mut self, bytes: Box<[u8]>) -> Self {
        self.default_value = Some(bytes);
        self
    }

    /// Run `f` after `destroy` would otherwise be called but before it
    /// runs, while the value is still live.
    pub fn before_remove(mut self, f: impl Fn(&mut T, Entity, &WorldContext) + Send + Sync + 'static) -> Self {
        self.before_remove = Some(Arc::new(move |ptr, entity, ctx| unsafe {
            f(&mut *(ptr as *mut T), entity, ctx)
        }));
        self
    }

    /// Run `f` after a fresh value is placed into a slot, whether by
    /// `create` or by an external move into a component the destination
    /// gained.
    pub fn after_assign(mut self, f: impl Fn(&mut T, Entity, &WorldContext) + Send + Sync + 'static) -> Self {
        self.after_assign = Some(Arc::new(move |ptr, entity, ctx| unsafe {
            f(&mut *(ptr as *mut T), entity, ctx)
        }));
        self
    }
}

impl<T: Clone + 'static> ComponentBuilder<T> {
    /// Populate `copy` with a genuine clone rather than a fail-stub.
    pub fn cloneable(mut self) -> Self {
        self.copy = copy_shim::<T>;
        self
    }
}

impl<T: PartialEq + 'static> ComponentBuilder<T> {
    /// Populate `compare` with genuine equality rather than a fail-stub.
    pub fn comparable(mut self) -> Self {
        self.compare = compare_shim::<T>;
        self
    }
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// The registry record for one component type: its memory layout and its
/// synthesized [`FunctionSet`].
#[derive(Clone)]
pub struct ComponentInfo {
    pub id: ComponentId,
    pub name: &'static str,
    pub size: usize,
    pub align: usize,
    pub type_id: TypeId,
    /// Opaque default byte pattern, used only when `functions.create` is
    /// `None`. Its length always equals `size` when present (validated at
    /// registration).
    pub default_value: Option<Box<[u8]>>,
    pub functions: FunctionSet,
}

impl fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .field("has_default_value", &self.default_value.is_some())
            .field("functions", &self.functions)
            .finish()
    }
}

/// The capability shape compared across repeated registrations of the same
/// type, to detect [`EcsError::RegistrationConflict`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct CapabilityShape {
    has_create: bool,
    has_destroy: bool,
    has_default_value: bool,
    has_before_remove: bool,
    has_after_assign: bool,
}

impl CapabilityShape {
    fn of(info: &ComponentInfo) -> Self {
        Self {
            has_create: info.functions.create.is_some(),
            has_destroy: info.functions.destroy.is_some(),
            has_default_value: info.default_value.is_some(),
            has_before_remove: info.functions.before_remove.is_some(),
            has_after_assign: info.functions.after_assign.is_some(),
        }
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Process-wide (per-`World`) mapping from Rust type to stable
/// [`ComponentId`], append-only after each type's first registration.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentId>,
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            infos: Vec::new(),
        }
    }

    /// Register `T` under `name` with the given builder. Idempotent:
    /// calling again for an already-registered type returns the existing
    /// id as long as the requested capability shape matches; a mismatched
    /// shape is a [`EcsError::RegistrationConflict`].
    pub fn register<T: 'static>(
        &mut self,
        name: &'static str,
        builder: ComponentBuilder<T>,
    ) -> Result<ComponentId, EcsError> {
        let type_id = TypeId::of::<T>();

        let destroy = std::mem::needs_drop::<T>().then_some(destroy_shim::<T> as DestroyFn);
        let create = build_create(builder.construct);

        if let Some(default) = &builder.default_value {
            if default.len() != std::mem::size_of::<T>() {
                return Err(EcsError::RegistrationConflict { name });
            }
        }

        let candidate = ComponentInfo {
            id: ComponentId(self.infos.len() as u32),
            name,
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            type_id,
            default_value: builder.default_value,
            functions: FunctionSet {
                create,
                copy: builder.copy,
                move_assign: move_assign_shim::<T>,
                move_construct: move_construct_shim::<T>,
                destroy,
                compare: builder.compare,
                before_remove: builder.before_remove,
                after_assign: builder.after_assign,
            },
        };

        if let Some(&existing) = self.by_type.get(&type_id) {
            let prior = &self.infos[existing.raw() as usize];
            if CapabilityShape::of(prior) != CapabilityShape::of(&candidate) {
                tracing::warn!(component = name, "registration conflict: capability shape changed");
                return Err(EcsError::RegistrationConflict { name });
            }
            return Ok(existing);
        }

        let id = candidate.id;
        self.infos.push(candidate);
        self.by_type.insert(type_id, id);
        tracing::debug!(component = name, id = id.raw(), "component registered");
        Ok(id)
    }

    /// Look up a component type's id by its Rust `TypeId`.
    pub fn lookup<T: 'static>(&self) -> Option<ComponentId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// The registry record for `id`.
    pub fn info(&self, id: ComponentId) -> Result<&ComponentInfo, EcsError> {
        self.infos
            .get(id.raw() as usize)
            .ok_or(EcsError::UnknownComponent { id })
    }

    /// Total number of registered component types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether any component types have been registered.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
        z: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Name(String);

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    struct Tag;

    fn register_position(reg: &mut ComponentRegistry) -> ComponentId {
        reg.register::<Position>("position", ComponentBuilder::new(ConstructStrategy::Zeroed))
            .unwrap()
    }

    fn register_name(reg: &mut ComponentRegistry) -> ComponentId {
        reg.register::<Name>(
            "name",
            ComponentBuilder::new(ConstructStrategy::Default(|| Name(String::new()))).cloneable(),
        )
        .unwrap()
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = ComponentRegistry::new();
        let id = register_position(&mut reg);
        assert_eq!(reg.lookup::<Position>(), Some(id));
    }

    #[test]
    fn same_type_returns_same_id() {
        let mut reg = ComponentRegistry::new();
        let id1 = register_position(&mut reg);
        let id2 = register_position(&mut reg);
        assert_eq!(id1, id2);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn trivial_type_elides_create_and_destroy() {
        let mut reg = ComponentRegistry::new();
        let id = register_position(&mut reg);
        let info = reg.info(id).unwrap();
        assert!(info.functions.create.is_none());
        assert!(info.functions.destroy.is_none());
    }

    #[test]
    fn non_trivial_type_has_destroy() {
        let mut reg = ComponentRegistry::new();
        let id = register_name(&mut reg);
        let info = reg.info(id).unwrap();
        assert!(info.functions.create.is_some());
        assert!(info.functions.destroy.is_some());
    }

    #[test]
    fn zst_default_is_trivial() {
        let mut reg = ComponentRegistry::new();
        let id = reg
            .register::<Tag>("tag", ComponentBuilder::new(ConstructStrategy::Zeroed))
            .unwrap();
        let info = reg.info(id).unwrap();
        assert!(info.functions.create.is_none());
        assert!(info.functions.destroy.is_none());
    }

    #[test]
    fn registration_conflict_on_incompatible_shape() {
        let mut reg = ComponentRegistry::new();
        register_name(&mut reg);
        let err = reg.register::<Name>(
            "name",
            ComponentBuilder::new(ConstructStrategy::Zeroed),
        );
        assert!(matches!(err, Err(EcsError::RegistrationConflict { .. })));
    }

    #[test]
    fn unknown_component_id_errors() {
        let reg = ComponentRegistry::new();
        let err = reg.info(ComponentId(42));
        assert!(matches!(err, Err(EcsError::UnknownComponent { .. })));
    }
}
