//! Archetype storage and the precomputed [`ArchetypeOperationHelper`].
//!
//! An [`Archetype`] stores every entity that shares one exact
//! [`ComponentIdMask`], Structure-of-Arrays style: one [`Column`] of raw
//! bytes per component, plus a parallel `Vec<Entity>`. The
//! [`ArchetypeOperationHelper`] is computed once, at archetype-creation
//! time, from that mask and the [`ComponentRegistry`]; every later
//! structural edit (spawn, despawn, insert, remove, migrate) walks its five
//! precomputed tables instead of re-deriving which lifecycle functions apply
//! per component.
//!
//! # Safety
//!
//! This module's `unsafe` is localized to [`Column`], which owns the only
//! raw byte buffers in the crate, and to the table-walking methods on
//! [`ArchetypeOperationHelper`], which call through type-erased function
//! pointers over those buffers. Everything above this module is safe code.

use std::alloc::{self, Layout};
use std::collections::HashMap;
use std::fmt;
use std::ptr;
use std::sync::Arc;

use crate::component::{
    ComponentRegistry, CompareFn, CopyFn, CreateFn, DestroyFn, HookFn, MoveAssignFn,
    MoveConstructFn,
};
use crate::context::WorldContext;
use crate::entity::Entity;
use crate::error::EcsError;
use crate::mask::{ComponentId, ComponentIdMask, ComponentIndex};

// ---------------------------------------------------------------------------
// ArchetypeId
// ---------------------------------------------------------------------------

/// Identifies an archetype within a [`World`](crate::world::World).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchetypeId(pub(crate) u32);

// ---------------------------------------------------------------------------
// Column -- type-erased, byte-addressed component storage
// ---------------------------------------------------------------------------

/// A densely packed, type-erased array of component values of one type.
///
/// `Column` knows nothing about lifecycle functions; it only manages the
/// backing allocation and raw byte slots. Constructing, destroying, and
/// moving values through those slots is the [`ArchetypeOperationHelper`]'s
/// job, matching the layering the design favors: unsafety stays in one
/// small abstraction, the rest of the crate calls through it.
pub struct Column {
    data: *mut u8,
    len: usize,
    capacity: usize,
    item_size: usize,
    item_align: usize,
}

// Column only stores raw bytes; callers guarantee the concrete component
// type is itself Send + Sync before sharing an Archetype across threads.
unsafe impl Send for Column {}
unsafe impl Sync for Column {}

impl Column {
    /// A new, empty column sized for a component of `size`/`align`.
    pub fn new(size: usize, align: usize) -> Self {
        Self {
            data: ptr::null_mut(),
            len: 0,
            capacity: 0,
            item_size: size,
            item_align: align,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn layout_for_capacity(&self, cap: usize) -> Option<Layout> {
        if self.item_size == 0 || cap == 0 {
            return None;
        }
        Layout::from_size_align(self.item_size * cap, self.item_align).ok()
    }

    fn grow_if_needed(&mut self) {
        if self.len < self.capacity {
            return;
        }
        let new_cap = if self.capacity == 0 { 4 } else { self.capacity * 2 };
        if self.item_size == 0 {
            self.capacity = new_cap;
            return;
        }
        let new_layout = self
            .layout_for_capacity(new_cap)
            .expect("column layout overflow");
        unsafe {
            let new_data = if self.capacity == 0 {
                alloc::alloc(new_layout)
            } else {
                let old_layout = self
                    .layout_for_capacity(self.capacity)
                    .expect("old layout must be valid");
                alloc::realloc(self.data, old_layout, new_layout.size())
            };
            assert!(!new_data.is_null(), "allocation failed");
            self.data = new_data;
        }
        self.capacity = new_cap;
    }

    #[inline]
    fn slot_ptr(&self, index: usize) -> *mut u8 {
        if self.item_size == 0 {
            return self.item_align as *mut u8;
        }
        unsafe { self.data.add(index * self.item_size) }
    }

    /// Reserve room for one more element and return a pointer to the new
    /// slot, zeroed. The caller must still construct a value into it for
    /// every non-trivial component (via the helper's `create`/
    /// `move_construct`/default byte-copy path); only a trivially
    /// default-constructible type may rely on the zeroed bytes being a
    /// valid value and leave the slot untouched.
    pub fn push_uninit(&mut self) -> *mut u8 {
        self.grow_if_needed();
        let ptr = self.slot_ptr(self.len);
        if self.item_size > 0 {
            unsafe { ptr::write_bytes(ptr, 0, self.item_size) };
        }
        self.len += 1;
        ptr
    }

    /// Raw pointer to the live element at `index`.
    ///
    /// # Safety
    /// `index` must be `< self.len()`.
    #[inline]
    pub unsafe fn get_raw(&self, index: usize) -> *const u8 {
        debug_assert!(index < self.len);
        self.slot_ptr(index)
    }

    /// Mutable raw pointer to the live element at `index`.
    ///
    /// # Safety
    /// `index` must be `< self.len()`.
    #[inline]
    pub unsafe fn get_raw_mut(&mut self, index: usize) -> *mut u8 {
        debug_assert!(index < self.len);
        self.slot_ptr(index)
    }

    /// Relocate the last element into `index`'s slot by raw byte copy and
    /// shrink the column by one. Safe to call on any component type: Rust
    /// values are always relocatable by memcpy, so no per-type function is
    /// needed for this physical shuffle. The value previously at `index`
    /// must already have been destroyed by the caller (via the helper's
    /// `destroy_all`) before this is called.
    ///
    /// # Safety
    /// `index` must be `< self.len()` and the value at `index` must already
    /// be logically destroyed (no live value, no outstanding references).
    pub unsafe fn swap_remove_no_drop(&mut self, index: usize) {
        debug_assert!(index < self.len);
        let last = self.len - 1;
        if self.item_size > 0 && index != last {
            let src = self.slot_ptr(last);
            let dst = self.slot_ptr(index);
            ptr::copy_nonoverlapping(src, dst, self.item_size);
        }
        self.len -= 1;
    }

    /// Drop every remaining element via `destroy` (skipped when `None`,
    /// i.e. the type needs no destructor), then free the backing
    /// allocation.
    ///
    /// # Safety
    /// `destroy`, if present, must be the correct destructor for this
    /// column's component type.
    pub unsafe fn drop_all(&mut self, destroy: Option<DestroyFn>) {
        if let Some(destroy) = destroy {
            for i in 0..self.len {
                destroy(self.slot_ptr(i));
            }
        }
        if self.item_size > 0 && self.capacity > 0 {
            let layout = self
                .layout_for_capacity(self.capacity)
                .expect("layout must be valid");
            alloc::dealloc(self.data, layout);
        }
        self.data = ptr::null_mut();
        self.len = 0;
        self.capacity = 0;
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("item_size", &self.item_size)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ArchetypeOperationHelper
// ---------------------------------------------------------------------------

struct InsertEntry {
    index: ComponentIndex,
    create: CreateFn,
    after_assign: Option<HookFn>,
}

struct CreateWithValueEntry {
    index: ComponentIndex,
    default_value: Arc<[u8]>,
    after_assign: Option<HookFn>,
}

struct DestroyEntry {
    index: ComponentIndex,
    destroy: DestroyFn,
    before_remove: Option<HookFn>,
}

struct InternalMoveEntry {
    index: ComponentIndex,
    move_assign: MoveAssignFn,
}

struct ExternalMoveEntry {
    index: ComponentIndex,
    id: ComponentId,
    move_construct: MoveConstructFn,
    create: Option<CreateFn>,
    default_value: Option<Arc<[u8]>>,
    after_assign: Option<HookFn>,
}

/// Per-component layout info the archetype needs to build its columns,
/// cached alongside the operation tables so `Archetype::new` doesn't need a
/// second pass over the registry.
#[derive(Clone, Copy)]
pub(crate) struct ColumnLayout {
    pub size: usize,
    pub align: usize,
    pub destroy: Option<DestroyFn>,
    pub copy: CopyFn,
    pub compare: CompareFn,
}

/// A precomputed, per-archetype dispatch table: given only a
/// [`ComponentIdMask`], five parallel operation tables plus the two index
/// maps that tie [`ComponentId`] to a dense [`ComponentIndex`] within this
/// archetype. Built once when the archetype is created; immutable after
/// that.
pub struct ArchetypeOperationHelper {
    id_to_index: HashMap<ComponentId, ComponentIndex>,
    index_to_id: Vec<ComponentId>,
    insert: Vec<InsertEntry>,
    create_with_value: Vec<CreateWithValueEntry>,
    destroy: Vec<DestroyEntry>,
    internal_move: Vec<InternalMoveEntry>,
    external_move: Vec<ExternalMoveEntry>,
    pub(crate) layouts: Vec<ColumnLayout>,
}

impl ArchetypeOperationHelper {
    /// Build the helper for `mask`, resolving each id against `registry` in
    /// a single ascending-order pass. Fails with [`EcsError::MaskOutOfRange`]
    /// if `mask` names an id the registry has never seen.
    pub fn new(mask: &ComponentIdMask, registry: &ComponentRegistry) -> Result<Self, EcsError> {
        let mut id_to_index = HashMap::with_capacity(mask.len());
        let mut index_to_id = Vec::with_capacity(mask.len());
        let mut insert = Vec::new();
        let mut create_with_value = Vec::new();
        let mut destroy = Vec::new();
        let mut internal_move = Vec::new();
        let mut external_move = Vec::with_capacity(mask.len());
        let mut layouts = Vec::with_capacity(mask.len());

        for (i, &id) in mask.items().iter().enumerate() {
            let index = ComponentIndex(i as u32);
            let info = registry
                .info(id)
                .map_err(|_| EcsError::MaskOutOfRange { id })?;

            index_to_id.push(id);
            id_to_index.insert(id, index);
            layouts.push(ColumnLayout {
                size: info.size,
                align: info.align,
                destroy: info.functions.destroy,
                copy: info.functions.copy,
                compare: info.functions.compare,
            });

            let default_arc: Option<Arc<[u8]>> =
                info.default_value.as_ref().map(|b| Arc::from(b.as_ref()));

            if let Some(create) = &info.functions.create {
                insert.push(InsertEntry {
                    index,
                    create: create.clone(),
                    after_assign: info.functions.after_assign.clone(),
                });
            } else if let Some(default_value) = default_arc.clone() {
                create_with_value.push(CreateWithValueEntry {
                    index,
                    default_value,
                    after_assign: info.functions.after_assign.clone(),
                });
            }

            if let Some(destroy_fn) = info.functions.destroy {
                destroy.push(DestroyEntry {
                    index,
                    destroy: destroy_fn,
                    before_remove: info.functions.before_remove.clone(),
                });
                // Non-trivial to destroy implies non-trivial to relocate
                // into an occupied slot: the old value must be dropped
                // before the new one overwrites it, so this is the only
                // case `internal_move` needs a real function call rather
                // than a raw byte copy.
                internal_move.push(InternalMoveEntry {
                    index,
                    move_assign: info.functions.move_assign,
                });
            }

            external_move.push(ExternalMoveEntry {
                index,
                id,
                move_construct: info.functions.move_construct,
                create: info.functions.create.clone(),
                default_value: default_arc,
                after_assign: info.functions.after_assign.clone(),
            });
        }

        Ok(Self {
            id_to_index,
            index_to_id,
            insert,
            create_with_value,
            destroy,
            internal_move,
            external_move,
            layouts,
        })
    }

    /// Number of components this helper was built for.
    #[inline]
    pub fn len(&self) -> usize {
        self.index_to_id.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index_to_id.is_empty()
    }

    /// The dense index a component occupies in this archetype, if present.
    pub fn id_to_index(&self, id: ComponentId) -> Option<ComponentIndex> {
        self.id_to_index.get(&id).copied()
    }

    /// The component occupying a given dense index.
    pub fn index_to_id(&self, index: ComponentIndex) -> Option<ComponentId> {
        self.index_to_id.get(index.raw()).copied()
    }

    /// Ids that appear in the `insert` table (non-trivial `create`).
    pub fn insert_ids(&self) -> Vec<ComponentId> {
        self.insert.iter().map(|e| self.index_to_id[e.index.raw()]).collect()
    }

    /// Ids that appear in the `create_with_value` table.
    pub fn create_with_value_ids(&self) -> Vec<ComponentId> {
        self.create_with_value
            .iter()
            .map(|e| self.index_to_id[e.index.raw()])
            .collect()
    }

    /// Ids that appear in the `destroy` table (non-trivial destructor).
    pub fn destroy_ids(&self) -> Vec<ComponentId> {
        self.destroy.iter().map(|e| self.index_to_id[e.index.raw()]).collect()
    }

    /// Ids that appear in the `internal_move` table.
    pub fn internal_move_ids(&self) -> Vec<ComponentId> {
        self.internal_move
            .iter()
            .map(|e| self.index_to_id[e.index.raw()])
            .collect()
    }

    /// Ids that appear in the `external_move` table (always all of them).
    pub fn external_move_ids(&self) -> Vec<ComponentId> {
        self.external_move.iter().map(|e| e.id).collect()
    }

    /// Construct a fresh row: run `create` for every `insert` entry and
    /// byte-copy default patterns for every `create_with_value` entry, in
    /// canonical order, firing `after_assign` after each. A component in
    /// neither table (trivially default-constructible, no default
    /// pattern) is left untouched: its slot was already zeroed by
    /// [`Column::push_uninit`], which is a valid value for such a type.
    ///
    /// # Safety
    /// `dst_row[i]` must be zeroed, uninitialized storage sized/aligned for
    /// the component at `ComponentIndex(i)`, for every `i` this helper
    /// touches (as returned by [`Column::push_uninit`]).
    pub unsafe fn construct_all(&self, dst_row: &[*mut u8], entity: Entity, ctx: &WorldContext) {
        for entry in &self.insert {
            let slot = dst_row[entry.index.raw()];
            (entry.create)(slot, entity, ctx);
            if let Some(hook) = &entry.after_assign {
                hook(slot, entity, ctx);
            }
        }
        for entry in &self.create_with_value {
            let slot = dst_row[entry.index.raw()];
            ptr::copy_nonoverlapping(entry.default_value.as_ptr(), slot, entry.default_value.len());
            if let Some(hook) = &entry.after_assign {
                hook(slot, entity, ctx);
            }
        }
    }

    /// Destroy a row: fire `before_remove` then `destroy` for every
    /// `destroy` entry, in canonical order.
    ///
    /// # Safety
    /// `row[i]` must hold a live value of the component at `ComponentIndex(i)`
    /// for every `i` this helper touches.
    pub unsafe fn destroy_all(&self, row: &[*mut u8], entity: Entity, ctx: &WorldContext) {
        for entry in &self.destroy {
            let slot = row[entry.index.raw()];
            if let Some(hook) = &entry.before_remove {
                hook(slot, entity, ctx);
            }
            (entry.destroy)(slot);
        }
    }

    /// Relocate data between two rows of the *same* archetype where the
    /// destination slots already hold live values that must be dropped
    /// before being overwritten (e.g. reordering rows without destroying
    /// the moved-from entity). Trivially-destructible components are
    /// skipped here; the caller relocates them with a raw byte copy
    /// instead (always sound in Rust, so no call is needed).
    ///
    /// # Safety
    /// Both rows must hold live values for every component this helper's
    /// `internal_move` table names.
    pub unsafe fn move_internal(&self, dst_row: &[*mut u8], src_row: &[*mut u8]) {
        for entry in &self.internal_move {
            (entry.move_assign)(dst_row[entry.index.raw()], src_row[entry.index.raw()]);
        }
    }

    /// Relocate an entity's data across an archetype transition: for every
    /// component this (destination) archetype has, move-construct from the
    /// source row if the source archetype also has it, otherwise
    /// initialize fresh (`create`, else default bytes, else leave the
    /// already-zeroed slot alone) and fire `after_assign`. Components only
    /// in the source archetype are the caller's responsibility, via
    /// `src_helper.destroy_all`.
    ///
    /// # Safety
    /// `dst_row[i]` must be zeroed, uninitialized storage (as returned by
    /// [`Column::push_uninit`]) for every `i` this helper's `external_move`
    /// table names; `src_row[j]` must hold a live value for every index
    /// `src_helper` reports for a shared component.
    pub unsafe fn move_external(
        &self,
        dst_row: &[*mut u8],
        src_row: &[*mut u8],
        src_helper: &ArchetypeOperationHelper,
        entity: Entity,
        ctx: &WorldContext,
    ) {
        for entry in &self.external_move {
            let dst_slot = dst_row[entry.index.raw()];
            if let Some(src_index) = src_helper.id_to_index(entry.id) {
                (entry.move_construct)(dst_slot, src_row[src_index.raw()]);
                continue;
            }
            if let Some(create) = &entry.create {
                create(dst_slot, entity, ctx);
            } else if let Some(default_value) = &entry.default_value {
                ptr::copy_nonoverlapping(default_value.as_ptr(), dst_slot, default_value.len());
            }
            if let Some(hook) = &entry.after_assign {
                hook(dst_slot, entity, ctx);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Archetype
// ---------------------------------------------------------------------------

/// Entities sharing one exact [`ComponentIdMask`], stored Structure-of-Arrays
/// style: one [`Column`] per component, indexed by the same
/// [`ComponentIndex`] the [`ArchetypeOperationHelper`] assigned it, plus a
/// parallel `Vec<Entity>`.
pub struct Archetype {
    id: ArchetypeId,
    mask: ComponentIdMask,
    helper: ArchetypeOperationHelper,
    columns: Vec<Column>,
    entities: Vec<Entity>,
}

impl Archetype {
    /// Create a new, empty archetype for `mask`.
    pub fn new(
        id: ArchetypeId,
        mask: ComponentIdMask,
        registry: &ComponentRegistry,
    ) -> Result<Self, EcsError> {
        let helper = ArchetypeOperationHelper::new(&mask, registry)?;
        let columns = helper
            .layouts
            .iter()
            .map(|layout| Column::new(layout.size, layout.align))
            .collect();
        Ok(Self {
            id,
            mask,
            helper,
            columns,
            entities: Vec::new(),
        })
    }

    #[inline]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    #[inline]
    pub fn mask(&self) -> &ComponentIdMask {
        &self.mask
    }

    #[inline]
    pub fn helper(&self) -> &ArchetypeOperationHelper {
        &self.helper
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn has_component(&self, id: ComponentId) -> bool {
        self.helper.id_to_index(id).is_some()
    }

    /// Append a fresh row for `entity`, running every component's `create`
    /// (or default-value copy) via the helper. Returns the new row index.
    pub fn spawn_row(&mut self, entity: Entity, ctx: &WorldContext) -> usize {
        let row = self.entities.len();
        self.entities.push(entity);
        let slots: Vec<*mut u8> = self.columns.iter_mut().map(Column::push_uninit).collect();
        unsafe {
            self.helper.construct_all(&slots, entity, ctx);
        }
        row
    }

    /// Destroy the row at `row` (running `before_remove`/`destroy` via the
    /// helper) and compact storage with a swap-from-the-end. Returns the
    /// entity that was relocated into `row`, if the removed row was not
    /// already last.
    pub fn despawn_row(&mut self, row: usize, ctx: &WorldContext) -> Option<Entity> {
        let entity = self.entities[row];
        let last = self.entities.len() - 1;
        let slots: Vec<*mut u8> = self
            .columns
            .iter_mut()
            .map(|c| unsafe { c.get_raw_mut(row) })
            .collect();
        unsafe {
            self.helper.destroy_all(&slots, entity, ctx);
        }
        self.entities.swap_remove(row);
        for column in &mut self.columns {
            unsafe {
                column.swap_remove_no_drop(row);
            }
        }
        if row < last {
            Some(self.entities[row])
        } else {
            None
        }
    }

    /// Extract the row at `row` into `dst`'s fresh row for `entity`,
    /// migrating shared components by move-construction and initializing
    /// components `dst` gained fresh, then destroying whatever `self` had
    /// that `dst` does not. Returns `(dst_row, relocated_entity)` where
    /// `relocated_entity` is whoever was swapped into `row` in `self`.
    pub fn migrate_row(
        &mut self,
        row: usize,
        dst: &mut Archetype,
        entity: Entity,
        ctx: &WorldContext,
    ) -> (usize, Option<Entity>) {
        let dst_row = dst.entities.len();
        dst.entities.push(entity);
        let dst_slots: Vec<*mut u8> = dst.columns.iter_mut().map(Column::push_uninit).collect();
        let src_slots: Vec<*mut u8> = self
            .columns
            .iter_mut()
            .map(|c| unsafe { c.get_raw_mut(row) })
            .collect();
        unsafe {
            dst.helper
                .move_external(&dst_slots, &src_slots, &self.helper, entity, ctx);
        }

        // Components only `self` had are moved-from but still need their
        // destructor run via `self`'s own destroy table; components shared
        // with `dst` were consumed by move_construct above and must not be
        // destroyed again.
        for entry in &self.helper.destroy {
            let id = self.helper.index_to_id[entry.index.raw()];
            if dst.has_component(id) {
                continue;
            }
            let slot = src_slots[entry.index.raw()];
            if let Some(hook) = &entry.before_remove {
                unsafe { hook(slot, entity, ctx) };
            }
            unsafe { (entry.destroy)(slot) };
        }

        let last = self.entities.len() - 1;
        self.entities.swap_remove(row);
        for column in &mut self.columns {
            unsafe {
                column.swap_remove_no_drop(row);
            }
        }
        let relocated = if row < last { Some(self.entities[row]) } else { None };
        (dst_row, relocated)
    }

    /// Raw pointer to a component's slot at `row`, if the archetype has
    /// that component and `row` is in bounds.
    ///
    /// # Safety
    /// The caller must read/write through the returned pointer only as the
    /// concrete type registered for `id`.
    pub unsafe fn component_ptr(&self, row: usize, id: ComponentId) -> Option<*const u8> {
        let index = self.helper.id_to_index(id)?;
        let column = &self.columns[index.raw()];
        if row >= column.len() {
            return None;
        }
        Some(column.get_raw(row))
    }

    /// Mutable raw pointer to a component's slot at `row`. See
    /// [`Self::component_ptr`].
    ///
    /// # Safety
    /// Same contract as [`Self::component_ptr`].
    pub unsafe fn component_ptr_mut(&mut self, row: usize, id: ComponentId) -> Option<*mut u8> {
        let index = self.helper.id_to_index(id)?;
        let column = &mut self.columns[index.raw()];
        if row >= column.len() {
            return None;
        }
        Some(column.get_raw_mut(row))
    }
}

impl Drop for Archetype {
    fn drop(&mut self) {
        for (i, column) in self.columns.iter_mut().enumerate() {
            unsafe {
                column.drop_all(self.helper.layouts[i].destroy);
            }
        }
    }
}

impl fmt::Debug for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("mask", &self.mask)
            .field("len", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
