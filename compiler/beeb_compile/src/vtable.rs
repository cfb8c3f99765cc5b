//! Dispatch table construction.
//!
//! One table per instantiated type, built bottom-up through the base
//! chain. The table is explicit data — an ordered slot list — because
//! slot-index stability across a hierarchy is the whole contract: a
//! base-class slot index never changes in a derived class, so a call site
//! compiled against the base dispatches correctly through any derived
//! table.
//!
//! Slots are gated on the translator's call-used set: a virtual method
//! nobody calls through a virtual site occupies no slot anywhere, and an
//! override only lands in a table when the ancestor it replaces is used.

use rustc_hash::{FxHashMap, FxHashSet};

use beeb_types::{MetadataStore, MethodId, TypeId};

use crate::error::CompileError;

/// One dispatch slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VtableSlot {
    /// Position in the table; stable down the hierarchy.
    pub index: u16,
    /// The currently installed implementation.
    pub method: MethodId,
    /// The method whose symbolic slot label this slot occupies (the
    /// nearest overridden ancestor, or `method` itself for a new slot).
    pub overridden: MethodId,
}

/// A type's dispatch table.
#[derive(Debug, Clone)]
pub struct Vtable {
    pub ty: TypeId,
    pub slots: Vec<VtableSlot>,
}

impl Vtable {
    /// The assembly label of the table for a type with the given encoded
    /// name.
    pub fn label(type_encoded: &str) -> String {
        format!("Vtable_{type_encoded}")
    }
}

/// The assembly-level constant naming a slot's byte offset, derived from
/// the method that introduced (or was resolved at) the call site.
pub fn slot_label(method_unique_name: &str) -> String {
    format!("VtableSlot_{method_unique_name}")
}

/// Call-site facts the builder consumes: which methods are reached
/// through virtual call sites, and which types were actually constructed.
#[derive(Debug, Default)]
pub struct VtableTracker {
    used_methods: FxHashSet<MethodId>,
    instantiated: Vec<TypeId>,
    instantiated_set: FxHashSet<TypeId>,
}

impl VtableTracker {
    pub fn new() -> Self {
        VtableTracker::default()
    }

    /// Record a virtual call site resolving to `callee`.
    pub fn record_virtual_call(&mut self, callee: MethodId) {
        self.used_methods.insert(callee);
    }

    /// Record that an object of `ty` is constructed somewhere.
    pub fn mark_instantiated(&mut self, ty: TypeId) {
        if self.instantiated_set.insert(ty) {
            self.instantiated.push(ty);
        }
    }

    /// Instantiated types in first-construction order (the emission
    /// order, which is part of the deterministic output contract).
    pub fn instantiated(&self) -> &[TypeId] {
        &self.instantiated
    }

    /// True when `method` is the target of some virtual call site.
    pub fn is_used(&self, method: MethodId) -> bool {
        self.used_methods.contains(&method)
    }
}

/// Builds dispatch tables for one fixed-point pass. Tables are memoized
/// within the pass; a later pass rebuilds against the grown used set.
pub struct VtableBuilder<'a> {
    store: &'a mut MetadataStore,
    tracker: &'a VtableTracker,
    tables: FxHashMap<TypeId, Vtable>,
}

impl<'a> VtableBuilder<'a> {
    pub fn new(store: &'a mut MetadataStore, tracker: &'a VtableTracker) -> Self {
        VtableBuilder {
            store,
            tracker,
            tables: FxHashMap::default(),
        }
    }

    /// Build tables for every instantiated type, in instantiation order.
    pub fn build_all(mut self) -> Result<Vec<Vtable>, CompileError> {
        let types: Vec<TypeId> = self.tracker.instantiated().to_vec();
        types.into_iter().map(|ty| self.vtable(ty)).collect()
    }

    /// The (memoized) table for `ty`.
    fn vtable(&mut self, ty: TypeId) -> Result<Vtable, CompileError> {
        if let Some(table) = self.tables.get(&ty) {
            return Ok(table.clone());
        }

        // Base table first: derived tables extend and patch it in place.
        self.store.ensure_classified(ty)?;
        let mut slots = match self.store.ctx().base_of(ty) {
            Some(base) => self.vtable(base)?.slots,
            None => Vec::new(),
        };

        for method in self.store.methods_of(ty)? {
            let data = self.store.ctx().method(method);
            if !data.is_virtual {
                continue;
            }
            if data.is_new_slot {
                // A newly introduced virtual gets a slot only if some call
                // site actually reaches it.
                if self.tracker.is_used(method) {
                    let index = u16::try_from(slots.len()).unwrap_or(u16::MAX);
                    slots.push(VtableSlot {
                        index,
                        method,
                        overridden: method,
                    });
                }
            } else {
                let overridden = self.find_overridden(method)?;
                if self.tracker.is_used(overridden) {
                    // Replace in place at the ancestor's index; the slot
                    // position is the binary dispatch contract.
                    let position = slots
                        .iter()
                        .position(|s| s.method == overridden)
                        .ok_or_else(|| CompileError::BrokenOverrideChain {
                            method: data.unique_name.clone(),
                        })?;
                    slots[position] = VtableSlot {
                        index: slots[position].index,
                        method,
                        overridden,
                    };
                }
            }
        }

        let table = Vtable { ty, slots };
        self.tables.insert(ty, table.clone());
        Ok(table)
    }

    /// The nearest ancestor declaring a signature-compatible method of
    /// the same name.
    fn find_overridden(&mut self, method: MethodId) -> Result<MethodId, CompileError> {
        let data = self.store.ctx().method(method);
        let mut current = self.store.ctx().base_of(data.declaring_type);
        while let Some(base) = current {
            self.store.methods_of(base)?;
            if let Some(found) = self.store.ctx().find_method(base, &data.name, &data.signature) {
                return Ok(found);
            }
            self.store.ensure_classified(base)?;
            current = self.store.ctx().base_of(base);
        }
        Err(CompileError::BrokenOverrideChain {
            method: data.unique_name,
        })
    }
}

#[cfg(test)]
mod tests;
