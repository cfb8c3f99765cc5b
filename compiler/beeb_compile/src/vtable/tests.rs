//! Slot stability and call-used gating tests over synthetic hierarchies.

use beeb_types::entity::MethodSpec;
use beeb_types::{MetadataStore, MethodId, MethodSignature, PrimitiveKind, TypeId};
use pretty_assertions::assert_eq;

use super::{VtableBuilder, VtableTracker};

struct Fixture {
    store: MetadataStore,
}

impl Fixture {
    fn new() -> Self {
        Fixture {
            store: MetadataStore::new(2),
        }
    }

    fn class(&mut self, name: &str, base: Option<TypeId>) -> TypeId {
        let ctx = self.store.ctx();
        let ty = ctx.declare_type("Demo", name);
        ctx.set_base(ty, base);
        ctx.set_value_type(ty, false);
        ctx.define_fields(ty, vec![]);
        ty
    }

    fn virtual_method(&mut self, ty: TypeId, name: &str, new_slot: bool) -> MethodId {
        let ctx = self.store.ctx();
        let int32 = ctx.primitive(PrimitiveKind::Int32);
        ctx.define_method(
            ty,
            MethodSpec {
                name: name.to_owned(),
                signature: MethodSignature::instance_sig(int32, vec![]),
                is_static: false,
                is_virtual: true,
                is_new_slot: new_slot,
                locals: vec![],
                body: None,
            },
        )
    }
}

#[test]
fn override_replaces_base_slot_in_place() {
    let mut f = Fixture::new();
    let base = f.class("Base", None);
    let derived = f.class("Derived", Some(base));
    let base_get = f.virtual_method(base, "GetValue", true);
    let derived_get = f.virtual_method(derived, "GetValue", false);

    let mut tracker = VtableTracker::new();
    tracker.record_virtual_call(base_get);
    tracker.mark_instantiated(derived);

    let tables = VtableBuilder::new(&mut f.store, &tracker).build_all().unwrap();
    assert_eq!(tables.len(), 1);
    let slots = &tables[0].slots;
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].index, 0);
    assert_eq!(slots[0].method, derived_get);
    assert_eq!(slots[0].overridden, base_get);
}

#[test]
fn uncalled_virtuals_occupy_no_slot() {
    let mut f = Fixture::new();
    let base = f.class("Base", None);
    let derived = f.class("Derived", Some(base));
    f.virtual_method(base, "GetValue", true);
    f.virtual_method(derived, "GetValue", false);

    let tracker = {
        let mut t = VtableTracker::new();
        t.mark_instantiated(derived);
        t
    };
    let tables = VtableBuilder::new(&mut f.store, &tracker).build_all().unwrap();
    assert!(tables[0].slots.is_empty());
}

#[test]
fn new_virtuals_append_after_inherited_slots() {
    let mut f = Fixture::new();
    let base = f.class("Base", None);
    let derived = f.class("Derived", Some(base));
    let base_get = f.virtual_method(base, "GetValue", true);
    let derived_get = f.virtual_method(derived, "GetValue", false);
    let extra = f.virtual_method(derived, "Extra", true);

    let mut tracker = VtableTracker::new();
    tracker.record_virtual_call(base_get);
    tracker.record_virtual_call(extra);
    tracker.mark_instantiated(derived);

    let tables = VtableBuilder::new(&mut f.store, &tracker).build_all().unwrap();
    let slots = &tables[0].slots;
    assert_eq!(slots.len(), 2);
    assert_eq!((slots[0].index, slots[0].method), (0, derived_get));
    assert_eq!((slots[1].index, slots[1].method), (1, extra));
}

#[test]
fn slot_index_is_stable_down_a_three_level_chain() {
    let mut f = Fixture::new();
    let a = f.class("A", None);
    let b = f.class("B", Some(a));
    let c = f.class("C", Some(b));
    let a_get = f.virtual_method(a, "GetValue", true);
    let b_get = f.virtual_method(b, "GetValue", false);
    let c_get = f.virtual_method(c, "GetValue", false);

    let mut tracker = VtableTracker::new();
    tracker.record_virtual_call(a_get);
    // C's override replaces B's, which must itself be considered used
    // through the slot it occupies.
    tracker.record_virtual_call(b_get);
    tracker.mark_instantiated(b);
    tracker.mark_instantiated(c);

    let tables = VtableBuilder::new(&mut f.store, &tracker).build_all().unwrap();
    assert_eq!(tables.len(), 2);
    let b_table = &tables[0];
    let c_table = &tables[1];
    assert_eq!(b_table.slots[0].index, 0);
    assert_eq!(b_table.slots[0].method, b_get);
    assert_eq!(c_table.slots[0].index, 0);
    assert_eq!(c_table.slots[0].method, c_get);
}

#[test]
fn override_without_ancestor_is_a_broken_chain() {
    let mut f = Fixture::new();
    let base = f.class("Base", None);
    let derived = f.class("Derived", Some(base));
    f.virtual_method(derived, "Ghost", false);

    let tracker = {
        let mut t = VtableTracker::new();
        t.mark_instantiated(derived);
        t
    };
    let result = VtableBuilder::new(&mut f.store, &tracker).build_all();
    assert!(matches!(
        result,
        Err(crate::error::CompileError::BrokenOverrideChain { .. })
    ));
}

#[test]
fn instantiation_order_is_preserved_and_deduplicated() {
    let mut tracker = VtableTracker::new();
    let mut f = Fixture::new();
    let a = f.class("A", None);
    let b = f.class("B", None);
    tracker.mark_instantiated(b);
    tracker.mark_instantiated(a);
    tracker.mark_instantiated(b);
    assert_eq!(tracker.instantiated(), &[b, a]);
}
