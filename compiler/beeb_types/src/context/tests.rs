//! Type identity and layout tests.
//!
//! These run against the same declaration API the metadata store drives,
//! so they hold for image-backed types as well.

use crate::entity::{FieldSpec, MethodSpec, PrimitiveKind};
use crate::{MethodSignature, TypeContext, TypeKind};
use pretty_assertions::assert_eq;

fn ctx() -> TypeContext {
    TypeContext::new(2)
}

fn field(name: &str, ty: crate::TypeId, is_static: bool) -> FieldSpec {
    FieldSpec {
        name: name.to_owned(),
        ty,
        is_static,
    }
}

#[test]
fn derived_types_are_interned_by_identity() {
    let ctx = ctx();
    let int32 = ctx.primitive(PrimitiveKind::Int32);
    let int64 = ctx.primitive(PrimitiveKind::Int64);

    assert_eq!(ctx.pointer_to(int32), ctx.pointer_to(int32));
    assert_eq!(ctx.by_ref_to(int32), ctx.by_ref_to(int32));
    assert_eq!(ctx.sz_array_of(int32), ctx.sz_array_of(int32));
    assert_eq!(ctx.primitive(PrimitiveKind::Int32), int32);

    assert_ne!(ctx.pointer_to(int32), ctx.pointer_to(int64));
    assert_ne!(ctx.pointer_to(int32), ctx.by_ref_to(int32));

    // Nested shapes intern too.
    let pp = ctx.pointer_to(ctx.pointer_to(int32));
    assert_eq!(pp, ctx.pointer_to(ctx.pointer_to(int32)));
}

#[test]
fn primitive_sizes() {
    let ctx = ctx();
    let cases = [
        (PrimitiveKind::Void, 0),
        (PrimitiveKind::Boolean, 1),
        (PrimitiveKind::Char, 1),
        (PrimitiveKind::Int16, 2),
        (PrimitiveKind::Int32, 4),
        (PrimitiveKind::Int64, 8),
        (PrimitiveKind::Double, 8),
        // Pointer-sized kinds follow the target width (2 here).
        (PrimitiveKind::IntPtr, 2),
        (PrimitiveKind::String, 2),
        (PrimitiveKind::Object, 2),
    ];
    for (kind, size) in cases {
        assert_eq!(ctx.size_of(ctx.primitive(kind)), size, "{kind:?}");
    }
}

#[test]
fn value_type_layout_accumulates_offsets() {
    let ctx = ctx();
    let int32 = ctx.primitive(PrimitiveKind::Int32);
    let boolean = ctx.primitive(PrimitiveKind::Boolean);

    let point = ctx.declare_type("Demo", "Point");
    ctx.set_base(point, None);
    ctx.set_value_type(point, true);
    let ids = ctx.define_fields(
        point,
        vec![
            field("X", int32, false),
            field("Flag", boolean, false),
            field("Y", int32, false),
        ],
    );

    let offsets: Vec<u32> = ids.iter().map(|&id| ctx.field(id).offset).collect();
    assert_eq!(offsets, vec![0, 4, 5]);
    assert_eq!(ctx.instance_size(point), 9);
    // A value type's slot size is its instance size.
    assert_eq!(ctx.size_of(point), 9);
    assert!(!ctx.is_pointer_like(point));
}

#[test]
fn reference_type_size_is_pointer_width() {
    let ctx = ctx();
    let int64 = ctx.primitive(PrimitiveKind::Int64);

    let node = ctx.declare_type("Demo", "Node");
    ctx.set_base(node, None);
    ctx.set_value_type(node, false);
    ctx.define_fields(node, vec![field("A", int64, false), field("B", int64, false)]);

    assert_eq!(ctx.instance_size(node), 16);
    // Regardless of instance size, a reference type occupies one pointer.
    assert_eq!(ctx.size_of(node), 2);
    assert!(ctx.is_pointer_like(node));
}

#[test]
fn static_fields_take_no_instance_space() {
    let ctx = ctx();
    let int32 = ctx.primitive(PrimitiveKind::Int32);

    let counters = ctx.declare_type("Demo", "Counters");
    ctx.set_base(counters, None);
    ctx.set_value_type(counters, false);
    let ids = ctx.define_fields(
        counters,
        vec![
            field("Total", int32, true),
            field("Instance", int32, false),
            field("HighWater", int32, true),
        ],
    );

    assert_eq!(ctx.field(ids[0]).offset, 0);
    assert_eq!(ctx.field(ids[1]).offset, 0);
    assert_eq!(ctx.field(ids[2]).offset, 0);
    assert_eq!(ctx.instance_size(counters), 4);
}

#[test]
fn instance_receiver_typing() {
    let ctx = ctx();
    let int32 = ctx.primitive(PrimitiveKind::Int32);
    let void = ctx.primitive(PrimitiveKind::Void);

    let point = ctx.declare_type("Demo", "Point");
    ctx.set_base(point, None);
    ctx.set_value_type(point, true);
    ctx.define_fields(point, vec![field("X", int32, false)]);

    let method = ctx.define_method(
        point,
        MethodSpec {
            name: "Reset".to_owned(),
            signature: MethodSignature::instance_sig(void, vec![int32]),
            is_static: false,
            is_virtual: false,
            is_new_slot: false,
            locals: vec![],
            body: None,
        },
    );
    let data = ctx.method(method);

    // Value-type receiver arrives by reference; declared parameters
    // follow at accumulated offsets.
    assert_eq!(data.params.len(), 2);
    assert_eq!(data.params[0].ty, ctx.by_ref_to(point));
    assert_eq!(data.params[0].offset, 0);
    assert_eq!(data.params[1].ty, int32);
    assert_eq!(data.params[1].offset, 2);
    assert_eq!(data.params_size, 6);

    let node = ctx.declare_type("Demo", "Node");
    ctx.set_base(node, None);
    ctx.set_value_type(node, false);
    ctx.define_fields(node, vec![]);
    let method = ctx.define_method(
        node,
        MethodSpec {
            name: "Touch".to_owned(),
            signature: MethodSignature::instance_sig(void, vec![]),
            is_static: false,
            is_virtual: false,
            is_new_slot: false,
            locals: vec![],
            body: None,
        },
    );
    // Reference-type receiver is the type itself.
    assert_eq!(ctx.method(method).params[0].ty, node);
}

#[test]
fn locals_layout_accumulates_offsets() {
    let ctx = ctx();
    let int32 = ctx.primitive(PrimitiveKind::Int32);
    let string = ctx.primitive(PrimitiveKind::String);
    let void = ctx.primitive(PrimitiveKind::Void);

    let owner = ctx.declare_type("Demo", "Program");
    ctx.set_base(owner, None);
    ctx.set_value_type(owner, false);
    ctx.define_fields(owner, vec![]);

    let method = ctx.define_method(
        owner,
        MethodSpec {
            name: "Main".to_owned(),
            signature: MethodSignature::static_sig(void, vec![]),
            is_static: true,
            is_virtual: false,
            is_new_slot: false,
            locals: vec![int32, string, int32],
            body: None,
        },
    );
    let data = ctx.method(method);
    let offsets: Vec<u32> = data.locals.iter().map(|l| l.offset).collect();
    assert_eq!(offsets, vec![0, 4, 6]);
    assert_eq!(data.locals_size, 10);
}

#[test]
fn unique_names_encode_parameter_types() {
    let ctx = ctx();
    let int32 = ctx.primitive(PrimitiveKind::Int32);
    let string = ctx.primitive(PrimitiveKind::String);
    let void = ctx.primitive(PrimitiveKind::Void);

    let console = ctx.declare_type("System", "Console");
    ctx.set_base(console, None);
    ctx.set_value_type(console, false);
    ctx.define_fields(console, vec![]);

    let write_int = ctx.define_method(
        console,
        MethodSpec {
            name: "WriteLine".to_owned(),
            signature: MethodSignature::static_sig(void, vec![int32]),
            is_static: true,
            is_virtual: false,
            is_new_slot: false,
            locals: vec![],
            body: None,
        },
    );
    let write_str = ctx.define_method(
        console,
        MethodSpec {
            name: "WriteLine".to_owned(),
            signature: MethodSignature::static_sig(void, vec![string]),
            is_static: true,
            is_virtual: false,
            is_new_slot: false,
            locals: vec![],
            body: None,
        },
    );

    assert_eq!(ctx.method(write_int).unique_name, "System_Console_WriteLine_Int32");
    assert_eq!(ctx.method(write_str).unique_name, "System_Console_WriteLine_String");
}

#[test]
fn find_method_matches_exact_signatures_only() {
    let ctx = ctx();
    let int32 = ctx.primitive(PrimitiveKind::Int32);
    let void = ctx.primitive(PrimitiveKind::Void);

    let owner = ctx.declare_type("Demo", "Ops");
    ctx.set_base(owner, None);
    ctx.set_value_type(owner, false);
    ctx.define_fields(owner, vec![]);

    let target_sig = MethodSignature::static_sig(void, vec![int32]);
    let id = ctx.define_method(
        owner,
        MethodSpec {
            name: "Run".to_owned(),
            signature: target_sig.clone(),
            is_static: true,
            is_virtual: false,
            is_new_slot: false,
            locals: vec![],
            body: None,
        },
    );

    assert_eq!(ctx.find_method(owner, "Run", &target_sig), Some(id));
    assert_eq!(ctx.find_method(owner, "run", &target_sig), None);
    let wrong = MethodSignature::static_sig(void, vec![int32, int32]);
    assert_eq!(ctx.find_method(owner, "Run", &wrong), None);
    let instance = MethodSignature::instance_sig(void, vec![int32]);
    assert_eq!(ctx.find_method(owner, "Run", &instance), None);
}

#[test]
fn kinds_and_names() {
    let ctx = ctx();
    let int32 = ctx.primitive(PrimitiveKind::Int32);
    let ptr = ctx.pointer_to(int32);
    let arr = ctx.sz_array_of(int32);

    assert_eq!(ctx.kind(ptr), TypeKind::Pointer(int32));
    assert_eq!(ctx.display_name(ptr), "Int32*");
    assert_eq!(ctx.display_name(arr), "Int32[]");
    assert_eq!(ctx.encoded_name(ptr), "PtrToInt32");
    assert_eq!(ctx.encoded_name(arr), "ArrayOfInt32");

    let point = ctx.declare_type("Demo", "Point");
    assert_eq!(ctx.display_name(point), "Demo.Point");
    assert_eq!(ctx.encoded_name(point), "Demo_Point");
    assert_eq!(ctx.encoded_name(ctx.by_ref_to(point)), "RefToDemo_Point");
}
