//! Store materialization tests over an in-memory image.
//!
//! The fixture assembles a minimal metadata root by hand: one module,
//! a `Demo.Widget` class with a static and an instance field, and a
//! static `Run` method with no body.

use beeb_metadata::Image;
use pretty_assertions::assert_eq;

use crate::MetadataStore;

fn u16le(v: u16) -> [u8; 2] {
    v.to_le_bytes()
}

fn u32le(v: u32) -> [u8; 4] {
    v.to_le_bytes()
}

fn synthetic_image() -> Image {
    // #Strings heap.
    let mut strings = vec![0u8];
    let intern = |s: &str, strings: &mut Vec<u8>| -> u16 {
        let off = u16::try_from(strings.len()).unwrap();
        strings.extend_from_slice(s.as_bytes());
        strings.push(0);
        off
    };
    let s_module = intern("<Module>", &mut strings);
    let s_widget = intern("Widget", &mut strings);
    let s_demo = intern("Demo", &mut strings);
    let s_total = intern("Total", &mut strings);
    let s_count = intern("Count", &mut strings);
    let s_run = intern("Run", &mut strings);
    let s_name = intern("demo", &mut strings);

    // #Blob heap: field sig `int32` at 1, method sig `static void ()` at 4.
    let blobs = vec![0x00, 0x02, 0x06, 0x08, 0x03, 0x00, 0x00, 0x01];

    // #~ stream: Module, TypeDef x2, Field x2, MethodDef x1.
    let mut t = Vec::new();
    t.extend_from_slice(&u32le(0));
    t.extend_from_slice(&[2, 0, 0, 1]); // versions, heap sizes, reserved
    let valid: u64 = (1 << 0x00) | (1 << 0x02) | (1 << 0x04) | (1 << 0x06);
    t.extend_from_slice(&valid.to_le_bytes());
    t.extend_from_slice(&0u64.to_le_bytes());
    for rows in [1u32, 2, 2, 1] {
        t.extend_from_slice(&u32le(rows));
    }

    // Module row.
    t.extend_from_slice(&u16le(0));
    t.extend_from_slice(&u16le(s_name));
    t.extend_from_slice(&u16le(0));
    t.extend_from_slice(&u16le(0));
    t.extend_from_slice(&u16le(0));

    // TypeDef 1: <Module>.
    t.extend_from_slice(&u32le(0));
    t.extend_from_slice(&u16le(s_module));
    t.extend_from_slice(&u16le(0));
    t.extend_from_slice(&u16le(0)); // extends: null
    t.extend_from_slice(&u16le(1));
    t.extend_from_slice(&u16le(1));

    // TypeDef 2: Demo.Widget, owns both fields and the method.
    t.extend_from_slice(&u32le(0x0010_0001));
    t.extend_from_slice(&u16le(s_widget));
    t.extend_from_slice(&u16le(s_demo));
    t.extend_from_slice(&u16le(0)); // extends: null (reference type)
    t.extend_from_slice(&u16le(1));
    t.extend_from_slice(&u16le(1));

    // Field 1: static Total (int32).
    t.extend_from_slice(&u16le(0x0010));
    t.extend_from_slice(&u16le(s_total));
    t.extend_from_slice(&u16le(1));

    // Field 2: instance Count (int32).
    t.extend_from_slice(&u16le(0));
    t.extend_from_slice(&u16le(s_count));
    t.extend_from_slice(&u16le(1));

    // MethodDef 1: static void Run(), no body.
    t.extend_from_slice(&u32le(0)); // rva
    t.extend_from_slice(&u16le(0)); // impl flags
    t.extend_from_slice(&u16le(0x0010)); // static
    t.extend_from_slice(&u16le(s_run));
    t.extend_from_slice(&u16le(4));
    t.extend_from_slice(&u16le(1)); // param list

    // Metadata root wrapping the three streams.
    let header_len = 24;
    let stream_headers_len = 12 + 20 + 16;
    let tables_off = header_len + stream_headers_len;
    let strings_off = tables_off + t.len();
    let blobs_off = strings_off + strings.len();

    let mut root = Vec::new();
    root.extend_from_slice(&0x424A_5342u32.to_le_bytes());
    root.extend_from_slice(&[1, 0, 1, 0]);
    root.extend_from_slice(&u32le(0));
    root.extend_from_slice(&u32le(4));
    root.extend_from_slice(b"v4\0\0");
    root.extend_from_slice(&u16le(0));
    root.extend_from_slice(&u16le(3));
    for (off, size, name) in [
        (tables_off, t.len(), &b"#~\0\0"[..]),
        (strings_off, strings.len(), &b"#Strings\0\0\0\0"[..]),
        (blobs_off, blobs.len(), &b"#Blob\0\0\0"[..]),
    ] {
        root.extend_from_slice(&u32le(u32::try_from(off).unwrap()));
        root.extend_from_slice(&u32le(u32::try_from(size).unwrap()));
        root.extend_from_slice(name);
    }
    assert_eq!(root.len(), tables_off);
    root.extend_from_slice(&t);
    root.extend_from_slice(&strings);
    root.extend_from_slice(&blobs);

    Image::from_metadata(root).unwrap()
}

#[test]
fn lookups_are_memoized_and_identity_stable() {
    let mut store = MetadataStore::new(2);
    let asm = store.add_image(synthetic_image()).unwrap();

    let by_rid = store.type_def(asm, 2).unwrap();
    let by_name = store.find_type(asm, "Demo", "Widget").unwrap();
    assert_eq!(by_rid, by_name);
    assert_eq!(store.type_def(asm, 2).unwrap(), by_rid);
    assert_eq!(store.ctx().display_name(by_rid), "Demo.Widget");
}

#[test]
fn layout_separates_static_and_instance_fields() {
    let mut store = MetadataStore::new(2);
    let asm = store.add_image(synthetic_image()).unwrap();

    let widget = store.find_type(asm, "Demo", "Widget").unwrap();
    store.ensure_layout(widget).unwrap();

    // Extends is null, so Widget classifies as a reference type.
    assert!(!store.ctx().is_value_type(widget));
    assert_eq!(store.ctx().instance_size(widget), 4);
    assert_eq!(store.ctx().size_of(widget), 2);

    let total = store.field_def(asm, 1).unwrap();
    let count = store.field_def(asm, 2).unwrap();
    assert!(store.ctx().field(total).is_static);
    assert_eq!(store.ctx().field(total).offset, 0);
    assert!(!store.ctx().field(count).is_static);
    assert_eq!(store.ctx().field(count).offset, 0);
}

#[test]
fn methods_materialize_with_unique_names() {
    let mut store = MetadataStore::new(2);
    let asm = store.add_image(synthetic_image()).unwrap();

    let widget = store.find_type(asm, "Demo", "Widget").unwrap();
    let methods = store.methods_of(widget).unwrap();
    assert_eq!(methods.len(), 1);

    let run = store.ctx().method(methods[0]);
    assert_eq!(run.name, "Run");
    assert_eq!(run.unique_name, "Demo_Widget_Run");
    assert!(run.is_static);
    assert!(run.body.is_none());
    assert!(run.params.is_empty());
}

#[test]
fn entry_scan_is_first_match_by_simple_name() {
    let mut store = MetadataStore::new(2);
    let asm = store.add_image(synthetic_image()).unwrap();

    let found = store.find_method_by_simple_name(asm, "Run").unwrap();
    assert!(found.is_some());
    assert_eq!(store.find_method_by_simple_name(asm, "Missing").unwrap(), None);
}

#[test]
fn unknown_type_is_fatal() {
    let mut store = MetadataStore::new(2);
    let asm = store.add_image(synthetic_image()).unwrap();
    assert!(store.find_type(asm, "Demo", "Gadget").is_err());
}

#[test]
fn heap_alloc_method_is_synthesized_once() {
    let mut store = MetadataStore::new(2);
    let a = store.heap_alloc_method();
    let b = store.heap_alloc_method();
    assert_eq!(a, b);
    let data = store.ctx().method(a);
    assert_eq!(data.unique_name, "Beeb_Runtime_Heap_Alloc_IntPtr");
    assert!(data.body.is_none());
}
