//! The owning type-system context.
//!
//! Interns every derived type shape (pointer-to-T, by-reference-to-T,
//! array-of-T, primitives) in per-shape caches keyed by element identity,
//! so two requests for "pointer to T" return the same [`TypeId`] and type
//! equality is id equality everywhere. Declared types carry lazily filled
//! facts: base type, value-type classification, and field layout.
//!
//! The load-bearing layout invariant lives here: the storage/slot size of
//! a type is its instance size for value types and the pointer width for
//! everything reference-shaped. Field offsets and frame layouts all build
//! on [`TypeContext::size_of`], so this is the one place the rule exists.
//!
//! # Thread Safety
//! Arenas and caches sit behind `parking_lot` locks. Compilation is
//! single-threaded; the guards exist so a context shared across threads
//! stays coherent, mirroring the defensive caches of the reference
//! implementation. Public methods never call each other while holding a
//! lock.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::entity::{
    BodyData, FieldData, FieldSpec, LocalData, MethodData, MethodSpec, ParamData, PrimitiveKind,
};
use crate::{FieldId, MethodId, TypeId};

/// The shape of an interned type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Pointer(TypeId),
    ByRef(TypeId),
    SZArray(TypeId),
    /// A class or struct materialized from a TypeDef (or declared
    /// synthetically).
    Declared,
}

#[derive(Debug)]
struct DeclaredLayout {
    fields: Vec<FieldId>,
    instance_size: u32,
}

#[derive(Debug)]
struct DeclaredData {
    full_name: String,
    encoded_name: String,
    /// `None` until the store resolves the extends column.
    base: Option<Option<TypeId>>,
    /// `None` until classified against the value-type marker.
    is_value_type: Option<bool>,
    layout: Option<DeclaredLayout>,
    /// Declaration-ordered method entities.
    methods: Vec<MethodId>,
}

struct TypeEntry {
    kind: TypeKind,
    declared: Option<DeclaredData>,
}

/// Owning context for types, fields, and methods.
pub struct TypeContext {
    pointer_size: u32,
    types: RwLock<Vec<TypeEntry>>,
    fields: RwLock<Vec<FieldData>>,
    methods: RwLock<Vec<MethodData>>,
    primitives: RwLock<FxHashMap<PrimitiveKind, TypeId>>,
    pointers: RwLock<FxHashMap<TypeId, TypeId>>,
    by_refs: RwLock<FxHashMap<TypeId, TypeId>>,
    sz_arrays: RwLock<FxHashMap<TypeId, TypeId>>,
}

impl TypeContext {
    /// Create a context for a target with the given pointer width in bytes.
    pub fn new(pointer_size: u32) -> Self {
        TypeContext {
            pointer_size,
            types: RwLock::new(Vec::with_capacity(64)),
            fields: RwLock::new(Vec::new()),
            methods: RwLock::new(Vec::new()),
            primitives: RwLock::new(FxHashMap::default()),
            pointers: RwLock::new(FxHashMap::default()),
            by_refs: RwLock::new(FxHashMap::default()),
            sz_arrays: RwLock::new(FxHashMap::default()),
        }
    }

    /// Target pointer width in bytes.
    pub fn pointer_size(&self) -> u32 {
        self.pointer_size
    }

    fn push_type(&self, kind: TypeKind, declared: Option<DeclaredData>) -> TypeId {
        let mut types = self.types.write();
        let id = TypeId(u32::try_from(types.len()).unwrap_or_else(|_| {
            // 2^32 types cannot arise from a finite image.
            unreachable!("type arena overflow")
        }));
        types.push(TypeEntry { kind, declared });
        id
    }

    /// The interned primitive of `kind`.
    pub fn primitive(&self, kind: PrimitiveKind) -> TypeId {
        if let Some(&id) = self.primitives.read().get(&kind) {
            return id;
        }
        let id = self.push_type(TypeKind::Primitive(kind), None);
        self.primitives.write().entry(kind).or_insert(id);
        // Re-read: a racing intern may have won.
        *self
            .primitives
            .read()
            .get(&kind)
            .unwrap_or_else(|| unreachable!("primitive just interned"))
    }

    /// The interned pointer-to-`element` type.
    pub fn pointer_to(&self, element: TypeId) -> TypeId {
        if let Some(&id) = self.pointers.read().get(&element) {
            return id;
        }
        let id = self.push_type(TypeKind::Pointer(element), None);
        self.pointers.write().entry(element).or_insert(id);
        *self
            .pointers
            .read()
            .get(&element)
            .unwrap_or_else(|| unreachable!("pointer type just interned"))
    }

    /// The interned by-reference-to-`element` type.
    pub fn by_ref_to(&self, element: TypeId) -> TypeId {
        if let Some(&id) = self.by_refs.read().get(&element) {
            return id;
        }
        let id = self.push_type(TypeKind::ByRef(element), None);
        self.by_refs.write().entry(element).or_insert(id);
        *self
            .by_refs
            .read()
            .get(&element)
            .unwrap_or_else(|| unreachable!("by-ref type just interned"))
    }

    /// The interned single-dimension-array-of-`element` type.
    pub fn sz_array_of(&self, element: TypeId) -> TypeId {
        if let Some(&id) = self.sz_arrays.read().get(&element) {
            return id;
        }
        let id = self.push_type(TypeKind::SZArray(element), None);
        self.sz_arrays.write().entry(element).or_insert(id);
        *self
            .sz_arrays
            .read()
            .get(&element)
            .unwrap_or_else(|| unreachable!("array type just interned"))
    }

    /// Declare a fresh class-or-struct type. Layout, base, and
    /// classification are filled in later; the id is stable immediately.
    ///
    /// Declared types are deliberately *not* interned by name — the store
    /// memoizes them per metadata handle, which is what gives two lookups
    /// of the same TypeDef the same identity.
    pub fn declare_type(&self, namespace: &str, name: &str) -> TypeId {
        let full_name = if namespace.is_empty() {
            name.to_owned()
        } else {
            format!("{namespace}.{name}")
        };
        let encoded_name = full_name.replace('.', "_");
        self.push_type(
            TypeKind::Declared,
            Some(DeclaredData {
                full_name,
                encoded_name,
                base: None,
                is_value_type: None,
                layout: None,
                methods: Vec::new(),
            }),
        )
    }

    fn with_entry<R>(&self, ty: TypeId, f: impl FnOnce(&TypeEntry) -> R) -> R {
        let types = self.types.read();
        f(&types[ty.0 as usize])
    }

    fn with_declared<R>(&self, ty: TypeId, f: impl FnOnce(&DeclaredData) -> R) -> R {
        self.with_entry(ty, |e| {
            let declared = e
                .declared
                .as_ref()
                .unwrap_or_else(|| panic!("type is not a declared type"));
            f(declared)
        })
    }

    fn with_declared_mut<R>(&self, ty: TypeId, f: impl FnOnce(&mut DeclaredData) -> R) -> R {
        let mut types = self.types.write();
        let declared = types[ty.0 as usize]
            .declared
            .as_mut()
            .unwrap_or_else(|| panic!("type is not a declared type"));
        f(declared)
    }

    /// The shape of `ty`.
    pub fn kind(&self, ty: TypeId) -> TypeKind {
        self.with_entry(ty, |e| e.kind)
    }

    /// Record the resolved base type of a declared type.
    pub fn set_base(&self, ty: TypeId, base: Option<TypeId>) {
        self.with_declared_mut(ty, |d| d.base = Some(base));
    }

    /// True once [`TypeContext::set_base`] has run for `ty`.
    pub fn base_resolved(&self, ty: TypeId) -> bool {
        self.with_declared(ty, |d| d.base.is_some())
    }

    /// The base type of a declared type.
    ///
    /// # Panics
    /// Panics if the base has not been resolved yet; the store resolves it
    /// before anything can ask.
    pub fn base_of(&self, ty: TypeId) -> Option<TypeId> {
        self.with_declared(ty, |d| {
            d.base
                .unwrap_or_else(|| panic!("base type queried before resolution"))
        })
    }

    /// Record the value-type classification of a declared type.
    pub fn set_value_type(&self, ty: TypeId, is_value_type: bool) {
        self.with_declared_mut(ty, |d| d.is_value_type = Some(is_value_type));
    }

    /// True once the value-type classification has run for `ty`.
    pub fn classified(&self, ty: TypeId) -> bool {
        self.with_entry(ty, |e| match &e.declared {
            Some(d) => d.is_value_type.is_some(),
            None => true,
        })
    }

    /// True for value types: copied by content, sized by field layout.
    ///
    /// # Panics
    /// Panics on an unclassified declared type.
    pub fn is_value_type(&self, ty: TypeId) -> bool {
        self.with_entry(ty, |e| match &e.declared {
            Some(d) => d
                .is_value_type
                .unwrap_or_else(|| panic!("type classification queried before it ran")),
            None => false,
        })
    }

    /// True when values of `ty` are manipulated through an address.
    pub fn is_pointer_like(&self, ty: TypeId) -> bool {
        self.with_entry(ty, |e| match e.kind {
            TypeKind::Pointer(_) | TypeKind::ByRef(_) | TypeKind::SZArray(_) => true,
            TypeKind::Primitive(kind) => kind.is_pointer_like(),
            TypeKind::Declared => !e
                .declared
                .as_ref()
                .and_then(|d| d.is_value_type)
                .unwrap_or_else(|| panic!("type classification queried before it ran")),
        })
    }

    /// True once field layout exists for `ty` (non-declared types always
    /// have layout).
    pub fn has_layout(&self, ty: TypeId) -> bool {
        self.with_entry(ty, |e| match &e.declared {
            Some(d) => d.layout.is_some(),
            None => true,
        })
    }

    /// Sum of instance field sizes for declared types; shape size
    /// otherwise.
    ///
    /// # Panics
    /// Panics if a declared type's layout has not been computed.
    pub fn instance_size(&self, ty: TypeId) -> u32 {
        self.with_entry(ty, |e| match e.kind {
            TypeKind::Primitive(kind) => kind.size(self.pointer_size),
            TypeKind::Pointer(_) | TypeKind::ByRef(_) | TypeKind::SZArray(_) => self.pointer_size,
            TypeKind::Declared => {
                let d = e
                    .declared
                    .as_ref()
                    .unwrap_or_else(|| unreachable!("declared entry without data"));
                d.layout
                    .as_ref()
                    .unwrap_or_else(|| panic!("instance size queried before layout"))
                    .instance_size
            }
        })
    }

    /// Storage/slot size: `instance_size` for value types, pointer width
    /// for reference types. Every stack slot, argument frame, and field
    /// offset in the compiler is derived from this.
    pub fn size_of(&self, ty: TypeId) -> u32 {
        self.with_entry(ty, |e| match e.kind {
            TypeKind::Primitive(kind) => kind.size(self.pointer_size),
            TypeKind::Pointer(_) | TypeKind::ByRef(_) | TypeKind::SZArray(_) => self.pointer_size,
            TypeKind::Declared => {
                let d = e
                    .declared
                    .as_ref()
                    .unwrap_or_else(|| unreachable!("declared entry without data"));
                let is_value = d
                    .is_value_type
                    .unwrap_or_else(|| panic!("size queried before classification"));
                if is_value {
                    d.layout
                        .as_ref()
                        .unwrap_or_else(|| panic!("size queried before layout"))
                        .instance_size
                } else {
                    self.pointer_size
                }
            }
        })
    }

    /// The name used in unique method symbols.
    pub fn encoded_name(&self, ty: TypeId) -> String {
        match self.kind(ty) {
            TypeKind::Primitive(kind) => kind.encoded_name().to_owned(),
            TypeKind::Pointer(e) => format!("PtrTo{}", self.encoded_name(e)),
            TypeKind::ByRef(e) => format!("RefTo{}", self.encoded_name(e)),
            TypeKind::SZArray(e) => format!("ArrayOf{}", self.encoded_name(e)),
            TypeKind::Declared => self.with_declared(ty, |d| d.encoded_name.clone()),
        }
    }

    /// Human-readable name for listing comments and diagnostics.
    pub fn display_name(&self, ty: TypeId) -> String {
        match self.kind(ty) {
            TypeKind::Primitive(kind) => kind.encoded_name().to_owned(),
            TypeKind::Pointer(e) => format!("{}*", self.display_name(e)),
            TypeKind::ByRef(e) => format!("{}&", self.display_name(e)),
            TypeKind::SZArray(e) => format!("{}[]", self.display_name(e)),
            TypeKind::Declared => self.with_declared(ty, |d| d.full_name.clone()),
        }
    }

    /// Define the declaration-ordered fields of a declared type and
    /// compute its layout: instance fields accumulate a running byte
    /// offset, statics are excluded (offset 0), and the instance size is
    /// the final offset.
    ///
    /// # Panics
    /// Panics if a field type's own layout is not available yet; the
    /// store lays out field types first.
    pub fn define_fields(&self, ty: TypeId, specs: Vec<FieldSpec>) -> Vec<FieldId> {
        // Sizes first: size_of takes the types lock.
        let sizes: Vec<u32> = specs
            .iter()
            .map(|s| if s.is_static { 0 } else { self.size_of(s.ty) })
            .collect();

        let mut ids = Vec::with_capacity(specs.len());
        let mut offset = 0u32;
        {
            let mut fields = self.fields.write();
            for (spec, size) in specs.into_iter().zip(sizes) {
                let id = FieldId(u32::try_from(fields.len()).unwrap_or_else(|_| {
                    unreachable!("field arena overflow")
                }));
                fields.push(FieldData {
                    owner: ty,
                    name: spec.name,
                    ty: spec.ty,
                    offset: if spec.is_static { 0 } else { offset },
                    is_static: spec.is_static,
                });
                if !spec.is_static {
                    offset += size;
                }
                ids.push(id);
            }
        }

        self.with_declared_mut(ty, |d| {
            d.layout = Some(DeclaredLayout {
                fields: ids.clone(),
                instance_size: offset,
            });
        });
        tracing::trace!(ty = %self.display_name(ty), instance_size = offset, "laid out type");
        ids
    }

    /// Declaration-ordered fields of `ty`.
    ///
    /// # Panics
    /// Panics if layout has not been computed.
    pub fn fields_of(&self, ty: TypeId) -> Vec<FieldId> {
        self.with_declared(ty, |d| {
            d.layout
                .as_ref()
                .unwrap_or_else(|| panic!("fields queried before layout"))
                .fields
                .clone()
        })
    }

    /// The materialized data of a field.
    pub fn field(&self, id: FieldId) -> FieldData {
        self.fields.read()[id.0 as usize].clone()
    }

    /// Define a method on a declared type, computing its parameter layout
    /// (including the implicit receiver for instance methods: by-ref to
    /// self for value types, self otherwise), locals layout, and unique
    /// symbol name.
    pub fn define_method(&self, ty: TypeId, spec: MethodSpec) -> MethodId {
        let receiver = if spec.signature.has_this() {
            Some(if self.is_value_type(ty) {
                self.by_ref_to(ty)
            } else {
                ty
            })
        } else {
            None
        };

        let param_types: Vec<TypeId> = receiver
            .into_iter()
            .chain(spec.signature.params.iter().copied())
            .collect();

        let mut params = Vec::with_capacity(param_types.len());
        let mut params_size = 0u32;
        for (index, &pty) in param_types.iter().enumerate() {
            params.push(ParamData {
                index: u32::try_from(index).unwrap_or_else(|_| unreachable!()),
                offset: params_size,
                ty: pty,
            });
            params_size += self.size_of(pty);
        }

        let mut locals = Vec::with_capacity(spec.locals.len());
        let mut locals_size = 0u32;
        for (index, &lty) in spec.locals.iter().enumerate() {
            locals.push(LocalData {
                index: u32::try_from(index).unwrap_or_else(|_| unreachable!()),
                offset: locals_size,
                ty: lty,
            });
            locals_size += self.size_of(lty);
        }

        let unique_name = self.unique_name(ty, &spec.name, &spec.signature.params);

        let data = MethodData {
            declaring_type: ty,
            name: spec.name,
            unique_name,
            signature: spec.signature,
            is_static: spec.is_static,
            is_virtual: spec.is_virtual,
            is_new_slot: spec.is_new_slot,
            params,
            params_size,
            locals,
            locals_size,
            body: spec.body,
        };

        let id = {
            let mut methods = self.methods.write();
            let id = MethodId(u32::try_from(methods.len()).unwrap_or_else(|_| {
                unreachable!("method arena overflow")
            }));
            methods.push(data);
            id
        };
        self.with_declared_mut(ty, |d| d.methods.push(id));
        id
    }

    fn unique_name(&self, ty: TypeId, name: &str, params: &[TypeId]) -> String {
        let mut unique = format!(
            "{}_{}",
            self.encoded_name(ty),
            name.replace('.', "_")
        );
        for &p in params {
            unique.push('_');
            unique.push_str(&self.encoded_name(p));
        }
        unique
    }

    /// Declaration-ordered methods of `ty`.
    pub fn methods_of(&self, ty: TypeId) -> Vec<MethodId> {
        self.with_declared(ty, |d| d.methods.clone())
    }

    /// The materialized data of a method.
    pub fn method(&self, id: MethodId) -> MethodData {
        self.methods.read()[id.0 as usize].clone()
    }

    /// Find a method on `ty` by name and exact signature compatibility.
    pub fn find_method(&self, ty: TypeId, name: &str, sig: &crate::MethodSignature) -> Option<MethodId> {
        let candidates = self.methods_of(ty);
        let methods = self.methods.read();
        candidates.into_iter().find(|id| {
            let m = &methods[id.0 as usize];
            m.name == name && m.signature.is_compatible(sig)
        })
    }

    /// The type's static constructor, if it declares one.
    pub fn static_constructor_of(&self, ty: TypeId) -> Option<MethodId> {
        let candidates = self.methods_of(ty);
        let methods = self.methods.read();
        candidates
            .into_iter()
            .find(|id| methods[id.0 as usize].name == ".cctor")
    }

    /// Resolve a method body's own data for translation.
    pub fn body_of(&self, id: MethodId) -> Option<BodyData> {
        self.methods.read()[id.0 as usize].body.clone()
    }
}

#[cfg(test)]
mod tests;
