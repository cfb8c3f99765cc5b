//! The metadata store: images in, entities out.
//!
//! Materialization is lazy and memoized per metadata handle: asking for
//! the same TypeDef/MethodDef/Field twice yields the same id, which is
//! what makes identity comparison valid across the whole compile.
//!
//! Laziness is split in two, because reference types may refer to
//! themselves:
//!
//! - *classification* (base type + value-type flag), needed to size a
//!   type at all;
//! - *layout* (fields + instance size), needed only for value types and
//!   for field access, and the step that recurses into field types.
//!
//! A value type that transitively contains itself is a fatal
//! [`ResolveError::RecursiveLayout`]; a class referencing itself is fine.

use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};

use beeb_metadata::signature::{parse_field_sig, parse_locals_sig, parse_method_sig};
use beeb_metadata::tables::Table;
use beeb_metadata::{Image, SigType, Token};

use crate::context::{TypeContext, TypeKind};
use crate::entity::{BodyData, FieldSpec, MethodSpec, PrimitiveKind};
use crate::error::ResolveError;
use crate::{FieldId, MethodId, MethodSignature, Result, TypeId};

/// The core library resolved for well-known types.
const CORE_LIBRARY: &str = "mscorlib";

/// Identity of a loaded assembly image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssemblyId(u32);

struct LoadedImage {
    image: Image,
    name: String,
}

/// Loads images and materializes type-system entities from them.
pub struct MetadataStore {
    ctx: TypeContext,
    images: Vec<LoadedImage>,
    by_path: FxHashMap<PathBuf, AssemblyId>,
    by_name: FxHashMap<String, AssemblyId>,
    /// Directory referenced assemblies are located in (the root image's).
    search_dir: PathBuf,

    type_defs: FxHashMap<(AssemblyId, u32), TypeId>,
    /// Reverse map for lazy fills on store-backed types.
    origins: FxHashMap<TypeId, (AssemblyId, u32)>,
    method_defs: FxHashMap<(AssemblyId, u32), MethodId>,
    method_origins: FxHashMap<MethodId, AssemblyId>,
    field_defs: FxHashMap<(AssemblyId, u32), FieldId>,
    types_by_name: FxHashMap<(AssemblyId, String, String), TypeId>,
    well_known: FxHashMap<String, TypeId>,

    methods_materialized: FxHashSet<TypeId>,
    layout_in_progress: FxHashSet<TypeId>,
    heap_alloc: Option<MethodId>,
}

impl MetadataStore {
    /// Create a store for a target with the given pointer width.
    pub fn new(pointer_size: u32) -> Self {
        MetadataStore {
            ctx: TypeContext::new(pointer_size),
            images: Vec::new(),
            by_path: FxHashMap::default(),
            by_name: FxHashMap::default(),
            search_dir: PathBuf::new(),
            type_defs: FxHashMap::default(),
            origins: FxHashMap::default(),
            method_defs: FxHashMap::default(),
            method_origins: FxHashMap::default(),
            field_defs: FxHashMap::default(),
            types_by_name: FxHashMap::default(),
            well_known: FxHashMap::default(),
            methods_materialized: FxHashSet::default(),
            layout_in_progress: FxHashSet::default(),
            heap_alloc: None,
        }
    }

    /// The owned type context.
    pub fn ctx(&self) -> &TypeContext {
        &self.ctx
    }

    /// Load (or return the already-loaded) image at `path`.
    pub fn resolve(&mut self, path: &Path) -> Result<AssemblyId> {
        if let Some(&id) = self.by_path.get(path) {
            return Ok(id);
        }
        if self.images.is_empty() {
            self.search_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        }
        let image = Image::open(path)?;
        let id = self.add_image(image)?;
        self.by_path.insert(path.to_path_buf(), id);
        Ok(id)
    }

    /// Register an already-parsed image. Exposed for tooling and tests
    /// that assemble images in memory.
    pub fn add_image(&mut self, image: Image) -> Result<AssemblyId> {
        let name = image.name()?.to_owned();
        let id = AssemblyId(u32::try_from(self.images.len()).unwrap_or_else(|_| {
            unreachable!("assembly arena overflow")
        }));
        tracing::debug!(assembly = %name, "registered image");
        self.by_name.entry(name.clone()).or_insert(id);
        self.images.push(LoadedImage { image, name });
        Ok(id)
    }

    /// Resolve a referenced assembly by simple name, loading
    /// `<name>.dll` from the root image's directory on first use.
    pub fn resolve_by_name(&mut self, name: &str) -> Result<AssemblyId> {
        if let Some(&id) = self.by_name.get(name) {
            return Ok(id);
        }
        let candidate = self.search_dir.join(format!("{name}.dll"));
        if !candidate.is_file() {
            return Err(ResolveError::AssemblyNotFound {
                name: name.to_owned(),
                searched: self.search_dir.clone(),
            });
        }
        let id = self.resolve(&candidate)?;
        self.by_name.insert(name.to_owned(), id);
        Ok(id)
    }

    fn image(&self, asm: AssemblyId) -> &Image {
        &self.images[asm.0 as usize].image
    }

    /// The simple name of a loaded assembly.
    pub fn assembly_name(&self, asm: AssemblyId) -> &str {
        &self.images[asm.0 as usize].name
    }

    /// Materialize the TypeDef at (`asm`, `rid`). Layout stays lazy.
    pub fn type_def(&mut self, asm: AssemblyId, rid: u32) -> Result<TypeId> {
        if let Some(&id) = self.type_defs.get(&(asm, rid)) {
            return Ok(id);
        }
        let (namespace, name) = {
            let image = self.image(asm);
            let row = image.tables.type_def(rid)?;
            (
                image.strings.get(row.namespace)?.to_owned(),
                image.strings.get(row.name)?.to_owned(),
            )
        };
        let id = self.ctx.declare_type(&namespace, &name);
        self.type_defs.insert((asm, rid), id);
        self.origins.insert(id, (asm, rid));
        tracing::trace!(ty = %self.ctx.display_name(id), "materialized type");
        Ok(id)
    }

    /// Resolve base type and value-type classification for `ty`.
    pub fn ensure_classified(&mut self, ty: TypeId) -> Result<()> {
        if self.ctx.kind(ty) != TypeKind::Declared {
            return Ok(());
        }
        if self.ctx.base_resolved(ty) && self.ctx.classified(ty) {
            return Ok(());
        }
        let Some(&(asm, rid)) = self.origins.get(&ty) else {
            // Synthetic types are classified by their creators.
            return Err(ResolveError::LayoutNotReady {
                type_name: self.ctx.display_name(ty),
            });
        };

        let extends = self.image(asm).tables.type_def(rid)?.extends;
        let base = if extends.is_null() {
            None
        } else {
            Some(self.resolve_type_token(asm, extends)?)
        };
        self.ctx.set_base(ty, base);

        // A type is a value type iff its base chain terminates at the
        // runtime's value-type marker.
        let is_value = match base {
            Some(b) => b == self.well_known("ValueType")?,
            None => false,
        };
        self.ctx.set_value_type(ty, is_value);
        Ok(())
    }

    /// Compute field layout for `ty` (and everything a value-type field
    /// pulls in).
    pub fn ensure_layout(&mut self, ty: TypeId) -> Result<()> {
        if self.ctx.kind(ty) != TypeKind::Declared {
            return Ok(());
        }
        self.ensure_classified(ty)?;
        if self.ctx.has_layout(ty) {
            return Ok(());
        }
        let Some(&(asm, rid)) = self.origins.get(&ty) else {
            return Err(ResolveError::LayoutNotReady {
                type_name: self.ctx.display_name(ty),
            });
        };
        if !self.layout_in_progress.insert(ty) {
            return Err(ResolveError::RecursiveLayout {
                type_name: self.ctx.display_name(ty),
            });
        }

        let field_rids: Vec<u32> = {
            let image = self.image(asm);
            image.tables.type_def_fields(rid)?.collect()
        };

        let mut specs = Vec::with_capacity(field_rids.len());
        for &field_rid in &field_rids {
            let (name, is_static, sig) = {
                let image = self.image(asm);
                let row = image.tables.field(field_rid)?;
                let blob = image.blobs.get(row.signature)?;
                (
                    image.strings.get(row.name)?.to_owned(),
                    row.flags
                        .contains(beeb_metadata::tables::FieldAttributes::STATIC),
                    parse_field_sig(blob)?,
                )
            };
            let field_ty = self.sig_to_type(asm, &sig)?;
            self.ensure_sized(field_ty)?;
            specs.push(FieldSpec {
                name,
                ty: field_ty,
                is_static,
            });
        }

        let ids = self.ctx.define_fields(ty, specs);
        for (field_rid, field_id) in field_rids.into_iter().zip(ids) {
            self.field_defs.insert((asm, field_rid), field_id);
        }
        self.layout_in_progress.remove(&ty);
        Ok(())
    }

    /// Make a type's storage size computable: classify it, and lay it out
    /// if it is a value type (reference types size to a pointer).
    pub fn ensure_sized(&mut self, ty: TypeId) -> Result<()> {
        if self.ctx.kind(ty) != TypeKind::Declared {
            return Ok(());
        }
        self.ensure_classified(ty)?;
        if self.ctx.is_value_type(ty) {
            self.ensure_layout(ty)?;
        }
        Ok(())
    }

    /// Materialize the MethodDef at (`asm`, `rid`).
    pub fn method_def(&mut self, asm: AssemblyId, rid: u32) -> Result<MethodId> {
        if let Some(&id) = self.method_defs.get(&(asm, rid)) {
            return Ok(id);
        }

        let declaring_rid = self.image(asm).tables.declaring_type_of_method(rid)?;
        let declaring = self.type_def(asm, declaring_rid)?;
        self.ensure_classified(declaring)?;

        let (name, flags, sig_blob_offset, rva) = {
            let image = self.image(asm);
            let row = image.tables.method_def(rid)?;
            (
                image.strings.get(row.name)?.to_owned(),
                row.flags,
                row.signature,
                row.rva,
            )
        };

        let raw_sig = {
            let image = self.image(asm);
            parse_method_sig(image.blobs.get(sig_blob_offset)?)?
        };
        let return_type = self.sig_to_type(asm, &raw_sig.return_type)?;
        self.ensure_sized(return_type)?;
        let mut params = Vec::with_capacity(raw_sig.params.len());
        for p in &raw_sig.params {
            let ty = self.sig_to_type(asm, p)?;
            self.ensure_sized(ty)?;
            params.push(ty);
        }

        // Bodies are absent for extern/runtime-provided methods (RVA 0);
        // those either compile as intrinsics or are never reached.
        let (body, local_types) = if rva == 0 {
            (None, Vec::new())
        } else {
            let method_body = self.image(asm).method_body(rva)?;
            let local_types = if method_body.local_sig_token.is_null() {
                Vec::new()
            } else {
                let sig_rid = method_body.local_sig_token.rid();
                let locals_sig = {
                    let image = self.image(asm);
                    let row = image.tables.stand_alone_sig(sig_rid)?;
                    parse_locals_sig(image.blobs.get(row.signature)?)?
                };
                let mut types = Vec::with_capacity(locals_sig.len());
                for l in &locals_sig {
                    let ty = self.sig_to_type(asm, l)?;
                    self.ensure_sized(ty)?;
                    types.push(ty);
                }
                types
            };
            (
                Some(BodyData {
                    code: method_body.code,
                    max_stack: method_body.max_stack,
                }),
                local_types,
            )
        };

        use beeb_metadata::tables::MethodAttributes as MA;
        let id = self.ctx.define_method(
            declaring,
            MethodSpec {
                name,
                signature: MethodSignature {
                    header: raw_sig.header,
                    return_type,
                    params,
                },
                is_static: flags.contains(MA::STATIC),
                is_virtual: flags.contains(MA::VIRTUAL),
                is_new_slot: flags.contains(MA::NEW_SLOT),
                locals: local_types,
                body,
            },
        );
        self.method_defs.insert((asm, rid), id);
        self.method_origins.insert(id, asm);
        tracing::trace!(method = %self.ctx.method(id).unique_name, "materialized method");
        Ok(id)
    }

    /// The assembly a method was materialized from; `None` for synthetic
    /// methods, which carry no body and never resolve tokens.
    pub fn method_origin(&self, method: MethodId) -> Option<AssemblyId> {
        self.method_origins.get(&method).copied()
    }

    /// Materialize the Field at (`asm`, `rid`); field entities are created
    /// by their owner's layout.
    pub fn field_def(&mut self, asm: AssemblyId, rid: u32) -> Result<FieldId> {
        if let Some(&id) = self.field_defs.get(&(asm, rid)) {
            return Ok(id);
        }
        let declaring_rid = self.image(asm).tables.declaring_type_of_field(rid)?;
        let declaring = self.type_def(asm, declaring_rid)?;
        self.ensure_layout(declaring)?;
        self.field_defs
            .get(&(asm, rid))
            .copied()
            .ok_or_else(|| ResolveError::LayoutNotReady {
                type_name: self.ctx.display_name(declaring),
            })
    }

    /// Find a type by (namespace, name): TypeDefs first, then the
    /// ExportedType forwarding table, followed transitively.
    pub fn find_type(&mut self, asm: AssemblyId, namespace: &str, name: &str) -> Result<TypeId> {
        let key = (asm, namespace.to_owned(), name.to_owned());
        if let Some(&id) = self.types_by_name.get(&key) {
            return Ok(id);
        }

        let mut found_rid = None;
        {
            let image = self.image(asm);
            for rid in 1..=image.tables.row_count(Table::TypeDef) {
                let row = image.tables.type_def(rid)?;
                if image.strings.get(row.name)? == name
                    && image.strings.get(row.namespace)? == namespace
                {
                    found_rid = Some(rid);
                    break;
                }
            }
        }
        if let Some(rid) = found_rid {
            let id = self.type_def(asm, rid)?;
            self.types_by_name.insert(key, id);
            return Ok(id);
        }

        // Forwarded types re-export a definition living in another image.
        let mut forward_to = None;
        {
            let image = self.image(asm);
            for rid in 1..=image.tables.row_count(Table::ExportedType) {
                let row = image.tables.exported_type(rid)?;
                if image.strings.get(row.name)? == name
                    && image.strings.get(row.namespace)? == namespace
                {
                    match row.implementation.table() {
                        Some(Table::AssemblyRef) => {
                            let target = image.tables.assembly_ref(row.implementation.rid())?;
                            forward_to = Some(image.strings.get(target.name)?.to_owned());
                            break;
                        }
                        _ => {
                            return Err(ResolveError::UnsupportedHandle {
                                token: row.implementation.0,
                                context: "exported-type implementation",
                            })
                        }
                    }
                }
            }
        }
        if let Some(target) = forward_to {
            let other = self.resolve_by_name(&target)?;
            let id = self.find_type(other, namespace, name)?;
            self.types_by_name.insert(key, id);
            return Ok(id);
        }

        Err(ResolveError::UnknownType {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        })
    }

    /// Resolve a TypeDef/TypeRef token in `asm` to a type.
    pub fn resolve_type_token(&mut self, asm: AssemblyId, token: Token) -> Result<TypeId> {
        match token.table() {
            Some(Table::TypeDef) => self.type_def(asm, token.rid()),
            Some(Table::TypeRef) => {
                let (scope, namespace, name) = {
                    let image = self.image(asm);
                    let row = image.tables.type_ref(token.rid())?;
                    (
                        row.resolution_scope,
                        image.strings.get(row.namespace)?.to_owned(),
                        image.strings.get(row.name)?.to_owned(),
                    )
                };
                match scope.table() {
                    Some(Table::AssemblyRef) => {
                        let target = {
                            let image = self.image(asm);
                            let row = image.tables.assembly_ref(scope.rid())?;
                            image.strings.get(row.name)?.to_owned()
                        };
                        let other = self.resolve_by_name(&target)?;
                        self.find_type(other, &namespace, &name)
                    }
                    _ => Err(ResolveError::UnsupportedHandle {
                        token: scope.0,
                        context: "type-reference resolution scope",
                    }),
                }
            }
            _ => Err(ResolveError::UnsupportedHandle {
                token: token.0,
                context: "type handle",
            }),
        }
    }

    /// Resolve a MethodDef/MemberRef token in `asm` to a method.
    pub fn resolve_method_token(&mut self, asm: AssemblyId, token: Token) -> Result<MethodId> {
        match token.table() {
            Some(Table::MethodDef) => self.method_def(asm, token.rid()),
            Some(Table::MemberRef) => {
                let (class, name, sig_offset) = {
                    let image = self.image(asm);
                    let row = image.tables.member_ref(token.rid())?;
                    (
                        row.class,
                        image.strings.get(row.name)?.to_owned(),
                        row.signature,
                    )
                };
                let target = match class.table() {
                    Some(Table::TypeRef | Table::TypeDef) => {
                        self.resolve_type_token(asm, class)?
                    }
                    _ => {
                        return Err(ResolveError::UnsupportedHandle {
                            token: class.0,
                            context: "member-reference parent",
                        })
                    }
                };

                let raw_sig = {
                    let image = self.image(asm);
                    parse_method_sig(image.blobs.get(sig_offset)?)?
                };
                let return_type = self.sig_to_type(asm, &raw_sig.return_type)?;
                let mut params = Vec::with_capacity(raw_sig.params.len());
                for p in &raw_sig.params {
                    params.push(self.sig_to_type(asm, p)?);
                }
                let sig = MethodSignature {
                    header: raw_sig.header,
                    return_type,
                    params,
                };

                self.methods_of(target)?;
                self.ctx
                    .find_method(target, &name, &sig)
                    .ok_or_else(|| ResolveError::UnknownMethod {
                        type_name: self.ctx.display_name(target),
                        name,
                    })
            }
            _ => Err(ResolveError::UnsupportedHandle {
                token: token.0,
                context: "method handle",
            }),
        }
    }

    /// Resolve a Field token in `asm` to a field.
    pub fn resolve_field_token(&mut self, asm: AssemblyId, token: Token) -> Result<FieldId> {
        match token.table() {
            Some(Table::Field) => self.field_def(asm, token.rid()),
            _ => Err(ResolveError::UnsupportedHandle {
                token: token.0,
                context: "field handle",
            }),
        }
    }

    /// A well-known `System.<name>` type, resolved from the core library
    /// and cached.
    pub fn well_known(&mut self, name: &str) -> Result<TypeId> {
        if let Some(&id) = self.well_known.get(name) {
            return Ok(id);
        }
        let core = self.resolve_by_name(CORE_LIBRARY)?;
        let id = self.find_type(core, "System", name)?;
        self.well_known.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Scan `asm`'s MethodDef table for the first method with the given
    /// unqualified name. First match wins; ambiguous names are not
    /// disambiguated further.
    pub fn find_method_by_simple_name(
        &mut self,
        asm: AssemblyId,
        name: &str,
    ) -> Result<Option<MethodId>> {
        let mut found = None;
        {
            let image = self.image(asm);
            for rid in 1..=image.tables.row_count(Table::MethodDef) {
                let row = image.tables.method_def(rid)?;
                if image.strings.get(row.name)? == name {
                    found = Some(rid);
                    break;
                }
            }
        }
        match found {
            Some(rid) => Ok(Some(self.method_def(asm, rid)?)),
            None => Ok(None),
        }
    }

    /// All methods declared by `ty`, in declaration order, materializing
    /// them on first use.
    pub fn methods_of(&mut self, ty: TypeId) -> Result<Vec<MethodId>> {
        if self.methods_materialized.contains(&ty) {
            if let Some(&(asm, rid)) = self.origins.get(&ty) {
                let rids: Vec<u32> = self.image(asm).tables.type_def_methods(rid)?.collect();
                return rids
                    .into_iter()
                    .map(|m| self.method_def(asm, m))
                    .collect();
            }
            return Ok(self.ctx.methods_of(ty));
        }
        let Some(&(asm, rid)) = self.origins.get(&ty) else {
            // Synthetic types declare methods directly on the context.
            self.methods_materialized.insert(ty);
            return Ok(self.ctx.methods_of(ty));
        };
        let rids: Vec<u32> = self.image(asm).tables.type_def_methods(rid)?.collect();
        let mut out = Vec::with_capacity(rids.len());
        for m in rids {
            out.push(self.method_def(asm, m)?);
        }
        self.methods_materialized.insert(ty);
        Ok(out)
    }

    /// The `.cctor` of `ty`, if it declares one.
    pub fn static_constructor_of(&mut self, ty: TypeId) -> Result<Option<MethodId>> {
        let methods = self.methods_of(ty)?;
        Ok(methods
            .into_iter()
            .find(|&m| self.ctx.method(m).name == ".cctor"))
    }

    /// The synthetic runtime allocation method. The generated program's
    /// heap is a bump allocator with no reclamation; the code generator
    /// emits its body, so the entity carries none.
    pub fn heap_alloc_method(&mut self) -> MethodId {
        if let Some(id) = self.heap_alloc {
            return id;
        }
        let intptr = self.ctx.primitive(PrimitiveKind::IntPtr);
        let ty = self.ctx.declare_type("Beeb.Runtime", "Heap");
        self.ctx.set_base(ty, None);
        self.ctx.set_value_type(ty, false);
        self.ctx.define_fields(ty, Vec::new());
        let id = self.ctx.define_method(
            ty,
            MethodSpec {
                name: "Alloc".to_owned(),
                signature: MethodSignature::static_sig(intptr, vec![intptr]),
                is_static: true,
                is_virtual: false,
                is_new_slot: false,
                locals: Vec::new(),
                body: None,
            },
        );
        self.heap_alloc = Some(id);
        id
    }

    /// Decode a `ldstr` token against `asm`'s `#US` heap.
    pub fn user_string(&self, asm: AssemblyId, token: Token) -> Result<String> {
        Ok(self.image(asm).user_strings.get(token.rid())?)
    }

    /// Map a parsed signature type onto the interned type graph.
    fn sig_to_type(&mut self, asm: AssemblyId, sig: &SigType) -> Result<TypeId> {
        let ctx = &self.ctx;
        Ok(match sig {
            SigType::Void => ctx.primitive(PrimitiveKind::Void),
            SigType::Boolean => ctx.primitive(PrimitiveKind::Boolean),
            SigType::Char => ctx.primitive(PrimitiveKind::Char),
            SigType::I1 => ctx.primitive(PrimitiveKind::SByte),
            SigType::U1 => ctx.primitive(PrimitiveKind::Byte),
            SigType::I2 => ctx.primitive(PrimitiveKind::Int16),
            SigType::U2 => ctx.primitive(PrimitiveKind::UInt16),
            SigType::I4 => ctx.primitive(PrimitiveKind::Int32),
            SigType::U4 => ctx.primitive(PrimitiveKind::UInt32),
            SigType::I8 => ctx.primitive(PrimitiveKind::Int64),
            SigType::U8 => ctx.primitive(PrimitiveKind::UInt64),
            SigType::R4 => ctx.primitive(PrimitiveKind::Single),
            SigType::R8 => ctx.primitive(PrimitiveKind::Double),
            SigType::IntPtr => ctx.primitive(PrimitiveKind::IntPtr),
            SigType::UIntPtr => ctx.primitive(PrimitiveKind::UIntPtr),
            SigType::String => ctx.primitive(PrimitiveKind::String),
            SigType::Object => ctx.primitive(PrimitiveKind::Object),
            SigType::Ptr(inner) => {
                let element = self.sig_to_type(asm, inner)?;
                self.ctx.pointer_to(element)
            }
            SigType::ByRef(inner) => {
                let element = self.sig_to_type(asm, inner)?;
                self.ctx.by_ref_to(element)
            }
            SigType::SZArray(inner) => {
                let element = self.sig_to_type(asm, inner)?;
                self.ctx.sz_array_of(element)
            }
            SigType::ValueType(token) | SigType::Class(token) => {
                self.resolve_type_token(asm, *token)?
            }
        })
    }
}

#[cfg(test)]
mod tests;
