//! The worklist-driven translator.
//!
//! Translation is a fixed-point reachability computation seeded with the
//! entry method. Draining the queue compiles methods one at a time; each
//! compiled method may discover new work (callees, constructors, the
//! allocation intrinsic). When the queue runs dry, two discovery passes
//! feed it again: dispatch tables are built against the accumulated
//! call-used set and every installed slot method is enqueued, and the
//! static constructors of types whose static fields were touched join
//! the queue. The loop halts because the visited set only grows and is
//! bounded by the input's method count — each method is translated at
//! most once.
//!
//! Per instruction, the abstract operand stack is checked against the
//! opcode's type contract before anything is emitted; a contradiction is
//! a fatal verification error and discards all output.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use beeb_metadata::{IlCursor, OpCode, Token};
use beeb_types::entity::MethodData;
use beeb_types::{AssemblyId, FieldId, MetadataStore, MethodId, PrimitiveKind, TypeId, TypeKind};

use crate::codegen::{CodeGenerator, FrameInfo, VtableData, VtableSlotData};
use crate::error::CompileError;
use crate::intrinsics::Intrinsic;
use crate::vtable::{slot_label, Vtable, VtableBuilder, VtableTracker};

type Result<T> = std::result::Result<T, CompileError>;

/// Position context for verification errors.
#[derive(Clone, Copy)]
struct At<'m> {
    method: &'m str,
    offset: u32,
}

/// The compiler core: drains the method worklist and emits through a
/// [`CodeGenerator`].
pub struct Translator<'a, G: CodeGenerator> {
    store: &'a mut MetadataStore,
    generator: &'a mut G,
    visited: FxHashSet<MethodId>,
    queue: VecDeque<MethodId>,
    /// Abstract operand stack, reset per method.
    stack: SmallVec<[TypeId; 16]>,
    /// String constants in first-use order, keyed per `ldstr` token:
    /// identical literals at distinct tokens emit distinct constants.
    strings: Vec<(String, String)>,
    string_keys: FxHashSet<String>,
    /// Static fields touched by any compiled method, in first-touch order.
    static_fields: Vec<FieldId>,
    static_field_set: FxHashSet<FieldId>,
    tracker: VtableTracker,
}

impl<'a, G: CodeGenerator> Translator<'a, G> {
    pub fn new(store: &'a mut MetadataStore, generator: &'a mut G) -> Self {
        Translator {
            store,
            generator,
            visited: FxHashSet::default(),
            queue: VecDeque::new(),
            stack: SmallVec::new(),
            strings: Vec::new(),
            string_keys: FxHashSet::default(),
            static_fields: Vec::new(),
            static_field_set: FxHashSet::default(),
            tracker: VtableTracker::new(),
        }
    }

    /// Run the fixed-point loop from `entry`, then emit static data,
    /// dispatch tables, and the footer.
    pub fn run(&mut self, entry: MethodId) -> Result<()> {
        self.enqueue(entry);

        let mut static_ctors: Vec<String> = Vec::new();
        let mut seeded_cctor_types: FxHashSet<TypeId> = FxHashSet::default();

        let final_tables: Vec<Vtable> = loop {
            while let Some(method) = self.queue.pop_front() {
                self.compile_method(method)?;
            }

            // Virtual-method discovery feeds the same worklist: build
            // tables for every instantiated type against the current
            // call-used set and enqueue whatever they install.
            let tables = VtableBuilder::new(self.store, &self.tracker).build_all()?;
            for table in &tables {
                for slot in &table.slots {
                    self.enqueue(slot.method);
                }
            }

            // Static constructors of types owning touched static fields.
            let owners: Vec<TypeId> = self
                .static_fields
                .iter()
                .map(|&f| self.store.ctx().field(f).owner)
                .collect();
            for owner in owners {
                if !seeded_cctor_types.insert(owner) {
                    continue;
                }
                if let Some(cctor) = self.store.static_constructor_of(owner)? {
                    if self.enqueue(cctor) {
                        static_ctors.push(self.store.ctx().method(cctor).unique_name);
                    }
                }
            }

            if self.queue.is_empty() {
                break tables;
            }
        };

        self.write_static_data(&final_tables, &static_ctors);
        Ok(())
    }

    fn write_static_data(&mut self, tables: &[Vtable], static_ctors: &[String]) {
        for i in 0..self.static_fields.len() {
            let field = self.store.ctx().field(self.static_fields[i]);
            let label = field.static_label(&self.store.ctx().encoded_name(field.owner));
            let size = self.store.ctx().size_of(field.ty);
            self.generator.write_static_field(&label, size);
        }
        if !self.static_fields.is_empty() {
            self.generator.write_blank();
        }

        for i in 0..self.strings.len() {
            let (key, value) = self.strings[i].clone();
            self.generator.write_string_constant(&key, &value);
        }
        if !self.strings.is_empty() {
            self.generator.write_blank();
        }

        let data: Vec<VtableData> = tables
            .iter()
            .map(|table| VtableData {
                label: Vtable::label(&self.store.ctx().encoded_name(table.ty)),
                slots: table
                    .slots
                    .iter()
                    .map(|slot| VtableSlotData {
                        index: slot.index,
                        slot_label: slot_label(
                            &self.store.ctx().method(slot.overridden).unique_name,
                        ),
                        method_unique_name: self.store.ctx().method(slot.method).unique_name,
                    })
                    .collect(),
            })
            .collect();
        self.generator.write_vtables(&data);
        self.generator.write_footer(static_ctors);
    }

    /// Add `method` to the worklist unless already visited. Returns true
    /// when newly enqueued.
    fn enqueue(&mut self, method: MethodId) -> bool {
        if self.visited.insert(method) {
            self.queue.push_back(method);
            true
        } else {
            false
        }
    }

    #[tracing::instrument(level = "debug", skip_all)]
    fn compile_method(&mut self, method: MethodId) -> Result<()> {
        let data = self.store.ctx().method(method);
        tracing::debug!(method = %data.unique_name, "compiling");

        self.generator.write_method_start(&data.unique_name);
        if let Some(intrinsic) = Intrinsic::from_unique_name(&data.unique_name) {
            self.generator.write_intrinsic(intrinsic);
        } else if data.body.is_some() {
            self.translate_body(method, &data)?;
        } else {
            return Err(CompileError::MissingBody {
                method: data.unique_name,
            });
        }
        self.generator.write_method_end();
        Ok(())
    }

    fn translate_body(&mut self, method: MethodId, data: &MethodData) -> Result<()> {
        let body = data
            .body
            .as_ref()
            .unwrap_or_else(|| unreachable!("checked by compile_method"));
        let asm = self.store.method_origin(method);
        let void = self.store.ctx().primitive(PrimitiveKind::Void);

        self.stack.clear();
        let return_size = if data.signature.return_type == void {
            0
        } else {
            self.store.ctx().size_of(data.signature.return_type)
        };
        self.generator.write_prologue(FrameInfo {
            params_size: data.params_size,
            locals_size: data.locals_size,
            return_size,
        });

        let code = body.code.clone();
        let mut cursor = IlCursor::new(&code);
        while let Some(decoded) = cursor.next()? {
            self.generator
                .write_label(&format!("IL_{:04x}", decoded.offset));
            let at = At {
                method: &data.unique_name,
                offset: decoded.offset,
            };
            self.translate_op(at, data, asm, decoded.op, decoded.mnemonic)?;
            self.generator.write_blank();
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn translate_op(
        &mut self,
        at: At<'_>,
        data: &MethodData,
        asm: Option<AssemblyId>,
        op: OpCode,
        mnemonic: &'static str,
    ) -> Result<()> {
        let ctx_int32 = self.store.ctx().primitive(PrimitiveKind::Int32);
        match op {
            OpCode::Nop => {
                self.generator.write_comment("nop");
            }
            OpCode::Dup => {
                let ty = self.pop(at)?;
                self.push(ty);
                self.push(ty);
                let size = self.store.ctx().size_of(ty);
                self.generator.write_comment("dup");
                self.generator.write_dup(size);
            }
            OpCode::Pop => {
                let ty = self.pop(at)?;
                let size = self.store.ctx().size_of(ty);
                self.generator.write_comment("pop");
                self.generator.write_pop(size);
            }
            OpCode::LdcI4(value) => {
                self.push(ctx_int32);
                self.generator.write_comment(&format!("{mnemonic} {value}"));
                self.generator.write_ldc_i4(value);
            }
            OpCode::Ldarg(index) => {
                let param = *data.params.get(index as usize).ok_or_else(|| {
                    CompileError::InvalidSlot {
                        method: at.method.to_owned(),
                        offset: at.offset,
                        kind: "argument",
                        index,
                    }
                })?;
                self.push(param.ty);
                let size = self.store.ctx().size_of(param.ty);
                self.generator.write_comment(&format!("ldarg.{index}"));
                self.generator.write_ldarg(param.offset, size);
            }
            OpCode::Ldloc(index) => {
                let local = *data.locals.get(index as usize).ok_or_else(|| {
                    CompileError::InvalidSlot {
                        method: at.method.to_owned(),
                        offset: at.offset,
                        kind: "local",
                        index,
                    }
                })?;
                self.push(local.ty);
                let size = self.store.ctx().size_of(local.ty);
                self.generator.write_comment(&format!("ldloc.{index}"));
                self.generator.write_ldloc(local.offset, size);
            }
            OpCode::Stloc(index) => {
                let local = *data.locals.get(index as usize).ok_or_else(|| {
                    CompileError::InvalidSlot {
                        method: at.method.to_owned(),
                        offset: at.offset,
                        kind: "local",
                        index,
                    }
                })?;
                let value = self.pop(at)?;
                self.expect_assignable(at, value, local.ty)?;
                let size = self.store.ctx().size_of(local.ty);
                self.generator.write_comment(&format!("stloc.{index}"));
                self.generator.write_stloc(local.offset, size);
            }
            OpCode::Ldloca(index) => {
                let local = *data.locals.get(index as usize).ok_or_else(|| {
                    CompileError::InvalidSlot {
                        method: at.method.to_owned(),
                        offset: at.offset,
                        kind: "local",
                        index,
                    }
                })?;
                let by_ref = self.store.ctx().by_ref_to(local.ty);
                self.push(by_ref);
                self.generator.write_comment(&format!("ldloca {index}"));
                self.generator.write_ldloca(local.offset);
            }
            OpCode::Add | OpCode::Sub => {
                let right = self.pop(at)?;
                let left = self.pop(at)?;
                if left != right {
                    return Err(self.type_mismatch(at, left, right));
                }
                if !matches!(
                    self.store.ctx().kind(left),
                    TypeKind::Primitive(PrimitiveKind::Int32 | PrimitiveKind::IntPtr)
                ) {
                    return Err(CompileError::UnsupportedOperandType {
                        method: at.method.to_owned(),
                        op: mnemonic,
                        ty: self.store.ctx().display_name(left),
                    });
                }
                self.push(left);
                let size = self.store.ctx().size_of(left);
                self.generator.write_comment(mnemonic);
                if matches!(op, OpCode::Add) {
                    self.generator.write_add(size);
                } else {
                    self.generator.write_sub(size);
                }
            }
            OpCode::Clt => self.op_clt(at)?,
            OpCode::Ceq => self.op_ceq(at)?,
            OpCode::ConvI => {
                let ty = self.pop(at)?;
                if ty != ctx_int32 {
                    return Err(CompileError::UnsupportedOperandType {
                        method: at.method.to_owned(),
                        op: "conv.i",
                        ty: self.store.ctx().display_name(ty),
                    });
                }
                let intptr = self.store.ctx().primitive(PrimitiveKind::IntPtr);
                self.push(intptr);
                self.generator.write_comment("conv.i");
                self.generator.write_conv_i_int32();
            }
            OpCode::Br(target) => {
                let label = il_label(target);
                self.generator.write_comment(&format!("{mnemonic} {label}"));
                self.generator.write_br(&label);
            }
            OpCode::Brtrue(target) => self.op_brtrue(at, target, mnemonic)?,
            OpCode::Brfalse(target) => {
                let ty = self.pop(at)?;
                let size = self.store.ctx().size_of(ty);
                let label = il_label(target);
                self.generator.write_comment(&format!("{mnemonic} {label}"));
                self.generator.write_brfalse(size, &label);
            }
            OpCode::Blt(target) => {
                // No native form: lower as clt + brtrue.
                self.op_clt(at)?;
                self.op_brtrue(at, target, "brtrue")?;
            }
            OpCode::Beq(target) => {
                self.op_ceq(at)?;
                self.op_brtrue(at, target, "brtrue")?;
            }
            OpCode::Call(token) => self.op_call(at, asm, token, false)?,
            OpCode::Callvirt(token) => self.op_call(at, asm, token, true)?,
            OpCode::Ret => {
                let void = self.store.ctx().primitive(PrimitiveKind::Void);
                if data.signature.return_type != void {
                    let value = self.pop(at)?;
                    self.expect_assignable(at, value, data.signature.return_type)?;
                }
                if !self.stack.is_empty() {
                    return Err(CompileError::NonEmptyStackAtReturn {
                        method: at.method.to_owned(),
                        depth: self.stack.len(),
                    });
                }
                self.generator.write_comment("ret");
                self.generator.write_ret();
            }
            OpCode::Newobj(token) => self.op_newobj(at, asm, token)?,
            OpCode::Initobj(token) => {
                let ty = self.resolve_type(at, asm, token)?;
                let target = self.pop(at)?;
                if !matches!(self.store.ctx().kind(target), TypeKind::ByRef(_)) {
                    return Err(self.type_mismatch_named(at, "managed reference", target));
                }
                self.store.ensure_sized(ty)?;
                let size = self.store.ctx().size_of(ty);
                let display = self.store.ctx().display_name(ty);
                self.generator.write_comment(&format!("initobj {display}"));
                self.generator.write_initobj(size);
            }
            OpCode::Ldstr(token) => {
                let asm = self.require_origin(at, asm)?;
                let value = self.store.user_string(asm, token)?;
                let string = self.store.ctx().primitive(PrimitiveKind::String);
                self.push(string);
                let key = format!("string{:08X}", token.0);
                if self.string_keys.insert(key.clone()) {
                    self.strings.push((key.clone(), value.clone()));
                }
                self.generator
                    .write_comment(&format!("ldstr \"{value}\""));
                self.generator.write_ldstr(&key);
            }
            OpCode::Ldfld(token) => {
                let field = self.resolve_field(at, asm, token)?;
                let data = self.store.ctx().field(field);
                let object = self.pop(at)?;
                if !self.store.ctx().is_pointer_like(object) {
                    return Err(self.type_mismatch_named(at, "object reference", object));
                }
                let has_header = matches!(self.store.ctx().kind(object), TypeKind::Declared);
                self.push(data.ty);
                let size = self.store.ctx().size_of(data.ty);
                let owner = self.store.ctx().display_name(data.owner);
                self.generator
                    .write_comment(&format!("ldfld {owner}::{}", data.name));
                self.generator.write_ldfld(has_header, data.offset, size);
            }
            OpCode::Stfld(token) => {
                let field = self.resolve_field(at, asm, token)?;
                let data = self.store.ctx().field(field);
                let value = self.pop(at)?;
                self.expect_assignable(at, value, data.ty)?;
                let object = self.pop(at)?;
                if !self.store.ctx().is_pointer_like(object) {
                    return Err(self.type_mismatch_named(at, "object reference", object));
                }
                let has_header = matches!(self.store.ctx().kind(object), TypeKind::Declared);
                let size = self.store.ctx().size_of(data.ty);
                let owner = self.store.ctx().display_name(data.owner);
                self.generator
                    .write_comment(&format!("stfld {owner}::{}", data.name));
                self.generator.write_stfld(has_header, data.offset, size);
            }
            OpCode::Ldsfld(token) => {
                let field = self.resolve_field(at, asm, token)?;
                let data = self.store.ctx().field(field);
                self.record_static_field(field);
                self.push(data.ty);
                let label = data.static_label(&self.store.ctx().encoded_name(data.owner));
                let size = self.store.ctx().size_of(data.ty);
                let owner = self.store.ctx().display_name(data.owner);
                self.generator
                    .write_comment(&format!("ldsfld {owner}::{}", data.name));
                self.generator.write_ldsfld(&label, size);
            }
            OpCode::Stsfld(token) => {
                let field = self.resolve_field(at, asm, token)?;
                let data = self.store.ctx().field(field);
                self.record_static_field(field);
                let value = self.pop(at)?;
                self.expect_assignable(at, value, data.ty)?;
                let label = data.static_label(&self.store.ctx().encoded_name(data.owner));
                let size = self.store.ctx().size_of(data.ty);
                let owner = self.store.ctx().display_name(data.owner);
                self.generator
                    .write_comment(&format!("stsfld {owner}::{}", data.name));
                self.generator.write_stsfld(&label, size);
            }
            OpCode::StindI => {
                let intptr = self.store.ctx().primitive(PrimitiveKind::IntPtr);
                let value = self.pop(at)?;
                if value != intptr {
                    return Err(self.type_mismatch(at, intptr, value));
                }
                let pointer = self.pop(at)?;
                if !self.store.ctx().is_pointer_like(pointer) {
                    return Err(self.type_mismatch_named(at, "pointer", pointer));
                }
                let size = self.store.ctx().size_of(intptr);
                self.generator.write_comment("stind.i");
                self.generator.write_stind(size);
            }
            OpCode::Sizeof(token) => {
                let ty = self.resolve_type(at, asm, token)?;
                self.store.ensure_sized(ty)?;
                self.push(ctx_int32);
                let size = self.store.ctx().size_of(ty);
                let display = self.store.ctx().display_name(ty);
                self.generator.write_comment(&format!("sizeof {display}"));
                self.generator.write_ldc_i4(i32::try_from(size).unwrap_or(i32::MAX));
            }
            OpCode::Unsupported(opcode) => {
                return Err(CompileError::UnsupportedInstruction {
                    method: at.method.to_owned(),
                    opcode,
                    offset: at.offset,
                });
            }
        }
        Ok(())
    }

    fn op_clt(&mut self, at: At<'_>) -> Result<()> {
        let int32 = self.store.ctx().primitive(PrimitiveKind::Int32);
        let right = self.pop(at)?;
        let left = self.pop(at)?;
        if left != right {
            return Err(self.type_mismatch(at, left, right));
        }
        if left != int32 {
            return Err(CompileError::UnsupportedOperandType {
                method: at.method.to_owned(),
                op: "clt",
                ty: self.store.ctx().display_name(left),
            });
        }
        let boolean = self.store.ctx().primitive(PrimitiveKind::Boolean);
        self.push(boolean);
        self.generator.write_comment("clt");
        self.generator.write_clt_int32();
        Ok(())
    }

    fn op_ceq(&mut self, at: At<'_>) -> Result<()> {
        let int32 = self.store.ctx().primitive(PrimitiveKind::Int32);
        let right = self.pop(at)?;
        let left = self.pop(at)?;
        if left != right {
            return Err(self.type_mismatch(at, left, right));
        }
        if left != int32 {
            return Err(CompileError::UnsupportedOperandType {
                method: at.method.to_owned(),
                op: "ceq",
                ty: self.store.ctx().display_name(left),
            });
        }
        let boolean = self.store.ctx().primitive(PrimitiveKind::Boolean);
        self.push(boolean);
        self.generator.write_comment("ceq");
        self.generator.write_ceq_int32();
        Ok(())
    }

    fn op_brtrue(&mut self, at: At<'_>, target: u32, mnemonic: &str) -> Result<()> {
        let ty = self.pop(at)?;
        let size = self.store.ctx().size_of(ty);
        let label = il_label(target);
        self.generator.write_comment(&format!("{mnemonic} {label}"));
        self.generator.write_brtrue(size, &label);
        Ok(())
    }

    fn op_call(
        &mut self,
        at: At<'_>,
        asm: Option<AssemblyId>,
        token: Token,
        virtual_site: bool,
    ) -> Result<()> {
        let asm = self.require_origin(at, asm)?;
        let callee = self.store.resolve_method_token(asm, token)?;
        let callee_data = self.store.ctx().method(callee);

        // Arguments pop right to left against the declared parameter
        // layout (receiver included).
        for param in callee_data.params.iter().rev() {
            let actual = self.pop(at)?;
            self.expect_assignable(at, actual, param.ty)?;
        }

        let void = self.store.ctx().primitive(PrimitiveKind::Void);
        if callee_data.signature.return_type != void {
            self.push(callee_data.signature.return_type);
        }

        self.enqueue(callee);

        if virtual_site && callee_data.is_virtual {
            self.tracker.record_virtual_call(callee);
            let slot = slot_label(&callee_data.unique_name);
            self.generator
                .write_comment(&format!("callvirt {}", callee_data.unique_name));
            self.generator.write_callvirt(&slot, callee_data.params_size);
        } else {
            self.generator
                .write_comment(&format!("call {}", callee_data.unique_name));
            self.generator.write_call(&callee_data.unique_name);
        }
        Ok(())
    }

    fn op_newobj(&mut self, at: At<'_>, asm: Option<AssemblyId>, token: Token) -> Result<()> {
        let asm = self.require_origin(at, asm)?;
        let ctor = self.store.resolve_method_token(asm, token)?;
        self.enqueue(ctor);
        let ctor_data = self.store.ctx().method(ctor);

        // Constructor arguments, skipping the implicit receiver the
        // runtime supplies.
        for param in ctor_data.params.iter().skip(1).rev() {
            let actual = self.pop(at)?;
            self.expect_assignable(at, actual, param.ty)?;
        }

        let constructed = ctor_data.declaring_type;
        self.push(constructed);
        self.tracker.mark_instantiated(constructed);
        self.store.ensure_layout(constructed)?;

        let alloc = self.store.heap_alloc_method();
        self.enqueue(alloc);
        let alloc_name = self.store.ctx().method(alloc).unique_name;

        let pointer_size = self.store.ctx().pointer_size();
        let alloc_size = pointer_size + self.store.ctx().instance_size(constructed);
        let vtable_label = Vtable::label(&self.store.ctx().encoded_name(constructed));

        self.generator
            .write_comment(&format!("newobj {}", ctor_data.unique_name));
        self.generator.write_newobj(
            &ctor_data.unique_name,
            ctor_data.params_size,
            alloc_size,
            &vtable_label,
            &alloc_name,
        );
        Ok(())
    }

    fn record_static_field(&mut self, field: FieldId) {
        if self.static_field_set.insert(field) {
            self.static_fields.push(field);
        }
    }

    fn require_origin(&self, at: At<'_>, asm: Option<AssemblyId>) -> Result<AssemblyId> {
        asm.ok_or_else(|| CompileError::MissingBody {
            method: at.method.to_owned(),
        })
    }

    fn resolve_type(&mut self, at: At<'_>, asm: Option<AssemblyId>, token: Token) -> Result<TypeId> {
        let asm = self.require_origin(at, asm)?;
        Ok(self.store.resolve_type_token(asm, token)?)
    }

    fn resolve_field(&mut self, at: At<'_>, asm: Option<AssemblyId>, token: Token) -> Result<FieldId> {
        let asm = self.require_origin(at, asm)?;
        Ok(self.store.resolve_field_token(asm, token)?)
    }

    fn push(&mut self, ty: TypeId) {
        self.stack.push(ty);
    }

    fn pop(&mut self, at: At<'_>) -> Result<TypeId> {
        self.stack.pop().ok_or_else(|| CompileError::StackUnderflow {
            method: at.method.to_owned(),
            offset: at.offset,
        })
    }

    fn type_mismatch(&self, at: At<'_>, expected: TypeId, found: TypeId) -> CompileError {
        CompileError::TypeMismatch {
            method: at.method.to_owned(),
            offset: at.offset,
            expected: self.store.ctx().display_name(expected),
            found: self.store.ctx().display_name(found),
        }
    }

    fn type_mismatch_named(&self, at: At<'_>, expected: &str, found: TypeId) -> CompileError {
        CompileError::TypeMismatch {
            method: at.method.to_owned(),
            offset: at.offset,
            expected: expected.to_owned(),
            found: self.store.ctx().display_name(found),
        }
    }

    /// Identity, or a derived-to-base reference conversion. Everything
    /// else is a verification failure.
    fn is_assignable(&mut self, from: TypeId, to: TypeId) -> Result<bool> {
        if from == to {
            return Ok(true);
        }
        let ctx = self.store.ctx();
        if ctx.kind(from) != TypeKind::Declared || ctx.kind(to) != TypeKind::Declared {
            return Ok(false);
        }
        if ctx.is_value_type(from) || ctx.is_value_type(to) {
            return Ok(false);
        }
        let mut current = Some(from);
        while let Some(ty) = current {
            if ty == to {
                return Ok(true);
            }
            self.store.ensure_classified(ty)?;
            current = self.store.ctx().base_of(ty);
        }
        Ok(false)
    }

    fn expect_assignable(&mut self, at: At<'_>, from: TypeId, to: TypeId) -> Result<()> {
        if self.is_assignable(from, to)? {
            Ok(())
        } else {
            Err(self.type_mismatch(at, to, from))
        }
    }
}

fn il_label(target: u32) -> String {
    format!("IL_{target:04x}")
}

#[cfg(test)]
mod tests;
