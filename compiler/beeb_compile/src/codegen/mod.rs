//! Target-instruction emission.
//!
//! [`CodeGenerator`] is the abstract surface the translator drives: one
//! emission operation per translated bytecode operation, plus framing,
//! data declaration, and the intrinsic routine bodies. Implementations
//! produce pure text; nothing executes in-process.
//!
//! Offsets handed in are the entity model's front-to-back byte offsets;
//! how they map onto the target's frames is the implementation's
//! business.

use crate::intrinsics::Intrinsic;

pub mod bbc;

/// Frame facts for the method currently being emitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInfo {
    /// Total argument bytes, including the receiver slot.
    pub params_size: u32,
    /// Total local-variable bytes.
    pub locals_size: u32,
    /// Return value bytes (0 for void).
    pub return_size: u32,
}

/// One slot of an emitted dispatch table.
#[derive(Debug, Clone)]
pub struct VtableSlotData {
    pub index: u16,
    /// The slot's symbolic offset constant (from the introducing method).
    pub slot_label: String,
    /// Unique name of the installed implementation.
    pub method_unique_name: String,
}

/// An emitted dispatch table.
#[derive(Debug, Clone)]
pub struct VtableData {
    pub label: String,
    pub slots: Vec<VtableSlotData>,
}

/// Emission interface for one target platform.
pub trait CodeGenerator {
    /// Pointer width of the target, in bytes.
    fn pointer_size(&self) -> u32;

    // Framing.
    fn write_header(&mut self);
    fn write_entry_point(&mut self, entry_unique_name: &str);
    fn write_footer(&mut self, static_constructors: &[String]);
    fn write_method_start(&mut self, unique_name: &str);
    fn write_method_end(&mut self);
    fn write_prologue(&mut self, frame: FrameInfo);

    // Listing structure.
    fn write_label(&mut self, label: &str);
    fn write_comment(&mut self, text: &str);
    fn write_blank(&mut self);

    /// Emit the hand-written body of an intrinsic routine.
    fn write_intrinsic(&mut self, intrinsic: Intrinsic);

    // Operand-stack operations.
    fn write_add(&mut self, size: u32);
    fn write_sub(&mut self, size: u32);
    fn write_clt_int32(&mut self);
    fn write_ceq_int32(&mut self);
    fn write_conv_i_int32(&mut self);
    fn write_dup(&mut self, size: u32);
    fn write_pop(&mut self, size: u32);
    fn write_ldc_i4(&mut self, value: i32);

    // Control transfer.
    fn write_br(&mut self, label: &str);
    fn write_brtrue(&mut self, size: u32, label: &str);
    fn write_brfalse(&mut self, size: u32, label: &str);

    // Argument, local, and field traffic.
    fn write_ldarg(&mut self, offset: u32, size: u32);
    fn write_ldloc(&mut self, offset: u32, size: u32);
    fn write_stloc(&mut self, offset: u32, size: u32);
    fn write_ldloca(&mut self, offset: u32);
    fn write_ldfld(&mut self, has_header: bool, offset: u32, size: u32);
    fn write_stfld(&mut self, has_header: bool, offset: u32, size: u32);
    fn write_ldsfld(&mut self, label: &str, size: u32);
    fn write_stsfld(&mut self, label: &str, size: u32);
    fn write_ldstr(&mut self, key: &str);
    fn write_stind(&mut self, size: u32);
    fn write_initobj(&mut self, size: u32);

    // Calls and construction.
    fn write_call(&mut self, callee_unique_name: &str);
    fn write_callvirt(&mut self, slot_label: &str, args_size: u32);
    fn write_newobj(
        &mut self,
        ctor_unique_name: &str,
        ctor_params_size: u32,
        alloc_size: u32,
        vtable_label: &str,
        alloc_unique_name: &str,
    );
    fn write_ret(&mut self);

    // Static data.
    fn write_static_field(&mut self, label: &str, size: u32);
    fn write_string_constant(&mut self, key: &str, value: &str);
    fn write_vtables(&mut self, vtables: &[VtableData]);

    /// Take the accumulated assembly text.
    fn finish(&mut self) -> String;
}
