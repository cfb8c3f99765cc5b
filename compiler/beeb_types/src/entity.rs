//! Entity model: the derived facts the compiler needs about methods and
//! fields, cached at materialization time.

use crate::TypeId;

/// Primitive type kinds, mirroring the signature element types the
/// compiler supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Void,
    Boolean,
    Char,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    IntPtr,
    UIntPtr,
    String,
    Object,
}

impl PrimitiveKind {
    /// Storage size in bytes; pointer-sized kinds return `pointer_size`.
    pub fn size(self, pointer_size: u32) -> u32 {
        match self {
            PrimitiveKind::Void => 0,
            PrimitiveKind::Boolean
            | PrimitiveKind::Char
            | PrimitiveKind::SByte
            | PrimitiveKind::Byte => 1,
            PrimitiveKind::Int16 | PrimitiveKind::UInt16 => 2,
            PrimitiveKind::Int32 | PrimitiveKind::UInt32 | PrimitiveKind::Single => 4,
            PrimitiveKind::Int64 | PrimitiveKind::UInt64 | PrimitiveKind::Double => 8,
            PrimitiveKind::IntPtr
            | PrimitiveKind::UIntPtr
            | PrimitiveKind::String
            | PrimitiveKind::Object => pointer_size,
        }
    }

    /// The name used in unique method symbols.
    pub fn encoded_name(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "Void",
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::SByte => "SByte",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::Int16 => "Int16",
            PrimitiveKind::UInt16 => "UInt16",
            PrimitiveKind::Int32 => "Int32",
            PrimitiveKind::UInt32 => "UInt32",
            PrimitiveKind::Int64 => "Int64",
            PrimitiveKind::UInt64 => "UInt64",
            PrimitiveKind::Single => "Single",
            PrimitiveKind::Double => "Double",
            PrimitiveKind::IntPtr => "IntPtr",
            PrimitiveKind::UIntPtr => "UIntPtr",
            PrimitiveKind::String => "String",
            PrimitiveKind::Object => "Object",
        }
    }

    /// True when values of this kind are manipulated through an address.
    pub fn is_pointer_like(self) -> bool {
        matches!(
            self,
            PrimitiveKind::IntPtr
                | PrimitiveKind::UIntPtr
                | PrimitiveKind::String
                | PrimitiveKind::Object
        )
    }
}

/// A declared method signature: the receiver is *not* part of `params`;
/// it appears only in the parameter layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    /// Raw calling-convention header byte; compatibility compares it
    /// exactly.
    pub header: u8,
    pub return_type: TypeId,
    pub params: Vec<TypeId>,
}

impl MethodSignature {
    const HAS_THIS: u8 = 0x20;

    /// Signature for a static method with the default calling convention.
    pub fn static_sig(return_type: TypeId, params: Vec<TypeId>) -> Self {
        MethodSignature {
            header: 0,
            return_type,
            params,
        }
    }

    /// Signature for an instance method (implicit receiver).
    pub fn instance_sig(return_type: TypeId, params: Vec<TypeId>) -> Self {
        MethodSignature {
            header: Self::HAS_THIS,
            return_type,
            params,
        }
    }

    /// True when the method carries an implicit receiver parameter.
    pub fn has_this(&self) -> bool {
        self.header & Self::HAS_THIS != 0
    }

    /// Exact compatibility: header, return type, and every parameter type
    /// by identity.
    pub fn is_compatible(&self, other: &MethodSignature) -> bool {
        self.header == other.header
            && self.return_type == other.return_type
            && self.params == other.params
    }
}

/// One parameter slot, including the implicit receiver at index 0 for
/// instance methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamData {
    pub index: u32,
    /// Byte offset within the argument frame, accumulated front-to-back.
    pub offset: u32,
    pub ty: TypeId,
}

/// One local-variable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalData {
    pub index: u32,
    /// Byte offset within the locals frame, accumulated front-to-back.
    pub offset: u32,
    pub ty: TypeId,
}

/// A method body ready for translation.
#[derive(Debug, Clone)]
pub struct BodyData {
    pub code: Vec<u8>,
    pub max_stack: u16,
}

/// A materialized method.
#[derive(Debug, Clone)]
pub struct MethodData {
    pub declaring_type: TypeId,
    pub name: String,
    /// Globally unique assembly-level symbol, derived from the declaring
    /// type, name, and parameter type encodings. The encoding scheme —
    /// not a symbol table — prevents collisions.
    pub unique_name: String,
    pub signature: MethodSignature,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_new_slot: bool,
    /// Parameter layout; index 0 is the receiver for instance methods.
    pub params: Vec<ParamData>,
    pub params_size: u32,
    pub locals: Vec<LocalData>,
    pub locals_size: u32,
    /// `None` for intrinsic or extern bodies.
    pub body: Option<BodyData>,
}

impl MethodData {
    /// True when `ret` must leave a value on the operand stack.
    pub fn returns_value(&self, void: TypeId) -> bool {
        self.signature.return_type != void
    }
}

/// A materialized field.
#[derive(Debug, Clone)]
pub struct FieldData {
    pub owner: TypeId,
    pub name: String,
    pub ty: TypeId,
    /// Byte offset within the owner's instance layout; 0 for statics,
    /// which live in their own storage area.
    pub offset: u32,
    pub is_static: bool,
}

impl FieldData {
    /// The label of the static storage cell for this field.
    pub fn static_label(&self, owner_encoded: &str) -> String {
        format!("StaticField_{owner_encoded}_{}", self.name)
    }
}

/// Input to [`crate::TypeContext::define_fields`].
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub ty: TypeId,
    pub is_static: bool,
}

/// Input to [`crate::TypeContext::define_method`].
#[derive(Debug, Clone)]
pub struct MethodSpec {
    pub name: String,
    pub signature: MethodSignature,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_new_slot: bool,
    pub locals: Vec<TypeId>,
    pub body: Option<BodyData>,
}
