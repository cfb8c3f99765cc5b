//! Blob signature parsing.
//!
//! Signatures are the compressed type encodings stored in the `#Blob` heap
//! for fields, method definitions/references, and local-variable lists
//! (ECMA-335 II.23.2). Only the subset of element types the compiler
//! supports is accepted; anything else is a fatal
//! [`MetadataError::UnsupportedSignatureElement`].

use crate::error::MetadataError;
use crate::tables::{Table, Token};
use crate::Result;

// Element type constants (II.23.1.16).
const ELEMENT_TYPE_VOID: u8 = 0x01;
const ELEMENT_TYPE_BOOLEAN: u8 = 0x02;
const ELEMENT_TYPE_CHAR: u8 = 0x03;
const ELEMENT_TYPE_I1: u8 = 0x04;
const ELEMENT_TYPE_U1: u8 = 0x05;
const ELEMENT_TYPE_I2: u8 = 0x06;
const ELEMENT_TYPE_U2: u8 = 0x07;
const ELEMENT_TYPE_I4: u8 = 0x08;
const ELEMENT_TYPE_U4: u8 = 0x09;
const ELEMENT_TYPE_I8: u8 = 0x0A;
const ELEMENT_TYPE_U8: u8 = 0x0B;
const ELEMENT_TYPE_R4: u8 = 0x0C;
const ELEMENT_TYPE_R8: u8 = 0x0D;
const ELEMENT_TYPE_STRING: u8 = 0x0E;
const ELEMENT_TYPE_PTR: u8 = 0x0F;
const ELEMENT_TYPE_BYREF: u8 = 0x10;
const ELEMENT_TYPE_VALUETYPE: u8 = 0x11;
const ELEMENT_TYPE_CLASS: u8 = 0x12;
const ELEMENT_TYPE_I: u8 = 0x18;
const ELEMENT_TYPE_U: u8 = 0x19;
const ELEMENT_TYPE_OBJECT: u8 = 0x1C;
const ELEMENT_TYPE_SZARRAY: u8 = 0x1D;

// Signature kind markers.
const SIG_FIELD: u8 = 0x06;
const SIG_LOCALS: u8 = 0x07;
const SIG_HAS_THIS: u8 = 0x20;
const SIG_GENERIC: u8 = 0x10;

/// A type as encoded in a signature blob, before resolution against the
/// type system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigType {
    Void,
    Boolean,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    IntPtr,
    UIntPtr,
    String,
    Object,
    Ptr(Box<SigType>),
    ByRef(Box<SigType>),
    SZArray(Box<SigType>),
    /// A value type given by a TypeDef/TypeRef token.
    ValueType(Token),
    /// A class type given by a TypeDef/TypeRef token.
    Class(Token),
}

/// A parsed method signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSig {
    /// Raw first header byte; signature compatibility compares it exactly.
    pub header: u8,
    /// True when the method has an implicit receiver.
    pub has_this: bool,
    pub return_type: SigType,
    pub params: Vec<SigType>,
}

/// Decode a compressed unsigned integer at `*pos`, advancing it.
pub fn read_compressed_u32(data: &[u8], pos: &mut usize) -> Result<u32> {
    let err = MetadataError::BadCompressedInt { offset: *pos };
    let b0 = *data.get(*pos).ok_or(MetadataError::BadCompressedInt { offset: *pos })?;
    if b0 & 0x80 == 0 {
        *pos += 1;
        return Ok(u32::from(b0));
    }
    if b0 & 0xC0 == 0x80 {
        let b1 = *data.get(*pos + 1).ok_or(MetadataError::BadCompressedInt { offset: *pos })?;
        *pos += 2;
        return Ok(u32::from(b0 & 0x3F) << 8 | u32::from(b1));
    }
    if b0 & 0xE0 == 0xC0 {
        if *pos + 4 > data.len() {
            return Err(err);
        }
        let v = u32::from(b0 & 0x1F) << 24
            | u32::from(data[*pos + 1]) << 16
            | u32::from(data[*pos + 2]) << 8
            | u32::from(data[*pos + 3]);
        *pos += 4;
        return Ok(v);
    }
    Err(err)
}

/// Decode a `TypeDefOrRefEncoded` compressed token.
fn read_type_def_or_ref(data: &[u8], pos: &mut usize) -> Result<Token> {
    let raw = read_compressed_u32(data, pos)?;
    let table = match raw & 0x3 {
        0 => Table::TypeDef,
        1 => Table::TypeRef,
        2 => Table::TypeSpec,
        _ => {
            return Err(MetadataError::UnexpectedToken {
                token: raw,
                context: "TypeDefOrRefEncoded",
            })
        }
    };
    Ok(Token::new(table, raw >> 2))
}

/// Decode one type element.
fn read_sig_type(data: &[u8], pos: &mut usize) -> Result<SigType> {
    let element = *data
        .get(*pos)
        .ok_or(MetadataError::BadCompressedInt { offset: *pos })?;
    *pos += 1;
    match element {
        ELEMENT_TYPE_VOID => Ok(SigType::Void),
        ELEMENT_TYPE_BOOLEAN => Ok(SigType::Boolean),
        ELEMENT_TYPE_CHAR => Ok(SigType::Char),
        ELEMENT_TYPE_I1 => Ok(SigType::I1),
        ELEMENT_TYPE_U1 => Ok(SigType::U1),
        ELEMENT_TYPE_I2 => Ok(SigType::I2),
        ELEMENT_TYPE_U2 => Ok(SigType::U2),
        ELEMENT_TYPE_I4 => Ok(SigType::I4),
        ELEMENT_TYPE_U4 => Ok(SigType::U4),
        ELEMENT_TYPE_I8 => Ok(SigType::I8),
        ELEMENT_TYPE_U8 => Ok(SigType::U8),
        ELEMENT_TYPE_R4 => Ok(SigType::R4),
        ELEMENT_TYPE_R8 => Ok(SigType::R8),
        ELEMENT_TYPE_I => Ok(SigType::IntPtr),
        ELEMENT_TYPE_U => Ok(SigType::UIntPtr),
        ELEMENT_TYPE_STRING => Ok(SigType::String),
        ELEMENT_TYPE_OBJECT => Ok(SigType::Object),
        ELEMENT_TYPE_PTR => Ok(SigType::Ptr(Box::new(read_sig_type(data, pos)?))),
        ELEMENT_TYPE_BYREF => Ok(SigType::ByRef(Box::new(read_sig_type(data, pos)?))),
        ELEMENT_TYPE_SZARRAY => Ok(SigType::SZArray(Box::new(read_sig_type(data, pos)?))),
        ELEMENT_TYPE_VALUETYPE => Ok(SigType::ValueType(read_type_def_or_ref(data, pos)?)),
        ELEMENT_TYPE_CLASS => Ok(SigType::Class(read_type_def_or_ref(data, pos)?)),
        other => Err(MetadataError::UnsupportedSignatureElement { element: other }),
    }
}

/// Parse a field signature blob.
pub fn parse_field_sig(blob: &[u8]) -> Result<SigType> {
    let mut pos = 0usize;
    let marker = *blob
        .first()
        .ok_or(MetadataError::BadCompressedInt { offset: 0 })?;
    if marker != SIG_FIELD {
        return Err(MetadataError::BadSignatureKind {
            expected: SIG_FIELD,
            found: marker,
        });
    }
    pos += 1;
    read_sig_type(blob, &mut pos)
}

/// Parse a method definition/reference signature blob.
pub fn parse_method_sig(blob: &[u8]) -> Result<MethodSig> {
    let mut pos = 0usize;
    let header = *blob
        .first()
        .ok_or(MetadataError::BadCompressedInt { offset: 0 })?;
    pos += 1;
    if header & SIG_GENERIC != 0 {
        // Generic arity is representable but never compiled; read and drop.
        read_compressed_u32(blob, &mut pos)?;
    }
    let param_count = read_compressed_u32(blob, &mut pos)? as usize;
    let return_type = read_sig_type(blob, &mut pos)?;
    let mut params = Vec::with_capacity(param_count);
    for _ in 0..param_count {
        params.push(read_sig_type(blob, &mut pos)?);
    }
    Ok(MethodSig {
        header,
        has_this: header & SIG_HAS_THIS != 0,
        return_type,
        params,
    })
}

/// Parse a local-variable signature blob (StandAloneSig payload).
pub fn parse_locals_sig(blob: &[u8]) -> Result<Vec<SigType>> {
    let mut pos = 0usize;
    let marker = *blob
        .first()
        .ok_or(MetadataError::BadCompressedInt { offset: 0 })?;
    if marker != SIG_LOCALS {
        return Err(MetadataError::BadSignatureKind {
            expected: SIG_LOCALS,
            found: marker,
        });
    }
    pos += 1;
    let count = read_compressed_u32(blob, &mut pos)? as usize;
    let mut locals = Vec::with_capacity(count);
    for _ in 0..count {
        locals.push(read_sig_type(blob, &mut pos)?);
    }
    Ok(locals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn compressed_u32_widths() {
        let mut pos = 0;
        assert_eq!(read_compressed_u32(&[0x03], &mut pos).unwrap(), 3);
        let mut pos = 0;
        assert_eq!(read_compressed_u32(&[0x80, 0x80], &mut pos).unwrap(), 0x80);
        assert_eq!(pos, 2);
        let mut pos = 0;
        assert_eq!(
            read_compressed_u32(&[0xC0, 0x00, 0x40, 0x00], &mut pos).unwrap(),
            0x4000
        );
        assert_eq!(pos, 4);
        let mut pos = 0;
        assert!(read_compressed_u32(&[0xFF], &mut pos).is_err());
    }

    #[test]
    fn parses_static_void_method_sig() {
        // DEFAULT, 1 param, void return, string[] param.
        let sig = parse_method_sig(&[0x00, 0x01, 0x01, 0x1D, 0x0E]).unwrap();
        assert!(!sig.has_this);
        assert_eq!(sig.return_type, SigType::Void);
        assert_eq!(
            sig.params,
            vec![SigType::SZArray(Box::new(SigType::String))]
        );
    }

    #[test]
    fn parses_instance_method_sig() {
        // HASTHIS, 0 params, int32 return.
        let sig = parse_method_sig(&[0x20, 0x00, 0x08]).unwrap();
        assert!(sig.has_this);
        assert_eq!(sig.return_type, SigType::I4);
        assert!(sig.params.is_empty());
    }

    #[test]
    fn parses_field_sig() {
        assert_eq!(parse_field_sig(&[0x06, 0x08]).unwrap(), SigType::I4);
        assert!(parse_field_sig(&[0x07, 0x08]).is_err());
    }

    #[test]
    fn parses_locals_with_class_token() {
        // LOCAL_SIG, 2 locals: int32, class TypeRef(1).
        let locals = parse_locals_sig(&[0x07, 0x02, 0x08, 0x12, 0x05]).unwrap();
        assert_eq!(locals.len(), 2);
        assert_eq!(locals[0], SigType::I4);
        assert_eq!(locals[1], SigType::Class(Token::new(Table::TypeRef, 1)));
    }

    #[test]
    fn rejects_unsupported_elements() {
        // ELEMENT_TYPE_GENERICINST (0x15) is outside the supported subset.
        assert!(matches!(
            parse_field_sig(&[0x06, 0x15]),
            Err(MetadataError::UnsupportedSignatureElement { element: 0x15 })
        ));
    }
}
