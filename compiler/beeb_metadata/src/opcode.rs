//! CIL opcode decoding.
//!
//! [`IlCursor`] walks a method's code bytes and yields one [`OpCode`] per
//! instruction with its inline operand already read and, for branches, the
//! target normalized to an absolute IL offset. Encodings that differ only
//! in operand width (`ldc.i4.2`, `ldc.i4.s`, `ldc.i4`) decode to the same
//! variant; the mnemonic of the actual encoding is preserved for listing
//! comments.
//!
//! Opcodes outside the compiler's supported set decode to
//! [`OpCode::Unsupported`] so the translator can distinguish "add support"
//! from genuine verification failures.

use crate::error::MetadataError;
use crate::tables::Token;
use crate::Result;

/// One decoded CIL instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Nop,
    Dup,
    Pop,
    /// All `ldarg.*` encodings.
    Ldarg(u16),
    /// All `ldloc.*` encodings.
    Ldloc(u16),
    /// All `stloc.*` encodings.
    Stloc(u16),
    Ldloca(u16),
    /// All `ldc.i4*` encodings.
    LdcI4(i32),
    Add,
    Sub,
    Clt,
    Ceq,
    ConvI,
    /// Unconditional branch to an absolute IL offset.
    Br(u32),
    Brtrue(u32),
    Brfalse(u32),
    /// `blt`: translated as `clt` + `brtrue`.
    Blt(u32),
    /// `beq`: translated as `ceq` + `brtrue`.
    Beq(u32),
    Call(Token),
    Callvirt(Token),
    Ret,
    Newobj(Token),
    Initobj(Token),
    Ldstr(Token),
    Ldfld(Token),
    Stfld(Token),
    Ldsfld(Token),
    Stsfld(Token),
    StindI,
    Sizeof(Token),
    /// A structurally valid prefix/value the compiler has no handler for.
    Unsupported(u16),
}

/// A decoded instruction with its position and source mnemonic.
#[derive(Debug, Clone, Copy)]
pub struct Decoded {
    /// IL offset of the instruction's first byte; branch labels derive
    /// from this.
    pub offset: u32,
    pub op: OpCode,
    /// Mnemonic of the encoding actually used, for listing comments.
    pub mnemonic: &'static str,
}

/// Cursor over a method's CIL bytes.
pub struct IlCursor<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> IlCursor<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        IlCursor { code, pos: 0 }
    }

    fn read_u8(&mut self) -> Result<u8> {
        let b = *self
            .code
            .get(self.pos)
            .ok_or(MetadataError::Truncated {
                offset: self.pos,
                wanted: 1,
            })?;
        self.pos += 1;
        Ok(b)
    }

    #[allow(clippy::cast_possible_wrap)]
    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let end = self.pos + 4;
        let bytes = self
            .code
            .get(self.pos..end)
            .ok_or(MetadataError::Truncated {
                offset: self.pos,
                wanted: 4,
            })?;
        self.pos = end;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    #[allow(clippy::cast_possible_wrap)]
    fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    fn read_token(&mut self) -> Result<Token> {
        Ok(Token(self.read_u32()?))
    }

    /// Resolve a relative branch displacement against the position after
    /// the operand.
    fn target(&self, at: u32, disp: i32) -> Result<u32> {
        let after = u32::try_from(self.pos)
            .map_err(|_| MetadataError::BadBranchTarget { offset: at })?;
        let abs = i64::from(after) + i64::from(disp);
        u32::try_from(abs).map_err(|_| MetadataError::BadBranchTarget { offset: at })
    }

    /// Decode the next instruction, or `None` at end of stream.
    pub fn next(&mut self) -> Result<Option<Decoded>> {
        if self.pos >= self.code.len() {
            return Ok(None);
        }
        #[allow(clippy::cast_possible_truncation)]
        let offset = self.pos as u32;
        let b = self.read_u8()?;
        let (op, mnemonic) = match b {
            0x00 => (OpCode::Nop, "nop"),
            0x02..=0x05 => (OpCode::Ldarg(u16::from(b - 0x02)), "ldarg"),
            0x06..=0x09 => (OpCode::Ldloc(u16::from(b - 0x06)), "ldloc"),
            0x0A..=0x0D => (OpCode::Stloc(u16::from(b - 0x0A)), "stloc"),
            0x0E => (OpCode::Ldarg(u16::from(self.read_u8()?)), "ldarg.s"),
            0x11 => (OpCode::Ldloc(u16::from(self.read_u8()?)), "ldloc.s"),
            0x12 => (OpCode::Ldloca(u16::from(self.read_u8()?)), "ldloca.s"),
            0x13 => (OpCode::Stloc(u16::from(self.read_u8()?)), "stloc.s"),
            0x15 => (OpCode::LdcI4(-1), "ldc.i4.m1"),
            0x16..=0x1E => (OpCode::LdcI4(i32::from(b) - 0x16), "ldc.i4"),
            0x1F => (OpCode::LdcI4(i32::from(self.read_i8()?)), "ldc.i4.s"),
            0x20 => (OpCode::LdcI4(self.read_i32()?), "ldc.i4"),
            0x25 => (OpCode::Dup, "dup"),
            0x26 => (OpCode::Pop, "pop"),
            0x28 => (OpCode::Call(self.read_token()?), "call"),
            0x2A => (OpCode::Ret, "ret"),
            0x2B => {
                let d = i32::from(self.read_i8()?);
                (OpCode::Br(self.target(offset, d)?), "br.s")
            }
            0x2C => {
                let d = i32::from(self.read_i8()?);
                (OpCode::Brfalse(self.target(offset, d)?), "brfalse.s")
            }
            0x2D => {
                let d = i32::from(self.read_i8()?);
                (OpCode::Brtrue(self.target(offset, d)?), "brtrue.s")
            }
            0x2E => {
                let d = i32::from(self.read_i8()?);
                (OpCode::Beq(self.target(offset, d)?), "beq.s")
            }
            0x32 => {
                let d = i32::from(self.read_i8()?);
                (OpCode::Blt(self.target(offset, d)?), "blt.s")
            }
            0x38 => {
                let d = self.read_i32()?;
                (OpCode::Br(self.target(offset, d)?), "br")
            }
            0x39 => {
                let d = self.read_i32()?;
                (OpCode::Brfalse(self.target(offset, d)?), "brfalse")
            }
            0x3A => {
                let d = self.read_i32()?;
                (OpCode::Brtrue(self.target(offset, d)?), "brtrue")
            }
            0x3B => {
                let d = self.read_i32()?;
                (OpCode::Beq(self.target(offset, d)?), "beq")
            }
            0x3F => {
                let d = self.read_i32()?;
                (OpCode::Blt(self.target(offset, d)?), "blt")
            }
            0x58 => (OpCode::Add, "add"),
            0x59 => (OpCode::Sub, "sub"),
            0x6F => (OpCode::Callvirt(self.read_token()?), "callvirt"),
            0x72 => (OpCode::Ldstr(self.read_token()?), "ldstr"),
            0x73 => (OpCode::Newobj(self.read_token()?), "newobj"),
            0x7B => (OpCode::Ldfld(self.read_token()?), "ldfld"),
            0x7D => (OpCode::Stfld(self.read_token()?), "stfld"),
            0x7E => (OpCode::Ldsfld(self.read_token()?), "ldsfld"),
            0x80 => (OpCode::Stsfld(self.read_token()?), "stsfld"),
            0xD3 => (OpCode::ConvI, "conv.i"),
            0xDF => (OpCode::StindI, "stind.i"),
            0xFE => {
                let second = self.read_u8()?;
                match second {
                    0x01 => (OpCode::Ceq, "ceq"),
                    0x04 => (OpCode::Clt, "clt"),
                    0x15 => (OpCode::Initobj(self.read_token()?), "initobj"),
                    0x1C => (OpCode::Sizeof(self.read_token()?), "sizeof"),
                    other => (OpCode::Unsupported(0xFE00 | u16::from(other)), "??"),
                }
            }
            other => (OpCode::Unsupported(u16::from(other)), "??"),
        };
        Ok(Some(Decoded {
            offset,
            op,
            mnemonic,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::Table;
    use pretty_assertions::assert_eq;

    fn decode_all(code: &[u8]) -> Vec<Decoded> {
        let mut cursor = IlCursor::new(code);
        let mut out = Vec::new();
        while let Some(d) = cursor.next().unwrap() {
            out.push(d);
        }
        out
    }

    #[test]
    fn decodes_simple_add_method() {
        // ldc.i4.1; ldc.i4.1; add; ret
        let ops = decode_all(&[0x17, 0x17, 0x58, 0x2A]);
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[0].op, OpCode::LdcI4(1));
        assert_eq!(ops[1].offset, 1);
        assert_eq!(ops[2].op, OpCode::Add);
        assert_eq!(ops[3].op, OpCode::Ret);
    }

    #[test]
    fn short_branch_targets_are_absolute() {
        // 0: br.s +2 (target 4); 2: nop; 3: nop; 4: ret
        let ops = decode_all(&[0x2B, 0x02, 0x00, 0x00, 0x2A]);
        assert_eq!(ops[0].op, OpCode::Br(4));
        assert_eq!(ops[0].mnemonic, "br.s");
    }

    #[test]
    fn backward_branch() {
        // 0: nop; 1: br.s -3 (target 0)
        let ops = decode_all(&[0x00, 0x2B, 0xFD]);
        assert_eq!(ops[1].op, OpCode::Br(0));
    }

    #[test]
    fn branch_before_method_start_is_rejected() {
        let mut cursor = IlCursor::new(&[0x2B, 0xF0]);
        assert!(matches!(
            cursor.next(),
            Err(MetadataError::BadBranchTarget { offset: 0 })
        ));
    }

    #[test]
    fn decodes_two_byte_opcodes() {
        let mut code = vec![0xFE, 0x04, 0xFE, 0x15];
        code.extend_from_slice(&Token::new(Table::TypeDef, 2).0.to_le_bytes());
        let ops = decode_all(&code);
        assert_eq!(ops[0].op, OpCode::Clt);
        assert_eq!(ops[1].op, OpCode::Initobj(Token::new(Table::TypeDef, 2)));
    }

    #[test]
    fn ldc_encodings_normalize() {
        // ldc.i4.m1; ldc.i4.s -5; ldc.i4 1000
        let mut code = vec![0x15, 0x1F, 0xFB, 0x20];
        code.extend_from_slice(&1000i32.to_le_bytes());
        let ops = decode_all(&code);
        assert_eq!(ops[0].op, OpCode::LdcI4(-1));
        assert_eq!(ops[1].op, OpCode::LdcI4(-5));
        assert_eq!(ops[2].op, OpCode::LdcI4(1000));
    }

    #[test]
    fn unknown_opcode_is_unsupported_not_an_error() {
        let ops = decode_all(&[0x5A]); // mul
        assert_eq!(ops[0].op, OpCode::Unsupported(0x5A));
    }
}
