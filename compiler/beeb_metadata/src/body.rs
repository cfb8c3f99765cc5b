//! Method body headers (ECMA-335 II.25.4).

use crate::cursor::Cursor;
use crate::error::MetadataError;
use crate::tables::Token;
use crate::Result;

const TINY_FORMAT: u8 = 0x2;
const FAT_FORMAT: u8 = 0x3;

/// A method body: the raw CIL byte stream plus execution limits and the
/// local-variable signature token.
#[derive(Debug, Clone)]
pub struct MethodBody {
    pub max_stack: u16,
    pub code: Vec<u8>,
    /// StandAloneSig token for the locals, or [`Token::NULL`] when the
    /// method has no locals.
    pub local_sig_token: Token,
}

impl MethodBody {
    /// Parse the body starting at `offset` in `data`. `rva` is only for
    /// diagnostics.
    pub(crate) fn parse_at(data: &[u8], offset: usize, rva: u32) -> Result<MethodBody> {
        let mut c = Cursor::at(data, offset)?;
        let first = c.read_u8()?;
        match first & 0x3 {
            TINY_FORMAT => {
                let size = usize::from(first >> 2);
                Ok(MethodBody {
                    max_stack: 8,
                    code: c.take(size)?.to_vec(),
                    local_sig_token: Token::NULL,
                })
            }
            FAT_FORMAT => {
                let flags = u16::from(first) | u16::from(c.read_u8()?) << 8;
                let header_size = usize::from(flags >> 12) * 4;
                if header_size < 12 {
                    return Err(MetadataError::BadMethodBody { rva });
                }
                let max_stack = c.read_u16()?;
                let code_size = c.read_u32()? as usize;
                let local_sig = c.read_u32()?;
                // Skip any header extension past the standard 12 bytes.
                c.skip(header_size - 12)?;
                let local_sig_token = if local_sig == 0 {
                    Token::NULL
                } else {
                    Token(local_sig)
                };
                Ok(MethodBody {
                    max_stack,
                    code: c.take(code_size)?.to_vec(),
                    local_sig_token,
                })
            }
            _ => Err(MetadataError::BadMethodBody { rva }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::Table;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_tiny_body() {
        // Tiny header: size 3 -> (3 << 2) | 0x2 = 0x0E.
        let data = [0x0E, 0x16, 0x17, 0x2A];
        let body = MethodBody::parse_at(&data, 0, 0).unwrap();
        assert_eq!(body.max_stack, 8);
        assert_eq!(body.code, vec![0x16, 0x17, 0x2A]);
        assert!(body.local_sig_token.is_null());
    }

    #[test]
    fn parses_fat_body() {
        let mut data = vec![
            0x13, 0x30, // flags: fat, header size 3 dwords
            0x04, 0x00, // max stack 4
            0x02, 0x00, 0x00, 0x00, // code size 2
        ];
        data.extend_from_slice(&Token::new(Table::StandAloneSig, 1).0.to_le_bytes());
        data.extend_from_slice(&[0x00, 0x2A]);
        let body = MethodBody::parse_at(&data, 0, 0).unwrap();
        assert_eq!(body.max_stack, 4);
        assert_eq!(body.code, vec![0x00, 0x2A]);
        assert_eq!(body.local_sig_token, Token::new(Table::StandAloneSig, 1));
    }

    #[test]
    fn rejects_bad_format() {
        assert!(MethodBody::parse_at(&[0x00], 0, 0x2050).is_err());
    }
}
