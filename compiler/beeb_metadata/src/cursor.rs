//! Little-endian byte cursor over image data.

use crate::error::MetadataError;
use crate::Result;

/// Forward-only reader with explicit truncation errors.
#[derive(Clone)]
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    pub(crate) fn at(data: &'a [u8], pos: usize) -> Result<Self> {
        if pos > data.len() {
            return Err(MetadataError::Truncated {
                offset: pos,
                wanted: 0,
            });
        }
        Ok(Cursor { data, pos })
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(MetadataError::Truncated {
            offset: self.pos,
            wanted: n,
        })?;
        if end > self.data.len() {
            return Err(MetadataError::Truncated {
                offset: self.pos,
                wanted: n,
            });
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }

    /// Read a NUL-terminated ASCII string without consuming past `max` bytes.
    pub(crate) fn read_cstr(&mut self, max: usize) -> Result<&'a str> {
        let window = &self.data[self.pos..self.data.len().min(self.pos + max)];
        let len = window
            .iter()
            .position(|&b| b == 0)
            .ok_or(MetadataError::Truncated {
                offset: self.pos,
                wanted: max,
            })?;
        let bytes = self.take(len + 1)?;
        std::str::from_utf8(&bytes[..len]).map_err(|_| MetadataError::Truncated {
            offset: self.pos,
            wanted: len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let mut c = Cursor::new(&data);
        assert_eq!(c.read_u16().unwrap(), 0x0201);
        assert_eq!(c.read_u32().unwrap(), 0x0605_0403);
        assert_eq!(c.pos(), 6);
    }

    #[test]
    fn truncation_is_an_error() {
        let mut c = Cursor::new(&[0xFF]);
        assert!(c.read_u32().is_err());
        // Position must be unchanged after a failed read.
        assert_eq!(c.read_u8().unwrap(), 0xFF);
    }

    #[test]
    fn cstr_stops_at_nul() {
        let mut c = Cursor::new(b"#~\0xx");
        assert_eq!(c.read_cstr(8).unwrap(), "#~");
        assert_eq!(c.pos(), 3);
    }
}
