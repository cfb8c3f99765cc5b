//! The PE envelope and metadata root.
//!
//! An [`Image`] owns the raw file bytes, the section table for RVA
//! resolution, and the parsed metadata (heaps + table stream). Method
//! bodies are read lazily by RVA since only reachable methods ever get
//! translated.

use std::path::Path;

use crate::body::MethodBody;
use crate::cursor::Cursor;
use crate::error::MetadataError;
use crate::heaps::{BlobHeap, GuidHeap, StringHeap, UserStringHeap};
use crate::tables::{Table, Tables};
use crate::Result;

const DOS_MAGIC: u16 = 0x5A4D; // "MZ"
const PE_MAGIC: u32 = 0x0000_4550; // "PE\0\0"
const PE32_MAGIC: u16 = 0x010B;
const PE32_PLUS_MAGIC: u16 = 0x020B;
const METADATA_MAGIC: u32 = 0x424A_5342; // "BSJB"
const CLI_HEADER_DIRECTORY: usize = 14;

#[derive(Debug, Clone, Copy)]
struct Section {
    rva: u32,
    size: u32,
    file_offset: u32,
}

/// A loaded ECMA-335 image.
pub struct Image {
    data: Vec<u8>,
    sections: Vec<Section>,
    pub strings: StringHeap,
    pub blobs: BlobHeap,
    pub user_strings: UserStringHeap,
    pub guids: GuidHeap,
    pub tables: Tables,
}

impl Image {
    /// Read and parse the image at `path`.
    pub fn open(path: &Path) -> Result<Image> {
        let data = std::fs::read(path).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "loading image");
        Image::from_bytes(data)
    }

    /// Parse an image already in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Image> {
        let (sections, metadata_rva) = parse_pe(&data)?;
        let metadata_offset = resolve_rva(&sections, metadata_rva)?;
        let (strings, blobs, user_strings, guids, tables) =
            parse_metadata_root(&data, metadata_offset)?;
        Ok(Image {
            data,
            sections,
            strings,
            blobs,
            user_strings,
            guids,
            tables,
        })
    }

    /// Parse a bare metadata root (`BSJB` blob) with no PE envelope.
    ///
    /// Method bodies cannot be resolved from such an image; everything
    /// else works. Used by tests and tooling that operate on metadata
    /// alone.
    pub fn from_metadata(blob: Vec<u8>) -> Result<Image> {
        let (strings, blobs, user_strings, guids, tables) = parse_metadata_root(&blob, 0)?;
        Ok(Image {
            data: blob,
            sections: Vec::new(),
            strings,
            blobs,
            user_strings,
            guids,
            tables,
        })
    }

    /// The assembly's simple name (Assembly table, falling back to the
    /// module name for image files without an assembly manifest).
    pub fn name(&self) -> Result<&str> {
        if self.tables.row_count(Table::Assembly) > 0 {
            return self.strings.get(self.tables.assembly()?.name);
        }
        self.strings.get(self.tables.module()?.name)
    }

    /// Read the method body at `rva`.
    pub fn method_body(&self, rva: u32) -> Result<MethodBody> {
        let offset = resolve_rva(&self.sections, rva)?;
        MethodBody::parse_at(&self.data, offset, rva)
    }
}

fn resolve_rva(sections: &[Section], rva: u32) -> Result<usize> {
    for s in sections {
        if rva >= s.rva && rva < s.rva + s.size {
            return Ok((s.file_offset + (rva - s.rva)) as usize);
        }
    }
    Err(MetadataError::RvaOutOfRange { rva })
}

/// Walk the PE headers to the CLI header; return the section table and the
/// metadata root RVA.
fn parse_pe(data: &[u8]) -> Result<(Vec<Section>, u32)> {
    let mut c = Cursor::new(data);
    if c.read_u16()? != DOS_MAGIC {
        return Err(MetadataError::NotPeImage);
    }
    let mut c = Cursor::at(data, 0x3C)?;
    let pe_offset = c.read_u32()? as usize;

    let mut c = Cursor::at(data, pe_offset)?;
    if c.read_u32()? != PE_MAGIC {
        return Err(MetadataError::NotPeImage);
    }
    c.skip(2)?; // machine
    let section_count = c.read_u16()? as usize;
    c.skip(4 + 4 + 4)?; // timestamp, symbol table, symbol count
    let optional_size = c.read_u16()? as usize;
    c.skip(2)?; // characteristics

    let optional_start = c.pos();
    let magic = c.read_u16()?;
    let data_dir_offset = match magic {
        PE32_MAGIC => 96,
        PE32_PLUS_MAGIC => 112,
        _ => return Err(MetadataError::NotPeImage),
    };

    // CLI header directory entry: RVA + size.
    let mut c = Cursor::at(data, optional_start + data_dir_offset + CLI_HEADER_DIRECTORY * 8)?;
    let cli_rva = c.read_u32()?;
    if cli_rva == 0 {
        return Err(MetadataError::NotCliImage);
    }

    // Section table follows the optional header.
    let mut c = Cursor::at(data, optional_start + optional_size)?;
    let mut sections = Vec::with_capacity(section_count);
    for _ in 0..section_count {
        c.skip(8)?; // name
        let virtual_size = c.read_u32()?;
        let rva = c.read_u32()?;
        let raw_size = c.read_u32()?;
        let file_offset = c.read_u32()?;
        c.skip(16)?; // relocations, line numbers, characteristics
        sections.push(Section {
            rva,
            size: virtual_size.max(raw_size),
            file_offset,
        });
    }

    // CLI header: cb, versions, then the metadata directory.
    let cli_offset = resolve_rva(&sections, cli_rva)?;
    let mut c = Cursor::at(data, cli_offset)?;
    c.skip(4 + 2 + 2)?; // cb, major, minor
    let metadata_rva = c.read_u32()?;
    if metadata_rva == 0 {
        return Err(MetadataError::NotCliImage);
    }

    Ok((sections, metadata_rva))
}

type ParsedRoot = (StringHeap, BlobHeap, UserStringHeap, GuidHeap, Tables);

/// Parse the `BSJB` metadata root and its streams at `root` in `data`.
fn parse_metadata_root(data: &[u8], root: usize) -> Result<ParsedRoot> {
    let mut c = Cursor::at(data, root)?;
    if c.read_u32()? != METADATA_MAGIC {
        return Err(MetadataError::BadMetadataRoot);
    }
    c.skip(2 + 2 + 4)?; // major, minor, reserved
    let version_len = c.read_u32()? as usize;
    c.skip(version_len)?;
    c.skip(2)?; // flags
    let stream_count = c.read_u16()?;

    let mut strings = None;
    let mut blobs = None;
    let mut user_strings = None;
    let mut guids = None;
    let mut tables_data = None;

    for _ in 0..stream_count {
        let offset = c.read_u32()? as usize;
        let size = c.read_u32()? as usize;
        let name = c.read_cstr(32)?;
        // Stream names pad to a 4-byte boundary including the NUL.
        let consumed = name.len() + 1;
        c.skip(consumed.next_multiple_of(4) - consumed)?;

        let start = root + offset;
        let stream = data
            .get(start..start + size)
            .ok_or(MetadataError::Truncated {
                offset: start,
                wanted: size,
            })?
            .to_vec();
        match name {
            "#Strings" => strings = Some(StringHeap::new(stream)),
            "#Blob" => blobs = Some(BlobHeap::new(stream)),
            "#US" => user_strings = Some(UserStringHeap::new(stream)),
            "#GUID" => guids = Some(GuidHeap::new(stream)),
            "#~" => tables_data = Some(stream),
            other => tracing::trace!(stream = other, "ignoring metadata stream"),
        }
    }

    let tables = Tables::parse(tables_data.ok_or(MetadataError::MissingStream { name: "#~" })?)?;
    Ok((
        strings.ok_or(MetadataError::MissingStream { name: "#Strings" })?,
        blobs.unwrap_or_default(),
        user_strings.unwrap_or_default(),
        guids.unwrap_or_default(),
        tables,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Assemble a bare metadata root with `#~`, `#Strings`, and `#US`.
    fn synthetic_metadata() -> Vec<u8> {
        // Table stream: header only, no tables except Module (1 row).
        let mut tables = Vec::new();
        tables.extend_from_slice(&0u32.to_le_bytes());
        tables.push(2);
        tables.push(0);
        tables.push(0); // narrow heaps
        tables.push(1);
        tables.extend_from_slice(&1u64.to_le_bytes()); // valid: Module only
        tables.extend_from_slice(&0u64.to_le_bytes());
        tables.extend_from_slice(&1u32.to_le_bytes()); // Module rows
        // Module row.
        tables.extend_from_slice(&0u16.to_le_bytes());
        tables.extend_from_slice(&1u16.to_le_bytes()); // name -> "demo"
        tables.extend_from_slice(&1u16.to_le_bytes());
        tables.extend_from_slice(&0u16.to_le_bytes());
        tables.extend_from_slice(&0u16.to_le_bytes());

        let strings = b"\0demo\0".to_vec();

        // Root header: three stream headers. Offsets are computed after
        // laying the headers out.
        let header_len = 16 + 4 + 2 + 2; // magic..version(4) + flags + count
        let stream_headers_len = (8 + 4) + (8 + 12) + (8 + 4); // "#~", "#Strings", "#US"
        let tables_off = header_len + stream_headers_len;
        let strings_off = tables_off + tables.len();
        let us_off = strings_off + strings.len();

        let mut root = Vec::new();
        root.extend_from_slice(&METADATA_MAGIC.to_le_bytes());
        root.extend_from_slice(&[1, 0, 1, 0]); // major, minor
        root.extend_from_slice(&0u32.to_le_bytes()); // reserved
        root.extend_from_slice(&4u32.to_le_bytes()); // version length
        root.extend_from_slice(b"v4\0\0");
        root.extend_from_slice(&0u16.to_le_bytes()); // flags
        root.extend_from_slice(&3u16.to_le_bytes()); // stream count

        let push_stream = |root: &mut Vec<u8>, off: usize, size: usize, name: &[u8]| {
            root.extend_from_slice(&u32::try_from(off).unwrap().to_le_bytes());
            root.extend_from_slice(&u32::try_from(size).unwrap().to_le_bytes());
            root.extend_from_slice(name);
        };
        push_stream(&mut root, tables_off, tables.len(), b"#~\0\0");
        push_stream(&mut root, strings_off, strings.len(), b"#Strings\0\0\0\0");
        push_stream(&mut root, us_off, 1, b"#US\0");

        assert_eq!(root.len(), tables_off);
        root.extend_from_slice(&tables);
        root.extend_from_slice(&strings);
        root.push(0); // empty #US heap

        root
    }

    #[test]
    fn parses_bare_metadata_root() {
        let image = Image::from_metadata(synthetic_metadata()).unwrap();
        assert_eq!(image.tables.row_count(Table::Module), 1);
        assert_eq!(image.name().unwrap(), "demo");
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut blob = synthetic_metadata();
        blob[0] = 0x00;
        assert!(matches!(
            Image::from_metadata(blob),
            Err(MetadataError::BadMetadataRoot)
        ));
    }

    #[test]
    fn bodies_need_sections() {
        let image = Image::from_metadata(synthetic_metadata()).unwrap();
        assert!(matches!(
            image.method_body(0x2050),
            Err(MetadataError::RvaOutOfRange { rva: 0x2050 })
        ));
    }
}
