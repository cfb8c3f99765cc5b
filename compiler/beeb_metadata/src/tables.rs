//! The `#~` table stream.
//!
//! The physical stream is a packed sequence of rows whose column widths
//! depend on heap-size bits and on the row counts of *other* tables, so the
//! reader carries a sizing context and a column schema for every table the
//! format defines — including tables the compiler never consumes, which
//! must still be sized to walk past them.
//!
//! Typed row accessors exist only for the tables the compiler reads:
//! Module, TypeRef, TypeDef, Field, MethodDef, Param, MemberRef,
//! StandAloneSig, TypeSpec, Assembly, AssemblyRef, and ExportedType.
//!
//! Row identifiers (`rid`) are 1-based throughout, matching metadata token
//! arithmetic: a token is `table << 24 | rid`, and rid 0 means null.

use crate::cursor::Cursor;
use crate::error::MetadataError;
use crate::Result;

/// Number of table slots defined by ECMA-335 (IDs `0x00..=0x2C`).
const TABLE_COUNT: usize = 0x2D;

/// Metadata table identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Table {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    FieldPtr = 0x03,
    Field = 0x04,
    MethodPtr = 0x05,
    MethodDef = 0x06,
    ParamPtr = 0x07,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0A,
    Constant = 0x0B,
    CustomAttribute = 0x0C,
    FieldMarshal = 0x0D,
    DeclSecurity = 0x0E,
    ClassLayout = 0x0F,
    FieldLayout = 0x10,
    StandAloneSig = 0x11,
    EventMap = 0x12,
    EventPtr = 0x13,
    Event = 0x14,
    PropertyMap = 0x15,
    PropertyPtr = 0x16,
    Property = 0x17,
    MethodSemantics = 0x18,
    MethodImpl = 0x19,
    ModuleRef = 0x1A,
    TypeSpec = 0x1B,
    ImplMap = 0x1C,
    FieldRva = 0x1D,
    EncLog = 0x1E,
    EncMap = 0x1F,
    Assembly = 0x20,
    AssemblyProcessor = 0x21,
    AssemblyOs = 0x22,
    AssemblyRef = 0x23,
    AssemblyRefProcessor = 0x24,
    AssemblyRefOs = 0x25,
    File = 0x26,
    ExportedType = 0x27,
    ManifestResource = 0x28,
    NestedClass = 0x29,
    GenericParam = 0x2A,
    MethodSpec = 0x2B,
    GenericParamConstraint = 0x2C,
}

impl Table {
    /// All tables in ID order.
    const ALL: [Table; TABLE_COUNT] = [
        Table::Module,
        Table::TypeRef,
        Table::TypeDef,
        Table::FieldPtr,
        Table::Field,
        Table::MethodPtr,
        Table::MethodDef,
        Table::ParamPtr,
        Table::Param,
        Table::InterfaceImpl,
        Table::MemberRef,
        Table::Constant,
        Table::CustomAttribute,
        Table::FieldMarshal,
        Table::DeclSecurity,
        Table::ClassLayout,
        Table::FieldLayout,
        Table::StandAloneSig,
        Table::EventMap,
        Table::EventPtr,
        Table::Event,
        Table::PropertyMap,
        Table::PropertyPtr,
        Table::Property,
        Table::MethodSemantics,
        Table::MethodImpl,
        Table::ModuleRef,
        Table::TypeSpec,
        Table::ImplMap,
        Table::FieldRva,
        Table::EncLog,
        Table::EncMap,
        Table::Assembly,
        Table::AssemblyProcessor,
        Table::AssemblyOs,
        Table::AssemblyRef,
        Table::AssemblyRefProcessor,
        Table::AssemblyRefOs,
        Table::File,
        Table::ExportedType,
        Table::ManifestResource,
        Table::NestedClass,
        Table::GenericParam,
        Table::MethodSpec,
        Table::GenericParamConstraint,
    ];

    /// Decode a table ID byte.
    pub fn from_id(id: u8) -> Option<Table> {
        Table::ALL.get(id as usize).copied()
    }

    /// Human-readable table name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Table::Module => "Module",
            Table::TypeRef => "TypeRef",
            Table::TypeDef => "TypeDef",
            Table::Field => "Field",
            Table::MethodDef => "MethodDef",
            Table::Param => "Param",
            Table::MemberRef => "MemberRef",
            Table::StandAloneSig => "StandAloneSig",
            Table::TypeSpec => "TypeSpec",
            Table::Assembly => "Assembly",
            Table::AssemblyRef => "AssemblyRef",
            Table::ExportedType => "ExportedType",
            _ => "unmodeled",
        }
    }
}

/// A metadata token: table ID in the high byte, 1-based rid below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(pub u32);

impl Token {
    /// The null token.
    pub const NULL: Token = Token(0);

    /// Build a token from a table and rid.
    pub fn new(table: Table, rid: u32) -> Token {
        Token((table as u32) << 24 | (rid & 0x00FF_FFFF))
    }

    /// The table this token addresses, if the ID byte is valid.
    pub fn table(self) -> Option<Table> {
        Table::from_id((self.0 >> 24) as u8)
    }

    /// The 1-based row index.
    pub fn rid(self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// True when the row index is zero.
    pub fn is_null(self) -> bool {
        self.rid() == 0
    }
}

bitflags::bitflags! {
    /// TypeDef `Flags` column (ECMA-335 II.23.1.15, subset the compiler reads).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeAttributes: u32 {
        const PUBLIC = 0x0000_0001;
        const INTERFACE = 0x0000_0020;
        const ABSTRACT = 0x0000_0080;
        const SEALED = 0x0000_0100;
    }
}

bitflags::bitflags! {
    /// MethodDef `Flags` column (II.23.1.10, subset the compiler reads).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodAttributes: u16 {
        const STATIC = 0x0010;
        const FINAL = 0x0020;
        const VIRTUAL = 0x0040;
        const HIDE_BY_SIG = 0x0080;
        const NEW_SLOT = 0x0100;
        const ABSTRACT = 0x0400;
        const SPECIAL_NAME = 0x0800;
        const RT_SPECIAL_NAME = 0x1000;
    }
}

bitflags::bitflags! {
    /// Field `Flags` column (II.23.1.5, subset the compiler reads).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldAttributes: u16 {
        const STATIC = 0x0010;
        const INIT_ONLY = 0x0020;
        const LITERAL = 0x0040;
    }
}

/// Coded-index families (II.24.2.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coded {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    Implementation,
    CustomAttributeType,
    ResolutionScope,
    TypeOrMethodDef,
}

impl Coded {
    fn tag_bits(self) -> u32 {
        match self {
            Coded::HasFieldMarshal
            | Coded::HasSemantics
            | Coded::MethodDefOrRef
            | Coded::MemberForwarded
            | Coded::TypeOrMethodDef => 1,
            Coded::TypeDefOrRef
            | Coded::HasConstant
            | Coded::HasDeclSecurity
            | Coded::Implementation
            | Coded::ResolutionScope => 2,
            Coded::MemberRefParent | Coded::CustomAttributeType => 3,
            Coded::HasCustomAttribute => 5,
        }
    }

    /// Tag-indexed member tables; `None` marks an unused tag value.
    fn tags(self) -> &'static [Option<Table>] {
        match self {
            Coded::TypeDefOrRef => &[
                Some(Table::TypeDef),
                Some(Table::TypeRef),
                Some(Table::TypeSpec),
                None,
            ],
            Coded::HasConstant => &[
                Some(Table::Field),
                Some(Table::Param),
                Some(Table::Property),
                None,
            ],
            Coded::HasCustomAttribute => &[
                Some(Table::MethodDef),
                Some(Table::Field),
                Some(Table::TypeRef),
                Some(Table::TypeDef),
                Some(Table::Param),
                Some(Table::InterfaceImpl),
                Some(Table::MemberRef),
                Some(Table::Module),
                Some(Table::DeclSecurity),
                Some(Table::Property),
                Some(Table::Event),
                Some(Table::StandAloneSig),
                Some(Table::ModuleRef),
                Some(Table::TypeSpec),
                Some(Table::Assembly),
                Some(Table::AssemblyRef),
                Some(Table::File),
                Some(Table::ExportedType),
                Some(Table::ManifestResource),
                Some(Table::GenericParam),
                Some(Table::GenericParamConstraint),
                Some(Table::MethodSpec),
            ],
            Coded::HasFieldMarshal => &[Some(Table::Field), Some(Table::Param)],
            Coded::HasDeclSecurity => &[
                Some(Table::TypeDef),
                Some(Table::MethodDef),
                Some(Table::Assembly),
                None,
            ],
            Coded::MemberRefParent => &[
                Some(Table::TypeDef),
                Some(Table::TypeRef),
                Some(Table::ModuleRef),
                Some(Table::MethodDef),
                Some(Table::TypeSpec),
                None,
                None,
                None,
            ],
            Coded::HasSemantics => &[Some(Table::Event), Some(Table::Property)],
            Coded::MethodDefOrRef => &[Some(Table::MethodDef), Some(Table::MemberRef)],
            Coded::MemberForwarded => &[Some(Table::Field), Some(Table::MethodDef)],
            Coded::Implementation => &[
                Some(Table::File),
                Some(Table::AssemblyRef),
                Some(Table::ExportedType),
                None,
            ],
            Coded::CustomAttributeType => &[
                None,
                None,
                Some(Table::MethodDef),
                Some(Table::MemberRef),
                None,
                None,
                None,
                None,
            ],
            Coded::ResolutionScope => &[
                Some(Table::Module),
                Some(Table::ModuleRef),
                Some(Table::AssemblyRef),
                Some(Table::TypeRef),
            ],
            Coded::TypeOrMethodDef => &[Some(Table::TypeDef), Some(Table::MethodDef)],
        }
    }
}

/// Physical column kinds.
#[derive(Debug, Clone, Copy)]
enum Col {
    U16,
    U32,
    Str,
    Guid,
    Blob,
    Idx(Table),
    Coded(Coded),
}

/// Column schema per table (II.22). Order matters; widths do not appear
/// here; they come from the sizing context.
fn columns(table: Table) -> &'static [Col] {
    match table {
        Table::Module => &[Col::U16, Col::Str, Col::Guid, Col::Guid, Col::Guid],
        Table::TypeRef => &[Col::Coded(Coded::ResolutionScope), Col::Str, Col::Str],
        Table::TypeDef => &[
            Col::U32,
            Col::Str,
            Col::Str,
            Col::Coded(Coded::TypeDefOrRef),
            Col::Idx(Table::Field),
            Col::Idx(Table::MethodDef),
        ],
        Table::FieldPtr => &[Col::Idx(Table::Field)],
        Table::Field => &[Col::U16, Col::Str, Col::Blob],
        Table::MethodPtr => &[Col::Idx(Table::MethodDef)],
        Table::MethodDef => &[
            Col::U32,
            Col::U16,
            Col::U16,
            Col::Str,
            Col::Blob,
            Col::Idx(Table::Param),
        ],
        Table::ParamPtr => &[Col::Idx(Table::Param)],
        Table::Param => &[Col::U16, Col::U16, Col::Str],
        Table::InterfaceImpl => &[Col::Idx(Table::TypeDef), Col::Coded(Coded::TypeDefOrRef)],
        Table::MemberRef => &[Col::Coded(Coded::MemberRefParent), Col::Str, Col::Blob],
        Table::Constant => &[Col::U16, Col::Coded(Coded::HasConstant), Col::Blob],
        Table::CustomAttribute => &[
            Col::Coded(Coded::HasCustomAttribute),
            Col::Coded(Coded::CustomAttributeType),
            Col::Blob,
        ],
        Table::FieldMarshal => &[Col::Coded(Coded::HasFieldMarshal), Col::Blob],
        Table::DeclSecurity => &[Col::U16, Col::Coded(Coded::HasDeclSecurity), Col::Blob],
        Table::ClassLayout => &[Col::U16, Col::U32, Col::Idx(Table::TypeDef)],
        Table::FieldLayout => &[Col::U32, Col::Idx(Table::Field)],
        Table::StandAloneSig => &[Col::Blob],
        Table::EventMap => &[Col::Idx(Table::TypeDef), Col::Idx(Table::Event)],
        Table::EventPtr => &[Col::Idx(Table::Event)],
        Table::Event => &[Col::U16, Col::Str, Col::Coded(Coded::TypeDefOrRef)],
        Table::PropertyMap => &[Col::Idx(Table::TypeDef), Col::Idx(Table::Property)],
        Table::PropertyPtr => &[Col::Idx(Table::Property)],
        Table::Property => &[Col::U16, Col::Str, Col::Blob],
        Table::MethodSemantics => &[
            Col::U16,
            Col::Idx(Table::MethodDef),
            Col::Coded(Coded::HasSemantics),
        ],
        Table::MethodImpl => &[
            Col::Idx(Table::TypeDef),
            Col::Coded(Coded::MethodDefOrRef),
            Col::Coded(Coded::MethodDefOrRef),
        ],
        Table::ModuleRef => &[Col::Str],
        Table::TypeSpec => &[Col::Blob],
        Table::ImplMap => &[
            Col::U16,
            Col::Coded(Coded::MemberForwarded),
            Col::Str,
            Col::Idx(Table::ModuleRef),
        ],
        Table::FieldRva => &[Col::U32, Col::Idx(Table::Field)],
        Table::EncLog => &[Col::U32, Col::U32],
        Table::EncMap => &[Col::U32],
        Table::Assembly => &[
            Col::U32,
            Col::U16,
            Col::U16,
            Col::U16,
            Col::U16,
            Col::U32,
            Col::Blob,
            Col::Str,
            Col::Str,
        ],
        Table::AssemblyProcessor => &[Col::U32],
        Table::AssemblyOs => &[Col::U32, Col::U32, Col::U32],
        Table::AssemblyRef => &[
            Col::U16,
            Col::U16,
            Col::U16,
            Col::U16,
            Col::U32,
            Col::Blob,
            Col::Str,
            Col::Str,
            Col::Blob,
        ],
        Table::AssemblyRefProcessor => &[Col::U32, Col::Idx(Table::AssemblyRef)],
        Table::AssemblyRefOs => &[
            Col::U32,
            Col::U32,
            Col::U32,
            Col::Idx(Table::AssemblyRef),
        ],
        Table::File => &[Col::U32, Col::Str, Col::Blob],
        Table::ExportedType => &[
            Col::U32,
            Col::U32,
            Col::Str,
            Col::Str,
            Col::Coded(Coded::Implementation),
        ],
        Table::ManifestResource => &[
            Col::U32,
            Col::U32,
            Col::Str,
            Col::Coded(Coded::Implementation),
        ],
        Table::NestedClass => &[Col::Idx(Table::TypeDef), Col::Idx(Table::TypeDef)],
        Table::GenericParam => &[
            Col::U16,
            Col::U16,
            Col::Coded(Coded::TypeOrMethodDef),
            Col::Str,
        ],
        Table::MethodSpec => &[Col::Coded(Coded::MethodDefOrRef), Col::Blob],
        Table::GenericParamConstraint => &[
            Col::Idx(Table::GenericParam),
            Col::Coded(Coded::TypeDefOrRef),
        ],
    }
}

/// Column-width context derived from the stream header.
struct Sizing {
    rows: [u32; TABLE_COUNT],
    wide_str: bool,
    wide_guid: bool,
    wide_blob: bool,
}

impl Sizing {
    fn idx_size(&self, table: Table) -> usize {
        if self.rows[table as usize] > 0xFFFF {
            4
        } else {
            2
        }
    }

    fn coded_size(&self, coded: Coded) -> usize {
        let max_rows = coded
            .tags()
            .iter()
            .flatten()
            .map(|&t| self.rows[t as usize])
            .max()
            .unwrap_or(0);
        if u64::from(max_rows) >= 1u64 << (16 - coded.tag_bits()) {
            4
        } else {
            2
        }
    }

    fn col_size(&self, col: Col) -> usize {
        match col {
            Col::U16 => 2,
            Col::U32 => 4,
            Col::Str => {
                if self.wide_str {
                    4
                } else {
                    2
                }
            }
            Col::Guid => {
                if self.wide_guid {
                    4
                } else {
                    2
                }
            }
            Col::Blob => {
                if self.wide_blob {
                    4
                } else {
                    2
                }
            }
            Col::Idx(t) => self.idx_size(t),
            Col::Coded(c) => self.coded_size(c),
        }
    }

    fn row_size(&self, table: Table) -> usize {
        columns(table).iter().map(|&c| self.col_size(c)).sum()
    }
}

/// Typed row data. Heap columns carry raw offsets; consumers resolve them
/// against the matching heap.
#[derive(Debug, Clone, Copy)]
pub struct ModuleRow {
    pub name: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct TypeRefRow {
    pub resolution_scope: Token,
    pub name: u32,
    pub namespace: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct TypeDefRow {
    pub flags: TypeAttributes,
    pub name: u32,
    pub namespace: u32,
    pub extends: Token,
    pub field_list: u32,
    pub method_list: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRow {
    pub flags: FieldAttributes,
    pub name: u32,
    pub signature: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct MethodDefRow {
    pub rva: u32,
    pub flags: MethodAttributes,
    pub name: u32,
    pub signature: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct MemberRefRow {
    pub class: Token,
    pub name: u32,
    pub signature: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct StandAloneSigRow {
    pub signature: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct AssemblyRow {
    pub name: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct AssemblyRefRow {
    pub name: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct ExportedTypeRow {
    pub name: u32,
    pub namespace: u32,
    pub implementation: Token,
}

/// Parsed `#~` stream: row counts, per-table extents, and typed accessors.
pub struct Tables {
    data: Vec<u8>,
    sizing: Sizing,
    offsets: [usize; TABLE_COUNT],
}

impl Tables {
    /// Parse the raw `#~` stream.
    pub fn parse(data: Vec<u8>) -> Result<Tables> {
        let mut c = Cursor::new(&data);
        c.skip(4)?; // reserved
        c.skip(2)?; // major/minor version
        let heap_sizes = c.read_u8()?;
        c.skip(1)?; // reserved
        let valid = c.read_u64()?;
        c.skip(8)?; // sorted

        let mut rows = [0u32; TABLE_COUNT];
        for (i, row) in rows.iter_mut().enumerate() {
            if valid & (1u64 << i) != 0 {
                *row = c.read_u32()?;
            }
        }

        let sizing = Sizing {
            rows,
            wide_str: heap_sizes & 0x01 != 0,
            wide_guid: heap_sizes & 0x02 != 0,
            wide_blob: heap_sizes & 0x04 != 0,
        };

        let mut offsets = [0usize; TABLE_COUNT];
        let mut pos = c.pos();
        for table in Table::ALL {
            offsets[table as usize] = pos;
            let extent = sizing.row_size(table) * rows[table as usize] as usize;
            pos = pos.checked_add(extent).ok_or(MetadataError::Truncated {
                offset: pos,
                wanted: extent,
            })?;
        }
        if pos > data.len() {
            return Err(MetadataError::Truncated {
                offset: data.len(),
                wanted: pos - data.len(),
            });
        }

        tracing::trace!(
            type_defs = rows[Table::TypeDef as usize],
            method_defs = rows[Table::MethodDef as usize],
            "parsed table stream"
        );

        Ok(Tables {
            data,
            sizing,
            offsets,
        })
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: Table) -> u32 {
        self.sizing.rows[table as usize]
    }

    /// Position a cursor at row `rid` (1-based) of `table`.
    fn row(&self, table: Table, rid: u32) -> Result<Cursor<'_>> {
        if rid == 0 || rid > self.row_count(table) {
            return Err(MetadataError::RowOutOfRange {
                table: table.name(),
                rid,
            });
        }
        let start = self.offsets[table as usize] + self.sizing.row_size(table) * (rid as usize - 1);
        Cursor::at(&self.data, start)
    }

    fn read_idx(&self, c: &mut Cursor<'_>, wide: bool) -> Result<u32> {
        if wide {
            c.read_u32()
        } else {
            c.read_u16().map(u32::from)
        }
    }

    fn read_str(&self, c: &mut Cursor<'_>) -> Result<u32> {
        self.read_idx(c, self.sizing.wide_str)
    }

    fn read_blob(&self, c: &mut Cursor<'_>) -> Result<u32> {
        self.read_idx(c, self.sizing.wide_blob)
    }

    fn read_table_idx(&self, c: &mut Cursor<'_>, table: Table) -> Result<u32> {
        self.read_idx(c, self.sizing.idx_size(table) == 4)
    }

    fn read_coded(&self, c: &mut Cursor<'_>, coded: Coded) -> Result<Token> {
        let raw = self.read_idx(c, self.sizing.coded_size(coded) == 4)?;
        let bits = coded.tag_bits();
        let tag = (raw & ((1 << bits) - 1)) as usize;
        let rid = raw >> bits;
        let table = coded
            .tags()
            .get(tag)
            .copied()
            .flatten()
            .ok_or(MetadataError::UnexpectedToken {
                token: raw,
                context: "coded index",
            })?;
        Ok(Token::new(table, rid))
    }

    /// Read the Module row (always rid 1).
    pub fn module(&self) -> Result<ModuleRow> {
        let mut c = self.row(Table::Module, 1)?;
        c.skip(2)?; // generation
        let name = self.read_str(&mut c)?;
        Ok(ModuleRow { name })
    }

    pub fn type_ref(&self, rid: u32) -> Result<TypeRefRow> {
        let mut c = self.row(Table::TypeRef, rid)?;
        let resolution_scope = self.read_coded(&mut c, Coded::ResolutionScope)?;
        let name = self.read_str(&mut c)?;
        let namespace = self.read_str(&mut c)?;
        Ok(TypeRefRow {
            resolution_scope,
            name,
            namespace,
        })
    }

    pub fn type_def(&self, rid: u32) -> Result<TypeDefRow> {
        let mut c = self.row(Table::TypeDef, rid)?;
        let flags = TypeAttributes::from_bits_retain(c.read_u32()?);
        let name = self.read_str(&mut c)?;
        let namespace = self.read_str(&mut c)?;
        let extends = self.read_coded(&mut c, Coded::TypeDefOrRef)?;
        let field_list = self.read_table_idx(&mut c, Table::Field)?;
        let method_list = self.read_table_idx(&mut c, Table::MethodDef)?;
        Ok(TypeDefRow {
            flags,
            name,
            namespace,
            extends,
            field_list,
            method_list,
        })
    }

    /// Field rids owned by TypeDef `rid`: `[start, end)`.
    pub fn type_def_fields(&self, rid: u32) -> Result<std::ops::Range<u32>> {
        let start = self.type_def(rid)?.field_list;
        let end = if rid < self.row_count(Table::TypeDef) {
            self.type_def(rid + 1)?.field_list
        } else {
            self.row_count(Table::Field) + 1
        };
        Ok(start..end.max(start))
    }

    /// MethodDef rids owned by TypeDef `rid`: `[start, end)`.
    pub fn type_def_methods(&self, rid: u32) -> Result<std::ops::Range<u32>> {
        let start = self.type_def(rid)?.method_list;
        let end = if rid < self.row_count(Table::TypeDef) {
            self.type_def(rid + 1)?.method_list
        } else {
            self.row_count(Table::MethodDef) + 1
        };
        Ok(start..end.max(start))
    }

    /// The TypeDef rid owning MethodDef `rid`.
    pub fn declaring_type_of_method(&self, rid: u32) -> Result<u32> {
        for type_rid in 1..=self.row_count(Table::TypeDef) {
            if self.type_def_methods(type_rid)?.contains(&rid) {
                return Ok(type_rid);
            }
        }
        Err(MetadataError::RowOutOfRange {
            table: "MethodDef",
            rid,
        })
    }

    /// The TypeDef rid owning Field `rid`.
    pub fn declaring_type_of_field(&self, rid: u32) -> Result<u32> {
        for type_rid in 1..=self.row_count(Table::TypeDef) {
            if self.type_def_fields(type_rid)?.contains(&rid) {
                return Ok(type_rid);
            }
        }
        Err(MetadataError::RowOutOfRange {
            table: "Field",
            rid,
        })
    }

    pub fn field(&self, rid: u32) -> Result<FieldRow> {
        let mut c = self.row(Table::Field, rid)?;
        let flags = FieldAttributes::from_bits_retain(c.read_u16()?);
        let name = self.read_str(&mut c)?;
        let signature = self.read_blob(&mut c)?;
        Ok(FieldRow {
            flags,
            name,
            signature,
        })
    }

    pub fn method_def(&self, rid: u32) -> Result<MethodDefRow> {
        let mut c = self.row(Table::MethodDef, rid)?;
        let rva = c.read_u32()?;
        c.skip(2)?; // impl flags
        let flags = MethodAttributes::from_bits_retain(c.read_u16()?);
        let name = self.read_str(&mut c)?;
        let signature = self.read_blob(&mut c)?;
        Ok(MethodDefRow {
            rva,
            flags,
            name,
            signature,
        })
    }

    pub fn member_ref(&self, rid: u32) -> Result<MemberRefRow> {
        let mut c = self.row(Table::MemberRef, rid)?;
        let class = self.read_coded(&mut c, Coded::MemberRefParent)?;
        let name = self.read_str(&mut c)?;
        let signature = self.read_blob(&mut c)?;
        Ok(MemberRefRow {
            class,
            name,
            signature,
        })
    }

    pub fn stand_alone_sig(&self, rid: u32) -> Result<StandAloneSigRow> {
        let mut c = self.row(Table::StandAloneSig, rid)?;
        let signature = self.read_blob(&mut c)?;
        Ok(StandAloneSigRow { signature })
    }

    pub fn assembly(&self) -> Result<AssemblyRow> {
        let mut c = self.row(Table::Assembly, 1)?;
        c.skip(4 + 2 + 2 + 2 + 2 + 4)?; // hash alg, version, flags
        self.read_blob(&mut c)?; // public key
        let name = self.read_str(&mut c)?;
        Ok(AssemblyRow { name })
    }

    pub fn assembly_ref(&self, rid: u32) -> Result<AssemblyRefRow> {
        let mut c = self.row(Table::AssemblyRef, rid)?;
        c.skip(2 + 2 + 2 + 2 + 4)?; // version, flags
        self.read_blob(&mut c)?; // public key or token
        let name = self.read_str(&mut c)?;
        Ok(AssemblyRefRow { name })
    }

    pub fn exported_type(&self, rid: u32) -> Result<ExportedTypeRow> {
        let mut c = self.row(Table::ExportedType, rid)?;
        c.skip(4 + 4)?; // flags, TypeDefId hint
        let name = self.read_str(&mut c)?;
        let namespace = self.read_str(&mut c)?;
        let implementation = self.read_coded(&mut c, Coded::Implementation)?;
        Ok(ExportedTypeRow {
            name,
            namespace,
            implementation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Build a minimal `#~` stream: one Module row, two TypeDef rows.
    fn synthetic_stream() -> Vec<u8> {
        let mut s = Vec::new();
        s.extend_from_slice(&0u32.to_le_bytes()); // reserved
        s.push(2); // major
        s.push(0); // minor
        s.push(0); // heap sizes: all narrow
        s.push(1); // reserved
        let valid: u64 = (1 << Table::Module as u64) | (1 << Table::TypeDef as u64);
        s.extend_from_slice(&valid.to_le_bytes());
        s.extend_from_slice(&0u64.to_le_bytes()); // sorted
        s.extend_from_slice(&1u32.to_le_bytes()); // Module rows
        s.extend_from_slice(&2u32.to_le_bytes()); // TypeDef rows

        // Module row: generation, name, mvid, encid, encbaseid (all narrow).
        s.extend_from_slice(&0u16.to_le_bytes());
        s.extend_from_slice(&7u16.to_le_bytes()); // name offset
        s.extend_from_slice(&1u16.to_le_bytes());
        s.extend_from_slice(&0u16.to_le_bytes());
        s.extend_from_slice(&0u16.to_le_bytes());

        // TypeDef row 1: <Module> pseudo-type.
        s.extend_from_slice(&0u32.to_le_bytes()); // flags
        s.extend_from_slice(&1u16.to_le_bytes()); // name
        s.extend_from_slice(&0u16.to_le_bytes()); // namespace
        s.extend_from_slice(&0u16.to_le_bytes()); // extends: null
        s.extend_from_slice(&1u16.to_le_bytes()); // field list
        s.extend_from_slice(&1u16.to_le_bytes()); // method list

        // TypeDef row 2: extends TypeRef rid 3 (coded tag 1, rid 3).
        s.extend_from_slice(&0x0010_0001u32.to_le_bytes());
        s.extend_from_slice(&2u16.to_le_bytes());
        s.extend_from_slice(&9u16.to_le_bytes());
        s.extend_from_slice(&((3u16 << 2) | 1).to_le_bytes());
        s.extend_from_slice(&1u16.to_le_bytes());
        s.extend_from_slice(&1u16.to_le_bytes());

        s
    }

    #[test]
    fn parses_synthetic_stream() {
        let tables = Tables::parse(synthetic_stream()).unwrap();
        assert_eq!(tables.row_count(Table::Module), 1);
        assert_eq!(tables.row_count(Table::TypeDef), 2);
        assert_eq!(tables.row_count(Table::MethodDef), 0);

        let module = tables.module().unwrap();
        assert_eq!(module.name, 7);

        let td = tables.type_def(2).unwrap();
        assert_eq!(td.name, 2);
        assert_eq!(td.namespace, 9);
        assert_eq!(td.extends, Token::new(Table::TypeRef, 3));
        assert!(td.flags.contains(TypeAttributes::PUBLIC));
    }

    #[test]
    fn null_extends_is_null_token() {
        let tables = Tables::parse(synthetic_stream()).unwrap();
        assert!(tables.type_def(1).unwrap().extends.is_null());
    }

    #[test]
    fn row_zero_is_rejected() {
        let tables = Tables::parse(synthetic_stream()).unwrap();
        assert!(tables.type_def(0).is_err());
        assert!(tables.type_def(3).is_err());
    }

    #[test]
    fn member_ranges_use_next_row() {
        let tables = Tables::parse(synthetic_stream()).unwrap();
        // Both rows declare method_list 1 and there are no methods: empty.
        assert_eq!(tables.type_def_methods(1).unwrap(), 1..1);
        assert_eq!(tables.type_def_methods(2).unwrap(), 1..1);
    }

    #[test]
    fn token_round_trip() {
        let t = Token::new(Table::MethodDef, 0x1234);
        assert_eq!(t.table(), Some(Table::MethodDef));
        assert_eq!(t.rid(), 0x1234);
        assert!(!t.is_null());
        assert!(Token::NULL.is_null());
    }
}
