//! Runtime intrinsics.
//!
//! A closed set of methods the translator recognizes by unique name and
//! compiles through hand-written target routines instead of a CIL body.
//! The names form a must-support contract between the translator and
//! every code generator.

/// A method compiled by the code generator instead of from bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    /// `System.Console.Beep()`: tone generation.
    ConsoleBeep,
    /// `System.Console.ReadLine()`: one line of input, returns a string.
    ConsoleReadLine,
    /// `System.Console.WriteLine(int)`: signed 32-bit decimal output.
    ConsoleWriteLineInt32,
    /// `System.Console.WriteLine(string)`: NUL-terminated string output.
    ConsoleWriteLineString,
    /// The runtime bump allocator: `alloc(size) -> address`.
    HeapAlloc,
}

impl Intrinsic {
    /// Match a method's unique symbol name against the intrinsic table.
    pub fn from_unique_name(name: &str) -> Option<Intrinsic> {
        match name {
            "System_Console_Beep" => Some(Intrinsic::ConsoleBeep),
            "System_Console_ReadLine" => Some(Intrinsic::ConsoleReadLine),
            "System_Console_WriteLine_Int32" => Some(Intrinsic::ConsoleWriteLineInt32),
            "System_Console_WriteLine_String" => Some(Intrinsic::ConsoleWriteLineString),
            "Beeb_Runtime_Heap_Alloc_IntPtr" => Some(Intrinsic::HeapAlloc),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_closed() {
        assert_eq!(
            Intrinsic::from_unique_name("System_Console_WriteLine_Int32"),
            Some(Intrinsic::ConsoleWriteLineInt32)
        );
        assert_eq!(
            Intrinsic::from_unique_name("Beeb_Runtime_Heap_Alloc_IntPtr"),
            Some(Intrinsic::HeapAlloc)
        );
        assert_eq!(Intrinsic::from_unique_name("System_Console_WriteLine"), None);
        assert_eq!(Intrinsic::from_unique_name(""), None);
    }
}
