//! BBC Micro (MOS 6502) code generation.
//!
//! # Software ABI
//!
//! The generated program runs a descending software stack for operands,
//! arguments, and locals, addressed through zero page:
//!
//! | cell        | bytes | use                                        |
//! |-------------|-------|--------------------------------------------|
//! | `sp`  `$70` | 2     | stack pointer; values live at `[sp, sp+n)` |
//! | `fp`  `$72` | 2     | frame pointer; locals at `fp+offset`       |
//! | `tmp` `$74` | 2     | address scratch (indirect loads/stores)    |
//! | `scratch` `$76` | 8 | value scratch, clobbered by every routine  |
//! | `heapptr` `$7E` | 2 | bump-allocator cursor, no reclamation      |
//!
//! A callee finds its arguments as the topmost `params_size` bytes at
//! entry, reserves `locals_size` below them, and pops the whole frame in
//! its epilogue, leaving any return value at the new stack top. The
//! caller's `fp` rides the hardware stack around the `JSR`. Entity
//! offsets accumulate front-to-back, so argument addressing flips them
//! against the push order here and nowhere else.
//!
//! Multi-byte values are little-endian at increasing addresses. Object
//! references point at a header holding the dispatch-table pointer, with
//! instance fields behind it; by-reference and pointer values address
//! their target directly.
//!
//! Labels beginning with `_` are local to the preceding global label, so
//! per-instruction `IL_xxxx` labels and routine-internal labels cannot
//! collide across methods.

use std::fmt::Write as _;

use crate::codegen::{CodeGenerator, FrameInfo, VtableData};
use crate::intrinsics::Intrinsic;

const POINTER_SIZE: u32 = 2;
/// Object header: one dispatch-table pointer.
const OBJECT_HEADER_SIZE: u32 = 2;

/// Emits MOS 6502 assembly text for the BBC Micro.
pub struct BbcMicroCodeGenerator {
    out: String,
    frame: FrameInfo,
    entry: Option<String>,
    label_seq: u32,
}

impl BbcMicroCodeGenerator {
    pub fn new() -> Self {
        BbcMicroCodeGenerator {
            out: String::with_capacity(16 * 1024),
            frame: FrameInfo::default(),
            entry: None,
            label_seq: 0,
        }
    }

    fn ins(&mut self, text: &str) {
        let _ = writeln!(self.out, "    {text}");
    }

    fn raw(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
    }

    fn local(&mut self, label: &str) {
        let _ = writeln!(self.out, "_{label}:");
    }

    fn fresh(&mut self, stem: &str) -> String {
        self.label_seq += 1;
        format!("_{stem}_{}", self.label_seq)
    }

    /// `sp -= n`.
    fn sp_sub(&mut self, n: u32) {
        if n == 0 {
            return;
        }
        self.ins("SEC");
        self.ins(&format!("LDA sp : SBC #<{n} : STA sp"));
        self.ins(&format!("LDA sp+1 : SBC #>{n} : STA sp+1"));
    }

    /// `sp += n`.
    fn sp_add(&mut self, n: u32) {
        if n == 0 {
            return;
        }
        self.ins("CLC");
        self.ins(&format!("LDA sp : ADC #<{n} : STA sp"));
        self.ins(&format!("LDA sp+1 : ADC #>{n} : STA sp+1"));
    }

    /// `tmp = fp + displacement`.
    fn tmp_from_frame(&mut self, displacement: u32) {
        self.ins("CLC");
        self.ins(&format!("LDA fp : ADC #<{displacement} : STA tmp"));
        self.ins(&format!("LDA fp+1 : ADC #>{displacement} : STA tmp+1"));
    }

    /// `tmp = *(sp + at)`: load a pointer stored on the stack.
    fn tmp_from_stack(&mut self, at: u32) {
        self.ins(&format!("LDY #{at} : LDA (sp),Y : STA tmp"));
        self.ins(&format!("LDY #{} : LDA (sp),Y : STA tmp+1", at + 1));
    }

    /// `tmp += displacement`.
    fn tmp_advance(&mut self, displacement: u32) {
        if displacement == 0 {
            return;
        }
        self.ins("CLC");
        self.ins(&format!("LDA tmp : ADC #<{displacement} : STA tmp"));
        self.ins(&format!("LDA tmp+1 : ADC #>{displacement} : STA tmp+1"));
    }

    /// Copy `size` bytes `(tmp) -> (sp)`.
    fn copy_tmp_to_stack(&mut self, size: u32) {
        for i in 0..size {
            self.ins(&format!("LDY #{i} : LDA (tmp),Y : STA (sp),Y"));
        }
    }

    /// Copy `size` bytes `(sp) -> (tmp)`.
    fn copy_stack_to_tmp(&mut self, size: u32) {
        for i in 0..size {
            self.ins(&format!("LDY #{i} : LDA (sp),Y : STA (tmp),Y"));
        }
    }

    /// Store a 16-bit immediate (label or number) at the stack top.
    fn store_word_at_stack_top(&mut self, value: &str) {
        self.ins(&format!("LDA #<{value} : LDY #0 : STA (sp),Y"));
        self.ins(&format!("LDA #>{value} : LDY #1 : STA (sp),Y"));
    }

    fn store_through_pointer(&mut self, displacement: u32, size: u32) {
        // Value at the top, target pointer just below it.
        self.tmp_from_stack(size);
        self.tmp_advance(displacement);
        self.copy_stack_to_tmp(size);
        self.sp_add(size + POINTER_SIZE);
    }

    fn write_console_write_line_int32(&mut self) {
        self.write_comment("signed 32-bit decimal output");
        for i in 0..4 {
            self.ins(&format!("LDY #{i} : LDA (sp),Y : STA scratch+{i}"));
        }
        self.sp_add(4);
        self.ins("LDA scratch+3");
        self.ins("BPL _positive");
        self.ins("LDA #'-'");
        self.ins("JSR osasci");
        // Two's-complement negate, then fall through to the unsigned path.
        self.ins("CLC");
        self.ins("LDA scratch : EOR #$FF : ADC #1 : STA scratch");
        self.ins("LDA scratch+1 : EOR #$FF : ADC #0 : STA scratch+1");
        self.ins("LDA scratch+2 : EOR #$FF : ADC #0 : STA scratch+2");
        self.ins("LDA scratch+3 : EOR #$FF : ADC #0 : STA scratch+3");
        self.local("positive");
        // Repeated subtraction by descending powers of ten, suppressing
        // leading zeroes. scratch+4 is the pad character, scratch+5 the
        // "printed anything" flag.
        self.ins("LDY #36");
        self.ins("LDA #0");
        self.ins("STA scratch+4");
        self.ins("STA scratch+5");
        self.local("digit_loop");
        self.ins("LDX #$FF");
        self.ins("SEC");
        self.local("subtract");
        self.ins("LDA scratch : SBC _tens+0,Y : STA scratch");
        self.ins("LDA scratch+1 : SBC _tens+1,Y : STA scratch+1");
        self.ins("LDA scratch+2 : SBC _tens+2,Y : STA scratch+2");
        self.ins("LDA scratch+3 : SBC _tens+3,Y : STA scratch+3");
        self.ins("INX");
        self.ins("BCS _subtract");
        self.ins("LDA scratch : ADC _tens+0,Y : STA scratch");
        self.ins("LDA scratch+1 : ADC _tens+1,Y : STA scratch+1");
        self.ins("LDA scratch+2 : ADC _tens+2,Y : STA scratch+2");
        self.ins("LDA scratch+3 : ADC _tens+3,Y : STA scratch+3");
        self.ins("TXA");
        self.ins("BNE _digit");
        self.ins("LDA scratch+4");
        self.ins("BNE _print");
        self.ins("BEQ _next");
        self.local("digit");
        self.ins("LDX #'0'");
        self.ins("STX scratch+4");
        self.ins("ORA #'0'");
        self.local("print");
        self.ins("STA scratch+5");
        self.ins("JSR osasci");
        self.local("next");
        self.ins("DEY : DEY : DEY : DEY");
        self.ins("BPL _digit_loop");
        self.ins("LDA scratch+5");
        self.ins("BNE _newline");
        self.ins("LDA #'0'");
        self.ins("JSR osasci");
        self.local("newline");
        self.ins("LDA #13");
        self.ins("JSR osasci");
        self.ins("RTS");
        self.local("tens");
        for power in [
            1i64,
            10,
            100,
            1000,
            10_000,
            100_000,
            1_000_000,
            10_000_000,
            100_000_000,
            1_000_000_000,
        ] {
            self.ins(&format!(".dint {power}"));
        }
    }

    fn write_console_write_line_string(&mut self) {
        self.write_comment("NUL-terminated string output");
        self.tmp_from_stack(0);
        self.sp_add(2);
        self.ins("LDY #0");
        self.local("char_loop");
        self.ins("LDA (tmp),Y");
        self.ins("BEQ _done");
        self.ins("JSR osasci");
        self.ins("INY");
        self.ins("BNE _char_loop");
        self.local("done");
        self.ins("LDA #13");
        self.ins("JSR osasci");
        self.ins("RTS");
    }

    fn write_console_read_line(&mut self) {
        self.write_comment("OSWORD 0 line input into the $0600 buffer");
        self.ins("LDA #$00 : STA $37");
        self.ins("LDA #$06 : STA $38");
        self.ins("LDA #$EE : STA $39");
        self.ins("LDA #$20 : STA $3A");
        self.ins("LDA #$FF : STA $3B");
        self.ins("LDX #$37");
        self.ins("LDY #$00");
        self.ins("LDA #$00");
        self.ins("JSR osword");
        // Y holds the line length; replace the CR terminator with NUL.
        self.ins("LDA #0");
        self.ins("STA $0600,Y");
        self.sp_sub(2);
        self.store_word_at_stack_top("$0600");
        self.ins("RTS");
    }

    fn write_console_beep(&mut self) {
        self.write_comment("OSWORD 7 tone");
        self.ins("LDX #<_sound");
        self.ins("LDY #>_sound");
        self.ins("LDA #7");
        self.ins("JSR osword");
        self.ins("RTS");
        self.local("sound");
        self.ins(".word 1    ; channel");
        self.ins(".word -15  ; amplitude");
        self.ins(".word 100  ; pitch");
        self.ins(".word 4    ; duration, 1/20ths of a second");
    }

    fn write_heap_alloc(&mut self) {
        self.write_comment("bump allocation: result = heapptr, heapptr += size");
        self.ins("LDY #0 : LDA (sp),Y : STA scratch");
        self.ins("LDY #1 : LDA (sp),Y : STA scratch+1");
        // The result overwrites the argument slot in place.
        self.ins("LDA heapptr : LDY #0 : STA (sp),Y");
        self.ins("LDA heapptr+1 : LDY #1 : STA (sp),Y");
        self.ins("CLC");
        self.ins("LDA heapptr : ADC scratch : STA heapptr");
        self.ins("LDA heapptr+1 : ADC scratch+1 : STA heapptr+1");
        self.ins("RTS");
    }
}

impl Default for BbcMicroCodeGenerator {
    fn default() -> Self {
        BbcMicroCodeGenerator::new()
    }
}

impl CodeGenerator for BbcMicroCodeGenerator {
    fn pointer_size(&self) -> u32 {
        POINTER_SIZE
    }

    fn write_header(&mut self) {
        self.raw("; MOS Technology 6502 / BBC Micro");
        self.raw("oswrch = $FFEE");
        self.raw("osasci = $FFE3");
        self.raw("osword = $FFF1");
        self.raw("");
        self.raw("sp = $70");
        self.raw("fp = $72");
        self.raw("tmp = $74");
        self.raw("scratch = $76");
        self.raw("heapptr = $7E");
        self.raw("");
        self.raw("* = $1900");
        self.raw("");
    }

    fn write_entry_point(&mut self, entry_unique_name: &str) {
        self.entry = Some(entry_unique_name.to_owned());
        self.ins("JMP startup");
        self.raw("");
    }

    fn write_footer(&mut self, static_constructors: &[String]) {
        self.raw("startup:");
        self.write_comment("software stack, frame, and heap");
        self.ins("LDA #$00 : STA sp");
        self.ins("LDA #$70 : STA sp+1");
        self.ins("LDA #$00 : STA fp : STA fp+1");
        self.ins("LDA #$00 : STA heapptr");
        self.ins("LDA #$40 : STA heapptr+1");
        self.write_comment("MODE 7");
        self.ins("LDA #22");
        self.ins("JSR oswrch");
        self.ins("LDA #7");
        self.ins("JSR oswrch");
        for cctor in static_constructors {
            self.ins(&format!("JSR {cctor}"));
        }
        if let Some(entry) = self.entry.clone() {
            self.ins(&format!("JSR {entry}"));
        }
        self.ins("RTS");
        self.raw("");
        self.raw("call_indirect:");
        self.ins("JMP (tmp)");
    }

    fn write_method_start(&mut self, unique_name: &str) {
        self.raw(&format!("{unique_name}:"));
    }

    fn write_method_end(&mut self) {
        self.raw("");
    }

    fn write_prologue(&mut self, frame: FrameInfo) {
        self.frame = frame;
        self.write_comment("prologue");
        self.ins("LDA fp : PHA");
        self.ins("LDA fp+1 : PHA");
        self.sp_sub(frame.locals_size);
        self.ins("LDA sp : STA fp");
        self.ins("LDA sp+1 : STA fp+1");
        self.write_blank();
    }

    fn write_label(&mut self, label: &str) {
        self.local(label);
    }

    fn write_comment(&mut self, text: &str) {
        self.ins(&format!("; {text}"));
    }

    fn write_blank(&mut self) {
        self.raw("");
    }

    fn write_intrinsic(&mut self, intrinsic: Intrinsic) {
        match intrinsic {
            Intrinsic::ConsoleBeep => self.write_console_beep(),
            Intrinsic::ConsoleReadLine => self.write_console_read_line(),
            Intrinsic::ConsoleWriteLineInt32 => self.write_console_write_line_int32(),
            Intrinsic::ConsoleWriteLineString => self.write_console_write_line_string(),
            Intrinsic::HeapAlloc => self.write_heap_alloc(),
        }
    }

    fn write_add(&mut self, size: u32) {
        for i in 0..size {
            self.ins(&format!("LDY #{i} : LDA (sp),Y : STA scratch+{i}"));
        }
        self.sp_add(size);
        self.ins("CLC");
        for i in 0..size {
            self.ins(&format!("LDY #{i} : LDA (sp),Y : ADC scratch+{i} : STA (sp),Y"));
        }
    }

    fn write_sub(&mut self, size: u32) {
        for i in 0..size {
            self.ins(&format!("LDY #{i} : LDA (sp),Y : STA scratch+{i}"));
        }
        self.sp_add(size);
        self.ins("SEC");
        for i in 0..size {
            self.ins(&format!("LDY #{i} : LDA (sp),Y : SBC scratch+{i} : STA (sp),Y"));
        }
    }

    fn write_clt_int32(&mut self) {
        let no_overflow = self.fresh("clt_nv");
        let less = self.fresh("clt_lt");
        let done = self.fresh("clt_done");
        // Signed 32-bit compare: subtract and recover the sign from N^V.
        self.ins("SEC");
        for i in 0..4 {
            self.ins(&format!("LDY #{} : LDA (sp),Y : LDY #{i} : SBC (sp),Y", 4 + i));
        }
        self.ins(&format!("BVC {no_overflow}"));
        self.ins("EOR #$80");
        self.raw(&format!("{no_overflow}:"));
        self.ins(&format!("BMI {less}"));
        self.ins("LDA #0");
        self.ins(&format!("BEQ {done}"));
        self.raw(&format!("{less}:"));
        self.ins("LDA #1");
        self.raw(&format!("{done}:"));
        self.ins("STA scratch");
        self.sp_add(7);
        self.ins("LDA scratch : LDY #0 : STA (sp),Y");
    }

    fn write_ceq_int32(&mut self) {
        let not_equal = self.fresh("ceq_ne");
        let store = self.fresh("ceq_store");
        self.ins("LDA #0 : STA scratch");
        for i in 0..4 {
            self.ins(&format!(
                "LDY #{} : LDA (sp),Y : LDY #{i} : EOR (sp),Y : ORA scratch : STA scratch",
                4 + i
            ));
        }
        self.sp_add(7);
        self.ins("LDA scratch");
        self.ins(&format!("BNE {not_equal}"));
        self.ins("LDA #1");
        self.ins(&format!("BNE {store}"));
        self.raw(&format!("{not_equal}:"));
        self.ins("LDA #0");
        self.raw(&format!("{store}:"));
        self.ins("LDY #0 : STA (sp),Y");
    }

    fn write_conv_i_int32(&mut self) {
        // Truncate int32 to the native pointer width.
        self.ins("LDY #0 : LDA (sp),Y : STA scratch");
        self.ins("LDY #1 : LDA (sp),Y : STA scratch+1");
        self.sp_add(2);
        self.ins("LDA scratch : LDY #0 : STA (sp),Y");
        self.ins("LDA scratch+1 : LDY #1 : STA (sp),Y");
    }

    fn write_dup(&mut self, size: u32) {
        self.sp_sub(size);
        for i in 0..size {
            self.ins(&format!("LDY #{} : LDA (sp),Y : LDY #{i} : STA (sp),Y", size + i));
        }
    }

    fn write_pop(&mut self, size: u32) {
        self.sp_add(size);
    }

    fn write_ldc_i4(&mut self, value: i32) {
        self.sp_sub(4);
        for (i, byte) in value.to_le_bytes().iter().enumerate() {
            self.ins(&format!("LDA #${byte:02X} : LDY #{i} : STA (sp),Y"));
        }
    }

    fn write_br(&mut self, label: &str) {
        self.ins(&format!("JMP _{label}"));
    }

    fn write_brtrue(&mut self, size: u32, label: &str) {
        let skip = self.fresh("bt_skip");
        self.ins("LDY #0 : LDA (sp),Y");
        for i in 1..size {
            self.ins(&format!("LDY #{i} : ORA (sp),Y"));
        }
        self.ins("STA scratch");
        self.sp_add(size);
        self.ins("LDA scratch");
        self.ins(&format!("BEQ {skip}"));
        self.ins(&format!("JMP _{label}"));
        self.raw(&format!("{skip}:"));
    }

    fn write_brfalse(&mut self, size: u32, label: &str) {
        let skip = self.fresh("bf_skip");
        self.ins("LDY #0 : LDA (sp),Y");
        for i in 1..size {
            self.ins(&format!("LDY #{i} : ORA (sp),Y"));
        }
        self.ins("STA scratch");
        self.sp_add(size);
        self.ins("LDA scratch");
        self.ins(&format!("BNE {skip}"));
        self.ins(&format!("JMP _{label}"));
        self.raw(&format!("{skip}:"));
    }

    fn write_ldarg(&mut self, offset: u32, size: u32) {
        // Arguments sit above the locals; entity offsets run front-to-back
        // while the stack grew the other way, so flip here.
        let displacement =
            self.frame.locals_size + (self.frame.params_size - offset - size);
        self.tmp_from_frame(displacement);
        self.sp_sub(size);
        self.copy_tmp_to_stack(size);
    }

    fn write_ldloc(&mut self, offset: u32, size: u32) {
        self.tmp_from_frame(offset);
        self.sp_sub(size);
        self.copy_tmp_to_stack(size);
    }

    fn write_stloc(&mut self, offset: u32, size: u32) {
        self.tmp_from_frame(offset);
        self.copy_stack_to_tmp(size);
        self.sp_add(size);
    }

    fn write_ldloca(&mut self, offset: u32) {
        self.tmp_from_frame(offset);
        self.sp_sub(2);
        self.ins("LDA tmp : LDY #0 : STA (sp),Y");
        self.ins("LDA tmp+1 : LDY #1 : STA (sp),Y");
    }

    fn write_ldfld(&mut self, has_header: bool, offset: u32, size: u32) {
        let displacement = offset + if has_header { OBJECT_HEADER_SIZE } else { 0 };
        self.tmp_from_stack(0);
        self.tmp_advance(displacement);
        self.sp_add(POINTER_SIZE);
        self.sp_sub(size);
        self.copy_tmp_to_stack(size);
    }

    fn write_stfld(&mut self, has_header: bool, offset: u32, size: u32) {
        let displacement = offset + if has_header { OBJECT_HEADER_SIZE } else { 0 };
        self.store_through_pointer(displacement, size);
    }

    fn write_ldsfld(&mut self, label: &str, size: u32) {
        self.sp_sub(size);
        for i in 0..size {
            self.ins(&format!("LDA {label}+{i} : LDY #{i} : STA (sp),Y"));
        }
    }

    fn write_stsfld(&mut self, label: &str, size: u32) {
        for i in 0..size {
            self.ins(&format!("LDY #{i} : LDA (sp),Y : STA {label}+{i}"));
        }
        self.sp_add(size);
    }

    fn write_ldstr(&mut self, key: &str) {
        self.sp_sub(2);
        self.store_word_at_stack_top(key);
    }

    fn write_stind(&mut self, size: u32) {
        self.store_through_pointer(0, size);
    }

    fn write_initobj(&mut self, size: u32) {
        self.tmp_from_stack(0);
        self.sp_add(POINTER_SIZE);
        if size > 0 {
            let zero = self.fresh("iz");
            self.ins("LDA #0");
            self.ins(&format!("LDY #{size}"));
            self.raw(&format!("{zero}:"));
            self.ins("DEY");
            self.ins("STA (tmp),Y");
            self.ins("CPY #0");
            self.ins(&format!("BNE {zero}"));
        }
    }

    fn write_call(&mut self, callee_unique_name: &str) {
        self.ins(&format!("JSR {callee_unique_name}"));
    }

    fn write_callvirt(&mut self, slot_label: &str, args_size: u32) {
        // The receiver is the deepest argument.
        self.tmp_from_stack(args_size - POINTER_SIZE);
        // Dispatch-table pointer lives in the object header.
        self.ins("LDY #0 : LDA (tmp),Y : STA scratch");
        self.ins("LDY #1 : LDA (tmp),Y : STA scratch+1");
        self.ins("CLC");
        self.ins(&format!("LDA scratch : ADC #<{slot_label} : STA tmp"));
        self.ins(&format!("LDA scratch+1 : ADC #>{slot_label} : STA tmp+1"));
        self.ins("LDY #0 : LDA (tmp),Y : STA scratch");
        self.ins("LDY #1 : LDA (tmp),Y : STA scratch+1");
        self.ins("LDA scratch : STA tmp");
        self.ins("LDA scratch+1 : STA tmp+1");
        self.ins("JSR call_indirect");
    }

    fn write_newobj(
        &mut self,
        ctor_unique_name: &str,
        ctor_params_size: u32,
        alloc_size: u32,
        vtable_label: &str,
        alloc_unique_name: &str,
    ) {
        let args_size = ctor_params_size - POINTER_SIZE;
        self.sp_sub(2);
        self.store_word_at_stack_top(&alloc_size.to_string());
        self.ins(&format!("JSR {alloc_unique_name}"));
        // Install the dispatch-table pointer in the new object's header.
        self.tmp_from_stack(0);
        self.ins(&format!("LDA #<{vtable_label} : LDY #0 : STA (tmp),Y"));
        self.ins(&format!("LDA #>{vtable_label} : LDY #1 : STA (tmp),Y"));
        // Rearrange [args.., obj] into [obj, obj, args..] so the receiver
        // is the deepest argument and a result copy survives the call.
        self.sp_sub(2);
        for i in 0..args_size {
            self.ins(&format!("LDY #{} : LDA (sp),Y : LDY #{i} : STA (sp),Y", 4 + i));
        }
        self.ins(&format!("LDA tmp : LDY #{args_size} : STA (sp),Y"));
        self.ins(&format!("LDA tmp+1 : LDY #{} : STA (sp),Y", args_size + 1));
        self.ins(&format!("LDA tmp : LDY #{} : STA (sp),Y", args_size + 2));
        self.ins(&format!("LDA tmp+1 : LDY #{} : STA (sp),Y", args_size + 3));
        self.ins(&format!("JSR {ctor_unique_name}"));
    }

    fn write_ret(&mut self) {
        let frame = self.frame;
        for i in 0..frame.return_size {
            self.ins(&format!("LDY #{i} : LDA (sp),Y : STA scratch+{i}"));
        }
        // Pop locals and arguments in one step.
        self.ins("CLC");
        let pop = frame.locals_size + frame.params_size;
        self.ins(&format!("LDA fp : ADC #<{pop} : STA sp"));
        self.ins(&format!("LDA fp+1 : ADC #>{pop} : STA sp+1"));
        self.ins("PLA : STA fp+1");
        self.ins("PLA : STA fp");
        if frame.return_size > 0 {
            self.sp_sub(frame.return_size);
            for i in 0..frame.return_size {
                self.ins(&format!("LDA scratch+{i} : LDY #{i} : STA (sp),Y"));
            }
        }
        self.ins("RTS");
    }

    fn write_static_field(&mut self, label: &str, size: u32) {
        self.raw(&format!("{label}:"));
        self.ins(&format!(".fill {size}"));
    }

    fn write_string_constant(&mut self, key: &str, value: &str) {
        self.raw(&format!("{key}:"));
        self.ins(&format!(".byte {}", string_bytes(value)));
    }

    fn write_vtables(&mut self, vtables: &[VtableData]) {
        if vtables.is_empty() {
            return;
        }
        self.write_comment("dispatch tables");
        // Slot offset constants are shared by every table that carries
        // the slot; emit each once.
        let mut seen = rustc_hash::FxHashSet::default();
        for table in vtables {
            for slot in &table.slots {
                if seen.insert(slot.slot_label.clone()) {
                    self.raw(&format!(
                        "{} = {}",
                        slot.slot_label,
                        u32::from(slot.index) * POINTER_SIZE
                    ));
                }
            }
        }
        self.raw("");
        for table in vtables {
            self.raw(&format!("{}:", table.label));
            let uniques: Vec<String> = table
                .slots
                .iter()
                .map(|s| s.method_unique_name.clone())
                .collect();
            for unique in uniques {
                self.ins(&format!(".word {unique}"));
            }
            self.raw("");
        }
    }

    fn finish(&mut self) -> String {
        std::mem::take(&mut self.out)
    }
}

/// Render a string constant as a `.byte` operand list: quoted runs for
/// printable ASCII, numeric bytes otherwise, NUL-terminated.
fn string_bytes(value: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut run = String::new();
    for ch in value.chars() {
        if (' '..='~').contains(&ch) && ch != '"' {
            run.push(ch);
        } else {
            if !run.is_empty() {
                parts.push(format!("\"{run}\""));
                run.clear();
            }
            let code = u32::from(ch);
            parts.push(if code <= 255 { code.to_string() } else { "63".to_owned() });
        }
    }
    if !run.is_empty() {
        parts.push(format!("\"{run}\""));
    }
    parts.push("0".to_owned());
    parts.join(", ")
}
