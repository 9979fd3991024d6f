// This module provides AsmWriter, the AArch64 assembly text encoder used by every code
// generation path in qcc. It accumulates indented instruction and directive lines plus
// unindented labels, and offers typed helpers for the instruction shapes the back end emits:
// register moves, immediate materialization through mov/movk chunks, width-selected loads
// and stores (ldrb/strb on w registers for one-byte values, ldr/str on x registers
// otherwise), frame-relative addressing through the frame pointer (slots past the unscaled
// -256 reach get their address computed into a scratch first), page-relative
// addressing of static data, branches and the system trap. The central operation is copy,
// which moves a value between two reservations: a no-op when both name the same storage, a
// mov between registers, a store or load between a register and a frame slot, and a
// load/store pair through scratch register x16 between two frame slots. All helpers take
// Register roles and print the numeric names only here, at the text boundary.

//! AArch64 assembly text encoding.

use std::fmt::{self, Display, Write};

use crate::ast::Type;
use crate::core::error::{CompileError, CompileResult};
use crate::core::register_file::Register;
use crate::core::reservation::{Location, Reservation};

/// Scratch register used to stage values for frame slots.
pub const SCRATCH0: Register = Register::Scratch0;
/// Second scratch register, for right-hand operands and indirect stores.
pub const SCRATCH1: Register = Register::Scratch1;

/// Largest frame offset reachable by `[x29, #-off]` (ldur/stur range).
pub const MAX_UNSCALED_OFFSET: i64 = 256;

/// Largest unshifted `add`/`sub` immediate.
const MAX_ADD_IMMEDIATE: u64 = 4095;

/// Accumulates assembly text.
#[derive(Debug, Clone)]
pub struct AsmWriter {
    text: String,
    indent: String,
    /// Instruction and directive lines written so far.
    instructions: usize,
}

impl AsmWriter {
    pub fn new(indent: usize) -> Self {
        Self { text: String::new(), indent: " ".repeat(indent), instructions: 0 }
    }

    /// Write one indented instruction or directive line.
    pub fn inst(&mut self, line: impl Display) {
        // Writing into a String cannot fail.
        let _ = writeln!(self.text, "{}{}", self.indent, line);
        self.instructions += 1;
    }

    /// Write an unindented label definition.
    pub fn label(&mut self, name: impl Display) {
        let _ = writeln!(self.text, "{name}:");
    }

    /// Append text produced by another writer.
    pub fn append(&mut self, other: AsmWriter) {
        self.text.push_str(&other.text);
        self.instructions += other.instructions;
    }

    /// Append text that is already formatted line by line.
    pub fn push_str(&mut self, text: &str) {
        self.instructions += text.lines().filter(|line| !line.ends_with(':')).count();
        self.text.push_str(text);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions
    }

    /// A fresh, empty writer with the same indentation.
    pub fn fork(&self) -> Self {
        Self { text: String::new(), indent: self.indent.clone(), instructions: 0 }
    }

    pub fn mov(&mut self, dst: Register, src: Register) {
        if dst != src {
            self.inst(format_args!("mov {dst}, {src}"));
        }
    }

    /// Load a 64-bit constant into `dst`. Chunks above the lowest are only inserted when
    /// they are non-zero.
    pub fn mov_imm(&mut self, dst: Register, bits: u64) {
        self.inst(format_args!("mov {dst}, #{}", bits & 0xffff));
        for shift in [16, 32, 48] {
            let chunk = (bits >> shift) & 0xffff;
            if chunk != 0 {
                self.inst(format_args!("movk {dst}, #{chunk}, LSL #{shift}"));
            }
        }
    }

    /// Materialize `bits` into `target`. Frame slots are written through x16.
    pub fn put_value(&mut self, target: &Reservation, bits: u64) -> CompileResult<()> {
        match target.location {
            Location::Register(reg) => {
                self.mov_imm(reg, bits);
                Ok(())
            }
            Location::Stack(_) => {
                self.mov_imm(SCRATCH0, bits);
                self.copy(&target.in_register(SCRATCH0), target)
            }
            Location::Unassigned => Err(unassigned("materialize a constant into")),
        }
    }

    /// Load the value in frame slot `offset` into `dst` with the width of `ty`. Slots out
    /// of unscaled reach are addressed through `dst` itself.
    pub fn load_frame(&mut self, dst: Register, offset: i64, ty: &Type) {
        let base = self.frame_slot_base(dst, offset);
        let operand = slot_operand(base, offset);
        if is_byte(ty) {
            self.inst(format_args!("ldrb {}, {operand}", dst.w()));
        } else {
            self.inst(format_args!("ldr {dst}, {operand}"));
        }
    }

    /// Store `src` into frame slot `offset` with the width of `ty`. Slots out of unscaled
    /// reach are addressed through whichever scratch register `src` is not.
    pub fn store_frame(&mut self, src: Register, offset: i64, ty: &Type) {
        let scratch = if src == SCRATCH1 { SCRATCH0 } else { SCRATCH1 };
        let base = self.frame_slot_base(scratch, offset);
        let operand = slot_operand(base, offset);
        if is_byte(ty) {
            self.inst(format_args!("strb {}, {operand}", src.w()));
        } else {
            self.inst(format_args!("str {src}, {operand}"));
        }
    }

    /// Base register for frame slot `offset`: the frame pointer when the slot is within
    /// unscaled reach, otherwise `via` loaded with the slot's address.
    fn frame_slot_base(&mut self, via: Register, offset: i64) -> Register {
        if offset <= MAX_UNSCALED_OFFSET {
            Register::FramePointer
        } else {
            self.frame_address(via, offset);
            via
        }
    }

    /// Load a value of type `ty` from the address held in `base`.
    pub fn load_indirect(&mut self, dst: Register, base: Register, ty: &Type) {
        if is_byte(ty) {
            self.inst(format_args!("ldrb {}, [{base}]", dst.w()));
        } else {
            self.inst(format_args!("ldr {dst}, [{base}]"));
        }
    }

    /// Store a value of type `ty` to the address held in `base`.
    pub fn store_indirect(&mut self, src: Register, base: Register, ty: &Type) {
        if is_byte(ty) {
            self.inst(format_args!("strb {}, [{base}]", src.w()));
        } else {
            self.inst(format_args!("str {src}, [{base}]"));
        }
    }

    /// Copy the value in `from` into `to`.
    pub fn copy(&mut self, from: &Reservation, to: &Reservation) -> CompileResult<()> {
        if from.same_storage(to) {
            return Ok(());
        }

        match (from.location, to.location) {
            (Location::Register(src), Location::Register(dst)) => self.mov(dst, src),
            (Location::Register(src), Location::Stack(offset)) => {
                self.store_frame(src, offset, &to.ty)
            }
            (Location::Stack(offset), Location::Register(dst)) => {
                self.load_frame(dst, offset, &from.ty)
            }
            (Location::Stack(src), Location::Stack(dst)) => {
                self.load_frame(SCRATCH0, src, &from.ty);
                self.store_frame(SCRATCH0, dst, &to.ty);
            }
            (Location::Unassigned, _) => return Err(unassigned("copy from")),
            (_, Location::Unassigned) => return Err(unassigned("copy into")),
        }
        Ok(())
    }

    /// `dst = fp - offset`, the address of a frame slot.
    pub fn frame_address(&mut self, dst: Register, offset: i64) {
        let fp = Register::FramePointer;
        if offset as u64 <= MAX_ADD_IMMEDIATE {
            self.inst(format_args!("sub {dst}, {fp}, #{offset}"));
        } else {
            self.mov_imm(dst, offset as u64);
            self.inst(format_args!("sub {dst}, {fp}, {dst}"));
        }
    }

    /// `sp = sp - size`, or `sp = sp + size` when `grow` is false. Sizes beyond the 12-bit
    /// immediate are staged in x16.
    pub fn adjust_sp(&mut self, size: u64, grow: bool) {
        let mnemonic = if grow { "sub" } else { "add" };
        if size <= MAX_ADD_IMMEDIATE {
            self.inst(format_args!("{mnemonic} sp, sp, #{size}"));
        } else if size % 4096 == 0 && size >> 12 <= MAX_ADD_IMMEDIATE {
            self.inst(format_args!("{mnemonic} sp, sp, #{}, lsl #12", size >> 12));
        } else {
            self.mov_imm(SCRATCH0, size);
            self.inst(format_args!("{mnemonic} sp, sp, {SCRATCH0}"));
        }
    }

    /// Address of a data label, page-relative.
    pub fn page_address(&mut self, dst: Register, label: &str) {
        self.inst(format_args!("adrp {dst}, {label}@PAGE"));
        self.inst(format_args!("add {dst}, {dst}, {label}@PAGEOFF"));
    }

    pub fn cmp_zero(&mut self, reg: Register) {
        self.inst(format_args!("cmp {reg}, #0"));
    }

    pub fn b(&mut self, label: impl Display) {
        self.inst(format_args!("b {label}"));
    }

    pub fn b_cond(&mut self, cond: &str, label: impl Display) {
        self.inst(format_args!("b.{cond} {label}"));
    }

    pub fn bl(&mut self, label: impl Display) {
        self.inst(format_args!("bl {label}"));
    }

    pub fn svc(&mut self, imm: u16) {
        self.inst(format_args!("svc #{imm:#x}"));
    }

    pub fn ret(&mut self) {
        self.inst("ret");
    }
}

impl fmt::Display for AsmWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn slot_operand(base: Register, offset: i64) -> String {
    if base == Register::FramePointer {
        format!("[{base}, #-{offset}]")
    } else {
        format!("[{base}]")
    }
}

fn is_byte(ty: &Type) -> bool {
    ty.size() == 1
}

fn unassigned(action: &str) -> CompileError {
    CompileError::internal(format!("tried to {action} an unassigned reservation"))
}
