// This module implements the subset of the AAPCS64 calling convention that qcc relies on.
// Integer and pointer arguments are passed in x0..x7 in declaration order; results come back
// in x0. Stack-passed arguments are not implemented, so a ninth argument is reported as a
// known limitation instead of being silently dropped. The CCAssigner trait and its
// Aapcs64Assigner implementation hand out argument registers and name the return register.
// FrameLayout turns a function's observed stack high-water mark and
// call behaviour into the sizes its prologue and epilogue use: locals are rounded up to 16
// bytes and the frame record (x29, x30) is saved whenever the function calls out or repoints
// the frame pointer to address locals. emit_save_caller and emit_load_caller bracket a call
// with 16-byte pushes of the live expression registers, pairing them with stp/ldp and
// restoring in exactly the inverse order.

//! AAPCS64 calling convention.

use crate::core::error::{CompileError, CompileResult};
use crate::core::register_file::{Register, ARG_REGS, RETURN_REG};

use super::encoder::AsmWriter;

/// Bytes pushed for each saved register pair (and for a lone register).
pub const SAVE_SLOT_SIZE: u64 = 16;

/// Required stack pointer alignment.
pub const STACK_ALIGN: u64 = 16;

/// Trait for calling convention argument assignment.
pub trait CCAssigner {
    /// Register for the next argument.
    fn assign_arg(&mut self) -> CompileResult<Register>;

    /// Register holding the return value.
    fn assign_ret(&self) -> Register;

    /// Reset state for a new call or function.
    fn reset(&mut self);
}

/// AAPCS64 assigner for integer-class arguments.
#[derive(Debug, Default)]
pub struct Aapcs64Assigner {
    /// Next general-purpose argument register.
    gp_cnt: usize,
}

impl Aapcs64Assigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Argument registers for a call with `count` arguments.
    pub fn assign_args(&mut self, count: usize) -> CompileResult<Vec<Register>> {
        self.reset();
        (0..count).map(|_| self.assign_arg()).collect()
    }
}

impl CCAssigner for Aapcs64Assigner {
    fn assign_arg(&mut self) -> CompileResult<Register> {
        let reg = ARG_REGS.get(self.gp_cnt).copied().ok_or_else(|| {
            CompileError::unsupported(format!(
                "more than {} arguments (stack-passed arguments)",
                ARG_REGS.len()
            ))
        })?;
        self.gp_cnt += 1;
        Ok(reg)
    }

    fn assign_ret(&self) -> Register {
        RETURN_REG
    }

    fn reset(&mut self) {
        self.gp_cnt = 0;
    }
}

/// Align a value up to the specified power-of-two alignment.
pub fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) & !(align - 1)
}

/// Stack layout of one function, decided after its body has been lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Bytes reserved for locals and spills below the frame record.
    pub locals_size: u64,
    /// Whether x29/x30 are saved and x29 is repointed.
    pub saves_frame_record: bool,
}

impl FrameLayout {
    pub fn new(high_water: u64, makes_calls: bool) -> Self {
        let locals_size = align_up(high_water, STACK_ALIGN);
        Self { locals_size, saves_frame_record: makes_calls || locals_size > 0 }
    }

    /// Total bytes the prologue moves the stack pointer by.
    pub fn total_size(&self) -> u64 {
        let record = if self.saves_frame_record { SAVE_SLOT_SIZE } else { 0 };
        self.locals_size + record
    }

    pub fn emit_prologue(&self, w: &mut AsmWriter) {
        if self.saves_frame_record {
            w.inst("stp x29, x30, [sp, #-16]!");
            w.inst("mov x29, sp");
        }
        if self.locals_size > 0 {
            w.adjust_sp(self.locals_size, true);
        }
    }

    pub fn emit_epilogue(&self, w: &mut AsmWriter) {
        if self.locals_size > 0 {
            w.adjust_sp(self.locals_size, false);
        }
        if self.saves_frame_record {
            w.inst("ldp x29, x30, [sp], #16");
        }
        w.ret();
    }
}

/// Push the live caller-saved registers before a call.
pub fn emit_save_caller(w: &mut AsmWriter, regs: &[Register]) {
    for chunk in regs.chunks(2) {
        match chunk {
            [first, second] => w.inst(format_args!("stp {first}, {second}, [sp, #-16]!")),
            [single] => w.inst(format_args!("str {single}, [sp, #-16]!")),
            _ => {}
        }
    }
}

/// Pop the registers pushed by [`emit_save_caller`], in reverse.
pub fn emit_load_caller(w: &mut AsmWriter, regs: &[Register]) {
    for chunk in regs.chunks(2).rev() {
        match chunk {
            [first, second] => w.inst(format_args!("ldp {first}, {second}, [sp], #16")),
            [single] => w.inst(format_args!("ldr {single}, [sp], #16")),
            _ => {}
        }
    }
}
