//! AArch64 register roles and register sets.
//!
//! Allocation logic never works with raw register numbers. It works with
//! [`Register`], a closed enumeration of the roles the AAPCS64 calling convention
//! gives each general-purpose register, and converts to the numeric encoding only
//! when text is emitted. Aliases such as `x16`/`ip0` therefore cannot leak into
//! allocation decisions.

use std::fmt;

/// A general-purpose register, named by its calling-convention role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Arg0,
    Arg1,
    Arg2,
    Arg3,
    Arg4,
    Arg5,
    Arg6,
    Arg7,
    /// x8; no aggregate returns exist, so it doubles as the first expression temporary.
    IndirectResult,
    Temp0,
    Temp1,
    Temp2,
    Temp3,
    Temp4,
    Temp5,
    Temp6,
    /// x16 (ip0); also carries the trap number for `svc`.
    Scratch0,
    /// x17 (ip1).
    Scratch1,
    CalleeSaved0,
    CalleeSaved1,
    CalleeSaved2,
    CalleeSaved3,
    CalleeSaved4,
    CalleeSaved5,
    CalleeSaved6,
    CalleeSaved7,
    CalleeSaved8,
    CalleeSaved9,
    /// x29; frame slots are addressed relative to it.
    FramePointer,
    LinkRegister,
    StackPointer,
}

/// Argument registers in assignment order.
pub const ARG_REGS: [Register; 8] = [
    Register::Arg0,
    Register::Arg1,
    Register::Arg2,
    Register::Arg3,
    Register::Arg4,
    Register::Arg5,
    Register::Arg6,
    Register::Arg7,
];

/// Caller-saved registers handed out to expression reservations, in allocation order.
pub const EXPR_REGS: [Register; 8] = [
    Register::IndirectResult,
    Register::Temp0,
    Register::Temp1,
    Register::Temp2,
    Register::Temp3,
    Register::Temp4,
    Register::Temp5,
    Register::Temp6,
];

/// Register holding a function's return value.
pub const RETURN_REG: Register = Register::Arg0;

/// Register used for the platform system-call number.
pub const SYSCALL_REG: Register = Register::Scratch0;

impl Register {
    /// Hardware encoding (x0 = 0 ... x30 = 30, sp = 31).
    pub const fn encoding(self) -> u8 {
        match self {
            Register::Arg0 => 0,
            Register::Arg1 => 1,
            Register::Arg2 => 2,
            Register::Arg3 => 3,
            Register::Arg4 => 4,
            Register::Arg5 => 5,
            Register::Arg6 => 6,
            Register::Arg7 => 7,
            Register::IndirectResult => 8,
            Register::Temp0 => 9,
            Register::Temp1 => 10,
            Register::Temp2 => 11,
            Register::Temp3 => 12,
            Register::Temp4 => 13,
            Register::Temp5 => 14,
            Register::Temp6 => 15,
            Register::Scratch0 => 16,
            Register::Scratch1 => 17,
            Register::CalleeSaved0 => 19,
            Register::CalleeSaved1 => 20,
            Register::CalleeSaved2 => 21,
            Register::CalleeSaved3 => 22,
            Register::CalleeSaved4 => 23,
            Register::CalleeSaved5 => 24,
            Register::CalleeSaved6 => 25,
            Register::CalleeSaved7 => 26,
            Register::CalleeSaved8 => 27,
            Register::CalleeSaved9 => 28,
            Register::FramePointer => 29,
            Register::LinkRegister => 30,
            Register::StackPointer => 31,
        }
    }

    /// 32-bit view of the register, used for byte loads and stores.
    pub fn w(self) -> WName {
        WName(self)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::StackPointer => f.write_str("sp"),
            reg => write!(f, "x{}", reg.encoding()),
        }
    }
}

/// Display adapter printing the `w` name of a register.
#[derive(Debug, Clone, Copy)]
pub struct WName(Register);

impl fmt::Display for WName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Register::StackPointer => f.write_str("wsp"),
            reg => write!(f, "w{}", reg.encoding()),
        }
    }
}

/// Bit set of registers keyed by encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegSet {
    bits: u32,
}

impl RegSet {
    pub const fn new() -> Self {
        Self { bits: 0 }
    }

    pub fn insert(&mut self, reg: Register) {
        self.bits |= 1 << reg.encoding();
    }

    pub fn remove(&mut self, reg: Register) {
        self.bits &= !(1 << reg.encoding());
    }

    pub fn contains(&self, reg: Register) -> bool {
        self.bits & (1 << reg.encoding()) != 0
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// First register of `bank`, in bank order, not in the set.
    pub fn first_free(&self, bank: &[Register]) -> Option<Register> {
        bank.iter().copied().find(|&reg| !self.contains(reg))
    }
}
