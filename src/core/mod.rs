// This module serves as the hub for qcc's target-independent infrastructure: the error type
// shared by every codegen operation, the register role model, reservations (where a value
// lives), the per-function stack frame allocator, the static data table and the compile state
// that ties them together for one compilation unit. Nothing in here emits instruction text;
// the aarch64 module turns reservations into assembly and the codegen module drives both
// from the AST.

//! Core qcc infrastructure
//!
//! # Key Components
//!
//! ## Compile State (`session`)
//! - Function table with signature-consistency checks
//! - Frame stack, static data, used builtins, label counters
//! - Compilation statistics
//!
//! ## Registers (`register_file`)
//! - Closed enumeration of AAPCS64 register roles
//! - Numeric encoding only at the text boundary
//!
//! ## Storage (`reservation`, `stack_frame`)
//! - Register or frame-relative storage tagged with its type
//! - LIFO variable and expression scopes with exact aligned pops

pub mod error;
pub mod register_file;
pub mod reservation;
pub mod session;
pub mod stack_frame;
pub mod static_data;

// Re-export core components
pub use error::{CompileError, CompileResult, ErrorKind};

pub use register_file::{RegSet, Register, ARG_REGS, EXPR_REGS, RETURN_REG, SYSCALL_REG};

pub use reservation::{Location, Reservation};

pub use session::{CodegenOptions, CompileState, CompileStats};

pub use stack_frame::StackFrame;

pub use static_data::{StaticDataKind, StaticDataTable, StaticDatum};
