// This module lowers the typed AST to AArch64 assembly text. The lowering methods are
// implemented on aarch64::FunctionCodegen and split by concern: operator emission, expression
// lowering with call marshalling, statement and control-flow emission. builtins holds the
// fixed helper routines a program may call, and unit drives a whole compilation unit from
// the function table to the final .text and .data sections.

//! AST lowering to assembly text.

pub mod builtins;
pub mod expr;
pub mod ops;
pub mod stmt;
pub mod unit;

pub use builtins::Builtin;
pub use expr::{emit_into, SVC_IMMEDIATE};
pub use unit::{compile_unit, compile_unit_with};
