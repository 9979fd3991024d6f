//! qcc - a small ahead-of-time compiler back end for AArch64.
//!
//! qcc lowers a typed, C-like AST (integers, chars, pointers, functions, `if`/`while`,
//! calls and a raw `svc` system-call form) to AArch64 assembly text for the Mach-O
//! toolchain. Parsing is not part of the crate: a front end builds the AST with
//! [`AstBuilder`] and hands the definitions to [`compile_unit`].
//!
//! # Primary Usage
//!
//! ```
//! use bumpalo::Bump;
//! use qcc::{compile_unit, AstBuilder, BinaryOp, CodegenOptions, FnSignature, Param, Type};
//!
//! let arena = Bump::new();
//! let b = AstBuilder::new(&arena);
//! let sum = b.binary(BinaryOp::Add, b.var("a", Type::Int), b.var("b", Type::Int))?;
//! let add = b.function(
//!     FnSignature::new(
//!         Type::Int,
//!         "add",
//!         vec![Param::new(Type::Int, "a"), Param::new(Type::Int, "b")],
//!     ),
//!     [b.ret(sum)],
//! );
//!
//! let asm = compile_unit(&[], &[add], CodegenOptions::default())?;
//! assert!(asm.contains("_add:"));
//! # Ok::<(), qcc::CompileError>(())
//! ```
//!
//! # Architecture
//!
//! - [`ast`] - The typed AST and its builder
//! - [`core`] - Shared infrastructure (errors, registers, reservations, frames, state)
//! - [`aarch64`] - AArch64 specific code (encoder, calling convention, function driver)
//! - [`codegen`] - Statement, expression and operator lowering; unit driver

pub mod aarch64;
pub mod ast;
pub mod codegen;
pub mod core;

pub use ast::{AstBuilder, BinaryOp, Expr, FnDef, FnSignature, Literal, Param, Stmt, Type, UnaryOp};
pub use codegen::{compile_unit, compile_unit_with, Builtin};
pub use self::core::{
    CodegenOptions, CompileError, CompileResult, CompileState, CompileStats, ErrorKind, Register,
    Reservation,
};
